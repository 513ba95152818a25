use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::{ConfigError, RawConfig};

const SITE_FILES: [&str; 3] = ["core-site.xml", "hdfs-site.xml", "yarn-site.xml"];

/// Where discovered (lowest-priority-but-one) configuration comes from.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<RawConfig, ConfigError>;
}

impl ConfigSource for RawConfig {
    fn load(&self) -> Result<RawConfig, ConfigError> {
        Ok(self.clone())
    }
}

/// Hadoop configuration directory holding `*-site.xml` files.
#[derive(Debug, Clone)]
pub struct HadoopConfDir {
    dir: PathBuf,
}

impl HadoopConfDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Look in the usual places: `$HADOOP_CONF_DIR`, `$HADOOP_INSTALL/hadoop/conf`,
    /// `/etc/hadoop/conf` (only if it holds `hdfs-site.xml`), then the working directory.
    pub fn discover() -> Self {
        let candidate = std::env::var_os("HADOOP_CONF_DIR")
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HADOOP_INSTALL")
                    .map(|d| PathBuf::from(d).join("hadoop").join("conf"))
            })
            .or_else(|| {
                let etc = Path::new("/etc/hadoop/conf");
                etc.join("hdfs-site.xml").exists().then(|| etc.to_path_buf())
            })
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        debug!(dir = %candidate.display(), "using hadoop configuration directory");
        Self::new(candidate)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ConfigSource for HadoopConfDir {
    fn load(&self) -> Result<RawConfig, ConfigError> {
        let mut out = RawConfig::new();
        for name in SITE_FILES {
            let path = self.dir.join(name);
            match std::fs::read_to_string(&path) {
                Ok(text) => out.extend(parse_site_xml(&text)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    trace!(path = %path.display(), "site file absent; skipping");
                }
                Err(e) => {
                    return Err(ConfigError::Read {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(out)
    }
}

/// Extract `<name>`/`<value>` pairs from a `*-site.xml` document.
///
/// Each `<name>` is paired with the first `<value>` that follows it before the next
/// `<name>`; a property without a value is dropped.
pub fn parse_site_xml(text: &str) -> RawConfig {
    let mut out = RawConfig::new();
    let mut rest = text;
    while let Some((name, after)) = between(rest, "<name>", "</name>") {
        let next_name = after.find("<name>").unwrap_or(after.len());
        if let Some((value, _)) = between(&after[..next_name], "<value>", "</value>") {
            out.insert(name.trim().to_string(), value.trim().to_string());
        }
        rest = after;
    }
    out
}

fn between<'a>(s: &'a str, open: &str, close: &str) -> Option<(&'a str, &'a str)> {
    let start = s.find(open)? + open.len();
    let len = s[start..].find(close)?;
    Some((&s[start..start + len], &s[start + len + close.len()..]))
}

/// Split `scheme://host:port`, `host:port` or bare `host`.
pub fn host_port(s: &str) -> Result<(String, Option<u16>), ConfigError> {
    let no_scheme = s.split_once("://").map_or(s, |(_, rest)| rest);
    let authority = no_scheme.split('/').next().unwrap_or_default();
    match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "port".to_string(),
                value: s.to_string(),
            })?;
            Ok((host.to_string(), Some(port)))
        }
        None => Ok((authority.to_string(), None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_port_variants() {
        assert_eq!(
            host_port("hdfs://foo.bar.com:8080").unwrap(),
            ("foo.bar.com".to_string(), Some(8080))
        );
        assert_eq!(
            host_port("foo.bar.com:8080").unwrap(),
            ("foo.bar.com".to_string(), Some(8080))
        );
        assert_eq!(host_port("foo.bar.com").unwrap(), ("foo.bar.com".to_string(), None));
        assert!(host_port("foo:bar").is_err());
    }

    #[test]
    fn site_xml_pairs() {
        let xml = r#"
            <configuration>
              <property>
                <name>dfs.replication</name>
                <value>1</value>
              </property>
              <property><name>orphan</name></property>
              <property><name>yarn.resourcemanager.hostname</name><value> rm.local </value></property>
            </configuration>
        "#;
        let raw = parse_site_xml(xml);
        assert_eq!(raw.get("dfs.replication").map(String::as_str), Some("1"));
        assert_eq!(
            raw.get("yarn.resourcemanager.hostname").map(String::as_str),
            Some("rm.local")
        );
        assert!(!raw.contains_key("orphan"));
    }

    #[test]
    fn missing_dir_yields_empty_config() {
        let src = HadoopConfDir::new("/definitely/not/a/hadoop/dir");
        assert!(src.load().unwrap().is_empty());
    }
}
