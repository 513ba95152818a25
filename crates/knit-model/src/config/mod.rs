//! Cluster connection parameters.
//!
//! Resolution order (later wins): built-in defaults, values inferred from discovered
//! Hadoop-style configuration, explicit [`Overrides`]. The result is immutable.
mod source;
pub use source::{ConfigSource, HadoopConfDir, host_port, parse_site_xml};

use std::{collections::BTreeMap, fmt};

use tracing::debug;

use crate::{ConfigError, DEFAULT_QUEUE, STAGING_DIR};

/// Flat `key -> value` map as found in `*-site.xml` files.
pub type RawConfig = BTreeMap<String, String>;

const DEFAULT_NN: &str = "localhost";
const DEFAULT_NN_PORT: u16 = 8020;
const DEFAULT_RM: &str = "localhost";
const DEFAULT_RM_PORT: u16 = 8088;
const DEFAULT_RM_PORT_HTTPS: u16 = 8090;
const DEFAULT_REPLICATION: u32 = 3;
const DEFAULT_MIN_ALLOCATION_MB: u64 = 1024;
const DEFAULT_LANG: &str = "C.UTF-8";

/// How requests to the resource manager's HTTP API authenticate.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMode {
    Anonymous,
    /// Pseudo/simple auth with anonymous access disabled.
    Simple { password: String },
    /// SPNEGO; credentials come from the ambient ticket cache.
    Kerberos,
}

impl fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::Anonymous => f.write_str("Anonymous"),
            AuthMode::Simple { .. } => f.write_str("Simple { password: <redacted> }"),
            AuthMode::Kerberos => f.write_str("Kerberos"),
        }
    }
}

/// Explicit caller-provided values. Every `Some` beats anything discovered.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub nn: Option<String>,
    pub nn_port: Option<u16>,
    pub rm: Option<String>,
    pub rm_port: Option<u16>,
    pub rm_port_https: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub replication_factor: Option<u32>,
    pub queue: Option<String>,
    pub lang: Option<String>,
    pub hdfs_home: Option<String>,
    pub gateway_path: Option<String>,
    /// Raw keys merged over the discovered map before inference.
    pub raw: RawConfig,
}

/// Resolved, read-only cluster configuration.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub nn: String,
    pub nn_port: Option<u16>,
    pub rm: String,
    pub rm_port: u16,
    pub rm_port_https: u16,
    /// REST calls must go over TLS (`yarn.http.policy = HTTPS_ONLY`).
    pub https_only: bool,
    pub user: String,
    pub auth: AuthMode,
    pub replication_factor: u32,
    pub queue: String,
    pub lang: String,
    /// Writable directory in the distributed store; staged files go under it.
    pub hdfs_home: String,
    /// Smallest container the scheduler hands out.
    pub min_allocation_mb: u64,
    /// Path prefix when the resource manager sits behind a gateway.
    pub gateway_path: String,
    raw: RawConfig,
}

impl ClusterConfig {
    /// Resolve a configuration from a discovered raw map and explicit overrides.
    pub fn resolve(discovered: RawConfig, overrides: Overrides) -> Result<Self, ConfigError> {
        let mut raw = discovered;
        raw.extend(overrides.raw.clone());

        let user = overrides
            .user
            .clone()
            .or_else(|| raw.get("user").cloned())
            .unwrap_or_else(current_user);

        let mut cfg = Self {
            nn: DEFAULT_NN.to_string(),
            nn_port: Some(DEFAULT_NN_PORT),
            rm: DEFAULT_RM.to_string(),
            rm_port: DEFAULT_RM_PORT,
            rm_port_https: DEFAULT_RM_PORT_HTTPS,
            https_only: false,
            hdfs_home: format!("/user/{user}"),
            user,
            auth: AuthMode::Anonymous,
            replication_factor: DEFAULT_REPLICATION,
            queue: DEFAULT_QUEUE.to_string(),
            lang: DEFAULT_LANG.to_string(),
            min_allocation_mb: DEFAULT_MIN_ALLOCATION_MB,
            gateway_path: String::new(),
            raw: RawConfig::new(),
        };
        cfg.infer(&raw)?;
        cfg.auth = detect_auth(&raw, overrides.password.clone())?;
        cfg.apply(overrides);
        cfg.raw = raw;

        debug!(
            rm = %cfg.rm,
            rm_port = cfg.rm_port,
            https = cfg.https_only,
            nn = %cfg.nn,
            auth = ?cfg.auth,
            "cluster configuration resolved"
        );
        Ok(cfg)
    }

    /// Resolve with nothing discovered; useful when every value is passed explicitly.
    pub fn from_overrides(overrides: Overrides) -> Result<Self, ConfigError> {
        Self::resolve(RawConfig::new(), overrides)
    }

    /// Fill typed fields from Hadoop-style keys.
    fn infer(&mut self, raw: &RawConfig) -> Result<(), ConfigError> {
        if let Some(fs) = raw.get("fs.defaultFS").filter(|v| v.starts_with("hdfs://")) {
            let (host, port) = host_port(fs)?;
            if !host.is_empty() {
                self.nn = host;
            }
            if port.is_some() {
                self.nn_port = port;
            }
        }
        if let Some(addr) = raw.get("dfs.namenode.rpc-address") {
            let (host, port) = host_port(addr)?;
            if !host.is_empty() {
                self.nn = host;
            }
            if port.is_some() {
                self.nn_port = port;
            }
        }
        if let Some(first) = raw
            .get("dfs.nameservices")
            .and_then(|v| v.split(',').next())
            .filter(|v| !v.is_empty())
        {
            self.nn = first.to_string();
            self.nn_port = None;
        }
        if let Some(r) = raw.get("dfs.replication") {
            self.replication_factor = parse_num("dfs.replication", r)?;
        }
        if let Some(addr) = raw.get("yarn.resourcemanager.webapp.address") {
            let (host, port) = host_port(addr)?;
            self.rm = host;
            self.rm_port = port.unwrap_or(DEFAULT_RM_PORT);
        } else if let Some(host) = raw.get("yarn.resourcemanager.hostname") {
            self.rm = host.clone();
        }
        if let Some(addr) = raw.get("yarn.resourcemanager.webapp.https.address") {
            let (host, port) = host_port(addr)?;
            self.rm = host;
            self.rm_port_https = port.unwrap_or(DEFAULT_RM_PORT_HTTPS);
        }
        self.https_only = raw
            .get("yarn.http.policy")
            .is_some_and(|p| p.eq_ignore_ascii_case("HTTPS_ONLY"));
        if let Some(m) = raw.get("yarn.scheduler.minimum-allocation-mb") {
            self.min_allocation_mb = parse_num("yarn.scheduler.minimum-allocation-mb", m)?;
        }
        if let Some(home) = raw.get("dfs.user.home.base.dir") {
            self.hdfs_home = home.clone();
        }
        if let Some(gw) = raw.get("gateway_path") {
            self.gateway_path = gw.clone();
        }
        Ok(())
    }

    fn apply(&mut self, o: Overrides) {
        if let Some(v) = o.nn {
            self.nn = v;
        }
        if let Some(v) = o.nn_port {
            self.nn_port = Some(v);
        }
        if let Some(v) = o.rm {
            self.rm = v;
        }
        if let Some(v) = o.rm_port {
            self.rm_port = v;
        }
        if let Some(v) = o.rm_port_https {
            self.rm_port_https = v;
        }
        if let Some(v) = o.replication_factor {
            self.replication_factor = v;
        }
        if let Some(v) = o.queue {
            self.queue = v;
        }
        if let Some(v) = o.lang {
            self.lang = v;
        }
        if let Some(v) = o.hdfs_home {
            self.hdfs_home = v;
        }
        if let Some(v) = o.gateway_path {
            self.gateway_path = v;
        }
    }

    /// Raw value for keys with no typed field.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.raw.get(key).map(String::as_str)
    }

    pub fn raw(&self) -> &RawConfig {
        &self.raw
    }

    /// `(scheme, host, port)` the REST client should talk to.
    pub fn rm_endpoint(&self) -> (&'static str, &str, u16) {
        if self.https_only {
            ("https", &self.rm, self.rm_port_https)
        } else {
            ("http", &self.rm, self.rm_port)
        }
    }

    /// Distributed directory where local files are uploaded before launch.
    pub fn staging_dir(&self) -> String {
        format!("{}/{}", self.hdfs_home.trim_end_matches('/'), STAGING_DIR)
    }
}

fn detect_auth(raw: &RawConfig, password: Option<String>) -> Result<AuthMode, ConfigError> {
    let kerberos = raw
        .get("hadoop.http.authentication.type")
        .is_some_and(|t| t.eq_ignore_ascii_case("kerberos"));
    if kerberos {
        return Ok(AuthMode::Kerberos);
    }
    let anonymous_denied = raw
        .get("hadoop.http.authentication.simple.anonymous.allowed")
        .is_some_and(|v| v.eq_ignore_ascii_case("false"));
    if !anonymous_denied {
        return Ok(AuthMode::Anonymous);
    }
    match password.or_else(|| raw.get("password").cloned()) {
        Some(password) => Ok(AuthMode::Simple { password }),
        None => Err(ConfigError::MissingPassword),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "root".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> RawConfig {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_when_nothing_discovered() {
        let cfg = ClusterConfig::from_overrides(Overrides {
            user: Some("alice".into()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(cfg.rm, "localhost");
        assert_eq!(cfg.rm_port, 8088);
        assert_eq!(cfg.rm_port_https, 8090);
        assert_eq!(cfg.nn_port, Some(8020));
        assert_eq!(cfg.replication_factor, 3);
        assert_eq!(cfg.min_allocation_mb, 1024);
        assert_eq!(cfg.hdfs_home, "/user/alice");
        assert_eq!(cfg.staging_dir(), "/user/alice/.knitDeps");
        assert_eq!(cfg.auth, AuthMode::Anonymous);
        assert_eq!(cfg.rm_endpoint(), ("http", "localhost", 8088));
    }

    #[test]
    fn webapp_address_beats_hostname() {
        let cfg = ClusterConfig::resolve(
            raw(&[
                ("yarn.resourcemanager.webapp.address", "priority1.com:1111"),
                ("yarn.resourcemanager.hostname", "priority2.com"),
            ]),
            Overrides::default(),
        )
        .unwrap();
        assert_eq!(cfg.rm, "priority1.com");
        assert_eq!(cfg.rm_port, 1111);

        let cfg = ClusterConfig::resolve(
            raw(&[("yarn.resourcemanager.hostname", "priority2.com")]),
            Overrides::default(),
        )
        .unwrap();
        assert_eq!(cfg.rm, "priority2.com");
        assert_eq!(cfg.rm_port, 8088);
    }

    #[test]
    fn https_policy_switches_endpoint() {
        let cfg = ClusterConfig::resolve(
            raw(&[
                ("yarn.resourcemanager.webapp.https.address", "secure.com:1111"),
                ("yarn.http.policy", "HTTPS_ONLY"),
            ]),
            Overrides::default(),
        )
        .unwrap();
        assert_eq!(cfg.rm_endpoint(), ("https", "secure.com", 1111));
    }

    #[test]
    fn namenode_inference_and_ha_override() {
        let cfg = ClusterConfig::resolve(
            raw(&[("fs.defaultFS", "hdfs://nn.example.com:9000"), ("dfs.replication", "1")]),
            Overrides::default(),
        )
        .unwrap();
        assert_eq!(cfg.nn, "nn.example.com");
        assert_eq!(cfg.nn_port, Some(9000));
        assert_eq!(cfg.replication_factor, 1);

        let cfg = ClusterConfig::resolve(
            raw(&[
                ("fs.defaultFS", "hdfs://nn.example.com:9000"),
                ("dfs.nameservices", "ha-cluster,other"),
            ]),
            Overrides::default(),
        )
        .unwrap();
        assert_eq!(cfg.nn, "ha-cluster");
        assert_eq!(cfg.nn_port, None);
    }

    #[test]
    fn overrides_win_over_discovery() {
        let cfg = ClusterConfig::resolve(
            raw(&[("yarn.resourcemanager.webapp.address", "found.com:1111")]),
            Overrides {
                rm: Some("e".into()),
                rm_port: Some(27182),
                replication_factor: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(cfg.rm, "e");
        assert_eq!(cfg.rm_port, 27182);
        assert_eq!(cfg.replication_factor, 1);
        assert_eq!(
            cfg.get("yarn.resourcemanager.webapp.address"),
            Some("found.com:1111")
        );
    }

    #[test]
    fn simple_auth_without_password_is_rejected() {
        let denied = raw(&[("hadoop.http.authentication.simple.anonymous.allowed", "false")]);
        let err = ClusterConfig::resolve(denied.clone(), Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingPassword));

        let cfg = ClusterConfig::resolve(
            denied,
            Overrides {
                password: Some("secret".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(
            cfg.auth,
            AuthMode::Simple {
                password: "secret".into()
            }
        );
        assert!(!format!("{:?}", cfg.auth).contains("secret"));
    }

    #[test]
    fn kerberos_needs_no_password() {
        let cfg = ClusterConfig::resolve(
            raw(&[
                ("hadoop.http.authentication.type", "kerberos"),
                ("hadoop.http.authentication.simple.anonymous.allowed", "false"),
            ]),
            Overrides::default(),
        )
        .unwrap();
        assert_eq!(cfg.auth, AuthMode::Kerberos);
    }

    #[test]
    fn malformed_numbers_are_config_errors() {
        let err = ClusterConfig::resolve(
            raw(&[("dfs.replication", "three")]),
            Overrides::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
