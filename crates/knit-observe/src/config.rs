use std::io::IsTerminal;

use serde::{Deserialize, Serialize};

use crate::{LoggerFormat, LoggerLevel};

/// Logger settings; every field has a default so partial documents deserialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` expression, e.g. `"info"` or `"knit_core=debug,info"`.
    pub level: LoggerLevel,
    /// Include the event target (module path).
    pub with_targets: bool,
    /// Colorize text output; ignored unless stdout is a terminal.
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::default(),
            level: LoggerLevel::default(),
            with_targets: true,
            use_color: true,
        }
    }
}

impl LoggerConfig {
    pub fn should_use_color(&self) -> bool {
        self.use_color && std::io::stdout().is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LoggerConfig::default();
        assert_eq!(config.format, LoggerFormat::Text);
        assert_eq!(config.level.as_str(), "info");
        assert!(config.with_targets);
        assert!(config.use_color);
    }

    #[test]
    fn partial_document_uses_defaults() {
        let config: LoggerConfig =
            serde_json::from_str(r#"{"format": "json", "level": "knit_core=debug"}"#).unwrap();
        assert_eq!(config.format, LoggerFormat::Json);
        assert_eq!(config.level.as_str(), "knit_core=debug");
        assert!(config.with_targets);
    }

    #[test]
    fn invalid_level_fails_deserialization() {
        let res = serde_json::from_str::<LoggerConfig>(r#"{"level": "knit_core=loud"}"#);
        assert!(res.is_err());
    }
}
