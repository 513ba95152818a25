use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown application state: {0}")]
    UnknownState(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("invalid environment entry '{key}': {reason}")]
    InvalidEnv { key: String, reason: &'static str },

    #[error("invalid model: {0}")]
    Invalid(String),
}

pub type ModelResult<T> = Result<T, ModelError>;

/// Failure to resolve a usable cluster configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("simple auth required: please supply `password`")]
    MissingPassword,

    #[error("invalid value for '{key}': {value}")]
    InvalidValue { key: String, value: String },

    #[error("failed to read configuration file {path}: {reason}")]
    Read { path: String, reason: String },
}
