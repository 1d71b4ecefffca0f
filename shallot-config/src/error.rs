// Configuration errors

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No loader for the file's extension (`.json`, `.toml` and `.env` are known).
    #[error("unsupported config file {}: {reason}", path.display())]
    UnsupportedFormat { path: PathBuf, reason: String },

    #[error("invalid config document: {0}")]
    ParseError(String),

    /// A key held a value outside its allowed range, e.g. `HTTP_PORT = 0`.
    #[error("invalid config value: {0}")]
    ValidationError(String),

    #[error("config value has the wrong shape: {0}")]
    DeserializationError(String),

    #[error("environment variable {key}: {source}")]
    EnvError {
        key: String,
        #[source]
        source: std::env::VarError,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
