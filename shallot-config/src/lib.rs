//! Configuration for Shallot applications.
//!
//! [`AppConfig`] is read from a JSON (comments allowed), TOML or `.env` file,
//! the section of the active [`RunMode`] is laid over the top level, and
//! `SHALLOT_*` environment variables override the result.

pub mod app_config;
pub mod env;
pub mod error;
pub mod loader;
pub mod validation;

pub use app_config::{AppConfig, DEFAULT_CONFIG_FILE, LogLevel, RunMode};
pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use validation::{ConfigValidator, Validate};
