// Application settings

use crate::env::EnvLoader;
use crate::loader::ConfigLoader;
use crate::validation::{ConfigValidator, Validate};
use crate::{ConfigError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// File looked up in the working directory by [`AppConfig::load_default`].
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Deployment mode. Selects the matching overlay section and the default log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunMode {
    #[default]
    Dev,
    Test,
    Prod,
}

impl RunMode {
    /// Key of the overlay section for this mode.
    pub fn section(&self) -> &'static str {
        match self {
            RunMode::Dev => "DEV",
            RunMode::Test => "TEST",
            RunMode::Prod => "PROD",
        }
    }

    pub fn default_log_level(&self) -> LogLevel {
        match self {
            RunMode::Dev | RunMode::Test => LogLevel::Info,
            RunMode::Prod => LogLevel::Error,
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section())
    }
}

/// Minimum severity that gets logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
    #[serde(alias = "none")]
    Off,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "off" | "none" => Ok(LogLevel::Off),
            other => Err(ConfigError::ParseError(format!(
                "unknown log level: {}",
                other
            ))),
        }
    }
}

/// Settings of a Shallot application.
///
/// Keys are `SCREAMING_SNAKE_CASE`. A `DEV`, `TEST` or `PROD` section, when
/// present, is laid over the top level for the active [`RunMode`], and
/// `SHALLOT_*` environment variables are laid over both.
///
/// ```json
/// {
///     // comments are allowed
///     "APP_NAME": "blog",
///     "RUN_MODE": "PROD",
///     "HTTP_PORT": 8080,
///     "PROD": { "LOG_LEVEL": "warn" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct AppConfig {
    pub app_name: String,
    pub run_mode: RunMode,
    #[serde(alias = "WORKDIR", skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
    #[serde(alias = "LOGDIR", skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,
    pub http_addr: String,
    pub http_port: u16,
    pub url_prefix: String,
    /// Compress responses for clients that accept gzip.
    pub enable_gzip: bool,
    /// Compress even when the client did not ask for it.
    pub force_gzip: bool,
    pub custom: Map<String, Value>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "Shallot".to_string(),
            run_mode: RunMode::Dev,
            work_dir: None,
            log_dir: None,
            log_level: None,
            http_addr: "0.0.0.0".to_string(),
            http_port: 3000,
            url_prefix: String::new(),
            enable_gzip: true,
            force_gzip: false,
            custom: Map::new(),
        }
    }
}

impl AppConfig {
    /// Load from an explicit file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let value = ConfigLoader::auto(path)?.load_file(path)?;
        Self::resolve(value, &EnvLoader::default())
    }

    /// Load `./config.json` when it exists, else start from the built-in
    /// defaults. A `.env` file, if any, is read first.
    pub fn load_default() -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = Path::new(DEFAULT_CONFIG_FILE);
        let value = if path.exists() {
            ConfigLoader::auto(path)?.load_file(path)?
        } else {
            Value::Object(Map::new())
        };
        Self::resolve(value, &EnvLoader::default())
    }

    /// Build from an already parsed document. The environment is not consulted.
    pub fn from_value(value: Value) -> Result<Self> {
        let config: AppConfig = serde_json::from_value(overlay_mode(value)?)
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `env` before picking the mode section (so `SHALLOT_RUN_MODE`
    /// selects it) and again afterwards (so variables win over the section).
    pub fn resolve(value: Value, env: &EnvLoader) -> Result<Self> {
        let overrides = env.load();
        let mut value = value;
        merge(&mut value, overrides.clone());
        let mut value = overlay_mode(value)?;
        merge(&mut value, overrides);
        Self::from_value(value)
    }

    /// Effective log level: explicit, else the run mode's default.
    pub fn log_level(&self) -> LogLevel {
        self.log_level
            .unwrap_or_else(|| self.run_mode.default_log_level())
    }

    /// Working directory: explicit, else the process's current directory.
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Log directory: explicit, else `<work dir>/log` in production. `None`
    /// means log to the console.
    pub fn log_dir(&self) -> Option<PathBuf> {
        match (&self.log_dir, self.run_mode) {
            (Some(dir), _) => Some(dir.clone()),
            (None, RunMode::Prod) => Some(self.work_dir().join("log")),
            (None, _) => None,
        }
    }

    /// `HTTP_ADDR:HTTP_PORT`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.http_addr, self.http_port)
    }

    /// Deserialize one entry of the `CUSTOM` map.
    pub fn custom<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.custom
            .get(key)
            .map(|v| {
                serde_json::from_value(v.clone())
                    .map_err(|e| ConfigError::DeserializationError(format!("{}: {}", key, e)))
            })
            .transpose()
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        ConfigValidator::not_empty(&self.app_name, "APP_NAME")?;
        ConfigValidator::is_port(self.http_port, "HTTP_PORT")?;
        ConfigValidator::is_url_prefix(&self.url_prefix, "URL_PREFIX")?;
        Ok(())
    }
}

fn merge(target: &mut Value, overrides: Map<String, Value>) {
    if overrides.is_empty() {
        return;
    }
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(map) = target {
        map.extend(overrides);
    }
}

/// Lift the active mode's section onto the top level and drop every section.
fn overlay_mode(value: Value) -> Result<Value> {
    let mut map = match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(ConfigError::ParseError(format!(
                "configuration root must be an object, got {}",
                other
            )))
        }
    };

    let mode: RunMode = match map.get("RUN_MODE") {
        Some(raw) => serde_json::from_value(raw.clone())
            .map_err(|e| ConfigError::DeserializationError(format!("RUN_MODE: {}", e)))?,
        None => RunMode::default(),
    };

    let mut sections = Map::new();
    for key in [RunMode::Dev, RunMode::Test, RunMode::Prod].map(|m| m.section()) {
        if let Some(section) = map.remove(key) {
            sections.insert(key.to_string(), section);
        }
    }

    match sections.remove(mode.section()) {
        Some(Value::Object(section)) => map.extend(section),
        Some(Value::Null) | None => {}
        Some(other) => {
            return Err(ConfigError::ParseError(format!(
                "{} section must be an object, got {}",
                mode.section(),
                other
            )))
        }
    }

    Ok(Value::Object(map))
}
