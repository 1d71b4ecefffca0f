//! Logging for Shallot applications
//!
//! Two pieces live here:
//!
//! - [`LogConfig`] sets up the process-wide `tracing` subscriber (JSON, plain,
//!   pretty or compact output to stdout, stderr, a file, or rolling files).
//! - [`Logger`] is the service bound into every application container, so
//!   handlers can ask for it like any other dependency.
//!
//! ```no_run
//! use shallot_core::logging::*;
//!
//! let _guard = LogConfig::new()
//!     .level(LogLevel::Debug)
//!     .format(LogFormat::Pretty)
//!     .init()
//!     .expect("logging");
//!
//! info!("Application started");
//! ```
//!
//! ```no_run
//! use shallot_core::logging::*;
//!
//! let _guard = LogConfig::new()
//!     .output(LogOutput::RollingFile {
//!         directory: "logs".to_string(),
//!         prefix: "app".to_string(),
//!         rotation: Rotation::Daily,
//!     })
//!     .init()
//!     .expect("logging");
//! ```

use crate::Error;
use shallot_config::AppConfig;
use std::io;
use std::sync::Arc;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use shallot_config::LogLevel;
pub use tracing::{debug, error, info, info_span, trace, warn};

/// Convert to a tracing level. `Off` has none.
pub fn tracing_level(level: LogLevel) -> Option<Level> {
    match level {
        LogLevel::Trace => Some(Level::TRACE),
        LogLevel::Debug => Some(Level::DEBUG),
        LogLevel::Info => Some(Level::INFO),
        LogLevel::Warn => Some(Level::WARN),
        LogLevel::Error => Some(Level::ERROR),
        LogLevel::Off => None,
    }
}

/// Output format for log messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON format (default) - structured, machine-readable
    Json,
    /// Plain text format - simple, human-readable
    Plain,
    /// Pretty format - colored, formatted for development
    Pretty,
    Compact,
}

/// Output destination for logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// Append to a single file
    File(String),
    RollingFile {
        directory: String,
        prefix: String,
        rotation: Rotation,
    },
}

/// File rotation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Minutely,
    Hourly,
    Daily,
    Never,
}

impl Rotation {
    fn to_tracing_rotation(self) -> tracing_appender::rolling::Rotation {
        match self {
            Rotation::Minutely => tracing_appender::rolling::Rotation::MINUTELY,
            Rotation::Hourly => tracing_appender::rolling::Rotation::HOURLY,
            Rotation::Daily => tracing_appender::rolling::Rotation::DAILY,
            Rotation::Never => tracing_appender::rolling::Rotation::NEVER,
        }
    }
}

/// Subscriber configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    pub thread_ids: bool,
    /// Include target (module path)
    pub targets: bool,
    pub file_line: bool,
    /// Include span information
    pub spans: bool,
    /// Enable ANSI colors (for terminal output)
    pub colors: bool,
    /// Custom environment filter (overrides level if set)
    pub env_filter: Option<String>,
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive from application settings: the configured level, and daily
    /// rolling files named after the app when a log directory is set.
    pub fn from_app_config(config: &AppConfig) -> Self {
        let output = match config.log_dir() {
            Some(dir) => LogOutput::RollingFile {
                directory: dir.to_string_lossy().into_owned(),
                prefix: config.app_name.to_lowercase(),
                rotation: Rotation::Daily,
            },
            None => LogOutput::Stdout,
        };

        let format = match output {
            LogOutput::Stdout | LogOutput::Stderr => LogFormat::Plain,
            _ => LogFormat::Json,
        };

        Self {
            level: config.log_level(),
            format,
            output,
            ..Self::default()
        }
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_thread_ids(mut self, enable: bool) -> Self {
        self.thread_ids = enable;
        self
    }

    pub fn with_targets(mut self, enable: bool) -> Self {
        self.targets = enable;
        self
    }

    pub fn with_file_line(mut self, enable: bool) -> Self {
        self.file_line = enable;
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.spans = enable;
        self
    }

    pub fn with_colors(mut self, enable: bool) -> Self {
        self.colors = enable;
        self
    }

    /// Set custom environment filter, e.g. `"shallot_core=debug,hyper=info"`.
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Install the global subscriber.
    ///
    /// Keep the returned guard alive for the life of the program; dropping it
    /// flushes the non-blocking writer. `Ok(None)` means logging is off.
    pub fn init(self) -> Result<Option<WorkerGuard>, Error> {
        if self.level == LogLevel::Off && self.env_filter.is_none() {
            return Ok(None);
        }

        let env_filter = match &self.env_filter {
            Some(filter) => EnvFilter::try_new(filter)
                .map_err(|e| Error::Internal(format!("invalid log filter {:?}: {}", filter, e)))?,
            None => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.level.as_str())),
        };

        let guard = match &self.output {
            LogOutput::Stdout => {
                let (writer, guard) = tracing_appender::non_blocking(io::stdout());
                self.init_with_writer(writer, env_filter)?;
                guard
            }
            LogOutput::Stderr => {
                let (writer, guard) = tracing_appender::non_blocking(io::stderr());
                self.init_with_writer(writer, env_filter)?;
                guard
            }
            LogOutput::File(path) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                let (writer, guard) = tracing_appender::non_blocking(file);
                self.init_with_writer(writer, env_filter)?;
                guard
            }
            LogOutput::RollingFile {
                directory,
                prefix,
                rotation,
            } => {
                std::fs::create_dir_all(directory)?;
                let appender = tracing_appender::rolling::RollingFileAppender::new(
                    rotation.to_tracing_rotation(),
                    directory,
                    prefix,
                );
                let (writer, guard) = tracing_appender::non_blocking(appender);
                self.init_with_writer(writer, env_filter)?;
                guard
            }
        };

        Ok(Some(guard))
    }

    fn init_with_writer<W>(&self, writer: W, env_filter: EnvFilter) -> Result<(), Error>
    where
        W: for<'a> tracing_subscriber::fmt::MakeWriter<'a> + Send + Sync + 'static,
    {
        let fmt_span = if self.spans {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let registry = tracing_subscriber::registry().with(env_filter);

        let result = match self.format {
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(writer)
                        .with_current_span(self.spans)
                        .with_span_list(self.spans)
                        .with_target(self.targets)
                        .with_thread_ids(self.thread_ids)
                        .with_file(self.file_line)
                        .with_line_number(self.file_line)
                        .with_span_events(fmt_span),
                )
                .try_init(),
            LogFormat::Plain => registry
                .with(
                    fmt::layer()
                        .with_writer(writer)
                        .with_target(self.targets)
                        .with_thread_ids(self.thread_ids)
                        .with_file(self.file_line)
                        .with_line_number(self.file_line)
                        .with_ansi(self.colors)
                        .with_span_events(fmt_span),
                )
                .try_init(),
            LogFormat::Pretty => registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_writer(writer)
                        .with_target(self.targets)
                        .with_thread_ids(self.thread_ids)
                        .with_file(self.file_line)
                        .with_line_number(self.file_line)
                        .with_ansi(self.colors)
                        .with_span_events(fmt_span),
                )
                .try_init(),
            LogFormat::Compact => registry
                .with(
                    fmt::layer()
                        .compact()
                        .with_writer(writer)
                        .with_target(self.targets)
                        .with_thread_ids(self.thread_ids)
                        .with_ansi(self.colors)
                        .with_span_events(fmt_span),
                )
                .try_init(),
        };

        result.map_err(|e| Error::Internal(format!("failed to install log subscriber: {}", e)))
    }
}

impl Default for LogConfig {
    /// JSON to stdout at info
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
            output: LogOutput::Stdout,
            thread_ids: false,
            targets: true,
            file_line: false,
            spans: false,
            colors: false,
            env_filter: None,
        }
    }
}

/// Injectable application logger.
///
/// Carries the application name and a minimum level; messages below the
/// level are dropped before they reach `tracing`.
#[derive(Debug, Clone)]
pub struct Logger {
    app_name: Arc<str>,
    level: LogLevel,
}

impl Logger {
    pub fn new(app_name: impl Into<Arc<str>>, level: LogLevel) -> Self {
        Self {
            app_name: app_name.into(),
            level,
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(config.app_name.as_str(), config.log_level())
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::Off && self.level != LogLevel::Off && level >= self.level
    }

    pub fn log(&self, level: LogLevel, message: impl AsRef<str>) {
        if !self.enabled(level) {
            return;
        }
        let app = &*self.app_name;
        let message = message.as_ref();
        match level {
            LogLevel::Trace => trace!(app, "{}", message),
            LogLevel::Debug => debug!(app, "{}", message),
            LogLevel::Info => info!(app, "{}", message),
            LogLevel::Warn => warn!(app, "{}", message),
            LogLevel::Error => error!(app, "{}", message),
            LogLevel::Off => {}
        }
    }

    pub fn trace(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Trace, message);
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new("Shallot", LogLevel::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(tracing_level(LogLevel::Trace), Some(Level::TRACE));
        assert_eq!(tracing_level(LogLevel::Error), Some(Level::ERROR));
        assert_eq!(tracing_level(LogLevel::Off), None);
    }

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, LogLevel::Info);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.output, LogOutput::Stdout);
        assert!(config.targets);
    }

    #[test]
    fn test_config_builder() {
        let config = LogConfig::new()
            .level(LogLevel::Debug)
            .format(LogFormat::Pretty)
            .with_colors(true)
            .with_targets(false);

        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.colors);
        assert!(!config.targets);
    }

    #[test]
    fn test_off_installs_nothing() {
        let guard = LogConfig::new().level(LogLevel::Off).init().unwrap();
        assert!(guard.is_none());
    }

    #[test]
    fn test_from_app_config_prod_uses_rolling_files() {
        let app = AppConfig::from_value(json!({
            "APP_NAME": "Blog",
            "RUN_MODE": "PROD",
            "WORK_DIR": "/srv/blog"
        }))
        .unwrap();

        let config = LogConfig::from_app_config(&app);
        assert_eq!(config.level, LogLevel::Error);
        assert_eq!(
            config.output,
            LogOutput::RollingFile {
                directory: "/srv/blog/log".to_string(),
                prefix: "blog".to_string(),
                rotation: Rotation::Daily,
            }
        );
    }

    #[test]
    fn test_from_app_config_dev_logs_to_stdout() {
        let app = AppConfig::from_value(json!({})).unwrap();
        let config = LogConfig::from_app_config(&app);
        assert_eq!(config.output, LogOutput::Stdout);
        assert_eq!(config.format, LogFormat::Plain);
    }

    #[test]
    fn test_logger_threshold() {
        let logger = Logger::new("demo", LogLevel::Warn);
        assert!(!logger.enabled(LogLevel::Info));
        assert!(logger.enabled(LogLevel::Warn));
        assert!(logger.enabled(LogLevel::Error));
        assert!(!logger.enabled(LogLevel::Off));

        let silent = Logger::new("demo", LogLevel::Off);
        assert!(!silent.enabled(LogLevel::Error));
    }
}
