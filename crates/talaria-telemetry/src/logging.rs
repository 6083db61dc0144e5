//! Structured logging for Talaria.
//!
//! Loggers are built as values rather than installed implicitly: a
//! [`Logger`] wraps a [`tracing::Dispatch`] that can be handed to a
//! dispatcher, installed as the process-wide default, or both.
//!
//! # Example
//!
//! ```rust
//! use talaria_telemetry::logging::{LogConfig, Logger};
//!
//! let logger = Logger::build(&LogConfig::production()).unwrap();
//! tracing::dispatcher::with_default(logger.dispatch(), || {
//!     tracing::info!(route = "/api/echo", "route registered");
//! });
//! ```

use tracing::Dispatch;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogWriter {
    /// Standard output.
    #[default]
    Stdout,
    /// Standard error.
    Stderr,
}

impl LogWriter {
    /// Parses `stdout` or `stderr`, ignoring ASCII case.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::InvalidConfig`] for anything else.
    pub fn parse(name: &str) -> TelemetryResult<Self> {
        match name.to_ascii_lowercase().as_str() {
            "stdout" => Ok(Self::Stdout),
            "stderr" => Ok(Self::Stderr),
            other => Err(TelemetryError::InvalidConfig(format!(
                "unknown log writer '{other}', expected stdout or stderr"
            ))),
        }
    }

    fn make_writer(self) -> BoxMakeWriter {
        match self {
            Self::Stdout => BoxMakeWriter::new(std::io::stdout),
            Self::Stderr => BoxMakeWriter::new(std::io::stderr),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether logging is enabled. A disabled logger drops every event.
    pub enabled: bool,

    /// Filter directive, e.g. `info` or `talaria_core=debug,hyper=warn`.
    pub level: String,

    /// Whether to output JSON format.
    pub json_format: bool,

    /// Output stream.
    pub writer: LogWriter,

    /// Whether to include span events (new, close).
    pub span_events: bool,

    /// Whether to include file/line info.
    pub file_line_info: bool,

    /// Whether to include thread IDs.
    pub thread_ids: bool,

    /// Whether to include target (module path).
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LogConfig {
    /// Human-readable output at debug level.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            level: "debug".to_string(),
            json_format: false,
            writer: LogWriter::Stdout,
            span_events: true,
            file_line_info: true,
            thread_ids: false,
            include_target: true,
        }
    }

    /// JSON output at info level.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            writer: LogWriter::Stdout,
            span_events: false,
            file_line_info: false,
            thread_ids: false,
            include_target: true,
        }
    }
}

/// A configured log sink.
#[derive(Debug, Clone)]
pub struct Logger {
    dispatch: Dispatch,
}

impl Logger {
    /// Builds a logger from `config` without installing it anywhere.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::LoggingInit`] if the level directive does
    /// not parse.
    pub fn build(config: &LogConfig) -> TelemetryResult<Self> {
        if !config.enabled {
            return Ok(Self::disabled());
        }

        let filter = create_env_filter(&config.level)?;

        let span_events = if config.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let writer = config.writer.make_writer();

        let layer: Box<dyn Layer<Registry> + Send + Sync> = if config.json_format {
            tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(span_events)
                .with_file(config.file_line_info)
                .with_line_number(config.file_line_info)
                .with_thread_ids(config.thread_ids)
                .with_target(config.include_target)
                .with_writer(writer)
                .with_filter(filter)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_span_events(span_events)
                .with_file(config.file_line_info)
                .with_line_number(config.file_line_info)
                .with_thread_ids(config.thread_ids)
                .with_target(config.include_target)
                .with_writer(writer)
                .with_filter(filter)
                .boxed()
        };

        Ok(Self {
            dispatch: Dispatch::new(tracing_subscriber::registry().with(layer)),
        })
    }

    /// A logger that discards everything.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            dispatch: Dispatch::none(),
        }
    }

    /// Returns the underlying dispatch, for injection.
    #[must_use]
    pub const fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Consumes the logger, returning the dispatch.
    #[must_use]
    pub fn into_dispatch(self) -> Dispatch {
        self.dispatch
    }

    /// Installs this logger as the process-wide default.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::LoggingInit`] if a global default is
    /// already set.
    pub fn install_global(&self) -> TelemetryResult<()> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))
    }
}

/// Builds a logger from `config` and installs it globally.
///
/// The returned logger shares the same sink and can also be injected.
///
/// # Errors
///
/// Returns [`TelemetryError::LoggingInit`] if the config is invalid or a
/// global default is already set.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<Logger> {
    let logger = Logger::build(config)?;
    if config.enabled {
        logger.install_global()?;
    }
    Ok(logger)
}

/// Creates an env filter from a directive string.
///
/// # Errors
///
/// Returns [`TelemetryError::LoggingInit`] if the directive is invalid.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter)
        .map_err(|e| TelemetryError::LoggingInit(format!("invalid log level '{filter}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_production() {
        let config = LogConfig::default();
        assert!(config.enabled);
        assert!(config.json_format);
        assert_eq!(config.level, "info");
        assert_eq!(config.writer, LogWriter::Stdout);
    }

    #[test]
    fn test_development_config() {
        let config = LogConfig::development();
        assert!(!config.json_format);
        assert!(config.span_events);
        assert!(config.file_line_info);
        assert_eq!(config.level, "debug");
    }

    #[test]
    fn test_writer_parse() {
        assert_eq!(LogWriter::parse("STDERR").unwrap(), LogWriter::Stderr);
        assert_eq!(LogWriter::parse("stdout").unwrap(), LogWriter::Stdout);
        assert!(matches!(
            LogWriter::parse("syslog"),
            Err(TelemetryError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_build_json_and_pretty() {
        assert!(Logger::build(&LogConfig::production()).is_ok());
        assert!(Logger::build(&LogConfig::development()).is_ok());

        let stderr = LogConfig {
            writer: LogWriter::Stderr,
            ..LogConfig::production()
        };
        assert!(Logger::build(&stderr).is_ok());
    }

    #[test]
    fn test_invalid_level() {
        let config = LogConfig {
            level: "talaria=loudest".to_string(),
            ..LogConfig::default()
        };
        assert!(matches!(
            Logger::build(&config),
            Err(TelemetryError::LoggingInit(_))
        ));
    }

    #[test]
    fn test_disabled_logger_is_silent() {
        let config = LogConfig {
            enabled: false,
            ..LogConfig::default()
        };
        let logger = Logger::build(&config).unwrap();
        tracing::dispatcher::with_default(logger.dispatch(), || {
            assert!(!tracing::enabled!(tracing::Level::ERROR));
        });

        // Disabled logging never touches the global default.
        assert!(init_logging(&config).is_ok());
    }
}
