//! Structured logging for Talaria.
//!
//! Every dispatcher takes its logger as a value. This crate builds those
//! values from a [`LogConfig`]: JSON lines for production, pretty output
//! for development, written to stdout or stderr and filtered with an
//! `EnvFilter` directive.
//!
//! # Example
//!
//! ```rust,ignore
//! use talaria_telemetry::{init_logging, LogConfig};
//!
//! let logger = init_logging(&LogConfig::production())?;
//! let dispatcher = talaria_core::Dispatcher::new(logger.into_dispatch());
//! ```

#![doc(html_root_url = "https://docs.rs/talaria-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, LogConfig, LogWriter, Logger};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
