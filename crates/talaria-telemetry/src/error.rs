//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while setting up logging.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The logger could not be built or installed.
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),

    /// A configuration value was rejected.
    #[error("invalid telemetry configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TelemetryError::LoggingInit("global default already set".to_string());
        assert_eq!(
            err.to_string(),
            "failed to initialize logging: global default already set"
        );

        let err = TelemetryError::InvalidConfig("unknown log writer".to_string());
        assert!(err.to_string().contains("unknown log writer"));
    }
}
