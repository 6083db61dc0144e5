//! Top-level configuration type.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, CorsSection, DispatchSection, LogFormat, LoggingSection, ServerSection};

/// Complete Talaria configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use talaria_config::TalariaConfig;
///
/// let config = TalariaConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
/// assert_eq!(config.dispatch.route_prefix, "/api");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct TalariaConfig {
    /// HTTP transport settings.
    #[serde(default)]
    pub server: ServerSection,

    /// Dispatcher settings.
    #[serde(default)]
    pub dispatch: DispatchSection,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSection,
}

impl TalariaConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> TalariaConfigBuilder {
        TalariaConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - `server.http_addr` is not a socket address
    /// - `server.request_timeout_ms` or `server.max_body_size` is zero
    /// - `server.cors` is enabled without origins, names an unknown
    ///   method, or pairs a wildcard origin with credentials
    /// - `dispatch.max_call_depth` is zero
    /// - `dispatch.route_prefix` does not start with `/`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .server
            .http_addr
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "server.request_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.server.max_body_size == 0 {
            return Err(ConfigError::invalid_value(
                "server.max_body_size",
                "must be greater than zero",
            ));
        }

        let cors = &self.server.cors;
        if cors.enabled {
            if cors.allowed_origins.is_empty() {
                return Err(ConfigError::invalid_value(
                    "server.cors.allowed_origins",
                    "must list at least one origin when CORS is enabled",
                ));
            }
            if let Some(method) = cors.invalid_methods().first() {
                return Err(ConfigError::invalid_value(
                    "server.cors.allowed_methods",
                    format!("not an HTTP method: {method}"),
                ));
            }
            if cors.allow_credentials && cors.allowed_origins.iter().any(|o| o == "*") {
                return Err(ConfigError::invalid_value(
                    "server.cors.allow_credentials",
                    "cannot be combined with a wildcard origin",
                ));
            }
        }

        if self.dispatch.max_call_depth == 0 {
            return Err(ConfigError::invalid_value(
                "dispatch.max_call_depth",
                "must be greater than zero",
            ));
        }

        if !self.dispatch.route_prefix.starts_with('/') {
            return Err(ConfigError::invalid_value(
                "dispatch.route_prefix",
                format!("must start with '/': {}", self.dispatch.route_prefix),
            ));
        }

        Ok(())
    }

    /// Development preset: pretty logs at debug level with locations, and
    /// a permissive CORS policy.
    ///
    /// # Example
    ///
    /// ```
    /// use talaria_config::TalariaConfig;
    ///
    /// let config = TalariaConfig::development();
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config.logging.include_location = true;
        config.server.cors = CorsSection::permissive();
        config
    }

    /// Production preset: JSON logs at info level.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;
        config.logging.include_location = false;
        config
    }
}

/// Builder for [`TalariaConfig`].
#[derive(Debug, Default)]
pub struct TalariaConfigBuilder {
    server: Option<ServerSection>,
    dispatch: Option<DispatchSection>,
    logging: Option<LoggingSection>,
}

impl TalariaConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server section.
    #[must_use]
    pub fn server(mut self, server: ServerSection) -> Self {
        self.server = Some(server);
        self
    }

    /// Set the dispatch section.
    #[must_use]
    pub fn dispatch(mut self, dispatch: DispatchSection) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Set the logging section.
    #[must_use]
    pub fn logging(mut self, logging: LoggingSection) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Build the configuration. Unset sections use their defaults.
    #[must_use]
    pub fn build(self) -> TalariaConfig {
        TalariaConfig {
            server: self.server.unwrap_or_default(),
            dispatch: self.dispatch.unwrap_or_default(),
            logging: self.logging.unwrap_or_default(),
        }
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if validation fails.
    pub fn build_validated(self) -> Result<TalariaConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TalariaConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_builder_keeps_defaults_for_unset_sections() {
        let config = TalariaConfig::builder()
            .server(ServerSection {
                http_addr: "127.0.0.1:3000".to_string(),
                ..Default::default()
            })
            .build();

        assert_eq!(config.server.http_addr, "127.0.0.1:3000");
        assert_eq!(config.dispatch, DispatchSection::default());
    }

    #[test]
    fn test_validate_rejects_bad_address() {
        let result = TalariaConfig::builder()
            .server(ServerSection {
                http_addr: "localhost".to_string(),
                ..Default::default()
            })
            .build_validated();

        assert!(matches!(result, Err(ConfigError::InvalidValue { field, .. }) if field == "server.http_addr"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = TalariaConfig::default();
        config.server.request_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_body_limit() {
        let mut config = TalariaConfig::default();
        config.server.max_body_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { field, .. }) if field == "server.max_body_size"));
    }

    #[test]
    fn test_validate_cors() {
        let mut config = TalariaConfig::default();
        config.server.cors.enabled = true;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { field, .. }) if field == "server.cors.allowed_origins"));

        config.server.cors.allowed_origins = vec!["https://app.example.com".to_string()];
        assert!(config.validate().is_ok());

        config.server.cors.allowed_methods.push("BAD METHOD".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { field, .. }) if field == "server.cors.allowed_methods"));
        config.server.cors.allowed_methods.pop();

        config.server.cors.allowed_origins = vec!["*".to_string()];
        config.server.cors.allow_credentials = true;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { field, .. }) if field == "server.cors.allow_credentials"));
    }

    #[test]
    fn test_validate_rejects_zero_depth() {
        let mut config = TalariaConfig::default();
        config.dispatch.max_call_depth = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { field, .. }) if field == "dispatch.max_call_depth"));
    }

    #[test]
    fn test_validate_rejects_relative_prefix() {
        let mut config = TalariaConfig::default();
        config.dispatch.route_prefix = "api".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_presets() {
        let dev = TalariaConfig::development();
        assert_eq!(dev.logging.format, LogFormat::Pretty);
        assert!(dev.logging.include_location);
        assert!(dev.server.cors.enabled);
        assert!(dev.validate().is_ok());

        let prod = TalariaConfig::production();
        assert_eq!(prod.logging.level, "info");
        assert_eq!(prod.logging.format, LogFormat::Json);
        assert!(!prod.server.cors.enabled);
    }
}
