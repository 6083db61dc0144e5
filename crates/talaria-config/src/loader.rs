//! Layered configuration loader.
//!
//! Layers are applied in order, later ones overriding earlier ones:
//! 1. Built-in defaults (or a preset)
//! 2. Configuration file (TOML or JSON)
//! 3. `.env` file
//! 4. Environment variables `PREFIX__SECTION__KEY`

use std::env;
use std::fs;
use std::path::Path;

use crate::{ConfigError, LogFormat, LogTarget, TalariaConfig};

/// Configuration loader with layered approach.
///
/// # Example
///
/// ```no_run
/// use talaria_config::ConfigLoader;
///
/// # fn main() -> Result<(), talaria_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("talaria.toml")?
///     .with_dotenv()?
///     .with_env_prefix("TALARIA")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: TalariaConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new loader starting from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: TalariaConfig::default(),
            env_prefix: None,
        }
    }

    /// Start from the development preset.
    ///
    /// ```
    /// use talaria_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = TalariaConfig::development();
        self
    }

    /// Start from the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = TalariaConfig::production();
        self
    }

    /// Load configuration from a file. The format follows the extension
    /// (`.toml` or `.json`).
    ///
    /// Sections the file names replace the current ones; each field missing
    /// from a named section takes its default.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable, in an
    /// unsupported format, malformed, or contains unknown fields.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;

        self.config = parse(&content, format)?;
        Ok(self)
    }

    /// Load configuration from a file if it exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in the given format (`toml` or
    /// `json`).
    ///
    /// ```
    /// use talaria_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[dispatch]\nmax_call_depth = 4", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.dispatch.max_call_depth, 4);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails.
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = parse(content, format)?;
        Ok(self)
    }

    /// Load `.env` from the current directory into the process environment,
    /// if present. Variables already set are not overwritten.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Dotenv` if the file exists but is malformed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(e.into()),
        }
    }

    /// Load a specific dotenv file into the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Dotenv` if the file is missing or malformed.
    pub fn with_dotenv_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        dotenvy::from_path(path)?;
        Ok(self)
    }

    /// Set the environment variable prefix for overrides.
    ///
    /// With prefix `TALARIA`:
    /// - `TALARIA__SERVER__HTTP_ADDR=0.0.0.0:9000`
    /// - `TALARIA__DISPATCH__MAX_CALL_DEPTH=8`
    /// - `TALARIA__LOGGING__FORMAT=pretty`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Apply environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override does not parse or validation
    /// fails.
    pub fn load(mut self) -> Result<TalariaConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let marker = format!("{prefix}__");
            for (key, value) in env::vars().filter(|(k, _)| k.starts_with(&marker)) {
                self.apply_env_var(&key, &value, &prefix)?;
            }
        }

        self.config.validate()?;
        Ok(self.config)
    }

    /// Finalize without environment overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> TalariaConfig {
        self.config
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let path = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;

        let parts: Vec<&str> = path.split("__").collect();

        match parts.as_slice() {
            ["SERVER", "HTTP_ADDR"] => {
                self.config.server.http_addr = value.to_string();
            }
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                self.config.server.shutdown_timeout_secs = parse_int(key, value)?;
            }
            ["SERVER", "REQUEST_TIMEOUT_MS"] => {
                self.config.server.request_timeout_ms = parse_int(key, value)?;
            }
            ["SERVER", "KEEP_ALIVE"] => {
                self.config.server.keep_alive = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["SERVER", "MAX_BODY_SIZE"] => {
                self.config.server.max_body_size = parse_int(key, value)?;
            }
            ["SERVER", "CORS", "ENABLED"] => {
                self.config.server.cors.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["SERVER", "CORS", "ALLOWED_ORIGINS"] => {
                self.config.server.cors.allowed_origins = parse_list(value);
            }
            ["SERVER", "CORS", "ALLOWED_METHODS"] => {
                self.config.server.cors.allowed_methods = parse_list(value);
            }
            ["SERVER", "CORS", "ALLOWED_HEADERS"] => {
                self.config.server.cors.allowed_headers = parse_list(value);
            }
            ["SERVER", "CORS", "EXPOSE_HEADERS"] => {
                self.config.server.cors.expose_headers = parse_list(value);
            }
            ["SERVER", "CORS", "ALLOW_CREDENTIALS"] => {
                self.config.server.cors.allow_credentials = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["SERVER", "CORS", "MAX_AGE_SECS"] => {
                self.config.server.cors.max_age_secs = parse_int(key, value)?;
            }

            ["DISPATCH", "ROUTE_PREFIX"] => {
                self.config.dispatch.route_prefix = value.to_string();
            }
            ["DISPATCH", "MAX_CALL_DEPTH"] => {
                self.config.dispatch.max_call_depth = parse_int(key, value)?;
            }

            ["LOGGING", "ENABLED"] => {
                self.config.logging.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["LOGGING", "LEVEL"] => {
                self.config.logging.level = value.to_string();
            }
            ["LOGGING", "FORMAT"] => {
                self.config.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["LOGGING", "WRITER"] => {
                self.config.logging.writer = match value.to_lowercase().as_str() {
                    "stdout" => LogTarget::Stdout,
                    "stderr" => LogTarget::Stderr,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'stdout' or 'stderr'",
                        ))
                    }
                };
            }
            ["LOGGING", "INCLUDE_LOCATION"] => {
                self.config.logging.include_location = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }

            // Unrecognized keys under the prefix are ignored.
            _ => {}
        }

        Ok(())
    }
}

fn parse(content: &str, format: &str) -> Result<TalariaConfig, ConfigError> {
    match format.to_lowercase().as_str() {
        "toml" => Ok(toml::from_str(content)?),
        "json" => Ok(serde_json::from_str(content)?),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

fn parse_int<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

/// Splits a comma-separated list, dropping blank entries.
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect()
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_loader_defaults() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config.server.http_addr, "0.0.0.0:8080");
        assert_eq!(config.dispatch.max_call_depth, 16);
    }

    #[test]
    fn test_loader_with_production() {
        let config = ConfigLoader::new().with_production().load().unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_loader_with_string_toml() {
        let toml = r#"
            [server]
            http_addr = "127.0.0.1:3000"

            [logging]
            format = "pretty"
            writer = "stderr"
        "#;

        let config = ConfigLoader::new()
            .with_string(toml, "toml")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.server.http_addr, "127.0.0.1:3000");
        assert_eq!(config.server.shutdown_timeout_secs, 5);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.logging.writer, LogTarget::Stderr);
        assert_eq!(config.dispatch.route_prefix, "/api");
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{"dispatch": {"route_prefix": "/rpc", "max_call_depth": 3}}"#;

        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.dispatch.route_prefix, "/rpc");
        assert_eq!(config.dispatch.max_call_depth, 3);
    }

    #[test]
    fn test_loader_rejects_unknown_field() {
        let result = ConfigLoader::new().with_string("[dispatch]\nmax_depth = 3", "toml");
        assert!(matches!(result, Err(ConfigError::TomlError(_))));

        let result = ConfigLoader::new().with_string(r#"{"metrics": {}}"#, "json");
        assert!(matches!(result, Err(ConfigError::JsonError(_))));
    }

    #[test]
    fn test_loader_rejects_unknown_format() {
        let result = ConfigLoader::new().with_string("", "yaml");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(f)) if f == "yaml"));
    }

    #[test]
    fn test_loader_validates_on_load() {
        let result = ConfigLoader::new()
            .with_string("[dispatch]\nroute_prefix = \"api\"", "toml")
            .unwrap()
            .load();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_loader_with_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[server]\nrequest_timeout_ms = 1500").unwrap();

        let config = ConfigLoader::new()
            .with_file(file.path())
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.server.request_timeout_ms, 1500);
    }

    #[test]
    fn test_loader_with_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"logging": {{"level": "warn"}}}}"#).unwrap();

        let config = ConfigLoader::new()
            .with_file(file.path())
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let result = ConfigLoader::new().with_file("/nonexistent/talaria.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/talaria.toml")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config, TalariaConfig::default());
    }

    #[test]
    fn test_loader_with_dotenv_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "TALARIA_DOTENV_TEST__DISPATCH__MAX_CALL_DEPTH=7").unwrap();
        writeln!(file, "TALARIA_DOTENV_TEST__LOGGING__FORMAT=pretty").unwrap();

        let config = ConfigLoader::new()
            .with_dotenv_file(file.path())
            .unwrap()
            .with_env_prefix("TALARIA_DOTENV_TEST")
            .load()
            .unwrap();

        assert_eq!(config.dispatch.max_call_depth, 7);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_loader_with_dotenv_file_missing() {
        let result = ConfigLoader::new().with_dotenv_file("/nonexistent/.env");
        assert!(matches!(result, Err(ConfigError::Dotenv(_))));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_apply_env_var_server() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__SERVER__HTTP_ADDR", "192.168.1.1:9000", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__SERVER__KEEP_ALIVE", "no", "TEST")
            .unwrap();
        assert_eq!(loader.config.server.http_addr, "192.168.1.1:9000");
        assert!(!loader.config.server.keep_alive);
    }

    #[test]
    fn test_apply_env_var_body_limit_and_cors() {
        let mut loader = ConfigLoader::new();
        for (key, value) in [
            ("TEST__SERVER__MAX_BODY_SIZE", "2048"),
            ("TEST__SERVER__CORS__ENABLED", "true"),
            ("TEST__SERVER__CORS__ALLOWED_ORIGINS", "https://a.test, https://b.test,"),
            ("TEST__SERVER__CORS__ALLOWED_METHODS", "GET,POST"),
            ("TEST__SERVER__CORS__MAX_AGE_SECS", "60"),
        ] {
            loader.apply_env_var(key, value, "TEST").unwrap();
        }

        let server = &loader.config.server;
        assert_eq!(server.max_body_size, 2048);
        assert!(server.cors.enabled);
        assert_eq!(server.cors.allowed_origins, vec!["https://a.test", "https://b.test"]);
        assert_eq!(server.cors.allowed_methods, vec!["GET", "POST"]);
        assert_eq!(server.cors.max_age_secs, 60);

        assert!(loader
            .apply_env_var("TEST__SERVER__MAX_BODY_SIZE", "1MB", "TEST")
            .is_err());
    }

    #[test]
    fn test_loader_reads_cors_section() {
        let config = ConfigLoader::new()
            .with_string(
                r#"
                [server]
                max_body_size = 512

                [server.cors]
                enabled = true
                allowed_origins = ["https://app.example.com"]
                "#,
                "toml",
            )
            .unwrap()
            .load()
            .unwrap();

        let server = config.server.to_server_config();
        assert_eq!(server.max_body_size(), 512);
        assert!(server
            .cors()
            .unwrap()
            .allowed_origins()
            .is_allowed("https://app.example.com"));
    }

    #[test]
    fn test_apply_env_var_logging() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__LOGGING__WRITER", "STDERR", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__LOGGING__LEVEL", "talaria_core=debug", "TEST")
            .unwrap();
        assert_eq!(loader.config.logging.writer, LogTarget::Stderr);
        assert_eq!(loader.config.logging.level, "talaria_core=debug");
    }

    #[test]
    fn test_apply_env_var_invalid_values() {
        let mut loader = ConfigLoader::new();
        assert!(loader
            .apply_env_var("TEST__DISPATCH__MAX_CALL_DEPTH", "deep", "TEST")
            .is_err());
        assert!(loader
            .apply_env_var("TEST__LOGGING__FORMAT", "xml", "TEST")
            .is_err());
        assert!(loader
            .apply_env_var("TEST__LOGGING__ENABLED", "sometimes", "TEST")
            .is_err());
    }

    #[test]
    fn test_apply_env_var_unknown_key_ignored() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__METRICS__ENABLED", "true", "TEST")
            .unwrap();
        assert_eq!(loader.config, TalariaConfig::default());
    }
}
