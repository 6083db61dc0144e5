//! Configuration schema types.
//!
//! Each section deserializes independently with per-field defaults, so a
//! file only needs to name the values it changes.

use std::time::Duration;

use http::Method;
use serde::{Deserialize, Serialize};
use talaria_core::DispatchOptions;
use talaria_server::config::{
    DEFAULT_HTTP_ADDR, DEFAULT_MAX_BODY_SIZE, DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
};
use talaria_server::cors::DEFAULT_MAX_AGE;
use talaria_server::{Cors, ServerConfig};
use talaria_telemetry::{LogConfig, LogWriter};

/// Server configuration section.
///
/// # Example
///
/// ```
/// use talaria_config::ServerSection;
///
/// let section = ServerSection {
///     http_addr: "127.0.0.1:3000".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(section.to_server_config().http_addr(), "127.0.0.1:3000");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// HTTP server bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Request timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Enable HTTP/1.1 keep-alive.
    #[serde(default = "default_true")]
    pub keep_alive: bool,

    /// Largest request body read, in bytes.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Cross-origin policy.
    #[serde(default)]
    pub cors: CorsSection,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            request_timeout_ms: default_request_timeout(),
            keep_alive: true,
            max_body_size: default_max_body_size(),
            cors: CorsSection::default(),
        }
    }
}

impl ServerSection {
    /// Converts this section into the transport's configuration.
    #[must_use]
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig::builder()
            .http_addr(self.http_addr.clone())
            .shutdown_timeout(Duration::from_secs(self.shutdown_timeout_secs))
            .request_timeout(Some(Duration::from_millis(self.request_timeout_ms)))
            .keep_alive(self.keep_alive)
            .max_body_size(self.max_body_size)
            .cors(self.cors.to_cors())
            .build()
    }
}

fn default_http_addr() -> String {
    DEFAULT_HTTP_ADDR.to_string()
}

fn default_shutdown_timeout() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_SECS
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_max_body_size() -> usize {
    DEFAULT_MAX_BODY_SIZE
}

/// CORS section, nested under `[server.cors]`.
///
/// Disabled by default. When enabled, preflight `OPTIONS` requests are
/// answered by the server and never dispatched.
///
/// ```toml
/// [server.cors]
/// enabled = true
/// allowed_origins = ["https://app.example.com"]
/// allowed_methods = ["GET", "POST"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CorsSection {
    /// Answer preflights and add CORS headers.
    #[serde(default)]
    pub enabled: bool,

    /// Allowed origins. `"*"` allows any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// Allowed methods, e.g. `["GET", "POST"]`.
    #[serde(default = "default_cors_methods")]
    pub allowed_methods: Vec<String>,

    /// Allowed request headers. `"*"` allows any header.
    #[serde(default = "default_cors_headers")]
    pub allowed_headers: Vec<String>,

    /// Response headers exposed to scripts.
    #[serde(default)]
    pub expose_headers: Vec<String>,

    /// Allow cookies and authorization headers.
    #[serde(default)]
    pub allow_credentials: bool,

    /// Preflight cache lifetime in seconds. Zero disables caching.
    #[serde(default = "default_cors_max_age")]
    pub max_age_secs: u64,
}

impl Default for CorsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_origins: Vec::new(),
            allowed_methods: default_cors_methods(),
            allowed_headers: default_cors_headers(),
            expose_headers: Vec::new(),
            allow_credentials: false,
            max_age_secs: default_cors_max_age(),
        }
    }
}

impl CorsSection {
    /// Allow every origin, method and header. Used by the development
    /// preset.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["*".to_string()],
            allowed_headers: vec!["*".to_string()],
            expose_headers: vec!["x-request-id".to_string()],
            ..Self::default()
        }
    }

    /// Returns the methods that do not parse as HTTP methods.
    #[must_use]
    pub fn invalid_methods(&self) -> Vec<&str> {
        self.allowed_methods
            .iter()
            .map(String::as_str)
            .filter(|m| parse_method(m).is_none())
            .collect()
    }

    /// Converts this section into a CORS policy, or `None` when disabled.
    ///
    /// Unparsable methods are skipped; validation reports them.
    #[must_use]
    pub fn to_cors(&self) -> Option<Cors> {
        if !self.enabled {
            return None;
        }
        let builder = Cors::builder()
            .allow_origins(self.allowed_origins.iter().cloned())
            .allow_methods(self.allowed_methods.iter().filter_map(|m| parse_method(m)))
            .allow_headers(self.allowed_headers.iter().cloned())
            .expose_headers(self.expose_headers.iter().cloned())
            .allow_credentials(self.allow_credentials);
        let builder = if self.max_age_secs == 0 {
            builder.no_max_age()
        } else {
            builder.max_age(Duration::from_secs(self.max_age_secs))
        };
        Some(builder.build())
    }
}

fn parse_method(name: &str) -> Option<Method> {
    Method::from_bytes(name.trim().to_ascii_uppercase().as_bytes()).ok()
}

fn default_cors_methods() -> Vec<String> {
    ["GET", "HEAD", "POST", "PUT", "DELETE", "PATCH"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_cors_headers() -> Vec<String> {
    ["content-type", "authorization", "x-request-id", "x-call-depth"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_cors_max_age() -> u64 {
    DEFAULT_MAX_AGE.as_secs()
}

/// Dispatch configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DispatchSection {
    /// Prefix joined onto every command path.
    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,

    /// Deepest inbound call chain accepted.
    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: u32,
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            route_prefix: default_route_prefix(),
            max_call_depth: default_max_call_depth(),
        }
    }
}

impl DispatchSection {
    /// Converts this section into dispatcher options.
    #[must_use]
    pub fn to_dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            max_call_depth: self.max_call_depth,
        }
    }
}

fn default_route_prefix() -> String {
    "/api".to_string()
}

fn default_max_call_depth() -> u32 {
    talaria_core::DEFAULT_MAX_CALL_DEPTH
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON lines.
    #[default]
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

/// Log output stream.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// Standard output.
    #[default]
    Stdout,
    /// Standard error.
    Stderr,
}

impl From<LogTarget> for LogWriter {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::Stdout => Self::Stdout,
            LogTarget::Stderr => Self::Stderr,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive (trace, debug, info, warn, error, or a full
    /// `EnvFilter` expression).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Output stream.
    #[serde(default)]
    pub writer: LogTarget,

    /// Include file and line in each record.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            writer: LogTarget::default(),
            include_location: false,
        }
    }
}

impl LoggingSection {
    /// Converts this section into a logger configuration.
    #[must_use]
    pub fn to_log_config(&self) -> LogConfig {
        let base = match self.format {
            LogFormat::Json => LogConfig::production(),
            LogFormat::Pretty => LogConfig::development(),
        };
        LogConfig {
            enabled: self.enabled,
            level: self.level.clone(),
            writer: self.writer.into(),
            file_line_info: self.include_location,
            ..base
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_section_default() {
        let section = ServerSection::default();
        assert_eq!(section.http_addr, "0.0.0.0:8080");
        assert_eq!(section.shutdown_timeout_secs, 5);
        assert_eq!(section.request_timeout_ms, 30_000);
        assert!(section.keep_alive);
    }

    #[test]
    fn test_server_section_partial_deserialize() {
        let section: ServerSection =
            serde_json::from_str(r#"{"http_addr": "127.0.0.1:9000"}"#).unwrap();
        assert_eq!(section.http_addr, "127.0.0.1:9000");
        assert_eq!(section.shutdown_timeout_secs, 5);
    }

    #[test]
    fn test_server_section_unknown_field_rejected() {
        let result: Result<ServerSection, _> =
            serde_json::from_str(r#"{"http_addr": "127.0.0.1:9000", "port": 1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_to_server_config() {
        let section = ServerSection {
            http_addr: "127.0.0.1:3000".to_string(),
            shutdown_timeout_secs: 10,
            request_timeout_ms: 250,
            keep_alive: false,
            max_body_size: 4096,
            cors: CorsSection::default(),
        };
        let config = section.to_server_config();
        assert_eq!(config.http_addr(), "127.0.0.1:3000");
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(10));
        assert_eq!(config.request_timeout(), Some(Duration::from_millis(250)));
        assert!(!config.keep_alive());
        assert_eq!(config.max_body_size(), 4096);
        assert!(config.cors().is_none());
    }

    #[test]
    fn test_server_section_body_limit_default() {
        assert_eq!(ServerSection::default().max_body_size, 1024 * 1024);
        assert_eq!(
            ServerSection::default().to_server_config().max_body_size(),
            1024 * 1024
        );
    }

    #[test]
    fn test_cors_section_from_toml() {
        let section: ServerSection = toml::from_str(
            r#"
            [cors]
            enabled = true
            allowed_origins = ["https://app.example.com"]
            allowed_methods = ["get", "POST"]
            max_age_secs = 0
            "#,
        )
        .unwrap();
        assert!(section.cors.invalid_methods().is_empty());

        let cors = section.cors.to_cors().unwrap();
        assert!(cors.allowed_origins().is_allowed("https://app.example.com"));
        assert!(!cors.allowed_origins().is_allowed("https://other.example.com"));
        assert!(cors.allows_method(&Method::GET));
        assert!(!cors.allows_method(&Method::DELETE));
        assert!(cors.allows_header("X-Request-ID"));
        assert_eq!(cors.max_age(), None);
    }

    #[test]
    fn test_cors_section_disabled_by_default() {
        assert!(CorsSection::default().to_cors().is_none());
        assert!(ServerSection::default().to_server_config().cors().is_none());
    }

    #[test]
    fn test_cors_section_permissive() {
        let cors = CorsSection::permissive().to_cors().unwrap();
        assert!(cors.allowed_origins().is_allowed("https://anything.test"));
        assert!(cors.allows_header("x-anything"));
    }

    #[test]
    fn test_cors_section_invalid_method() {
        let section = CorsSection {
            allowed_methods: vec!["GET".to_string(), "NOT A METHOD".to_string()],
            ..CorsSection::default()
        };
        assert_eq!(section.invalid_methods(), vec!["NOT A METHOD"]);
    }

    #[test]
    fn test_dispatch_section_default() {
        let section = DispatchSection::default();
        assert_eq!(section.route_prefix, "/api");
        assert_eq!(section.max_call_depth, 16);
        assert_eq!(section.to_dispatch_options().max_call_depth, 16);
    }

    #[test]
    fn test_log_format_deserialize() {
        let format: LogFormat = serde_json::from_str(r#""json""#).unwrap();
        assert_eq!(format, LogFormat::Json);

        let format: LogFormat = serde_json::from_str(r#""pretty""#).unwrap();
        assert_eq!(format, LogFormat::Pretty);

        assert!(serde_json::from_str::<LogFormat>(r#""xml""#).is_err());
    }

    #[test]
    fn test_to_log_config() {
        let section = LoggingSection {
            enabled: true,
            level: "warn".to_string(),
            format: LogFormat::Pretty,
            writer: LogTarget::Stderr,
            include_location: false,
        };
        let config = section.to_log_config();
        assert!(!config.json_format);
        assert_eq!(config.level, "warn");
        assert_eq!(config.writer, LogWriter::Stderr);
        assert!(!config.file_line_info);

        let config = LoggingSection::default().to_log_config();
        assert!(config.json_format);
        assert_eq!(config.writer, LogWriter::Stdout);
    }
}
