//! Typed configuration for Talaria.
//!
//! - TOML and JSON configuration files
//! - `.env` files and environment variable overrides
//! - Strict parsing that fails on unknown fields
//! - Conversions into the server, dispatcher and logger configurations
//!
//! # Example
//!
//! ```no_run
//! use talaria_config::ConfigLoader;
//!
//! # fn main() -> Result<(), talaria_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("talaria.toml")?
//!     .with_env_prefix("TALARIA")
//!     .load()?;
//!
//! println!("listening on {}", config.server.http_addr);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//! shutdown_timeout_secs = 5
//! request_timeout_ms = 30000
//! keep_alive = true
//! max_body_size = 1048576
//!
//! [server.cors]
//! enabled = true
//! allowed_origins = ["https://app.example.com"]
//! allowed_methods = ["GET", "POST"]
//!
//! [dispatch]
//! route_prefix = "/api"
//! max_call_depth = 16
//!
//! [logging]
//! enabled = true
//! level = "info"
//! format = "json"
//! writer = "stdout"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Values can be overridden with `PREFIX__SECTION__KEY`, for example
//! `TALARIA__SERVER__HTTP_ADDR=0.0.0.0:9000` or
//! `TALARIA__LOGGING__LEVEL=debug`. CORS keys take a third level, e.g.
//! `TALARIA__SERVER__CORS__ALLOWED_ORIGINS=https://a.test,https://b.test`;
//! list values are comma-separated.

#![doc(html_root_url = "https://docs.rs/talaria-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{TalariaConfig, TalariaConfigBuilder};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{
    CorsSection, DispatchSection, LogFormat, LogTarget, LoggingSection, ServerSection,
};
