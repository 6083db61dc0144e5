//! # Talaria
//!
//! **Command dispatch with a uniform error envelope.**
//!
//! Talaria binds typed request/response handlers to HTTP routes. Every
//! response, successful or not, carries the same three envelope fields:
//!
//! - `err_code`: `0` on success, a business code, or a reserved system code
//! - `err_msg`: a caller-safe message
//! - `hint`: an optional remediation hint
//!
//! Response fields are inlined next to them. Internal failures (panics,
//! undecodable bodies, opaque handler errors) are logged with full detail
//! and reported to the caller only by their reserved code.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use talaria::prelude::*;
//!
//! #[derive(Default, Serialize, Deserialize)]
//! struct Echo { message: String }
//!
//! async fn echo(_ctx: RequestContext, req: Echo) -> HandlerResult<Echo> {
//!     Ok(Some(req))
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let logger = init_logging(&LogConfig::production())?;
//!     let mut server = Server::builder().http_addr("0.0.0.0:8080").build();
//!
//!     let table = CommandTable::with_prefix("/api").post("/echo", echo);
//!     Dispatcher::new(logger.into_dispatch()).register(table, server.router_mut())?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! HTTP → Router → depth check → decode → Handler → translate/encode → envelope → HTTP 200
//! ```

#![doc(html_root_url = "https://docs.rs/talaria/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use talaria_core as core;

// Re-export server types
pub use talaria_server as server;

// Re-export logging
pub use talaria_telemetry as telemetry;

// Re-export configuration
pub use talaria_config as config;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use talaria::prelude::*;
///
/// let table = CommandTable::with_prefix("/api");
/// assert!(table.is_empty());
/// ```
pub mod prelude {
    pub use talaria_core::{
        BusinessError, CommandTable, DispatchOptions, Dispatcher, ErrorCode, Handler,
        HandlerResult, HttpMethod, Message, RequestContext, RequestId,
    };

    pub use talaria_server::{Cors, Server, ServerConfig, ShutdownSignal};

    pub use talaria_telemetry::{init_logging, LogConfig, Logger};

    pub use talaria_config::{ConfigLoader, TalariaConfig};

    pub use serde::{Deserialize, Serialize};
}
