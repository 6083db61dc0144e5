//! # Talaria Server
//!
//! HTTP transport for Talaria command tables.
//!
//! This crate provides:
//!
//! - an HTTP/1.1 server built on Hyper,
//! - a [`Router`] that implements [`RoutingSurface`](talaria_core::RoutingSurface),
//! - an optional [`Cors`] policy answering preflights before routing,
//! - graceful shutdown on SIGTERM/SIGINT/SIGQUIT with connection draining.
//!
//! ## Example
//!
//! ```rust,ignore
//! use talaria_core::{CommandTable, Dispatcher};
//! use talaria_server::Server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut server = Server::builder().http_addr("0.0.0.0:8080").build();
//!     Dispatcher::new(tracing::Dispatch::default())
//!         .register(CommandTable::with_prefix("/api"), server.router_mut())?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/talaria-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod cors;
mod error;
pub mod router;
mod server;
pub mod shutdown;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use cors::{AllowedOrigins, Cors, CorsBuilder, PreflightRejection};
pub use error::ServerError;
pub use router::{RouteMatch, Router};
pub use server::{
    HttpResponse, ResponseBody, Server, ServerBuilder, CALL_DEPTH_HEADER, REQUEST_ID_HEADER,
};
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownReceiver, ShutdownSignal};
