//! # Talaria Core
//!
//! Command dispatch for typed request/response handlers.
//!
//! Applications write plain async handlers of the shape
//! `(RequestContext, Req) -> Result<Option<Res>>`, list them in a
//! [`CommandTable`], and hand the table to a [`Dispatcher`]. The dispatcher
//! validates every handler once, then binds an [`Endpoint`] per route to
//! whatever [`RoutingSurface`] the transport provides. Each endpoint:
//!
//! - decodes the JSON body into the handler's request type,
//! - runs the handler, converting panics into an error response,
//! - maps errors onto a stable code space (see [`ErrorCode`] and
//!   [`BusinessError`]),
//! - answers with a [`DispatchEnvelope`]: `err_code`, `err_msg`, `hint`
//!   plus the response's own fields.
//!
//! This crate has no transport of its own; see `talaria-server` for HTTP.

#![doc(html_root_url = "https://docs.rs/talaria-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod codec;
pub mod contract;
mod context;
mod dispatcher;
mod envelope;
mod error;
mod handler;
mod message;
mod table;
mod translate;

pub use codec::{is_reserved, Payload, RequestDecoder, ResponseEncoder, RESERVED_FIELDS};
pub use context::{RequestContext, RequestId};
pub use contract::ValidatedHandler;
pub use dispatcher::{
    DispatchOptions, Dispatcher, Endpoint, RoutingSurface, DEFAULT_MAX_CALL_DEPTH,
};
pub use envelope::DispatchEnvelope;
pub use error::{
    BusinessError, ContractViolation, DecodeError, EncodeError, ErrorCode, RegistrationError,
    SignaturePosition,
};
pub use handler::{FnHandler, Handler, HandlerRef, HandlerResult};
pub use message::Message;
pub use table::{CommandTable, HttpMethod, RouteEntry};
pub use translate::{ErrorTranslator, Translation};
