//! Error types for Talaria.
//!
//! Two families live here:
//!
//! - **Wire-level codes**: [`ErrorCode`] (the negative codes reserved by the
//!   adapter) and [`BusinessError`] (handler-declared codes that reach the
//!   caller verbatim).
//! - **Library errors**: [`ContractViolation`] and [`RegistrationError`] for
//!   startup, [`DecodeError`] and [`EncodeError`] for the request pipeline.
//!
//! # Business errors vs. opaque errors
//!
//! Handlers return `anyhow::Error`. A [`BusinessError`] is recognised by its
//! type, never by its code range, so any other error value (I/O, database,
//! a plain `anyhow!`) is treated as an internal failure and folded into
//! [`ErrorCode::System`].
//!
//! ```
//! use talaria_core::BusinessError;
//!
//! fn find_user(id: u64) -> anyhow::Result<()> {
//!     if id == 0 {
//!         return Err(BusinessError::new(-100, "not found").into());
//!     }
//!     Ok(())
//! }
//!
//! let err = find_user(0).unwrap_err();
//! assert!(err.downcast_ref::<BusinessError>().is_some());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::table::HttpMethod;

/// Codes reserved by the dispatch layer itself.
///
/// Business codes are handler-defined and never collide with these by
/// convention; the adapter only ever emits the values below on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Uncategorized internal error.
    System,
    /// The request body could not be read or decoded.
    RequestBodyReadFail,
    /// The handler's response could not be encoded.
    ResponseMarshalFail,
    /// The handler panicked.
    PanicInHandler,
    /// The inbound call chain is deeper than allowed.
    ExceedMaxCallDepth,
}

impl ErrorCode {
    /// All reserved codes, in ascending severity of pipeline stage.
    pub const ALL: [Self; 5] = [
        Self::System,
        Self::RequestBodyReadFail,
        Self::ResponseMarshalFail,
        Self::PanicInHandler,
        Self::ExceedMaxCallDepth,
    ];

    /// Returns the numeric wire code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::System => -1,
            Self::RequestBodyReadFail => -2002,
            Self::ResponseMarshalFail => -2003,
            Self::PanicInHandler => -2004,
            Self::ExceedMaxCallDepth => -2005,
        }
    }

    /// Returns the fixed caller-visible message for this code.
    ///
    /// These strings never contain diagnostic detail.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::System => "internal system error",
            Self::RequestBodyReadFail => "failed to read request body",
            Self::ResponseMarshalFail => "failed to marshal response",
            Self::PanicInHandler => "request processing aborted",
            Self::ExceedMaxCallDepth => "exceeded max call depth",
        }
    }

    /// Looks up a reserved code by its numeric value.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

/// An expected, handler-declared failure.
///
/// The code, message and hint are copied into the response envelope
/// unchanged. Code 0 means success on the wire, so a business error
/// carrying it is treated as an internal failure instead.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("business error {code}: {message}")]
pub struct BusinessError {
    /// Handler-defined error code.
    pub code: i32,
    /// Caller-facing message.
    pub message: String,
    /// Optional extra context, also caller-facing.
    #[serde(default)]
    pub hint: String,
}

impl BusinessError {
    /// Creates a business error without a hint.
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            hint: String::new(),
        }
    }

    /// Attaches a hint.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = hint.into();
        self
    }
}

/// Position in the handler signature that failed the contract check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignaturePosition {
    /// The request parameter (second positional parameter).
    RequestParameter,
    /// The response return value (first return).
    ResponseReturn,
}

impl std::fmt::Display for SignaturePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RequestParameter => f.write_str("second parameter"),
            Self::ResponseReturn => f.write_str("first return"),
        }
    }
}

/// A handler whose shape the dispatch layer cannot serve.
///
/// Context and error positions are enforced by the `Handler` trait at compile
/// time; these violations cover what the type system cannot see.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    /// The message type does not encode to a JSON object.
    #[error("{position} `{type_name}` is not a structured message: encodes as {found}")]
    NotStructured {
        /// Which position failed.
        position: SignaturePosition,
        /// Rust type name of the message.
        type_name: &'static str,
        /// JSON kind the zero value encoded to.
        found: &'static str,
    },

    /// The zero value of the message could not be encoded at all.
    #[error("{position} `{type_name}` cannot be encoded: {reason}")]
    Unencodable {
        /// Which position failed.
        position: SignaturePosition,
        /// Rust type name of the message.
        type_name: &'static str,
        /// Encoder error text.
        reason: String,
    },

    /// The request type cannot decode its own zero value.
    #[error("{position} `{type_name}` cannot decode its own zero value: {reason}")]
    NotDecodable {
        /// Which position failed.
        position: SignaturePosition,
        /// Rust type name of the message.
        type_name: &'static str,
        /// Decoder error text.
        reason: String,
    },

    /// The response type declares a key the envelope already uses.
    #[error("{position} `{type_name}` declares reserved envelope field `{field}`")]
    ReservedField {
        /// Which position failed.
        position: SignaturePosition,
        /// Rust type name of the message.
        type_name: &'static str,
        /// The colliding field name.
        field: String,
    },
}

/// Fatal startup error raised while binding a command table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// A handler failed the contract check.
    #[error("route {method} {path}: {violation}")]
    Contract {
        /// HTTP method of the offending route.
        method: HttpMethod,
        /// Full path of the offending route.
        path: String,
        /// What was wrong with the handler.
        #[source]
        violation: ContractViolation,
    },

    /// Two entries share a method and path.
    #[error("route {method} {path}: registered more than once")]
    DuplicateRoute {
        /// HTTP method of the duplicated route.
        method: HttpMethod,
        /// Full path of the duplicated route.
        path: String,
    },

    /// A path is not absolute.
    #[error("route {method} {path}: path must start with '/'")]
    InvalidPath {
        /// HTTP method of the offending route.
        method: HttpMethod,
        /// The rejected path.
        path: String,
    },
}

/// The inbound payload could not be turned into the declared request type.
#[derive(Error, Debug)]
#[error("cannot decode `{type_name}`: {source}")]
pub struct DecodeError {
    /// Rust type name of the request.
    pub type_name: &'static str,
    /// Underlying JSON error.
    #[source]
    pub source: serde_json::Error,
}

/// A response could not be turned into the wire payload.
#[derive(Error, Debug)]
pub enum EncodeError {
    /// The serializer failed.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The response did not serialize to a JSON object.
    #[error("response encodes as {found}, expected an object")]
    NotAnObject {
        /// JSON kind produced.
        found: &'static str,
    },

    /// The response carries a key that belongs to the envelope.
    #[error("response field `{0}` collides with the envelope")]
    ReservedField(String),
}
