//! Request decoding and response encoding.
//!
//! The wire format is JSON. Requests decode straight into the handler's
//! request type; responses are serialized to a JSON object whose fields are
//! later inlined next to the envelope keys.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{DecodeError, EncodeError};
use crate::message::{json_kind, Message};

/// Keys owned by the response envelope. Response types must not use them.
pub const RESERVED_FIELDS: [&str; 3] = ["err_code", "err_msg", "hint"];

/// Returns `true` if `key` is one of the envelope's own keys.
#[must_use]
pub fn is_reserved(key: &str) -> bool {
    RESERVED_FIELDS.contains(&key)
}

/// Decodes inbound payloads into request types.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestDecoder;

impl RequestDecoder {
    /// Decodes `body` into `Req`.
    ///
    /// An empty or whitespace-only body yields `Req::default()`, so
    /// handlers of field-less requests can be called without a payload.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the body is not valid JSON for `Req`.
    pub fn decode<Req: Message>(body: &[u8]) -> Result<Req, DecodeError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Req::default());
        }

        serde_json::from_slice(body).map_err(|source| DecodeError {
            type_name: std::any::type_name::<Req>(),
            source,
        })
    }
}

/// The encoded fields of a handler's response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    fields: Map<String, Value>,
}

impl Payload {
    /// A payload with no fields, used when the handler returns no content.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the encoded fields.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Returns `true` if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Consumes the payload, returning its fields.
    #[must_use]
    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    /// Serializes the payload on its own, without envelope keys.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::Serialize`] if JSON output fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        Ok(serde_json::to_vec(&self.fields)?)
    }
}

/// Serializes handler responses into [`Payload`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseEncoder;

impl ResponseEncoder {
    /// Encodes `response`.
    ///
    /// Every field of the response is present in the output, zero values
    /// included.
    ///
    /// # Errors
    ///
    /// - [`EncodeError::Serialize`] if serde fails (e.g. a map with non-string
    ///   keys, or a custom `Serialize` that errors).
    /// - [`EncodeError::NotAnObject`] if the response is not a JSON object.
    /// - [`EncodeError::ReservedField`] if a field collides with the envelope.
    pub fn encode<T: Serialize + ?Sized>(response: &T) -> Result<Payload, EncodeError> {
        match serde_json::to_value(response)? {
            Value::Object(fields) => {
                if let Some(key) = fields.keys().find(|k| is_reserved(k)) {
                    return Err(EncodeError::ReservedField(key.clone()));
                }
                Ok(Payload { fields })
            }
            other => Err(EncodeError::NotAnObject {
                found: json_kind(&other),
            }),
        }
    }
}
