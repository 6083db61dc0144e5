//! The response envelope.
//!
//! Every dispatched request answers with a single JSON object:
//!
//! ```json
//! {"err_code": 0, "err_msg": "", "hint": "", "message": "hello"}
//! ```
//!
//! The three envelope keys are always present. On success the response's own
//! fields sit next to them; on failure there are no other keys.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::Payload;
use crate::translate::Translation;

/// Rendered when the envelope itself cannot be serialized.
const SYSTEM_FALLBACK: &[u8] = br#"{"err_code":-1,"err_msg":"internal system error","hint":""}"#;

/// The wire response for one dispatched request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchEnvelope {
    /// `0` on success, otherwise a business or reserved code.
    pub err_code: i32,
    /// Empty on success.
    pub err_msg: String,
    /// Empty unless a business error supplied one.
    pub hint: String,
    /// Response fields, inlined. Empty on failure.
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl DispatchEnvelope {
    /// Wraps a successful response.
    #[must_use]
    pub fn success(payload: Payload) -> Self {
        Self {
            err_code: 0,
            err_msg: String::new(),
            hint: String::new(),
            data: payload.into_fields(),
        }
    }

    /// Wraps a failure. The diagnostic is dropped.
    #[must_use]
    pub fn failure(translation: Translation) -> Self {
        Self {
            err_code: translation.code,
            err_msg: translation.message,
            hint: translation.hint,
            data: Map::new(),
        }
    }

    /// Returns `true` for a success envelope.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.err_code == 0
    }

    /// Serializes the envelope.
    ///
    /// Serialization of a `Map<String, Value>` cannot realistically fail, but
    /// if it does the caller still gets a well-formed system envelope.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_else(|_| SYSTEM_FALLBACK.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ResponseEncoder;
    use crate::error::ErrorCode;
    use crate::translate::ErrorTranslator;
    use serde_json::json;

    #[derive(Serialize)]
    struct Reply {
        message: String,
        count: u32,
    }

    #[test]
    fn test_success_inlines_fields() {
        let payload = ResponseEncoder::encode(&Reply {
            message: "hi".to_string(),
            count: 0,
        })
        .unwrap();
        let envelope = DispatchEnvelope::success(payload);
        let value: Value = serde_json::from_slice(&envelope.to_bytes()).unwrap();

        assert_eq!(
            value,
            json!({"err_code": 0, "err_msg": "", "hint": "", "message": "hi", "count": 0})
        );
    }

    #[test]
    fn test_empty_success() {
        let envelope = DispatchEnvelope::success(Payload::empty());
        let value: Value = serde_json::from_slice(&envelope.to_bytes()).unwrap();
        assert_eq!(value, json!({"err_code": 0, "err_msg": "", "hint": ""}));
        assert!(envelope.is_success());
    }

    #[test]
    fn test_failure_has_only_envelope_keys() {
        let envelope = DispatchEnvelope::failure(ErrorTranslator::internal(
            ErrorCode::ResponseMarshalFail,
            "secret detail",
        ));
        let bytes = envelope.to_bytes();
        let value: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(
            value,
            json!({"err_code": -2003, "err_msg": "failed to marshal response", "hint": ""})
        );
        assert!(!String::from_utf8_lossy(&bytes).contains("secret"));
        assert!(!envelope.is_success());
    }

    #[test]
    fn test_fallback_is_valid_envelope() {
        let envelope: DispatchEnvelope = serde_json::from_slice(SYSTEM_FALLBACK).unwrap();
        assert_eq!(envelope.err_code, ErrorCode::System.code());
        assert_eq!(envelope.err_msg, ErrorCode::System.message());
        assert!(envelope.data.is_empty());
    }

    #[test]
    fn test_round_trip_through_serde() {
        let value = json!({"err_code": 3, "err_msg": "m", "hint": "h"});
        let envelope: DispatchEnvelope = serde_json::from_value(value).unwrap();
        assert_eq!(envelope.err_code, 3);
        assert_eq!(envelope.hint, "h");
    }
}
