//! Structured message bound for request and response types.

use serde::{de::DeserializeOwned, Serialize};

/// A structured message that can travel through the dispatch pipeline.
///
/// Requests are allocated with [`Default`] (the zero value) before the
/// inbound payload is decoded into them, and responses are serialized with
/// every field present. Derive `Serialize`, `Deserialize` and `Default` on a
/// plain struct and this trait is implemented automatically.
///
/// Field names on the wire are the serde names; do not add
/// `skip_serializing_if` or `rename_all = "camelCase"` to response types, the
/// caller relies on a complete and stable shape.
pub trait Message: Serialize + DeserializeOwned + Default + Send + 'static {}

impl<T> Message for T where T: Serialize + DeserializeOwned + Default + Send + 'static {}

/// Returns the JSON kind name of a value, for diagnostics.
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assert_message<T: Message>() {}

    #[derive(Default, Serialize, serde::Deserialize)]
    struct Plain {
        id: u64,
    }

    #[test]
    fn test_plain_struct_is_message() {
        assert_message::<Plain>();
        assert_message::<serde_json::Map<String, serde_json::Value>>();
    }

    #[test]
    fn test_json_kind() {
        assert_eq!(json_kind(&json!(null)), "null");
        assert_eq!(json_kind(&json!(true)), "boolean");
        assert_eq!(json_kind(&json!(1)), "number");
        assert_eq!(json_kind(&json!("x")), "string");
        assert_eq!(json_kind(&json!([])), "array");
        assert_eq!(json_kind(&json!({})), "object");
    }
}
