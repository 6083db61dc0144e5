//! Handler contract checks.
//!
//! The [`Handler`](crate::Handler) trait already pins the context and error
//! positions at compile time. What remains is checked once, at registration,
//! by probing the zero values of the message types:
//!
//! - the request type must encode to a JSON object and decode its own
//!   encoding,
//! - the response type must encode to a JSON object and must not declare
//!   any of the envelope's reserved keys.
//!
//! A handler that passes is wrapped in a [`ValidatedHandler`], the only thing
//! the dispatcher will ever invoke.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::codec::is_reserved;
use crate::error::{ContractViolation, SignaturePosition};
use crate::handler::{Completion, ErasedHandler, HandlerRef};
use crate::message::{json_kind, Message};
use crate::RequestContext;

/// A handler that passed [`validate`].
#[derive(Clone)]
pub struct ValidatedHandler {
    inner: Arc<dyn ErasedHandler>,
}

impl ValidatedHandler {
    /// Returns the Rust type name of the request message.
    #[must_use]
    pub fn request_type(&self) -> &'static str {
        self.inner.request_type()
    }

    /// Returns the Rust type name of the response message.
    #[must_use]
    pub fn response_type(&self) -> &'static str {
        self.inner.response_type()
    }

    pub(crate) fn call(&self, ctx: RequestContext, body: Bytes) -> BoxFuture<'static, Completion> {
        self.inner.call(ctx, body)
    }
}

impl std::fmt::Debug for ValidatedHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatedHandler")
            .field("request", &self.request_type())
            .field("response", &self.response_type())
            .finish()
    }
}

/// Checks that `handler` can be served.
///
/// # Errors
///
/// Returns the first [`ContractViolation`] found; request checks run before
/// response checks.
pub fn validate(handler: &HandlerRef) -> Result<ValidatedHandler, ContractViolation> {
    let inner = handler.erased();
    inner.check()?;
    Ok(ValidatedHandler {
        inner: Arc::clone(inner),
    })
}

pub(crate) fn check_shape<Req: Message, Res: Message>() -> Result<(), ContractViolation> {
    check_request::<Req>()?;
    check_response::<Res>()
}

fn sample_fields<T: Message>(position: SignaturePosition) -> Result<serde_json::Map<String, Value>, ContractViolation> {
    let type_name = std::any::type_name::<T>();
    let value = serde_json::to_value(T::default()).map_err(|e| ContractViolation::Unencodable {
        position,
        type_name,
        reason: e.to_string(),
    })?;

    match value {
        Value::Object(fields) => Ok(fields),
        other => Err(ContractViolation::NotStructured {
            position,
            type_name,
            found: json_kind(&other),
        }),
    }
}

fn check_request<Req: Message>() -> Result<(), ContractViolation> {
    let position = SignaturePosition::RequestParameter;
    let fields = sample_fields::<Req>(position)?;

    serde_json::from_value::<Req>(Value::Object(fields)).map_err(|e| {
        ContractViolation::NotDecodable {
            position,
            type_name: std::any::type_name::<Req>(),
            reason: e.to_string(),
        }
    })?;
    Ok(())
}

fn check_response<Res: Message>() -> Result<(), ContractViolation> {
    let position = SignaturePosition::ResponseReturn;
    let fields = sample_fields::<Res>(position)?;

    if let Some(field) = fields.keys().find(|k| is_reserved(k)) {
        return Err(ContractViolation::ReservedField {
            position,
            type_name: std::any::type_name::<Res>(),
            field: field.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HandlerResult, RequestContext};
    use serde::{Deserialize, Deserializer, Serialize};

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Good {
        value: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Bare(String);

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Clashing {
        err_msg: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Renamed {
        #[serde(rename = "hint")]
        note: String,
    }

    #[derive(Debug, Default, Serialize)]
    struct OneWay {
        value: u8,
    }

    impl<'de> Deserialize<'de> for OneWay {
        fn deserialize<D: Deserializer<'de>>(_d: D) -> Result<Self, D::Error> {
            Err(serde::de::Error::custom("write-only type"))
        }
    }

    async fn good(_ctx: RequestContext, req: Good) -> HandlerResult<Good> {
        Ok(Some(req))
    }

    async fn bare_request(_ctx: RequestContext, _req: Bare) -> HandlerResult<Good> {
        Ok(None)
    }

    async fn bare_response(_ctx: RequestContext, _req: Good) -> HandlerResult<Bare> {
        Ok(None)
    }

    async fn clashing(_ctx: RequestContext, _req: Good) -> HandlerResult<Clashing> {
        Ok(None)
    }

    async fn renamed(_ctx: RequestContext, _req: Good) -> HandlerResult<Renamed> {
        Ok(None)
    }

    async fn one_way(_ctx: RequestContext, _req: OneWay) -> HandlerResult<Good> {
        Ok(None)
    }

    async fn unit(_ctx: RequestContext, _req: ()) -> HandlerResult<Good> {
        Ok(None)
    }

    #[test]
    fn test_valid_handler() {
        let validated = validate(&HandlerRef::from_fn(good)).unwrap();
        assert!(validated.request_type().ends_with("Good"));
        assert!(validated.response_type().ends_with("Good"));
    }

    #[test]
    fn test_request_must_be_structured() {
        let err = validate(&HandlerRef::from_fn(bare_request)).unwrap_err();
        assert!(matches!(
            err,
            ContractViolation::NotStructured {
                position: SignaturePosition::RequestParameter,
                found: "string",
                ..
            }
        ));
    }

    #[test]
    fn test_unit_request_is_not_structured() {
        let err = validate(&HandlerRef::from_fn(unit)).unwrap_err();
        assert!(matches!(
            err,
            ContractViolation::NotStructured { found: "null", .. }
        ));
    }

    #[test]
    fn test_response_must_be_structured() {
        let err = validate(&HandlerRef::from_fn(bare_response)).unwrap_err();
        assert!(matches!(
            err,
            ContractViolation::NotStructured {
                position: SignaturePosition::ResponseReturn,
                ..
            }
        ));
    }

    #[test]
    fn test_request_must_decode() {
        let err = validate(&HandlerRef::from_fn(one_way)).unwrap_err();
        match err {
            ContractViolation::NotDecodable { reason, .. } => {
                assert!(reason.contains("write-only type"));
            }
            other => panic!("unexpected violation: {other}"),
        }
    }

    #[test]
    fn test_reserved_response_fields() {
        let err = validate(&HandlerRef::from_fn(clashing)).unwrap_err();
        assert!(matches!(err, ContractViolation::ReservedField { ref field, .. } if field == "err_msg"));

        let err = validate(&HandlerRef::from_fn(renamed)).unwrap_err();
        assert!(matches!(err, ContractViolation::ReservedField { ref field, .. } if field == "hint"));
    }
}
