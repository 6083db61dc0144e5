//! Handler trait and type-erased handler references.
//!
//! A handler has the shape `(RequestContext, Req) -> Result<Option<Res>>`:
//!
//! - the context is passed by value (it is cheap to clone),
//! - `Req` and `Res` are concrete [`Message`] types,
//! - `Ok(None)` means "success, no content",
//! - `Err(_)` carries either a [`BusinessError`](crate::BusinessError) or any
//!   other error, which the dispatcher treats as internal.
//!
//! Handlers of different request/response types are stored side by side in a
//! [`CommandTable`](crate::CommandTable) through [`HandlerRef`].

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::codec::{Payload, RequestDecoder, ResponseEncoder};
use crate::contract;
use crate::error::{ContractViolation, DecodeError, EncodeError};
use crate::message::Message;
use crate::RequestContext;

/// Return type of every handler.
pub type HandlerResult<Res> = anyhow::Result<Option<Res>>;

/// A typed command handler.
///
/// # Example
///
/// ```rust
/// use talaria_core::{Handler, HandlerResult, RequestContext};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Default, Serialize, Deserialize)]
/// struct CountRequest { step: u32 }
///
/// #[derive(Default, Serialize, Deserialize)]
/// struct CountResponse { total: u64 }
///
/// struct Counter {
///     base: u64,
/// }
///
/// impl Handler<CountRequest, CountResponse> for Counter {
///     async fn handle(&self, _ctx: RequestContext, req: CountRequest) -> HandlerResult<CountResponse> {
///         Ok(Some(CountResponse { total: self.base + u64::from(req.step) }))
///     }
/// }
/// ```
pub trait Handler<Req, Res>: Send + Sync + 'static
where
    Req: Message,
    Res: Message,
{
    /// Handles one decoded request.
    ///
    /// # Errors
    ///
    /// Return a [`BusinessError`](crate::BusinessError) for expected
    /// failures the caller should see; anything else is reported to the
    /// caller as a generic internal error.
    fn handle(
        &self,
        ctx: RequestContext,
        request: Req,
    ) -> impl Future<Output = HandlerResult<Res>> + Send;
}

/// Adapts an async function into a [`Handler`].
pub struct FnHandler<F, Req, Res, Fut> {
    func: F,
    _phantom: PhantomData<fn(Req) -> (Res, Fut)>,
}

impl<F, Req, Res, Fut> FnHandler<F, Req, Res, Fut>
where
    F: Fn(RequestContext, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<Res>> + Send + 'static,
    Req: Message,
    Res: Message,
{
    /// Wraps `func`.
    #[must_use]
    pub const fn new(func: F) -> Self {
        Self {
            func,
            _phantom: PhantomData,
        }
    }
}

impl<F, Req, Res, Fut> Handler<Req, Res> for FnHandler<F, Req, Res, Fut>
where
    F: Fn(RequestContext, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<Res>> + Send + 'static,
    Req: Message,
    Res: Message,
{
    fn handle(
        &self,
        ctx: RequestContext,
        request: Req,
    ) -> impl Future<Output = HandlerResult<Res>> + Send {
        (self.func)(ctx, request)
    }
}

/// What a typed handler produced for one request, before classification.
#[derive(Debug)]
pub(crate) enum Completion {
    /// The body did not decode; the handler was not called.
    Rejected(DecodeError),
    /// The handler returned an error.
    Failed(anyhow::Error),
    /// The handler succeeded; the response was encoded (or failed to).
    Responded(Result<Payload, EncodeError>),
}

/// Object-safe view of a typed handler.
pub(crate) trait ErasedHandler: Send + Sync + 'static {
    fn request_type(&self) -> &'static str;

    fn response_type(&self) -> &'static str;

    fn check(&self) -> Result<(), ContractViolation>;

    fn call(&self, ctx: RequestContext, body: Bytes) -> BoxFuture<'static, Completion>;
}

struct TypedHandler<H, Req, Res> {
    handler: Arc<H>,
    _marker: PhantomData<fn(Req) -> Res>,
}

impl<H, Req, Res> ErasedHandler for TypedHandler<H, Req, Res>
where
    H: Handler<Req, Res>,
    Req: Message,
    Res: Message,
{
    fn request_type(&self) -> &'static str {
        std::any::type_name::<Req>()
    }

    fn response_type(&self) -> &'static str {
        std::any::type_name::<Res>()
    }

    fn check(&self) -> Result<(), ContractViolation> {
        contract::check_shape::<Req, Res>()
    }

    fn call(&self, ctx: RequestContext, body: Bytes) -> BoxFuture<'static, Completion> {
        let handler = Arc::clone(&self.handler);
        async move {
            let request = match RequestDecoder::decode::<Req>(&body) {
                Ok(request) => request,
                Err(e) => return Completion::Rejected(e),
            };

            match handler.handle(ctx, request).await {
                Ok(Some(response)) => Completion::Responded(ResponseEncoder::encode(&response)),
                Ok(None) => Completion::Responded(Ok(Payload::empty())),
                Err(e) => Completion::Failed(e),
            }
        }
        .boxed()
    }
}

/// Type-erased reference to a handler, as stored in a route entry.
///
/// Cloning is cheap; clones share the same handler.
#[derive(Clone)]
pub struct HandlerRef {
    inner: Arc<dyn ErasedHandler>,
}

impl HandlerRef {
    /// Erases a typed handler.
    #[must_use]
    pub fn new<Req, Res, H>(handler: H) -> Self
    where
        Req: Message,
        Res: Message,
        H: Handler<Req, Res>,
    {
        Self {
            inner: Arc::new(TypedHandler {
                handler: Arc::new(handler),
                _marker: PhantomData,
            }),
        }
    }

    /// Erases an async function.
    #[must_use]
    pub fn from_fn<Req, Res, F, Fut>(func: F) -> Self
    where
        Req: Message,
        Res: Message,
        F: Fn(RequestContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<Res>> + Send + 'static,
    {
        Self::new(FnHandler::new(func))
    }

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

    pub(crate) fn erased(&self) -> &Arc<dyn ErasedHandler> {
        &self.inner
    }
}

impl std::fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRef")
            .field("request", &self.request_type())
            .field("response", &self.response_type())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BusinessError;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Greet {
        name: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Greeting {
        greeting: String,
    }

    async fn greet(_ctx: RequestContext, req: Greet) -> HandlerResult<Greeting> {
        if req.name == "nobody" {
            return Err(BusinessError::new(404, "no such person").into());
        }
        Ok(Some(Greeting {
            greeting: format!("Hello, {}!", req.name),
        }))
    }

    struct Silent;

    impl Handler<Greet, Greeting> for Silent {
        async fn handle(&self, _ctx: RequestContext, _req: Greet) -> HandlerResult<Greeting> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_fn_handler_impl() {
        let handler = FnHandler::new(greet);
        let out = handler
            .handle(
                RequestContext::new(),
                Greet {
                    name: "World".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            out,
            Some(Greeting {
                greeting: "Hello, World!".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_erased_call_encodes_response() {
        let handler = HandlerRef::from_fn(greet);
        let completion = handler
            .erased()
            .call(RequestContext::new(), Bytes::from(r#"{"name":"Ada"}"#))
            .await;

        match completion {
            Completion::Responded(Ok(payload)) => {
                assert_eq!(payload.fields()["greeting"], "Hello, Ada!");
            }
            other => panic!("unexpected completion: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_erased_call_rejects_bad_body() {
        let handler = HandlerRef::from_fn(greet);
        let completion = handler
            .erased()
            .call(RequestContext::new(), Bytes::from("{not json"))
            .await;
        assert!(matches!(completion, Completion::Rejected(_)));
    }

    #[tokio::test]
    async fn test_erased_call_passes_errors_through() {
        let handler = HandlerRef::from_fn(greet);
        let completion = handler
            .erased()
            .call(RequestContext::new(), Bytes::from(r#"{"name":"nobody"}"#))
            .await;

        match completion {
            Completion::Failed(err) => {
                assert_eq!(err.downcast_ref::<BusinessError>().map(|b| b.code), Some(404));
            }
            other => panic!("unexpected completion: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_content_is_empty_payload() {
        let handler = HandlerRef::new(Silent);
        let completion = handler
            .erased()
            .call(RequestContext::new(), Bytes::new())
            .await;

        match completion {
            Completion::Responded(Ok(payload)) => assert!(payload.is_empty()),
            other => panic!("unexpected completion: {:?}", other),
        }
    }

    #[test]
    fn test_handler_ref_type_names() {
        let handler = HandlerRef::new(Silent);
        assert!(handler.request_type().ends_with("Greet"));
        assert!(handler.response_type().ends_with("Greeting"));

        let debug = format!("{:?}", handler);
        assert!(debug.contains("HandlerRef"));
    }
}
