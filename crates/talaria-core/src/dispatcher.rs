//! Binding command tables to a transport.
//!
//! The [`Dispatcher`] validates every entry of a [`CommandTable`] and then
//! hands one [`Endpoint`] per route to a [`RoutingSurface`]. An endpoint takes
//! the request context and raw body and always answers with a serialized
//! [`DispatchEnvelope`]; it never fails and never unwinds.
//!
//! Per-request pipeline:
//!
//! 1. reject calls deeper than [`DispatchOptions::max_call_depth`],
//! 2. decode the body into the handler's request type,
//! 3. run the handler, catching panics,
//! 4. translate errors or encode the response,
//! 5. wrap the outcome in the envelope.

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

use crate::contract::{validate, ValidatedHandler};
use crate::envelope::DispatchEnvelope;
use crate::error::{ErrorCode, RegistrationError};
use crate::handler::Completion;
use crate::table::{CommandTable, HttpMethod};
use crate::translate::ErrorTranslator;
use crate::RequestContext;

/// Default limit on inbound call depth.
pub const DEFAULT_MAX_CALL_DEPTH: u32 = 16;

/// A bound route as seen by the transport.
pub type Endpoint = Arc<dyn Fn(RequestContext, Bytes) -> BoxFuture<'static, Bytes> + Send + Sync>;

/// Anything routes can be bound to: an HTTP router, a test recorder.
pub trait RoutingSurface {
    /// Binds `endpoint` to `method` and `path`.
    fn bind(&mut self, method: HttpMethod, path: &str, endpoint: Endpoint);
}

/// Tunables for the dispatch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Requests whose inbound call depth is greater than this are rejected
    /// with [`ErrorCode::ExceedMaxCallDepth`] before the handler runs.
    pub max_call_depth: u32,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

/// Registers command tables against a routing surface.
///
/// The logger is injected rather than taken from the global default, so
/// several dispatchers in one process can log to different places.
///
/// # Example
///
/// ```rust
/// use talaria_core::{CommandTable, Dispatcher, Endpoint, HandlerResult, HttpMethod, RequestContext, RoutingSurface};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Default, Serialize, Deserialize)]
/// struct Hello { name: String }
///
/// async fn hello(_ctx: RequestContext, req: Hello) -> HandlerResult<Hello> {
///     Ok(Some(req))
/// }
///
/// #[derive(Default)]
/// struct Paths(Vec<String>);
///
/// impl RoutingSurface for Paths {
///     fn bind(&mut self, method: HttpMethod, path: &str, _endpoint: Endpoint) {
///         self.0.push(format!("{method} {path}"));
///     }
/// }
///
/// let table = CommandTable::with_prefix("/api").post("/hello", hello);
/// let mut paths = Paths::default();
/// let bound = Dispatcher::new(tracing::Dispatch::none())
///     .register(table, &mut paths)
///     .unwrap();
///
/// assert_eq!(bound, 1);
/// assert_eq!(paths.0, vec!["POST /api/hello"]);
/// ```
#[derive(Debug, Clone)]
pub struct Dispatcher {
    logger: Dispatch,
    options: DispatchOptions,
}

impl Dispatcher {
    /// Creates a dispatcher with default options.
    #[must_use]
    pub fn new(logger: Dispatch) -> Self {
        Self::with_options(logger, DispatchOptions::default())
    }

    /// Creates a dispatcher with explicit options.
    #[must_use]
    pub const fn with_options(logger: Dispatch, options: DispatchOptions) -> Self {
        Self { logger, options }
    }

    /// Returns the options.
    #[must_use]
    pub const fn options(&self) -> DispatchOptions {
        self.options
    }

    /// Returns the injected logger.
    #[must_use]
    pub const fn logger(&self) -> &Dispatch {
        &self.logger
    }

    /// Validates every entry of `table`, then binds each to `router` in table
    /// order. Returns the number of routes bound.
    ///
    /// Nothing is bound unless every entry is valid.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegistrationError`] found, naming the offending
    /// route. Callers are expected to abort startup on error.
    pub fn register<R>(&self, table: CommandTable, router: &mut R) -> Result<usize, RegistrationError>
    where
        R: RoutingSurface + ?Sized,
    {
        tracing::dispatcher::with_default(&self.logger, || {
            let routes = Self::validate_table(table)?;
            let count = routes.len();

            for (method, path, handler) in routes {
                tracing::info!(
                    method = %method,
                    path = %path,
                    request = handler.request_type(),
                    response = handler.response_type(),
                    "route registered"
                );
                let endpoint = self.endpoint(method, &path, handler);
                router.bind(method, &path, endpoint);
            }

            Ok(count)
        })
    }

    fn validate_table(
        table: CommandTable,
    ) -> Result<Vec<(HttpMethod, String, ValidatedHandler)>, RegistrationError> {
        let mut seen = HashSet::new();
        let mut routes = Vec::with_capacity(table.len());

        for entry in table {
            let method = entry.method();
            let path = entry.path().to_string();

            if !path.starts_with('/') {
                return Err(RegistrationError::InvalidPath { method, path });
            }
            if !seen.insert((method, route_shape(&path))) {
                return Err(RegistrationError::DuplicateRoute { method, path });
            }

            let handler = validate(entry.handler()).map_err(|violation| {
                RegistrationError::Contract {
                    method,
                    path: path.clone(),
                    violation,
                }
            })?;
            routes.push((method, path, handler));
        }

        Ok(routes)
    }

    fn endpoint(&self, method: HttpMethod, path: &str, handler: ValidatedHandler) -> Endpoint {
        let route = Arc::new(BoundRoute {
            method,
            path: path.to_string(),
            handler,
            max_call_depth: self.options.max_call_depth,
        });
        let logger = self.logger.clone();

        Arc::new(move |ctx: RequestContext, body: Bytes| {
            let route = Arc::clone(&route);
            async move { Bytes::from(route.dispatch(ctx, body).await.to_bytes()) }
                .with_subscriber(logger.clone())
                .boxed()
        })
    }
}

struct BoundRoute {
    method: HttpMethod,
    path: String,
    handler: ValidatedHandler,
    max_call_depth: u32,
}

impl BoundRoute {
    async fn dispatch(&self, ctx: RequestContext, body: Bytes) -> DispatchEnvelope {
        let request_id = ctx.request_id();
        let depth = ctx.call_depth();

        tracing::info!(
            method = %self.method,
            route = %self.path,
            request_id = %request_id,
            call_depth = depth,
            "dispatching request"
        );

        if depth > self.max_call_depth {
            tracing::error!(
                route = %self.path,
                request_id = %request_id,
                call_depth = depth,
                max_call_depth = self.max_call_depth,
                "call depth exceeded"
            );
            return DispatchEnvelope::failure(ErrorTranslator::internal(
                ErrorCode::ExceedMaxCallDepth,
                format!("call depth {depth} exceeds {}", self.max_call_depth),
            ));
        }

        let completion = match AssertUnwindSafe(self.handler.call(ctx, body))
            .catch_unwind()
            .await
        {
            Ok(completion) => completion,
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                tracing::error!(
                    route = %self.path,
                    request_id = %request_id,
                    panic = %reason,
                    "handler panicked"
                );
                return DispatchEnvelope::failure(ErrorTranslator::internal(
                    ErrorCode::PanicInHandler,
                    reason,
                ));
            }
        };

        match completion {
            Completion::Rejected(e) => {
                tracing::warn!(
                    route = %self.path,
                    request_id = %request_id,
                    error = %e,
                    "request body rejected"
                );
                DispatchEnvelope::failure(ErrorTranslator::internal(
                    ErrorCode::RequestBodyReadFail,
                    e.to_string(),
                ))
            }
            Completion::Failed(e) => {
                let translation = ErrorTranslator::translate(Some(&e));
                match &translation.diagnostic {
                    Some(diagnostic) => tracing::error!(
                        route = %self.path,
                        request_id = %request_id,
                        error = %diagnostic,
                        "handler failed"
                    ),
                    None => tracing::debug!(
                        route = %self.path,
                        request_id = %request_id,
                        err_code = translation.code,
                        "business error"
                    ),
                }
                DispatchEnvelope::failure(translation)
            }
            Completion::Responded(Err(e)) => {
                tracing::error!(
                    route = %self.path,
                    request_id = %request_id,
                    error = %e,
                    "response encoding failed"
                );
                DispatchEnvelope::failure(ErrorTranslator::internal(
                    ErrorCode::ResponseMarshalFail,
                    e.to_string(),
                ))
            }
            Completion::Responded(Ok(payload)) => DispatchEnvelope::success(payload),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// The form a transport sees when matching `path`.
///
/// Empty segments are dropped and parameter names are erased, so `/x`,
/// `/x/` and `//x` share a shape, as do `/items/{a}` and `/items/{b}`.
fn route_shape(path: &str) -> String {
    let segments: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            if s.starts_with('{') && s.ends_with('}') {
                "{}"
            } else {
                s
            }
        })
        .collect();
    format!("/{}", segments.join("/"))
}
