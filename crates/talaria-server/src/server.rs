//! HTTP server implementation.
//!
//! Built on Hyper and Tokio. The server owns a [`Router`] that a
//! [`Dispatcher`](talaria_core::Dispatcher) binds command endpoints to, and
//! turns every inbound request into one endpoint call:
//!
//! - CORS preflights are answered before routing, when a policy is set,
//! - the route is matched before the body is read,
//! - the body is collected up to the configured size cap,
//! - `x-call-depth` and `x-request-id` headers seed the [`RequestContext`],
//! - matched path parameters are copied into the context,
//! - the endpoint's envelope is returned as `200 application/json`.
//!
//! Unknown routes get `404` and a system envelope; requests that exceed the
//! configured timeout get `504` and a system envelope. A body that cannot be
//! read or is over the cap yields a `REQUEST_BODY_READ_FAIL` envelope.
//!
//! # Example
//!
//! ```rust,ignore
//! use talaria_core::{CommandTable, Dispatcher};
//! use talaria_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut server = Server::new(ServerConfig::builder().http_addr("0.0.0.0:8080").build());
//!     Dispatcher::new(tracing::Dispatch::default()).register(table(), server.router_mut())?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use http::request::Parts;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use uuid::Uuid;

use talaria_core::{
    DispatchEnvelope, ErrorCode, ErrorTranslator, HttpMethod, RequestContext, RequestId,
};

use crate::config::{ServerConfig, ServerConfigBuilder};
use crate::cors::Cors;
use crate::error::ServerError;
use crate::router::Router;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Header carrying the number of services the call has passed through.
pub const CALL_DEPTH_HEADER: &str = "x-call-depth";

/// Header carrying the request ID, accepted inbound and echoed outbound.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Type alias for HTTP response body.
pub type ResponseBody = Full<Bytes>;

/// Type alias for the HTTP response.
pub type HttpResponse = Response<ResponseBody>;

/// The Talaria HTTP server.
pub struct Server {
    config: ServerConfig,
    router: Router,
}

impl Server {
    /// Creates a server with an empty router.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            router: Router::new(),
        }
    }

    /// Creates a new server builder.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Returns a reference to the router.
    #[must_use]
    pub const fn router(&self) -> &Router {
        &self.router
    }

    /// Returns a mutable reference to the router, for binding routes.
    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    /// Returns a reference to the server configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Runs the server until SIGTERM, SIGINT or SIGQUIT.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured address is invalid or cannot be
    /// bound.
    pub async fn run(self) -> Result<(), ServerError> {
        let shutdown = ShutdownSignal::with_os_signals();
        self.run_with_shutdown(shutdown).await
    }

    /// Binds the configured address and serves until `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured address is invalid or cannot be
    /// bound.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self
            .config
            .socket_addr()
            .map_err(|source| ServerError::InvalidAddress {
                addr: self.config.http_addr().to_string(),
                source,
            })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        self.serve(listener, shutdown).await
    }

    /// Serves connections from an already-bound listener until `shutdown`
    /// fires, then waits up to the shutdown timeout for connections to
    /// drain.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener's local address cannot be read.
    pub async fn serve(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        tracing::info!(
            addr = %local_addr,
            routes = self.router.route_count(),
            "server listening"
        );

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, remote_addr)) => {
                            let server = Arc::clone(&server);
                            let token = tracker.acquire();
                            let shutdown = shutdown.clone();

                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream, remote_addr, shutdown).await {
                                    tracing::debug!(peer = %remote_addr, error = %e, "connection error");
                                }
                                drop(token);
                            });
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "failed to accept connection");
                        }
                    }
                }

                () = shutdown.recv() => {
                    tracing::info!("shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        let shutdown_timeout = server.config.shutdown_timeout();
        tracing::info!(
            timeout = ?shutdown_timeout,
            active = tracker.active_connections(),
            "waiting for connections to drain"
        );

        tokio::select! {
            () = tracker.wait_for_drain() => {
                tracing::info!("all connections closed");
            }
            () = tokio::time::sleep(shutdown_timeout) => {
                tracing::warn!(
                    active = tracker.active_connections(),
                    "shutdown timeout reached, dropping remaining connections"
                );
            }
        }

        tracing::info!("server stopped");
        Ok(())
    }

    async fn handle_connection(
        self: &Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let server = Arc::clone(self);

        let service = service_fn(move |req: Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { server.handle_request(req, remote_addr).await }
        });

        let mut builder = http1::Builder::new();
        builder.keep_alive(self.config.keep_alive());
        let conn = builder.serve_connection(io, service);
        tokio::pin!(conn);

        tokio::select! {
            result = conn.as_mut() => result,
            () = shutdown.recv() => {
                tracing::debug!(peer = %remote_addr, "closing connection for shutdown");
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        }
    }

    async fn handle_request(
        self: &Arc<Self>,
        req: Request<Incoming>,
        remote_addr: SocketAddr,
    ) -> Result<HttpResponse, Infallible> {
        let started = Instant::now();
        let (parts, body) = req.into_parts();
        let request_id = request_id_from(&parts.headers);

        let work = self.route_request(&parts, body, request_id, Some(remote_addr));

        let mut response = match self.config.request_timeout() {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(response) => response,
                Err(_) => {
                    tracing::warn!(
                        method = %parts.method,
                        path = %parts.uri.path(),
                        request_id = %request_id,
                        timeout = ?limit,
                        "request timed out"
                    );
                    system_response(StatusCode::GATEWAY_TIMEOUT, request_id, "request timed out")
                }
            },
            None => work.await,
        };

        if let Some(cors) = self.config.cors() {
            if !cors.is_preflight(&parts.method, &parts.headers) {
                cors.apply(&parts.headers, response.headers_mut());
            }
        }

        tracing::info!(
            method = %parts.method,
            path = %parts.uri.path(),
            status = response.status().as_u16(),
            latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            peer = %remote_addr,
            request_id = %request_id,
            "request completed"
        );

        Ok(response)
    }

    /// Routes one request. The body is only read once a route matched.
    async fn route_request<B>(
        &self,
        parts: &Parts,
        body: B,
        request_id: RequestId,
        remote_addr: Option<SocketAddr>,
    ) -> HttpResponse
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        if let Some(cors) = self.config.cors() {
            if cors.is_preflight(&parts.method, &parts.headers) {
                return preflight_response(cors, parts, request_id);
            }
        }

        let path = parts.uri.path();
        let route = HttpMethod::parse(parts.method.as_str())
            .and_then(|method| self.router.match_route(method, path).map(|m| (method, m)));

        let Some((method, route)) = route else {
            return system_response(
                StatusCode::NOT_FOUND,
                request_id,
                format!("no route for {} {}", parts.method, path),
            );
        };

        let limit = self.config.max_body_size();
        let body = match Limited::new(body, limit).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                let diagnostic = if e.is::<LengthLimitError>() {
                    format!("request body exceeds {limit} bytes")
                } else {
                    e.to_string()
                };
                tracing::warn!(path = %path, request_id = %request_id, error = %diagnostic, "failed to read request body");
                let envelope = DispatchEnvelope::failure(ErrorTranslator::internal(
                    ErrorCode::RequestBodyReadFail,
                    diagnostic,
                ));
                return envelope_response(StatusCode::OK, request_id, Bytes::from(envelope.to_bytes()));
            }
        };

        let (pattern, params, endpoint) = route.into_parts();
        let mut ctx = RequestContext::with_request_id(request_id)
            .with_method(method)
            .with_path(path)
            .with_route(pattern)
            .with_params(params)
            .with_call_depth(call_depth_from(&parts.headers));
        if let Some(addr) = remote_addr {
            ctx = ctx.with_remote_addr(addr);
        }

        let envelope = endpoint(ctx, body).await;
        envelope_response(StatusCode::OK, request_id, envelope)
    }
}

/// Builder for configuring and creating a [`Server`].
///
/// # Example
///
/// ```rust
/// use talaria_server::ServerBuilder;
/// use std::time::Duration;
///
/// let server = ServerBuilder::new()
///     .http_addr("0.0.0.0:9090")
///     .shutdown_timeout(Duration::from_secs(10))
///     .request_timeout(Some(Duration::from_secs(30)))
///     .build();
///
/// assert_eq!(server.config().http_addr(), "0.0.0.0:9090");
/// ```
#[derive(Debug, Default)]
pub struct ServerBuilder {
    config_builder: ServerConfigBuilder,
    router: Option<Router>,
}

impl ServerBuilder {
    /// Creates a new server builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration.
    #[must_use]
    pub fn config(mut self, config: &ServerConfig) -> Self {
        self.config_builder = ServerConfigBuilder::new()
            .http_addr(config.http_addr())
            .shutdown_timeout(config.shutdown_timeout())
            .request_timeout(config.request_timeout())
            .keep_alive(config.keep_alive())
            .max_body_size(config.max_body_size())
            .cors(config.cors().cloned());
        self
    }

    /// Uses a router with routes already bound.
    #[must_use]
    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    /// Sets the HTTP bind address.
    #[must_use]
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.http_addr(addr);
        self
    }

    /// Sets the graceful shutdown timeout.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config_builder = self.config_builder.shutdown_timeout(timeout);
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Option<std::time::Duration>) -> Self {
        self.config_builder = self.config_builder.request_timeout(timeout);
        self
    }

    /// Enables or disables keep-alive.
    #[must_use]
    pub fn keep_alive(mut self, enabled: bool) -> Self {
        self.config_builder = self.config_builder.keep_alive(enabled);
        self
    }

    /// Sets the request body cap in bytes.
    #[must_use]
    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.config_builder = self.config_builder.max_body_size(bytes);
        self
    }

    /// Sets the CORS policy.
    #[must_use]
    pub fn cors(mut self, cors: Cors) -> Self {
        self.config_builder = self.config_builder.cors(Some(cors));
        self
    }

    /// Builds the server.
    #[must_use]
    pub fn build(self) -> Server {
        Server {
            config: self.config_builder.build(),
            router: self.router.unwrap_or_default(),
        }
    }
}

fn request_id_from(headers: &HeaderMap) -> RequestId {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .map_or_else(RequestId::new, RequestId::from_uuid)
}

/// Missing or malformed depth headers count as depth 0.
fn call_depth_from(headers: &HeaderMap) -> u32 {
    headers
        .get(CALL_DEPTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

/// `204` with the allow headers, or `403` with a system envelope.
fn preflight_response(cors: &Cors, parts: &Parts, request_id: RequestId) -> HttpResponse {
    match cors.preflight(&parts.headers) {
        Ok(headers) => {
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::NO_CONTENT;
            response.headers_mut().extend(headers);
            response
        }
        Err(rejection) => {
            tracing::debug!(path = %parts.uri.path(), request_id = %request_id, reason = %rejection, "preflight rejected");
            system_response(StatusCode::FORBIDDEN, request_id, rejection.to_string())
        }
    }
}

fn system_response(status: StatusCode, request_id: RequestId, diagnostic: impl Into<String>) -> HttpResponse {
    let envelope = DispatchEnvelope::failure(ErrorTranslator::internal(ErrorCode::System, diagnostic));
    envelope_response(status, request_id, Bytes::from(envelope.to_bytes()))
}

fn envelope_response(status: StatusCode, request_id: RequestId, body: Bytes) -> HttpResponse {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
