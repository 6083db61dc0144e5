//! Request context types.
//!
//! The [`RequestContext`] is created by the transport for every inbound
//! request and handed to the handler unchanged. The dispatch layer only reads
//! the call depth from it.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::table::HttpMethod;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which keeps log lines for one request easy to
/// correlate and sort.
///
/// # Example
///
/// ```
/// use talaria_core::RequestId;
///
/// let id = RequestId::new();
/// assert_eq!(id.to_string().len(), 36);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-request context passed to every handler.
///
/// # Example
///
/// ```
/// use talaria_core::{HttpMethod, RequestContext};
///
/// let ctx = RequestContext::new()
///     .with_method(HttpMethod::Get)
///     .with_path("/api/users/42")
///     .with_param("id", "42")
///     .with_call_depth(2);
///
/// assert_eq!(ctx.param("id"), Some("42"));
/// assert_eq!(ctx.next_call_depth(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: RequestId,
    method: Option<HttpMethod>,
    path: String,
    route: Option<String>,
    params: HashMap<String, String>,
    call_depth: u32,
    remote_addr: Option<SocketAddr>,
    started_at: Instant,
}

impl RequestContext {
    /// Creates a context with a fresh request ID and depth 0.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(RequestId::new())
    }

    /// Creates a context with the given request ID.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            method: None,
            path: String::new(),
            route: None,
            params: HashMap::new(),
            call_depth: 0,
            remote_addr: None,
            started_at: Instant::now(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the HTTP method, if the transport recorded one.
    #[must_use]
    pub const fn method(&self) -> Option<HttpMethod> {
        self.method
    }

    /// Sets the HTTP method.
    #[must_use]
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    /// Returns the concrete request path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Sets the concrete request path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Returns the matched route pattern (e.g. `/api/users/{id}`).
    #[must_use]
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    /// Sets the matched route pattern.
    #[must_use]
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    /// Returns a path parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Returns all path parameters.
    #[must_use]
    pub const fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Adds a path parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Replaces all path parameters.
    #[must_use]
    pub fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    /// Returns how many services this call has already passed through.
    #[must_use]
    pub const fn call_depth(&self) -> u32 {
        self.call_depth
    }

    /// Sets the inbound call depth.
    #[must_use]
    pub fn with_call_depth(mut self, depth: u32) -> Self {
        self.call_depth = depth;
        self
    }

    /// Returns the depth a handler should forward on downstream calls.
    #[must_use]
    pub const fn next_call_depth(&self) -> u32 {
        self.call_depth.saturating_add(1)
    }

    /// Returns the peer address, if known.
    #[must_use]
    pub const fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Sets the peer address.
    #[must_use]
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Returns the elapsed time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
