//! Request routing and path matching.
//!
//! The router is the HTTP [`RoutingSurface`]: the dispatcher binds one
//! endpoint per command, and the server looks endpoints up by method and
//! path. Patterns may contain `{name}` segments, whose percent-decoded
//! values are handed to the handler through the request context.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use futures_util::FutureExt;
//! use talaria_core::{Endpoint, HttpMethod, RequestContext, RoutingSurface};
//! use talaria_server::Router;
//!
//! let endpoint: Endpoint = Arc::new(|_ctx: RequestContext, body: Bytes| async move { body }.boxed());
//!
//! let mut router = Router::new();
//! router.bind(HttpMethod::Get, "/users/{userId}", endpoint);
//!
//! let m = router.match_route(HttpMethod::Get, "/users/123").unwrap();
//! assert_eq!(m.pattern(), "/users/{userId}");
//! assert_eq!(m.param("userId"), Some("123"));
//! ```

use std::collections::HashMap;

use talaria_core::{Endpoint, HttpMethod, RoutingSurface};

/// A matched route with extracted path parameters.
///
/// Returned by [`Router::match_route`] when a route is found.
#[derive(Clone)]
pub struct RouteMatch {
    /// The registered pattern, e.g. `/users/{userId}`
    pattern: String,

    /// Extracted path parameters
    params: HashMap<String, String>,

    endpoint: Endpoint,
}

impl RouteMatch {
    /// Returns the pattern of the matched route.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the extracted path parameters.
    #[must_use]
    pub const fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Returns a specific path parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Returns the bound endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Splits the match into its parts.
    #[must_use]
    pub fn into_parts(self) -> (String, HashMap<String, String>, Endpoint) {
        (self.pattern, self.params, self.endpoint)
    }
}

impl std::fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteMatch")
            .field("pattern", &self.pattern)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// A segment of a path template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    /// A literal segment (e.g., "users")
    Literal(String),

    /// A parameter segment (e.g., "{userId}")
    Param(String),
}

#[derive(Clone)]
struct Route {
    method: HttpMethod,
    segments: Vec<PathSegment>,
    pattern: String,
    endpoint: Endpoint,
}

impl Route {
    fn new(method: HttpMethod, pattern: &str, endpoint: Endpoint) -> Self {
        Self {
            method,
            segments: Self::parse_segments(pattern),
            pattern: pattern.to_string(),
            endpoint,
        }
    }

    fn parse_segments(pattern: &str) -> Vec<PathSegment> {
        pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => PathSegment::Param(name.to_string()),
                None => PathSegment::Literal(s.to_string()),
            })
            .collect()
    }

    /// Returns extracted parameters if the route matches `path`.
    fn match_path(&self, path: &str) -> Option<HashMap<String, String>> {
        let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if path_segments.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();

        for (pattern, actual) in self.segments.iter().zip(path_segments) {
            match pattern {
                PathSegment::Literal(expected) => {
                    if expected != actual {
                        return None;
                    }
                }
                PathSegment::Param(name) => {
                    params.insert(name.clone(), decode_segment(actual));
                }
            }
        }

        Some(params)
    }
}

/// Percent-decodes a parameter value. Values that do not decode to UTF-8
/// are kept as sent.
fn decode_segment(raw: &str) -> String {
    urlencoding::decode(raw).map_or_else(|_| raw.to_string(), |v| v.into_owned())
}

/// HTTP request router.
///
/// Routes are checked in binding order; the first match wins. Trailing and
/// repeated slashes are ignored.
#[derive(Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Creates a new empty router.
    #[must_use]
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Returns the number of bound routes.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Matches a request to a route.
    #[must_use]
    pub fn match_route(&self, method: HttpMethod, path: &str) -> Option<RouteMatch> {
        self.routes
            .iter()
            .filter(|route| route.method == method)
            .find_map(|route| {
                route.match_path(path).map(|params| RouteMatch {
                    pattern: route.pattern.clone(),
                    params,
                    endpoint: route.endpoint.clone(),
                })
            })
    }

    /// Returns `(method, pattern)` for every bound route, in binding order.
    pub fn routes(&self) -> impl Iterator<Item = (HttpMethod, &str)> {
        self.routes.iter().map(|r| (r.method, r.pattern.as_str()))
    }
}

impl RoutingSurface for Router {
    fn bind(&mut self, method: HttpMethod, path: &str, endpoint: Endpoint) {
        self.routes.push(Route::new(method, path, endpoint));
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.routes()).finish()
    }
}
