//! Cross-origin resource sharing.
//!
//! When a [`Cors`] policy is configured, the server answers preflight
//! `OPTIONS` requests itself, before routing, and decorates every other
//! response with the allow-origin headers. Preflights never reach a
//! dispatched command.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use http::Method;
//! use talaria_server::cors::Cors;
//!
//! let cors = Cors::builder()
//!     .allow_origin("https://app.example.com")
//!     .allow_methods([Method::GET, Method::POST])
//!     .allow_headers(["Content-Type", "X-Request-ID"])
//!     .max_age(Duration::from_secs(3600))
//!     .build();
//!
//! assert!(cors.allowed_origins().is_allowed("https://app.example.com"));
//! assert!(!cors.allowed_origins().is_allowed("https://evil.example.com"));
//! ```

use std::collections::HashSet;
use std::time::Duration;

use http::header::HeaderMap;
use http::{HeaderValue, Method};
use thiserror::Error;

/// CORS header names.
pub mod headers {
    /// `Access-Control-Allow-Origin` header.
    pub const ALLOW_ORIGIN: &str = "access-control-allow-origin";
    /// `Access-Control-Allow-Methods` header.
    pub const ALLOW_METHODS: &str = "access-control-allow-methods";
    /// `Access-Control-Allow-Headers` header.
    pub const ALLOW_HEADERS: &str = "access-control-allow-headers";
    /// `Access-Control-Allow-Credentials` header.
    pub const ALLOW_CREDENTIALS: &str = "access-control-allow-credentials";
    /// `Access-Control-Max-Age` header.
    pub const MAX_AGE: &str = "access-control-max-age";
    /// `Access-Control-Expose-Headers` header.
    pub const EXPOSE_HEADERS: &str = "access-control-expose-headers";
    /// `Access-Control-Request-Method` header (preflight).
    pub const REQUEST_METHOD: &str = "access-control-request-method";
    /// `Access-Control-Request-Headers` header (preflight).
    pub const REQUEST_HEADERS: &str = "access-control-request-headers";
    /// `Origin` header.
    pub const ORIGIN: &str = "origin";
    /// `Vary` header.
    pub const VARY: &str = "vary";
}

/// Default preflight cache lifetime.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(86_400);

/// The set of allowed origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    /// Allow any origin (wildcard `*`).
    Any,
    /// Allow specific origins.
    List(HashSet<String>),
}

impl AllowedOrigins {
    /// Checks if an origin is allowed.
    #[must_use]
    pub fn is_allowed(&self, origin: &str) -> bool {
        match self {
            Self::Any => true,
            Self::List(origins) => origins.contains(origin),
        }
    }

    /// Returns the `Access-Control-Allow-Origin` value for `origin`, if
    /// it is allowed.
    #[must_use]
    pub fn header_value(&self, origin: &str) -> Option<HeaderValue> {
        match self {
            Self::Any => Some(HeaderValue::from_static("*")),
            Self::List(origins) if origins.contains(origin) => HeaderValue::from_str(origin).ok(),
            Self::List(_) => None,
        }
    }
}

/// Why a preflight request was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreflightRejection {
    /// The request carried no readable `Origin` header.
    #[error("missing Origin header")]
    MissingOrigin,

    /// The origin is not on the allow list.
    #[error("origin '{0}' not allowed")]
    Origin(String),

    /// The requested method is not allowed.
    #[error("method '{0}' not allowed")]
    Method(String),

    /// A requested header is not allowed.
    #[error("header '{0}' not allowed")]
    Header(String),
}

/// A CORS policy.
///
/// The default policy allows no origins, so it only ever rejects
/// preflights and never decorates responses.
#[derive(Debug, Clone)]
pub struct Cors {
    allowed_origins: AllowedOrigins,
    allowed_methods: HashSet<Method>,
    allowed_headers: HashSet<String>,
    expose_headers: HashSet<String>,
    allow_credentials: bool,
    max_age: Option<Duration>,
}

impl Default for Cors {
    fn default() -> Self {
        Self {
            allowed_origins: AllowedOrigins::List(HashSet::new()),
            allowed_methods: HashSet::from([
                Method::GET,
                Method::HEAD,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::PATCH,
            ]),
            allowed_headers: HashSet::from([
                "content-type".to_string(),
                "authorization".to_string(),
                "x-request-id".to_string(),
                "x-call-depth".to_string(),
            ]),
            expose_headers: HashSet::new(),
            allow_credentials: false,
            max_age: Some(DEFAULT_MAX_AGE),
        }
    }
}

impl Cors {
    /// Creates a new CORS builder.
    #[must_use]
    pub fn builder() -> CorsBuilder {
        CorsBuilder::new()
    }

    /// A policy that allows any origin, method and header.
    ///
    /// Meant for development.
    #[must_use]
    pub fn permissive() -> Self {
        CorsBuilder::new()
            .allow_any_origin()
            .allow_methods([
                Method::GET,
                Method::HEAD,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::PATCH,
                Method::OPTIONS,
            ])
            .allow_headers(["*"])
            .expose_headers(["x-request-id"])
            .build()
    }

    /// Returns the allowed origins.
    #[must_use]
    pub const fn allowed_origins(&self) -> &AllowedOrigins {
        &self.allowed_origins
    }

    /// Returns `true` if `method` may be requested cross-origin.
    #[must_use]
    pub fn allows_method(&self, method: &Method) -> bool {
        self.allowed_methods.contains(method)
    }

    /// Returns `true` if the request header `name` may be sent.
    #[must_use]
    pub fn allows_header(&self, name: &str) -> bool {
        self.allowed_headers.contains("*") || self.allowed_headers.contains(&name.to_ascii_lowercase())
    }

    /// Returns whether credentials are allowed.
    #[must_use]
    pub const fn allow_credentials(&self) -> bool {
        self.allow_credentials
    }

    /// Returns the preflight cache lifetime.
    #[must_use]
    pub const fn max_age(&self) -> Option<Duration> {
        self.max_age
    }

    /// Returns `true` for an `OPTIONS` request carrying both `Origin` and
    /// `Access-Control-Request-Method`.
    #[must_use]
    pub fn is_preflight(&self, method: &Method, request_headers: &HeaderMap) -> bool {
        method == Method::OPTIONS
            && request_headers.contains_key(headers::ORIGIN)
            && request_headers.contains_key(headers::REQUEST_METHOD)
    }

    /// Checks a preflight request and returns the headers of the `204`
    /// answer.
    ///
    /// # Errors
    ///
    /// Returns a [`PreflightRejection`] if the origin, the requested method
    /// or any requested header is not allowed.
    pub fn preflight(&self, request_headers: &HeaderMap) -> Result<HeaderMap, PreflightRejection> {
        let origin = origin_of(request_headers).ok_or(PreflightRejection::MissingOrigin)?;
        let allow_origin = self
            .allowed_origins
            .header_value(origin)
            .ok_or_else(|| PreflightRejection::Origin(origin.to_string()))?;

        if let Some(requested) = request_headers.get(headers::REQUEST_METHOD) {
            let name = requested.to_str().unwrap_or_default().trim();
            match name.parse::<Method>() {
                Ok(method) if self.allows_method(&method) => {}
                _ => return Err(PreflightRejection::Method(name.to_string())),
            }
        }

        if let Some(requested) = request_headers.get(headers::REQUEST_HEADERS) {
            let list = requested.to_str().unwrap_or_default();
            for name in list.split(',').map(str::trim).filter(|h| !h.is_empty()) {
                if !self.allows_header(name) {
                    return Err(PreflightRejection::Header(name.to_ascii_lowercase()));
                }
            }
        }

        let mut out = HeaderMap::new();
        out.insert(headers::ALLOW_ORIGIN, allow_origin);
        insert_list(&mut out, headers::ALLOW_METHODS, self.allowed_methods.iter().map(Method::as_str));
        insert_list(&mut out, headers::ALLOW_HEADERS, self.allowed_headers.iter().map(String::as_str));
        if self.allow_credentials {
            out.insert(headers::ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
        if let Some(max_age) = self.max_age {
            out.insert(headers::MAX_AGE, HeaderValue::from(max_age.as_secs()));
        }
        out.insert(
            headers::VARY,
            HeaderValue::from_static("Origin, Access-Control-Request-Method, Access-Control-Request-Headers"),
        );
        Ok(out)
    }

    /// Adds CORS headers to a non-preflight response.
    ///
    /// Requests without an allowed `Origin` are left untouched.
    pub fn apply(&self, request_headers: &HeaderMap, response_headers: &mut HeaderMap) {
        let Some(allow_origin) = origin_of(request_headers)
            .and_then(|origin| self.allowed_origins.header_value(origin))
        else {
            return;
        };

        response_headers.insert(headers::ALLOW_ORIGIN, allow_origin);
        if self.allow_credentials {
            response_headers.insert(headers::ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
        insert_list(
            response_headers,
            headers::EXPOSE_HEADERS,
            self.expose_headers.iter().map(String::as_str),
        );
        response_headers.insert(headers::VARY, HeaderValue::from_static("Origin"));
    }
}

fn origin_of(request_headers: &HeaderMap) -> Option<&str> {
    request_headers
        .get(headers::ORIGIN)
        .and_then(|v| v.to_str().ok())
}

/// Inserts a sorted, comma-separated list. Empty lists are skipped.
fn insert_list<'a>(out: &mut HeaderMap, name: &'static str, items: impl Iterator<Item = &'a str>) {
    let mut items: Vec<&str> = items.collect();
    if items.is_empty() {
        return;
    }
    items.sort_unstable();
    if let Ok(value) = HeaderValue::from_str(&items.join(", ")) {
        out.insert(name, value);
    }
}

/// Builder for [`Cors`].
#[derive(Debug, Clone, Default)]
pub struct CorsBuilder {
    cors: Cors,
}

impl CorsBuilder {
    /// Creates a builder with the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows any origin (wildcard `*`).
    ///
    /// Browsers refuse a wildcard origin together with credentials.
    #[must_use]
    pub fn allow_any_origin(mut self) -> Self {
        self.cors.allowed_origins = AllowedOrigins::Any;
        self
    }

    /// Adds an allowed origin. Has no effect once any origin is allowed.
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        if let AllowedOrigins::List(origins) = &mut self.cors.allowed_origins {
            origins.insert(origin.into());
        }
        self
    }

    /// Replaces the allowed origins. A `*` entry allows any origin.
    #[must_use]
    pub fn allow_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let origins: HashSet<String> = origins.into_iter().map(Into::into).collect();
        self.cors.allowed_origins = if origins.contains("*") {
            AllowedOrigins::Any
        } else {
            AllowedOrigins::List(origins)
        };
        self
    }

    /// Replaces the allowed methods.
    #[must_use]
    pub fn allow_methods<I>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        self.cors.allowed_methods = methods.into_iter().collect();
        self
    }

    /// Adds an allowed request header.
    #[must_use]
    pub fn allow_header(mut self, header: impl Into<String>) -> Self {
        self.cors
            .allowed_headers
            .insert(header.into().to_ascii_lowercase());
        self
    }

    /// Replaces the allowed request headers. `*` allows any header.
    #[must_use]
    pub fn allow_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cors.allowed_headers = headers
            .into_iter()
            .map(|h| h.into().to_ascii_lowercase())
            .collect();
        self
    }

    /// Replaces the response headers exposed to scripts.
    #[must_use]
    pub fn expose_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cors.expose_headers = headers
            .into_iter()
            .map(|h| h.into().to_ascii_lowercase())
            .collect();
        self
    }

    /// Sets whether credentials are allowed.
    #[must_use]
    pub const fn allow_credentials(mut self, allow: bool) -> Self {
        self.cors.allow_credentials = allow;
        self
    }

    /// Sets the preflight cache lifetime.
    #[must_use]
    pub const fn max_age(mut self, duration: Duration) -> Self {
        self.cors.max_age = Some(duration);
        self
    }

    /// Disables preflight caching.
    #[must_use]
    pub const fn no_max_age(mut self) -> Self {
        self.cors.max_age = None;
        self
    }

    /// Builds the policy.
    #[must_use]
    pub fn build(self) -> Cors {
        self.cors
    }
}
