//! Declarative command tables.
//!
//! A [`CommandTable`] is the application's list of routes. It is plain data:
//! building one never validates anything, that happens once in
//! [`Dispatcher::register`](crate::Dispatcher::register).
//!
//! # Example
//!
//! ```rust
//! use talaria_core::{BusinessError, CommandTable, HandlerResult, HttpMethod, RequestContext};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct EchoRequest { message: String }
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct EchoResponse { message: String }
//!
//! async fn echo(_ctx: RequestContext, req: EchoRequest) -> HandlerResult<EchoResponse> {
//!     if req.message.is_empty() {
//!         return Err(BusinessError::new(1, "empty message").into());
//!     }
//!     Ok(Some(EchoResponse { message: req.message }))
//! }
//!
//! let table = CommandTable::with_prefix("/api").post("/echo", echo);
//!
//! let entry = table.iter().next().unwrap();
//! assert_eq!(entry.method(), HttpMethod::Post);
//! assert_eq!(entry.path(), "/api/echo");
//! ```

use std::future::Future;

use crate::handler::{FnHandler, Handler, HandlerRef, HandlerResult};
use crate::message::Message;
use crate::RequestContext;

/// HTTP methods a command can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
    /// `PATCH`
    Patch,
    /// `HEAD`
    Head,
    /// `OPTIONS`
    Options,
}

impl HttpMethod {
    /// Returns the canonical upper-case method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    /// Parses a method name, ignoring ASCII case.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let method = match name.to_ascii_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "PATCH" => Self::Patch,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            _ => return None,
        };
        Some(method)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One route: method, full path and the handler bound to it.
#[derive(Clone)]
pub struct RouteEntry {
    method: HttpMethod,
    path: String,
    handler: HandlerRef,
}

impl RouteEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<String>, handler: HandlerRef) -> Self {
        Self {
            method,
            path: path.into(),
            handler,
        }
    }

    /// Returns the HTTP method.
    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    /// Returns the full route path, prefix included.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the handler reference.
    #[must_use]
    pub const fn handler(&self) -> &HandlerRef {
        &self.handler
    }
}

impl std::fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteEntry")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("handler", &self.handler)
            .finish()
    }
}

/// Ordered list of routes supplied by the application.
///
/// Iteration follows insertion order, which is also the order routes are
/// bound to the transport.
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    prefix: String,
    entries: Vec<RouteEntry>,
}

impl CommandTable {
    /// Creates an empty table without a path prefix.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty table whose entries all live under `prefix`.
    ///
    /// A trailing `/` on the prefix is ignored.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
            entries: Vec::new(),
        }
    }

    /// Returns the path prefix (empty if none).
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Appends a route bound to any [`Handler`] implementation.
    #[must_use]
    pub fn route<Req, Res, H>(mut self, method: HttpMethod, path: &str, handler: H) -> Self
    where
        Req: Message,
        Res: Message,
        H: Handler<Req, Res>,
    {
        self.push(method, path, HandlerRef::new(handler));
        self
    }

    /// Appends an already-erased route.
    pub fn push(&mut self, method: HttpMethod, path: &str, handler: HandlerRef) {
        let path = self.join(path);
        self.entries.push(RouteEntry::new(method, path, handler));
    }

    /// Appends a `GET` route bound to an async function.
    #[must_use]
    pub fn get<Req, Res, F, Fut>(self, path: &str, func: F) -> Self
    where
        Req: Message,
        Res: Message,
        F: Fn(RequestContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<Res>> + Send + 'static,
    {
        self.route(HttpMethod::Get, path, FnHandler::new(func))
    }

    /// Appends a `POST` route bound to an async function.
    #[must_use]
    pub fn post<Req, Res, F, Fut>(self, path: &str, func: F) -> Self
    where
        Req: Message,
        Res: Message,
        F: Fn(RequestContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<Res>> + Send + 'static,
    {
        self.route(HttpMethod::Post, path, FnHandler::new(func))
    }

    /// Appends a `PUT` route bound to an async function.
    #[must_use]
    pub fn put<Req, Res, F, Fut>(self, path: &str, func: F) -> Self
    where
        Req: Message,
        Res: Message,
        F: Fn(RequestContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<Res>> + Send + 'static,
    {
        self.route(HttpMethod::Put, path, FnHandler::new(func))
    }

    /// Appends a `DELETE` route bound to an async function.
    #[must_use]
    pub fn delete<Req, Res, F, Fut>(self, path: &str, func: F) -> Self
    where
        Req: Message,
        Res: Message,
        F: Fn(RequestContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<Res>> + Send + 'static,
    {
        self.route(HttpMethod::Delete, path, FnHandler::new(func))
    }

    /// Appends a `PATCH` route bound to an async function.
    #[must_use]
    pub fn patch<Req, Res, F, Fut>(self, path: &str, func: F) -> Self
    where
        Req: Message,
        Res: Message,
        F: Fn(RequestContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<Res>> + Send + 'static,
    {
        self.route(HttpMethod::Patch, path, FnHandler::new(func))
    }

    /// Returns the entries in registration order.
    pub fn iter(&self) -> std::slice::Iter<'_, RouteEntry> {
        self.entries.iter()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn join(&self, path: &str) -> String {
        if self.prefix.is_empty() {
            path.to_string()
        } else if path.is_empty() || path == "/" {
            self.prefix.clone()
        } else if path.starts_with('/') {
            format!("{}{}", self.prefix, path)
        } else {
            format!("{}/{}", self.prefix, path)
        }
    }
}

impl IntoIterator for CommandTable {
    type Item = RouteEntry;
    type IntoIter = std::vec::IntoIter<RouteEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a CommandTable {
    type Item = &'a RouteEntry;
    type IntoIter = std::slice::Iter<'a, RouteEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Ping {
        seq: u32,
    }

    async fn pong(_ctx: RequestContext, req: Ping) -> HandlerResult<Ping> {
        Ok(Some(req))
    }

    #[test]
    fn test_method_round_trip() {
        for method in [
            HttpMethod::Get,
            HttpMethod::Post,
            HttpMethod::Put,
            HttpMethod::Delete,
            HttpMethod::Patch,
            HttpMethod::Head,
            HttpMethod::Options,
        ] {
            assert_eq!(HttpMethod::parse(method.as_str()), Some(method));
        }
        assert_eq!(HttpMethod::parse("post"), Some(HttpMethod::Post));
        assert_eq!(HttpMethod::parse("BREW"), None);
    }

    #[test]
    fn test_table_preserves_order() {
        let table = CommandTable::new()
            .post("/b", pong)
            .get("/a", pong)
            .delete("/c", pong);

        let routes: Vec<_> = table
            .iter()
            .map(|e| (e.method(), e.path().to_string()))
            .collect();
        assert_eq!(
            routes,
            vec![
                (HttpMethod::Post, "/b".to_string()),
                (HttpMethod::Get, "/a".to_string()),
                (HttpMethod::Delete, "/c".to_string()),
            ]
        );
    }

    #[test]
    fn test_prefix_join() {
        let table = CommandTable::with_prefix("/api/")
            .post("/echo", pong)
            .post("hello", pong)
            .get("/", pong);

        let paths: Vec<_> = table.iter().map(RouteEntry::path).collect();
        assert_eq!(paths, vec!["/api/echo", "/api/hello", "/api"]);
        assert_eq!(table.prefix(), "/api");
    }

    #[test]
    fn test_empty_table() {
        let table = CommandTable::new();
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_entry_debug_shows_types() {
        let table = CommandTable::new().put("/ping", pong);
        let debug = format!("{:?}", table);
        assert!(debug.contains("/ping"));
        assert!(debug.contains("Ping"));
    }
}
