//! Transport trait and implementations.
//!
//! The [`Transport`] trait is the only seam between the reconciliation
//! engine and the network. [`http::HttpTransport`] talks to a real manager;
//! [`MockTransport`] replays scripted responses and records every request.
//!
//! # Testing
//!
//! ```
//! use nsxkit::{Method, MockTransport, Request, Response, Transport};
//!
//! let mock = MockTransport::new();
//! mock.respond(Method::Get, "/api/2.0/services/ipset/scope/g-0", Response::ok("[]"));
//!
//! let response = mock
//!     .send(&Request::get("/api/2.0/services/ipset/scope/g-0"))
//!     .unwrap();
//! assert_eq!(response.status(), 200);
//! assert_eq!(mock.calls().len(), 1);
//! ```

pub mod http;

use crate::error::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// HTTP methods used by the configuration API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Whether a request with this method mutates remote state.
    #[must_use]
    pub fn is_write(&self) -> bool {
        !matches!(self, Self::Get)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An opaque request built by the per-kind builders in [`crate::api`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    path: String,
    body: Option<String>,
    if_match: Option<String>,
}

impl Request {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            if_match: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Attach a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let encoded =
            serde_json::to_string(body).map_err(|e| Error::InvalidRequest(e.to_string()))?;
        self.body = Some(encoded);
        Ok(self)
    }

    /// Attach an `If-Match` precondition carrying an ETag.
    pub fn if_match(mut self, etag: impl Into<String>) -> Self {
        self.if_match = Some(etag.into());
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn etag(&self) -> Option<&str> {
        self.if_match.as_deref()
    }

    /// Decode the JSON body, mostly useful in tests.
    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T> {
        let body = self
            .body
            .as_deref()
            .ok_or_else(|| Error::InvalidRequest(format!("{} {} has no body", self.method, self.path)))?;
        serde_json::from_str(body).map_err(|e| Error::InvalidRequest(e.to_string()))
    }
}

/// A response from the configuration API.
///
/// Every status code is represented here; interpreting it is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    etag: Option<String>,
    body: String,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            etag: None,
            body: body.into(),
        }
    }

    /// 200 with the given body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// The `ETag` response header, if the server sent one.
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    /// The raw response body.
    pub fn raw(&self) -> &str {
        &self.body
    }

    /// Whether the status is in the 200-399 range.
    pub fn is_success(&self) -> bool {
        (200..=399).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            Error::InvalidResponse(format!("{e} (status {}, body: {})", self.status, self.body))
        })
    }
}

/// Sends requests to the configuration API.
///
/// Implementations return `Err` only when no response was obtained.
pub trait Transport: Send + Sync {
    fn send(&self, request: &Request) -> Result<Response>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &Request) -> Result<Response> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: &Request) -> Result<Response> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: &Request) -> Result<Response> {
        (**self).send(request)
    }
}

type RouteKey = (Method, String);

/// Scripted transport for tests.
///
/// Responses are queued per method and path. The last queued response for a
/// route is repeated once the queue is down to one entry, so a single
/// `respond` call scripts a route for the whole test.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    routes: Arc<Mutex<HashMap<RouteKey, VecDeque<Response>>>>,
    failures: Arc<Mutex<HashMap<RouteKey, String>>>,
    calls: Arc<Mutex<Vec<Request>>>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for a route.
    pub fn respond(&self, method: Method, path: impl Into<String>, response: Response) {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        routes
            .entry((method, path.into()))
            .or_default()
            .push_back(response);
    }

    /// Make a route fail with a network error.
    pub fn fail(&self, method: Method, path: impl Into<String>, message: impl Into<String>) {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        failures.insert((method, path.into()), message.into());
    }

    /// Every request sent so far, in order.
    pub fn calls(&self) -> Vec<Request> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Requests sent to one route.
    pub fn calls_to(&self, method: Method, path: &str) -> Vec<Request> {
        self.calls()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    /// Requests that mutate remote state.
    pub fn writes(&self) -> Vec<Request> {
        self.calls()
            .into_iter()
            .filter(|r| r.method.is_write())
            .collect()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &Request) -> Result<Response> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(request.clone());

        let key = (request.method, request.path.clone());
        if let Some(message) = self.failures.lock().unwrap_or_else(PoisonError::into_inner).get(&key) {
            return Err(Error::network(request.method, &request.path, message.clone()));
        }

        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        let queue = routes.get_mut(&key).ok_or_else(|| {
            Error::network(request.method, &request.path, "no mock response configured")
        })?;

        let response = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };

        response.ok_or_else(|| {
            Error::network(request.method, &request.path, "no mock response configured")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builders() {
        let req = Request::put("/x").if_match("\"7\"");
        assert_eq!(req.method(), Method::Put);
        assert_eq!(req.path(), "/x");
        assert_eq!(req.etag(), Some("\"7\""));
        assert!(req.body().is_none());
    }

    #[test]
    fn test_request_json_body() {
        let req = Request::post("/x").json(&serde_json::json!({"name": "web"})).unwrap();
        let body: serde_json::Value = req.body_json().unwrap();
        assert_eq!(body["name"], "web");
    }

    #[test]
    fn test_response_success_range() {
        assert!(Response::new(200, "").is_success());
        assert!(Response::new(201, "").is_success());
        assert!(Response::new(399, "").is_success());
        assert!(!Response::new(400, "").is_success());
        assert!(!Response::new(412, "").is_success());
        assert!(Response::new(404, "").is_not_found());
    }

    #[test]
    fn test_response_json_error_carries_body() {
        let err = Response::new(500, "<html>boom</html>")
            .json::<serde_json::Value>()
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_mock_repeats_last_response() {
        let mock = MockTransport::new();
        mock.respond(Method::Get, "/a", Response::ok("1"));
        mock.respond(Method::Get, "/a", Response::ok("2"));

        let req = Request::get("/a");
        assert_eq!(mock.send(&req).unwrap().raw(), "1");
        assert_eq!(mock.send(&req).unwrap().raw(), "2");
        assert_eq!(mock.send(&req).unwrap().raw(), "2");
        assert_eq!(mock.calls_to(Method::Get, "/a").len(), 3);
    }

    #[test]
    fn test_mock_unknown_route_is_error() {
        let mock = MockTransport::new();
        assert!(mock.send(&Request::get("/missing")).is_err());
    }

    #[test]
    fn test_mock_failure_and_writes() {
        let mock = MockTransport::new();
        mock.fail(Method::Get, "/down", "connection reset");
        mock.respond(Method::Delete, "/obj", Response::ok(""));

        assert!(mock.send(&Request::get("/down")).is_err());
        mock.send(&Request::delete("/obj")).unwrap();

        let writes = mock.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].method(), Method::Delete);
    }
}
