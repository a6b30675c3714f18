//! HTTP client abstraction.
//!
//! Source, destination and cursor transports are written against
//! [`HttpClient`] so the blocking client can be swapped out. [`UreqClient`]
//! is the production implementation; [`MockHttpClient`] answers from a
//! table of canned responses for tests.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Largest response body accepted, in bytes.
const MAX_BODY_BYTES: u64 = 512 * 1024 * 1024;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET.
    Get,
    /// POST.
    Post,
    /// PUT.
    Put,
}

/// A fully buffered request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Body; empty for GET.
    pub body: Vec<u8>,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl HttpRequest {
    /// Creates a request with no headers and a 30 second timeout.
    pub fn new(method: Method, url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body,
            timeout: Duration::from_secs(30),
        }
    }

    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url, Vec::new())
    }

    /// Creates a POST request.
    pub fn post(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self::new(Method::Post, url, body)
    }

    /// Creates a PUT request.
    pub fn put(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self::new(Method::Put, url, body)
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds several headers.
    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Looks up a header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A fully buffered response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A request that produced no response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpFailure {
    /// The timeout elapsed.
    #[error("request timed out")]
    Timeout,
    /// Connection, DNS or I/O failure.
    #[error("{0}")]
    Connect(String),
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. Non-2xx
/// statuses are returned as responses, not failures.
pub trait HttpClient: Send + Sync {
    /// Executes a request.
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, HttpFailure>;
}

impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, HttpFailure> {
        (**self).execute(request)
    }
}

/// Blocking client backed by `ureq`.
pub struct UreqClient {
    agent: ureq::Agent,
}

impl UreqClient {
    /// Creates a client that reports every status as a response.
    pub fn new() -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent }
    }
}

impl Default for UreqClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UreqClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqClient").finish_non_exhaustive()
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    request: &HttpRequest,
) -> ureq::RequestBuilder<B> {
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn failure(err: ureq::Error) -> HttpFailure {
    match err {
        ureq::Error::Timeout(_) => HttpFailure::Timeout,
        other => HttpFailure::Connect(other.to_string()),
    }
}

impl HttpClient for UreqClient {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, HttpFailure> {
        let url = request.url.as_str();
        let timeout = Some(request.timeout);
        let response = match request.method {
            Method::Get => with_headers(self.agent.get(url), request)
                .config()
                .timeout_global(timeout)
                .build()
                .call(),
            Method::Post => with_headers(self.agent.post(url), request)
                .config()
                .timeout_global(timeout)
                .build()
                .send(&request.body[..]),
            Method::Put => with_headers(self.agent.put(url), request)
                .config()
                .timeout_global(timeout)
                .build()
                .send(&request.body[..]),
        }
        .map_err(failure)?;

        let status = response.status().as_u16();
        let mut body = response.into_body();
        let body = body
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_vec()
            .map_err(failure)?;
        Ok(HttpResponse { status, body })
    }
}

#[derive(Debug)]
struct MockRoute {
    method: Method,
    path: String,
    replies: VecDeque<Result<HttpResponse, HttpFailure>>,
}

/// A canned-response client for testing.
///
/// Routes match on method and URL suffix. Replies queued on one route are
/// served in order; the last one repeats. Unmatched requests get a 404.
#[derive(Debug, Default)]
pub struct MockHttpClient {
    routes: Mutex<Vec<MockRoute>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockHttpClient {
    /// Creates a client with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, method: Method, path: &str, reply: Result<HttpResponse, HttpFailure>) {
        let mut routes = self.routes.lock();
        match routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path)
        {
            Some(route) => route.replies.push_back(reply),
            None => routes.push(MockRoute {
                method,
                path: path.to_owned(),
                replies: VecDeque::from([reply]),
            }),
        }
    }

    /// Queues a response for `method` requests whose URL ends with `path`.
    pub fn respond(&self, method: Method, path: &str, status: u16, body: impl Into<Vec<u8>>) {
        self.push(method, path, Ok(HttpResponse::new(status, body)));
    }

    /// Queues a transport failure.
    pub fn fail(&self, method: Method, path: &str, failure: HttpFailure) {
        self.push(method, path, Err(failure));
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Requests whose URL ends with `path`.
    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.ends_with(path))
            .cloned()
            .collect()
    }
}

impl HttpClient for MockHttpClient {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, HttpFailure> {
        self.requests.lock().push(request.clone());

        let mut routes = self.routes.lock();
        let Some(route) = routes
            .iter_mut()
            .find(|r| r.method == request.method && request.url.ends_with(&r.path))
        else {
            return Ok(HttpResponse::new(404, format!("no mock route for {}", request.url)));
        };
        if route.replies.len() > 1 {
            if let Some(reply) = route.replies.pop_front() {
                return reply;
            }
        }
        route
            .replies
            .front()
            .cloned()
            .unwrap_or_else(|| Ok(HttpResponse::new(404, Vec::new())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder() {
        let req = HttpRequest::post("http://h/x", b"{}".to_vec())
            .with_header("Content-Type", "application/json")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("missing"), None);
        assert_eq!(req.timeout, Duration::from_secs(5));
    }

    #[test]
    fn response_status_classes() {
        assert!(HttpResponse::new(204, Vec::new()).is_success());
        assert!(!HttpResponse::new(404, Vec::new()).is_success());
        assert_eq!(HttpResponse::new(200, "ok").text(), "ok");
    }

    #[test]
    fn mock_replies_in_order_then_repeats() {
        let client = MockHttpClient::new();
        client.respond(Method::Post, "/sync", 200, "first");
        client.respond(Method::Post, "/sync", 500, "second");

        let req = HttpRequest::post("http://h/groups/sync", Vec::new());
        assert_eq!(client.execute(&req).unwrap().text(), "first");
        assert_eq!(client.execute(&req).unwrap().status, 500);
        assert_eq!(client.execute(&req).unwrap().status, 500);
        assert_eq!(client.requests_to("/groups/sync").len(), 3);
    }

    #[test]
    fn mock_failure_and_unmatched() {
        let client = MockHttpClient::new();
        client.fail(Method::Get, "/slow", HttpFailure::Timeout);

        let slow = client.execute(&HttpRequest::get("http://h/slow"));
        assert_eq!(slow, Err(HttpFailure::Timeout));

        let other = client.execute(&HttpRequest::get("http://h/other")).unwrap();
        assert_eq!(other.status, 404);
        // Method is part of the route.
        let post = client.execute(&HttpRequest::post("http://h/slow", Vec::new())).unwrap();
        assert_eq!(post.status, 404);
    }

    #[test]
    fn shared_client_delegates() {
        let client = Arc::new(MockHttpClient::new());
        client.respond(Method::Get, "/ping", 200, "pong");
        let shared: Arc<MockHttpClient> = Arc::clone(&client);
        assert_eq!(shared.execute(&HttpRequest::get("http://h/ping")).unwrap().text(), "pong");
        assert_eq!(client.requests().len(), 1);
    }
}
