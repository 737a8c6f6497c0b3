//! Scripted in-memory transport for tests.
//!
//! Responses are queued per `(method, path)` route and served in order. The
//! last queued response for a route is sticky: once the queue is down to one
//! entry it keeps being served, so a test only scripts what changes.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::{ApiRequest, ApiResponse, HttpTransport, Method, TransportError};

/// A canned response for [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    set_cookies: Vec<(String, String)>,
    network_error: bool,
    delay: Option<Duration>,
}

impl MockResponse {
    /// A response with the given status and an empty body.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
            set_cookies: Vec::new(),
            network_error: false,
            delay: None,
        }
    }

    /// A response with a JSON body.
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self::status(status)
            .with_header("content-type", "application/json")
            .with_body(body.to_string().into_bytes())
    }

    /// A simulated transport failure (no response at all).
    pub fn network_error() -> Self {
        Self {
            network_error: true,
            ..Self::status(0)
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Holds the response back for `delay` on the Tokio clock, like a slow
    /// server. The request is recorded before the wait.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Stores a cookie in the mock jar when this response is served.
    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.set_cookies.push((name.to_string(), value.to_string()));
        self
    }
}

/// A request as the mock transport saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub request: ApiRequest,
}

#[derive(Default)]
struct MockState {
    routes: HashMap<(Method, String), VecDeque<MockResponse>>,
    cookies: HashMap<String, String>,
    requests: Vec<RecordedRequest>,
}

/// An [`HttpTransport`] that serves scripted responses and records every
/// request. Unscripted routes answer 404.
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for `method path`.
    pub fn on(&self, method: Method, path: &str, response: MockResponse) -> &Self {
        self.lock()
            .routes
            .entry((method, path.to_string()))
            .or_default()
            .push_back(response);
        self
    }

    /// Puts a cookie into the mock jar.
    pub fn set_cookie(&self, name: &str, value: &str) {
        self.lock()
            .cookies
            .insert(name.to_string(), value.to_string());
    }

    /// Removes a cookie from the mock jar.
    pub fn remove_cookie(&self, name: &str) {
        self.lock().cookies.remove(name);
    }

    /// Every request sent so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// How many requests hit `method path`.
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl HttpTransport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let method = request.method;
        let path = request.url.path().to_string();

        let scripted = {
            let mut state = self.lock();
            state.requests.push(RecordedRequest {
                method,
                path: path.clone(),
                request,
            });
            let scripted = state.routes.get_mut(&(method, path.clone())).and_then(|queue| {
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            });
            if let Some(resp) = &scripted {
                for (name, value) in &resp.set_cookies {
                    state.cookies.insert(name.clone(), value.clone());
                }
            }
            scripted
        };

        let Some(scripted) = scripted else {
            return Ok(ApiResponse::new(404));
        };
        if let Some(delay) = scripted.delay {
            tokio::time::sleep(delay).await;
        }
        if scripted.network_error {
            return Err(TransportError::SendFailed(
                format!("simulated network failure for {method} {path}").into(),
            ));
        }

        Ok(ApiResponse {
            status: scripted.status,
            headers: scripted.headers.into_iter().collect(),
            body: scripted.body,
        })
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.lock().cookies.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn req(method: Method, path: &str) -> ApiRequest {
        let url = Url::parse("https://api.example.com").unwrap().join(path).unwrap();
        ApiRequest::new(method, url)
    }

    #[tokio::test]
    async fn test_send_serves_queue_then_sticks_on_last() {
        let mock = MockTransport::new();
        mock.on(Method::Get, "/a", MockResponse::status(401))
            .on(Method::Get, "/a", MockResponse::status(200));

        assert_eq!(mock.send(req(Method::Get, "/a")).await.unwrap().status, 401);
        assert_eq!(mock.send(req(Method::Get, "/a")).await.unwrap().status, 200);
        assert_eq!(mock.send(req(Method::Get, "/a")).await.unwrap().status, 200);
        assert_eq!(mock.count(Method::Get, "/a"), 3);
    }

    #[tokio::test]
    async fn test_send_unscripted_route_returns_404() {
        let mock = MockTransport::new();
        let resp = mock.send(req(Method::Post, "/nowhere")).await.unwrap();
        assert_eq!(resp.status, 404);
    }

    #[tokio::test]
    async fn test_send_applies_response_cookies() {
        let mock = MockTransport::new();
        mock.on(
            Method::Post,
            "/refresh",
            MockResponse::status(200).with_cookie("csrf-token", "rotated"),
        );
        assert_eq!(mock.cookie("csrf-token"), None);

        mock.send(req(Method::Post, "/refresh")).await.unwrap();

        assert_eq!(mock.cookie("csrf-token").as_deref(), Some("rotated"));
    }

    #[tokio::test]
    async fn test_send_network_error_is_transport_error() {
        let mock = MockTransport::new();
        mock.on(Method::Get, "/down", MockResponse::network_error());
        let result = mock.send(req(Method::Get, "/down")).await;
        assert!(matches!(result, Err(TransportError::SendFailed(_))));
    }
}
