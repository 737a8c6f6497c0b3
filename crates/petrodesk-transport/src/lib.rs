//! HTTP transport abstraction layer for Petrodesk.
//!
//! Provides the [`HttpTransport`] trait that the auth layer sends every
//! request through, plus the request/response model that travels across it.
//! The transport owns the cookie jar: session and refresh cookies are
//! `HttpOnly` and never surface here, but the non-`HttpOnly` CSRF cookie can
//! be read back with [`HttpTransport::cookie`] for the double-submit pattern.
//!
//! # Feature Flags
//!
//! - `reqwest` (default): [`ReqwestTransport`], backed by `reqwest` with a
//!   shared cookie jar
//! - `mock`: [`MockTransport`], a scripted in-memory transport for tests

mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;
#[cfg(feature = "reqwest")]
mod reqwest_transport;

pub use error::TransportError;
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockResponse, MockTransport, RecordedRequest};
#[cfg(feature = "reqwest")]
pub use reqwest_transport::ReqwestTransport;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use url::Url;

/// Counter for generating unique request IDs.
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a single request, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    /// Allocates the next process-wide request ID.
    pub fn next() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Method
// ---------------------------------------------------------------------------

/// HTTP method of an API request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    #[default]
    Get,
    Head,
    Options,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Returns `true` for methods that change server state.
    ///
    /// These are the requests that must carry a CSRF token.
    pub fn is_state_changing(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch | Self::Delete)
    }

    /// The method name as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Request body
// ---------------------------------------------------------------------------

/// One field of a multipart form.
#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    /// A plain text field.
    Text { name: String, value: String },
    /// A file field.
    File {
        name: String,
        file_name: String,
        mime: Option<String>,
        bytes: Vec<u8>,
    },
}

impl FormPart {
    /// The form field name.
    pub fn name(&self) -> &str {
        match self {
            Self::Text { name, .. } | Self::File { name, .. } => name,
        }
    }
}

/// A multipart form described as data, so a request can be re-sent after a
/// token refresh without consuming a one-shot stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    pub parts: Vec<FormPart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a text field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Adds a file field.
    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: Option<&str>,
        bytes: Vec<u8>,
    ) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            file_name: file_name.into(),
            mime: mime.map(str::to_owned),
            bytes,
        });
        self
    }
}

/// The body of an outgoing request.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Sent with `Content-Type: application/json`.
    Json(serde_json::Value),
    /// Sent as-is; the caller sets any content type header.
    Text(String),
    /// Sent as `multipart/form-data`; the transport picks the boundary, so
    /// no content type header may be set for it.
    Multipart(MultipartForm),
}

impl RequestBody {
    /// Returns `true` for multipart bodies.
    pub fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart(_))
    }
}

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// A fully resolved request, ready for a transport to send.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// Sets a header, replacing any previous value (names compare
    /// case-insensitively).
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Sets the JSON body.
    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    /// Sets an arbitrary body.
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// In-place variant of [`header`](Self::header).
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    /// Removes a header (case-insensitive).
    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Looks up a header value (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A response as received from the server. The body is fully buffered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Header names are stored lowercase.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Looks up a header value (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The body decoded as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// ---------------------------------------------------------------------------
// Transport trait
// ---------------------------------------------------------------------------

/// Sends requests to the API and owns the cookie jar they share.
///
/// Every request is sent with credentials: cookies in the jar go out and
/// `Set-Cookie` responses land back in it. Several [`HttpTransport`]s
/// pointed at the same jar behave like browser tabs sharing one session.
///
/// # Trait bounds
///
/// `Send + Sync + 'static` so one transport can back an auth session that
/// is shared between the caller's tasks and the session monitor's task. The
/// returned future is `Send` for the same reason.
pub trait HttpTransport: Send + Sync + 'static {
    /// Sends a request and buffers the response.
    ///
    /// Any HTTP status is `Ok`; only failures to get a response at all are
    /// errors.
    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, TransportError>> + Send;

    /// Reads a script-visible cookie for the API origin.
    fn cookie(&self, name: &str) -> Option<String>;
}

/// Lets a caller keep a handle on the transport (e.g. a test inspecting a
/// [`MockTransport`]) while the auth session owns another.
impl<T: HttpTransport> HttpTransport for std::sync::Arc<T> {
    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, TransportError>> + Send {
        (**self).send(request)
    }

    fn cookie(&self, name: &str) -> Option<String> {
        (**self).cookie(name)
    }
}

/// Extracts one cookie's value from a `Cookie` header string
/// (`"a=1; csrf-token=xyz"`).
pub fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key.trim() == name).then(|| value.trim().to_string())
    })
}
