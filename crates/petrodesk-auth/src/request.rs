//! The authenticated request pipeline.
//!
//! Every business call goes through
//! [`make_authenticated_request`](AuthSession::make_authenticated_request):
//!
//! ```text
//! no user? ──▶ NotAuthenticated (no network)
//!    │
//! attach X-CSRF-Token (POST/PUT/PATCH/DELETE, cookie present)
//!    │
//! send ──▶ 401 ──▶ refresh once ──▶ re-read CSRF ──▶ send again
//!    │                 │ failed
//!    │                 └──▶ clear user, tell host, SessionExpired
//!    ▼
//! 403 CSRF*? ──▶ CsrfValidation (never retried)
//!    │
//! 2xx ──▶ emit ActivityEvent::ApiCall
//!    ▼
//! response returned as-is
//! ```

use petrodesk_protocol::{Codec, ErrorBody, SessionStatus};
use petrodesk_transport::{
    ApiRequest, ApiResponse, HttpTransport, Method, MultipartForm, RequestBody,
};
use tracing::{debug, trace, warn};

use crate::{ActivityEvent, AuthError, AuthSession, TerminationReason};

// ---------------------------------------------------------------------------
// RequestOptions
// ---------------------------------------------------------------------------

/// Method, headers and body for an authenticated request.
///
/// ```rust
/// use petrodesk_auth::RequestOptions;
/// use serde_json::json;
///
/// let opts = RequestOptions::post().json(json!({"grade": "Brent", "volume": 1200}));
/// assert!(opts.method.is_state_changing());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn get() -> Self {
        Self::new(Method::Get)
    }

    pub fn post() -> Self {
        Self::new(Method::Post)
    }

    pub fn put() -> Self {
        Self::new(Method::Put)
    }

    pub fn patch() -> Self {
        Self::new(Method::Patch)
    }

    pub fn delete() -> Self {
        Self::new(Method::Delete)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    fn into_request(self, url: url::Url) -> ApiRequest {
        let mut request = ApiRequest::new(self.method, url).body(self.body);
        for (name, value) in self.headers {
            request.set_header(name, value);
        }
        request
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

impl<T: HttpTransport> AuthSession<T> {
    /// Sends a request with the session's credentials.
    ///
    /// `url` is absolute or relative to the API base. Statuses other than
    /// 401 and CSRF 403 come back as-is; interpreting business error bodies
    /// is the caller's job.
    ///
    /// # Errors
    /// - `NotAuthenticated` when no user is cached (nothing is sent).
    /// - `CsrfValidation` for a 403 with a `CSRF*` code.
    /// - `SessionExpired` when a 401 could not be recovered.
    /// - `Transport` when no response arrived.
    pub async fn make_authenticated_request(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse, AuthError> {
        if !self.is_authenticated() {
            return Err(AuthError::NotAuthenticated);
        }
        let request = options.into_request(self.endpoint(url)?);

        let response = self.send_with_recovery(request).await?;
        self.check_csrf_rejection(&response)?;

        if response.is_success() {
            self.notifier.emit(ActivityEvent::ApiCall);
        }
        Ok(response)
    }

    /// `GET /auth/session/status`. Used by the session monitor; emits no
    /// activity, since polling must not keep the session alive.
    pub async fn session_status(&self) -> Result<SessionStatus, AuthError> {
        self.session_call(Method::Get, &self.config.endpoints.session_status)
            .await
    }

    /// `POST /auth/session/extend`. Emits no activity.
    pub async fn extend_session(&self) -> Result<SessionStatus, AuthError> {
        self.session_call(Method::Post, &self.config.endpoints.session_extend)
            .await
    }

    async fn session_call(&self, method: Method, path: &str) -> Result<SessionStatus, AuthError> {
        if !self.is_authenticated() {
            return Err(AuthError::NotAuthenticated);
        }
        let request = ApiRequest::new(method, self.endpoint(path)?);
        let response = self.send_with_recovery(request).await?;
        self.check_csrf_rejection(&response)?;
        self.expect_data(&response, "session request failed")
    }

    /// Sends, and on 401 runs exactly one refresh-and-retry cycle.
    async fn send_with_recovery(&self, request: ApiRequest) -> Result<ApiResponse, AuthError> {
        let response = self.dispatch(request.clone()).await?;
        if response.status != 401 {
            return Ok(response);
        }

        debug!(url = %request.url, "401 received, refreshing once");
        match self.refresh_access_token().await {
            Ok(_) => {}
            Err(AuthError::RefreshInProgress { retry_after }) => {
                // Another tab owns the rotation; the shared jar will carry
                // its new cookies. Wait one backoff step, then retry.
                let delay = self.config.backoff.delay(0, Some(retry_after));
                debug!(
                    retry_after,
                    delay_ms = delay.as_millis() as u64,
                    "refresh in progress elsewhere, waiting before retry"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                warn!(error = %e, "refresh after 401 failed");
                self.terminate(TerminationReason::RefreshFailed);
                return Err(AuthError::SessionExpired);
            }
        }

        // dispatch re-reads the CSRF cookie, which the refresh may have rotated.
        let retried = self.dispatch(request).await?;
        if retried.status == 401 {
            warn!("401 survived token refresh");
            self.terminate(TerminationReason::RefreshFailed);
            return Err(AuthError::SessionExpired);
        }
        Ok(retried)
    }

    /// Attaches CSRF and content-type headers, then hands the request to
    /// the transport.
    pub(crate) async fn dispatch(&self, mut request: ApiRequest) -> Result<ApiResponse, AuthError> {
        if request.method.is_state_changing() {
            match self.csrf_token() {
                Some(token) => request.set_header(self.config.csrf_header.clone(), token),
                None => trace!(method = %request.method, "no csrf cookie to attach"),
            }
        }
        if request.body.is_multipart() {
            // The transport writes the boundary into the content type.
            request.remove_header("content-type");
        } else if matches!(request.body, RequestBody::Json(_))
            && request.header_value("content-type").is_none()
        {
            request.set_header("Content-Type", "application/json");
        }

        Ok(self.transport.send(request).await?)
    }

    fn check_csrf_rejection(&self, response: &ApiResponse) -> Result<(), AuthError> {
        if response.status != 403 {
            return Ok(());
        }
        let body: ErrorBody = self.codec.decode(&response.body).unwrap_or_default();
        if body.is_csrf_failure() {
            let code = body.code.unwrap_or_default();
            warn!(%code, "csrf validation failed, page reload required");
            return Err(AuthError::CsrfValidation { code });
        }
        Ok(())
    }
}
