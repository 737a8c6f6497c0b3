//! Token refresh and cross-tab refresh arbitration.
//!
//! Every tab shares one refresh cookie, and the server lets only one of them
//! rotate it at a time. The loser gets HTTP 429 with code
//! `REFRESH_IN_PROGRESS` and a hint of how long to wait. There is no
//! client-side lock: tabs don't share memory, so the server's answer is the
//! only arbiter.
//!
//! ```text
//! tab A ── POST /auth/refresh ──▶ 200 (rotates cookies)
//! tab B ── POST /auth/refresh ──▶ 429 REFRESH_IN_PROGRESS, Retry-After: 2
//!          sleep ~2s ± 25% ────▶ POST /auth/refresh ──▶ 200
//! ```

use petrodesk_protocol::{ApiEnvelope, Codec, ErrorBody, User, UserData, codes};
use petrodesk_transport::{ApiResponse, HttpTransport, Method};
use tracing::{debug, info, warn};

use crate::{AuthError, AuthSession};

/// Retry hint used when the server gave none (or an unusable one).
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// Works out how long the server wants us to wait, in seconds.
///
/// Prefers the `Retry-After` header if it is a positive integer, then a
/// positive `retryAfter` in the body, then [`DEFAULT_RETRY_AFTER_SECS`].
pub fn parse_retry_after(response: &ApiResponse, body: &ErrorBody) -> u64 {
    response
        .header("retry-after")
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .or_else(|| body.retry_after_secs())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

impl<T: HttpTransport> AuthSession<T> {
    /// One refresh attempt against the HttpOnly refresh cookie.
    ///
    /// - Success: the cached user is updated from the response.
    /// - `REFRESH_IN_PROGRESS`: returns [`AuthError::RefreshInProgress`]
    ///   and leaves the user alone; the session is fine, someone else is
    ///   rotating it.
    /// - Anything else: the session is presumed dead, the user is cleared
    ///   and the error returned.
    ///
    /// Retrying is the caller's job, see
    /// [`refresh_token_with_retry`](Self::refresh_token_with_retry).
    pub async fn refresh_access_token(&self) -> Result<User, AuthError> {
        let url = self.endpoint(&self.config.endpoints.refresh)?;
        let response = match self.send_unauthenticated(Method::Post, url, None).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "token refresh failed, clearing session");
                self.clear_user();
                return Err(e);
            }
        };

        if response.status == 429 {
            let body: ErrorBody = self.codec.decode(&response.body).unwrap_or_default();
            if body.has_code(codes::REFRESH_IN_PROGRESS) {
                let retry_after = parse_retry_after(&response, &body);
                debug!(retry_after, "refresh already in progress in another tab");
                return Err(AuthError::RefreshInProgress { retry_after });
            }
        }

        match self.refreshed_user(&response) {
            Ok(user) => {
                debug!(user_id = %user.id, "access token refreshed");
                self.set_user(user.clone());
                Ok(user)
            }
            Err(e) => {
                warn!(status = response.status, error = %e, "token refresh failed, clearing session");
                self.clear_user();
                Err(e)
            }
        }
    }

    /// The user carried by a refresh response. Some deployments answer a
    /// refresh with a bare `{success: true}`; then the cached user stands.
    fn refreshed_user(&self, response: &ApiResponse) -> Result<User, AuthError> {
        if !response.is_success() {
            return Err(AuthError::from_response(response, "token refresh failed"));
        }
        let envelope: ApiEnvelope<UserData> = self.codec.decode(&response.body)?;
        if !envelope.success {
            return Err(AuthError::Rejected {
                status: response.status,
                message: envelope
                    .error_message()
                    .unwrap_or("token refresh failed")
                    .to_string(),
            });
        }
        match envelope.data {
            Some(data) => Ok(data.user),
            None => self.current_user().ok_or(AuthError::SessionExpired),
        }
    }

    /// Refreshes, backing off while another tab holds the refresh lock.
    ///
    /// Up to `backoff.max_retries` retries follow the first attempt, each
    /// after [`BackoffPolicy::delay`](petrodesk_timing::BackoffPolicy::delay)
    /// with the server's hint. When retries run out the last
    /// `RefreshInProgress` is returned. Any other error returns at once.
    pub async fn refresh_token_with_retry(&self) -> Result<User, AuthError> {
        let policy = self.config.backoff;
        let mut attempt = 0;
        loop {
            match self.refresh_access_token().await {
                Err(AuthError::RefreshInProgress { retry_after }) if attempt < policy.max_retries => {
                    let delay = policy.delay(attempt, Some(retry_after));
                    debug!(
                        attempt,
                        retry_after,
                        delay_ms = delay.as_millis() as u64,
                        "refresh in progress, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(AuthError::RefreshInProgress { retry_after }) => {
                    info!(attempts = attempt + 1, "refresh still in progress, giving up");
                    return Err(AuthError::RefreshInProgress { retry_after });
                }
                other => return other,
            }
        }
    }
}
