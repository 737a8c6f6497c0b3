//! Error types for the auth layer.

use petrodesk_protocol::{Codec, ErrorBody, JsonCodec, ProtocolError};
use petrodesk_transport::{ApiResponse, TransportError};

/// Errors returned by [`AuthSession`](crate::AuthSession) operations.
///
/// Only [`SessionExpired`](Self::SessionExpired) means the session is gone
/// for good. [`RefreshInProgress`](Self::RefreshInProgress) in particular is
/// *not* a session failure: another tab is rotating the tokens right now.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No user is cached, so no authenticated request was attempted.
    /// The caller should send the user to the login route.
    #[error("not authenticated")]
    NotAuthenticated,

    /// HTTP 429 with code `REFRESH_IN_PROGRESS`. `retry_after` is in
    /// seconds and always positive.
    #[error("token refresh already in progress, retry after {retry_after}s")]
    RefreshInProgress { retry_after: u64 },

    /// HTTP 403 with a `CSRF*` code. Never retried: the CSRF cookie and the
    /// server disagree, and only a page reload re-syncs them.
    #[error("security validation failed ({code}), please refresh the page")]
    CsrfValidation { code: String },

    /// A 401 survived a refresh-and-retry cycle, or the refresh itself
    /// failed. Local identity has been cleared.
    #[error("session expired, please log in again")]
    SessionExpired,

    /// The server refused the request with a 4xx or `success: false`.
    /// `message` is the server's own wording when it sent one.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// A status the operation has no meaning for (5xx, 3xx, ...).
    #[error("unexpected status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },

    /// No response was received.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A response arrived but its body didn't have the expected shape.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl AuthError {
    /// Builds a `Rejected` or `UnexpectedStatus` from an error response,
    /// preferring the server's message over `fallback`.
    pub(crate) fn from_response(response: &ApiResponse, fallback: &str) -> Self {
        let body: ErrorBody = JsonCodec.decode(&response.body).unwrap_or_default();
        let message = body.error_message().unwrap_or(fallback).to_string();
        if (400..500).contains(&response.status) {
            Self::Rejected {
                status: response.status,
                message,
            }
        } else {
            Self::UnexpectedStatus {
                status: response.status,
                message,
            }
        }
    }

    /// The server's retry hint when this is a `RefreshInProgress`.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RefreshInProgress { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// `true` for failures caused by the network rather than the server.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> ApiResponse {
        let mut resp = ApiResponse::new(status);
        resp.body = body.as_bytes().to_vec();
        resp
    }

    #[test]
    fn test_from_response_4xx_uses_server_message() {
        let err = AuthError::from_response(
            &response(401, r#"{"success":false,"message":"Invalid credentials"}"#),
            "login failed",
        );
        assert!(matches!(err, AuthError::Rejected { status: 401, .. }));
        assert_eq!(err.to_string(), "Invalid credentials");
    }

    #[test]
    fn test_from_response_5xx_non_json_uses_fallback() {
        let err = AuthError::from_response(&response(502, "<html>bad gateway</html>"), "login failed");
        assert!(matches!(
            err,
            AuthError::UnexpectedStatus { status: 502, ref message } if message == "login failed"
        ));
    }

    #[test]
    fn test_retry_after_only_for_refresh_in_progress() {
        assert_eq!(AuthError::RefreshInProgress { retry_after: 2 }.retry_after(), Some(2));
        assert_eq!(AuthError::SessionExpired.retry_after(), None);
    }
}
