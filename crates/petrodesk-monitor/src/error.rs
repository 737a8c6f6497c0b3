//! Error types for the monitor layer.

use petrodesk_auth::AuthError;

/// Errors returned by [`MonitorHandle`](crate::MonitorHandle) calls.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The auth layer refused or failed the underlying call.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The monitor task has stopped (shut down, or its session was dropped).
    #[error("session monitor is not running")]
    Unavailable,
}
