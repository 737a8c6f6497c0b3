//! Unified error type for the Petrodesk client.

use petrodesk_auth::AuthError;
use petrodesk_monitor::MonitorError;
use petrodesk_protocol::ProtocolError;
use petrodesk_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Callers using the `petrodesk` meta-crate match on this one type; `?`
/// converts sub-crate errors through the `#[from]` impls.
#[derive(Debug, thiserror::Error)]
pub enum PetrodeskError {
    /// No response arrived, or the request could not be built.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A body could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Login, refresh, CSRF or session failures.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The session monitor is gone or its call failed.
    #[error(transparent)]
    Monitor(#[from] MonitorError),
}

impl PetrodeskError {
    /// Whether the user has to log in again to continue.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Self::Auth(AuthError::NotAuthenticated | AuthError::SessionExpired)
                | Self::Monitor(MonitorError::Auth(
                    AuthError::NotAuthenticated | AuthError::SessionExpired
                ))
        )
    }
}
