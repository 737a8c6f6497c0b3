//! Host application hooks.
//!
//! The auth layer never navigates anywhere itself. When the session is over
//! it tells the host through [`SessionHost`] and the host decides what
//! "go to the login page" means (a route change, a window, a CLI prompt).

use std::fmt;

use tokio::sync::mpsc;
use tracing::debug;

/// Why the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// A 401 could not be recovered by a token refresh.
    RefreshFailed,
    /// The status poll reported no remaining time.
    TimedOut,
    /// The status poll reported the session inactive.
    Inactive,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RefreshFailed => write!(f, "refresh failed"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

/// Callbacks into the host application.
///
/// Called from whichever task noticed the termination, so implementations
/// must be quick and must not block. Hand the work off (a channel send, a
/// UI event) rather than doing it inline.
pub trait SessionHost: Send + Sync + 'static {
    /// The session is over; local identity is already cleared. Navigate to
    /// `login_route`.
    fn on_session_terminated(&self, reason: TerminationReason, login_route: &str);
}

/// A host that ignores every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHost;

impl SessionHost for NoopHost {
    fn on_session_terminated(&self, reason: TerminationReason, _login_route: &str) {
        debug!(%reason, "session terminated (no host attached)");
    }
}

/// A termination as delivered by [`ChannelHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTerminated {
    pub reason: TerminationReason,
    pub login_route: String,
}

/// A host that forwards terminations over an unbounded channel, for hosts
/// that run their own event loop.
#[derive(Debug, Clone)]
pub struct ChannelHost {
    sender: mpsc::UnboundedSender<SessionTerminated>,
}

impl ChannelHost {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionTerminated>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl SessionHost for ChannelHost {
    fn on_session_terminated(&self, reason: TerminationReason, login_route: &str) {
        let event = SessionTerminated {
            reason,
            login_route: login_route.to_string(),
        };
        if self.sender.send(event).is_err() {
            debug!(%reason, "session terminated but host receiver is gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_host_forwards_termination() {
        let (host, mut rx) = ChannelHost::new();
        host.on_session_terminated(TerminationReason::TimedOut, "/login");

        let event = rx.try_recv().unwrap();
        assert_eq!(event.reason, TerminationReason::TimedOut);
        assert_eq!(event.login_route, "/login");
    }

    #[test]
    fn test_channel_host_dropped_receiver_does_not_panic() {
        let (host, rx) = ChannelHost::new();
        drop(rx);
        host.on_session_terminated(TerminationReason::RefreshFailed, "/login");
    }
}
