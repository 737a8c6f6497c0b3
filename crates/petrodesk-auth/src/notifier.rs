//! Activity notifier: tells the session monitor that meaningful API
//! activity happened, without either side holding a reference to the other.
//!
//! One notifier is created by whoever wires the client together and handed
//! to both the [`AuthSession`](crate::AuthSession) (which emits) and the
//! session monitor (which subscribes). Any other service holding a clone
//! can emit too.

use tokio::sync::broadcast;
use tracing::trace;

/// Buffered events per subscriber before the oldest are dropped. Subscribers
/// only care that activity happened, so a lagged receiver loses nothing.
const CHANNEL_CAPACITY: usize = 32;

/// Something a subscriber may want to react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityEvent {
    /// A request through the authenticated pipeline returned 2xx.
    ApiCall,
}

/// A cloneable broadcast handle for [`ActivityEvent`]s.
#[derive(Debug, Clone)]
pub struct ActivityNotifier {
    sender: broadcast::Sender<ActivityEvent>,
}

impl ActivityNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publishes an event. Having no subscribers is not an error.
    pub fn emit(&self, event: ActivityEvent) {
        let receivers = self.sender.send(event).unwrap_or(0);
        trace!(?event, receivers, "activity emitted");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ActivityEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ActivityNotifier {
    fn default() -> Self {
        Self::new()
    }
}
