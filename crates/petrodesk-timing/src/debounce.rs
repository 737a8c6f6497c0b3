//! Leading-edge debounce gate.

use std::time::Duration;

use tokio::time::Instant;

/// Lets an action through at most once per `window`.
///
/// Leading edge: the first call fires immediately and the timestamp is
/// recorded *before* the caller does its work, so a second call arriving
/// while the first is still in flight is already rejected.
#[derive(Debug, Clone)]
pub struct Debounce {
    window: Duration,
    last: Option<Instant>,
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Returns `true` and records now if the window has elapsed since the
    /// last accepted call (or nothing was accepted yet).
    pub fn try_fire(&mut self) -> bool {
        let now = Instant::now();
        if self.is_ready_at(now) {
            self.last = Some(now);
            true
        } else {
            false
        }
    }

    /// Whether a call right now would be accepted. Does not record anything.
    pub fn is_ready(&self) -> bool {
        self.is_ready_at(Instant::now())
    }

    fn is_ready_at(&self, now: Instant) -> bool {
        match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.window,
        }
    }

    /// Forget the last accepted call; the next `try_fire` passes.
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// When the last call was accepted.
    pub fn last_fired(&self) -> Option<Instant> {
        self.last
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_try_fire_first_call_passes() {
        let mut gate = Debounce::new(Duration::from_secs(30));
        assert!(gate.try_fire());
        assert!(gate.last_fired().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_fire_within_window_rejected() {
        let mut gate = Debounce::new(Duration::from_secs(30));
        assert!(gate.try_fire());
        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(!gate.try_fire());
        assert!(!gate.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_fire_after_window_passes() {
        let mut gate = Debounce::new(Duration::from_secs(30));
        assert!(gate.try_fire());
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(gate.try_fire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_reopens_gate() {
        let mut gate = Debounce::new(Duration::from_secs(60));
        assert!(gate.try_fire());
        gate.reset();
        assert!(gate.try_fire());
    }
}
