//! Pausable fixed-interval poll scheduler.
//!
//! Drives the session-status poll inside the monitor actor. Three states:
//!
//! ```text
//! stopped ──start()──▶ running ──pause()──▶ paused
//!    ▲                  │  ▲                  │
//!    └──────stop()──────┘  └─────resume()─────┘
//! ```
//!
//! While stopped or paused, [`PollScheduler::wait_for_poll`] pends forever,
//! so a `tokio::select!` branch on it simply never fires.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the poll scheduler.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Time between polls. Default: 60 s.
    pub interval: Duration,
    /// Random jitter (0–max) added to the *first* poll after `start()` so
    /// tabs opened together don't poll together. Default: 2 s.
    pub initial_jitter: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            initial_jitter: Duration::from_secs(2),
        }
    }
}

impl PollConfig {
    /// Shortest interval accepted.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values. Called by [`PollScheduler::new`].
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_millis() as u64,
                min_ms = Self::MIN_INTERVAL.as_millis() as u64,
                "poll interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self
    }
}

/// Returned by [`PollScheduler::wait_for_poll`] each time it fires.
#[derive(Debug, Clone)]
pub struct PollInfo {
    /// Monotonically increasing poll number (starts at 1).
    pub poll: u64,
    /// How late the poll fired relative to its deadline.
    pub late_by: Duration,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// A fixed-interval timer with start/stop and pause/resume.
///
/// Missed deadlines are never caught up: after a late wake-up the next
/// deadline is `now + interval`.
#[derive(Debug)]
pub struct PollScheduler {
    config: PollConfig,
    /// `None` while stopped.
    next_poll: Option<Instant>,
    paused: bool,
    poll_count: u64,
}

impl PollScheduler {
    /// Creates a stopped scheduler.
    pub fn new(config: PollConfig) -> Self {
        let config = config.validated();
        debug!(
            interval_ms = config.interval.as_millis() as u64,
            "poll scheduler created"
        );
        Self {
            config,
            next_poll: None,
            paused: false,
            poll_count: 0,
        }
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self::new(PollConfig::with_interval(interval))
    }

    /// Start polling. The first poll fires after one interval plus jitter.
    ///
    /// Restarting a running scheduler reschedules from now.
    pub fn start(&mut self) {
        let max_jitter = self.config.initial_jitter.as_millis() as u64;
        let jitter = if max_jitter > 0 {
            Duration::from_millis(rand::rng().random_range(0..max_jitter))
        } else {
            Duration::ZERO
        };
        self.next_poll = Some(Instant::now() + self.config.interval + jitter);
        self.paused = false;
        debug!(jitter_ms = jitter.as_millis() as u64, "poll scheduler started");
    }

    /// Stop polling entirely. Clears the paused flag.
    pub fn stop(&mut self) {
        if self.next_poll.take().is_some() {
            debug!(polls = self.poll_count, "poll scheduler stopped");
        }
        self.paused = false;
    }

    /// Pause polling. Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(poll = self.poll_count, "poll scheduler paused");
        }
    }

    /// Resume after a pause.
    ///
    /// The next deadline is reset to `now + interval` so time spent paused
    /// does not produce an immediate burst.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if self.next_poll.is_some() {
                self.next_poll = Some(Instant::now() + self.config.interval);
            }
            debug!(poll = self.poll_count, "poll scheduler resumed");
        }
    }

    /// Wait until the next poll is due.
    ///
    /// Pends forever while stopped or paused.
    pub async fn wait_for_poll(&mut self) -> PollInfo {
        let next = match self.next_poll {
            Some(next) if !self.paused => next,
            _ => std::future::pending().await,
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        let late_by = now.saturating_duration_since(next);
        self.poll_count += 1;
        self.next_poll = Some(now + self.config.interval);

        trace!(poll = self.poll_count, late_ms = late_by.as_millis() as u64, "poll fired");

        PollInfo {
            poll: self.poll_count,
            late_by,
        }
    }

    pub fn is_running(&self) -> bool {
        self.next_poll.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether `wait_for_poll` can currently fire.
    pub fn is_active(&self) -> bool {
        self.is_running() && !self.paused
    }

    pub fn poll_count(&self) -> u64 {
        self.poll_count
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    /// The next deadline, or `None` when stopped.
    pub fn next_poll(&self) -> Option<Instant> {
        self.next_poll
    }
}
