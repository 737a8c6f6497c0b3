//! Monitor configuration.

use std::time::Duration;

use petrodesk_timing::PollConfig;

// ---------------------------------------------------------------------------
// MonitorConfig
// ---------------------------------------------------------------------------

/// Thresholds, poll cadence and debounce windows for the session monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Show the warning when this many minutes (or fewer) remain.
    pub warning_threshold_minutes: f64,

    /// At or below this many minutes the warning shows even after the user
    /// dismissed it.
    pub hard_floor_minutes: f64,

    /// Status poll cadence while the page is visible.
    pub poll: PollConfig,

    /// How long the page must stay visible before the catch-up status check.
    pub visibility_debounce: Duration,

    /// Minimum time between silent extensions triggered by API activity.
    pub api_extend_debounce: Duration,

    /// Minimum time between status re-checks triggered by user input.
    pub activity_debounce: Duration,

    /// Capacity of the command channel between handles and the actor.
    pub command_buffer: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            warning_threshold_minutes: 5.0,
            hard_floor_minutes: 2.0,
            poll: PollConfig::default(),
            visibility_debounce: Duration::from_millis(100),
            api_extend_debounce: Duration::from_secs(30),
            activity_debounce: Duration::from_secs(60),
            command_buffer: 32,
        }
    }
}

impl MonitorConfig {
    /// Returns a copy with unusable values replaced.
    ///
    /// Non-finite or negative thresholds fall back to the defaults, and the
    /// hard floor is clamped into `0..=warning_threshold_minutes`.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        if !self.warning_threshold_minutes.is_finite() || self.warning_threshold_minutes < 0.0 {
            tracing::warn!(
                value = self.warning_threshold_minutes,
                "invalid warning threshold, using default"
            );
            self.warning_threshold_minutes = defaults.warning_threshold_minutes;
        }
        if !self.hard_floor_minutes.is_finite() || self.hard_floor_minutes < 0.0 {
            self.hard_floor_minutes = defaults.hard_floor_minutes;
        }
        if self.hard_floor_minutes > self.warning_threshold_minutes {
            tracing::warn!(
                floor = self.hard_floor_minutes,
                threshold = self.warning_threshold_minutes,
                "hard floor above warning threshold, clamping"
            );
            self.hard_floor_minutes = self.warning_threshold_minutes;
        }
        self.poll = self.poll.validated();
        self.command_buffer = self.command_buffer.max(1);
        self
    }
}
