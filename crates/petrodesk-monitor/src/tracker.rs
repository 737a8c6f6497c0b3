//! The session-expiry state machine, without any I/O.
//!
//! The monitor actor feeds discrete events into a [`TimeoutTracker`] and
//! publishes the resulting [`WarningView`]. Keeping the transitions here
//! means they can be tested without a runtime or a server.
//!
//! ```text
//!            authenticated + visible
//!   Idle ─────────────────────────────▶ Polling ◀─────────┐
//!    ▲                                    │               │ remaining > threshold
//!    │ unauthenticated                    │ remaining ≤   │ or extended
//!    │                                    ▼ threshold     │
//!    └────────────────────────────── WarningShown ────────┘
//!
//!   any ── remaining ≤ 0 / inactive / 401 after refresh ──▶ Expired
//! ```
//!
//! `Expired` is sticky until the next time the session becomes
//! authenticated.

use petrodesk_protocol::SessionStatus;

use crate::MonitorConfig;

// ---------------------------------------------------------------------------
// MonitorPhase
// ---------------------------------------------------------------------------

/// Where the monitor is in a session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorPhase {
    /// No session, or authenticated while the page has never been visible.
    #[default]
    Idle,
    /// Watching the session; no warning on screen.
    Polling,
    /// The expiry warning is on screen.
    WarningShown,
    /// The session is gone. Terminal until the next login.
    Expired,
}

impl MonitorPhase {
    /// Returns `true` while a session is being watched.
    pub fn is_watching(&self) -> bool {
        matches!(self, Self::Polling | Self::WarningShown)
    }
}

impl std::fmt::Display for MonitorPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Polling => write!(f, "Polling"),
            Self::WarningShown => write!(f, "WarningShown"),
            Self::Expired => write!(f, "Expired"),
        }
    }
}

// ---------------------------------------------------------------------------
// WarningView
// ---------------------------------------------------------------------------

/// What the UI shell renders: the latest status plus warning flags.
#[derive(Debug, Clone, PartialEq)]
pub struct WarningView {
    /// Last status the server reported, if any.
    pub session_status: Option<SessionStatus>,
    pub show_warning: bool,
    pub remaining_minutes: Option<f64>,
    pub timeout_minutes: Option<f64>,
    /// An explicit extend call is in flight.
    pub is_extending: bool,
    pub warning_dismissed: bool,
    pub is_page_visible: bool,
    pub phase: MonitorPhase,
}

impl Default for WarningView {
    fn default() -> Self {
        Self {
            session_status: None,
            show_warning: false,
            remaining_minutes: None,
            timeout_minutes: None,
            is_extending: false,
            warning_dismissed: false,
            is_page_visible: true,
            phase: MonitorPhase::Idle,
        }
    }
}

// ---------------------------------------------------------------------------
// TimeoutTracker
// ---------------------------------------------------------------------------

/// Pure state machine behind the session monitor.
#[derive(Debug, Clone)]
pub struct TimeoutTracker {
    warning_threshold: f64,
    hard_floor: f64,
    authenticated: bool,
    view: WarningView,
}

impl TimeoutTracker {
    pub fn new(warning_threshold_minutes: f64, hard_floor_minutes: f64) -> Self {
        Self {
            warning_threshold: warning_threshold_minutes,
            hard_floor: hard_floor_minutes,
            authenticated: false,
            view: WarningView::default(),
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config.warning_threshold_minutes, config.hard_floor_minutes)
    }

    pub fn view(&self) -> &WarningView {
        &self.view
    }

    pub fn phase(&self) -> MonitorPhase {
        self.view.phase
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Whether status checks should run right now.
    pub fn is_watching(&self) -> bool {
        self.authenticated && self.view.phase.is_watching()
    }

    /// Records an auth flip. Returns `false` if nothing changed.
    ///
    /// Every flip resets the warning state. Logging out leaves an `Expired`
    /// phase in place so the UI can still tell why the session ended.
    pub fn set_authenticated(&mut self, authenticated: bool) -> bool {
        if self.authenticated == authenticated {
            return false;
        }
        self.authenticated = authenticated;

        let visible = self.view.is_page_visible;
        let previous = self.view.phase;
        self.view = WarningView {
            is_page_visible: visible,
            ..WarningView::default()
        };
        self.view.phase = match (authenticated, previous) {
            (true, _) if visible => MonitorPhase::Polling,
            (true, _) => MonitorPhase::Idle,
            (false, MonitorPhase::Expired) => MonitorPhase::Expired,
            (false, _) => MonitorPhase::Idle,
        };
        true
    }

    /// Records a visibility change. A session that was authenticated while
    /// hidden starts being watched once the page shows.
    pub fn set_visible(&mut self, visible: bool) {
        self.view.is_page_visible = visible;
        if visible && self.authenticated && self.view.phase == MonitorPhase::Idle {
            self.view.phase = MonitorPhase::Polling;
        }
    }

    /// Applies a status snapshot from the server.
    ///
    /// Returns the resulting phase, or `None` when the snapshot was ignored
    /// (no session is being watched).
    pub fn apply_status(&mut self, status: SessionStatus) -> Option<MonitorPhase> {
        if !self.is_watching() {
            return None;
        }
        self.view.session_status = Some(status);
        self.view.remaining_minutes = Some(status.remaining_minutes);
        self.view.timeout_minutes = Some(status.timeout_minutes);

        if !status.active || status.remaining_minutes <= 0.0 {
            self.expire();
            return Some(MonitorPhase::Expired);
        }

        let remaining = status.remaining_minutes;
        if remaining > self.warning_threshold {
            // Out of the warning window: a later window warns afresh.
            self.view.warning_dismissed = false;
            self.view.show_warning = false;
        } else {
            self.view.show_warning = !self.view.warning_dismissed || remaining <= self.hard_floor;
        }
        self.sync_phase();
        Some(self.view.phase)
    }

    /// Hides the warning until it next becomes mandatory.
    ///
    /// Has no visible effect at or below the hard floor.
    pub fn dismiss(&mut self) {
        if !self.is_watching() {
            return;
        }
        self.view.warning_dismissed = true;
        let below_floor = self
            .view
            .remaining_minutes
            .is_some_and(|remaining| remaining <= self.hard_floor);
        self.view.show_warning = self.view.show_warning && below_floor;
        self.sync_phase();
    }

    pub fn set_extending(&mut self, extending: bool) {
        self.view.is_extending = extending;
    }

    /// Clears the warning after a successful explicit extension.
    pub fn clear_warning(&mut self) {
        if !self.is_watching() {
            return;
        }
        self.view.show_warning = false;
        self.view.warning_dismissed = false;
        self.sync_phase();
    }

    /// Moves to `Expired`. Returns `false` if it already was.
    pub fn expire(&mut self) -> bool {
        if self.view.phase == MonitorPhase::Expired {
            return false;
        }
        self.view.phase = MonitorPhase::Expired;
        self.view.show_warning = false;
        self.view.is_extending = false;
        true
    }

    fn sync_phase(&mut self) {
        self.view.phase = if self.view.show_warning {
            MonitorPhase::WarningShown
        } else {
            MonitorPhase::Polling
        };
    }
}
