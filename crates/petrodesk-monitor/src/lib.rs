//! Session timeout monitoring for Petrodesk clients.
//!
//! Watches an [`AuthSession`](petrodesk_auth::AuthSession) and tells the UI
//! shell when its server-side session is about to run out:
//!
//! - polls `GET /auth/session/status` on a fixed interval, only while the
//!   page is visible
//! - raises a warning at 5 minutes remaining that the user may dismiss,
//!   and forces it back at 2 minutes
//! - silently extends the session after successful API calls, at most
//!   once per 30 s
//! - expires the session (logout plus host callback) when the server says
//!   time is up
//!
//! Deliberate user input only refreshes what the UI shows. It never extends
//! the session; only real API traffic does.
//!
//! # Key types
//!
//! - [`spawn_monitor`] / [`MonitorHandle`]: the actor and its handle
//! - [`TimeoutTracker`]: the pure state machine behind it
//! - [`WarningView`]: what the UI renders
//! - [`MonitorConfig`]: thresholds, poll interval, debounce windows

mod config;
mod error;
mod monitor;
mod tracker;

pub use config::MonitorConfig;
pub use error::MonitorError;
pub use monitor::{ExtendOutcome, MonitorHandle, UserActivity, spawn_monitor};
pub use tracker::{MonitorPhase, TimeoutTracker, WarningView};
