//! Timing primitives shared by the auth and monitor layers.
//!
//! - [`BackoffPolicy`]: exponential backoff with jitter for retrying a
//!   refresh that another tab is already performing.
//! - [`Debounce`]: a "at most once per window" gate, used for silent
//!   session extension and UI status re-checks.
//! - [`PollScheduler`]: a pausable fixed-interval timer that sits inside
//!   an actor's `tokio::select!` loop.
//!
//! All clocks are `tokio::time::Instant`, so tests drive them with
//! `#[tokio::test(start_paused = true)]`.
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         _ = scheduler.wait_for_poll() => {
//!             check_session_status().await;
//!         }
//!     }
//! }
//! ```

mod backoff;
mod debounce;
mod poll;

pub use backoff::BackoffPolicy;
pub use debounce::Debounce;
pub use poll::{PollConfig, PollInfo, PollScheduler};
