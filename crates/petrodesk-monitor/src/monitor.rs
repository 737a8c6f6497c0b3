//! Session monitor actor: a Tokio task that watches one auth session.
//!
//! The actor owns the [`TimeoutTracker`], the poll scheduler and the
//! debounce gates. Everything else talks to it through a [`MonitorHandle`]
//! and reads its output from a `watch` channel of [`WarningView`]s.
//!
//! The loop waits on six sources at once:
//!
//! - commands from handles (extend, dismiss, visibility, user input)
//! - auth flips from the session's `watch<Option<User>>`
//! - terminations the auth layer decided on its own (a business call whose
//!   401 survived the refresh)
//! - API activity from the shared [`ActivityNotifier`](petrodesk_auth::ActivityNotifier)
//! - the poll scheduler (pends while hidden or logged out)
//! - the visibility debounce deadline

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use petrodesk_auth::{ActivityEvent, ActivityNotifier, AuthError, AuthSession, TerminationReason};
use petrodesk_protocol::{SessionStatus, User};
use petrodesk_timing::{Debounce, PollScheduler};
use petrodesk_transport::HttpTransport;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::{MonitorConfig, MonitorError, MonitorPhase, TimeoutTracker, WarningView};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A raw user-input event from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserActivity {
    MouseDown,
    KeyDown,
    TouchStart,
    MouseMove,
    Scroll,
}

impl UserActivity {
    /// Whether this counts as a deliberate action. Pointer movement and
    /// scrolling don't: a user who walked away can still jiggle the mouse.
    pub fn is_deliberate(&self) -> bool {
        matches!(self, Self::MouseDown | Self::KeyDown | Self::TouchStart)
    }
}

/// Result of [`MonitorHandle::extend_session`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExtendOutcome {
    /// The server extended the session.
    Extended(SessionStatus),
    /// Another extend call from this client was already in flight; nothing
    /// was sent.
    AlreadyExtending,
}

/// Commands sent to the monitor actor.
enum MonitorCommand {
    Extend {
        reply: oneshot::Sender<Result<SessionStatus, AuthError>>,
        /// Held until the actor has finished the call, even if the caller
        /// gave up waiting.
        _guard: ExtendGuard,
    },
    Dismiss,
    Visibility(bool),
    UserActivity(UserActivity),
    CheckNow {
        reply: oneshot::Sender<WarningView>,
    },
    Shutdown,
}

// ---------------------------------------------------------------------------
// MonitorHandle
// ---------------------------------------------------------------------------

/// Handle to a running session monitor. Cheap to clone.
#[derive(Clone)]
pub struct MonitorHandle {
    sender: mpsc::Sender<MonitorCommand>,
    view: watch::Receiver<WarningView>,
    extending: Arc<AtomicBool>,
    notifier: ActivityNotifier,
}

/// Releases the extend lock when dropped.
struct ExtendGuard(Arc<AtomicBool>);

impl Drop for ExtendGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl MonitorHandle {
    /// Explicitly extends the session ("stay logged in").
    ///
    /// The in-flight flag is taken before anything is sent, so a double
    /// click yields [`ExtendOutcome::AlreadyExtending`] for the second call
    /// without a network request. On success the warning is cleared and the
    /// status re-fetched.
    pub async fn extend_session(&self) -> Result<ExtendOutcome, MonitorError> {
        if self
            .extending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("extend already in flight, ignoring");
            return Ok(ExtendOutcome::AlreadyExtending);
        }
        let guard = ExtendGuard(Arc::clone(&self.extending));

        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(MonitorCommand::Extend {
                reply: reply_tx,
                _guard: guard,
            })
            .await
            .map_err(|_| MonitorError::Unavailable)?;
        let status = reply_rx.await.map_err(|_| MonitorError::Unavailable)??;
        Ok(ExtendOutcome::Extended(status))
    }

    /// Whether an explicit extend call is in flight. Stays set until the
    /// monitor has finished it, even if the caller stopped waiting.
    pub fn is_extending(&self) -> bool {
        self.extending.load(Ordering::Acquire)
    }

    /// Hides the warning. It comes back at the hard floor regardless.
    pub async fn dismiss_warning(&self) -> Result<(), MonitorError> {
        self.send(MonitorCommand::Dismiss).await
    }

    /// Reports a page visibility change from the host.
    pub async fn set_page_visible(&self, visible: bool) -> Result<(), MonitorError> {
        self.send(MonitorCommand::Visibility(visible)).await
    }

    /// Reports user input. Non-deliberate kinds are dropped here.
    pub async fn record_user_activity(&self, activity: UserActivity) -> Result<(), MonitorError> {
        if !activity.is_deliberate() {
            return Ok(());
        }
        self.send(MonitorCommand::UserActivity(activity)).await
    }

    /// Signals meaningful API activity, as if an authenticated call had
    /// just succeeded.
    pub fn signal_api_activity(&self) {
        self.notifier.emit(ActivityEvent::ApiCall);
    }

    /// Fetches the session status now, bypassing every debounce, and
    /// returns the view that results.
    pub async fn check_now(&self) -> Result<WarningView, MonitorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(MonitorCommand::CheckNow { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| MonitorError::Unavailable)
    }

    /// The current view.
    pub fn state(&self) -> WarningView {
        self.view.borrow().clone()
    }

    /// A receiver that sees every published view.
    pub fn subscribe(&self) -> watch::Receiver<WarningView> {
        self.view.clone()
    }

    /// Stops the monitor task.
    pub async fn shutdown(&self) -> Result<(), MonitorError> {
        self.send(MonitorCommand::Shutdown).await
    }

    async fn send(&self, cmd: MonitorCommand) -> Result<(), MonitorError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| MonitorError::Unavailable)
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct SessionMonitor<T: HttpTransport> {
    auth: Arc<AuthSession<T>>,
    config: MonitorConfig,
    tracker: TimeoutTracker,
    scheduler: PollScheduler,
    api_extend: Debounce,
    user_activity: Debounce,
    /// When the pending post-visibility check fires.
    visible_check_at: Option<Instant>,
    view: watch::Sender<WarningView>,
    receiver: mpsc::Receiver<MonitorCommand>,
    auth_rx: watch::Receiver<Option<User>>,
    termination_rx: watch::Receiver<Option<TerminationReason>>,
    activity_rx: broadcast::Receiver<ActivityEvent>,
}

impl<T: HttpTransport> SessionMonitor<T> {
    async fn run(mut self) {
        info!("session monitor started");
        self.sync_auth().await;

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(MonitorCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd).await,
                },
                changed = self.auth_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.sync_auth().await;
                }
                changed = self.termination_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.absorb_termination();
                }
                event = self.activity_rx.recv() => match event {
                    Ok(ActivityEvent::ApiCall) => self.extend_silently().await,
                    Err(RecvError::Lagged(skipped)) => {
                        trace!(skipped, "activity receiver lagged");
                        self.extend_silently().await;
                    }
                    Err(RecvError::Closed) => break,
                },
                tick = self.scheduler.wait_for_poll() => {
                    trace!(poll = tick.poll, "status poll due");
                    self.check_status().await;
                }
                () = sleep_until_some(self.visible_check_at) => {
                    self.visible_check_at = None;
                    debug!("page visible, catching up on session status");
                    self.check_status().await;
                    if self.tracker.is_watching() {
                        if self.scheduler.is_running() {
                            self.scheduler.resume();
                        } else {
                            self.scheduler.start();
                        }
                    }
                }
            }
        }

        self.scheduler.stop();
        info!("session monitor stopped");
    }

    async fn handle_command(&mut self, cmd: MonitorCommand) {
        match cmd {
            MonitorCommand::Extend {
                reply,
                _guard: guard,
            } => {
                let result = self.extend().await;
                drop(guard);
                let _ = reply.send(result);
            }
            MonitorCommand::Dismiss => {
                self.tracker.dismiss();
                self.publish();
            }
            MonitorCommand::Visibility(visible) => self.handle_visibility(visible),
            MonitorCommand::UserActivity(activity) => {
                if activity.is_deliberate() && self.user_activity.try_fire() {
                    trace!(?activity, "user activity, re-checking status");
                    self.check_status().await;
                }
            }
            MonitorCommand::CheckNow { reply } => {
                self.check_status().await;
                let _ = reply.send(self.tracker.view().clone());
            }
            MonitorCommand::Shutdown => {}
        }
    }

    /// Follows the auth session's logged-in state.
    async fn sync_auth(&mut self) {
        let authenticated = self.auth_rx.borrow_and_update().is_some();
        if !self.tracker.set_authenticated(authenticated) {
            return;
        }

        self.visible_check_at = None;
        if authenticated {
            info!("session authenticated, monitoring expiry");
            self.api_extend.reset();
            self.user_activity.reset();
            self.publish();
            if self.tracker.view().is_page_visible {
                self.scheduler.start();
                self.check_status().await;
            }
        } else {
            self.scheduler.stop();
            self.absorb_termination();
            info!(phase = %self.tracker.phase(), "session ended");
            self.publish();
        }
    }

    /// Moves to `Expired` if the auth layer terminated the session itself.
    /// Handles either order of the user flip and the termination reason.
    fn absorb_termination(&mut self) {
        let reason = *self.termination_rx.borrow_and_update();
        let Some(reason) = reason else {
            return;
        };
        if self.auth.is_authenticated() {
            // Recorded just ahead of the user flip; that flip brings us back.
            return;
        }
        if self.tracker.expire() {
            info!(%reason, "session terminated by the auth layer");
            self.scheduler.stop();
            self.visible_check_at = None;
            self.publish();
        }
    }

    fn handle_visibility(&mut self, visible: bool) {
        self.tracker.set_visible(visible);
        if visible {
            // Re-arming on every show coalesces rapid toggles into one check.
            if self.tracker.is_watching() {
                self.visible_check_at = Some(Instant::now() + self.config.visibility_debounce);
            }
        } else {
            debug!("page hidden, pausing status polls");
            self.visible_check_at = None;
            self.scheduler.pause();
        }
        self.publish();
    }

    /// One status fetch. Network trouble waits for the next cycle.
    async fn check_status(&mut self) {
        if !self.tracker.is_watching() {
            return;
        }
        match self.auth.session_status().await {
            Ok(status) => self.apply_status(status).await,
            Err(AuthError::SessionExpired) => self.expire(TerminationReason::RefreshFailed).await,
            Err(AuthError::NotAuthenticated) => {
                trace!("status check skipped, session already cleared");
            }
            Err(e) if e.is_transport() => {
                debug!(error = %e, "session status check failed, retrying next cycle");
            }
            Err(e) => warn!(error = %e, "session status check failed"),
        }
    }

    async fn apply_status(&mut self, status: SessionStatus) {
        let before = self.tracker.phase();
        match self.tracker.apply_status(status) {
            Some(MonitorPhase::Expired) => {
                let reason = if status.active {
                    TerminationReason::TimedOut
                } else {
                    TerminationReason::Inactive
                };
                self.expire(reason).await;
            }
            Some(phase) => {
                if phase != before {
                    info!(
                        %phase,
                        remaining_minutes = status.remaining_minutes,
                        "session monitor phase changed"
                    );
                }
                self.publish();
            }
            None => {}
        }
    }

    async fn expire(&mut self, reason: TerminationReason) {
        self.tracker.expire();
        self.scheduler.stop();
        self.visible_check_at = None;
        self.publish();
        self.auth.expire_session(reason).await;
    }

    async fn extend(&mut self) -> Result<SessionStatus, AuthError> {
        self.tracker.set_extending(true);
        self.publish();

        let result = self.auth.extend_session().await;
        self.tracker.set_extending(false);

        match result {
            Ok(status) => {
                info!(remaining_minutes = status.remaining_minutes, "session extended");
                self.tracker.clear_warning();
                self.apply_status(status).await;
                self.check_status().await;
                Ok(status)
            }
            Err(AuthError::SessionExpired) => {
                self.expire(TerminationReason::RefreshFailed).await;
                Err(AuthError::SessionExpired)
            }
            Err(e) => {
                warn!(error = %e, "session extend failed");
                self.publish();
                Err(e)
            }
        }
    }

    /// Extends the session in the background after API activity, at most
    /// once per debounce window. Failures are logged and dropped.
    async fn extend_silently(&mut self) {
        if !self.tracker.is_watching() {
            return;
        }
        if !self.api_extend.try_fire() {
            trace!("silent extend debounced");
            return;
        }
        match self.auth.extend_session().await {
            Ok(status) => {
                debug!(remaining_minutes = status.remaining_minutes, "session extended silently");
                self.apply_status(status).await;
            }
            Err(AuthError::SessionExpired) => self.expire(TerminationReason::RefreshFailed).await,
            Err(e) => debug!(error = %e, "silent session extend failed"),
        }
    }

    fn publish(&self) {
        let next = self.tracker.view();
        self.view.send_if_modified(|current| {
            if current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });
    }
}

async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Spawns a monitor for `auth` and returns a handle to it.
///
/// The monitor subscribes to the session's activity notifier and identity
/// channel, so it must be spawned inside a Tokio runtime. It runs until
/// [`MonitorHandle::shutdown`] or until every handle is dropped.
pub fn spawn_monitor<T: HttpTransport>(
    auth: Arc<AuthSession<T>>,
    config: MonitorConfig,
) -> MonitorHandle {
    let config = config.validated();
    let (sender, receiver) = mpsc::channel(config.command_buffer);
    let (view_tx, view_rx) = watch::channel(WarningView::default());
    let notifier = auth.notifier().clone();

    let actor = SessionMonitor {
        tracker: TimeoutTracker::from_config(&config),
        scheduler: PollScheduler::new(config.poll.clone()),
        api_extend: Debounce::new(config.api_extend_debounce),
        user_activity: Debounce::new(config.activity_debounce),
        visible_check_at: None,
        view: view_tx,
        receiver,
        auth_rx: auth.subscribe(),
        termination_rx: auth.subscribe_termination(),
        activity_rx: notifier.subscribe(),
        auth,
        config,
    };
    tokio::spawn(actor.run());

    MonitorHandle {
        sender,
        view: view_rx,
        extending: Arc::new(AtomicBool::new(false)),
        notifier,
    }
}
