//! Session monitor behaviour with a scripted server.
//!
//! Every test runs on a paused clock. `settle()` sleeps one millisecond,
//! which lets the monitor task drain its queue before time moves on.

use std::sync::Arc;
use std::time::Duration;

use petrodesk_auth::{
    ActivityNotifier, AuthConfig, AuthError, AuthSession, ChannelHost, RequestOptions,
    SessionTerminated, TerminationReason,
};
use petrodesk_monitor::{
    ExtendOutcome, MonitorConfig, MonitorError, MonitorHandle, MonitorPhase, UserActivity,
    spawn_monitor,
};
use petrodesk_timing::PollConfig;
use petrodesk_transport::{Method, MockResponse, MockTransport};
use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::sleep;
use url::Url;

// =========================================================================
// Helpers
// =========================================================================

const STATUS: &str = "/api/auth/session/status";
const EXTEND: &str = "/api/auth/session/extend";

struct Fixture {
    mock: Arc<MockTransport>,
    auth: Arc<AuthSession<Arc<MockTransport>>>,
    monitor: MonitorHandle,
    terminated: UnboundedReceiver<SessionTerminated>,
}

impl Fixture {
    fn status_calls(&self) -> usize {
        self.mock.count(Method::Get, STATUS)
    }

    fn extend_calls(&self) -> usize {
        self.mock.count(Method::Post, EXTEND)
    }
}

fn status(remaining: f64) -> MockResponse {
    status_with(true, remaining)
}

fn status_with(active: bool, remaining: f64) -> MockResponse {
    MockResponse::json(
        200,
        json!({
            "success": true,
            "data": {"active": active, "remainingMinutes": remaining, "timeoutMinutes": 30}
        }),
    )
}

fn user_ok() -> MockResponse {
    MockResponse::json(
        200,
        json!({"success": true, "data": {"user": {"id": 7, "role": "TRADER", "companyId": 1}}}),
    )
}

fn config() -> MonitorConfig {
    MonitorConfig {
        poll: PollConfig {
            interval: Duration::from_secs(60),
            initial_jitter: Duration::ZERO,
        },
        ..MonitorConfig::default()
    }
}

/// A logged-in session with a running monitor. `script` queues the status
/// responses before anything is sent.
async fn fixture(script: impl FnOnce(&MockTransport)) -> Fixture {
    let mock = Arc::new(MockTransport::new());
    mock.on(Method::Get, "/api/auth/me", user_ok());
    script(&mock);

    let (host, terminated) = ChannelHost::new();
    let auth = Arc::new(
        AuthSession::new(
            AuthConfig::new(Url::parse("https://erp.example.com/api/").unwrap()),
            Arc::clone(&mock),
            ActivityNotifier::new(),
        )
        .with_host(Arc::new(host)),
    );
    auth.initialize().await;
    let monitor = spawn_monitor(Arc::clone(&auth), config());
    settle().await;

    Fixture {
        mock,
        auth,
        monitor,
        terminated,
    }
}

async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

// =========================================================================
// Polling
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_monitor_checks_status_when_authenticated() {
    let f = fixture(|m| {
        m.on(Method::Get, STATUS, status(25.0));
    })
    .await;

    assert_eq!(f.status_calls(), 1);
    let view = f.monitor.state();
    assert_eq!(view.phase, MonitorPhase::Polling);
    assert_eq!(view.remaining_minutes, Some(25.0));
    assert_eq!(view.timeout_minutes, Some(30.0));
    assert!(!view.show_warning);
}

#[tokio::test(start_paused = true)]
async fn test_monitor_polls_on_interval() {
    let f = fixture(|m| {
        m.on(Method::Get, STATUS, status(25.0));
    })
    .await;

    sleep(Duration::from_secs(59)).await;
    assert_eq!(f.status_calls(), 1);
    sleep(Duration::from_secs(2)).await;
    assert_eq!(f.status_calls(), 2);
    sleep(Duration::from_secs(60)).await;
    assert_eq!(f.status_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_monitor_network_failure_keeps_polling() {
    let f = fixture(|m| {
        m.on(Method::Get, STATUS, MockResponse::network_error())
            .on(Method::Get, STATUS, status(25.0));
    })
    .await;

    assert_eq!(f.monitor.state().phase, MonitorPhase::Polling);
    assert!(f.auth.is_authenticated());

    sleep(Duration::from_secs(61)).await;
    assert_eq!(f.monitor.state().remaining_minutes, Some(25.0));
}

// =========================================================================
// Warning
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_monitor_warning_floor_overrides_dismissal() {
    let f = fixture(|m| {
        m.on(Method::Get, STATUS, status(4.0))
            .on(Method::Get, STATUS, status(3.0))
            .on(Method::Get, STATUS, status(2.0));
    })
    .await;
    assert!(f.monitor.state().show_warning);
    assert_eq!(f.monitor.state().phase, MonitorPhase::WarningShown);

    f.monitor.dismiss_warning().await.unwrap();
    settle().await;
    let view = f.monitor.state();
    assert!(!view.show_warning);
    assert!(view.warning_dismissed);

    let view = f.monitor.check_now().await.unwrap();
    assert!(!view.show_warning, "dismissed above the floor stays hidden");

    let view = f.monitor.check_now().await.unwrap();
    assert!(view.show_warning, "2 minutes left forces the warning back");
    assert_eq!(view.phase, MonitorPhase::WarningShown);

    f.monitor.dismiss_warning().await.unwrap();
    settle().await;
    assert!(f.monitor.state().show_warning);
}

#[tokio::test(start_paused = true)]
async fn test_monitor_subscribe_sees_warning_appear() {
    let f = fixture(|m| {
        m.on(Method::Get, STATUS, status(20.0))
            .on(Method::Get, STATUS, status(4.5));
    })
    .await;
    let mut views = f.monitor.subscribe();
    views.borrow_and_update();

    sleep(Duration::from_secs(61)).await;

    assert!(views.has_changed().unwrap());
    assert!(views.borrow_and_update().show_warning);
}

// =========================================================================
// Explicit extend
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_extend_session_clears_warning_and_refetches() {
    let f = fixture(|m| {
        m.on(Method::Get, STATUS, status(3.0))
            .on(Method::Get, STATUS, status(30.0))
            .on(Method::Post, EXTEND, status(30.0));
    })
    .await;
    assert!(f.monitor.state().show_warning);

    let outcome = f.monitor.extend_session().await.unwrap();

    let ExtendOutcome::Extended(status) = outcome else {
        panic!("expected Extended, got {outcome:?}");
    };
    assert_eq!(status.remaining_minutes, 30.0);
    let view = f.monitor.state();
    assert!(!view.show_warning);
    assert!(!view.is_extending);
    assert_eq!(view.phase, MonitorPhase::Polling);
    assert_eq!(f.status_calls(), 2, "status is re-fetched after extending");
    assert!(!f.monitor.is_extending());
}

#[tokio::test(start_paused = true)]
async fn test_extend_session_double_click_sends_once() {
    let f = fixture(|m| {
        m.on(Method::Get, STATUS, status(3.0))
            .on(Method::Post, EXTEND, status(30.0));
    })
    .await;

    let (first, second) = tokio::join!(f.monitor.extend_session(), f.monitor.extend_session());

    assert!(matches!(first.unwrap(), ExtendOutcome::Extended(_)));
    assert_eq!(second.unwrap(), ExtendOutcome::AlreadyExtending);
    assert_eq!(f.extend_calls(), 1);

    // The lock is released once the first call returns.
    assert!(matches!(
        f.monitor.extend_session().await.unwrap(),
        ExtendOutcome::Extended(_)
    ));
    assert_eq!(f.extend_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_extend_session_abandoned_by_caller_keeps_lock_until_done() {
    let f = fixture(|m| {
        m.on(Method::Get, STATUS, status(3.0))
            .on(Method::Get, STATUS, status(30.0))
            .on(
                Method::Post,
                EXTEND,
                status(30.0).with_delay(Duration::from_secs(5)),
            );
    })
    .await;

    let abandoned =
        tokio::time::timeout(Duration::from_secs(1), f.monitor.extend_session()).await;
    assert!(abandoned.is_err(), "the slow extend outlives the caller");

    // The monitor is still running the first call.
    assert!(f.monitor.is_extending());
    assert_eq!(
        f.monitor.extend_session().await.unwrap(),
        ExtendOutcome::AlreadyExtending
    );

    sleep(Duration::from_secs(5)).await;
    assert!(!f.monitor.is_extending());
    assert_eq!(f.extend_calls(), 1);
    assert!(!f.monitor.state().show_warning);
}

#[tokio::test(start_paused = true)]
async fn test_extend_session_failure_surfaces_to_caller() {
    let f = fixture(|m| {
        m.on(Method::Get, STATUS, status(3.0))
            .on(Method::Post, EXTEND, MockResponse::network_error());
    })
    .await;

    let err = f.monitor.extend_session().await.unwrap_err();

    assert!(matches!(err, MonitorError::Auth(ref e) if e.is_transport()));
    let view = f.monitor.state();
    assert!(view.show_warning);
    assert!(!view.is_extending);
}

// =========================================================================
// Silent extend on API activity
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_silent_extend_debounced_to_one_call() {
    let f = fixture(|m| {
        m.on(Method::Get, STATUS, status(25.0))
            .on(Method::Post, EXTEND, status(30.0));
    })
    .await;

    f.monitor.signal_api_activity();
    settle().await;
    f.monitor.signal_api_activity();
    settle().await;
    assert_eq!(f.extend_calls(), 1);

    sleep(Duration::from_secs(20)).await;
    f.monitor.signal_api_activity();
    settle().await;
    assert_eq!(f.extend_calls(), 1, "still inside the 30 s window");

    sleep(Duration::from_secs(11)).await;
    f.monitor.signal_api_activity();
    settle().await;
    assert_eq!(f.extend_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_silent_extend_follows_authenticated_request() {
    let f = fixture(|m| {
        m.on(Method::Get, STATUS, status(4.0))
            .on(Method::Post, EXTEND, status(30.0))
            .on(Method::Get, "/api/vessels", MockResponse::json(200, json!([])));
    })
    .await;
    assert!(f.monitor.state().show_warning);

    f.auth
        .make_authenticated_request("vessels", RequestOptions::get())
        .await
        .unwrap();
    settle().await;

    assert_eq!(f.extend_calls(), 1);
    let view = f.monitor.state();
    assert!(!view.show_warning, "extension past the threshold clears the warning");
    assert_eq!(view.remaining_minutes, Some(30.0));
}

#[tokio::test(start_paused = true)]
async fn test_silent_extend_failure_is_swallowed() {
    let f = fixture(|m| {
        m.on(Method::Get, STATUS, status(25.0))
            .on(Method::Post, EXTEND, MockResponse::status(500));
    })
    .await;

    f.monitor.signal_api_activity();
    settle().await;

    assert_eq!(f.extend_calls(), 1);
    assert_eq!(f.monitor.state().phase, MonitorPhase::Polling);
    assert!(f.auth.is_authenticated());
}

// =========================================================================
// User activity
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_user_activity_rechecks_status_without_extending() {
    let f = fixture(|m| {
        m.on(Method::Get, STATUS, status(25.0));
    })
    .await;

    f.monitor
        .record_user_activity(UserActivity::MouseMove)
        .await
        .unwrap();
    f.monitor
        .record_user_activity(UserActivity::Scroll)
        .await
        .unwrap();
    settle().await;
    assert_eq!(f.status_calls(), 1, "pointer movement is not deliberate");

    f.monitor
        .record_user_activity(UserActivity::KeyDown)
        .await
        .unwrap();
    f.monitor
        .record_user_activity(UserActivity::MouseDown)
        .await
        .unwrap();
    settle().await;
    assert_eq!(f.status_calls(), 2, "second input inside 60 s is debounced");
    assert_eq!(f.extend_calls(), 0);
}

// =========================================================================
// Visibility
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_hidden_tab_stops_polling_and_visible_checks_once() {
    let f = fixture(|m| {
        m.on(Method::Get, STATUS, status(25.0));
    })
    .await;
    assert_eq!(f.status_calls(), 1);

    f.monitor.set_page_visible(false).await.unwrap();
    sleep(Duration::from_secs(300)).await;
    assert_eq!(f.status_calls(), 1, "no polls while hidden");
    assert!(!f.monitor.state().is_page_visible);

    f.monitor.set_page_visible(true).await.unwrap();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(f.status_calls(), 1, "debounce has not elapsed");
    sleep(Duration::from_millis(60)).await;
    assert_eq!(f.status_calls(), 2, "exactly one catch-up check");

    sleep(Duration::from_secs(30)).await;
    assert_eq!(f.status_calls(), 2);
    sleep(Duration::from_secs(31)).await;
    assert_eq!(f.status_calls(), 3, "interval polling resumed");
}

#[tokio::test(start_paused = true)]
async fn test_rapid_visibility_toggles_coalesce() {
    let f = fixture(|m| {
        m.on(Method::Get, STATUS, status(25.0));
    })
    .await;

    for visible in [false, true, false, true, false, true] {
        f.monitor.set_page_visible(visible).await.unwrap();
        sleep(Duration::from_millis(20)).await;
    }
    sleep(Duration::from_millis(200)).await;

    assert_eq!(f.status_calls(), 2);
}

// =========================================================================
// Expiry and auth flips
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_zero_remaining_expires_and_notifies_host() {
    let mut f = fixture(|m| {
        m.on(Method::Get, STATUS, status(0.0));
    })
    .await;

    assert_eq!(f.monitor.state().phase, MonitorPhase::Expired);
    assert!(!f.auth.is_authenticated());
    assert_eq!(f.mock.count(Method::Post, "/api/auth/logout"), 1);
    let event = f.terminated.try_recv().expect("host should be told");
    assert_eq!(event.reason, TerminationReason::TimedOut);
    assert!(f.terminated.try_recv().is_err(), "host is told once");

    sleep(Duration::from_secs(300)).await;
    assert_eq!(f.status_calls(), 1, "no polling after expiry");
}

#[tokio::test(start_paused = true)]
async fn test_inactive_session_expires_as_inactive() {
    let mut f = fixture(|m| {
        m.on(Method::Get, STATUS, status_with(false, 12.0));
    })
    .await;

    assert_eq!(f.monitor.state().phase, MonitorPhase::Expired);
    assert_eq!(
        f.terminated.try_recv().unwrap().reason,
        TerminationReason::Inactive
    );
}

#[tokio::test(start_paused = true)]
async fn test_status_401_surviving_refresh_expires() {
    let mut f = fixture(|m| {
        m.on(Method::Get, STATUS, MockResponse::status(401))
            .on(Method::Post, "/api/auth/refresh", MockResponse::status(401));
    })
    .await;

    assert_eq!(f.monitor.state().phase, MonitorPhase::Expired);
    assert!(!f.auth.is_authenticated());
    assert_eq!(f.mock.count(Method::Post, "/api/auth/refresh"), 1);
    assert_eq!(
        f.terminated.try_recv().unwrap().reason,
        TerminationReason::RefreshFailed
    );
}

#[tokio::test(start_paused = true)]
async fn test_business_call_401_surviving_refresh_expires() {
    let mut f = fixture(|m| {
        m.on(Method::Get, STATUS, status(25.0))
            .on(Method::Get, "/api/banking", MockResponse::status(401))
            .on(Method::Post, "/api/auth/refresh", user_ok());
    })
    .await;

    let err = f
        .auth
        .make_authenticated_request("banking", RequestOptions::get())
        .await
        .unwrap_err();
    settle().await;

    assert!(matches!(err, AuthError::SessionExpired));
    let view = f.monitor.state();
    assert_eq!(view.phase, MonitorPhase::Expired);
    assert!(!view.show_warning);
    assert_eq!(
        f.terminated.try_recv().unwrap().reason,
        TerminationReason::RefreshFailed
    );
    assert!(f.terminated.try_recv().is_err(), "host is told once");

    sleep(Duration::from_secs(300)).await;
    assert_eq!(f.status_calls(), 1, "no polling after expiry");

    // The next login leaves Expired behind.
    f.auth.initialize().await;
    settle().await;
    assert_eq!(f.monitor.state().phase, MonitorPhase::Polling);
    assert_eq!(f.status_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_logout_idles_monitor_and_login_restarts_it() {
    let f = fixture(|m| {
        m.on(Method::Get, STATUS, status(25.0));
    })
    .await;

    f.auth.logout().await;
    settle().await;
    assert_eq!(f.monitor.state().phase, MonitorPhase::Idle);
    assert_eq!(f.monitor.state().remaining_minutes, None);

    sleep(Duration::from_secs(300)).await;
    assert_eq!(f.status_calls(), 1);

    f.auth.initialize().await;
    settle().await;
    assert_eq!(f.monitor.state().phase, MonitorPhase::Polling);
    assert_eq!(f.status_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_makes_handle_unavailable() {
    let f = fixture(|m| {
        m.on(Method::Get, STATUS, status(25.0));
    })
    .await;

    f.monitor.shutdown().await.unwrap();
    settle().await;

    assert!(matches!(
        f.monitor.dismiss_warning().await,
        Err(MonitorError::Unavailable)
    ));
    assert!(matches!(
        f.monitor.extend_session().await,
        Err(MonitorError::Unavailable)
    ));
}
