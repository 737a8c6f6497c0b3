//! End-to-end tests for the wired-up client.

use std::sync::Arc;
use std::time::Duration;

use petrodesk::prelude::*;
use petrodesk_auth::MemoryLegacyStore;
use petrodesk_protocol::LegacyCredentials;
use petrodesk_transport::{MockResponse, MockTransport};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn base() -> url::Url {
    url::Url::parse("https://erp.example.com/api").unwrap()
}

fn user_body() -> serde_json::Value {
    json!({"success": true, "data": {"user": {"id": 4, "role": "TRADER", "companyId": 1}}})
}

fn status_body(remaining: f64) -> serde_json::Value {
    json!({"success": true, "data": {"active": true, "remainingMinutes": remaining, "timeoutMinutes": 30}})
}

#[tokio::test(start_paused = true)]
async fn test_connect_with_restores_session_and_starts_monitor() {
    let mock = Arc::new(MockTransport::new());
    mock.on(Method::Get, "/api/auth/me", MockResponse::json(200, user_body()))
        .on(
            Method::Get,
            "/api/auth/session/status",
            MockResponse::json(200, status_body(4.0)),
        );

    let client = SessionClientBuilder::new(base())
        .connect_with(Arc::clone(&mock))
        .await;
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert_eq!(client.user().map(|u| u.id), Some(UserId(4)));
    let view = client.monitor().state();
    assert_eq!(view.phase, MonitorPhase::WarningShown);
    assert_eq!(view.remaining_minutes, Some(4.0));
}

#[tokio::test(start_paused = true)]
async fn test_connect_with_migrates_legacy_tokens() {
    let mock = Arc::new(MockTransport::new());
    mock.on(
        Method::Post,
        "/api/auth/migrate-to-cookies",
        MockResponse::json(200, user_body()),
    );
    let store = Arc::new(MemoryLegacyStore::new(Some(LegacyCredentials {
        token: "bearer".into(),
        refresh_token: None,
    })));

    let client = SessionClientBuilder::new(base())
        .legacy_store(store.clone())
        .connect_with(Arc::clone(&mock))
        .await;

    assert!(client.auth().is_authenticated());
    assert!(store.is_empty());
    assert_eq!(mock.count(Method::Get, "/api/auth/me"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_connect_with_custom_login_route_reaches_host() {
    let mock = Arc::new(MockTransport::new());
    mock.on(Method::Get, "/api/auth/me", MockResponse::json(200, user_body()))
        .on(
            Method::Get,
            "/api/auth/session/status",
            MockResponse::json(200, status_body(0.0)),
        );
    let (host, mut terminated) = ChannelHost::new();

    let client = SessionClientBuilder::new(base())
        .login_route("/signin?expired=1")
        .host(Arc::new(host))
        .connect_with(Arc::clone(&mock))
        .await;
    tokio::time::sleep(Duration::from_millis(1)).await;

    let event = terminated.try_recv().expect("session should have expired");
    assert_eq!(event.login_route, "/signin?expired=1");
    assert_eq!(event.reason, TerminationReason::TimedOut);
    assert!(client.user().is_none());
}

#[tokio::test]
async fn test_connect_over_http_then_login_and_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(user_body())
                .append_header("set-cookie", "session=s1; Path=/; HttpOnly")
                .append_header("set-cookie", "csrf-token=c1; Path=/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/session/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body(25.0)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/session/extend"))
        .and(header("x-csrf-token", "c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body(30.0)))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/cargoes/12"))
        .and(header("x-csrf-token", "c1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let api_base = url::Url::parse(&format!("{}/api/", server.uri())).unwrap();
    let client = SessionClient::builder(api_base).connect().await.unwrap();
    assert!(client.user().is_none());

    let outcome = client
        .auth()
        .login("ops@example.com", "secret", CompanyId(1))
        .await
        .unwrap();
    assert!(matches!(outcome, LoginOutcome::Authenticated(_)));

    let resp = client
        .auth()
        .make_authenticated_request("cargoes/12", RequestOptions::delete())
        .await
        .unwrap();
    assert_eq!(resp.status, 204);

    let outcome = client.monitor().extend_session().await.unwrap();
    assert!(matches!(outcome, ExtendOutcome::Extended(s) if s.remaining_minutes == 30.0));

    client.shutdown().await.unwrap();
}
