//! `SessionClient` builder: wires transport, auth session and monitor.
//!
//! ```text
//! ActivityNotifier ──┬──▶ AuthSession<T> ──▶ HttpTransport (cookie jar)
//!                    └──▶ session monitor task ──▶ watch<WarningView>
//! ```
//!
//! One notifier is shared so successful API calls extend the session
//! without the auth layer knowing the monitor exists.

use std::sync::Arc;

use petrodesk_auth::{
    ActivityNotifier, AuthConfig, AuthSession, Endpoints, LegacyCredentialStore, NoLegacyStore,
    NoopHost, SessionHost,
};
use petrodesk_monitor::{MonitorConfig, MonitorHandle, spawn_monitor};
use petrodesk_protocol::User;
use petrodesk_timing::BackoffPolicy;
use petrodesk_transport::HttpTransport;
#[cfg(feature = "reqwest")]
use petrodesk_transport::ReqwestTransport;
use url::Url;

use crate::PetrodeskError;

/// Builder for a [`SessionClient`].
///
/// # Example
///
/// ```rust,no_run
/// use petrodesk::prelude::*;
///
/// # async fn run() -> Result<(), PetrodeskError> {
/// let base = url::Url::parse("https://erp.example.com/api/").unwrap();
/// let client = SessionClient::builder(base).connect().await?;
/// if client.user().is_none() {
///     client.auth().login("ops@example.com", "secret", CompanyId(1)).await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct SessionClientBuilder {
    auth: AuthConfig,
    monitor: MonitorConfig,
    notifier: ActivityNotifier,
    legacy: Arc<dyn LegacyCredentialStore>,
    host: Arc<dyn SessionHost>,
}

impl SessionClientBuilder {
    /// Creates a builder with default settings for the API at `api_base`.
    pub fn new(api_base: Url) -> Self {
        Self {
            auth: AuthConfig::new(api_base),
            monitor: MonitorConfig::default(),
            notifier: ActivityNotifier::new(),
            legacy: Arc::new(NoLegacyStore),
            host: Arc::new(NoopHost),
        }
    }

    /// Replaces the whole auth configuration (the API base included).
    pub fn auth_config(mut self, config: AuthConfig) -> Self {
        self.auth = config;
        self
    }

    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.auth.endpoints = endpoints;
        self
    }

    /// Sets the CSRF cookie name and the header it is echoed in.
    pub fn csrf(mut self, cookie: &str, header: &str) -> Self {
        self.auth.csrf_cookie = cookie.to_string();
        self.auth.csrf_header = header.to_string();
        self
    }

    /// Route handed to the host when the session terminates.
    pub fn login_route(mut self, route: &str) -> Self {
        self.auth.login_route = route.to_string();
        self
    }

    pub fn backoff(mut self, policy: BackoffPolicy) -> Self {
        self.auth.backoff = policy;
        self
    }

    pub fn monitor_config(mut self, config: MonitorConfig) -> Self {
        self.monitor = config;
        self
    }

    /// Shares an existing notifier, so other services can signal activity.
    pub fn notifier(mut self, notifier: ActivityNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Where pre-cookie bearer tokens may still be stored.
    pub fn legacy_store(mut self, store: Arc<dyn LegacyCredentialStore>) -> Self {
        self.legacy = store;
        self
    }

    /// Who is told when the session ends.
    pub fn host(mut self, host: Arc<dyn SessionHost>) -> Self {
        self.host = host;
        self
    }

    /// Connects over HTTP with a fresh cookie jar.
    ///
    /// See [`connect_with`](Self::connect_with).
    #[cfg(feature = "reqwest")]
    pub async fn connect(self) -> Result<SessionClient<ReqwestTransport>, PetrodeskError> {
        let origin = self.auth.clone().validated().api_base;
        let transport = ReqwestTransport::new(origin)?;
        Ok(self.connect_with(transport).await)
    }

    /// Builds the client over `transport`, restores any existing session
    /// and starts the monitor.
    ///
    /// Restoring never fails: an unreachable server or a dead cookie
    /// leaves the client logged out. Must be called inside a Tokio runtime.
    pub async fn connect_with<T: HttpTransport>(self, transport: T) -> SessionClient<T> {
        let auth = Arc::new(
            AuthSession::new(self.auth, transport, self.notifier)
                .with_legacy_store(self.legacy)
                .with_host(self.host),
        );

        match auth.initialize().await {
            Some(user) => tracing::info!(user_id = %user.id, "existing session restored"),
            None => tracing::info!("no existing session"),
        }

        let monitor = spawn_monitor(Arc::clone(&auth), self.monitor);
        SessionClient { auth, monitor }
    }
}

/// A connected client: the auth session plus its running monitor.
pub struct SessionClient<T: HttpTransport> {
    auth: Arc<AuthSession<T>>,
    monitor: MonitorHandle,
}

#[cfg(feature = "reqwest")]
impl SessionClient<ReqwestTransport> {
    /// Creates a new builder. For other transports use
    /// [`SessionClientBuilder::new`] and
    /// [`connect_with`](SessionClientBuilder::connect_with).
    pub fn builder(api_base: Url) -> SessionClientBuilder {
        SessionClientBuilder::new(api_base)
    }
}

impl<T: HttpTransport> SessionClient<T> {
    /// The auth session: login, requests, permission checks.
    pub fn auth(&self) -> &Arc<AuthSession<T>> {
        &self.auth
    }

    /// The session monitor: warning state, extend, visibility.
    pub fn monitor(&self) -> &MonitorHandle {
        &self.monitor
    }

    pub fn user(&self) -> Option<User> {
        self.auth.current_user()
    }

    /// Stops the monitor. The auth session stays usable.
    pub async fn shutdown(&self) -> Result<(), PetrodeskError> {
        Ok(self.monitor.shutdown().await?)
    }
}
