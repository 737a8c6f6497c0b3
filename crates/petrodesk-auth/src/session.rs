//! The auth session: identity, login, MFA, logout and permission checks.
//!
//! [`AuthSession`] is the sole owner of the cached [`User`]. Everything
//! that changes it (login, MFA verification, refresh, logout, a failed
//! refresh) goes through methods on this type; nothing outside can reach in.
//!
//! The user lives in a `watch` channel:
//! - reads ([`is_authenticated`](AuthSession::is_authenticated),
//!   [`current_user`](AuthSession::current_user)) are synchronous,
//! - the session monitor [`subscribe`](AuthSession::subscribe)s and sees
//!   every authenticated/unauthenticated flip.
//!
//! A second `watch` carries why the session was terminated, so observers
//! can tell a dead session from a deliberate logout.
//!
//! Token refresh lives in `refresh.rs`, the request pipeline in
//! `request.rs` and account self-service in `account.rs`; they are all
//! `impl AuthSession` blocks over the same state.

use std::sync::Arc;

use petrodesk_protocol::{
    ApiEnvelope, Codec, CompanyId, JsonCodec, LoginRequest, LoginResponse, MfaVerifyRequest,
    MigrateRequest, User, UserData, UserId,
};
use petrodesk_transport::{ApiRequest, ApiResponse, HttpTransport, Method};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    ActivityNotifier, AuthConfig, AuthError, LegacyCredentialStore, NoLegacyStore, NoopHost,
    SessionHost, TerminationReason,
};

/// Result of [`AuthSession::login`].
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    /// Cookies are set and the user is cached.
    Authenticated(User),
    /// The password was accepted but a second factor is needed. No cookies
    /// were set; finish with [`AuthSession::verify_mfa`].
    MfaRequired(MfaChallenge),
}

/// The partial identity returned when login needs a second factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MfaChallenge {
    pub user_id: UserId,
    pub company_id: CompanyId,
}

/// Client-side view of a cookie-backed session.
///
/// Share it with `Arc`; every method takes `&self`.
pub struct AuthSession<T: HttpTransport> {
    pub(crate) config: AuthConfig,
    pub(crate) transport: T,
    pub(crate) codec: JsonCodec,
    pub(crate) notifier: ActivityNotifier,
    user: watch::Sender<Option<User>>,
    legacy: Arc<dyn LegacyCredentialStore>,
    host: Arc<dyn SessionHost>,
    /// Why the current session was terminated, if it was. Set once per
    /// session and cleared when a user is adopted, so the host hears about
    /// one death once even when the pipeline and the monitor both notice it.
    termination: watch::Sender<Option<TerminationReason>>,
}

impl<T: HttpTransport> AuthSession<T> {
    /// Creates an unauthenticated session. Nothing touches the network
    /// until [`initialize`](Self::initialize) or [`login`](Self::login).
    pub fn new(config: AuthConfig, transport: T, notifier: ActivityNotifier) -> Self {
        let (user, _) = watch::channel(None);
        let (termination, _) = watch::channel(None);
        Self {
            config: config.validated(),
            transport,
            codec: JsonCodec,
            notifier,
            user,
            legacy: Arc::new(NoLegacyStore),
            host: Arc::new(NoopHost),
            termination,
        }
    }

    pub fn with_legacy_store(mut self, store: Arc<dyn LegacyCredentialStore>) -> Self {
        self.legacy = store;
        self
    }

    pub fn with_host(mut self, host: Arc<dyn SessionHost>) -> Self {
        self.host = host;
        self
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn notifier(&self) -> &ActivityNotifier {
        &self.notifier
    }

    // -----------------------------------------------------------------------
    // Identity
    // -----------------------------------------------------------------------

    /// Whether a user is cached. The server may disagree; the next request
    /// finds out.
    pub fn is_authenticated(&self) -> bool {
        self.user.borrow().is_some()
    }

    pub fn current_user(&self) -> Option<User> {
        self.user.borrow().clone()
    }

    /// A receiver that sees every change to the cached user.
    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.user.subscribe()
    }

    /// Why the session was terminated, or `None` while it is alive or
    /// after a plain logout.
    pub fn termination(&self) -> Option<TerminationReason> {
        *self.termination.borrow()
    }

    /// A receiver that sees each termination, and its reset on the next
    /// login.
    pub fn subscribe_termination(&self) -> watch::Receiver<Option<TerminationReason>> {
        self.termination.subscribe()
    }

    pub(crate) fn set_user(&self, user: User) {
        self.termination.send_if_modified(|reason| reason.take().is_some());
        self.user.send_replace(Some(user));
    }

    pub(crate) fn clear_user(&self) {
        self.user.send_if_modified(|user| user.take().is_some());
    }

    pub(crate) fn update_user(&self, f: impl FnOnce(&mut User)) {
        self.user.send_if_modified(|user| match user {
            Some(user) => {
                f(user);
                true
            }
            None => false,
        });
    }

    /// Ends the session locally: records the reason, clears the user,
    /// then tells the host (at most once per session).
    pub(crate) fn terminate(&self, reason: TerminationReason) {
        let first = self.record_termination(reason);
        self.clear_user();
        if first {
            self.notify_host(reason);
        }
    }

    /// Returns `false` if this session already has a termination reason.
    fn record_termination(&self, reason: TerminationReason) -> bool {
        self.termination.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        })
    }

    fn notify_host(&self, reason: TerminationReason) {
        info!(%reason, "session terminated");
        self.host
            .on_session_terminated(reason, &self.config.login_route);
    }

    // -----------------------------------------------------------------------
    // Initialization
    // -----------------------------------------------------------------------

    /// Establishes the initial auth state. Never fails.
    ///
    /// 1. Legacy credentials in the store are traded for cookies via the
    ///    migration endpoint. The store is cleared whether or not that works.
    /// 2. Otherwise (or if migration failed) `/auth/me` is asked who the
    ///    cookies belong to.
    ///
    /// Any failure just means "not logged in": the user stays `None`.
    pub async fn initialize(&self) -> Option<User> {
        if let Some(credentials) = self.legacy.load() {
            info!("legacy credentials found, migrating to cookie session");
            let migrated = self.migrate_legacy(MigrateRequest::from(credentials)).await;
            self.legacy.clear();
            match migrated {
                Ok(user) => {
                    info!(user_id = %user.id, "legacy credentials migrated");
                    self.set_user(user.clone());
                    return Some(user);
                }
                Err(e) => warn!(error = %e, "legacy migration failed, checking cookie session"),
            }
        }

        match self.fetch_me().await {
            Ok(user) => {
                info!(user_id = %user.id, "existing session restored");
                self.set_user(user.clone());
                Some(user)
            }
            Err(e) => {
                debug!(error = %e, "no active session");
                self.clear_user();
                None
            }
        }
    }

    async fn migrate_legacy(&self, body: MigrateRequest) -> Result<User, AuthError> {
        let url = self.endpoint(&self.config.endpoints.migrate)?;
        let body = self.codec.to_value(&body)?;
        let response = self.send_unauthenticated(Method::Post, url, Some(body)).await?;
        let data: UserData = self.expect_data(&response, "legacy migration failed")?;
        Ok(data.user)
    }

    async fn fetch_me(&self) -> Result<User, AuthError> {
        let url = self.endpoint(&self.config.endpoints.me)?;
        let response = self.send_unauthenticated(Method::Get, url, None).await?;
        let data: UserData = self.expect_data(&response, "session check failed")?;
        Ok(data.user)
    }

    // -----------------------------------------------------------------------
    // Login / MFA / logout
    // -----------------------------------------------------------------------

    /// Logs in with email and password.
    ///
    /// # Errors
    /// `Rejected` with the server's message for bad credentials, or the
    /// transport/protocol error if the call itself failed.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        company_id: CompanyId,
    ) -> Result<LoginOutcome, AuthError> {
        let url = self.endpoint(&self.config.endpoints.login)?;
        let body = self.codec.to_value(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            company_id,
        })?;
        let response = self.send_unauthenticated(Method::Post, url, Some(body)).await?;
        if !response.is_success() {
            let err = AuthError::from_response(&response, "login failed");
            info!(%company_id, status = response.status, "login rejected");
            return Err(err);
        }

        let parsed: LoginResponse = self.codec.decode(&response.body)?;
        if !parsed.success {
            return Err(AuthError::Rejected {
                status: response.status,
                message: parsed
                    .message
                    .or(parsed.error)
                    .unwrap_or_else(|| "login failed".into()),
            });
        }

        let data = parsed.data.ok_or_else(|| missing("login response without data"))?;
        if parsed.requires_mfa {
            let user_id = data
                .user_id
                .or(data.user.as_ref().map(|u| u.id))
                .ok_or_else(|| missing("MFA challenge without userId"))?;
            let challenge = MfaChallenge {
                user_id,
                company_id: data.company_id.unwrap_or(company_id),
            };
            info!(user_id = %challenge.user_id, "login requires MFA");
            return Ok(LoginOutcome::MfaRequired(challenge));
        }

        let user = data.user.ok_or_else(|| missing("login response without user"))?;
        self.legacy.clear();
        self.set_user(user.clone());
        info!(user_id = %user.id, %company_id, "login succeeded");
        Ok(LoginOutcome::Authenticated(user))
    }

    /// Completes a login that returned [`LoginOutcome::MfaRequired`].
    ///
    /// `is_backup_code` marks `code` as a one-time backup code rather than
    /// a TOTP code.
    pub async fn verify_mfa(
        &self,
        user_id: UserId,
        company_id: CompanyId,
        code: &str,
        is_backup_code: bool,
    ) -> Result<User, AuthError> {
        let url = self.endpoint(&self.config.endpoints.mfa_verify)?;
        let body = self.codec.to_value(&MfaVerifyRequest {
            user_id,
            company_id,
            code: code.to_string(),
            is_backup_code,
        })?;
        let response = self.send_unauthenticated(Method::Post, url, Some(body)).await?;
        let data: UserData = self.expect_data(&response, "MFA verification failed")?;

        self.legacy.clear();
        self.set_user(data.user.clone());
        info!(%user_id, is_backup_code, "MFA verified");
        Ok(data.user)
    }

    /// Logs out. Best effort on the network; locally always complete.
    pub async fn logout(&self) {
        let sent = match self.endpoint(&self.config.endpoints.logout) {
            Ok(url) => self.send_unauthenticated(Method::Post, url, None).await,
            Err(e) => Err(e),
        };
        match sent {
            Ok(response) if response.is_success() => debug!("server session invalidated"),
            Ok(response) => debug!(status = response.status, "logout call rejected"),
            Err(e) => debug!(error = %e, "logout call failed"),
        }

        self.clear_user();
        self.legacy.clear();
        info!("logged out");
    }

    /// Ends the session from outside the request pipeline (the monitor saw
    /// it expire): logs out, then tells the host.
    pub async fn expire_session(&self, reason: TerminationReason) {
        warn!(%reason, "session expired");
        let first = self.record_termination(reason);
        self.logout().await;
        if first {
            self.notify_host(reason);
        }
    }

    // -----------------------------------------------------------------------
    // Permission checks
    // -----------------------------------------------------------------------

    pub fn has_permission(&self, permission: &str) -> bool {
        self.user
            .borrow()
            .as_ref()
            .is_some_and(|u| u.permissions.iter().any(|p| p == permission))
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.user
            .borrow()
            .as_ref()
            .is_some_and(|u| u.role.as_str() == role)
    }

    /// Whether the user may see records of `company_id`. Super admins see
    /// every company.
    pub fn has_company_access(&self, company_id: CompanyId) -> bool {
        self.user.borrow().as_ref().is_some_and(|u| {
            u.role.is_super_admin() || u.company_id == Some(company_id)
        })
    }

    /// The current CSRF token from the cookie jar.
    pub fn csrf_token(&self) -> Option<String> {
        self.transport.cookie(&self.config.csrf_cookie)
    }

    // -----------------------------------------------------------------------
    // Helpers shared by the other impl blocks
    // -----------------------------------------------------------------------

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        Ok(self.config.resolve(path)?)
    }

    /// Sends one request outside the authenticated pipeline: CSRF is
    /// attached, but there is no user check and no 401 recovery.
    pub(crate) async fn send_unauthenticated(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse, AuthError> {
        let mut request = ApiRequest::new(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.dispatch(request).await
    }

    /// Unwraps `data` from a 2xx success envelope.
    pub(crate) fn expect_data<D: DeserializeOwned>(
        &self,
        response: &ApiResponse,
        context: &str,
    ) -> Result<D, AuthError> {
        if !response.is_success() {
            return Err(AuthError::from_response(response, context));
        }
        let envelope: ApiEnvelope<D> = self.codec.decode(&response.body)?;
        if !envelope.success {
            return Err(AuthError::Rejected {
                status: response.status,
                message: envelope.error_message().unwrap_or(context).to_string(),
            });
        }
        Ok(envelope.into_data()?)
    }

    /// Checks a 2xx success envelope that carries no data.
    pub(crate) fn expect_success(
        &self,
        response: &ApiResponse,
        context: &str,
    ) -> Result<(), AuthError> {
        if !response.is_success() {
            return Err(AuthError::from_response(response, context));
        }
        if response.body.is_empty() {
            return Ok(());
        }
        let envelope: ApiEnvelope<serde_json::Value> = self.codec.decode(&response.body)?;
        if envelope.success {
            Ok(())
        } else {
            Err(AuthError::Rejected {
                status: response.status,
                message: envelope.error_message().unwrap_or(context).to_string(),
            })
        }
    }
}

fn missing(what: &str) -> AuthError {
    AuthError::Protocol(petrodesk_protocol::ProtocolError::InvalidMessage(
        what.to_string(),
    ))
}
