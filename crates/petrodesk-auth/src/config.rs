//! Auth session configuration.

use petrodesk_timing::BackoffPolicy;
use petrodesk_transport::TransportError;
use tracing::warn;
use url::Url;

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// Endpoint paths, relative to [`AuthConfig::api_base`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub migrate: String,
    pub me: String,
    pub login: String,
    pub mfa_verify: String,
    pub logout: String,
    pub refresh: String,
    pub session_status: String,
    pub session_extend: String,
    pub mfa_status: String,
    pub mfa_setup: String,
    pub mfa_verify_setup: String,
    pub mfa_disable: String,
    pub mfa_regenerate_backup_codes: String,
    pub change_password: String,
    pub update_profile: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            migrate: "auth/migrate-to-cookies".into(),
            me: "auth/me".into(),
            login: "auth/login".into(),
            mfa_verify: "auth/mfa/verify".into(),
            logout: "auth/logout".into(),
            refresh: "auth/refresh".into(),
            session_status: "auth/session/status".into(),
            session_extend: "auth/session/extend".into(),
            mfa_status: "auth/mfa/status".into(),
            mfa_setup: "auth/mfa/setup".into(),
            mfa_verify_setup: "auth/mfa/verify-setup".into(),
            mfa_disable: "auth/mfa".into(),
            mfa_regenerate_backup_codes: "auth/mfa/regenerate-backup-codes".into(),
            change_password: "auth/change-password".into(),
            update_profile: "auth/update-profile".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AuthConfig
// ---------------------------------------------------------------------------

/// Configuration for an [`AuthSession`](crate::AuthSession).
///
/// There is no `Default`: the API base is deployment-specific.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Base URL every endpoint and relative request URL is resolved
    /// against, e.g. `https://erp.example.com/api/`.
    pub api_base: Url,
    pub endpoints: Endpoints,
    /// Name of the non-`HttpOnly` cookie holding the CSRF token.
    pub csrf_cookie: String,
    /// Header the CSRF token is echoed back in.
    pub csrf_header: String,
    /// Route handed to the host when the session terminates.
    pub login_route: String,
    /// Backoff for retrying a refresh another tab is performing.
    pub backoff: BackoffPolicy,
}

impl AuthConfig {
    pub const DEFAULT_CSRF_COOKIE: &'static str = "csrf-token";
    pub const DEFAULT_CSRF_HEADER: &'static str = "X-CSRF-Token";
    pub const DEFAULT_LOGIN_ROUTE: &'static str = "/login";

    pub fn new(api_base: Url) -> Self {
        Self {
            api_base,
            endpoints: Endpoints::default(),
            csrf_cookie: Self::DEFAULT_CSRF_COOKIE.into(),
            csrf_header: Self::DEFAULT_CSRF_HEADER.into(),
            login_route: Self::DEFAULT_LOGIN_ROUTE.into(),
            backoff: BackoffPolicy::default(),
        }
    }

    /// Fix values that would break URL resolution or backoff.
    ///
    /// - `api_base` gets a trailing `/`, otherwise `Url::join` would drop
    ///   its last path segment (`/api` + `auth/me` = `/auth/me`).
    /// - Empty CSRF names fall back to the defaults.
    pub fn validated(mut self) -> Self {
        if !self.api_base.path().ends_with('/') {
            let path = format!("{}/", self.api_base.path());
            self.api_base.set_path(&path);
        }
        if self.csrf_cookie.trim().is_empty() {
            warn!("empty csrf cookie name, using default");
            self.csrf_cookie = Self::DEFAULT_CSRF_COOKIE.into();
        }
        if self.csrf_header.trim().is_empty() {
            warn!("empty csrf header name, using default");
            self.csrf_header = Self::DEFAULT_CSRF_HEADER.into();
        }
        self.backoff = self.backoff.validated();
        self
    }

    /// Resolves a request target.
    ///
    /// Absolute `http`/`https` URLs are used as-is. Anything else is
    /// relative to `api_base`, with a leading `/` ignored, so `"/orders"`
    /// and `"orders"` both land at `{api_base}orders`. A colon in the first
    /// segment (`"petty-cash:export"`) is part of the path, not a scheme.
    ///
    /// # Errors
    /// `TransportError::InvalidRequest` if the target can't be resolved.
    pub fn resolve(&self, target: &str) -> Result<Url, TransportError> {
        match Url::parse(target) {
            Ok(absolute) if matches!(absolute.scheme(), "http" | "https") => return Ok(absolute),
            _ => {}
        }
        // "./" keeps `join` from reading a leading `name:` as a scheme.
        let relative = format!("./{}", target.trim_start_matches('/'));
        self.api_base
            .join(&relative)
            .map_err(|e| TransportError::InvalidRequest(format!("bad url {target:?}: {e}")))
    }
}
