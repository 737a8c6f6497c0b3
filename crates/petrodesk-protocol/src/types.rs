//! Core protocol types for the `{API}/auth/*` endpoints.
//!
//! Everything here is a JSON body that travels on the wire. Field names
//! follow the server's camelCase convention through `rename_all`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error codes the server puts in the `code` field of an error body.
pub mod codes {
    /// HTTP 429 from `/auth/refresh`: another tab holds the refresh lock.
    pub const REFRESH_IN_PROGRESS: &str = "REFRESH_IN_PROGRESS";
    /// Every CSRF rejection code starts with this (`CSRF_TOKEN_MISSING`,
    /// `CSRF_TOKEN_INVALID`, ...).
    pub const CSRF_PREFIX: &str = "CSRF";
}

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A user's numeric ID.
///
/// Newtype over `i64` so a user ID can't be passed where a company ID is
/// expected. Serialized as the bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// A tenant (company) ID. Every business record is scoped to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(pub i64);

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C-{}", self.0)
    }
}

/// A role name as the server spells it (`"SUPER_ADMIN"`, `"ADMIN"`, ...).
///
/// Kept as a string: the role list belongs to the server and grows without
/// client releases. Only `SUPER_ADMIN` has client-side meaning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(pub String);

impl Role {
    pub const SUPER_ADMIN: &'static str = "SUPER_ADMIN";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Super admins are not scoped to a company.
    pub fn is_super_admin(&self) -> bool {
        self.0 == Self::SUPER_ADMIN
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The authenticated principal, as returned by `/auth/me`, login, MFA
/// verification and refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Role,
    pub company_id: Option<CompanyId>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub mfa_enabled: bool,
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// The `{success, data, message}` wrapper most endpoints answer with.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub code: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// The human-readable failure message, if the server sent one.
    pub fn error_message(&self) -> Option<&str> {
        self.message.as_deref().or(self.error.as_deref())
    }

    /// Unwraps `data` from a successful envelope.
    ///
    /// # Errors
    /// `ProtocolError::InvalidMessage` if `success` is false or `data` is
    /// missing.
    pub fn into_data(self) -> Result<T, crate::ProtocolError> {
        if !self.success {
            return Err(crate::ProtocolError::InvalidMessage(
                self.error_message()
                    .unwrap_or("request was not successful")
                    .to_string(),
            ));
        }
        self.data.ok_or_else(|| {
            crate::ProtocolError::InvalidMessage("success envelope without data".into())
        })
    }
}

/// An error body. Every field is optional because error bodies come from
/// several layers (app, proxy, rate limiter) that don't agree on a shape.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub message: Option<String>,
    pub error: Option<String>,
    pub code: Option<String>,
    pub retry_after: Option<serde_json::Value>,
}

impl ErrorBody {
    /// The human-readable failure message, if the server sent one.
    pub fn error_message(&self) -> Option<&str> {
        self.message.as_deref().or(self.error.as_deref())
    }

    /// `true` when `code` matches exactly.
    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }

    /// `true` for CSRF validation rejections.
    pub fn is_csrf_failure(&self) -> bool {
        self.code
            .as_deref()
            .is_some_and(|c| c.starts_with(codes::CSRF_PREFIX))
    }

    /// The body's `retryAfter` as whole seconds, if it is a positive number
    /// (or a string holding one). Fractions round up.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self.retry_after.as_ref()? {
            serde_json::Value::Number(n) => match n.as_u64() {
                Some(secs) => (secs > 0).then_some(secs),
                None => n
                    .as_f64()
                    .filter(|f| f.is_finite() && *f > 0.0)
                    .map(|f| f.ceil() as u64),
            },
            serde_json::Value::String(s) => s.trim().parse::<u64>().ok().filter(|s| *s > 0),
            _ => None,
        }
    }
}

/// `data` payload carrying a user (`/auth/me`, `/auth/refresh`, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct UserData {
    pub user: User,
}

// ---------------------------------------------------------------------------
// Login / MFA / migration
// ---------------------------------------------------------------------------

/// `POST /auth/login` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub company_id: CompanyId,
}

/// `POST /auth/login` response.
///
/// With `requiresMfa: true` the server sets no session cookies and `data`
/// carries only `userId` and `companyId` for the second step.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub requires_mfa: bool,
    pub data: Option<LoginData>,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// `data` of a login response. Which fields are present depends on
/// `requiresMfa`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub user: Option<User>,
    pub user_id: Option<UserId>,
    pub company_id: Option<CompanyId>,
}

/// `POST /auth/mfa/verify` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MfaVerifyRequest {
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub code: String,
    pub is_backup_code: bool,
}

/// Credentials left behind by the pre-cookie auth scheme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyCredentials {
    pub token: String,
    pub refresh_token: Option<String>,
}

/// `POST /auth/migrate-to-cookies` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateRequest {
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl From<LegacyCredentials> for MigrateRequest {
    fn from(creds: LegacyCredentials) -> Self {
        Self {
            token: creds.token,
            refresh_token: creds.refresh_token,
        }
    }
}

// ---------------------------------------------------------------------------
// Session status
// ---------------------------------------------------------------------------

/// `GET /auth/session/status` and `POST /auth/session/extend` payload.
///
/// A snapshot: it is stale the moment it arrives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub active: bool,
    pub remaining_minutes: f64,
    pub timeout_minutes: f64,
}

// ---------------------------------------------------------------------------
// Account self-service
// ---------------------------------------------------------------------------

/// `GET /auth/mfa/status` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MfaStatus {
    pub enabled: bool,
    pub backup_codes_remaining: Option<u32>,
}

/// `POST /auth/mfa/setup` payload: the TOTP secret to enroll.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MfaSetup {
    pub secret: String,
    pub otpauth_url: String,
    pub qr_code: Option<String>,
}

/// One-time backup codes, shown to the user exactly once.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupCodes {
    pub backup_codes: Vec<String>,
}

/// Body for endpoints that only need a TOTP code.
#[derive(Debug, Clone, Serialize)]
pub struct MfaCodeRequest {
    pub code: String,
}

/// `DELETE /auth/mfa` body.
#[derive(Debug, Clone, Serialize)]
pub struct MfaDisableRequest {
    pub password: String,
    pub code: String,
}

/// `POST /auth/change-password` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// `PUT /auth/update-profile` body. Unset fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}
