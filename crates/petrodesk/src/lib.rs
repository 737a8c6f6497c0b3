//! # Petrodesk
//!
//! Session and authentication client for the Petrodesk oil-trading ERP.
//!
//! The server keeps the session in `HttpOnly` cookies; this crate keeps
//! everything around it straight:
//!
//! - who is logged in, login with optional MFA, logout
//! - every API call with CSRF protection and one transparent token refresh
//! - cross-tab refresh arbitration by server-driven backoff
//! - the "your session is about to expire" warning, with silent extension
//!   while the user is actually working
//!
//! ## Layers
//!
//! | Crate | Role |
//! |---|---|
//! | `petrodesk-transport` | HTTP with a cookie jar |
//! | `petrodesk-protocol` | wire types and JSON codec |
//! | `petrodesk-timing` | backoff, debounce, poll scheduling |
//! | `petrodesk-auth` | [`AuthSession`] |
//! | `petrodesk-monitor` | session monitor actor |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use petrodesk::prelude::*;
//!
//! # async fn run() -> Result<(), PetrodeskError> {
//! petrodesk::init_tracing();
//!
//! let base = url::Url::parse("https://erp.example.com/api/").unwrap();
//! let client = SessionClient::builder(base).connect().await?;
//! client.auth().login("ops@example.com", "secret", CompanyId(1)).await?;
//!
//! let resp = client
//!     .auth()
//!     .make_authenticated_request("purchase-orders", RequestOptions::get())
//!     .await?;
//! println!("{} {}", resp.status, resp.text());
//! # Ok(())
//! # }
//! ```

mod client;
mod error;

pub use client::{SessionClient, SessionClientBuilder};
pub use error::PetrodeskError;

pub use petrodesk_auth::AuthSession;

/// Re-exports of the types most callers need.
pub mod prelude {
    pub use crate::{PetrodeskError, SessionClient, SessionClientBuilder};
    pub use petrodesk_auth::{
        ActivityEvent, ActivityNotifier, AuthConfig, AuthError, AuthSession, ChannelHost,
        JsonFileLegacyStore, LoginOutcome, MfaChallenge, RequestOptions, SessionHost,
        SessionTerminated, TerminationReason,
    };
    pub use petrodesk_monitor::{
        ExtendOutcome, MonitorConfig, MonitorHandle, MonitorPhase, UserActivity, WarningView,
    };
    pub use petrodesk_protocol::{CompanyId, Role, SessionStatus, User, UserId};
    pub use petrodesk_timing::{BackoffPolicy, PollConfig};
    pub use petrodesk_transport::{ApiResponse, HttpTransport, Method, MultipartForm};
    #[cfg(feature = "reqwest")]
    pub use petrodesk_transport::ReqwestTransport;
}

/// Installs a `fmt` subscriber filtered by `RUST_LOG` (default `info`).
///
/// For binaries; libraries only emit events. Calling it twice is harmless.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
