//! Cookie-based authentication for Petrodesk clients.
//!
//! This crate owns "who is logged in" and the pipeline every API call goes
//! through:
//!
//! 1. **Identity** ([`AuthSession`]): initialization (with a one-time
//!    legacy-token migration), login, MFA, logout, permission checks.
//! 2. **Refresh**: a single-attempt refresh plus a backoff loop that yields
//!    to whichever tab the server lets rotate the tokens.
//! 3. **Requests** ([`AuthSession::make_authenticated_request`]): CSRF
//!    double-submit, one refresh-and-retry on 401, activity signalling.
//!
//! # How it fits in the stack
//!
//! ```text
//! Session monitor (above)  ← polls status, extends, expires
//!     ↕  ActivityNotifier / watch<Option<User>>
//! Auth layer (this crate)  ← identity, refresh, authenticated requests
//!     ↕
//! Protocol + Transport (below)  ← typed bodies, HTTP with a cookie jar
//! ```
//!
//! Session and refresh cookies are `HttpOnly`; this crate never sees a
//! token. The only cookie it reads is the CSRF one.

mod account;
mod config;
mod error;
mod host;
mod legacy;
mod notifier;
mod refresh;
mod request;
mod session;

pub use config::{AuthConfig, Endpoints};
pub use error::AuthError;
pub use host::{ChannelHost, NoopHost, SessionHost, SessionTerminated, TerminationReason};
pub use legacy::{JsonFileLegacyStore, LegacyCredentialStore, MemoryLegacyStore, NoLegacyStore};
pub use notifier::{ActivityEvent, ActivityNotifier};
pub use refresh::{DEFAULT_RETRY_AFTER_SECS, parse_retry_after};
pub use request::RequestOptions;
pub use session::{AuthSession, LoginOutcome, MfaChallenge};
