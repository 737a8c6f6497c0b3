//! Wire protocol for the Petrodesk auth API.
//!
//! This crate defines what the client and the `{API}/auth/*` endpoints say
//! to each other:
//!
//! - **Types** ([`User`], [`ApiEnvelope`], [`SessionStatus`], the login and
//!   MFA request/response shapes): the JSON bodies on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how bodies become bytes
//!   and back.
//! - **Errors** ([`ProtocolError`]): what can go wrong doing that.
//!
//! It knows nothing about HTTP or cookies; the transport and auth crates
//! sit on either side of it.
//!
//! ```text
//! Transport (bytes) → Protocol (typed bodies) → Auth (session identity)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ApiEnvelope, BackupCodes, ChangePasswordRequest, CompanyId, ErrorBody, LegacyCredentials,
    LoginData, LoginRequest, LoginResponse, MfaCodeRequest, MfaDisableRequest, MfaSetup,
    MfaStatus, MfaVerifyRequest, MigrateRequest, ProfileUpdate, Role, SessionStatus, User,
    UserData, UserId, codes,
};
