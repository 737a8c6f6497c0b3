//! Codec trait and the JSON implementation used for API bodies.
//!
//! The auth layer never calls `serde_json` directly; every body goes through
//! a [`Codec`] so encode and decode failures come back as [`ProtocolError`].

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Turns Rust values into request bodies and response bodies into Rust
/// values.
///
/// `Send + Sync + 'static` because the codec lives inside an auth session
/// that is shared across tasks.
pub trait Codec: Send + Sync + 'static {
    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Serializes a value into a JSON tree for a request body.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn to_value<T: Serialize>(&self, value: &T) -> Result<serde_json::Value, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ```rust
/// use petrodesk_protocol::{Codec, JsonCodec, SessionStatus};
///
/// let codec = JsonCodec;
/// let status: SessionStatus = codec
///     .decode(br#"{"active":true,"remainingMinutes":12,"timeoutMinutes":30}"#)
///     .unwrap();
/// assert_eq!(status.remaining_minutes, 12.0);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }

    fn to_value<T: Serialize>(&self, value: &T) -> Result<serde_json::Value, ProtocolError> {
        serde_json::to_value(value).map_err(ProtocolError::Encode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ApiEnvelope, CompanyId, LoginRequest, SessionStatus};

    #[test]
    fn test_decode_malformed_returns_decode_error() {
        let codec = JsonCodec;
        let result: Result<ApiEnvelope<serde_json::Value>, _> =
            codec.decode(b"<html>502 Bad Gateway</html>");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_encode_login_request_uses_camel_case() {
        let codec = JsonCodec;
        let body = LoginRequest {
            email: "a@b.com".into(),
            password: "pw".into(),
            company_id: CompanyId(1),
        };
        let value = codec.to_value(&body).unwrap();
        assert_eq!(value["companyId"], 1);
        assert_eq!(value["email"], "a@b.com");
    }

    #[test]
    fn test_decode_wrong_shape_returns_decode_error() {
        let codec = JsonCodec;
        let result: Result<SessionStatus, _> = codec.decode(br#"{"active":"yes"}"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
