//! Error types for the protocol layer.
//!
//! Each crate in Petrodesk defines its own error enum. A `ProtocolError`
//! means the bytes were there but did not have the expected shape; it never
//! means the network failed.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: an HTML error page where JSON was expected, a missing
    /// required field, or a truncated body.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The body parsed but violates the API contract, e.g. a success
    /// envelope without the `data` it promises.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
