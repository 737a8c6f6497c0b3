/// Errors that can occur in the transport layer.
///
/// These only cover failing to exchange a request at all. An HTTP error
/// status is a successful exchange and comes back as an `ApiResponse`.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request could not be built (bad header value, bad MIME type).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Sending the request failed (DNS, connect, TLS, reset).
    #[error("send failed: {0}")]
    SendFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The response arrived but its body could not be read.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
}
