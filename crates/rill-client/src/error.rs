//! Error taxonomy surfaced to callers.
//!
//! Three disjoint classes: [`TransportError`] for link faults (these drive
//! reconnection), [`ResponseError`] for requests the server or runtime
//! refused, and validation failures for input that never left the process.

use rill_core::error::ValidationError;
pub use rill_core::transport::TransportError;

/// A request the server or runtime refused.
///
/// Also covers requests orphaned by a timeout or a dying connection, in
/// which case the message is "timeout" or "connection closed".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ResponseError {
    /// Human-readable refusal reason.
    pub message: String,
}

impl ResponseError {
    /// Build a response error from its message.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Any failure a handle operation can resolve with.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The link itself failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server or runtime refused this one request.
    #[error(transparent)]
    Response(#[from] ResponseError),

    /// The input was rejected before reaching the transport.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
