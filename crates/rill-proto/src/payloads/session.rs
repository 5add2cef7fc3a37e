//! Session-control payload types.

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Session handshake.
///
/// First frame on every connection. Carries the three credential keys
/// (read, write, admin) and, when restoring after a transport fault, the
/// previously issued session identifier.
///
/// # Protocol Flow
///
/// 1. Client opens the transport and sends Handshake
/// 2. Server validates the keys
/// 3. Server replies with HandshakeOk (fresh or restored session) or Error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    /// Credential keys in read, write, admin order.
    pub keys: Vec<String>,

    /// Session to restore; `None` requests a fresh session.
    pub session_id: Option<String>,
}

/// Successful handshake response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeOk {
    /// Server-issued session identifier (UUID string).
    pub session_id: String,

    /// True if an existing session was restored rather than freshly issued.
    pub restored: bool,
}

/// Response to a GetSession request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// The authoritative session identifier.
    pub session_id: String,
}

/// Numeric error code carried in rejection responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u16)]
pub enum ErrorCode {
    /// Malformed or invalid request.
    BadRequest = 400,
    /// Credential keys rejected.
    Unauthorized = 401,
    /// Operation referenced a channel the session is not subscribed to.
    NotSubscribed = 404,
    /// Server-side failure.
    Internal = 500,
}

/// Request rejection details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Machine-readable error code.
    pub code: ErrorCode,

    /// Human-readable description.
    pub message: String,
}
