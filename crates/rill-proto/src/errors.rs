//! Protocol error types.

use crate::opcodes::Opcode;

/// Errors produced while encoding or decoding wire frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Header buffer shorter than the fixed header size.
    #[error("truncated header: {len} bytes")]
    TruncatedHeader {
        /// Number of bytes available.
        len: usize,
    },

    /// Magic bytes did not match.
    #[error("bad magic: {found:#010x}")]
    BadMagic {
        /// Value found in the magic position.
        found: u32,
    },

    /// Protocol version not supported by this implementation.
    #[error("unsupported version: {found}")]
    UnsupportedVersion {
        /// Version byte found in the header.
        found: u8,
    },

    /// Opcode value has no registered meaning.
    #[error("unknown opcode: {opcode:#06x}")]
    UnknownOpcode {
        /// Raw opcode value.
        opcode: u16,
    },

    /// Payload exceeds the 16 MB limit.
    #[error("payload too large: {len} bytes")]
    PayloadTooLarge {
        /// Declared or actual payload length.
        len: usize,
    },

    /// Payload present on an opcode that carries none, or vice versa.
    #[error("unexpected payload for opcode {opcode:?}")]
    UnexpectedPayload {
        /// Opcode of the offending frame.
        opcode: Opcode,
    },

    /// CBOR serialization failure.
    #[error("encode error: {0}")]
    Encode(String),

    /// CBOR deserialization failure.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Convenience alias for protocol results.
pub type Result<T> = core::result::Result<T, ProtocolError>;
