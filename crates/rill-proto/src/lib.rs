//! Wire format for the Rill pub/sub protocol.
//!
//! Frames consist of a fixed 24-byte header (binary, big-endian) followed by
//! a variable-length CBOR payload. The header carries everything needed to
//! route a frame without touching the payload: an opcode, a correlation
//! identifier pairing requests with responses, and per-frame flags.
//!
//! Correlation identifier `0` is reserved for session-level and
//! server-initiated frames (handshake, channel messages); every client
//! request uses a fresh non-zero identifier and its response echoes it back.
//!
//! # Security
//!
//! Header parsing validates magic, version, and payload size before any
//! allocation. We enforce a 16 MB payload limit to prevent memory exhaustion
//! attacks. No "fast paths" that skip validation.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod flags;
pub mod frame;
pub mod header;
pub mod opcodes;
pub mod payloads;

pub use errors::{ProtocolError, Result};
pub use flags::FrameFlags;
pub use frame::Frame;
pub use header::FrameHeader;
pub use opcodes::Opcode;
pub use payloads::Payload;
