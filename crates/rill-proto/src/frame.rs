//! Frame container: header plus raw payload bytes.

use bytes::BufMut;

use crate::{
    errors::{ProtocolError, Result},
    header::FrameHeader,
};

/// A complete wire frame.
///
/// The payload is kept as raw bytes here; [`crate::Payload`] handles CBOR
/// decoding so that routing layers can forward frames without decoding them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame header.
    pub header: FrameHeader,
    /// Raw CBOR payload bytes (may be empty).
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame, fixing up the header's payload length.
    pub fn new(header: FrameHeader, payload: Vec<u8>) -> Self {
        let mut header = header;
        header.set_payload_len(payload.len() as u32);
        Self { header, payload }
    }

    /// Total encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        FrameHeader::SIZE + self.payload.len()
    }

    /// Serialize header and payload into `buf`.
    pub fn encode(&self, buf: &mut impl BufMut) -> Result<()> {
        if self.payload.len() > FrameHeader::MAX_PAYLOAD as usize {
            return Err(ProtocolError::PayloadTooLarge { len: self.payload.len() });
        }
        buf.put_slice(&self.header.to_bytes());
        buf.put_slice(&self.payload);
        Ok(())
    }
}
