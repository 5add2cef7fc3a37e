//! Fixed-size frame header.
//!
//! Layout (big-endian):
//!
//! ```text
//! offset  size  field
//! 0       4     magic ("RILL")
//! 4       1     version
//! 5       1     flags
//! 6       2     opcode
//! 8       8     correlation id
//! 16      4     payload length
//! 20      4     reserved (zero)
//! ```

use crate::{
    errors::{ProtocolError, Result},
    flags::FrameFlags,
    opcodes::Opcode,
};

/// Parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    version: u8,
    flags: FrameFlags,
    opcode: u16,
    correlation_id: u64,
    payload_len: u32,
}

impl FrameHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = 24;

    /// Magic bytes, "RILL" in ASCII.
    pub const MAGIC: u32 = 0x5249_4C4C;

    /// Current protocol version.
    pub const VERSION: u8 = 1;

    /// Maximum payload length (16 MB).
    pub const MAX_PAYLOAD: u32 = 16 * 1024 * 1024;

    /// Create a header for the given opcode and correlation identifier.
    ///
    /// Payload length starts at zero; [`crate::Frame::new`] sets it from the
    /// actual payload.
    pub fn new(opcode: Opcode, correlation_id: u64) -> Self {
        Self {
            version: Self::VERSION,
            flags: FrameFlags::empty(),
            opcode: opcode.to_u16(),
            correlation_id,
            payload_len: 0,
        }
    }

    /// Replace the flag bits.
    pub fn with_flags(mut self, flags: FrameFlags) -> Self {
        self.flags = flags;
        self
    }

    pub(crate) fn set_payload_len(&mut self, len: u32) {
        self.payload_len = len;
    }

    /// Protocol version.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Flag bits.
    pub fn flags(&self) -> FrameFlags {
        self.flags
    }

    /// Raw opcode value.
    pub fn opcode(&self) -> u16 {
        self.opcode
    }

    /// Opcode, if the raw value is registered.
    pub fn opcode_enum(&self) -> Option<Opcode> {
        Opcode::from_u16(self.opcode)
    }

    /// Correlation identifier pairing a response with its request.
    ///
    /// Zero for session-level and server-initiated frames.
    pub fn correlation_id(&self) -> u64 {
        self.correlation_id
    }

    /// Declared payload length in bytes.
    pub fn payload_len(&self) -> u32 {
        self.payload_len
    }

    /// Serialize to wire bytes.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&Self::MAGIC.to_be_bytes());
        bytes[4] = self.version;
        bytes[5] = self.flags.bits();
        bytes[6..8].copy_from_slice(&self.opcode.to_be_bytes());
        bytes[8..16].copy_from_slice(&self.correlation_id.to_be_bytes());
        bytes[16..20].copy_from_slice(&self.payload_len.to_be_bytes());
        bytes
    }

    /// Parse wire bytes.
    ///
    /// Validates magic, version, and payload length before anything else
    /// looks at the frame. Unknown flag bits are dropped; unknown opcodes
    /// are preserved and surfaced via [`Self::opcode_enum`] so the caller
    /// decides how to handle them.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(ProtocolError::TruncatedHeader { len: bytes.len() });
        }

        let magic = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic != Self::MAGIC {
            return Err(ProtocolError::BadMagic { found: magic });
        }

        let version = bytes[4];
        if version != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion { found: version });
        }

        let flags = FrameFlags::from_bits_truncate(bytes[5]);
        let opcode = u16::from_be_bytes([bytes[6], bytes[7]]);
        let correlation_id = u64::from_be_bytes([
            bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
        ]);

        let payload_len = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
        if payload_len > Self::MAX_PAYLOAD {
            return Err(ProtocolError::PayloadTooLarge { len: payload_len as usize });
        }

        Ok(Self { version, flags, opcode, correlation_id, payload_len })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn round_trip() {
        let mut header =
            FrameHeader::new(Opcode::Subscribe, 42).with_flags(FrameFlags::REQUIRES_ACK);
        header.set_payload_len(128);

        let parsed = FrameHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.opcode_enum(), Some(Opcode::Subscribe));
        assert_eq!(parsed.correlation_id(), 42);
        assert_eq!(parsed.payload_len(), 128);
        assert!(parsed.flags().contains(FrameFlags::REQUIRES_ACK));
    }

    #[test]
    fn rejects_truncated() {
        let header = FrameHeader::new(Opcode::Ack, 1);
        let bytes = header.to_bytes();
        let err = FrameHeader::from_bytes(&bytes[..10]).unwrap_err();
        assert!(matches!(err, ProtocolError::TruncatedHeader { len: 10 }));
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = FrameHeader::new(Opcode::Ack, 1).to_bytes();
        bytes[0] = 0xFF;
        assert!(matches!(
            FrameHeader::from_bytes(&bytes),
            Err(ProtocolError::BadMagic { .. })
        ));
    }

    #[test]
    fn rejects_wrong_version() {
        let mut bytes = FrameHeader::new(Opcode::Ack, 1).to_bytes();
        bytes[4] = 99;
        assert!(matches!(
            FrameHeader::from_bytes(&bytes),
            Err(ProtocolError::UnsupportedVersion { found: 99 })
        ));
    }

    #[test]
    fn rejects_oversized_payload() {
        let mut bytes = FrameHeader::new(Opcode::Publish, 1).to_bytes();
        bytes[16..20].copy_from_slice(&(FrameHeader::MAX_PAYLOAD + 1).to_be_bytes());
        assert!(matches!(
            FrameHeader::from_bytes(&bytes),
            Err(ProtocolError::PayloadTooLarge { .. })
        ));
    }

    proptest! {
        /// Arbitrary bytes never panic the parser.
        #[test]
        fn arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = FrameHeader::from_bytes(&bytes);
        }

        /// Any header we can construct survives a byte round-trip.
        #[test]
        fn constructed_headers_round_trip(
            correlation_id in any::<u64>(),
            payload_len in 0u32..=FrameHeader::MAX_PAYLOAD,
            flag_bits in 0u8..=3,
        ) {
            let mut header = FrameHeader::new(Opcode::Message, correlation_id)
                .with_flags(FrameFlags::from_bits_truncate(flag_bits));
            header.set_payload_len(payload_len);

            let parsed = FrameHeader::from_bytes(&header.to_bytes()).unwrap();
            prop_assert_eq!(parsed, header);
        }
    }
}
