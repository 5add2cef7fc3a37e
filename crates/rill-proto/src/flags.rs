//! Per-frame flag bits.

use bitflags::bitflags;

bitflags! {
    /// Flag bits carried in byte 5 of the frame header.
    ///
    /// Flags mirror information that also lives in the payload so that
    /// routing layers can act on a frame without decoding CBOR.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FrameFlags: u8 {
        /// The carried message must be acknowledged by the receiver.
        const REQUIRES_ACK = 1;

        /// Handshake completed against an existing session (restoration),
        /// not a freshly issued one.
        const RESTORED = 1 << 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_bits_are_dropped() {
        let flags = FrameFlags::from_bits_truncate(0b1111_0001);
        assert_eq!(flags, FrameFlags::REQUIRES_ACK);
    }
}
