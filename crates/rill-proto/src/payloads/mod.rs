//! Typed payloads carried inside frames.
//!
//! Every response payload has a distinct shape tied to its opcode, so
//! callers match on a tagged enum instead of downcasting dynamic values.

pub mod pubsub;
pub mod session;

pub use pubsub::{Ack, ChannelList, ChannelMessage, ChannelRequest, Publish, PublishReceipt};
pub use session::{ErrorCode, ErrorInfo, Handshake, HandshakeOk, SessionInfo};

use crate::{
    errors::{ProtocolError, Result},
    flags::FrameFlags,
    frame::Frame,
    header::FrameHeader,
    opcodes::Opcode,
};

/// Decoded frame payload, tagged by opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Open or restore a session.
    Handshake(Handshake),
    /// Session established.
    HandshakeOk(HandshakeOk),
    /// Ask for the authoritative session identifier.
    GetSession,
    /// Session identifier response.
    SessionInfo(SessionInfo),
    /// Subscribe to a channel.
    Subscribe(ChannelRequest),
    /// Unsubscribe from a channel.
    Unsubscribe(ChannelRequest),
    /// Drop every subscription.
    UnsubscribeAll,
    /// List confirmed subscriptions.
    ListSubscriptions,
    /// Current channel set.
    ChannelList(ChannelList),
    /// Publish a message.
    Publish(Publish),
    /// Receipt for an acknowledged publish.
    PublishReceipt(PublishReceipt),
    /// Message delivered on a subscribed channel.
    Message(ChannelMessage),
    /// Acknowledge a received message.
    Ack(Ack),
    /// Request rejected.
    Error(ErrorInfo),
}

impl Payload {
    /// Opcode this payload travels under.
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Handshake(_) => Opcode::Handshake,
            Self::HandshakeOk(_) => Opcode::HandshakeOk,
            Self::GetSession => Opcode::GetSession,
            Self::SessionInfo(_) => Opcode::SessionInfo,
            Self::Subscribe(_) => Opcode::Subscribe,
            Self::Unsubscribe(_) => Opcode::Unsubscribe,
            Self::UnsubscribeAll => Opcode::UnsubscribeAll,
            Self::ListSubscriptions => Opcode::ListSubscriptions,
            Self::ChannelList(_) => Opcode::ChannelList,
            Self::Publish(_) => Opcode::Publish,
            Self::PublishReceipt(_) => Opcode::PublishReceipt,
            Self::Message(_) => Opcode::Message,
            Self::Ack(_) => Opcode::Ack,
            Self::Error(_) => Opcode::Error,
        }
    }

    /// Flag bits mirrored into the header for this payload.
    fn flags(&self) -> FrameFlags {
        match self {
            Self::Publish(p) if p.requires_ack => FrameFlags::REQUIRES_ACK,
            Self::Message(m) if m.requires_ack => FrameFlags::REQUIRES_ACK,
            Self::HandshakeOk(h) if h.restored => FrameFlags::RESTORED,
            _ => FrameFlags::empty(),
        }
    }

    /// Serialize into a frame carrying the given correlation identifier.
    pub fn into_frame(self, correlation_id: u64) -> Result<Frame> {
        let header = FrameHeader::new(self.opcode(), correlation_id).with_flags(self.flags());
        let body = self.encode_body()?;
        if body.len() > FrameHeader::MAX_PAYLOAD as usize {
            return Err(ProtocolError::PayloadTooLarge { len: body.len() });
        }
        Ok(Frame::new(header, body))
    }

    /// Decode a frame's payload according to its opcode.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let opcode = frame
            .header
            .opcode_enum()
            .ok_or(ProtocolError::UnknownOpcode { opcode: frame.header.opcode() })?;

        match opcode {
            Opcode::GetSession | Opcode::UnsubscribeAll | Opcode::ListSubscriptions => {
                if !frame.payload.is_empty() {
                    return Err(ProtocolError::UnexpectedPayload { opcode });
                }
                Ok(match opcode {
                    Opcode::GetSession => Self::GetSession,
                    Opcode::UnsubscribeAll => Self::UnsubscribeAll,
                    _ => Self::ListSubscriptions,
                })
            }
            Opcode::Handshake => decode(&frame.payload).map(Self::Handshake),
            Opcode::HandshakeOk => decode(&frame.payload).map(Self::HandshakeOk),
            Opcode::SessionInfo => decode(&frame.payload).map(Self::SessionInfo),
            Opcode::Subscribe => decode(&frame.payload).map(Self::Subscribe),
            Opcode::Unsubscribe => decode(&frame.payload).map(Self::Unsubscribe),
            Opcode::ChannelList => decode(&frame.payload).map(Self::ChannelList),
            Opcode::Publish => decode(&frame.payload).map(Self::Publish),
            Opcode::PublishReceipt => decode(&frame.payload).map(Self::PublishReceipt),
            Opcode::Message => decode(&frame.payload).map(Self::Message),
            Opcode::Ack => decode(&frame.payload).map(Self::Ack),
            Opcode::Error => decode(&frame.payload).map(Self::Error),
        }
    }

    fn encode_body(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            Self::GetSession | Self::UnsubscribeAll | Self::ListSubscriptions => {}
            Self::Handshake(p) => encode(p, &mut buf)?,
            Self::HandshakeOk(p) => encode(p, &mut buf)?,
            Self::SessionInfo(p) => encode(p, &mut buf)?,
            Self::Subscribe(p) | Self::Unsubscribe(p) => encode(p, &mut buf)?,
            Self::ChannelList(p) => encode(p, &mut buf)?,
            Self::Publish(p) => encode(p, &mut buf)?,
            Self::PublishReceipt(p) => encode(p, &mut buf)?,
            Self::Message(p) => encode(p, &mut buf)?,
            Self::Ack(p) => encode(p, &mut buf)?,
            Self::Error(p) => encode(p, &mut buf)?,
        }
        Ok(buf)
    }
}

fn encode<T: serde::Serialize>(value: &T, buf: &mut Vec<u8>) -> Result<()> {
    ciborium::ser::into_writer(value, buf).map_err(|e| ProtocolError::Encode(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::Decode(e.to_string()))
}
