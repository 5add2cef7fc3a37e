//! Opcode registry.

/// Frame opcode.
///
/// Grouped by function: `0x00xx` session control, `0x002x` subscription
/// control, `0x003x` publish/message, `0x00FF` error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    /// Client -> server: open or restore a session with credential keys.
    Handshake = 0x0001,
    /// Server -> client: session established.
    HandshakeOk = 0x0002,

    /// Client -> server: ask for the authoritative session identifier.
    GetSession = 0x0010,
    /// Server -> client: session identifier response.
    SessionInfo = 0x0011,

    /// Client -> server: subscribe to a channel.
    Subscribe = 0x0020,
    /// Client -> server: unsubscribe from a channel.
    Unsubscribe = 0x0021,
    /// Client -> server: drop every subscription.
    UnsubscribeAll = 0x0022,
    /// Client -> server: list confirmed subscriptions.
    ListSubscriptions = 0x0023,
    /// Server -> client: current channel set, response to any of the four
    /// subscription-control requests.
    ChannelList = 0x0024,

    /// Client -> server: publish a message to a channel.
    Publish = 0x0030,
    /// Server -> client: durable-receipt for an acknowledged publish.
    PublishReceipt = 0x0031,
    /// Server -> client: message delivered on a subscribed channel.
    Message = 0x0032,
    /// Client -> server: acknowledge a received message.
    Ack = 0x0033,

    /// Server -> client: request rejected.
    Error = 0x00FF,
}

impl Opcode {
    /// Raw wire value.
    pub fn to_u16(self) -> u16 {
        self as u16
    }

    /// Parse a raw wire value.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0001 => Some(Self::Handshake),
            0x0002 => Some(Self::HandshakeOk),
            0x0010 => Some(Self::GetSession),
            0x0011 => Some(Self::SessionInfo),
            0x0020 => Some(Self::Subscribe),
            0x0021 => Some(Self::Unsubscribe),
            0x0022 => Some(Self::UnsubscribeAll),
            0x0023 => Some(Self::ListSubscriptions),
            0x0024 => Some(Self::ChannelList),
            0x0030 => Some(Self::Publish),
            0x0031 => Some(Self::PublishReceipt),
            0x0032 => Some(Self::Message),
            0x0033 => Some(Self::Ack),
            0x00FF => Some(Self::Error),
            _ => None,
        }
    }
}
