//! Subscription and message payload types.

use serde::{Deserialize, Serialize};

/// A request naming a single channel (Subscribe, Unsubscribe).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRequest {
    /// Channel name.
    pub channel: String,
}

/// The confirmed channel set, returned for every subscription-control
/// request so the client can mirror server state without a second query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelList {
    /// Channels the session is subscribed to, sorted.
    pub channels: Vec<String>,
}

/// Publish a message to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publish {
    /// Target channel.
    pub channel: String,

    /// Message body.
    pub message: String,

    /// Request a durable receipt. When set the server answers with
    /// [`PublishReceipt`]; otherwise no response is sent.
    pub requires_ack: bool,
}

/// Durable receipt for an acknowledged publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    /// Server-assigned message identifier.
    pub message_id: String,
}

/// A message delivered on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Channel the message was published to.
    pub channel: String,

    /// Message body.
    pub message: String,

    /// Server-assigned message identifier.
    pub message_id: String,

    /// The receiver must send [`Ack`] after delivering this message.
    pub requires_ack: bool,
}

/// Acknowledge a received message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Identifier of the acknowledged message.
    pub message_id: String,
}
