//! Connection events and inbound message delivery.

use tokio::sync::mpsc;

use crate::error::{ResponseError, TransportError};

/// A message delivered on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Channel the message arrived on.
    pub channel: String,
    /// Message text as published.
    pub message: String,
    /// Server-assigned message identifier.
    pub message_id: String,
    /// Whether the server asked for a delivery acknowledgement. The runtime
    /// sends the acknowledgement itself; this flag is informational.
    pub requires_ack: bool,
}

/// Per-channel message callback.
///
/// Runs on the connection task, so it must not block; hand heavy work off
/// to another task.
pub type MessageHandler = Box<dyn Fn(InboundMessage) + Send + 'static>;

/// Something that happened to the connection.
///
/// Events are delivered in the order they occurred. `Closed` is terminal
/// and emitted exactly once, whatever killed the connection.
#[derive(Debug)]
pub enum Event {
    /// The initial handshake succeeded and a session is live.
    NewSession {
        /// Server-issued session identifier.
        session_id: String,
    },
    /// A lost transport was re-established; the session identifier is
    /// unchanged.
    Reconnect,
    /// A message arrived on a channel with no dedicated handler.
    Message(InboundMessage),
    /// The link failed. Reconnection starts after this event.
    TransportError(TransportError),
    /// The server pushed an error not tied to any outstanding request.
    ResponseError(ResponseError),
    /// The connection is finished. No further events follow.
    Closed {
        /// The terminal fault, or `None` for a caller-initiated close.
        error: Option<TransportError>,
    },
}

/// Ordered stream of connection events.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Event>) -> Self {
        Self { rx }
    }

    /// Next event, or `None` once the terminal `Closed` event has been
    /// consumed.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}
