//! Caller-facing connection handle.
//!
//! [`connect`] spawns the connection actor and hands back a cloneable
//! [`ConnectionHandle`] plus the [`EventStream`]. Handle methods enqueue a
//! command with a oneshot reply and await the resolution; the actor
//! guarantees every command resolves exactly once.

use std::time::Duration;

use rill_core::{
    credentials::{Credentials, validate_channel},
    session::ReconnectPolicy,
    transport::Transport,
};
use tokio::sync::{mpsc, oneshot};

use crate::{
    conn::Conn,
    error::{ClientError, ResponseError},
    event::{EventStream, MessageHandler},
};

/// Tunables for a connection.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// How long a control request, the handshake included, may wait for its
    /// response.
    pub request_timeout: Duration,
    /// Reconnection backoff schedule.
    pub reconnect: ReconnectPolicy,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self { request_timeout: Duration::from_secs(30), reconnect: ReconnectPolicy::default() }
    }
}

/// Oneshot slot a command resolves into.
pub(crate) type Reply<T> = oneshot::Sender<Result<T, ClientError>>;

pub(crate) enum Command {
    SessionId { reply: Reply<String> },
    Subscribe { channel: String, handler: Option<MessageHandler>, reply: Reply<Vec<String>> },
    Unsubscribe { channel: String, reply: Reply<Vec<String>> },
    UnsubscribeAll { reply: Reply<Vec<String>> },
    ListSubscriptions { reply: Reply<Vec<String>> },
    Publish { channel: String, message: String, reply: Reply<()> },
    PublishWithAck { channel: String, message: String, reply: Reply<String> },
    Close { reply: oneshot::Sender<()> },
}

/// Open a connection and return its handle and event stream.
///
/// Returns immediately; the handshake runs on a spawned task. The first
/// event is `NewSession` on success or `Closed` if the initial handshake
/// fails (the initial connect does not retry). Must be called from within
/// a Tokio runtime.
pub fn connect<T: Transport>(
    transport: T,
    credentials: Credentials,
    options: ConnectionOptions,
) -> (ConnectionHandle, EventStream) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let conn = Conn::new(transport, credentials, options, event_tx);
    tokio::spawn(conn.run(cmd_rx));
    (ConnectionHandle { cmd_tx }, EventStream::new(event_rx))
}

/// Cloneable handle to a running connection.
///
/// Safe to use from any task. Once the connection is closed, by the caller
/// or by a terminal fault, every request resolves with a "connection
/// closed" response error.
#[derive(Clone)]
pub struct ConnectionHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl ConnectionHandle {
    /// Ask the server for the authoritative session identifier.
    pub async fn session_id(&self) -> Result<String, ClientError> {
        self.request(|reply| Command::SessionId { reply }).await
    }

    /// Subscribe to a channel, optionally attaching a dedicated handler for
    /// its messages.
    ///
    /// Resolves with the server's channel list after the mutation.
    /// Re-subscribing an already-subscribed channel replaces the handler
    /// without duplicating the subscription.
    pub async fn subscribe(
        &self,
        channel: impl Into<String>,
        handler: Option<MessageHandler>,
    ) -> Result<Vec<String>, ClientError> {
        let channel = channel.into();
        validate_channel(&channel)?;
        self.request(|reply| Command::Subscribe { channel, handler, reply }).await
    }

    /// Unsubscribe from a channel. Resolves with the server's channel list
    /// after the mutation.
    pub async fn unsubscribe(&self, channel: impl Into<String>) -> Result<Vec<String>, ClientError> {
        let channel = channel.into();
        validate_channel(&channel)?;
        self.request(|reply| Command::Unsubscribe { channel, reply }).await
    }

    /// Unsubscribe from every channel. Resolves with the channels that were
    /// dropped.
    pub async fn unsubscribe_all(&self) -> Result<Vec<String>, ClientError> {
        self.request(|reply| Command::UnsubscribeAll { reply }).await
    }

    /// Ask the server for the current subscription list.
    pub async fn list_subscriptions(&self) -> Result<Vec<String>, ClientError> {
        self.request(|reply| Command::ListSubscriptions { reply }).await
    }

    /// Publish a message to a channel, fire-and-forget.
    ///
    /// Resolves once the frame is handed to the transport; there is no
    /// delivery confirmation. Publishing to a channel nobody subscribes to
    /// is not an error.
    pub async fn publish(
        &self,
        channel: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), ClientError> {
        let channel = channel.into();
        validate_channel(&channel)?;
        self.request(|reply| Command::Publish { channel, message: message.into(), reply }).await
    }

    /// Publish a message and wait for the server's receipt.
    ///
    /// Resolves with the server-assigned message identifier.
    pub async fn publish_with_ack(
        &self,
        channel: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<String, ClientError> {
        let channel = channel.into();
        validate_channel(&channel)?;
        self.request(|reply| Command::PublishWithAck { channel, message: message.into(), reply })
            .await
    }

    /// Close the connection. Idempotent; returns once shutdown completes.
    pub async fn close(&self) {
        let (reply, done) = oneshot::channel();
        if self.cmd_tx.send(Command::Close { reply }).is_ok() {
            let _ = done.await;
        }
    }

    async fn request<R>(&self, build: impl FnOnce(Reply<R>) -> Command) -> Result<R, ClientError> {
        let (reply, response) = oneshot::channel();
        self.cmd_tx.send(build(reply)).map_err(|_| closed())?;
        response.await.map_err(|_| closed())?
    }
}

fn closed() -> ClientError {
    ClientError::Response(ResponseError::new("connection closed"))
}
