//! In-memory pub/sub broker.
//!
//! Speaks the real wire protocol over duplex pipes so the client runtime is
//! exercised end to end without sockets. Sessions survive connection drops,
//! which is what makes restore-after-reconnect testable, and fault hooks
//! let tests mute the broker, reject handshakes, or cut every live
//! connection at a chosen moment.

use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use rill_core::transport::{FrameReader, FrameWriter};
use rill_proto::{Frame, Payload, payloads};
use tokio::{
    io::DuplexStream,
    sync::mpsc,
    task::JoinHandle,
};
use tracing::debug;
use uuid::Uuid;

use crate::transport::MemTransport;

/// Correlation identifier for session-level frames.
const SESSION_CORRELATION: u64 = 0;

#[derive(Default)]
struct State {
    /// Durable session state: identifier to subscribed channel set.
    /// Outlives any single connection.
    sessions: HashMap<String, BTreeSet<String>>,
    conns: HashMap<u64, ConnState>,
    tasks: HashMap<u64, JoinHandle<()>>,
    /// Swallow correlated requests so clients time out.
    muted: bool,
    /// Refuse handshakes with an error frame.
    reject_handshake: bool,
    /// Delivery acknowledgements received, in arrival order.
    acks: Vec<String>,
}

struct ConnState {
    session_id: String,
    outbound: mpsc::UnboundedSender<Frame>,
}

struct Shared {
    state: Mutex<State>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to a running in-memory broker.
///
/// Dropping the broker aborts every connection and refuses new ones.
pub struct Broker {
    shared: Arc<Shared>,
    accept: JoinHandle<()>,
}

impl Broker {
    /// Start a broker and return it together with a transport that dials it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start() -> (Self, MemTransport) {
        let (conn_tx, mut conn_rx) = mpsc::unbounded_channel::<DuplexStream>();
        let shared = Arc::new(Shared { state: Mutex::new(State::default()) });

        let accept_shared = Arc::clone(&shared);
        let accept = tokio::spawn(async move {
            let mut next_id = 0u64;
            while let Some(stream) = conn_rx.recv().await {
                let conn_id = next_id;
                next_id += 1;
                let task = tokio::spawn(serve_conn(Arc::clone(&accept_shared), conn_id, stream));
                accept_shared.lock().tasks.insert(conn_id, task);
            }
        });

        (Self { shared, accept }, MemTransport { conn_tx })
    }

    /// Stop answering correlated requests, letting them time out. Pushed
    /// messages and handshakes are unaffected.
    pub fn mute(&self, muted: bool) {
        self.shared.lock().muted = muted;
    }

    /// Refuse handshakes with an unauthorized error.
    pub fn reject_handshake(&self, reject: bool) {
        self.shared.lock().reject_handshake = reject;
    }

    /// Cut every live connection. Session state survives, so clients that
    /// reconnect with their identifier get their session restored.
    pub fn drop_connections(&self) {
        let mut state = self.shared.lock();
        for (_, task) in state.tasks.drain() {
            task.abort();
        }
        state.conns.clear();
    }

    /// Push a message to every live connection subscribed to the channel,
    /// as if some other client had published it. Returns the assigned
    /// message identifier.
    pub fn push(&self, channel: &str, message: &str, requires_ack: bool) -> String {
        let message_id = Uuid::new_v4().to_string();
        let state = self.shared.lock();
        fan_out(&state, channel, message, &message_id, requires_ack);
        message_id
    }

    /// Delivery acknowledgements received so far, in arrival order.
    pub fn acks(&self) -> Vec<String> {
        self.shared.lock().acks.clone()
    }

    /// Channels a session is subscribed to, or `None` for an unknown
    /// session.
    pub fn session_channels(&self, session_id: &str) -> Option<Vec<String>> {
        self.shared
            .lock()
            .sessions
            .get(session_id)
            .map(|channels| channels.iter().cloned().collect())
    }

    /// Silently drop one subscription from a session, as a server reaping
    /// state while the client is away would.
    pub fn forget_subscription(&self, session_id: &str, channel: &str) {
        if let Some(channels) = self.shared.lock().sessions.get_mut(session_id) {
            channels.remove(channel);
        }
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        self.accept.abort();
        for (_, task) in self.shared.lock().tasks.drain() {
            task.abort();
        }
    }
}

fn fan_out(state: &State, channel: &str, message: &str, message_id: &str, requires_ack: bool) {
    for conn in state.conns.values() {
        let subscribed = state
            .sessions
            .get(&conn.session_id)
            .is_some_and(|channels| channels.contains(channel));
        if !subscribed {
            continue;
        }
        let payload = Payload::Message(payloads::ChannelMessage {
            channel: channel.to_owned(),
            message: message.to_owned(),
            message_id: message_id.to_owned(),
            requires_ack,
        });
        send(&conn.outbound, SESSION_CORRELATION, payload);
    }
}

fn send(outbound: &mpsc::UnboundedSender<Frame>, correlation_id: u64, payload: Payload) {
    if let Ok(frame) = payload.into_frame(correlation_id) {
        let _ = outbound.send(frame);
    }
}

async fn serve_conn(shared: Arc<Shared>, conn_id: u64, stream: DuplexStream) {
    let (read_half, write_half) = tokio::io::split(stream);
    let mut reader = FrameReader::new(read_half);
    let mut writer = FrameWriter::new(write_half);

    // Handshake first; anything else closes the connection.
    let Ok(Some(frame)) = reader.read_frame().await else { return };
    let Ok(Payload::Handshake(handshake)) = Payload::from_frame(&frame) else { return };

    let rejected = shared.lock().reject_handshake
        || handshake.keys.len() != 3
        || handshake.keys.iter().any(String::is_empty);
    if rejected {
        let error = Payload::Error(payloads::ErrorInfo {
            code: payloads::ErrorCode::Unauthorized,
            message: "invalid credentials".to_owned(),
        });
        if let Ok(frame) = error.into_frame(SESSION_CORRELATION) {
            let _ = writer.write_frame(&frame).await;
        }
        return;
    }

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let (session_id, restored) = {
        let mut state = shared.lock();
        let (session_id, restored) = match handshake.session_id {
            Some(id) if state.sessions.contains_key(&id) => (id, true),
            Some(id) => (id, false),
            None => (Uuid::new_v4().to_string(), false),
        };
        state.sessions.entry(session_id.clone()).or_default();
        state
            .conns
            .insert(conn_id, ConnState { session_id: session_id.clone(), outbound: outbound_tx });
        (session_id, restored)
    };
    debug!(conn_id, %session_id, restored, "session established");

    let ok = Payload::HandshakeOk(payloads::HandshakeOk { session_id: session_id.clone(), restored });
    let accepted = match ok.into_frame(SESSION_CORRELATION) {
        Ok(frame) => writer.write_frame(&frame).await.is_ok(),
        Err(_) => false,
    };

    // Reading a frame is not cancel-safe, so writes get their own task
    // instead of racing the reader in a select.
    let writer_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if writer.write_frame(&frame).await.is_err() {
                break;
            }
        }
    });

    if accepted {
        while let Ok(Some(frame)) = reader.read_frame().await {
            handle_request(&shared, conn_id, &session_id, &frame);
        }
    }
    writer_task.abort();

    let mut state = shared.lock();
    state.conns.remove(&conn_id);
    state.tasks.remove(&conn_id);
    debug!(conn_id, "connection finished");
}

fn handle_request(shared: &Shared, conn_id: u64, session_id: &str, frame: &Frame) {
    let Ok(payload) = Payload::from_frame(frame) else {
        debug!(session_id, "dropping undecodable frame");
        return;
    };
    let correlation_id = frame.header.correlation_id();

    let mut state = shared.lock();
    if state.muted && correlation_id != SESSION_CORRELATION {
        debug!(session_id, correlation_id, "muted; swallowing request");
        return;
    }
    let Some(outbound) = state.conns.get(&conn_id).map(|conn| conn.outbound.clone()) else {
        return;
    };

    match payload {
        Payload::GetSession => {
            let info = payloads::SessionInfo { session_id: session_id.to_owned() };
            send(&outbound, correlation_id, Payload::SessionInfo(info));
        }
        Payload::Subscribe(request) => {
            let channels = state.sessions.entry(session_id.to_owned()).or_default();
            channels.insert(request.channel);
            let list = channels.iter().cloned().collect();
            send(&outbound, correlation_id, channel_list(list));
        }
        Payload::Unsubscribe(request) => {
            let channels = state.sessions.entry(session_id.to_owned()).or_default();
            if channels.remove(&request.channel) {
                let list = channels.iter().cloned().collect();
                send(&outbound, correlation_id, channel_list(list));
            } else {
                let error = payloads::ErrorInfo {
                    code: payloads::ErrorCode::NotSubscribed,
                    message: format!("not subscribed to {}", request.channel),
                };
                send(&outbound, correlation_id, Payload::Error(error));
            }
        }
        Payload::UnsubscribeAll => {
            let channels = state.sessions.entry(session_id.to_owned()).or_default();
            let dropped: Vec<String> = std::mem::take(channels).into_iter().collect();
            send(&outbound, correlation_id, channel_list(dropped));
        }
        Payload::ListSubscriptions => {
            let list = state
                .sessions
                .get(session_id)
                .map(|channels| channels.iter().cloned().collect())
                .unwrap_or_default();
            send(&outbound, correlation_id, channel_list(list));
        }
        Payload::Publish(publish) => {
            let message_id = Uuid::new_v4().to_string();
            fan_out(&state, &publish.channel, &publish.message, &message_id, false);
            if publish.requires_ack {
                let receipt = payloads::PublishReceipt { message_id };
                send(&outbound, correlation_id, Payload::PublishReceipt(receipt));
            }
        }
        Payload::Ack(ack) => {
            state.acks.push(ack.message_id);
        }
        other => {
            debug!(session_id, opcode = ?other.opcode(), "unexpected request");
        }
    }
}

fn channel_list(channels: Vec<String>) -> Payload {
    Payload::ChannelList(payloads::ChannelList { channels })
}
