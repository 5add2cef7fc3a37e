//! Connection actor.
//!
//! One spawned task owns the session state machine, the pending request
//! table, the subscription registry, and the write half of the link. A
//! companion reader task forwards inbound frames over a channel and is
//! replaced on every reconnect. All mutation happens on the actor task, so
//! the runtime needs no locks.

use std::time::{Duration, Instant};

use rill_core::{
    correlator::{Correlator, PendingRequest, RequestKind},
    credentials::Credentials,
    registry::Registry,
    session::{RetryDecision, Session, SessionState},
    transport::{FrameReader, FrameWriter, Transport, TransportError},
};
use rill_proto::{Frame, Payload, payloads};
use tokio::{io::AsyncRead, sync::mpsc, task::JoinHandle};
use tracing::{debug, warn};

use crate::{
    error::{ClientError, ResponseError},
    event::{Event, InboundMessage, MessageHandler},
    handle::{Command, ConnectionOptions, Reply},
};

/// Correlation identifier reserved for session-level frames: the handshake
/// exchange, pushed messages, acknowledgements, and unsolicited errors.
const SESSION_CORRELATION: u64 = 0;

type Inbound = mpsc::UnboundedReceiver<Result<Frame, TransportError>>;

/// Where a pending request's resolution goes.
enum Sink {
    SessionId(Reply<String>),
    Subscribe { channel: String, handler: Option<MessageHandler>, reply: Reply<Vec<String>> },
    Unsubscribe { channel: String, reply: Reply<Vec<String>> },
    UnsubscribeAll { reply: Reply<Vec<String>> },
    List { reply: Reply<Vec<String>> },
    PublishAck { reply: Reply<String> },
    /// Internal subscription resync after a reconnect; nobody is waiting.
    Resync,
}

impl Sink {
    fn kind(&self) -> RequestKind {
        match self {
            Sink::SessionId(_) => RequestKind::GetSessionId,
            Sink::Subscribe { .. } => RequestKind::Subscribe,
            Sink::Unsubscribe { .. } => RequestKind::Unsubscribe,
            Sink::UnsubscribeAll { .. } => RequestKind::UnsubscribeAll,
            Sink::List { .. } | Sink::Resync => RequestKind::ListSubscriptions,
            Sink::PublishAck { .. } => RequestKind::PublishAck,
        }
    }

    fn fail(self, message: &str) {
        let error = response_error(message);
        match self {
            Sink::SessionId(reply) => {
                let _ = reply.send(Err(error));
            }
            Sink::Subscribe { reply, .. } => {
                let _ = reply.send(Err(error));
            }
            Sink::Unsubscribe { reply, .. } => {
                let _ = reply.send(Err(error));
            }
            Sink::UnsubscribeAll { reply } => {
                let _ = reply.send(Err(error));
            }
            Sink::List { reply } => {
                let _ = reply.send(Err(error));
            }
            Sink::PublishAck { reply } => {
                let _ = reply.send(Err(error));
            }
            Sink::Resync => {}
        }
    }
}

pub(crate) struct Conn<T: Transport> {
    transport: T,
    credentials: Credentials,
    options: ConnectionOptions,
    session: Session,
    correlator: Correlator<Sink>,
    registry: Registry<MessageHandler>,
    /// Taken when the terminal `Closed` event is emitted, so it cannot be
    /// emitted twice.
    events: Option<mpsc::UnboundedSender<Event>>,
    writer: Option<FrameWriter<T::Sender>>,
    reader: Option<JoinHandle<()>>,
}

impl<T: Transport> Conn<T> {
    pub(crate) fn new(
        transport: T,
        credentials: Credentials,
        options: ConnectionOptions,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        let session = Session::new(options.reconnect.clone());
        Self {
            transport,
            credentials,
            options,
            session,
            correlator: Correlator::new(),
            registry: Registry::new(),
            events: Some(events),
            writer: None,
            reader: None,
        }
    }

    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        if let Err(err) = self.session.begin_connect() {
            warn!(error = %err, "connection task started in a non-idle state");
            self.finish(None);
            return;
        }

        let mut inbound = match self.establish(false).await {
            Ok((session_id, inbound)) => {
                if let Err(err) =
                    self.session.handshake_complete(session_id.clone(), now_std())
                {
                    warn!(error = %err, "handshake completed in a non-connecting state");
                    self.shutdown(None);
                    return;
                }
                self.emit(Event::NewSession { session_id });
                inbound
            }
            Err(err) => {
                debug!(error = %err, "initial handshake failed");
                let _ = self.session.handshake_failed();
                self.teardown_link();
                self.finish(Some(err));
                return;
            }
        };

        loop {
            let deadline = self.correlator.next_deadline();
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Close { reply }) => {
                        self.shutdown(None);
                        let _ = reply.send(());
                        return;
                    }
                    Some(command) => {
                        if let Err(fault) = self.handle_command(command).await {
                            match self.reconnect(fault, &mut commands).await {
                                Some(restored) => inbound = restored,
                                None => return,
                            }
                        }
                    }
                    // All handles dropped; nobody can issue commands or
                    // observe events anymore.
                    None => {
                        self.shutdown(None);
                        return;
                    }
                },
                frame = inbound.recv() => {
                    let fault = match frame {
                        Some(Ok(frame)) => self.handle_frame(frame).await.err(),
                        Some(Err(err)) => Some(err),
                        None => Some(TransportError::ClosedByPeer),
                    };
                    if let Some(fault) = fault {
                        match self.reconnect(fault, &mut commands).await {
                            Some(restored) => inbound = restored,
                            None => return,
                        }
                    }
                }
                () = wait_until(deadline) => self.expire_requests(),
            }
        }
    }

    /// Open a link and run the handshake. On success the reader task is
    /// spawned and its frame channel returned.
    async fn establish(&mut self, restore: bool) -> Result<(String, Inbound), TransportError> {
        let (send_half, recv_half) = self.transport.open().await?;
        let mut writer = FrameWriter::new(send_half);
        let mut reader = FrameReader::new(recv_half);

        let keys = self.credentials.keys().map(str::to_owned).to_vec();
        let session_id =
            if restore { self.session.session_id().map(str::to_owned) } else { None };
        let handshake = Payload::Handshake(payloads::Handshake { keys, session_id });
        writer.write_frame(&handshake.into_frame(SESSION_CORRELATION)?).await?;

        let response = tokio::time::timeout(self.options.request_timeout, reader.read_frame())
            .await
            .map_err(|_| TransportError::HandshakeTimeout)??
            .ok_or(TransportError::ClosedByPeer)?;

        let session_id = match Payload::from_frame(&response)? {
            Payload::HandshakeOk(ok) => ok.session_id,
            Payload::Error(info) => {
                return Err(TransportError::HandshakeRejected { message: info.message });
            }
            other => {
                return Err(TransportError::HandshakeRejected {
                    message: format!("unexpected {:?} response", other.opcode()),
                });
            }
        };

        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        self.reader = Some(tokio::spawn(read_loop(reader, frame_tx)));
        self.writer = Some(writer);
        Ok((session_id, frame_rx))
    }

    /// Execute one caller command. An `Err` means the link failed while
    /// sending and the caller of this method must reconnect.
    async fn handle_command(&mut self, command: Command) -> Result<(), TransportError> {
        if self.session.state() != SessionState::Open {
            fail_command(command, "not connected");
            return Ok(());
        }

        match command {
            Command::SessionId { reply } => {
                self.send_tracked(Payload::GetSession, Sink::SessionId(reply)).await
            }
            Command::Subscribe { channel, handler, reply } => {
                let payload =
                    Payload::Subscribe(payloads::ChannelRequest { channel: channel.clone() });
                self.send_tracked(payload, Sink::Subscribe { channel, handler, reply }).await
            }
            Command::Unsubscribe { channel, reply } => {
                let payload =
                    Payload::Unsubscribe(payloads::ChannelRequest { channel: channel.clone() });
                self.send_tracked(payload, Sink::Unsubscribe { channel, reply }).await
            }
            Command::UnsubscribeAll { reply } => {
                self.send_tracked(Payload::UnsubscribeAll, Sink::UnsubscribeAll { reply }).await
            }
            Command::ListSubscriptions { reply } => {
                self.send_tracked(Payload::ListSubscriptions, Sink::List { reply }).await
            }
            Command::Publish { channel, message, reply } => {
                let payload =
                    Payload::Publish(payloads::Publish { channel, message, requires_ack: false });
                match self.send_frame(payload, SESSION_CORRELATION).await {
                    Ok(()) => {
                        let _ = reply.send(Ok(()));
                        Ok(())
                    }
                    Err(fault) => {
                        let _ = reply.send(Err(response_error("connection closed")));
                        Err(fault)
                    }
                }
            }
            Command::PublishWithAck { channel, message, reply } => {
                let payload =
                    Payload::Publish(payloads::Publish { channel, message, requires_ack: true });
                self.send_tracked(payload, Sink::PublishAck { reply }).await
            }
            // Close is intercepted by the run loop.
            Command::Close { reply } => {
                let _ = reply.send(());
                Ok(())
            }
        }
    }

    /// Register a pending request and send its frame. If the send fails the
    /// request resolves with "connection closed" before the fault is
    /// returned.
    async fn send_tracked(&mut self, payload: Payload, sink: Sink) -> Result<(), TransportError> {
        let kind = sink.kind();
        let id = self.correlator.register(kind, now_std(), self.options.request_timeout, sink);
        if let Err(fault) = self.send_frame(payload, id).await {
            if let Some(pending) = self.correlator.resolve(id) {
                pending.sink.fail("connection closed");
            }
            return Err(fault);
        }
        Ok(())
    }

    async fn send_frame(
        &mut self,
        payload: Payload,
        correlation_id: u64,
    ) -> Result<(), TransportError> {
        let frame = payload.into_frame(correlation_id)?;
        match self.writer.as_mut() {
            Some(writer) => writer.write_frame(&frame).await,
            None => Err(TransportError::ClosedByPeer),
        }
    }

    /// Process one inbound frame. Malformed payloads are logged and dropped;
    /// only acknowledgement sends can fault here.
    async fn handle_frame(&mut self, frame: Frame) -> Result<(), TransportError> {
        let payload = match Payload::from_frame(&frame) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "dropping undecodable frame");
                return Ok(());
            }
        };

        let correlation_id = frame.header.correlation_id();
        if correlation_id == SESSION_CORRELATION {
            return self.handle_session_frame(payload).await;
        }

        let Some(pending) = self.correlator.resolve(correlation_id) else {
            // Response to a request that already timed out.
            debug!(correlation_id, "dropping late response");
            return Ok(());
        };
        self.resolve_pending(pending, payload);
        Ok(())
    }

    async fn handle_session_frame(&mut self, payload: Payload) -> Result<(), TransportError> {
        match payload {
            Payload::Message(message) => self.deliver(message).await,
            Payload::Error(info) => {
                self.emit(Event::ResponseError(ResponseError::new(info.message)));
                Ok(())
            }
            other => {
                warn!(opcode = ?other.opcode(), "unexpected session-level frame");
                Ok(())
            }
        }
    }

    /// Route a pushed message to its channel handler or the event stream,
    /// then acknowledge it if the server asked for that.
    async fn deliver(&mut self, message: payloads::ChannelMessage) -> Result<(), TransportError> {
        let inbound = InboundMessage {
            channel: message.channel,
            message: message.message,
            message_id: message.message_id,
            requires_ack: message.requires_ack,
        };
        let needs_ack = inbound.requires_ack;
        let message_id = inbound.message_id.clone();

        if let Some(handler) = self.registry.handler(&inbound.channel) {
            handler(inbound);
        } else {
            self.emit(Event::Message(inbound));
        }

        if needs_ack {
            let ack = Payload::Ack(payloads::Ack { message_id });
            self.send_frame(ack, SESSION_CORRELATION).await?;
        }
        Ok(())
    }

    /// Resolve a pending request with its response. The registry mutates
    /// here and only here: on server confirmation.
    fn resolve_pending(&mut self, pending: PendingRequest<Sink>, payload: Payload) {
        match (pending.sink, payload) {
            (Sink::SessionId(reply), Payload::SessionInfo(info)) => {
                let _ = reply.send(Ok(info.session_id));
            }
            (Sink::Subscribe { channel, handler, reply }, Payload::ChannelList(list)) => {
                self.registry.confirm_subscribe(channel, handler);
                let _ = reply.send(Ok(list.channels));
            }
            (Sink::Unsubscribe { channel, reply }, Payload::ChannelList(list)) => {
                self.registry.confirm_unsubscribe(&channel);
                let _ = reply.send(Ok(list.channels));
            }
            (Sink::UnsubscribeAll { reply }, Payload::ChannelList(list)) => {
                self.registry.clear();
                let _ = reply.send(Ok(list.channels));
            }
            (Sink::List { reply }, Payload::ChannelList(list)) => {
                let _ = reply.send(Ok(list.channels));
            }
            (Sink::PublishAck { reply }, Payload::PublishReceipt(receipt)) => {
                let _ = reply.send(Ok(receipt.message_id));
            }
            (Sink::Resync, Payload::ChannelList(list)) => {
                self.registry.adopt(list.channels);
            }
            (sink, Payload::Error(info)) => sink.fail(&info.message),
            (sink, other) => {
                warn!(opcode = ?other.opcode(), kind = ?sink.kind(), "mismatched response shape");
                sink.fail("unexpected response");
            }
        }
    }

    fn expire_requests(&mut self) {
        for (id, pending) in self.correlator.expire(now_std()) {
            debug!(correlation_id = id, kind = ?pending.kind, "request timed out");
            pending.sink.fail("timeout");
        }
    }

    /// Tear the failed link down and drive the backoff loop.
    ///
    /// Every pending request resolves with "connection closed" before the
    /// first backoff delay starts. Returns the new inbound channel on
    /// restoration, or `None` once the connection is closed, either because
    /// the retry budget ran out or because the caller closed it mid-backoff.
    async fn reconnect(
        &mut self,
        fault: TransportError,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> Option<Inbound> {
        self.teardown_link();
        self.emit(Event::TransportError(fault));
        self.fail_all_pending();

        let mut decision = match self.session.transport_lost() {
            Ok(decision) => decision,
            Err(err) => {
                warn!(error = %err, "transport fault in a non-open state");
                self.shutdown(None);
                return None;
            }
        };

        loop {
            let delay = match decision {
                RetryDecision::RetryAfter(delay) => delay,
                RetryDecision::GiveUp => {
                    let attempts = self.options.reconnect.max_attempts;
                    self.shutdown(Some(TransportError::RetriesExhausted { attempts }));
                    return None;
                }
            };

            if !self.backoff(delay, commands).await {
                return None;
            }

            match self.establish(true).await {
                Ok((session_id, inbound)) => {
                    if self.session.session_id() != Some(session_id.as_str()) {
                        warn!("server changed the session identifier across a restore");
                    }
                    if let Err(err) = self.session.restored() {
                        warn!(error = %err, "restore in a non-reconnecting state");
                    }
                    self.emit(Event::Reconnect);

                    // The server may have dropped subscriptions while we
                    // were away; adopt its view.
                    if let Err(err) = self.resync().await {
                        warn!(error = %err, "link failed during subscription resync");
                        self.teardown_link();
                        decision = match self.session.transport_lost() {
                            Ok(decision) => decision,
                            Err(_) => RetryDecision::GiveUp,
                        };
                        continue;
                    }
                    return Some(inbound);
                }
                Err(err) => {
                    warn!(error = %err, "reconnection attempt failed");
                    self.teardown_link();
                    decision = match self.session.retry_failed() {
                        Ok(decision) => decision,
                        Err(_) => RetryDecision::GiveUp,
                    };
                }
            }
        }
    }

    /// Sleep out a backoff delay while staying responsive to commands.
    /// Returns false if the connection was closed while waiting.
    async fn backoff(
        &mut self,
        delay: Duration,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                () = &mut sleep => return true,
                command = commands.recv() => match command {
                    Some(Command::Close { reply }) => {
                        self.shutdown(None);
                        let _ = reply.send(());
                        return false;
                    }
                    Some(command) => fail_command(command, "not connected"),
                    None => {
                        self.shutdown(None);
                        return false;
                    }
                },
            }
        }
    }

    async fn resync(&mut self) -> Result<(), TransportError> {
        self.send_tracked(Payload::ListSubscriptions, Sink::Resync).await
    }

    fn shutdown(&mut self, error: Option<TransportError>) {
        self.teardown_link();
        self.fail_all_pending();
        self.session.close();
        self.finish(error);
    }

    fn teardown_link(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.writer = None;
    }

    fn fail_all_pending(&mut self) {
        for (_, pending) in self.correlator.drain() {
            pending.sink.fail("connection closed");
        }
    }

    fn emit(&self, event: Event) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    /// Emit the terminal `Closed` event exactly once.
    fn finish(&mut self, error: Option<TransportError>) {
        if let Some(events) = self.events.take() {
            let _ = events.send(Event::Closed { error });
        }
    }
}

fn fail_command(command: Command, message: &str) {
    match command {
        Command::SessionId { reply } => {
            let _ = reply.send(Err(response_error(message)));
        }
        Command::Subscribe { reply, .. } => {
            let _ = reply.send(Err(response_error(message)));
        }
        Command::Unsubscribe { reply, .. } => {
            let _ = reply.send(Err(response_error(message)));
        }
        Command::UnsubscribeAll { reply } => {
            let _ = reply.send(Err(response_error(message)));
        }
        Command::ListSubscriptions { reply } => {
            let _ = reply.send(Err(response_error(message)));
        }
        Command::Publish { reply, .. } => {
            let _ = reply.send(Err(response_error(message)));
        }
        Command::PublishWithAck { reply, .. } => {
            let _ = reply.send(Err(response_error(message)));
        }
        Command::Close { reply } => {
            let _ = reply.send(());
        }
    }
}

fn response_error(message: &str) -> ClientError {
    ClientError::Response(ResponseError::new(message))
}

/// Monotonic now, read through the Tokio clock so paused-time tests see a
/// consistent timeline.
fn now_std() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => {
            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
        }
        None => std::future::pending().await,
    }
}

/// Reader task: forwards frames until the link dies, then reports the fault
/// and exits. Aborted and replaced on reconnect.
async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: FrameReader<R>,
    frames: mpsc::UnboundedSender<Result<Frame, TransportError>>,
) {
    loop {
        match reader.read_frame().await {
            Ok(Some(frame)) => {
                if frames.send(Ok(frame)).is_err() {
                    return;
                }
            }
            Ok(None) => {
                let _ = frames.send(Err(TransportError::ClosedByPeer));
                return;
            }
            Err(err) => {
                let _ = frames.send(Err(err));
                return;
            }
        }
    }
}
