//! Transport abstraction and frame stream codec.
//!
//! Abstracts over bidirectional byte streams carrying frames. Production
//! uses TCP (TLS would be layered at the same seam); tests use an in-memory
//! duplex pipe. The transport opens connections and nothing else: it never
//! retries, and every fault surfaces to the session layer, which owns the
//! reconnection policy.

use std::io;

use async_trait::async_trait;
use bytes::BytesMut;
use rill_proto::{Frame, FrameHeader, ProtocolError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Link-level failure.
///
/// Anything in this enum either triggers the reconnection path or, when the
/// bounded retry budget is spent, terminates the session.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Underlying I/O fault.
    #[error("I/O fault: {0}")]
    Io(#[from] io::Error),

    /// Peer sent bytes that do not form a valid frame.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// Peer closed the stream.
    #[error("connection closed by peer")]
    ClosedByPeer,

    /// No handshake response arrived within the request timeout.
    #[error("handshake timed out")]
    HandshakeTimeout,

    /// Server refused the handshake.
    #[error("handshake rejected: {message}")]
    HandshakeRejected {
        /// Server-supplied rejection reason.
        message: String,
    },

    /// Reconnection gave up after the configured attempt budget.
    #[error("reconnection gave up after {attempts} attempts")]
    RetriesExhausted {
        /// Attempts made before giving up.
        attempts: u32,
    },
}

/// Abstract connector for a single remote endpoint.
///
/// One call to [`Transport::open`] yields one connection, split into send
/// and receive halves so a writer and a reader task can own them
/// independently. Dropping both halves closes the underlying stream; there
/// is no separate close operation.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Half used to send frames.
    type Sender: AsyncWrite + Unpin + Send + 'static;

    /// Half used to receive frames.
    type Receiver: AsyncRead + Unpin + Send + 'static;

    /// Open a new connection to the endpoint this transport was built for.
    ///
    /// Called once for the initial connect and once per reconnection
    /// attempt. Implementations must not retry internally.
    async fn open(&self) -> io::Result<(Self::Sender, Self::Receiver)>;
}

/// Reads length-delimited frames off a receive half.
pub struct FrameReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap a receive half.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read the next frame.
    ///
    /// Returns `Ok(None)` on a clean end-of-stream between frames. An
    /// end-of-stream inside a frame is an I/O fault: the peer vanished
    /// mid-frame.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, TransportError> {
        let mut header_buf = [0u8; FrameHeader::SIZE];
        match self.inner.read_exact(&mut header_buf).await {
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(TransportError::Io(err)),
        }

        let header = FrameHeader::from_bytes(&header_buf)?;
        let mut payload = vec![0u8; header.payload_len() as usize];
        self.inner.read_exact(&mut payload).await?;

        Ok(Some(Frame::new(header, payload)))
    }
}

/// Writes frames to a send half.
pub struct FrameWriter<W> {
    inner: W,
    buf: BytesMut,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Wrap a send half.
    pub fn new(inner: W) -> Self {
        Self { inner, buf: BytesMut::new() }
    }

    /// Serialize and send one frame, flushing the stream.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<(), TransportError> {
        self.buf.clear();
        self.buf.reserve(frame.encoded_len());
        frame.encode(&mut self.buf)?;
        self.inner.write_all(&self.buf).await?;
        self.inner.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rill_proto::{Payload, payloads::ChannelRequest};

    use super::*;

    #[tokio::test]
    async fn frames_round_trip_over_a_pipe() {
        let (client, server) = tokio::io::duplex(4096);
        let (server_read, _server_write) = tokio::io::split(server);
        let (_client_read, client_write) = tokio::io::split(client);

        let mut writer = FrameWriter::new(client_write);
        let mut reader = FrameReader::new(server_read);

        let frame = Payload::Subscribe(ChannelRequest { channel: "news".into() })
            .into_frame(7)
            .unwrap();
        writer.write_frame(&frame).await.unwrap();

        let received = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(received, frame);
    }

    #[tokio::test]
    async fn clean_eof_yields_none() {
        let (client, server) = tokio::io::duplex(64);
        drop(client);

        let (server_read, _server_write) = tokio::io::split(server);
        let mut reader = FrameReader::new(server_read);
        assert!(reader.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn eof_inside_frame_is_a_fault() {
        let (mut client, server) = tokio::io::duplex(4096);

        // Header promising 100 payload bytes, then nothing.
        let frame = Payload::Subscribe(ChannelRequest { channel: "news".into() })
            .into_frame(1)
            .unwrap();
        let mut bytes = Vec::new();
        frame.encode(&mut bytes).unwrap();
        client.write_all(&bytes[..FrameHeader::SIZE]).await.unwrap();
        drop(client);

        let (server_read, _server_write) = tokio::io::split(server);
        let mut reader = FrameReader::new(server_read);
        assert!(matches!(reader.read_frame().await, Err(TransportError::Io(_))));
    }
}
