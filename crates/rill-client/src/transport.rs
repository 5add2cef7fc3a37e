//! TCP transport.

use std::io;

use async_trait::async_trait;
use rill_core::transport::Transport;
use tokio::net::{
    TcpStream,
    tcp::{OwnedReadHalf, OwnedWriteHalf},
};

/// Connects to a fixed `host:port`, one TCP stream per attempt.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    addr: String,
}

impl TcpTransport {
    /// Transport dialing the given address.
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    type Sender = OwnedWriteHalf;
    type Receiver = OwnedReadHalf;

    async fn open(&self) -> io::Result<(Self::Sender, Self::Receiver)> {
        let stream = TcpStream::connect(&self.addr).await?;
        // Frames are small control messages; don't batch them.
        stream.set_nodelay(true)?;
        let (read, write) = stream.into_split();
        Ok((write, read))
    }
}
