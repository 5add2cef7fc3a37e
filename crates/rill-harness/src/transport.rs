//! In-memory transport dialing a [`Broker`](crate::Broker).

use std::io;

use async_trait::async_trait;
use rill_core::transport::Transport;
use tokio::{
    io::{DuplexStream, ReadHalf, WriteHalf},
    sync::mpsc,
};

/// Dials an in-memory broker. Every `open` yields a fresh duplex pipe, so
/// reconnection attempts get distinct connections just as TCP would.
#[derive(Clone)]
pub struct MemTransport {
    pub(crate) conn_tx: mpsc::UnboundedSender<DuplexStream>,
}

#[async_trait]
impl Transport for MemTransport {
    type Sender = WriteHalf<DuplexStream>;
    type Receiver = ReadHalf<DuplexStream>;

    async fn open(&self) -> io::Result<(Self::Sender, Self::Receiver)> {
        let (client, server) = tokio::io::duplex(64 * 1024);
        self.conn_tx
            .send(server)
            .map_err(|_| io::Error::new(io::ErrorKind::ConnectionRefused, "broker is gone"))?;
        let (read, write) = tokio::io::split(client);
        Ok((write, read))
    }
}
