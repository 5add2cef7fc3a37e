//! Tokio runtime for the Rill pub/sub client.
//!
//! Drives the pure state machines from `rill-core` over a real link: a
//! durable session with handshake, bounded-backoff reconnection, channel
//! subscriptions with optional per-channel handlers, and publish with or
//! without a delivery receipt.
//!
//! # Shape
//!
//! [`connect`] spawns a connection actor and returns a cloneable
//! [`ConnectionHandle`] plus an [`EventStream`]. The actor task owns all
//! connection state; handles talk to it over a command channel and every
//! request resolves exactly once, with a response, a timeout, or a
//! "connection closed" error.
//!
//! ```no_run
//! use rill_client::{ConnectionOptions, TcpTransport, connect};
//! use rill_core::credentials::Credentials;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let credentials = Credentials::new("read-key", "write-key", "admin-key")?;
//! let transport = TcpTransport::new("broker.example.net:4400");
//! let (handle, mut events) = connect(transport, credentials, ConnectionOptions::default());
//!
//! handle.subscribe("news", None).await?;
//! handle.publish("news", "hello").await?;
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod conn;
pub mod error;
pub mod event;
pub mod handle;
pub mod transport;

pub use error::{ClientError, ResponseError, TransportError};
pub use event::{Event, EventStream, InboundMessage, MessageHandler};
pub use handle::{ConnectionHandle, ConnectionOptions, connect};
pub use transport::TcpTransport;
