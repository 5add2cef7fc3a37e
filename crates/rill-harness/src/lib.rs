//! Deterministic test harness for the Rill client runtime.
//!
//! Provides an in-memory broker speaking the real wire protocol over duplex
//! pipes, plus a [`MemTransport`] that dials it through the same
//! `Transport` seam production uses. Fault hooks on the [`Broker`] let
//! tests script outages: mute request handling, reject handshakes, or cut
//! every connection.
//!
//! Runs entirely on the Tokio clock, so tests built on it can pause time
//! and step through timeouts and backoff delays deterministically.

mod broker;
mod transport;

pub use broker::Broker;
pub use transport::MemTransport;
