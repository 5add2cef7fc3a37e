//! Rill pub/sub client core logic
//!
//! Pure state machine logic for the client runtime, completely decoupled
//! from I/O. This enables deterministic testing of the session lifecycle,
//! request correlation, and subscription tracking.
//!
//! # Architecture
//!
//! Components in this crate are deterministic state machines isolated from
//! I/O, time, and scheduling. Time is passed in as `Instant` parameters and
//! transitions return decisions the runtime executes (send a frame, sleep a
//! backoff delay, give up). The `rill-client` crate interprets these
//! decisions on a Tokio runtime; tests drive the same code with synthetic
//! clocks and scripted inputs.
//!
//! # Components
//!
//! - [`session`]: Session lifecycle state machine (handshake, reconnect
//!   backoff, close)
//! - [`correlator`]: Pending request table keyed by correlation identifier
//! - [`registry`]: Server-confirmed subscription set
//! - [`credentials`]: Credential and channel-name validation
//! - [`transport`]: Transport abstraction (frame streams)
//! - [`error`]: Session and validation error types

pub mod correlator;
pub mod credentials;
pub mod error;
pub mod registry;
pub mod session;
pub mod transport;
