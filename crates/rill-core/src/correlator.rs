//! Pending request table keyed by correlation identifier.
//!
//! The correlator owns every in-flight control request from the moment it is
//! sent until its response, timeout, or the connection's end. It guarantees
//! each entry leaves the table exactly once, so the runtime can promise each
//! caller exactly one resolution.
//!
//! Generic over the result sink `S` (a oneshot sender in the runtime, a
//! plain marker in tests) so the table itself stays free of any async
//! primitive.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

/// What a pending request asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Authoritative session identifier query.
    GetSessionId,
    /// Channel subscription.
    Subscribe,
    /// Channel unsubscription.
    Unsubscribe,
    /// Bulk unsubscription.
    UnsubscribeAll,
    /// Subscription listing.
    ListSubscriptions,
    /// Publish with durable receipt.
    PublishAck,
}

/// A request awaiting its response.
pub struct PendingRequest<S> {
    /// What was asked.
    pub kind: RequestKind,
    /// When the request was sent.
    pub issued_at: Instant,
    /// When the request times out.
    pub deadline: Instant,
    /// Where the resolution goes.
    pub sink: S,
}

/// Outstanding request table.
///
/// Correlation identifiers are issued from a monotonic counter starting at
/// one; zero is reserved on the wire for session-level frames. Identifiers
/// are unique among outstanding requests by construction.
pub struct Correlator<S> {
    next_id: u64,
    pending: HashMap<u64, PendingRequest<S>>,
}

impl<S> Correlator<S> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self { next_id: 1, pending: HashMap::new() }
    }

    /// Register a request and return its fresh correlation identifier.
    pub fn register(&mut self, kind: RequestKind, now: Instant, timeout: Duration, sink: S) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(
            id,
            PendingRequest { kind, issued_at: now, deadline: now + timeout, sink },
        );
        id
    }

    /// Remove and return the entry matching a response.
    ///
    /// Returns `None` for unknown identifiers - late responses to requests
    /// that already timed out land here and are dropped by the caller.
    pub fn resolve(&mut self, correlation_id: u64) -> Option<PendingRequest<S>> {
        self.pending.remove(&correlation_id)
    }

    /// Remove and return every entry whose deadline has passed.
    pub fn expire(&mut self, now: Instant) -> Vec<(u64, PendingRequest<S>)> {
        let expired: Vec<u64> = self
            .pending
            .iter()
            .filter(|(_, request)| request.deadline <= now)
            .map(|(&id, _)| id)
            .collect();

        expired
            .into_iter()
            .filter_map(|id| self.pending.remove(&id).map(|request| (id, request)))
            .collect()
    }

    /// Earliest deadline among outstanding requests, for timer arming.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|request| request.deadline).min()
    }

    /// Remove and return every outstanding entry. Used when the transport
    /// closes: no request may be left unresolved.
    pub fn drain(&mut self) -> Vec<(u64, PendingRequest<S>)> {
        self.pending.drain().collect()
    }

    /// Number of outstanding requests.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True if no requests are outstanding.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<S> Default for Correlator<S> {
    fn default() -> Self {
        Self::new()
    }
}
