//! Server-confirmed subscription set.
//!
//! The registry reflects only what the server has acknowledged: mutations
//! are applied when a success response arrives, never when the request is
//! sent. A failed or timed-out request leaves the set untouched.
//!
//! Generic over the per-channel handler type `H` (a boxed closure in the
//! runtime) so this stays a plain data structure.

use std::collections::BTreeMap;

/// Confirmed subscriptions, keyed by channel name.
pub struct Registry<H> {
    channels: BTreeMap<String, Option<H>>,
}

impl<H> Registry<H> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { channels: BTreeMap::new() }
    }

    /// Apply a confirmed subscribe.
    ///
    /// Idempotent: re-subscribing an existing channel replaces its handler
    /// without duplicating the entry. `None` means inbound messages go to
    /// the default dispatcher.
    pub fn confirm_subscribe(&mut self, channel: String, handler: Option<H>) {
        self.channels.insert(channel, handler);
    }

    /// Apply a confirmed unsubscribe.
    pub fn confirm_unsubscribe(&mut self, channel: &str) {
        self.channels.remove(channel);
    }

    /// Apply a confirmed bulk unsubscribe.
    pub fn clear(&mut self) {
        self.channels.clear();
    }

    /// Adopt the server's channel set after a session restoration.
    ///
    /// Handlers for channels the server kept are retained; channels the
    /// server dropped lose theirs; channels only the server knows come in
    /// with the default dispatcher.
    pub fn adopt(&mut self, channels: Vec<String>) {
        let mut adopted = BTreeMap::new();
        for channel in channels {
            let handler = self.channels.remove(&channel).flatten();
            adopted.insert(channel, handler);
        }
        self.channels = adopted;
    }

    /// Handler registered for a channel, if any.
    pub fn handler(&self, channel: &str) -> Option<&H> {
        self.channels.get(channel).and_then(Option::as_ref)
    }

    /// True if the channel is confirmed-subscribed.
    pub fn contains(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    /// Confirmed channel names, sorted.
    pub fn channels(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }

    /// Number of confirmed subscriptions.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// True if nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl<H> Default for Registry<H> {
    fn default() -> Self {
        Self::new()
    }
}
