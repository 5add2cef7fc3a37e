//! Core error types.

use crate::session::SessionState;

/// Errors from the session state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Operation not valid in the current state.
    #[error("invalid operation {operation} in state {state:?}")]
    InvalidState {
        /// State the session was in.
        state: SessionState,
        /// Operation that was attempted.
        operation: &'static str,
    },
}

/// Malformed caller input, rejected before any network activity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A credential key was empty.
    #[error("credential key {index} is empty")]
    EmptyCredentialKey {
        /// Zero-based key position (read = 0, write = 1, admin = 2).
        index: usize,
    },

    /// A channel name was empty.
    #[error("channel name is empty")]
    EmptyChannelName,
}
