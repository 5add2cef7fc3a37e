//! Session lifecycle state machine.
//!
//! This module implements the session layer - managing connection lifecycle,
//! handshake outcome, and reconnection with bounded exponential backoff.
//!
//! # Architecture: Decision-Based State Machine
//!
//! The state machine follows the decision pattern:
//! - Methods accept time as parameter (no stored clock)
//! - Transitions return a [`RetryDecision`] describing what the runtime
//!   should do next (sleep a delay, give up)
//! - Driver code executes decisions (arm a timer, emit a closed event)
//!
//! This keeps the lifecycle logic pure: no I/O, no timers, fully
//! deterministic under test.
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐ begin_connect ┌────────────┐ handshake_complete ┌──────┐
//! │ Idle │──────────────>│ Connecting │───────────────────>│ Open │
//! └──────┘               └────────────┘                    └──────┘
//!                              │ handshake_failed        ▲      │ transport_lost
//!                              ↓                restored │      ↓
//!                         ┌────────┐  retries exhausted ┌──────────────┐
//!                         │ Closed │<───────────────────│ Reconnecting │
//!                         └────────┘                    └──────────────┘
//! ```
//!
//! Transitions are monotonic except Open <-> Reconnecting, which may cycle.
//! `close` is valid from every state and is idempotent.

use std::time::{Duration, Instant};

use crate::error::SessionError;

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection attempt started.
    Idle,
    /// Transport opening, handshake in flight.
    Connecting,
    /// Handshake complete, session live.
    Open,
    /// Transport lost; re-handshake attempts in progress.
    Reconnecting,
    /// Terminal state, user-initiated or fault-initiated.
    Closed,
}

/// Bounded exponential backoff policy for reconnection.
///
/// Delay for attempt `n` (zero-based) is `initial_delay * multiplier^n`,
/// capped at `max_delay`. After `max_attempts` failed attempts the session
/// closes with the terminal error.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Growth factor applied per failed attempt.
    pub multiplier: f64,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Total attempts before giving up. Zero disables reconnection.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Backoff delay for the given zero-based attempt number.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        // Clamp the growth factor so pathological policies cannot overflow
        // Duration arithmetic; the result is capped at max_delay anyway.
        let factor = self.multiplier.powi(attempt.min(64) as i32).clamp(0.0, 1e9);
        self.initial_delay.mul_f64(factor).min(self.max_delay)
    }
}

/// What the runtime should do after a lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep this long, then attempt a re-handshake.
    RetryAfter(Duration),
    /// Retries exhausted (or disabled); the session is now Closed.
    GiveUp,
}

/// Session lifecycle state machine.
///
/// Owns the state, the server-issued session identifier, and the retry
/// counter. Pure: no I/O, time passed in as parameters.
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    policy: ReconnectPolicy,
    session_id: Option<String>,
    created_at: Option<Instant>,
    attempt: u32,
}

impl Session {
    /// Create a new session in Idle state.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { state: SessionState::Idle, policy, session_id: None, created_at: None, attempt: 0 }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Server-issued session identifier, once the handshake completed.
    ///
    /// Survives reconnection: a restored session keeps its identifier and
    /// only a fresh connect can introduce a new one.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// When the session first opened.
    #[must_use]
    pub fn created_at(&self) -> Option<Instant> {
        self.created_at
    }

    /// Begin the initial connection attempt.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the session is Idle; a handle has at
    /// most one in-flight handshake.
    pub fn begin_connect(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::InvalidState {
                state: self.state,
                operation: "begin_connect",
            });
        }
        self.state = SessionState::Connecting;
        Ok(())
    }

    /// Record a successful initial handshake.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless Connecting.
    pub fn handshake_complete(
        &mut self,
        session_id: String,
        now: Instant,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::Connecting {
            return Err(SessionError::InvalidState {
                state: self.state,
                operation: "handshake_complete",
            });
        }
        self.state = SessionState::Open;
        self.session_id = Some(session_id);
        self.created_at = Some(now);
        self.attempt = 0;
        Ok(())
    }

    /// Record a failed initial handshake. Terminal: initial connect does not
    /// retry, only an open session reconnects.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless Connecting.
    pub fn handshake_failed(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Connecting {
            return Err(SessionError::InvalidState {
                state: self.state,
                operation: "handshake_failed",
            });
        }
        self.state = SessionState::Closed;
        Ok(())
    }

    /// Record an unexpected transport fault while Open.
    ///
    /// Transitions to Reconnecting and returns the first backoff decision.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless Open.
    pub fn transport_lost(&mut self) -> Result<RetryDecision, SessionError> {
        if self.state != SessionState::Open {
            return Err(SessionError::InvalidState {
                state: self.state,
                operation: "transport_lost",
            });
        }
        self.attempt = 0;
        if self.policy.max_attempts == 0 {
            self.state = SessionState::Closed;
            return Ok(RetryDecision::GiveUp);
        }
        self.state = SessionState::Reconnecting;
        Ok(RetryDecision::RetryAfter(self.policy.delay_for(0)))
    }

    /// Record a failed reconnection attempt and decide what happens next.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless Reconnecting.
    pub fn retry_failed(&mut self) -> Result<RetryDecision, SessionError> {
        if self.state != SessionState::Reconnecting {
            return Err(SessionError::InvalidState {
                state: self.state,
                operation: "retry_failed",
            });
        }
        self.attempt += 1;
        if self.attempt >= self.policy.max_attempts {
            self.state = SessionState::Closed;
            return Ok(RetryDecision::GiveUp);
        }
        Ok(RetryDecision::RetryAfter(self.policy.delay_for(self.attempt)))
    }

    /// Record a successful re-handshake: the session is restored with its
    /// existing identifier.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless Reconnecting.
    pub fn restored(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Reconnecting {
            return Err(SessionError::InvalidState { state: self.state, operation: "restored" });
        }
        self.state = SessionState::Open;
        self.attempt = 0;
        Ok(())
    }

    /// Transition to Closed. Idempotent, valid from every state.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_session() -> Session {
        let mut session = Session::new(ReconnectPolicy::default());
        session.begin_connect().unwrap();
        session.handshake_complete("abc-123".into(), Instant::now()).unwrap();
        session
    }

    #[test]
    fn lifecycle() {
        let mut session = Session::new(ReconnectPolicy::default());
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.session_id(), None);

        session.begin_connect().unwrap();
        assert_eq!(session.state(), SessionState::Connecting);

        let now = Instant::now();
        session.handshake_complete("abc-123".into(), now).unwrap();
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(session.session_id(), Some("abc-123"));
        assert_eq!(session.created_at(), Some(now));

        session.close();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn close_is_idempotent() {
        let mut session = open_session();
        session.close();
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn handshake_failure_is_terminal() {
        let mut session = Session::new(ReconnectPolicy::default());
        session.begin_connect().unwrap();
        session.handshake_failed().unwrap();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn transport_loss_schedules_first_retry() {
        let mut session = open_session();
        let decision = session.transport_lost().unwrap();
        assert_eq!(session.state(), SessionState::Reconnecting);
        assert_eq!(decision, RetryDecision::RetryAfter(Duration::from_millis(500)));
    }

    #[test]
    fn retries_grow_then_give_up() {
        let mut session = open_session();
        session.transport_lost().unwrap();

        // Default policy: 5 attempts total, delays 500ms, 1s, 2s, 4s.
        assert_eq!(
            session.retry_failed().unwrap(),
            RetryDecision::RetryAfter(Duration::from_secs(1))
        );
        assert_eq!(
            session.retry_failed().unwrap(),
            RetryDecision::RetryAfter(Duration::from_secs(2))
        );
        assert_eq!(
            session.retry_failed().unwrap(),
            RetryDecision::RetryAfter(Duration::from_secs(4))
        );
        assert_eq!(session.retry_failed().unwrap(), RetryDecision::GiveUp);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn restored_session_keeps_identifier() {
        let mut session = open_session();
        session.transport_lost().unwrap();
        session.restored().unwrap();
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(session.session_id(), Some("abc-123"));
    }

    #[test]
    fn reconnect_cycle_resets_attempt_counter() {
        let mut session = open_session();

        // First outage: two failed attempts, then restored.
        session.transport_lost().unwrap();
        session.retry_failed().unwrap();
        session.retry_failed().unwrap();
        session.restored().unwrap();

        // Second outage starts over from the initial delay.
        let decision = session.transport_lost().unwrap();
        assert_eq!(decision, RetryDecision::RetryAfter(Duration::from_millis(500)));
    }

    #[test]
    fn zero_attempts_disables_reconnection() {
        let policy = ReconnectPolicy { max_attempts: 0, ..Default::default() };
        let mut session = Session::new(policy);
        session.begin_connect().unwrap();
        session.handshake_complete("abc-123".into(), Instant::now()).unwrap();

        assert_eq!(session.transport_lost().unwrap(), RetryDecision::GiveUp);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn invalid_transitions_rejected() {
        let mut session = Session::new(ReconnectPolicy::default());

        // Can't complete a handshake that never started.
        assert!(matches!(
            session.handshake_complete("abc".into(), Instant::now()),
            Err(SessionError::InvalidState { .. })
        ));

        // Can't lose a transport that isn't open.
        assert!(matches!(session.transport_lost(), Err(SessionError::InvalidState { .. })));

        // Can't connect twice.
        session.begin_connect().unwrap();
        assert!(matches!(session.begin_connect(), Err(SessionError::InvalidState { .. })));
    }

    #[test]
    fn backoff_delays_are_capped() {
        let policy = ReconnectPolicy {
            initial_delay: Duration::from_secs(1),
            multiplier: 10.0,
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(10));
        assert_eq!(policy.delay_for(2), Duration::from_secs(30));
        assert_eq!(policy.delay_for(9), Duration::from_secs(30));
    }
}
