//! Session state machine with thread-safe transitions.
//!
//! Enforces valid state transitions for the engine session lifecycle:
//! - Closed -> Opening (open issued)
//! - Opening -> Ready (open completed)
//! - Ready -> Configuring -> Recognizing (start issued, then completed)
//! - Recognizing -> Stopping -> Ready (stop issued, then completed)
//! - any open state -> Closing -> Closed (close issued, then completed)
//! - Opening -> Failed (fatal open failure); Failed -> Closing (teardown)
//!
//! A disconnect bypasses the table entirely via `reset()`.

use std::fmt;
use std::sync::{Arc, Mutex};

use platelink_core::error::PlatelinkError;

/// Operational state of an engine session.
///
/// Because every command's effect arrives asynchronously, the session
/// rejects commands illegal for the state it is in right now rather than
/// assuming the previous command already took effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No connection. The only state `open()` is accepted in.
    Closed,
    /// Open command issued; waiting for the `opened` completion.
    Opening,
    /// Connected and idle. Recognition can be started.
    Ready,
    /// Start command issued; waiting for the `started` completion.
    Configuring,
    /// Recognition running; result batches streaming.
    Recognizing,
    /// Stop command issued; waiting for the `stopped` completion.
    Stopping,
    /// Close command issued; waiting for the `closed` completion.
    Closing,
    /// Fatal engine failure. Absorbing except for teardown.
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Closed => write!(f, "Closed"),
            SessionState::Opening => write!(f, "Opening"),
            SessionState::Ready => write!(f, "Ready"),
            SessionState::Configuring => write!(f, "Configuring"),
            SessionState::Recognizing => write!(f, "Recognizing"),
            SessionState::Stopping => write!(f, "Stopping"),
            SessionState::Closing => write!(f, "Closing"),
            SessionState::Failed => write!(f, "Failed"),
        }
    }
}

impl SessionState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, target),
            (Closed, Opening)
                | (Opening, Ready)
                | (Opening, Failed)
                | (Ready, Configuring)
                | (Configuring, Recognizing)
                // Start failure falls back to idle
                | (Configuring, Ready)
                | (Recognizing, Stopping)
                | (Stopping, Ready)
                // Close is honored from every open state
                | (Opening, Closing)
                | (Ready, Closing)
                | (Configuring, Closing)
                | (Recognizing, Closing)
                | (Stopping, Closing)
                | (Failed, Closing)
                | (Closing, Closed)
        )
    }

    /// True for every state in which a connection exists or is pending.
    pub fn is_open(&self) -> bool {
        !matches!(self, SessionState::Closed)
    }
}

/// Thread-safe state machine for session state transitions.
///
/// Cloning shares the underlying state; all transitions are validated
/// against the table before being applied.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: Arc<Mutex<SessionState>>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine initialized to `Closed`.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::Closed)),
        }
    }

    /// Returns the current state.
    pub fn current(&self) -> SessionState {
        *self.state.lock().expect("state mutex poisoned")
    }

    /// Attempt to transition to the target state.
    pub fn transition(&self, target: SessionState) -> Result<(), PlatelinkError> {
        let mut state = self.state.lock().expect("state mutex poisoned");
        if state.can_transition_to(&target) {
            tracing::debug!("Session state: {} -> {}", *state, target);
            *state = target;
            Ok(())
        } else {
            Err(PlatelinkError::InvalidState {
                operation: "transition",
                state: state.to_string(),
            })
        }
    }

    /// Force the state machine back to `Closed`. Used only for the
    /// disconnect reset, which is legal from any state.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("state mutex poisoned");
        tracing::warn!("Session state machine reset to Closed from {}", *state);
        *state = SessionState::Closed;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Closed.to_string(), "Closed");
        assert_eq!(SessionState::Opening.to_string(), "Opening");
        assert_eq!(SessionState::Ready.to_string(), "Ready");
        assert_eq!(SessionState::Configuring.to_string(), "Configuring");
        assert_eq!(SessionState::Recognizing.to_string(), "Recognizing");
        assert_eq!(SessionState::Stopping.to_string(), "Stopping");
        assert_eq!(SessionState::Closing.to_string(), "Closing");
        assert_eq!(SessionState::Failed.to_string(), "Failed");
    }

    #[test]
    fn test_valid_transitions() {
        use SessionState::*;
        // Forward path
        assert!(Closed.can_transition_to(&Opening));
        assert!(Opening.can_transition_to(&Ready));
        assert!(Ready.can_transition_to(&Configuring));
        assert!(Configuring.can_transition_to(&Recognizing));
        assert!(Recognizing.can_transition_to(&Stopping));
        assert!(Stopping.can_transition_to(&Ready));
        assert!(Closing.can_transition_to(&Closed));

        // Failure paths
        assert!(Opening.can_transition_to(&Failed));
        assert!(Configuring.can_transition_to(&Ready));

        // Close from every open state
        for state in [Opening, Ready, Configuring, Recognizing, Stopping, Failed] {
            assert!(state.can_transition_to(&Closing), "close from {state}");
        }
    }

    #[test]
    fn test_invalid_transitions() {
        use SessionState::*;
        // Cannot skip states
        assert!(!Closed.can_transition_to(&Ready));
        assert!(!Closed.can_transition_to(&Recognizing));
        assert!(!Ready.can_transition_to(&Recognizing));
        assert!(!Opening.can_transition_to(&Recognizing));

        // Cannot close a closed or closing session via the table
        assert!(!Closed.can_transition_to(&Closing));
        assert!(!Closing.can_transition_to(&Closing));

        // Failed is absorbing except for teardown
        assert!(!Failed.can_transition_to(&Ready));
        assert!(!Failed.can_transition_to(&Opening));

        // Cannot transition to self
        for state in [Closed, Opening, Ready, Configuring, Recognizing, Stopping, Closing, Failed]
        {
            assert!(!state.can_transition_to(&state));
        }
    }

    #[test]
    fn test_is_open() {
        assert!(!SessionState::Closed.is_open());
        for state in [
            SessionState::Opening,
            SessionState::Ready,
            SessionState::Configuring,
            SessionState::Recognizing,
            SessionState::Stopping,
            SessionState::Closing,
            SessionState::Failed,
        ] {
            assert!(state.is_open());
        }
    }

    #[test]
    fn test_state_machine_happy_path() {
        let sm = StateMachine::new();
        assert_eq!(sm.current(), SessionState::Closed);

        sm.transition(SessionState::Opening).unwrap();
        sm.transition(SessionState::Ready).unwrap();
        sm.transition(SessionState::Configuring).unwrap();
        sm.transition(SessionState::Recognizing).unwrap();
        sm.transition(SessionState::Stopping).unwrap();
        sm.transition(SessionState::Ready).unwrap();
        sm.transition(SessionState::Closing).unwrap();
        sm.transition(SessionState::Closed).unwrap();
        assert_eq!(sm.current(), SessionState::Closed);
    }

    #[test]
    fn test_state_machine_invalid_transition_leaves_state() {
        let sm = StateMachine::new();
        let result = sm.transition(SessionState::Recognizing);
        assert!(result.is_err());
        assert_eq!(sm.current(), SessionState::Closed);
    }

    #[test]
    fn test_state_machine_reset_from_any_state() {
        let sm = StateMachine::new();
        sm.transition(SessionState::Opening).unwrap();
        sm.transition(SessionState::Ready).unwrap();
        sm.transition(SessionState::Configuring).unwrap();
        sm.transition(SessionState::Recognizing).unwrap();
        sm.reset();
        assert_eq!(sm.current(), SessionState::Closed);
    }

    #[test]
    fn test_state_machine_clone_is_shared() {
        let sm1 = StateMachine::new();
        let sm2 = sm1.clone();
        sm1.transition(SessionState::Opening).unwrap();
        assert_eq!(sm2.current(), SessionState::Opening);
    }

    #[test]
    fn test_transition_error_names_current_state() {
        let sm = StateMachine::new();
        match sm.transition(SessionState::Stopping) {
            Err(PlatelinkError::InvalidState { state, .. }) => {
                assert_eq!(state, "Closed");
            }
            other => panic!("expected InvalidState, got {other:?}"),
        }
    }
}
