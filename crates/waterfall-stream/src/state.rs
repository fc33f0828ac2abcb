use std::fmt;

use thiserror::Error;

/// Lifecycle of the single socket a session may hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closed,
    Failed,
}

/// Inputs that move a session between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Open,
    Connected,
    Disconnected,
    Error,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid transition {transition:?} from {from}")]
pub struct StateError {
    pub from: ConnectionState,
    pub transition: Transition,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
            ConnectionState::Failed => "failed",
        }
    }

    /// Whether an `Open` request should start a new connect attempt.
    pub fn accepts_open(self) -> bool {
        matches!(
            self,
            ConnectionState::Idle | ConnectionState::Closed | ConnectionState::Failed
        )
    }

    /// Whether outbound frames may be written.
    pub fn accepts_frames(self) -> bool {
        self == ConnectionState::Open
    }

    pub fn transition(self, transition: Transition) -> Result<ConnectionState, StateError> {
        use ConnectionState::*;
        let next = match (self, transition) {
            (Idle | Closed | Failed, Transition::Open) => Connecting,
            (Connecting, Transition::Connected) => Open,
            (Connecting | Open, Transition::Error) => Failed,
            (Open, Transition::Disconnected) => Closed,
            (from, transition) => return Err(StateError { from, transition }),
        };
        Ok(next)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
