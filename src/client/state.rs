use std::fmt;

/// Publish session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No socket
    Idle,

    /// Socket open, handshake pending
    TcpConnected,

    /// Handshake done
    Handshaken,

    /// `connect` answered (or given up on)
    Connected,

    /// `releaseStream` answered (or given up on)
    StreamReleased,

    /// Stream id known
    StreamCreated,

    /// `publish` sent
    Publishing,

    /// Publish acknowledged; media may flow
    Live,

    /// A fatal error ended the session
    Failed,
}

impl SessionState {
    /// Check if media can be published
    pub fn can_publish(&self) -> bool {
        matches!(self, SessionState::Publishing | SessionState::Live)
    }

    /// Failed sessions never leave their state; a new connect replaces them
    pub fn is_terminal(&self) -> bool {
        *self == SessionState::Failed
    }

    /// Validate transition
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        match (*self, next) {
            (Idle, TcpConnected) => true,
            (TcpConnected, Handshaken) => true,
            (Handshaken, Connected) => true,
            (Connected, StreamReleased) => true,
            (StreamReleased, StreamCreated) => true,
            (StreamCreated, Publishing) => true,
            (Publishing, Live) => true,
            (Failed, _) => false,
            (_, Failed) => true,
            // disconnect returns to Idle from anywhere
            (_, Idle) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Outcome of a command step that didn't fail fatally
#[derive(Debug, Clone, PartialEq)]
pub enum StepStatus {
    /// Expected response received
    Completed,

    /// Attempt budget spent without the response; the step's fallback applied
    TimedOut,

    /// The peer answered with `_error` (or an error-level status)
    Rejected { code: String, description: String },
}

impl StepStatus {
    pub fn is_completed(&self) -> bool {
        *self == StepStatus::Completed
    }
}
