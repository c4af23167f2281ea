use crate::{Error, Result};

/// Client side of the simple handshake
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing sent yet
    #[default]
    Uninitialized,

    /// C0+C1 written
    SentC0C1,

    /// S0 and S1 read and checked
    ReceivedS0S1,

    /// S2 read
    ReceivedS2,

    /// C2 written, handshake complete
    Done,

    /// Error occurred
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeEvent {
    SentC0C1,
    ReceivedS0S1,
    ReceivedS2,
    SentC2,
    Error,
}

impl HandshakeState {
    pub fn new() -> Self {
        HandshakeState::Uninitialized
    }

    /// Check if handshake is complete
    pub fn is_done(&self) -> bool {
        *self == HandshakeState::Done
    }

    /// Check if handshake failed
    pub fn is_failed(&self) -> bool {
        *self == HandshakeState::Failed
    }

    /// Transition to next state
    pub fn transition(&mut self, event: HandshakeEvent) -> Result<()> {
        let next = match (*self, event) {
            (_, HandshakeEvent::Error) => HandshakeState::Failed,
            (HandshakeState::Uninitialized, HandshakeEvent::SentC0C1) => HandshakeState::SentC0C1,
            (HandshakeState::SentC0C1, HandshakeEvent::ReceivedS0S1) => HandshakeState::ReceivedS0S1,
            (HandshakeState::ReceivedS0S1, HandshakeEvent::ReceivedS2) => HandshakeState::ReceivedS2,
            (HandshakeState::ReceivedS2, HandshakeEvent::SentC2) => HandshakeState::Done,
            _ => {
                return Err(Error::handshake(format!(
                    "Invalid transition from {:?} with event {:?}",
                    self, event
                )));
            }
        };
        *self = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_sequence() {
        let mut state = HandshakeState::new();
        for event in [
            HandshakeEvent::SentC0C1,
            HandshakeEvent::ReceivedS0S1,
            HandshakeEvent::ReceivedS2,
            HandshakeEvent::SentC2,
        ] {
            state.transition(event).unwrap();
        }
        assert!(state.is_done());
    }

    #[test]
    fn test_out_of_order() {
        let mut state = HandshakeState::new();
        assert!(state.transition(HandshakeEvent::ReceivedS2).is_err());
        assert_eq!(state, HandshakeState::Uninitialized);

        state.transition(HandshakeEvent::Error).unwrap();
        assert!(state.is_failed());
    }
}
