//! Identity types for participants and sequence numbers

use serde::{Deserialize, Serialize};
use std::fmt;

/// A command sequence number
///
/// Assigned by the producer, starting at 1. Zero means "nothing processed yet".
pub type Sequence = u64;

/// Unique identifier for a participant in a session (server, client, or host)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub u64);

impl ParticipantId {
    /// The server participant
    pub const SERVER: ParticipantId = ParticipantId(0);

    /// Create a new participant ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Check if this is the server participant
    pub fn is_server(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_server() {
            write!(f, "participant:server")
        } else {
            write!(f, "participant:{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_id() {
        let server = ParticipantId::SERVER;
        assert!(server.is_server());
        assert_eq!(format!("{}", server), "participant:server");

        let client = ParticipantId::new(7);
        assert!(!client.is_server());
        assert_eq!(client.raw(), 7);
        assert_eq!(format!("{}", client), "participant:7");
    }
}
