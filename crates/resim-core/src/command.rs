//! Per-tick input commands

use crate::{Sequence, SimTime};
use serde::{Deserialize, Serialize};

/// A sequence-numbered unit of input driving one simulation tick
///
/// The payload is owned by the game. Commands are never mutated after they
/// are sent; the sequencer builds new ones when it has to fill a gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command<I> {
    /// Monotonic number assigned by the producer
    pub sequence: Sequence,
    /// Producer-local time at which the command was issued
    pub issue_time: SimTime,
    /// Game-defined input
    pub payload: I,
}

impl<I> Command<I> {
    /// Create a new command
    pub fn new(sequence: Sequence, issue_time: SimTime, payload: I) -> Self {
        Self {
            sequence,
            issue_time,
            payload,
        }
    }
}

impl<I: Clone> Command<I> {
    /// Copy of this command carrying a different sequence number
    ///
    /// Used to continue a stream when the expected command never arrived.
    pub fn renumbered(&self, sequence: Sequence) -> Self {
        Self {
            sequence,
            issue_time: self.issue_time,
            payload: self.payload.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renumbered_keeps_payload() {
        let cmd = Command::new(3, SimTime::from_millis(150), 1.5f32);
        let filled = cmd.renumbered(4);

        assert_eq!(filled.sequence, 4);
        assert_eq!(filled.payload, 1.5);
        assert_eq!(filled.issue_time, cmd.issue_time);
        assert_eq!(cmd.sequence, 3);
    }
}
