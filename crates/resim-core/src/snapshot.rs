//! Per-entity, per-tick state snapshots

use crate::{Sequence, SimTime};
use serde::{Deserialize, Serialize};

/// A captured, timestamped copy of an entity's simulation-relevant state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<S> {
    /// Time on the capturing participant's clock
    pub local_time: SimTime,
    /// Sequence of the last command applied before capture
    pub last_processed_command: Sequence,
    /// Whether this state is confirmed by the authority
    pub authoritative: bool,
    /// Game-defined state
    pub state: S,
}

impl<S> Snapshot<S> {
    /// Create a new (non-authoritative) snapshot
    pub fn new(local_time: SimTime, last_processed_command: Sequence, state: S) -> Self {
        Self {
            local_time,
            last_processed_command,
            authoritative: false,
            state,
        }
    }

    /// Mark this snapshot as authoritative
    pub fn into_authoritative(mut self) -> Self {
        self.authoritative = true;
        self
    }

    /// Re-stamp this snapshot onto another clock
    pub fn retimed(mut self, local_time: SimTime) -> Self {
        self.local_time = local_time;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_builders() {
        let snap = Snapshot::new(SimTime::from_millis(50), 4, [1.0f32, 2.0]);
        assert!(!snap.authoritative);

        let confirmed = snap.clone().into_authoritative();
        assert!(confirmed.authoritative);
        assert_eq!(confirmed.last_processed_command, 4);

        let moved = confirmed.retimed(SimTime::from_millis(900));
        assert_eq!(moved.local_time, SimTime::from_millis(900));
        assert!(moved.authoritative);
        assert_eq!(moved.state, snap.state);
    }
}
