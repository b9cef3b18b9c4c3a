//! Lag compensation
//!
//! The server checks a remote participant's action against the world as
//! that participant saw it: its own clock minus the network delay, the
//! interpolation delay it renders with, and a fixed estimate of how long
//! its commands wait in the server's queue.

use crate::NetConfig;
use resim_core::{ParticipantId, SimTime, Snapshot, TimeHistory, TimedRef};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::trace;

/// A participant asking to validate an action in the past
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackRequest {
    /// Who performed the action
    pub requester: ParticipantId,
    /// When the action happened, on the server clock
    pub target_time: SimTime,
    /// Requester's measured one-way latency
    pub requester_ping: Duration,
    /// Playback delay the requester renders observers with
    pub requester_interpolation_delay: Duration,
}

impl RollbackRequest {
    /// Create a request
    pub fn new(
        requester: ParticipantId,
        target_time: SimTime,
        requester_ping: Duration,
        requester_interpolation_delay: Duration,
    ) -> Self {
        Self {
            requester,
            target_time,
            requester_ping,
            requester_interpolation_delay,
        }
    }
}

/// Computes rollback times for lag-compensated checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LagCompensator {
    /// Constant estimate; not measured at runtime
    estimated_command_queue_delay: Duration,
}

impl LagCompensator {
    /// Create a compensator with a fixed command queue estimate
    pub fn new(estimated_command_queue_delay: Duration) -> Self {
        Self {
            estimated_command_queue_delay,
        }
    }

    /// Create a compensator from the session configuration
    pub fn from_config(config: &NetConfig) -> Self {
        Self::new(config.estimated_command_queue_delay())
    }

    /// Time to roll an entity owned by `owner` back to
    ///
    /// The owner saw its own entity at the present, so its requests return
    /// `now` unchanged.
    pub fn rollback_time(
        &self,
        request: &RollbackRequest,
        owner: Option<ParticipantId>,
        now: SimTime,
    ) -> SimTime {
        if owner == Some(request.requester) {
            trace!(requester = %request.requester, "requester owns entity, no rollback");
            return now;
        }
        request.target_time
            - request.requester_ping
            - request.requester_interpolation_delay
            - self.estimated_command_queue_delay
    }

    /// Best stored state for a request (latest at or before the rollback time)
    pub fn lookup<'h, S, H>(
        &self,
        history: &'h H,
        request: &RollbackRequest,
        owner: Option<ParticipantId>,
        now: SimTime,
    ) -> Option<TimedRef<'h, Snapshot<S>>>
    where
        H: TimeHistory<Snapshot<S>>,
    {
        history.get(self.rollback_time(request, owner, now))
    }

    /// Configured command queue estimate
    pub fn estimated_command_queue_delay(&self) -> Duration {
        self.estimated_command_queue_delay
    }
}

impl Default for LagCompensator {
    fn default() -> Self {
        Self::from_config(&NetConfig::default())
    }
}
