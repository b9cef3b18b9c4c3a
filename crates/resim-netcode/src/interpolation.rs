//! Observer playback
//!
//! Observers never predict. They buffer raw snapshots on the sender's clock
//! and render a fixed delay behind it, blending between the two snapshots
//! that bracket the render time. When the buffer cannot bracket it the step
//! is skipped instead of extrapolating.

use crate::{Error, Result};
use resim_core::{HistoryInterpolation, Interpolatable, SimTime, Snapshot, TimeHistory};
use resim_history::TimeIndexedHistory;
use std::time::Duration;
use tracing::{debug, trace};

/// One successful render step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSample {
    /// Remote time that was rendered
    pub render_time: SimTime,
    /// Remote time of the earlier bracketing snapshot
    pub from: SimTime,
    /// Remote time of the later bracketing snapshot
    pub to: SimTime,
    /// Normalized position between them
    pub alpha: f32,
}

/// Delayed interpolation over remote snapshots
#[derive(Debug, Clone)]
pub struct ObserverInterpolator<S> {
    /// Raw snapshots keyed by remote time
    remote: TimeIndexedHistory<Snapshot<S>>,
    buffer_delay: Duration,
    /// Earlier bracket of the previous render step
    last_reached: Option<SimTime>,
    starved: u64,
    rejected: u64,
}

impl<S: Clone> ObserverInterpolator<S> {
    /// Create an interpolator buffering `capacity` snapshots
    pub fn new(capacity: usize, buffer_delay: Duration) -> Self {
        Self {
            remote: TimeIndexedHistory::new(capacity),
            buffer_delay,
            last_reached: None,
            starved: 0,
            rejected: 0,
        }
    }

    /// Buffer a snapshot received from the network
    ///
    /// Returns `false` for duplicates and for snapshots older than a full
    /// buffer.
    pub fn push_remote(&mut self, remote_time: SimTime, snapshot: Snapshot<S>) -> bool {
        if self.remote.get_exact(remote_time).is_some() {
            self.rejected += 1;
            trace!(%remote_time, "duplicate remote snapshot dropped");
            return false;
        }
        if self.remote.add(remote_time, snapshot).is_none() {
            self.rejected += 1;
            return false;
        }
        true
    }

    /// Remote time to render when the remote clock reads `remote_now`
    pub fn render_time(&self, remote_now: SimTime) -> SimTime {
        remote_now.saturating_sub(self.buffer_delay)
    }

    /// Most recent snapshot whose remote time has been fully played back
    pub fn latest_elapsed(&self, remote_now: SimTime) -> Option<&Snapshot<S>> {
        let render_time = self.render_time(remote_now);
        self.remote
            .get(render_time)
            .filter(|(time, _)| *time <= render_time)
            .map(|(_, snapshot)| snapshot)
    }

    /// Blend `entity` to the state at `remote_now - buffer_delay`
    ///
    /// `on_interpolation_reached` fires once each time playback moves past
    /// a new snapshot.
    pub fn render<E>(&mut self, entity: &mut E, remote_now: SimTime) -> Result<RenderSample>
    where
        E: Interpolatable<State = S>,
    {
        let render_time = self.render_time(remote_now);
        let Some(((from_time, from), (to_time, to), alpha)) = self.remote.bracket(render_time)
        else {
            self.starved += 1;
            let range = self.remote.time_range();
            debug!(%render_time, ?range, "interpolation starved, skipping render");
            return Err(Error::InterpolationStarved { render_time, range });
        };

        if self.last_reached != Some(from_time) {
            self.last_reached = Some(from_time);
            entity.on_interpolation_reached(from);
        }
        entity.interpolate(alpha, from, to);

        Ok(RenderSample {
            render_time,
            from: from_time,
            to: to_time,
            alpha,
        })
    }

    /// Buffered remote snapshots
    pub fn remote_history(&self) -> &TimeIndexedHistory<Snapshot<S>> {
        &self.remote
    }

    /// Configured playback delay
    pub fn buffer_delay(&self) -> Duration {
        self.buffer_delay
    }

    /// Render steps skipped for lack of data
    pub fn starved(&self) -> u64 {
        self.starved
    }

    /// Snapshots refused by `push_remote`
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}
