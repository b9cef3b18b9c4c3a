//! Deterministic lossy link between two participants

use resim_netcode::{InboxSender, NetMessage};
use std::collections::VecDeque;
use tracing::trace;

/// Delays every message by a fixed number of frames and drops every
/// `drop_every`-th one
pub struct LossyLink<I, S> {
    name: &'static str,
    latency_frames: u64,
    drop_every: u64,
    sent: u64,
    dropped: u64,
    in_flight: VecDeque<(u64, NetMessage<I, S>)>,
}

impl<I, S> LossyLink<I, S> {
    pub fn new(name: &'static str, latency_frames: u64, drop_every: u64) -> Self {
        Self {
            name,
            latency_frames,
            drop_every,
            sent: 0,
            dropped: 0,
            in_flight: VecDeque::new(),
        }
    }

    pub fn send(&mut self, frame: u64, message: NetMessage<I, S>) {
        self.sent += 1;
        if self.drop_every > 0 && self.sent % self.drop_every == 0 {
            self.dropped += 1;
            trace!(link = self.name, frame, "message lost");
            return;
        }
        self.in_flight.push_back((frame + self.latency_frames, message));
    }

    /// Hand over everything due by `frame`
    pub fn deliver(&mut self, frame: u64, to: &InboxSender<I, S>) {
        while self.in_flight.front().is_some_and(|(due, _)| *due <= frame) {
            if let Some((_, message)) = self.in_flight.pop_front() {
                to.push(message);
            }
        }
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
