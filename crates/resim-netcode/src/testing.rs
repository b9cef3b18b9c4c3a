//! Test entity and fixtures shared by unit and scenario tests

use crate::NetConfig;
use resim_core::{Command, Interpolatable, SimTime, Snapshot, Snapshotable, Steppable};
use std::collections::HashMap;

/// Session settings used throughout the tests: 20 ticks/s, 100ms sends
pub fn config_20hz() -> NetConfig {
    NetConfig {
        tick_rate: 20,
        send_interval_ms: 100,
        ..NetConfig::default()
    }
}

/// A point on a line moved by a per-tick offset
#[derive(Debug, Clone, Default)]
pub struct Walker {
    pub position: f32,
    /// Offset for the n-th issued input (1-based); 1.0 when absent
    pub script: HashMap<u64, f32>,
    /// Inputs produced so far
    pub issued: u64,
    /// Ticks run with `is_replay` set
    pub replays: u64,
    /// Last interpolated position
    pub rendered: Option<f32>,
    /// Snapshot times passed during playback
    pub reached: Vec<SimTime>,
}

impl Walker {
    pub fn scripted(script: impl IntoIterator<Item = (u64, f32)>) -> Self {
        Self {
            script: script.into_iter().collect(),
            ..Self::default()
        }
    }
}

impl Steppable for Walker {
    type Input = f32;

    fn produce_input(&mut self, _time: SimTime) -> f32 {
        self.issued += 1;
        self.script.get(&self.issued).copied().unwrap_or(1.0)
    }

    fn tick(&mut self, command: Option<&Command<f32>>, is_replay: bool) {
        if let Some(command) = command {
            self.position += command.payload;
        }
        if is_replay {
            self.replays += 1;
        }
    }
}

impl Snapshotable for Walker {
    type State = f32;

    fn save_state(&self) -> f32 {
        self.position
    }

    fn load_state(&mut self, state: &f32) {
        self.position = *state;
    }

    fn states_match(predicted: &f32, authoritative: &f32) -> bool {
        (predicted - authoritative).abs() < 0.01
    }
}

impl Interpolatable for Walker {
    fn interpolate(&mut self, alpha: f32, from: &Snapshot<f32>, to: &Snapshot<f32>) {
        self.rendered = Some(from.state + (to.state - from.state) * alpha);
    }

    fn on_interpolation_reached(&mut self, snapshot: &Snapshot<f32>) {
        self.reached.push(snapshot.local_time);
    }
}
