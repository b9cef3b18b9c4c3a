//! The simulated entity: a kart on a straight track

use resim_core::{Command, Interpolatable, SimTime, Snapshot, Snapshotable, Steppable};
use serde::{Deserialize, Serialize};

/// Seconds per tick at the demo's tick rate
const DT: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct KartState {
    pub position: f32,
    pub velocity: f32,
}

/// Accelerates forward for one second, then brakes for one second
#[derive(Debug, Default)]
pub struct Kart {
    pub state: KartState,
    /// Position shown on screen (observers only)
    pub rendered: Option<f32>,
    /// Snapshots passed during playback
    pub reached: u64,
}

impl Steppable for Kart {
    type Input = f32;

    fn produce_input(&mut self, time: SimTime) -> f32 {
        if time.as_secs_f64() % 2.0 < 1.0 {
            1.0
        } else {
            -1.0
        }
    }

    fn tick(&mut self, command: Option<&Command<f32>>, _is_replay: bool) {
        let throttle = command.map_or(0.0, |c| c.payload);
        self.state.velocity += throttle * DT;
        self.state.position += self.state.velocity * DT;
    }
}

impl Snapshotable for Kart {
    type State = KartState;

    fn save_state(&self) -> KartState {
        self.state
    }

    fn load_state(&mut self, state: &KartState) {
        self.state = *state;
    }

    fn states_match(predicted: &KartState, authoritative: &KartState) -> bool {
        (predicted.position - authoritative.position).abs() < 1e-3
            && (predicted.velocity - authoritative.velocity).abs() < 1e-3
    }
}

impl Interpolatable for Kart {
    fn interpolate(&mut self, alpha: f32, from: &Snapshot<KartState>, to: &Snapshot<KartState>) {
        let (a, b) = (from.state.position, to.state.position);
        self.rendered = Some(a + (b - a) * alpha);
    }

    fn on_interpolation_reached(&mut self, _snapshot: &Snapshot<KartState>) {
        self.reached += 1;
    }
}
