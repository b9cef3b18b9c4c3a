//! Traits implemented by game entities
//!
//! The step function itself is supplied by the game. The netcode layer only
//! needs to advance it, save and load its state, and blend between two
//! saved states. These are split so an entity composes only what it needs.

use crate::{Command, Sequence, SimTime, Snapshot};

/// A deterministic, fixed-step simulation
pub trait Steppable {
    /// Game-defined input payload
    type Input: Clone;

    /// Produce input for the tick at `time`.
    ///
    /// Only called on the participant that owns the entity's input.
    fn produce_input(&mut self, time: SimTime) -> Self::Input;

    /// Advance one step.
    ///
    /// `command` is `None` for ghost ticks (nothing arrived), paused
    /// prediction, and observers; the step must tolerate it. `is_replay` is
    /// set while re-deriving ticks that were already simulated once.
    fn tick(&mut self, command: Option<&Command<Self::Input>>, is_replay: bool);
}

/// An entity whose state can be saved and restored
pub trait Snapshotable {
    /// Game-defined state payload
    type State: Clone;

    /// Copy out the simulation-relevant state.
    fn save_state(&self) -> Self::State;

    /// Replace the simulation-relevant state.
    fn load_state(&mut self, state: &Self::State);

    /// Domain equality used to confirm a prediction (may use a margin).
    fn states_match(predicted: &Self::State, authoritative: &Self::State) -> bool;

    /// Capture a snapshot stamped with `time` and the last applied sequence.
    fn capture_state(&self, sequence: Sequence, time: SimTime) -> Snapshot<Self::State> {
        Snapshot::new(time, sequence, self.save_state())
    }

    /// Restore a previously captured snapshot.
    fn restore_state(&mut self, snapshot: &Snapshot<Self::State>) {
        self.load_state(&snapshot.state);
    }
}

/// An entity that can be rendered between two snapshots
pub trait Interpolatable: Snapshotable {
    /// Blend between `from` and `to`; `alpha` is in [0.0, 1.0].
    fn interpolate(
        &mut self,
        alpha: f32,
        from: &Snapshot<Self::State>,
        to: &Snapshot<Self::State>,
    );

    /// Called once when playback passes a snapshot.
    fn on_interpolation_reached(&mut self, _snapshot: &Snapshot<Self::State>) {}
}

/// Everything the driver needs from an entity
pub trait Simulated: Steppable + Interpolatable {}

impl<E: Steppable + Interpolatable> Simulated for E {}
