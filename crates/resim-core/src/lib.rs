//! Resim Core - Shared types for networked resimulation
//!
//! This crate provides the vocabulary shared by every role an entity can
//! run in:
//! - Clock values and the fixed tick rate (`SimTime`, `TickRate`)
//! - Sequence-numbered input (`Command`) and captured state (`Snapshot`)
//! - Role resolution (`Mode`, `Participant`, `ModeResolver`)
//! - The bounded, time-ordered history contract (`TimeHistory`)
//! - Traits the game implements per entity type (`Steppable`,
//!   `Snapshotable`, `Interpolatable`)
//!
//! The step function, transport, and tick scheduler live outside this crate.

mod command;
mod error;
pub mod history;
mod identity;
mod mode;
mod sim;
mod snapshot;
pub mod time;

pub use command::Command;
pub use error::{Error, Result};
pub use history::{interpolation_factor, Bracket, HistoryInterpolation, TimeHistory, TimedRef};
pub use identity::{ParticipantId, Sequence};
pub use mode::{Mode, ModeResolver, Participant, RoleAssignment};
pub use sim::{Interpolatable, Simulated, Snapshotable, Steppable};
pub use snapshot::Snapshot;
pub use time::{SimTime, TickRate, MAX_TICKS_PER_SECOND};
