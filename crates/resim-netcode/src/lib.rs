//! Resim Netcode - Networked state reconciliation
//!
//! This crate runs one deterministic step function in three roles and keeps
//! them consistent over a lossy network:
//!
//! - **Sequencing**: Order, de-duplicate and gap-fill commands on the authority
//! - **Prediction**: Run local input immediately on the producing participant
//! - **Reconciliation**: Confirm or correct predictions by command sequence,
//!   then replay the ticks after a correction
//! - **Observer playback**: Render remote state a fixed delay behind the sender
//! - **Lag compensation**: Rewind entities to what a remote participant saw
//!
//! # Architecture
//!
//! ```text
//!       Client (Input)                           Server (Authority)
//! ┌──────────────────────────┐   Commands   ┌──────────────────────────┐
//! │ produce_input ─▶ tick    │─────────────▶│ CommandSequencer ─▶ tick │
//! │ capture ─▶ history       │              │ capture ─▶ history       │
//! │ ReconciliationEngine     │◀─────────────│ send every N ticks       │
//! └──────────────────────────┘   Snapshot   └──────────────────────────┘
//!                                                  │ relay / Snapshot
//!                                                  ▼
//!                                       ObserverInterpolator (Observer)
//! ```
//!
//! Network callbacks only push into a driver's [`Inbox`]; the
//! [`SimulationScheduler`] drains every inbox on its own thread at the start
//! of a frame, runs any resimulation inline, then ticks every entity.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = NetConfig::load("net.ron")?;
//! let mut scheduler = SimulationScheduler::new(config.clone())?;
//!
//! let driver = SimulationDriver::for_participant(player, true, true, Participant::Client, &config)?;
//! let to_player = driver.inbox_sender();
//! let handle = scheduler.register(driver);
//!
//! loop {
//!     // transport thread: to_player.push(message)
//!     scheduler.advance(server_clock.now());
//!     scheduler.render(server_clock.now());
//!     for message in scheduler.driver_mut::<Player>(handle)?.drain_outgoing() {
//!         transport.send(message);
//!     }
//! }
//! ```

mod config;
mod driver;
mod error;
mod inbox;
mod interpolation;
mod lag_compensation;
mod reconciliation;
mod scheduler;
mod sequencer;

#[cfg(test)]
mod testing;

pub use config::NetConfig;
pub use driver::{DriverEvent, DriverStats, SimulationDriver};
pub use error::{Error, Result};
pub use inbox::{inbox, Inbox, InboxSender, NetMessage};
pub use interpolation::{ObserverInterpolator, RenderSample};
pub use lag_compensation::{LagCompensator, RollbackRequest};
pub use reconciliation::{ReconcileOutcome, ReconciliationEngine};
pub use scheduler::{EntityHandle, ScheduledEntity, SchedulerEvent, SimulationScheduler};
pub use sequencer::{
    BufferInsert, CommandBuffer, CommandSequencer, SequencedCommand, SequencerStats,
};

// Re-export core history trait for convenience
pub use resim_core::TimeHistory;
