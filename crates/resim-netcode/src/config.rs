//! Netcode configuration - tick rate, send cadence, and buffer sizing
//!
//! All durations are stored in milliseconds so the file format stays
//! readable. Everything else (ticks per send, fill caps, capacities) is
//! derived from these values.
//!
//! ```
//! use resim_netcode::NetConfig;
//!
//! let config = NetConfig::from_ron_str("(tick_rate: 20, send_interval_ms: 100)").unwrap();
//! assert_eq!(config.ticks_per_send(), 2);
//! assert_eq!(config.max_predicted_fill(), 1);
//! ```

use crate::{Error, Result};
use resim_core::TickRate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration shared by every driver in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// How often commands and snapshots are sent
    pub send_interval_ms: u64,
    /// How much history each entity keeps
    pub history_duration_ms: u64,
    /// Maximum synthesized commands per gap, as a fraction of ticks per send
    pub max_predicted_fill_ratio: f32,
    /// Drain command backlog by running extra commands per tick
    pub catch_up: bool,
    /// Extra commands processed per tick while catching up
    pub max_catch_up_per_tick: usize,
    /// Backlog commands dropped per tick when catch-up is disabled
    pub max_dropped_per_tick: usize,
    /// Command backlog target, in send intervals (2..=3)
    pub target_buffer_intervals: f32,
    /// Command buffer capacity, in send intervals
    pub command_buffer_intervals: usize,
    /// Observer playback delay behind the remote clock
    pub interpolation_delay_ms: u64,
    /// Assumed time a command waits in the server queue
    pub estimated_command_queue_delay_ms: u64,
}

impl NetConfig {
    /// Parse and validate a RON configuration
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let config: NetConfig = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a RON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    /// Serialize to pretty RON
    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Check that every value is usable
    pub fn validate(&self) -> Result<()> {
        TickRate::new(self.tick_rate)?;
        let tick_ms = self.tick_interval().as_millis() as u64;
        if self.send_interval_ms < tick_ms {
            return Err(Error::InvalidConfig(format!(
                "send_interval_ms ({}) is shorter than one tick ({}ms)",
                self.send_interval_ms, tick_ms
            )));
        }
        if self.history_duration_ms < self.send_interval_ms {
            return Err(Error::InvalidConfig(format!(
                "history_duration_ms ({}) is shorter than send_interval_ms ({})",
                self.history_duration_ms, self.send_interval_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.max_predicted_fill_ratio) {
            return Err(Error::InvalidConfig(format!(
                "max_predicted_fill_ratio ({}) must be within 0.0..=1.0",
                self.max_predicted_fill_ratio
            )));
        }
        if !(2.0..=3.0).contains(&self.target_buffer_intervals) {
            return Err(Error::InvalidConfig(format!(
                "target_buffer_intervals ({}) must be within 2.0..=3.0",
                self.target_buffer_intervals
            )));
        }
        if self.command_buffer_intervals == 0 {
            return Err(Error::InvalidConfig(
                "command_buffer_intervals must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The simulation rate (a zero rate is treated as one tick per second)
    pub fn rate(&self) -> TickRate {
        TickRate::new(self.tick_rate.max(1)).unwrap_or_default()
    }

    /// Length of one tick
    pub fn tick_interval(&self) -> Duration {
        self.rate().tick_interval()
    }

    /// Interval between sends
    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send_interval_ms)
    }

    /// Whole ticks per send interval (at least one)
    pub fn ticks_per_send(&self) -> usize {
        self.rate().ticks_in(self.send_interval()).max(1)
    }

    /// Maximum consecutive commands the sequencer may synthesize
    pub fn max_predicted_fill(&self) -> usize {
        (self.max_predicted_fill_ratio * self.ticks_per_send() as f32).floor() as usize
    }

    /// Command backlog above which the server catches up or drops
    pub fn target_command_buffer(&self) -> usize {
        (self.target_buffer_intervals * self.ticks_per_send() as f32).ceil() as usize
    }

    /// Hard cap on buffered commands per producer
    pub fn command_buffer_capacity(&self) -> usize {
        (self.command_buffer_intervals * self.ticks_per_send()).max(self.target_command_buffer() + 1)
    }

    /// Entries kept per history buffer
    pub fn history_capacity(&self) -> usize {
        self.rate()
            .ticks_in(Duration::from_millis(self.history_duration_ms))
            .max(1)
    }

    /// Observer playback delay
    pub fn interpolation_delay(&self) -> Duration {
        Duration::from_millis(self.interpolation_delay_ms)
    }

    /// Assumed server queue delay used by lag compensation
    pub fn estimated_command_queue_delay(&self) -> Duration {
        Duration::from_millis(self.estimated_command_queue_delay_ms)
    }
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            send_interval_ms: 100,
            history_duration_ms: 1000,
            max_predicted_fill_ratio: 0.5,
            catch_up: true,
            max_catch_up_per_tick: 2,
            max_dropped_per_tick: 2,
            target_buffer_intervals: 2.0,
            command_buffer_intervals: 4,
            interpolation_delay_ms: 100,
            estimated_command_queue_delay_ms: 50,
        }
    }
}
