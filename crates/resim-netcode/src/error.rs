//! Error types for resim-netcode

use crate::EntityHandle;
use resim_core::SimTime;
use thiserror::Error;

/// Netcode error type
#[derive(Debug, Error)]
pub enum Error {
    /// Nothing stored to restore from
    #[error("No snapshot stored at or before {0}")]
    SnapshotNotFound(SimTime),

    /// Not enough remote snapshots buffered to bracket the render time
    #[error("Interpolation starved at {render_time}, buffered range {range:?}")]
    InterpolationStarved {
        render_time: SimTime,
        range: Option<(SimTime, SimTime)>,
    },

    /// Handle does not name a registered entity
    #[error("Entity {0} is not registered")]
    UnknownEntity(EntityHandle),

    /// Handle names an entity driven by a different type
    #[error("Entity {0} is not driven by the requested entity type")]
    EntityTypeMismatch(EntityHandle),

    /// Configuration rejected by validation
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] resim_core::Error),
}

/// Result type for netcode operations
pub type Result<T> = std::result::Result<T, Error>;
