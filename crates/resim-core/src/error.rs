//! Error types for resim-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid tick rate: {0} ticks per second")]
    InvalidTickRate(u32),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
