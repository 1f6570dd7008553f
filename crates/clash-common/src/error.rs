//! Error types for Project Clash.

use thiserror::Error;

/// Top-level error type for Clash operations.
#[derive(Debug, Error)]
pub enum ClashError {
    /// Stage or character data failed validation
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Validation failures for externally authored stage and character data.
///
/// The simulation only ever runs on data that passed these checks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    /// A stage segment has identical endpoints
    #[error("stage segment {index} has zero length")]
    ZeroLengthSegment {
        /// Index of the segment in the stage list
        index: usize,
    },

    /// The blast zone has no area
    #[error("blast zone is empty: min ({min_x}, {min_y}) max ({max_x}, {max_y})")]
    EmptyBlastZone {
        /// Minimum X
        min_x: f32,
        /// Minimum Y
        min_y: f32,
        /// Maximum X
        max_x: f32,
        /// Maximum Y
        max_y: f32,
    },

    /// A value that must be strictly positive was not
    #[error("{owner}: {field} must be positive, got {value}")]
    NonPositive {
        /// Character or object the field belongs to
        owner: String,
        /// Field name
        field: &'static str,
        /// Offending value
        value: f32,
    },

    /// A duration that must be at least one frame was zero
    #[error("{owner}: {field} must be at least one frame")]
    ZeroDuration {
        /// Character or object the field belongs to
        owner: String,
        /// Field name
        field: &'static str,
    },

    /// A character id was not present in the roster
    #[error("unknown character id {0}")]
    UnknownCharacter(u16),

    /// Two roster entries share an id
    #[error("duplicate character id {0}")]
    DuplicateCharacter(u16),

    /// The stage has no spawn points
    #[error("stage has no spawn points")]
    NoSpawnPoints,
}

/// Result type alias for Clash operations.
pub type ClashResult<T> = Result<T, ClashError>;
