//! Error types for the planning engine.

use thiserror::Error;

/// Result type alias using [`ArmadaError`].
pub type Result<T> = std::result::Result<T, ArmadaError>;

/// Top-level error type for all planning errors.
///
/// Entity lookups that can miss (eliminated player, captured yard) are not
/// errors: they return `Option` or empty actions. The only things that can
/// actually fail are the adapters feeding the planner.
#[derive(Debug, Error)]
pub enum ArmadaError {
    /// Failed to parse a flight plan string.
    #[error("Invalid flight plan '{plan}': {message}")]
    PlanParse {
        /// The offending plan string.
        plan: String,
        /// Error message.
        message: String,
    },

    /// Invalid snapshot data.
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),
}
