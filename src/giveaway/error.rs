//! Error types for the giveaway subsystem

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur during giveaway operations
#[derive(Debug, Error)]
pub enum GiveawayError {
    /// Winner count below the minimum of one
    #[error("winner count must be at least 1, got {0}")]
    InvalidWinnerCount(u32),

    /// Deadline not in the future at creation time
    #[error("giveaway deadline must be in the future")]
    DeadlineInPast,

    /// No giveaway under the given id
    #[error("giveaway not found: {0}")]
    NotFound(String),

    /// Winner draw requested with an empty entry list
    #[error("giveaway has no entries")]
    NoEntries,

    /// The durable store rejected a write
    #[error("persistence failure: {0}")]
    Store(#[from] StoreError),
}

/// Result type for giveaway operations
pub type GiveawayResult<T> = Result<T, GiveawayError>;
