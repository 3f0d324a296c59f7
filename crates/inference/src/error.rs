//! Error types for the inference stages.

use records::{ItemId, RecordError, UserId};
use thiserror::Error;

/// Fatal conditions that abort a stage.
///
/// Missing correlations, missing stats and non-positive predictions are not
/// errors; they only shrink the output.
#[derive(Error, Debug)]
pub enum InferenceError {
    /// Malformed input or bad configuration
    #[error(transparent)]
    Record(#[from] RecordError),

    /// Std-dev weighting was requested but the prediction carries no std dev
    #[error("No rating std dev found for user {user_id}, item {item_id}")]
    MissingStdDev { user_id: UserId, item_id: ItemId },

    /// A weighted average whose weights sum to zero
    #[error("Total weight is zero for user {user_id}, item {item_id}")]
    ZeroTotalWeight { user_id: UserId, item_id: ItemId },

    /// Fixed-point arithmetic left the `i64` range
    #[error("Arithmetic overflow computing {operation} for {key}")]
    Overflow { key: String, operation: &'static str },

    /// The reducer thread pool could not be started
    #[error("Failed to build reducer pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, InferenceError>;
