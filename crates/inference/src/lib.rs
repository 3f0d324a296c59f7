//! # Inference Crate
//!
//! The two batch stages of item-based collaborative filtering inference:
//!
//! 1. **Prediction**: ratings, item rating stats and item-item correlations
//!    are classified by item, grouped, and each user rating is propagated
//!    through the item's correlations into predicted ratings.
//! 2. **Aggregation**: predicted ratings are grouped by (user, item) and
//!    fused into one utility score.
//!
//! ## Architecture
//! - `classifier`: raw rows -> item-keyed records tagged for ordering
//! - `predictor`: per-item phase machine emitting predictions
//! - `aggregator`: weighted average or median per (user, item)
//! - `transforms`: correlation modifier, prediction formula, median
//! - `traits`: the `GroupReducer` seam
//! - `shuffle`: in-process sort/group provider, parallel over groups
//! - `jobs`: file-level stage runners
//!
//! ## Example Usage
//! ```ignore
//! use inference::{AggregationJob, PredictionJob};
//! use records::JobConfig;
//!
//! let config = JobConfig::default();
//! let mut predict = PredictionJob::new(config.clone())?;
//! predict.add_file(Path::new("data/rating.txt"))?;
//! predict.add_file(Path::new("data/corr.txt"))?;
//! let predictions = predict.run()?;
//!
//! let mut aggregate = AggregationJob::new(config)?;
//! aggregate.extend(predictions.outputs);
//! let scores = aggregate.run()?;
//! ```

pub mod aggregator;
pub mod classifier;
pub mod error;
pub mod jobs;
pub mod predictor;
pub mod shuffle;
pub mod traits;
pub mod transforms;

// Re-export main types
pub use aggregator::{AggregatorCounters, RatingAggregator};
pub use classifier::RecordClassifier;
pub use error::{InferenceError, Result};
pub use jobs::{AggregationJob, AggregationReport, PredictionJob, PredictionReport};
pub use predictor::{GroupPhase, ItemGroup, PredictorCounters, RatingPredictor};
pub use shuffle::{LocalShuffle, StageReport};
pub use traits::GroupReducer;
