//! # Records Crate
//!
//! Value types, text parsers and configuration shared by the two inference
//! stages (rating prediction and rating aggregation).
//!
//! ## Main Components
//!
//! - **types**: input records, the tagged item-group record, stage outputs
//! - **parser**: parse delimited rating, stat, correlation and prediction rows
//! - **config**: `JobConfig` and the read-only per-stage settings
//! - **error**: error types for parsing and configuration
//!
//! ## Example Usage
//!
//! ```ignore
//! use records::{JobConfig, parser};
//!
//! let mut config = JobConfig::load("job.toml")?;
//! config.apply_override("max.rating=5")?;
//! config.validate()?;
//!
//! let at = parser::LineRef::new("corr-00000", 1);
//! let corr = parser::parse_correlation_line("a,b,500,10", &config.delimiters, at)?;
//! ```

pub mod config;
pub mod error;
pub mod parser;
pub mod types;

pub use config::{
    AggregationPolicy, AggregatorSettings, Delimiters, JobConfig, PredictorSettings, RatingLayout,
};
pub use error::{RecordError, Result};
pub use types::{
    GroupedRecord, ItemCorrelation, ItemId, ItemRatingStat, ItemRecord, PredictedRating,
    SourceKind, TypeTag, UserId, UserRating, UtilityScore, STD_DEV_ABSENT,
};
