//! Rating aggregator: the fusion stage.
//!
//! Folds every predicted rating of one (user, item) pair into a single
//! utility score, either by a weighted average or by the median.

use crate::error::{InferenceError, Result};
use crate::traits::GroupReducer;
use crate::transforms::{inv_norm_std_dev, median};
use records::{AggregationPolicy, AggregatorSettings, ItemId, PredictedRating, UserId, UtilityScore};
use serde::Serialize;
use std::ops::AddAssign;
use tracing::debug;

/// Counters of the aggregation stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregatorCounters {
    pub groups: u64,
    /// Predictions folded into scores
    pub predictions: u64,
}

impl AddAssign for AggregatorCounters {
    fn add_assign(&mut self, other: Self) {
        self.groups += other.groups;
        self.predictions += other.predictions;
    }
}

/// Weight given to each prediction in average mode
#[derive(Debug, Clone, Copy)]
enum Weighting {
    SupportCount,
    InverseStdDev,
    Uniform,
}

/// Fuses the predictions of one user and item
#[derive(Debug, Clone, Default)]
pub struct RatingAggregator {
    settings: AggregatorSettings,
}

impl RatingAggregator {
    pub fn new(settings: AggregatorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AggregatorSettings {
        &self.settings
    }

    /// Aggregate all predictions of `user_id` on `item_id`.
    ///
    /// `predictions` must not be empty.
    pub fn aggregate(
        &self,
        user_id: &str,
        item_id: &str,
        predictions: &[PredictedRating],
    ) -> Result<UtilityScore> {
        let overflow = |operation| InferenceError::Overflow {
            key: format!("user {user_id}, item {item_id}"),
            operation,
        };
        let score = match self.settings.policy {
            AggregationPolicy::CorrelationLengthWeighted => {
                self.average(user_id, item_id, predictions, Weighting::SupportCount)?
            }
            AggregationPolicy::StdDevWeighted => {
                self.average(user_id, item_id, predictions, Weighting::InverseStdDev)?
            }
            AggregationPolicy::Plain => {
                self.average(user_id, item_id, predictions, Weighting::Uniform)?
            }
            AggregationPolicy::Median => {
                let mut ratings: Vec<i64> =
                    predictions.iter().map(|p| p.predicted_rating).collect();
                median(&mut ratings)
                    .unwrap_or_default()
                    .checked_mul(self.settings.correlation_scale)
                    .ok_or_else(|| overflow("scaled median"))?
            }
        };

        Ok(UtilityScore {
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
            score,
            support_count: predictions.len(),
        })
    }

    /// `sum(rating * weight) * scale / sum(weight)`
    fn average(
        &self,
        user_id: &str,
        item_id: &str,
        predictions: &[PredictedRating],
        weighting: Weighting,
    ) -> Result<i64> {
        let overflow = |operation| InferenceError::Overflow {
            key: format!("user {user_id}, item {item_id}"),
            operation,
        };
        // Widened to the largest prediction of the whole group before any
        // weight is taken; only the std-dev weighting reads it.
        let max_rating = predictions
            .iter()
            .map(|pred| pred.predicted_rating)
            .fold(self.settings.max_rating, i64::max);
        let mut sum = 0i64;
        let mut total_weight = 0i64;

        for pred in predictions {
            let weight = match weighting {
                Weighting::SupportCount => pred.weight,
                Weighting::InverseStdDev => {
                    let std_dev = pred.input_std_dev.filter(|sd| *sd >= 0).ok_or_else(|| {
                        InferenceError::MissingStdDev {
                            user_id: user_id.to_string(),
                            item_id: item_id.to_string(),
                        }
                    })?;
                    inv_norm_std_dev(std_dev, max_rating)
                }
                Weighting::Uniform => 1,
            };
            sum = pred
                .predicted_rating
                .checked_mul(weight)
                .and_then(|weighted| sum.checked_add(weighted))
                .ok_or_else(|| overflow("weighted sum"))?;
            total_weight = total_weight
                .checked_add(weight)
                .ok_or_else(|| overflow("total weight"))?;
        }

        if total_weight == 0 {
            return Err(InferenceError::ZeroTotalWeight {
                user_id: user_id.to_string(),
                item_id: item_id.to_string(),
            });
        }
        let scaled = sum
            .checked_mul(self.settings.correlation_scale)
            .ok_or_else(|| overflow("scaled weighted sum"))?;
        scaled
            .checked_div(total_weight)
            .ok_or_else(|| overflow("weighted average"))
    }
}

impl GroupReducer for RatingAggregator {
    type Key = (UserId, ItemId);
    type Input = PredictedRating;
    type Output = UtilityScore;
    type Counters = AggregatorCounters;

    fn name(&self) -> &str {
        "RatingAggregator"
    }

    fn reduce(
        &self,
        key: &(UserId, ItemId),
        records: &[PredictedRating],
        counters: &mut AggregatorCounters,
    ) -> Result<Vec<UtilityScore>> {
        let (user_id, item_id) = key;
        let score = self.aggregate(user_id, item_id, records)?;
        debug!(
            user_id = %user_id,
            item_id = %item_id,
            score = score.score,
            count = score.support_count,
            "aggregated"
        );
        counters.groups += 1;
        counters.predictions += records.len() as u64;
        Ok(vec![score])
    }
}
