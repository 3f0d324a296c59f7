//! Rating predictor: second half of the prediction stage.
//!
//! One group holds every record of one item, correlations first, then the
//! stat, then user ratings. Each rating is propagated through every
//! correlation of the item into a predicted rating for the correlated item.
//!
//! ## Phases
//! The delivery order is made explicit with `GroupPhase`:
//! 1. `CollectingCorrelations` - correlation records append to the list
//! 2. `CollectingStat` - the stat record (if any) sets the std dev
//! 3. `Emitting` - every rating emits against the list collected so far
//!
//! A correlation or stat that arrives once emitting has begun is still
//! applied, but ratings already emitted never see it: a rating that precedes
//! all correlations of its item yields nothing. Such records are counted in
//! `PredictorCounters::late_records`. A correlation after the stat loses
//! nothing and is accepted silently.

use crate::error::{InferenceError, Result};
use crate::traits::GroupReducer;
use crate::transforms::{modify_correlation, predict_rating};
use records::{ItemId, ItemRecord, PredictedRating, PredictorSettings, TypeTag};
use serde::Serialize;
use std::ops::AddAssign;
use tracing::{debug, warn};

/// Where a group is in its ordered record sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GroupPhase {
    CollectingCorrelations,
    CollectingStat,
    Emitting,
}

impl From<TypeTag> for GroupPhase {
    fn from(tag: TypeTag) -> Self {
        match tag {
            TypeTag::Correlation => GroupPhase::CollectingCorrelations,
            TypeTag::Stat => GroupPhase::CollectingStat,
            TypeTag::Rating => GroupPhase::Emitting,
        }
    }
}

/// Counters of the prediction stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PredictorCounters {
    pub groups: u64,
    pub correlations: u64,
    pub stats: u64,
    pub ratings: u64,
    /// Ratings whose item had no correlation at the time
    pub ratings_without_correlations: u64,
    /// Rating x correlation pairs evaluated
    pub candidate_pairs: u64,
    pub predictions: u64,
    /// Predictions dropped for being zero or negative
    pub non_positive: u64,
    /// Correlation or stat records delivered after ratings had been emitted
    pub late_records: u64,
}

impl AddAssign for PredictorCounters {
    fn add_assign(&mut self, other: Self) {
        self.groups += other.groups;
        self.correlations += other.correlations;
        self.stats += other.stats;
        self.ratings += other.ratings;
        self.ratings_without_correlations += other.ratings_without_correlations;
        self.candidate_pairs += other.candidate_pairs;
        self.predictions += other.predictions;
        self.non_positive += other.non_positive;
        self.late_records += other.late_records;
    }
}

#[derive(Debug, Clone)]
struct CorrelatedItem {
    item_id: ItemId,
    /// Correlation after the modifier transform
    correlation: i64,
    weight: i64,
}

/// Accumulator for one item group.
///
/// Created fresh for every group and dropped at its end.
#[derive(Debug)]
pub struct ItemGroup<'a> {
    item_id: &'a str,
    settings: &'a PredictorSettings,
    phase: GroupPhase,
    correlations: Vec<CorrelatedItem>,
    std_dev: Option<i64>,
    counters: PredictorCounters,
}

impl<'a> ItemGroup<'a> {
    pub fn new(item_id: &'a str, settings: &'a PredictorSettings) -> Self {
        Self {
            item_id,
            settings,
            phase: GroupPhase::CollectingCorrelations,
            correlations: Vec::new(),
            std_dev: None,
            counters: PredictorCounters {
                groups: 1,
                ..Default::default()
            },
        }
    }

    pub fn phase(&self) -> GroupPhase {
        self.phase
    }

    /// Feed the next record of the group, appending any predictions to `out`.
    pub fn accept(&mut self, record: &ItemRecord, out: &mut Vec<PredictedRating>) -> Result<()> {
        let next = GroupPhase::from(record.type_tag());
        if next >= self.phase {
            self.phase = next;
        } else if self.phase == GroupPhase::Emitting {
            self.counters.late_records += 1;
            warn!(
                item_id = self.item_id,
                record = ?record.type_tag(),
                "record out of order; earlier ratings of this item did not use it"
            );
        }

        match record {
            ItemRecord::Correlation {
                other_item,
                correlation,
                weight,
            } => {
                self.counters.correlations += 1;
                self.correlations.push(CorrelatedItem {
                    item_id: other_item.clone(),
                    correlation: modify_correlation(
                        *correlation,
                        self.settings.correlation_scale,
                        self.settings.correlation_modifier,
                    ),
                    weight: *weight,
                });
            }
            ItemRecord::Stat { std_dev } => {
                self.counters.stats += 1;
                self.std_dev = Some(*std_dev);
            }
            ItemRecord::Rating { user_id, rating } => return self.emit(user_id, *rating, out),
        }
        Ok(())
    }

    fn emit(&mut self, user_id: &str, rating: i64, out: &mut Vec<PredictedRating>) -> Result<()> {
        self.counters.ratings += 1;
        if self.correlations.is_empty() {
            self.counters.ratings_without_correlations += 1;
            return Ok(());
        }

        for corr in &self.correlations {
            self.counters.candidate_pairs += 1;
            let predicted = predict_rating(rating, corr.correlation, self.settings).ok_or_else(
                || InferenceError::Overflow {
                    key: format!("user {user_id}, item {}", self.item_id),
                    operation: "predicted rating",
                },
            )?;
            if predicted <= 0 {
                self.counters.non_positive += 1;
                continue;
            }
            self.counters.predictions += 1;
            out.push(PredictedRating {
                user_id: user_id.to_string(),
                item_id: corr.item_id.clone(),
                predicted_rating: predicted,
                weight: corr.weight,
                correlation: corr.correlation,
                input_std_dev: self.std_dev,
            });
        }
        Ok(())
    }

    /// Close the group and hand back its counters.
    pub fn finish(self) -> PredictorCounters {
        debug!(
            item_id = self.item_id,
            correlations = self.counters.correlations,
            ratings = self.counters.ratings,
            predictions = self.counters.predictions,
            "item group done"
        );
        self.counters
    }
}

/// Predicts ratings for every user and item correlated with a rated item
#[derive(Debug, Clone, Default)]
pub struct RatingPredictor {
    settings: PredictorSettings,
}

impl RatingPredictor {
    pub fn new(settings: PredictorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PredictorSettings {
        &self.settings
    }

    /// Predict over one item's records given in delivery order.
    pub fn predict_group(
        &self,
        item_id: &str,
        records: &[ItemRecord],
    ) -> Result<(Vec<PredictedRating>, PredictorCounters)> {
        let mut group = ItemGroup::new(item_id, &self.settings);
        let mut out = Vec::new();
        for record in records {
            group.accept(record, &mut out)?;
        }
        Ok((out, group.finish()))
    }
}

impl GroupReducer for RatingPredictor {
    type Key = ItemId;
    type Input = ItemRecord;
    type Output = PredictedRating;
    type Counters = PredictorCounters;

    fn name(&self) -> &str {
        "RatingPredictor"
    }

    fn reduce(
        &self,
        key: &ItemId,
        records: &[ItemRecord],
        counters: &mut PredictorCounters,
    ) -> Result<Vec<PredictedRating>> {
        let (out, group_counters) = self.predict_group(key, records)?;
        *counters += group_counters;
        Ok(out)
    }
}
