//! Stage runners.
//!
//! `PredictionJob` and `AggregationJob` feed records into a `LocalShuffle`
//! and reduce it on a pool sized by `num.reducer`. Input is accepted file by
//! file (source type from the file name) or record by record.

use crate::aggregator::{AggregatorCounters, RatingAggregator};
use crate::classifier::RecordClassifier;
use crate::error::Result;
use crate::predictor::{PredictorCounters, RatingPredictor};
use crate::shuffle::{LocalShuffle, StageReport};
use records::parser::{self, LineRef};
use records::{GroupedRecord, ItemId, ItemRecord, JobConfig, PredictedRating, UserId, UtilityScore};
use rayon::prelude::*;
use std::path::Path;
use tracing::{info, instrument};

pub type PredictionReport = StageReport<PredictedRating, PredictorCounters>;
pub type AggregationReport = StageReport<UtilityScore, AggregatorCounters>;

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Stage one: classify, group by item, predict
pub struct PredictionJob {
    config: JobConfig,
    classifier: RecordClassifier,
    shuffle: LocalShuffle<ItemId, ItemRecord>,
}

impl PredictionJob {
    /// Create a job; the configuration is validated here.
    pub fn new(config: JobConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            classifier: RecordClassifier::new(&config),
            config,
            shuffle: LocalShuffle::new(),
        })
    }

    /// Classify every line of a rating, stat or correlation file.
    ///
    /// Returns the number of grouped records added.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn add_file(&mut self, path: &Path) -> Result<usize> {
        let name = file_name(path);
        let kind = self.config.source_kind(&name);
        let lines = parser::read_lines(path)?;

        let classified: Vec<Vec<GroupedRecord>> = lines
            .par_iter()
            .map(|(line_no, line)| {
                self.classifier
                    .classify_line(kind, line, LineRef::new(&name, *line_no))
            })
            .collect::<Result<_>>()?;

        let mut added = 0;
        for record in classified.into_iter().flatten() {
            self.add_record(record);
            added += 1;
        }
        info!("Read {} {} lines from {} -> {} records", lines.len(), kind, name, added);
        Ok(added)
    }

    /// Add one already classified record.
    pub fn add_record(&mut self, record: GroupedRecord) {
        let tag = record.type_tag().ordinal();
        self.shuffle.push(record.item_id, tag, record.record);
    }

    pub fn pending(&self) -> usize {
        self.shuffle.len()
    }

    /// Group by item and predict.
    pub fn run(self) -> Result<PredictionReport> {
        let predictor = RatingPredictor::new(self.config.predictor());
        self.shuffle
            .run_with_threads(&predictor, self.config.num_reducer)
    }
}

/// Stage two: group predictions by user and item, aggregate
pub struct AggregationJob {
    config: JobConfig,
    shuffle: LocalShuffle<(UserId, ItemId), PredictedRating>,
}

impl AggregationJob {
    /// Create a job; the configuration is validated here.
    pub fn new(config: JobConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            shuffle: LocalShuffle::new(),
        })
    }

    /// Read a file of predictor output rows.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn add_file(&mut self, path: &Path) -> Result<usize> {
        let name = file_name(path);
        let lines = parser::read_lines(path)?;
        let delims = &self.config.delimiters;

        let predictions: Vec<PredictedRating> = lines
            .par_iter()
            .map(|(line_no, line)| {
                parser::parse_predicted_rating(line, delims, LineRef::new(&name, *line_no))
            })
            .collect::<records::Result<_>>()?;

        let added = predictions.len();
        self.extend(predictions);
        info!("Read {} predictions from {}", added, name);
        Ok(added)
    }

    pub fn add_prediction(&mut self, prediction: PredictedRating) {
        let key = (prediction.user_id.clone(), prediction.item_id.clone());
        self.shuffle.push(key, 0, prediction);
    }

    pub fn extend(&mut self, predictions: impl IntoIterator<Item = PredictedRating>) {
        for prediction in predictions {
            self.add_prediction(prediction);
        }
    }

    pub fn pending(&self) -> usize {
        self.shuffle.len()
    }

    /// Group by user and item and aggregate.
    pub fn run(self) -> Result<AggregationReport> {
        let aggregator = RatingAggregator::new(self.config.aggregator());
        self.shuffle
            .run_with_threads(&aggregator, self.config.num_reducer)
    }
}
