//! Record classifier: first half of the prediction stage.
//!
//! Turns raw rating, stat and correlation rows into records keyed by item.
//! Every record's secondary key is its `TypeTag`, so once grouped the
//! predictor sees an item's correlations and stat before its ratings.

use crate::error::Result;
use records::parser::{self, LineRef};
use records::{
    Delimiters, GroupedRecord, ItemCorrelation, ItemRatingStat, ItemRecord, JobConfig,
    RatingLayout, SourceKind, UserRating,
};

/// Classifies input rows for the rating predictor
#[derive(Debug, Clone)]
pub struct RecordClassifier {
    delimiters: Delimiters,
    layout: RatingLayout,
    linear_correlation: bool,
}

impl RecordClassifier {
    pub fn new(config: &JobConfig) -> Self {
        Self {
            delimiters: config.delimiters.clone(),
            layout: config.rating_layout,
            linear_correlation: config.correlation_linear,
        }
    }

    /// Classify one raw line of the given source.
    pub fn classify_line(
        &self,
        kind: SourceKind,
        line: &str,
        at: LineRef<'_>,
    ) -> Result<Vec<GroupedRecord>> {
        let records: Vec<GroupedRecord> = match kind {
            SourceKind::Ratings => {
                parser::parse_rating_line(line, &self.delimiters, self.layout, at)?
                    .into_iter()
                    .map(|rating| self.classify_rating(rating))
                    .collect()
            }
            SourceKind::Stats => {
                let stat = parser::parse_stat_line(line, &self.delimiters, at)?;
                vec![self.classify_stat(stat)]
            }
            SourceKind::Correlations => {
                let corr = parser::parse_correlation_line(line, &self.delimiters, at)?;
                self.classify_correlation(&corr).into()
            }
        };
        Ok(records)
    }

    pub fn classify_rating(&self, rating: UserRating) -> GroupedRecord {
        GroupedRecord::new(
            rating.item_id,
            ItemRecord::Rating {
                user_id: rating.user_id,
                rating: rating.rating,
            },
        )
    }

    pub fn classify_stat(&self, stat: ItemRatingStat) -> GroupedRecord {
        GroupedRecord::new(stat.item_id, ItemRecord::Stat { std_dev: stat.std_dev })
    }

    /// Fan a correlation out to both of its items.
    ///
    /// Distance-like correlations are negated so larger always means more
    /// similar downstream.
    pub fn classify_correlation(&self, corr: &ItemCorrelation) -> [GroupedRecord; 2] {
        let correlation = if self.linear_correlation {
            corr.correlation
        } else {
            corr.correlation.saturating_neg()
        };
        let keyed = |corr: ItemCorrelation| {
            GroupedRecord::new(
                corr.item_a,
                ItemRecord::Correlation {
                    other_item: corr.item_b,
                    correlation,
                    weight: corr.weight,
                },
            )
        };
        [keyed(corr.clone()), keyed(corr.mirrored())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use records::TypeTag;

    fn at() -> LineRef<'static> {
        LineRef::new("test", 1)
    }

    #[test]
    fn test_rating_line_fans_out_per_item() {
        let classifier = RecordClassifier::new(&JobConfig::default());
        let records = classifier
            .classify_line(SourceKind::Ratings, "u1,a:40,b:60", at())
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].item_id, "a");
        assert_eq!(records[0].type_tag(), TypeTag::Rating);
        assert_eq!(
            records[1].record,
            ItemRecord::Rating {
                user_id: "u1".to_string(),
                rating: 60
            }
        );
    }

    #[test]
    fn test_stat_line() {
        let classifier = RecordClassifier::new(&JobConfig::default());
        let records = classifier
            .classify_line(SourceKind::Stats, "a,70,12", at())
            .unwrap();
        assert_eq!(records, vec![GroupedRecord::new("a", ItemRecord::Stat { std_dev: 12 })]);
    }

    #[test]
    fn test_correlation_emitted_in_both_directions() {
        let classifier = RecordClassifier::new(&JobConfig::default());
        let records = classifier
            .classify_line(SourceKind::Correlations, "a,b,500,10", at())
            .unwrap();

        assert_eq!(
            records,
            vec![
                GroupedRecord::new(
                    "a",
                    ItemRecord::Correlation {
                        other_item: "b".to_string(),
                        correlation: 500,
                        weight: 10
                    }
                ),
                GroupedRecord::new(
                    "b",
                    ItemRecord::Correlation {
                        other_item: "a".to_string(),
                        correlation: 500,
                        weight: 10
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_distance_correlation_is_negated() {
        let mut config = JobConfig::default();
        config.correlation_linear = false;
        let classifier = RecordClassifier::new(&config);

        let records = classifier
            .classify_line(SourceKind::Correlations, "a,b,300,4", at())
            .unwrap();
        for record in &records {
            assert!(matches!(
                record.record,
                ItemRecord::Correlation { correlation: -300, weight: 4, .. }
            ));
        }

        // Already negative input flips to positive rather than failing to parse.
        let records = classifier
            .classify_line(SourceKind::Correlations, "a,b,-300,4", at())
            .unwrap();
        assert!(matches!(
            records[0].record,
            ItemRecord::Correlation { correlation: 300, .. }
        ));
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        let classifier = RecordClassifier::new(&JobConfig::default());
        assert!(classifier
            .classify_line(SourceKind::Correlations, "a,b,500", at())
            .is_err());
        assert!(classifier
            .classify_line(SourceKind::Stats, "a,x,y", at())
            .is_err());
    }
}
