//! Job configuration.
//!
//! Options are dotted keys (`field.delim`, `max.rating`, ...). Values come
//! from built-in defaults, then an optional TOML file, then `key=value`
//! overrides. Once loaded the configuration is read-only for the whole run.

use crate::error::{RecordError, Result};
use crate::types::SourceKind;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

/// Every option `JobConfig::set` accepts
pub const KNOWN_KEYS: &[&str] = &[
    "field.delim",
    "sub.field.delim",
    "rating.file.prefix",
    "rating.stat.file.prefix",
    "rating.file.layout",
    "correlation.linear",
    "correlation.linear.scale",
    "correlation.scale",
    "correlation.modifier",
    "max.rating",
    "corr.length.weighted.average",
    "input.rating.stdDev.weighted.average",
    "rating.aggregator.average",
    "num.reducer",
];

/// Field and sub-field separators of the text records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pub field: String,
    pub sub_field: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            field: ",".to_string(),
            sub_field: ":".to_string(),
        }
    }
}

/// Row shape of the rating file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RatingLayout {
    /// `userID,itemID:rating,itemID:rating,...`
    #[default]
    UserMajor,
    /// `itemID,userID:rating,userID:rating,...`
    ItemMajor,
}

impl FromStr for RatingLayout {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user-major" => Ok(RatingLayout::UserMajor),
            "item-major" => Ok(RatingLayout::ItemMajor),
            other => Err(format!(
                "expected \"user-major\" or \"item-major\", got {other:?}"
            )),
        }
    }
}

/// How the aggregator folds the predictions of one user and item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationPolicy {
    /// Average weighted by the co-rating support count
    CorrelationLengthWeighted,
    /// Average weighted by inverse input rating std dev
    StdDevWeighted,
    /// Unweighted average
    Plain,
    /// Median of the predicted ratings
    Median,
}

impl AggregationPolicy {
    /// Resolve the three option flags, first enabled weighting wins.
    pub fn resolve(average: bool, corr_length_weighted: bool, std_dev_weighted: bool) -> Self {
        if !average {
            AggregationPolicy::Median
        } else if corr_length_weighted {
            AggregationPolicy::CorrelationLengthWeighted
        } else if std_dev_weighted {
            AggregationPolicy::StdDevWeighted
        } else {
            AggregationPolicy::Plain
        }
    }
}

/// Read-only settings of the rating predictor
#[derive(Debug, Clone, PartialEq)]
pub struct PredictorSettings {
    pub linear_correlation: bool,
    pub correlation_scale: i64,
    pub correlation_modifier: f64,
    pub max_rating: i64,
}

impl Default for PredictorSettings {
    fn default() -> Self {
        JobConfig::default().predictor()
    }
}

/// Read-only settings of the rating aggregator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorSettings {
    pub policy: AggregationPolicy,
    pub correlation_scale: i64,
    pub max_rating: i64,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        JobConfig::default().aggregator()
    }
}

/// All options of a prediction/aggregation run
#[derive(Debug, Clone, PartialEq)]
pub struct JobConfig {
    pub delimiters: Delimiters,
    pub rating_file_prefix: String,
    pub rating_stat_file_prefix: String,
    pub rating_layout: RatingLayout,
    pub correlation_linear: bool,
    /// Correlation scale used by the predictor
    pub correlation_linear_scale: i64,
    /// Correlation scale used by the aggregator
    pub correlation_scale: i64,
    pub correlation_modifier: f64,
    pub max_rating: i64,
    pub corr_length_weighted_average: bool,
    pub input_rating_std_dev_weighted_average: bool,
    pub rating_aggregator_average: bool,
    /// Parallelism hint for the grouped reduction
    pub num_reducer: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            delimiters: Delimiters::default(),
            rating_file_prefix: "rating".to_string(),
            rating_stat_file_prefix: "stat".to_string(),
            rating_layout: RatingLayout::UserMajor,
            correlation_linear: true,
            correlation_linear_scale: 1000,
            correlation_scale: 1000,
            correlation_modifier: 1.0,
            max_rating: 100,
            corr_length_weighted_average: true,
            input_rating_std_dev_weighted_average: true,
            rating_aggregator_average: true,
            num_reducer: 1,
        }
    }
}

impl JobConfig {
    /// Load defaults overlaid with a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let mut config = Self::default();
        config.merge_toml(&contents)?;
        Ok(config)
    }

    /// Overlay the options of a TOML document.
    ///
    /// Nested tables flatten to dotted keys, so `[correlation] linear = false`
    /// and `"correlation.linear" = false` set the same option.
    pub fn merge_toml(&mut self, contents: &str) -> Result<()> {
        let table: toml::Table = contents.parse()?;
        let mut flat = Vec::new();
        flatten_table("", &table, &mut flat)?;
        for (key, value) in flat {
            self.set(&key, &value)?;
        }
        Ok(())
    }

    /// Apply one `key=value` override.
    pub fn apply_override(&mut self, assignment: &str) -> Result<()> {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| RecordError::Config {
                key: assignment.to_string(),
                reason: "expected key=value".to_string(),
            })?;
        // Only spaces are stripped so that a tab delimiter survives.
        self.set(key.trim(), value.trim_matches(' '))
    }

    /// Set one option from its textual value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        debug!(key, value, "config option");
        match key {
            "field.delim" => self.delimiters.field = parse_delim(key, value)?,
            "sub.field.delim" => self.delimiters.sub_field = parse_delim(key, value)?,
            "rating.file.prefix" => self.rating_file_prefix = value.to_string(),
            "rating.stat.file.prefix" => self.rating_stat_file_prefix = value.to_string(),
            "rating.file.layout" => {
                self.rating_layout = value.parse().map_err(|reason| RecordError::Config {
                    key: key.to_string(),
                    reason,
                })?
            }
            "correlation.linear" => self.correlation_linear = parse_bool(key, value)?,
            "correlation.linear.scale" => self.correlation_linear_scale = parse_num(key, value)?,
            "correlation.scale" => self.correlation_scale = parse_num(key, value)?,
            "correlation.modifier" => self.correlation_modifier = parse_num(key, value)?,
            "max.rating" => self.max_rating = parse_num(key, value)?,
            "corr.length.weighted.average" => {
                self.corr_length_weighted_average = parse_bool(key, value)?
            }
            "input.rating.stdDev.weighted.average" => {
                self.input_rating_std_dev_weighted_average = parse_bool(key, value)?
            }
            "rating.aggregator.average" => self.rating_aggregator_average = parse_bool(key, value)?,
            "num.reducer" => self.num_reducer = parse_num(key, value)?,
            _ => {
                return Err(RecordError::Config {
                    key: key.to_string(),
                    reason: format!("unknown option, expected one of {}", KNOWN_KEYS.join(", ")),
                });
            }
        }
        Ok(())
    }

    /// Reject values the stages cannot work with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("correlation.linear.scale", self.correlation_linear_scale),
            ("correlation.scale", self.correlation_scale),
            ("max.rating", self.max_rating),
        ];
        for (key, value) in positive {
            if value <= 0 {
                return Err(RecordError::Config {
                    key: key.to_string(),
                    reason: format!("must be positive, got {value}"),
                });
            }
        }
        if self.num_reducer == 0 {
            return Err(RecordError::Config {
                key: "num.reducer".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.correlation_modifier.is_finite() {
            return Err(RecordError::Config {
                key: "correlation.modifier".to_string(),
                reason: format!("must be finite, got {}", self.correlation_modifier),
            });
        }
        if self.correlation_modifier.fract() != 0.0 {
            warn!(
                modifier = self.correlation_modifier,
                "non-integral correlation modifier is applied to the correlation magnitude; \
                 negative correlations keep their sign"
            );
        }
        Ok(())
    }

    /// Decide which input a file holds from its file name.
    ///
    /// The rating prefix is checked first; anything matching neither prefix
    /// is a correlation file.
    pub fn source_kind(&self, file_name: &str) -> SourceKind {
        if file_name.starts_with(&self.rating_file_prefix) {
            SourceKind::Ratings
        } else if file_name.starts_with(&self.rating_stat_file_prefix) {
            SourceKind::Stats
        } else {
            SourceKind::Correlations
        }
    }

    pub fn predictor(&self) -> PredictorSettings {
        PredictorSettings {
            linear_correlation: self.correlation_linear,
            correlation_scale: self.correlation_linear_scale,
            correlation_modifier: self.correlation_modifier,
            max_rating: self.max_rating,
        }
    }

    pub fn aggregator(&self) -> AggregatorSettings {
        AggregatorSettings {
            policy: AggregationPolicy::resolve(
                self.rating_aggregator_average,
                self.corr_length_weighted_average,
                self.input_rating_std_dev_weighted_average,
            ),
            correlation_scale: self.correlation_scale,
            max_rating: self.max_rating,
        }
    }
}

fn flatten_table(prefix: &str, table: &toml::Table, out: &mut Vec<(String, String)>) -> Result<()> {
    for (name, value) in table {
        let key = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        let text = match value {
            toml::Value::Table(inner) => {
                flatten_table(&key, inner, out)?;
                continue;
            }
            toml::Value::String(s) => s.clone(),
            toml::Value::Integer(i) => i.to_string(),
            toml::Value::Float(f) => f.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            other => {
                return Err(RecordError::Config {
                    key,
                    reason: format!("unsupported value {other}"),
                });
            }
        };
        out.push((key, text));
    }
    Ok(())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(RecordError::Config {
            key: key.to_string(),
            reason: format!("expected true or false, got {value:?}"),
        }),
    }
}

fn parse_num<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e| RecordError::Config {
        key: key.to_string(),
        reason: format!("{value:?}: {e}"),
    })
}

fn parse_delim(key: &str, value: &str) -> Result<String> {
    if value.is_empty() {
        return Err(RecordError::Config {
            key: key.to_string(),
            reason: "delimiter must not be empty".to_string(),
        });
    }
    Ok(value.to_string())
}
