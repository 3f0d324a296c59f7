//! Value types flowing through the two inference stages.
//!
//! All ratings, correlations and scores are fixed-point `i64` integers.
//! The stages use checked arithmetic on them and report overflow as an
//! error.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Type Aliases
// =============================================================================

/// Opaque user identifier, exactly as it appears in the input files
pub type UserId = String;

/// Opaque item identifier, exactly as it appears in the input files
pub type ItemId = String;

/// Wire value written in place of a missing rating standard deviation
pub const STD_DEV_ABSENT: i64 = -1;

// =============================================================================
// Input Records
// =============================================================================

/// One rating a user gave to an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRating {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub rating: i64,
}

/// Correlation between two items, computed upstream.
///
/// `correlation` is scaled by the configured correlation scale and `weight`
/// is the number of users who rated both items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCorrelation {
    pub item_a: ItemId,
    pub item_b: ItemId,
    pub correlation: i64,
    pub weight: i64,
}

impl ItemCorrelation {
    /// The same correlation seen from `item_b`
    pub fn mirrored(&self) -> Self {
        Self {
            item_a: self.item_b.clone(),
            item_b: self.item_a.clone(),
            correlation: self.correlation,
            weight: self.weight,
        }
    }
}

/// Rating dispersion for one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRatingStat {
    pub item_id: ItemId,
    pub std_dev: i64,
}

/// Which logical input a file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    Ratings,
    Stats,
    Correlations,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::Ratings => "ratings",
            SourceKind::Stats => "stats",
            SourceKind::Correlations => "correlations",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Grouped Records
// =============================================================================

/// Secondary key of a stage-one record.
///
/// The discriminant order is the delivery order inside a group: every
/// correlation and stat for an item reaches the predictor before any rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    Correlation = 0,
    Stat = 1,
    Rating = 2,
}

impl TypeTag {
    /// Integer form used as the secondary sort key
    pub fn ordinal(self) -> u8 {
        self as u8
    }
}

/// Payload of one record in an item group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemRecord {
    /// Another item correlated with the group's item
    Correlation {
        other_item: ItemId,
        correlation: i64,
        weight: i64,
    },
    /// Standard deviation of the group's item ratings
    Stat { std_dev: i64 },
    /// A user's rating of the group's item
    Rating { user_id: UserId, rating: i64 },
}

impl ItemRecord {
    /// The ordering discriminant, derived from the variant
    pub fn type_tag(&self) -> TypeTag {
        match self {
            ItemRecord::Correlation { .. } => TypeTag::Correlation,
            ItemRecord::Stat { .. } => TypeTag::Stat,
            ItemRecord::Rating { .. } => TypeTag::Rating,
        }
    }
}

/// A classified record keyed by the item it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedRecord {
    pub item_id: ItemId,
    pub record: ItemRecord,
}

impl GroupedRecord {
    pub fn new(item_id: impl Into<ItemId>, record: ItemRecord) -> Self {
        Self {
            item_id: item_id.into(),
            record,
        }
    }

    pub fn type_tag(&self) -> TypeTag {
        self.record.type_tag()
    }
}

// =============================================================================
// Stage Outputs
// =============================================================================

/// A rating predicted for a user on an item, from one correlated item the
/// user already rated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictedRating {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub predicted_rating: i64,
    /// Number of users behind the correlation
    pub weight: i64,
    /// Correlation after the modifier transform
    pub correlation: i64,
    /// Std dev of the source item's ratings, if a stat record existed
    pub input_std_dev: Option<i64>,
}

impl PredictedRating {
    /// `userID,itemID,predictedRating,weight,correlationCoeff,stdDevOrNegOne`
    pub fn to_row(&self, delim: &str) -> String {
        format!(
            "{user}{d}{item}{d}{rating}{d}{weight}{d}{corr}{d}{std_dev}",
            user = self.user_id,
            item = self.item_id,
            rating = self.predicted_rating,
            weight = self.weight,
            corr = self.correlation,
            std_dev = self.input_std_dev.unwrap_or(STD_DEV_ABSENT),
            d = delim,
        )
    }
}

/// Final fused score for a user and item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtilityScore {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub score: i64,
    /// Number of predictions folded into the score
    pub support_count: usize,
}

impl UtilityScore {
    /// `userID,itemID,utilityScore,count`
    pub fn to_row(&self, delim: &str) -> String {
        format!(
            "{}{d}{}{d}{}{d}{}",
            self.user_id,
            self.item_id,
            self.score,
            self.support_count,
            d = delim
        )
    }
}
