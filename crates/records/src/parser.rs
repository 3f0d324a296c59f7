//! Parsers for the delimited text records.
//!
//! Formats (default delimiters shown):
//! - rating file: `userID,itemID:rating,itemID:rating,...`
//! - stat file: `itemID,<ignored>,stdDev`
//! - correlation file: `itemA,itemB,correlation,weight`
//! - predictor output: `userID,itemID,predictedRating,weight,correlation,stdDevOrNegOne`
//!
//! A malformed line is an error; the caller decides whether the run dies.

use crate::config::{Delimiters, RatingLayout};
use crate::error::{RecordError, Result};
use crate::types::*;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Where a line came from, for error messages
#[derive(Debug, Clone, Copy)]
pub struct LineRef<'a> {
    pub file: &'a str,
    pub line: usize,
}

impl<'a> LineRef<'a> {
    pub fn new(file: &'a str, line: usize) -> Self {
        Self { file, line }
    }

    fn parse_error(&self, reason: impl Into<String>) -> RecordError {
        RecordError::Parse {
            file: self.file.to_string(),
            line: self.line,
            reason: reason.into(),
        }
    }

    fn field_count(&self, expected: usize, found: usize) -> RecordError {
        RecordError::FieldCount {
            file: self.file.to_string(),
            expected,
            found,
            line: self.line,
        }
    }

    fn int(&self, field: &'static str, value: &str) -> Result<i64> {
        value.trim().parse().map_err(|_| RecordError::InvalidNumber {
            file: self.file.to_string(),
            line: self.line,
            field,
            value: value.to_string(),
        })
    }

    fn id(&self, field: &str, value: &str) -> Result<String> {
        let value = value.trim();
        if value.is_empty() {
            return Err(self.parse_error(format!("Missing {field}")));
        }
        Ok(value.to_string())
    }
}

/// Read all lines of a file.
///
/// Returned lines keep their 1-based position; blank lines are dropped here
/// so every parser sees real records only. A line that is not valid UTF-8
/// is a parse error rather than being patched up, since a replaced byte
/// could merge two distinct ids.
pub fn read_lines(path: &Path) -> Result<Vec<(usize, String)>> {
    let mut file = File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mut lines = Vec::new();
    for (idx, raw) in bytes.split(|b| *b == b'\n').enumerate() {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line = std::str::from_utf8(raw).map_err(|e| {
            LineRef::new(&name, idx + 1).parse_error(format!("Invalid UTF-8: {e}"))
        })?;
        if !line.trim().is_empty() {
            lines.push((idx + 1, line.to_string()));
        }
    }
    Ok(lines)
}

fn split_exact<'l>(
    line: &'l str,
    delim: &str,
    expected: usize,
    at: LineRef<'_>,
) -> Result<Vec<&'l str>> {
    let fields: Vec<&str> = line.split(delim).collect();
    if fields.len() != expected {
        return Err(at.field_count(expected, fields.len()));
    }
    Ok(fields)
}

/// Parse one rating row into the ratings it carries.
///
/// A row with an owner but no pairs yields no ratings. Trailing empty
/// fields (`u1,a:40,`) are dropped; an empty field elsewhere is an error.
pub fn parse_rating_line(
    line: &str,
    delims: &Delimiters,
    layout: RatingLayout,
    at: LineRef<'_>,
) -> Result<Vec<UserRating>> {
    let mut fields: Vec<&str> = line.split(delims.field.as_str()).collect();
    while fields.len() > 1 && fields.last().is_some_and(|field| field.is_empty()) {
        fields.pop();
    }
    let (owner, pairs) = fields
        .split_first()
        .ok_or_else(|| at.parse_error("Missing row owner"))?;
    let owner = at.id("row owner", owner)?;

    let mut ratings = Vec::new();
    for pair in pairs {
        let mut parts = pair.split(delims.sub_field.as_str());
        let (other, value) = match (parts.next(), parts.next(), parts.next()) {
            (Some(other), Some(value), None) => (other, value),
            _ => {
                return Err(at.parse_error(format!(
                    "Expected id{}rating, got {pair:?}",
                    delims.sub_field
                )));
            }
        };
        let other = at.id("rating id", other)?;
        let rating = at.int("rating", value)?;

        let (user_id, item_id) = match layout {
            RatingLayout::UserMajor => (owner.clone(), other),
            RatingLayout::ItemMajor => (other, owner.clone()),
        };
        ratings.push(UserRating {
            user_id,
            item_id,
            rating,
        });
    }
    Ok(ratings)
}

/// Parse `itemID,<ignored>,stdDev`
pub fn parse_stat_line(line: &str, delims: &Delimiters, at: LineRef<'_>) -> Result<ItemRatingStat> {
    let fields = split_exact(line, &delims.field, 3, at)?;
    Ok(ItemRatingStat {
        item_id: at.id("itemID", fields[0])?,
        std_dev: at.int("stdDev", fields[2])?,
    })
}

/// Parse `itemA,itemB,correlation,weight`
pub fn parse_correlation_line(
    line: &str,
    delims: &Delimiters,
    at: LineRef<'_>,
) -> Result<ItemCorrelation> {
    let fields = split_exact(line, &delims.field, 4, at)?;
    Ok(ItemCorrelation {
        item_a: at.id("itemA", fields[0])?,
        item_b: at.id("itemB", fields[1])?,
        correlation: at.int("correlation", fields[2])?,
        weight: at.int("weight", fields[3])?,
    })
}

/// Parse one row written by the rating predictor.
///
/// Any negative std dev reads back as absent.
pub fn parse_predicted_rating(
    line: &str,
    delims: &Delimiters,
    at: LineRef<'_>,
) -> Result<PredictedRating> {
    let fields = split_exact(line, &delims.field, 6, at)?;
    let std_dev = at.int("stdDev", fields[5])?;
    Ok(PredictedRating {
        user_id: at.id("userID", fields[0])?,
        item_id: at.id("itemID", fields[1])?,
        predicted_rating: at.int("predictedRating", fields[2])?,
        weight: at.int("weight", fields[3])?,
        correlation: at.int("correlation", fields[4])?,
        input_std_dev: (std_dev >= 0).then_some(std_dev),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> LineRef<'static> {
        LineRef::new("test", 1)
    }

    #[test]
    fn test_rating_line_user_major() {
        let ratings =
            parse_rating_line("u1,i1:40,i2:80", &Delimiters::default(), RatingLayout::UserMajor, at())
                .unwrap();
        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings[0].user_id, "u1");
        assert_eq!(ratings[0].item_id, "i1");
        assert_eq!(ratings[0].rating, 40);
        assert_eq!(ratings[1].item_id, "i2");
        assert_eq!(ratings[1].rating, 80);
    }

    #[test]
    fn test_rating_line_item_major() {
        let ratings =
            parse_rating_line("i9,u1:40,u2:60", &Delimiters::default(), RatingLayout::ItemMajor, at())
                .unwrap();
        assert_eq!(ratings[0].item_id, "i9");
        assert_eq!(ratings[0].user_id, "u1");
        assert_eq!(ratings[1].user_id, "u2");
    }

    #[test]
    fn test_rating_line_without_pairs_is_empty() {
        let ratings =
            parse_rating_line("u1", &Delimiters::default(), RatingLayout::UserMajor, at()).unwrap();
        assert!(ratings.is_empty());
    }

    #[test]
    fn test_rating_line_trailing_delimiter() {
        let delims = Delimiters::default();
        let ratings = parse_rating_line("u1,a:40,", &delims, RatingLayout::UserMajor, at()).unwrap();
        assert_eq!(ratings.len(), 1);
        assert_eq!(ratings[0].rating, 40);

        let ratings = parse_rating_line("u1,,", &delims, RatingLayout::UserMajor, at()).unwrap();
        assert!(ratings.is_empty());

        // Only trailing empties are dropped.
        let err = parse_rating_line("u1,,a:40", &delims, RatingLayout::UserMajor, at()).unwrap_err();
        assert!(matches!(err, RecordError::Parse { .. }));
    }

    #[test]
    fn test_read_lines_rejects_invalid_utf8() {
        let dir = std::env::temp_dir().join(format!("records-parser-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let good = dir.join("corr-good.txt");
        std::fs::write(&good, b"a,b,500,10\r\n\n\xc3\xa9,b,1,1\n").unwrap();
        let lines = read_lines(&good).unwrap();
        assert_eq!(
            lines,
            vec![(1, "a,b,500,10".to_string()), (3, "\u{e9},b,1,1".to_string())]
        );

        let bad = dir.join("corr-bad.txt");
        std::fs::write(&bad, b"a,b,500,10\nx\xff,b,500,10\n").unwrap();
        let err = read_lines(&bad).unwrap_err();
        match err {
            RecordError::Parse { file, line, .. } => {
                assert_eq!(file, "corr-bad.txt");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rating_line_bad_pair() {
        let delims = Delimiters::default();
        let err = parse_rating_line("u1,i1", &delims, RatingLayout::UserMajor, at()).unwrap_err();
        assert!(matches!(err, RecordError::Parse { .. }));

        let err = parse_rating_line("u1,i1:x", &delims, RatingLayout::UserMajor, at()).unwrap_err();
        assert!(matches!(err, RecordError::InvalidNumber { field: "rating", .. }));
    }

    #[test]
    fn test_custom_delimiters() {
        let delims = Delimiters {
            field: "\t".to_string(),
            sub_field: "|".to_string(),
        };
        let ratings = parse_rating_line("u1\ti1|3", &delims, RatingLayout::UserMajor, at()).unwrap();
        assert_eq!(ratings[0].rating, 3);

        let corr = parse_correlation_line("a\tb\t-250\t4", &delims, at()).unwrap();
        assert_eq!(corr.correlation, -250);
    }

    #[test]
    fn test_stat_line() {
        let stat = parse_stat_line("i1,55,12", &Delimiters::default(), at()).unwrap();
        assert_eq!(stat.item_id, "i1");
        assert_eq!(stat.std_dev, 12);

        let err = parse_stat_line("i1,12", &Delimiters::default(), at()).unwrap_err();
        assert!(matches!(
            err,
            RecordError::FieldCount { expected: 3, found: 2, .. }
        ));
    }

    #[test]
    fn test_correlation_line() {
        let corr = parse_correlation_line("a, b, 500, 10", &Delimiters::default(), at()).unwrap();
        assert_eq!(corr.item_a, "a");
        assert_eq!(corr.item_b, "b");
        assert_eq!(corr.correlation, 500);
        assert_eq!(corr.weight, 10);

        let err = parse_correlation_line("a,b,5x0,10", &Delimiters::default(), at()).unwrap_err();
        assert!(matches!(
            err,
            RecordError::InvalidNumber { field: "correlation", .. }
        ));
    }

    #[test]
    fn test_predicted_rating_sentinel() {
        let delims = Delimiters::default();
        let pred = parse_predicted_rating("u1,b,200,10,500,-1", &delims, at()).unwrap();
        assert_eq!(pred.input_std_dev, None);
        assert_eq!(pred.to_row(","), "u1,b,200,10,500,-1");

        let pred = parse_predicted_rating("u1,b,200,10,500,9", &delims, at()).unwrap();
        assert_eq!(pred.input_std_dev, Some(9));
    }

    #[test]
    fn test_error_mentions_location() {
        let err = parse_stat_line("i1", &Delimiters::default(), LineRef::new("stat.txt", 7))
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("stat.txt"));
        assert!(message.contains("line 7"));
    }
}
