//! Numeric transforms shared by the predictor and the aggregator.
//!
//! All values are fixed-point integers; integer division truncates toward
//! zero.

use records::PredictorSettings;

/// Reshape a scaled correlation: `round(scale * (corr / scale) ^ exponent)`.
///
/// An exponent of 1 returns the input untouched. Integral exponents are
/// applied to the signed ratio. For a non-integral exponent a negative
/// ratio has no real power, so the exponent is applied to its magnitude
/// and the sign is put back.
pub fn modify_correlation(correlation: i64, scale: i64, exponent: f64) -> i64 {
    if exponent == 1.0 {
        return correlation;
    }
    let ratio = correlation as f64 / scale as f64;
    let shaped = if exponent.fract() == 0.0 {
        ratio.powi(exponent as i32)
    } else {
        ratio.signum() * ratio.abs().powf(exponent)
    };
    (shaped * scale as f64).round() as i64
}

/// Predict a rating on a correlated item from the rating of the source item.
///
/// Linear correlations scale the rating: `rating * corr / maxRating`.
/// Distance-like correlations (already negated) shift it:
/// `(rating * scale + corr) / maxRating`.
///
/// Returns `None` when an intermediate product or sum leaves the `i64` range.
pub fn predict_rating(rating: i64, correlation: i64, settings: &PredictorSettings) -> Option<i64> {
    let numerator = if settings.linear_correlation {
        rating.checked_mul(correlation)?
    } else {
        rating
            .checked_mul(settings.correlation_scale)?
            .checked_add(correlation)?
    };
    numerator.checked_div(settings.max_rating)
}

/// Weight that grows as the input rating dispersion shrinks, never below 1.
pub fn inv_norm_std_dev(std_dev: i64, max_rating: i64) -> i64 {
    (max_rating / 4 - std_dev).max(1)
}

/// Median of the values; the two middle values of an even count are
/// averaged with integer division.
pub fn median(values: &mut [i64]) -> Option<i64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        // Widened so the sum of two large ratings cannot wrap.
        let sum = i128::from(values[mid - 1]) + i128::from(values[mid]);
        Some((sum / 2) as i64)
    }
}
