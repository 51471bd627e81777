//! Discrete resolution and scale tiers.
//!
//! Two selection algorithms live here and are easy to confuse:
//!
//! - [`ResolutionTable::nearest`] snaps a query to the closest server
//!   resolution (ground units per pixel).
//! - [`ScaleTable::best_scale`] rounds a query *up* to the smallest configured
//!   print scale that can hold it.
//!
//! Both tables are immutable once built and answer queries with a binary
//! search over pre-sorted values.

mod error;
mod resolution;
mod scale;

pub use error::TierError;
pub use resolution::{ResolutionTable, ResolutionTier};
pub use scale::{ScaleTable, SCALE_TOLERANCE};

/// Splits a tier list written as whitespace and/or comma separated numbers.
pub(crate) fn parse_values(text: &str) -> Result<Vec<f64>, TierError> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|_| TierError::Unparseable(token.to_string()))
        })
        .collect()
}

/// Validates raw tier values shared by both tables.
pub(crate) fn check_values(values: &[f64]) -> Result<(), TierError> {
    if values.is_empty() {
        return Err(TierError::Empty);
    }
    for &value in values {
        if !value.is_finite() {
            return Err(TierError::NotFinite(value));
        }
        if value <= 0.0 {
            return Err(TierError::NotPositive(value));
        }
    }
    Ok(())
}
