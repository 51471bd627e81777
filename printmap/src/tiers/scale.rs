//! Print scale tiers and smallest-at-least selection.

use super::{check_values, parse_values, TierError};

/// Relative tolerance applied when rounding a requested scale up.
///
/// A query that exceeds a configured scale by less than this fraction still
/// selects that scale, so `25000.1` keeps `1:25000` instead of jumping to the
/// next tier. Float noise from map extent arithmetic would otherwise push
/// exact scales one tier up.
pub const SCALE_TOLERANCE: f64 = 1e-5;

/// Immutable set of print scale denominators, sorted smallest first.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleTable {
    scales: Vec<f64>,
}

impl ScaleTable {
    /// Builds a table from raw scale denominators in any order.
    pub fn new(values: impl IntoIterator<Item = f64>) -> Result<Self, TierError> {
        let mut scales: Vec<f64> = values.into_iter().collect();
        check_values(&scales)?;

        scales.sort_by(f64::total_cmp);
        scales.dedup();

        Ok(Self { scales })
    }

    /// Parses a comma or whitespace separated list of scale denominators.
    pub fn parse(text: &str) -> Result<Self, TierError> {
        Self::new(parse_values(text)?)
    }

    /// Returns the smallest configured scale that can hold `query`.
    ///
    /// Falls back to the largest scale when `query` exceeds every tier.
    pub fn best_scale(&self, query: f64) -> f64 {
        let pos = self
            .scales
            .partition_point(|&scale| scale * (1.0 + SCALE_TOLERANCE) < query);

        match self.scales.get(pos) {
            Some(&scale) => scale,
            None => self.largest(),
        }
    }

    /// Scales, smallest first.
    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    /// Whether `scale` is one of the configured tiers.
    pub fn contains(&self, scale: f64) -> bool {
        self.scales
            .binary_search_by(|probe| probe.total_cmp(&scale))
            .is_ok()
    }

    pub fn smallest(&self) -> f64 {
        self.scales[0]
    }

    pub fn largest(&self) -> f64 {
        self.scales[self.scales.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.scales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scales.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_table() -> ScaleTable {
        ScaleTable::new([200000.0, 25000.0, 50000.0, 100000.0]).unwrap()
    }

    #[test]
    fn test_best_scale_reference_queries() {
        let table = reference_table();

        // Too small: pick the smallest available
        assert_eq!(table.best_scale(1.0), 25000.0);
        // Exact match
        assert_eq!(table.best_scale(25000.0), 25000.0);
        // Just too big: still the previous one
        assert_eq!(table.best_scale(25000.1), 25000.0);
        assert_eq!(table.best_scale(150000.0), 200000.0);
        assert_eq!(table.best_scale(199999.9), 200000.0);
        // Too big: pick the largest available
        assert_eq!(table.best_scale(99999999999.0), 200000.0);
    }

    #[test]
    fn test_tolerance_boundary() {
        let table = reference_table();
        let inside = 25000.0 * (1.0 + SCALE_TOLERANCE * 0.5);
        let outside = 25000.0 * (1.0 + SCALE_TOLERANCE * 2.0);

        assert_eq!(table.best_scale(inside), 25000.0);
        assert_eq!(table.best_scale(outside), 50000.0);
    }

    #[test]
    fn test_rounds_up_rather_than_nearest() {
        let table = reference_table();
        // 51000 is much closer to 50000 than 100000, but must round up.
        assert_eq!(table.best_scale(51000.0), 100000.0);
    }

    #[test]
    fn test_sorted_and_queried() {
        let table = ScaleTable::parse("100000, 25000 50000").unwrap();
        assert_eq!(table.scales(), &[25000.0, 50000.0, 100000.0]);
        assert_eq!(table.smallest(), 25000.0);
        assert_eq!(table.largest(), 100000.0);
        assert!(table.contains(50000.0));
        assert!(!table.contains(60000.0));
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(ScaleTable::parse(" , "), Err(TierError::Empty));
    }
}
