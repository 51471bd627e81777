//! Server resolution tiers and nearest-value selection.

use super::{check_values, parse_values, TierError};

/// One resolution advertised by a tile server.
///
/// `index` is the tier's position in the coarsest-first ordering, which is
/// the zoom level used in TileCache-style tile paths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolutionTier {
    /// Zoom level (0 = coarsest)
    pub index: usize,
    /// Ground units per pixel
    pub value: f64,
}

/// Immutable set of resolution tiers, sorted coarsest (largest) first.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionTable {
    tiers: Vec<ResolutionTier>,
}

impl ResolutionTable {
    /// Builds a table from raw values in any order.
    ///
    /// Duplicate values collapse into a single tier.
    pub fn new(values: impl IntoIterator<Item = f64>) -> Result<Self, TierError> {
        let mut values: Vec<f64> = values.into_iter().collect();
        check_values(&values)?;

        values.sort_by(|a, b| b.total_cmp(a));
        values.dedup();

        let tiers = values
            .into_iter()
            .enumerate()
            .map(|(index, value)| ResolutionTier { index, value })
            .collect();

        Ok(Self { tiers })
    }

    /// Parses a textual list such as the body of a TileCache `<Resolutions>` element.
    pub fn parse(text: &str) -> Result<Self, TierError> {
        Self::new(parse_values(text)?)
    }

    /// Returns the tier closest to `query`.
    ///
    /// Queries finer than every tier get the finest tier, queries coarser
    /// than every tier get the coarsest. When `query` sits exactly halfway
    /// between two tiers the finer one wins.
    pub fn nearest(&self, query: f64) -> ResolutionTier {
        // First tier whose value is not coarser than the query.
        let pos = self.tiers.partition_point(|tier| tier.value > query);

        if pos == 0 {
            return self.tiers[0];
        }
        if pos == self.tiers.len() {
            return self.tiers[pos - 1];
        }

        let coarser = self.tiers[pos - 1];
        let finer = self.tiers[pos];
        if query - finer.value <= coarser.value - query {
            finer
        } else {
            coarser
        }
    }

    /// All tiers, coarsest first.
    pub fn tiers(&self) -> &[ResolutionTier] {
        &self.tiers
    }

    /// Tier values, coarsest first.
    pub fn values(&self) -> Vec<f64> {
        self.tiers.iter().map(|tier| tier.value).collect()
    }

    /// Looks up a tier by zoom level.
    pub fn get(&self, index: usize) -> Option<ResolutionTier> {
        self.tiers.get(index).copied()
    }

    /// The largest resolution value.
    pub fn coarsest(&self) -> ResolutionTier {
        self.tiers[0]
    }

    /// The smallest resolution value.
    pub fn finest(&self) -> ResolutionTier {
        self.tiers[self.tiers.len() - 1]
    }

    /// Number of tiers.
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    /// Always false; construction rejects empty lists.
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}
