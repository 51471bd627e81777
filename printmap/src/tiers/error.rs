//! Errors raised while building tier tables.

use thiserror::Error;

/// A tier list that cannot be turned into a table.
///
/// These are configuration errors: they surface when a configuration or a
/// capabilities document is loaded, never while fetching.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TierError {
    /// No tiers were supplied
    #[error("tier list is empty")]
    Empty,

    /// A tier is NaN or infinite
    #[error("tier value {0} is not finite")]
    NotFinite(f64),

    /// A tier is zero or negative
    #[error("tier value {0} must be positive")]
    NotPositive(f64),

    /// A token in a textual tier list is not a number
    #[error("cannot parse tier value '{0}'")]
    Unparseable(String),
}
