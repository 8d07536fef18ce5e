//! Errors raised while mutating positions.
//!
//! Every variant is raised before any field is touched, so a rejected call
//! leaves the position exactly as it was.

use crate::domain::AssetId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PositionError {
    /// Exit levels on the wrong side of the cost basis, negative or non-finite
    /// prices, or levels attached to a flat position.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// Zero/dust quantity, non-finite price or cost.
    #[error("invalid fill: {reason}")]
    InvalidFill { reason: String },

    #[error("invalid mark price {price}: must be finite and non-negative")]
    InvalidMark { price: f64 },

    #[error("asset mismatch: position holds {expected}, got {actual}")]
    AssetMismatch { expected: AssetId, actual: AssetId },

    #[error("invalid corporate action: {reason}")]
    InvalidCorporateAction { reason: String },
}

impl PositionError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    pub(crate) fn fill(reason: impl Into<String>) -> Self {
        Self::InvalidFill {
            reason: reason.into(),
        }
    }
}
