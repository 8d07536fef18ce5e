use super::ids::AssetId;
use super::position::ExitLevels;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An executed trade against one asset.
///
/// `quantity` is signed: positive buys, negative sells. `cost` is the total
/// transaction cost of the trade (commission plus fees), not per unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub asset: AssetId,
    pub quantity: f64,
    pub price: f64,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Exit levels to attach to the resulting position, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_levels: Option<ExitLevels>,
}

impl Fill {
    pub fn new(asset: impl Into<AssetId>, quantity: f64, price: f64) -> Self {
        Self {
            asset: asset.into(),
            quantity,
            price,
            cost: 0.0,
            timestamp: None,
            exit_levels: None,
        }
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_exit_levels(mut self, levels: ExitLevels) -> Self {
        self.exit_levels = Some(levels);
        self
    }

    /// Signed cash flow of the trade, costs included (buys are negative).
    pub fn net_cash(&self) -> f64 {
        -(self.quantity * self.price) - self.cost
    }
}
