//! Transaction-cost models, consumed as pluggable functions.
//!
//! A model maps `(asset, signed quantity, price)` to the total cost of a
//! trade. Costs are always charged on the absolute quantity.

use crate::domain::AssetId;

pub trait CostModel: Send + Sync {
    fn cost(&self, asset: &AssetId, quantity: f64, price: f64) -> f64;
}

impl<F> CostModel for F
where
    F: Fn(&AssetId, f64, f64) -> f64 + Send + Sync,
{
    fn cost(&self, asset: &AssetId, quantity: f64, price: f64) -> f64 {
        self(asset, quantity, price)
    }
}

/// Frictionless execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCost;

impl CostModel for NoCost {
    fn cost(&self, _asset: &AssetId, _quantity: f64, _price: f64) -> f64 {
        0.0
    }
}

/// Fixed amount per share with a per-trade minimum.
#[derive(Debug, Clone, Copy)]
pub struct PerShare {
    pub amount: f64,
    pub minimum: f64,
}

impl CostModel for PerShare {
    fn cost(&self, _asset: &AssetId, quantity: f64, _price: f64) -> f64 {
        (quantity.abs() * self.amount).max(self.minimum)
    }
}

/// Flat fee per trade regardless of size.
#[derive(Debug, Clone, Copy)]
pub struct PerTrade {
    pub amount: f64,
}

impl CostModel for PerTrade {
    fn cost(&self, _asset: &AssetId, _quantity: f64, _price: f64) -> f64 {
        self.amount
    }
}

/// Basis points of traded notional.
#[derive(Debug, Clone, Copy)]
pub struct Bps {
    pub bps: f64,
}

impl CostModel for Bps {
    fn cost(&self, _asset: &AssetId, quantity: f64, price: f64) -> f64 {
        quantity.abs() * price * self.bps / 10_000.0
    }
}
