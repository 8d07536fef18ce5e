use super::ids::AssetId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Direction to move a price that falls between ticks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TickPolicy {
    RoundNearest,
    RoundDown,
    RoundUp,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Equity,
    Future,
    Forex,
    Crypto,
}

/// Instrument metadata the tracker consumes: tick size and contract multiplier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instrument {
    pub asset: AssetId,
    pub tick_size: f64,
    pub asset_class: AssetClass,
    /// Contract multiplier. 1.0 for everything except futures.
    #[serde(default = "default_multiplier")]
    pub price_multiplier: f64,
}

fn default_multiplier() -> f64 {
    1.0
}

impl Instrument {
    pub fn new(asset: AssetId, tick_size: f64, asset_class: AssetClass) -> Self {
        Self {
            asset,
            tick_size,
            asset_class,
            price_multiplier: 1.0,
        }
    }

    /// Penny ticks.
    pub fn us_equity(asset: impl Into<AssetId>) -> Self {
        Self::new(asset.into(), 0.01, AssetClass::Equity)
    }

    pub fn with_price_multiplier(mut self, multiplier: f64) -> Self {
        self.price_multiplier = multiplier;
        self
    }

    pub fn is_future(&self) -> bool {
        self.asset_class == AssetClass::Future
    }

    /// Move `price` onto the tick grid. Already-aligned prices are unchanged
    /// under every policy.
    pub fn round_price(&self, price: f64, policy: TickPolicy) -> f64 {
        if self.tick_size <= 0.0 {
            return price;
        }
        let ticks = snap(price / self.tick_size);
        let rounded_ticks = match policy {
            TickPolicy::RoundNearest => ticks.round(),
            TickPolicy::RoundDown => ticks.floor(),
            TickPolicy::RoundUp => ticks.ceil(),
        };
        rounded_ticks * self.tick_size
    }
}

/// Pull values that are a hair away from an integer back onto it, so that
/// `100.13 / 0.01` rounds up to 10013 ticks rather than down to 10012.
fn snap(x: f64) -> f64 {
    let r = x.round();
    if (x - r).abs() < 1e-9 {
        r
    } else {
        x
    }
}

/// Read-only lookup of instrument metadata by asset.
///
/// The registry itself lives outside this crate; the tracker only consumes it.
pub trait InstrumentRegistry: Send + Sync {
    fn instrument(&self, asset: &AssetId) -> Option<&Instrument>;
}

impl InstrumentRegistry for HashMap<AssetId, Instrument> {
    fn instrument(&self, asset: &AssetId) -> Option<&Instrument> {
        self.get(asset)
    }
}
