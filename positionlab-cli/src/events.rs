//! Recorded event file: a JSON array of tagged events, applied in order.
//!
//! ```json
//! [
//!   {"type": "fill", "asset": "SPY", "quantity": 10, "price": 100,
//!    "stop_loss": 90, "take_profit": 120},
//!   {"type": "mark", "asset": "SPY", "price": 85, "timestamp": "2024-01-02T21:00:00Z"}
//! ]
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use positionlab_core::domain::{AssetId, Bar, ExitLevels, Fill, RestingOrder};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// An executed trade. Without `cost`, the configured cost model prices it.
    Fill {
        asset: AssetId,
        quantity: f64,
        price: f64,
        #[serde(default)]
        cost: Option<f64>,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
        #[serde(default)]
        stop_loss: Option<f64>,
        #[serde(default)]
        take_profit: Option<f64>,
    },
    Mark {
        asset: AssetId,
        price: f64,
        timestamp: DateTime<Utc>,
    },
    Bar(Bar),
    ExitLevels {
        asset: AssetId,
        #[serde(default)]
        stop_loss: Option<f64>,
        #[serde(default)]
        take_profit: Option<f64>,
    },
    /// A stop, stop-limit or limit order to rest with the replay blotter.
    StopOrder { order: RestingOrder },
    Split {
        asset: AssetId,
        ratio: f64,
    },
    Dividend {
        asset: AssetId,
        cash_per_share: f64,
    },
}

impl Event {
    pub fn asset(&self) -> &AssetId {
        match self {
            Event::Fill { asset, .. }
            | Event::Mark { asset, .. }
            | Event::ExitLevels { asset, .. }
            | Event::Split { asset, .. }
            | Event::Dividend { asset, .. } => asset,
            Event::Bar(bar) => &bar.asset,
            Event::StopOrder { order } => &order.asset,
        }
    }
}

/// Build the core fill for a `fill` event, given the cost to charge.
pub fn fill_from_event(
    asset: &AssetId,
    quantity: f64,
    price: f64,
    cost: f64,
    timestamp: Option<DateTime<Utc>>,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
) -> Fill {
    let mut fill = Fill::new(asset.clone(), quantity, price).with_cost(cost);
    if let Some(ts) = timestamp {
        fill = fill.at(ts);
    }
    let levels = ExitLevels::new(stop_loss, take_profit);
    if !levels.is_empty() {
        fill = fill.with_exit_levels(levels);
    }
    fill
}

pub fn load_events(path: &Path) -> Result<Vec<Event>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read events file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse events file {}", path.display()))
}
