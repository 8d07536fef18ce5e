//! Exit triggers: stop-loss / take-profit evaluation against a price update.
//!
//! One-shot bracket: whichever level fires first clears the other, and a
//! fired position never fires again until its levels are reconfigured.

use crate::domain::{AssetId, ExitLevels, ExitReason, Fill, Position, TriggerState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Synthetic market order closing a position whose exit level fired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosingIntent {
    pub asset: AssetId,
    /// Signed quantity that flattens the position (`-amount`).
    pub quantity: f64,
    pub reason: ExitReason,
    /// The level that was crossed.
    pub level: f64,
    /// The price update that crossed it.
    pub price: f64,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ClosingIntent {
    /// The fill this intent produces when executed at `price`.
    pub fn into_fill(self, price: f64, cost: f64) -> Fill {
        let fill = Fill::new(self.asset, self.quantity, price).with_cost(cost);
        match self.timestamp {
            Some(ts) => fill.at(ts),
            None => fill,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerEvaluator;

impl TriggerEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Check `position` against `price`. At most one level fires per call;
    /// stop-loss is checked before take-profit.
    pub fn evaluate(
        &self,
        position: &mut Position,
        price: f64,
        timestamp: Option<DateTime<Utc>>,
    ) -> Option<ClosingIntent> {
        if !price.is_finite() || position.is_flat() {
            return None;
        }
        match position.trigger_state {
            TriggerState::Armed => {}
            TriggerState::Fired(reason) => {
                warn!(asset = %position.asset, ?reason, price, "exit trigger already fired");
                return None;
            }
            TriggerState::Disarmed => return None,
        }

        let (reason, level) = crossed_level(position, price)?;

        position.exit_levels = match reason {
            ExitReason::StopLoss => ExitLevels::new(Some(level), None),
            ExitReason::TakeProfit => ExitLevels::new(None, Some(level)),
        };
        position.trigger_state = TriggerState::Fired(reason);

        info!(
            asset = %position.asset,
            ?reason,
            level,
            price,
            amount = position.amount,
            "exit trigger fired"
        );

        Some(ClosingIntent {
            asset: position.asset.clone(),
            quantity: -position.amount,
            reason,
            level,
            price,
            timestamp,
        })
    }
}

fn crossed_level(position: &Position, price: f64) -> Option<(ExitReason, f64)> {
    let levels = position.exit_levels;
    let long = position.is_long();

    if let Some(sl) = levels.stop_loss.filter(|&p| p > 0.0) {
        let hit = if long { price <= sl } else { price >= sl };
        if hit {
            return Some((ExitReason::StopLoss, sl));
        }
    }
    if let Some(tp) = levels.take_profit.filter(|&p| p > 0.0) {
        let hit = if long { price >= tp } else { price <= tp };
        if hit {
            return Some((ExitReason::TakeProfit, tp));
        }
    }
    None
}
