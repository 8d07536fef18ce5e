//! Position: the authoritative numeric state of one asset's holding.
//!
//! Fields are crate-private: the fill applier, `update_mark` and the
//! corporate-action handlers are the only mutators, so the invariants below
//! hold at every observable point:
//! - `amount == 0` implies `cost_basis == 0` and no exit levels
//! - exit levels are positive when set, and straddle the basis when both set

use super::ids::{AssetId, OrderId};
use super::order::{OrderKind, OrderSide, OrderStatus, RestingOrder};
use crate::error::PositionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Automatic exit prices attached to a position. `None` means unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExitLevels {
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub take_profit: Option<f64>,
}

impl ExitLevels {
    pub fn new(stop_loss: Option<f64>, take_profit: Option<f64>) -> Self {
        Self {
            stop_loss,
            take_profit,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    /// Build from the zero-means-unset convention used by persisted records.
    pub fn from_sentinel(stop_loss: f64, take_profit: f64) -> Self {
        Self {
            stop_loss: unset_if_zero(stop_loss),
            take_profit: unset_if_zero(take_profit),
        }
    }

    /// `(stop_loss, take_profit)` with unset levels written as `0.0`.
    pub fn to_sentinel(self) -> (f64, f64) {
        (
            self.stop_loss.unwrap_or(0.0),
            self.take_profit.unwrap_or(0.0),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.stop_loss.is_none() && self.take_profit.is_none()
    }

    fn normalized(self) -> Self {
        Self {
            stop_loss: self.stop_loss.and_then(unset_if_zero),
            take_profit: self.take_profit.and_then(unset_if_zero),
        }
    }
}

fn unset_if_zero(price: f64) -> Option<f64> {
    if price == 0.0 {
        None
    } else {
        Some(price)
    }
}

/// Which exit level closed a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
}

/// Exit trigger lifecycle: Armed → Fired → Disarmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerState {
    /// At least one level set on a non-flat position.
    Armed,
    /// A level fired and its closing intent is outstanding.
    Fired(ExitReason),
    /// No levels, or the position has been closed.
    Disarmed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub(crate) asset: AssetId,
    pub(crate) amount: f64,
    pub(crate) cost_basis: f64,
    pub(crate) last_sale_price: f64,
    pub(crate) last_sale_date: Option<DateTime<Utc>>,
    pub(crate) exit_levels: ExitLevels,
    pub(crate) trigger_state: TriggerState,
}

impl Position {
    /// A flat position; it becomes live through its first fill.
    pub fn new(asset: AssetId) -> Self {
        Self {
            asset,
            amount: 0.0,
            cost_basis: 0.0,
            last_sale_price: 0.0,
            last_sale_date: None,
            exit_levels: ExitLevels::none(),
            trigger_state: TriggerState::Disarmed,
        }
    }

    pub fn asset(&self) -> &AssetId {
        &self.asset
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// Average price per unit of current exposure; `0.0` when flat.
    pub fn cost_basis(&self) -> f64 {
        self.cost_basis
    }

    pub fn last_sale_price(&self) -> f64 {
        self.last_sale_price
    }

    pub fn last_sale_date(&self) -> Option<DateTime<Utc>> {
        self.last_sale_date
    }

    pub fn exit_levels(&self) -> ExitLevels {
        self.exit_levels
    }

    pub fn stop_loss_price(&self) -> Option<f64> {
        self.exit_levels.stop_loss
    }

    pub fn take_profit_price(&self) -> Option<f64> {
        self.exit_levels.take_profit
    }

    pub fn trigger_state(&self) -> TriggerState {
        self.trigger_state
    }

    pub fn is_armed(&self) -> bool {
        self.trigger_state == TriggerState::Armed
    }

    pub fn is_long(&self) -> bool {
        self.amount > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.amount < 0.0
    }

    pub fn is_flat(&self) -> bool {
        self.amount == 0.0
    }

    pub fn market_value(&self) -> f64 {
        self.amount * self.last_sale_price
    }

    pub fn unrealized_pnl(&self) -> f64 {
        if self.is_flat() {
            return 0.0;
        }
        self.amount * (self.last_sale_price - self.cost_basis)
    }

    /// Record an observed market price. Never touches quantity or basis.
    pub fn update_mark(&mut self, price: f64, timestamp: DateTime<Utc>) -> Result<(), PositionError> {
        if !price.is_finite() || price < 0.0 {
            return Err(PositionError::InvalidMark { price });
        }
        self.last_sale_price = price;
        self.last_sale_date = Some(timestamp);
        Ok(())
    }

    /// Attach stop-loss / take-profit levels (zero or `None` clears a level).
    ///
    /// Re-configuring a position whose trigger already fired re-arms it.
    pub fn configure_exit_levels(&mut self, levels: ExitLevels) -> Result<(), PositionError> {
        let levels = self.validate_exit_levels(levels)?;
        self.set_exit_levels(levels);
        Ok(())
    }

    pub(crate) fn validate_exit_levels(&self, levels: ExitLevels) -> Result<ExitLevels, PositionError> {
        let levels = levels.normalized();
        for (name, price) in [("stop_loss", levels.stop_loss), ("take_profit", levels.take_profit)] {
            if let Some(p) = price {
                if !p.is_finite() || p < 0.0 {
                    return Err(PositionError::config(format!(
                        "{name} must be finite and non-negative, got {p}"
                    )));
                }
            }
        }
        if levels.is_empty() {
            return Ok(levels);
        }
        if self.is_flat() {
            return Err(PositionError::config(format!(
                "cannot attach exit levels to flat position in {}",
                self.asset
            )));
        }
        if let (Some(sl), Some(tp)) = (levels.stop_loss, levels.take_profit) {
            let basis = self.cost_basis;
            let straddles = if self.is_long() {
                sl <= basis && basis <= tp && sl < tp
            } else {
                tp <= basis && basis <= sl && tp < sl
            };
            if !straddles {
                let direction = if self.is_long() { "long" } else { "short" };
                return Err(PositionError::config(format!(
                    "stop_loss {sl} and take_profit {tp} do not straddle cost basis {basis} for a {direction} position"
                )));
            }
        }
        Ok(levels)
    }

    pub(crate) fn set_exit_levels(&mut self, levels: ExitLevels) {
        self.exit_levels = levels;
        self.trigger_state = if levels.is_empty() || self.is_flat() {
            TriggerState::Disarmed
        } else {
            TriggerState::Armed
        };
    }

    pub(crate) fn clear_exit_levels(&mut self) {
        self.set_exit_levels(ExitLevels::none());
    }

    /// Resting orders equivalent to the configured levels, each closing the
    /// full amount: stop-loss as a stop order, take-profit as a limit order.
    ///
    /// They are two separate orders, not one stop-limit: a stop-limit only
    /// becomes a limit after its stop fires, which is not what a bracket means.
    pub fn exit_orders(&self, first_id: u64) -> Vec<RestingOrder> {
        if self.is_flat() {
            return Vec::new();
        }
        let side = OrderSide::closing(self.amount);
        let quantity = self.amount.abs();
        let kinds = [
            self.exit_levels
                .stop_loss
                .map(|stop_price| OrderKind::Stop { stop_price }),
            self.exit_levels
                .take_profit
                .map(|limit_price| OrderKind::Limit { limit_price }),
        ];
        kinds
            .into_iter()
            .flatten()
            .enumerate()
            .map(|(i, kind)| RestingOrder {
                id: OrderId(first_id + i as u64),
                asset: self.asset.clone(),
                side,
                kind,
                quantity,
                status: OrderStatus::Active,
            })
            .collect()
    }
}
