//! Fill application: mutates a position under an executed trade.
//!
//! Four cases, decided by comparing signs of the held amount and the fill:
//! - opening / adding: quantity-weighted average of old basis and fill price
//! - reducing: realize P&L on the reduced quantity, basis unchanged
//! - closing exactly: realize P&L on the whole amount, basis and levels reset
//! - flipping: realize P&L on the old amount, open the remainder at the fill price
//!
//! The flip split uses the exact held amount as the closing portion. No part
//! of it is rounded to a share boundary.

use crate::domain::{Fill, Position};
use crate::error::PositionError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// How a fill's transaction cost reaches the books.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostAmortization {
    /// Spread `cost / quantity` into the per-unit price: buys raise the basis,
    /// sells lower the effective proceeds.
    #[default]
    IntoBasis,
    /// Basis uses the raw fill price; the whole cost is expensed on the fill
    /// and reported as [`FillOutcome::expensed_cost`].
    Excluded,
}

/// What a fill did to the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillKind {
    Opened,
    Increased,
    Reduced,
    Closed,
    Flipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FillOutcome {
    pub kind: FillKind,
    /// P&L realized on the closed quantity. `0.0` for opening and adding
    /// fills. Includes the cost when it is amortized into the price.
    pub realized_pnl: f64,
    /// Cost charged straight to P&L under [`CostAmortization::Excluded`];
    /// `0.0` otherwise.
    pub expensed_cost: f64,
    /// Resulting signed amount.
    pub amount: f64,
    /// Resulting cost basis (`0.0` when flat).
    pub cost_basis: f64,
}

impl FillOutcome {
    /// Total P&L effect of the fill: realized P&L less expensed cost.
    pub fn net_pnl(&self) -> f64 {
        self.realized_pnl - self.expensed_cost
    }
}

#[derive(Debug, Clone)]
pub struct FillApplier {
    /// Smallest accepted fill quantity; resulting amounts below it are
    /// treated as exactly flat.
    min_quantity: f64,
    amortization: CostAmortization,
}

impl Default for FillApplier {
    fn default() -> Self {
        Self::new(1e-9, CostAmortization::IntoBasis)
    }
}

impl FillApplier {
    pub fn new(min_quantity: f64, amortization: CostAmortization) -> Self {
        Self {
            min_quantity: min_quantity.abs(),
            amortization,
        }
    }

    /// Apply `fill` to `position`. All-or-nothing: on error the position is
    /// untouched, including when exit levels carried by the fill are invalid.
    pub fn apply(&self, position: &mut Position, fill: &Fill) -> Result<FillOutcome, PositionError> {
        self.validate(position, fill)?;

        let mut next = position.clone();
        let outcome = self.settle(&mut next, fill);

        if let Some(levels) = fill.exit_levels {
            if !next.is_flat() {
                next.configure_exit_levels(levels)?;
            }
        }

        *position = next;

        debug!(
            asset = %fill.asset,
            quantity = fill.quantity,
            price = fill.price,
            cost = fill.cost,
            realized_pnl = outcome.realized_pnl,
            expensed_cost = outcome.expensed_cost,
            amount = outcome.amount,
            "fill applied"
        );
        match outcome.kind {
            FillKind::Opened | FillKind::Closed | FillKind::Flipped => info!(
                asset = %fill.asset,
                kind = ?outcome.kind,
                amount = outcome.amount,
                cost_basis = outcome.cost_basis,
                "position {:?}",
                outcome.kind
            ),
            FillKind::Increased | FillKind::Reduced => {}
        }

        Ok(outcome)
    }

    fn validate(&self, position: &Position, fill: &Fill) -> Result<(), PositionError> {
        if position.asset != fill.asset {
            return Err(PositionError::AssetMismatch {
                expected: position.asset.clone(),
                actual: fill.asset.clone(),
            });
        }
        if !fill.quantity.is_finite() {
            return Err(PositionError::fill(format!(
                "quantity must be finite, got {}",
                fill.quantity
            )));
        }
        if fill.quantity == 0.0 {
            return Err(PositionError::fill("zero quantity"));
        }
        if fill.quantity.abs() < self.min_quantity {
            return Err(PositionError::fill(format!(
                "quantity {} is below the minimum {}; per-unit cost is undefined",
                fill.quantity, self.min_quantity
            )));
        }
        if !fill.price.is_finite() || fill.price < 0.0 {
            return Err(PositionError::fill(format!(
                "price must be finite and non-negative, got {}",
                fill.price
            )));
        }
        if !fill.cost.is_finite() {
            return Err(PositionError::fill(format!(
                "cost must be finite, got {}",
                fill.cost
            )));
        }
        Ok(())
    }

    /// Core arithmetic. Assumes `fill` passed validation.
    fn settle(&self, next: &mut Position, fill: &Fill) -> FillOutcome {
        let held = next.amount;
        let old_basis = next.cost_basis;
        let qty = fill.quantity;

        let mut new_amount = held + qty;
        if new_amount.abs() < self.min_quantity {
            new_amount = 0.0;
        }

        // Per-unit price after folding in the cost. Signed division makes the
        // adjustment raise the price of buys and lower the proceeds of sells.
        let effective = fill.price + fill.cost / qty;
        let (entry_price, exit_price, expensed_cost) = match self.amortization {
            CostAmortization::IntoBasis => (effective, effective, 0.0),
            CostAmortization::Excluded => (fill.price, fill.price, fill.cost),
        };
        let realize = |closed: f64| closed * (exit_price - old_basis);

        let (kind, realized) = if held == 0.0 {
            next.cost_basis = entry_price;
            (FillKind::Opened, 0.0)
        } else if held.signum() == qty.signum() {
            next.cost_basis = (held * old_basis + qty * entry_price) / new_amount;
            (FillKind::Increased, 0.0)
        } else if new_amount == 0.0 {
            next.cost_basis = 0.0;
            next.clear_exit_levels();
            (FillKind::Closed, realize(held))
        } else if new_amount.signum() == held.signum() {
            (FillKind::Reduced, realize(-qty))
        } else {
            // The closing portion is exactly `held`; the rest of the fill
            // opens the new side at the fill price.
            next.cost_basis = entry_price;
            next.clear_exit_levels();
            (FillKind::Flipped, realize(held))
        };

        next.amount = new_amount;
        if next.is_flat() {
            next.clear_exit_levels();
        }

        if let Some(ts) = fill.timestamp {
            if next.last_sale_date.map_or(true, |last| ts > last) {
                next.last_sale_price = fill.price;
                next.last_sale_date = Some(ts);
            }
        }

        FillOutcome {
            kind,
            realized_pnl: realized,
            expensed_cost,
            amount: next.amount,
            cost_basis: next.cost_basis,
        }
    }
}
