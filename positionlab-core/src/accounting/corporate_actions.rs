//! Splits, dividends and externally delivered commissions.

use super::rounding::OrderRounding;
use crate::domain::{AssetId, ExitLevels, Instrument, Position};
use crate::error::PositionError;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Cash owed on a dividend's pay date for the amount held at the ex date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendEntitlement {
    pub asset: AssetId,
    pub cash: f64,
}

/// Shares of `payment_asset` owed for a stock dividend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockDividendEntitlement {
    pub payment_asset: AssetId,
    pub share_count: f64,
}

fn round_to_cent(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

impl Position {
    /// Apply a split of `ratio` old shares per new share (a 3-for-1 split
    /// has ratio 1/3, a 1-for-3 reverse split has ratio 3).
    ///
    /// The amount is rounded toward zero by `rounding`; the remainder is
    /// returned as cash at the new basis, rounded to the cent.
    pub fn handle_split(
        &mut self,
        asset: &AssetId,
        ratio: f64,
        rounding: OrderRounding,
    ) -> Result<f64, PositionError> {
        if &self.asset != asset {
            return Err(PositionError::AssetMismatch {
                expected: self.asset.clone(),
                actual: asset.clone(),
            });
        }
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(PositionError::InvalidCorporateAction {
                reason: format!("split ratio must be finite and positive, got {ratio}"),
            });
        }
        if self.is_flat() {
            return Ok(0.0);
        }

        let raw_amount = self.amount / ratio;
        let kept_amount = rounding.round_order(raw_amount);
        let remainder = raw_amount - kept_amount;
        let new_basis = round_to_cent(self.cost_basis * ratio);

        self.amount = kept_amount;
        self.cost_basis = new_basis;
        self.last_sale_price *= ratio;

        let levels = self.exit_levels;
        let scaled = ExitLevels::new(
            levels.stop_loss.map(|p| round_to_cent(p * ratio)),
            levels.take_profit.map(|p| round_to_cent(p * ratio)),
        );

        if self.is_flat() {
            // A split can round a sub-share holding away entirely.
            self.cost_basis = 0.0;
            self.clear_exit_levels();
        } else {
            self.exit_levels = scaled;
        }

        let cash = round_to_cent(remainder * new_basis);
        info!(
            asset = %self.asset,
            ratio,
            amount = self.amount,
            cost_basis = self.cost_basis,
            returned_cash = cash,
            "split applied"
        );
        Ok(cash)
    }

    /// Cash owed for a dividend of `cash_per_share`. Shorts owe the dividend,
    /// so the result is negative for them.
    pub fn earn_dividend(&self, cash_per_share: f64) -> DividendEntitlement {
        DividendEntitlement {
            asset: self.asset.clone(),
            cash: self.amount * cash_per_share,
        }
    }

    /// Shares of `payment_asset` owed for a stock dividend of `ratio` shares
    /// per share held, rounded toward zero.
    pub fn earn_stock_dividend(
        &self,
        payment_asset: AssetId,
        ratio: f64,
        rounding: OrderRounding,
    ) -> StockDividendEntitlement {
        StockDividendEntitlement {
            payment_asset,
            share_count: rounding.round_order(self.amount * ratio),
        }
    }

    /// Spread a commission charged outside any fill across the whole
    /// position. Longs break even higher, shorts lower. Futures commissions
    /// are converted to price units by the contract multiplier.
    pub fn adjust_commission_cost_basis(
        &mut self,
        instrument: Option<&Instrument>,
        cost: f64,
    ) -> Result<(), PositionError> {
        if let Some(inst) = instrument {
            if inst.asset != self.asset {
                return Err(PositionError::AssetMismatch {
                    expected: self.asset.clone(),
                    actual: inst.asset.clone(),
                });
            }
        }
        if !cost.is_finite() {
            return Err(PositionError::fill(format!("cost must be finite, got {cost}")));
        }
        if cost == 0.0 || self.is_flat() {
            return Ok(());
        }

        let cost_to_use = match instrument {
            Some(inst) if inst.is_future() && inst.price_multiplier != 0.0 => {
                cost / inst.price_multiplier
            }
            _ => cost,
        };
        let prev_cost = self.cost_basis * self.amount;
        self.cost_basis = (prev_cost + cost_to_use) / self.amount;
        Ok(())
    }
}
