//! PositionTracker: the single owner of the asset → position book.
//!
//! Positions enter the book on their first fill and leave it when a fill,
//! split or restore leaves them flat. Everything outside the tracker reads
//! through `positions()`, `get()` or a [`PositionHandle`], never a copy.

use crate::accounting::{
    DividendEntitlement, FillApplier, FillOutcome, OrderRounding, StockDividendEntitlement,
};
use crate::config::TrackerConfig;
use crate::domain::{
    AssetId, ExitLevels, Fill, InstrumentRegistry, Position, RestingOrder, TickPolicy,
};
use crate::error::PositionError;
use crate::snapshot::{Snapshot, SnapshotError};
use crate::triggers::{ClosingIntent, TriggerEvaluator};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A non-owning view of one asset's position: a lookup key into the tracker.
///
/// Reporting and order management can each hold a handle and will always see
/// the same live state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionHandle {
    asset: AssetId,
}

impl PositionHandle {
    pub fn asset(&self) -> &AssetId {
        &self.asset
    }

    /// The live position, or `None` while the asset is flat.
    pub fn resolve<'a>(&self, tracker: &'a PositionTracker) -> Option<&'a Position> {
        tracker.get(&self.asset)
    }
}

pub struct PositionTracker {
    positions: BTreeMap<AssetId, Position>,
    applier: FillApplier,
    triggers: TriggerEvaluator,
    rounding: OrderRounding,
    registry: Option<Arc<dyn InstrumentRegistry>>,
    realized_pnl: f64,
}

impl fmt::Debug for PositionTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PositionTracker")
            .field("positions", &self.positions)
            .field("applier", &self.applier)
            .field("rounding", &self.rounding)
            .field("has_registry", &self.registry.is_some())
            .field("realized_pnl", &self.realized_pnl)
            .finish()
    }
}

impl Default for PositionTracker {
    fn default() -> Self {
        Self::new(&TrackerConfig::default())
    }
}

impl PositionTracker {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            positions: BTreeMap::new(),
            applier: FillApplier::new(config.min_fill_quantity, config.cost_amortization),
            triggers: TriggerEvaluator::new(),
            rounding: config.rounding,
            registry: None,
            realized_pnl: 0.0,
        }
    }

    /// Use `registry` to round exit levels to each instrument's tick size and
    /// to convert futures commissions.
    pub fn with_registry(mut self, registry: Arc<dyn InstrumentRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn rounding(&self) -> OrderRounding {
        self.rounding
    }

    // ── Fills and marks ──────────────────────────────────────────────

    pub fn apply_fill(
        &mut self,
        asset: impl Into<AssetId>,
        quantity: f64,
        price: f64,
        cost: f64,
    ) -> Result<FillOutcome, PositionError> {
        self.apply(&Fill::new(asset, quantity, price).with_cost(cost))
    }

    /// Apply a fill, creating the position on first exposure and removing it
    /// once flat. A rejected fill leaves the book unchanged.
    pub fn apply(&mut self, fill: &Fill) -> Result<FillOutcome, PositionError> {
        let fill = self.with_tick_rounded_levels(fill);

        let result = match self.positions.get_mut(&fill.asset) {
            Some(position) => self.applier.apply(position, &fill),
            None => {
                let mut position = Position::new(fill.asset.clone());
                let outcome = self.applier.apply(&mut position, &fill);
                if outcome.is_ok() {
                    self.positions.insert(fill.asset.clone(), position);
                }
                outcome
            }
        };

        let outcome = result.map_err(|e| {
            warn!(asset = %fill.asset, quantity = fill.quantity, price = fill.price, error = %e, "fill rejected");
            e
        })?;

        self.realized_pnl += outcome.net_pnl();
        if outcome.amount == 0.0 {
            self.positions.remove(&fill.asset);
        }
        Ok(outcome)
    }

    /// Update the observed price. Returns `Ok(false)` when no position is held.
    pub fn mark_to_market(
        &mut self,
        asset: &AssetId,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<bool, PositionError> {
        let Some(position) = self.positions.get_mut(asset) else {
            debug!(%asset, price, "mark for untracked asset ignored");
            return Ok(false);
        };
        position.update_mark(price, timestamp).map_err(|e| {
            warn!(%asset, price, error = %e, "mark rejected");
            e
        })?;
        Ok(true)
    }

    // ── Views ────────────────────────────────────────────────────────

    /// Every open position in asset order, read live from the book.
    pub fn positions(&self) -> impl Iterator<Item = &Position> + '_ {
        self.positions.values()
    }

    pub fn get(&self, asset: &AssetId) -> Option<&Position> {
        self.positions.get(asset)
    }

    pub fn handle(&self, asset: impl Into<AssetId>) -> PositionHandle {
        PositionHandle {
            asset: asset.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn market_value(&self) -> f64 {
        self.positions().map(Position::market_value).sum()
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.positions().map(Position::unrealized_pnl).sum()
    }

    /// Realized P&L, net of expensed costs, of every fill applied since
    /// construction or restore.
    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    // ── Exit levels ──────────────────────────────────────────────────

    pub fn set_exit_levels(
        &mut self,
        asset: &AssetId,
        levels: ExitLevels,
    ) -> Result<(), PositionError> {
        let Some(position) = self.positions.get(asset) else {
            return Err(PositionError::config(format!(
                "cannot attach exit levels to flat position in {asset}"
            )));
        };
        let levels = self.tick_round(asset, levels, position.is_long());
        match self.positions.get_mut(asset) {
            Some(position) => position.configure_exit_levels(levels),
            None => Ok(()),
        }
    }

    pub fn evaluate_triggers(
        &mut self,
        asset: &AssetId,
        price: f64,
        timestamp: Option<DateTime<Utc>>,
    ) -> Option<ClosingIntent> {
        let position = self.positions.get_mut(asset)?;
        self.triggers.evaluate(position, price, timestamp)
    }

    /// Evaluate every position against `price_of(asset)`; assets without a
    /// price are skipped.
    pub fn evaluate_all_triggers(
        &mut self,
        price_of: impl Fn(&AssetId) -> Option<f64>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Vec<ClosingIntent> {
        let triggers = self.triggers;
        self.positions
            .iter_mut()
            .filter_map(|(asset, position)| {
                let price = price_of(asset)?;
                triggers.evaluate(position, price, timestamp)
            })
            .collect()
    }

    /// Resting orders for every position's exit levels, numbered from `first_id`.
    pub fn exit_orders(&self, first_id: u64) -> Vec<RestingOrder> {
        let mut next_id = first_id;
        let mut orders = Vec::new();
        for position in self.positions() {
            let batch = position.exit_orders(next_id);
            next_id += batch.len() as u64;
            orders.extend(batch);
        }
        orders
    }

    // ── Corporate actions ────────────────────────────────────────────

    /// Apply a split; returns the cash paid out for fractional shares.
    pub fn handle_split(&mut self, asset: &AssetId, ratio: f64) -> Result<f64, PositionError> {
        let rounding = self.rounding;
        let Some(position) = self.positions.get_mut(asset) else {
            if !ratio.is_finite() || ratio <= 0.0 {
                return Err(PositionError::InvalidCorporateAction {
                    reason: format!("split ratio must be finite and positive, got {ratio}"),
                });
            }
            return Ok(0.0);
        };
        let cash = position.handle_split(asset, ratio, rounding)?;
        if position.is_flat() {
            info!(%asset, "split left position flat");
            self.positions.remove(asset);
        }
        Ok(cash)
    }

    pub fn earn_dividend(&self, asset: &AssetId, cash_per_share: f64) -> Option<DividendEntitlement> {
        self.get(asset).map(|p| p.earn_dividend(cash_per_share))
    }

    pub fn earn_stock_dividend(
        &self,
        asset: &AssetId,
        payment_asset: AssetId,
        ratio: f64,
    ) -> Option<StockDividendEntitlement> {
        self.get(asset)
            .map(|p| p.earn_stock_dividend(payment_asset, ratio, self.rounding))
    }

    /// Fold an externally charged commission into the position's basis.
    pub fn adjust_commission(&mut self, asset: &AssetId, cost: f64) -> Result<(), PositionError> {
        let registry = self.registry.clone();
        let instrument = registry.as_deref().and_then(|r| r.instrument(asset));
        match self.positions.get_mut(asset) {
            Some(position) => position.adjust_commission_cost_basis(instrument, cost),
            None => Ok(()),
        }
    }

    // ── Persistence ──────────────────────────────────────────────────

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_positions(self.positions(), self.realized_pnl)
    }

    /// Replace the book with `snapshot`. On error the current book is kept.
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let positions = snapshot.to_positions()?;
        self.positions = positions
            .into_iter()
            .map(|p| (p.asset().clone(), p))
            .collect();
        self.realized_pnl = snapshot.realized_pnl;
        info!(positions = self.positions.len(), "book restored from snapshot");
        Ok(())
    }

    // ── Tick rounding ────────────────────────────────────────────────

    /// Round levels onto the instrument's tick grid, away from the entry:
    /// a long's take-profit rounds up and its stop-loss down, mirrored for shorts.
    fn tick_round(&self, asset: &AssetId, levels: ExitLevels, long: bool) -> ExitLevels {
        let Some(instrument) = self.registry.as_deref().and_then(|r| r.instrument(asset)) else {
            return levels;
        };
        let (tp_policy, sl_policy) = if long {
            (TickPolicy::RoundUp, TickPolicy::RoundDown)
        } else {
            (TickPolicy::RoundDown, TickPolicy::RoundUp)
        };
        let round = |price: f64, policy| {
            if price > 0.0 && price.is_finite() {
                instrument.round_price(price, policy)
            } else {
                price
            }
        };
        ExitLevels::new(
            levels.stop_loss.map(|p| round(p, sl_policy)),
            levels.take_profit.map(|p| round(p, tp_policy)),
        )
    }

    fn with_tick_rounded_levels(&self, fill: &Fill) -> Fill {
        let mut fill = fill.clone();
        if let Some(levels) = fill.exit_levels {
            let held = self.get(&fill.asset).map_or(0.0, Position::amount);
            let long = held + fill.quantity > 0.0;
            fill.exit_levels = Some(self.tick_round(&fill.asset, levels, long));
        }
        fill
    }
}
