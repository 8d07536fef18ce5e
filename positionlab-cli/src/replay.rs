//! Replay driver: feeds recorded events through the tracker in file order.
//!
//! Marks and bars both run exit triggers first. A fired trigger is executed
//! at once and cancels the asset's resting orders, so a protective stop never
//! fills after the automatic exit. Otherwise the resting orders for the asset
//! run through the fill decider; a mark is decided as a one-price bar.

use crate::events::{fill_from_event, Event};
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use positionlab_core::accounting::CostModel;
use positionlab_core::domain::{AssetId, Bar, ExitLevels, Fill, RestingOrder};
use positionlab_core::execution::{FillDecision, StopOrderFillDecider};
use positionlab_core::{PositionRecord, PositionTracker, Snapshot, TrackerConfig};
use serde::Serialize;
use tracing::{info, warn};

/// What happened over a replay, plus the final book.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplayReport {
    pub events: usize,
    pub fills: usize,
    pub rejected: usize,
    pub triggers_fired: usize,
    pub orders_filled: usize,
    pub orders_cancelled: usize,
    /// Signed cash flow of every applied fill, costs included.
    pub net_cash: f64,
    pub split_cash: f64,
    pub dividend_cash: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub market_value: f64,
    pub open_orders: usize,
    pub positions: Vec<PositionRecord>,
}

pub struct Replayer {
    tracker: PositionTracker,
    decider: StopOrderFillDecider,
    costs: Box<dyn CostModel>,
    orders: Vec<RestingOrder>,
    report: ReplayReport,
}

impl Replayer {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            tracker: PositionTracker::new(config),
            decider: config.fill_decider(),
            costs: config.cost_model(),
            orders: Vec::new(),
            report: ReplayReport::default(),
        }
    }

    /// Run every event. A rejected event is logged and skipped, or aborts the
    /// replay when `strict` is set.
    pub fn run(&mut self, events: Vec<Event>, strict: bool) -> Result<()> {
        for (index, event) in events.into_iter().enumerate() {
            self.report.events += 1;
            let asset = event.asset().clone();
            if let Err(e) = self.handle(event) {
                self.report.rejected += 1;
                if strict {
                    bail!("event {index} for {asset} rejected: {e:#}");
                }
                warn!(index, %asset, error = %e, "event skipped");
            }
        }
        Ok(())
    }

    pub fn handle(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Fill {
                asset,
                quantity,
                price,
                cost,
                timestamp,
                stop_loss,
                take_profit,
            } => {
                let cost = cost.unwrap_or_else(|| self.costs.cost(&asset, quantity, price));
                let fill = fill_from_event(&asset, quantity, price, cost, timestamp, stop_loss, take_profit);
                self.apply(&fill)
            }
            Event::Mark {
                asset,
                price,
                timestamp,
            } => {
                self.tracker.mark_to_market(&asset, price, timestamp)?;
                if self.run_triggers(&asset, &[price], timestamp)? {
                    return Ok(());
                }
                let tick = Bar::tick(asset, timestamp, price);
                if !tick.is_sane() {
                    return Ok(());
                }
                self.run_orders(&tick)
            }
            Event::Bar(bar) => self.on_bar(&bar),
            Event::ExitLevels {
                asset,
                stop_loss,
                take_profit,
            } => {
                self.tracker
                    .set_exit_levels(&asset, ExitLevels::new(stop_loss, take_profit))?;
                Ok(())
            }
            Event::StopOrder { order } => {
                order.validate()?;
                info!(order = %order.id, asset = %order.asset, kind = ?order.kind, "order resting");
                self.orders.push(order);
                Ok(())
            }
            Event::Split { asset, ratio } => {
                self.report.split_cash += self.tracker.handle_split(&asset, ratio)?;
                Ok(())
            }
            Event::Dividend {
                asset,
                cash_per_share,
            } => {
                if !cash_per_share.is_finite() {
                    bail!("dividend for {asset} is not finite: {cash_per_share}");
                }
                if let Some(entitlement) = self.tracker.earn_dividend(&asset, cash_per_share) {
                    self.report.dividend_cash += entitlement.cash;
                }
                Ok(())
            }
        }
    }

    fn apply(&mut self, fill: &Fill) -> Result<()> {
        self.tracker.apply(fill)?;
        self.report.fills += 1;
        self.report.net_cash += fill.net_cash();
        Ok(())
    }

    /// Walk `path` in order and execute the first exit that fires. A level
    /// crossed at the first price (a gap) fills there; a level crossed later
    /// in the path fills at the level itself. Returns whether an exit fired.
    fn run_triggers(
        &mut self,
        asset: &AssetId,
        path: &[f64],
        timestamp: DateTime<Utc>,
    ) -> Result<bool> {
        let fired = path.iter().enumerate().find_map(|(i, &price)| {
            self.tracker
                .evaluate_triggers(asset, price, Some(timestamp))
                .map(|intent| (i, price, intent))
        });
        let Some((i, price, intent)) = fired else {
            return Ok(false);
        };
        let exit_price = if i == 0 { price } else { intent.level };
        self.report.triggers_fired += 1;
        let cost = self.costs.cost(asset, intent.quantity, exit_price);
        self.apply(&intent.into_fill(exit_price, cost))?;
        self.cancel_orders(asset);
        Ok(true)
    }

    fn cancel_orders(&mut self, asset: &AssetId) {
        for order in self.orders.iter_mut().filter(|o| &o.asset == asset) {
            order.cancel();
            info!(order = %order.id, %asset, "resting order cancelled by exit trigger");
            self.report.orders_cancelled += 1;
        }
        self.orders.retain(|o| o.is_open());
    }

    fn on_bar(&mut self, bar: &Bar) -> Result<()> {
        if bar.is_void() {
            return Ok(());
        }
        if !bar.is_sane() {
            bail!("bar for {} at {} has inconsistent OHLC", bar.asset, bar.timestamp);
        }
        self.tracker.mark_to_market(&bar.asset, bar.close, bar.timestamp)?;

        // Adverse extreme first: a long visits the low before the high.
        let path = match self.tracker.get(&bar.asset) {
            Some(p) if p.is_long() => vec![bar.open, bar.low, bar.high],
            Some(_) => vec![bar.open, bar.high, bar.low],
            None => Vec::new(),
        };
        if self.run_triggers(&bar.asset, &path, bar.timestamp)? {
            return Ok(());
        }
        self.run_orders(bar)
    }

    fn run_orders(&mut self, bar: &Bar) -> Result<()> {
        let mut executions = Vec::new();
        for order in self.orders.iter_mut().filter(|o| o.asset == bar.asset) {
            if let FillDecision::Filled(exec) = self.decider.decide(order, bar)? {
                executions.push((order.signed_quantity(), exec.price));
            }
        }
        self.orders.retain(|o| o.is_open());

        for (quantity, price) in executions {
            let cost = self.costs.cost(&bar.asset, quantity, price);
            let fill = Fill::new(bar.asset.clone(), quantity, price)
                .with_cost(cost)
                .at(bar.timestamp);
            self.apply(&fill)?;
            self.report.orders_filled += 1;
        }
        Ok(())
    }

    pub fn snapshot(&self) -> Snapshot {
        self.tracker.snapshot()
    }

    pub fn finish(mut self) -> ReplayReport {
        let snapshot = self.tracker.snapshot();
        self.report.realized_pnl = self.tracker.realized_pnl();
        self.report.unrealized_pnl = self.tracker.unrealized_pnl();
        self.report.market_value = self.tracker.market_value();
        self.report.open_orders = self.orders.len();
        self.report.positions = snapshot.positions;
        self.report
    }
}
