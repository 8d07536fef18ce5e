//! Stop, stop-limit and limit fill decisions against one bar.
//!
//! Sell stop: triggers if bar.low <= stop. Gap-through if open <= stop.
//! Buy stop: triggers if bar.high >= stop. Gap-through if open >= stop.
//! Limits fill at the limit price once the bar reaches it, never better.
//!
//! Quantities are passed through untouched: a 2.5-unit order fills 2.5 units.

use super::{Execution, FillDecision, GapPolicy, StopLimitActivation};
use crate::domain::{Bar, OrderError, OrderKind, OrderSide, OrderStatus, RestingOrder};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct StopOrderFillDecider {
    pub gap_policy: GapPolicy,
    pub activation: StopLimitActivation,
}

impl StopOrderFillDecider {
    pub fn new(gap_policy: GapPolicy, activation: StopLimitActivation) -> Self {
        Self {
            gap_policy,
            activation,
        }
    }

    /// Decide `order` against `bar`, advancing its status.
    ///
    /// A stop-limit moves Active → Triggered when its stop fires, and any
    /// order that fills moves to Filled. Orders that are not open, and void
    /// bars, never fill. A bar for another asset is an error.
    pub fn decide(&self, order: &mut RestingOrder, bar: &Bar) -> Result<FillDecision, OrderError> {
        order.validate()?;
        if order.asset != bar.asset {
            return Err(OrderError::InvalidOrder {
                id: order.id,
                reason: format!("order for {} decided against a {} bar", order.asset, bar.asset),
            });
        }
        if !order.is_open() || bar.is_void() {
            return Ok(FillDecision::NoFill);
        }

        let decision = match (order.kind, order.status) {
            (OrderKind::Stop { stop_price }, _) => {
                self.check_stop(order.side, stop_price, bar, order.quantity)
            }
            (OrderKind::Limit { limit_price }, _) => {
                check_limit(order.side, limit_price, bar, order.quantity)
            }
            (
                OrderKind::StopLimit {
                    stop_price,
                    limit_price,
                },
                OrderStatus::Active,
            ) => {
                if !stop_reached(order.side, stop_price, bar) {
                    FillDecision::NoFill
                } else {
                    order.status = OrderStatus::Triggered;
                    debug!(order = %order.id, asset = %order.asset, stop_price, "stop-limit triggered");
                    match self.activation {
                        StopLimitActivation::NextBar => FillDecision::StopTriggered,
                        StopLimitActivation::SameBar => {
                            match check_limit(order.side, limit_price, bar, order.quantity) {
                                FillDecision::NoFill => FillDecision::StopTriggered,
                                filled => filled,
                            }
                        }
                    }
                }
            }
            (OrderKind::StopLimit { limit_price, .. }, _) => {
                check_limit(order.side, limit_price, bar, order.quantity)
            }
        };

        if let FillDecision::Filled(execution) = decision {
            order.status = OrderStatus::Filled;
            debug!(
                order = %order.id,
                asset = %order.asset,
                price = execution.price,
                quantity = execution.quantity,
                gapped = execution.gapped,
                "order filled"
            );
        }
        Ok(decision)
    }

    fn check_stop(&self, side: OrderSide, stop: f64, bar: &Bar, quantity: f64) -> FillDecision {
        if !stop_reached(side, stop, bar) {
            return FillDecision::NoFill;
        }
        let gapped = match side {
            OrderSide::Sell => bar.open <= stop,
            OrderSide::Buy => bar.open >= stop,
        };
        let price = if gapped {
            resolve_gap(side, bar.open, stop, self.gap_policy)
        } else {
            stop
        };
        FillDecision::Filled(Execution {
            price,
            quantity,
            gapped,
        })
    }
}

fn stop_reached(side: OrderSide, stop: f64, bar: &Bar) -> bool {
    match side {
        OrderSide::Sell => bar.low <= stop,
        OrderSide::Buy => bar.high >= stop,
    }
}

/// Sell limit: fills if bar.high >= limit. Buy limit: fills if bar.low <= limit.
fn check_limit(side: OrderSide, limit: f64, bar: &Bar, quantity: f64) -> FillDecision {
    let reached = match side {
        OrderSide::Sell => bar.high >= limit,
        OrderSide::Buy => bar.low <= limit,
    };
    if !reached {
        return FillDecision::NoFill;
    }
    FillDecision::Filled(Execution {
        price: limit,
        quantity,
        gapped: false,
    })
}

/// Gap-through price for a stop. Lower is worse for a seller, higher for a buyer.
fn resolve_gap(side: OrderSide, open: f64, stop: f64, policy: GapPolicy) -> f64 {
    match (policy, side) {
        (GapPolicy::FillAtOpen, _) => open,
        (GapPolicy::FillAtTrigger, _) => stop,
        (GapPolicy::FillAtWorst, OrderSide::Sell) => open.min(stop),
        (GapPolicy::FillAtWorst, OrderSide::Buy) => open.max(stop),
    }
}
