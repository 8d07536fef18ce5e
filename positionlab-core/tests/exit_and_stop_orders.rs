//! Exit triggers and resting-order fills, end to end.

use chrono::{DateTime, TimeZone, Utc};
use positionlab_core::domain::{
    AssetId, Bar, ExitLevels, ExitReason, Fill, OrderId, OrderKind, OrderSide, OrderStatus,
    RestingOrder, TriggerState,
};
use positionlab_core::execution::{FillDecision, GapPolicy, StopLimitActivation, StopOrderFillDecider};
use positionlab_core::{PositionError, PositionTracker, TrackerConfig};

fn spy() -> AssetId {
    AssetId::from("SPY")
}

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, 21, 0, 0).unwrap()
}

fn bar(d: u32, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar::new(spy(), day(d), open, high, low, close)
}

// ── Exit triggers ────────────────────────────────────────────────────

#[test]
fn stop_loss_fires_once_and_disarms_take_profit() {
    let mut t = PositionTracker::default();
    t.apply(&Fill::new("SPY", 10.0, 100.0).with_exit_levels(ExitLevels::new(Some(90.0), Some(120.0))))
        .unwrap();

    let intent = t.evaluate_triggers(&spy(), 85.0, Some(day(2))).unwrap();
    assert_eq!(intent.reason, ExitReason::StopLoss);
    assert_eq!(intent.quantity, -10.0);
    assert_eq!(t.get(&spy()).unwrap().take_profit_price(), None);

    assert!(t.evaluate_triggers(&spy(), 130.0, Some(day(3))).is_none());

    t.apply(&intent.into_fill(85.0, 0.0)).unwrap();
    assert!(t.get(&spy()).is_none());
    assert!(t.evaluate_triggers(&spy(), 130.0, Some(day(4))).is_none());
}

#[test]
fn wrong_side_levels_are_rejected() {
    let mut t = PositionTracker::default();
    t.apply_fill("SPY", 10.0, 100.0, 0.0).unwrap();
    let err = t
        .set_exit_levels(&spy(), ExitLevels::new(Some(105.0), Some(95.0)))
        .unwrap_err();
    assert!(matches!(err, PositionError::InvalidConfiguration { .. }));

    let err = t
        .set_exit_levels(&spy(), ExitLevels::new(Some(-1.0), None))
        .unwrap_err();
    assert!(matches!(err, PositionError::InvalidConfiguration { .. }));
    assert_eq!(t.get(&spy()).unwrap().trigger_state(), TriggerState::Disarmed);
}

#[test]
fn flip_clears_old_levels() {
    let mut t = PositionTracker::default();
    t.apply(&Fill::new("SPY", 2.0, 100.0).with_exit_levels(ExitLevels::new(Some(95.0), Some(110.0))))
        .unwrap();
    t.apply_fill("SPY", -3.0, 101.0, 0.0).unwrap();
    let p = t.get(&spy()).unwrap();
    assert!(p.is_short());
    assert!(p.exit_levels().is_empty());
    assert_eq!(p.trigger_state(), TriggerState::Disarmed);
}

// ── Stop-limit with fractional quantity ─────────────────────────────

#[test]
fn fractional_stop_limit_fills_full_quantity() {
    let decider = StopOrderFillDecider::default();
    let mut order = RestingOrder::new(
        OrderId(1),
        spy(),
        OrderSide::Sell,
        OrderKind::StopLimit {
            stop_price: 50.0,
            limit_price: 49.0,
        },
        2.5,
    )
    .unwrap();

    let first = decider.decide(&mut order, &bar(2, 51.0, 51.2, 48.0, 48.5)).unwrap();
    assert_eq!(first, FillDecision::StopTriggered);

    let second = decider.decide(&mut order, &bar(3, 48.6, 49.5, 48.2, 49.1)).unwrap();
    let exec = second.execution().unwrap();
    assert_eq!(exec.price, 49.0);
    assert_eq!(exec.quantity, 2.5);
    assert_eq!(order.status, OrderStatus::Filled);

    // Applying it to a 2.5-unit long closes it exactly.
    let mut t = PositionTracker::default();
    t.apply_fill("SPY", 2.5, 52.0, 0.0).unwrap();
    t.apply_fill("SPY", order.signed_quantity(), exec.price, 0.0).unwrap();
    assert!(t.is_empty());
    assert!((t.realized_pnl() + 7.5).abs() < 1e-9);

    // A filled order never fills again.
    let third = decider.decide(&mut order, &bar(4, 48.0, 50.0, 47.0, 49.0)).unwrap();
    assert_eq!(third, FillDecision::NoFill);
}

#[test]
fn gap_through_stop_uses_configured_policy() {
    let config = TrackerConfig {
        gap_policy: GapPolicy::FillAtTrigger,
        stop_limit_activation: StopLimitActivation::SameBar,
        ..TrackerConfig::default()
    };
    let decider = config.fill_decider();
    let mut order = RestingOrder::new(OrderId(2), spy(), OrderSide::Sell, OrderKind::Stop { stop_price: 95.0 }, 1.25)
        .unwrap();
    let exec = decider
        .decide(&mut order, &bar(2, 90.0, 92.0, 88.0, 91.0))
        .unwrap()
        .execution()
        .unwrap();
    assert_eq!(exec.price, 95.0);
    assert!(exec.gapped);
    assert_eq!(exec.quantity, 1.25);
}

// ── Exit orders through the decider ─────────────────────────────────

#[test]
fn exit_orders_fill_at_their_levels() {
    let mut t = PositionTracker::default();
    t.apply(&Fill::new("SPY", 1.5, 100.0).with_exit_levels(ExitLevels::new(Some(90.0), Some(120.0))))
        .unwrap();
    let mut orders = t.exit_orders(1);
    assert_eq!(orders.len(), 2);

    let decider = StopOrderFillDecider::default();
    let up = bar(2, 110.0, 125.0, 108.0, 121.0);
    let decisions: Vec<_> = orders
        .iter_mut()
        .map(|o| decider.decide(o, &up).unwrap())
        .collect();

    assert_eq!(decisions[0], FillDecision::NoFill);
    let exec = decisions[1].execution().unwrap();
    assert_eq!(exec.price, 120.0);
    assert_eq!(exec.quantity, 1.5);
    assert_eq!(orders[1].side, OrderSide::Sell);
}
