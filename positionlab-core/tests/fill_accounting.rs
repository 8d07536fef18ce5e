//! Fill accounting scenarios through the tracker's public API.

use chrono::{TimeZone, Utc};
use positionlab_core::accounting::{CostAmortization, FillKind};
use positionlab_core::domain::{AssetId, ExitLevels, Fill};
use positionlab_core::{PositionError, PositionTracker, TrackerConfig};

fn spy() -> AssetId {
    AssetId::from("SPY")
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// ── Sign flips ───────────────────────────────────────────────────────

#[test]
fn long_ten_sell_fifteen_flips_exactly() {
    let mut t = PositionTracker::default();
    t.apply_fill("SPY", 10.0, 100.0, 0.0).unwrap();
    let out = t.apply_fill("SPY", -15.0, 110.0, 0.0).unwrap();

    assert_eq!(out.kind, FillKind::Flipped);
    assert!(close(out.realized_pnl, 100.0));
    let p = t.get(&spy()).unwrap();
    assert_eq!(p.amount(), -5.0);
    assert_eq!(p.cost_basis(), 110.0);
}

#[test]
fn fractional_flip_keeps_the_excess() {
    let mut t = PositionTracker::default();
    t.apply_fill("SPY", -0.3, 50.0, 0.0).unwrap();
    let out = t.apply_fill("SPY", 1.05, 40.0, 0.0).unwrap();

    assert_eq!(out.kind, FillKind::Flipped);
    // Short 0.3 covered 10 lower.
    assert!(close(out.realized_pnl, 3.0));
    let p = t.get(&spy()).unwrap();
    assert!(close(p.amount(), 0.75));
    assert_eq!(p.cost_basis(), 40.0);
}

#[test]
fn flip_cost_is_split_pro_rata() {
    let mut t = PositionTracker::default();
    t.apply_fill("SPY", 10.0, 100.0, 0.0).unwrap();
    // $3 on 15 units: $2 to the closing 10, $1 to the opening 5.
    let out = t.apply_fill("SPY", -15.0, 110.0, 3.0).unwrap();
    assert!(close(out.realized_pnl, 98.0));
    let p = t.get(&spy()).unwrap();
    assert!(close(p.cost_basis(), 109.8));
}

// ── Fractional averaging ─────────────────────────────────────────────

#[test]
fn half_units_average_to_two_ten() {
    let mut t = PositionTracker::default();
    t.apply_fill("SPY", 0.5, 200.0, 0.0).unwrap();
    t.apply_fill("SPY", 0.5, 220.0, 0.0).unwrap();
    let p = t.get(&spy()).unwrap();
    assert_eq!(p.amount(), 1.0);
    assert!(close(p.cost_basis(), 210.0));
}

#[test]
fn partial_reduce_keeps_basis_then_close_resets() {
    let mut t = PositionTracker::default();
    t.apply_fill("SPY", 3.0, 100.0, 0.0).unwrap();
    t.apply_fill("SPY", 1.0, 104.0, 0.0).unwrap();
    let out = t.apply_fill("SPY", -1.5, 110.0, 0.0).unwrap();
    assert_eq!(out.kind, FillKind::Reduced);
    assert!(close(out.realized_pnl, 1.5 * 9.0));
    assert!(close(t.get(&spy()).unwrap().cost_basis(), 101.0));

    let out = t.apply_fill("SPY", -2.5, 90.0, 0.0).unwrap();
    assert_eq!(out.kind, FillKind::Closed);
    assert!(t.get(&spy()).is_none());
    assert!(close(t.realized_pnl(), 13.5 - 27.5));
}

// ── Costs ────────────────────────────────────────────────────────────

#[test]
fn close_realizes_net_of_cost_under_both_policies() {
    for amortization in [CostAmortization::IntoBasis, CostAmortization::Excluded] {
        let config = TrackerConfig {
            cost_amortization: amortization,
            ..TrackerConfig::default()
        };
        let mut t = PositionTracker::new(&config);
        t.apply_fill("SPY", 10.0, 100.0, 0.0).unwrap();
        let out = t.apply_fill("SPY", -10.0, 110.0, 1.0).unwrap();
        assert!(close(out.net_pnl(), 99.0), "{amortization:?}");
        assert!(close(t.realized_pnl(), 99.0), "{amortization:?}");
    }
}

#[test]
fn buy_cost_raises_basis_when_amortized() {
    let mut t = PositionTracker::default();
    t.apply_fill("SPY", 4.0, 100.0, 2.0).unwrap();
    assert!(close(t.get(&spy()).unwrap().cost_basis(), 100.5));

    let config = TrackerConfig {
        cost_amortization: CostAmortization::Excluded,
        ..TrackerConfig::default()
    };
    let mut t = PositionTracker::new(&config);
    let out = t.apply_fill("SPY", 4.0, 100.0, 2.0).unwrap();
    assert_eq!(t.get(&spy()).unwrap().cost_basis(), 100.0);
    assert_eq!(out.realized_pnl, 0.0);
    assert!(close(out.expensed_cost, 2.0));
    assert!(close(t.realized_pnl(), -2.0));
}

// ── Rejections ───────────────────────────────────────────────────────

#[test]
fn invalid_fills_leave_the_book_untouched() {
    let mut t = PositionTracker::default();
    t.apply_fill("SPY", 2.0, 100.0, 0.0).unwrap();
    let before = t.snapshot();

    for (q, p, c) in [
        (0.0, 100.0, 0.0),
        (f64::NAN, 100.0, 0.0),
        (1.0, f64::INFINITY, 0.0),
        (1.0, -5.0, 0.0),
        (1.0, 100.0, f64::NAN),
        (1e-12, 100.0, 1.0),
    ] {
        let err = t.apply_fill("SPY", q, p, c).unwrap_err();
        assert!(matches!(err, PositionError::InvalidFill { .. }), "{q} {p} {c}");
    }
    assert_eq!(t.snapshot(), before);
}

#[test]
fn invalid_levels_on_a_fill_reject_the_whole_fill() {
    let mut t = PositionTracker::default();
    let fill = Fill::new("SPY", 10.0, 100.0).with_exit_levels(ExitLevels::new(Some(105.0), Some(95.0)));
    let err = t.apply(&fill).unwrap_err();
    assert!(matches!(err, PositionError::InvalidConfiguration { .. }));
    assert!(t.is_empty());
}

// ── Last sale ────────────────────────────────────────────────────────

#[test]
fn newer_fills_update_last_sale_older_ones_do_not() {
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap();
    let t1 = Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap();
    let mut t = PositionTracker::default();
    t.apply(&Fill::new("SPY", 1.0, 100.0).at(t0)).unwrap();
    t.mark_to_market(&spy(), 102.0, t1).unwrap();
    t.apply(&Fill::new("SPY", 1.0, 101.0).at(t0)).unwrap();

    let p = t.get(&spy()).unwrap();
    assert_eq!(p.last_sale_price(), 102.0);
    assert_eq!(p.last_sale_date(), Some(t1));
    // Marks never move the basis.
    assert!(close(p.cost_basis(), 100.5));
}
