//! Snapshots: the position book persisted verbatim as JSON.
//!
//! Records use the flat, zero-means-unset layout so that stored books stay
//! readable by tools that predate optional exit levels.

use crate::domain::{AssetId, ExitLevels, Position, TriggerState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid position record for {sid}: {reason}")]
    InvalidRecord { sid: AssetId, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub sid: AssetId,
    pub amount: f64,
    pub cost_basis: f64,
    pub last_sale_price: f64,
    #[serde(default)]
    pub last_sale_date: Option<DateTime<Utc>>,
    /// `0.0` when unset.
    #[serde(default)]
    pub take_profit_price: f64,
    /// `0.0` when unset.
    #[serde(default)]
    pub stop_loss_price: f64,
    /// Absent in books written before trigger state was persisted.
    #[serde(default = "armed")]
    pub trigger_state: TriggerState,
}

fn armed() -> TriggerState {
    TriggerState::Armed
}

impl From<&Position> for PositionRecord {
    fn from(p: &Position) -> Self {
        let (stop_loss_price, take_profit_price) = p.exit_levels.to_sentinel();
        Self {
            sid: p.asset.clone(),
            amount: p.amount,
            cost_basis: p.cost_basis,
            last_sale_price: p.last_sale_price,
            last_sale_date: p.last_sale_date,
            take_profit_price,
            stop_loss_price,
            trigger_state: p.trigger_state,
        }
    }
}

impl PositionRecord {
    /// Rebuild a live position. Levels come back armed unless the record
    /// says the trigger already fired or was disarmed.
    pub(crate) fn to_position(&self) -> Result<Position, SnapshotError> {
        let invalid = |reason: String| SnapshotError::InvalidRecord {
            sid: self.sid.clone(),
            reason,
        };
        if !self.amount.is_finite() || self.amount == 0.0 {
            return Err(invalid(format!(
                "amount must be finite and non-zero, got {}",
                self.amount
            )));
        }
        if !self.cost_basis.is_finite() {
            return Err(invalid(format!("non-finite cost basis {}", self.cost_basis)));
        }
        if !self.last_sale_price.is_finite() || self.last_sale_price < 0.0 {
            return Err(invalid(format!(
                "invalid last sale price {}",
                self.last_sale_price
            )));
        }

        let mut position = Position::new(self.sid.clone());
        position.amount = self.amount;
        position.cost_basis = self.cost_basis;
        position.last_sale_price = self.last_sale_price;
        position.last_sale_date = self.last_sale_date;

        let levels = ExitLevels::from_sentinel(self.stop_loss_price, self.take_profit_price);
        let levels = position
            .validate_exit_levels(levels)
            .map_err(|e| invalid(e.to_string()))?;
        position.set_exit_levels(levels);
        match self.trigger_state {
            TriggerState::Fired(_) if position.exit_levels.is_empty() => {
                return Err(invalid("fired trigger without an exit level".into()));
            }
            TriggerState::Fired(_) | TriggerState::Disarmed => {
                position.trigger_state = self.trigger_state;
            }
            TriggerState::Armed => {}
        }
        Ok(position)
    }
}

/// A serialized position book plus the realized P&L accumulated so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub positions: Vec<PositionRecord>,
    #[serde(default)]
    pub realized_pnl: f64,
}

impl Snapshot {
    pub fn from_positions<'a>(
        positions: impl IntoIterator<Item = &'a Position>,
        realized_pnl: f64,
    ) -> Self {
        Self {
            positions: positions.into_iter().map(PositionRecord::from).collect(),
            realized_pnl,
        }
    }

    /// Rebuild every position, rejecting duplicates and invalid records.
    pub fn to_positions(&self) -> Result<Vec<Position>, SnapshotError> {
        let mut seen = BTreeSet::new();
        self.positions
            .iter()
            .map(|record| {
                if !seen.insert(record.sid.clone()) {
                    return Err(SnapshotError::InvalidRecord {
                        sid: record.sid.clone(),
                        reason: "duplicate record".into(),
                    });
                }
                record.to_position()
            })
            .collect()
    }

    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// BLAKE3 hex digest of the canonical (compact) JSON.
    ///
    /// Two books with the same records in the same order hash equal.
    pub fn fingerprint(&self) -> Result<String, SnapshotError> {
        let canonical = serde_json::to_string(self)?;
        Ok(blake3::hash(canonical.as_bytes()).to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounting::FillApplier;
    use crate::domain::Fill;

    fn open(asset: &str, qty: f64, price: f64, levels: ExitLevels) -> Position {
        let mut p = Position::new(AssetId::from(asset));
        FillApplier::default()
            .apply(&mut p, &Fill::new(asset, qty, price).with_exit_levels(levels))
            .unwrap();
        p
    }

    #[test]
    fn unset_levels_are_stored_as_zero() {
        let p = open("SPY", 10.0, 100.0, ExitLevels::new(Some(90.0), None));
        let record = PositionRecord::from(&p);
        assert_eq!(record.stop_loss_price, 90.0);
        assert_eq!(record.take_profit_price, 0.0);
    }

    #[test]
    fn records_restore_armed() {
        let p = open("SPY", -2.5, 100.0, ExitLevels::new(Some(110.0), Some(90.0)));
        let snap = Snapshot::from_positions([&p], 12.5);
        let json = snap.to_json_pretty().unwrap();
        let back = Snapshot::from_json(&json).unwrap();
        let restored = back.to_positions().unwrap();
        assert_eq!(restored, vec![p]);
        assert!(restored[0].is_armed());
        assert_eq!(back.realized_pnl, 12.5);
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let a = Snapshot::from_positions([&open("SPY", 1.0, 100.0, ExitLevels::none())], 0.0);
        let b = Snapshot::from_positions([&open("SPY", 1.0, 100.0, ExitLevels::none())], 0.0);
        let c = Snapshot::from_positions([&open("SPY", 1.5, 100.0, ExitLevels::none())], 0.0);
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_ne!(a.fingerprint().unwrap(), c.fingerprint().unwrap());
        assert_eq!(a.fingerprint().unwrap().len(), 64);
    }

    #[test]
    fn rejects_flat_duplicate_and_straddle_violations() {
        let record = PositionRecord {
            sid: AssetId::from("SPY"),
            amount: 10.0,
            cost_basis: 100.0,
            last_sale_price: 100.0,
            last_sale_date: None,
            take_profit_price: 95.0,
            stop_loss_price: 105.0,
            trigger_state: TriggerState::Armed,
        };
        assert!(matches!(
            record.to_position(),
            Err(SnapshotError::InvalidRecord { .. })
        ));

        let flat = PositionRecord {
            amount: 0.0,
            take_profit_price: 0.0,
            stop_loss_price: 0.0,
            ..record.clone()
        };
        assert!(flat.to_position().is_err());

        let ok = PositionRecord {
            take_profit_price: 0.0,
            stop_loss_price: 0.0,
            ..record
        };
        let dup = Snapshot {
            positions: vec![ok.clone(), ok],
            realized_pnl: 0.0,
        };
        assert!(dup.to_positions().is_err());
    }

    #[test]
    fn fired_trigger_stays_fired_after_restore() {
        use crate::domain::ExitReason;
        use crate::triggers::TriggerEvaluator;

        let mut p = open("SPY", 10.0, 100.0, ExitLevels::new(Some(90.0), Some(120.0)));
        let evaluator = TriggerEvaluator::new();
        assert!(evaluator.evaluate(&mut p, 85.0, None).is_some());

        let json = Snapshot::from_positions([&p], 0.0).to_json_pretty().unwrap();
        let mut restored = Snapshot::from_json(&json).unwrap().to_positions().unwrap();
        let restored = &mut restored[0];
        assert_eq!(
            restored.trigger_state(),
            TriggerState::Fired(ExitReason::StopLoss)
        );
        assert!(evaluator.evaluate(restored, 85.0, None).is_none());
        assert_eq!(
            restored.trigger_state(),
            TriggerState::Fired(ExitReason::StopLoss)
        );
    }

    #[test]
    fn record_without_trigger_state_restores_armed() {
        let json = r#"{
            "positions": [{
                "sid": "SPY",
                "amount": 10.0,
                "cost_basis": 100.0,
                "last_sale_price": 100.0,
                "stop_loss_price": 90.0
            }]
        }"#;
        let snap = Snapshot::from_json(json).unwrap();
        assert_eq!(snap.positions[0].trigger_state, TriggerState::Armed);
        let restored = snap.to_positions().unwrap();
        assert!(restored[0].is_armed());
    }

    #[test]
    fn fired_record_without_levels_is_rejected() {
        let record = PositionRecord {
            sid: AssetId::from("SPY"),
            amount: 10.0,
            cost_basis: 100.0,
            last_sale_price: 100.0,
            last_sale_date: None,
            take_profit_price: 0.0,
            stop_loss_price: 0.0,
            trigger_state: TriggerState::Fired(crate::domain::ExitReason::TakeProfit),
        };
        assert!(matches!(
            record.to_position(),
            Err(SnapshotError::InvalidRecord { .. })
        ));
    }
}
