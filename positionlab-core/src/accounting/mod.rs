//! Accounting: how fills, corporate actions and costs change a position.

pub mod corporate_actions;
pub mod cost_model;
pub mod fill_applier;
pub mod rounding;

pub use corporate_actions::{DividendEntitlement, StockDividendEntitlement};
pub use cost_model::{Bps, CostModel, NoCost, PerShare, PerTrade};
pub use fill_applier::{CostAmortization, FillApplier, FillKind, FillOutcome};
pub use rounding::OrderRounding;
