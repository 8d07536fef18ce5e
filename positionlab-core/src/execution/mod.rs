//! Execution: deciding whether a resting order fills on a bar, and at what price.
//!
//! Policy enums live here so configuration can name them without pulling in
//! the decider itself.

pub mod fill_decider;

pub use fill_decider::StopOrderFillDecider;

use serde::{Deserialize, Serialize};

/// How to fill a stop when the bar opens beyond the stop price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Fill at the open price (worse than the stop; realistic default).
    #[default]
    FillAtOpen,
    /// Fill at the stop level (optimistic).
    FillAtTrigger,
    /// Fill at the worse of open and stop for the order's side.
    FillAtWorst,
}

/// When the limit leg of a stop-limit becomes eligible to fill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopLimitActivation {
    /// From the bar after the stop triggered. The triggering bar's range is
    /// not trusted for the limit, since the intrabar path is unknown.
    #[default]
    NextBar,
    /// The triggering bar may also fill the limit.
    SameBar,
}

/// An execution decided by the fill decider, before costs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Execution {
    pub price: f64,
    /// Unsigned; always the order's full requested quantity.
    pub quantity: f64,
    /// The bar opened through the stop price.
    pub gapped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FillDecision {
    NoFill,
    /// Stop-limit whose stop fired; it now rests as a limit order.
    StopTriggered,
    Filled(Execution),
}

impl FillDecision {
    pub fn execution(&self) -> Option<Execution> {
        match self {
            FillDecision::Filled(execution) => Some(*execution),
            _ => None,
        }
    }
}
