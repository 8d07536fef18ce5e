//! Resting order descriptors handed to the fill decider by the blotter.

use super::ids::{AssetId, OrderId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Side that reduces a position of the given signed amount.
    pub fn closing(amount: f64) -> Self {
        if amount > 0.0 {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        }
    }

    pub fn sign(self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }
}

/// What kind of resting order and its price parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderKind {
    /// Becomes a market order once price crosses `stop_price`.
    Stop { stop_price: f64 },
    /// Becomes a limit order at `limit_price` once price crosses `stop_price`.
    StopLimit { stop_price: f64, limit_price: f64 },
    /// Fills at `limit_price` once price reaches it.
    Limit { limit_price: f64 },
}

impl OrderKind {
    pub fn stop_price(&self) -> Option<f64> {
        match self {
            OrderKind::Stop { stop_price } | OrderKind::StopLimit { stop_price, .. } => {
                Some(*stop_price)
            }
            OrderKind::Limit { .. } => None,
        }
    }

    pub fn limit_price(&self) -> Option<f64> {
        match self {
            OrderKind::StopLimit { limit_price, .. } | OrderKind::Limit { limit_price } => {
                Some(*limit_price)
            }
            OrderKind::Stop { .. } => None,
        }
    }
}

/// Order lifecycle as seen by the fill decider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Waiting for the stop (or limit) condition.
    Active,
    /// Stop-limit whose stop has fired; now a standing limit order.
    Triggered,
    Filled,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    #[error("invalid order {id}: {reason}")]
    InvalidOrder { id: OrderId, reason: String },
}

/// A stop, stop-limit or limit order resting with the blotter.
///
/// `quantity` is unsigned and may be fractional; direction comes from `side`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestingOrder {
    pub id: OrderId,
    pub asset: AssetId,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub quantity: f64,
    #[serde(default = "default_status")]
    pub status: OrderStatus,
}

fn default_status() -> OrderStatus {
    OrderStatus::Active
}

impl RestingOrder {
    pub fn new(
        id: OrderId,
        asset: AssetId,
        side: OrderSide,
        kind: OrderKind,
        quantity: f64,
    ) -> Result<Self, OrderError> {
        let order = Self {
            id,
            asset,
            side,
            kind,
            quantity,
            status: OrderStatus::Active,
        };
        order.validate()?;
        Ok(order)
    }

    /// Check quantity and prices. Orders deserialized from a blotter are not
    /// validated on construction, so the decider calls this again.
    pub fn validate(&self) -> Result<(), OrderError> {
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(self.invalid(format!(
                "quantity must be finite and positive, got {}",
                self.quantity
            )));
        }
        let prices = [self.kind.stop_price(), self.kind.limit_price()];
        for price in prices.into_iter().flatten() {
            if !price.is_finite() || price <= 0.0 {
                return Err(self.invalid(format!(
                    "prices must be finite and positive, got {price}"
                )));
            }
        }
        Ok(())
    }

    /// Quantity signed by side, as it would be applied to a position.
    pub fn signed_quantity(&self) -> f64 {
        self.side.sign() * self.quantity
    }

    pub fn is_open(&self) -> bool {
        matches!(self.status, OrderStatus::Active | OrderStatus::Triggered)
    }

    pub fn cancel(&mut self) {
        if self.is_open() {
            self.status = OrderStatus::Cancelled;
        }
    }

    fn invalid(&self, reason: String) -> OrderError {
        OrderError::InvalidOrder {
            id: self.id,
            reason,
        }
    }
}
