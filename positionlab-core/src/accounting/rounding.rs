//! Order-quantity rounding: whole shares or fractional shares at a precision.

use serde::{Deserialize, Serialize};

/// Values this close to a whole number are treated as that number before
/// truncation, so `2.9999999` shares rounds to 3 rather than 2.
const NEAR_INTEGER_EPSILON: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderRounding {
    /// Whole shares only.
    FullShares,
    /// Multiples of `precision` (e.g. 0.01 for hundredths of a share).
    Fractional { precision: f64 },
}

impl Default for OrderRounding {
    fn default() -> Self {
        OrderRounding::Fractional { precision: 0.0001 }
    }
}

impl OrderRounding {
    /// Round a signed amount toward zero onto the allowed grid.
    pub fn round_order(&self, amount: f64) -> f64 {
        match *self {
            OrderRounding::FullShares => round_if_near_integer(amount).trunc(),
            OrderRounding::Fractional { precision } if precision > 0.0 => {
                round_if_near_integer(amount / precision).trunc() * precision
            }
            OrderRounding::Fractional { .. } => amount,
        }
    }
}

fn round_if_near_integer(x: f64) -> f64 {
    let r = x.round();
    if (x - r).abs() <= NEAR_INTEGER_EPSILON {
        r
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_shares_truncates_toward_zero() {
        let r = OrderRounding::FullShares;
        assert_eq!(r.round_order(33.333), 33.0);
        assert_eq!(r.round_order(-33.7), -33.0);
        assert_eq!(r.round_order(2.99999), 3.0);
        assert_eq!(r.round_order(0.4), 0.0);
    }

    #[test]
    fn fractional_keeps_precision() {
        let r = OrderRounding::Fractional { precision: 0.01 };
        assert!((r.round_order(33.3333) - 33.33).abs() < 1e-12);
        assert!((r.round_order(-1.239) + 1.23).abs() < 1e-12);
        assert!((r.round_order(0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn non_positive_precision_is_identity() {
        let r = OrderRounding::Fractional { precision: 0.0 };
        assert_eq!(r.round_order(1.23456), 1.23456);
    }

    #[test]
    fn deserializes_from_toml_style_tag() {
        let r: OrderRounding = serde_json::from_str(r#"{"type":"full_shares"}"#).unwrap();
        assert_eq!(r, OrderRounding::FullShares);
        let r: OrderRounding =
            serde_json::from_str(r#"{"type":"fractional","precision":0.001}"#).unwrap();
        assert_eq!(r, OrderRounding::Fractional { precision: 0.001 });
    }
}
