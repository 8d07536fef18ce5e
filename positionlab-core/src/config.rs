//! Tracker configuration, loadable from TOML. Every field has a default, so
//! an empty file is a valid configuration.
//!
//! ```toml
//! gap_policy = "fill_at_worst"
//! stop_limit_activation = "same_bar"
//! rounding = { type = "full_shares" }
//! costs = { type = "per_share", amount = 0.005, minimum = 1.0 }
//! ```

use crate::accounting::{Bps, CostAmortization, CostModel, NoCost, OrderRounding, PerShare, PerTrade};
use crate::execution::{GapPolicy, StopLimitActivation, StopOrderFillDecider};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Transaction-cost model selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CostConfig {
    #[default]
    None,
    PerShare {
        amount: f64,
        #[serde(default)]
        minimum: f64,
    },
    PerTrade {
        amount: f64,
    },
    Bps {
        bps: f64,
    },
}

impl CostConfig {
    pub fn model(&self) -> Box<dyn CostModel> {
        match *self {
            CostConfig::None => Box::new(NoCost),
            CostConfig::PerShare { amount, minimum } => Box::new(PerShare { amount, minimum }),
            CostConfig::PerTrade { amount } => Box::new(PerTrade { amount }),
            CostConfig::Bps { bps } => Box::new(Bps { bps }),
        }
    }

    fn rates(&self) -> Vec<f64> {
        match *self {
            CostConfig::None => vec![],
            CostConfig::PerShare { amount, minimum } => vec![amount, minimum],
            CostConfig::PerTrade { amount } => vec![amount],
            CostConfig::Bps { bps } => vec![bps],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub rounding: OrderRounding,
    pub gap_policy: GapPolicy,
    pub stop_limit_activation: StopLimitActivation,
    /// Fills smaller than this (in absolute units) are rejected.
    pub min_fill_quantity: f64,
    pub cost_amortization: CostAmortization,
    pub costs: CostConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            rounding: OrderRounding::default(),
            gap_policy: GapPolicy::default(),
            stop_limit_activation: StopLimitActivation::default(),
            min_fill_quantity: 1e-9,
            cost_amortization: CostAmortization::default(),
            costs: CostConfig::default(),
        }
    }
}

impl TrackerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.min_fill_quantity.is_finite() || self.min_fill_quantity <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "min_fill_quantity must be finite and positive, got {}",
                self.min_fill_quantity
            )));
        }
        if let OrderRounding::Fractional { precision } = self.rounding {
            if !precision.is_finite() || precision <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "rounding precision must be finite and positive, got {precision}"
                )));
            }
        }
        if self.costs.rates().iter().any(|r| !r.is_finite() || *r < 0.0) {
            return Err(ConfigError::Invalid(format!(
                "cost parameters must be finite and non-negative: {:?}",
                self.costs
            )));
        }
        Ok(())
    }

    pub fn fill_decider(&self) -> StopOrderFillDecider {
        StopOrderFillDecider::new(self.gap_policy, self.stop_limit_activation)
    }

    pub fn cost_model(&self) -> Box<dyn CostModel> {
        self.costs.model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AssetId;

    #[test]
    fn empty_toml_is_default() {
        let config = TrackerConfig::from_toml_str("").unwrap();
        assert_eq!(config, TrackerConfig::default());
        assert_eq!(config.gap_policy, GapPolicy::FillAtOpen);
        assert_eq!(config.stop_limit_activation, StopLimitActivation::NextBar);
        assert_eq!(config.rounding, OrderRounding::Fractional { precision: 0.0001 });
    }

    #[test]
    fn parses_every_field() {
        let config = TrackerConfig::from_toml_str(
            r#"
            gap_policy = "fill_at_worst"
            stop_limit_activation = "same_bar"
            min_fill_quantity = 0.001
            cost_amortization = "excluded"
            rounding = { type = "full_shares" }
            costs = { type = "per_share", amount = 0.005, minimum = 1.0 }
            "#,
        )
        .unwrap();
        assert_eq!(config.gap_policy, GapPolicy::FillAtWorst);
        assert_eq!(config.stop_limit_activation, StopLimitActivation::SameBar);
        assert_eq!(config.min_fill_quantity, 0.001);
        assert_eq!(config.cost_amortization, CostAmortization::Excluded);
        assert_eq!(config.rounding, OrderRounding::FullShares);
        let cost = config.cost_model().cost(&AssetId::from("SPY"), 100.0, 50.0);
        assert_eq!(cost, 1.0);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            TrackerConfig::from_toml_str("min_fill_quantity = 0.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            TrackerConfig::from_toml_str("rounding = { type = \"fractional\", precision = -1.0 }"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            TrackerConfig::from_toml_str("costs = { type = \"bps\", bps = -3.0 }"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            TrackerConfig::from_toml_str("gap_policy = \"sideways\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = TrackerConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
