//! PositionLab Core: position accounting and conditional-order fill decisions.
//!
//! This crate contains:
//! - Domain types (assets, instruments, bars, fills, resting orders, positions)
//! - Fill application with exact sign-flip splits and fractional quantities
//! - Stop-loss / take-profit exit triggers
//! - Stop, stop-limit and limit fill decisions against a bar
//! - The position tracker that owns the book, plus snapshots of it
//! - Splits, dividends, cost models and order-quantity rounding
//!
//! The core is synchronous and never installs a `tracing` subscriber; callers
//! decide where its events go.

pub mod accounting;
pub mod config;
pub mod domain;
pub mod error;
pub mod execution;
pub mod snapshot;
pub mod tracker;
pub mod triggers;

pub use config::{ConfigError, CostConfig, TrackerConfig};
pub use error::PositionError;
pub use snapshot::{PositionRecord, Snapshot, SnapshotError};
pub use tracker::{PositionHandle, PositionTracker};
pub use triggers::{ClosingIntent, TriggerEvaluator};
