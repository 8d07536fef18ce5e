//! Domain types: assets, instruments, bars, fills, resting orders, positions.

pub mod bar;
pub mod fill;
pub mod ids;
pub mod instrument;
pub mod order;
pub mod position;

pub use bar::Bar;
pub use fill::Fill;
pub use ids::{AssetId, OrderId};
pub use instrument::{AssetClass, Instrument, InstrumentRegistry, TickPolicy};
pub use order::{OrderError, OrderKind, OrderSide, OrderStatus, RestingOrder};
pub use position::{ExitLevels, ExitReason, Position, TriggerState};
