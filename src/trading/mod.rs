//! Position state, order sequencing, and lifecycle management.

pub mod coordinator;
pub mod ledger;
pub mod monitor;
pub mod position;

pub use coordinator::{LiveUpdate, OpenOutcome, OrderCoordinator};
pub use ledger::{PositionLedger, SessionStats};
pub use monitor::{LifecycleMonitor, SWEEP_INTERVAL};
pub use position::{
    divergence_pct, ClosedPnl, CloseReason, PairStatus, Position, PositionPair, PositionSide,
    PositionStatus, PricePoint,
};
