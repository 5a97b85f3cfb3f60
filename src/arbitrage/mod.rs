//! Opportunity detection: fill simulation, spread math, scanning, gating.

pub mod fill;
pub mod gate;
pub mod opportunity;
pub mod scanner;

pub use fill::{simulate_fill, FillKind, SimulatedFill, DEFAULT_VISIBLE_DEPTH_USD};
pub use gate::{admit, GateView};
pub use opportunity::{net_profit_pct, spread_pct, ArbitrageOpportunity, CrossPrices};
pub use scanner::{OpportunitySnapshot, SpreadScanner};
