//! Cross-venue futures arbitrage engine.
//!
//! Watches best-price feeds on two venues for the same instruments,
//! detects fee-adjusted profitable spreads, and opens an offsetting
//! long/short pair that it later closes on convergence, timeout, or
//! shutdown. Runs fully simulated by default; live order placement sits
//! behind the same capability traits the mock venue implements.

pub mod arbitrage;
pub mod config;
pub mod engine;
pub mod error;
pub mod observer;
pub mod report;
pub mod trading;
pub mod utils;
pub mod venue;

pub use config::Config;
pub use engine::Engine;
pub use error::{EngineError, Result};
