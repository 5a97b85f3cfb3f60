//! Capability traits the core consumes per venue.
//!
//! The live network clients (websocket feed, authenticated REST) are
//! external collaborators; the engine only sees these two narrow traits
//! plus the per-venue table that binds them together.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use strum::Display;

use crate::error::ExecutionError;

use super::types::{TickerPrice, Venue};

/// Market order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum OrderSide {
    /// Buy / long.
    Buy,
    /// Sell / short.
    Sell,
}

/// Live best-bid/ask cache maintained by a venue's feed client.
pub trait PriceFeed: Send + Sync {
    /// Synchronous cache lookup by venue-neutral symbol.
    fn best_price(&self, symbol: &str) -> Option<TickerPrice>;

    /// Venue-neutral symbols the feed currently tracks.
    fn symbols(&self) -> Vec<String>;

    /// Whether the underlying connection is healthy.
    fn is_connected(&self) -> bool;
}

/// Authenticated order placement, leverage, and balance calls.
#[async_trait]
pub trait OrderExecution: Send + Sync {
    /// Place a market order; `reduce_only` closes existing exposure.
    async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        reduce_only: bool,
    ) -> Result<(), ExecutionError>;

    /// Set leverage for a symbol. Callers treat failure as non-fatal.
    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExecutionError>;

    /// Quote-currency balance.
    async fn get_balance(&self) -> Result<Decimal, ExecutionError>;
}

/// Everything the core needs from one venue.
#[derive(Clone)]
pub struct VenueHandle {
    /// Live price cache.
    pub feed: Arc<dyn PriceFeed>,
    /// Order execution calls.
    pub execution: Arc<dyn OrderExecution>,
    /// Taker fee charged per fill (percent).
    pub taker_fee_pct: Decimal,
}

/// Per-venue capability table.
#[derive(Clone)]
pub struct VenueTable {
    handles: HashMap<Venue, VenueHandle>,
}

impl VenueTable {
    /// Build the table from both venues' handles.
    pub fn new(binance: VenueHandle, mexc: VenueHandle) -> Self {
        let mut handles = HashMap::new();
        handles.insert(Venue::Binance, binance);
        handles.insert(Venue::Mexc, mexc);
        Self { handles }
    }

    /// Capabilities for one venue.
    pub fn get(&self, venue: Venue) -> &VenueHandle {
        // Construction guarantees both entries exist.
        &self.handles[&venue]
    }

    /// Taker fee for one venue (percent).
    pub fn taker_fee_pct(&self, venue: Venue) -> Decimal {
        self.get(venue).taker_fee_pct
    }

    /// Cached best price for a symbol on one venue.
    pub fn best_price(&self, venue: Venue, symbol: &str) -> Option<TickerPrice> {
        self.get(venue).feed.best_price(symbol)
    }
}
