//! Mock venue for unit and integration testing.
//!
//! Provides a scriptable price feed and an order-execution stub that can
//! be told to fail per call type, recording every call in order so tests
//! can assert leg sequencing.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::error::ExecutionError;

use super::capability::{OrderExecution, OrderSide, PriceFeed};
use super::types::{normalize_symbol, TickerPrice, Venue};

/// Configuration for mock venue behavior.
#[derive(Debug, Clone, Default)]
pub struct MockVenueConfig {
    /// Balance to return.
    pub balance: Decimal,
    /// Whether to fail order placement.
    pub fail_orders: bool,
    /// Whether to fail leverage changes.
    pub fail_leverage: bool,
    /// Whether to fail balance requests.
    pub fail_balance: bool,
    /// Report the feed as disconnected.
    pub disconnected: bool,
    /// Simulated latency in milliseconds.
    pub latency_ms: u64,
}

/// One recorded execution call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// A market order placement.
    PlaceOrder {
        /// Venue called.
        venue: Venue,
        /// Symbol traded.
        symbol: String,
        /// Order side.
        side: OrderSide,
        /// Reduce-only flag.
        reduce_only: bool,
    },
    /// A leverage change.
    SetLeverage {
        /// Venue called.
        venue: Venue,
        /// Symbol affected.
        symbol: String,
        /// Requested leverage.
        leverage: u32,
    },
    /// A balance fetch.
    GetBalance {
        /// Venue called.
        venue: Venue,
    },
}

/// Mock venue implementing both capability traits.
#[derive(Clone)]
pub struct MockVenue {
    venue: Venue,
    config: Arc<Mutex<MockVenueConfig>>,
    tickers: Arc<DashMap<String, TickerPrice>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockVenue {
    /// Create a mock for the given venue with default configuration.
    pub fn new(venue: Venue) -> Self {
        Self::with_config(venue, MockVenueConfig::default())
    }

    /// Create a mock with custom behavior.
    pub fn with_config(venue: Venue, config: MockVenueConfig) -> Self {
        Self {
            venue,
            config: Arc::new(Mutex::new(config)),
            tickers: Arc::new(DashMap::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Which venue this mock impersonates.
    pub fn venue(&self) -> Venue {
        self.venue
    }

    /// Set the mock balance.
    pub fn set_balance(&self, balance: Decimal) {
        self.config.lock().unwrap().balance = balance;
    }

    /// Toggle order placement failure.
    pub fn set_fail_orders(&self, fail: bool) {
        self.config.lock().unwrap().fail_orders = fail;
    }

    /// Toggle leverage failure.
    pub fn set_fail_leverage(&self, fail: bool) {
        self.config.lock().unwrap().fail_leverage = fail;
    }

    /// Toggle balance-fetch failure.
    pub fn set_fail_balance(&self, fail: bool) {
        self.config.lock().unwrap().fail_balance = fail;
    }

    /// Publish a ticker into the feed cache, returning the stored tick.
    pub fn set_ticker(
        &self,
        symbol: &str,
        bid: Decimal,
        ask: Decimal,
        bid_qty: Option<Decimal>,
        ask_qty: Option<Decimal>,
    ) -> TickerPrice {
        let tick = TickerPrice {
            venue: self.venue,
            symbol: symbol.to_string(),
            bid,
            ask,
            bid_qty,
            ask_qty,
            at: OffsetDateTime::now_utc(),
        };
        self.tickers.insert(normalize_symbol(symbol), tick.clone());
        tick
    }

    /// Ordered log of every execution call made against this mock.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of non-reduce-only order placements recorded.
    pub fn open_order_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MockCall::PlaceOrder { reduce_only: false, .. }))
            .count()
    }

    /// Clear scripted tickers and the call log.
    pub fn clear(&self) {
        self.tickers.clear();
        self.calls.lock().unwrap().clear();
    }

    async fn simulate_latency(&self) {
        let latency = self.config.lock().unwrap().latency_ms;
        if latency > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(latency)).await;
        }
    }
}

impl PriceFeed for MockVenue {
    fn best_price(&self, symbol: &str) -> Option<TickerPrice> {
        self.tickers.get(&normalize_symbol(symbol)).map(|t| t.clone())
    }

    fn symbols(&self) -> Vec<String> {
        self.tickers.iter().map(|t| t.key().clone()).collect()
    }

    fn is_connected(&self) -> bool {
        !self.config.lock().unwrap().disconnected
    }
}

#[async_trait]
impl OrderExecution for MockVenue {
    async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        _quantity: Decimal,
        reduce_only: bool,
    ) -> Result<(), ExecutionError> {
        self.simulate_latency().await;
        self.calls.lock().unwrap().push(MockCall::PlaceOrder {
            venue: self.venue,
            symbol: symbol.to_string(),
            side,
            reduce_only,
        });

        if self.config.lock().unwrap().fail_orders {
            return Err(ExecutionError::OrderRejected {
                venue: self.venue,
                message: r#"{"code":-2019,"msg":"Margin is insufficient"}"#.to_string(),
            });
        }
        Ok(())
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExecutionError> {
        self.simulate_latency().await;
        self.calls.lock().unwrap().push(MockCall::SetLeverage {
            venue: self.venue,
            symbol: symbol.to_string(),
            leverage,
        });

        if self.config.lock().unwrap().fail_leverage {
            return Err(ExecutionError::LeverageRejected {
                venue: self.venue,
                message: "code=4028 invalid leverage".to_string(),
            });
        }
        Ok(())
    }

    async fn get_balance(&self) -> Result<Decimal, ExecutionError> {
        self.simulate_latency().await;
        self.calls
            .lock()
            .unwrap()
            .push(MockCall::GetBalance { venue: self.venue });

        let config = self.config.lock().unwrap();
        if config.fail_balance {
            return Err(ExecutionError::BalanceUnavailable {
                venue: self.venue,
                message: "mock balance failure".to_string(),
            });
        }
        Ok(config.balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn mock_balance_roundtrip() {
        let venue = MockVenue::new(Venue::Binance);
        venue.set_balance(dec!(250.50));

        let balance = venue.get_balance().await.unwrap();
        assert_eq!(balance, dec!(250.50));
        assert_eq!(venue.calls(), vec![MockCall::GetBalance { venue: Venue::Binance }]);
    }

    #[tokio::test]
    async fn mock_records_order_sequence() {
        let venue = MockVenue::new(Venue::Mexc);
        venue
            .place_market_order("BTCUSDT", OrderSide::Buy, dec!(0.5), false)
            .await
            .unwrap();
        venue
            .place_market_order("BTCUSDT", OrderSide::Sell, dec!(0.5), true)
            .await
            .unwrap();

        let calls = venue.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(
            calls[0],
            MockCall::PlaceOrder { side: OrderSide::Buy, reduce_only: false, .. }
        ));
        assert!(matches!(
            calls[1],
            MockCall::PlaceOrder { side: OrderSide::Sell, reduce_only: true, .. }
        ));
        assert_eq!(venue.open_order_count(), 1);
    }

    #[tokio::test]
    async fn mock_failure_modes() {
        let venue = MockVenue::with_config(
            Venue::Binance,
            MockVenueConfig {
                fail_orders: true,
                fail_leverage: true,
                ..Default::default()
            },
        );

        let err = venue
            .place_market_order("BTCUSDT", OrderSide::Buy, dec!(1), false)
            .await
            .unwrap_err();
        assert_eq!(err.venue_code(), Some(-2019));

        assert!(venue.set_leverage("BTCUSDT", 3).await.is_err());
    }

    #[test]
    fn mock_feed_lookup_normalizes() {
        let venue = MockVenue::new(Venue::Mexc);
        venue.set_ticker("BTC_USDT", dec!(100), dec!(101), None, None);

        let tick = venue.best_price("BTCUSDT").unwrap();
        assert_eq!(tick.bid, dec!(100));
        assert!(venue.symbols().contains(&"BTCUSDT".to_string()));
        assert!(venue.is_connected());
    }
}
