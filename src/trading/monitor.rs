//! Periodic position lifecycle sweeps: timeout, convergence, shutdown.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::arbitrage::CrossPrices;
use crate::config::Config;
use crate::venue::VenueTable;

use super::coordinator::OrderCoordinator;
use super::position::{CloseReason, PositionPair};

/// Interval between timeout sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_millis(500);

/// Minimum seconds between price-history points per pair.
const PRICE_HISTORY_INTERVAL_SECS: i64 = 5;

/// Drives open pairs through the coordinator's close path.
pub struct LifecycleMonitor {
    config: Config,
    venues: VenueTable,
    coordinator: Arc<OrderCoordinator>,
}

impl LifecycleMonitor {
    /// Create a monitor over the shared coordinator.
    pub fn new(config: Config, venues: VenueTable, coordinator: Arc<OrderCoordinator>) -> Self {
        Self {
            config,
            venues,
            coordinator,
        }
    }

    /// One periodic sweep: close expired pairs, record price history,
    /// and refresh the observer position snapshot.
    pub async fn sweep(&self) {
        let now = OffsetDateTime::now_utc();
        for pair in self.coordinator.open_pairs() {
            let prices = self.current_exit_prices(&pair);

            if let Some((buy_price, sell_price)) = prices {
                let record_due = pair
                    .last_price_point_age(now)
                    .map(|age| age.whole_seconds() >= PRICE_HISTORY_INTERVAL_SECS)
                    .unwrap_or(true);
                if record_due {
                    self.coordinator
                        .record_price_point(&pair.id, buy_price, sell_price);
                }
            }

            if pair.timed_out(now) {
                match prices {
                    Some((buy_price, sell_price)) => {
                        info!(pair = %pair.id, symbol = %pair.symbol, "Timeout deadline passed");
                        self.coordinator
                            .close(&pair.id, CloseReason::Timeout, buy_price, sell_price)
                            .await;
                    }
                    None => {
                        warn!(
                            pair = %pair.id,
                            symbol = %pair.symbol,
                            "Timed out but no current prices; retrying next sweep"
                        );
                    }
                }
            }
        }
        self.coordinator.notify_positions();
    }

    /// Convergence check, invoked on every live price update for an open
    /// symbol rather than on a timer.
    ///
    /// Divergence is the absolute percent gap between current cross-venue
    /// prices, not the spread: both prices drifting together can kill the
    /// economic rationale while the quoted spread stays wide.
    pub async fn check_convergence(&self, prices: &CrossPrices) {
        let updates = self.coordinator.apply_live_prices(prices);
        for update in updates {
            if update.divergence_pct <= self.config.convergence_threshold_pct {
                info!(
                    pair = %update.pair_id,
                    divergence = %update.divergence_pct,
                    threshold = %self.config.convergence_threshold_pct,
                    "Prices converged"
                );
                self.coordinator
                    .close(
                        &update.pair_id,
                        CloseReason::Convergence,
                        update.current_buy_price,
                        update.current_sell_price,
                    )
                    .await;
            } else {
                debug!(
                    pair = %update.pair_id,
                    divergence = %update.divergence_pct,
                    "Pair still divergent"
                );
            }
        }
    }

    /// Best-effort shutdown sweep: close everything that has a price.
    ///
    /// A pair with no available price on either venue is left open.
    pub async fn close_all(&self) {
        for pair in self.coordinator.open_pairs() {
            match self.current_exit_prices(&pair) {
                Some((buy_price, sell_price)) => {
                    self.coordinator
                        .close(&pair.id, CloseReason::ForceShutdown, buy_price, sell_price)
                        .await;
                }
                None => {
                    warn!(
                        pair = %pair.id,
                        symbol = %pair.symbol,
                        "No price available at shutdown; pair left open"
                    );
                }
            }
        }
    }

    /// Exit-side quotes for a pair: long venue bid, short venue ask.
    fn current_exit_prices(&self, pair: &PositionPair) -> Option<(Decimal, Decimal)> {
        let long_tick = self.venues.best_price(pair.long.venue, &pair.symbol)?;
        let short_tick = self.venues.best_price(pair.short.venue, &pair.symbol)?;
        Some((long_tick.bid, short_tick.ask))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SkipReason;
    use crate::observer::ObserverSet;
    use crate::trading::coordinator::OpenOutcome;
    use crate::trading::position::PairStatus;
    use crate::venue::{MockVenue, Venue, VenueHandle};
    use crate::arbitrage::ArbitrageOpportunity;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn test_config() -> Config {
        Config {
            min_spread_pct: dec!(0.5),
            binance_taker_fee_pct: Decimal::ZERO,
            mexc_taker_fee_pct: Decimal::ZERO,
            slippage_pct: dec!(0.05),
            position_size_usd: dec!(100),
            max_open_positions: 3,
            position_timeout_secs: 300,
            convergence_threshold_pct: dec!(0.1),
            leverage: 3,
            trading_enabled: true,
            dry_run: true,
            sim_balance: dec!(1000),
            order_cooldown_secs: 0,
            inter_leg_delay_ms: 0,
            display_spread_pct: dec!(0.05),
            rust_log: "info".to_string(),
            verbose: false,
        }
    }

    struct Setup {
        binance: Arc<MockVenue>,
        mexc: Arc<MockVenue>,
        coordinator: Arc<OrderCoordinator>,
        monitor: LifecycleMonitor,
    }

    fn test_setup(config: Config) -> Setup {
        let binance = Arc::new(MockVenue::new(Venue::Binance));
        let mexc = Arc::new(MockVenue::new(Venue::Mexc));
        let table = VenueTable::new(
            VenueHandle {
                feed: binance.clone(),
                execution: binance.clone(),
                taker_fee_pct: Decimal::ZERO,
            },
            VenueHandle {
                feed: mexc.clone(),
                execution: mexc.clone(),
                taker_fee_pct: Decimal::ZERO,
            },
        );
        let coordinator = Arc::new(OrderCoordinator::new(
            config.clone(),
            table.clone(),
            ObserverSet::empty(),
        ));
        let monitor = LifecycleMonitor::new(config, table, coordinator.clone());
        Setup {
            binance,
            mexc,
            coordinator,
            monitor,
        }
    }

    fn test_opportunity() -> ArbitrageOpportunity {
        ArbitrageOpportunity {
            symbol: "BTCUSDT".to_string(),
            buy_venue: Venue::Binance,
            sell_venue: Venue::Mexc,
            buy_price: dec!(100),
            sell_price: dec!(101),
            buy_qty: Some(dec!(50)),
            sell_qty: Some(dec!(50)),
            spread_pct: dec!(1),
            profit_pct: dec!(0.9),
            detected_at: OffsetDateTime::now_utc(),
        }
    }

    async fn open_pair(setup: &Setup) -> String {
        setup
            .binance
            .set_ticker("BTCUSDT", dec!(100), dec!(100.1), None, None);
        setup
            .mexc
            .set_ticker("BTC_USDT", dec!(101), dec!(101.1), None, None);
        match setup.coordinator.open(&test_opportunity()).await {
            OpenOutcome::Opened { pair_id } => pair_id,
            OpenOutcome::Skipped(reason) => panic!("open skipped: {reason}"),
        }
    }

    #[tokio::test]
    async fn sweep_leaves_unexpired_pairs_open() {
        let setup = test_setup(test_config());
        open_pair(&setup).await;

        setup.monitor.sweep().await;
        assert_eq!(setup.coordinator.open_pairs().len(), 1);
    }

    #[tokio::test]
    async fn sweep_closes_expired_pair_with_timeout_status() {
        let mut config = test_config();
        config.position_timeout_secs = 1;
        let setup = test_setup(config);
        let pair_id = open_pair(&setup).await;

        // Force the deadline into the past instead of sleeping it out.
        {
            let mut ledger = setup.coordinator.ledger_for_tests();
            let pair = ledger.open_pair_mut(&pair_id).unwrap();
            pair.timeout_at = Some(OffsetDateTime::now_utc() - time::Duration::seconds(1));
        }

        setup.monitor.sweep().await;

        assert!(setup.coordinator.open_pairs().is_empty());
        let closed = &setup.coordinator.closed_pairs()[0];
        assert_eq!(closed.status, PairStatus::TimeoutClosed);
        assert_eq!(closed.close_reason, Some(CloseReason::Timeout));
    }

    #[tokio::test]
    async fn unbounded_timeout_never_expires() {
        let mut config = test_config();
        config.position_timeout_secs = 0;
        let setup = test_setup(config);
        open_pair(&setup).await;

        assert!(setup.coordinator.open_pairs()[0].timeout_at.is_none());
        setup.monitor.sweep().await;
        assert_eq!(setup.coordinator.open_pairs().len(), 1);
    }

    #[tokio::test]
    async fn convergence_closes_even_when_spread_at_open_was_wide() {
        let setup = test_setup(test_config());
        let pair_id = open_pair(&setup).await;

        // Both venues converge to effectively the same price.
        let binance_tick = setup
            .binance
            .set_ticker("BTCUSDT", dec!(100.5), dec!(100.55), None, None);
        let mexc_tick = setup
            .mexc
            .set_ticker("BTC_USDT", dec!(100.5), dec!(100.52), None, None);
        let prices = CrossPrices {
            symbol: "BTCUSDT".to_string(),
            binance: binance_tick,
            mexc: mexc_tick,
        };

        setup.monitor.check_convergence(&prices).await;

        assert!(setup.coordinator.open_pairs().is_empty());
        let closed = &setup.coordinator.closed_pairs()[0];
        assert_eq!(closed.id, pair_id);
        assert_eq!(closed.status, PairStatus::ClosedByConvergence);
        assert_eq!(closed.close_reason, Some(CloseReason::Convergence));
    }

    #[tokio::test]
    async fn divergent_prices_do_not_close() {
        let setup = test_setup(test_config());
        open_pair(&setup).await;

        let prices = CrossPrices {
            symbol: "BTCUSDT".to_string(),
            binance: setup
                .binance
                .set_ticker("BTCUSDT", dec!(100), dec!(100.05), None, None),
            mexc: setup
                .mexc
                .set_ticker("BTC_USDT", dec!(101), dec!(101.05), None, None),
        };

        setup.monitor.check_convergence(&prices).await;
        assert_eq!(setup.coordinator.open_pairs().len(), 1);
    }

    #[tokio::test]
    async fn shutdown_closes_priced_pairs_and_keeps_unpriced() {
        let setup = test_setup(test_config());
        open_pair(&setup).await;

        // Second pair on a symbol whose prices then disappear.
        let mut other = test_opportunity();
        other.symbol = "ETHUSDT".to_string();
        assert!(matches!(
            setup.coordinator.open(&other).await,
            OpenOutcome::Opened { .. }
        ));

        setup.monitor.close_all().await;

        let open = setup.coordinator.open_pairs();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].symbol, "ETHUSDT");

        let closed = setup.coordinator.closed_pairs();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].close_reason, Some(CloseReason::ForceShutdown));
        assert_eq!(closed[0].status, PairStatus::Closed);
    }

    #[tokio::test]
    async fn gate_never_admits_second_pair_for_symbol() {
        let setup = test_setup(test_config());
        open_pair(&setup).await;

        let opp = test_opportunity();
        let view = setup.coordinator.gate_view(&opp.symbol);
        assert_eq!(
            crate::arbitrage::admit(&opp, view, true, 3),
            Err(SkipReason::SymbolAlreadyOpen)
        );
    }

    #[tokio::test]
    async fn sweep_records_price_history() {
        let setup = test_setup(test_config());
        let pair_id = open_pair(&setup).await;

        setup.monitor.sweep().await;

        let pair = setup
            .coordinator
            .open_pairs()
            .into_iter()
            .find(|p| p.id == pair_id)
            .unwrap();
        assert_eq!(pair.price_history.len(), 1);
        // long on Binance: bid; short on MEXC: ask
        assert_eq!(pair.price_history[0].long_venue_price, dec!(100));
        assert_eq!(pair.price_history[0].short_venue_price, dec!(101.1));
    }
}
