//! Tick-driven engine wiring the scanner, gate, coordinator, and
//! lifecycle monitor together.

use std::collections::HashSet;
use std::sync::Arc;

use time::OffsetDateTime;
use tracing::info;

use crate::arbitrage::{admit, SpreadScanner};
use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::observer::ObserverSet;
use crate::report::SessionReport;
use crate::trading::{LifecycleMonitor, OpenOutcome, OrderCoordinator};
use crate::venue::{TickerPrice, Venue, VenueTable};

/// How many live opportunities observers see per refresh.
const TOP_OPPORTUNITIES: usize = 10;

/// The engine: consumes venue ticks, produces position lifecycle.
///
/// Everything downstream of a tick is synchronous except the order
/// paths; the engine itself holds no position state.
pub struct Engine {
    config: Config,
    venues: VenueTable,
    scanner: SpreadScanner,
    coordinator: Arc<OrderCoordinator>,
    monitor: LifecycleMonitor,
    observers: ObserverSet,
    started_at: OffsetDateTime,
}

impl Engine {
    /// Wire up an engine over a venue table.
    pub fn new(config: Config, venues: VenueTable, observers: ObserverSet) -> Self {
        let coordinator = Arc::new(OrderCoordinator::new(
            config.clone(),
            venues.clone(),
            observers.clone(),
        ));
        let monitor = LifecycleMonitor::new(config.clone(), venues.clone(), coordinator.clone());
        Self {
            scanner: SpreadScanner::new(config.clone()),
            config,
            venues,
            coordinator,
            monitor,
            observers,
            started_at: OffsetDateTime::now_utc(),
        }
    }

    /// Shared coordinator handle.
    pub fn coordinator(&self) -> Arc<OrderCoordinator> {
        self.coordinator.clone()
    }

    /// Health check both venues and the instrument overlap.
    ///
    /// Fails fast on an unreachable venue or an empty symbol
    /// intersection; trading against one-sided data is never attempted.
    pub fn verify_startup(&self) -> Result<()> {
        for venue in Venue::ALL {
            if !self.venues.get(venue).feed.is_connected() {
                return Err(EngineError::VenueUnreachable { venue });
            }
        }

        let binance: HashSet<String> =
            self.venues.get(Venue::Binance).feed.symbols().into_iter().collect();
        let mexc: HashSet<String> =
            self.venues.get(Venue::Mexc).feed.symbols().into_iter().collect();
        let common = binance.intersection(&mexc).count();
        if common == 0 {
            return Err(EngineError::NoCommonSymbols);
        }

        info!(
            symbols = common,
            dry_run = self.config.dry_run,
            trading_enabled = self.config.trading_enabled,
            "Startup checks passed"
        );
        Ok(())
    }

    /// Process one best-price update from either venue.
    ///
    /// Convergence runs before the profitability gate so open pairs keep
    /// receiving live prices even when the current spread is worthless.
    pub async fn on_tick(&self, tick: &TickerPrice) {
        let Some(prices) = self.scanner.cross_prices(tick, &self.venues) else {
            return;
        };

        self.monitor.check_convergence(&prices).await;

        let opportunity = self.scanner.evaluate(&prices, &self.venues);
        if let Some(snapshot) = self.scanner.snapshot(TOP_OPPORTUNITIES) {
            self.observers.opportunities(&snapshot);
        }
        let Some(opportunity) = opportunity else {
            return;
        };

        let view = self.coordinator.gate_view(&opportunity.symbol);
        match admit(
            &opportunity,
            view,
            self.config.trading_enabled,
            self.config.max_open_positions,
        ) {
            Ok(()) => {
                if let OpenOutcome::Opened { pair_id } = self.coordinator.open(&opportunity).await {
                    info!(pair = %pair_id, symbol = %opportunity.symbol, "Engine opened pair");
                }
            }
            Err(reason) => self.coordinator.record_skip(&opportunity, reason),
        }
    }

    /// One periodic lifecycle sweep (timeouts, price history).
    pub async fn sweep(&self) {
        self.monitor.sweep().await;
    }

    /// Close what can be closed, flush observers, and capture the
    /// session report.
    pub async fn shutdown(&self) -> SessionReport {
        info!("Shutting down: closing open pairs");
        self.monitor.close_all().await;
        self.observers.positions_now(&self.coordinator.open_pairs());
        self.report()
    }

    /// Session report for the current state, without closing anything.
    pub fn report(&self) -> SessionReport {
        SessionReport::capture(&self.coordinator, self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venue::{MockVenue, MockVenueConfig, VenueHandle};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

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

    fn test_engine(config: Config) -> (Arc<MockVenue>, Arc<MockVenue>, Engine) {
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
        let engine = Engine::new(config, table, ObserverSet::empty());
        (binance, mexc, engine)
    }

    #[test]
    fn startup_fails_on_disconnected_venue() {
        let binance = Arc::new(MockVenue::with_config(
            Venue::Binance,
            MockVenueConfig {
                disconnected: true,
                ..Default::default()
            },
        ));
        let mexc = Arc::new(MockVenue::new(Venue::Mexc));
        let table = VenueTable::new(
            VenueHandle {
                feed: binance.clone(),
                execution: binance,
                taker_fee_pct: Decimal::ZERO,
            },
            VenueHandle {
                feed: mexc.clone(),
                execution: mexc,
                taker_fee_pct: Decimal::ZERO,
            },
        );
        let engine = Engine::new(test_config(), table, ObserverSet::empty());

        assert!(matches!(
            engine.verify_startup(),
            Err(EngineError::VenueUnreachable { venue: Venue::Binance })
        ));
    }

    #[test]
    fn startup_fails_without_common_symbols() {
        let (binance, mexc, engine) = test_engine(test_config());
        binance.set_ticker("BTCUSDT", dec!(100), dec!(100.1), None, None);
        mexc.set_ticker("SOL_USDT", dec!(30), dec!(30.1), None, None);

        assert!(matches!(
            engine.verify_startup(),
            Err(EngineError::NoCommonSymbols)
        ));
    }

    #[test]
    fn startup_passes_with_overlap() {
        let (binance, mexc, engine) = test_engine(test_config());
        binance.set_ticker("BTCUSDT", dec!(100), dec!(100.1), None, None);
        mexc.set_ticker("BTC_USDT", dec!(101), dec!(101.1), None, None);

        assert!(engine.verify_startup().is_ok());
    }

    #[tokio::test]
    async fn tick_pipeline_opens_on_qualifying_spread() {
        let (binance, mexc, engine) = test_engine(test_config());

        mexc.set_ticker("BTC_USDT", dec!(101), dec!(101.1), None, None);
        let tick = binance.set_ticker("BTCUSDT", dec!(99.9), dec!(100), None, None);

        engine.on_tick(&tick).await;

        let coordinator = engine.coordinator();
        assert_eq!(coordinator.open_pairs().len(), 1);
        assert_eq!(coordinator.open_pairs()[0].symbol, "BTCUSDT");
    }

    #[tokio::test]
    async fn trading_disabled_records_skip_instead() {
        let mut config = test_config();
        config.trading_enabled = false;
        let (binance, mexc, engine) = test_engine(config);

        mexc.set_ticker("BTC_USDT", dec!(101), dec!(101.1), None, None);
        let tick = binance.set_ticker("BTCUSDT", dec!(99.9), dec!(100), None, None);

        engine.on_tick(&tick).await;

        let coordinator = engine.coordinator();
        assert!(coordinator.open_pairs().is_empty());
        assert_eq!(
            coordinator.skipped()[0].reason,
            crate::error::SkipReason::TradingDisabled
        );
    }
}
