//! End-to-end engine tests over mock venues.
//!
//! Everything here drives the public tick pipeline: scanner, gate,
//! coordinator, and lifecycle monitor wired exactly as the binary wires
//! them, with scripted prices instead of live feeds.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use cross_arb::config::Config;
use cross_arb::engine::Engine;
use cross_arb::error::SkipReason;
use cross_arb::observer::ObserverSet;
use cross_arb::trading::{CloseReason, PairStatus};
use cross_arb::venue::{MockCall, MockVenue, OrderSide, Venue, VenueHandle, VenueTable};

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

fn setup(config: Config) -> (Arc<MockVenue>, Arc<MockVenue>, Engine) {
    let binance = Arc::new(MockVenue::new(Venue::Binance));
    let mexc = Arc::new(MockVenue::new(Venue::Mexc));
    binance.set_balance(config.sim_balance);
    mexc.set_balance(config.sim_balance);
    let venues = VenueTable::new(
        VenueHandle {
            feed: binance.clone(),
            execution: binance.clone(),
            taker_fee_pct: config.binance_taker_fee_pct,
        },
        VenueHandle {
            feed: mexc.clone(),
            execution: mexc.clone(),
            taker_fee_pct: config.mexc_taker_fee_pct,
        },
    );
    let engine = Engine::new(config, venues, ObserverSet::empty());
    (binance, mexc, engine)
}

/// Publish a 1% BTC spread (buy Binance, sell MEXC) and tick the engine.
async fn open_btc_pair(binance: &MockVenue, mexc: &MockVenue, engine: &Engine) {
    mexc.set_ticker("BTC_USDT", dec!(101), dec!(101.1), Some(dec!(10)), Some(dec!(10)));
    let tick = binance.set_ticker("BTCUSDT", dec!(99.9), dec!(100), Some(dec!(10)), Some(dec!(10)));
    engine.on_tick(&tick).await;
}

#[tokio::test]
async fn qualifying_spread_opens_exactly_one_pair() {
    let (binance, mexc, engine) = setup(test_config());

    open_btc_pair(&binance, &mexc, &engine).await;

    let coordinator = engine.coordinator();
    let open = coordinator.open_pairs();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].symbol, "BTCUSDT");
    assert_eq!(open[0].long.venue, Venue::Binance);
    assert_eq!(open[0].short.venue, Venue::Mexc);
    assert_eq!(coordinator.balance(), dec!(800));

    // The same spread again is gated, not doubled up.
    open_btc_pair(&binance, &mexc, &engine).await;
    assert_eq!(coordinator.open_pairs().len(), 1);
    assert!(coordinator
        .skipped()
        .iter()
        .any(|s| s.reason == SkipReason::SymbolAlreadyOpen));
}

#[tokio::test]
async fn convergence_tick_closes_the_pair() {
    let (binance, mexc, engine) = setup(test_config());
    open_btc_pair(&binance, &mexc, &engine).await;

    // Prices meet in the middle; divergence drops under the threshold.
    mexc.set_ticker("BTC_USDT", dec!(100.48), dec!(100.52), None, None);
    let tick = binance.set_ticker("BTCUSDT", dec!(100.48), dec!(100.52), None, None);
    engine.on_tick(&tick).await;

    let coordinator = engine.coordinator();
    assert!(coordinator.open_pairs().is_empty());

    let closed = coordinator.closed_pairs();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].status, PairStatus::ClosedByConvergence);
    assert_eq!(closed[0].close_reason, Some(CloseReason::Convergence));

    // Zero fees and symmetric convergence: the blended PnL is positive.
    let stats = coordinator.stats();
    assert_eq!(stats.wins, 1);
    assert_eq!(stats.losses, 0);
    assert_eq!(coordinator.balance(), dec!(1000) + stats.net_pnl_usd());
}

#[tokio::test]
async fn sweep_closes_timed_out_pair() {
    let mut config = test_config();
    config.position_timeout_secs = 1;
    let (binance, mexc, engine) = setup(config);
    open_btc_pair(&binance, &mexc, &engine).await;

    tokio::time::sleep(Duration::from_millis(1200)).await;
    engine.sweep().await;

    let coordinator = engine.coordinator();
    assert!(coordinator.open_pairs().is_empty());
    let closed = coordinator.closed_pairs();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].status, PairStatus::TimeoutClosed);
}

#[tokio::test]
async fn shutdown_force_closes_and_reports() {
    let (binance, mexc, engine) = setup(test_config());
    open_btc_pair(&binance, &mexc, &engine).await;

    let report = engine.shutdown().await;

    assert_eq!(report.closed_pairs.len(), 1);
    assert_eq!(report.closed_pairs[0].close_reason, Some(CloseReason::ForceShutdown));
    assert!(report.open_at_shutdown.is_empty());
    assert_eq!(report.initial_balance_usd, dec!(1000));
    assert_eq!(
        report.final_balance_usd,
        dec!(1000) + report.stats.net_pnl_usd()
    );

    let text = report.to_string();
    assert!(text.contains("SESSION SUMMARY"));
    assert!(serde_json::to_string(&report).unwrap().contains("closed_pairs"));
}

#[tokio::test]
async fn live_pipeline_places_legs_in_order() {
    let mut config = test_config();
    config.dry_run = false;
    let (binance, mexc, engine) = setup(config);

    open_btc_pair(&binance, &mexc, &engine).await;
    assert_eq!(engine.coordinator().open_pairs().len(), 1);

    let binance_orders: Vec<MockCall> = binance
        .calls()
        .into_iter()
        .filter(|c| matches!(c, MockCall::PlaceOrder { .. }))
        .collect();
    assert!(matches!(
        binance_orders[0],
        MockCall::PlaceOrder { side: OrderSide::Buy, reduce_only: false, .. }
    ));
    assert!(matches!(
        mexc.calls().last(),
        Some(MockCall::GetBalance { .. })
    ));
    assert!(mexc.calls().iter().any(|c| matches!(
        c,
        MockCall::PlaceOrder { side: OrderSide::Sell, reduce_only: false, .. }
    )));
}

#[tokio::test]
async fn live_short_leg_failure_leaves_unhedged_record() {
    let mut config = test_config();
    config.dry_run = false;
    let (binance, mexc, engine) = setup(config);
    mexc.set_fail_orders(true);

    open_btc_pair(&binance, &mexc, &engine).await;

    let coordinator = engine.coordinator();
    assert!(coordinator.open_pairs().is_empty());
    assert!(coordinator
        .skipped()
        .iter()
        .any(|s| s.reason == SkipReason::OrderCreationFailed));

    let errors = coordinator.errors();
    let unhedged: Vec<_> = errors.iter().filter(|e| e.unhedged).collect();
    assert_eq!(unhedged.len(), 1);
    assert_eq!(unhedged[0].operation, "open_short_leg");
    assert_eq!(unhedged[0].code, Some(-2019));
}

#[tokio::test]
async fn max_positions_caps_distinct_symbols() {
    let mut config = test_config();
    config.max_open_positions = 2;
    let (binance, mexc, engine) = setup(config);

    for (symbol, mexc_symbol, base) in [
        ("BTCUSDT", "BTC_USDT", dec!(100)),
        ("ETHUSDT", "ETH_USDT", dec!(50)),
        ("SOLUSDT", "SOL_USDT", dec!(20)),
    ] {
        mexc.set_ticker(mexc_symbol, base * dec!(1.01), base * dec!(1.011), None, None);
        let tick = binance.set_ticker(symbol, base * dec!(0.999), base, None, None);
        engine.on_tick(&tick).await;
    }

    let coordinator = engine.coordinator();
    assert_eq!(coordinator.open_pairs().len(), 2);
    assert!(coordinator
        .skipped()
        .iter()
        .any(|s| s.symbol == "SOLUSDT" && s.reason == SkipReason::NoFreeSlots));
}
