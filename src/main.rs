//! Cross-venue arbitrage engine entry point.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cross_arb::config::Config;
use cross_arb::engine::Engine;
use cross_arb::observer::{LogObserver, ObserverSet};
use cross_arb::trading::SWEEP_INTERVAL;
use cross_arb::utils::shutdown_signal;
use cross_arb::venue::{MockVenue, Venue, VenueHandle, VenueTable};

/// Cross-venue futures arbitrage engine.
#[derive(Parser, Debug)]
#[command(name = "cross-arb")]
#[command(about = "Cross-venue futures arbitrage engine (Binance/MEXC)")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the engine against simulated venues (default).
    Run {
        /// Override DRY_RUN from the environment.
        #[arg(long)]
        dry_run: Option<bool>,
    },

    /// Check configuration validity.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("cross_arb=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(),
        Some(Command::Run { dry_run }) => cmd_run(dry_run).await,
        None => cmd_run(None).await,
    }
}

/// Check configuration validity.
fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("CROSS-ARB - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Min Spread: {}%", config.min_spread_pct);
    println!(
        "  Taker Fees: Binance {}% / MEXC {}%",
        config.binance_taker_fee_pct, config.mexc_taker_fee_pct
    );
    println!("  Position Size: ${} per leg", config.position_size_usd);
    println!("  Max Open Positions: {}", config.max_open_positions);
    println!(
        "  Position Timeout: {}",
        if config.timeout_enabled() {
            format!("{}s", config.position_timeout_secs)
        } else {
            "disabled".to_string()
        }
    );
    println!("  Convergence Threshold: {}%", config.convergence_threshold_pct);
    println!("  Leverage: {}x", config.leverage);
    println!("  Trading Enabled: {}", config.trading_enabled);
    println!("  Dry Run: {}", config.dry_run);
    println!("  Order Cooldown: {}s", config.order_cooldown_secs);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Run the engine over simulated venues until interrupted.
async fn cmd_run(dry_run: Option<bool>) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(dry_run) = dry_run {
        config.dry_run = dry_run;
    }
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    // Live venue clients are not wired into this binary; the engine only
    // sees capability traits, so everything below runs on mock venues.
    if !config.dry_run {
        anyhow::bail!("live mode requires real venue clients; run with DRY_RUN=true");
    }

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

    // Seed both feeds so the startup overlap check has data.
    for &(symbol, base) in SYMBOLS {
        publish(&binance, &mexc, symbol, Decimal::from(base), 0);
    }

    let observers = ObserverSet::new(vec![Arc::new(LogObserver)]);
    let engine = Engine::new(config, venues, observers);
    engine.verify_startup()?;

    info!("Engine running on simulated venues; Ctrl-C to stop");
    tokio::select! {
        _ = shutdown_signal() => {}
        _ = drive(&engine, &binance, &mexc) => {}
    }

    let report = engine.shutdown().await;
    println!("{report}");
    Ok(())
}

/// Demo instruments and their base prices.
const SYMBOLS: &[(&str, i64)] = &[("BTCUSDT", 65_000), ("ETHUSDT", 3_200)];

/// Synthetic tick cadence.
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Synthetic tick loop: the MEXC price walks away from and back toward
/// the Binance price, so spreads open, qualify, and then converge.
async fn drive(engine: &Engine, binance: &MockVenue, mexc: &MockVenue) {
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    let ticks_per_sweep =
        (SWEEP_INTERVAL.as_millis() / TICK_INTERVAL.as_millis()).max(1) as u64;
    let mut step: u64 = 0;

    loop {
        interval.tick().await;
        step += 1;

        for (i, &(symbol, base)) in SYMBOLS.iter().enumerate() {
            // Phase-shift the second symbol so closes interleave.
            let (binance_tick, mexc_tick) = publish(
                binance,
                mexc,
                symbol,
                Decimal::from(base),
                step + (i as u64) * 60,
            );
            engine.on_tick(&binance_tick).await;
            engine.on_tick(&mexc_tick).await;
        }

        if step % ticks_per_sweep == 0 {
            engine.sweep().await;
        }
    }
}

/// Publish one synthetic tick per venue and return both.
fn publish(
    binance: &MockVenue,
    mexc: &MockVenue,
    symbol: &str,
    base: Decimal,
    step: u64,
) -> (cross_arb::venue::TickerPrice, cross_arb::venue::TickerPrice) {
    // Triangle wave over 240 steps: divergence ramps 0 -> 1.2% -> 0.
    const PERIOD: u64 = 240;
    let pos = (step % PERIOD) as i64;
    let half = (PERIOD / 2) as i64;
    let delta = if pos < half { pos } else { PERIOD as i64 - pos };
    let offset_pct = Decimal::from(delta) * dec!(1.2) / Decimal::from(half);

    let half_spread = base * dec!(0.0002);
    let mexc_mid = base * (Decimal::ONE + offset_pct / Decimal::ONE_HUNDRED);

    let binance_tick = binance.set_ticker(
        symbol,
        base - half_spread,
        base + half_spread,
        Some(dec!(5)),
        Some(dec!(5)),
    );
    let mexc_tick = mexc.set_ticker(
        symbol,
        mexc_mid - half_spread,
        mexc_mid + half_spread,
        Some(dec!(5)),
        Some(dec!(5)),
    );
    (binance_tick, mexc_tick)
}
