//! Application configuration loaded from environment variables.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Hard safety ceiling on per-leg notional in live mode (USD).
pub const MAX_POSITION_NOTIONAL_USD: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Detection Parameters ===
    /// Minimum cross-venue spread to qualify as an opportunity (percent).
    #[serde(default = "default_min_spread_pct")]
    pub min_spread_pct: Decimal,

    /// Taker fee on the first venue (percent per fill).
    #[serde(default = "default_binance_taker_fee_pct")]
    pub binance_taker_fee_pct: Decimal,

    /// Taker fee on the second venue (percent per fill).
    #[serde(default = "default_mexc_taker_fee_pct")]
    pub mexc_taker_fee_pct: Decimal,

    /// Slippage allowance applied past visible depth (percent).
    #[serde(default = "default_slippage_pct")]
    pub slippage_pct: Decimal,

    // === Position Parameters ===
    /// Per-leg notional size in USD.
    #[serde(default = "default_position_size_usd")]
    pub position_size_usd: Decimal,

    /// Maximum simultaneously open pairs.
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,

    /// Seconds before an open pair is force-closed (0 = never).
    #[serde(default = "default_position_timeout_secs")]
    pub position_timeout_secs: u64,

    /// Cross-venue divergence at or below which a pair is closed (percent).
    #[serde(default = "default_convergence_threshold_pct")]
    pub convergence_threshold_pct: Decimal,

    /// Leverage requested on each venue at open time.
    #[serde(default = "default_leverage")]
    pub leverage: u32,

    // === Operation Modes ===
    /// Master switch; when false the gate skips every opportunity.
    #[serde(default = "default_true")]
    pub trading_enabled: bool,

    /// Simulation mode (no real orders).
    #[serde(default = "default_true")]
    pub dry_run: bool,

    /// Starting balance for simulation.
    #[serde(default = "default_sim_balance")]
    pub sim_balance: Decimal,

    // === Rate Limiting ===
    /// Minimum seconds between order sequences.
    #[serde(default = "default_order_cooldown")]
    pub order_cooldown_secs: u64,

    /// Delay between the two legs of a sequence in milliseconds.
    #[serde(default = "default_inter_leg_delay_ms")]
    pub inter_leg_delay_ms: u64,

    // === Display ===
    /// Minimum spread worth showing in the scanner snapshot (percent).
    #[serde(default = "default_display_spread_pct")]
    pub display_spread_pct: Decimal,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,
}

fn default_min_spread_pct() -> Decimal {
    Decimal::new(5, 1) // 0.5%
}

fn default_binance_taker_fee_pct() -> Decimal {
    Decimal::new(5, 2) // 0.05%
}

fn default_mexc_taker_fee_pct() -> Decimal {
    Decimal::new(2, 2) // 0.02%
}

fn default_slippage_pct() -> Decimal {
    Decimal::new(5, 2) // 0.05%
}

fn default_position_size_usd() -> Decimal {
    Decimal::new(100, 0) // $100 per leg
}

fn default_max_open_positions() -> usize {
    3
}

fn default_position_timeout_secs() -> u64 {
    300
}

fn default_convergence_threshold_pct() -> Decimal {
    Decimal::new(1, 1) // 0.1%
}

fn default_leverage() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_sim_balance() -> Decimal {
    Decimal::new(1000, 0) // $1000
}

fn default_order_cooldown() -> u64 {
    2
}

fn default_inter_leg_delay_ms() -> u64 {
    500
}

fn default_display_spread_pct() -> Decimal {
    Decimal::new(5, 2) // 0.05%
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.position_size_usd <= Decimal::ZERO {
            return Err("POSITION_SIZE_USD must be positive".to_string());
        }

        if !self.dry_run && self.position_size_usd > MAX_POSITION_NOTIONAL_USD {
            return Err(format!(
                "POSITION_SIZE_USD exceeds the ${} live safety cap",
                MAX_POSITION_NOTIONAL_USD
            ));
        }

        if self.max_open_positions == 0 {
            return Err("MAX_OPEN_POSITIONS must be at least 1".to_string());
        }

        if self.min_spread_pct <= Decimal::ZERO {
            return Err("MIN_SPREAD_PCT must be positive".to_string());
        }

        if self.convergence_threshold_pct < Decimal::ZERO {
            return Err("CONVERGENCE_THRESHOLD_PCT must not be negative".to_string());
        }

        if self.leverage == 0 {
            return Err("LEVERAGE must be at least 1".to_string());
        }

        Ok(())
    }

    /// Round-trip taker fees for a pair: both venues, open and close.
    pub fn round_trip_fee_pct(&self) -> Decimal {
        (self.binance_taker_fee_pct + self.mexc_taker_fee_pct) * Decimal::TWO
    }

    /// Whether open pairs ever time out.
    pub fn timeout_enabled(&self) -> bool {
        self.position_timeout_secs > 0
    }
}
