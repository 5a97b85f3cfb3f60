//! End-of-session report assembled from the coordinator's ledger.

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;

use crate::error::{SkippedOpportunity, TradingErrorRecord};
use crate::trading::{OrderCoordinator, PositionPair, SessionStats};

/// Everything the session did, suitable for both terminal display and
/// JSON export.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    /// When the session started.
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    /// When the report was generated.
    #[serde(with = "time::serde::rfc3339")]
    pub ended_at: OffsetDateTime,
    /// Balance at session start.
    pub initial_balance_usd: Decimal,
    /// Balance when the report was generated.
    pub final_balance_usd: Decimal,
    /// Win/loss counters and cumulative PnL.
    pub stats: SessionStats,
    /// Pairs closed during the session.
    pub closed_pairs: Vec<PositionPair>,
    /// Pairs still open at shutdown (no price available).
    pub open_at_shutdown: Vec<PositionPair>,
    /// Opportunities skipped with reasons.
    pub skipped: Vec<SkippedOpportunity>,
    /// Trading errors encountered.
    pub errors: Vec<TradingErrorRecord>,
}

impl SessionReport {
    /// Snapshot the coordinator's current state into a report.
    pub fn capture(coordinator: &OrderCoordinator, started_at: OffsetDateTime) -> Self {
        Self {
            started_at,
            ended_at: OffsetDateTime::now_utc(),
            initial_balance_usd: coordinator.initial_balance(),
            final_balance_usd: coordinator.balance(),
            stats: coordinator.stats(),
            closed_pairs: coordinator.closed_pairs(),
            open_at_shutdown: coordinator.open_pairs(),
            skipped: coordinator.skipped(),
            errors: coordinator.errors(),
        }
    }

    /// Balance change over the session.
    pub fn balance_change_usd(&self) -> Decimal {
        self.final_balance_usd - self.initial_balance_usd
    }

    /// Session length in whole seconds.
    pub fn duration_secs(&self) -> i64 {
        (self.ended_at - self.started_at).whole_seconds()
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "╔══════════════════════════════════════════╗")?;
        writeln!(f, "║             SESSION SUMMARY              ║")?;
        writeln!(f, "╠══════════════════════════════════════════╣")?;
        writeln!(f, "║ Duration:        {:>20}s ║", self.duration_secs())?;
        writeln!(f, "║ Initial balance: {:>20.2}$ ║", self.initial_balance_usd)?;
        writeln!(f, "║ Final balance:   {:>20.2}$ ║", self.final_balance_usd)?;
        writeln!(f, "║ Net change:      {:>20.2}$ ║", self.balance_change_usd())?;
        writeln!(f, "╠══════════════════════════════════════════╣")?;
        writeln!(f, "║ Pairs closed:    {:>21} ║", self.closed_pairs.len())?;
        writeln!(f, "║ Wins / losses:   {:>10} / {:<8} ║", self.stats.wins, self.stats.losses)?;
        writeln!(f, "║ Total profit:    {:>20.4}$ ║", self.stats.total_profit_usd)?;
        writeln!(f, "║ Total loss:      {:>20.4}$ ║", self.stats.total_loss_usd)?;
        writeln!(f, "║ Net PnL:         {:>20.4}$ ║", self.stats.net_pnl_usd())?;
        writeln!(f, "╠══════════════════════════════════════════╣")?;
        writeln!(f, "║ Open at exit:    {:>21} ║", self.open_at_shutdown.len())?;
        writeln!(f, "║ Skipped:         {:>21} ║", self.skipped.len())?;
        writeln!(f, "║ Errors:          {:>21} ║", self.errors.len())?;
        writeln!(f, "╚══════════════════════════════════════════╝")?;

        if !self.closed_pairs.is_empty() {
            writeln!(f)?;
            writeln!(f, "Closed pairs:")?;
            for pair in &self.closed_pairs {
                writeln!(
                    f,
                    "  {} [{}] spread {:.4}% -> pnl {:.4}%",
                    pair.symbol,
                    pair.status,
                    pair.spread_at_open_pct,
                    pair.actual_profit_pct.unwrap_or_default()
                )?;
            }
        }
        if !self.open_at_shutdown.is_empty() {
            writeln!(f)?;
            writeln!(f, "Still open (no exit price at shutdown):")?;
            for pair in &self.open_at_shutdown {
                writeln!(f, "  {} opened {}", pair.symbol, pair.opened_at)?;
            }
        }
        if !self.errors.is_empty() {
            writeln!(f)?;
            writeln!(f, "Errors:")?;
            for err in &self.errors {
                writeln!(
                    f,
                    "  [{}] {} {}{}: {}",
                    err.operation,
                    err.venue.map(|v| v.to_string()).unwrap_or_default(),
                    err.symbol,
                    if err.unhedged { " (UNHEDGED)" } else { "" },
                    err.message
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_report() -> SessionReport {
        let started = OffsetDateTime::now_utc() - time::Duration::seconds(90);
        SessionReport {
            started_at: started,
            ended_at: OffsetDateTime::now_utc(),
            initial_balance_usd: dec!(1000),
            final_balance_usd: dec!(1004.25),
            stats: SessionStats {
                wins: 3,
                losses: 1,
                total_profit_usd: dec!(5.25),
                total_loss_usd: dec!(-1.00),
            },
            closed_pairs: Vec::new(),
            open_at_shutdown: Vec::new(),
            skipped: Vec::new(),
            errors: Vec::new(),
        }
    }

    #[test]
    fn balance_change_and_duration() {
        let report = test_report();
        assert_eq!(report.balance_change_usd(), dec!(4.25));
        assert!(report.duration_secs() >= 90);
    }

    #[test]
    fn renders_summary_box() {
        let text = test_report().to_string();
        assert!(text.contains("SESSION SUMMARY"));
        assert!(text.contains("3"));
        assert!(text.contains("4.25"));
    }

    #[test]
    fn serializes_to_json() {
        let json = serde_json::to_string(&test_report()).unwrap();
        assert!(json.contains("\"wins\":3"));
        assert!(json.contains("final_balance_usd"));
    }
}
