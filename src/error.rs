//! Unified error types for the arbitrage engine.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::venue::Venue;

/// Unified error type for the arbitrage engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Venue execution error.
    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// A venue was unreachable during the startup health check.
    #[error("venue {venue} unreachable at startup")]
    VenueUnreachable {
        /// The venue that failed the health check.
        venue: Venue,
    },

    /// The two venues share no tradable instruments.
    #[error("no common tradable symbols between venues")]
    NoCommonSymbols,

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single remote venue call.
#[derive(Error, Debug, Clone)]
pub enum ExecutionError {
    /// The venue rejected the order.
    #[error("order rejected by {venue}: {message}")]
    OrderRejected {
        /// Venue that rejected the order.
        venue: Venue,
        /// Raw rejection text from the venue.
        message: String,
    },

    /// Setting leverage failed (always non-fatal to callers).
    #[error("leverage change rejected by {venue}: {message}")]
    LeverageRejected {
        /// Venue that rejected the change.
        venue: Venue,
        /// Raw rejection text from the venue.
        message: String,
    },

    /// Balance fetch failed (auth or network).
    #[error("balance fetch failed on {venue}: {message}")]
    BalanceUnavailable {
        /// Venue that failed.
        venue: Venue,
        /// Failure description.
        message: String,
    },

    /// Network-level failure before a venue response.
    #[error("network error on {venue}: {message}")]
    Network {
        /// Venue being called.
        venue: Venue,
        /// Failure description.
        message: String,
    },
}

impl ExecutionError {
    /// The venue the failed call targeted.
    pub fn venue(&self) -> Venue {
        match self {
            Self::OrderRejected { venue, .. }
            | Self::LeverageRejected { venue, .. }
            | Self::BalanceUnavailable { venue, .. }
            | Self::Network { venue, .. } => *venue,
        }
    }

    /// The raw message text carried by the error.
    pub fn message(&self) -> &str {
        match self {
            Self::OrderRejected { message, .. }
            | Self::LeverageRejected { message, .. }
            | Self::BalanceUnavailable { message, .. }
            | Self::Network { message, .. } => message,
        }
    }

    /// Numeric venue error code embedded in the message, if any.
    pub fn venue_code(&self) -> Option<i64> {
        parse_venue_code(self.message())
    }
}

static VENUE_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bcode\b["'\s:=]*(-?\d+)"#).unwrap());

/// Extract a numeric error code from raw venue rejection text.
///
/// Venues embed codes in inconsistent shapes (`"code":-2019`, `code=1002`,
/// `Code: 700003`); this pulls out the first one found.
pub fn parse_venue_code(message: &str) -> Option<i64> {
    VENUE_CODE_RE
        .captures(message)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Business-decision skip: recorded, never retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    /// Trading is disabled by configuration.
    TradingDisabled,
    /// The symbol already has an open pair.
    SymbolAlreadyOpen,
    /// The open-position count is at the configured maximum.
    NoFreeSlots,
    /// Current balance cannot cover both legs.
    InsufficientBalance,
    /// Another leg sequence is already in flight.
    RateLimitPending,
    /// Per-leg notional exceeds the hard safety cap.
    PositionSizeTooLarge,
    /// Open-slot limit re-check failed inside the live path.
    MaxPositionsReached,
    /// A remote leg placement failed.
    OrderCreationFailed,
}

/// Append-only audit record for a skipped opportunity.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedOpportunity {
    /// When the skip was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
    /// Instrument symbol.
    pub symbol: String,
    /// Why the opportunity was not acted on.
    pub reason: SkipReason,
    /// Spread at detection time.
    pub spread_pct: Decimal,
    /// Post-fee profit at detection time.
    pub profit_pct: Decimal,
}

/// Append-only audit record for a trading error.
#[derive(Debug, Clone, Serialize)]
pub struct TradingErrorRecord {
    /// When the error occurred.
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
    /// Instrument symbol involved.
    pub symbol: String,
    /// Operation that failed (e.g. "open_long_leg").
    pub operation: String,
    /// Venue the failed call targeted, if any.
    pub venue: Option<Venue>,
    /// Numeric venue error code parsed from the message, if present.
    pub code: Option<i64>,
    /// Error message.
    pub message: String,
    /// Free-form context (quantity/price involved).
    pub context: Option<String>,
    /// True when a long leg was left live with no short hedge.
    pub unhedged: bool,
}

impl TradingErrorRecord {
    /// Build a record from a venue execution error.
    pub fn from_execution(symbol: &str, operation: &str, err: &ExecutionError) -> Self {
        Self {
            at: OffsetDateTime::now_utc(),
            symbol: symbol.to_string(),
            operation: operation.to_string(),
            venue: Some(err.venue()),
            code: err.venue_code(),
            message: err.to_string(),
            context: None,
            unhedged: false,
        }
    }

    /// Attach free-form context to the record.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Mark the record as an unhedged-leg failure.
    pub fn unhedged(mut self) -> Self {
        self.unhedged = true;
        self
    }
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_style_code() {
        assert_eq!(parse_venue_code(r#"{"code":-2019,"msg":"Margin"}"#), Some(-2019));
    }

    #[test]
    fn parses_key_value_code() {
        assert_eq!(parse_venue_code("rejected, code=1002 forbidden"), Some(1002));
        assert_eq!(parse_venue_code("Code: 700003 signature invalid"), Some(700003));
    }

    #[test]
    fn no_code_yields_none() {
        assert_eq!(parse_venue_code("connection reset by peer"), None);
    }

    #[test]
    fn execution_error_exposes_code() {
        let err = ExecutionError::OrderRejected {
            venue: Venue::Mexc,
            message: r#"{"code":600001,"msg":"oversized"}"#.to_string(),
        };
        assert_eq!(err.venue(), Venue::Mexc);
        assert_eq!(err.venue_code(), Some(600001));
    }

    #[test]
    fn unhedged_record_is_flagged() {
        let err = ExecutionError::OrderRejected {
            venue: Venue::Binance,
            message: "rejected".to_string(),
        };
        let record = TradingErrorRecord::from_execution("BTCUSDT", "open_short_leg", &err)
            .with_context("qty=0.5")
            .unhedged();
        assert!(record.unhedged);
        assert_eq!(record.context.as_deref(), Some("qty=0.5"));
    }
}
