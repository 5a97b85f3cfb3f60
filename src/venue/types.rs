//! Venue identity and market-data types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::OffsetDateTime;

/// One of the two trading venues the engine arbitrages between.
///
/// Adding a venue means extending this enum and the capability table,
/// not duplicating call sites.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    /// Binance USDT-margined futures.
    #[strum(serialize = "binance", serialize = "BINANCE", to_string = "Binance")]
    Binance,
    /// MEXC USDT-margined futures.
    #[strum(serialize = "mexc", to_string = "MEXC")]
    Mexc,
}

impl Venue {
    /// Both venues, in fixed iteration order.
    pub const ALL: [Venue; 2] = [Venue::Binance, Venue::Mexc];

    /// Get the counterpart venue.
    pub fn other(&self) -> Self {
        match self {
            Venue::Binance => Venue::Mexc,
            Venue::Mexc => Venue::Binance,
        }
    }
}

/// Best bid/ask snapshot for one instrument on one venue.
///
/// Ephemeral: replaced on every tick, read-only to the core.
#[derive(Debug, Clone, Serialize)]
pub struct TickerPrice {
    /// Venue the quote came from.
    pub venue: Venue,
    /// Instrument symbol in the venue's native form.
    pub symbol: String,
    /// Best bid price.
    pub bid: Decimal,
    /// Best ask price.
    pub ask: Decimal,
    /// Visible quantity at the best bid, when the feed provides it.
    pub bid_qty: Option<Decimal>,
    /// Visible quantity at the best ask, when the feed provides it.
    pub ask_qty: Option<Decimal>,
    /// When the quote was observed.
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
}

impl TickerPrice {
    /// Venue-neutral form of the symbol.
    pub fn normalized_symbol(&self) -> String {
        normalize_symbol(&self.symbol)
    }
}

/// Normalize a venue-native symbol to a venue-neutral form.
///
/// MEXC quotes contracts as `BTC_USDT`, Binance as `BTCUSDT`; the neutral
/// form strips separators and uppercases.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_uppercase()
}
