//! Spread and profitability calculations for cross-venue opportunities.

use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;

use crate::venue::{TickerPrice, Venue};

/// Latest quotes for one instrument on both venues.
#[derive(Debug, Clone)]
pub struct CrossPrices {
    /// Venue-neutral symbol.
    pub symbol: String,
    /// Latest Binance quote.
    pub binance: TickerPrice,
    /// Latest MEXC quote.
    pub mexc: TickerPrice,
}

impl CrossPrices {
    /// Quote for one venue.
    pub fn get(&self, venue: Venue) -> &TickerPrice {
        match venue {
            Venue::Binance => &self.binance,
            Venue::Mexc => &self.mexc,
        }
    }

    /// The crossed direction this instant, if any.
    ///
    /// Returns (buy venue, sell venue) when one venue's ask is strictly
    /// below the other's bid. No crossing means no opportunity this tick,
    /// not even a zero-value one.
    pub fn crossing(&self) -> Option<(Venue, Venue)> {
        if self.binance.ask < self.mexc.bid {
            Some((Venue::Binance, Venue::Mexc))
        } else if self.mexc.ask < self.binance.bid {
            Some((Venue::Mexc, Venue::Binance))
        } else {
            None
        }
    }
}

/// Derived, immutable snapshot of a qualifying price discrepancy.
#[derive(Debug, Clone, Serialize)]
pub struct ArbitrageOpportunity {
    /// Venue-neutral symbol.
    pub symbol: String,
    /// Venue to buy (long leg).
    pub buy_venue: Venue,
    /// Venue to sell (short leg).
    pub sell_venue: Venue,
    /// Ask on the buy venue.
    pub buy_price: Decimal,
    /// Bid on the sell venue.
    pub sell_price: Decimal,
    /// Visible ask-side quantity on the buy venue.
    pub buy_qty: Option<Decimal>,
    /// Visible bid-side quantity on the sell venue.
    pub sell_qty: Option<Decimal>,
    /// Raw spread percent.
    pub spread_pct: Decimal,
    /// Spread after taker fees and slippage allowance.
    pub profit_pct: Decimal,
    /// When the opportunity was detected.
    #[serde(with = "time::serde::rfc3339")]
    pub detected_at: OffsetDateTime,
}

/// Spread percent between a buy price and a sell price.
pub fn spread_pct(buy_price: Decimal, sell_price: Decimal) -> Decimal {
    if buy_price <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (sell_price - buy_price) / buy_price * Decimal::ONE_HUNDRED
}

/// Post-fee profit percent for a crossing.
///
/// Taker fees on both venues and the configured slippage allowance are
/// taken off the crossing prices before the profit is derived.
pub fn net_profit_pct(
    buy_price: Decimal,
    sell_price: Decimal,
    buy_fee_pct: Decimal,
    sell_fee_pct: Decimal,
    slippage_pct: Decimal,
) -> Decimal {
    let effective_buy =
        buy_price * (Decimal::ONE + (buy_fee_pct + slippage_pct) / Decimal::ONE_HUNDRED);
    let effective_sell =
        sell_price * (Decimal::ONE - (sell_fee_pct + slippage_pct) / Decimal::ONE_HUNDRED);
    spread_pct(effective_buy, effective_sell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tick(venue: Venue, bid: Decimal, ask: Decimal) -> TickerPrice {
        TickerPrice {
            venue,
            symbol: "BTCUSDT".to_string(),
            bid,
            ask,
            bid_qty: None,
            ask_qty: None,
            at: OffsetDateTime::now_utc(),
        }
    }

    fn cross(b_bid: Decimal, b_ask: Decimal, m_bid: Decimal, m_ask: Decimal) -> CrossPrices {
        CrossPrices {
            symbol: "BTCUSDT".to_string(),
            binance: tick(Venue::Binance, b_bid, b_ask),
            mexc: tick(Venue::Mexc, m_bid, m_ask),
        }
    }

    #[test]
    fn spread_pct_formula() {
        assert_eq!(spread_pct(dec!(100), dec!(101)), dec!(1));
        assert!(spread_pct(dec!(100), dec!(100.5)) > Decimal::ZERO);
        assert_eq!(spread_pct(Decimal::ZERO, dec!(100)), Decimal::ZERO);
    }

    #[test]
    fn crossing_buy_binance_sell_mexc() {
        // Binance ask 100.0 < MEXC bid 101.0
        let prices = cross(dec!(99.8), dec!(100.0), dec!(101.0), dec!(101.2));
        assert_eq!(prices.crossing(), Some((Venue::Binance, Venue::Mexc)));
    }

    #[test]
    fn crossing_buy_mexc_sell_binance() {
        let prices = cross(dec!(101.0), dec!(101.2), dec!(99.8), dec!(100.0));
        assert_eq!(prices.crossing(), Some((Venue::Mexc, Venue::Binance)));
    }

    #[test]
    fn no_crossing_when_books_overlap_normally() {
        let prices = cross(dec!(99.9), dec!(100.1), dec!(99.9), dec!(100.1));
        assert_eq!(prices.crossing(), None);
    }

    #[test]
    fn touching_prices_do_not_cross() {
        // ask == bid is not a strict crossing
        let prices = cross(dec!(99.8), dec!(100.0), dec!(100.0), dec!(100.2));
        assert_eq!(prices.crossing(), None);
    }

    #[test]
    fn net_profit_is_below_raw_spread() {
        let raw = spread_pct(dec!(100), dec!(101));
        let net = net_profit_pct(dec!(100), dec!(101), dec!(0.05), dec!(0.02), dec!(0.05));
        assert!(net < raw);
        assert!(net > Decimal::ZERO);
    }

    #[test]
    fn fees_can_turn_profit_negative() {
        let net = net_profit_pct(dec!(100), dec!(100.05), dec!(0.05), dec!(0.05), dec!(0.05));
        assert!(net < Decimal::ZERO);
    }
}
