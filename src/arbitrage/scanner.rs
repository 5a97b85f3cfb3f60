//! Per-tick spread scanning across both venues.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::debug;

use crate::config::Config;
use crate::venue::{TickerPrice, Venue, VenueTable};

use super::opportunity::{net_profit_pct, spread_pct, ArbitrageOpportunity, CrossPrices};

/// Minimum interval between scanner snapshot refreshes.
const DISPLAY_REFRESH: Duration = Duration::from_millis(500);

/// Live display entry for one symbol.
#[derive(Debug, Clone, Serialize)]
pub struct OpportunitySnapshot {
    /// Venue-neutral symbol.
    pub symbol: String,
    /// Venue to buy.
    pub buy_venue: Venue,
    /// Venue to sell.
    pub sell_venue: Venue,
    /// Raw spread percent.
    pub spread_pct: Decimal,
    /// Post-fee profit percent.
    pub profit_pct: Decimal,
}

#[derive(Default)]
struct DisplayCache {
    entries: HashMap<String, OpportunitySnapshot>,
    last_refresh: Option<Instant>,
    dirty: bool,
}

/// Consumes one price update at a time and derives cross-venue spreads.
///
/// Stateless beyond the throttled display cache; position bookkeeping
/// stays with the ledger.
pub struct SpreadScanner {
    config: Config,
    display: Mutex<DisplayCache>,
}

impl SpreadScanner {
    /// Create a scanner from config.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            display: Mutex::new(DisplayCache::default()),
        }
    }

    /// Pair an incoming tick with the counterpart venue's cached quote.
    ///
    /// `None` until the other venue has been seen for this instrument.
    pub fn cross_prices(&self, tick: &TickerPrice, venues: &VenueTable) -> Option<CrossPrices> {
        let symbol = tick.normalized_symbol();
        let counterpart = venues.best_price(tick.venue.other(), &symbol)?;

        let (binance, mexc) = match tick.venue {
            Venue::Binance => (tick.clone(), counterpart),
            Venue::Mexc => (counterpart, tick.clone()),
        };

        Some(CrossPrices { symbol, binance, mexc })
    }

    /// Evaluate one tick's cross prices for a qualifying opportunity.
    ///
    /// The display cache is refreshed for any spread above the display
    /// floor; an opportunity is emitted only at or above the configured
    /// minimum spread. Profitability is computed but is not a gate here.
    pub fn evaluate(&self, prices: &CrossPrices, venues: &VenueTable) -> Option<ArbitrageOpportunity> {
        let (buy_venue, sell_venue) = prices.crossing()?;
        let buy_tick = prices.get(buy_venue);
        let sell_tick = prices.get(sell_venue);

        let buy_price = buy_tick.ask;
        let sell_price = sell_tick.bid;
        let spread = spread_pct(buy_price, sell_price);

        let profit = net_profit_pct(
            buy_price,
            sell_price,
            venues.taker_fee_pct(buy_venue),
            venues.taker_fee_pct(sell_venue),
            self.config.slippage_pct,
        );

        if spread >= self.config.display_spread_pct {
            self.update_display(OpportunitySnapshot {
                symbol: prices.symbol.clone(),
                buy_venue,
                sell_venue,
                spread_pct: spread,
                profit_pct: profit,
            });
        }

        if spread < self.config.min_spread_pct {
            debug!(
                symbol = %prices.symbol,
                spread = %spread,
                min = %self.config.min_spread_pct,
                "Spread below minimum"
            );
            return None;
        }

        Some(ArbitrageOpportunity {
            symbol: prices.symbol.clone(),
            buy_venue,
            sell_venue,
            buy_price,
            sell_price,
            buy_qty: buy_tick.ask_qty,
            sell_qty: sell_tick.bid_qty,
            spread_pct: spread,
            profit_pct: profit,
            detected_at: OffsetDateTime::now_utc(),
        })
    }

    fn update_display(&self, entry: OpportunitySnapshot) {
        let mut cache = self.display.lock().unwrap();
        cache.entries.insert(entry.symbol.clone(), entry);
        cache.dirty = true;
    }

    /// Top live opportunities by profit, at most every 500 ms.
    ///
    /// Returns `None` when nothing changed or the refresh interval has
    /// not elapsed, regardless of tick rate.
    pub fn snapshot(&self, top_n: usize) -> Option<Vec<OpportunitySnapshot>> {
        let mut cache = self.display.lock().unwrap();
        if !cache.dirty {
            return None;
        }
        if let Some(last) = cache.last_refresh {
            if last.elapsed() < DISPLAY_REFRESH {
                return None;
            }
        }
        cache.last_refresh = Some(Instant::now());
        cache.dirty = false;

        let mut entries: Vec<OpportunitySnapshot> = cache.entries.values().cloned().collect();
        entries.sort_by(|a, b| b.profit_pct.cmp(&a.profit_pct));
        entries.truncate(top_n);
        Some(entries)
    }
}
