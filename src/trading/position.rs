//! Position and position-pair records.

use rust_decimal::Decimal;
use serde::Serialize;
use strum::Display;
use time::{Duration, OffsetDateTime};

use crate::venue::Venue;

/// Bounded length of a pair's rolling price history.
const PRICE_HISTORY_CAP: usize = 120;

/// Side of one leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum PositionSide {
    /// Long leg on the cheap venue.
    Long,
    /// Short leg on the expensive venue.
    Short,
}

/// Status of one leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum PositionStatus {
    /// Leg is live.
    Open,
    /// Leg has been closed.
    Closed,
}

/// Status of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PairStatus {
    /// Both legs live.
    Open,
    /// Closed by convergence-independent reasons (manual, shutdown).
    Closed,
    /// Closed because the timeout deadline passed.
    TimeoutClosed,
    /// Closed because cross-venue prices converged.
    ///
    /// Kept distinct from `Closed` so reports can tell convergence exits
    /// apart from manual and shutdown closes.
    ClosedByConvergence,
}

/// Why a pair was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    /// Timeout deadline passed.
    Timeout,
    /// Cross-venue prices converged.
    Convergence,
    /// Operator-initiated close.
    Manual,
    /// Shutdown sweep.
    ForceShutdown,
}

impl CloseReason {
    /// The pair status a close with this reason produces.
    pub fn final_status(&self) -> PairStatus {
        match self {
            CloseReason::Timeout => PairStatus::TimeoutClosed,
            CloseReason::Convergence => PairStatus::ClosedByConvergence,
            CloseReason::Manual | CloseReason::ForceShutdown => PairStatus::Closed,
        }
    }
}

/// One leg of an arbitrage pair.
///
/// Mutated only at close time; read-only in between.
#[derive(Debug, Clone, Serialize)]
pub struct Position {
    /// Leg identifier.
    pub id: String,
    /// Venue-neutral symbol.
    pub symbol: String,
    /// Venue holding the leg.
    pub venue: Venue,
    /// Long or short.
    pub side: PositionSide,
    /// Volume-weighted entry fill price, never the raw quote.
    pub entry_price: Decimal,
    /// Exit price, set on close.
    pub exit_price: Option<Decimal>,
    /// Quantity in coin.
    pub quantity: Decimal,
    /// Notional size in USD.
    pub notional_usd: Decimal,
    /// Leverage applied at the venue.
    pub leverage: u32,
    /// Leg status.
    pub status: PositionStatus,
    /// When the leg was opened.
    #[serde(with = "time::serde::rfc3339")]
    pub opened_at: OffsetDateTime,
    /// When the leg was closed.
    #[serde(with = "time::serde::rfc3339::option")]
    pub closed_at: Option<OffsetDateTime>,
    /// Realized gross PnL in USD.
    pub pnl_usd: Option<Decimal>,
    /// Realized gross PnL as percent of entry.
    pub pnl_pct: Option<Decimal>,
}

impl Position {
    /// Gross PnL percent at a hypothetical exit price.
    ///
    /// Long legs gain when exit > entry; short legs gain when entry >
    /// exit. Fees are applied at pair level, not here.
    pub fn gross_pnl_pct(&self, exit_price: Decimal) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        let raw = match self.side {
            PositionSide::Long => exit_price - self.entry_price,
            PositionSide::Short => self.entry_price - exit_price,
        };
        raw / self.entry_price * Decimal::ONE_HUNDRED
    }

    /// Mark the leg closed at the given exit price.
    pub fn close(&mut self, exit_price: Decimal, at: OffsetDateTime) {
        let pct = self.gross_pnl_pct(exit_price);
        self.exit_price = Some(exit_price);
        self.pnl_pct = Some(pct);
        self.pnl_usd = Some(pct / Decimal::ONE_HUNDRED * self.notional_usd);
        self.status = PositionStatus::Closed;
        self.closed_at = Some(at);
    }
}

/// One recorded point of a pair's price history.
#[derive(Debug, Clone, Serialize)]
pub struct PricePoint {
    /// When the point was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
    /// Current price on the long leg's venue.
    pub long_venue_price: Decimal,
    /// Current price on the short leg's venue.
    pub short_venue_price: Decimal,
    /// Cross-venue divergence percent at this point.
    pub divergence_pct: Decimal,
}

/// The unit of the ledger: a long and a short leg opened together.
#[derive(Debug, Clone, Serialize)]
pub struct PositionPair {
    /// Pair identifier.
    pub id: String,
    /// Venue-neutral symbol.
    pub symbol: String,
    /// Long leg.
    pub long: Position,
    /// Short leg.
    pub short: Position,
    /// Spread percent at open.
    pub spread_at_open_pct: Decimal,
    /// Live spread percent, refreshed on every tick.
    pub live_spread_pct: Decimal,
    /// Live cross-venue divergence percent.
    pub live_divergence_pct: Decimal,
    /// Expected post-fee profit percent at open.
    pub expected_profit_pct: Decimal,
    /// Realized profit percent, set on close.
    pub actual_profit_pct: Option<Decimal>,
    /// Pair status.
    pub status: PairStatus,
    /// When the pair was opened.
    #[serde(with = "time::serde::rfc3339")]
    pub opened_at: OffsetDateTime,
    /// When the pair was closed.
    #[serde(with = "time::serde::rfc3339::option")]
    pub closed_at: Option<OffsetDateTime>,
    /// Absolute timeout deadline; `None` never expires.
    #[serde(with = "time::serde::rfc3339::option")]
    pub timeout_at: Option<OffsetDateTime>,
    /// Why the pair was closed.
    pub close_reason: Option<CloseReason>,
    /// Rolling price history for reporting.
    pub price_history: Vec<PricePoint>,
    /// Buy-venue raw price at open.
    pub buy_price_at_open: Decimal,
    /// Sell-venue raw price at open.
    pub sell_price_at_open: Decimal,
}

/// Result of the pair close computation.
#[derive(Debug, Clone, Copy)]
pub struct ClosedPnl {
    /// Blended percent after round-trip fees.
    pub pnl_pct: Decimal,
    /// Dollar PnL on the combined notional.
    pub pnl_usd: Decimal,
}

impl PositionPair {
    /// Whether the timeout deadline has passed.
    pub fn timed_out(&self, now: OffsetDateTime) -> bool {
        match self.timeout_at {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }

    /// Combined notional of both legs.
    pub fn total_notional_usd(&self) -> Decimal {
        self.long.notional_usd + self.short.notional_usd
    }

    /// Refresh live spread/divergence from current cross-venue prices.
    pub fn update_live_prices(&mut self, long_venue_price: Decimal, short_venue_price: Decimal) {
        self.live_spread_pct = if long_venue_price.is_zero() {
            Decimal::ZERO
        } else {
            (short_venue_price - long_venue_price) / long_venue_price * Decimal::ONE_HUNDRED
        };
        self.live_divergence_pct = divergence_pct(long_venue_price, short_venue_price);
    }

    /// Append a bounded price-history point.
    pub fn record_price_point(&mut self, long_venue_price: Decimal, short_venue_price: Decimal) {
        if self.price_history.len() >= PRICE_HISTORY_CAP {
            self.price_history.remove(0);
        }
        self.price_history.push(PricePoint {
            at: OffsetDateTime::now_utc(),
            long_venue_price,
            short_venue_price,
            divergence_pct: divergence_pct(long_venue_price, short_venue_price),
        });
    }

    /// Age of the most recent history point, if any.
    pub fn last_price_point_age(&self, now: OffsetDateTime) -> Option<Duration> {
        self.price_history.last().map(|p| now - p.at)
    }

    /// Close both legs and realize PnL.
    ///
    /// Leg percentages are blended by simple average, then round-trip
    /// taker fees (both venues, open + close) are subtracted. Dollar PnL
    /// applies the blended percent to the combined notional.
    pub fn close(
        &mut self,
        reason: CloseReason,
        current_buy_price: Decimal,
        current_sell_price: Decimal,
        round_trip_fee_pct: Decimal,
    ) -> ClosedPnl {
        let now = OffsetDateTime::now_utc();

        let long_pct = self.long.gross_pnl_pct(current_buy_price);
        let short_pct = self.short.gross_pnl_pct(current_sell_price);
        self.long.close(current_buy_price, now);
        self.short.close(current_sell_price, now);

        let pnl_pct = (long_pct + short_pct) / Decimal::TWO - round_trip_fee_pct;
        let pnl_usd = pnl_pct / Decimal::ONE_HUNDRED * self.total_notional_usd();

        self.status = reason.final_status();
        self.close_reason = Some(reason);
        self.closed_at = Some(now);
        self.actual_profit_pct = Some(pnl_pct);

        ClosedPnl { pnl_pct, pnl_usd }
    }
}

/// Absolute percent difference between the current cross-venue prices.
///
/// Distinct from spread: both prices moving the same direction can erase
/// the economic rationale while the quoted spread stays wide.
pub fn divergence_pct(buy_side_price: Decimal, sell_side_price: Decimal) -> Decimal {
    if buy_side_price.is_zero() {
        return Decimal::ZERO;
    }
    ((sell_side_price - buy_side_price) / buy_side_price * Decimal::ONE_HUNDRED).abs()
}
