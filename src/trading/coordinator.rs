//! Two-leg order sequencing against both venues.
//!
//! All remote mutations funnel through this type: it owns the ledger,
//! enforces the single-flight guard and minimum inter-order spacing, and
//! carries the leg-level partial-failure policy.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use time::OffsetDateTime;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

use crate::arbitrage::{simulate_fill, ArbitrageOpportunity, CrossPrices, FillKind, GateView};
use crate::config::{Config, MAX_POSITION_NOTIONAL_USD};
use crate::error::{SkipReason, SkippedOpportunity, TradingErrorRecord};
use crate::observer::ObserverSet;
use crate::venue::{OrderSide, Venue, VenueTable};

use super::ledger::{PositionLedger, SessionStats};
use super::position::{
    CloseReason, PairStatus, Position, PositionPair, PositionSide, PositionStatus,
};

/// At most one leg sequence in flight; the lock being held *is* the
/// Placing state, so the invariant is structural rather than a counter.
#[derive(Debug, Default)]
struct FlightState {
    last_order_at: Option<Instant>,
}

/// Result of an open attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// Pair opened and inserted into the ledger.
    Opened {
        /// Identifier of the new pair.
        pair_id: String,
    },
    /// Opportunity recorded as skipped.
    Skipped(SkipReason),
}

/// Live-price refresh result for one open pair.
#[derive(Debug, Clone)]
pub struct LiveUpdate {
    /// Pair that was refreshed.
    pub pair_id: String,
    /// Cross-venue divergence after the refresh.
    pub divergence_pct: Decimal,
    /// Current exit-side price on the long leg's venue.
    pub current_buy_price: Decimal,
    /// Current exit-side price on the short leg's venue.
    pub current_sell_price: Decimal,
}

/// Sequences the two dependent remote leg mutations per pair.
pub struct OrderCoordinator {
    config: Config,
    venues: VenueTable,
    ledger: Mutex<PositionLedger>,
    flight: AsyncMutex<FlightState>,
    observers: ObserverSet,
}

impl OrderCoordinator {
    /// Create a coordinator with a fresh ledger at the simulated balance.
    pub fn new(config: Config, venues: VenueTable, observers: ObserverSet) -> Self {
        let ledger = PositionLedger::new(config.sim_balance);
        Self {
            config,
            venues,
            ledger: Mutex::new(ledger),
            flight: AsyncMutex::new(FlightState::default()),
            observers,
        }
    }

    // === Narrow read methods over the owned ledger ===

    /// Gate view for one symbol.
    pub fn gate_view(&self, symbol: &str) -> GateView {
        let ledger = self.ledger.lock().unwrap();
        GateView {
            symbol_open: ledger.has_open_symbol(symbol),
            open_count: ledger.open_count(),
        }
    }

    /// Snapshot of open pairs.
    pub fn open_pairs(&self) -> Vec<PositionPair> {
        self.ledger.lock().unwrap().open_pairs()
    }

    /// Snapshot of closed history.
    pub fn closed_pairs(&self) -> Vec<PositionPair> {
        self.ledger.lock().unwrap().closed_pairs()
    }

    /// Snapshot of skipped opportunities.
    pub fn skipped(&self) -> Vec<SkippedOpportunity> {
        self.ledger.lock().unwrap().skipped()
    }

    /// Snapshot of trading errors.
    pub fn errors(&self) -> Vec<TradingErrorRecord> {
        self.ledger.lock().unwrap().errors()
    }

    /// Current balance.
    pub fn balance(&self) -> Decimal {
        self.ledger.lock().unwrap().balance()
    }

    /// Balance at construction.
    pub fn initial_balance(&self) -> Decimal {
        self.ledger.lock().unwrap().initial_balance()
    }

    /// Win/loss counters.
    pub fn stats(&self) -> SessionStats {
        self.ledger.lock().unwrap().stats()
    }

    /// Record a gate-level skip.
    pub fn record_skip(&self, opportunity: &ArbitrageOpportunity, reason: SkipReason) {
        info!(symbol = %opportunity.symbol, %reason, "Opportunity skipped");
        self.ledger.lock().unwrap().record_skip(SkippedOpportunity {
            at: OffsetDateTime::now_utc(),
            symbol: opportunity.symbol.clone(),
            reason,
            spread_pct: opportunity.spread_pct,
            profit_pct: opportunity.profit_pct,
        });
    }

    /// Refresh live spread/divergence for every open pair on a symbol.
    ///
    /// Runs before any profitability gating so pairs opened at a wider
    /// spread keep receiving updates. Exit-side quotes are used: the long
    /// leg's venue bid and the short leg's venue ask.
    pub fn apply_live_prices(&self, prices: &CrossPrices) -> Vec<LiveUpdate> {
        let mut ledger = self.ledger.lock().unwrap();
        let updated = ledger.update_live_prices(&prices.symbol, |pair| {
            (
                prices.get(pair.long.venue).bid,
                prices.get(pair.short.venue).ask,
            )
        });
        drop(ledger);

        let by_id: std::collections::HashMap<String, Decimal> = updated.into_iter().collect();
        self.open_pairs()
            .into_iter()
            .filter(|p| by_id.contains_key(&p.id))
            .map(|p| LiveUpdate {
                divergence_pct: by_id[&p.id],
                current_buy_price: prices.get(p.long.venue).bid,
                current_sell_price: prices.get(p.short.venue).ask,
                pair_id: p.id,
            })
            .collect()
    }

    /// Append a bounded price-history point to one open pair.
    pub fn record_price_point(
        &self,
        pair_id: &str,
        long_venue_price: Decimal,
        short_venue_price: Decimal,
    ) {
        let mut ledger = self.ledger.lock().unwrap();
        if let Some(pair) = ledger.open_pair_mut(pair_id) {
            pair.record_price_point(long_venue_price, short_venue_price);
        }
    }

    /// Notify observers with the current open-position snapshot.
    pub fn notify_positions(&self) {
        self.observers.positions(&self.open_pairs());
    }

    // === Open path ===

    /// Open an offsetting two-leg position for an opportunity.
    pub async fn open(&self, opportunity: &ArbitrageOpportunity) -> OpenOutcome {
        // Single-flight guard: never interleave two leg sequences.
        let mut flight = match self.flight.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                self.record_skip(opportunity, SkipReason::RateLimitPending);
                return OpenOutcome::Skipped(SkipReason::RateLimitPending);
            }
        };

        self.sleep_out_spacing(&flight).await;

        let required_capital = self.config.position_size_usd * Decimal::TWO;
        {
            let ledger = self.ledger.lock().unwrap();
            if ledger.balance() < required_capital {
                warn!(
                    symbol = %opportunity.symbol,
                    required = %required_capital,
                    available = %ledger.balance(),
                    "Insufficient balance"
                );
                drop(ledger);
                self.record_skip(opportunity, SkipReason::InsufficientBalance);
                return OpenOutcome::Skipped(SkipReason::InsufficientBalance);
            }
        }

        // Simulated fills: buy leg eats ask-side depth, sell leg bid-side.
        let buy_fill = simulate_fill(
            self.config.position_size_usd,
            opportunity.buy_price,
            opportunity.buy_qty,
            self.config.slippage_pct,
        );
        let sell_fill = simulate_fill(
            self.config.position_size_usd,
            opportunity.sell_price,
            opportunity.sell_qty,
            self.config.slippage_pct,
        );
        for (side, fill) in [("buy", &buy_fill), ("sell", &sell_fill)] {
            if fill.kind == FillKind::Partial {
                warn!(
                    symbol = %opportunity.symbol,
                    side,
                    slippage_cost = %fill.slippage_cost_usd,
                    "Thin book: fill extends past visible depth"
                );
                self.observers.event(format!(
                    "liquidity warning: {} {} leg slips ${:.4}",
                    opportunity.symbol, side, fill.slippage_cost_usd
                ));
            }
        }

        let opened_at = OffsetDateTime::now_utc();
        let pair_id = format!(
            "{}-{}",
            opportunity.symbol,
            opened_at.unix_timestamp_nanos() / 1_000_000
        );

        let long = self.build_leg(
            &pair_id,
            opportunity,
            PositionSide::Long,
            opportunity.buy_venue,
            buy_fill.avg_price,
            opened_at,
        );
        let short = self.build_leg(
            &pair_id,
            opportunity,
            PositionSide::Short,
            opportunity.sell_venue,
            sell_fill.avg_price,
            opened_at,
        );

        if !self.config.dry_run {
            if let Err(reason) = self.place_open_legs(opportunity, &long, &short).await {
                self.record_skip(opportunity, reason);
                return OpenOutcome::Skipped(reason);
            }
        }

        let timeout_at = if self.config.timeout_enabled() {
            Some(opened_at + time::Duration::seconds(self.config.position_timeout_secs as i64))
        } else {
            None
        };

        let pair = PositionPair {
            id: pair_id.clone(),
            symbol: opportunity.symbol.clone(),
            long,
            short,
            spread_at_open_pct: opportunity.spread_pct,
            live_spread_pct: opportunity.spread_pct,
            live_divergence_pct: opportunity.spread_pct,
            expected_profit_pct: opportunity.profit_pct,
            actual_profit_pct: None,
            status: PairStatus::Open,
            opened_at,
            closed_at: None,
            timeout_at,
            close_reason: None,
            price_history: Vec::new(),
            buy_price_at_open: opportunity.buy_price,
            sell_price_at_open: opportunity.sell_price,
        };

        {
            let mut ledger = self.ledger.lock().unwrap();
            ledger.insert_pair(pair);
            if self.config.dry_run {
                ledger.debit(required_capital);
            }
        }
        if !self.config.dry_run {
            self.reconcile_balances().await;
        }

        flight.last_order_at = Some(Instant::now());

        info!(
            pair = %pair_id,
            symbol = %opportunity.symbol,
            buy = %opportunity.buy_venue,
            sell = %opportunity.sell_venue,
            spread = %opportunity.spread_pct,
            profit = %opportunity.profit_pct,
            "Pair opened"
        );
        self.observers.event(format!(
            "opened {} buy {} @ {} / sell {} @ {} (spread {:.4}%)",
            opportunity.symbol,
            opportunity.buy_venue,
            buy_fill.avg_price,
            opportunity.sell_venue,
            sell_fill.avg_price,
            opportunity.spread_pct
        ));
        self.notify_positions();

        OpenOutcome::Opened { pair_id }
    }

    fn build_leg(
        &self,
        pair_id: &str,
        opportunity: &ArbitrageOpportunity,
        side: PositionSide,
        venue: Venue,
        entry_price: Decimal,
        opened_at: OffsetDateTime,
    ) -> Position {
        let quantity = if entry_price.is_zero() {
            Decimal::ZERO
        } else {
            self.config.position_size_usd / entry_price
        };
        Position {
            id: format!("{}-{}", pair_id, side),
            symbol: opportunity.symbol.clone(),
            venue,
            side,
            entry_price,
            exit_price: None,
            quantity,
            notional_usd: self.config.position_size_usd,
            leverage: self.config.leverage,
            status: PositionStatus::Open,
            opened_at,
            closed_at: None,
            pnl_usd: None,
            pnl_pct: None,
        }
    }

    /// Live-mode leg placement: safety re-checks, leverage, long then
    /// short with the inter-leg delay.
    async fn place_open_legs(
        &self,
        opportunity: &ArbitrageOpportunity,
        long: &Position,
        short: &Position,
    ) -> Result<(), SkipReason> {
        if self.config.position_size_usd > MAX_POSITION_NOTIONAL_USD {
            error!(
                size = %self.config.position_size_usd,
                cap = %MAX_POSITION_NOTIONAL_USD,
                "Per-leg notional above hard safety cap"
            );
            return Err(SkipReason::PositionSizeTooLarge);
        }
        if self.ledger.lock().unwrap().open_count() >= self.config.max_open_positions {
            return Err(SkipReason::MaxPositionsReached);
        }

        // Leverage failures are non-fatal: record and continue unset.
        for leg in [long, short] {
            let execution = &self.venues.get(leg.venue).execution;
            if let Err(err) = execution
                .set_leverage(&leg.symbol, self.config.leverage)
                .await
            {
                warn!(venue = %leg.venue, error = %err, "Leverage set failed, continuing");
                self.ledger.lock().unwrap().record_error(
                    TradingErrorRecord::from_execution(&leg.symbol, "set_leverage", &err),
                );
            }
        }

        // Long leg first. A failure here aborts the whole open: the short
        // leg is never placed.
        let buy_execution = &self.venues.get(long.venue).execution;
        if let Err(err) = buy_execution
            .place_market_order(&long.symbol, OrderSide::Buy, long.quantity, false)
            .await
        {
            error!(venue = %long.venue, error = %err, "Long leg failed, aborting open");
            self.ledger.lock().unwrap().record_error(
                TradingErrorRecord::from_execution(&long.symbol, "open_long_leg", &err)
                    .with_context(format!("qty={} price={}", long.quantity, long.entry_price)),
            );
            return Err(SkipReason::OrderCreationFailed);
        }

        tokio::time::sleep(Duration::from_millis(self.config.inter_leg_delay_ms)).await;

        // Short leg. A failure leaves the long leg live with no hedge;
        // recorded distinctly, not auto-remediated.
        let sell_execution = &self.venues.get(short.venue).execution;
        if let Err(err) = sell_execution
            .place_market_order(&short.symbol, OrderSide::Sell, short.quantity, false)
            .await
        {
            error!(
                venue = %short.venue,
                error = %err,
                "Short leg failed: long leg is live without a hedge"
            );
            self.observers.event(format!(
                "UNHEDGED: {} long leg live on {} with no short",
                opportunity.symbol, long.venue
            ));
            self.ledger.lock().unwrap().record_error(
                TradingErrorRecord::from_execution(&short.symbol, "open_short_leg", &err)
                    .with_context(format!("qty={} price={}", short.quantity, short.entry_price))
                    .unhedged(),
            );
            return Err(SkipReason::OrderCreationFailed);
        }

        Ok(())
    }

    // === Close path ===

    /// Close a pair. Idempotent: a pair already removed is a no-op.
    pub async fn close(
        &self,
        pair_id: &str,
        reason: CloseReason,
        current_buy_price: Decimal,
        current_sell_price: Decimal,
    ) -> bool {
        // Close sequences queue on the same guard that serializes opens.
        let mut flight = self.flight.lock().await;

        // Removing the pair up front makes duplicate triggers no-ops
        // before any remote call happens.
        let Some(mut pair) = self.ledger.lock().unwrap().take_pair(pair_id) else {
            return false;
        };

        let pnl = pair.close(
            reason,
            current_buy_price,
            current_sell_price,
            self.config.round_trip_fee_pct(),
        );

        if !self.config.dry_run {
            self.place_close_legs(&pair).await;
        }

        let total_notional = pair.total_notional_usd();
        {
            let mut ledger = self.ledger.lock().unwrap();
            if self.config.dry_run {
                ledger.credit(total_notional + pnl.pnl_usd);
            }
            ledger.append_closed(pair.clone(), pnl.pnl_usd);
        }
        if !self.config.dry_run {
            self.reconcile_balances().await;
        }

        flight.last_order_at = Some(Instant::now());

        info!(
            pair = %pair.id,
            symbol = %pair.symbol,
            %reason,
            pnl_pct = %pnl.pnl_pct,
            pnl_usd = %pnl.pnl_usd,
            "Pair closed"
        );
        self.observers.event(format!(
            "closed {} ({}) pnl {:.4}% / ${:.4}",
            pair.symbol, reason, pnl.pnl_pct, pnl.pnl_usd
        ));
        self.notify_positions();

        true
    }

    /// Reduce-only closes for both legs. A failed leg is recorded but
    /// never blocks removing the pair; retrying a stale close is out of
    /// scope.
    async fn place_close_legs(&self, pair: &PositionPair) {
        let long_execution = &self.venues.get(pair.long.venue).execution;
        if let Err(err) = long_execution
            .place_market_order(&pair.symbol, OrderSide::Sell, pair.long.quantity, true)
            .await
        {
            warn!(venue = %pair.long.venue, error = %err, "Long close leg failed");
            self.ledger.lock().unwrap().record_error(
                TradingErrorRecord::from_execution(&pair.symbol, "close_long_leg", &err),
            );
        }

        tokio::time::sleep(Duration::from_millis(self.config.inter_leg_delay_ms)).await;

        let short_execution = &self.venues.get(pair.short.venue).execution;
        if let Err(err) = short_execution
            .place_market_order(&pair.symbol, OrderSide::Buy, pair.short.quantity, true)
            .await
        {
            warn!(venue = %pair.short.venue, error = %err, "Short close leg failed");
            self.ledger.lock().unwrap().record_error(
                TradingErrorRecord::from_execution(&pair.symbol, "close_short_leg", &err),
            );
        }
    }

    // === Shared helpers ===

    async fn sleep_out_spacing(&self, flight: &FlightState) {
        if let Some(last) = flight.last_order_at {
            let min = Duration::from_secs(self.config.order_cooldown_secs);
            let elapsed = last.elapsed();
            if elapsed < min {
                tokio::time::sleep(min - elapsed).await;
            }
        }
    }

    /// Direct ledger access for crate-internal tests.
    #[cfg(test)]
    pub(crate) fn ledger_for_tests(&self) -> std::sync::MutexGuard<'_, PositionLedger> {
        self.ledger.lock().unwrap()
    }

    /// Re-fetch both venues' balances and keep the minimum positive one.
    ///
    /// Both venues margin the same strategy, so the conservative floor is
    /// the binding constraint. Fetch failures are non-fatal and recorded.
    async fn reconcile_balances(&self) {
        let mut balances: Vec<Decimal> = Vec::new();
        for venue in Venue::ALL {
            match self.venues.get(venue).execution.get_balance().await {
                Ok(balance) if balance > Decimal::ZERO => balances.push(balance),
                Ok(_) => {}
                Err(err) => {
                    warn!(venue = %venue, error = %err, "Balance fetch failed");
                    self.ledger.lock().unwrap().record_error(
                        TradingErrorRecord::from_execution("", "get_balance", &err),
                    );
                }
            }
        }
        if let Some(min) = balances.into_iter().min() {
            self.ledger.lock().unwrap().set_balance(min);
        }
    }
}
