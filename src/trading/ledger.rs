//! The system of record for positions, audit logs, and balance.
//!
//! Every mutation of position and balance state funnels through this
//! type. It is owned by the order coordinator behind a mutex and is never
//! exposed mutably; other components see narrow read/command methods.

use rust_decimal::Decimal;

use crate::error::{SkippedOpportunity, TradingErrorRecord};

use super::position::PositionPair;

/// Win/loss and cumulative profit counters.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SessionStats {
    /// Pairs closed at a profit.
    pub wins: u64,
    /// Pairs closed at a loss.
    pub losses: u64,
    /// Sum of positive close PnLs (USD).
    pub total_profit_usd: Decimal,
    /// Sum of negative close PnLs (USD, negative).
    pub total_loss_usd: Decimal,
}

impl SessionStats {
    /// Net realized PnL.
    pub fn net_pnl_usd(&self) -> Decimal {
        self.total_profit_usd + self.total_loss_usd
    }
}

/// Mapping from pair id to open pair, plus closed history, audit logs,
/// and the running balance.
#[derive(Debug)]
pub struct PositionLedger {
    open: std::collections::HashMap<String, PositionPair>,
    closed: Vec<PositionPair>,
    skipped: Vec<SkippedOpportunity>,
    errors: Vec<TradingErrorRecord>,
    balance: Decimal,
    initial_balance: Decimal,
    stats: SessionStats,
}

impl PositionLedger {
    /// Create a ledger with the given starting balance.
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            open: std::collections::HashMap::new(),
            closed: Vec::new(),
            skipped: Vec::new(),
            errors: Vec::new(),
            balance: initial_balance,
            initial_balance,
            stats: SessionStats::default(),
        }
    }

    /// Current balance.
    pub fn balance(&self) -> Decimal {
        self.balance
    }

    /// Balance captured at construction.
    pub fn initial_balance(&self) -> Decimal {
        self.initial_balance
    }

    /// Overwrite the balance (venue reconciliation).
    pub fn set_balance(&mut self, balance: Decimal) {
        self.balance = balance;
    }

    /// Debit the balance by an amount.
    pub fn debit(&mut self, amount: Decimal) {
        self.balance -= amount;
    }

    /// Credit the balance by an amount.
    pub fn credit(&mut self, amount: Decimal) {
        self.balance += amount;
    }

    /// Number of open pairs.
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Whether any open pair covers the symbol.
    pub fn has_open_symbol(&self, symbol: &str) -> bool {
        self.open.values().any(|p| p.symbol == symbol)
    }

    /// Insert an open pair. The ledger accepts whatever it is given;
    /// one-pair-per-symbol is the gate's job.
    pub fn insert_pair(&mut self, pair: PositionPair) {
        self.open.insert(pair.id.clone(), pair);
    }

    /// Remove and return an open pair. `None` makes close idempotent.
    pub fn take_pair(&mut self, pair_id: &str) -> Option<PositionPair> {
        self.open.remove(pair_id)
    }

    /// Pair ids of open pairs for a symbol.
    pub fn open_pair_ids_for_symbol(&self, symbol: &str) -> Vec<String> {
        self.open
            .values()
            .filter(|p| p.symbol == symbol)
            .map(|p| p.id.clone())
            .collect()
    }

    /// Snapshot of all open pairs.
    pub fn open_pairs(&self) -> Vec<PositionPair> {
        self.open.values().cloned().collect()
    }

    /// Mutable access to one open pair, for live-price refresh.
    pub(crate) fn open_pair_mut(&mut self, pair_id: &str) -> Option<&mut PositionPair> {
        self.open.get_mut(pair_id)
    }

    /// Move a closed pair into history and update counters.
    pub fn append_closed(&mut self, pair: PositionPair, pnl_usd: Decimal) {
        if pnl_usd >= Decimal::ZERO {
            self.stats.wins += 1;
            self.stats.total_profit_usd += pnl_usd;
        } else {
            self.stats.losses += 1;
            self.stats.total_loss_usd += pnl_usd;
        }
        self.closed.push(pair);
    }

    /// Closed-pair history snapshot.
    pub fn closed_pairs(&self) -> Vec<PositionPair> {
        self.closed.clone()
    }

    /// Record a skipped opportunity.
    pub fn record_skip(&mut self, skip: SkippedOpportunity) {
        self.skipped.push(skip);
    }

    /// Skipped-opportunity log snapshot.
    pub fn skipped(&self) -> Vec<SkippedOpportunity> {
        self.skipped.clone()
    }

    /// Record a trading error.
    pub fn record_error(&mut self, error: TradingErrorRecord) {
        self.errors.push(error);
    }

    /// Trading-error log snapshot.
    pub fn errors(&self) -> Vec<TradingErrorRecord> {
        self.errors.clone()
    }

    /// Session counters snapshot.
    pub fn stats(&self) -> SessionStats {
        self.stats.clone()
    }

    /// Refresh live spread/divergence on every open pair for a symbol.
    ///
    /// `long_venue_price`/`short_venue_price` are each leg's exit-side
    /// quote. Returns (pair id, divergence percent) per updated pair so
    /// the caller can run its convergence check.
    pub fn update_live_prices(
        &mut self,
        symbol: &str,
        price_for: impl Fn(&PositionPair) -> (Decimal, Decimal),
    ) -> Vec<(String, Decimal)> {
        let mut updated = Vec::new();
        for pair in self.open.values_mut().filter(|p| p.symbol == symbol) {
            let (long_price, short_price) = price_for(pair);
            pair.update_live_prices(long_price, short_price);
            updated.push((pair.id.clone(), pair.live_divergence_pct));
        }
        updated
    }
}
