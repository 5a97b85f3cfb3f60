//! Admission checks between detection and order placement.

use tracing::debug;

use crate::error::SkipReason;

use super::opportunity::ArbitrageOpportunity;

/// Read-only view of the ledger state the gate needs.
#[derive(Debug, Clone, Copy)]
pub struct GateView {
    /// Whether a pair is already open for the opportunity's symbol.
    pub symbol_open: bool,
    /// Number of currently open pairs.
    pub open_count: usize,
}

/// Decide whether a detected opportunity should trigger action.
///
/// Checks run in order: trading disabled, symbol already covered, no free
/// position slot. The ledger itself accepts whatever it is given; this is
/// the sole enforcement point for one-pair-per-symbol.
pub fn admit(
    opportunity: &ArbitrageOpportunity,
    view: GateView,
    trading_enabled: bool,
    max_open_positions: usize,
) -> Result<(), SkipReason> {
    if !trading_enabled {
        return Err(SkipReason::TradingDisabled);
    }

    if view.symbol_open {
        debug!(symbol = %opportunity.symbol, "Pair already open for symbol");
        return Err(SkipReason::SymbolAlreadyOpen);
    }

    if view.open_count >= max_open_positions {
        debug!(
            open = view.open_count,
            max = max_open_positions,
            "No free position slots"
        );
        return Err(SkipReason::NoFreeSlots);
    }

    Ok(())
}
