//! Execution price simulation under shallow order-book depth.
//!
//! Pure functions only: given a requested notional, the quoted best price,
//! and the visible opposing-side depth, estimate the volume-weighted fill
//! price and the dollar cost of eating past the visible level.

use rust_decimal::Decimal;

/// Assumed visible depth (USD notional) when a feed omits quantities.
pub const DEFAULT_VISIBLE_DEPTH_USD: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// How a simulated order filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillKind {
    /// Visible depth covered the whole order.
    Full,
    /// Part of the order filled past the visible level at a penalty price.
    Partial,
}

impl std::fmt::Display for FillKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FillKind::Full => write!(f, "Full Fill"),
            FillKind::Partial => write!(f, "Partial Fill"),
        }
    }
}

/// Result of simulating a market-order fill.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedFill {
    /// Notional-weighted average fill price.
    pub avg_price: Decimal,
    /// USD value of the coin shortfall caused by the worse price.
    pub slippage_cost_usd: Decimal,
    /// Whether visible depth covered the order.
    pub kind: FillKind,
}

/// Simulate filling `requested_notional` USD against a quoted best price.
///
/// `visible_qty` is the opposing-side quantity shown at the best level
/// (ask-side for buys, bid-side for sells). When absent, a default depth
/// of [`DEFAULT_VISIBLE_DEPTH_USD`] at the quoted price is assumed so
/// venues that omit depth never block execution.
///
/// When visible depth is short, the remainder fills at
/// `quoted * (1 + slippage_pct/100)` and the returned average price is the
/// notional-weighted blend of the two tranches.
pub fn simulate_fill(
    requested_notional: Decimal,
    quoted_price: Decimal,
    visible_qty: Option<Decimal>,
    slippage_pct: Decimal,
) -> SimulatedFill {
    if requested_notional <= Decimal::ZERO || quoted_price <= Decimal::ZERO {
        return SimulatedFill {
            avg_price: quoted_price,
            slippage_cost_usd: Decimal::ZERO,
            kind: FillKind::Full,
        };
    }

    let visible_notional = match visible_qty {
        Some(qty) if qty > Decimal::ZERO => qty * quoted_price,
        _ => DEFAULT_VISIBLE_DEPTH_USD,
    };

    if visible_notional >= requested_notional {
        return SimulatedFill {
            avg_price: quoted_price,
            slippage_cost_usd: Decimal::ZERO,
            kind: FillKind::Full,
        };
    }

    let penalty_price = quoted_price * (Decimal::ONE + slippage_pct / Decimal::ONE_HUNDRED);
    let remainder_notional = requested_notional - visible_notional;
    let avg_price =
        (visible_notional * quoted_price + remainder_notional * penalty_price) / requested_notional;

    // Ideal coins at the quoted price minus coins actually bought, valued
    // at the quoted price.
    let ideal_coins = requested_notional / quoted_price;
    let actual_coins = requested_notional / avg_price;
    let slippage_cost_usd = (ideal_coins - actual_coins) * quoted_price;

    SimulatedFill {
        avg_price,
        slippage_cost_usd,
        kind: FillKind::Partial,
    }
}
