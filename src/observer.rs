//! Observer capability: TUI/log consumers fed by the core as side
//! effects, never required for correctness.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::info;

use crate::arbitrage::OpportunitySnapshot;
use crate::trading::position::PositionPair;

/// Cadence of position/scanner snapshot fan-out.
const SNAPSHOT_INTERVAL: Duration = Duration::from_millis(500);

/// Receiver of engine side-channel updates.
pub trait EngineObserver: Send + Sync {
    /// Free-text event line (opens, closes, warnings, errors).
    fn on_event(&self, line: &str);

    /// Snapshot of all open pairs.
    fn on_positions(&self, pairs: &[PositionPair]);

    /// Top live opportunities by profit.
    fn on_opportunities(&self, opportunities: &[OpportunitySnapshot]);
}

/// Observer that writes everything through tracing.
pub struct LogObserver;

impl EngineObserver for LogObserver {
    fn on_event(&self, line: &str) {
        info!(target: "cross_arb::events", "{}", line);
    }

    fn on_positions(&self, pairs: &[PositionPair]) {
        for pair in pairs {
            info!(
                target: "cross_arb::positions",
                pair = %pair.id,
                symbol = %pair.symbol,
                spread_open = %pair.spread_at_open_pct,
                spread_live = %pair.live_spread_pct,
                divergence = %pair.live_divergence_pct,
                "open pair"
            );
        }
    }

    fn on_opportunities(&self, opportunities: &[OpportunitySnapshot]) {
        for opp in opportunities {
            info!(
                target: "cross_arb::scanner",
                symbol = %opp.symbol,
                buy = %opp.buy_venue,
                sell = %opp.sell_venue,
                spread = %opp.spread_pct,
                profit = %opp.profit_pct,
                "live opportunity"
            );
        }
    }
}

/// Fan-out to registered observers with snapshot throttling.
///
/// Event lines pass through unthrottled; position and scanner snapshots
/// refresh at most every 500 ms regardless of tick rate.
#[derive(Clone)]
pub struct ObserverSet {
    observers: Arc<Vec<Arc<dyn EngineObserver>>>,
    last_positions: Arc<Mutex<Option<Instant>>>,
    last_opportunities: Arc<Mutex<Option<Instant>>>,
}

impl ObserverSet {
    /// Build a set from registered observers.
    pub fn new(observers: Vec<Arc<dyn EngineObserver>>) -> Self {
        Self {
            observers: Arc::new(observers),
            last_positions: Arc::new(Mutex::new(None)),
            last_opportunities: Arc::new(Mutex::new(None)),
        }
    }

    /// An empty set (observers are optional).
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Emit an event line.
    pub fn event(&self, line: impl AsRef<str>) {
        for observer in self.observers.iter() {
            observer.on_event(line.as_ref());
        }
    }

    /// Emit a position snapshot, throttled.
    pub fn positions(&self, pairs: &[PositionPair]) {
        if self.observers.is_empty() || !Self::due(&self.last_positions) {
            return;
        }
        for observer in self.observers.iter() {
            observer.on_positions(pairs);
        }
    }

    /// Emit a position snapshot bypassing the throttle (shutdown).
    pub fn positions_now(&self, pairs: &[PositionPair]) {
        for observer in self.observers.iter() {
            observer.on_positions(pairs);
        }
    }

    /// Emit a scanner snapshot, throttled.
    pub fn opportunities(&self, opportunities: &[OpportunitySnapshot]) {
        if self.observers.is_empty() || !Self::due(&self.last_opportunities) {
            return;
        }
        for observer in self.observers.iter() {
            observer.on_opportunities(opportunities);
        }
    }

    fn due(slot: &Mutex<Option<Instant>>) -> bool {
        let mut last = slot.lock().unwrap();
        match *last {
            Some(at) if at.elapsed() < SNAPSHOT_INTERVAL => false,
            _ => {
                *last = Some(Instant::now());
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingObserver {
        events: AtomicUsize,
        positions: AtomicUsize,
    }

    impl EngineObserver for CountingObserver {
        fn on_event(&self, _line: &str) {
            self.events.fetch_add(1, Ordering::SeqCst);
        }
        fn on_positions(&self, _pairs: &[PositionPair]) {
            self.positions.fetch_add(1, Ordering::SeqCst);
        }
        fn on_opportunities(&self, _opportunities: &[OpportunitySnapshot]) {}
    }

    #[test]
    fn events_are_unthrottled() {
        let counter = Arc::new(CountingObserver::default());
        let set = ObserverSet::new(vec![counter.clone()]);

        set.event("one");
        set.event("two");
        assert_eq!(counter.events.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn position_snapshots_are_throttled() {
        let counter = Arc::new(CountingObserver::default());
        let set = ObserverSet::new(vec![counter.clone()]);

        set.positions(&[]);
        set.positions(&[]);
        assert_eq!(counter.positions.load(Ordering::SeqCst), 1);

        set.positions_now(&[]);
        assert_eq!(counter.positions.load(Ordering::SeqCst), 2);
    }
}
