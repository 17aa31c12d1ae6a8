// ===============================
// src/hedge.rs (offset primary fills on the correlated instrument)
// ===============================
use ahash::AHashMap as HashMap;
use tracing::{info, warn};

use crate::domain::{Command, Side};
use crate::ledger::OrderIds;
use crate::metrics::{ACTIONS, HEDGE_FAILURES};

/// In-flight hedge, fire-and-forget apart from fill accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HedgeOrder {
    pub side: Side,
    pub volume: u32,
    pub filled: u32,
}

#[derive(Debug)]
pub struct HedgeController {
    min_bid_nearest_tick: i64,
    max_ask_nearest_tick: i64,
    in_flight: HashMap<u64, HedgeOrder>,
}

impl HedgeController {
    pub fn new(min_valid_price: i64, max_valid_price: i64, tick_size: i64) -> Self {
        Self {
            min_bid_nearest_tick: (min_valid_price + tick_size) / tick_size * tick_size,
            max_ask_nearest_tick: max_valid_price / tick_size * tick_size,
            in_flight: HashMap::new(),
        }
    }

    /// Price that crosses any book on the given side.
    pub fn crossing_price(&self, side: Side) -> i64 {
        match side {
            Side::Buy => self.max_ask_nearest_tick,
            Side::Sell => self.min_bid_nearest_tick,
        }
    }

    /// Our quote on `filled_side` traded `volume`; trade the other way on the hedge leg.
    pub fn on_primary_fill(&mut self, filled_side: Side, volume: u32, ids: &mut OrderIds) -> Command {
        let side = filled_side.opposite();
        let id = ids.next();
        let price = self.crossing_price(side);
        self.in_flight.insert(id, HedgeOrder { side, volume, filled: 0 });
        info!(id, side = ?side, price, volume, "hedge");
        let cmd = Command::Hedge { id, side, price, volume };
        ACTIONS.with_label_values(&[cmd.kind()]).inc();
        cmd
    }

    /// Hedge execution. Returns the signed hedge-leg position change, None
    /// for ids we never sent (or already closed).
    pub fn on_hedge_fill(&mut self, id: u64, price: i64, volume: u32) -> Option<i64> {
        let Some(h) = self.in_flight.get_mut(&id) else {
            warn!(id, price, volume, "hedge fill for unknown order");
            return None;
        };
        h.filled = h.filled.saturating_add(volume);
        let delta = h.side.sign() * volume as i64;
        info!(id, price, volume, filled = h.filled, "hedge filled");
        if h.filled >= h.volume {
            self.in_flight.remove(&id);
        }
        Some(delta)
    }

    /// Error against a hedge id: logged and counted, never retried here.
    pub fn on_error(&mut self, id: u64, message: &str) -> bool {
        match self.in_flight.remove(&id) {
            Some(h) => {
                HEDGE_FAILURES.inc();
                warn!(id, side = ?h.side, unhedged = h.volume - h.filled.min(h.volume), %message, "hedge failed");
                true
            }
            None => false,
        }
    }

    pub fn is_hedge(&self, id: u64) -> bool {
        self.in_flight.contains_key(&id)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}
