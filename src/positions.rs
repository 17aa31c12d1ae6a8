// ===============================
// src/positions.rs (inventory & fees)
// ===============================

use ahash::AHashMap as HashMap;

use crate::domain::Side;
use crate::metrics::{FEES, HEDGE_POSITION, POSITION, TRADED_VOLUME};

/// Net exposure of the engine. `position` is the primary instrument and is the
/// only number the quoting logic reads; it changes on quote fills only.
#[derive(Debug, Default)]
pub struct Inventory {
    position: i64,
    hedge_position: i64,
    fees: i64,
    traded_volume: u64,
    // status reports carry cumulative fees per order
    fees_by_order: HashMap<u64, i64>,
}

impl Inventory {
    pub fn new() -> Self { Self::default() }

    pub fn position(&self) -> i64 { self.position }
    pub fn hedge_position(&self) -> i64 { self.hedge_position }
    /// Positive = paid, negative = net rebate received.
    pub fn fees(&self) -> i64 { self.fees }
    pub fn traded_volume(&self) -> u64 { self.traded_volume }
    pub fn net_delta(&self) -> i64 { self.position + self.hedge_position }

    pub fn on_fill(&mut self, side: Side, volume: u32) {
        self.position += side.sign() * volume as i64;
        self.traded_volume += volume as u64;
        POSITION.set(self.position);
        TRADED_VOLUME.inc_by(volume as u64);
    }

    pub fn on_hedge_fill(&mut self, delta: i64) {
        self.hedge_position += delta;
        HEDGE_POSITION.set(self.hedge_position);
    }

    pub fn on_status_fees(&mut self, id: u64, cumulative: i64, closed: bool) {
        let prev = if closed {
            self.fees_by_order.remove(&id).unwrap_or(0)
        } else {
            self.fees_by_order.insert(id, cumulative).unwrap_or(0)
        };
        self.fees += cumulative - prev;
        FEES.set(self.fees);
    }
}
