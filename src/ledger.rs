// ===============================
// src/ledger.rs (own quoting orders)
// ===============================
//
// At most one working order per side, held in an explicit slot. A cancel moves
// the order out of its slot into `cancelling` so a fresh quote can go out in
// the same cycle, while late fills against the old order are still attributed
// to the right side until the exchange confirms it is dead.
//
use ahash::AHashMap as HashMap;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::{Command, Lifespan, Side};
use crate::metrics::ACTIONS;
use crate::quote::{Quote, NO_QUOTE};
use crate::throttle::{ActionThrottle, Throttled};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus { Working, PartiallyFilled, Filled, Cancelled, Rejected }

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: u64,
    pub side: Side,
    pub price: i64,
    pub volume: u32,
    /// Sum of fill messages received.
    pub filled: u32,
    /// Cumulative fill volume as last reported by a status message.
    pub reported_filled: u32,
    pub status: OrderStatus,
}

/// Client order ids, shared by quotes and hedges. First id is 1.
#[derive(Debug, Default)]
pub struct OrderIds { last: u64 }

impl OrderIds {
    pub fn next(&mut self) -> u64 {
        self.last += 1;
        self.last
    }
}

/// Outcome of one reconcile pass. `throttled` is set when the budget ran out
/// before every wanted action was issued.
#[derive(Debug, Default)]
pub struct Reconciled {
    pub commands: Vec<Command>,
    pub throttled: Option<Throttled>,
}

impl Reconciled {
    fn issue(&mut self, cmd: Command) {
        ACTIONS.with_label_values(&[cmd.kind()]).inc();
        self.commands.push(cmd);
    }
}

#[derive(Debug)]
pub struct OrderLedger {
    bid: Option<Order>,
    ask: Option<Order>,
    cancelling: HashMap<u64, Order>,
    position_limit: i64,
}

impl OrderLedger {
    pub fn new(position_limit: i64) -> Self {
        Self { bid: None, ask: None, cancelling: HashMap::new(), position_limit }
    }

    fn slot_mut(&mut self, side: Side) -> &mut Option<Order> {
        match side {
            Side::Buy => &mut self.bid,
            Side::Sell => &mut self.ask,
        }
    }

    pub fn working(&self, side: Side) -> Option<&Order> {
        match side {
            Side::Buy => self.bid.as_ref(),
            Side::Sell => self.ask.as_ref(),
        }
    }

    pub fn working_count(&self) -> usize {
        self.bid.is_some() as usize + self.ask.is_some() as usize
    }

    pub fn cancelling_count(&self) -> usize {
        self.cancelling.len()
    }

    /// Side of a live or cancel-pending order, None if we no longer know it.
    pub fn side_of(&self, id: u64) -> Option<Side> {
        self.find(id).map(|o| o.side)
    }

    fn find(&self, id: u64) -> Option<&Order> {
        [self.bid.as_ref(), self.ask.as_ref()]
            .into_iter()
            .flatten()
            .find(|o| o.id == id)
            .or_else(|| self.cancelling.get(&id))
    }

    fn find_mut(&mut self, id: u64) -> Option<&mut Order> {
        if self.bid.as_ref().is_some_and(|o| o.id == id) {
            return self.bid.as_mut();
        }
        if self.ask.as_ref().is_some_and(|o| o.id == id) {
            return self.ask.as_mut();
        }
        self.cancelling.get_mut(&id)
    }

    fn remove(&mut self, id: u64) -> Option<Order> {
        if self.bid.as_ref().is_some_and(|o| o.id == id) {
            return self.bid.take();
        }
        if self.ask.as_ref().is_some_and(|o| o.id == id) {
            return self.ask.take();
        }
        self.cancelling.remove(&id)
    }

    fn within_limit(&self, side: Side, position: i64, size: u32) -> bool {
        let after = position + side.sign() * size as i64;
        after.abs() <= self.position_limit || after.abs() < position.abs()
    }

    /// Diff the working orders against the wanted quote: stale prices are
    /// cancelled first (both sides), then empty slots are filled. Every
    /// cancel and insert takes one unit from `throttle`.
    pub fn reconcile(
        &mut self,
        quote: &Quote,
        position: i64,
        throttle: &mut ActionThrottle,
        ids: &mut OrderIds,
        now: Instant,
    ) -> Reconciled {
        let mut out = Reconciled::default();
        let wanted = [(Side::Buy, quote.bid_price), (Side::Sell, quote.ask_price)];

        for (side, price) in wanted {
            let stale = match self.working(side) {
                Some(o) => price != NO_QUOTE && o.price != price,
                None => false,
            };
            if !stale {
                continue;
            }
            if let Err(t) = throttle.try_acquire(now) {
                out.throttled = Some(t);
                return out;
            }
            if let Some(o) = self.slot_mut(side).take() {
                debug!(id = o.id, side = side.label(), old = o.price, new = price, "cancel stale quote");
                out.issue(Command::Cancel { id: o.id });
                self.cancelling.insert(o.id, o);
            }
        }

        for (side, price) in wanted {
            if self.working(side).is_some() || price == NO_QUOTE {
                continue;
            }
            if !self.within_limit(side, position, quote.size) {
                debug!(side = side.label(), position, "insert skipped, position limit");
                continue;
            }
            if let Err(t) = throttle.try_acquire(now) {
                out.throttled = Some(t);
                return out;
            }
            let id = ids.next();
            info!(id, side = side.label(), price, volume = quote.size, "quote");
            out.issue(Command::Insert {
                id,
                side,
                price,
                volume: quote.size,
                lifespan: Lifespan::GoodForDay,
            });
            *self.slot_mut(side) = Some(Order {
                id,
                side,
                price,
                volume: quote.size,
                filled: 0,
                reported_filled: 0,
                status: OrderStatus::Working,
            });
        }
        out
    }

    /// Order-status report. Returns the order if this report ended it.
    ///
    /// Status and fill messages are independent streams: the cumulative
    /// `fill_volume` here may run ahead of the fills received so far. An
    /// order closed by the exchange with fills still in flight stays in
    /// `cancelling` until those fills arrive.
    pub fn on_status(&mut self, id: u64, fill_volume: u32, remaining_volume: u32) -> Option<Order> {
        let Some(o) = self.find_mut(id) else {
            debug!(id, "status for unknown order ignored");
            return None;
        };
        o.reported_filled = o.reported_filled.max(fill_volume);
        if o.status.is_terminal() {
            return None;
        }
        if remaining_volume > 0 {
            if o.reported_filled > 0 {
                o.status = OrderStatus::PartiallyFilled;
            }
            return None;
        }
        let mut done = self.remove(id)?;
        done.status = if done.filled.max(done.reported_filled) >= done.volume {
            OrderStatus::Filled
        } else {
            OrderStatus::Cancelled
        };
        debug!(id, status = ?done.status, "order closed");
        if done.filled < done.reported_filled {
            debug!(id, pending = done.reported_filled - done.filled, "closed with fills in flight");
            self.cancelling.insert(id, done.clone());
        }
        Some(done)
    }

    /// Fill against one of our quotes. Returns the side, or None for an id we
    /// do not hold. Once the fill messages alone cover the order's volume it
    /// leaves its slot, without waiting for the final status.
    pub fn on_fill(&mut self, id: u64, volume: u32) -> Option<Side> {
        let o = self.find_mut(id)?;
        o.filled = o.filled.saturating_add(volume);
        let side = o.side;
        let finished = if o.status.is_terminal() {
            o.filled >= o.reported_filled
        } else if o.filled >= o.volume {
            o.status = OrderStatus::Filled;
            true
        } else {
            o.status = OrderStatus::PartiallyFilled;
            false
        };
        if finished {
            self.remove(id);
        }
        Some(side)
    }

    /// Error tied to one of our orders: presumed dead, slot cleared.
    pub fn on_error(&mut self, id: u64) -> Option<Order> {
        let mut o = self.remove(id)?;
        o.status = OrderStatus::Rejected;
        warn!(id, side = o.side.label(), price = o.price, "order rejected");
        Some(o)
    }
}
