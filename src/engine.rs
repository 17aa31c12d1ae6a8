// ===============================
// src/engine.rs (event loop / quoting state machine)
// ===============================
//
// One `Engine` owns every piece of mutable trading state (ledger, inventory,
// action budget, id generator) and is driven by exactly one task, so events
// are applied strictly in arrival order.
//
// Book update on the quoting instrument:
//   Idle -> AwaitingSnapshot (validate) -> Computing (fair value + quote)
//        -> Reconciling (cancel/insert through the action budget) -> Idle
//
// With ThrottlePolicy::Wait a cycle that runs out of budget stays in
// Reconciling and reports `stalled_until`; the driver sleeps to that instant
// and calls `resume`, which replays the same snapshot. Reconcile is
// idempotent, so the replay only issues what was still missing.
//
use ahash::AHashMap as HashMap;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::book::MarketSnapshot;
use crate::config::{EngineCfg, ThrottlePolicy};
use crate::domain::{BookUpdate, Command, Entry, Event, Instrument, Record};
use crate::fair_value::fair_value;
use crate::hedge::HedgeController;
use crate::ledger::{OrderIds, OrderLedger};
use crate::metrics::{
    BOOK_UPDATES, EXEC_REPORTS, FAIR_VALUE, QUOTE_PRICE, SNAPSHOTS_SKIPPED, TRADE_TICKS,
};
use crate::positions::Inventory;
use crate::quote;
use crate::throttle::{ActionThrottle, ThrottleState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase { Idle, AwaitingSnapshot, Computing, Reconciling }

/// Commands produced by one event, plus the instant to resume at if the
/// cycle was parked on the action budget.
#[derive(Debug, Default, PartialEq)]
pub struct Step {
    pub commands: Vec<Command>,
    pub stalled_until: Option<Instant>,
}

impl Step {
    fn none() -> Self { Self::default() }
}

fn instrument_label(i: Instrument) -> &'static str {
    match i {
        Instrument::Future => "future",
        Instrument::Etf => "etf",
    }
}

pub struct Engine {
    cfg: EngineCfg,
    phase: Phase,
    ledger: OrderLedger,
    hedger: HedgeController,
    throttle: ActionThrottle,
    inventory: Inventory,
    ids: OrderIds,
    last_seq: HashMap<Instrument, u64>,
    stalled: Option<MarketSnapshot>,
}

impl Engine {
    pub fn new(cfg: EngineCfg) -> Self {
        Self {
            phase: Phase::Idle,
            ledger: OrderLedger::new(cfg.quote.position_limit),
            hedger: HedgeController::new(cfg.min_valid_price, cfg.max_valid_price, cfg.quote.tick_size),
            throttle: ActionThrottle::new(cfg.action_limit, cfg.action_window),
            inventory: Inventory::new(),
            ids: OrderIds::default(),
            last_seq: HashMap::new(),
            stalled: None,
            cfg,
        }
    }

    pub fn phase(&self) -> Phase { self.phase }
    pub fn position(&self) -> i64 { self.inventory.position() }
    pub fn inventory(&self) -> &Inventory { &self.inventory }
    pub fn ledger(&self) -> &OrderLedger { &self.ledger }
    pub fn hedger(&self) -> &HedgeController { &self.hedger }
    pub fn throttle(&self) -> &ActionThrottle { &self.throttle }

    pub fn throttle_state(&mut self, now: Instant) -> ThrottleState {
        self.throttle.state(now)
    }

    pub fn on_event(&mut self, ev: &Event, now: Instant) -> Step {
        match ev {
            Event::OrderBook(upd) => self.on_book(upd, now),
            Event::TradeTicks(upd) => {
                TRADE_TICKS.with_label_values(&[instrument_label(upd.instrument)]).inc();
                debug!(instrument = ?upd.instrument, seq = upd.sequence, "trade ticks");
                Step::none()
            }
            Event::OrderStatus { id, fill_volume, remaining_volume, fees } => {
                EXEC_REPORTS.with_label_values(&[ev.kind()]).inc();
                debug!(id, side = ?self.ledger.side_of(*id), fill_volume, remaining_volume, "order status");
                self.inventory.on_status_fees(*id, *fees, *remaining_volume == 0);
                self.ledger.on_status(*id, *fill_volume, *remaining_volume);
                Step::none()
            }
            Event::OrderFilled { id, price, volume } => {
                EXEC_REPORTS.with_label_values(&[ev.kind()]).inc();
                self.on_fill(*id, *price, *volume)
            }
            Event::HedgeFilled { id, price, volume } => {
                EXEC_REPORTS.with_label_values(&[ev.kind()]).inc();
                if let Some(delta) = self.hedger.on_hedge_fill(*id, *price, *volume) {
                    self.inventory.on_hedge_fill(delta);
                }
                Step::none()
            }
            Event::Error { id, message } => {
                EXEC_REPORTS.with_label_values(&[ev.kind()]).inc();
                self.on_error(*id, message);
                Step::none()
            }
        }
    }

    /// Finish a cycle parked on the action budget.
    pub fn resume(&mut self, now: Instant) -> Step {
        match self.stalled.take() {
            Some(snap) => self.cycle(snap, now),
            None => Step::none(),
        }
    }

    fn on_book(&mut self, upd: &BookUpdate, now: Instant) -> Step {
        BOOK_UPDATES.with_label_values(&[instrument_label(upd.instrument)]).inc();

        if let Some(&last) = self.last_seq.get(&upd.instrument) {
            if upd.sequence <= last {
                debug!(instrument = ?upd.instrument, seq = upd.sequence, last, "stale book update");
                SNAPSHOTS_SKIPPED.with_label_values(&["stale"]).inc();
                return Step::none();
            }
        }
        self.last_seq.insert(upd.instrument, upd.sequence);

        if upd.instrument != self.cfg.quote_instrument {
            debug!(instrument = ?upd.instrument, seq = upd.sequence, "book update (not quoting)");
            return Step::none();
        }

        self.phase = Phase::AwaitingSnapshot;
        // a fresher book supersedes a parked one
        self.stalled = None;
        match MarketSnapshot::from_update(upd) {
            Ok(snap) => self.cycle(snap, now),
            Err(e) => {
                warn!(%e, seq = upd.sequence, "invalid snapshot, skipping");
                SNAPSHOTS_SKIPPED.with_label_values(&["invalid"]).inc();
                self.phase = Phase::Idle;
                Step::none()
            }
        }
    }

    fn cycle(&mut self, snap: MarketSnapshot, now: Instant) -> Step {
        self.phase = Phase::Computing;
        let Some(fv) = fair_value(&snap, self.cfg.quote.tick_size) else {
            debug!(seq = snap.sequence, "no fair value");
            SNAPSHOTS_SKIPPED.with_label_values(&["no_fair_value"]).inc();
            self.phase = Phase::Idle;
            return Step::none();
        };
        FAIR_VALUE.set(fv.price);

        let position = self.inventory.position();
        let q = quote::derive(&fv, position, snap.has_bid(), snap.has_ask(), &self.cfg.quote);
        QUOTE_PRICE.with_label_values(&["bid"]).set(q.bid_price);
        QUOTE_PRICE.with_label_values(&["ask"]).set(q.ask_price);
        debug!(fair = fv.price, dispersion = fv.dispersion, bid = q.bid_price, ask = q.ask_price, position, "quote");
        if !q.quotes_bid() && !q.quotes_ask() {
            debug!(seq = snap.sequence, position, "not quoting either side");
        }

        self.phase = Phase::Reconciling;
        let r = self.ledger.reconcile(&q, position, &mut self.throttle, &mut self.ids, now);
        let mut step = Step { commands: r.commands, stalled_until: None };

        if let Some(t) = r.throttled {
            match self.cfg.throttle_policy {
                ThrottlePolicy::Wait => {
                    self.stalled = Some(snap);
                    step.stalled_until = Some(t.resume_at);
                    return step;
                }
                ThrottlePolicy::Drop => {
                    info!(issued = step.commands.len(), "action budget exhausted, dropping rest of cycle");
                    SNAPSHOTS_SKIPPED.with_label_values(&["throttled"]).inc();
                }
            }
        }
        self.phase = Phase::Idle;
        step
    }

    fn on_fill(&mut self, id: u64, price: i64, volume: u32) -> Step {
        let Some(side) = self.ledger.on_fill(id, volume) else {
            warn!(id, price, volume, "fill for unknown order ignored");
            return Step::none();
        };
        info!(id, side = side.label(), price, volume, "filled");
        self.inventory.on_fill(side, volume);
        let hedge = self.hedger.on_primary_fill(side, volume, &mut self.ids);
        Step { commands: vec![hedge], stalled_until: None }
    }

    fn on_error(&mut self, id: u64, message: &str) {
        if id == 0 {
            warn!(%message, "exchange error");
        } else if self.ledger.on_error(id).is_some() {
            debug!(id, %message, "quote slot cleared after error");
        } else if self.hedger.is_hedge(id) {
            self.hedger.on_error(id, message);
        } else {
            debug!(id, %message, "error for unknown order ignored");
        }
    }
}

fn record(rec_tx: &Option<mpsc::Sender<Record>>, entry: Entry) {
    if let Some(tx) = rec_tx {
        let _ = tx.try_send(Record::now(entry));
    }
}

/// Engine task: the single consumer of exchange events.
pub async fn run(
    mut engine: Engine,
    mut ev_rx: mpsc::Receiver<Event>,
    cmd_tx: mpsc::Sender<Command>,
    rec_tx: Option<mpsc::Sender<Record>>,
) {
    while let Some(ev) = ev_rx.recv().await {
        record(&rec_tx, Entry::Event(ev.clone()));
        let mut step = engine.on_event(&ev, Instant::now());
        loop {
            for cmd in step.commands.drain(..) {
                record(&rec_tx, Entry::Command(cmd.clone()));
                if cmd_tx.send(cmd).await.is_err() {
                    warn!("order-entry channel closed, engine stopping");
                    return;
                }
            }
            let Some(until) = step.stalled_until else { break };
            let now = Instant::now();
            let wait = until.saturating_duration_since(now);
            let state = engine.throttle_state(now);
            info!(
                wait_ms = wait.as_millis() as u64,
                ?state,
                used = engine.throttle().count(),
                limit = engine.throttle().limit(),
                phase = ?engine.phase(),
                "action budget exhausted, waiting for window reset"
            );
            tokio::time::sleep_until(tokio::time::Instant::from_std(until)).await;
            step = engine.resume(Instant::now());
        }
    }
    let inv = engine.inventory();
    info!(
        position = engine.position(),
        hedge_position = inv.hedge_position(),
        net_delta = inv.net_delta(),
        fees = inv.fees(),
        traded_volume = inv.traded_volume(),
        working = engine.ledger().working_count(),
        cancelling = engine.ledger().cancelling_count(),
        hedges_in_flight = engine.hedger().in_flight(),
        "event stream closed, engine stopped"
    );
}
