// ===============================
// src/gateway.rs (mock exchange)
// ===============================
//
// Stand-in for the order-entry session:
// - Insert : validated (tick, price band, volume) -> status ack, or error
// - Cancel : terminal status (remaining 0) for a resting order
// - Hedge  : filled at once, one tick through the ETF mid
// - resting quotes get random (partial) fills every match round, with a
//   one-cent-per-lot maker rebate reported as negative fees
//
use ahash::AHashMap as HashMap;
use rand::Rng;
use tokio::{
    sync::{mpsc, watch},
    time::{interval, Duration, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::domain::{Command, Event, Side};

#[derive(Debug, Clone)]
pub struct VenueCfg {
    pub tick_size: i64,
    pub min_price: i64,
    pub max_price: i64,
    pub match_every_ms: u64,
    pub fill_probability: f64,
}

#[derive(Debug)]
struct Resting {
    price: i64,
    remaining: u32,
    filled: u32,
}

#[derive(Debug)]
pub struct MockVenue {
    cfg: VenueCfg,
    resting: HashMap<u64, Resting>,
}

impl MockVenue {
    pub fn new(mut cfg: VenueCfg) -> Self {
        cfg.fill_probability = cfg.fill_probability.clamp(0.0, 1.0);
        Self { cfg, resting: HashMap::new() }
    }

    fn price_ok(&self, price: i64) -> bool {
        price % self.cfg.tick_size == 0 && price >= self.cfg.min_price && price <= self.cfg.max_price
    }

    pub fn on_command(&mut self, cmd: Command, etf_mid: i64) -> Vec<Event> {
        match cmd {
            Command::Insert { id, price, volume, .. } => {
                if !self.price_ok(price) || volume == 0 {
                    return vec![Event::Error { id, message: format!("invalid order: price {price} volume {volume}") }];
                }
                if self.resting.contains_key(&id) {
                    return vec![Event::Error { id, message: "duplicate order id".into() }];
                }
                self.resting.insert(id, Resting { price, remaining: volume, filled: 0 });
                vec![Event::OrderStatus { id, fill_volume: 0, remaining_volume: volume, fees: 0 }]
            }
            Command::Cancel { id } => match self.resting.remove(&id) {
                Some(r) => vec![Event::OrderStatus {
                    id,
                    fill_volume: r.filled,
                    remaining_volume: 0,
                    fees: -(r.filled as i64),
                }],
                None => {
                    debug!(id, "cancel for order not resting");
                    Vec::new()
                }
            },
            Command::Hedge { id, side, price, volume } => {
                if !self.price_ok(price) {
                    return vec![Event::Error { id, message: format!("invalid hedge price {price}") }];
                }
                let fill_px = match side {
                    Side::Buy => etf_mid + self.cfg.tick_size,
                    Side::Sell => etf_mid - self.cfg.tick_size,
                };
                vec![Event::HedgeFilled { id, price: fill_px, volume }]
            }
        }
    }

    /// One matching round over resting quotes.
    pub fn match_round(&mut self, rng: &mut impl Rng) -> Vec<Event> {
        let mut out = Vec::new();
        let mut done = Vec::new();
        for (&id, r) in self.resting.iter_mut() {
            if !rng.gen_bool(self.cfg.fill_probability) {
                continue;
            }
            let volume = rng.gen_range(1..=r.remaining);
            r.remaining -= volume;
            r.filled += volume;
            out.push(Event::OrderFilled { id, price: r.price, volume });
            out.push(Event::OrderStatus {
                id,
                fill_volume: r.filled,
                remaining_volume: r.remaining,
                fees: -(r.filled as i64),
            });
            if r.remaining == 0 {
                done.push(id);
            }
        }
        for id in done {
            self.resting.remove(&id);
        }
        out
    }

    pub fn resting(&self) -> usize {
        self.resting.len()
    }
}

pub async fn run_mock(
    mut cmd_rx: mpsc::Receiver<Command>,
    ev_tx: mpsc::Sender<Event>,
    etf_mid_rx: watch::Receiver<i64>,
    cfg: VenueCfg,
) {
    let mut tick = interval(Duration::from_millis(cfg.match_every_ms.max(1)));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut venue = MockVenue::new(cfg);
    info!("mock exchange started");

    loop {
        let events = tokio::select! {
            maybe_cmd = cmd_rx.recv() => match maybe_cmd {
                Some(cmd) => {
                    let mid = *etf_mid_rx.borrow();
                    venue.on_command(cmd, mid)
                }
                None => {
                    info!(resting = venue.resting(), "command channel closed, mock exchange stopped");
                    return;
                }
            },
            _ = tick.tick() => venue.match_round(&mut rand::thread_rng()),
        };
        for ev in events {
            if ev_tx.send(ev).await.is_err() {
                warn!("event channel closed, mock exchange stopping");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Lifespan;
    use rand::{rngs::StdRng, SeedableRng};

    fn venue(p: f64) -> MockVenue {
        MockVenue::new(VenueCfg {
            tick_size: 100,
            min_price: 1,
            max_price: i32::MAX as i64,
            match_every_ms: 10,
            fill_probability: p,
        })
    }

    fn ins(id: u64, price: i64) -> Command {
        Command::Insert { id, side: Side::Buy, price, volume: 10, lifespan: Lifespan::GoodForDay }
    }

    #[test]
    fn off_tick_insert_is_rejected() {
        let mut v = venue(0.0);
        let evs = v.on_command(ins(1, 9_850), 10_000);
        assert!(matches!(evs[0], Event::Error { id: 1, .. }));
        assert_eq!(v.resting(), 0);
    }

    #[test]
    fn insert_then_cancel_reports_terminal_status() {
        let mut v = venue(0.0);
        v.on_command(ins(1, 9_800), 10_000);
        let evs = v.on_command(Command::Cancel { id: 1 }, 10_000);
        assert_eq!(evs, vec![Event::OrderStatus { id: 1, fill_volume: 0, remaining_volume: 0, fees: 0 }]);
        assert!(v.on_command(Command::Cancel { id: 1 }, 10_000).is_empty());
    }

    #[test]
    fn hedge_crosses_the_mid() {
        let mut v = venue(0.0);
        let evs = v.on_command(Command::Hedge { id: 7, side: Side::Sell, price: 100, volume: 10 }, 10_000);
        assert_eq!(evs, vec![Event::HedgeFilled { id: 7, price: 9_900, volume: 10 }]);
    }

    #[test]
    fn certain_fills_eventually_empty_the_book() {
        let mut v = venue(1.0);
        v.on_command(ins(1, 9_800), 10_000);
        let mut rng = StdRng::seed_from_u64(7);
        let mut filled = 0;
        for _ in 0..10 {
            for ev in v.match_round(&mut rng) {
                if let Event::OrderFilled { volume, .. } = ev {
                    filled += volume;
                }
            }
        }
        assert_eq!(filled, 10);
        assert_eq!(v.resting(), 0);
    }
}
