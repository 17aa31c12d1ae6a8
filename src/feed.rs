// ===============================
// src/feed.rs
// ===============================
//
// Mock market data for the future/ETF pair:
// - the future mid does a random walk in whole ticks
// - the ETF mid tracks the future with +/- 1 tick of noise
// - five levels per side, random volumes; now and then the ask side is thin
//   (zero-padded), which the engine must shrug off
// - every fourth round also emits trade ticks for both instruments
//
// The ETF mid is published on a watch channel so the mock exchange can price
// hedge fills.
//
use rand::Rng;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::domain::{BookUpdate, Event, Instrument};

pub const LEVELS: usize = 5;

/// Book around `mid_ticks` with `ask_depth` priced ask levels (rest zero-padded).
pub fn build_book(
    instrument: Instrument,
    sequence: u64,
    mid_ticks: i64,
    tick: i64,
    ask_depth: usize,
    rng: &mut impl Rng,
) -> BookUpdate {
    let mut upd = BookUpdate {
        instrument,
        sequence,
        bid_prices: Vec::with_capacity(LEVELS),
        bid_volumes: Vec::with_capacity(LEVELS),
        ask_prices: Vec::with_capacity(LEVELS),
        ask_volumes: Vec::with_capacity(LEVELS),
    };
    for i in 0..LEVELS as i64 {
        upd.bid_prices.push((mid_ticks - 1 - i).max(0) * tick);
        upd.bid_volumes.push(rng.gen_range(1..=50));
        if (i as usize) < ask_depth {
            upd.ask_prices.push((mid_ticks + 1 + i) * tick);
            upd.ask_volumes.push(rng.gen_range(1..=50));
        } else {
            upd.ask_prices.push(0);
            upd.ask_volumes.push(0);
        }
    }
    upd
}

fn trade_ticks(book: &BookUpdate, rng: &mut impl Rng) -> BookUpdate {
    let mut t = book.clone();
    for v in t.bid_volumes.iter_mut().chain(t.ask_volumes.iter_mut()) {
        *v = if *v > 0 { rng.gen_range(0..=*v) } else { 0 };
    }
    t
}

/// Random-walk generator, one round per `interval_ms`.
pub async fn run_mock(
    ev_tx: mpsc::Sender<Event>,
    etf_mid_tx: watch::Sender<i64>,
    interval_ms: u64,
    tick: i64,
) {
    let mut fut_mid: i64 = 1_000; // ticks
    let mut seq: u64 = 0;
    info!(interval_ms, tick, "mock feed started");

    loop {
        seq += 1;
        // ThreadRng must not live across an .await
        let events = {
            let mut rng = rand::thread_rng();
            fut_mid = (fut_mid + rng.gen_range(-1..=1)).max(10);
            let etf_mid = fut_mid + rng.gen_range(-1..=1);
            let ask_depth = if rng.gen_ratio(1, 50) { 2 } else { LEVELS };

            let fut = build_book(Instrument::Future, seq, fut_mid, tick, ask_depth, &mut rng);
            let etf = build_book(Instrument::Etf, seq, etf_mid, tick, LEVELS, &mut rng);
            let _ = etf_mid_tx.send(etf_mid * tick);

            let mut out = Vec::with_capacity(4);
            if seq % 4 == 0 {
                out.push(Event::TradeTicks(trade_ticks(&fut, &mut rng)));
                out.push(Event::TradeTicks(trade_ticks(&etf, &mut rng)));
            }
            out.push(Event::OrderBook(etf));
            out.push(Event::OrderBook(fut));
            out
        };

        for ev in events {
            if ev_tx.send(ev).await.is_err() {
                warn!("event channel closed, mock feed stopping");
                return;
            }
        }
        sleep(Duration::from_millis(interval_ms)).await;
    }
}
