// ===============================
// src/main.rs
// ===============================
/*
 cargo run -- --record-file data/session.jsonl --log info,etf_mm_rust::engine=debug

# inventory & quoting state
curl -s localhost:9898/metrics | egrep '^(position_lots|hedge_position_lots|fees_cents|fair_value)'

# action budget pressure
curl -s localhost:9898/metrics | egrep '^(order_actions_total|throttled_total)'
*/
/*
=============================================================================
Summary : Market-making engine for a future/ETF pair. Quotes the primary
          instrument around a top-of-book VWAP fair value, skews by
          inventory, keeps at most one bid and one ask resting under a
          per-window action budget, and hedges every fill on the other
          instrument. Runs against a mock feed and mock exchange, exposes
          Prometheus metrics, and records JSONL events.
=============================================================================
*/
mod domain;
mod config;
mod metrics;
mod recorder;
mod feed;
mod gateway;          // mock exchange (validate, ack, random fills, hedge fills)
mod book;
mod fair_value;
mod quote;
mod throttle;
mod ledger;
mod hedge;
mod positions;
mod engine;

use clap::Parser;
use tokio::{
    select,
    sync::{mpsc, watch},
    time::{interval, Duration},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::domain::{Command, Event, Record};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ---- Config (CLI > ENV > .env > defaults) ----
    let cli = config::Cli::parse();
    let (args, cfg) = config::load(&cli)?;

    // ---- Logging ----
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log_filter))
        .init();

    // ---- Metrics ----
    metrics::init();
    metrics::serve_metrics(args.metrics_port)?;

    info!(
        quote_instrument = ?cfg.quote_instrument,
        tick = cfg.quote.tick_size,
        half_spread = cfg.quote.half_spread,
        skew_per_lot = cfg.quote.skew_per_lot,
        order_size = cfg.quote.order_size,
        position_limit = cfg.quote.position_limit,
        position_buffer = cfg.quote.position_buffer,
        action_limit = cfg.action_limit,
        action_window_ms = cfg.action_window.as_millis() as u64,
        throttle_policy = ?cfg.throttle_policy,
        record_file = ?args.record_file,
        "startup config"
    );

    // ---- Buses ----
    let (ev_tx, ev_rx) = mpsc::channel::<Event>(4096);
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(2048);
    let (etf_mid_tx, etf_mid_rx) = watch::channel::<i64>(0);

    // ---- Recorder (optional) ----
    let rec_tx = match args.record_file.clone() {
        Some(path) => {
            let (tx, rx) = mpsc::channel::<Record>(8192);
            tokio::spawn(recorder::run(rx, path));
            Some(tx)
        }
        None => None,
    };

    // ---- Feed ----
    tokio::spawn(feed::run_mock(
        ev_tx.clone(),
        etf_mid_tx,
        args.feed_interval_ms,
        cfg.quote.tick_size,
    ));

    // ---- Exchange ----
    let venue = gateway::VenueCfg {
        tick_size: cfg.quote.tick_size,
        min_price: cfg.min_valid_price,
        max_price: cfg.max_valid_price,
        match_every_ms: args.match_every_ms,
        fill_probability: args.fill_probability,
    };
    tokio::spawn(gateway::run_mock(cmd_rx, ev_tx, etf_mid_rx, venue));

    // ---- Engine ----
    let engine_task = tokio::spawn(engine::run(engine::Engine::new(cfg), ev_rx, cmd_tx, rec_tx));

    // ---- Heartbeat ----
    let mut hb = interval(Duration::from_secs(1));
    loop {
        select! {
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received, shutting down");
                break;
            }
            _ = hb.tick() => {
                info!(
                    position = metrics::POSITION.get(),
                    hedge_position = metrics::HEDGE_POSITION.get(),
                    fees = metrics::FEES.get(),
                    fair_value = metrics::FAIR_VALUE.get(),
                    "heartbeat"
                );
            }
        }
    }

    engine_task.abort();
    Ok(())
}
