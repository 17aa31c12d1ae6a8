// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use tracing::{error, info};

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Market data --------
pub static BOOK_UPDATES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("book_updates_total", "order book updates (label: instrument)"),
        &["instrument"],
    )
    .unwrap()
});

pub static TRADE_TICKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("trade_ticks_total", "trade tick messages (label: instrument)"),
        &["instrument"],
    )
    .unwrap()
});

pub static SNAPSHOTS_SKIPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("snapshots_skipped_total", "quoting cycles skipped (label: reason)"),
        &["reason"],
    )
    .unwrap()
});

// -------- Quoting --------
pub static FAIR_VALUE: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("fair_value", "last fair value (cents)").unwrap());

pub static QUOTE_PRICE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("quote_price", "last desired quote, 0 = not quoting (label: side)"),
        &["side"],
    )
    .unwrap()
});

pub static ACTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("order_actions_total", "commands issued (label: kind)"),
        &["kind"],
    )
    .unwrap()
});

pub static THROTTLED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("throttled_total", "actions refused by the action budget").unwrap()
});

pub static EXEC_REPORTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("exec_reports_total", "execution messages (label: kind)"),
        &["kind"],
    )
    .unwrap()
});

pub static HEDGE_FAILURES: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("hedge_failures_total", "rejected hedge orders").unwrap());

// -------- Inventory --------
pub static POSITION: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("position_lots", "net primary position").unwrap());

pub static HEDGE_POSITION: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("hedge_position_lots", "net hedge position").unwrap());

pub static FEES: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("fees_cents", "fees paid, negative = rebate").unwrap());

pub static TRADED_VOLUME: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("traded_volume_total", "lots filled on quotes").unwrap());

pub fn init() {
    // Register all metrics to the custom registry
    for m in [
        REGISTRY.register(Box::new(BOOK_UPDATES.clone())),
        REGISTRY.register(Box::new(TRADE_TICKS.clone())),
        REGISTRY.register(Box::new(SNAPSHOTS_SKIPPED.clone())),
        REGISTRY.register(Box::new(FAIR_VALUE.clone())),
        REGISTRY.register(Box::new(QUOTE_PRICE.clone())),
        REGISTRY.register(Box::new(ACTIONS.clone())),
        REGISTRY.register(Box::new(THROTTLED.clone())),
        REGISTRY.register(Box::new(EXEC_REPORTS.clone())),
        REGISTRY.register(Box::new(HEDGE_FAILURES.clone())),
        REGISTRY.register(Box::new(POSITION.clone())),
        REGISTRY.register(Box::new(HEDGE_POSITION.clone())),
        REGISTRY.register(Box::new(FEES.clone())),
        REGISTRY.register(Box::new(TRADED_VOLUME.clone())),
    ] {
        if let Err(e) = m {
            error!(?e, "metric registration failed");
        }
    }
}

// Encode all metrics in Prometheus text format
fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

// Serve one HTTP request (GET / or /metrics): tiny HTTP 1.1 responder
fn handle_client(mut stream: TcpStream) {
    // Read a bit to consume headers (no full parse)
    let mut _req_buf = [0u8; 1024];
    let _ = stream.read(&mut _req_buf);

    let body = encode_metrics();
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );

    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

/// Bind the metrics port and serve it from a dedicated OS thread.
pub fn serve_metrics(port: u16) -> std::io::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)?;
    info!(%addr, "metrics listening (/ and /metrics)");
    thread::spawn(move || {
        for conn in listener.incoming() {
            match conn {
                Ok(stream) => handle_client(stream),
                Err(e) => error!(?e, "metrics accept error"),
            }
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_metrics_encode_as_text() {
        init();
        ACTIONS.with_label_values(&["insert"]).inc();
        let text = String::from_utf8(encode_metrics()).unwrap();
        assert!(text.contains("order_actions_total"));
    }
}
