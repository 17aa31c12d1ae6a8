// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Summary : Env-driven configuration for the quoting engine. `.env` is loaded
          first (or the file given by --env-file); every key has a typed
          default so the engine starts against the mock exchange with no
          setup at all.
=============================================================================
*/
use std::env;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::domain::Instrument;

/// Command-line overrides. Anything not given here falls back to ENV.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "etf_mm_rust", version, about = "Future/ETF quoting engine")]
pub struct Cli {
    /// Alternative .env file
    #[arg(long)]
    pub env_file: Option<String>,
    /// JSONL file receiving every event and command
    #[arg(long)]
    pub record_file: Option<String>,
    #[arg(long)]
    pub metrics_port: Option<u16>,
    /// tracing filter, e.g. "info,etf_mm_rust::engine=debug"
    #[arg(long)]
    pub log: Option<String>,
}

/// What the engine does when the action budget is exhausted mid-cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThrottlePolicy {
    /// Stall event processing until the accounting window resets, then finish the cycle.
    Wait,
    /// Abandon the rest of the cycle; the next snapshot retries.
    Drop,
}

impl ThrottlePolicy {
    pub fn parse_one(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wait" | "defer" | "block" => Some(ThrottlePolicy::Wait),
            "drop" | "skip" => Some(ThrottlePolicy::Drop),
            _ => None,
        }
    }
}

fn parse_instrument(s: &str) -> Option<Instrument> {
    match s.trim().to_ascii_lowercase().as_str() {
        "future" | "fut" => Some(Instrument::Future),
        "etf" => Some(Instrument::Etf),
        _ => None,
    }
}

/// Quote shaping parameters, all prices in cents.
#[derive(Clone, Debug, PartialEq)]
pub struct QuoteParams {
    pub tick_size: i64,
    pub half_spread: i64,
    pub skew_per_lot: i64,
    pub order_size: u32,
    pub position_limit: i64,
    /// Soft ceiling: stop adding to a side this many lots before the hard limit.
    pub position_buffer: i64,
    /// Extra half-spread per unit of book dispersion (0 = fixed spread).
    pub dispersion_factor: f64,
}

impl Default for QuoteParams {
    fn default() -> Self {
        Self {
            tick_size: 100,
            half_spread: 100,
            skew_per_lot: 100,
            order_size: 10,
            position_limit: 100,
            position_buffer: 5,
            dispersion_factor: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EngineCfg {
    pub quote: QuoteParams,
    /// Lowest/highest price the exchange accepts; hedges are sent at these bounds.
    pub min_valid_price: i64,
    pub max_valid_price: i64,
    pub action_limit: u32,
    pub action_window: Duration,
    pub throttle_policy: ThrottlePolicy,
    /// Which instrument's order book drives quoting.
    pub quote_instrument: Instrument,
}

impl Default for EngineCfg {
    fn default() -> Self {
        Self {
            quote: QuoteParams::default(),
            min_valid_price: 1,
            max_valid_price: i32::MAX as i64,
            action_limit: 15,
            action_window: Duration::from_secs(1),
            throttle_policy: ThrottlePolicy::Wait,
            quote_instrument: Instrument::Future,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("tick size must be positive (got {0})")]
    TickSize(i64),
    #[error("order size must be positive")]
    OrderSize,
    #[error("position buffer {buffer} must be below position limit {limit}")]
    Buffer { buffer: i64, limit: i64 },
    #[error("negative spread or skew parameter")]
    NegativeParam,
    #[error("dispersion factor must be finite and non-negative (got {0})")]
    DispersionFactor(f64),
    #[error("action limit must be at least 1")]
    ActionLimit,
    #[error("action window must be non-zero")]
    ActionWindow,
    #[error("valid price range [{min}, {max}] is empty or below one tick")]
    PriceRange { min: i64, max: i64 },
}

impl EngineCfg {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let q = &self.quote;
        if q.tick_size <= 0 {
            return Err(ConfigError::TickSize(q.tick_size));
        }
        if q.order_size == 0 {
            return Err(ConfigError::OrderSize);
        }
        if q.position_buffer < 0 || q.position_buffer >= q.position_limit {
            return Err(ConfigError::Buffer { buffer: q.position_buffer, limit: q.position_limit });
        }
        if q.half_spread < 0 || q.skew_per_lot < 0 {
            return Err(ConfigError::NegativeParam);
        }
        if !q.dispersion_factor.is_finite() || q.dispersion_factor < 0.0 {
            return Err(ConfigError::DispersionFactor(q.dispersion_factor));
        }
        if self.action_limit == 0 {
            return Err(ConfigError::ActionLimit);
        }
        if self.action_window.is_zero() {
            return Err(ConfigError::ActionWindow);
        }
        if self.min_valid_price < 0
            || self.max_valid_price - self.min_valid_price < q.tick_size
        {
            return Err(ConfigError::PriceRange { min: self.min_valid_price, max: self.max_valid_price });
        }
        Ok(())
    }
}

/// Process-level settings (outside the engine core).
#[derive(Clone, Debug)]
pub struct Args {
    pub record_file: Option<String>,
    pub metrics_port: u16,
    pub log_filter: String,

    // mock collaborators
    pub feed_interval_ms: u64,
    pub match_every_ms: u64,
    pub fill_probability: f64,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

pub fn load(cli: &Cli) -> Result<(Args, EngineCfg), ConfigError> {
    // .env first so every key below can come from file
    match &cli.env_file {
        Some(path) => {
            let _ = dotenvy::from_filename(path);
        }
        None => {
            let _ = dotenvy::dotenv();
        }
    }

    let record_file = cli.record_file.clone().or_else(|| env::var("RECORD_FILE").ok());
    let metrics_port = cli.metrics_port.unwrap_or_else(|| env_or("METRICS_PORT", 9898));
    let log_filter = cli
        .log
        .clone()
        .or_else(|| env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_string());

    let args = Args {
        record_file,
        metrics_port,
        log_filter,
        feed_interval_ms: env_or("FEED_INTERVAL_MS", 250),
        match_every_ms: env_or("MATCH_EVERY_MS", 100),
        fill_probability: env_or("FILL_PROBABILITY", 0.2),
    };

    // ===== Engine =====
    let d = EngineCfg::default();
    let quote = QuoteParams {
        tick_size: env_or("TICK_SIZE", d.quote.tick_size),
        half_spread: env_or("HALF_SPREAD", d.quote.half_spread),
        skew_per_lot: env_or("SKEW_PER_LOT", d.quote.skew_per_lot),
        order_size: env_or("ORDER_SIZE", d.quote.order_size),
        position_limit: env_or("POSITION_LIMIT", d.quote.position_limit),
        position_buffer: env_or("POSITION_BUFFER", d.quote.position_buffer),
        dispersion_factor: env_or("DISPERSION_FACTOR", d.quote.dispersion_factor),
    };
    let throttle_policy = env::var("THROTTLE_POLICY")
        .ok()
        .and_then(|s| ThrottlePolicy::parse_one(&s))
        .unwrap_or(d.throttle_policy);
    let quote_instrument = env::var("QUOTE_INSTRUMENT")
        .ok()
        .and_then(|s| parse_instrument(&s))
        .unwrap_or(d.quote_instrument);

    let cfg = EngineCfg {
        quote,
        min_valid_price: env_or("MIN_VALID_PRICE", d.min_valid_price),
        max_valid_price: env_or("MAX_VALID_PRICE", d.max_valid_price),
        action_limit: env_or("ACTION_LIMIT", d.action_limit),
        action_window: Duration::from_millis(env_or("ACTION_WINDOW_MS", 1_000)),
        throttle_policy,
        quote_instrument,
    };
    cfg.validate()?;
    Ok((args, cfg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(EngineCfg::default().validate(), Ok(()));
    }

    #[test]
    fn buffer_must_stay_below_limit() {
        let mut cfg = EngineCfg::default();
        cfg.quote.position_buffer = 100;
        assert_eq!(cfg.validate(), Err(ConfigError::Buffer { buffer: 100, limit: 100 }));
    }

    #[test]
    fn zero_tick_and_zero_budget_rejected() {
        let mut cfg = EngineCfg::default();
        cfg.quote.tick_size = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::TickSize(0)));

        let mut cfg = EngineCfg::default();
        cfg.action_limit = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::ActionLimit));
    }

    #[test]
    fn dispersion_factor_must_be_finite() {
        let mut cfg = EngineCfg::default();
        cfg.quote.dispersion_factor = f64::INFINITY;
        assert_eq!(cfg.validate(), Err(ConfigError::DispersionFactor(f64::INFINITY)));
        cfg.quote.dispersion_factor = -0.5;
        assert_eq!(cfg.validate(), Err(ConfigError::DispersionFactor(-0.5)));
        cfg.quote.dispersion_factor = 2.0;
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn policy_and_instrument_names() {
        assert_eq!(ThrottlePolicy::parse_one(" Wait "), Some(ThrottlePolicy::Wait));
        assert_eq!(ThrottlePolicy::parse_one("drop"), Some(ThrottlePolicy::Drop));
        assert_eq!(ThrottlePolicy::parse_one("sleep"), None);
        assert_eq!(parse_instrument("ETF"), Some(Instrument::Etf));
        assert_eq!(parse_instrument("fut"), Some(Instrument::Future));
    }

    #[test]
    fn cli_parses_overrides() {
        let cli = Cli::try_parse_from(["etf_mm_rust", "--metrics-port", "9100", "--log", "debug"]).unwrap();
        assert_eq!(cli.metrics_port, Some(9100));
        assert_eq!(cli.log.as_deref(), Some("debug"));
        assert!(cli.record_file.is_none());
    }
}
