// ===============================
// src/domain.rs
// ===============================
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instrument { Future, Etf }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side { Buy, Sell }
impl Side {
    pub fn sign(&self) -> i64 { match self { Side::Buy => 1, Side::Sell => -1 } }
    pub fn opposite(&self) -> Side { match self { Side::Buy => Side::Sell, Side::Sell => Side::Buy } }
    pub fn label(&self) -> &'static str { match self { Side::Buy => "bid", Side::Sell => "ask" } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifespan { FillAndKill, GoodForDay }

/// Top-of-book levels as delivered by the exchange, best-to-worst, zero-padded.
/// Same shape is used for order-book updates and trade ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookUpdate {
    pub instrument: Instrument,
    pub sequence: u64,
    pub bid_prices: Vec<i64>,
    pub bid_volumes: Vec<u32>,
    pub ask_prices: Vec<i64>,
    pub ask_volumes: Vec<u32>,
}

/// Inbound messages from the exchange session, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderBook(BookUpdate),
    TradeTicks(BookUpdate),
    OrderStatus { id: u64, fill_volume: u32, remaining_volume: u32, fees: i64 },
    OrderFilled { id: u64, price: i64, volume: u32 },
    HedgeFilled { id: u64, price: i64, volume: u32 },
    Error { id: u64, message: String },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::OrderBook(_) => "order_book",
            Event::TradeTicks(_) => "trade_ticks",
            Event::OrderStatus { .. } => "order_status",
            Event::OrderFilled { .. } => "order_filled",
            Event::HedgeFilled { .. } => "hedge_filled",
            Event::Error { .. } => "error",
        }
    }
}

/// Outbound order-entry messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Insert { id: u64, side: Side, price: i64, volume: u32, lifespan: Lifespan },
    Cancel { id: u64 },
    Hedge { id: u64, side: Side, price: i64, volume: u32 },
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Insert { .. } => "insert",
            Command::Cancel { .. } => "cancel",
            Command::Hedge { .. } => "hedge",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Entry { Event(Event), Command(Command) }

/// One line of the JSONL recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record { pub ts_ns: i128, pub entry: Entry }

impl Record {
    pub fn now(entry: Entry) -> Self {
        Self { ts_ns: chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0) as i128, entry }
    }
}
