// ===============================
// src/book.rs (snapshot ingestion)
// ===============================
//
// Turns a raw `BookUpdate` into a `MarketSnapshot` the pricing code can trust:
// equal-length price/volume arrays, at least FAIR_VALUE_DEPTH levels, no price
// after a zero-padded level, and prices never improving away from the touch.
//
// A zero at index 0 of one side is "no market" on that side and is accepted;
// only a book that is empty on both sides is rejected outright.
//
use thiserror::Error;

use crate::domain::{BookUpdate, Instrument, Side};

/// Levels per side the fair value needs.
pub const FAIR_VALUE_DEPTH: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("{0:?} side: {1} prices vs {2} volumes")]
    LengthMismatch(Side, usize, usize),
    #[error("{side:?} side has {depth} levels, need at least 3")]
    TooShallow { side: Side, depth: usize },
    #[error("book is empty on both sides")]
    Empty,
    #[error("{0:?} side has a price after an empty level")]
    Gap(Side),
    #[error("{0:?} side prices improve away from the touch")]
    NotMonotonic(Side),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level { pub price: i64, pub volume: u32 }

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketSnapshot {
    pub instrument: Instrument,
    pub sequence: u64,
    bids: Vec<Level>,
    asks: Vec<Level>,
}

fn levels(side: Side, prices: &[i64], volumes: &[u32]) -> Result<Vec<Level>, SnapshotError> {
    if prices.len() != volumes.len() {
        return Err(SnapshotError::LengthMismatch(side, prices.len(), volumes.len()));
    }
    if prices.len() < FAIR_VALUE_DEPTH {
        return Err(SnapshotError::TooShallow { side, depth: prices.len() });
    }

    let mut out = Vec::with_capacity(prices.len());
    let mut seen_empty = false;
    let mut prev: Option<i64> = None;
    for (&price, &volume) in prices.iter().zip(volumes) {
        if price <= 0 {
            seen_empty = true;
        } else if seen_empty {
            return Err(SnapshotError::Gap(side));
        } else if let Some(p) = prev {
            let improves = match side {
                Side::Buy => price > p,
                Side::Sell => price < p,
            };
            if improves {
                return Err(SnapshotError::NotMonotonic(side));
            }
        }
        if price > 0 {
            prev = Some(price);
        }
        out.push(Level { price: price.max(0), volume });
    }
    Ok(out)
}

impl MarketSnapshot {
    pub fn from_update(upd: &BookUpdate) -> Result<Self, SnapshotError> {
        let bids = levels(Side::Buy, &upd.bid_prices, &upd.bid_volumes)?;
        let asks = levels(Side::Sell, &upd.ask_prices, &upd.ask_volumes)?;
        if bids[0].price == 0 && asks[0].price == 0 {
            return Err(SnapshotError::Empty);
        }
        Ok(Self { instrument: upd.instrument, sequence: upd.sequence, bids, asks })
    }

    pub fn side(&self, side: Side) -> &[Level] {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    /// The best `n` levels of a side (fewer if the book is shallower).
    pub fn top(&self, side: Side, n: usize) -> &[Level] {
        let lv = self.side(side);
        &lv[..n.min(lv.len())]
    }

    pub fn best_bid(&self) -> i64 { self.bids[0].price }
    pub fn best_ask(&self) -> i64 { self.asks[0].price }
    pub fn has_bid(&self) -> bool { self.best_bid() != 0 }
    pub fn has_ask(&self) -> bool { self.best_ask() != 0 }
}

#[cfg(test)]
pub(crate) fn update(bids: &[(i64, u32)], asks: &[(i64, u32)]) -> BookUpdate {
    BookUpdate {
        instrument: Instrument::Future,
        sequence: 1,
        bid_prices: bids.iter().map(|l| l.0).collect(),
        bid_volumes: bids.iter().map(|l| l.1).collect(),
        ask_prices: asks.iter().map(|l| l.0).collect(),
        ask_volumes: asks.iter().map(|l| l.1).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_zero_padded_five_level_book() {
        let upd = update(
            &[(9900, 10), (9890, 5), (9880, 5), (0, 0), (0, 0)],
            &[(9910, 10), (9920, 5), (9930, 5), (9940, 1), (0, 0)],
        );
        let snap = MarketSnapshot::from_update(&upd).unwrap();
        assert_eq!(snap.best_bid(), 9900);
        assert_eq!(snap.best_ask(), 9910);
        assert_eq!(snap.top(Side::Sell, 3).len(), 3);
        assert_eq!(snap.top(Side::Buy, 9).len(), 5);
    }

    #[test]
    fn one_sided_book_is_no_market_not_an_error() {
        let upd = update(&[(0, 0), (0, 0), (0, 0)], &[(9910, 10), (9920, 5), (9930, 5)]);
        let snap = MarketSnapshot::from_update(&upd).unwrap();
        assert!(!snap.has_bid());
        assert!(snap.has_ask());
    }

    #[test]
    fn rejects_malformed_books() {
        let empty = update(&[(0, 0); 5], &[(0, 0); 5]);
        assert_eq!(MarketSnapshot::from_update(&empty), Err(SnapshotError::Empty));

        let shallow = update(&[(9900, 1), (9890, 1)], &[(9910, 1), (9920, 1), (9930, 1)]);
        assert_eq!(
            MarketSnapshot::from_update(&shallow),
            Err(SnapshotError::TooShallow { side: Side::Buy, depth: 2 })
        );

        let gap = update(&[(9900, 1), (0, 0), (9880, 1)], &[(9910, 1), (9920, 1), (9930, 1)]);
        assert_eq!(MarketSnapshot::from_update(&gap), Err(SnapshotError::Gap(Side::Buy)));

        let inverted = update(&[(9900, 1), (9890, 1), (9880, 1)], &[(9910, 1), (9905, 1), (9930, 1)]);
        assert_eq!(MarketSnapshot::from_update(&inverted), Err(SnapshotError::NotMonotonic(Side::Sell)));

        let mut mismatch = update(&[(9900, 1), (9890, 1), (9880, 1)], &[(9910, 1), (9920, 1), (9930, 1)]);
        mismatch.ask_volumes.pop();
        assert_eq!(
            MarketSnapshot::from_update(&mismatch),
            Err(SnapshotError::LengthMismatch(Side::Sell, 3, 2))
        );
    }
}
