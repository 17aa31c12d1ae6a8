// ===============================
// src/fair_value.rs
// ===============================
//
// Fair value = mean of the bid-side VWAP and the ask-side VWAP over the best
// three levels, truncated down to a tick. Dispersion is the population standard
// deviation of those six prices and only feeds optional spread widening.
//
use crate::book::{Level, MarketSnapshot, FAIR_VALUE_DEPTH};
use crate::domain::Side;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FairValue {
    pub price: i64,
    pub dispersion: f64,
}

/// (sum price*volume, sum volume) over the top levels, None on a missing price.
fn weighted(levels: &[Level]) -> Option<(i128, i128)> {
    let mut pv: i128 = 0;
    let mut v: i128 = 0;
    for l in levels {
        if l.price <= 0 {
            return None;
        }
        pv += l.price as i128 * l.volume as i128;
        v += l.volume as i128;
    }
    if v == 0 { None } else { Some((pv, v)) }
}

fn dispersion(levels: &[&Level]) -> f64 {
    let n = levels.len() as f64;
    let mean = levels.iter().map(|l| l.price as f64).sum::<f64>() / n;
    let var = levels.iter().map(|l| (l.price as f64 - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

/// None means "no fair value": skip this update.
pub fn fair_value(snap: &MarketSnapshot, tick_size: i64) -> Option<FairValue> {
    let bids = snap.top(Side::Buy, FAIR_VALUE_DEPTH);
    let asks = snap.top(Side::Sell, FAIR_VALUE_DEPTH);
    if bids.len() < FAIR_VALUE_DEPTH || asks.len() < FAIR_VALUE_DEPTH || tick_size <= 0 {
        return None;
    }
    let (bpv, bv) = weighted(bids)?;
    let (apv, av) = weighted(asks)?;

    // (bpv/bv + apv/av) / 2 without leaving integer arithmetic
    let raw = (bpv * av + apv * bv) / (2 * bv * av);
    let price = (raw as i64) / tick_size * tick_size;

    let all: Vec<&Level> = bids.iter().chain(asks.iter()).collect();
    Some(FairValue { price, dispersion: dispersion(&all) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::update;

    fn snap(bids: &[(i64, u32)], asks: &[(i64, u32)]) -> MarketSnapshot {
        MarketSnapshot::from_update(&update(bids, asks)).unwrap()
    }

    #[test]
    fn reference_book_prices_at_9900() {
        let s = snap(&[(9900, 10), (9890, 5), (9880, 5)], &[(9910, 10), (9920, 5), (9930, 5)]);
        // bid vwap 9892.5, ask vwap 9917.5 -> 9905 -> 9900
        let fv = fair_value(&s, 100).unwrap();
        assert_eq!(fv.price, 9900);
        assert!(fv.dispersion > 0.0);
    }

    #[test]
    fn truncates_rather_than_rounds() {
        let s = snap(&[(10_000, 1), (9_900, 1), (9_800, 1)], &[(10_100, 1), (10_200, 1), (10_300, 1)]);
        // (9900 + 10200) / 2 = 10050
        assert_eq!(fair_value(&s, 100).unwrap().price, 10_000);
        assert_eq!(fair_value(&s, 10).unwrap().price, 10_050);
    }

    #[test]
    fn no_fair_value_without_three_priced_levels() {
        let s = snap(&[(9900, 10), (9890, 5), (0, 0)], &[(9910, 10), (9920, 5), (9930, 5)]);
        assert_eq!(fair_value(&s, 100), None);

        let s = snap(&[(0, 0), (0, 0), (0, 0)], &[(9910, 10), (9920, 5), (9930, 5)]);
        assert_eq!(fair_value(&s, 100), None);
    }

    #[test]
    fn no_fair_value_on_zero_volume_side() {
        let s = snap(&[(9900, 0), (9890, 0), (9880, 0)], &[(9910, 10), (9920, 5), (9930, 5)]);
        assert_eq!(fair_value(&s, 100), None);
    }

    #[test]
    fn stays_inside_the_top_three_range() {
        let books: [(&[(i64, u32)], &[(i64, u32)]); 4] = [
            (&[(10_000, 1), (9_900, 500), (9_800, 900)], &[(10_100, 1), (10_200, 1), (10_300, 1)]),
            (&[(10_000, 900), (9_900, 1), (9_800, 1)], &[(10_100, 1), (10_200, 1), (10_300, 900)]),
            (&[(50_000, 7), (49_900, 3), (49_800, 2)], &[(50_100, 7), (50_200, 3), (50_300, 2)]),
            (&[(200, 1), (100, 1), (100, 5)], &[(300, 40), (400, 1), (900, 1)]),
        ];
        for (b, a) in books {
            let s = snap(b, a);
            let fv = fair_value(&s, 100).unwrap();
            let lo = b.iter().map(|l| l.0).min().unwrap();
            let hi = a.iter().map(|l| l.0).max().unwrap();
            assert!(fv.price >= lo && fv.price <= hi, "{} outside [{lo}, {hi}]", fv.price);
        }
    }

    #[test]
    fn flat_book_has_zero_dispersion() {
        let s = snap(&[(9900, 1), (9900, 1), (9900, 1)], &[(9900, 1), (9900, 1), (9900, 1)]);
        let fv = fair_value(&s, 100).unwrap();
        assert_eq!(fv.price, 9900);
        assert_eq!(fv.dispersion, 0.0);
    }
}
