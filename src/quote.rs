// ===============================
// src/quote.rs (inventory-skewed quotes)
// ===============================
//
// bid = fair - half_spread - position * skew_per_lot
// ask = fair + half_spread - position * skew_per_lot
//
// Long inventory pushes both quotes down (sell more readily, buy less), short
// inventory pushes them up. A price of NO_QUOTE (0) means "do not quote this
// side": the price went non-positive, the side had no market, or inventory is
// inside the soft ceiling buffer.
//
use crate::config::QuoteParams;
use crate::fair_value::FairValue;

pub const NO_QUOTE: i64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub bid_price: i64,
    pub ask_price: i64,
    pub size: u32,
}

impl Quote {
    pub fn quotes_bid(&self) -> bool { self.bid_price != NO_QUOTE }
    pub fn quotes_ask(&self) -> bool { self.ask_price != NO_QUOTE }
}

fn trunc_tick(px: i64, tick: i64) -> i64 {
    px / tick * tick
}

fn or_no_quote(px: i64, live: bool) -> i64 {
    if live && px > 0 { px } else { NO_QUOTE }
}

pub fn derive(fv: &FairValue, position: i64, bid_market: bool, ask_market: bool, p: &QuoteParams) -> Quote {
    let widen = trunc_tick((p.dispersion_factor * fv.dispersion) as i64, p.tick_size);
    let half = p.half_spread.saturating_add(widen);
    let skew = position.saturating_mul(p.skew_per_lot);

    let bid = trunc_tick(fv.price.saturating_sub(half).saturating_sub(skew), p.tick_size);
    let ask = trunc_tick(fv.price.saturating_add(half).saturating_sub(skew), p.tick_size);

    let ceiling = p.position_limit - p.position_buffer;
    let bid_open = bid_market && position < ceiling;
    let ask_open = ask_market && position > -ceiling;

    Quote {
        bid_price: or_no_quote(bid, bid_open),
        ask_price: or_no_quote(ask, ask_open),
        size: p.order_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv(price: i64) -> FairValue {
        FairValue { price, dispersion: 0.0 }
    }

    #[test]
    fn flat_inventory_quotes_symmetrically() {
        let q = derive(&fv(9900), 0, true, true, &QuoteParams::default());
        assert_eq!(q, Quote { bid_price: 9800, ask_price: 10_000, size: 10 });
        assert_eq!(9900 - q.bid_price, q.ask_price - 9900);
    }

    #[test]
    fn soft_ceiling_suppresses_bid_only() {
        let p = QuoteParams { position_limit: 100, position_buffer: 5, ..QuoteParams::default() };
        let q = derive(&fv(9900), 95, true, true, &p);
        assert!(!q.quotes_bid());
        assert!(q.quotes_ask());

        let q = derive(&fv(9900), 94, true, true, &p);
        assert!(q.quotes_bid());
    }

    #[test]
    fn soft_floor_suppresses_ask_only() {
        let q = derive(&fv(9900), -95, true, true, &QuoteParams::default());
        assert!(q.quotes_bid());
        assert!(!q.quotes_ask());
    }

    #[test]
    fn skew_leans_against_inventory() {
        let p = QuoteParams::default();
        let flat = derive(&fv(9900), 0, true, true, &p);
        let long = derive(&fv(9900), 3, true, true, &p);
        let short = derive(&fv(9900), -3, true, true, &p);
        assert_eq!(long.bid_price, flat.bid_price - 300);
        assert_eq!(long.ask_price, flat.ask_price - 300);
        assert_eq!(short.bid_price, flat.bid_price + 300);
        assert_eq!(short.ask_price, flat.ask_price + 300);
    }

    #[test]
    fn extreme_dispersion_widening_saturates() {
        let p = QuoteParams { dispersion_factor: 1e30, ..QuoteParams::default() };
        let q = derive(&FairValue { price: 9900, dispersion: 12.5 }, 0, true, true, &p);
        assert_eq!(q.bid_price, NO_QUOTE);
        assert_eq!(q.ask_price % p.tick_size, 0);
        assert!(q.ask_price > 9900);
    }

    #[test]
    fn non_positive_price_becomes_no_quote() {
        // fair 500, 10 long: bid 500-100-1000 < 0, ask 500+100-1000 < 0
        let q = derive(&fv(500), 10, true, true, &QuoteParams::default());
        assert_eq!(q.bid_price, NO_QUOTE);
        assert_eq!(q.ask_price, NO_QUOTE);
    }

    #[test]
    fn missing_market_side_is_not_quoted() {
        let q = derive(&fv(9900), 0, false, true, &QuoteParams::default());
        assert_eq!(q.bid_price, NO_QUOTE);
        assert_eq!(q.ask_price, 10_000);
    }

    #[test]
    fn prices_are_tick_multiples() {
        let p = QuoteParams { tick_size: 25, half_spread: 30, skew_per_lot: 7, ..QuoteParams::default() };
        for pos in -20..20 {
            let q = derive(&fv(10_025), pos, true, true, &p);
            assert_eq!(q.bid_price % 25, 0);
            assert_eq!(q.ask_price % 25, 0);
        }
    }

    #[test]
    fn dispersion_widens_the_spread() {
        let p = QuoteParams { dispersion_factor: 10.0, ..QuoteParams::default() };
        let wide = FairValue { price: 9900, dispersion: 15.0 };
        let q = derive(&wide, 0, true, true, &p);
        assert_eq!(q.bid_price, 9900 - 100 - 100);
        assert_eq!(q.ask_price, 9900 + 100 + 100);
    }
}
