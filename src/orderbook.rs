// Order book analysis: quantity-weighted bid/ask imbalance

use crate::types::OrderBookPressure;

/// One price level of a depth snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Level {
    pub price: f64,
    pub qty: f64,
}

/// Top-of-book depth snapshot, already parsed from the exchange payload.
#[derive(Debug, Clone, Default)]
pub struct DepthSnapshot {
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
}

/// Sum both sides of the book and flag buyer pressure when aggregate bid
/// quantity exceeds aggregate ask quantity by more than `ratio_threshold`.
///
/// A one-sided book (bids but no asks) is maximal buyer pressure; an empty
/// book is not.
pub fn analyze_depth(depth: &DepthSnapshot, ratio_threshold: f64) -> OrderBookPressure {
    let bid_sum: f64 = depth.bids.iter().map(|level| level.qty).sum();
    let ask_sum: f64 = depth.asks.iter().map(|level| level.qty).sum();

    let buyer_pressure = if ask_sum > 0.0 {
        bid_sum / ask_sum > ratio_threshold
    } else {
        bid_sum > 0.0
    };

    OrderBookPressure { buyer_pressure, bid_sum, ask_sum }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn depth(bids: &[f64], asks: &[f64]) -> DepthSnapshot {
        DepthSnapshot {
            bids: bids.iter().map(|&qty| Level { price: 100.0, qty }).collect(),
            asks: asks.iter().map(|&qty| Level { price: 100.1, qty }).collect(),
        }
    }

    #[test]
    fn heavy_bids_flag_buyer_pressure() {
        let pressure = analyze_depth(&depth(&[10.0, 10.0, 11.0], &[5.0, 5.0]), 3.0);
        assert!(pressure.buyer_pressure);
        assert_relative_eq!(pressure.bid_sum, 31.0);
        assert_relative_eq!(pressure.ask_sum, 10.0);
    }

    #[test]
    fn exact_ratio_is_not_buyer_pressure() {
        let pressure = analyze_depth(&depth(&[30.0], &[10.0]), 3.0);
        assert!(!pressure.buyer_pressure);
    }

    #[test]
    fn balanced_book_is_not_buyer_pressure() {
        let pressure = analyze_depth(&depth(&[10.0], &[10.0]), 3.0);
        assert!(!pressure.buyer_pressure);
    }

    #[test]
    fn one_sided_book_is_buyer_pressure() {
        let pressure = analyze_depth(&depth(&[5.0], &[]), 3.0);
        assert!(pressure.buyer_pressure);
    }

    #[test]
    fn empty_book_is_not_buyer_pressure() {
        let pressure = analyze_depth(&DepthSnapshot::default(), 3.0);
        assert!(!pressure.buyer_pressure);
        assert_relative_eq!(pressure.bid_sum, 0.0);
    }
}
