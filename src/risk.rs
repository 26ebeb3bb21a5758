// Stop-loss / take-profit planning from recent support and resistance

use crate::error::{BotError, Result};
use crate::types::{Candle, Direction, RiskLevels};
use log::info;

/// Floor on the stop distance so rounding noise can't produce an
/// unrealistically tight stop.
pub const MIN_STOP_LOSS_PCT: f64 = 0.3;

/// Fixed scalping take-profit target.
pub const TAKE_PROFIT_PCT: f64 = 0.5;

/// Derive stop-loss and take-profit levels for a trade at `entry_price`.
///
/// Longs stop below the lowest low of the window (nearest support), shorts
/// above the highest high (nearest resistance). The take-profit is a fixed
/// percentage from entry, signed by direction.
pub fn plan_risk_levels(
    direction: Direction,
    entry_price: f64,
    candles: &[Candle],
) -> Result<RiskLevels> {
    if entry_price <= 0.0 {
        return Err(BotError::InvalidInput(format!(
            "entry price must be positive, got {entry_price}"
        )));
    }
    if candles.is_empty() {
        return Err(BotError::InvalidInput("empty candle window for risk levels".into()));
    }

    let (stop_loss_price, stop_loss_pct) = match direction {
        Direction::Long => {
            let support = candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
            let pct = ((entry_price - support) / entry_price * 100.0).max(MIN_STOP_LOSS_PCT);
            (support, pct)
        }
        Direction::Short => {
            let resistance = candles.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
            let pct = ((resistance - entry_price) / entry_price * 100.0).max(MIN_STOP_LOSS_PCT);
            (resistance, pct)
        }
    };

    let take_profit_price = match direction {
        Direction::Long => entry_price * (1.0 + TAKE_PROFIT_PCT / 100.0),
        Direction::Short => entry_price * (1.0 - TAKE_PROFIT_PCT / 100.0),
    };

    info!(
        "RISK: {direction} sl={stop_loss_pct:.2}% @ {stop_loss_price:.2}, tp={TAKE_PROFIT_PCT}% @ {take_profit_price:.2}"
    );

    Ok(RiskLevels {
        stop_loss_price,
        stop_loss_pct,
        take_profit_price,
        take_profit_pct: TAKE_PROFIT_PCT,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};

    fn window(lows_highs: &[(f64, f64)]) -> Vec<Candle> {
        lows_highs
            .iter()
            .enumerate()
            .map(|(i, &(low, high))| Candle {
                open_time: Utc.timestamp_opt(1_700_000_000 + i as i64 * 300, 0).unwrap(),
                close_time: Utc.timestamp_opt(1_700_000_000 + (i as i64 + 1) * 300 - 1, 0).unwrap(),
                open: (low + high) / 2.0,
                high,
                low,
                close: (low + high) / 2.0,
                volume: 100.0,
                trade_count: 10,
            })
            .collect()
    }

    #[test]
    fn long_stops_at_window_minimum_low() {
        let candles = window(&[(49000.0, 50100.0), (48500.0, 50200.0), (48900.0, 50050.0)]);
        let levels = plan_risk_levels(Direction::Long, 50000.0, &candles).unwrap();
        assert_relative_eq!(levels.stop_loss_price, 48500.0);
        assert_relative_eq!(levels.stop_loss_pct, 3.0);
        assert_relative_eq!(levels.take_profit_price, 50250.0);
        assert_relative_eq!(levels.take_profit_pct, 0.5);
    }

    #[test]
    fn short_stops_at_window_maximum_high() {
        let candles = window(&[(49000.0, 50100.0), (48500.0, 51000.0), (48900.0, 50050.0)]);
        let levels = plan_risk_levels(Direction::Short, 50000.0, &candles).unwrap();
        assert_relative_eq!(levels.stop_loss_price, 51000.0);
        assert_relative_eq!(levels.stop_loss_pct, 2.0);
        assert_relative_eq!(levels.take_profit_price, 49750.0);
    }

    #[test]
    fn stop_loss_pct_clamps_to_floor() {
        // Support within 0.1% of entry: the raw distance would be 0.1%.
        let candles = window(&[(49950.0, 50020.0)]);
        let levels = plan_risk_levels(Direction::Long, 50000.0, &candles).unwrap();
        assert_relative_eq!(levels.stop_loss_pct, MIN_STOP_LOSS_PCT);
    }

    #[test]
    fn rejects_non_positive_entry() {
        let candles = window(&[(49000.0, 50100.0)]);
        assert!(matches!(
            plan_risk_levels(Direction::Long, 0.0, &candles).unwrap_err(),
            BotError::InvalidInput(_)
        ));
        assert!(matches!(
            plan_risk_levels(Direction::Short, -5.0, &candles).unwrap_err(),
            BotError::InvalidInput(_)
        ));
    }

    #[test]
    fn rejects_empty_window() {
        assert!(matches!(
            plan_risk_levels(Direction::Long, 50000.0, &[]).unwrap_err(),
            BotError::InvalidInput(_)
        ));
    }
}
