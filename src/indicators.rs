// Pure indicator calculators: no I/O, no side effects.
// Candle windows in, latest indicator values out.

use crate::error::{BotError, Result};
use crate::types::{Candle, MacdParams, MacdValue, VolumeReading};

/// Simple moving average over the whole slice. Returns 0 for an empty slice.
pub fn sma(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Exponential moving average series, seeded with the SMA of the first
/// `period` values. Multiplier k = 2 / (period + 1). Empty when the input is
/// shorter than `period`.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed = sma(&values[..period]);

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    for &value in &values[period..] {
        let prev = *out.last().expect("seeded above");
        out.push(value * k + prev * (1.0 - k));
    }
    out
}

/// Wilder relative strength index over closing prices. Returns only the most
/// recent value; a full series is never needed by the scoring engine.
pub fn rsi(candles: &[Candle], period: usize) -> Result<f64> {
    let needed = period + 1;
    if period == 0 || candles.len() < needed {
        return Err(BotError::InsufficientData { needed, got: candles.len() });
    }

    let changes: Vec<f64> = candles.windows(2).map(|w| w[1].close - w[0].close).collect();

    let mut avg_gain = changes[..period]
        .iter()
        .map(|&c| if c > 0.0 { c } else { 0.0 })
        .sum::<f64>()
        / period as f64;
    let mut avg_loss = changes[..period]
        .iter()
        .map(|&c| if c < 0.0 { -c } else { 0.0 })
        .sum::<f64>()
        / period as f64;

    // Wilder smoothing for the remaining changes: alpha = 1/period.
    for &change in &changes[period..] {
        if change > 0.0 {
            avg_gain = (avg_gain * (period as f64 - 1.0) + change) / period as f64;
            avg_loss = (avg_loss * (period as f64 - 1.0)) / period as f64;
        } else {
            avg_gain = (avg_gain * (period as f64 - 1.0)) / period as f64;
            avg_loss = (avg_loss * (period as f64 - 1.0) - change) / period as f64;
        }
    }

    if avg_loss == 0.0 {
        return Ok(100.0);
    }

    let rs = avg_gain / avg_loss;
    Ok(100.0 - 100.0 / (1.0 + rs))
}

/// MACD of the latest bar: EMA(fast) - EMA(slow), a signal EMA over that
/// difference, and their histogram.
pub fn macd(candles: &[Candle], params: MacdParams) -> Result<MacdValue> {
    let MacdParams { fast, slow, signal } = params;
    let needed = slow + signal + 1;
    if candles.len() < needed {
        return Err(BotError::InsufficientData { needed, got: candles.len() });
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let fast_ema = ema(&closes, fast);
    let slow_ema = ema(&closes, slow);

    // Align the fast series to the slow one; MACD values exist from the
    // slow EMA's first bar onward.
    let offset = slow - fast;
    let macd_series: Vec<f64> = (0..slow_ema.len())
        .map(|i| fast_ema[i + offset] - slow_ema[i])
        .collect();

    let signal_ema = ema(&macd_series, signal);
    let (Some(&macd_line), Some(&signal_line)) = (macd_series.last(), signal_ema.last()) else {
        return Err(BotError::InsufficientData { needed, got: candles.len() });
    };

    Ok(MacdValue {
        macd: macd_line,
        signal: signal_line,
        histogram: macd_line - signal_line,
    })
}

/// Volume spike: current volume over the trailing average of the window,
/// excluding the most recent bar. `current_volume` overrides the latest bar's
/// volume when the live feed already carries it.
///
/// A zero trailing average must never produce an infinite spike; that case
/// reports an insignificant reading with spike 0.
pub fn volume_spike(
    candles: &[Candle],
    current_volume: Option<f64>,
    threshold: f64,
) -> Result<VolumeReading> {
    if candles.len() < 2 {
        return Err(BotError::InsufficientData { needed: 2, got: candles.len() });
    }

    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
    let trailing_avg = sma(&volumes[..volumes.len() - 1]);
    let current = current_volume.unwrap_or_else(|| *volumes.last().expect("len checked above"));

    if trailing_avg <= 0.0 {
        return Ok(VolumeReading { spike: 0.0, is_significant: false });
    }

    let spike = current / trailing_avg;
    Ok(VolumeReading {
        // Strict inequality: a spike of exactly `threshold` is not significant.
        is_significant: spike > threshold,
        spike,
    })
}
