// SIGNAL: multi-timeframe weighted-vote scoring engine
// Long and short scores accumulate independently; a side must clear the
// threshold AND beat the other side. Weighted votes tolerate partial
// confirmation across timeframes where a boolean gate would not.

use crate::error::Result;
use crate::exchange::CandleSource;
use crate::risk::plan_risk_levels;
use crate::types::{PriceTrend, Signal, SignalInputs, SignalKind, Timeframe};
use chrono::Utc;
use log::info;
use std::sync::Arc;

/// Maximum attainable score per side.
pub const MAX_SCORE: u32 = 11;

/// Minimum score a side needs before it can win.
pub const SCORE_THRESHOLD: u32 = 6;

/// How many confirmation-timeframe bars feed the price-trend SMA.
pub const TREND_SMA_BARS: usize = 5;

/// Candle lookback for stop-loss support/resistance, on the risk timeframe.
pub const RISK_LOOKBACK: usize = 10;

const RISK_TIMEFRAME: Timeframe = Timeframe::M5;

/// Long and short votes for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub long: u32,
    pub short: u32,
}

/// Short-term trend: current price against the SMA of the last closes on the
/// confirmation timeframe. A short window counts every close it has.
pub fn price_trend(confirmation_closes: &[f64], current_price: f64) -> PriceTrend {
    let window = confirmation_closes
        .len()
        .saturating_sub(TREND_SMA_BARS);
    let sma = crate::indicators::sma(&confirmation_closes[window..]);
    if current_price > sma {
        PriceTrend::Up
    } else {
        PriceTrend::Down
    }
}

/// Accumulate the weighted votes for both sides. Pure: same bundle, same
/// scores.
pub fn score_inputs(inputs: &SignalInputs, trend: PriceTrend) -> ScoreBreakdown {
    let mut long = 0;
    let mut short = 0;

    // Trend-timeframe MACD histogram is the authority on directional bias.
    if inputs.macd_trend.histogram > 0.0 {
        long += 2;
    }
    if inputs.macd_trend.histogram < 0.0 {
        short += 2;
    }

    if inputs.rsi_trend > 50.0 {
        long += 1;
    }
    if inputs.rsi_trend < 50.0 {
        short += 1;
    }

    // Confirmation-timeframe RSI extreme counts only together with a
    // significant confirmation-timeframe volume spike.
    if inputs.rsi_confirmation < 25.0 && inputs.volume_confirmation.is_significant {
        long += 1;
    }
    if inputs.rsi_confirmation > 75.0 && inputs.volume_confirmation.is_significant {
        short += 1;
    }

    // Primary-timeframe RSI extreme is the strongest short-horizon vote.
    if inputs.rsi_primary < 20.0 {
        long += 2;
    }
    if inputs.rsi_primary > 80.0 {
        short += 2;
    }

    // Abnormal primary volume confirms either direction.
    if inputs.volume_primary.is_significant {
        long += 1;
        short += 1;
    }

    if inputs.order_book.buyer_pressure {
        long += 1;
    } else {
        short += 1;
    }

    if inputs.macd_primary.histogram > 0.0 {
        long += 1;
    }
    if inputs.macd_primary.histogram < 0.0 {
        short += 1;
    }

    match inputs.sentiment {
        crate::types::Sentiment::Positive => long += 1,
        crate::types::Sentiment::Negative => short += 1,
        crate::types::Sentiment::Neutral => {}
    }

    match trend {
        PriceTrend::Up => long += 1,
        PriceTrend::Down => short += 1,
    }

    ScoreBreakdown { long, short }
}

/// Decision rule, in precedence order. Ties resolve to Neutral because
/// neither strict inequality holds; shorting into a rising short-term trend
/// is vetoed even when the short score qualifies.
pub fn decide(scores: ScoreBreakdown, trend: PriceTrend, threshold: u32) -> SignalKind {
    if scores.long >= threshold && scores.long > scores.short {
        SignalKind::Long
    } else if scores.short >= threshold && scores.short > scores.long && trend != PriceTrend::Up {
        SignalKind::Short
    } else {
        SignalKind::Neutral
    }
}

/// Scores input bundles and attaches risk levels to directional outcomes.
///
/// The candle source is only consulted for the stop-loss window of a
/// non-neutral signal; the scoring itself never touches I/O.
pub struct SignalEngine {
    candles: Arc<dyn CandleSource>,
    symbol: String,
    threshold: u32,
}

impl SignalEngine {
    pub fn new(candles: Arc<dyn CandleSource>, symbol: impl Into<String>) -> Self {
        Self {
            candles,
            symbol: symbol.into(),
            threshold: SCORE_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Produce exactly one signal for the bundle. Neutral outcomes are
    /// returned like any other; they carry both scores for observability.
    pub async fn evaluate(&self, inputs: SignalInputs) -> Result<Signal> {
        let trend = price_trend(&inputs.confirmation_closes, inputs.current_price);
        let scores = score_inputs(&inputs, trend);
        let kind = decide(scores, trend, self.threshold);

        info!(
            "SIGNAL: {} {} long={} short={} rsi1m={:.1} rsi5m={:.1} rsi1h={:.1} trend={:?} sentiment={}",
            self.symbol,
            kind.as_str(),
            scores.long,
            scores.short,
            inputs.rsi_primary,
            inputs.rsi_confirmation,
            inputs.rsi_trend,
            trend,
            inputs.sentiment,
        );

        let risk = match kind.direction() {
            Some(direction) => {
                let window = self
                    .candles
                    .fetch_candles(&self.symbol, RISK_TIMEFRAME, RISK_LOOKBACK)
                    .await?;
                Some(plan_risk_levels(direction, inputs.current_price, &window)?)
            }
            None => None,
        };

        Ok(Signal {
            kind,
            long_score: scores.long,
            short_score: scores.short,
            price: inputs.current_price,
            trend,
            risk,
            inputs,
            generated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MacdValue, OrderBookPressure, Sentiment, VolumeReading};

    fn neutral_inputs() -> SignalInputs {
        SignalInputs {
            current_price: 50_000.0,
            rsi_primary: 50.0,
            rsi_confirmation: 50.0,
            rsi_trend: 50.0,
            macd_primary: MacdValue::default(),
            macd_trend: MacdValue::default(),
            volume_primary: VolumeReading::insignificant(),
            volume_confirmation: VolumeReading::insignificant(),
            volume_trend: VolumeReading::insignificant(),
            order_book: OrderBookPressure { buyer_pressure: false, bid_sum: 1.0, ask_sum: 1.0 },
            sentiment: Sentiment::Neutral,
            confirmation_closes: vec![50_000.0; 5],
        }
    }

    #[test]
    fn flat_market_scores_below_threshold() {
        let inputs = neutral_inputs();
        let trend = price_trend(&inputs.confirmation_closes, inputs.current_price);
        let scores = score_inputs(&inputs, trend);
        assert!(scores.long < SCORE_THRESHOLD);
        assert!(scores.short < SCORE_THRESHOLD);
        assert_eq!(decide(scores, trend, SCORE_THRESHOLD), SignalKind::Neutral);
    }

    #[test]
    fn price_trend_follows_sma() {
        assert_eq!(price_trend(&[100.0, 100.0, 100.0, 100.0, 100.0], 101.0), PriceTrend::Up);
        assert_eq!(price_trend(&[100.0, 100.0, 100.0, 100.0, 100.0], 100.0), PriceTrend::Down);
        // Only the last five closes count.
        assert_eq!(
            price_trend(&[1000.0, 1000.0, 100.0, 100.0, 100.0, 100.0, 100.0], 101.0),
            PriceTrend::Up
        );
    }

    #[test]
    fn tie_resolves_to_neutral_even_over_threshold() {
        let scores = ScoreBreakdown { long: 7, short: 7 };
        assert_eq!(decide(scores, PriceTrend::Up, SCORE_THRESHOLD), SignalKind::Neutral);
        assert_eq!(decide(scores, PriceTrend::Down, SCORE_THRESHOLD), SignalKind::Neutral);
    }

    #[test]
    fn trend_veto_blocks_short_in_rising_market() {
        let scores = ScoreBreakdown { long: 2, short: 8 };
        assert_eq!(decide(scores, PriceTrend::Up, SCORE_THRESHOLD), SignalKind::Neutral);
        assert_eq!(decide(scores, PriceTrend::Down, SCORE_THRESHOLD), SignalKind::Short);
    }

    #[test]
    fn threshold_is_inclusive() {
        let scores = ScoreBreakdown { long: 6, short: 3 };
        assert_eq!(decide(scores, PriceTrend::Down, SCORE_THRESHOLD), SignalKind::Long);
        let scores = ScoreBreakdown { long: 5, short: 3 };
        assert_eq!(decide(scores, PriceTrend::Down, SCORE_THRESHOLD), SignalKind::Neutral);
    }

    #[test]
    fn joint_confirmation_requires_volume_and_rsi_together() {
        let mut inputs = neutral_inputs();
        inputs.rsi_confirmation = 22.0;
        let trend = PriceTrend::Down;

        // Extreme RSI alone: no confirmation vote.
        let without_volume = score_inputs(&inputs, trend);
        inputs.volume_confirmation = VolumeReading { spike: 2.5, is_significant: true };
        let with_volume = score_inputs(&inputs, trend);
        assert_eq!(with_volume.long, without_volume.long + 1);

        // Significant volume alone doesn't vote either.
        inputs.rsi_confirmation = 50.0;
        let volume_only = score_inputs(&inputs, trend);
        assert_eq!(volume_only.long, without_volume.long);
    }

    #[test]
    fn scoring_is_deterministic() {
        let mut inputs = neutral_inputs();
        inputs.rsi_primary = 18.0;
        inputs.macd_trend.histogram = 4.0;
        let trend = price_trend(&inputs.confirmation_closes, inputs.current_price);
        let first = score_inputs(&inputs, trend);
        let second = score_inputs(&inputs, trend);
        assert_eq!(first, second);
    }
}
