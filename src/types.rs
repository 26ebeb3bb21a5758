// Core domain types shared across the signal pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single OHLCV bar. Immutable once received, ordered by open time ascending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub trade_count: u64,
}

/// The three candle intervals examined together: shortest drives entries,
/// middle confirms, longest sets directional bias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    H1,
}

/// Fast/slow/signal EMA periods for the MACD calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacdParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::H1 => "1h",
        }
    }

    /// RSI lookback: 8 for sub-hour timeframes (faster reaction for scalping
    /// horizons), 14 for the hourly trend timeframe.
    pub fn rsi_period(&self) -> usize {
        match self {
            Timeframe::M1 | Timeframe::M5 => 8,
            Timeframe::H1 => 14,
        }
    }

    /// MACD parameter set: tightened periods on the scalping timeframes,
    /// classic 12/26/9 on the hourly.
    pub fn macd_params(&self) -> MacdParams {
        match self {
            Timeframe::M1 | Timeframe::M5 => MacdParams { fast: 6, slow: 13, signal: 4 },
            Timeframe::H1 => MacdParams { fast: 12, slow: 26, signal: 9 },
        }
    }

    /// How long a cached indicator bundle for this timeframe stays fresh.
    /// The primary timeframe is never cached.
    pub fn cache_ttl(&self) -> chrono::Duration {
        match self {
            Timeframe::M1 => chrono::Duration::zero(),
            Timeframe::M5 => chrono::Duration::seconds(60),
            Timeframe::H1 => chrono::Duration::seconds(300),
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// MACD line, signal line, and their difference for the latest bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Current volume relative to the trailing average.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VolumeReading {
    pub spike: f64,
    pub is_significant: bool,
}

impl VolumeReading {
    /// Sentinel served before the cache fills: a 1.0x spike that never
    /// confirms anything.
    pub fn insignificant() -> Self {
        Self { spike: 1.0, is_significant: false }
    }
}

/// Aggregate bid/ask imbalance from a depth snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderBookPressure {
    pub buyer_pressure: bool,
    pub bid_sum: f64,
    pub ask_sum: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sentiment::Positive => f.write_str("Positive"),
            Sentiment::Negative => f.write_str("Negative"),
            Sentiment::Neutral => f.write_str("Neutral"),
        }
    }
}

/// News sentiment classification, valid for the provider's cache TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentResult {
    pub sentiment: Sentiment,
    /// In [-1, 1]: net share of positive over negative headline matches.
    pub confidence: f64,
    pub titles: Vec<String>,
}

/// Trade direction for risk-level planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => f.write_str("LONG"),
            Direction::Short => f.write_str("SHORT"),
        }
    }
}

/// Outcome of a scoring evaluation. Neutral is a value, not an absence;
/// callers that want to drop quiet cycles filter it themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    Long,
    Short,
    Neutral,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Long => "LONG",
            SignalKind::Short => "SHORT",
            SignalKind::Neutral => "NEUTRAL",
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            SignalKind::Long => Some(Direction::Long),
            SignalKind::Short => Some(Direction::Short),
            SignalKind::Neutral => None,
        }
    }
}

/// Stop-loss and take-profit levels derived from recent support/resistance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskLevels {
    pub stop_loss_price: f64,
    pub stop_loss_pct: f64,
    pub take_profit_price: f64,
    pub take_profit_pct: f64,
}

/// Short-term price direction from the confirmation-timeframe SMA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceTrend {
    Up,
    Down,
}

/// Everything the scoring engine consumes for one evaluation. Assembled once
/// per closed primary candle; scoring is a pure function of this bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalInputs {
    pub current_price: f64,
    pub rsi_primary: f64,
    pub rsi_confirmation: f64,
    pub rsi_trend: f64,
    pub macd_primary: MacdValue,
    pub macd_trend: MacdValue,
    pub volume_primary: VolumeReading,
    pub volume_confirmation: VolumeReading,
    pub volume_trend: VolumeReading,
    pub order_book: OrderBookPressure,
    pub sentiment: Sentiment,
    /// Last closes on the confirmation timeframe, oldest first. Feeds the
    /// 5-bar SMA price trend.
    pub confirmation_closes: Vec<f64>,
}

/// One scored, immutable trade signal, produced per closed-candle event and
/// handed straight to the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub long_score: u32,
    pub short_score: u32,
    pub price: f64,
    pub trend: PriceTrend,
    pub risk: Option<RiskLevels>,
    pub inputs: SignalInputs,
    pub generated_at: DateTime<Utc>,
}

impl Signal {
    /// Deterministic rendering of the raw score. Scoring stays numeric; how
    /// the label reads is the dispatcher's concern.
    pub fn confidence_label(&self) -> String {
        match self.kind {
            SignalKind::Long => format!("{}/{}", self.long_score, crate::signal::MAX_SCORE),
            SignalKind::Short => format!("{}/{}", self.short_score, crate::signal::MAX_SCORE),
            SignalKind::Neutral => format!(
                "LS: {ls}/{m} - SS: {ss}/{m}",
                ls = self.long_score,
                ss = self.short_score,
                m = crate::signal::MAX_SCORE
            ),
        }
    }
}
