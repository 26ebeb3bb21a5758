// STREAM: market-data ingress and the per-candle signal pipeline
// One sequential task drives everything, so at most one scoring evaluation
// is in flight per symbol and the cache has a single writer. Per-cycle
// errors are contained here: log, skip the cycle, keep the loop alive.

use crate::cache::{MultiTimeframeCache, TimeframeBundle};
use crate::config::Config;
use crate::error::{BotError, Result};
use crate::exchange::{CandleSource, DepthSource};
use crate::indicators;
use crate::notifier::{format_signal_message, Notifier};
use crate::sentiment::SentimentSource;
use crate::signal::{SignalEngine, TREND_SMA_BARS};
use crate::types::{Candle, SignalInputs, Timeframe};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use log::{info, warn};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};

const WS_BASE_URL: &str = "wss://stream.binance.com:9443";

#[derive(Debug, serde::Deserialize)]
pub struct KlineEvent {
    pub k: KlinePayload,
}

/// The `k` object of a Binance kline stream message.
#[derive(Debug, serde::Deserialize)]
pub struct KlinePayload {
    #[serde(rename = "t")]
    pub open_time: i64,
    #[serde(rename = "T")]
    pub close_time: i64,
    #[serde(rename = "c")]
    pub close: String,
    #[serde(rename = "v")]
    pub volume: String,
    /// True when this update closes the candle.
    #[serde(rename = "x")]
    pub is_closed: bool,
}

impl KlinePayload {
    pub fn close_price(&self) -> Result<f64> {
        self.close
            .parse::<f64>()
            .map_err(|_| BotError::Api(format!("invalid kline close: {}", self.close)))
    }

    pub fn closed_volume(&self) -> Result<f64> {
        self.volume
            .parse::<f64>()
            .map_err(|_| BotError::Api(format!("invalid kline volume: {}", self.volume)))
    }
}

pub fn parse_kline_event(payload: &str) -> Result<KlineEvent> {
    serde_json::from_str(payload).map_err(|err| BotError::Api(format!("bad kline payload: {err}")))
}

/// The whole per-candle pipeline: cache refresh, indicator computation,
/// depth and sentiment fetch, scoring, dispatch.
pub struct Pipeline {
    config: Config,
    candles: Arc<dyn CandleSource>,
    depth: Arc<dyn DepthSource>,
    sentiment: Arc<dyn SentimentSource>,
    notifier: Arc<dyn Notifier>,
    engine: SignalEngine,
    cache: MultiTimeframeCache,
}

impl Pipeline {
    pub fn new(
        config: Config,
        candles: Arc<dyn CandleSource>,
        depth: Arc<dyn DepthSource>,
        sentiment: Arc<dyn SentimentSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let engine = SignalEngine::new(candles.clone(), config.symbol.clone())
            .with_threshold(config.tuning.score_threshold);
        Self {
            config,
            candles,
            depth,
            sentiment,
            notifier,
            engine,
            cache: MultiTimeframeCache::new(),
        }
    }

    /// Consume the kline stream until the process is stopped. A dropped
    /// connection is re-dialed after a fixed delay; any evaluation that was
    /// in flight is abandoned and a fresh one starts on the next close.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let url = format!(
            "{WS_BASE_URL}/ws/{}@kline_{}",
            self.config.symbol.to_lowercase(),
            Timeframe::M1.as_str()
        );
        let reconnect_delay = Duration::from_secs(self.config.tuning.ws_reconnect_delay_secs);

        loop {
            match connect_async(&url).await {
                Ok((ws_stream, _)) => {
                    info!("STREAM: kline stream connected ({url})");
                    let (_, mut read) = ws_stream.split();
                    while let Some(message) = read.next().await {
                        match message {
                            Ok(Message::Text(txt)) => self.handle_message(&txt).await,
                            Ok(Message::Ping(_) | Message::Pong(_)) => {}
                            Ok(Message::Close(_)) => {
                                warn!("STREAM: server closed the kline stream");
                                break;
                            }
                            Ok(_) => {}
                            Err(err) => {
                                warn!("STREAM: websocket error: {err}");
                                break;
                            }
                        }
                    }
                }
                Err(err) => warn!("STREAM: connect error: {err}"),
            }
            info!("STREAM: reconnecting in {}s", reconnect_delay.as_secs());
            sleep(reconnect_delay).await;
        }
    }

    /// Error containment boundary: a failed cycle is logged and skipped,
    /// never allowed to take down the stream loop.
    async fn handle_message(&mut self, payload: &str) {
        let event = match parse_kline_event(payload) {
            Ok(event) => event,
            Err(err) => {
                warn!("STREAM: {err}");
                return;
            }
        };
        if !event.k.is_closed {
            return;
        }

        info!(
            "STREAM: processing closed {} candle for {}",
            Timeframe::M1,
            self.config.symbol
        );
        if let Err(err) = self.process_closed_candle(&event.k).await {
            warn!("STREAM: cycle skipped: {err}");
        }
    }

    /// One full cycle for a closed primary candle. Public so the
    /// containment policy is testable with mocked collaborators.
    pub async fn process_closed_candle(&mut self, kline: &KlinePayload) -> Result<()> {
        let current_price = kline.close_price()?;
        let live_volume = kline.closed_volume()?;
        let now = Utc::now();

        self.refresh_cache(now).await;

        let symbol = self.config.symbol.clone();
        let primary = self.compute_primary(&symbol, live_volume).await?;
        let confirmation = self.cache.get(Timeframe::M5);
        let trend = self.cache.get(Timeframe::H1);

        let depth = self
            .depth
            .fetch_depth(&symbol, self.config.tuning.depth_limit)
            .await?;
        let order_book = crate::orderbook::analyze_depth(&depth, self.config.tuning.buyer_pressure_ratio);

        let sentiment = self.sentiment.fetch_sentiment().await?;

        let confirmation_closes: Vec<f64> = self
            .candles
            .fetch_candles(&symbol, Timeframe::M5, TREND_SMA_BARS)
            .await?
            .iter()
            .map(|c| c.close)
            .collect();

        let inputs = SignalInputs {
            current_price,
            rsi_primary: primary.rsi,
            rsi_confirmation: confirmation.rsi,
            rsi_trend: trend.rsi,
            macd_primary: primary.macd.unwrap_or_default(),
            macd_trend: trend.macd.unwrap_or_default(),
            volume_primary: primary.volume,
            volume_confirmation: confirmation.volume,
            volume_trend: trend.volume,
            order_book,
            sentiment: sentiment.sentiment,
            confirmation_closes,
        };

        let signal = self.engine.evaluate(inputs).await?;

        // Delivery failure never touches scoring state and is not retried.
        let message = format_signal_message(&signal, &symbol);
        if let Err(err) = self.notifier.deliver(&message).await {
            warn!("STREAM: {err}");
        }
        Ok(())
    }

    /// Primary-timeframe indicators, computed fresh every cycle from one
    /// candle fetch sized for the widest calculator.
    async fn compute_primary(&self, symbol: &str, live_volume: f64) -> Result<TimeframeBundle> {
        let tf = Timeframe::M1;
        let params = tf.macd_params();
        let limit = (params.slow + params.signal + 1)
            .max(tf.rsi_period() + 1)
            .max(self.config.tuning.volume_lookback);
        let candles = self.candles.fetch_candles(symbol, tf, limit).await?;

        let rsi = indicators::rsi(&candles, tf.rsi_period())?;
        let macd = indicators::macd(&candles, params)?;
        let volume = indicators::volume_spike(
            volume_window(&candles, self.config.tuning.volume_lookback),
            Some(live_volume),
            self.config.tuning.volume_spike_threshold,
        )?;

        Ok(TimeframeBundle { rsi, macd: Some(macd), volume })
    }

    /// Refresh expired higher-timeframe entries. A failed refresh keeps the
    /// previous value: a stale reading beats no reading, and one
    /// timeframe's failure never aborts another's computation.
    async fn refresh_cache(&mut self, now: DateTime<Utc>) {
        for tf in [Timeframe::H1, Timeframe::M5] {
            if !self.cache.needs_refresh(tf, now) {
                continue;
            }
            match self.compute_bundle(tf).await {
                Ok(bundle) => {
                    self.cache.insert(tf, bundle, now);
                    info!("CACHE: refreshed {tf} data for {}", self.config.symbol);
                }
                Err(err) => {
                    warn!("CACHE: {tf} refresh failed, serving previous value: {err}");
                }
            }
        }
    }

    async fn compute_bundle(&self, tf: Timeframe) -> Result<TimeframeBundle> {
        // MACD is only consumed on the trend timeframe; size the fetch for
        // what this timeframe actually computes.
        let with_macd = tf == Timeframe::H1;
        let params = tf.macd_params();
        let mut limit = (tf.rsi_period() + 1).max(self.config.tuning.volume_lookback);
        if with_macd {
            limit = limit.max(params.slow + params.signal + 1);
        }

        let candles = self
            .candles
            .fetch_candles(&self.config.symbol, tf, limit)
            .await?;

        let rsi = indicators::rsi(&candles, tf.rsi_period())?;
        let macd = if with_macd {
            Some(indicators::macd(&candles, params)?)
        } else {
            None
        };
        let volume = indicators::volume_spike(
            volume_window(&candles, self.config.tuning.volume_lookback),
            None,
            self.config.tuning.volume_spike_threshold,
        )?;

        Ok(TimeframeBundle { rsi, macd, volume })
    }
}

/// Trailing slice of the fetch for the volume average, so a wide indicator
/// fetch doesn't quietly widen the volume lookback.
fn volume_window(candles: &[Candle], lookback: usize) -> &[Candle] {
    let start = candles.len().saturating_sub(lookback);
    &candles[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_closed_kline() {
        let payload = r#"{
            "e": "kline", "E": 1700000060000, "s": "BTCUSDT",
            "k": {
                "t": 1700000000000, "T": 1700000059999, "s": "BTCUSDT",
                "i": "1m", "o": "50000.0", "c": "50050.5", "h": "50100.0",
                "l": "49990.0", "v": "123.4", "n": 500, "x": true,
                "q": "6170000.0", "V": "60.0", "Q": "3000000.0"
            }
        }"#;
        let event = parse_kline_event(payload).unwrap();
        assert!(event.k.is_closed);
        assert_eq!(event.k.close_price().unwrap(), 50050.5);
        assert_eq!(event.k.closed_volume().unwrap(), 123.4);
        assert_eq!(event.k.open_time, 1700000000000);
        assert_eq!(event.k.close_time, 1700000059999);
    }

    #[test]
    fn open_candles_are_flagged_not_closed() {
        let payload = r#"{
            "k": {
                "t": 1700000000000, "T": 1700000059999,
                "c": "50050.5", "v": "12.0", "x": false
            }
        }"#;
        let event = parse_kline_event(payload).unwrap();
        assert!(!event.k.is_closed);
    }

    #[test]
    fn garbage_payload_is_an_api_error() {
        assert!(matches!(
            parse_kline_event("not json").unwrap_err(),
            BotError::Api(_)
        ));
    }

    #[test]
    fn volume_window_takes_trailing_slice() {
        let candles: Vec<Candle> = Vec::new();
        assert!(volume_window(&candles, 10).is_empty());
    }
}
