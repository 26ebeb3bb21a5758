// Binance public REST client: candles, depth, ping.
// Every call passes through the rate limiter - one outstanding request with
// fixed minimum spacing, cooperative admission control toward the exchange.

use crate::error::{BotError, Result};
use crate::orderbook::{DepthSnapshot, Level};
use crate::types::{Candle, Timeframe};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Minimum spacing between exchange requests. 50ms keeps scalping latency
/// low while respecting exchange rate limits.
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(50);

/// Serializes requests: at most one in flight, spaced at least
/// `min_interval` apart. The lock is held across the sleep on purpose.
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval, last_request: Mutex::new(None) }
    }

    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Abstract candle fetch, mocked in scoring-engine and pipeline tests.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Ordered (ascending open time) window of the most recent candles.
    async fn fetch_candles(&self, symbol: &str, tf: Timeframe, limit: usize) -> Result<Vec<Candle>>;
}

/// Abstract order-book fetch.
#[async_trait]
pub trait DepthSource: Send + Sync {
    async fn fetch_depth(&self, symbol: &str, limit: usize) -> Result<DepthSnapshot>;
}

#[derive(Debug, Deserialize)]
struct DepthResponse {
    bids: Vec<[String; 2]>,
    asks: Vec<[String; 2]>,
}

pub struct BinanceClient {
    http: reqwest::Client,
    base_url: String,
    limiter: RateLimiter,
}

impl BinanceClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            limiter: RateLimiter::new(MIN_REQUEST_INTERVAL),
        }
    }

    /// Connectivity check against /api/v3/ping.
    pub async fn ping(&self) -> Result<()> {
        self.limiter.acquire().await;
        let url = format!("{}/api/v3/ping", self.base_url);
        self.http.get(&url).send().await?.error_for_status()?;
        Ok(())
    }

}

#[async_trait]
impl DepthSource for BinanceClient {
    /// Quantity-weighted depth snapshot from /api/v3/depth.
    async fn fetch_depth(&self, symbol: &str, limit: usize) -> Result<DepthSnapshot> {
        self.limiter.acquire().await;
        let url = format!("{}/api/v3/depth", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("symbol", symbol), ("limit", &limit.to_string())])
            .send()
            .await?
            .error_for_status()?;
        let depth: DepthResponse = response.json().await?;

        Ok(DepthSnapshot {
            bids: parse_levels(&depth.bids)?,
            asks: parse_levels(&depth.asks)?,
        })
    }
}

#[async_trait]
impl CandleSource for BinanceClient {
    async fn fetch_candles(&self, symbol: &str, tf: Timeframe, limit: usize) -> Result<Vec<Candle>> {
        self.limiter.acquire().await;
        let url = format!("{}/api/v3/klines", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("interval", tf.as_str()),
                ("limit", &limit.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;
        let rows: Vec<Value> = response.json().await?;
        debug!("EXCHANGE: fetched {} {} candles for {}", rows.len(), tf, symbol);

        rows.iter().map(parse_kline_row).collect()
    }
}

fn parse_levels(levels: &[[String; 2]]) -> Result<Vec<Level>> {
    levels
        .iter()
        .map(|[price, qty]| {
            Ok(Level {
                price: parse_f64(price, "depth price")?,
                qty: parse_f64(qty, "depth qty")?,
            })
        })
        .collect()
}

/// One kline row as Binance returns it: a mixed array of integers and
/// numeric strings.
fn parse_kline_row(row: &Value) -> Result<Candle> {
    let field = |idx: usize| -> Result<&Value> {
        row.get(idx)
            .ok_or_else(|| BotError::Api(format!("kline row missing field {idx}")))
    };
    let string_f64 = |idx: usize| -> Result<f64> {
        let raw = field(idx)?
            .as_str()
            .ok_or_else(|| BotError::Api(format!("kline field {idx} is not a string")))?;
        parse_f64(raw, "kline field")
    };
    let millis = |idx: usize| -> Result<DateTime<Utc>> {
        let ts = field(idx)?
            .as_i64()
            .ok_or_else(|| BotError::Api(format!("kline field {idx} is not a timestamp")))?;
        DateTime::<Utc>::from_timestamp_millis(ts)
            .ok_or_else(|| BotError::Api(format!("kline timestamp {ts} out of range")))
    };

    Ok(Candle {
        open_time: millis(0)?,
        open: string_f64(1)?,
        high: string_f64(2)?,
        low: string_f64(3)?,
        close: string_f64(4)?,
        volume: string_f64(5)?,
        close_time: millis(6)?,
        trade_count: field(8)?.as_u64().unwrap_or(0),
    })
}

fn parse_f64(raw: &str, what: &str) -> Result<f64> {
    raw.parse::<f64>()
        .map_err(|_| BotError::Api(format!("invalid {what}: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    #[test]
    fn parses_kline_row() {
        let row = json!([
            1700000000000i64,
            "50000.10",
            "50100.00",
            "49900.50",
            "50050.25",
            "123.456",
            1700000059999i64,
            "6178000.00",
            321,
            "60.0",
            "3000000.00",
            "0"
        ]);
        let candle = parse_kline_row(&row).unwrap();
        assert_relative_eq!(candle.open, 50000.10);
        assert_relative_eq!(candle.high, 50100.00);
        assert_relative_eq!(candle.low, 49900.50);
        assert_relative_eq!(candle.close, 50050.25);
        assert_relative_eq!(candle.volume, 123.456);
        assert_eq!(candle.trade_count, 321);
        assert_eq!(candle.open_time.timestamp_millis(), 1700000000000);
        assert_eq!(candle.close_time.timestamp_millis(), 1700000059999);
    }

    #[test]
    fn rejects_malformed_kline_row() {
        let row = json!([1700000000000i64, "not-a-number"]);
        assert!(parse_kline_row(&row).is_err());
    }

    #[test]
    fn parses_depth_levels() {
        let levels = [
            ["50000.0".to_string(), "1.5".to_string()],
            ["49999.5".to_string(), "2.0".to_string()],
        ];
        let parsed = parse_levels(&levels).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_relative_eq!(parsed[0].price, 50000.0);
        assert_relative_eq!(parsed[1].qty, 2.0);
    }

    #[tokio::test]
    async fn rate_limiter_spaces_requests() {
        let limiter = RateLimiter::new(Duration::from_millis(20));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        // Two enforced gaps after the free first acquire.
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
