// Configuration: secrets from the environment, tunables from an optional
// config.yaml with serde defaults. Context is passed explicitly into every
// component - no process-wide client/symbol globals.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

/// Scoring and pipeline tunables. Every field has a default matching the
/// shipped strategy, so an empty or missing config.yaml is fully usable.
#[derive(Debug, Clone, Deserialize)]
pub struct TuningCfg {
    /// Minimum weighted score a side needs before it can emit a signal.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: u32,
    /// Volume spike ratio above which volume is significant (strict).
    #[serde(default = "default_volume_spike_threshold")]
    pub volume_spike_threshold: f64,
    /// Bid/ask quantity ratio above which the book shows buyer pressure.
    #[serde(default = "default_buyer_pressure_ratio")]
    pub buyer_pressure_ratio: f64,
    /// Depth levels per side requested from the exchange.
    #[serde(default = "default_depth_limit")]
    pub depth_limit: usize,
    /// Candle window for the trailing volume average.
    #[serde(default = "default_volume_lookback")]
    pub volume_lookback: usize,
    /// Fixed delay before reconnecting a dropped market stream.
    #[serde(default = "default_ws_reconnect_delay_secs")]
    pub ws_reconnect_delay_secs: u64,
    /// Headline keywords that mark a news item as relevant to the symbol.
    #[serde(default = "default_asset_keywords")]
    pub asset_keywords: Vec<String>,
}

impl Default for TuningCfg {
    fn default() -> Self {
        // serde fills every field from its default fn
        serde_yaml::from_str("{}").expect("empty tuning config deserializes")
    }
}

fn default_score_threshold() -> u32 {
    crate::signal::SCORE_THRESHOLD
}
fn default_volume_spike_threshold() -> f64 {
    2.0
}
fn default_buyer_pressure_ratio() -> f64 {
    3.0
}
fn default_depth_limit() -> usize {
    20
}
fn default_volume_lookback() -> usize {
    10
}
fn default_ws_reconnect_delay_secs() -> u64 {
    5
}
fn default_asset_keywords() -> Vec<String> {
    vec!["btc".to_string(), "bitcoin".to_string()]
}

#[derive(Debug, Clone)]
pub struct TelegramCfg {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub symbol: String,
    pub telegram: TelegramCfg,
    pub cryptopanic_api_key: String,
    pub tuning: TuningCfg,
}

impl Config {
    /// Load secrets from the environment (after .env) and tunables from
    /// `./config.yaml` when present.
    pub fn load() -> Result<Self> {
        let symbol = std::env::var("SYMBOL").unwrap_or_else(|_| "BTCUSDT".to_string());
        let telegram = TelegramCfg {
            bot_token: require_env("TELEGRAM_BOT_TOKEN")?,
            chat_id: require_env("TELEGRAM_CHAT_ID")?,
        };
        let cryptopanic_api_key = require_env("CRYPTOPANIC_API_KEY")?;

        let tuning = match std::fs::read_to_string("config.yaml") {
            Ok(content) => serde_yaml::from_str(&content).context("invalid config.yaml")?,
            Err(_) => TuningCfg::default(),
        };

        let config = Self { symbol: symbol.to_uppercase(), telegram, cryptopanic_api_key, tuning };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(anyhow!("symbol must not be empty"));
        }
        if self.tuning.score_threshold == 0 || self.tuning.score_threshold > crate::signal::MAX_SCORE
        {
            return Err(anyhow!(
                "score_threshold must be in 1..={}, got {}",
                crate::signal::MAX_SCORE,
                self.tuning.score_threshold
            ));
        }
        if self.tuning.volume_spike_threshold <= 0.0 {
            return Err(anyhow!("volume_spike_threshold must be positive"));
        }
        if self.tuning.buyer_pressure_ratio <= 0.0 {
            return Err(anyhow!("buyer_pressure_ratio must be positive"));
        }
        if self.tuning.volume_lookback < 2 {
            return Err(anyhow!("volume_lookback must be at least 2"));
        }
        if self.tuning.depth_limit == 0 {
            return Err(anyhow!("depth_limit must be positive"));
        }
        Ok(())
    }
}

fn require_env(name: &str) -> Result<String> {
    let value = std::env::var(name).map_err(|_| anyhow!("{name} must be set"))?;
    if value.trim().is_empty() {
        return Err(anyhow!("{name} must not be empty"));
    }
    Ok(value)
}
