// Signal dispatch to Telegram
// Delivery failures are logged and never retried inside the scoring path.

use crate::error::{BotError, Result};
use crate::types::{Signal, SignalKind};
use async_trait::async_trait;
use log::info;
use serde_json::json;

/// Abstract notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, message: &str) -> Result<()>;
}

pub struct TelegramNotifier {
    http: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(http: reqwest::Client, bot_token: String, chat_id: String) -> Self {
        Self { http, bot_token, chat_id }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(&self, message: &str) -> Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        self.http
            .post(&url)
            .json(&json!({
                "chat_id": self.chat_id,
                "text": message,
                "parse_mode": "Markdown",
            }))
            .send()
            .await
            .map_err(|err| BotError::Dispatch(err.to_string()))?
            .error_for_status()
            .map_err(|err| BotError::Dispatch(err.to_string()))?;
        info!("NOTIFIER: telegram message delivered");
        Ok(())
    }
}

fn direction_emoji(kind: SignalKind) -> &'static str {
    match kind {
        SignalKind::Long => "\u{1F7E2}",
        SignalKind::Short => "\u{1F534}",
        SignalKind::Neutral => "\u{1F535}",
    }
}

/// Human-readable rendering of a signal. Formatting lives here, not in the
/// scoring engine, so the numeric decision stays testable on its own.
pub fn format_signal_message(signal: &Signal, symbol: &str) -> String {
    let emoji = direction_emoji(signal.kind);
    let rsi_state = if signal.inputs.rsi_primary < 20.0 {
        "Oversold"
    } else if signal.inputs.rsi_primary > 80.0 {
        "Overbought"
    } else {
        "Normal"
    };
    let trend_1h = if signal.inputs.macd_trend.histogram > 0.0 {
        "Bullish"
    } else {
        "Bearish"
    };
    let book = if signal.inputs.order_book.buyer_pressure {
        "Buyers dominate"
    } else {
        "Sellers dominate"
    };

    let mut lines = vec![
        format!("({emoji}) {} ({emoji})", signal.kind.as_str()),
        format!("\u{1F4C8} Signal - {symbol} (1m entry)"),
        format!("- 1m RSI: {:.2} ({rsi_state})", signal.inputs.rsi_primary),
        format!("- 5m RSI: {:.2}", signal.inputs.rsi_confirmation),
        format!("- 1h Trend: {trend_1h}"),
        format!("- Volume Spike: 1m={:.2}x", signal.inputs.volume_primary.spike),
        format!("- Order book: {book}"),
        format!("- News Sentiment: {}", signal.inputs.sentiment),
    ];
    if let Some(risk) = &signal.risk {
        lines.push(format!("- SL: {:.2}% ({:.2})", risk.stop_loss_pct, risk.stop_loss_price));
        lines.push(format!("- TP: {:.2}% ({:.2})", risk.take_profit_pct, risk.take_profit_price));
    }
    lines.push(format!("\u{23F0} Time: {}", signal.generated_at.to_rfc2822()));
    lines.push("\u{1F4CA} Exchange: Binance".to_string());
    lines.push(format!("\u{1F9E0} Confidence: {}", signal.confidence_label()));

    lines.join("\n")
}
