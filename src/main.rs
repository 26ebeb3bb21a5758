use anyhow::Result;
use chrono::Utc;
use log::{error, info};
use mtfa_bot::config::Config;
use mtfa_bot::exchange::BinanceClient;
use mtfa_bot::notifier::{Notifier, TelegramNotifier};
use mtfa_bot::sentiment::SentimentFeed;
use mtfa_bot::stream::Pipeline;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = Config::load()?;
    info!(
        "Starting signal bot for {} (threshold {})",
        config.symbol, config.tuning.score_threshold
    );

    let http = reqwest::Client::new();
    let client = Arc::new(BinanceClient::new(http.clone()));
    let sentiment = Arc::new(SentimentFeed::new(
        http.clone(),
        config.cryptopanic_api_key.clone(),
        config.tuning.asset_keywords.clone(),
    ));
    let notifier = Arc::new(TelegramNotifier::new(
        http,
        config.telegram.bot_token.clone(),
        config.telegram.chat_id.clone(),
    ));

    // Fail early on a dead exchange rather than inside the event loop.
    client.ping().await?;
    info!("Exchange connectivity check passed");

    let startup = format!(
        "@@ Bot MTFA start running @@\nAt: {}\nCheck: {}\nFor every: closed 1m candle",
        Utc::now().to_rfc2822(),
        config.symbol
    );
    if let Err(err) = notifier.deliver(&startup).await {
        error!("Startup notification failed: {err}");
    }

    let mut pipeline = Pipeline::new(
        config,
        client.clone(),
        client,
        sentiment,
        notifier,
    );
    pipeline.run().await
}
