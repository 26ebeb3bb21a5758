// News sentiment from CryptoPanic headlines
// Keyword-vote classification with a 5-minute TTL cache. Provider failure is
// loud: sentiment is a scoring input, so there is no silent Neutral default.

use crate::cache::CacheEntry;
use crate::error::{BotError, Result};
use crate::types::{Sentiment, SentimentResult};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use log::info;
use serde::Deserialize;
use tokio::sync::Mutex;

const CRYPTOPANIC_POSTS_URL: &str = "https://cryptopanic.com/api/v1/posts/";

const POSITIVE_KEYWORDS: &[&str] = &[
    "surge", "surges", "rally", "rallies", "bullish", "gain", "gains", "soar", "soars",
    "record", "breakout", "adoption", "approval", "approved", "upgrade", "partnership",
    "institutional", "accumulation", "inflows",
];

const NEGATIVE_KEYWORDS: &[&str] = &[
    "crash", "crashes", "plunge", "plunges", "bearish", "drop", "drops", "dump", "dumps",
    "selloff", "hack", "hacked", "ban", "bans", "lawsuit", "fraud", "fear", "liquidation",
    "liquidations", "downgrade", "scam", "outflows",
];

/// Lowercase a title and strip punctuation so keyword matching works on
/// whole words.
fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect()
}

fn matches_any(normalized_title: &str, keywords: &[&str]) -> bool {
    normalized_title
        .split_whitespace()
        .any(|word| keywords.contains(&word))
}

/// Count titles hitting either keyword list and derive the majority
/// sentiment. Confidence is the net share of positive matches in [-1, 1],
/// zero when no title matches at all. Pure, so it is testable without the
/// provider.
pub fn classify_titles(titles: &[String]) -> (Sentiment, f64) {
    let mut positive = 0i64;
    let mut negative = 0i64;
    for title in titles {
        let normalized = normalize(title);
        if matches_any(&normalized, POSITIVE_KEYWORDS) {
            positive += 1;
        }
        if matches_any(&normalized, NEGATIVE_KEYWORDS) {
            negative += 1;
        }
    }

    let sentiment = if positive > negative {
        Sentiment::Positive
    } else if negative > positive {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    };

    let total = positive + negative;
    let confidence = if total > 0 {
        (positive - negative) as f64 / total as f64
    } else {
        0.0
    };

    (sentiment, confidence)
}

#[derive(Debug, Deserialize)]
struct PostsResponse {
    #[serde(default)]
    results: Vec<Post>,
}

#[derive(Debug, Deserialize)]
struct Post {
    #[serde(default)]
    title: String,
}

/// Abstract sentiment provider, mockable in pipeline tests.
#[async_trait]
pub trait SentimentSource: Send + Sync {
    async fn fetch_sentiment(&self) -> Result<SentimentResult>;
}

/// CryptoPanic-backed sentiment feed with a TTL cache. One upstream call per
/// TTL window regardless of candle frequency.
pub struct SentimentFeed {
    http: reqwest::Client,
    api_key: String,
    /// Headlines must mention one of these to count (e.g. "btc", "bitcoin").
    asset_keywords: Vec<String>,
    ttl: Duration,
    cache: Mutex<Option<CacheEntry<SentimentResult>>>,
}

impl SentimentFeed {
    pub fn new(http: reqwest::Client, api_key: String, asset_keywords: Vec<String>) -> Self {
        Self {
            http,
            api_key,
            asset_keywords,
            ttl: Duration::seconds(300),
            cache: Mutex::new(None),
        }
    }

    fn relevant(&self, title: &str) -> bool {
        let lowered = title.to_lowercase();
        self.asset_keywords.iter().any(|kw| lowered.contains(kw))
    }

    async fn fetch_fresh(&self) -> Result<SentimentResult> {
        let response = self
            .http
            .get(CRYPTOPANIC_POSTS_URL)
            .query(&[("auth_token", self.api_key.as_str()), ("kind", "news")])
            .send()
            .await?
            .error_for_status()?;
        let posts: PostsResponse = response.json().await?;

        let titles: Vec<String> = posts
            .results
            .into_iter()
            .map(|post| post.title)
            .filter(|title| self.relevant(title))
            .collect();

        let (sentiment, confidence) = classify_titles(&titles);
        info!(
            "SENTIMENT: {sentiment} confidence={confidence:.2} titles={}",
            titles.len()
        );

        Ok(SentimentResult { sentiment, confidence, titles })
    }
}

#[async_trait]
impl SentimentSource for SentimentFeed {
    async fn fetch_sentiment(&self) -> Result<SentimentResult> {
        let mut cache = self.cache.lock().await;
        let now = Utc::now();

        if let Some(entry) = cache.as_ref() {
            if !entry.is_stale(self.ttl, now) {
                return Ok(entry.value.clone());
            }
        }

        // Expired or empty: refresh. Failure propagates to the caller, which
        // skips the cycle rather than scoring on a made-up Neutral.
        let result = self
            .fetch_fresh()
            .await
            .map_err(|err| BotError::Api(format!("sentiment fetch failed: {err}")))?;
        *cache = Some(CacheEntry::new(result.clone(), now));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn positive_majority_wins() {
        let (sentiment, confidence) = classify_titles(&titles(&[
            "Bitcoin surges past resistance",
            "BTC rally continues on ETF approval",
            "Exchange faces lawsuit over listings",
        ]));
        assert_eq!(sentiment, Sentiment::Positive);
        assert!((confidence - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn negative_majority_wins() {
        let (sentiment, confidence) = classify_titles(&titles(&[
            "Bitcoin crash wipes out leveraged longs",
            "Miners dump holdings as fear spreads",
        ]));
        assert_eq!(sentiment, Sentiment::Negative);
        assert!((confidence + 1.0).abs() < 1e-9);
    }

    #[test]
    fn no_matches_is_neutral_with_zero_confidence() {
        let (sentiment, confidence) =
            classify_titles(&titles(&["Bitcoin unchanged in quiet session"]));
        assert_eq!(sentiment, Sentiment::Neutral);
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn balanced_counts_are_neutral() {
        let (sentiment, _) = classify_titles(&titles(&[
            "BTC rally gathers pace",
            "Analysts warn of crash risk",
        ]));
        assert_eq!(sentiment, Sentiment::Neutral);
    }

    #[test]
    fn matching_ignores_punctuation_and_case() {
        let (sentiment, _) = classify_titles(&titles(&["BITCOIN SOARS!!!"]));
        assert_eq!(sentiment, Sentiment::Positive);
    }

    #[test]
    fn keywords_match_whole_words_only() {
        // "gainsborough" must not match "gains".
        let (sentiment, _) = classify_titles(&titles(&["Gainsborough exhibit opens"]));
        assert_eq!(sentiment, Sentiment::Neutral);
    }
}
