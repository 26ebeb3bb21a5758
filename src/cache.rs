// Multi-timeframe indicator cache
// Bounds exchange calls to one refresh per TTL window per timeframe, no
// matter how fast the primary timeframe ticks. Staleness is an explicit
// predicate over timestamps so it is testable without timers.

use crate::types::{MacdValue, Timeframe, VolumeReading};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// A cached value with the instant it was computed.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub last_updated: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, now: DateTime<Utc>) -> Self {
        Self { value, last_updated: now }
    }

    pub fn is_stale(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.last_updated > ttl
    }
}

/// Indicator values cached for one higher timeframe. MACD is only computed
/// where the scoring engine consumes it (the trend timeframe).
#[derive(Debug, Clone)]
pub struct TimeframeBundle {
    pub rsi: f64,
    pub macd: Option<MacdValue>,
    pub volume: VolumeReading,
}

impl TimeframeBundle {
    /// Neutral placeholder served until the first successful refresh: RSI at
    /// the midpoint, zero MACD, unremarkable volume. Keeps the scoring
    /// bundle fully defined from the first candle on.
    pub fn neutral() -> Self {
        Self {
            rsi: 50.0,
            macd: Some(MacdValue::default()),
            volume: VolumeReading::insignificant(),
        }
    }
}

/// Per-timeframe cache of the last computed indicator bundle.
///
/// Single-writer: only the event pipeline mutates it, one candle at a time,
/// so no interior locking is needed.
#[derive(Debug, Default)]
pub struct MultiTimeframeCache {
    entries: HashMap<Timeframe, CacheEntry<TimeframeBundle>>,
}

impl MultiTimeframeCache {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// True when the timeframe has never been filled or its entry has
    /// outlived the timeframe's TTL.
    pub fn needs_refresh(&self, tf: Timeframe, now: DateTime<Utc>) -> bool {
        match self.entries.get(&tf) {
            Some(entry) => entry.is_stale(tf.cache_ttl(), now),
            None => true,
        }
    }

    pub fn insert(&mut self, tf: Timeframe, bundle: TimeframeBundle, now: DateTime<Utc>) {
        self.entries.insert(tf, CacheEntry::new(bundle, now));
    }

    /// The cached bundle, stale or fresh. Serving stale values never blocks;
    /// a timeframe that has never been filled yields the neutral bundle.
    pub fn get(&self, tf: Timeframe) -> TimeframeBundle {
        self.entries
            .get(&tf)
            .map(|entry| entry.value.clone())
            .unwrap_or_else(TimeframeBundle::neutral)
    }
}
