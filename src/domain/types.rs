use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::timeframe::TimeFrame;

/// Store-assigned identifier of a market pair
pub type PairId = i64;

/// Authoritative name -> id mapping, built once after registration and
/// shared read-only for the rest of the run.
pub type PairMap = BTreeMap<String, PairId>;

/// A trading instrument (e.g. BTCUSDT)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub id: PairId,
    pub name: String,
}

/// Upper-case a raw pair token the way the registry stores it
pub fn normalize_pair_name(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// One OHLCV interval for one pair, as stored in a kline table.
///
/// `(pair_id, open_time)` is the natural key.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleRecord {
    pub pair_id: PairId,
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: DateTime<Utc>,
    pub quote_volume: f64,
    pub trade_count: i64,
    pub taker_buy_base_volume: f64,
    pub taker_buy_quote_volume: f64,
    /// Trailing column of the archive format, unused but kept
    pub ignore: f64,
}

/// A (timeframe, pair) planning unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ArchiveUnit {
    pub timeframe: TimeFrame,
    pub pair: String,
}

impl ArchiveUnit {
    pub fn new(timeframe: TimeFrame, pair: impl Into<String>) -> Self {
        Self {
            timeframe,
            pair: pair.into(),
        }
    }
}
