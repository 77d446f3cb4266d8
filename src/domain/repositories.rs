//! Repository Pattern Abstractions
//!
//! Storage seams used by the loading core:
//! - `PairRepository`: idempotent pair registration and id lookup
//! - `KlineRepository`: one-transaction bulk insertion into a timeframe table
//!
//! The SQLite implementations live in `infrastructure::persistence`.

use crate::domain::timeframe::TimeFrame;
use crate::domain::types::{CandleRecord, Pair};
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// What a bulk insert does when a `(pair_id, open_time)` key already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ConflictPolicy {
    /// Fail the statement, rolling back the whole batch
    #[default]
    Reject,
    /// Keep the stored row and drop the incoming one
    Skip,
}

impl FromStr for ConflictPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reject" => Ok(ConflictPolicy::Reject),
            "skip" | "ignore" => Ok(ConflictPolicy::Skip),
            _ => anyhow::bail!("Invalid conflict policy: {}. Must be 'reject' or 'skip'", s),
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictPolicy::Reject => write!(f, "reject"),
            ConflictPolicy::Skip => write!(f, "skip"),
        }
    }
}

/// Repository owning pair id assignment
#[async_trait]
pub trait PairRepository: Send + Sync {
    /// Insert every name not yet registered; existing names are left alone.
    /// Returns the number of newly inserted pairs.
    async fn insert_missing(&self, names: &[String]) -> Result<u64>;

    /// Every registered pair
    async fn load_all(&self) -> Result<Vec<Pair>>;
}

/// Repository for kline tables
#[async_trait]
pub trait KlineRepository: Send + Sync {
    /// Insert `records` into the table of `timeframe` inside one transaction.
    /// On error nothing from this call is persisted. Returns rows written.
    async fn insert_batch(
        &self,
        timeframe: TimeFrame,
        records: &[CandleRecord],
        policy: ConflictPolicy,
    ) -> Result<u64>;
}
