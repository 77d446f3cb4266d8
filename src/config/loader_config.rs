//! Loader configuration parsing from environment variables.

use crate::application::batch_loader::DEFAULT_MAX_BATCH_SIZE;
use crate::domain::repositories::ConflictPolicy;
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/klines.db";

#[derive(Debug, Clone, PartialEq)]
pub struct LoaderConfig {
    /// `DATABASE_URL`
    pub database_url: String,
    /// `KLINE_MAX_JOBS`: planning units per batch (and parser workers)
    pub max_jobs: usize,
    /// `KLINE_RESET_SCHEMA`: drop and recreate every table before the run
    pub reset_schema: bool,
    /// `KLINE_CONFLICT_POLICY`: `reject` or `skip`
    pub conflict_policy: ConflictPolicy,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_jobs: DEFAULT_MAX_BATCH_SIZE,
            reset_schema: true,
            conflict_policy: ConflictPolicy::Reject,
        }
    }
}

impl LoaderConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key -> value source; unset keys take their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_jobs = match lookup("KLINE_MAX_JOBS") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("Invalid KLINE_MAX_JOBS: {}", raw))?,
            None => defaults.max_jobs,
        };
        if max_jobs == 0 {
            anyhow::bail!("KLINE_MAX_JOBS must be at least 1");
        }

        let reset_schema = match lookup("KLINE_RESET_SCHEMA") {
            Some(raw) => raw
                .trim()
                .parse::<bool>()
                .with_context(|| format!("Invalid KLINE_RESET_SCHEMA: {}", raw))?,
            None => defaults.reset_schema,
        };

        let conflict_policy = match lookup("KLINE_CONFLICT_POLICY") {
            Some(raw) => ConflictPolicy::from_str(raw.trim())?,
            None => defaults.conflict_policy,
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            max_jobs,
            reset_schema,
            conflict_policy,
        })
    }
}
