//! Batched parse-and-insert for one timeframe.
//!
//! Units are taken from the front of the list in groups of at most
//! `max_batch_size`. Every unit of a group is parsed on its own blocking
//! worker; once all workers have joined, the collected records are written
//! with a single `insert_batch` call, i.e. one transaction per batch.
//!
//! Per batch: `Parsing -> Inserting -> Committed | RolledBack`. A rolled back
//! batch is reported and the next batch still runs.

use crate::application::archive_catalog::{ArchiveCatalog, SkippedFile};
use crate::application::record_parser::{ArchiveOutcome, RecordParser};
use crate::domain::errors::LoaderError;
use crate::domain::repositories::{ConflictPolicy, KlineRepository};
use crate::domain::timeframe::TimeFrame;
use crate::domain::types::{ArchiveUnit, CandleRecord};
use futures::future::join_all;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const DEFAULT_MAX_BATCH_SIZE: usize = 4;

/// An archive whose records were discarded because decoding failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BatchStatus {
    Committed { rows: u64 },
    RolledBack { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub timeframe: TimeFrame,
    pub index: usize,
    pub pairs: Vec<String>,
    pub files: usize,
    pub records_parsed: usize,
    pub corrupted: Vec<SkippedFile>,
    pub failed_files: Vec<FailedFile>,
    pub status: BatchStatus,
}

impl BatchReport {
    pub fn is_committed(&self) -> bool {
        matches!(self.status, BatchStatus::Committed { .. })
    }

    pub fn rows_committed(&self) -> u64 {
        match self.status {
            BatchStatus::Committed { rows } => rows,
            BatchStatus::RolledBack { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeframeReport {
    pub timeframe: TimeFrame,
    pub units: usize,
    pub batches: Vec<BatchReport>,
}

impl TimeframeReport {
    pub fn files(&self) -> usize {
        self.batches.iter().map(|b| b.files).sum()
    }

    pub fn records_parsed(&self) -> usize {
        self.batches.iter().map(|b| b.records_parsed).sum()
    }

    pub fn records_committed(&self) -> u64 {
        self.batches.iter().map(BatchReport::rows_committed).sum()
    }

    pub fn committed_batches(&self) -> usize {
        self.batches.iter().filter(|b| b.is_committed()).count()
    }

    pub fn failed_batches(&self) -> impl Iterator<Item = &BatchReport> {
        self.batches.iter().filter(|b| !b.is_committed())
    }
}

/// Split `units` front to back into groups of at most `max_batch_size`
pub fn split_batches(units: Vec<ArchiveUnit>, max_batch_size: usize) -> Vec<Vec<ArchiveUnit>> {
    let size = max_batch_size.max(1);
    let mut batches = Vec::with_capacity(units.len().div_ceil(size));
    let mut remaining = units.into_iter().peekable();
    while remaining.peek().is_some() {
        batches.push(remaining.by_ref().take(size).collect());
    }
    batches
}

/// Parse results of one unit: each matched archive with its outcome
struct UnitResult {
    files: Vec<(PathBuf, Result<ArchiveOutcome, String>)>,
}

pub struct BatchLoader {
    parser: RecordParser,
    catalog: Arc<ArchiveCatalog>,
    klines: Arc<dyn KlineRepository>,
    max_batch_size: usize,
    conflict_policy: ConflictPolicy,
}

impl BatchLoader {
    pub fn new(
        parser: RecordParser,
        catalog: Arc<ArchiveCatalog>,
        klines: Arc<dyn KlineRepository>,
    ) -> Self {
        Self {
            parser,
            catalog,
            klines,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            conflict_policy: ConflictPolicy::default(),
        }
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    pub fn with_conflict_policy(mut self, conflict_policy: ConflictPolicy) -> Self {
        self.conflict_policy = conflict_policy;
        self
    }

    /// Run every batch of `units`, all of which must belong to `timeframe`
    pub async fn load_timeframe(
        &self,
        timeframe: TimeFrame,
        units: Vec<ArchiveUnit>,
    ) -> TimeframeReport {
        info!("handle `{}` timeframe data -> {}", timeframe, timeframe.table_name());

        let unit_count = units.len();
        let mut batches = Vec::new();
        for (index, batch) in split_batches(units, self.max_batch_size)
            .into_iter()
            .enumerate()
        {
            batches.push(self.run_batch(timeframe, index, batch).await);
        }

        let report = TimeframeReport {
            timeframe,
            units: unit_count,
            batches,
        };
        info!(
            "`{}` done: {} records committed in {}/{} batches",
            timeframe,
            report.records_committed(),
            report.committed_batches(),
            report.batches.len()
        );
        report
    }

    async fn run_batch(
        &self,
        timeframe: TimeFrame,
        index: usize,
        units: Vec<ArchiveUnit>,
    ) -> BatchReport {
        debug_assert!(units.iter().all(|u| u.timeframe == timeframe));
        info!("#{} jobs are created (batch {})", units.len(), index);

        let pairs: Vec<String> = units.iter().map(|u| u.pair.clone()).collect();
        let results = self.parse_units(units).await;

        let mut files = 0;
        let mut records: Vec<CandleRecord> = Vec::new();
        let mut corrupted = Vec::new();
        let mut failed_files = Vec::new();

        for (path, outcome) in results.into_iter().flat_map(|r| r.files) {
            files += 1;
            match outcome {
                Ok(ArchiveOutcome::Parsed(parsed)) => records.extend(parsed),
                Ok(ArchiveOutcome::Corrupted { reason }) => {
                    corrupted.push(SkippedFile { path, reason });
                }
                Err(error) => {
                    warn!("Discarding {}: {}", path.display(), error);
                    failed_files.push(FailedFile { path, error });
                }
            }
        }

        let records_parsed = records.len();
        info!("#{} will be inserted into {}", records_parsed, timeframe.table_name());

        let status = match self
            .klines
            .insert_batch(timeframe, &records, self.conflict_policy)
            .await
        {
            Ok(rows) => {
                debug!("Batch {} of `{}` committed ({} rows)", index, timeframe, rows);
                BatchStatus::Committed { rows }
            }
            Err(e) => {
                let e = LoaderError::storage(timeframe, e);
                error!(
                    "Batch {} of `{}` rolled back, pairs {:?}: {:#}",
                    index, timeframe, pairs, e
                );
                BatchStatus::RolledBack {
                    error: format!("{:#}", e),
                }
            }
        };

        BatchReport {
            timeframe,
            index,
            pairs,
            files,
            records_parsed,
            corrupted,
            failed_files,
            status,
        }
    }

    /// Parse every unit on its own blocking worker and wait for all of them
    async fn parse_units(&self, units: Vec<ArchiveUnit>) -> Vec<UnitResult> {
        let workers = units.into_iter().map(|unit| {
            let paths = self.catalog.archives_for(&unit).to_vec();
            let parser = self.parser.clone();
            let reported = paths.clone();

            let handle = tokio::task::spawn_blocking(move || UnitResult {
                files: paths
                    .into_iter()
                    .map(|path| {
                        let outcome = parser
                            .parse_unit_archive(&unit, &path)
                            .map_err(|e| e.to_string());
                        (path, outcome)
                    })
                    .collect(),
            });
            (reported, handle)
        });

        let (paths, handles): (Vec<_>, Vec<_>) = workers.unzip();
        join_all(handles)
            .await
            .into_iter()
            .zip(paths)
            .map(|(joined, paths)| match joined {
                Ok(result) => result,
                // A crashed worker only loses its own unit
                Err(e) => UnitResult {
                    files: paths
                        .into_iter()
                        .map(|path| (path, Err(format!("parser worker failed: {}", e))))
                        .collect(),
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::PairMap;
    use crate::test_support::write_kline_archive;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn units(n: usize) -> Vec<ArchiveUnit> {
        (0..n)
            .map(|i| ArchiveUnit::new(TimeFrame::Day1, format!("PAIR{:02}", i)))
            .collect()
    }

    /// Records every call; fails the calls whose index is listed
    #[derive(Default)]
    struct RecordingKlineRepository {
        calls: Mutex<Vec<usize>>,
        fail_on: Vec<usize>,
    }

    #[async_trait]
    impl KlineRepository for RecordingKlineRepository {
        async fn insert_batch(
            &self,
            _timeframe: TimeFrame,
            records: &[CandleRecord],
            _policy: ConflictPolicy,
        ) -> Result<u64> {
            let mut calls = self.calls.lock().unwrap();
            let call = calls.len();
            calls.push(records.len());
            if self.fail_on.contains(&call) {
                anyhow::bail!("database is locked");
            }
            Ok(records.len() as u64)
        }
    }

    #[test]
    fn test_split_batches_sizes() {
        let sizes: Vec<usize> = split_batches(units(10), 4).iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![4, 4, 2]);

        assert!(split_batches(Vec::new(), 4).is_empty());
        assert_eq!(split_batches(units(3), 0).len(), 3);
    }

    #[test]
    fn test_split_batches_preserves_order() {
        let batches = split_batches(units(5), 2);
        assert_eq!(batches[0][0].pair, "PAIR00");
        assert_eq!(batches[1][1].pair, "PAIR03");
        assert_eq!(batches[2][0].pair, "PAIR04");
    }

    async fn loader_for(
        dir: &std::path::Path,
        pairs: &[&str],
        repo: Arc<RecordingKlineRepository>,
    ) -> BatchLoader {
        let map: PairMap = pairs
            .iter()
            .enumerate()
            .map(|(i, p)| (p.to_string(), i as i64 + 1))
            .collect();
        let catalog = ArchiveCatalog::scan(dir).await.unwrap();
        BatchLoader::new(RecordParser::new(Arc::new(map)), Arc::new(catalog), repo)
    }

    #[tokio::test]
    async fn test_one_transaction_per_batch() {
        let dir = tempfile::tempdir().unwrap();
        let names: Vec<String> = (0..10).map(|i| format!("PAIR{:02}", i)).collect();
        for name in &names {
            write_kline_archive(dir.path(), &format!("{}-1d-2021-01.zip", name), 2);
        }
        let pair_refs: Vec<&str> = names.iter().map(String::as_str).collect();

        let repo = Arc::new(RecordingKlineRepository::default());
        let loader = loader_for(dir.path(), &pair_refs, repo.clone()).await;
        let report = loader.load_timeframe(TimeFrame::Day1, units(10)).await;

        assert_eq!(*repo.calls.lock().unwrap(), vec![8, 8, 4]);
        assert_eq!(report.batches.len(), 3);
        assert_eq!(report.files(), 10);
        assert_eq!(report.records_committed(), 20);
        assert_eq!(report.committed_batches(), 3);
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_stop_later_batches() {
        let dir = tempfile::tempdir().unwrap();
        let names: Vec<String> = (0..10).map(|i| format!("PAIR{:02}", i)).collect();
        for name in &names {
            write_kline_archive(dir.path(), &format!("{}-1d-2021-01.zip", name), 1);
        }
        let pair_refs: Vec<&str> = names.iter().map(String::as_str).collect();

        let repo = Arc::new(RecordingKlineRepository {
            fail_on: vec![1],
            ..Default::default()
        });
        let loader = loader_for(dir.path(), &pair_refs, repo.clone()).await;
        let report = loader.load_timeframe(TimeFrame::Day1, units(10)).await;

        assert_eq!(repo.calls.lock().unwrap().len(), 3);
        assert!(report.batches[0].is_committed());
        assert!(!report.batches[1].is_committed());
        assert!(report.batches[2].is_committed());
        assert_eq!(report.records_committed(), 6);

        let failed: Vec<_> = report.failed_batches().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].pairs, vec!["PAIR04", "PAIR05", "PAIR06", "PAIR07"]);
    }

    #[tokio::test]
    async fn test_file_failures_are_isolated_within_batch() {
        let dir = tempfile::tempdir().unwrap();
        write_kline_archive(dir.path(), "AAA-1d-2021-01.zip", 3);
        std::fs::write(dir.path().join("BBB-1d-2021-01.zip"), b"garbage").unwrap();
        crate::test_support::write_archive(
            dir.path(),
            "CCC-1d-2021-01.zip",
            "CCC-1d-2021-01.csv",
            &["1609459200000,x,1,1,1,1,1609545599999,1,1,1,1,0".to_string()],
        );

        let repo = Arc::new(RecordingKlineRepository::default());
        let loader = loader_for(dir.path(), &["AAA", "BBB", "CCC"], repo.clone()).await;
        let units = vec![
            ArchiveUnit::new(TimeFrame::Day1, "AAA"),
            ArchiveUnit::new(TimeFrame::Day1, "BBB"),
            ArchiveUnit::new(TimeFrame::Day1, "CCC"),
        ];
        let report = loader.load_timeframe(TimeFrame::Day1, units).await;

        let batch = &report.batches[0];
        assert_eq!(batch.files, 3);
        assert_eq!(batch.records_parsed, 3);
        assert_eq!(batch.corrupted.len(), 1);
        assert_eq!(batch.failed_files.len(), 1);
        assert!(batch.failed_files[0].path.ends_with("CCC-1d-2021-01.zip"));
        assert_eq!(batch.status, BatchStatus::Committed { rows: 3 });
    }
}
