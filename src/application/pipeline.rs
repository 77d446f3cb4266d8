use crate::application::archive_catalog::{ArchiveCatalog, SkippedFile};
use crate::application::batch_loader::{
    BatchLoader, BatchReport, BatchStatus, DEFAULT_MAX_BATCH_SIZE, FailedFile, TimeframeReport,
};
use crate::application::job_planner;
use crate::application::pair_registry::PairRegistry;
use crate::application::record_parser::RecordParser;
use crate::domain::errors::LoaderError;
use crate::domain::repositories::{ConflictPolicy, KlineRepository, PairRepository};
use crate::domain::timeframe::TimeFrame;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Knobs for one loading run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub source_dir: PathBuf,
    pub max_batch_size: usize,
    pub conflict_policy: ConflictPolicy,
}

impl RunOptions {
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

/// Aggregate outcome of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub source_dir: PathBuf,
    pub pairs_discovered: usize,
    pub pairs_registered: u64,
    pub timeframes: Vec<TimeframeReport>,
    pub skipped_files: Vec<SkippedFile>,
    pub elapsed_ms: u64,
}

impl RunSummary {
    pub fn records_parsed(&self) -> usize {
        self.timeframes.iter().map(TimeframeReport::records_parsed).sum()
    }

    pub fn records_committed(&self) -> u64 {
        self.timeframes
            .iter()
            .map(TimeframeReport::records_committed)
            .sum()
    }

    pub fn committed_for(&self, timeframe: TimeFrame) -> u64 {
        self.timeframes
            .iter()
            .filter(|t| t.timeframe == timeframe)
            .map(TimeframeReport::records_committed)
            .sum()
    }

    pub fn failed_batches(&self) -> impl Iterator<Item = &BatchReport> {
        self.timeframes.iter().flat_map(TimeframeReport::failed_batches)
    }

    pub fn corrupted_files(&self) -> impl Iterator<Item = &SkippedFile> {
        self.timeframes
            .iter()
            .flat_map(|t| &t.batches)
            .flat_map(|b| &b.corrupted)
    }

    pub fn failed_files(&self) -> impl Iterator<Item = &FailedFile> {
        self.timeframes
            .iter()
            .flat_map(|t| &t.batches)
            .flat_map(|b| &b.failed_files)
    }

    /// Failed batches plus files whose records were discarded
    pub fn failure_count(&self) -> usize {
        self.failed_batches().count() + self.failed_files().count()
    }

    /// Log the end-of-run report, listing every gap a re-run should target
    pub fn log(&self) {
        info!(
            "Run finished in {:.2}s: {} pairs ({} new), {} records parsed, {} committed",
            self.elapsed_ms as f64 / 1000.0,
            self.pairs_discovered,
            self.pairs_registered,
            self.records_parsed(),
            self.records_committed()
        );
        for report in &self.timeframes {
            info!(
                "  {:>4} -> {:<10} files={} parsed={} committed={} batches={}/{}",
                report.timeframe.interval(),
                report.timeframe.table_name(),
                report.files(),
                report.records_parsed(),
                report.records_committed(),
                report.committed_batches(),
                report.batches.len()
            );
        }
        for skipped in &self.skipped_files {
            warn!("Skipped {}: {}", skipped.path.display(), skipped.reason);
        }
        for corrupted in self.corrupted_files() {
            warn!("Corrupted {}: {}", corrupted.path.display(), corrupted.reason);
        }
        for failed in self.failed_files() {
            warn!("Failed {}: {}", failed.path.display(), failed.error);
        }
        for batch in self.failed_batches() {
            if let BatchStatus::RolledBack { error: reason } = &batch.status {
                error!(
                    "Rolled back `{}` batch {} (pairs {:?}): {}",
                    batch.timeframe, batch.index, batch.pairs, reason
                );
            }
        }
    }
}

/// Registration, planning and batched loading over one source directory
pub struct KlineLoader {
    pairs: Arc<dyn PairRepository>,
    klines: Arc<dyn KlineRepository>,
    options: RunOptions,
}

impl KlineLoader {
    pub fn new(
        pairs: Arc<dyn PairRepository>,
        klines: Arc<dyn KlineRepository>,
        options: RunOptions,
    ) -> Self {
        Self {
            pairs,
            klines,
            options,
        }
    }

    pub fn source_dir(&self) -> &Path {
        &self.options.source_dir
    }

    /// Fails only when the source directory cannot be listed or the pairs
    /// cannot be registered; batch level failures end up in the summary.
    pub async fn run(&self) -> Result<RunSummary, LoaderError> {
        let started = Instant::now();
        let catalog = Arc::new(ArchiveCatalog::scan(self.source_dir()).await?);

        let discovered = catalog.pairs();
        info!("#{} MarketPairs are loaded", discovered.len());

        let registry = PairRegistry::new(self.pairs.clone());
        let pairs_registered = registry.register(&discovered).await?;
        let pair_map = Arc::new(registry.load_all().await?);

        let loader = BatchLoader::new(
            RecordParser::new(pair_map),
            catalog.clone(),
            self.klines.clone(),
        )
        .with_max_batch_size(self.options.max_batch_size)
        .with_conflict_policy(self.options.conflict_policy);

        let mut timeframes = Vec::new();
        for (timeframe, units) in job_planner::group_by_timeframe(job_planner::plan(&discovered)) {
            if !catalog.has_timeframe(timeframe) {
                debug!("No `{}` archives, skipping timeframe", timeframe);
                continue;
            }
            timeframes.push(loader.load_timeframe(timeframe, units).await);
        }

        Ok(RunSummary {
            source_dir: self.options.source_dir.clone(),
            pairs_discovered: discovered.len(),
            pairs_registered,
            timeframes,
            skipped_files: catalog.skipped().to_vec(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}
