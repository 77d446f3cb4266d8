//! One-shot listing of the source directory.
//!
//! Every entry is run through the archive namer once. Accepted archives are
//! indexed by `(timeframe, pair)` so a planning unit resolves to its files
//! by exact key lookup. Rejected entries are kept for the run summary.

use crate::domain::archive_name::ArchiveName;
use crate::domain::errors::LoaderError;
use crate::domain::timeframe::TimeFrame;
use crate::domain::types::ArchiveUnit;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// A source entry left out of planning, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ArchiveCatalog {
    archives: BTreeMap<(TimeFrame, String), Vec<PathBuf>>,
    skipped: Vec<SkippedFile>,
}

impl ArchiveCatalog {
    pub async fn scan(dir: &Path) -> Result<Self, LoaderError> {
        let source_error = |source| LoaderError::SourceDirectory {
            path: dir.to_path_buf(),
            source,
        };

        let mut entries = fs::read_dir(dir).await.map_err(source_error)?;
        let mut catalog = ArchiveCatalog::default();

        while let Some(entry) = entries.next_entry().await.map_err(source_error)? {
            let path = entry.path();
            if !fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false) {
                debug!("Ignoring non-file entry {}", path.display());
                continue;
            }

            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                catalog.skip(path.clone(), "file name is not valid UTF-8".to_string());
                continue;
            };

            match ArchiveName::parse(name) {
                Ok(archive) => catalog.insert(archive, path),
                Err(e) => catalog.skip(path, e.to_string()),
            }
        }

        for paths in catalog.archives.values_mut() {
            paths.sort();
        }
        catalog.skipped.sort_by(|a, b| a.path.cmp(&b.path));

        debug!(
            "Catalogued {} archives, skipped {} entries in {}",
            catalog.archive_count(),
            catalog.skipped.len(),
            dir.display()
        );
        Ok(catalog)
    }

    fn insert(&mut self, archive: ArchiveName, path: PathBuf) {
        self.archives
            .entry((archive.timeframe, archive.pair))
            .or_default()
            .push(path);
    }

    fn skip(&mut self, path: PathBuf, reason: String) {
        warn!("Skipping {}: {}", path.display(), reason);
        self.skipped.push(SkippedFile { path, reason });
    }

    /// Distinct, upper-cased pair names with at least one archive
    pub fn pairs(&self) -> BTreeSet<String> {
        self.archives.keys().map(|(_, pair)| pair.clone()).collect()
    }

    /// Archives matching a planning unit, sorted by path
    pub fn archives_for(&self, unit: &ArchiveUnit) -> &[PathBuf] {
        self.archives
            .get(&(unit.timeframe, unit.pair.clone()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn has_timeframe(&self, timeframe: TimeFrame) -> bool {
        self.archives.keys().any(|(tf, _)| *tf == timeframe)
    }

    pub fn archive_count(&self) -> usize {
        self.archives.values().map(Vec::len).sum()
    }

    pub fn skipped(&self) -> &[SkippedFile] {
        &self.skipped
    }
}
