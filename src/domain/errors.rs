use std::path::PathBuf;
use thiserror::Error;

use crate::domain::timeframe::TimeFrame;

/// Errors raised while decoding an archive file name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    #[error("Malformed archive name '{name}': expected SYMBOL-TIMEFRAME-suffix.zip")]
    MalformedArchiveName { name: String },

    #[error("Unrecognized timeframe token '{token}'")]
    UnrecognizedTimeframe { token: String },
}

/// Hard failures while decoding a single archive.
///
/// A corrupted container is not an error: see `ArchiveOutcome::Corrupted`.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{archive}: CSV member '{member}' not found")]
    MissingMember { archive: PathBuf, member: String },

    #[error("{archive}: malformed row {line}, column '{column}': {reason}")]
    MalformedRow {
        archive: PathBuf,
        line: u64,
        column: &'static str,
        reason: String,
    },

    #[error("{archive}: pair '{pair}' has no registered id")]
    UnknownPair { archive: PathBuf, pair: String },

    #[error("{archive}: failed to read CSV member: {source}")]
    Io {
        archive: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{archive}: archive error: {source}")]
    Archive {
        archive: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

/// Errors surfaced at run or batch level
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Cannot read source directory {path}: {source}")]
    SourceDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Pair registration failed: {0}")]
    Registration(#[source] anyhow::Error),

    #[error("Bulk insert into '{table}' failed: {source}")]
    Storage {
        table: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl LoaderError {
    pub fn storage(timeframe: TimeFrame, source: anyhow::Error) -> Self {
        LoaderError::Storage {
            table: timeframe.table_name(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naming_error_formatting() {
        let error = NamingError::UnrecognizedTimeframe {
            token: "7m".to_string(),
        };
        assert!(error.to_string().contains("7m"));
    }

    #[test]
    fn test_malformed_row_formatting() {
        let error = ParseError::MalformedRow {
            archive: PathBuf::from("BTCUSDT-1d-2021-01.zip"),
            line: 3,
            column: "open",
            reason: "invalid float literal".to_string(),
        };

        let msg = error.to_string();
        assert!(msg.contains("BTCUSDT-1d-2021-01.zip"));
        assert!(msg.contains("row 3"));
        assert!(msg.contains("'open'"));
    }

    #[test]
    fn test_storage_error_names_table() {
        let error = LoaderError::storage(TimeFrame::Day1, anyhow::anyhow!("disk I/O error"));
        assert!(error.to_string().contains("day_1"));
    }
}
