//! Kline archive decoding.
//!
//! An archive is a ZIP holding one headerless CSV member named after the
//! archive stem. Each row maps positionally onto a `CandleRecord`.
//!
//! Only a container that cannot be opened is tolerated (`Corrupted`, zero
//! records). A missing member or a malformed row fails the whole file and
//! none of its rows are returned.

use crate::domain::errors::ParseError;
use crate::domain::types::{ArchiveUnit, CandleRecord, PairId, PairMap};
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};
use zip::ZipArchive;
use zip::result::ZipError;

const COLUMNS: [&str; 12] = [
    "open_time",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "close_time",
    "quote_volume",
    "trade_count",
    "taker_buy_base_volume",
    "taker_buy_quote_volume",
    "ignore",
];

/// Result of decoding one archive
#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveOutcome {
    Parsed(Vec<CandleRecord>),
    Corrupted { reason: String },
}

impl ArchiveOutcome {
    pub fn records(&self) -> &[CandleRecord] {
        match self {
            ArchiveOutcome::Parsed(records) => records,
            ArchiveOutcome::Corrupted { .. } => &[],
        }
    }

    pub fn into_records(self) -> Vec<CandleRecord> {
        match self {
            ArchiveOutcome::Parsed(records) => records,
            ArchiveOutcome::Corrupted { .. } => Vec::new(),
        }
    }
}

/// Decodes archives for planning units, resolving pair ids from a shared map
#[derive(Debug, Clone)]
pub struct RecordParser {
    pairs: Arc<PairMap>,
}

impl RecordParser {
    pub fn new(pairs: Arc<PairMap>) -> Self {
        Self { pairs }
    }

    pub fn resolve(&self, pair: &str) -> Option<PairId> {
        self.pairs.get(pair).copied()
    }

    /// Decode `path`, one of the archives matched for `unit`
    pub fn parse_unit_archive(
        &self,
        unit: &ArchiveUnit,
        path: &Path,
    ) -> Result<ArchiveOutcome, ParseError> {
        let pair_id = self
            .resolve(&unit.pair)
            .ok_or_else(|| ParseError::UnknownPair {
                archive: path.to_path_buf(),
                pair: unit.pair.clone(),
            })?;
        parse_archive(path, pair_id)
    }
}

/// Decode one archive, stamping `pair_id` onto every record
pub fn parse_archive(path: &Path, pair_id: PairId) -> Result<ArchiveOutcome, ParseError> {
    let mut archive = match File::open(path)
        .map_err(ZipError::Io)
        .and_then(|file| ZipArchive::new(BufReader::new(file)))
    {
        Ok(archive) => archive,
        Err(e) => {
            warn!("{} is corrupted: {}", path.display(), e);
            return Ok(ArchiveOutcome::Corrupted {
                reason: e.to_string(),
            });
        }
    };

    let member_name = csv_member_name(path);
    let member = match archive.by_name(&member_name) {
        Ok(member) => member,
        Err(ZipError::FileNotFound) => {
            return Err(ParseError::MissingMember {
                archive: path.to_path_buf(),
                member: member_name,
            });
        }
        Err(source) => {
            return Err(ParseError::Archive {
                archive: path.to_path_buf(),
                source,
            });
        }
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(member);

    let mut records = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let row = row.map_err(|e| csv_error(path, e))?;
        let line = row.position().map(|p| p.line()).unwrap_or(idx as u64 + 1);

        if idx == 0 && is_header(&row) {
            debug!("{}: skipping header row", path.display());
            continue;
        }

        let record = parse_row(pair_id, &row).map_err(|(column, reason)| {
            ParseError::MalformedRow {
                archive: path.to_path_buf(),
                line,
                column,
                reason,
            }
        })?;
        records.push(record);
    }

    debug!("{}: {} records", path.display(), records.len());
    Ok(ArchiveOutcome::Parsed(records))
}

/// `<stem>.csv` for an archive at `<dir>/<stem>.zip`
fn csv_member_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    format!("{}.csv", stem)
}

fn is_header(row: &StringRecord) -> bool {
    row.get(0) == Some(COLUMNS[0])
}

fn csv_error(path: &Path, error: csv::Error) -> ParseError {
    let line = error.position().map(|p| p.line()).unwrap_or(0);
    match error.into_kind() {
        csv::ErrorKind::Io(source) => ParseError::Io {
            archive: path.to_path_buf(),
            source,
        },
        kind => ParseError::MalformedRow {
            archive: path.to_path_buf(),
            line,
            column: "row",
            reason: format!("{:?}", kind),
        },
    }
}

type RowError = (&'static str, String);

fn parse_row(pair_id: PairId, row: &StringRecord) -> Result<CandleRecord, RowError> {
    if row.len() != COLUMNS.len() {
        return Err((
            "row",
            format!("expected {} fields, found {}", COLUMNS.len(), row.len()),
        ));
    }

    Ok(CandleRecord {
        pair_id,
        open_time: timestamp(row, 0)?,
        open: field(row, 1)?,
        high: field(row, 2)?,
        low: field(row, 3)?,
        close: field(row, 4)?,
        volume: field(row, 5)?,
        close_time: timestamp(row, 6)?,
        quote_volume: field(row, 7)?,
        trade_count: field(row, 8)?,
        taker_buy_base_volume: field(row, 9)?,
        taker_buy_quote_volume: field(row, 10)?,
        ignore: field(row, 11)?,
    })
}

fn field<T>(row: &StringRecord, idx: usize) -> Result<T, RowError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = &row[idx];
    raw.parse::<T>()
        .map_err(|e| (COLUMNS[idx], format!("'{}': {}", raw, e)))
}

fn timestamp(row: &StringRecord, idx: usize) -> Result<DateTime<Utc>, RowError> {
    let millis: i64 = field(row, idx)?;
    DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| (COLUMNS[idx], format!("{} ms is out of range", millis)))
}
