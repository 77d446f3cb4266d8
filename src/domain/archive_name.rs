//! Archive name decoding.
//!
//! Archives are named `SYMBOL-TIMEFRAME-<suffix>.zip`, where the suffix is
//! free-form (usually a month such as `2021-01`). The symbol may carry an
//! underscore-delimited qualifier (`BTCUSDT_PERP`), which is not part of the
//! pair name. Decoding is pure: no file is touched.

use crate::domain::errors::NamingError;
use crate::domain::timeframe::TimeFrame;
use crate::domain::types::normalize_pair_name;

const ARCHIVE_EXTENSION: &str = ".zip";
const CSV_EXTENSION: &str = ".csv";

/// Identity decoded from an archive file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    pub pair: String,
    pub timeframe: TimeFrame,
    /// File name without the `.zip` extension
    pub stem: String,
}

impl ArchiveName {
    pub fn parse(name: &str) -> Result<Self, NamingError> {
        let malformed = || NamingError::MalformedArchiveName {
            name: name.to_string(),
        };

        let stem = name.strip_suffix(ARCHIVE_EXTENSION).ok_or_else(malformed)?;

        let mut segments = stem.split('-');
        let symbol = segments.next().unwrap_or_default();
        let timeframe_token = segments.next().ok_or_else(malformed)?;

        let pair = symbol.split('_').next().unwrap_or_default();
        if pair.trim().is_empty() {
            return Err(malformed());
        }

        let timeframe = timeframe_token.parse::<TimeFrame>()?;

        Ok(Self {
            pair: normalize_pair_name(pair),
            timeframe,
            stem: stem.to_string(),
        })
    }

    /// Name of the single CSV member expected inside the archive
    pub fn csv_member(&self) -> String {
        format!("{}{}", self.stem, CSV_EXTENSION)
    }
}
