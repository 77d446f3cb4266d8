#![allow(dead_code)]

use kline_loader::infrastructure::Database;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

// 2021-01-01T00:00:00Z
pub const JAN_2021_MS: i64 = 1_609_459_200_000;

/// CSV line for one daily kline starting at `open_ms`
pub fn kline_row(open_ms: i64) -> String {
    format!(
        "{},29000.1,29100.0,28950.5,29050.0,15.2,{},441560.0,310,7.6,220780.0,0",
        open_ms,
        open_ms + 86_399_999
    )
}

/// Archive `name` with a `<stem>.csv` member holding daily rows from `start_ms`
pub fn write_daily_archive(dir: &Path, name: &str, start_ms: i64, rows: usize) -> PathBuf {
    let member = format!("{}.csv", name.trim_end_matches(".zip"));
    let path = dir.join(name);
    let mut zip = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
    zip.start_file(member, SimpleFileOptions::default()).unwrap();
    for i in 0..rows as i64 {
        writeln!(zip, "{}", kline_row(start_ms + i * 86_400_000)).unwrap();
    }
    zip.finish().unwrap();
    path
}

pub async fn temp_database(dir: &Path) -> Database {
    let url = format!("sqlite://{}", dir.join("klines.db").display());
    Database::new(&url).await.unwrap()
}
