//! Archive fixtures shared by unit tests

use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

/// CSV line for one kline starting at `open_ms`
pub fn kline_row(open_ms: i64) -> String {
    format!(
        "{},100.5,101.25,99.75,100.0,12.5,{},1250.0,42,6.25,625.0,0",
        open_ms,
        open_ms + 59_999
    )
}

/// Write `name` into `dir` as a ZIP holding one member with `rows`
pub fn write_archive(dir: &Path, name: &str, member: &str, rows: &[String]) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file(member, SimpleFileOptions::default()).unwrap();
    for row in rows {
        writeln!(zip, "{}", row).unwrap();
    }
    zip.finish().unwrap();
    path
}

/// Archive named `name` whose member follows the `<stem>.csv` convention
pub fn write_kline_archive(dir: &Path, name: &str, rows: usize) -> PathBuf {
    let member = format!("{}.csv", name.trim_end_matches(".zip"));
    let rows: Vec<String> = (0..rows as i64).map(|i| kline_row(i * 60_000)).collect();
    write_archive(dir, name, &member, &rows)
}
