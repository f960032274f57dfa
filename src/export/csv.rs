// src/export/csv.rs

//! CSV export of store records.
//!
//! Files are UTF-8 with a byte order mark so spreadsheet software picks the
//! right encoding. Phone and hours columns only appear when some record has
//! a value for them.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::Result;
use crate::models::StoreRecord;
use crate::utils::display_domain;

const BOM: &[u8] = b"\xEF\xBB\xBF";

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write a single CSV row terminated by CRLF.
fn write_row<W: Write>(w: &mut W, row: &[&str]) -> std::io::Result<()> {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            w.write_all(b",")?;
        }
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            w.write_all(cell.as_bytes())?;
        }
    }
    w.write_all(b"\r\n")
}

/// Write `records` as CSV, header row first.
pub fn write_records<W: Write>(mut w: W, records: &[StoreRecord]) -> Result<()> {
    let with_phone = records.iter().any(|r| r.phone.is_some());
    let with_hours = records.iter().any(|r| r.hours.is_some());

    let mut header = vec!["店舗名", "住所", "アクセス"];
    if with_phone {
        header.push("電話番号");
    }
    if with_hours {
        header.push("営業時間");
    }
    header.push("URL");

    w.write_all(BOM)?;
    write_row(&mut w, &header)?;

    for record in records {
        let mut row = vec![
            record.name.as_str(),
            record.address.as_str(),
            record.access.as_str(),
        ];
        if with_phone {
            row.push(record.phone.as_deref().unwrap_or_default());
        }
        if with_hours {
            row.push(record.hours.as_deref().unwrap_or_default());
        }
        row.push(record.source_url.as_str());
        write_row(&mut w, &row)?;
    }

    w.flush()?;
    Ok(())
}

/// `<domain>_clinics_<YYYYmmdd_HHMMSS>.csv` for the crawled site.
pub fn default_filename(source_url: &str, now: DateTime<Local>) -> String {
    let domain = display_domain(source_url).unwrap_or_else(|| "unknown".to_string());
    format!("{}_clinics_{}.csv", domain, now.format("%Y%m%d_%H%M%S"))
}

/// Save `records` under `dir` with the default file name; returns the path.
pub fn save_records(dir: impl AsRef<Path>, records: &[StoreRecord], source_url: &str) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let path = dir.join(default_filename(source_url, Local::now()));
    write_file(&path, records)?;
    Ok(path)
}

/// Save `records` to `path`, replacing any existing file.
pub fn write_file(path: impl AsRef<Path>, records: &[StoreRecord]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    write_records(BufWriter::new(file), records)?;
    log::info!("Saved {} records to {}", records.len(), path.display());
    Ok(())
}
