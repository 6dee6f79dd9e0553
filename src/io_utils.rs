use anyhow::{anyhow, Context, Result};
use std::ffi::OsStr;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::NA;
use crate::model::{MergedRow, Value};

/// Reads a log as text, with CRLF line endings folded to LF.
pub fn read_log(path: &Path) -> Result<String> {
    let data = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&data).replace("\r\n", "\n"))
}

/// Reads a written table back; NA and empty cells are left out of the row.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<MergedRow>> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = rdr.headers().context("read table header")?.clone();

    let mut rows = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("read table row {}", line + 1))?;
        let mut row = MergedRow::new();
        for (name, cell) in headers.iter().zip(record.iter()) {
            let cell = cell.trim();
            if cell.is_empty() || cell == NA {
                continue;
            }
            match Value::parse(cell) {
                Some(v) => {
                    row.insert(name.to_string(), v);
                }
                None => log::warn!(
                    "row {}: column '{}' has non-numeric value '{}'",
                    line + 1,
                    name,
                    cell
                ),
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

pub fn load_table(path: &Path) -> Result<Vec<MergedRow>> {
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    read_rows(file).with_context(|| format!("parse table {}", path.display()))
}

/// Expands directories into the CSV files below them, sorted; files pass through.
pub fn collect_tables(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for input in inputs {
        if !input.exists() {
            return Err(anyhow!("table path not found: {}", input.display()));
        }
        if input.is_file() {
            out.push(input.clone());
            continue;
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(input).follow_links(false) {
            let entry = entry?;
            if entry.file_type().is_file() && entry.path().extension() == Some(OsStr::new("csv")) {
                found.push(entry.path().to_path_buf());
            }
        }
        if found.is_empty() {
            return Err(anyhow!("no .csv tables found under {}", input.display()));
        }
        found.sort();
        out.extend(found);
    }
    Ok(out)
}
