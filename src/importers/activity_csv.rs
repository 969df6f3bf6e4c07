use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use super::SourceFormat;

/// One export row keyed by the descriptor's column names
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    /// 1-based line in the source file
    pub line: usize,
    fields: HashMap<String, String>,
}

impl RawRow {
    pub fn new(line: usize, fields: HashMap<String, String>) -> Self {
        Self { line, fields }
    }

    pub fn from_pairs(line: usize, pairs: &[(&str, &str)]) -> Self {
        let fields = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self { line, fields }
    }

    /// Raw cell value, empty when the row is short
    pub fn get(&self, column: &str) -> &str {
        self.fields.get(column).map(String::as_str).unwrap_or("")
    }
}

/// Read an activity export into raw rows
pub fn read_activity_csv<P: AsRef<Path>>(path: P, format: &SourceFormat) -> Result<Vec<RawRow>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open activity file: {}", path.display()))?;
    read_activity(file, format)
}

/// Read raw rows from any reader (used by tests with in-memory content)
pub fn read_activity<R: Read>(source: R, format: &SourceFormat) -> Result<Vec<RawRow>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(format.delimiter)
        .flexible(true) // Allow variable number of columns
        .from_reader(source);

    let headers = reader
        .headers()
        .context("Failed to read CSV headers")?
        .clone();
    debug!("CSV headers: {:?}", headers);

    let mut columns = Vec::new();
    let mut missing = Vec::new();
    for name in format.columns.all() {
        match find_header(&headers, name) {
            Some(idx) => columns.push((name, idx)),
            None => missing.push(name),
        }
    }
    if !missing.is_empty() {
        return Err(anyhow!(
            "Missing {} column(s): {}. Is this a {} export?",
            format.name,
            missing.join(", "),
            format.name
        ));
    }

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.context("Failed to read CSV record")?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 2);

        let fields = columns
            .iter()
            .map(|(name, col)| {
                (
                    name.to_string(),
                    record.get(*col).unwrap_or("").to_string(),
                )
            })
            .collect();
        rows.push(RawRow::new(line, fields));
    }

    info!("Read {} rows from {} export", rows.len(), format.name);
    Ok(rows)
}

fn find_header(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim().eq_ignore_ascii_case(name))
}
