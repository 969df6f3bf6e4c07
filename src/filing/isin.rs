use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Written in place of an ISIN the reference table does not know
pub const MISSING_ISIN: &str = "ERROR";

/// Ticker symbol to ISIN reference table (`db/isin.csv`)
#[derive(Debug, Clone, Default)]
pub struct IsinTable {
    map: HashMap<String, String>,
}

impl IsinTable {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open ISIN table: {}", path.display()))?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(source);
        let headers = reader.headers()?.clone();
        let ticker_idx = find_header(&headers, "Ticker")?;
        let isin_idx = find_header(&headers, "ISIN")?;

        let mut map = HashMap::new();
        for result in reader.records() {
            let record = result.context("Failed to read ISIN table record")?;
            let ticker = record.get(ticker_idx).unwrap_or("").trim();
            let isin = record.get(isin_idx).unwrap_or("").trim();
            if ticker.is_empty() || isin.is_empty() {
                continue;
            }
            if map
                .insert(ticker.to_ascii_uppercase(), isin.to_ascii_uppercase())
                .is_some()
            {
                tracing::error!("Duplicate ticker in ISIN table: {}", ticker);
            }
        }

        debug!("Loaded {} ISIN mappings", map.len());
        Ok(Self { map })
    }

    pub fn lookup(&self, ticker: &str) -> Option<&str> {
        self.map
            .get(&ticker.to_ascii_uppercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn find_header(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| anyhow!("Missing ISIN table column: {}", name))
}
