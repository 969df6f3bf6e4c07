use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::unsync::OnceCell;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::blocking::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use super::{RateSource, RateTable};
use crate::error::FilingError;

/// Bank of Slovenia reference rates, full history since 2007
pub const BSI_RATES_URL: &str = "https://www.bsi.si/_data/tecajnice/dtecbs-l.xml";
const CACHE_FILENAME: &str = "dtecbs-l.xml";

#[derive(Debug, Serialize, Deserialize)]
pub struct RatesMeta {
    pub fetched_at: DateTime<Utc>,
    pub source_url: String,
}

pub fn get_rates_cache_dir() -> Result<PathBuf> {
    let cache_dir = std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(dir_spec::cache_home)
        .ok_or_else(|| anyhow!("Could not determine cache directory"))?;
    Ok(cache_dir.join("kdvp").join("rates"))
}

/// On-disk copy of the BSI rate list, fetched once and then reused
///
/// The table is read lazily on the first lookup. A missing cache file is
/// downloaded at that point; an existing one is never refreshed unless
/// [`BsiRateCache::refresh`] is called.
pub struct BsiRateCache {
    path: PathBuf,
    url: String,
    table: OnceCell<RateTable>,
}

impl BsiRateCache {
    pub fn new(path: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            url: url.into(),
            table: OnceCell::new(),
        }
    }

    /// Cache file under the user cache directory
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(
            get_rates_cache_dir()?.join(CACHE_FILENAME),
            BSI_RATES_URL,
        ))
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_cached(&self) -> bool {
        self.path.exists()
    }

    /// Download the rate list unless a cached copy exists
    pub fn ensure_cached(&self) -> Result<()> {
        if self.is_cached() {
            debug!("Using cached rate list {:?}", self.path);
            return Ok(());
        }
        self.refresh()
    }

    /// Download the rate list, replacing any cached copy
    pub fn refresh(&self) -> Result<()> {
        info!("Downloading exchange rates from {}", self.url);
        let bytes = download(&self.url)?;

        let content = std::str::from_utf8(&bytes)
            .map_err(|e| FilingError::RateFetch(format!("response is not UTF-8: {}", e)))?;
        let table = parse_rate_table(content).context("Downloaded rate list is unusable")?;
        info!("Downloaded {} published rates", table.len());

        store(&self.path, &bytes)?;
        let meta = RatesMeta {
            fetched_at: Utc::now(),
            source_url: self.url.clone(),
        };
        fs::write(self.meta_path(), serde_json::to_vec_pretty(&meta)?)
            .context("Failed to write rate cache metadata")?;
        Ok(())
    }

    pub fn read_meta(&self) -> Result<Option<RatesMeta>> {
        let meta_path = self.meta_path();
        if !meta_path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&meta_path).context("Failed to read rate cache metadata")?;
        let meta =
            serde_json::from_slice(&bytes).context("Failed to parse rate cache metadata")?;
        Ok(Some(meta))
    }

    /// `<cache stem>.meta.json` next to the cache file
    fn meta_path(&self) -> PathBuf {
        self.path.with_extension("meta.json")
    }

    fn table(&self) -> Result<&RateTable> {
        self.table.get_or_try_init(|| {
            self.ensure_cached()?;
            let content = fs::read_to_string(&self.path)
                .with_context(|| format!("Failed to read rate cache {}", self.path.display()))?;
            parse_rate_table(&content)
                .with_context(|| format!("Corrupt rate cache {}", self.path.display()))
        })
    }
}

impl RateSource for BsiRateCache {
    fn published_rate(&self, date: NaiveDate, currency: &str) -> Result<Option<Decimal>> {
        Ok(self.table()?.get(date, currency))
    }
}

fn download(url: &str) -> Result<Vec<u8>> {
    let client = Client::new();
    let response = client
        .get(url)
        .send()
        .map_err(|e| FilingError::RateFetch(e.to_string()))?
        .error_for_status()
        .map_err(|e| FilingError::RateFetch(e.to_string()))?;

    let bytes = response
        .bytes()
        .map_err(|e| FilingError::RateFetch(e.to_string()))?;
    Ok(bytes.to_vec())
}

/// Write through a per-process temp file so concurrent first runs only ever
/// rename complete, identical files into place
fn store(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).context("Failed to create rate cache directory")?;
    }
    let tmp_path = path.with_extension(format!("xml.{}.tmp", std::process::id()));
    fs::write(&tmp_path, bytes).context("Failed to write rate cache")?;
    fs::rename(&tmp_path, path).context("Failed to finalize rate cache file")?;
    Ok(())
}

/// Parse the BSI `tecajnice` document
///
/// ```xml
/// <tecajnice xmlns="http://www.bsi.si">
///   <tecajnica datum="2021-03-05">
///     <tecaj oznaka="USD" sifra="840">1.1902</tecaj>
///   </tecajnica>
/// </tecajnice>
/// ```
pub fn parse_rate_table(xml: &str) -> Result<RateTable> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut table = RateTable::new();
    let mut date: Option<NaiveDate> = None;
    let mut currency: Option<String> = None;

    loop {
        match reader.read_event().context("Malformed rate list XML")? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"tecajnica" => {
                    let raw = attribute(&e, "datum")?;
                    let parsed = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
                        FilingError::RateTable(format!("invalid publication date '{}'", raw))
                    })?;
                    date = Some(parsed);
                }
                b"tecaj" => currency = Some(attribute(&e, "oznaka")?),
                _ => {}
            },
            Event::Text(text) => {
                if let (Some(day), Some(code)) = (date, currency.as_deref()) {
                    let value = text.unescape().context("Malformed rate value")?;
                    let rate = Decimal::from_str(value.trim()).map_err(|_| {
                        FilingError::RateTable(format!(
                            "invalid {} rate '{}' on {}",
                            code, value, day
                        ))
                    })?;
                    table.insert(day, code, rate);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"tecaj" => currency = None,
                b"tecajnica" => date = None,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if table.is_empty() {
        return Err(FilingError::RateTable("no rates found".to_string()).into());
    }
    Ok(table)
}

fn attribute(element: &BytesStart, name: &str) -> Result<String> {
    let attr = element
        .try_get_attribute(name)
        .context("Malformed attribute in rate list")?
        .ok_or_else(|| {
            FilingError::RateTable(format!(
                "<{}> without '{}' attribute",
                String::from_utf8_lossy(element.local_name().as_ref()),
                name
            ))
        })?;
    Ok(attr
        .unescape_value()
        .context("Malformed attribute in rate list")?
        .into_owned())
}
