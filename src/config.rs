//! Configuration for the KDVP converter

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::convert::RoundingPolicy;
use crate::filing::{default_renames, DocumentWorkflow, SchemaVersion};
use crate::importers::SourceKind;
use crate::rates::bsi::BSI_RATES_URL;

/// Largest accepted gap between quantity x price and the stated total
pub const DEFAULT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 1);

pub const DOMESTIC_CURRENCY: &str = "EUR";

// =============================================================================
// File-based Configuration (kdvp.toml)
// =============================================================================

/// Configuration loaded from a TOML file; every section is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub filing: FilingSection,
    pub conversion: ConversionSection,
    pub rates: RatesSection,
    pub tickers: TickersSection,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilingSection {
    /// Filing year (default: the previous calendar year)
    pub year: Option<i32>,
    /// Period bounds, "YYYY-MM-DD" strings (default: the whole year)
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    /// "O" for an original filing, "I" for a correction
    pub workflow: DocumentWorkflow,
    pub is_resident: bool,
    /// Value of the sale's loss-rule flag (F10)
    pub loss_rule: bool,
    pub schema: Option<SchemaVersion>,
    pub format: Option<SourceKind>,
}

impl Default for FilingSection {
    fn default() -> Self {
        Self {
            year: None,
            period_start: None,
            period_end: None,
            workflow: DocumentWorkflow::Original,
            is_resident: true,
            loss_rule: true,
            schema: None,
            format: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConversionSection {
    pub tolerance: Decimal,
    pub rounding: RoundingPolicy,
    pub domestic_currency: String,
}

impl Default for ConversionSection {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            rounding: RoundingPolicy::HalfEven,
            domestic_currency: DOMESTIC_CURRENCY.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RatesSection {
    pub url: String,
    /// Cache file (default: <cache dir>/kdvp/rates/dtecbs-l.xml)
    pub cache: Option<PathBuf>,
}

impl Default for RatesSection {
    fn default() -> Self {
        Self {
            url: BSI_RATES_URL.to_string(),
            cache: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TickersSection {
    /// Old symbol = new symbol
    pub renames: HashMap<String, String>,
    /// Ticker,ISIN reference table
    pub isin_db: Option<PathBuf>,
}

impl Default for TickersSection {
    fn default() -> Self {
        Self {
            renames: default_renames(),
            isin_db: None,
        }
    }
}

impl FileConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: FileConfig = toml::from_str(content).context(
            "Check for:\n\
             - Invalid TOML syntax (missing quotes, brackets, etc.)\n\
             - Dates written without quotes (use \"2021-01-01\")\n\
             - Unknown keys or sections",
        )?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_match_original_behavior() {
        let config = FileConfig::parse("").unwrap();
        assert_eq!(config.conversion.tolerance, dec!(0.1));
        assert_eq!(config.conversion.rounding, RoundingPolicy::HalfEven);
        assert_eq!(config.conversion.domestic_currency, "EUR");
        assert!(config.filing.is_resident);
        assert!(config.filing.loss_rule);
        assert_eq!(config.filing.workflow, DocumentWorkflow::Original);
        assert_eq!(config.rates.url, BSI_RATES_URL);
        assert_eq!(config.tickers.renames.get("VACQ").map(String::as_str), Some("RKLB"));
    }

    #[test]
    fn test_full_config() {
        let config = FileConfig::parse(
            r#"
            [filing]
            year = 2022
            period_start = "2022-01-01"
            period_end = "2022-06-30"
            workflow = "I"
            schema = "kdvp9-isin"
            format = "generic"

            [conversion]
            tolerance = "0.05"
            rounding = "truncate"

            [rates]
            cache = "/tmp/rates.xml"

            [tickers]
            isin_db = "db/isin.csv"
            [tickers.renames]
            FB = "META"
            "#,
        )
        .unwrap();

        assert_eq!(config.filing.year, Some(2022));
        assert_eq!(
            config.filing.period_end,
            NaiveDate::from_ymd_opt(2022, 6, 30)
        );
        assert_eq!(config.filing.workflow, DocumentWorkflow::Correction);
        assert_eq!(config.filing.schema, Some(SchemaVersion::Kdvp9Isin));
        assert_eq!(config.filing.format, Some(SourceKind::Generic));
        assert_eq!(config.conversion.tolerance, dec!(0.05));
        assert_eq!(config.conversion.rounding, RoundingPolicy::Truncate);
        assert_eq!(config.rates.cache, Some(PathBuf::from("/tmp/rates.xml")));
        assert_eq!(config.tickers.renames.len(), 1);
        assert_eq!(config.tickers.renames["FB"], "META");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(FileConfig::parse("[filing]\nyaer = 2021\n").is_err());
    }
}
