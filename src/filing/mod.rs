// Filing module - Doh-KDVP document assembly and emission

pub mod emitter;
pub mod isin;
pub mod schema;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

use crate::convert::ConvertedRow;
use crate::importers::SkippedRow;
use crate::models::TransactionKind;

pub use emitter::{emit, write_document};
pub use isin::{IsinTable, MISSING_ISIN};
pub use schema::{SchemaDescriptor, SchemaVersion};

/// Identity block of the `edp:taxpayer` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxpayer {
    pub tax_number: String,
    pub name: String,
    pub address: String,
    pub post_number: String,
    pub city: String,
    pub birth_date: NaiveDate,
    pub phone: String,
    pub email: String,
}

impl Taxpayer {
    /// eDavki taxpayer type for natural persons
    pub const TAXPAYER_TYPE: &'static str = "FO";
}

/// Reporting period of the filing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilingPeriod {
    pub year: i32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FilingPeriod {
    pub fn calendar_year(year: i32) -> Option<Self> {
        Some(Self {
            year,
            start: NaiveDate::from_ymd_opt(year, 1, 1)?,
            end: NaiveDate::from_ymd_opt(year, 12, 31)?,
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// `DocumentWorkflowID`: an original filing or a correction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum DocumentWorkflow {
    #[default]
    #[serde(rename = "O")]
    Original,
    #[serde(rename = "I")]
    Correction,
}

impl DocumentWorkflow {
    pub fn code(&self) -> &'static str {
        match self {
            DocumentWorkflow::Original => "O",
            DocumentWorkflow::Correction => "I",
        }
    }
}

/// Header inputs supplied by the caller
#[derive(Debug, Clone)]
pub struct HeaderFields {
    pub taxpayer: Taxpayer,
    pub period: FilingPeriod,
    pub workflow: DocumentWorkflow,
    pub is_resident: bool,
}

/// Complete `KDVP` header, counts derived from the retained securities
#[derive(Debug, Clone)]
pub struct FilingHeader {
    pub fields: HeaderFields,
    pub security_count: usize,
    pub security_short_count: usize,
    pub security_with_contract_count: usize,
    pub security_with_contract_short_count: usize,
    pub share_count: usize,
}

/// How a purchased lot was acquired (`F2`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionMethod {
    /// Bought on the market ("nakup")
    Bought,
}

impl AcquisitionMethod {
    pub fn code(&self) -> &'static str {
        match self {
            AcquisitionMethod::Bought => "B",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowEntry {
    Purchase {
        date: NaiveDate,
        method: AcquisitionMethod,
        quantity: Decimal,
        price_eur: Decimal,
    },
    Sale {
        date: NaiveDate,
        quantity: Decimal,
        price_eur: Decimal,
        loss_rule: bool,
    },
}

impl RowEntry {
    pub fn is_sale(&self) -> bool {
        matches!(self, RowEntry::Sale { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilingRow {
    /// Unique across the whole document
    pub id: u32,
    pub entry: RowEntry,
}

/// One `KDVPItem`
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityItem {
    pub ticker: String,
    pub isin: Option<String>,
    pub rows: Vec<FilingRow>,
}

#[derive(Debug, Clone)]
pub struct FilingDocument {
    pub header: FilingHeader,
    pub items: Vec<SecurityItem>,
}

impl FilingDocument {
    pub fn row_count(&self) -> usize {
        self.items.iter().map(|item| item.rows.len()).sum()
    }
}

/// Non-fatal findings reported to the user after a run
#[derive(Debug, Clone, PartialEq)]
pub enum FilingWarning {
    NoDisposals { ticker: String },
    MissingIsin { ticker: String },
    SkippedRow(SkippedRow),
    OutsidePeriod { ticker: String, date: NaiveDate },
}

impl From<SkippedRow> for FilingWarning {
    fn from(row: SkippedRow) -> Self {
        FilingWarning::SkippedRow(row)
    }
}

impl fmt::Display for FilingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilingWarning::NoDisposals { ticker } => {
                write!(f, "Skipping {} because there were no sells", ticker)
            }
            FilingWarning::MissingIsin { ticker } => {
                write!(f, "No ISIN known for {}, wrote {}", ticker, MISSING_ISIN)
            }
            FilingWarning::SkippedRow(row) => {
                write!(f, "Line {}: skipped {}: {}", row.line, row.ticker, row.reason)
            }
            FilingWarning::OutsidePeriod { ticker, date } => {
                write!(f, "{} sold on {} outside the filing period", ticker, date)
            }
        }
    }
}

/// Knobs of the assembly step
#[derive(Debug, Clone)]
pub struct AssembleOptions {
    /// Old symbol to new symbol, applied before grouping
    pub renames: HashMap<String, String>,
    /// Value written to the sale's loss-rule flag (`F10`)
    pub loss_rule: bool,
    /// Present when the schema carries ISINs
    pub isin: Option<IsinTable>,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            renames: default_renames(),
            loss_rule: true,
            isin: None,
        }
    }
}

/// Symbol changes from corporate actions (SPAC mergers)
pub fn default_renames() -> HashMap<String, String> {
    HashMap::from([("VACQ".to_string(), "RKLB".to_string())])
}

/// Rename table keyed like normalized tickers (trimmed, uppercase)
pub fn normalize_renames(renames: &HashMap<String, String>) -> HashMap<String, String> {
    renames
        .iter()
        .map(|(old, new)| (old.trim().to_uppercase(), new.trim().to_uppercase()))
        .collect()
}

#[derive(Debug)]
pub struct Assembled {
    pub document: FilingDocument,
    pub warnings: Vec<FilingWarning>,
}

/// Group converted rows per security and build the filing
pub fn assemble(
    rows: Vec<ConvertedRow>,
    fields: HeaderFields,
    options: &AssembleOptions,
) -> Assembled {
    let mut warnings = Vec::new();

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<ConvertedRow>> = HashMap::new();
    for mut row in rows {
        if let Some(renamed) = options.renames.get(&row.transaction.ticker) {
            debug!("Filing {} under {}", row.transaction.ticker, renamed);
            row.transaction.ticker = renamed.clone();
        }
        let ticker = row.transaction.ticker.clone();
        groups
            .entry(ticker.clone())
            .or_insert_with(|| {
                order.push(ticker);
                Vec::new()
            })
            .push(row);
    }

    let mut items = Vec::new();
    let mut next_id: u32 = 0;
    for ticker in order {
        let group = groups.remove(&ticker).unwrap_or_default();
        if !group.iter().any(|row| row.transaction.is_sell()) {
            warn!("Skipping {} because there were no sells", ticker);
            warnings.push(FilingWarning::NoDisposals { ticker });
            continue;
        }

        let isin = options.isin.as_ref().map(|table| match table.lookup(&ticker) {
            Some(isin) => isin.to_string(),
            None => {
                warn!("No ISIN known for {}", ticker);
                warnings.push(FilingWarning::MissingIsin {
                    ticker: ticker.clone(),
                });
                MISSING_ISIN.to_string()
            }
        });

        let mut filing_rows = Vec::with_capacity(group.len());
        for row in group {
            let tx = &row.transaction;
            let entry = match tx.kind {
                TransactionKind::Buy => RowEntry::Purchase {
                    date: tx.date,
                    method: AcquisitionMethod::Bought,
                    quantity: row.quantity,
                    price_eur: row.price_eur,
                },
                TransactionKind::Sell => {
                    if !fields.period.contains(tx.date) {
                        warnings.push(FilingWarning::OutsidePeriod {
                            ticker: ticker.clone(),
                            date: tx.date,
                        });
                    }
                    RowEntry::Sale {
                        date: tx.date,
                        quantity: row.quantity,
                        price_eur: row.price_eur,
                        loss_rule: options.loss_rule,
                    }
                }
            };
            filing_rows.push(FilingRow { id: next_id, entry });
            next_id += 1;
        }

        items.push(SecurityItem {
            ticker,
            isin,
            rows: filing_rows,
        });
    }

    let header = FilingHeader {
        fields,
        security_count: items.len(),
        security_short_count: 0,
        security_with_contract_count: 0,
        security_with_contract_short_count: 0,
        share_count: 0,
    };

    Assembled {
        document: FilingDocument { header, items },
        warnings,
    }
}

/// Year before `today`, the usual filing year
pub fn previous_year(today: NaiveDate) -> i32 {
    today.year() - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Transaction;
    use rust_decimal_macros::dec;

    pub(crate) fn header_fields() -> HeaderFields {
        HeaderFields {
            taxpayer: Taxpayer {
                tax_number: "12345678".to_string(),
                name: "Ana Novak".to_string(),
                address: "Slovenska cesta 1".to_string(),
                post_number: "1000".to_string(),
                city: "Ljubljana".to_string(),
                birth_date: NaiveDate::from_ymd_opt(1990, 1, 31).unwrap(),
                phone: "041000000".to_string(),
                email: "ana@example.com".to_string(),
            },
            period: FilingPeriod::calendar_year(2021).unwrap(),
            workflow: DocumentWorkflow::Original,
            is_resident: true,
        }
    }

    fn row(ticker: &str, kind: TransactionKind, month: u32) -> ConvertedRow {
        ConvertedRow {
            transaction: Transaction {
                ticker: ticker.to_string(),
                date: NaiveDate::from_ymd_opt(2021, month, 1).unwrap(),
                kind,
                quantity: dec!(1),
                unit_price: dec!(10),
                total: dec!(10),
                currency: "EUR".to_string(),
                line: month as usize,
            },
            quantity: dec!(1.0000),
            price_eur: dec!(10),
        }
    }

    #[test]
    fn test_groups_in_first_seen_order_and_skips_buy_only() {
        use TransactionKind::*;
        let rows = vec![
            row("BBB", Buy, 1),
            row("AAA", Buy, 2),
            row("CCC", Buy, 3),
            row("AAA", Sell, 4),
            row("BBB", Sell, 5),
        ];

        let assembled = assemble(rows, header_fields(), &AssembleOptions::default());
        let tickers: Vec<&str> = assembled
            .document
            .items
            .iter()
            .map(|item| item.ticker.as_str())
            .collect();
        assert_eq!(tickers, vec!["BBB", "AAA"]);
        assert_eq!(assembled.document.header.security_count, 2);
        assert_eq!(
            assembled.warnings,
            vec![FilingWarning::NoDisposals {
                ticker: "CCC".to_string()
            }]
        );
    }

    #[test]
    fn test_row_ids_are_global_and_increasing() {
        use TransactionKind::*;
        let rows = vec![
            row("AAA", Buy, 1),
            row("BBB", Buy, 2),
            row("AAA", Sell, 3),
            row("BBB", Sell, 4),
            row("BBB", Sell, 5),
        ];

        let doc = assemble(rows, header_fields(), &AssembleOptions::default()).document;
        let ids: Vec<u32> = doc
            .items
            .iter()
            .flat_map(|item| item.rows.iter().map(|r| r.id))
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(doc.items[1].rows.len(), 3);
        assert_eq!(doc.row_count(), 5);
    }

    #[test]
    fn test_renames_merge_before_grouping() {
        use TransactionKind::*;
        let rows = vec![row("VACQ", Buy, 1), row("RKLB", Sell, 9)];

        let assembled = assemble(rows, header_fields(), &AssembleOptions::default());
        let doc = assembled.document;
        assert_eq!(doc.items.len(), 1);
        assert_eq!(doc.items[0].ticker, "RKLB");
        assert!(!doc.items[0].rows[0].entry.is_sale());
        assert!(doc.items[0].rows[1].entry.is_sale());
        assert!(assembled.warnings.is_empty());
    }

    #[test]
    fn test_configured_renames_ignore_case() {
        use TransactionKind::*;
        let configured = HashMap::from([(" fb".to_string(), "meta".to_string())]);
        let options = AssembleOptions {
            renames: normalize_renames(&configured),
            ..AssembleOptions::default()
        };
        let rows = vec![row("FB", Buy, 1), row("META", Sell, 9)];

        let doc = assemble(rows, header_fields(), &options).document;
        assert_eq!(doc.items.len(), 1);
        assert_eq!(doc.items[0].ticker, "META");
        assert_eq!(doc.items[0].rows.len(), 2);
    }

    #[test]
    fn test_isin_sentinel_for_unknown_tickers() {
        use TransactionKind::*;
        let options = AssembleOptions {
            isin: Some(IsinTable::from_reader("Ticker,ISIN\nAAA,US0000000001\n".as_bytes()).unwrap()),
            ..AssembleOptions::default()
        };
        let rows = vec![row("AAA", Sell, 1), row("ZZZ", Sell, 2)];

        let assembled = assemble(rows, header_fields(), &options);
        let items = &assembled.document.items;
        assert_eq!(items[0].isin.as_deref(), Some("US0000000001"));
        assert_eq!(items[1].isin.as_deref(), Some(MISSING_ISIN));
        assert_eq!(
            assembled.warnings,
            vec![FilingWarning::MissingIsin {
                ticker: "ZZZ".to_string()
            }]
        );
    }

    #[test]
    fn test_sale_entry_fields() {
        let options = AssembleOptions {
            loss_rule: false,
            ..AssembleOptions::default()
        };
        let doc = assemble(
            vec![row("AAA", TransactionKind::Sell, 6)],
            header_fields(),
            &options,
        )
        .document;
        assert_eq!(
            doc.items[0].rows[0].entry,
            RowEntry::Sale {
                date: NaiveDate::from_ymd_opt(2021, 6, 1).unwrap(),
                quantity: dec!(1.0000),
                price_eur: dec!(10),
                loss_rule: false,
            }
        );
        assert!(doc.items[0].isin.is_none());
    }

    #[test]
    fn test_sale_outside_period_is_flagged() {
        let mut late = row("AAA", TransactionKind::Sell, 1);
        late.transaction.date = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();

        let assembled = assemble(vec![late], header_fields(), &AssembleOptions::default());
        assert_eq!(assembled.document.items.len(), 1);
        assert!(matches!(
            assembled.warnings[0],
            FilingWarning::OutsidePeriod { .. }
        ));
    }

    #[test]
    fn test_period_helpers() {
        let period = FilingPeriod::calendar_year(2021).unwrap();
        assert_eq!(period.start.to_string(), "2021-01-01");
        assert_eq!(period.end.to_string(), "2021-12-31");
        assert_eq!(previous_year(NaiveDate::from_ymd_opt(2022, 2, 10).unwrap()), 2021);
    }
}
