// Import module - brokerage activity CSV readers and record normalization

pub mod activity_csv;
pub mod normalizer;

use anyhow::Result;
use clap::ValueEnum;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use tracing::info;

use crate::models::{Transaction, TransactionKind};

pub use activity_csv::{read_activity_csv, RawRow};
pub use normalizer::{normalize_row, FilterReason, Normalized};

/// Column names of one export variant
#[derive(Debug, Clone, Copy)]
pub struct ColumnNames {
    pub date: &'static str,
    pub ticker: &'static str,
    pub kind: &'static str,
    pub quantity: &'static str,
    pub price: &'static str,
    pub total: &'static str,
    pub currency: &'static str,
}

impl ColumnNames {
    pub fn all(&self) -> [&'static str; 7] {
        [
            self.date,
            self.ticker,
            self.kind,
            self.quantity,
            self.price,
            self.total,
            self.currency,
        ]
    }
}

/// Descriptor of a vendor's activity export
#[derive(Debug, Clone, Copy)]
pub struct SourceFormat {
    pub name: &'static str,
    pub delimiter: u8,
    pub columns: ColumnNames,
    /// chrono format of the date column; anything after the date (a time
    /// component) is ignored
    pub date_format: &'static str,
    pub decimal_separator: char,
    /// Vendor activity labels that denote a trade
    pub vocabulary: &'static [(&'static str, TransactionKind)],
}

/// Revolut / crowdfunding activity statement
pub const REVOLUT: SourceFormat = SourceFormat {
    name: "revolut",
    delimiter: b';',
    columns: ColumnNames {
        date: "Date",
        ticker: "Ticker",
        kind: "Type",
        quantity: "Quantity",
        price: "Price per share",
        total: "Total Amount",
        currency: "Currency",
    },
    date_format: "%d/%m/%Y",
    decimal_separator: '.',
    vocabulary: &[
        ("EIS Investment", TransactionKind::Buy),
        ("EIS Sale", TransactionKind::Sell),
        ("SEIS Investment", TransactionKind::Buy),
        ("SEIS Sale", TransactionKind::Sell),
        ("Investment", TransactionKind::Buy),
        ("Sale", TransactionKind::Sell),
        ("Purchase", TransactionKind::Buy),
    ],
};

/// Plain comma-separated export where disposals carry a negative quantity
pub const GENERIC: SourceFormat = SourceFormat {
    name: "generic",
    delimiter: b',',
    columns: ColumnNames {
        date: "date",
        ticker: "symbol",
        kind: "action",
        quantity: "quantity",
        price: "price",
        total: "amount",
        currency: "currency",
    },
    date_format: "%Y-%m-%d",
    decimal_separator: '.',
    vocabulary: &[
        ("SSP", TransactionKind::Buy),
        ("TRADE", TransactionKind::Buy),
        ("Market buy", TransactionKind::Buy),
        ("Market sell", TransactionKind::Sell),
    ],
};

/// Export variant selected once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    #[default]
    Revolut,
    Generic,
}

impl SourceKind {
    pub fn descriptor(&self) -> &'static SourceFormat {
        match self {
            SourceKind::Revolut => &REVOLUT,
            SourceKind::Generic => &GENERIC,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descriptor().name)
    }
}

/// A row that was dropped with a warning
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    pub line: usize,
    pub ticker: String,
    pub reason: FilterReason,
}

/// Outcome of importing one export file
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Trades in file order
    pub transactions: Vec<Transaction>,
    /// Rows dropped because a numeric cell was unreadable
    pub skipped: Vec<SkippedRow>,
    /// Non-trade rows (dividends, fees, top-ups)
    pub ignored: usize,
}

/// Normalize already-read rows; the first fatal row aborts the import
pub fn normalize_rows(
    rows: &[RawRow],
    format: &SourceFormat,
    tolerance: Decimal,
) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    for row in rows {
        match normalize_row(row, format, tolerance)? {
            Normalized::Trade(transaction) => report.transactions.push(transaction),
            Normalized::Filtered(FilterReason::UnmappedType(_)) => report.ignored += 1,
            Normalized::Filtered(reason) => report.skipped.push(SkippedRow {
                line: row.line,
                ticker: row.get(format.columns.ticker).trim().to_string(),
                reason,
            }),
        }
    }

    Ok(report)
}

/// Import an activity export with the given descriptor
pub fn import_file<P: AsRef<Path>>(
    path: P,
    format: &SourceFormat,
    tolerance: Decimal,
) -> Result<ImportReport> {
    let path = path.as_ref();
    info!("Importing {} activity file: {:?}", format.name, path);

    let rows = read_activity_csv(path, format)?;
    let report = normalize_rows(&rows, format, tolerance)?;

    info!(
        "Normalized {} trades ({} non-trade rows ignored, {} skipped)",
        report.transactions.len(),
        report.ignored,
        report.skipped.len()
    );
    Ok(report)
}
