//! Output formatting module for CLI display
//!
//! This module handles all terminal output formatting, separating
//! the concerns of building the filing from presentation.

use colored::Colorize;
use std::path::Path;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use kdvp::filing::{FilingDocument, FilingWarning, RowEntry};
use kdvp::utils::{format_eur, format_quantity};

/// Format the rows of a filing for terminal table output
pub fn format_filing_table(document: &FilingDocument) -> String {
    #[derive(Tabled)]
    struct FilingRowView {
        #[tabled(rename = "ID")]
        id: u32,
        #[tabled(rename = "Security")]
        ticker: String,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Type")]
        kind: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Price (EUR)")]
        price: String,
    }

    let rows: Vec<FilingRowView> = document
        .items
        .iter()
        .flat_map(|item| {
            item.rows.iter().map(move |row| {
                let (date, kind, quantity, price) = match &row.entry {
                    RowEntry::Purchase {
                        date,
                        quantity,
                        price_eur,
                        ..
                    } => (date, "Purchase".green().to_string(), quantity, price_eur),
                    RowEntry::Sale {
                        date,
                        quantity,
                        price_eur,
                        ..
                    } => (date, "Sale".red().to_string(), quantity, price_eur),
                };
                FilingRowView {
                    id: row.id,
                    ticker: item.ticker.clone(),
                    date: date.format("%d.%m.%Y").to_string(),
                    kind,
                    quantity: format_quantity(*quantity),
                    price: format_eur(*price),
                }
            })
        })
        .collect();

    let header = format!(
        "\n{} Doh-KDVP {} ({} securities, {} rows)\n\n",
        "📄".cyan().bold(),
        document.header.fields.period.year,
        document.header.security_count,
        rows.len()
    );

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(4..), Alignment::right());

    format!("{}{}\n", header, table)
}

/// Format accumulated warnings, one per line
pub fn format_warnings(warnings: &[FilingWarning]) -> String {
    warnings
        .iter()
        .map(|w| format_notice(&w.to_string()))
        .collect()
}

pub fn format_notice(message: &str) -> String {
    format!("{} {}\n", "[WARNING]".yellow().bold(), message)
}

/// Format the success line after writing the document
pub fn format_written(document: &FilingDocument, path: &Path) -> String {
    format!(
        "{} Wrote {} securities ({} rows) to {}\n",
        "✓".green().bold(),
        document.header.security_count,
        document.row_count(),
        path.display()
    )
}

/// Format the dry-run notice
pub fn format_dry_run() -> String {
    format!("{} Dry run - no file written\n", "ℹ".blue().bold())
}
