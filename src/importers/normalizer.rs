//! Record normalization
//!
//! Turns one raw export row into a canonical [`Transaction`], or explains why
//! the row is not a trade. Only corrupted input (bad dates, rows whose
//! quantity and price do not add up to the total) is fatal; non-trade
//! activity and unreadable numbers are filtered.

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{debug, warn};

use super::{RawRow, SourceFormat};
use crate::error::FilingError;
use crate::models::{Transaction, TransactionKind};

/// Why a row was not turned into a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterReason {
    /// Dividends, fees, top-ups and other non-trade labels
    UnmappedType(String),
    /// A numeric cell that could not be read
    MissingNumber { column: String, value: String },
}

impl std::fmt::Display for FilterReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterReason::UnmappedType(label) => write!(f, "not a trade: '{}'", label),
            FilterReason::MissingNumber { column, value } => {
                write!(f, "unreadable {} '{}'", column, value)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Trade(Transaction),
    Filtered(FilterReason),
}

/// Normalize a single row
pub fn normalize_row(row: &RawRow, format: &SourceFormat, tolerance: Decimal) -> Result<Normalized> {
    let cols = &format.columns;
    let ticker = row.get(cols.ticker).trim().to_uppercase();

    let raw_date = row.get(cols.date);
    let date = parse_trade_date(raw_date, format.date_format).ok_or_else(|| {
        FilingError::InvalidDate {
            line: row.line,
            ticker: if ticker.is_empty() {
                "-".to_string()
            } else {
                ticker.clone()
            },
            value: raw_date.to_string(),
            format: format.date_format.to_string(),
        }
    })?;

    let label = row.get(cols.kind).trim();
    let Some(mut kind) = classify(label, format) else {
        debug!("Line {}: ignoring non-trade activity '{}'", row.line, label);
        return Ok(Normalized::Filtered(FilterReason::UnmappedType(
            label.to_string(),
        )));
    };

    let mut amounts = [Decimal::ZERO; 3];
    for (slot, column) in amounts
        .iter_mut()
        .zip([cols.quantity, cols.price, cols.total])
    {
        let raw = row.get(column);
        match parse_amount(raw, format.decimal_separator) {
            Some(value) => *slot = value,
            None => {
                warn!(
                    "Line {}: skipping {} {} on {}: unreadable {} '{}'",
                    row.line, kind, ticker, date, column, raw
                );
                return Ok(Normalized::Filtered(FilterReason::MissingNumber {
                    column: column.to_string(),
                    value: raw.to_string(),
                }));
            }
        }
    }
    let [quantity, unit_price, total] = amounts;

    if ticker.is_empty() {
        return Err(FilingError::InvalidRow {
            line: row.line,
            reason: format!("{} on {} has no symbol", kind, date),
        }
        .into());
    }
    if unit_price.is_sign_negative() && !unit_price.is_zero() {
        return Err(FilingError::InvalidRow {
            line: row.line,
            reason: format!("{} on {} has negative price {}", ticker, date, unit_price),
        }
        .into());
    }

    if quantity.is_sign_negative() && !quantity.is_zero() {
        debug!("Line {}: negative quantity {} read as a disposal", row.line, quantity);
        kind = TransactionKind::Sell;
    }
    let quantity = quantity.abs();
    let total = total.abs();

    check_consistency(row.line, &ticker, date, quantity, unit_price, total, tolerance)?;

    Ok(Normalized::Trade(Transaction {
        ticker,
        date,
        kind,
        quantity,
        unit_price,
        total,
        currency: row.get(cols.currency).trim().to_uppercase(),
        line: row.line,
    }))
}

fn classify(label: &str, format: &SourceFormat) -> Option<TransactionKind> {
    format
        .vocabulary
        .iter()
        .find(|(vendor, _)| *vendor == label)
        .or_else(|| {
            format
                .vocabulary
                .iter()
                .find(|(vendor, _)| vendor.eq_ignore_ascii_case(label))
        })
        .map(|(_, kind)| *kind)
        .or_else(|| TransactionKind::from_str(label).ok())
}

/// Reject rows where quantity x price drifts from the stated total
pub fn check_consistency(
    line: usize,
    ticker: &str,
    date: NaiveDate,
    quantity: Decimal,
    price: Decimal,
    total: Decimal,
    tolerance: Decimal,
) -> Result<()> {
    let Some(expected) = quantity.checked_mul(price) else {
        return Err(FilingError::InvalidRow {
            line,
            reason: format!(
                "{} on {}: quantity {} x price {} is out of range",
                ticker, date, quantity, price
            ),
        }
        .into());
    };
    let out_of_tolerance = expected
        .checked_sub(total)
        .map_or(true, |diff| diff.abs() > tolerance);
    if out_of_tolerance {
        return Err(FilingError::Inconsistent {
            ticker: ticker.to_string(),
            date,
            quantity,
            price,
            expected,
            total,
        }
        .into());
    }
    Ok(())
}

/// Strict date parse; a trailing time component is allowed
pub fn parse_trade_date(raw: &str, format: &str) -> Option<NaiveDate> {
    let (date, rest) = NaiveDate::parse_and_remainder(raw.trim(), format).ok()?;
    if rest.is_empty() || rest.starts_with(|c: char| c == ' ' || c == 'T') {
        Some(date)
    } else {
        None
    }
}

/// Parse a money or quantity cell, tolerating currency symbols and
/// thousands separators
///
/// A thousands separator is only accepted between complete three-digit
/// groups of the integer part, so `2,5` in a `.`-decimal export is
/// unreadable rather than 25.
pub fn parse_amount(raw: &str, decimal_separator: char) -> Option<Decimal> {
    let trimmed = raw.trim_matches(|c: char| {
        c.is_whitespace() || c.is_alphabetic() || matches!(c, '$' | '€' | '£')
    });
    let thousands = if decimal_separator == ',' { '.' } else { ',' };

    let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    // "-$12.50" leaves a dangling sign in front of the symbol
    let compact = compact.replace("-$", "-").replace("-€", "-").replace("-£", "-");
    let (sign, body) = match compact.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", compact.as_str()),
    };

    let (integer, fraction) = match body.split_once(decimal_separator) {
        Some((int, frac)) => (int, Some(frac)),
        None => (body, None),
    };
    let integer = strip_grouping(integer, thousands)?;

    let number = match fraction {
        Some(frac) if frac.is_empty() || !frac.chars().all(|c| c.is_ascii_digit()) => return None,
        Some(frac) => format!("{}{}.{}", sign, integer, frac),
        None if integer.is_empty() => return None,
        None => format!("{}{}", sign, integer),
    };
    if !integer.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Decimal::from_str(&number).ok()
}

/// Integer digits with valid thousands grouping removed
fn strip_grouping(integer: &str, separator: char) -> Option<String> {
    if !integer.contains(separator) {
        return Some(integer.to_string());
    }
    let mut groups = integer.split(separator);
    let lead = groups.next()?;
    if lead.is_empty() || lead.len() > 3 {
        return None;
    }
    let mut digits = lead.to_string();
    for group in groups {
        if group.len() != 3 {
            return None;
        }
        digits.push_str(group);
    }
    Some(digits)
}
