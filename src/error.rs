//! Error handling for the KDVP converter
//!
//! Defines the fatal error taxonomy of a filing run and establishes a unified
//! Result type using anyhow for context chaining and error propagation.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that abort a filing run
///
/// Row-level variants always carry the symbol and date so the offending line
/// of the export can be corrected by hand.
#[derive(Error, Debug)]
pub enum FilingError {
    #[error("line {line}: cannot parse date '{value}' for {ticker} (expected format {format})")]
    InvalidDate {
        line: usize,
        ticker: String,
        value: String,
        format: String,
    },

    #[error("line {line}: invalid row: {reason}")]
    InvalidRow { line: usize, reason: String },

    #[error(
        "{ticker} on {date}: quantity {quantity} x price {price} = {expected} does not match total {total}"
    )]
    Inconsistent {
        ticker: String,
        date: NaiveDate,
        quantity: Decimal,
        price: Decimal,
        expected: Decimal,
        total: Decimal,
    },

    #[error("{ticker} on {date}: no {currency} exchange rate published for that date")]
    MissingRate {
        ticker: String,
        date: NaiveDate,
        currency: String,
    },

    #[error("failed to download exchange rates: {0}")]
    RateFetch(String),

    #[error("invalid exchange rate table: {0}")]
    RateTable(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for filing operations
pub type Result<T> = anyhow::Result<T>;
