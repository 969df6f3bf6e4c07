//! Lot conversion into EUR
//!
//! Applies the resolved daily rate to a transaction's unit price. Prices and
//! quantities leave this module with exactly four decimal places, the
//! precision of the KDVP schema.

use anyhow::Result;
use clap::ValueEnum;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;

use crate::error::FilingError;
use crate::models::Transaction;
use crate::rates::{RateResolver, RateSource};

/// Decimal places of quantities and EUR prices in the filing
pub const FILING_SCALE: u32 = 4;

/// How values are brought to [`FILING_SCALE`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoundingPolicy {
    /// Banker's rounding: ties go to the even digit
    #[default]
    HalfEven,
    /// Drop extra digits
    Truncate,
}

impl RoundingPolicy {
    fn strategy(&self) -> RoundingStrategy {
        match self {
            RoundingPolicy::HalfEven => RoundingStrategy::MidpointNearestEven,
            RoundingPolicy::Truncate => RoundingStrategy::ToZero,
        }
    }

    /// Round to the filing scale and pad so `10` renders as `10.0000`
    pub fn apply(&self, value: Decimal) -> Decimal {
        let mut rounded = value.round_dp_with_strategy(FILING_SCALE, self.strategy());
        rounded.rescale(FILING_SCALE);
        rounded
    }
}

/// A transaction with its EUR valuation
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedRow {
    pub transaction: Transaction,
    /// Quantity at filing precision
    pub quantity: Decimal,
    pub price_eur: Decimal,
}

/// Value one transaction in EUR
pub fn convert<S: RateSource>(
    transaction: &Transaction,
    resolver: &RateResolver<S>,
    policy: RoundingPolicy,
) -> Result<ConvertedRow> {
    let price_eur = if resolver.is_domestic(&transaction.currency) {
        transaction.unit_price
    } else {
        let rate = resolver
            .resolve(transaction.date, &transaction.currency)?
            .ok_or_else(|| FilingError::MissingRate {
                ticker: transaction.ticker.clone(),
                date: transaction.date,
                currency: transaction.currency.clone(),
            })?;
        let value = transaction.unit_price.checked_mul(rate).ok_or_else(|| {
            FilingError::InvalidRow {
                line: transaction.line,
                reason: format!(
                    "{} on {}: EUR value of price {} is out of range",
                    transaction.ticker, transaction.date, transaction.unit_price
                ),
            }
        })?;
        policy.apply(value)
    };

    Ok(ConvertedRow {
        transaction: transaction.clone(),
        quantity: policy.apply(transaction.quantity),
        price_eur,
    })
}

/// Value every transaction; the first missing rate aborts the run
pub fn convert_all<S: RateSource>(
    transactions: &[Transaction],
    resolver: &RateResolver<S>,
    policy: RoundingPolicy,
) -> Result<Vec<ConvertedRow>> {
    transactions
        .iter()
        .map(|tx| convert(tx, resolver, policy))
        .collect()
}
