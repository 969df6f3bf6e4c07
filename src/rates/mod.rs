// Rates module - historical EUR exchange rates

pub mod bsi;

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

use crate::error::FilingError;

pub use bsi::{parse_rate_table, BsiRateCache};

/// Anything that can answer "what was the published rate on this day"
///
/// Published rates are quoted as units of `currency` per 1 EUR.
pub trait RateSource {
    fn published_rate(&self, date: NaiveDate, currency: &str) -> Result<Option<Decimal>>;
}

impl<T: RateSource + ?Sized> RateSource for &T {
    fn published_rate(&self, date: NaiveDate, currency: &str) -> Result<Option<Decimal>> {
        (**self).published_rate(date, currency)
    }
}

/// In-memory rate list keyed by publication date and currency code
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateTable {
    rates: HashMap<(NaiveDate, String), Decimal>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, date: NaiveDate, currency: &str, rate: Decimal) {
        self.rates
            .insert((date, currency.to_ascii_uppercase()), rate);
    }

    pub fn with_rate(mut self, date: NaiveDate, currency: &str, rate: Decimal) -> Self {
        self.insert(date, currency, rate);
        self
    }

    pub fn get(&self, date: NaiveDate, currency: &str) -> Option<Decimal> {
        self.rates
            .get(&(date, currency.to_ascii_uppercase()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl RateSource for RateTable {
    fn published_rate(&self, date: NaiveDate, currency: &str) -> Result<Option<Decimal>> {
        Ok(self.get(date, currency))
    }
}

/// Converts published quotes into EUR per unit of native currency
pub struct RateResolver<S> {
    source: S,
    domestic: String,
}

impl<S: RateSource> RateResolver<S> {
    pub fn new(source: S, domestic: impl Into<String>) -> Self {
        Self {
            source,
            domestic: domestic.into().to_ascii_uppercase(),
        }
    }

    pub fn domestic_currency(&self) -> &str {
        &self.domestic
    }

    pub fn is_domestic(&self, currency: &str) -> bool {
        currency.eq_ignore_ascii_case(&self.domestic)
    }

    /// EUR value of one unit of `currency` on `date`
    ///
    /// Returns `None` when nothing was published that exact day; no earlier
    /// business day is substituted.
    pub fn resolve(&self, date: NaiveDate, currency: &str) -> Result<Option<Decimal>> {
        if self.is_domestic(currency) {
            return Ok(Some(Decimal::ONE));
        }

        let Some(published) = self.source.published_rate(date, currency)? else {
            debug!("No {} rate published on {}", currency, date);
            return Ok(None);
        };
        if published.is_zero() {
            return Err(FilingError::RateTable(format!(
                "zero {} rate published on {}",
                currency, date
            ))
            .into());
        }

        Ok(Some(Decimal::ONE / published))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 3, d).unwrap()
    }

    struct PanickingSource;

    impl RateSource for PanickingSource {
        fn published_rate(&self, _: NaiveDate, _: &str) -> Result<Option<Decimal>> {
            panic!("domestic currency must not consult the rate source");
        }
    }

    #[test]
    fn test_domestic_currency_short_circuits() {
        let resolver = RateResolver::new(PanickingSource, "EUR");
        assert_eq!(resolver.resolve(day(6), "eur").unwrap(), Some(Decimal::ONE));
    }

    #[test]
    fn test_resolve_inverts_published_rate() {
        let table = RateTable::new().with_rate(day(1), "USD", dec!(1.25));
        let resolver = RateResolver::new(table, "EUR");
        assert_eq!(resolver.resolve(day(1), "USD").unwrap(), Some(dec!(0.8)));
    }

    #[test]
    fn test_inverse_is_within_decimal_precision() {
        let r = dec!(1.2034);
        let table = RateTable::new().with_rate(day(1), "USD", r);
        let resolver = RateResolver::new(table, "EUR");
        let inverse = resolver.resolve(day(1), "USD").unwrap().unwrap();
        assert!((inverse * r - Decimal::ONE).abs() < dec!(0.000000000000000000001));
    }

    #[test]
    fn test_missing_date_is_not_substituted() {
        let table = RateTable::new().with_rate(day(5), "USD", dec!(1.19));
        let resolver = RateResolver::new(table, "EUR");
        // Saturday: nothing published, Friday's rate is not used
        assert_eq!(resolver.resolve(day(6), "USD").unwrap(), None);
        assert_eq!(resolver.resolve(day(5), "GBP").unwrap(), None);
    }

    #[test]
    fn test_zero_rate_is_a_data_error() {
        let table = RateTable::new().with_rate(day(1), "USD", Decimal::ZERO);
        let resolver = RateResolver::new(table, "EUR");
        assert!(resolver.resolve(day(1), "USD").is_err());
    }

    #[test]
    fn test_table_keys_are_case_insensitive() {
        let table = RateTable::new().with_rate(day(1), "usd", dec!(1.1));
        assert_eq!(table.get(day(1), "USD"), Some(dec!(1.1)));
        assert_eq!(table.len(), 1);
    }
}
