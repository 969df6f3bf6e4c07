use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical trade direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Buy,
    Sell,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Buy => "BUY",
            TransactionKind::Sell => "SELL",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(TransactionKind::Buy),
            "SELL" => Ok(TransactionKind::Sell),
            _ => Err(()),
        }
    }
}

/// A buy or sell lot after normalization
///
/// `quantity`, `unit_price` and `total` are non-negative; the direction lives
/// in `kind` only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub ticker: String,
    pub date: NaiveDate,
    pub kind: TransactionKind,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total: Decimal,
    pub currency: String,
    /// 1-based line of the source export, for error reporting
    pub line: usize,
}

impl Transaction {
    pub fn is_sell(&self) -> bool {
        self.kind == TransactionKind::Sell
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str_is_case_insensitive() {
        assert_eq!(TransactionKind::from_str(" buy "), Ok(TransactionKind::Buy));
        assert_eq!(TransactionKind::from_str("SELL"), Ok(TransactionKind::Sell));
        assert!(TransactionKind::from_str("DIVIDEND").is_err());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(TransactionKind::Sell.to_string(), "SELL");
    }
}
