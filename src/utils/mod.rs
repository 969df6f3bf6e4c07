//! Utility functions for formatting
//!
//! Display helpers using Slovenian number conventions. Filing values
//! written to XML never go through here; they keep the plain `1234.5000`
//! form the schema expects.

use rust_decimal::{Decimal, RoundingStrategy};

/// Currency symbol options for formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencySymbol {
    /// Append " €"
    Eur,
    /// No currency symbol (for table cells)
    None,
}

/// Core formatting function with full control over output.
///
/// Formats a Decimal value using Slovenian locale conventions:
/// - Thousands separator: `.` (period)
/// - Decimal separator: `,` (comma)
///
/// `places` digits are kept after the decimal separator, rounding
/// half away from zero.
///
/// # Examples
/// ```
/// use kdvp::utils::{format_decimal_with, CurrencySymbol};
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_decimal_with(dec!(1234.56), 2, CurrencySymbol::Eur), "1.234,56 €");
/// assert_eq!(format_decimal_with(dec!(93.5), 4, CurrencySymbol::None), "93,5000");
/// ```
pub fn format_decimal_with(value: Decimal, places: u32, symbol: CurrencySymbol) -> String {
    let is_negative = value < Decimal::ZERO;
    let mut abs_value = value
        .abs()
        .round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
    abs_value.rescale(places);

    let formatted = abs_value.to_string();
    let (integer_part, decimal_part) = match formatted.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (formatted.as_str(), None),
    };

    // Thousands separators on the integer part
    let with_separators: String = integer_part
        .chars()
        .rev()
        .enumerate()
        .flat_map(|(i, c)| {
            if i > 0 && i % 3 == 0 {
                vec!['.', c]
            } else {
                vec![c]
            }
        })
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    let sign = if is_negative && !abs_value.is_zero() { "-" } else { "" };
    let suffix = match symbol {
        CurrencySymbol::Eur => " €",
        CurrencySymbol::None => "",
    };

    match decimal_part {
        Some(frac) => format!("{}{},{}{}", sign, with_separators, frac, suffix),
        None => format!("{}{}{}", sign, with_separators, suffix),
    }
}

/// Format an EUR amount at filing precision: "1.234,5000 €"
///
/// # Examples
/// ```
/// use kdvp::utils::format_eur;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_eur(dec!(85)), "85,0000 €");
/// ```
pub fn format_eur(value: Decimal) -> String {
    format_decimal_with(value, 4, CurrencySymbol::Eur)
}

/// Format a quantity for display: "1.250,5"
///
/// Trailing zeros after the decimal separator are dropped.
pub fn format_quantity(value: Decimal) -> String {
    let normalized = value.normalize();
    format_decimal_with(normalized, normalized.scale(), CurrencySymbol::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_format_eur_basic() {
        assert_eq!(format_eur(dec!(1234.56)), "1.234,5600 €");
        assert_eq!(format_eur(dec!(0.99)), "0,9900 €");
        assert_eq!(format_eur(dec!(1000000)), "1.000.000,0000 €");
    }

    fn plain(value: Decimal) -> String {
        format_decimal_with(value, 2, CurrencySymbol::None)
    }

    #[test]
    fn test_format_large_values() {
        assert_eq!(plain(dec!(1000)), "1.000,00");
        assert_eq!(plain(dec!(123456)), "123.456,00");
        assert_eq!(plain(dec!(12345678.90)), "12.345.678,90");
    }

    #[test]
    fn test_format_negative() {
        assert_eq!(plain(dec!(-1234.56)), "-1.234,56");
        assert_eq!(plain(dec!(-0.001)), "0,00");
    }

    #[test]
    fn test_precision() {
        assert_eq!(plain(dec!(1.234)), "1,23");
        assert_eq!(plain(dec!(1.235)), "1,24");
        assert_eq!(format_decimal_with(dec!(7), 0, CurrencySymbol::None), "7");
    }

    #[test]
    fn test_format_quantity() {
        assert_eq!(format_quantity(dec!(10.0000)), "10");
        assert_eq!(format_quantity(dec!(1250.5000)), "1.250,5");
    }
}
