//! Lenient number parsing for price-list cells.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

const STRIP_TOKENS: [&str; 5] = ["₺", "TRY", "TL", "%", "\u{a0}"];

/// Parses a price or rate, rounding to 2 decimal places.
///
/// Accepts `1234.5`, `1.234,50`, `1,234.50`, `%18`, `18%` and `₺`/`TL`
/// markers. A lone comma is the decimal separator. Anything else is `None`.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let mut text = raw.trim().to_string();
    for token in STRIP_TOKENS {
        text = text.replace(token, "");
    }
    let text: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if text.is_empty() {
        return None;
    }

    let normalized = match (text.rfind(','), text.rfind('.')) {
        // Both present: the later one is the decimal separator.
        (Some(comma), Some(dot)) if comma > dot => text.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => text.replace(',', ""),
        (Some(_), None) if text.matches(',').count() == 1 => text.replace(',', "."),
        (Some(_), None) => text.replace(',', ""),
        (None, Some(_)) if text.matches('.').count() > 1 => text.replace('.', ""),
        _ => text,
    };

    Decimal::from_str(&normalized)
        .ok()
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_plain_and_locale_formats() {
        assert_eq!(parse_decimal("1234.5"), Some(dec("1234.5")));
        assert_eq!(parse_decimal("1.234,50"), Some(dec("1234.50")));
        assert_eq!(parse_decimal("1,234.50"), Some(dec("1234.50")));
        assert_eq!(parse_decimal("12,5"), Some(dec("12.5")));
        assert_eq!(parse_decimal("1.234.567"), Some(dec("1234567")));
        assert_eq!(parse_decimal("-3"), Some(dec("-3")));
    }

    #[test]
    fn test_currency_and_percent_markers() {
        assert_eq!(parse_decimal("%18"), Some(dec("18")));
        assert_eq!(parse_decimal("18 %"), Some(dec("18")));
        assert_eq!(parse_decimal("₺ 1.250,00"), Some(dec("1250")));
        assert_eq!(parse_decimal("99,90 TL"), Some(dec("99.90")));
    }

    #[test]
    fn test_rounds_to_two_places() {
        assert_eq!(parse_decimal("10.555"), Some(dec("10.56")));
    }

    #[test]
    fn test_invalid_is_none() {
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("  "), None);
        assert_eq!(parse_decimal("abc"), None);
        assert_eq!(parse_decimal("TL"), None);
        assert_eq!(parse_decimal("12a"), None);
    }
}
