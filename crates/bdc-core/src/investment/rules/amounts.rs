//! Monetary amount parsing for fact payloads and table cells.

use rust_decimal::Decimal;
use std::str::FromStr;

use super::patterns::{FOOTNOTE, MONEY};

/// Parse an amount such as `"1,234,567"`, `"$ 1,234.50"` or `"(1,234)"`.
///
/// Placeholder cells (empty, a lone currency symbol, dashes) and anything
/// that is not purely numeric (percentages, dates) are absent, never zero.
pub fn parse_amount(text: &str) -> Option<Decimal> {
    // "(123)" is a negative amount; only a marker trailing a value is a footnote.
    parse_money(text).or_else(|| parse_money(&FOOTNOTE.replace_all(text, "")))
}

fn parse_money(text: &str) -> Option<Decimal> {
    let cleaned = text.trim().replace(['\u{00a0}', ' '], "");

    let caps = MONEY.captures(&cleaned)?;
    let digits = caps.name("num")?.as_str().replace(',', "");
    let value = Decimal::from_str(&digits).ok()?;

    let negative = caps.name("neg").is_some() || (cleaned.starts_with('(') && cleaned.ends_with(')'));
    Some(if negative { -value } else { value })
}

/// Parse an amount and apply a declared power-of-ten scale.
pub fn parse_scaled_amount(text: &str, scale: Option<i32>) -> Option<Decimal> {
    let amount = parse_amount(text)?;
    match scale {
        Some(scale) => apply_scale(amount, scale),
        None => Some(amount),
    }
}

/// Largest power of ten a `Decimal` mantissa can hold.
const MAX_SCALE: u32 = 28;

/// Multiply by `10^scale`; `None` on overflow or an out-of-range scale.
pub fn apply_scale(amount: Decimal, scale: i32) -> Option<Decimal> {
    let exponent = scale.unsigned_abs();
    if exponent > MAX_SCALE {
        return None;
    }
    let factor = Decimal::from_i128_with_scale(10i128.pow(exponent), 0);
    if scale >= 0 {
        amount.checked_mul(factor)
    } else {
        amount.checked_div(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1,234,567"), Some(dec("1234567")));
        assert_eq!(parse_amount("$ 1,234.50"), Some(dec("1234.50")));
        assert_eq!(parse_amount("$1,000"), Some(dec("1000")));
        assert_eq!(parse_amount("(1,234)"), Some(dec("-1234")));
        assert_eq!(parse_amount("-500"), Some(dec("-500")));
        assert_eq!(parse_amount("950,000 (4)"), Some(dec("950000")));
    }

    #[test]
    fn test_placeholders_are_absent() {
        for placeholder in ["", "$", "—", "-", "–", " $ ", "N/A"] {
            assert_eq!(parse_amount(placeholder), None, "{placeholder:?}");
        }
    }

    #[test]
    fn test_non_monetary_cells_are_rejected() {
        assert_eq!(parse_amount("5.50%"), None);
        assert_eq!(parse_amount("6/30/2028"), None);
        assert_eq!(parse_amount("SOFR + 5.50%"), None);
    }

    #[test]
    fn test_zero_is_distinct_from_absent() {
        assert_eq!(parse_amount("0"), Some(Decimal::ZERO));
    }

    #[test]
    fn test_scale_factor() {
        assert_eq!(parse_scaled_amount("1,250", Some(3)), Some(dec("1250000")));
        assert_eq!(parse_scaled_amount("8.25", Some(-2)), Some(dec("0.0825")));
        assert_eq!(parse_scaled_amount("1,250", None), Some(dec("1250")));
        assert_eq!(parse_scaled_amount("(5)", Some(3)), Some(dec("-5000")));
    }

    #[test]
    fn test_out_of_range_scale_is_absent() {
        assert_eq!(parse_scaled_amount("1", Some(29)), None);
        assert_eq!(parse_scaled_amount("1", Some(30)), None);
        assert_eq!(parse_scaled_amount("1", Some(-30)), None);
        assert_eq!(apply_scale(dec("79228162514"), 28), None);
        assert_eq!(apply_scale(dec("1"), 28), Some(dec("10000000000000000000000000000")));
    }
}
