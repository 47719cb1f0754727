//! Interest-rate components: reference rates and percent formatting.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

use super::patterns::REFERENCE_BARE;
use super::{ExtractionMatch, FieldExtractor};

/// Benchmark rates a floating-rate instrument can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceRate {
    Sofr,
    Libor,
    Prime,
    Euribor,
    BaseRate,
    FedFunds,
    Cdor,
}

impl ReferenceRate {
    /// Canonical label.
    pub fn label(&self) -> &'static str {
        match self {
            ReferenceRate::Sofr => "SOFR",
            ReferenceRate::Libor => "LIBOR",
            ReferenceRate::Prime => "PRIME",
            ReferenceRate::Euribor => "EURIBOR",
            ReferenceRate::BaseRate => "BASE RATE",
            ReferenceRate::FedFunds => "FED FUNDS",
            ReferenceRate::Cdor => "CDOR",
        }
    }

    /// Recognize a reference-rate token, an abbreviation ("S", "L", "P",
    /// "E") or a taxonomy member name such as
    /// `us-gaap:SecuredOvernightFinancingRateSofrMember`.
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        match token {
            "S" => return Some(ReferenceRate::Sofr),
            "L" => return Some(ReferenceRate::Libor),
            "P" => return Some(ReferenceRate::Prime),
            "E" => return Some(ReferenceRate::Euribor),
            _ => {}
        }

        let key: String = token
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();

        if key.contains("euribor") || key.contains("eurointerbank") {
            Some(ReferenceRate::Euribor)
        } else if key.contains("sofr") || key.contains("securedovernight") {
            Some(ReferenceRate::Sofr)
        } else if key.contains("libor") || key.contains("londoninterbank") {
            Some(ReferenceRate::Libor)
        } else if key.contains("cdor") || key.contains("canadiandealer") {
            Some(ReferenceRate::Cdor)
        } else if key.contains("fedfunds") || key.contains("federalfunds") {
            Some(ReferenceRate::FedFunds)
        } else if key.contains("baserate") || key.contains("alternatebase") {
            Some(ReferenceRate::BaseRate)
        } else if key.contains("prime") {
            Some(ReferenceRate::Prime)
        } else {
            None
        }
    }
}

impl fmt::Display for ReferenceRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Unlabelled reference-rate extractor.
pub struct ReferenceRateExtractor;

impl FieldExtractor for ReferenceRateExtractor {
    type Output = ExtractionMatch<ReferenceRate>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        REFERENCE_BARE
            .captures_iter(text)
            .filter_map(|caps| {
                let full = caps.get(0)?;
                let rate = ReferenceRate::from_token(caps.name("reference")?.as_str())?;
                Some(ExtractionMatch::new(rate, full.start(), full.end(), full.as_str()))
            })
            .collect()
    }
}

/// Render a rate as a percent string with trailing zeros trimmed.
///
/// Values with magnitude at most 1 are read as fractions and scaled by
/// 100, so `0.0825` and `8.25` both render as `"8.25%"`.
pub fn format_percent(value: Decimal) -> String {
    let percent = if value.abs() <= Decimal::ONE {
        value * Decimal::ONE_HUNDRED
    } else {
        value
    };
    format!("{}%", percent.normalize())
}

/// Parse and render percent text.
///
/// Text carrying an explicit `%` is already a percentage and is never
/// rescaled; bare numbers go through [`format_percent`].
pub fn format_percent_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let explicit = trimmed.contains('%');
    let numeric: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    let value = Decimal::from_str(&numeric).ok()?;

    if explicit {
        Some(format!("{}%", value.normalize()))
    } else {
        Some(format_percent(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_percent_scales_fractions() {
        assert_eq!(format_percent(Decimal::new(825, 4)), "8.25%");
        assert_eq!(format_percent(Decimal::new(825, 2)), "8.25%");
        assert_eq!(format_percent_text("8.25"), Some("8.25%".to_string()));
        assert_eq!(format_percent_text("0.0825"), Some("8.25%".to_string()));
        assert_eq!(
            format_percent(Decimal::new(825, 4)),
            format_percent_text("8.25").unwrap()
        );
    }

    #[test]
    fn test_format_percent_trims_trailing_zeros() {
        assert_eq!(format_percent_text("5.50%"), Some("5.5%".to_string()));
        assert_eq!(format_percent_text("11.00 %"), Some("11%".to_string()));
        assert_eq!(format_percent(Decimal::new(1, 2)), "1%");
    }

    #[test]
    fn test_explicit_percent_is_not_rescaled() {
        assert_eq!(format_percent_text("0.75%"), Some("0.75%".to_string()));
        assert_eq!(format_percent_text("n/a"), None);
        assert_eq!(format_percent_text(""), None);
    }

    #[test]
    fn test_reference_rate_tokens() {
        assert_eq!(ReferenceRate::from_token("Term SOFR"), Some(ReferenceRate::Sofr));
        assert_eq!(ReferenceRate::from_token("S"), Some(ReferenceRate::Sofr));
        assert_eq!(
            ReferenceRate::from_token("us-gaap:SecuredOvernightFinancingRateSofrMember"),
            Some(ReferenceRate::Sofr)
        );
        assert_eq!(ReferenceRate::from_token("EURIBOR"), Some(ReferenceRate::Euribor));
        assert_eq!(ReferenceRate::from_token("Prime Rate"), Some(ReferenceRate::Prime));
        assert_eq!(ReferenceRate::from_token("Alternate Base Rate"), Some(ReferenceRate::BaseRate));
        assert_eq!(ReferenceRate::from_token("Federal Funds"), Some(ReferenceRate::FedFunds));
        assert_eq!(ReferenceRate::from_token("Fixed"), None);
    }

    #[test]
    fn test_extract_bare_reference() {
        let found = ReferenceRateExtractor.extract("Acme LLC, 3M Term SOFR floating").unwrap();
        assert_eq!(found.value, ReferenceRate::Sofr);
        assert_eq!(found.source, "3M Term SOFR");
    }
}
