//! Rate/date token scanner.
//!
//! Pulls reference rate, spread, floor, PIK, interest rate and up to two
//! dates out of a bounded text window. Alternatives are tried in a fixed
//! priority order (labelled before bare) and the first success per token
//! type wins. Every consumed span is recorded so callers can cut the
//! tokens out of the text before segmenting what is left.

use tracing::trace;

use super::dates::{classify_single_date, parse_date, DateExtractor, DateRole, LabelledDateExtractor};
use super::patterns::{
    BARE_PERCENT, FLOOR_RATE, INTEREST_RATE, PIK_RATE, REFERENCE_SPREAD, SPREAD_LABELLED,
};
use super::rates::{format_percent_text, ReferenceRate, ReferenceRateExtractor};
use super::FieldExtractor;

/// Default number of characters inspected on each side of a lone date.
pub const DEFAULT_DATE_WINDOW: usize = 50;

/// Tokens found in one text window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub reference_rate: Option<ReferenceRate>,
    pub spread: Option<String>,
    pub floor_rate: Option<String>,
    pub pik_rate: Option<String>,
    pub interest_rate: Option<String>,
    pub acquisition_date: Option<String>,
    pub maturity_date: Option<String>,
    spans: Vec<(usize, usize)>,
}

impl ScanResult {
    /// Byte spans consumed by matched tokens, in match order.
    pub fn spans(&self) -> &[(usize, usize)] {
        &self.spans
    }

    /// Whether nothing was found.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// The scanned text with every consumed span blanked out.
    ///
    /// Byte offsets are preserved, so spans found in the masked text line up
    /// with the original.
    pub fn mask(&self, text: &str) -> String {
        let mut masked = text.to_string();
        for &(start, end) in &self.spans {
            blank(&mut masked, start, end);
        }
        masked
    }

    /// Reference rate as its canonical label.
    pub fn reference_label(&self) -> Option<String> {
        self.reference_rate.map(|r| r.label().to_string())
    }

    fn set_date(&mut self, role: DateRole, date: &str) {
        let slot = match role {
            DateRole::Acquisition => &mut self.acquisition_date,
            DateRole::Maturity => &mut self.maturity_date,
        };
        if slot.is_none() {
            *slot = Some(date.to_string());
        }
    }
}

/// Scanner over rate and date tokens.
#[derive(Debug, Clone)]
pub struct TokenScanner {
    date_window: usize,
}

impl TokenScanner {
    pub fn new() -> Self {
        Self {
            date_window: DEFAULT_DATE_WINDOW,
        }
    }

    /// Set how many characters around a lone date are searched for
    /// acquisition wording.
    pub fn with_date_window(mut self, window: usize) -> Self {
        self.date_window = window;
        self
    }

    /// Scan a text window.
    pub fn scan(&self, text: &str) -> ScanResult {
        let mut result = ScanResult::default();
        let mut masked = text.to_string();

        // "SOFR + 5.50%" before any bare reference or percent
        if let Some(caps) = REFERENCE_SPREAD.captures(&masked) {
            let full = caps.get(0).map(|m| (m.start(), m.end()));
            let reference = caps
                .name("reference")
                .and_then(|m| ReferenceRate::from_token(m.as_str()));
            let spread = caps
                .name("spread")
                .and_then(|m| format_percent_text(&format!("{}%", m.as_str())));
            if let (Some(span), Some(reference)) = (full, reference) {
                result.reference_rate = Some(reference);
                result.spread = spread;
                consume(&mut result, &mut masked, span);
            }
        }

        if let Some((rate, span)) = capture_rate(&PIK_RATE, &masked) {
            result.pik_rate = Some(rate);
            consume(&mut result, &mut masked, span);
        }

        if let Some((rate, span)) = capture_rate(&FLOOR_RATE, &masked) {
            result.floor_rate = Some(rate);
            consume(&mut result, &mut masked, span);
        }

        if result.spread.is_none() {
            if let Some((rate, span)) = capture_rate(&SPREAD_LABELLED, &masked) {
                result.spread = Some(rate);
                consume(&mut result, &mut masked, span);
            }
        }

        if let Some((rate, span)) = capture_rate(&INTEREST_RATE, &masked) {
            result.interest_rate = Some(rate);
            consume(&mut result, &mut masked, span);
        }

        if result.reference_rate.is_none() {
            if let Some(found) = ReferenceRateExtractor.extract(&masked) {
                result.reference_rate = Some(found.value);
                consume(&mut result, &mut masked, found.position);
            }
        }

        // Leftover percentages: the first one is the coupon if none was labelled.
        let leftovers: Vec<_> = BARE_PERCENT
            .captures_iter(&masked)
            .filter_map(|caps| {
                let full = caps.get(0)?;
                let rate = format_percent_text(&format!("{}%", caps.name("rate")?.as_str()))?;
                Some((rate, (full.start(), full.end())))
            })
            .collect();
        for (rate, span) in leftovers {
            if result.interest_rate.is_none() {
                result.interest_rate = Some(rate);
            }
            consume(&mut result, &mut masked, span);
        }

        for found in LabelledDateExtractor.extract_all(&masked) {
            let (role, date) = &found.value;
            result.set_date(*role, date);
            consume(&mut result, &mut masked, found.position);
        }

        self.scan_bare_dates(&mut masked, &mut result);

        trace!(tokens = result.spans.len(), "scanned text window");
        result
    }

    fn scan_bare_dates(&self, masked: &mut String, result: &mut ScanResult) {
        let dates = DateExtractor::new().extract_all(masked.as_str());

        match dates.as_slice() {
            [] => {}
            [single] => {
                // Labels already consumed are blanked, so they cannot sway the window.
                let role = classify_single_date(masked.as_str(), single.start(), single.end(), self.date_window);
                let other = match role {
                    DateRole::Acquisition => DateRole::Maturity,
                    DateRole::Maturity => DateRole::Acquisition,
                };
                let taken = match role {
                    DateRole::Acquisition => result.acquisition_date.is_some(),
                    DateRole::Maturity => result.maturity_date.is_some(),
                };
                result.set_date(if taken { other } else { role }, &single.value);
            }
            many => {
                let earliest = many
                    .iter()
                    .min_by_key(|d| parse_date(&d.value))
                    .map(|d| d.value.clone());
                let latest = many
                    .iter()
                    .rev()
                    .max_by_key(|d| parse_date(&d.value))
                    .map(|d| d.value.clone());
                if let Some(earliest) = earliest {
                    result.set_date(DateRole::Acquisition, &earliest);
                }
                if let Some(latest) = latest {
                    result.set_date(DateRole::Maturity, &latest);
                }
            }
        }

        for date in dates {
            consume(result, masked, date.position);
        }
    }
}

impl Default for TokenScanner {
    fn default() -> Self {
        Self::new()
    }
}

fn capture_rate(pattern: &regex::Regex, text: &str) -> Option<(String, (usize, usize))> {
    let caps = pattern.captures(text)?;
    let full = caps.get(0)?;
    let number = ["lead", "trail", "spread", "rate"]
        .iter()
        .find_map(|name| caps.name(name))?;
    let rate = format_percent_text(&format!("{}%", number.as_str()))?;
    Some((rate, (full.start(), full.end())))
}

fn consume(result: &mut ScanResult, masked: &mut String, (start, end): (usize, usize)) {
    blank(masked, start, end);
    result.spans.push((start, end));
}

fn blank(text: &mut String, start: usize, end: usize) {
    if start < end && end <= text.len() && text.is_char_boundary(start) && text.is_char_boundary(end) {
        text.replace_range(start..end, &" ".repeat(end - start));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reference_spread_and_labelled_tokens() {
        let text = "SOFR + 5.50% Interest Rate 11.16% Maturity Date 3/1/2029, Healthcare Widget Co, LLC";
        let result = TokenScanner::new().scan(text);

        assert_eq!(result.reference_rate, Some(ReferenceRate::Sofr));
        assert_eq!(result.spread.as_deref(), Some("5.5%"));
        assert_eq!(result.interest_rate.as_deref(), Some("11.16%"));
        assert_eq!(result.maturity_date.as_deref(), Some("3/1/2029"));
        assert_eq!(result.acquisition_date, None);

        let masked = result.mask(text);
        assert_eq!(masked.trim_start(), ", Healthcare Widget Co, LLC");
        assert_eq!(masked.len(), text.len());
    }

    #[test]
    fn test_floor_and_pik() {
        let text = "Acme LLC, First Lien Term Loan, S + 6.25% (1.00% Floor, 2.00% PIK)";
        let result = TokenScanner::new().scan(text);

        assert_eq!(result.reference_rate, Some(ReferenceRate::Sofr));
        assert_eq!(result.spread.as_deref(), Some("6.25%"));
        assert_eq!(result.floor_rate.as_deref(), Some("1%"));
        assert_eq!(result.pik_rate.as_deref(), Some("2%"));
        assert_eq!(result.interest_rate, None);
    }

    #[test]
    fn test_two_bare_dates_ordered_by_value() {
        let text = "Acme LLC Term Loan 6/30/2028 1/15/2022";
        let result = TokenScanner::new().scan(text);

        assert_eq!(result.acquisition_date.as_deref(), Some("1/15/2022"));
        assert_eq!(result.maturity_date.as_deref(), Some("6/30/2028"));
    }

    #[test]
    fn test_single_bare_date_defaults_to_maturity() {
        let result = TokenScanner::new().scan("Acme LLC Term Loan 6/30/2028");
        assert_eq!(result.maturity_date.as_deref(), Some("6/30/2028"));
        assert_eq!(result.acquisition_date, None);

        let result = TokenScanner::new().scan("Acme LLC common units, initial purchase 6/30/2021");
        assert_eq!(result.acquisition_date.as_deref(), Some("6/30/2021"));
        assert_eq!(result.maturity_date, None);
    }

    #[test]
    fn test_labelled_date_beats_bare_date() {
        let text = "Acquisition Date 2/1/2021 Acme LLC 6/30/2028";
        let result = TokenScanner::new().scan(text);
        assert_eq!(result.acquisition_date.as_deref(), Some("2/1/2021"));
        assert_eq!(result.maturity_date.as_deref(), Some("6/30/2028"));
    }

    #[test]
    fn test_bare_percent_becomes_interest_rate() {
        let result = TokenScanner::new().scan("Acme LLC, Senior Notes, 7.875%, due 2029-04-15");
        assert_eq!(result.interest_rate.as_deref(), Some("7.875%"));
        assert_eq!(result.maturity_date.as_deref(), Some("2029-04-15"));
    }

    #[test]
    fn test_nothing_found() {
        let result = TokenScanner::new().scan("Acme Holdings LLC");
        assert!(result.is_empty());
        assert_eq!(result.mask("Acme Holdings LLC"), "Acme Holdings LLC");
    }
}
