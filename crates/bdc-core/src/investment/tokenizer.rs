//! Identifier tokenizer: segments one free-text instrument identifier into
//! company, industry, instrument type, dates and rate components.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::record::ParsedIdentifier;

use super::grammar::{CompiledGrammar, Span};
use super::rules::patterns::{
    EMPTY_PARENS, FOOTNOTE, REPEATED_SEPARATORS, SPACE_BEFORE_PUNCT, TRAILING_PARENTHETICAL,
    WHITESPACE,
};
use super::rules::{ScanResult, TokenScanner};

lazy_static! {
    // Loan words left dangling at the end of a company candidate
    static ref INSTRUMENT_FRAGMENT: Regex = Regex::new(
        r"(?i)(?:[\s,;:\-–—]*\b(?:loans?|debt|facility|tranche(?:\s+[a-z0-9]+)?|term)\b)+[\s,;:\-–—]*$"
    ).unwrap();
}

/// Most words walked back from a suffix when recovering a company name.
const RECOVERY_WORDS: usize = 6;

/// Tokenizer for one filer grammar.
#[derive(Debug, Clone)]
pub struct IdentifierTokenizer<'g> {
    grammar: &'g CompiledGrammar,
    scanner: TokenScanner,
}

impl<'g> IdentifierTokenizer<'g> {
    pub fn new(grammar: &'g CompiledGrammar) -> Self {
        Self {
            grammar,
            scanner: TokenScanner::new(),
        }
    }

    /// Use a differently configured token scanner.
    pub fn with_scanner(mut self, scanner: TokenScanner) -> Self {
        self.scanner = scanner;
        self
    }

    /// Segment one identifier. Never fails: whatever cannot be located
    /// stays "Unknown" or absent.
    pub fn tokenize(&self, identifier: &str) -> ParsedIdentifier {
        let cleaned = clean_identifier(identifier);
        let body = self.grammar.strip_boilerplate(&cleaned);

        // Rates and dates are interleaved with everything else; cut them out first.
        let scan = self.scanner.scan(body);
        let masked = scan.mask(body);

        let mut parsed = ParsedIdentifier {
            acquisition_date: scan.acquisition_date.clone(),
            maturity_date: scan.maturity_date.clone(),
            reference_rate: scan.reference_label(),
            spread: scan.spread.clone(),
            floor_rate: scan.floor_rate.clone(),
            pik_rate: scan.pik_rate.clone(),
            interest_rate: scan.interest_rate.clone(),
            ..ParsedIdentifier::default()
        };

        let instrument = self.grammar.find_instrument_type(&masked);
        let remainder = match instrument {
            Some((start, end)) => {
                parsed.instrument_type = tidy(&masked[start..end]);
                tidy(&format!("{}, {}", &masked[..start], &masked[end..]))
            }
            None => {
                let rest = tidy(&masked);
                match self.split_trailing_type(&rest) {
                    Some((head, tail)) => {
                        parsed.instrument_type = tail;
                        head
                    }
                    None => rest,
                }
            }
        };

        let candidate = match self.grammar.find_industry(&remainder) {
            Some((start, end)) => {
                parsed.industry = tidy(&remainder[start..end]);
                tidy(&format!("{}, {}", &remainder[..start], &remainder[end..]))
            }
            None => remainder,
        };

        let mut company = self.clean_company(&candidate);
        if self.grammar.is_low_information(&company) {
            if let Some(recovered) = self.recover_company(body, &scan, instrument) {
                company = recovered;
            }
        }
        if company.chars().any(char::is_alphanumeric) {
            parsed.company_name = company;
        }

        parsed
    }

    /// Lowest-confidence split: the text after the last top-level comma is
    /// the instrument type. A trailing suffix ("Widget Co, LLC") or industry
    /// phrase means there is nothing to split.
    fn split_trailing_type(&self, text: &str) -> Option<(String, String)> {
        let mut depth = 0i32;
        let mut last_comma = None;
        for (i, c) in text.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => depth -= 1,
                ',' if depth <= 0 => last_comma = Some(i),
                _ => {}
            }
        }

        let pos = last_comma?;
        let head = tidy(&text[..pos]);
        let tail = tidy(&text[pos + 1..]);
        if tail.is_empty()
            || !head.chars().any(char::is_alphanumeric)
            || self.grammar.is_suffix(&tail)
            || self.grammar.is_industry_phrase(&tail)
        {
            return None;
        }
        Some((head, tail))
    }

    fn clean_company(&self, text: &str) -> String {
        let mut company = text.to_string();

        let stripped = INSTRUMENT_FRAGMENT.replace(&company, "");
        if stripped.chars().any(char::is_alphanumeric) {
            company = stripped.into_owned();
        }

        while let Some(start) = TRAILING_PARENTHETICAL.find(&company).map(|m| m.start()) {
            if start == 0 {
                break;
            }
            company.truncate(start);
        }

        tidy(self.grammar.strip_prefix_words(&company))
    }

    /// Rebuild a company name from the words in front of a suffix token in
    /// the unstripped identifier.
    fn recover_company(&self, body: &str, scan: &ScanResult, instrument: Option<Span>) -> Option<String> {
        let mut guarded = body.to_string();
        for &(start, end) in scan.spans().iter().chain(instrument.iter()) {
            guard(&mut guarded, start, end);
        }

        for (start, end) in self.grammar.suffixes(&guarded) {
            let head = guarded[..start].trim_end();
            let (head, comma) = match head.strip_suffix(',') {
                Some(head) => (head.trim_end(), ","),
                None => (head, ""),
            };
            let from = head.rfind(['|', ',']).map(|i| i + 1).unwrap_or(0);
            let words: Vec<&str> = head[from..].split_whitespace().collect();
            if words.is_empty() {
                continue;
            }
            let words = &words[words.len().saturating_sub(RECOVERY_WORDS)..];

            let candidate = tidy(&format!("{}{} {}", words.join(" "), comma, &guarded[start..end]));
            if !self.grammar.is_low_information(&candidate) {
                return Some(candidate);
            }
        }
        None
    }
}

fn guard(text: &mut String, start: usize, end: usize) {
    if start < end && end <= text.len() && text.is_char_boundary(start) && text.is_char_boundary(end) {
        text.replace_range(start..end, &"|".repeat(end - start));
    }
}

/// Decode entities, drop footnote markers, collapse whitespace.
pub fn clean_identifier(text: &str) -> String {
    let decoded = decode_entities(text);
    let stripped = FOOTNOTE.replace_all(&decoded, " ");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace('\u{00a0}', " ")
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&#xa0;", " ")
        .replace("&rsquo;", "'")
        .replace("&lsquo;", "'")
        .replace("&#8217;", "'")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&ndash;", "–")
        .replace("&mdash;", "—")
        .replace("&amp;", "&")
}

/// Collapse leftovers of removed spans: empty parentheses, runs of
/// separators, stray spaces and edge punctuation.
pub fn tidy(text: &str) -> String {
    let text = EMPTY_PARENS.replace_all(text, " ");
    let text = WHITESPACE.replace_all(&text, " ");
    let text = REPEATED_SEPARATORS.replace_all(&text, "$1");
    let text = SPACE_BEFORE_PUNCT.replace_all(&text, "$1");
    text.trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-' | '–' | '—'))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokenize(text: &str) -> ParsedIdentifier {
        let grammar = CompiledGrammar::generic().unwrap();
        IdentifierTokenizer::new(&grammar).tokenize(text)
    }

    #[test]
    fn test_industry_prefix_and_labelled_maturity() {
        let parsed = tokenize(
            "Environmental Industries Acme Holdings LLC First Lien Senior Secured Loan Maturity Date 6/30/2028",
        );
        assert_eq!(parsed.company_name, "Acme Holdings LLC");
        assert_eq!(parsed.industry, "Environmental Industries");
        assert_eq!(parsed.instrument_type, "First Lien Senior Secured Loan");
        assert_eq!(parsed.maturity_date.as_deref(), Some("6/30/2028"));
        assert_eq!(parsed.acquisition_date, None);
    }

    #[test]
    fn test_rates_first_then_industry_then_company() {
        let parsed = tokenize(
            "SOFR + 5.50% Interest Rate 11.16% Maturity Date 3/1/2029, Healthcare Widget Co, LLC First Lien Senior Secured Loan",
        );
        assert_eq!(parsed.reference_rate.as_deref(), Some("SOFR"));
        assert_eq!(parsed.spread.as_deref(), Some("5.5%"));
        assert_eq!(parsed.interest_rate.as_deref(), Some("11.16%"));
        assert_eq!(parsed.maturity_date.as_deref(), Some("3/1/2029"));
        assert_eq!(parsed.industry, "Healthcare");
        assert_eq!(parsed.company_name, "Widget Co, LLC");
    }

    #[test]
    fn test_boilerplate_and_comma_separated_segments() {
        let parsed = tokenize(
            "Investment, Non-Affiliated Issuer, Acme LLC, Software, First Lien Term Loan, S + 6.25% (1.00% Floor), Maturity 6/30/2028",
        );
        assert_eq!(parsed.company_name, "Acme LLC");
        assert_eq!(parsed.industry, "Software");
        assert_eq!(parsed.instrument_type, "First Lien Term Loan");
        assert_eq!(parsed.reference_rate.as_deref(), Some("SOFR"));
        assert_eq!(parsed.spread.as_deref(), Some("6.25%"));
        assert_eq!(parsed.floor_rate.as_deref(), Some("1%"));
        assert_eq!(parsed.maturity_date.as_deref(), Some("6/30/2028"));
    }

    #[test]
    fn test_entities_and_footnotes() {
        let parsed = tokenize("Smith &amp; Sons Inc. (5) Second Lien Term Loan");
        assert_eq!(parsed.company_name, "Smith & Sons Inc.");
        assert_eq!(parsed.instrument_type, "Second Lien Term Loan");
        assert_eq!(parsed.industry, "Unknown");
    }

    #[test]
    fn test_trailing_segment_fallback() {
        let parsed = tokenize("Acme Widgets LLC, Participation Interest");
        assert_eq!(parsed.company_name, "Acme Widgets LLC");
        assert_eq!(parsed.instrument_type, "Participation Interest");

        let parsed = tokenize("Widget Co, LLC");
        assert_eq!(parsed.company_name, "Widget Co, LLC");
        assert_eq!(parsed.instrument_type, "Unknown");
    }

    #[test]
    fn test_low_information_company_is_recovered() {
        let parsed = tokenize("Healthcare LLC, First Lien Term Loan");
        assert_eq!(parsed.company_name, "Healthcare LLC");
        assert_eq!(parsed.instrument_type, "First Lien Term Loan");
    }

    #[test]
    fn test_revolver_sub_variant_is_kept_whole() {
        let parsed = tokenize("Acme LLC, First Lien Senior Secured Loan - Revolver");
        assert_eq!(parsed.instrument_type, "First Lien Senior Secured Loan - Revolver");
        assert_eq!(parsed.company_name, "Acme LLC");
    }

    #[test]
    fn test_tidy() {
        assert_eq!(tidy("  Acme LLC ,  ( , ) ,, "), "Acme LLC");
        assert_eq!(tidy(", , Widget Co, LLC"), "Widget Co, LLC");
    }
}
