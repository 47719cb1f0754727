//! Canonicalization of free-text instrument types, industries and
//! reference rates.
//!
//! Each field has an ordered table of `(pattern, label)` rules evaluated top
//! to bottom; the first match wins and unmatched text passes through
//! unchanged. Tables are ordered most specific first: the revolver and
//! delayed-draw variants of a lien must be tested before the bare lien.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::GrammarError;
use crate::models::record::{is_unknown, InvestmentRecord, ParsedIdentifier};

/// Field a canonicalization table applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    InstrumentType,
    Industry,
    ReferenceRate,
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CanonicalField::InstrumentType => "instrument_type",
            CanonicalField::Industry => "industry",
            CanonicalField::ReferenceRate => "reference_rate",
        };
        f.write_str(name)
    }
}

/// An extra rule supplied through configuration. Extra rules are tested
/// before the built-in table of their field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRule {
    pub field: CanonicalField,
    pub pattern: String,
    pub label: String,
}

/// One ordered `(pattern, label)` table.
#[derive(Debug, Clone, Default)]
pub struct CanonicalTable {
    rules: Vec<(Regex, String)>,
}

impl CanonicalTable {
    fn compile(field: CanonicalField, rules: &[(&str, &str)]) -> Result<Self, GrammarError> {
        let mut table = Self::default();
        for (pattern, label) in rules {
            table.push(field, pattern, label)?;
        }
        Ok(table)
    }

    fn push(&mut self, field: CanonicalField, pattern: &str, label: &str) -> Result<(), GrammarError> {
        let re = Regex::new(&format!("(?i){}", pattern))
            .map_err(|e| GrammarError::invalid(&field.to_string(), pattern, e))?;
        self.rules.push((re, label.to_string()));
        Ok(())
    }

    /// Canonical label of the first matching rule, or the text unchanged.
    pub fn apply(&self, text: &str) -> String {
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(text))
            .map(|(_, label)| label.clone())
            .unwrap_or_else(|| text.to_string())
    }

    /// Every label this table can produce.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|(_, label)| label.as_str())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// The three canonicalization tables.
#[derive(Debug, Clone)]
pub struct Normalizer {
    instrument_types: CanonicalTable,
    industries: CanonicalTable,
    reference_rates: CanonicalTable,
}

impl Normalizer {
    /// Built-in tables.
    pub fn builtin() -> Result<Self, GrammarError> {
        Self::with_rules(&[])
    }

    /// Built-in tables with extra rules placed in front.
    pub fn with_rules(extra: &[CanonicalRule]) -> Result<Self, GrammarError> {
        let mut normalizer = Self {
            instrument_types: CanonicalTable::default(),
            industries: CanonicalTable::default(),
            reference_rates: CanonicalTable::default(),
        };
        for rule in extra {
            normalizer
                .table_mut(rule.field)
                .push(rule.field, &rule.pattern, &rule.label)?;
        }

        let builtin = [
            (CanonicalField::InstrumentType, INSTRUMENT_TYPE_RULES),
            (CanonicalField::Industry, INDUSTRY_RULES),
            (CanonicalField::ReferenceRate, REFERENCE_RATE_RULES),
        ];
        for (field, rules) in builtin {
            let table = CanonicalTable::compile(field, rules)?;
            normalizer.table_mut(field).rules.extend(table.rules);
        }
        Ok(normalizer)
    }

    pub fn table(&self, field: CanonicalField) -> &CanonicalTable {
        match field {
            CanonicalField::InstrumentType => &self.instrument_types,
            CanonicalField::Industry => &self.industries,
            CanonicalField::ReferenceRate => &self.reference_rates,
        }
    }

    fn table_mut(&mut self, field: CanonicalField) -> &mut CanonicalTable {
        match field {
            CanonicalField::InstrumentType => &mut self.instrument_types,
            CanonicalField::Industry => &mut self.industries,
            CanonicalField::ReferenceRate => &mut self.reference_rates,
        }
    }

    /// Canonicalize one value. The "Unknown" sentinel is left alone.
    pub fn normalize(&self, field: CanonicalField, text: &str) -> String {
        let trimmed = text.trim();
        if is_unknown(trimmed) {
            return text.to_string();
        }
        self.table(field).apply(trimmed)
    }

    /// Canonicalize the text fields of a record in place.
    pub fn normalize_record(&self, record: &mut InvestmentRecord) {
        record.instrument_type = self.normalize(CanonicalField::InstrumentType, &record.instrument_type);
        record.industry = self.normalize(CanonicalField::Industry, &record.industry);
        if let Some(rate) = record.reference_rate.take() {
            record.reference_rate = Some(self.normalize(CanonicalField::ReferenceRate, &rate));
        }
    }

    /// Canonicalize the text fields of a freshly tokenized identifier.
    pub fn normalize_identifier(&self, parsed: &mut ParsedIdentifier) {
        parsed.instrument_type = self.normalize(CanonicalField::InstrumentType, &parsed.instrument_type);
        parsed.industry = self.normalize(CanonicalField::Industry, &parsed.industry);
        if let Some(rate) = parsed.reference_rate.take() {
            parsed.reference_rate = Some(self.normalize(CanonicalField::ReferenceRate, &rate));
        }
    }
}

const INSTRUMENT_TYPE_RULES: &[(&str, &str)] = &[
    (r"(?:first|1st)\s+lien.*(?:revolv|revolver)", "First Lien Debt - Revolver"),
    (r"(?:first|1st)\s+lien.*(?:delayed\s+draw|ddtl)", "First Lien Debt - Delayed Draw"),
    (r"(?:second|2nd)\s+lien.*(?:revolv|revolver)", "Second Lien Debt - Revolver"),
    (r"(?:second|2nd)\s+lien.*(?:delayed\s+draw|ddtl)", "Second Lien Debt - Delayed Draw"),
    (r"(?:first|1st)\s+lien", "First Lien Debt"),
    (r"(?:second|2nd)\s+lien", "Second Lien Debt"),
    (r"unitranche", "Unitranche Debt"),
    (r"senior\s+secured.*(?:revolv|revolver)", "Senior Secured Debt - Revolver"),
    (r"senior\s+secured.*(?:delayed\s+draw|ddtl)", "Senior Secured Debt - Delayed Draw"),
    (r"senior\s+secured", "Senior Secured Debt"),
    (r"subordinated|mezzanine", "Subordinated Debt"),
    (r"unsecured", "Unsecured Debt"),
    (r"revolv", "Revolver"),
    (r"delayed\s+draw|ddtl", "Delayed Draw Term Loan"),
    (r"preferred", "Preferred Equity"),
    (r"warrant", "Warrants"),
    (r"common", "Common Equity"),
    (r"structured|\bclo\b|collateralized\s+loan", "Structured Finance"),
    (r"equity|stock|shares|units|membership|partnership\s+interest", "Equity"),
    (r"term\s+loan", "Term Loan"),
    (r"\bnotes?\b|\bbonds?\b", "Notes"),
];

const INDUSTRY_RULES: &[(&str, &str)] = &[
    (r"health\s*care|healthcare|pharma|medical|life\s+sciences|biotech", "Healthcare"),
    (r"aerospace|defen[cs]e", "Aerospace & Defense"),
    (r"environmental", "Environmental Industries"),
    (r"software|high\s+tech|information\s+technology|\bit\s+services|technology|internet|data\s+processing", "Technology"),
    (r"telecom", "Telecommunications"),
    (r"\bmedia|broadcasting|advertising|publishing|entertainment", "Media & Entertainment"),
    (r"hotel|gaming|leisure|restaurant", "Hotels, Gaming & Leisure"),
    (r"bank|financ|insurance|capital\s+markets", "Financial Services"),
    (r"real\s+estate", "Real Estate"),
    (r"beverage|food|tobacco", "Food & Beverage"),
    (r"transport|logistics|freight|road\s+&\s+rail|airlines?", "Transportation & Logistics"),
    (r"\benergy|\boil\b|\bgas\b|\butilit|\belectric", "Energy & Utilities"),
    (r"chemical|plastics|rubber", "Chemicals"),
    (r"construction|building", "Construction & Building"),
    (r"education", "Education"),
    (r"container|packaging|glass", "Containers & Packaging"),
    (r"\bauto(?:motive|mobiles?|\s+components|\s+parts)?\b", "Automotive"),
    (r"retail|wholesale|distribut", "Retail & Distribution"),
    (r"business\s+services|services:\s*business|professional\s+services|commercial\s+services", "Business Services"),
    (r"consumer\s+services|services:\s*consumer", "Consumer Services"),
    (r"consumer|household|personal\s+products|textiles|apparel", "Consumer Products"),
    (r"industrial|machinery|capital\s+equipment|metals|mining|forest|paper", "Industrials"),
];

const REFERENCE_RATE_RULES: &[(&str, &str)] = &[
    (r"euribor|euro\s+interbank", "EURIBOR"),
    (r"sofr|secured\s+overnight", "SOFR"),
    (r"libor|london\s+interbank", "LIBOR"),
    (r"prime", "PRIME"),
    (r"base\s+rate|\babr\b", "BASE RATE"),
    (r"fed(?:eral)?\s*funds", "FED FUNDS"),
    (r"cdor|canadian\s+dealer", "CDOR"),
];
