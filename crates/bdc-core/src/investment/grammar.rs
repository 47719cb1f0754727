//! Filer grammars: the per-filer vocabulary the tokenizer and table
//! extractor run on, kept as data rather than code.

use std::collections::{BTreeMap, HashSet};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::GrammarError;

use super::rules::patterns::{FOOTNOTE, PERCENT_BANNER, WHITESPACE};

/// Record field a table column can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Company,
    Industry,
    InstrumentType,
    AcquisitionDate,
    MaturityDate,
    ReferenceRate,
    Spread,
    FloorRate,
    PikRate,
    InterestRate,
    Principal,
    Cost,
    FairValue,
    Shares,
}

impl Column {
    /// Whether the column holds a monetary amount.
    pub fn is_monetary(&self) -> bool {
        matches!(self, Column::Principal | Column::Cost | Column::FairValue | Column::Shares)
    }
}

/// Vocabulary describing how one filer writes its schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilerGrammar {
    /// Grammar name, for logs.
    pub name: String,

    /// Literal prefixes stripped from the start of every identifier.
    pub boilerplate_prefixes: Vec<String>,

    /// Instrument-type regexes; the longest match wins, ties go to the
    /// earlier entry.
    pub instrument_types: Vec<String>,

    /// Literal industry phrases; the longest match wins.
    pub industries: Vec<String>,

    /// Tokens that end a company name (LLC, Inc., ...).
    pub company_suffixes: Vec<String>,

    /// Words stripped from the start of a company-name candidate.
    pub prefix_words: Vec<String>,

    /// Single words that are never a company name on their own.
    pub low_information_words: Vec<String>,

    /// Portfolio-category row labels in schedule tables.
    pub section_labels: Vec<String>,

    /// Column-index fallbacks for tables with no usable header or tags.
    pub default_columns: BTreeMap<Column, usize>,
}

impl Default for FilerGrammar {
    fn default() -> Self {
        Self::generic()
    }
}

impl FilerGrammar {
    /// Built-in grammar covering the common BDC schedule vocabulary.
    pub fn generic() -> Self {
        Self {
            name: "generic".to_string(),
            boilerplate_prefixes: strings(BOILERPLATE_PREFIXES),
            instrument_types: strings(INSTRUMENT_TYPES),
            industries: strings(INDUSTRIES),
            company_suffixes: strings(COMPANY_SUFFIXES),
            prefix_words: strings(PREFIX_WORDS),
            low_information_words: strings(LOW_INFORMATION_WORDS),
            section_labels: strings(SECTION_LABELS),
            default_columns: [
                (Column::Company, 0),
                (Column::Industry, 1),
                (Column::InstrumentType, 2),
                (Column::MaturityDate, 3),
                (Column::Principal, 4),
                (Column::Cost, 5),
                (Column::FairValue, 6),
            ]
            .into_iter()
            .collect(),
        }
    }

    /// Load a grammar from JSON. Missing fields take the generic defaults.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// A grammar with every pattern compiled. Immutable and shareable across
/// threads.
#[derive(Debug, Clone)]
pub struct CompiledGrammar {
    name: String,
    boilerplate: Vec<Regex>,
    instrument_types: Vec<Regex>,
    industries: Vec<Regex>,
    suffix: Regex,
    whole_suffix: Regex,
    prefix_words: Option<Regex>,
    low_information: HashSet<String>,
    section_labels: HashSet<String>,
    default_columns: BTreeMap<Column, usize>,
}

/// Span of a phrase match in a text.
pub type Span = (usize, usize);

impl CompiledGrammar {
    /// Compile every pattern of a grammar.
    pub fn compile(grammar: &FilerGrammar) -> Result<Self, GrammarError> {
        if grammar.instrument_types.is_empty() {
            return Err(GrammarError::NoInstrumentTypes(grammar.name.clone()));
        }

        let boilerplate = grammar
            .boilerplate_prefixes
            .iter()
            .map(|prefix| {
                let pattern = format!(r"(?i)^\s*{}\s*[,:;\-]?\s*", phrase_pattern(prefix));
                Regex::new(&pattern).map_err(|e| GrammarError::invalid("boilerplate_prefixes", prefix, e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let instrument_types = grammar
            .instrument_types
            .iter()
            .map(|phrase| {
                Regex::new(&format!(r"(?i)\b(?:{})\b", phrase))
                    .map_err(|e| GrammarError::invalid("instrument_types", phrase, e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let industries = grammar
            .industries
            .iter()
            .map(|phrase| {
                Regex::new(&format!(r"(?i)\b(?:{})\b", phrase_pattern(phrase)))
                    .map_err(|e| GrammarError::invalid("industries", phrase, e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut suffixes: Vec<&String> = grammar.company_suffixes.iter().collect();
        suffixes.sort_by_key(|s| std::cmp::Reverse(s.len()));
        let alternation = suffixes
            .iter()
            .map(|s| regex::escape(s.trim_end_matches('.')))
            .collect::<Vec<_>>()
            .join("|");
        let suffix_source = format!(r"(?i)\b(?:{})(?:\.|\b)", alternation);
        let suffix = Regex::new(&suffix_source)
            .map_err(|e| GrammarError::invalid("company_suffixes", &suffix_source, e))?;
        let whole_source = format!(r"(?i)^\s*(?:{})\.?\s*$", alternation);
        let whole_suffix = Regex::new(&whole_source)
            .map_err(|e| GrammarError::invalid("company_suffixes", &whole_source, e))?;

        let prefix_words = if grammar.prefix_words.is_empty() {
            None
        } else {
            let alternation = grammar
                .prefix_words
                .iter()
                .map(|w| phrase_pattern(w))
                .collect::<Vec<_>>()
                .join("|");
            let source = format!(r"(?i)^\s*(?:{})\b[\s,:;\-]*", alternation);
            Some(Regex::new(&source).map_err(|e| GrammarError::invalid("prefix_words", &source, e))?)
        };

        Ok(Self {
            name: grammar.name.clone(),
            boilerplate,
            instrument_types,
            industries,
            suffix,
            whole_suffix,
            prefix_words,
            low_information: grammar
                .low_information_words
                .iter()
                .map(|w| w.to_lowercase())
                .collect(),
            section_labels: grammar
                .section_labels
                .iter()
                .map(|l| label_key(l))
                .collect(),
            default_columns: grammar.default_columns.clone(),
        })
    }

    /// The built-in generic grammar, compiled.
    pub fn generic() -> Result<Self, GrammarError> {
        Self::compile(&FilerGrammar::generic())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_columns(&self) -> &BTreeMap<Column, usize> {
        &self.default_columns
    }

    /// Strip every leading boilerplate prefix.
    pub fn strip_boilerplate<'a>(&self, mut text: &'a str) -> &'a str {
        loop {
            let stripped = self
                .boilerplate
                .iter()
                .find_map(|re| re.find(text).filter(|m| m.end() > 0).map(|m| &text[m.end()..]));
            match stripped {
                Some(rest) if rest.len() < text.len() => text = rest,
                _ => return text,
            }
        }
    }

    /// Longest instrument-type match. Ties go to the earlier grammar entry,
    /// then to the leftmost occurrence.
    pub fn find_instrument_type(&self, text: &str) -> Option<Span> {
        longest(self.instrument_types.iter().flat_map(|re| re.find_iter(text)))
    }

    /// Whether the text is nothing but an instrument-type phrase (plus
    /// footnotes and punctuation).
    pub fn is_instrument_phrase(&self, text: &str) -> bool {
        let cleaned = FOOTNOTE.replace_all(text, "");
        let text: &str = &cleaned;
        match self.find_instrument_type(text) {
            Some((start, end)) => !text[..start]
                .chars()
                .chain(text[end..].chars())
                .any(char::is_alphanumeric),
            None => false,
        }
    }

    /// Locate the industry phrase.
    ///
    /// Tiers, first hit wins: a phrase at the very start of the text, then
    /// one just after a comma, then one anywhere that is followed by a
    /// company name ending in a suffix token. Within a tier the longest
    /// phrase wins.
    pub fn find_industry(&self, text: &str) -> Option<Span> {
        let candidates: Vec<Span> = self
            .industries
            .iter()
            .flat_map(|re| re.find_iter(text))
            .map(|m| (m.start(), m.end()))
            .collect();

        let leading = text.len() - text.trim_start().len();
        let at_start = candidates.iter().copied().filter(|&(start, _)| start == leading);
        if let Some(span) = longest_span(at_start) {
            return Some(span);
        }

        let after_comma = candidates
            .iter()
            .copied()
            .filter(|&(start, _)| text[..start].trim_end().ends_with(','));
        if let Some(span) = longest_span(after_comma) {
            return Some(span);
        }

        let before_company = candidates
            .iter()
            .copied()
            .filter(|&(_, end)| self.company_follows(&text[end..]));
        longest_span(before_company)
    }

    /// Whether the whole text is one industry phrase.
    pub fn is_industry_phrase(&self, text: &str) -> bool {
        self.find_industry(text)
            .is_some_and(|(start, end)| text[..start].trim().is_empty() && text[end..].trim().is_empty())
    }

    /// Whether the text up to the next comma holds at least one word and
    /// then a company suffix.
    fn company_follows(&self, rest: &str) -> bool {
        let segment = rest.split(',').next().unwrap_or("");
        match self.suffix.find(segment) {
            Some(m) => segment[..m.start()].chars().any(char::is_alphanumeric),
            None => false,
        }
    }

    /// First company-suffix token in the text.
    pub fn find_suffix(&self, text: &str) -> Option<Span> {
        self.suffix.find(text).map(|m| (m.start(), m.end()))
    }

    /// Every company-suffix token in the text.
    pub fn suffixes(&self, text: &str) -> Vec<Span> {
        self.suffix.find_iter(text).map(|m| (m.start(), m.end())).collect()
    }

    /// Whether the whole text is a single company suffix ("LLC", "Inc.").
    pub fn is_suffix(&self, text: &str) -> bool {
        self.whole_suffix.is_match(text)
    }

    /// Strip known prefix words from the start of a company candidate,
    /// keeping the original when nothing would remain.
    pub fn strip_prefix_words<'a>(&self, text: &'a str) -> &'a str {
        let Some(re) = &self.prefix_words else {
            return text;
        };
        let mut current = text;
        while let Some(m) = re.find(current) {
            let rest = &current[m.end()..];
            if m.end() == 0 || !rest.chars().any(char::is_alphanumeric) {
                break;
            }
            current = rest;
        }
        current
    }

    /// A single word that cannot stand alone as a company name.
    pub fn is_low_information(&self, text: &str) -> bool {
        let word = text.trim().trim_matches(|c: char| !c.is_alphanumeric());
        if word.is_empty() {
            return true;
        }
        if word.split_whitespace().count() > 1 {
            return false;
        }
        self.low_information.contains(&word.to_lowercase()) || self.is_suffix(word)
    }

    /// Whether a row label names a portfolio category.
    pub fn is_section_label(&self, text: &str) -> bool {
        let key = label_key(text);
        !key.is_empty() && self.section_labels.contains(&key)
    }
}

/// Lowercased label with footnotes, percentage banners and trailing
/// punctuation removed.
fn label_key(text: &str) -> String {
    let text = FOOTNOTE.replace_all(text, "");
    let text = PERCENT_BANNER.replace(&text, "");
    let text = WHITESPACE.replace_all(&text, " ");
    text.trim()
        .trim_end_matches([':', ',', '-', '–', '—'])
        .trim()
        .to_lowercase()
}

/// Regex source for a literal phrase: flexible whitespace, and "&"
/// interchangeable with "and".
fn phrase_pattern(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(|word| match word {
            "&" | "and" | "And" => r"(?:&|and)".to_string(),
            _ => regex::escape(word),
        })
        .collect::<Vec<_>>()
        .join(r"\s+")
}

fn longest<'t>(matches: impl Iterator<Item = regex::Match<'t>>) -> Option<Span> {
    longest_span(matches.map(|m| (m.start(), m.end())))
}

/// Longest span; the first seen wins ties.
fn longest_span(spans: impl Iterator<Item = Span>) -> Option<Span> {
    spans.fold(None, |best, span| match best {
        Some((start, end)) if end - start >= span.1 - span.0 => Some((start, end)),
        _ => Some(span),
    })
}

const BOILERPLATE_PREFIXES: &[&str] = &[
    "Investment, Non-Affiliated Issuer",
    "Investment, Affiliated Issuer",
    "Investment, Non-Controlled/Non-Affiliated",
    "Investment, Non-Controlled/Affiliated",
    "Investment, Controlled/Affiliated",
    "Non-Controlled/Non-Affiliated Investments",
    "Non-Controlled/Affiliated Investments",
    "Controlled/Affiliated Investments",
    "Non-Control/Non-Affiliate Investments",
    "Affiliate Investments",
    "Control Investments",
    "Investments in Non-Controlled, Non-Affiliated Portfolio Companies",
    "Investment Owned",
    "Investment Identifier",
];

const INSTRUMENT_TYPES: &[&str] = &[
    r"(?:first|second|1st|2nd)\s+lien(?:\s+senior)?(?:\s+secured)?(?:\s+(?:term|unitranche|revolving|delayed\s+draw(?:\s+term)?))?(?:\s+(?:loans?|debt|notes?|bonds?|facility|credit\s+facility|revolver))?(?:\s*[-–—:]\s*(?:revolver|revolving(?:\s+(?:loan|credit\s+facility))?|delayed\s+draw(?:\s+term\s+loan)?|ddtl|term\s+loan|last[-\s]out|first[-\s]out))?",
    r"senior\s+secured(?:\s+(?:first|second)\s+lien)?(?:\s+(?:term|revolving|delayed\s+draw(?:\s+term)?))?(?:\s+(?:loans?|debt|notes?|bonds?|facility|credit\s+facility|revolver))?(?:\s*[-–—:]\s*(?:revolver|revolving(?:\s+(?:loan|credit\s+facility))?|delayed\s+draw(?:\s+term\s+loan)?|ddtl|term\s+loan))?",
    r"unitranche(?:\s+(?:term\s+)?(?:loans?|debt|facility))?(?:\s*[-–—:]\s*(?:revolver|delayed\s+draw(?:\s+term\s+loan)?))?",
    r"(?:senior\s+)?subordinated(?:\s+(?:term\s+)?(?:loans?|debt|notes?|debentures?))?",
    r"(?:senior\s+)?unsecured(?:\s+(?:term\s+)?(?:loans?|debt|notes?|bonds?))?",
    r"mezzanine(?:\s+(?:loans?|debt|notes?))?",
    r"delayed\s+draw(?:\s+term)?(?:\s+loans?)?|ddtl",
    r"revolving(?:\s+(?:credit\s+)?(?:loans?|facility|line(?:\s+of\s+credit)?))?|revolver",
    r"term\s+loans?(?:\s+[a-c]\b)?",
    r"(?:series\s+[a-z0-9\-]+\s+)?(?:convertible\s+)?preferred\s+(?:equity|stock|shares|units|interests?)",
    r"(?:class\s+[a-z0-9\-]+\s+)?common\s+(?:equity|stock|shares|units|interests?)",
    r"(?:class\s+[a-z0-9\-]+\s+)?(?:membership|partnership|lp|llc)\s+(?:units|interests?)",
    r"(?:class\s+[a-z0-9\-]+\s+)?units",
    r"warrants?(?:\s+to\s+purchase\s+[a-z\s]+)?",
    r"equity(?:\s+(?:interests?|investments?|securities|co-?investment))?",
    r"structured\s+(?:finance|products?)(?:\s+(?:notes?|obligations?|securities))?|clo\s+(?:equity|(?:subordinated\s+)?notes?)|collateralized\s+loan\s+obligations?",
    r"(?:senior\s+)?secured\s+(?:notes?|bonds?)",
    r"royalty\s+(?:rights?|interests?)",
    r"joint\s+venture(?:\s+interests?)?",
    r"asset[-\s]based(?:\s+(?:loans?|facility))?",
];

const INDUSTRIES: &[&str] = &[
    "Aerospace & Defense",
    "Air Freight & Logistics",
    "Application Software",
    "Auto Components",
    "Automotive",
    "Banking, Finance, Insurance & Real Estate",
    "Beverage, Food & Tobacco",
    "Building Products",
    "Business Services",
    "Capital Equipment",
    "Capital Markets",
    "Chemicals, Plastics & Rubber",
    "Chemicals",
    "Commercial Services & Supplies",
    "Construction & Building",
    "Construction & Engineering",
    "Consumer Discretionary",
    "Consumer Goods: Durable",
    "Consumer Goods: Non-Durable",
    "Consumer Products",
    "Consumer Services",
    "Containers & Packaging",
    "Containers, Packaging & Glass",
    "Data Processing & Outsourced Services",
    "Distributors",
    "Diversified Consumer Services",
    "Diversified Financial Services",
    "Diversified Telecommunication Services",
    "Education",
    "Electronic Equipment, Instruments & Components",
    "Energy Equipment & Services",
    "Energy: Electricity",
    "Energy: Oil & Gas",
    "Entertainment",
    "Environmental Industries",
    "Environmental Services",
    "Financial Services",
    "Food & Beverage",
    "Food & Staples Retailing",
    "Food Products",
    "Forest Products & Paper",
    "Health Care Equipment & Supplies",
    "Health Care Providers & Services",
    "Health Care Technology",
    "Health Care",
    "Healthcare & Pharmaceuticals",
    "Healthcare Services",
    "Healthcare Technology",
    "Healthcare",
    "High Tech Industries",
    "Hotel, Gaming & Leisure",
    "Hotels, Restaurants & Leisure",
    "Household Products",
    "Industrial Conglomerates",
    "Insurance",
    "Interactive Media & Services",
    "Internet Software & Services",
    "IT Services",
    "Leisure Products",
    "Life Sciences Tools & Services",
    "Machinery",
    "Media: Advertising, Printing & Publishing",
    "Media: Broadcasting & Subscription",
    "Media: Diversified & Production",
    "Metals & Mining",
    "Personal Products",
    "Pharmaceuticals",
    "Professional Services",
    "Real Estate",
    "Retail",
    "Road & Rail",
    "Services: Business",
    "Services: Consumer",
    "Software & Services",
    "Software",
    "Specialty Retail",
    "Systems Software",
    "Technology",
    "Telecommunications",
    "Textiles, Apparel & Luxury Goods",
    "Trading Companies & Distributors",
    "Transportation: Cargo",
    "Transportation: Consumer",
    "Transportation",
    "Utilities: Electric",
    "Utilities",
    "Wholesale",
];

const COMPANY_SUFFIXES: &[&str] = &[
    "LLC", "L.L.C.", "Inc.", "Incorporated", "Corp.", "Corporation", "Co.", "Company", "LP",
    "L.P.", "LLP", "Ltd.", "Limited", "Holdings", "Holding", "PLC", "GmbH", "S.A.", "S.à r.l.",
    "B.V.", "N.V.", "AG", "Parent", "Buyer", "Topco", "Bidco", "Midco", "Borrower", "Purchaser",
];

const PREFIX_WORDS: &[&str] = &[
    "Investments in",
    "Investment in",
    "Portfolio Company",
    "Issuer",
];

const LOW_INFORMATION_WORDS: &[&str] = &[
    "and", "the", "of", "services", "products", "industries", "industry", "technology",
    "software", "healthcare", "health", "care", "equipment", "management", "solutions", "systems",
    "group", "consumer", "business", "financial", "media", "energy", "retail", "investment",
    "investments", "loan", "debt", "equity",
];

const SECTION_LABELS: &[&str] = &[
    "Non-Control/Non-Affiliate Investments",
    "Affiliate Investments",
    "Control Investments",
    "Non-Controlled/Non-Affiliated Investments",
    "Non-Controlled/Affiliated Investments",
    "Controlled/Affiliated Investments",
    "Controlled Investments",
    "Debt Investments",
    "Equity Investments",
    "Investments",
    "Portfolio Investments",
    "Cash Equivalents",
    "Money Market Funds",
];

#[cfg(test)]
mod tests {
    use super::*;

    fn grammar() -> CompiledGrammar {
        CompiledGrammar::generic().unwrap()
    }

    fn slice(text: &str, span: Option<Span>) -> Option<&str> {
        span.map(|(s, e)| &text[s..e])
    }

    #[test]
    fn test_generic_grammar_compiles() {
        let grammar = grammar();
        assert_eq!(grammar.name(), "generic");
        assert_eq!(grammar.default_columns().get(&Column::Company), Some(&0));
    }

    #[test]
    fn test_empty_instrument_list_is_rejected() {
        let mut raw = FilerGrammar::generic();
        raw.instrument_types.clear();
        assert!(matches!(
            CompiledGrammar::compile(&raw),
            Err(GrammarError::NoInstrumentTypes(_))
        ));
    }

    #[test]
    fn test_invalid_pattern_names_field() {
        let mut raw = FilerGrammar::generic();
        raw.instrument_types.push("(unclosed".to_string());
        match CompiledGrammar::compile(&raw) {
            Err(GrammarError::InvalidPattern { field, .. }) => assert_eq!(field, "instrument_types"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_longest_instrument_type_wins() {
        let text = "Acme LLC First Lien Senior Secured Loan - Revolver";
        assert_eq!(
            slice(text, grammar().find_instrument_type(text)),
            Some("First Lien Senior Secured Loan - Revolver")
        );
    }

    #[test]
    fn test_industry_tiers() {
        let g = grammar();

        let text = "Environmental Industries Acme Holdings LLC";
        assert_eq!(slice(text, g.find_industry(text)), Some("Environmental Industries"));

        let text = "Widget Co, Health Care Providers and Services";
        assert_eq!(slice(text, g.find_industry(text)), Some("Health Care Providers and Services"));

        let text = "Acme Software Inc";
        assert_eq!(g.find_industry(text), None);
    }

    #[test]
    fn test_boilerplate_and_prefix_words() {
        let g = grammar();
        assert_eq!(
            g.strip_boilerplate("Investment, Non-Affiliated Issuer, Acme LLC"),
            "Acme LLC"
        );
        assert_eq!(g.strip_prefix_words("Issuer Acme LLC"), "Acme LLC");
        assert_eq!(g.strip_prefix_words("Issuer"), "Issuer");
    }

    #[test]
    fn test_section_labels_and_low_information() {
        let g = grammar();
        assert!(g.is_section_label("Non-Control/Non-Affiliate Investments (1)"));
        assert!(g.is_section_label("Debt Investments - 120.5% of net assets"));
        assert!(!g.is_section_label("Acme LLC"));

        assert!(g.is_low_information("Services"));
        assert!(g.is_low_information("LLC"));
        assert!(!g.is_low_information("Acme"));
        assert!(!g.is_low_information("Acme Services"));
    }

    #[test]
    fn test_instrument_phrase() {
        let g = grammar();
        assert!(g.is_instrument_phrase("First Lien Term Loan (3)"));
        assert!(!g.is_instrument_phrase("Acme LLC"));
        assert!(!g.is_instrument_phrase("Acme LLC Term Loan"));
    }

    #[test]
    fn test_grammar_from_json_takes_defaults() {
        let grammar = FilerGrammar::from_json(r#"{"name": "custom", "industries": ["Widgets"]}"#).unwrap();
        assert_eq!(grammar.name, "custom");
        assert_eq!(grammar.industries, vec!["Widgets".to_string()]);
        assert!(!grammar.instrument_types.is_empty());
    }
}
