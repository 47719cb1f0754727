//! Deduplication of extracted records and reconciliation of records
//! from a secondary (table) source onto the primary (tagged) ones.

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use tracing::{debug, trace};

use crate::error::GrammarError;
use crate::models::record::InvestmentRecord;

use super::grammar::CompiledGrammar;

lazy_static! {
    /// Row labels that are never an instrument.
    static ref BLOCKED_LABELS: Vec<Regex> = vec![
        Regex::new(r"(?i)^\s*(?:sub-?)?totals?\b").unwrap(),
        Regex::new(r"(?i)\bnet\s+assets\b").unwrap(),
        Regex::new(r"(?i)^\s*(?:non-?)?(?:controlled|control)\b").unwrap(),
        Regex::new(r"(?i)^\s*(?:non-?)?affiliated?\b").unwrap(),
        Regex::new(r"(?i)\binvestments?\s*$").unwrap(),
        Regex::new(r"^\s*\(?\s*\d+(?:\.\d+)?\s*%").unwrap(),
        Regex::new(r"(?i)^\s*(?:cash(?:\s+and\s+cash\s+equivalents)?|liabilities\b.*|other\s+assets\b.*)$").unwrap(),
    ];
}

/// Composite identity of a position: company, type, maturity and the
/// monetary triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    company_name: String,
    instrument_type: String,
    maturity_date: String,
    principal_amount: Option<Decimal>,
    cost: Option<Decimal>,
    fair_value: Option<Decimal>,
}

impl DedupKey {
    pub fn of(record: &InvestmentRecord) -> Self {
        Self {
            company_name: record.company_name.clone(),
            instrument_type: record.instrument_type.clone(),
            maturity_date: record.maturity_date.clone().unwrap_or_default(),
            principal_amount: record.principal_amount.map(|d| d.normalize()),
            cost: record.cost.map(|d| d.normalize()),
            fair_value: record.fair_value.map(|d| d.normalize()),
        }
    }
}

/// Drop every record whose key was already seen, keeping first-seen order.
pub fn dedup(records: Vec<InvestmentRecord>) -> Vec<InvestmentRecord> {
    let before = records.len();
    let mut seen = HashSet::new();
    let kept: Vec<InvestmentRecord> = records
        .into_iter()
        .filter(|record| seen.insert(DedupKey::of(record)))
        .collect();

    if kept.len() < before {
        debug!(removed = before - kept.len(), kept = kept.len(), "removed duplicate records");
    }
    kept
}

/// What a fallback merge did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Fallback records paired with a primary record.
    pub matched: usize,
    /// Empty primary fields filled from a partner.
    pub fields_filled: usize,
    /// Unpaired fallback records appended.
    pub appended: usize,
    /// Unpaired fallback records rejected by the block list.
    pub blocked: usize,
}

/// Compile extra block-list patterns (case-insensitive).
pub fn compile_block_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Regex>, GrammarError> {
    patterns
        .iter()
        .map(|pattern| {
            let pattern = pattern.as_ref();
            Regex::new(&format!("(?i){pattern}"))
                .map_err(|e| GrammarError::invalid("dedup.block_patterns", pattern, e))
        })
        .collect()
}

/// Reconciles fallback records onto primary records.
#[derive(Debug, Clone)]
pub struct FallbackMerger<'g> {
    grammar: &'g CompiledGrammar,
    extra_blocks: &'g [Regex],
}

impl<'g> FallbackMerger<'g> {
    pub fn new(grammar: &'g CompiledGrammar) -> Self {
        Self {
            grammar,
            extra_blocks: &[],
        }
    }

    /// Block-list patterns checked on top of the built-in ones.
    pub fn with_blocks(mut self, blocks: &'g [Regex]) -> Self {
        self.extra_blocks = blocks;
        self
    }

    /// Whether a fallback record's company label is aggregate or banner
    /// text rather than an instrument.
    pub fn is_blocked(&self, record: &InvestmentRecord) -> bool {
        let label = record.company_name.trim();
        BLOCKED_LABELS.iter().chain(self.extra_blocks).any(|re| re.is_match(label))
            || self.grammar.is_section_label(label)
            || self.grammar.is_industry_phrase(label)
    }

    /// Pair each fallback record with the next unpaired primary record of
    /// the same company and instrument type, filling only the primary's
    /// empty fields. Once every primary of a key is paired, further
    /// fallback records of that key fill the last one. Fallback records
    /// matching no primary key are appended unless blocked.
    pub fn merge(
        &self,
        primary: &mut Vec<InvestmentRecord>,
        fallback: Vec<InvestmentRecord>,
    ) -> MergeStats {
        let mut stats = MergeStats::default();

        let mut partners: HashMap<(String, String), Partners> = HashMap::new();
        for (index, record) in primary.iter().enumerate() {
            partners.entry(match_key(record)).or_default().indices.push(index);
        }

        for record in fallback {
            if let Some(index) = partners.get_mut(&match_key(&record)).and_then(Partners::next) {
                stats.matched += 1;
                stats.fields_filled += primary[index].fill_missing_from(&record);
                continue;
            }
            if self.is_blocked(&record) {
                trace!(label = %record.company_name, "blocked fallback record");
                stats.blocked += 1;
                continue;
            }
            stats.appended += 1;
            primary.push(record);
        }

        debug!(
            matched = stats.matched,
            filled = stats.fields_filled,
            appended = stats.appended,
            blocked = stats.blocked,
            "merged fallback records"
        );
        stats
    }
}

/// Primary records sharing one match key, in document order.
#[derive(Debug, Default)]
struct Partners {
    indices: Vec<usize>,
    paired: usize,
}

impl Partners {
    /// The next unpaired index, or the last one when all are paired.
    fn next(&mut self) -> Option<usize> {
        let index = self.indices.get(self.paired).or(self.indices.last()).copied();
        self.paired = (self.paired + 1).min(self.indices.len());
        index
    }
}

/// Company reduced to lowercase alphanumerics, plus the lowercased type.
fn match_key(record: &InvestmentRecord) -> (String, String) {
    let company = record
        .company_name
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();
    (company, record.instrument_type.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::RecordSource;
    use pretty_assertions::assert_eq;

    fn record(company: &str, kind: &str, principal: i64, cost: i64, fair_value: i64) -> InvestmentRecord {
        let mut record = InvestmentRecord::new(RecordSource::Tagged);
        record.company_name = company.to_string();
        record.instrument_type = kind.to_string();
        record.maturity_date = Some("6/30/2028".to_string());
        record.principal_amount = Some(Decimal::from(principal));
        record.cost = Some(Decimal::from(cost));
        record.fair_value = Some(Decimal::from(fair_value));
        record
    }

    fn table_record(company: &str, kind: &str) -> InvestmentRecord {
        let mut record = InvestmentRecord::new(RecordSource::Table);
        record.company_name = company.to_string();
        record.instrument_type = kind.to_string();
        record
    }

    #[test]
    fn test_identical_keys_collapse_to_first() {
        let mut second = record("Acme LLC", "First Lien Debt", 100, 95, 90);
        second.industry = "Software".to_string();
        let records = vec![record("Acme LLC", "First Lien Debt", 100, 95, 90), second];

        let kept = dedup(records);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].industry, "Unknown");
    }

    #[test]
    fn test_distinct_triples_are_distinct_positions() {
        let records = vec![
            record("Acme LLC", "First Lien Debt", 1_000_000, 950_000, 900_000),
            record("Acme LLC", "First Lien Debt", 1_000_000, 950_000, 910_000),
        ];
        assert_eq!(dedup(records).len(), 2);
    }

    #[test]
    fn test_decimal_scale_does_not_split_keys() {
        let mut a = record("Acme LLC", "First Lien Debt", 0, 0, 0);
        a.principal_amount = Some(Decimal::new(10000, 2));
        let mut b = a.clone();
        b.principal_amount = Some(Decimal::from(100));
        assert_eq!(dedup(vec![a, b]).len(), 1);
    }

    #[test]
    fn test_merge_fills_only_empty_fields() {
        let grammar = CompiledGrammar::generic().unwrap();
        let merger = FallbackMerger::new(&grammar);

        let mut primary = vec![record("Acme LLC", "First Lien Debt", 100, 95, 90)];
        let mut partner = table_record("ACME, LLC", "First Lien Debt");
        partner.industry = "Software".to_string();
        partner.fair_value = Some(Decimal::from(1));

        let stats = merger.merge(&mut primary, vec![partner]);
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.fields_filled, 1);
        assert_eq!(primary.len(), 1);
        assert_eq!(primary[0].industry, "Software");
        assert_eq!(primary[0].fair_value, Some(Decimal::from(90)));
    }

    #[test]
    fn test_unmatched_fallback_is_appended_unless_blocked() {
        let grammar = CompiledGrammar::generic().unwrap();
        let merger = FallbackMerger::new(&grammar);

        let mut primary = vec![record("Acme LLC", "First Lien Debt", 100, 95, 90)];
        let fallback = vec![
            table_record("Widget Co", "Second Lien Debt"),
            table_record("Total Software", "Unknown"),
            table_record("Non-Controlled/Non-Affiliated Investments", "Unknown"),
            table_record("Software", "Unknown"),
            table_record("12.5% of Net Assets", "Unknown"),
        ];

        let stats = merger.merge(&mut primary, fallback);
        assert_eq!(stats.appended, 1);
        assert_eq!(stats.blocked, 4);
        assert_eq!(primary.len(), 2);
        assert_eq!(primary[1].company_name, "Widget Co");
    }

    #[test]
    fn test_extra_block_patterns() {
        let grammar = CompiledGrammar::generic().unwrap();
        let blocks = compile_block_patterns(&["^money market"]).unwrap();
        let merger = FallbackMerger::new(&grammar).with_blocks(&blocks);
        assert!(merger.is_blocked(&table_record("Money Market Fund", "Unknown")));
        assert!(!merger.is_blocked(&table_record("Acme LLC", "Unknown")));

        assert!(compile_block_patterns(&["("]).is_err());
    }

    #[test]
    fn test_each_primary_pairs_once() {
        let grammar = CompiledGrammar::generic().unwrap();
        let merger = FallbackMerger::new(&grammar);

        let mut primary = vec![
            record("Acme LLC", "First Lien Debt", 100, 95, 90),
            record("Acme LLC", "First Lien Debt", 200, 190, 180),
        ];
        primary[0].maturity_date = None;
        primary[1].maturity_date = None;
        let mut first = table_record("Acme LLC", "First Lien Debt");
        first.maturity_date = Some("1/1/2027".to_string());
        let mut second = table_record("Acme LLC", "First Lien Debt");
        second.maturity_date = Some("1/1/2029".to_string());

        let stats = merger.merge(&mut primary, vec![first, second]);
        assert_eq!(stats.matched, 2);
        assert_eq!(primary[0].maturity_date.as_deref(), Some("1/1/2027"));
        assert_eq!(primary[1].maturity_date.as_deref(), Some("1/1/2029"));
    }

    #[test]
    fn test_surplus_fallback_of_a_known_key_is_not_appended() {
        let grammar = CompiledGrammar::generic().unwrap();
        let merger = FallbackMerger::new(&grammar);

        let mut primary = vec![record("Acme LLC", "First Lien Debt", 100_000, 95_000, 90_000)];
        let first = table_record("Acme LLC", "First Lien Debt");
        let mut second = table_record("Acme LLC", "First Lien Debt");
        second.industry = "Software".to_string();
        second.fair_value = Some(Decimal::from(90));

        let stats = merger.merge(&mut primary, vec![first, second]);
        assert_eq!(
            stats,
            MergeStats {
                matched: 2,
                fields_filled: 1,
                appended: 0,
                blocked: 0,
            }
        );
        assert_eq!(primary.len(), 1);
        assert_eq!(primary[0].industry, "Software");
        assert_eq!(primary[0].fair_value, Some(Decimal::from(90_000)));
    }
}
