//! Document-level pipeline: identifiers and facts (or tables) to
//! normalized, deduplicated records with totals and breakdowns.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::BdcError;
use crate::models::config::ExtractorConfig;
use crate::models::document::Document;
use crate::models::record::{is_unknown, InvestmentRecord, ParsedIdentifier, Totals};

use super::aggregator::{group_by_context, FactAggregator};
use super::dedup::{compile_block_patterns, dedup, FallbackMerger};
use super::grammar::CompiledGrammar;
use super::normalize::Normalizer;
use super::rules::TokenScanner;
use super::table::TableRowExtractor;
use super::tokenizer::IdentifierTokenizer;
use super::DocumentExtractor;

/// Records extracted from one document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionResult {
    /// Document name.
    pub document: String,
    /// Retained, deduplicated records in first-seen order.
    pub records: Vec<InvestmentRecord>,
    /// Sums over `records`.
    pub totals: Totals,
    /// Record count per industry.
    pub by_industry: BTreeMap<String, usize>,
    /// Record count per instrument type.
    pub by_instrument_type: BTreeMap<String, usize>,
    /// Extraction warnings.
    pub warnings: Vec<String>,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

impl ExtractionResult {
    /// A result with no records.
    pub fn empty(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            ..Self::default()
        }
    }

    fn summarize(document: &str, records: Vec<InvestmentRecord>) -> Self {
        let mut by_industry = BTreeMap::new();
        let mut by_instrument_type = BTreeMap::new();
        for record in &records {
            *by_industry.entry(record.industry.clone()).or_insert(0) += 1;
            *by_instrument_type.entry(record.instrument_type.clone()).or_insert(0) += 1;
        }

        Self {
            document: document.to_string(),
            totals: Totals::from_records(&records),
            records,
            by_industry,
            by_instrument_type,
            ..Self::default()
        }
    }
}

/// Schedule-of-investments extractor for one configuration.
///
/// Construction compiles the grammar, rule tables and block list once;
/// afterwards the extractor is immutable and can be shared across threads.
#[derive(Debug, Clone)]
pub struct InvestmentExtractor {
    config: ExtractorConfig,
    grammar: CompiledGrammar,
    normalizer: Normalizer,
    block_patterns: Vec<Regex>,
}

impl InvestmentExtractor {
    /// Create an extractor from a configuration.
    pub fn new(config: ExtractorConfig) -> crate::Result<Self> {
        if config.extraction.date_context_window == 0 {
            return Err(BdcError::Config("extraction.date_context_window must be positive".to_string()));
        }
        let grammar = CompiledGrammar::compile(&config.grammar)?;
        let normalizer = Normalizer::with_rules(&config.normalization.rules)?;
        let block_patterns = compile_block_patterns(&config.dedup.block_patterns)?;

        debug!(grammar = grammar.name(), "compiled extractor");
        Ok(Self {
            config,
            grammar,
            normalizer,
            block_patterns,
        })
    }

    /// Create an extractor with the generic grammar and default settings.
    pub fn with_defaults() -> crate::Result<Self> {
        Self::new(ExtractorConfig::default())
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn grammar(&self) -> &CompiledGrammar {
        &self.grammar
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    fn scanner(&self) -> TokenScanner {
        TokenScanner::new().with_date_window(self.config.extraction.date_context_window)
    }

    /// Tokenize and canonicalize one instrument identifier.
    pub fn parse_identifier(&self, identifier: &str) -> ParsedIdentifier {
        let mut parsed = IdentifierTokenizer::new(&self.grammar)
            .with_scanner(self.scanner())
            .tokenize(identifier);
        self.normalizer.normalize_identifier(&mut parsed);
        parsed
    }

    /// Extract every investment record of a document.
    ///
    /// Never fails; a document with nothing usable yields an empty result
    /// with a warning.
    pub fn extract(&self, document: &Document) -> ExtractionResult {
        let start = Instant::now();
        let mut warnings = Vec::new();
        let settings = &self.config.extraction;

        let tagged = self.tagged_records(document, &mut warnings);
        let tables = TableRowExtractor::new(&self.grammar)
            .with_scanner(self.scanner())
            .with_commitment_heuristic(settings.commitment_heuristic)
            .extract_all(&document.tables);

        let mut records = if document.has_tagged_contexts() {
            let mut primary = self.normalized(tagged);
            if self.config.dedup.merge_fallback && !tables.is_empty() {
                FallbackMerger::new(&self.grammar)
                    .with_blocks(&self.block_patterns)
                    .merge(&mut primary, self.normalized(tables));
            }
            primary
        } else {
            self.normalized(tables)
        };

        let before = records.len();
        records.retain(InvestmentRecord::is_retainable);
        if records.len() < before {
            debug!(dropped = before - records.len(), "dropped records without company or amount");
        }

        let records = dedup(records);
        if records.is_empty() {
            warnings.push("no investment records extracted".to_string());
        }

        let mut result = ExtractionResult::summarize(&document.name, records);
        result.warnings = warnings;
        result.processing_time_ms = start.elapsed().as_millis() as u64;

        info!(
            document = %document.name,
            records = result.records.len(),
            fair_value = %result.totals.fair_value,
            elapsed_ms = result.processing_time_ms,
            "extracted schedule of investments"
        );
        result
    }

    /// Like [`extract`](Self::extract), but a panic inside the pipeline
    /// degrades to an empty result carrying a warning.
    pub fn extract_isolated(&self, document: &Document) -> ExtractionResult {
        match panic::catch_unwind(AssertUnwindSafe(|| self.extract(document))) {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!(document = %document.name, error = %message, "extraction aborted");

                let mut result = ExtractionResult::empty(&document.name);
                result.warnings.push(format!("extraction aborted: {message}"));
                result
            }
        }
    }

    /// One record per identifier-tagged context.
    fn tagged_records(&self, document: &Document, warnings: &mut Vec<String>) -> Vec<InvestmentRecord> {
        let settings = &self.config.extraction;
        let aggregator = FactAggregator::new()
            .with_standard_preference(settings.prefer_standard_tags)
            .with_commitment_heuristic(settings.commitment_heuristic);
        let groups = group_by_context(&document.facts);

        let mut records = Vec::with_capacity(document.contexts.len());
        let mut unnamed = 0;
        for context in &document.contexts {
            let parsed = self.parse_identifier(&context.identifier);
            let facts = groups.get(context.context_key.as_str()).map(Vec::as_slice).unwrap_or_default();

            let Some(mut record) = aggregator.aggregate(&parsed, facts) else {
                unnamed += 1;
                continue;
            };
            if settings.backfill_industry && is_unknown(&record.industry) {
                if let Some(industry) = document.industry_for(context) {
                    record.industry = industry.to_string();
                }
            }
            records.push(record);
        }

        if unnamed > 0 {
            warnings.push(format!("{unnamed} context(s) without a recognizable company name"));
        }
        debug!(contexts = document.contexts.len(), records = records.len(), "assembled tagged records");
        records
    }

    fn normalized(&self, mut records: Vec<InvestmentRecord>) -> Vec<InvestmentRecord> {
        for record in &mut records {
            self.normalizer.normalize_record(record);
        }
        records
    }
}

impl DocumentExtractor for InvestmentExtractor {
    fn extract(&self, document: &Document) -> ExtractionResult {
        InvestmentExtractor::extract(self, document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::{ContextRef, Fact, Table, TableCell, TableRow, TagKind};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn context(key: &str, identifier: &str) -> ContextRef {
        ContextRef {
            context_key: key.to_string(),
            identifier: identifier.to_string(),
            instant: Some("2024-12-31".to_string()),
            ..ContextRef::default()
        }
    }

    fn fact(key: &str, concept: &str, value: &str) -> Fact {
        Fact::new(concept, value, key)
    }

    #[test]
    fn test_tagged_document() {
        let document = Document {
            name: "sample".to_string(),
            contexts: vec![
                context("c1", "Acme LLC, Software, First Lien Term Loan, S + 6.25%, Maturity 6/30/2028"),
                context("c2", "Beta Corp Second Lien Term Loan"),
                context("c3", "Total Investments"),
            ],
            facts: vec![
                fact("c1", "us-gaap:InvestmentOwnedBalancePrincipalAmount", "1,000,000"),
                fact("c1", "us-gaap:InvestmentOwnedAtCost", "990,000"),
                fact("c1", "us-gaap:InvestmentOwnedAtFairValue", "985,000"),
                fact("c2", "us-gaap:InvestmentOwnedAtFairValue", "500,000"),
            ],
            industry_index: [("2024-12-31".to_string(), "Healthcare".to_string())].into_iter().collect(),
            ..Document::default()
        };

        let extractor = InvestmentExtractor::with_defaults().unwrap();
        let result = extractor.extract(&document);

        assert_eq!(result.records.len(), 2);
        let acme = &result.records[0];
        assert_eq!(acme.company_name, "Acme LLC");
        assert_eq!(acme.instrument_type, "First Lien Debt");
        assert_eq!(acme.industry, "Technology");
        assert_eq!(acme.reference_rate.as_deref(), Some("SOFR"));
        assert_eq!(acme.principal_amount, Some(Decimal::from(1_000_000)));

        let beta = &result.records[1];
        assert_eq!(beta.company_name, "Beta Corp");
        assert_eq!(beta.industry, "Healthcare");
        assert_eq!(beta.commitment_limit, Some(Decimal::from(500_000)));

        assert_eq!(result.totals.fair_value, Decimal::from(1_485_000));
        assert_eq!(result.by_instrument_type.get("Second Lien Debt"), Some(&1));
    }

    #[test]
    fn test_standard_tag_wins_over_inline_display() {
        let document = Document {
            contexts: vec![context("c1", "Acme LLC, First Lien Term Loan")],
            facts: vec![
                fact("c1", "us-gaap:InvestmentOwnedAtFairValue", "10").with_kind(TagKind::Standard),
                fact("c1", "InvestmentOwnedAtFairValue", "99").with_kind(TagKind::InlineDisplay),
            ],
            ..Document::default()
        };
        let result = InvestmentExtractor::with_defaults().unwrap().extract(&document);
        assert_eq!(result.records[0].fair_value, Some(Decimal::from(10)));
    }

    #[test]
    fn test_table_fills_gaps_in_tagged_record() {
        let table = Table {
            header: Some(
                ["Company", "Industry", "Type", "Maturity", "Principal", "Cost", "Fair Value"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            ),
            rows: vec![TableRow::from_texts(&[
                "Acme LLC",
                "Software",
                "First Lien Term Loan",
                "6/30/2028",
                "100",
                "95",
                "90",
            ])],
            scale: None,
        };
        let document = Document {
            contexts: vec![context("c1", "Acme LLC First Lien Term Loan")],
            facts: vec![fact("c1", "us-gaap:InvestmentOwnedAtFairValue", "90")],
            tables: vec![table],
            ..Document::default()
        };

        let mut config = ExtractorConfig::default();
        config.extraction.backfill_industry = false;
        let result = InvestmentExtractor::new(config).unwrap().extract(&document);

        assert_eq!(result.records.len(), 1);
        let record = &result.records[0];
        assert_eq!(record.industry, "Technology");
        assert_eq!(record.maturity_date.as_deref(), Some("6/30/2028"));
        assert_eq!(record.principal_amount, Some(Decimal::from(100)));
        assert_eq!(record.fair_value, Some(Decimal::from(90)));
    }

    #[test]
    fn test_out_of_range_scale_drops_only_that_field() {
        let document = Document {
            contexts: vec![
                context("c1", "Acme LLC, First Lien Term Loan"),
                context("c2", "Beta Corp Second Lien Term Loan"),
            ],
            facts: vec![
                fact("c1", "us-gaap:InvestmentOwnedAtFairValue", "100"),
                fact("c2", "us-gaap:InvestmentOwnedAtFairValue", "5").with_scale(30),
                fact("c2", "us-gaap:InvestmentOwnedAtCost", "7"),
                fact("c2", "us-gaap:InvestmentInterestRate", "8.25").with_scale(-30),
            ],
            ..Document::default()
        };

        let result = InvestmentExtractor::with_defaults().unwrap().extract_isolated(&document);

        assert!(result.warnings.iter().all(|w| !w.starts_with("extraction aborted")));
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[0].fair_value, Some(Decimal::from(100)));
        let beta = &result.records[1];
        assert_eq!(beta.fair_value, None);
        assert_eq!(beta.interest_rate, None);
        assert_eq!(beta.cost, Some(Decimal::from(7)));
    }

    #[test]
    fn test_empty_document_is_not_an_error() {
        let result = InvestmentExtractor::with_defaults().unwrap().extract(&Document::default());
        assert!(result.records.is_empty());
        assert_eq!(result.totals.count, 0);
        assert_eq!(result.warnings, vec!["no investment records extracted".to_string()]);
    }

    #[test]
    fn test_table_only_document() {
        let mut header = TableRow::from_texts(&["Acme LLC", "Software"]);
        header.cells[0] = TableCell::bold("Acme LLC");
        let document = Document {
            tables: vec![Table {
                header: None,
                rows: vec![
                    header,
                    TableRow::from_texts(&["", "", "First Lien Term Loan", "1/1/2029", "100", "98", "97"]),
                ],
                scale: None,
            }],
            ..Document::default()
        };
        let result = InvestmentExtractor::with_defaults().unwrap().extract(&document);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].company_name, "Acme LLC");
        assert_eq!(result.by_industry.get("Technology"), Some(&1));
    }

    #[test]
    fn test_invalid_configuration_is_rejected() {
        let mut config = ExtractorConfig::default();
        config.grammar.instrument_types = vec!["(".to_string()];
        assert!(InvestmentExtractor::new(config).is_err());
    }
}
