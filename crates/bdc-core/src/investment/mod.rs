//! Schedule-of-investments extraction module.

pub mod aggregator;
pub mod dedup;
mod extractor;
pub mod grammar;
pub mod normalize;
pub mod rules;
pub mod table;
pub mod tokenizer;

pub use extractor::{ExtractionResult, InvestmentExtractor};

use crate::models::document::Document;
use crate::models::record::InvestmentRecord;

/// Trait for document-level extractors.
pub trait DocumentExtractor {
    /// Extract records, totals and breakdowns from one document.
    fn extract(&self, document: &Document) -> ExtractionResult;

    /// Extract only the records.
    fn extract_records(&self, document: &Document) -> Vec<InvestmentRecord> {
        self.extract(document).records
    }
}
