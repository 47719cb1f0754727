//! Core library for extracting BDC schedules of investments.
//!
//! This crate provides:
//! - Rate/date token scanning over free-text windows
//! - Filer grammars as data and an identifier tokenizer driven by them
//! - Aggregation of tagged (inline XBRL) facts onto tokenized identifiers
//! - Row extraction from untagged or partially tagged HTML tables
//! - Canonicalization of instrument types, industries and reference rates
//! - Deduplication and reconciliation of records from parallel sources

pub mod error;
pub mod models;
pub mod investment;

pub use error::{BdcError, GrammarError, Result};
pub use models::config::ExtractorConfig;
pub use models::document::{CellTag, ContextRef, Document, Fact, Table, TableCell, TableRow, TagKind};
pub use models::record::{InvestmentRecord, ParsedIdentifier, RecordSource, Totals, UNKNOWN};
pub use investment::{DocumentExtractor, ExtractionResult, InvestmentExtractor};
pub use investment::grammar::{CompiledGrammar, FilerGrammar};
pub use investment::normalize::{CanonicalField, Normalizer};
