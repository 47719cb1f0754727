//! Rule-based token extractors shared by every extraction path.

pub mod amounts;
pub mod dates;
pub mod patterns;
pub mod rates;
pub mod scanner;

pub use amounts::{apply_scale, parse_amount, parse_scaled_amount};
pub use dates::{parse_date, DateExtractor, DateRole};
pub use rates::{format_percent, format_percent_text, ReferenceRate, ReferenceRateExtractor};
pub use scanner::{ScanResult, TokenScanner};

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences of the field.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// A value matched in source text, with the byte span it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Byte span in the source text.
    pub position: (usize, usize),
    /// Source text that was matched.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, start: usize, end: usize, source: impl Into<String>) -> Self {
        Self {
            value,
            position: (start, end),
            source: source.into(),
        }
    }

    pub fn start(&self) -> usize {
        self.position.0
    }

    pub fn end(&self) -> usize {
        self.position.1
    }
}
