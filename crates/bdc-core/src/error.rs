//! Error types for the bdc-core library.
//!
//! Extraction itself never fails: malformed contexts and rows are dropped
//! and unparseable numbers become absent fields. Errors only surface while
//! loading configuration, compiling grammars, or decoding input documents.

use thiserror::Error;

/// Main error type for the bdc library.
#[derive(Error, Debug)]
pub enum BdcError {
    /// A filer grammar or canonicalization table failed to compile.
    #[error("grammar error: {0}")]
    Grammar(#[from] GrammarError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised while compiling a filer grammar or rule table.
#[derive(Error, Debug)]
pub enum GrammarError {
    /// A pattern is not a valid regular expression.
    #[error("invalid pattern in {field}: {pattern:?}: {source}")]
    InvalidPattern {
        field: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The grammar cannot locate instrument types at all.
    #[error("grammar {0:?} has no instrument-type phrases")]
    NoInstrumentTypes(String),
}

impl GrammarError {
    pub(crate) fn invalid(field: &str, pattern: &str, source: regex::Error) -> Self {
        Self::InvalidPattern {
            field: field.to_string(),
            pattern: pattern.to_string(),
            source,
        }
    }
}

/// Result type for the bdc library.
pub type Result<T> = std::result::Result<T, BdcError>;
