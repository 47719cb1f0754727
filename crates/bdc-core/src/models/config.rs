//! Configuration structures for the extraction pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::BdcError;
use crate::investment::dedup::compile_block_patterns;
use crate::investment::grammar::{CompiledGrammar, FilerGrammar};
use crate::investment::normalize::{CanonicalRule, Normalizer};

/// Main configuration for the bdc pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Filer grammar the tokenizer and table extractor run on.
    pub grammar: FilerGrammar,

    /// Record assembly settings.
    pub extraction: ExtractionConfig,

    /// Deduplication and fallback merge settings.
    pub dedup: DedupConfig,

    /// Extra canonicalization rules.
    pub normalization: NormalizationConfig,
}

/// Record assembly configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Characters searched on each side of a lone date for an
    /// acquisition word.
    pub date_context_window: usize,

    /// Derive commitment limit and undrawn amount for revolvers.
    pub commitment_heuristic: bool,

    /// Fill unknown industries from the document's industry index.
    pub backfill_industry: bool,

    /// Let standard tags win over inline-display tags for the same field.
    pub prefer_standard_tags: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            date_context_window: 50,
            commitment_heuristic: true,
            backfill_industry: true,
            prefer_standard_tags: true,
        }
    }
}

/// Deduplication configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Reconcile table records onto tagged records.
    pub merge_fallback: bool,

    /// Extra regexes for fallback row labels that are never instruments.
    pub block_patterns: Vec<String>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            merge_fallback: true,
            block_patterns: Vec::new(),
        }
    }
}

/// Canonicalization rules tested before the built-in table of their field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    pub rules: Vec<CanonicalRule>,
}

impl ExtractorConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check that every pattern compiles and the settings are usable.
    pub fn validate(&self) -> crate::Result<()> {
        if self.extraction.date_context_window == 0 {
            return Err(BdcError::Config("extraction.date_context_window must be positive".to_string()));
        }
        CompiledGrammar::compile(&self.grammar)?;
        Normalizer::with_rules(&self.normalization.rules)?;
        compile_block_patterns(&self.dedup.block_patterns)?;
        Ok(())
    }
}
