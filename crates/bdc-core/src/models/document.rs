//! Input documents handed over by the context, tag and HTML readers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Everything extracted from one filing before record assembly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    /// Display name (filer, form, period or file name).
    pub name: String,

    /// Accounting contexts carrying an instrument identifier.
    pub contexts: Vec<ContextRef>,

    /// Tagged facts, in document order.
    pub facts: Vec<Fact>,

    /// HTML schedule tables, for filers without usable identifier tagging
    /// or as a secondary source.
    pub tables: Vec<Table>,

    /// Reporting instant to industry label, from a secondary dimensional axis.
    pub industry_index: BTreeMap<String, String>,
}

impl Document {
    /// Whether the document carries identifier-tagged contexts.
    pub fn has_tagged_contexts(&self) -> bool {
        !self.contexts.is_empty()
    }

    /// Industry label recorded for a context's instant (or end date).
    pub fn industry_for(&self, context: &ContextRef) -> Option<&str> {
        context
            .instant
            .as_deref()
            .and_then(|instant| self.industry_index.get(instant))
            .or_else(|| {
                context
                    .end
                    .as_deref()
                    .and_then(|end| self.industry_index.get(end))
            })
            .map(String::as_str)
    }
}

/// One accounting context naming a single investment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRef {
    pub context_key: String,

    /// Free-text instrument identifier (typed dimension member).
    pub identifier: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instant: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

/// How a fact was tagged in the source document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    /// Fully-qualified taxonomy tag.
    #[default]
    Standard,
    /// Inline display tag wrapping rendered table text.
    InlineDisplay,
}

/// One tagged value bound to a context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub concept_name: String,
    pub raw_value: String,
    pub context_key: String,

    /// Currency or unit reference (e.g. "USD", "pure").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Declared power-of-ten scale of the displayed value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<i32>,

    #[serde(default)]
    pub kind: TagKind,
}

impl Fact {
    pub fn new(
        concept_name: impl Into<String>,
        raw_value: impl Into<String>,
        context_key: impl Into<String>,
    ) -> Self {
        Self {
            concept_name: concept_name.into(),
            raw_value: raw_value.into(),
            context_key: context_key.into(),
            ..Self::default()
        }
    }

    pub fn with_scale(mut self, scale: i32) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn with_kind(mut self, kind: TagKind) -> Self {
        self.kind = kind;
        self
    }
}

/// A schedule table with spanned cells already expanded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Table {
    /// Header cell texts, when the reader identified a header row.
    pub header: Option<Vec<String>>,

    pub rows: Vec<TableRow>,

    /// Declared power-of-ten scale for untagged amounts (3 = thousands).
    pub scale: Option<i32>,
}

/// A row of cells; merged cells appear as repeated empty placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

impl TableRow {
    /// Build a plain row from cell texts.
    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        Self {
            cells: texts.iter().map(|t| TableCell::text(t.as_ref())).collect(),
        }
    }

    /// Cell at a column, if the row is wide enough.
    pub fn cell(&self, col: usize) -> Option<&TableCell> {
        self.cells.get(col)
    }

    /// Trimmed text of the first cell.
    pub fn first_text(&self) -> &str {
        self.cells.first().map(|c| c.text.trim()).unwrap_or("")
    }

    /// Number of cells carrying an embedded tag.
    pub fn tagged_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.tag.is_some()).count()
    }
}

/// One table cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCell {
    pub text: String,

    #[serde(default)]
    pub bold: bool,

    #[serde(default)]
    pub underline: bool,

    /// Embedded machine tag, if the cell wraps one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<CellTag>,
}

impl TableCell {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
            ..Self::default()
        }
    }

    pub fn tagged(text: impl Into<String>, concept: impl Into<String>, scale: Option<i32>) -> Self {
        Self {
            text: text.into(),
            tag: Some(CellTag {
                concept: concept.into(),
                scale,
            }),
            ..Self::default()
        }
    }

    /// Bold or underlined styling.
    pub fn is_emphasized(&self) -> bool {
        self.bold || self.underline
    }
}

/// Tag metadata embedded in a table cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellTag {
    pub concept: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_deserializes_with_defaults() {
        let json = r#"{
            "name": "Example BDC 10-Q",
            "contexts": [{"context_key": "c1", "identifier": "Acme LLC, Term Loan", "instant": "2024-03-31"}],
            "facts": [{"concept_name": "us-gaap:InvestmentOwnedAtFairValue", "raw_value": "1,000", "context_key": "c1"}]
        }"#;

        let doc: Document = serde_json::from_str(json).unwrap();
        assert_eq!(doc.contexts.len(), 1);
        assert_eq!(doc.facts[0].kind, TagKind::Standard);
        assert!(doc.tables.is_empty());
        assert!(doc.has_tagged_contexts());
    }

    #[test]
    fn test_industry_lookup_falls_back_to_end_date() {
        let mut doc = Document::default();
        doc.industry_index
            .insert("2024-03-31".to_string(), "Software".to_string());

        let by_end = ContextRef {
            context_key: "c1".to_string(),
            end: Some("2024-03-31".to_string()),
            ..ContextRef::default()
        };
        assert_eq!(doc.industry_for(&by_end), Some("Software"));

        let missing = ContextRef {
            instant: Some("2023-12-31".to_string()),
            ..ContextRef::default()
        };
        assert_eq!(doc.industry_for(&missing), None);
    }
}
