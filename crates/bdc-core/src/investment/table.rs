//! Table row extractor for untagged or partially tagged schedule tables.
//!
//! Column roles come from embedded cell tags first, then header text, then
//! the grammar's fixed defaults. Rows are read one at a time; header rows
//! update the running company/industry/category that continuation rows
//! inherit.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::models::document::{Table, TableCell, TableRow};
use crate::models::record::{is_unknown, InvestmentRecord, RecordSource};

use super::aggregator::FactRole;
use super::grammar::{Column, CompiledGrammar};
use super::rules::patterns::{PERCENT_BANNER, TOTAL_ROW};
use super::rules::{format_percent_text, parse_date, parse_scaled_amount, ReferenceRate, TokenScanner};
use super::tokenizer::{clean_identifier, tidy, IdentifierTokenizer};

impl From<FactRole> for Column {
    fn from(role: FactRole) -> Self {
        match role {
            FactRole::Principal => Column::Principal,
            FactRole::Cost => Column::Cost,
            FactRole::FairValue => Column::FairValue,
            FactRole::MaturityDate => Column::MaturityDate,
            FactRole::AcquisitionDate => Column::AcquisitionDate,
            FactRole::PikRate => Column::PikRate,
            FactRole::FloorRate => Column::FloorRate,
            FactRole::Spread => Column::Spread,
            FactRole::ReferenceRate => Column::ReferenceRate,
            FactRole::InterestRate => Column::InterestRate,
            FactRole::Shares => Column::Shares,
        }
    }
}

/// Column index to field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: BTreeMap<usize, Column>,
}

impl ColumnMap {
    /// Resolve a table's columns: header text (or the grammar defaults when
    /// the header says nothing), overlaid with the tagged cells of the most
    /// heavily tagged row.
    pub fn resolve(table: &Table, grammar: &CompiledGrammar) -> Self {
        let mut map = table
            .header
            .as_deref()
            .map(Self::from_header)
            .filter(|map| !map.is_empty())
            .unwrap_or_else(|| Self::from_defaults(grammar.default_columns()));

        let tagged = table
            .rows
            .iter()
            .filter(|row| row.tagged_cells() > 0)
            .max_by_key(|row| row.tagged_cells());
        if let Some(row) = tagged {
            for (index, column) in Self::from_tagged_row(row).columns {
                map.assign(index, column);
            }
        }
        map
    }

    /// Columns named by header keywords. The first column for a field wins.
    pub fn from_header<S: AsRef<str>>(header: &[S]) -> Self {
        let mut map = Self::default();
        for (index, text) in header.iter().enumerate() {
            if let Some(column) = header_column(text.as_ref()) {
                if map.index_of(column).is_none() {
                    map.columns.insert(index, column);
                }
            }
        }
        map
    }

    /// Columns named by the concepts of a row's embedded tags.
    pub fn from_tagged_row(row: &TableRow) -> Self {
        let columns = row
            .cells
            .iter()
            .enumerate()
            .filter_map(|(index, cell)| Some((index, cell_role(cell)?)))
            .collect();
        Self { columns }
    }

    pub fn from_defaults(defaults: &BTreeMap<Column, usize>) -> Self {
        Self {
            columns: defaults.iter().map(|(column, index)| (*index, *column)).collect(),
        }
    }

    /// Put a field on a column, moving it off any other column.
    fn assign(&mut self, index: usize, column: Column) {
        self.columns.retain(|_, c| *c != column);
        self.columns.insert(index, column);
    }

    pub fn get(&self, index: usize) -> Option<Column> {
        self.columns.get(&index).copied()
    }

    pub fn index_of(&self, column: Column) -> Option<usize> {
        self.columns
            .iter()
            .find(|(_, c)| **c == column)
            .map(|(index, _)| *index)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn has_monetary(&self) -> bool {
        self.columns.values().any(Column::is_monetary)
    }
}

fn cell_role(cell: &TableCell) -> Option<Column> {
    cell.tag
        .as_ref()
        .and_then(|tag| FactRole::classify(&tag.concept))
        .map(Column::from)
}

/// Field named by one header cell.
fn header_column(text: &str) -> Option<Column> {
    let text = clean_identifier(text).to_lowercase();
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let has = |needles: &[&str]| needles.iter().any(|n| text.contains(n));
    let word = |needles: &[&str]| needles.iter().any(|n| words.contains(n));

    if text.is_empty() || has(&["% of", "net assets", "percent"]) {
        return None;
    }
    let column = if has(&["floor"]) {
        Column::FloorRate
    } else if word(&["pik"]) || has(&["paid in kind", "paid-in-kind"]) {
        Column::PikRate
    } else if has(&["spread", "margin"]) {
        Column::Spread
    } else if has(&["reference", "benchmark"]) || word(&["index"]) {
        Column::ReferenceRate
    } else if has(&["fair value", "market value"]) || word(&["fair"]) {
        Column::FairValue
    } else if word(&["cost"]) {
        Column::Cost
    } else if has(&["principal"]) || word(&["par", "face"]) {
        Column::Principal
    } else if word(&["shares", "units", "quantity"]) {
        Column::Shares
    } else if has(&["maturity", "expiration"]) {
        Column::MaturityDate
    } else if has(&["acqui", "origination", "investment date"]) {
        Column::AcquisitionDate
    } else if has(&["interest rate", "coupon"]) || word(&["rate", "interest"]) {
        Column::InterestRate
    } else if word(&["industry", "sector"]) {
        Column::Industry
    } else if word(&["type", "instrument", "security", "class"]) {
        Column::InstrumentType
    } else if word(&["company", "issuer", "portfolio", "name", "borrower", "investment", "investments"]) {
        Column::Company
    } else {
        return None;
    };
    Some(column)
}

/// How a row is treated.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RowKind {
    Blank,
    Total,
    /// Portfolio-category label; clears the running state.
    Section,
    /// Instrument-type banner; sets the running category.
    Category(String),
    Industry(String),
    Company(String),
    Data,
}

/// Values inherited by continuation rows.
#[derive(Debug, Default)]
struct RunningState {
    company: Option<String>,
    industry: Option<String>,
    category: Option<String>,
}

/// Extractor over one filer grammar.
#[derive(Debug, Clone)]
pub struct TableRowExtractor<'g> {
    grammar: &'g CompiledGrammar,
    scanner: TokenScanner,
    commitment_heuristic: bool,
}

impl<'g> TableRowExtractor<'g> {
    pub fn new(grammar: &'g CompiledGrammar) -> Self {
        Self {
            grammar,
            scanner: TokenScanner::new(),
            commitment_heuristic: true,
        }
    }

    pub fn with_scanner(mut self, scanner: TokenScanner) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn with_commitment_heuristic(mut self, enabled: bool) -> Self {
        self.commitment_heuristic = enabled;
        self
    }

    /// Read every table of a document in order.
    pub fn extract_all(&self, tables: &[Table]) -> Vec<InvestmentRecord> {
        tables.iter().flat_map(|table| self.extract(table)).collect()
    }

    /// Read one table. Rows that are not financial data yield nothing.
    pub fn extract(&self, table: &Table) -> Vec<InvestmentRecord> {
        let columns = ColumnMap::resolve(table, self.grammar);
        let mut state = RunningState::default();
        let mut records = Vec::new();

        for row in &table.rows {
            match self.classify(row, &columns, table.scale) {
                RowKind::Blank | RowKind::Total => {}
                RowKind::Section => state = RunningState::default(),
                RowKind::Category(category) => state.category = Some(category),
                RowKind::Industry(industry) => state.industry = Some(industry),
                RowKind::Company(company) => {
                    if let Some(industry) = self.industry_cell(row, &columns) {
                        state.industry = Some(industry);
                    }
                    state.company = Some(company);
                }
                RowKind::Data => {
                    let record = self.read_row(row, &columns, table.scale, &mut state);
                    records.push(record);
                }
            }
        }

        debug!(rows = table.rows.len(), records = records.len(), "read schedule table");
        records
    }

    fn classify(&self, row: &TableRow, columns: &ColumnMap, scale: Option<i32>) -> RowKind {
        let Some(first) = row.cells.iter().find(|c| !c.text.trim().is_empty()) else {
            return RowKind::Blank;
        };
        let label = clean_identifier(&first.text);
        let has_money = self.has_money(row, columns, scale);

        if TOTAL_ROW.is_match(&label) {
            trace!(label = %label, "skipping total row");
            return RowKind::Total;
        }

        if self.grammar.is_section_label(&label) {
            return RowKind::Section;
        }
        let banner_free = tidy(&PERCENT_BANNER.replace(&label, ""));
        if label.contains('%') && !banner_free.chars().any(char::is_alphabetic) && !has_money {
            // Percentage-only banner
            return RowKind::Blank;
        }
        let first_is_label_cell = row.cells.first().is_some_and(|c| !c.text.trim().is_empty());
        let lone_cell = row.cells.iter().filter(|c| !c.text.trim().is_empty()).count() == 1;
        let is_instrument = self.grammar.is_instrument_phrase(&banner_free);
        // A type cell deeper in the row belongs to an instrument line, not a banner.
        if is_instrument && !has_money && (first_is_label_cell || lone_cell) {
            return RowKind::Category(banner_free);
        }

        if first_is_label_cell && first.is_emphasized() && !is_instrument && !has_money {
            if self.grammar.is_industry_phrase(&banner_free) {
                return RowKind::Industry(banner_free);
            }
            return RowKind::Company(banner_free);
        }

        if has_money {
            RowKind::Data
        } else {
            RowKind::Blank
        }
    }

    /// Whether any monetary cell parses. Without monetary columns in the
    /// map, any cell after the first counts.
    fn has_money(&self, row: &TableRow, columns: &ColumnMap, scale: Option<i32>) -> bool {
        let monetary_map = columns.has_monetary();
        row.cells.iter().enumerate().any(|(index, cell)| {
            let monetary = match cell_role(cell).or_else(|| columns.get(index)) {
                Some(column) => column.is_monetary(),
                None => !monetary_map && index > 0,
            };
            monetary && parse_scaled_amount(&cell.text, cell_scale(cell, scale)).is_some()
        })
    }

    fn industry_cell(&self, row: &TableRow, columns: &ColumnMap) -> Option<String> {
        let index = columns.index_of(Column::Industry)?;
        let text = tidy(&clean_identifier(&row.cell(index)?.text));
        (!text.is_empty() && index > 0).then_some(text)
    }

    fn read_row(
        &self,
        row: &TableRow,
        columns: &ColumnMap,
        scale: Option<i32>,
        state: &mut RunningState,
    ) -> InvestmentRecord {
        let mut record = InvestmentRecord::new(RecordSource::Table);
        let mut free_text = Vec::new();

        for (index, cell) in row.cells.iter().enumerate() {
            let text = clean_identifier(&cell.text);
            if text.is_empty() {
                continue;
            }
            let Some(column) = cell_role(cell).or_else(|| columns.get(index)) else {
                // Unmapped bare figures are usually "% of net assets"
                if text.chars().any(char::is_alphabetic) {
                    free_text.push(text);
                }
                continue;
            };

            match column {
                Column::Company => {
                    let parsed = IdentifierTokenizer::new(self.grammar)
                        .with_scanner(self.scanner.clone())
                        .tokenize(&text);
                    record.fill_from_identifier(&parsed);
                }
                Column::Industry => record.industry = tidy(&text),
                Column::InstrumentType => {
                    record.instrument_type = tidy(&text);
                    free_text.push(text);
                }
                Column::AcquisitionDate => record.acquisition_date = date_text(&text),
                Column::MaturityDate => record.maturity_date = date_text(&text),
                Column::ReferenceRate => {
                    record.reference_rate = ReferenceRate::from_token(&text).map(|r| r.label().to_string());
                    free_text.push(text);
                }
                Column::Spread => record.spread = format_percent_text(&text),
                Column::FloorRate => record.floor_rate = format_percent_text(&text),
                Column::PikRate => record.pik_rate = format_percent_text(&text),
                // "S + 5.50%" is as common here as "11.16%"; the scanner sorts it out.
                Column::InterestRate => free_text.push(text),
                Column::Principal => record.principal_amount = parse_scaled_amount(&text, cell_scale(cell, scale)),
                Column::Cost => record.cost = parse_scaled_amount(&text, cell_scale(cell, scale)),
                Column::FairValue => record.fair_value = parse_scaled_amount(&text, cell_scale(cell, scale)),
                Column::Shares => record.shares_units = parse_scaled_amount(&text, cell_scale(cell, scale)),
            }
        }

        // Rate and date tokens that no column claimed
        if !free_text.is_empty() {
            let scan = self.scanner.scan(&free_text.join(" , "));
            fill(&mut record.reference_rate, scan.reference_label());
            fill(&mut record.spread, scan.spread);
            fill(&mut record.floor_rate, scan.floor_rate);
            fill(&mut record.pik_rate, scan.pik_rate);
            fill(&mut record.interest_rate, scan.interest_rate);
            fill(&mut record.acquisition_date, scan.acquisition_date);
            fill(&mut record.maturity_date, scan.maturity_date);
        }

        // Continuation rows inherit; rows naming a company become the new
        // running company.
        if is_unknown(&record.company_name) {
            if let Some(company) = &state.company {
                record.company_name = company.clone();
            }
        } else {
            state.company = Some(record.company_name.clone());
        }
        if is_unknown(&record.industry) {
            if let Some(industry) = &state.industry {
                record.industry = industry.clone();
            }
        } else {
            state.industry = Some(record.industry.clone());
        }
        if is_unknown(&record.instrument_type) {
            if let Some(category) = &state.category {
                record.instrument_type = category.clone();
            }
        }

        if self.commitment_heuristic {
            record.apply_commitment_heuristic();
        }
        record
    }
}

fn cell_scale(cell: &TableCell, table_scale: Option<i32>) -> Option<i32> {
    cell.tag.as_ref().and_then(|tag| tag.scale).or(table_scale)
}

fn date_text(text: &str) -> Option<String> {
    parse_date(text).map(|_| text.trim().to_string())
}

fn fill<T>(field: &mut Option<T>, value: Option<T>) {
    if field.is_none() {
        *field = value;
    }
}
