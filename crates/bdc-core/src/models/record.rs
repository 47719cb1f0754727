//! Investment record data models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Sentinel for text fields that could not be determined.
pub const UNKNOWN: &str = "Unknown";

fn unknown() -> String {
    UNKNOWN.to_string()
}

/// Segments of one free-text instrument identifier.
///
/// Produced once per identifier by the tokenizer and only ever read
/// afterwards, as the fallback source for fields the tagged facts leave
/// empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedIdentifier {
    pub company_name: String,
    pub industry: String,
    pub instrument_type: String,
    pub acquisition_date: Option<String>,
    pub maturity_date: Option<String>,
    pub reference_rate: Option<String>,
    pub spread: Option<String>,
    pub floor_rate: Option<String>,
    pub pik_rate: Option<String>,
    pub interest_rate: Option<String>,
}

impl Default for ParsedIdentifier {
    fn default() -> Self {
        Self {
            company_name: unknown(),
            industry: unknown(),
            instrument_type: unknown(),
            acquisition_date: None,
            maturity_date: None,
            reference_rate: None,
            spread: None,
            floor_rate: None,
            pik_rate: None,
            interest_rate: None,
        }
    }
}

/// Which source path produced a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    /// Identifier tokenizer plus tagged facts.
    #[default]
    Tagged,
    /// Table row extractor.
    Table,
}

/// One portfolio investment, flat so it maps directly onto a CSV row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentRecord {
    #[serde(default = "unknown")]
    pub company_name: String,

    #[serde(default = "unknown")]
    pub industry: String,

    #[serde(default = "unknown")]
    pub instrument_type: String,

    pub acquisition_date: Option<String>,
    pub maturity_date: Option<String>,

    /// Principal amount in full currency units.
    pub principal_amount: Option<Decimal>,
    /// Amortized cost in full currency units.
    pub cost: Option<Decimal>,
    /// Fair value in full currency units.
    pub fair_value: Option<Decimal>,

    pub reference_rate: Option<String>,
    pub spread: Option<String>,
    pub floor_rate: Option<String>,
    pub pik_rate: Option<String>,
    pub interest_rate: Option<String>,

    /// Committed amount of a revolving line (heuristic, see
    /// [`InvestmentRecord::apply_commitment_heuristic`]).
    pub commitment_limit: Option<Decimal>,
    pub undrawn_commitment: Option<Decimal>,

    /// Share or unit count for equity positions.
    pub shares_units: Option<Decimal>,

    #[serde(default)]
    pub source: RecordSource,
}

impl InvestmentRecord {
    /// Create an empty record for the given source path.
    pub fn new(source: RecordSource) -> Self {
        Self {
            company_name: unknown(),
            industry: unknown(),
            instrument_type: unknown(),
            acquisition_date: None,
            maturity_date: None,
            principal_amount: None,
            cost: None,
            fair_value: None,
            reference_rate: None,
            spread: None,
            floor_rate: None,
            pik_rate: None,
            interest_rate: None,
            commitment_limit: None,
            undrawn_commitment: None,
            shares_units: None,
            source,
        }
    }

    /// Whether any of principal, cost or fair value is present.
    pub fn has_amount(&self) -> bool {
        self.principal_amount.is_some() || self.cost.is_some() || self.fair_value.is_some()
    }

    /// A record is kept only with a known company and at least one amount.
    pub fn is_retainable(&self) -> bool {
        !is_unknown(&self.company_name) && self.has_amount()
    }

    /// Fill every empty field from a parsed identifier. Populated fields win.
    pub fn fill_from_identifier(&mut self, parsed: &ParsedIdentifier) {
        fill_text(&mut self.company_name, &parsed.company_name);
        fill_text(&mut self.industry, &parsed.industry);
        fill_text(&mut self.instrument_type, &parsed.instrument_type);
        fill(&mut self.acquisition_date, &parsed.acquisition_date);
        fill(&mut self.maturity_date, &parsed.maturity_date);
        fill(&mut self.reference_rate, &parsed.reference_rate);
        fill(&mut self.spread, &parsed.spread);
        fill(&mut self.floor_rate, &parsed.floor_rate);
        fill(&mut self.pik_rate, &parsed.pik_rate);
        fill(&mut self.interest_rate, &parsed.interest_rate);
    }

    /// Fill every empty field from another record and return how many
    /// fields were filled. Never overwrites a populated field.
    pub fn fill_missing_from(&mut self, other: &InvestmentRecord) -> usize {
        let mut filled = 0;
        filled += fill_text(&mut self.company_name, &other.company_name) as usize;
        filled += fill_text(&mut self.industry, &other.industry) as usize;
        filled += fill_text(&mut self.instrument_type, &other.instrument_type) as usize;
        filled += fill(&mut self.acquisition_date, &other.acquisition_date) as usize;
        filled += fill(&mut self.maturity_date, &other.maturity_date) as usize;
        filled += fill(&mut self.principal_amount, &other.principal_amount) as usize;
        filled += fill(&mut self.cost, &other.cost) as usize;
        filled += fill(&mut self.fair_value, &other.fair_value) as usize;
        filled += fill(&mut self.reference_rate, &other.reference_rate) as usize;
        filled += fill(&mut self.spread, &other.spread) as usize;
        filled += fill(&mut self.floor_rate, &other.floor_rate) as usize;
        filled += fill(&mut self.pik_rate, &other.pik_rate) as usize;
        filled += fill(&mut self.interest_rate, &other.interest_rate) as usize;
        filled += fill(&mut self.commitment_limit, &other.commitment_limit) as usize;
        filled += fill(&mut self.undrawn_commitment, &other.undrawn_commitment) as usize;
        filled += fill(&mut self.shares_units, &other.shares_units) as usize;
        filled
    }

    /// Derive commitment figures for revolving lines reported at their
    /// committed rather than drawn amount.
    ///
    /// This is a heuristic, not an accounting rule: a fair value with no
    /// principal is read as the commitment limit, and a fair value above
    /// principal is read as limit with the difference undrawn.
    pub fn apply_commitment_heuristic(&mut self) {
        match (self.fair_value, self.principal_amount) {
            (Some(fair_value), None) => {
                self.commitment_limit = Some(fair_value);
            }
            (Some(fair_value), Some(principal)) if fair_value > principal => {
                self.commitment_limit = Some(fair_value);
                self.undrawn_commitment = Some(fair_value - principal);
            }
            _ => {}
        }
    }
}

/// Check for the sentinel, tolerating case and surrounding whitespace.
pub fn is_unknown(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case(UNKNOWN)
}

fn fill_text(target: &mut String, source: &str) -> bool {
    if is_unknown(target) && !is_unknown(source) {
        *target = source.to_string();
        true
    } else {
        false
    }
}

fn fill<T: Clone>(target: &mut Option<T>, source: &Option<T>) -> bool {
    if target.is_none() && source.is_some() {
        *target = source.clone();
        true
    } else {
        false
    }
}

/// Aggregate totals over a set of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub count: usize,
    pub principal_amount: Decimal,
    pub cost: Decimal,
    pub fair_value: Decimal,
}

impl Totals {
    /// Sum the monetary fields; absent values contribute nothing.
    pub fn from_records(records: &[InvestmentRecord]) -> Self {
        records.iter().fold(Self::default(), |mut totals, record| {
            totals.count += 1;
            totals.principal_amount += record.principal_amount.unwrap_or_default();
            totals.cost += record.cost.unwrap_or_default();
            totals.fair_value += record.fair_value.unwrap_or_default();
            totals
        })
    }
}
