//! Fact aggregator: merges the tagged facts of one context onto the
//! tokenized identifier of that context.

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::trace;

use crate::models::document::{Fact, TagKind};
use crate::models::record::{is_unknown, InvestmentRecord, ParsedIdentifier, RecordSource};

use super::rules::{apply_scale, format_percent, format_percent_text, parse_date, parse_scaled_amount, ReferenceRate};

/// Semantic role of a tagged fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactRole {
    Principal,
    Cost,
    FairValue,
    MaturityDate,
    AcquisitionDate,
    PikRate,
    FloorRate,
    Spread,
    ReferenceRate,
    InterestRate,
    Shares,
}

/// Keyword sets per role, tested in this order. Principal comes before
/// cost before fair value, and the rate components before the bare
/// interest rate, so a concept never lands in a broader bucket.
const ROLE_KEYWORDS: &[(FactRole, &[&str])] = &[
    (
        FactRole::Principal,
        &["principalamount", "ownedbalanceprincipalamount", "outstandingprincipal", "principal", "parvalue", "faceamount"],
    ),
    (FactRole::Cost, &["amortizedcost", "ownedatcost", "costbasis", "cost"]),
    (FactRole::FairValue, &["fairvalue", "ownedatfairvalue", "marketvalue"]),
    (FactRole::MaturityDate, &["maturitydate", "maturity"]),
    (FactRole::AcquisitionDate, &["acquisitiondate", "investmentdate", "originationdate"]),
    (FactRole::PikRate, &["paidinkind", "pikrate", "pik"]),
    (FactRole::FloorRate, &["ratefloor", "floor"]),
    (FactRole::Spread, &["basisspread", "spread", "margin"]),
    (
        FactRole::ReferenceRate,
        &["variableinterestratetype", "referencerate", "interestrateindex", "benchmark"],
    ),
    (FactRole::InterestRate, &["interestrate", "couponrate"]),
    (FactRole::Shares, &["balanceshares", "shares", "units", "quantity"]),
];

impl FactRole {
    /// Classify a concept name by case-insensitive keyword match.
    pub fn classify(concept: &str) -> Option<Self> {
        let key: String = concept
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();

        ROLE_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| key.contains(k)))
            .map(|(role, _)| *role)
    }
}

/// Aggregator settings.
#[derive(Debug, Clone)]
pub struct FactAggregator {
    prefer_standard: bool,
    commitment_heuristic: bool,
}

impl FactAggregator {
    pub fn new() -> Self {
        Self {
            prefer_standard: true,
            commitment_heuristic: true,
        }
    }

    /// Apply standard tags after inline-display tags so they win collisions.
    pub fn with_standard_preference(mut self, prefer: bool) -> Self {
        self.prefer_standard = prefer;
        self
    }

    /// Enable or disable commitment-limit derivation.
    pub fn with_commitment_heuristic(mut self, enabled: bool) -> Self {
        self.commitment_heuristic = enabled;
        self
    }

    /// Merge one context's facts onto its parsed identifier.
    ///
    /// Facts override identifier values; within a field the last fact
    /// wins. Returns `None` when no company name could be determined.
    pub fn aggregate(&self, parsed: &ParsedIdentifier, facts: &[&Fact]) -> Option<InvestmentRecord> {
        let mut record = InvestmentRecord::new(RecordSource::Tagged);

        let mut ordered: Vec<&Fact> = facts.to_vec();
        if self.prefer_standard {
            // Stable: document order is kept within each kind.
            ordered.sort_by_key(|fact| fact.kind == TagKind::Standard);
        }
        for fact in ordered {
            apply_fact(&mut record, fact);
        }

        record.fill_from_identifier(parsed);
        if self.commitment_heuristic {
            record.apply_commitment_heuristic();
        }

        if is_unknown(&record.company_name) {
            trace!(identifier_type = %parsed.instrument_type, "dropping context without a company name");
            return None;
        }
        Some(record)
    }
}

impl Default for FactAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Group facts by context key, keeping document order within a group.
pub fn group_by_context(facts: &[Fact]) -> HashMap<&str, Vec<&Fact>> {
    let mut groups: HashMap<&str, Vec<&Fact>> = HashMap::new();
    for fact in facts {
        groups.entry(fact.context_key.as_str()).or_default().push(fact);
    }
    groups
}

/// Route one fact onto its field. A payload that does not parse leaves
/// the field as it was.
fn apply_fact(record: &mut InvestmentRecord, fact: &Fact) {
    let Some(role) = FactRole::classify(&fact.concept_name) else {
        trace!(concept = %fact.concept_name, "ignoring unclassified fact");
        return;
    };
    let raw = fact.raw_value.trim();

    match role {
        FactRole::Principal => set(&mut record.principal_amount, parse_scaled_amount(raw, fact.scale)),
        FactRole::Cost => set(&mut record.cost, parse_scaled_amount(raw, fact.scale)),
        FactRole::FairValue => set(&mut record.fair_value, parse_scaled_amount(raw, fact.scale)),
        FactRole::Shares => set(&mut record.shares_units, parse_scaled_amount(raw, fact.scale)),
        FactRole::MaturityDate => set(&mut record.maturity_date, parse_date_text(raw)),
        FactRole::AcquisitionDate => set(&mut record.acquisition_date, parse_date_text(raw)),
        FactRole::PikRate => set(&mut record.pik_rate, parse_rate(raw, fact.scale)),
        FactRole::FloorRate => set(&mut record.floor_rate, parse_rate(raw, fact.scale)),
        FactRole::Spread => set(&mut record.spread, parse_rate(raw, fact.scale)),
        FactRole::InterestRate => set(&mut record.interest_rate, parse_rate(raw, fact.scale)),
        FactRole::ReferenceRate => set(&mut record.reference_rate, parse_reference(raw)),
    }
}

fn set<T>(field: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *field = value;
    }
}

fn parse_date_text(raw: &str) -> Option<String> {
    parse_date(raw).map(|_| raw.to_string())
}

/// Rate payloads: explicit percent text as written, otherwise a number
/// (scaled by the tag's declared scale) read as a fraction or percent.
fn parse_rate(raw: &str, scale: Option<i32>) -> Option<String> {
    if raw.contains('%') {
        return format_percent_text(raw);
    }
    let numeric: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    let value = Decimal::from_str(&numeric).ok()?;
    let value = match scale {
        Some(scale) => apply_scale(value, scale)?,
        None => value,
    };
    Some(format_percent(value))
}

fn parse_reference(raw: &str) -> Option<String> {
    match ReferenceRate::from_token(raw) {
        Some(rate) => Some(rate.label().to_string()),
        None if raw.chars().any(char::is_alphabetic) => Some(raw.to_string()),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parsed() -> ParsedIdentifier {
        ParsedIdentifier {
            company_name: "Acme LLC".to_string(),
            instrument_type: "First Lien Term Loan".to_string(),
            maturity_date: Some("6/30/2028".to_string()),
            spread: Some("5%".to_string()),
            ..ParsedIdentifier::default()
        }
    }

    #[test]
    fn test_classification_order() {
        assert_eq!(
            FactRole::classify("us-gaap:InvestmentOwnedBalancePrincipalAmount"),
            Some(FactRole::Principal)
        );
        assert_eq!(FactRole::classify("us-gaap:InvestmentOwnedAtCost"), Some(FactRole::Cost));
        assert_eq!(FactRole::classify("us-gaap:InvestmentOwnedAtFairValue"), Some(FactRole::FairValue));
        assert_eq!(FactRole::classify("us-gaap:InvestmentInterestRateFloor"), Some(FactRole::FloorRate));
        assert_eq!(FactRole::classify("us-gaap:InvestmentInterestRatePaidInKind"), Some(FactRole::PikRate));
        assert_eq!(FactRole::classify("us-gaap:InvestmentBasisSpreadVariableRate"), Some(FactRole::Spread));
        assert_eq!(
            FactRole::classify("us-gaap:InvestmentVariableInterestRateTypeExtensibleEnumeration"),
            Some(FactRole::ReferenceRate)
        );
        assert_eq!(FactRole::classify("us-gaap:InvestmentInterestRate"), Some(FactRole::InterestRate));
        assert_eq!(FactRole::classify("us-gaap:InvestmentMaturityDate"), Some(FactRole::MaturityDate));
        assert_eq!(FactRole::classify("us-gaap:InvestmentOwnedBalanceShares"), Some(FactRole::Shares));
        assert_eq!(FactRole::classify("us-gaap:InvestmentOwnedPercentOfNetAssets"), None);
    }

    #[test]
    fn test_facts_override_identifier() {
        let facts = [
            Fact::new("us-gaap:InvestmentOwnedBalancePrincipalAmount", "1,000,000", "c1"),
            Fact::new("us-gaap:InvestmentOwnedAtCost", "990,000", "c1"),
            Fact::new("us-gaap:InvestmentOwnedAtFairValue", "995,000", "c1"),
            Fact::new("us-gaap:InvestmentBasisSpreadVariableRate", "0.0550", "c1"),
            Fact::new("us-gaap:InvestmentMaturityDate", "2029-06-30", "c1"),
        ];
        let refs: Vec<&Fact> = facts.iter().collect();
        let record = FactAggregator::new().aggregate(&parsed(), &refs).unwrap();

        assert_eq!(record.company_name, "Acme LLC");
        assert_eq!(record.principal_amount, Some(Decimal::from(1_000_000)));
        assert_eq!(record.cost, Some(Decimal::from(990_000)));
        assert_eq!(record.fair_value, Some(Decimal::from(995_000)));
        assert_eq!(record.spread.as_deref(), Some("5.5%"));
        assert_eq!(record.maturity_date.as_deref(), Some("2029-06-30"));
        assert_eq!(record.commitment_limit, None);
    }

    #[test]
    fn test_last_write_wins_and_parse_failure_keeps_value() {
        let facts = [
            Fact::new("us-gaap:InvestmentOwnedAtFairValue", "100", "c1"),
            Fact::new("us-gaap:InvestmentOwnedAtFairValue", "200", "c1"),
            Fact::new("us-gaap:InvestmentOwnedAtFairValue", "—", "c1"),
        ];
        let refs: Vec<&Fact> = facts.iter().collect();
        let record = FactAggregator::new()
            .with_commitment_heuristic(false)
            .aggregate(&parsed(), &refs)
            .unwrap();
        assert_eq!(record.fair_value, Some(Decimal::from(200)));
        assert_eq!(record.commitment_limit, None);
    }

    #[test]
    fn test_standard_tag_beats_inline_display() {
        let facts = [
            Fact::new("us-gaap:InvestmentOwnedAtFairValue", "500", "c1"),
            Fact::new("InvestmentOwnedAtFairValue", "7", "c1")
                .with_scale(3)
                .with_kind(TagKind::InlineDisplay),
        ];
        let refs: Vec<&Fact> = facts.iter().collect();

        let record = FactAggregator::new().aggregate(&parsed(), &refs).unwrap();
        assert_eq!(record.fair_value, Some(Decimal::from(500)));

        let record = FactAggregator::new()
            .with_standard_preference(false)
            .aggregate(&parsed(), &refs)
            .unwrap();
        assert_eq!(record.fair_value, Some(Decimal::from(7_000)));
    }

    #[test]
    fn test_commitment_heuristic_on_revolver() {
        let facts = [
            Fact::new("us-gaap:InvestmentOwnedBalancePrincipalAmount", "250", "c1"),
            Fact::new("us-gaap:InvestmentOwnedAtFairValue", "1000", "c1"),
        ];
        let refs: Vec<&Fact> = facts.iter().collect();
        let record = FactAggregator::new().aggregate(&parsed(), &refs).unwrap();
        assert_eq!(record.commitment_limit, Some(Decimal::from(1000)));
        assert_eq!(record.undrawn_commitment, Some(Decimal::from(750)));
    }

    #[test]
    fn test_unknown_company_is_dropped() {
        let facts = [Fact::new("us-gaap:InvestmentOwnedAtFairValue", "1", "c1")];
        let refs: Vec<&Fact> = facts.iter().collect();
        assert!(FactAggregator::new()
            .aggregate(&ParsedIdentifier::default(), &refs)
            .is_none());
    }

    #[test]
    fn test_rate_and_reference_payloads() {
        assert_eq!(parse_rate("0.0825", None).as_deref(), Some("8.25%"));
        assert_eq!(parse_rate("8.25", None).as_deref(), Some("8.25%"));
        assert_eq!(parse_rate("1.00", Some(-2)).as_deref(), Some("1%"));
        assert_eq!(parse_rate("0.75%", None).as_deref(), Some("0.75%"));
        assert_eq!(parse_rate("n/a", None), None);

        assert_eq!(
            parse_reference("us-gaap:SecuredOvernightFinancingRateSofrMember").as_deref(),
            Some("SOFR")
        );
        assert_eq!(parse_reference("Fixed").as_deref(), Some("Fixed"));
        assert_eq!(parse_reference(""), None);
    }

    #[test]
    fn test_group_by_context() {
        let facts = vec![
            Fact::new("a", "1", "c1"),
            Fact::new("b", "2", "c2"),
            Fact::new("c", "3", "c1"),
        ];
        let groups = group_by_context(&facts);
        let c1: Vec<&str> = groups["c1"].iter().map(|f| f.concept_name.as_str()).collect();
        assert_eq!(c1, vec!["a", "c"]);
        assert_eq!(groups["c2"].len(), 1);
    }
}
