//! Date extraction for instrument identifiers and table cells.

use chrono::NaiveDate;

use super::patterns::{ACQUISITION_STEMS, BARE_DATE, LABELLED_DATE};
use super::{ExtractionMatch, FieldExtractor};

/// What a date means for an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRole {
    Acquisition,
    Maturity,
}

impl DateRole {
    /// Classify a date label ("Maturity Date", "Acquired", ...).
    pub fn from_label(label: &str) -> Self {
        let label = label.to_lowercase();
        if ACQUISITION_STEMS.iter().any(|stem| label.contains(stem)) {
            DateRole::Acquisition
        } else {
            DateRole::Maturity
        }
    }
}

/// Unlabelled date extractor. Dates keep the filer's own text.
pub struct DateExtractor;

impl DateExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for DateExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        BARE_DATE
            .find_iter(text)
            .filter(|m| parse_date(m.as_str()).is_some())
            .map(|m| ExtractionMatch::new(m.as_str().to_string(), m.start(), m.end(), m.as_str()))
            .collect()
    }
}

/// Labelled date extractor ("Maturity Date 6/30/2028").
pub struct LabelledDateExtractor;

impl FieldExtractor for LabelledDateExtractor {
    type Output = ExtractionMatch<(DateRole, String)>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        LABELLED_DATE
            .captures_iter(text)
            .filter_map(|caps| {
                let full = caps.get(0)?;
                let role = DateRole::from_label(caps.name("label")?.as_str());
                let date = caps.name("date")?.as_str();
                parse_date(date)?;
                Some(ExtractionMatch::new(
                    (role, date.to_string()),
                    full.start(),
                    full.end(),
                    full.as_str(),
                ))
            })
            .collect()
    }
}

/// Classify a lone unlabelled date by the words around it.
///
/// Defaults to maturity unless an acquisition stem appears within
/// `window` characters on either side.
pub fn classify_single_date(text: &str, start: usize, end: usize, window: usize) -> DateRole {
    let before = char_window_before(text, start, window).to_lowercase();
    let after = char_window_after(text, end, window).to_lowercase();

    if ACQUISITION_STEMS
        .iter()
        .any(|stem| before.contains(stem) || after.contains(stem))
    {
        DateRole::Acquisition
    } else {
        DateRole::Maturity
    }
}

fn char_window_before(text: &str, start: usize, window: usize) -> &str {
    let head = &text[..start];
    let from = head
        .char_indices()
        .rev()
        .nth(window.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    if window == 0 { "" } else { &head[from..] }
}

fn char_window_after(text: &str, end: usize, window: usize) -> &str {
    let tail = &text[end..];
    let to = tail
        .char_indices()
        .nth(window)
        .map(|(i, _)| i)
        .unwrap_or(tail.len());
    &tail[..to]
}

/// Parse the date formats filers use in schedules.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim().trim_end_matches(',');
    let cleaned = s.replace('.', "").replace(',', ", ");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    // m/d/yy, before %Y reads "28" as year 28
    let parts: Vec<&str> = cleaned.split('/').collect();
    if parts.len() == 3 && parts[2].len() == 2 {
        let month: u32 = parts[0].parse().ok()?;
        let day: u32 = parts[1].parse().ok()?;
        return NaiveDate::from_ymd_opt(parse_year(parts[2])?, month, day);
    }

    for format in ["%m/%d/%Y", "%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%B %d %Y", "%b %d %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, format) {
            return Some(date);
        }
    }

    // m/yyyy: first of the month
    if parts.len() == 2 && parts[1].len() == 4 {
        let month: u32 = parts[0].parse().ok()?;
        return NaiveDate::from_ymd_opt(parts[1].parse().ok()?, month, 1);
    }

    // "Month yyyy" / "Sept yyyy": first of the month
    let words: Vec<&str> = cleaned.split(' ').collect();
    if words.len() == 2 {
        let month = month_number(words[0])?;
        return NaiveDate::from_ymd_opt(words[1].parse().ok()?, month, 1);
    }

    // "Sept 30, 2028" is not covered by %b
    if words.len() == 3 {
        let month = month_number(words[0])?;
        let day: u32 = words[1].trim_end_matches(',').parse().ok()?;
        return NaiveDate::from_ymd_opt(words[2].parse().ok()?, month, day);
    }

    None
}

fn parse_year(s: &str) -> Option<i32> {
    let year: i32 = s.parse().ok()?;
    Some(if year < 100 {
        // Two-digit year: assume 2000s for 00-69, 1900s for 70-99
        if year < 70 { 2000 + year } else { 1900 + year }
    } else {
        year
    })
}

fn month_number(word: &str) -> Option<u32> {
    let word = word.to_lowercase();
    let prefix: String = word.chars().take(3).collect();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}
