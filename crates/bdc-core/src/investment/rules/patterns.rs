//! Common regex patterns for schedule-of-investments extraction.

use lazy_static::lazy_static;
use regex::Regex;

/// Month names and abbreviations, optionally followed by a period.
const MONTH: &str = r"(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?";

/// Word stems that mark a lone unlabelled date as an acquisition date.
pub const ACQUISITION_STEMS: &[&str] = &["acqui", "originat", "invest", "purchas", "initial"];

lazy_static! {
    /// Date alternatives, most specific first.
    pub static ref DATE_TEXT: String = format!(
        r"(?:\d{{1,2}}/\d{{1,2}}/\d{{2,4}}|\d{{4}}-\d{{2}}-\d{{2}}|{month}\s+\d{{1,2}},?\s+\d{{4}}|\d{{1,2}}/\d{{4}}|{month}\s+\d{{4}})",
        month = MONTH
    );

    // Dates
    pub static ref BARE_DATE: Regex = Regex::new(
        &format!(r"(?i)\b{}\b", *DATE_TEXT)
    ).unwrap();

    pub static ref LABELLED_DATE: Regex = Regex::new(&format!(
        r"(?i)\b(?P<label>initial\s+acquisition\s+date|acquisition\s+date|acquired|acquisition|investment\s+date|origination\s+date|purchase\s+date|maturity\s+date|maturity|matures|due\s+date|due|expiration\s+date|expiration|expires)\s*:?\s*(?P<date>{})\b",
        *DATE_TEXT
    )).unwrap();

    // Rates
    pub static ref REFERENCE_SPREAD: Regex = Regex::new(
        r"(?i)\b(?P<reference>(?:(?:1|3|6|12)\s*m(?:onth)?\s+)?(?:term\s+)?(?:sofr|libor|euribor|cdor|prime(?:\s+rate)?|(?:alternate\s+)?base\s+rate|fed(?:eral)?\s+funds(?:\s+rate)?)|(?-i:[SLPE]))(?:\s*\([^)]{1,12}\))?\s*(?:\+|plus)\s*(?P<spread>\d+(?:\.\d+)?)\s*%"
    ).unwrap();

    pub static ref REFERENCE_BARE: Regex = Regex::new(
        r"(?i)\b(?:(?:1|3|6|12)\s*m(?:onth)?\s+)?(?:term\s+)?(?P<reference>sofr|libor|euribor|cdor|prime\s+rate|(?:alternate\s+)?base\s+rate|fed(?:eral)?\s+funds(?:\s+rate)?)\b"
    ).unwrap();

    pub static ref PIK_RATE: Regex = Regex::new(
        r"(?i)(?:\b(?P<lead>\d+(?:\.\d+)?)\s*%\s*pik\b|\bpik(?:\s+(?:rate|interest))?\s*:?\s*(?P<trail>\d+(?:\.\d+)?)\s*%)"
    ).unwrap();

    pub static ref FLOOR_RATE: Regex = Regex::new(
        r"(?i)(?:\b(?P<lead>\d+(?:\.\d+)?)\s*%\s*floor\b|\bfloor(?:\s+rate)?\s*:?\s*(?:of\s+)?(?P<trail>\d+(?:\.\d+)?)\s*%)"
    ).unwrap();

    pub static ref SPREAD_LABELLED: Regex = Regex::new(
        r"(?i)\b(?:spread|margin)\s*:?\s*(?P<spread>\d+(?:\.\d+)?)\s*%"
    ).unwrap();

    pub static ref INTEREST_RATE: Regex = Regex::new(
        r"(?i)\b(?:interest\s+rate|all[-\s]in\s+rate|coupon(?:\s+rate)?|cash\s+(?:interest|rate)|fixed(?:\s+rate)?|rate)\s*:?\s*(?P<rate>\d+(?:\.\d+)?)\s*%"
    ).unwrap();

    pub static ref BARE_PERCENT: Regex = Regex::new(
        r"(?P<rate>\b\d+(?:\.\d+)?)\s*%"
    ).unwrap();

    // Identifier clean-up
    pub static ref FOOTNOTE: Regex = Regex::new(
        r"\(\s*\d{1,3}\s*\)"
    ).unwrap();

    pub static ref WHITESPACE: Regex = Regex::new(
        r"\s+"
    ).unwrap();

    pub static ref EMPTY_PARENS: Regex = Regex::new(
        r"\(\s*[,;:]*\s*\)"
    ).unwrap();

    pub static ref REPEATED_SEPARATORS: Regex = Regex::new(
        r"\s*([,;])(?:\s*[,;])+"
    ).unwrap();

    pub static ref SPACE_BEFORE_PUNCT: Regex = Regex::new(
        r"\s+([,;])"
    ).unwrap();

    pub static ref TRAILING_PARENTHETICAL: Regex = Regex::new(
        r"\s*\([^()]*\)\s*$"
    ).unwrap();

    // Table cells
    pub static ref MONEY: Regex = Regex::new(
        r"^(?P<neg>-)?\(?\s*\$?\s*(?P<num>\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)\s*\)?$"
    ).unwrap();

    pub static ref TOTAL_ROW: Regex = Regex::new(
        r"(?i)^\s*(?:sub-?)?totals?\b"
    ).unwrap();

    pub static ref PERCENT_BANNER: Regex = Regex::new(
        r"(?i)\s*[-–—:]?\s*\(?\s*\d+(?:\.\d+)?\s*%(?:\s+of\s+(?:total\s+)?net\s+assets)?\s*\)?\s*$"
    ).unwrap();
}
