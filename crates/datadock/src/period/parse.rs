//! Tolerant parsing of period markers: the textual time values (`2024-01`,
//! `Q1 2024`, `March 2024`) that order a dataset's rows.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

/// Granularity of a parsed period, finest first. Only used to break ties
/// between periods starting on the same day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PeriodGrain {
    Day,
    Month,
    Quarter,
    Year,
}

/// A parsed period marker. Ordering compares the period's start date;
/// periods starting on the same day order by grain, finest first. The
/// original spelling is kept for reporting.
#[derive(Debug, Clone)]
pub struct PeriodValue {
    raw: String,
    start: NaiveDate,
    grain: PeriodGrain,
}

impl PeriodValue {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn grain(&self) -> PeriodGrain {
        self.grain
    }
}

impl PartialEq for PeriodValue {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start && self.grain == other.grain
    }
}

impl Eq for PeriodValue {}

impl Ord for PeriodValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.start
            .cmp(&other.start)
            .then(self.grain.cmp(&other.grain))
    }
}

impl PartialOrd for PeriodValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for PeriodValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Attempts to parse a single period marker. Returns `None` for values no
/// known format accepts; callers collect those instead of failing.
pub fn parse_period(value: &str) -> Option<PeriodValue> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    try_full_date(trimmed)
        .or_else(|| try_year_month(trimmed))
        .or_else(|| try_quarter(trimmed))
        .or_else(|| try_year(trimmed))
        .or_else(|| try_month_name(trimmed))
        .map(|(start, grain)| PeriodValue {
            raw: trimmed.to_string(),
            start,
            grain,
        })
}

fn try_full_date(value: &str) -> Option<(NaiveDate, PeriodGrain)> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Some((parsed, PeriodGrain::Day));
        }
    }
    None
}

fn try_year_month(value: &str) -> Option<(NaiveDate, PeriodGrain)> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^(\d{4})[-/](\d{1,2})$").unwrap());
    let caps = re.captures(value)?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    Some((start, PeriodGrain::Month))
}

fn try_quarter(value: &str) -> Option<(NaiveDate, PeriodGrain)> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:q([1-4])[\s_-]*(\d{4})|(\d{4})[\s_-]*q([1-4]))$").unwrap()
    });
    let caps = re.captures(value)?;
    let (quarter, year): (u32, i32) = match (caps.get(1), caps.get(3)) {
        (Some(q), _) => (q.as_str().parse().ok()?, caps[2].parse().ok()?),
        (None, Some(y)) => (caps[4].parse().ok()?, y.as_str().parse().ok()?),
        _ => return None,
    };
    let start = NaiveDate::from_ymd_opt(year, (quarter - 1) * 3 + 1, 1)?;
    Some((start, PeriodGrain::Quarter))
}

fn try_year(value: &str) -> Option<(NaiveDate, PeriodGrain)> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^\d{4}$").unwrap());
    if !re.is_match(value) {
        return None;
    }
    let year: i32 = value.parse().ok()?;
    let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
    Some((start, PeriodGrain::Year))
}

fn try_month_name(value: &str) -> Option<(NaiveDate, PeriodGrain)> {
    const MONTH_FORMATS: &[&str] = &["%B %Y %d", "%b %Y %d", "%Y %B %d", "%Y %b %d"];
    // chrono needs a day; pin the parse to the first of the month
    let padded = format!("{} 1", value);
    for fmt in MONTH_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(&padded, fmt) {
            return Some((parsed, PeriodGrain::Month));
        }
    }
    None
}

/// Period values extracted from a table column: parsed values sorted
/// ascending (row duplicates kept), unparsable originals listed separately.
#[derive(Debug, Clone, Default)]
pub struct ParsedPeriods {
    pub periods: Vec<PeriodValue>,
    pub unparsed: Vec<String>,
}

pub fn parse_periods<S: AsRef<str>>(values: &[S]) -> ParsedPeriods {
    let mut periods = Vec::new();
    let mut unparsed = Vec::new();
    for value in values {
        let value = value.as_ref();
        if value.trim().is_empty() {
            continue;
        }
        match parse_period(value) {
            Some(period) => periods.push(period),
            None => unparsed.push(value.trim().to_string()),
        }
    }
    periods.sort();
    ParsedPeriods { periods, unparsed }
}
