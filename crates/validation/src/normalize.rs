//! Canonical forms for the loosely formatted values OCR text tends to carry.
//!
//! Amounts arrive as `"$1,234.56"`, `"1.234,56 EUR"` or `"(12.00)"`; dates as
//! `"03/05/2024"` or `"March 5, 2024"`. The helpers here turn them into a
//! single representation so validation and source matching compare like with
//! like. Every helper returns `None` (or the input) rather than failing.
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat};

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥', '₹', '₩', '¢'];

/// Date-only layouts accepted by [`parse_timestamp`].
///
/// Two-digit years come before `%Y`, which would otherwise read `24` as year 24.
/// Parses landing outside [`PLAUSIBLE_YEARS`] are discarded.
pub const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%m-%d-%y",
    "%m-%d-%Y",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%b. %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%Y%m%d",
];

/// Years a document date can reasonably carry.
pub const PLAUSIBLE_YEARS: std::ops::RangeInclusive<i32> = 1900..=2199;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M %p",
];

/// Parses a monetary amount written the way receipts and checks write them.
///
/// Handles currency symbols and ISO codes on either side, thousands
/// separators in either convention, and accounting-style negatives.
///
/// ```rust
/// use validation::normalize::parse_amount;
///
/// assert_eq!(parse_amount("$1,234.56"), Some(1234.56));
/// assert_eq!(parse_amount("1.234,56 EUR"), Some(1234.56));
/// assert_eq!(parse_amount("(12.00)"), Some(-12.0));
/// assert_eq!(parse_amount("twelve"), None);
/// ```
pub fn parse_amount(raw: &str) -> Option<f64> {
    let mut body = raw.trim();
    let mut negative = false;

    if let Some(inner) = body.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
        negative = true;
        body = inner.trim();
    }

    loop {
        let before = body;
        body = body.trim_start_matches(is_currency_noise);
        if let Some(rest) = body.strip_prefix('-') {
            negative = !negative;
            body = rest;
        }
        if body.len() == before.len() {
            break;
        }
    }
    body = body.trim_end_matches(is_currency_noise);
    if let Some(rest) = body.strip_suffix('-') {
        negative = !negative;
        body = rest.trim_end();
    }

    if body.is_empty() || !body.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    if !body
        .chars()
        .all(|c| c.is_ascii_digit() || c == ',' || c == '.' || c == ' ' || c == '\'')
    {
        return None;
    }

    let compact: String = body.chars().filter(|c| *c != ' ' && *c != '\'').collect();
    let canonical = canonical_decimal(&compact)?;
    let value: f64 = canonical.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

fn is_currency_noise(c: char) -> bool {
    c.is_whitespace() || c.is_alphabetic() || CURRENCY_SYMBOLS.contains(&c)
}

/// Rewrites `1,234.56` / `1.234,56` / `12,5` into `1234.56` / `1234.56` / `12.5`.
fn canonical_decimal(text: &str) -> Option<String> {
    let commas = text.matches(',').count();
    let dots = text.matches('.').count();

    let decimal = match (commas, dots) {
        (0, 0) => None,
        (_, 0) => {
            let tail = text.rsplit(',').next().unwrap_or_default();
            if commas == 1 && (1..=2).contains(&tail.len()) {
                Some(',')
            } else {
                None
            }
        }
        (0, 1) => Some('.'),
        (0, _) => None,
        _ => {
            let last_comma = text.rfind(',')?;
            let last_dot = text.rfind('.')?;
            if last_dot > last_comma { Some('.') } else { Some(',') }
        }
    };

    let (int_part, frac_part) = match decimal {
        Some(sep) => {
            let idx = text.rfind(sep)?;
            (&text[..idx], Some(&text[idx + 1..]))
        }
        None => (text, None),
    };

    let digits: String = int_part.chars().filter(char::is_ascii_digit).collect();
    if int_part.chars().any(|c| c == '.' || c == ',') && !grouping_is_plausible(int_part) {
        return None;
    }

    match frac_part {
        Some(frac) if frac.chars().all(|c| c.is_ascii_digit()) && !frac.is_empty() => {
            let int_digits = if digits.is_empty() { "0".to_owned() } else { digits };
            Some(format!("{int_digits}.{frac}"))
        }
        Some(_) => None,
        None if digits.is_empty() => None,
        None => Some(digits),
    }
}

/// Thousands groups after the first must be exactly three digits.
fn grouping_is_plausible(int_part: &str) -> bool {
    let mut groups = int_part.split([',', '.']);
    let first_ok = groups
        .next()
        .is_some_and(|g| (1..=3).contains(&g.len()) && g.chars().all(|c| c.is_ascii_digit()));
    first_ok && groups.all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()))
}

/// Trims and upper-cases an ISO 4217 code; symbols map to their usual codes.
///
/// ```rust
/// use validation::normalize::canonical_currency;
///
/// assert_eq!(canonical_currency(" usd "), "USD");
/// assert_eq!(canonical_currency("€"), "EUR");
/// ```
pub fn canonical_currency(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed {
        "$" | "US$" => "USD".to_owned(),
        "€" => "EUR".to_owned(),
        "£" => "GBP".to_owned(),
        "¥" => "JPY".to_owned(),
        "₹" => "INR".to_owned(),
        other => other.to_uppercase(),
    }
}

/// A parsed date or timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    /// Calendar date without a time of day.
    Date(NaiveDate),
    /// Date and time with an explicit offset.
    Zoned(DateTime<FixedOffset>),
    /// Date and time with no offset; read as UTC.
    Local(NaiveDateTime),
}

impl Timestamp {
    /// RFC 3339 for timestamps, `YYYY-MM-DD` for plain dates.
    pub fn canonical(&self) -> String {
        match self {
            Timestamp::Date(date) => date.format("%Y-%m-%d").to_string(),
            Timestamp::Zoned(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
            Timestamp::Local(dt) => dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        }
    }

    /// Calendar date component.
    pub fn date(&self) -> NaiveDate {
        match self {
            Timestamp::Date(date) => *date,
            Timestamp::Zoned(dt) => dt.date_naive(),
            Timestamp::Local(dt) => dt.date(),
        }
    }

    pub fn has_time(&self) -> bool {
        !matches!(self, Timestamp::Date(_))
    }
}

/// Parses the date and timestamp layouts commonly printed on documents.
///
/// ```rust
/// use validation::normalize::parse_timestamp;
///
/// let ts = parse_timestamp("March 5, 2024").unwrap();
/// assert_eq!(ts.canonical(), "2024-03-05");
///
/// let ts = parse_timestamp("2024-03-05T10:30:00+02:00").unwrap();
/// assert_eq!(ts.canonical(), "2024-03-05T10:30:00+02:00");
/// ```
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(Timestamp::Zoned(dt));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(Timestamp::Zoned(dt));
    }
    let local = DATETIME_FORMATS
        .iter()
        .filter_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .find(|dt| PLAUSIBLE_YEARS.contains(&dt.year()));
    if let Some(dt) = local {
        return Some(Timestamp::Local(dt));
    }
    DATE_FORMATS
        .iter()
        .filter_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .find(|date| PLAUSIBLE_YEARS.contains(&date.year()))
        .map(Timestamp::Date)
}

/// Canonical form of a date or timestamp string, if it parses.
pub fn canonical_timestamp(raw: &str) -> Option<String> {
    parse_timestamp(raw).map(|ts| ts.canonical())
}

/// ASCII digits of `raw`, in order.
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}
