//! Pre-digested views of the OCR source text used for tolerant matching.
use chrono::NaiveDate;
use validation::normalize::{digits_only, parse_amount};

/// Amounts closer than this are treated as equal.
pub const AMOUNT_TOLERANCE: f64 = 0.005;

/// Renderings tried when looking for a date in the source text.
const DATE_RENDERINGS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%-m/%-d/%Y",
    "%m/%d/%y",
    "%-m/%-d/%y",
    "%m-%d-%Y",
    "%-m-%-d-%Y",
    "%m-%d-%y",
    "%d/%m/%Y",
    "%-d/%-m/%Y",
    "%d.%m.%Y",
    "%-d.%-m.%Y",
    "%B %-d, %Y",
    "%B %d, %Y",
    "%b %-d, %Y",
    "%b %d, %Y",
    "%b. %-d, %Y",
    "%-d %B %Y",
    "%-d %b %Y",
    "%d %b %Y",
    "%Y%m%d",
];

/// The source text indexed once for every field check of a detection pass.
///
/// ```rust
/// use hallucination::SourceIndex;
///
/// let index = SourceIndex::new("Check #12345\nPay to: John Smith\nAmount: $1,234.56");
/// assert!(index.contains_text("john  SMITH"));
/// assert!(index.contains_digits("12345"));
/// assert!(index.contains_amount(1234.56));
/// assert!(!index.contains_amount(1234.65));
/// ```
#[derive(Debug, Clone)]
pub struct SourceIndex {
    folded: String,
    lowered: String,
    line_runs: Vec<Vec<DigitRun>>,
    amounts: Vec<f64>,
}

impl SourceIndex {
    pub fn new(text: &str) -> Self {
        let folded = format!(" {} ", fold(text));
        let lowered = collapse_whitespace(&text.to_lowercase());
        let line_runs = text
            .lines()
            .map(digit_runs)
            .filter(|runs| !runs.is_empty())
            .collect();
        Self {
            folded,
            lowered,
            line_runs,
            amounts: scan_amounts(text),
        }
    }

    /// True when `value`, case-folded with punctuation dropped, appears as a
    /// whole-token sequence of the source.
    pub fn contains_text(&self, value: &str) -> bool {
        let needle = fold(value);
        !needle.is_empty() && self.folded.contains(&format!(" {needle} "))
    }

    /// True when the digits of `value` make up whole digit runs on one
    /// source line.
    ///
    /// Runs separated only by spaces or hyphens may be joined
    /// (`"0210 0002 1"`), but a match never starts or ends inside a run.
    pub fn contains_digits(&self, value: &str) -> bool {
        let needle = digits_only(value);
        !needle.is_empty()
            && self
                .line_runs
                .iter()
                .any(|runs| spans_whole_runs(runs, &needle))
    }

    /// True when some amount printed in the source equals `value` in
    /// magnitude, within [`AMOUNT_TOLERANCE`].
    pub fn contains_amount(&self, value: f64) -> bool {
        value.is_finite()
            && self
                .amounts
                .iter()
                .any(|amount| (amount - value.abs()).abs() < AMOUNT_TOLERANCE)
    }

    /// True when `date` appears in any common printed layout.
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        DATE_RENDERINGS.iter().any(|layout| {
            let rendered = date.format(layout).to_string().to_lowercase();
            self.lowered.contains(&rendered)
        })
    }

    /// Every amount found in the source, as magnitudes.
    pub fn amounts(&self) -> &[f64] {
        &self.amounts
    }
}

/// A maximal run of ASCII digits on one line.
#[derive(Debug, Clone)]
struct DigitRun {
    digits: String,
    /// Separated from the previous run by spaces or hyphens only.
    joins_previous: bool,
}

fn digit_runs(line: &str) -> Vec<DigitRun> {
    let mut runs: Vec<DigitRun> = Vec::new();
    let mut current = String::new();
    let mut gap_joinable = false;
    for c in line.chars() {
        if c.is_ascii_digit() {
            current.push(c);
            continue;
        }
        if !current.is_empty() {
            runs.push(DigitRun {
                digits: std::mem::take(&mut current),
                joins_previous: gap_joinable,
            });
            gap_joinable = true;
        }
        if c != ' ' && c != '-' {
            gap_joinable = false;
        }
    }
    if !current.is_empty() {
        runs.push(DigitRun {
            digits: current,
            joins_previous: gap_joinable,
        });
    }
    runs
}

fn spans_whole_runs(runs: &[DigitRun], needle: &str) -> bool {
    (0..runs.len()).any(|start| {
        let mut joined = String::new();
        for (offset, run) in runs[start..].iter().enumerate() {
            if offset > 0 && !run.joins_previous {
                return false;
            }
            joined.push_str(&run.digits);
            if joined.len() >= needle.len() {
                return joined == needle;
            }
        }
        false
    })
}

/// Lower-cases, turns punctuation into spaces and collapses runs of spaces.
fn fold(text: &str) -> String {
    let mapped: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect();
    collapse_whitespace(&mapped)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses every run of digits and separators as an amount.
fn scan_amounts(text: &str) -> Vec<f64> {
    let mut amounts = Vec::new();
    let mut push = |run: &str| {
        let run = run.trim_matches(|c: char| c == '.' || c == ',');
        if run.chars().any(|c| c.is_ascii_digit()) {
            if let Some(amount) = parse_amount(run) {
                amounts.push(amount.abs());
            }
        }
    };

    let mut start = None;
    for (idx, c) in text.char_indices() {
        let in_number = c.is_ascii_digit() || c == '.' || c == ',';
        match (in_number, start) {
            (true, None) => start = Some(idx),
            (false, Some(from)) => {
                push(&text[from..idx]);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(from) = start {
        push(&text[from..]);
    }
    amounts
}
