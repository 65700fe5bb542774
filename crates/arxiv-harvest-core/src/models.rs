//! Core data models shared by the harvest pipeline.
//!
//! [`NormalizedDocument`] is the unit written to the document store and
//! [`HarvestWindow`] is the inclusive date range one harvest covers. Dates are
//! kept as fixed-width `YYYY-MM-DD` strings so that plain string comparison
//! matches chronological order.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Date format used for windows and the `created` field.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A harvested paper, normalized for indexing.
///
/// Serializes to exactly the six fields of the index schema. `id` is the
/// store's primary key, so re-ingesting the same paper overwrites it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedDocument {
    /// arXiv identifier with any trailing `vN` removed.
    #[serde(rename = "arxiv_id")]
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub categories: Vec<String>,
    /// `YYYY-MM-DD`, or empty when the record carried no creation date.
    pub created: String,
}

/// Invalid user input, detected before any network activity.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("invalid month '{0}': expected YYYY-MM with a month in 1..=12")]
    InvalidYearMonth(String),
    #[error("start must be <= end: {start} > {end}")]
    InvertedRange { start: String, end: String },
    #[error("window starts in the future: {from} is after today ({today})")]
    FutureWindow { from: String, today: String },
}

/// Inclusive `(from_date, until_date)` range.
///
/// Construction clamps `until_date` to today because the OAI endpoint rejects
/// future dates, and guarantees `from_date <= until_date`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestWindow {
    from_date: String,
    until_date: String,
}

impl HarvestWindow {
    /// Validate and build a window from two `YYYY-MM-DD` strings.
    pub fn new(from: &str, until: &str, today: NaiveDate) -> Result<Self, ValidationError> {
        let from_d = parse_date(from)?;
        let until_d = parse_date(until)?;

        if from_d > until_d {
            return Err(ValidationError::InvertedRange {
                start: from.to_string(),
                end: until.to_string(),
            });
        }
        if from_d > today {
            return Err(ValidationError::FutureWindow {
                from: from.to_string(),
                today: format_date(today),
            });
        }

        Ok(Self::from_dates(from_d, until_d.min(today)))
    }

    /// Build a window from dates already known to be ordered.
    pub(crate) fn from_dates(from: NaiveDate, until: NaiveDate) -> Self {
        debug_assert!(from <= until);
        Self {
            from_date: format_date(from),
            until_date: format_date(until),
        }
    }

    pub fn from_date(&self) -> &str {
        &self.from_date
    }

    pub fn until_date(&self) -> &str {
        &self.until_date
    }

    /// Whether a `created` date string falls inside the window (inclusive).
    pub fn contains(&self, created: &str) -> bool {
        self.from_date.as_str() <= created && created <= self.until_date.as_str()
    }
}

impl std::fmt::Display for HarvestWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.from_date, self.until_date)
    }
}

/// Parse a strict, zero-padded `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate, ValidationError> {
    let s = s.trim();
    if s.len() != 10 {
        return Err(ValidationError::InvalidDate(s.to_string()));
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| ValidationError::InvalidDate(s.to_string()))
}

pub fn format_date(d: NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}
