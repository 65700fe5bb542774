//! Calendar-month planning for long backfills.
//!
//! A `(start, end)` month span is split into one [`MonthWindow`] per calendar
//! month. Windows end on the true last day of their month (leap years
//! included), are clamped to today, and generation stops at the first month
//! that would begin after today.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::models::{HarvestWindow, ValidationError};

/// A `YYYY-MM` month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, ValidationError> {
        if !(1..=12).contains(&month) {
            return Err(ValidationError::InvalidYearMonth(format!("{}-{:02}", year, month)));
        }
        Ok(Self { year, month })
    }

    /// Months since year 0; orders months linearly.
    pub fn linear(&self) -> i64 {
        self.year as i64 * 12 + self.month as i64
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn last_day(&self) -> Option<NaiveDate> {
        self.next().first_day()?.pred_opt()
    }
}

impl FromStr for YearMonth {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidYearMonth(s.to_string());
        let (y, m) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = y.parse().map_err(|_| invalid())?;
        let month: u32 = m.parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        Ok(Self { year, month })
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// One month of a backfill plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthWindow {
    /// `YYYY-MM`
    pub label: String,
    pub window: HarvestWindow,
}

impl MonthWindow {
    pub fn from_date(&self) -> &str {
        self.window.from_date()
    }

    pub fn until_date(&self) -> &str {
        self.window.until_date()
    }
}

/// Lazy iterator over the months of a validated span.
#[derive(Debug, Clone)]
pub struct MonthPlan {
    next: Option<YearMonth>,
    end: YearMonth,
    today: NaiveDate,
}

impl MonthPlan {
    pub fn new(start: YearMonth, end: YearMonth, today: NaiveDate) -> Result<Self, ValidationError> {
        if start.linear() > end.linear() {
            return Err(ValidationError::InvertedRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self {
            next: Some(start),
            end,
            today,
        })
    }
}

impl Iterator for MonthPlan {
    type Item = MonthWindow;

    fn next(&mut self) -> Option<MonthWindow> {
        let ym = self.next.take()?;
        if ym.linear() > self.end.linear() {
            return None;
        }
        let from = ym.first_day()?;
        if from > self.today {
            return None;
        }
        let until = ym.last_day()?.min(self.today);
        self.next = Some(ym.next());

        Some(MonthWindow {
            label: ym.to_string(),
            window: HarvestWindow::from_dates(from, until),
        })
    }
}

/// Parse `YYYY-MM` bounds and plan the backfill.
///
/// Fails before yielding anything when either bound is malformed or the span
/// is inverted.
pub fn plan_months(start: &str, end: &str, today: NaiveDate) -> Result<MonthPlan, ValidationError> {
    let start: YearMonth = start.parse()?;
    let end: YearMonth = end.parse()?;
    MonthPlan::new(start, end, today)
}

/// Human label for a plan, e.g. `2024-01..2024-03 (3 months)`.
pub fn describe(windows: &[MonthWindow]) -> String {
    match (windows.first(), windows.last()) {
        (Some(a), Some(b)) => format!(
            "{}..{} ({} month{})",
            a.label,
            b.label,
            windows.len(),
            if windows.len() == 1 { "" } else { "s" }
        ),
        _ => "empty plan".to_string(),
    }
}
