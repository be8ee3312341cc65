use crate::domain::DailySummary;
use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Error, Debug, PartialEq)]
pub enum DateRangeError {
    #[error("no data to find range")]
    Empty,

    #[error("invalid date '{value}': {reason}")]
    InvalidDate { value: String, reason: String },
}

/// Span of days covered by a daily summary, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub min: NaiveDate,
    pub max: NaiveDate,
}

impl DateRange {
    pub fn from_summaries(rows: &[DailySummary]) -> Result<Self, DateRangeError> {
        let mut dates = rows.iter().map(|row| parse_date(&row.date));

        let first = dates.next().ok_or(DateRangeError::Empty)??;
        dates.try_fold(DateRange { min: first, max: first }, |range, date| {
            let date = date?;
            Ok(DateRange {
                min: range.min.min(date),
                max: range.max.max(date),
            })
        })
    }

    pub fn total_days(&self) -> i64 {
        (self.max - self.min).num_days() + 1
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}, Total Days: {}",
            self.min.format(DATE_FORMAT),
            self.max.format(DATE_FORMAT),
            self.total_days()
        )
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, DateRangeError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| DateRangeError::InvalidDate {
        value: value.to_string(),
        reason: e.to_string(),
    })
}
