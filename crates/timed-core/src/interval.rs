//! Inclusive calendar-date intervals.
//!
//! An employment is valid from its start date up to and including its end
//! date. A missing end date means the interval is still open.

use std::ops::RangeInclusive;

use chrono::{Datelike as _, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Years a stored date may fall in. Dates are kept as `YYYY-MM-DD` text,
/// which only sorts chronologically for four-digit years.
const SUPPORTED_YEARS: RangeInclusive<i32> = 0..=9999;

/// Reject dates that storage cannot order correctly.
pub fn check_date(date: NaiveDate) -> Result<NaiveDate> {
  if SUPPORTED_YEARS.contains(&date.year()) {
    Ok(date)
  } else {
    Err(Error::DateOutOfRange(date))
  }
}

/// A date range `[start_date, end_date]`, both bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IntervalParts")]
pub struct Interval {
  start_date: NaiveDate,
  end_date:   Option<NaiveDate>,
}

#[derive(Deserialize)]
struct IntervalParts {
  start_date: NaiveDate,
  end_date:   Option<NaiveDate>,
}

impl TryFrom<IntervalParts> for Interval {
  type Error = Error;

  fn try_from(parts: IntervalParts) -> Result<Self> {
    Self::new(parts.start_date, parts.end_date)
  }
}

impl Interval {
  /// Build an interval, rejecting an end date that precedes the start date.
  pub fn new(start_date: NaiveDate, end_date: Option<NaiveDate>) -> Result<Self> {
    check_date(start_date)?;
    end_date.map(check_date).transpose()?;
    if let Some(end) = end_date
      && end < start_date
    {
      return Err(Error::InvalidInterval { start: start_date, end });
    }
    Ok(Self { start_date, end_date })
  }

  /// An interval with no end date.
  pub fn open(start_date: NaiveDate) -> Result<Self> { Self::new(start_date, None) }

  pub fn start_date(&self) -> NaiveDate { self.start_date }

  pub fn end_date(&self) -> Option<NaiveDate> { self.end_date }

  pub fn is_open(&self) -> bool { self.end_date.is_none() }

  /// Whether `date` falls inside the interval (bounds included).
  pub fn contains(&self, date: NaiveDate) -> bool {
    self.start_date <= date && self.end_date.is_none_or(|end| end >= date)
  }

  /// Whether the two intervals share at least one day.
  pub fn overlaps(&self, other: &Interval) -> bool {
    self.start_date <= other.last_day() && other.start_date <= self.last_day()
  }

  /// Close an open interval on `end_date`.
  pub fn close(&self, end_date: NaiveDate) -> Result<Self> {
    Self::new(self.start_date, Some(end_date))
  }

  fn last_day(&self) -> NaiveDate { self.end_date.unwrap_or(NaiveDate::MAX) }
}

impl std::fmt::Display for Interval {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self.end_date {
      Some(end) => write!(f, "{} - {}", self.start_date, end),
      None => write!(f, "{} - today", self.start_date),
    }
  }
}
