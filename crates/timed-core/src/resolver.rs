//! Point-in-time resolution of temporal assignments.
//!
//! Storage backends narrow candidates with a date predicate and hand them to
//! [`resolve`], which enforces that exactly one record covers the date.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{Error, Result, assignment::Assignment, interval::Interval};

/// Anything bounded in time and owned by a subject.
pub trait Temporal {
  fn subject_id(&self) -> Uuid;
  fn interval(&self) -> &Interval;
  /// Stable identifier, reported when resolution is ambiguous.
  fn record_id(&self) -> Uuid;
  /// Inactive records never take part in resolution.
  fn is_active(&self) -> bool { true }
}

impl Temporal for Assignment {
  fn subject_id(&self) -> Uuid { self.subject_id }

  fn interval(&self) -> &Interval { &self.interval }

  fn record_id(&self) -> Uuid { self.assignment_id }

  fn is_active(&self) -> bool { !self.is_archived() }
}

/// Return the single record of `subject_id` whose interval contains `date`.
///
/// Records of other subjects and inactive records are ignored.
pub fn resolve<'a, T, I>(subject_id: Uuid, date: NaiveDate, records: I) -> Result<&'a T>
where
  T: Temporal + 'a,
  I: IntoIterator<Item = &'a T>,
{
  let mut matches = records
    .into_iter()
    .filter(|r| r.is_active())
    .filter(|r| r.subject_id() == subject_id && r.interval().contains(date));

  let Some(first) = matches.next() else {
    return Err(Error::NoAssignment { subject_id, date });
  };

  let rest: Vec<&T> = matches.collect();
  if rest.is_empty() {
    return Ok(first);
  }

  let matches: Vec<Uuid> = std::iter::once(first)
    .chain(rest)
    .map(|r| r.record_id())
    .collect();
  tracing::error!(
    %subject_id,
    %date,
    ?matches,
    "overlapping employments found during resolution"
  );
  Err(Error::AmbiguousAssignment { subject_id, date, matches })
}
