//! Employment assignments: time-bounded contracts held by a user.
//!
//! An assignment binds a subject (the employee) to a set of contract terms
//! for an [`Interval`]. Per subject, the intervals of non-archived assignments
//! never overlap, so at most one assignment is active on any given date.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, interval::Interval};

// ─── Payload ─────────────────────────────────────────────────────────────────

/// The contract terms of an employment. Opaque to the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmploymentTerms {
  /// The `location` record the employee works at.
  pub location_id:              Uuid,
  /// Employment percentage, `0..=100`.
  pub percentage:               u8,
  pub worktime_per_day_minutes: u32,
}

impl EmploymentTerms {
  pub fn validate(&self) -> Result<()> {
    if self.percentage > 100 {
      return Err(Error::InvalidPercentage(self.percentage));
    }
    if self.worktime_per_day_minutes == 0 {
      return Err(Error::InvalidWorktime);
    }
    Ok(())
  }
}

// ─── Archival ────────────────────────────────────────────────────────────────

/// Marks an assignment as withdrawn. Archived assignments stay readable for
/// historical reports but no longer take part in resolution or overlap
/// checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archival {
  pub reason: Option<String>,
  pub at:     DateTime<Utc>,
}

// ─── Assignment ──────────────────────────────────────────────────────────────

/// A persisted employment. Apart from closing its interval once and
/// archiving it, no field changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
  pub assignment_id: Uuid,
  pub subject_id:    Uuid,
  pub interval:      Interval,
  pub terms:         EmploymentTerms,
  /// Server-assigned timestamp.
  pub recorded_at:   DateTime<Utc>,
  pub archived:      Option<Archival>,
}

impl Assignment {
  pub fn is_archived(&self) -> bool { self.archived.is_some() }
}

// ─── NewAssignment ───────────────────────────────────────────────────────────

/// Input to [`crate::store::TimedStore::add_assignment`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAssignment {
  pub subject_id: Uuid,
  #[serde(flatten)]
  pub interval:   Interval,
  pub terms:      EmploymentTerms,
}

impl NewAssignment {
  pub fn new(subject_id: Uuid, interval: Interval, terms: EmploymentTerms) -> Self {
    Self { subject_id, interval, terms }
  }
}
