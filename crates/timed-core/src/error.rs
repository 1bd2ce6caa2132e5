//! Error types for `timed-core`.

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::{
  access::{Action, EntityType},
  assignment::Assignment,
};

#[derive(Debug, Error)]
pub enum Error {
  // ── Temporal resolution ─────────────────────────────────────────────────

  #[error("user {subject_id} had no employment on {date}")]
  NoAssignment { subject_id: Uuid, date: NaiveDate },

  /// More than one record covers the date. Only reachable when the
  /// non-overlap invariant was broken underneath the store.
  #[error(
    "user {subject_id} has {} overlapping employments on {date}",
    .matches.len()
  )]
  AmbiguousAssignment {
    subject_id: Uuid,
    date:       NaiveDate,
    matches:    Vec<Uuid>,
  },

  #[error(
    "employment for user {subject_id} overlaps existing employment {}",
    .conflicting.assignment_id
  )]
  Overlap {
    subject_id:  Uuid,
    conflicting: Box<Assignment>,
  },

  // ── Authorization ───────────────────────────────────────────────────────

  #[error("user {principal} may not {action} {entity_type} records")]
  PermissionDenied {
    principal:   Uuid,
    action:      Action,
    entity_type: EntityType,
  },

  // ── Validation ──────────────────────────────────────────────────────────

  #[error("date {0} is outside the supported range 0000-01-01 to 9999-12-31")]
  DateOutOfRange(NaiveDate),

  #[error("end date {end} is before start date {start}")]
  InvalidInterval { start: NaiveDate, end: NaiveDate },

  #[error("percentage must be between 0 and 100, got {0}")]
  InvalidPercentage(u8),

  #[error("work time per day must be positive")]
  InvalidWorktime,

  #[error("{0} records require an owner")]
  OwnerRequired(EntityType),

  #[error("{0} records cannot have an owner")]
  OwnerNotAllowed(EntityType),

  #[error("payload of type {found} does not belong in {expected} records")]
  EntityTypeMismatch {
    expected: EntityType,
    found:    EntityType,
  },

  /// The parent a record points at is missing or has a different owner.
  #[error("{entity_type} {id} does not exist for the record's owner")]
  InvalidParent { entity_type: EntityType, id: Uuid },

  #[error("unknown entity type: {0:?}")]
  UnknownEntityType(String),

  // ── Lifecycle ───────────────────────────────────────────────────────────

  #[error("employment not found: {0}")]
  AssignmentNotFound(Uuid),

  #[error("record not found: {0}")]
  RecordNotFound(Uuid),

  #[error("employment {0} is already closed")]
  AlreadyClosed(Uuid),

  #[error("employment {0} is already archived")]
  AlreadyArchived(Uuid),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
