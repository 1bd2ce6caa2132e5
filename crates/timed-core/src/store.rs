//! The `TimedStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `timed-store-sqlite`).
//! The HTTP layer depends on this abstraction, not on any concrete backend.
//! Authorization happens before the store is called; read methods take the
//! caller's [`Scope`] and apply it as part of the query.

use std::future::Future;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
  access::{EntityType, Scope},
  assignment::{Assignment, NewAssignment},
  record::{EntityRecord, EntityValue, NewRecord, RecordQuery},
};

/// Backend errors that may wrap a domain [`crate::Error`].
///
/// Lets callers map domain failures (overlap, missing assignment, ...) to
/// their own responses without knowing the backend's error type.
pub trait StoreError: std::error::Error + Send + Sync + Sized + 'static {
  /// Split off the domain error, or hand back the backend error unchanged.
  fn into_core(self) -> Result<crate::Error, Self>;
}

/// Abstraction over a Timed store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait TimedStore: Send + Sync {
  type Error: StoreError;

  // ── Assignments ───────────────────────────────────────────────────────

  /// Persist a new assignment.
  ///
  /// Fails with [`crate::Error::Overlap`] if the interval intersects a
  /// non-archived assignment of the same subject. The store is unchanged on
  /// failure.
  fn add_assignment(
    &self,
    input: NewAssignment,
  ) -> impl Future<Output = Result<Assignment, Self::Error>> + Send + '_;

  /// Retrieve an assignment by id, archived or not.
  fn get_assignment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Assignment>, Self::Error>> + Send + '_;

  /// All assignments of one subject, ordered by start date ascending.
  fn list_assignments(
    &self,
    subject_id: Uuid,
    include_archived: bool,
  ) -> impl Future<Output = Result<Vec<Assignment>, Self::Error>> + Send + '_;

  /// Non-archived assignments visible under `scope`, ordered by subject and
  /// start date.
  fn list_scoped_assignments(
    &self,
    scope: Scope,
  ) -> impl Future<Output = Result<Vec<Assignment>, Self::Error>> + Send + '_;

  /// The assignment active for `subject_id` on `date`.
  ///
  /// Fails with [`crate::Error::NoAssignment`] or
  /// [`crate::Error::AmbiguousAssignment`].
  fn resolve_assignment(
    &self,
    subject_id: Uuid,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Assignment, Self::Error>> + Send + '_;

  /// Set the end date of an open assignment.
  fn close_assignment(
    &self,
    id: Uuid,
    end_date: NaiveDate,
  ) -> impl Future<Output = Result<Assignment, Self::Error>> + Send + '_;

  /// Withdraw an assignment from resolution and overlap checks.
  fn archive_assignment(
    &self,
    id: Uuid,
    reason: Option<String>,
  ) -> impl Future<Output = Result<Assignment, Self::Error>> + Send + '_;

  // ── Records ───────────────────────────────────────────────────────────

  fn create_record(
    &self,
    input: NewRecord,
  ) -> impl Future<Output = Result<EntityRecord, Self::Error>> + Send + '_;

  /// Retrieve a record of `entity_type` by id. Returns `None` if no record of
  /// that type exists.
  fn get_record(
    &self,
    entity_type: EntityType,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<EntityRecord>, Self::Error>> + Send + '_;

  /// Records of `entity_type` visible under `scope`, oldest first.
  fn list_records<'a>(
    &'a self,
    entity_type: EntityType,
    scope: Scope,
    query: &'a RecordQuery,
  ) -> impl Future<Output = Result<Vec<EntityRecord>, Self::Error>> + Send + 'a;

  /// Replace the payload of a record. The entity type cannot change.
  fn update_record(
    &self,
    id: Uuid,
    value: EntityValue,
  ) -> impl Future<Output = Result<EntityRecord, Self::Error>> + Send + '_;

  /// Delete a record. Returns `false` if it did not exist.
  fn delete_record(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
