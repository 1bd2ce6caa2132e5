//! [`SqliteStore`] is the SQLite implementation of [`TimedStore`].

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use timed_core::{
  access::{EntityType, Scope},
  assignment::{Archival, Assignment, NewAssignment},
  interval::check_date,
  record::{EntityRecord, EntityValue, NewRecord, RecordQuery},
  resolver,
  store::TimedStore,
};

use crate::{
  Error, Result,
  encode::{
    ASSIGNMENT_COLUMNS, OPEN_END, RECORD_COLUMNS, RawAssignment, RawRecord, encode_date,
    encode_dt, encode_entity_type, encode_uuid,
  },
  schema::SCHEMA,
};

/// Default page size for record listings.
const DEFAULT_LIMIT: usize = 100;
/// Largest page a single listing returns.
pub(crate) const MAX_LIMIT: usize = 1000;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Timed store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch a single assignment row, archived or not.
  async fn fetch_assignment(&self, id: Uuid) -> Result<Option<Assignment>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawAssignment> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {ASSIGNMENT_COLUMNS}
                 FROM assignments a
                 LEFT JOIN archivals r ON r.assignment_id = a.assignment_id
                 WHERE a.assignment_id = ?1"
              ),
              rusqlite::params![id_str],
              RawAssignment::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAssignment::into_assignment).transpose()
  }

  /// Fetch an assignment that must exist and must not be archived.
  async fn live_assignment(&self, id: Uuid) -> Result<Assignment> {
    let assignment = self
      .fetch_assignment(id)
      .await?
      .ok_or(timed_core::Error::AssignmentNotFound(id))?;
    if assignment.is_archived() {
      return Err(timed_core::Error::AlreadyArchived(id).into());
    }
    Ok(assignment)
  }

  /// Fetch a record row regardless of its entity type.
  async fn fetch_record(&self, id: Uuid) -> Result<Option<EntityRecord>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawRecord> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {RECORD_COLUMNS} FROM records WHERE record_id = ?1"),
              rusqlite::params![id_str],
              RawRecord::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }
}

/// `LIMIT` and `OFFSET` bind values for a record query.
pub(crate) fn page(query: &RecordQuery) -> (i64, i64) {
  let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
  let offset = query.offset.unwrap_or(0);
  (
    i64::try_from(limit).unwrap_or(i64::MAX),
    i64::try_from(offset).unwrap_or(i64::MAX),
  )
}

/// Whether `parent` names a record of its entity type held by `owner`.
fn parent_matches(
  conn: &rusqlite::Connection,
  parent: Option<&(String, String)>,
  owner: Option<&str>,
) -> rusqlite::Result<bool> {
  let Some((type_str, id_str)) = parent else {
    return Ok(true);
  };
  conn.query_row(
    "SELECT EXISTS (
       SELECT 1 FROM records
       WHERE record_id = ?1 AND entity_type = ?2 AND owner_id IS ?3
     )",
    rusqlite::params![id_str, type_str, owner],
    |row| row.get(0),
  )
}

fn invalid_parent((entity_type, id): (EntityType, Uuid)) -> timed_core::Error {
  timed_core::Error::InvalidParent { entity_type, id }
}

/// The owner column a scope restricts to, or `None` for no restriction.
/// [`Scope::Empty`] must be handled before building a query.
fn scope_owner(scope: Scope) -> Option<String> {
  match scope {
    Scope::Owner(id) => Some(encode_uuid(id)),
    Scope::All | Scope::Empty => None,
  }
}

// ─── TimedStore impl ─────────────────────────────────────────────────────────

impl TimedStore for SqliteStore {
  type Error = Error;

  // ── Assignments ───────────────────────────────────────────────────────────

  async fn add_assignment(&self, input: NewAssignment) -> Result<Assignment> {
    input.terms.validate()?;

    let assignment = Assignment {
      assignment_id: Uuid::new_v4(),
      subject_id:    input.subject_id,
      interval:      input.interval,
      terms:         input.terms,
      recorded_at:   Utc::now(),
      archived:      None,
    };

    let id_str       = encode_uuid(assignment.assignment_id);
    let subject_str  = encode_uuid(assignment.subject_id);
    let start_str    = encode_date(assignment.interval.start_date());
    let end_str      = assignment.interval.end_date().map(encode_date);
    let location_str = encode_uuid(assignment.terms.location_id);
    let percentage   = i64::from(assignment.terms.percentage);
    let worktime     = i64::from(assignment.terms.worktime_per_day_minutes);
    let at_str       = encode_dt(assignment.recorded_at);

    // The overlap check and the insert share one immediate transaction, so
    // no other writer can slip a conflicting row in between.
    let conflict: Option<RawAssignment> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let last_day = end_str.clone().unwrap_or_else(|| OPEN_END.to_owned());
        let conflict = tx
          .query_row(
            &format!(
              "SELECT {ASSIGNMENT_COLUMNS}
               FROM assignments a
               LEFT JOIN archivals r ON r.assignment_id = a.assignment_id
               WHERE a.subject_id = ?1
                 AND r.archival_id IS NULL
                 AND a.start_date <= ?3
                 AND COALESCE(a.end_date, '{OPEN_END}') >= ?2
               ORDER BY a.start_date
               LIMIT 1"
            ),
            rusqlite::params![subject_str, start_str, last_day],
            RawAssignment::from_row,
          )
          .optional()?;

        if conflict.is_none() {
          tx.execute(
            "INSERT INTO assignments (
               assignment_id, subject_id, start_date, end_date,
               location_id, percentage, worktime_per_day_minutes, recorded_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
              id_str,
              subject_str,
              start_str,
              end_str,
              location_str,
              percentage,
              worktime,
              at_str,
            ],
          )?;
        }

        tx.commit()?;
        Ok(conflict)
      })
      .await?;

    if let Some(raw) = conflict {
      let conflicting = raw.into_assignment()?;
      tracing::info!(
        subject_id = %assignment.subject_id,
        conflicting = %conflicting.assignment_id,
        "rejected overlapping employment"
      );
      return Err(
        timed_core::Error::Overlap {
          subject_id:  assignment.subject_id,
          conflicting: Box::new(conflicting),
        }
        .into(),
      );
    }

    tracing::info!(
      assignment_id = %assignment.assignment_id,
      subject_id = %assignment.subject_id,
      interval = %assignment.interval,
      "recorded employment"
    );
    Ok(assignment)
  }

  async fn get_assignment(&self, id: Uuid) -> Result<Option<Assignment>> {
    self.fetch_assignment(id).await
  }

  async fn list_assignments(
    &self,
    subject_id:       Uuid,
    include_archived: bool,
  ) -> Result<Vec<Assignment>> {
    let subject_str = encode_uuid(subject_id);

    let raws: Vec<RawAssignment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ASSIGNMENT_COLUMNS}
           FROM assignments a
           LEFT JOIN archivals r ON r.assignment_id = a.assignment_id
           WHERE a.subject_id = ?1
             AND (?2 OR r.archival_id IS NULL)
           ORDER BY a.start_date, a.recorded_at"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![subject_str, include_archived],
            RawAssignment::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAssignment::into_assignment).collect()
  }

  async fn list_scoped_assignments(&self, scope: Scope) -> Result<Vec<Assignment>> {
    if scope == Scope::Empty {
      return Ok(Vec::new());
    }
    let owner = scope_owner(scope);

    let raws: Vec<RawAssignment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ASSIGNMENT_COLUMNS}
           FROM assignments a
           LEFT JOIN archivals r ON r.assignment_id = a.assignment_id
           WHERE r.archival_id IS NULL
             AND (?1 IS NULL OR a.subject_id = ?1)
           ORDER BY a.subject_id, a.start_date"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![owner], RawAssignment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAssignment::into_assignment).collect()
  }

  async fn resolve_assignment(&self, subject_id: Uuid, date: NaiveDate) -> Result<Assignment> {
    check_date(date)?;
    let subject_str = encode_uuid(subject_id);
    let date_str    = encode_date(date);

    let raws: Vec<RawAssignment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ASSIGNMENT_COLUMNS}
           FROM assignments a
           LEFT JOIN archivals r ON r.assignment_id = a.assignment_id
           WHERE a.subject_id = ?1
             AND r.archival_id IS NULL
             AND a.start_date <= ?2
             AND (a.end_date IS NULL OR a.end_date >= ?2)"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![subject_str, date_str], RawAssignment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let candidates: Vec<Assignment> = raws
      .into_iter()
      .map(RawAssignment::into_assignment)
      .collect::<Result<_>>()?;

    Ok(resolver::resolve(subject_id, date, &candidates)?.clone())
  }

  async fn close_assignment(&self, id: Uuid, end_date: NaiveDate) -> Result<Assignment> {
    let mut assignment = self.live_assignment(id).await?;
    if !assignment.interval.is_open() {
      return Err(timed_core::Error::AlreadyClosed(id).into());
    }
    assignment.interval = assignment.interval.close(end_date)?;

    let id_str  = encode_uuid(id);
    let end_str = encode_date(end_date);

    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE assignments SET end_date = ?2
           WHERE assignment_id = ?1 AND end_date IS NULL",
          rusqlite::params![id_str, end_str],
        )?)
      })
      .await?;

    // Another request closed it between the read and the update.
    if updated == 0 {
      return Err(timed_core::Error::AlreadyClosed(id).into());
    }

    tracing::info!(assignment_id = %id, %end_date, "closed employment");
    Ok(assignment)
  }

  async fn archive_assignment(&self, id: Uuid, reason: Option<String>) -> Result<Assignment> {
    let mut assignment = self.live_assignment(id).await?;

    let archival = Archival { reason: reason.clone(), at: Utc::now() };

    let archival_id_str = encode_uuid(Uuid::new_v4());
    let id_str          = encode_uuid(id);
    let at_str          = encode_dt(archival.at);

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO archivals (archival_id, assignment_id, reason, recorded_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![archival_id_str, id_str, reason, at_str],
        )?)
      })
      .await?;

    if inserted == 0 {
      return Err(timed_core::Error::AlreadyArchived(id).into());
    }

    tracing::info!(assignment_id = %id, "archived employment");
    assignment.archived = Some(archival);
    Ok(assignment)
  }

  // ── Records ───────────────────────────────────────────────────────────────

  async fn create_record(&self, input: NewRecord) -> Result<EntityRecord> {
    input.validate()?;

    let record = EntityRecord {
      record_id:   Uuid::new_v4(),
      owner:       input.owner,
      value:       input.value,
      recorded_at: Utc::now(),
      updated_at:  None,
    };

    let parent     = record.value.parent();
    let id_str     = encode_uuid(record.record_id);
    let type_str   = encode_entity_type(record.entity_type());
    let owner_str  = record.owner.map(encode_uuid);
    let value_str  = record.value.to_json()?.to_string();
    let at_str     = encode_dt(record.recorded_at);
    let parent_str = parent.map(|(t, id)| (encode_entity_type(t), encode_uuid(id)));

    // The parent lookup and the insert share one transaction, so the parent
    // cannot be deleted in between.
    let parent_ok = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let parent_ok = parent_matches(&tx, parent_str.as_ref(), owner_str.as_deref())?;
        if parent_ok {
          tx.execute(
            "INSERT INTO records (record_id, entity_type, owner_id, value_json, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![id_str, type_str, owner_str, value_str, at_str],
          )?;
        }
        tx.commit()?;
        Ok(parent_ok)
      })
      .await?;

    if let Some(parent) = parent
      && !parent_ok
    {
      return Err(invalid_parent(parent).into());
    }

    tracing::debug!(
      record_id = %record.record_id,
      entity_type = %record.entity_type(),
      "created record"
    );
    Ok(record)
  }

  async fn get_record(&self, entity_type: EntityType, id: Uuid) -> Result<Option<EntityRecord>> {
    Ok(
      self
        .fetch_record(id)
        .await?
        .filter(|record| record.entity_type() == entity_type),
    )
  }

  async fn list_records(
    &self,
    entity_type: EntityType,
    scope:       Scope,
    query:       &RecordQuery,
  ) -> Result<Vec<EntityRecord>> {
    if scope == Scope::Empty {
      return Ok(Vec::new());
    }

    query.from_date.map(check_date).transpose()?;
    query.to_date.map(check_date).transpose()?;

    let type_str                = encode_entity_type(entity_type);
    let owner                   = scope_owner(scope);
    let from_str                = query.from_date.map(encode_date);
    let to_str                  = query.to_date.map(encode_date);
    let (limit_val, offset_val) = page(query);

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RECORD_COLUMNS}
           FROM records
           WHERE entity_type = ?1
             AND (?2 IS NULL OR owner_id = ?2)
             AND (?3 IS NULL OR json_extract(value_json, '$.date') >= ?3)
             AND (?4 IS NULL OR json_extract(value_json, '$.date') <= ?4)
           ORDER BY recorded_at, record_id
           LIMIT ?5 OFFSET ?6"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![type_str, owner, from_str, to_str, limit_val, offset_val],
            RawRecord::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }

  async fn update_record(&self, id: Uuid, value: EntityValue) -> Result<EntityRecord> {
    value.validate()?;

    let mut record = self
      .fetch_record(id)
      .await?
      .ok_or(timed_core::Error::RecordNotFound(id))?;

    if record.entity_type() != value.entity_type() {
      return Err(
        timed_core::Error::EntityTypeMismatch {
          expected: record.entity_type(),
          found:    value.entity_type(),
        }
        .into(),
      );
    }

    let now        = Utc::now();
    let parent     = value.parent();
    let id_str     = encode_uuid(id);
    let type_str   = encode_entity_type(record.entity_type());
    let owner_str  = record.owner.map(encode_uuid);
    let value_str  = value.to_json()?.to_string();
    let at_str     = encode_dt(now);
    let parent_str = parent.map(|(t, id)| (encode_entity_type(t), encode_uuid(id)));

    let updated = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !parent_matches(&tx, parent_str.as_ref(), owner_str.as_deref())? {
          return Ok(None);
        }
        let updated = tx.execute(
          "UPDATE records SET value_json = ?3, updated_at = ?4
           WHERE record_id = ?1 AND entity_type = ?2",
          rusqlite::params![id_str, type_str, value_str, at_str],
        )?;
        tx.commit()?;
        Ok(Some(updated))
      })
      .await?;

    let Some(updated) = updated else {
      return Err(parent.map_or(timed_core::Error::RecordNotFound(id), invalid_parent).into());
    };
    // Deleted between the read and the update.
    if updated == 0 {
      return Err(timed_core::Error::RecordNotFound(id).into());
    }

    record.value = value;
    record.updated_at = Some(now);
    Ok(record)
  }

  async fn delete_record(&self, id: Uuid) -> Result<bool> {
    let id_str    = encode_uuid(id);
    let block_str = encode_entity_type(EntityType::ActivityBlock);

    // Blocks go with their activity.
    let (deleted, blocks) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let deleted = tx.execute(
          "DELETE FROM records WHERE record_id = ?1",
          rusqlite::params![id_str],
        )?;
        let blocks = if deleted > 0 {
          tx.execute(
            "DELETE FROM records
             WHERE entity_type = ?2 AND json_extract(value_json, '$.activity_id') = ?1",
            rusqlite::params![id_str, block_str],
          )?
        } else {
          0
        };
        tx.commit()?;
        Ok((deleted, blocks))
      })
      .await?;

    if deleted > 0 {
      tracing::debug!(record_id = %id, blocks, "deleted record");
    }
    Ok(deleted > 0)
  }
}
