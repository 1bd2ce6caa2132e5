//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings and calendar dates as
//! `YYYY-MM-DD`, so both compare correctly as text. UUIDs are stored as
//! hyphenated lowercase strings.

use std::str::FromStr as _;

use chrono::{DateTime, NaiveDate, Utc};
use timed_core::{
  access::EntityType,
  assignment::{Archival, Assignment, EmploymentTerms},
  interval::Interval,
  record::{EntityRecord, EntityValue},
};
use uuid::Uuid;

use crate::{Error, Result};

/// Stands in for the end of an open interval in SQL comparisons.
pub const OPEN_END: &str = "9999-12-31";

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ────────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

// ─── EntityType ───────────────────────────────────────────────────────────────

pub fn encode_entity_type(t: EntityType) -> String { t.to_string() }

pub fn decode_entity_type(s: &str) -> Result<EntityType> {
  EntityType::from_str(s)
    .map_err(|_| Error::Core(timed_core::Error::UnknownEntityType(s.to_owned())))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawAssignment::from_row`]; expects `assignments`
/// aliased as `a` and `archivals` left-joined as `r`.
pub const ASSIGNMENT_COLUMNS: &str = "
  a.assignment_id, a.subject_id, a.start_date, a.end_date,
  a.location_id, a.percentage, a.worktime_per_day_minutes, a.recorded_at,
  r.reason AS archive_reason, r.recorded_at AS archived_at";

/// Raw strings read directly from an `assignments` row joined with
/// `archivals`.
pub struct RawAssignment {
  pub assignment_id:            String,
  pub subject_id:               String,
  pub start_date:               String,
  pub end_date:                 Option<String>,
  pub location_id:              String,
  pub percentage:               i64,
  pub worktime_per_day_minutes: i64,
  pub recorded_at:              String,
  // archivals join
  pub archive_reason:           Option<String>,
  pub archived_at:              Option<String>,
}

impl RawAssignment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      assignment_id:            row.get(0)?,
      subject_id:               row.get(1)?,
      start_date:               row.get(2)?,
      end_date:                 row.get(3)?,
      location_id:              row.get(4)?,
      percentage:               row.get(5)?,
      worktime_per_day_minutes: row.get(6)?,
      recorded_at:              row.get(7)?,
      archive_reason:           row.get(8)?,
      archived_at:              row.get(9)?,
    })
  }

  pub fn into_assignment(self) -> Result<Assignment> {
    let start_date = decode_date(&self.start_date)?;
    let end_date = self.end_date.as_deref().map(decode_date).transpose()?;

    let percentage = u8::try_from(self.percentage)
      .map_err(|_| Error::Decode(format!("percentage {}", self.percentage)))?;
    let worktime_per_day_minutes = u32::try_from(self.worktime_per_day_minutes)
      .map_err(|_| Error::Decode(format!("worktime {}", self.worktime_per_day_minutes)))?;

    let archived = self
      .archived_at
      .as_deref()
      .map(decode_dt)
      .transpose()?
      .map(|at| Archival { reason: self.archive_reason, at });

    Ok(Assignment {
      assignment_id: decode_uuid(&self.assignment_id)?,
      subject_id: decode_uuid(&self.subject_id)?,
      interval: Interval::new(start_date, end_date)?,
      terms: EmploymentTerms {
        location_id: decode_uuid(&self.location_id)?,
        percentage,
        worktime_per_day_minutes,
      },
      recorded_at: decode_dt(&self.recorded_at)?,
      archived,
    })
  }
}

/// Column list matching [`RawRecord::from_row`].
pub const RECORD_COLUMNS: &str =
  "record_id, entity_type, owner_id, value_json, recorded_at, updated_at";

/// Raw strings read directly from a `records` row.
pub struct RawRecord {
  pub record_id:   String,
  pub entity_type: String,
  pub owner_id:    Option<String>,
  pub value_json:  String,
  pub recorded_at: String,
  pub updated_at:  Option<String>,
}

impl RawRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:   row.get(0)?,
      entity_type: row.get(1)?,
      owner_id:    row.get(2)?,
      value_json:  row.get(3)?,
      recorded_at: row.get(4)?,
      updated_at:  row.get(5)?,
    })
  }

  pub fn into_record(self) -> Result<EntityRecord> {
    let entity_type = decode_entity_type(&self.entity_type)?;
    let data: serde_json::Value = serde_json::from_str(&self.value_json)?;

    Ok(EntityRecord {
      record_id:   decode_uuid(&self.record_id)?,
      owner:       self.owner_id.as_deref().map(decode_uuid).transpose()?,
      value:       EntityValue::from_parts(entity_type, data)?,
      recorded_at: decode_dt(&self.recorded_at)?,
      updated_at:  self.updated_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}
