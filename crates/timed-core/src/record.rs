//! Tracking and catalogue records.
//!
//! Everything besides employments lives in one typed collection. The variant
//! of [`EntityValue`] is the record's entity type; owned types carry the id
//! of the user they belong to, catalogue types carry no owner.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  access::{EntityType, Owned},
  interval::check_date,
};

// ─── Catalogue payloads ──────────────────────────────────────────────────────

/// A place where employees work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationValue {
  pub name: String,
}

/// A day on which nobody at `location_id` has to work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicHolidayValue {
  pub name:        String,
  pub date:        NaiveDate,
  pub location_id: Uuid,
}

/// A kind of absence, e.g. sickness or holiday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsenceTypeValue {
  pub name:          String,
  /// Absences of this type count as a full day of work.
  #[serde(default)]
  pub fill_worktime: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTemplateValue {
  pub name: String,
}

// ─── Owned payloads ──────────────────────────────────────────────────────────

/// Days of a given absence type granted to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsenceCreditValue {
  pub absence_type_id: Uuid,
  pub date:            NaiveDate,
  pub days:            u16,
  pub comment:         Option<String>,
}

/// Overtime carried over from a previous period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OvertimeCreditValue {
  pub date:             NaiveDate,
  pub duration_minutes: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsenceValue {
  pub date:            NaiveDate,
  pub absence_type_id: Uuid,
  pub comment:         Option<String>,
}

/// Presence at work; `to` is absent while the user is still checked in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceValue {
  pub from: DateTime<Utc>,
  pub to:   Option<DateTime<Utc>>,
}

/// Work on one day; the tracked time lives in its [`ActivityBlockValue`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityValue {
  pub comment: String,
  pub date:    NaiveDate,
  #[serde(default)]
  pub review:  bool,
}

/// A stretch of time spent on an activity. Belongs to whoever owns the
/// activity; `to` is absent while the block is running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityBlockValue {
  pub activity_id: Uuid,
  pub from:        DateTime<Utc>,
  pub to:          Option<DateTime<Utc>>,
}

/// Time booked on a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportValue {
  pub date:             NaiveDate,
  pub duration_minutes: u32,
  pub comment:          Option<String>,
  #[serde(default)]
  pub review:           bool,
}

// ─── EntityValue ─────────────────────────────────────────────────────────────

/// The typed payload of a record. The serde tag doubles as the
/// `entity_type` column and matches [`EntityType`]'s string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum EntityValue {
  Location(LocationValue),
  PublicHoliday(PublicHolidayValue),
  AbsenceType(AbsenceTypeValue),
  TaskTemplate(TaskTemplateValue),
  AbsenceCredit(AbsenceCreditValue),
  OvertimeCredit(OvertimeCreditValue),
  Absence(AbsenceValue),
  Attendance(AttendanceValue),
  Activity(ActivityValue),
  ActivityBlock(ActivityBlockValue),
  Report(ReportValue),
}

impl EntityValue {
  pub fn entity_type(&self) -> EntityType {
    match self {
      Self::Location(_) => EntityType::Location,
      Self::PublicHoliday(_) => EntityType::PublicHoliday,
      Self::AbsenceType(_) => EntityType::AbsenceType,
      Self::TaskTemplate(_) => EntityType::TaskTemplate,
      Self::AbsenceCredit(_) => EntityType::AbsenceCredit,
      Self::OvertimeCredit(_) => EntityType::OvertimeCredit,
      Self::Absence(_) => EntityType::Absence,
      Self::Attendance(_) => EntityType::Attendance,
      Self::Activity(_) => EntityType::Activity,
      Self::ActivityBlock(_) => EntityType::ActivityBlock,
      Self::Report(_) => EntityType::Report,
    }
  }

  /// Serialise the inner payload (without the type tag).
  pub fn to_json(&self) -> Result<serde_json::Value> {
    let full = serde_json::to_value(self)?;
    Ok(full.get("data").cloned().unwrap_or(serde_json::Value::Null))
  }

  /// Rebuild a value from its entity type and bare payload.
  pub fn from_parts(entity_type: EntityType, data: serde_json::Value) -> Result<Self> {
    let wrapped = serde_json::json!({ "type": entity_type.to_string(), "data": data });
    Ok(serde_json::from_value(wrapped)?)
  }

  /// The calendar day the value is booked on, if it has one.
  pub fn date(&self) -> Option<NaiveDate> {
    match self {
      Self::PublicHoliday(v) => Some(v.date),
      Self::AbsenceCredit(v) => Some(v.date),
      Self::OvertimeCredit(v) => Some(v.date),
      Self::Absence(v) => Some(v.date),
      Self::Activity(v) => Some(v.date),
      Self::Report(v) => Some(v.date),
      Self::Location(_)
      | Self::AbsenceType(_)
      | Self::TaskTemplate(_)
      | Self::Attendance(_)
      | Self::ActivityBlock(_) => None,
    }
  }

  /// The record this value hangs off. Its owner is the value's owner.
  pub fn parent(&self) -> Option<(EntityType, Uuid)> {
    match self {
      Self::ActivityBlock(b) => Some((EntityType::Activity, b.activity_id)),
      _ => None,
    }
  }

  /// Reject dates outside the stored range and timestamps that run
  /// backwards.
  pub fn validate(&self) -> Result<()> {
    self.date().map(check_date).transpose()?;

    let range = match self {
      Self::Attendance(a) => a.to.map(|to| (a.from, to)),
      Self::ActivityBlock(b) => b.to.map(|to| (b.from, to)),
      _ => None,
    };
    if let Some((start, end)) = range
      && end < start
    {
      return Err(Error::InvalidInterval {
        start: start.date_naive(),
        end:   end.date_naive(),
      });
    }
    Ok(())
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// A persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
  pub record_id:   Uuid,
  pub owner:       Option<Uuid>,
  pub value:       EntityValue,
  pub recorded_at: DateTime<Utc>,
  pub updated_at:  Option<DateTime<Utc>>,
}

impl EntityRecord {
  pub fn entity_type(&self) -> EntityType { self.value.entity_type() }
}

impl Owned for EntityRecord {
  fn owner(&self) -> Option<Uuid> { self.owner }
}

/// Input to [`crate::store::TimedStore::create_record`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecord {
  pub owner: Option<Uuid>,
  pub value: EntityValue,
}

impl NewRecord {
  pub fn new(owner: Option<Uuid>, value: EntityValue) -> Self { Self { owner, value } }

  /// Owned entity types need an owner; catalogue types must not have one.
  pub fn validate(&self) -> Result<()> {
    let entity_type = self.value.entity_type();
    match (entity_type.is_owned(), self.owner) {
      (true, None) => Err(Error::OwnerRequired(entity_type)),
      (false, Some(_)) => Err(Error::OwnerNotAllowed(entity_type)),
      _ => self.value.validate(),
    }
  }
}

// ─── Query ───────────────────────────────────────────────────────────────────

/// Filters for [`crate::store::TimedStore::list_records`].
///
/// The date bounds apply to the payload's `date` field and are inclusive.
/// Records without a `date` are excluded whenever a bound is set.
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
  pub from_date: Option<NaiveDate>,
  pub to_date:   Option<NaiveDate>,
  pub limit:     Option<usize>,
  pub offset:    Option<usize>,
}
