//! SQL schema for the Timed SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Employments. Rows are never deleted; end_date is written at most once.
CREATE TABLE IF NOT EXISTS assignments (
    assignment_id            TEXT PRIMARY KEY,
    subject_id               TEXT NOT NULL,
    start_date               TEXT NOT NULL,   -- YYYY-MM-DD, years 0000-9999, inclusive
    end_date                 TEXT,            -- YYYY-MM-DD, inclusive; NULL = open
    location_id              TEXT NOT NULL,
    percentage               INTEGER NOT NULL CHECK (percentage BETWEEN 0 AND 100),
    worktime_per_day_minutes INTEGER NOT NULL CHECK (worktime_per_day_minutes > 0),
    recorded_at              TEXT NOT NULL,   -- RFC 3339 UTC; server-assigned
    CHECK (end_date IS NULL OR end_date >= start_date)
);

-- An employment withdrawn from resolution, kept for history.
CREATE TABLE IF NOT EXISTS archivals (
    archival_id   TEXT PRIMARY KEY,
    assignment_id TEXT NOT NULL REFERENCES assignments(assignment_id),
    reason        TEXT,
    recorded_at   TEXT NOT NULL,
    UNIQUE (assignment_id)
);

-- Tracking and catalogue records of every other entity type.
CREATE TABLE IF NOT EXISTS records (
    record_id   TEXT PRIMARY KEY,
    entity_type TEXT NOT NULL,   -- discriminant of EntityValue variant
    owner_id    TEXT,            -- NULL for catalogue records
    value_json  TEXT NOT NULL,   -- JSON payload (inner data only)
    recorded_at TEXT NOT NULL,
    updated_at  TEXT
);

CREATE INDEX IF NOT EXISTS assignments_subject_idx ON assignments(subject_id, start_date);
CREATE INDEX IF NOT EXISTS records_type_owner_idx  ON records(entity_type, owner_id);

PRAGMA user_version = 1;
";
