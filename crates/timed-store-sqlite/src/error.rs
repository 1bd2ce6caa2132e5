//! Error type for `timed-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] timed_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("invalid column value: {0}")]
  Decode(String),
}

impl timed_core::store::StoreError for Error {
  fn into_core(self) -> Result<timed_core::Error, Self> {
    match self {
      Error::Core(e) => Ok(e),
      other => Err(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
