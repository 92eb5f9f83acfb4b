//! Error type for `revlog-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("file not found: {0}")]
  NotFound(String),

  #[error("file is already tracked: {0}")]
  AlreadyExists(String),

  /// The chain grew between reading HEAD and appending to it.
  #[error("stale head for {filename}: expected {expected} versions, found {actual}")]
  Conflict {
    filename: String,
    expected: usize,
    actual:   usize,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for revlog_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::NotFound(filename) => Self::NotFound(filename),
      Error::AlreadyExists(filename) => Self::AlreadyExists(filename),
      Error::Conflict { filename, expected, actual } => {
        Self::Conflict { filename, expected, actual }
      }
      other => Self::Persistence(Box::new(other)),
    }
  }
}
