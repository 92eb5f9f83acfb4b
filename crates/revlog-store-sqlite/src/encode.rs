//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings.

use chrono::{DateTime, Utc};
use revlog_core::file::{Author, FileSummary, TrackedFile, VersionEntry, VersionSummary};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Author ──────────────────────────────────────────────────────────────────

pub fn encode_author(author: Option<Author>) -> (Option<String>, Option<String>) {
  match author {
    Some(Author { name, email }) => (Some(name), email),
    None => (None, None),
  }
}

/// An email without a name is not a meaningful author and is dropped.
pub fn decode_author(name: Option<String>, email: Option<String>) -> Option<Author> {
  name.map(|name| Author { name, email })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `tracked_files` row.
pub struct RawFile {
  pub filename:   String,
  pub base:       String,
  pub created_at: String,
  pub updated_at: String,
}

/// Raw strings read directly from a `versions` row.
pub struct RawVersion {
  pub timestamp:    String,
  pub patch:        String,
  pub author_name:  Option<String>,
  pub author_email: Option<String>,
}

impl RawVersion {
  pub fn into_entry(self) -> Result<VersionEntry> {
    Ok(VersionEntry {
      timestamp: decode_dt(&self.timestamp)?,
      patch:     self.patch,
      author:    decode_author(self.author_name, self.author_email),
    })
  }
}

/// A `versions` row without its patch.
pub struct RawVersionSummary {
  pub idx:          i64,
  pub timestamp:    String,
  pub author_name:  Option<String>,
  pub author_email: Option<String>,
}

impl RawVersionSummary {
  pub fn into_summary(self) -> Result<VersionSummary> {
    Ok(VersionSummary {
      index:     self.idx as usize,
      timestamp: decode_dt(&self.timestamp)?,
      author:    decode_author(self.author_name, self.author_email),
    })
  }
}

impl RawFile {
  /// Assemble a file from its row and its `versions` rows in `idx` order.
  pub fn into_file(self, versions: Vec<RawVersion>) -> Result<TrackedFile> {
    Ok(TrackedFile {
      filename:   self.filename,
      base:       self.base,
      versions:   versions
        .into_iter()
        .map(RawVersion::into_entry)
        .collect::<Result<_>>()?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// A `tracked_files` row joined with its chain length.
pub struct RawSummary {
  pub filename:      String,
  pub version_count: i64,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawSummary {
  pub fn into_summary(self) -> Result<FileSummary> {
    Ok(FileSummary {
      filename:      self.filename,
      version_count: self.version_count as usize,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}
