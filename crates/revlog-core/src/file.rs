//! Tracked files and their version chains.
//!
//! A tracked file owns an immutable base snapshot and an append-only list of
//! version entries. Entries hold patches, never absolute snapshots; the text
//! at version `k` only exists by replaying entries `0..=k` over the base.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Author ──────────────────────────────────────────────────────────────────

/// Who wrote a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
  pub name:  String,
  /// Contact identifier, usually an email address.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
}

// ─── VersionEntry ────────────────────────────────────────────────────────────

/// One link of a version chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
  pub timestamp: DateTime<Utc>,
  /// Serialised [`PatchSet`](crate::patch::PatchSet) transforming the content
  /// before this entry into the content after it.
  pub patch:     String,
  #[serde(default)]
  pub author:    Option<Author>,
}

impl VersionEntry {
  /// An entry stamped with the current time.
  pub fn now(patch: String, author: Option<Author>) -> Self {
    Self { timestamp: Utc::now(), patch, author }
  }
}

// ─── TrackedFile ─────────────────────────────────────────────────────────────

/// The persisted record for one file: base snapshot plus patch chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedFile {
  pub filename:   String,
  /// Content at version 0. Never changes after creation.
  pub base:       String,
  /// Insertion order is the authoritative version index.
  pub versions:   Vec<VersionEntry>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl TrackedFile {
  /// A freshly created file with an empty chain.
  pub fn new(filename: impl Into<String>, base: impl Into<String>) -> Self {
    let now = Utc::now();
    Self {
      filename:   filename.into(),
      base:       base.into(),
      versions:   Vec::new(),
      created_at: now,
      updated_at: now,
    }
  }

  pub fn version_count(&self) -> usize { self.versions.len() }

  /// Index of the newest entry, or `None` while only the base exists.
  pub fn head_index(&self) -> Option<usize> { self.versions.len().checked_sub(1) }

  pub fn summary(&self) -> FileSummary {
    FileSummary {
      filename:      self.filename.clone(),
      version_count: self.versions.len(),
      created_at:    self.created_at,
      updated_at:    self.updated_at,
    }
  }

  pub fn history(&self) -> Vec<VersionSummary> {
    self
      .versions
      .iter()
      .enumerate()
      .map(|(index, v)| VersionSummary {
        index,
        timestamp: v.timestamp,
        author: v.author.clone(),
      })
      .collect()
  }
}

// ─── Read models ─────────────────────────────────────────────────────────────

/// Chain metadata for a single entry, without its patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSummary {
  pub index:     usize,
  pub timestamp: DateTime<Utc>,
  pub author:    Option<Author>,
}

/// Listing row for a tracked file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
  pub filename:      String,
  pub version_count: usize,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}
