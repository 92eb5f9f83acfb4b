//! Error types for `revlog-core`.

use thiserror::Error;

use crate::patch::PatchError;

#[derive(Debug, Error)]
pub enum Error {
  #[error("file not found: {0}")]
  NotFound(String),

  #[error("file is already tracked: {0}")]
  AlreadyExists(String),

  #[error("invalid version: {0:?}")]
  InvalidVersion(String),

  /// A stored patch could not be replayed; the chain is corrupt or does not
  /// belong to this base.
  #[error("patch {index} of {filename} failed to apply: {source}")]
  PatchApplication {
    filename: String,
    index:    usize,
    #[source]
    source:   PatchError,
  },

  /// A caller-supplied patch is malformed or does not apply to HEAD.
  #[error("invalid patch: {0}")]
  InvalidPatch(#[source] PatchError),

  #[error("patched content does not match the submitted content for {0}")]
  ContentMismatch(String),

  #[error(
    "stale head for {filename}: expected {expected} versions, found {actual}"
  )]
  Conflict {
    filename: String,
    expected: usize,
    actual:   usize,
  },

  #[error("persistence error: {0}")]
  Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
