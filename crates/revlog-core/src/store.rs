//! The `VersionStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `revlog-store-sqlite`).
//! The engine and the HTTP layer depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use crate::file::{FileSummary, TrackedFile, VersionEntry, VersionSummary};

/// Abstraction over a version chain backend.
///
/// Base snapshots are write-once and chains are append-only; the trait has no
/// update or delete operations.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait VersionStore: Send + Sync {
  /// Backend error. Converting into [`crate::Error`] must preserve the
  /// not-found, already-exists and conflict cases.
  type Error: std::error::Error + Send + Sync + Into<crate::Error> + 'static;

  /// Load a file with its complete chain, or `None` if it is not tracked.
  ///
  /// Base and versions come from one consistent snapshot.
  fn find<'a>(
    &'a self,
    filename: &'a str,
  ) -> impl Future<Output = Result<Option<TrackedFile>, Self::Error>> + Send + 'a;

  /// Start tracking `filename` with `base` as version 0.
  ///
  /// Fails if the file is already tracked.
  fn create<'a>(
    &'a self,
    filename: &'a str,
    base: String,
  ) -> impl Future<Output = Result<TrackedFile, Self::Error>> + Send + 'a;

  /// Append `entry` to the chain and return the updated file.
  ///
  /// Fails if the file is not tracked, or if `expected_len` is given and the
  /// chain no longer has that many entries. The check and the write are
  /// atomic; once this returns the entry is durable and visible to `find`.
  fn append<'a>(
    &'a self,
    filename: &'a str,
    entry: VersionEntry,
    expected_len: Option<usize>,
  ) -> impl Future<Output = Result<TrackedFile, Self::Error>> + Send + 'a;

  /// Every tracked file, ordered by filename.
  fn list(&self) -> impl Future<Output = Result<Vec<FileSummary>, Self::Error>> + Send + '_;

  /// Chain metadata for a file without loading patches, or `None` if it is
  /// not tracked.
  fn history<'a>(
    &'a self,
    filename: &'a str,
  ) -> impl Future<Output = Result<Option<Vec<VersionSummary>>, Self::Error>> + Send + 'a;
}
