//! The commit protocol and the read operations built on reconstruction.
//!
//! [`VersionEngine`] is the single entry point for callers. It owns an
//! explicitly constructed store handle and the codec settings; there is no
//! process-wide state.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{
  Error, Result,
  codec::{Codec, unified_diff},
  file::{Author, FileSummary, TrackedFile, VersionEntry, VersionSummary},
  reconstruct::{Reconstruction, VersionTarget, reconstruct},
  store::VersionStore,
};

// ─── Requests ────────────────────────────────────────────────────────────────

/// Input to [`VersionEngine::save`].
#[derive(Debug, Clone)]
pub struct SaveRequest {
  pub filename:          String,
  /// Full new content of the file.
  pub content:           String,
  pub author:            Option<Author>,
  /// Chain length the caller's content was based on. When set and stale the
  /// save is rejected with [`Error::Conflict`].
  pub expected_versions: Option<usize>,
}

impl SaveRequest {
  /// Convenience constructor with all optional fields unset.
  pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
    Self {
      filename:          filename.into(),
      content:           content.into(),
      author:            None,
      expected_versions: None,
    }
  }
}

/// Input to [`VersionEngine::save_patch`].
#[derive(Debug, Clone)]
pub struct PatchRequest {
  pub filename:          String,
  /// Serialised patch against the current HEAD.
  pub patch:             String,
  /// Required when the file is not tracked yet (it becomes the base);
  /// otherwise, when set, the patched HEAD must equal it.
  pub new_content:       Option<String>,
  pub author:            Option<Author>,
  pub expected_versions: Option<usize>,
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SaveStatus {
  /// First save of the file; the content became the base snapshot.
  BaseCreated,
  PatchAppended,
  /// Content matched HEAD; nothing was written.
  NoChange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
  pub status:        SaveStatus,
  /// Chain length after the save.
  pub version_count: usize,
  /// HEAD index after the save; `None` while only the base exists.
  pub version:       Option<usize>,
}

impl SaveOutcome {
  fn new(status: SaveStatus, version_count: usize) -> Self {
    Self { status, version_count, version: version_count.checked_sub(1) }
  }
}

/// HEAD of a file, or an empty placeholder for an untracked one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestContent {
  pub filename:      String,
  pub content:       String,
  pub version_count: usize,
}

/// A unified diff between two reconstructed versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDiff {
  pub from: Option<usize>,
  pub to:   Option<usize>,
  pub diff: String,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

fn store_error<E: Into<Error>>(e: E) -> Error { e.into() }

fn check_expected(filename: &str, expected: Option<usize>, actual: usize) -> Result<()> {
  match expected {
    Some(expected) if expected != actual => Err(Error::Conflict {
      filename: filename.to_owned(),
      expected,
      actual,
    }),
    _ => Ok(()),
  }
}

fn label(filename: &str, version: Option<usize>) -> String {
  match version {
    Some(v) => format!("{filename}@{v}"),
    None => format!("{filename}@base"),
  }
}

pub struct VersionEngine<S> {
  store: S,
  codec: Codec,
}

impl<S: VersionStore> VersionEngine<S> {
  pub fn new(store: S, codec: Codec) -> Self { Self { store, codec } }

  pub fn store(&self) -> &S { &self.store }

  pub fn codec(&self) -> &Codec { &self.codec }

  async fn load(&self, filename: &str) -> Result<Option<TrackedFile>> {
    self.store.find(filename).await.map_err(store_error)
  }

  async fn require(&self, filename: &str) -> Result<TrackedFile> {
    self
      .load(filename)
      .await?
      .ok_or_else(|| Error::NotFound(filename.to_owned()))
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  /// HEAD content. An untracked file reads as empty, not as an error.
  pub async fn latest(&self, filename: &str) -> Result<LatestContent> {
    let Some(file) = self.load(filename).await? else {
      return Ok(LatestContent {
        filename:      filename.to_owned(),
        content:       String::new(),
        version_count: 0,
      });
    };
    let head = reconstruct(&file, VersionTarget::Latest, &self.codec)?;
    Ok(LatestContent {
      filename:      file.filename,
      content:       head.content,
      version_count: head.total_versions,
    })
  }

  /// Rebuild a specific version; requests past HEAD are clamped.
  pub async fn version(&self, filename: &str, target: VersionTarget) -> Result<Reconstruction> {
    let file = self.require(filename).await?;
    reconstruct(&file, target, &self.codec)
  }

  pub async fn history(&self, filename: &str) -> Result<Vec<VersionSummary>> {
    self
      .store
      .history(filename)
      .await
      .map_err(store_error)?
      .ok_or_else(|| Error::NotFound(filename.to_owned()))
  }

  pub async fn list(&self) -> Result<Vec<FileSummary>> {
    self.store.list().await.map_err(store_error)
  }

  pub async fn diff_versions(
    &self,
    filename: &str,
    from: VersionTarget,
    to: VersionTarget,
  ) -> Result<VersionDiff> {
    let file = self.require(filename).await?;
    let old = reconstruct(&file, from, &self.codec)?;
    let new = reconstruct(&file, to, &self.codec)?;
    let diff = unified_diff(
      &old.content,
      &new.content,
      &label(filename, old.version),
      &label(filename, new.version),
    );
    Ok(VersionDiff { from: old.version, to: new.version, diff })
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  /// Commit new full content for a file.
  ///
  /// The first save stores the base. Later saves append the diff from HEAD,
  /// or write nothing when the content is unchanged.
  pub async fn save(&self, request: SaveRequest) -> Result<SaveOutcome> {
    let SaveRequest { filename, content, author, expected_versions } = request;

    let Some(file) = self.load(&filename).await? else {
      return self.create(&filename, content, expected_versions).await;
    };

    let current = file.version_count();
    check_expected(&filename, expected_versions, current)?;

    let head = reconstruct(&file, VersionTarget::Latest, &self.codec)?;
    let patch = self.codec.delta(&head.content, &content);
    if patch.is_empty() {
      tracing::debug!(%filename, versions = current, "no change");
      return Ok(SaveOutcome::new(SaveStatus::NoChange, current));
    }

    self
      .append(&filename, self.codec.serialize(&patch), author, current)
      .await
  }

  /// Commit a caller-computed patch against HEAD.
  ///
  /// The patch is validated by applying it before anything is stored.
  pub async fn save_patch(&self, request: PatchRequest) -> Result<SaveOutcome> {
    let PatchRequest { filename, patch, new_content, author, expected_versions } = request;
    let patch = self.codec.deserialize(&patch).map_err(Error::InvalidPatch)?;

    let Some(file) = self.load(&filename).await? else {
      let base = new_content.ok_or_else(|| Error::NotFound(filename.clone()))?;
      return self.create(&filename, base, expected_versions).await;
    };

    let current = file.version_count();
    check_expected(&filename, expected_versions, current)?;

    let head = reconstruct(&file, VersionTarget::Latest, &self.codec)?;
    let patched = self
      .codec
      .apply_strict(&patch, &head.content)
      .map_err(Error::InvalidPatch)?;
    if new_content.is_some_and(|expected| expected != patched) {
      return Err(Error::ContentMismatch(filename));
    }
    if patched == head.content {
      return Ok(SaveOutcome::new(SaveStatus::NoChange, current));
    }

    self
      .append(&filename, self.codec.serialize(&patch), author, current)
      .await
  }

  async fn create(
    &self,
    filename: &str,
    base: String,
    expected_versions: Option<usize>,
  ) -> Result<SaveOutcome> {
    check_expected(filename, expected_versions, 0)?;
    self.store.create(filename, base).await.map_err(store_error)?;
    tracing::info!(%filename, "base created");
    Ok(SaveOutcome::new(SaveStatus::BaseCreated, 0))
  }

  /// Append against the chain length the patch was computed from, so a
  /// concurrent writer can never slip a patch in between.
  async fn append(
    &self,
    filename: &str,
    patch: String,
    author: Option<Author>,
    current: usize,
  ) -> Result<SaveOutcome> {
    let entry = VersionEntry::now(patch, author);
    let updated = self
      .store
      .append(filename, entry, Some(current))
      .await
      .map_err(store_error)?;
    tracing::info!(%filename, version = current, "patch appended");
    Ok(SaveOutcome::new(SaveStatus::PatchAppended, updated.version_count()))
  }
}
