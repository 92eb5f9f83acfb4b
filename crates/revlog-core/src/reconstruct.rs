//! Rebuilding historical text by replaying a chain over its base.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result, codec::Codec, file::TrackedFile};

// ─── Target ──────────────────────────────────────────────────────────────────

/// Which version to rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionTarget {
  /// The base snapshot, before any entry.
  Base,
  /// Base with patches `0..=n` applied; clamped to the newest entry.
  Index(usize),
  Latest,
}

impl FromStr for VersionTarget {
  type Err = Error;

  /// `"base"`, `"latest"` or a non-negative integer.
  fn from_str(s: &str) -> Result<Self> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("latest") {
      return Ok(Self::Latest);
    }
    if s.eq_ignore_ascii_case("base") {
      return Ok(Self::Base);
    }
    s.parse::<usize>()
      .map(Self::Index)
      .map_err(|_| Error::InvalidVersion(s.to_owned()))
  }
}

impl fmt::Display for VersionTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Base => f.write_str("base"),
      Self::Index(n) => write!(f, "{n}"),
      Self::Latest => f.write_str("latest"),
    }
  }
}

// ─── Result ──────────────────────────────────────────────────────────────────

/// Reconstructed text and where in the chain it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconstruction {
  pub content:        String,
  /// Last entry applied; `None` when `content` is the base itself.
  pub version:        Option<usize>,
  pub total_versions: usize,
}

// ─── Replay ──────────────────────────────────────────────────────────────────

/// Replay `file`'s chain up to `target`.
///
/// Fails on the first entry that does not parse or apply cleanly; no partial
/// text is ever returned.
pub fn reconstruct(
  file: &TrackedFile,
  target: VersionTarget,
  codec: &Codec,
) -> Result<Reconstruction> {
  let total_versions = file.versions.len();
  let version = match (target, file.head_index()) {
    (VersionTarget::Base, _) | (_, None) => None,
    (VersionTarget::Latest, Some(head)) => Some(head),
    (VersionTarget::Index(n), Some(head)) => Some(n.min(head)),
  };

  let mut content = file.base.clone();
  let replay = version.map_or(0, |v| v + 1);
  for (index, entry) in file.versions[..replay].iter().enumerate() {
    let corrupt = |source| Error::PatchApplication {
      filename: file.filename.clone(),
      index,
      source,
    };
    let patch = codec.deserialize(&entry.patch).map_err(corrupt)?;
    content = codec.apply_strict(&patch, &content).map_err(corrupt)?;
  }

  tracing::debug!(
    filename = %file.filename,
    %target,
    ?version,
    total_versions,
    "reconstructed"
  );

  Ok(Reconstruction { content, version, total_versions })
}
