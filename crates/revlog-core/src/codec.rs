//! The diff/patch codec used by the version chain.
//!
//! [`Codec`] bundles the tuning knobs for computing, serialising and applying
//! patches so the engine and its callers agree on them.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use similar::TextDiff;

use crate::{
  diff::{self, Diff},
  patch::{ApplyOptions, PatchError, PatchSet},
};

/// Codec tuning, usually read from the server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecOptions {
  /// Upper bound on diff computation; `None` waits for a minimal diff.
  pub diff_timeout_ms:  Option<u64>,
  /// Merge trivial edits into word-sized hunks before building patches.
  pub semantic_cleanup: bool,
  /// Characters of context carried around each hunk.
  pub patch_margin:     usize,
  /// How far a hunk may have drifted and still be applied.
  pub match_distance:   usize,
}

impl Default for CodecOptions {
  fn default() -> Self {
    Self {
      diff_timeout_ms:  Some(1000),
      semantic_cleanup: true,
      patch_margin:     4,
      match_distance:   1000,
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct Codec {
  options: CodecOptions,
}

impl Codec {
  pub fn new(options: CodecOptions) -> Self { Self { options } }

  pub fn options(&self) -> &CodecOptions { &self.options }

  fn apply_options(&self) -> ApplyOptions {
    ApplyOptions {
      margin:         self.options.patch_margin,
      match_distance: self.options.match_distance,
    }
  }

  pub fn diff(&self, old: &str, new: &str) -> Vec<Diff> {
    let timeout = self.options.diff_timeout_ms.map(Duration::from_millis);
    let mut diffs = diff::diff(old, new, timeout);
    if self.options.semantic_cleanup {
      diff::cleanup_semantic(&mut diffs);
    }
    diffs
  }

  pub fn make_patch(&self, old: &str, diffs: &[Diff]) -> PatchSet {
    PatchSet::make(old, diffs, self.options.patch_margin)
  }

  /// Diff and build the patch in one step.
  pub fn delta(&self, old: &str, new: &str) -> PatchSet {
    self.make_patch(old, &self.diff(old, new))
  }

  pub fn serialize(&self, patch: &PatchSet) -> String { patch.to_string() }

  pub fn deserialize(&self, text: &str) -> Result<PatchSet, PatchError> { text.parse() }

  /// Apply leniently, with per-hunk success flags.
  pub fn apply(&self, patch: &PatchSet, text: &str) -> (String, Vec<bool>) {
    patch.apply(text, self.apply_options())
  }

  /// Apply, failing on the first hunk that cannot be placed.
  pub fn apply_strict(&self, patch: &PatchSet, text: &str) -> Result<String, PatchError> {
    patch.apply_strict(text, self.apply_options())
  }
}

/// Human-readable unified diff between two texts, three lines of context.
pub fn unified_diff(old: &str, new: &str, old_label: &str, new_label: &str) -> String {
  TextDiff::from_lines(old, new)
    .unified_diff()
    .context_radius(3)
    .header(old_label, new_label)
    .to_string()
}

#[cfg(test)]
mod tests {
  use rand::{Rng, SeedableRng, rngs::StdRng};

  use super::*;

  fn random_text(rng: &mut StdRng, len: usize) -> String {
    const ALPHABET: &[char] = &['a', 'b', 'c', ' ', '\n', '%', '+', 'é', '🎉'];
    (0..len)
      .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())])
      .collect()
  }

  /// A handful of deletions, insertions and replacements at random offsets.
  fn mutate(rng: &mut StdRng, text: &str) -> String {
    let mut chars: Vec<char> = text.chars().collect();
    for _ in 0..rng.random_range(1..=4) {
      let at = rng.random_range(0..=chars.len());
      let span = rng.random_range(1..=8);
      let end = (at + span).min(chars.len());
      match rng.random_range(0..3) {
        0 => {
          chars.drain(at..end);
        }
        1 => {
          let inserted = random_text(rng, span);
          chars.splice(at..at, inserted.chars());
        }
        _ => {
          let len = rng.random_range(1..=4);
          let replacement = random_text(rng, len);
          chars.splice(at..end, replacement.chars());
        }
      }
    }
    chars.into_iter().collect()
  }

  #[test]
  fn delta_round_trips_through_text() {
    let codec = Codec::default();
    let (a, b) = ("hello world", "goodbye world");
    let text = codec.serialize(&codec.delta(a, b));
    let patch = codec.deserialize(&text).unwrap();
    assert_eq!(codec.apply_strict(&patch, a).unwrap(), b);
  }

  #[test]
  fn random_edits_round_trip() {
    let mut rng = StdRng::seed_from_u64(0x7265_766c_6f67);
    for semantic_cleanup in [true, false] {
      for patch_margin in [1, 4, 8] {
        let codec = Codec::new(CodecOptions {
          diff_timeout_ms: None,
          semantic_cleanup,
          patch_margin,
          ..CodecOptions::default()
        });
        for _ in 0..300 {
          let len = rng.random_range(0..120);
          let old = random_text(&mut rng, len);
          let new = if rng.random_bool(0.25) {
            let len = rng.random_range(0..120);
            random_text(&mut rng, len)
          } else {
            mutate(&mut rng, &old)
          };

          let text = codec.serialize(&codec.delta(&old, &new));
          let patch = codec.deserialize(&text).unwrap();
          assert_eq!(
            codec.apply_strict(&patch, &old).as_deref(),
            Ok(new.as_str()),
            "margin {patch_margin}, cleanup {semantic_cleanup}\nold: {old:?}\npatch:\n{text}"
          );
        }
      }
    }
  }

  #[test]
  fn semantic_cleanup_yields_whole_word_hunks() {
    let codec = Codec::default();
    let diffs = codec.diff("hello world", "goodbye world");
    assert_eq!(diffs, vec![
      Diff::delete("hello"),
      Diff::insert("goodbye"),
      Diff::equal(" world"),
    ]);
  }

  #[test]
  fn options_deserialize_with_defaults() {
    let options: CodecOptions =
      serde_json::from_str(r#"{ "patch_margin": 8 }"#).unwrap();
    assert_eq!(options.patch_margin, 8);
    assert_eq!(options.match_distance, 1000);
    assert!(options.semantic_cleanup);
  }

  #[test]
  fn unified_diff_marks_changed_lines() {
    let out = unified_diff("a\nb\nc\n", "a\nB\nc\n", "v0", "v1");
    assert!(out.contains("--- v0"));
    assert!(out.contains("+++ v1"));
    assert!(out.contains("-b\n"));
    assert!(out.contains("+B\n"));
  }
}
