//! Context-anchored patches and their text format.
//!
//! A [`PatchSet`] is a list of hunks built from a diff list. Each hunk carries
//! a few characters of surrounding context so it can still be located when the
//! text it is applied to has drifted. The text form is stable and is what the
//! version chain stores:
//!
//! ```text
//! @@ -1,5 +1,11 @@
//!  hello
//! + world
//! ```
//!
//! Coordinates are 1-based character offsets (`start,0` with a 0-based start
//! for empty ranges, no length for single characters). Every body line is an
//! operation sign followed by the percent-encoded text of the run.

use std::{fmt, str::FromStr};

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use thiserror::Error;

use crate::diff::{Diff, Op};

/// Longest context pattern grown while searching for a unique anchor.
pub const MAX_PATTERN: usize = 32;

/// Characters escaped in the body lines: controls (newlines included), `%`,
/// and the characters a URI encoder would escape. Non-ASCII is always escaped.
const BODY: &AsciiSet = &CONTROLS
  .add(b'%')
  .add(b'"')
  .add(b'<')
  .add(b'>')
  .add(b'[')
  .add(b'\\')
  .add(b']')
  .add(b'^')
  .add(b'`')
  .add(b'{')
  .add(b'|')
  .add(b'}');

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
  #[error("malformed patch at line {line}: {reason}")]
  Malformed { line: usize, reason: String },

  #[error("hunk {hunk} does not match the text it is applied to")]
  Rejected { hunk: usize },
}

fn malformed(line: usize, reason: impl fmt::Display) -> PatchError {
  PatchError::Malformed { line, reason: reason.to_string() }
}

// ─── Patch ───────────────────────────────────────────────────────────────────

/// One hunk: a diff list anchored at a position in the source and target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
  pub diffs:   Vec<Diff>,
  /// Offset in the original text, for display.
  pub start1:  usize,
  /// Offset in the text this hunk is applied to, after earlier hunks.
  pub start2:  usize,
  pub length1: usize,
  pub length2: usize,
}

impl Patch {
  fn shift_back(&mut self, by: usize) {
    self.start1 -= by;
    self.start2 -= by;
  }
}

fn coords(start: usize, length: usize) -> String {
  match length {
    0 => format!("{start},0"),
    1 => format!("{}", start + 1),
    n => format!("{},{n}", start + 1),
  }
}

impl fmt::Display for Patch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(
      f,
      "@@ -{} +{} @@",
      coords(self.start1, self.length1),
      coords(self.start2, self.length2)
    )?;
    for d in &self.diffs {
      let sign = match d.op {
        Op::Equal => ' ',
        Op::Delete => '-',
        Op::Insert => '+',
      };
      writeln!(f, "{sign}{}", utf8_percent_encode(&d.text, BODY))?;
    }
    Ok(())
  }
}

// ─── PatchSet ────────────────────────────────────────────────────────────────

/// Knobs for locating hunks in drifted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
  /// Context kept at the first fuzz level.
  pub margin:         usize,
  /// How far from its expected position a hunk may be found.
  pub match_distance: usize,
}

impl Default for ApplyOptions {
  fn default() -> Self { Self { margin: 4, match_distance: 1000 } }
}

/// An ordered list of hunks. Empty means "no change".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSet(Vec<Patch>);

impl PatchSet {
  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn hunks(&self) -> &[Patch] { &self.0 }

  /// Build hunks for `diffs`, which must have been computed from `old`.
  ///
  /// Equalities longer than twice `margin` split hunks; shorter ones stay
  /// inside the current hunk.
  pub fn make(old: &str, diffs: &[Diff], margin: usize) -> Self {
    let margin = margin.max(1);
    let mut patches = Vec::new();
    if diffs.iter().all(|d| d.op == Op::Equal) {
      return Self(patches);
    }

    let mut patch = Patch::default();
    let (mut count1, mut count2) = (0usize, 0usize);
    // Text before the current hunk, and with every diff so far applied.
    let mut prepatch: Vec<char> = old.chars().collect();
    let mut postpatch = prepatch.clone();

    for (x, d) in diffs.iter().enumerate() {
      let chars: Vec<char> = d.text.chars().collect();
      let len = chars.len();

      if patch.diffs.is_empty() && d.op != Op::Equal {
        patch.start1 = count1;
        patch.start2 = count2;
      }

      match d.op {
        Op::Insert => {
          patch.diffs.push(d.clone());
          patch.length2 += len;
          postpatch.splice(count2..count2, chars);
        }
        Op::Delete => {
          patch.diffs.push(d.clone());
          patch.length1 += len;
          postpatch.drain(count2..count2 + len);
        }
        Op::Equal => {
          if len <= 2 * margin && !patch.diffs.is_empty() && x + 1 != diffs.len() {
            patch.diffs.push(d.clone());
            patch.length1 += len;
            patch.length2 += len;
          } else if len >= 2 * margin && !patch.diffs.is_empty() {
            add_context(&mut patch, &prepatch, margin);
            patches.push(std::mem::take(&mut patch));
            prepatch.clone_from(&postpatch);
            count1 = count2;
          }
        }
      }

      if d.op != Op::Insert {
        count1 += len;
      }
      if d.op != Op::Delete {
        count2 += len;
      }
    }

    if !patch.diffs.is_empty() {
      add_context(&mut patch, &prepatch, margin);
      patches.push(patch);
    }

    Self(patches)
  }

  /// Apply every hunk in order, reporting per hunk whether it was placed.
  ///
  /// A rejected hunk is skipped; later hunks are still attempted.
  pub fn apply(&self, text: &str, options: ApplyOptions) -> (String, Vec<bool>) {
    let mut chars: Vec<char> = text.chars().collect();
    let mut results = Vec::with_capacity(self.0.len());
    // Observed offset between where hunks were expected and where they landed.
    let mut delta: isize = 0;

    for patch in &self.0 {
      let placed = apply_hunk(&mut chars, patch, &mut delta, options);
      if !placed {
        let drift = patch.length2 as isize - patch.length1 as isize;
        delta = delta.saturating_sub(drift);
      }
      results.push(placed);
    }

    (chars.into_iter().collect(), results)
  }

  /// Like [`PatchSet::apply`], but any rejected hunk is an error.
  pub fn apply_strict(&self, text: &str, options: ApplyOptions) -> Result<String, PatchError> {
    let (out, results) = self.apply(text, options);
    match results.iter().position(|ok| !ok) {
      Some(hunk) => Err(PatchError::Rejected { hunk }),
      None => Ok(out),
    }
  }
}

impl fmt::Display for PatchSet {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.iter().try_for_each(|p| write!(f, "{p}"))
  }
}

impl FromStr for PatchSet {
  type Err = PatchError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut patches = Vec::new();
    let mut lines = s.split('\n').enumerate().peekable();

    while let Some((n, line)) = lines.next() {
      if line.is_empty() {
        continue;
      }
      let mut patch =
        parse_header(line).ok_or_else(|| malformed(n + 1, "expected hunk header"))?;

      while let Some(&(n, line)) = lines.peek() {
        if line.starts_with('@') {
          break;
        }
        lines.next();
        let Some(sign) = line.chars().next() else {
          continue;
        };
        let op = match sign {
          ' ' => Op::Equal,
          '-' => Op::Delete,
          '+' => Op::Insert,
          other => return Err(malformed(n + 1, format!("unknown operation {other:?}"))),
        };
        let text = percent_decode_str(&line[sign.len_utf8()..])
          .decode_utf8()
          .map_err(|e| malformed(n + 1, e))?
          .into_owned();
        patch.diffs.push(Diff { op, text });
      }

      let source: usize = patch
        .diffs
        .iter()
        .filter(|d| d.op != Op::Insert)
        .map(Diff::char_len)
        .sum();
      let target: usize = patch
        .diffs
        .iter()
        .filter(|d| d.op != Op::Delete)
        .map(Diff::char_len)
        .sum();
      if source != patch.length1 || target != patch.length2 {
        return Err(malformed(n + 1, "hunk lengths do not match its body"));
      }

      patches.push(patch);
    }

    Ok(Self(patches))
  }
}

fn parse_header(line: &str) -> Option<Patch> {
  let inner = line.strip_prefix("@@ -")?.strip_suffix(" @@")?;
  let (old, new) = inner.split_once(" +")?;
  let (start1, length1) = parse_coords(old)?;
  let (start2, length2) = parse_coords(new)?;
  Some(Patch { diffs: Vec::new(), start1, start2, length1, length2 })
}

/// Starts must fit an `isize` so placement offsets stay signed.
fn parse_coords(s: &str) -> Option<(usize, usize)> {
  let (start, length) = match s.split_once(',') {
    None => (s.parse::<usize>().ok()?.checked_sub(1)?, 1),
    Some((start, "0")) => (start.parse().ok()?, 0),
    Some((start, len)) => (start.parse::<usize>().ok()?.checked_sub(1)?, len.parse().ok()?),
  };
  isize::try_from(start).is_ok().then_some((start, length))
}

// ─── Context ─────────────────────────────────────────────────────────────────

/// Surround a hunk with enough context to make it unambiguous in `text`.
fn add_context(patch: &mut Patch, text: &[char], margin: usize) {
  if text.is_empty() {
    return;
  }

  let start = patch.start2.min(text.len());
  let end = (patch.start2 + patch.length1).min(text.len());
  let mut padding = 0;
  let mut pattern = &text[start..end];
  while !is_unique(text, pattern) && pattern.len() < MAX_PATTERN.saturating_sub(2 * margin) {
    padding += margin;
    let lo = start.saturating_sub(padding);
    let hi = (end + padding).min(text.len());
    pattern = &text[lo..hi];
  }
  padding += margin;

  let prefix: String = text[start.saturating_sub(padding)..start].iter().collect();
  let suffix: String = text[end..(end + padding).min(text.len())].iter().collect();
  let (prefix_len, suffix_len) = (prefix.chars().count(), suffix.chars().count());

  if prefix_len > 0 {
    patch.diffs.insert(0, Diff::equal(prefix));
  }
  if suffix_len > 0 {
    patch.diffs.push(Diff::equal(suffix));
  }
  patch.shift_back(prefix_len);
  patch.length1 += prefix_len + suffix_len;
  patch.length2 += prefix_len + suffix_len;
}

fn find(text: &[char], pattern: &[char], from: usize) -> Option<usize> {
  let last = text.len().checked_sub(pattern.len())?;
  (from..=last).find(|&i| text[i..i + pattern.len()] == *pattern)
}

fn is_unique(text: &[char], pattern: &[char]) -> bool {
  if pattern.is_empty() {
    return text.is_empty();
  }
  match find(text, pattern, 0) {
    Some(first) => find(text, pattern, first + 1).is_none(),
    None => true,
  }
}

// ─── Application ─────────────────────────────────────────────────────────────

/// A hunk split into its context and its edited core.
struct Hunk {
  lead:   Vec<char>,
  trail:  Vec<char>,
  source: Vec<char>,
  target: Vec<char>,
}

impl Hunk {
  fn split(patch: &Patch) -> Self {
    let mut diffs = patch.diffs.as_slice();
    let mut lead = Vec::new();
    let mut trail = Vec::new();

    if let [first, rest @ ..] = diffs
      && first.op == Op::Equal
    {
      lead = first.text.chars().collect();
      diffs = rest;
    }
    if let [rest @ .., last] = diffs
      && last.op == Op::Equal
    {
      trail = last.text.chars().collect();
      diffs = rest;
    }

    let source = diffs
      .iter()
      .filter(|d| d.op != Op::Insert)
      .flat_map(|d| d.text.chars())
      .collect();
    let target = diffs
      .iter()
      .filter(|d| d.op != Op::Delete)
      .flat_map(|d| d.text.chars())
      .collect();

    Self { lead, trail, source, target }
  }
}

fn shifted(position: usize, delta: isize) -> Option<usize> {
  let position = isize::try_from(position).ok()?;
  Some(position.checked_add(delta)?.max(0) as usize)
}

/// Place one hunk, trying full context first and then progressively less.
fn apply_hunk(
  chars: &mut Vec<char>,
  patch: &Patch,
  delta: &mut isize,
  options: ApplyOptions,
) -> bool {
  let hunk = Hunk::split(patch);
  // Full context, then `margin` characters of it, then none. Pure insertions
  // have nothing but context to anchor on and are never fuzzed.
  let fuzz = [usize::MAX, options.margin, 0];
  let levels = if hunk.source.is_empty() { &fuzz[..1] } else { &fuzz[..] };

  let mut previous: Option<(usize, usize)> = None;
  for &keep in levels {
    let kept_lead = hunk.lead.len().min(keep);
    let kept_trail = hunk.trail.len().min(keep);
    if previous == Some((kept_lead, kept_trail)) {
      continue;
    }
    previous = Some((kept_lead, kept_trail));

    let lead = &hunk.lead[hunk.lead.len() - kept_lead..];
    let trail = &hunk.trail[..kept_trail];
    let pattern = [lead, hunk.source.as_slice(), trail].concat();
    // Positions past the end of the address space can never be placed.
    let Some(nominal) = patch.start2.checked_add(hunk.lead.len() - kept_lead) else {
      continue;
    };
    let Some(expected) = shifted(nominal, *delta) else {
      continue;
    };
    if let Some(at) = nearest(chars, &pattern, expected, options.match_distance) {
      let replacement = [lead, hunk.target.as_slice(), trail].concat();
      chars.splice(at..at + pattern.len(), replacement);
      *delta = at as isize - nominal as isize;
      return true;
    }
  }

  false
}

/// The exact occurrence of `pattern` closest to `expected`, earlier first on
/// ties, no further than `distance` away.
fn nearest(text: &[char], pattern: &[char], expected: usize, distance: usize) -> Option<usize> {
  let last = text.len().checked_sub(pattern.len())?;
  let matches = |i: usize| i <= last && text[i..i + pattern.len()] == *pattern;

  for d in 0..=distance {
    let below = expected.checked_sub(d);
    if below.is_some_and(matches) {
      return below;
    }
    let above = expected.checked_add(d);
    if d > 0 && above.is_some_and(matches) {
      return above;
    }
    if below.is_none_or(|b| b == 0) && above.is_none_or(|a| a >= last) {
      break;
    }
  }
  None
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;
  use crate::diff::diff;

  fn patch_for(old: &str, new: &str) -> PatchSet {
    PatchSet::make(old, &diff(old, new, None), 4)
  }

  fn round_trip(old: &str, new: &str) {
    let patches = patch_for(old, new);
    let text = patches.to_string();
    let parsed: PatchSet = text.parse().expect("parse");
    assert_eq!(parsed, patches, "text form:\n{text}");
    let out = parsed
      .apply_strict(old, ApplyOptions::default())
      .expect("apply");
    assert_eq!(out, new);
  }

  #[test]
  fn append_produces_expected_text_form() {
    let patches = patch_for("hello", "hello world");
    assert_eq!(patches.to_string(), "@@ -1,5 +1,11 @@\n hello\n+ world\n");
  }

  #[test]
  fn identical_texts_give_empty_patch() {
    let patches = patch_for("unchanged\n", "unchanged\n");
    assert!(patches.is_empty());
    assert_eq!(patches.to_string(), "");
    let parsed: PatchSet = "".parse().unwrap();
    assert!(parsed.is_empty());
  }

  #[test]
  fn round_trips_realistic_edits() {
    round_trip("hello", "hello world");
    round_trip("hello world", "goodbye world");
    round_trip("", "first contents\n");
    round_trip("to be removed\n", "");
    round_trip(
      "use std::io;\n\nfn main() {\n    let x = 1;\n    println!(\"{x}\");\n}\n",
      "use std::fmt;\nuse std::io;\n\nfn main() {\n    let x = 2;\n    println!(\"{x}\");\n    // done\n}\n",
    );
    round_trip("ab ab ab ab ab ab ab ab", "ab ab ab ab ab ab ab ab ab");
    round_trip("100% \"quoted\" {braces} | pipes\t\r\n", "99% [brackets] \\ back`tick\n");
    round_trip("héllo wörld 🎉", "héllo wörld 🎊!");
  }

  #[test]
  fn distant_edits_make_separate_hunks() {
    let old = "alpha\nbeta\ngamma\ndelta\nepsilon\nzeta\neta\ntheta\n";
    let new = "ALPHA\nbeta\ngamma\ndelta\nepsilon\nzeta\neta\nTHETA\n";
    let patches = patch_for(old, new);
    assert_eq!(patches.len(), 2);
    round_trip(old, new);
  }

  #[test]
  fn newlines_and_percent_are_escaped() {
    let text = patch_for("a\nb", "a\n%b").to_string();
    assert!(text.contains("%0A"), "{text}");
    assert!(text.contains("%25"), "{text}");
    assert_eq!(text.matches('\n').count(), text.lines().count());
  }

  #[test]
  fn applies_to_drifted_text() {
    let old = "The quick brown fox jumps over the lazy dog.";
    let new = "The quick red fox jumps over the lazy dog.";
    let patches = patch_for(old, new);

    let drifted = format!("Preface. {old}");
    let (out, results) = patches.apply(&drifted, ApplyOptions::default());
    assert_eq!(results, vec![true]);
    assert_eq!(out, format!("Preface. {new}"));
  }

  #[test]
  fn fuzz_tolerates_changed_context() {
    let old = "The quick brown fox jumps over the lazy dog.";
    let new = "The quick brown cat jumps over the lazy dog.";
    let patches = patch_for(old, new);

    // The context around "fox" changed, but the edited core is intact.
    let drifted = "The quick browN fox jUmps over the lazy dog.";
    let out = patches
      .apply_strict(drifted, ApplyOptions::default())
      .unwrap();
    assert_eq!(out, "The quick browN cat jUmps over the lazy dog.");
  }

  #[test]
  fn unrelated_text_is_rejected() {
    let patches = patch_for("hello world", "goodbye world");
    let (out, results) = patches.apply("something else entirely", ApplyOptions::default());
    assert_eq!(results, vec![false]);
    assert_eq!(out, "something else entirely");
    assert_eq!(
      patches.apply_strict("something else entirely", ApplyOptions::default()),
      Err(PatchError::Rejected { hunk: 0 })
    );
  }

  #[test]
  fn match_distance_limits_the_search() {
    let old = "needle";
    let new = "needles";
    let patches = patch_for(old, new);
    let far = format!("{}needle", "x".repeat(50));
    let options = ApplyOptions { margin: 4, match_distance: 10 };
    assert!(patches.apply_strict(&far, options).is_err());
    let options = ApplyOptions { margin: 4, match_distance: 100 };
    assert_eq!(patches.apply_strict(&far, options).unwrap(), format!("{}needles", "x".repeat(50)));
  }

  #[test]
  fn rejects_malformed_text() {
    let err = "not a patch".parse::<PatchSet>().unwrap_err();
    assert!(matches!(err, PatchError::Malformed { line: 1, .. }));

    let err = "@@ -1,5 +1,11 @@\n*hello\n".parse::<PatchSet>().unwrap_err();
    assert!(matches!(err, PatchError::Malformed { line: 2, .. }));

    let err = "@@ -1,5 +1,11 @@\n hello\n+ wor\n".parse::<PatchSet>().unwrap_err();
    assert!(matches!(err, PatchError::Malformed { line: 1, .. }));

    let err = "@@ -1 +1 @@\n-%FF\n+a\n".parse::<PatchSet>().unwrap_err();
    assert!(matches!(err, PatchError::Malformed { line: 2, .. }));
  }

  #[test]
  fn rejects_out_of_range_coordinates() {
    let text = format!("@@ -{0},7 +{0},7 @@\n abcdef\n-x\n+y\n", usize::MAX);
    let err = text.parse::<PatchSet>().unwrap_err();
    assert!(matches!(err, PatchError::Malformed { line: 1, .. }));

    let text = format!("@@ -{0} +{0} @@\n-x\n+y\n", isize::MAX as usize + 2);
    assert!(text.parse::<PatchSet>().is_err());
  }

  #[test]
  fn hunks_beyond_addressable_text_are_rejected() {
    let far = Patch {
      diffs:   vec![Diff::equal("abcdef"), Diff::delete("x"), Diff::insert("y")],
      start1:  usize::MAX - 1,
      start2:  usize::MAX - 1,
      length1: 7,
      length2: 7,
    };
    let patches = PatchSet(vec![far.clone(), far]);
    let (out, results) = patches.apply("hello world", ApplyOptions::default());
    assert_eq!(results, vec![false, false]);
    assert_eq!(out, "hello world");
    assert_eq!(
      patches.apply_strict("hello world", ApplyOptions::default()),
      Err(PatchError::Rejected { hunk: 0 })
    );
  }

  #[test]
  fn parses_short_coordinates() {
    let patches: PatchSet = "@@ -1 +1 @@\n-a\n+b\n".parse().unwrap();
    let hunk = &patches.hunks()[0];
    assert_eq!((hunk.start1, hunk.length1, hunk.start2, hunk.length2), (0, 1, 0, 1));
    assert_eq!(patches.apply_strict("a", ApplyOptions::default()).unwrap(), "b");
  }
}
