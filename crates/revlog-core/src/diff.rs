//! Character-level diffs between two texts.
//!
//! Diffs are computed with [`similar`]: a line-level Myers pass first, then
//! every replaced block is refined with a character-level pass. The result is
//! a flat list of [`Diff`] operations which, read left to right, spell out the
//! old text (equal + delete) and the new text (equal + insert).

use std::time::Duration;

use similar::{Algorithm, DiffTag, TextDiff, TextDiffConfig};

// ─── Operations ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
  Equal,
  Delete,
  Insert,
}

/// A single run of text with its edit operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff {
  pub op:   Op,
  pub text: String,
}

impl Diff {
  pub fn equal(text: impl Into<String>) -> Self {
    Self { op: Op::Equal, text: text.into() }
  }

  pub fn delete(text: impl Into<String>) -> Self {
    Self { op: Op::Delete, text: text.into() }
  }

  pub fn insert(text: impl Into<String>) -> Self {
    Self { op: Op::Insert, text: text.into() }
  }

  /// Length in Unicode scalar values; all patch coordinates use this unit.
  pub fn char_len(&self) -> usize { self.text.chars().count() }
}

/// The text a diff list was computed from.
pub fn source_text(diffs: &[Diff]) -> String {
  diffs
    .iter()
    .filter(|d| d.op != Op::Insert)
    .map(|d| d.text.as_str())
    .collect()
}

/// The text a diff list produces.
pub fn target_text(diffs: &[Diff]) -> String {
  diffs
    .iter()
    .filter(|d| d.op != Op::Delete)
    .map(|d| d.text.as_str())
    .collect()
}

// ─── Computation ─────────────────────────────────────────────────────────────

fn config(timeout: Option<Duration>) -> TextDiffConfig {
  let mut config = TextDiff::configure();
  config.algorithm(Algorithm::Myers);
  if let Some(timeout) = timeout {
    config.timeout(timeout);
  }
  config
}

/// Compute the operations transforming `old` into `new`.
///
/// `timeout` bounds the search; past it the diff is still correct but may be
/// less minimal. Identical inputs produce a single equality (or nothing for
/// two empty strings).
pub fn diff(old: &str, new: &str, timeout: Option<Duration>) -> Vec<Diff> {
  let mut out = Vec::new();
  if old == new {
    push(&mut out, Op::Equal, old.to_owned());
    return out;
  }

  let lines = config(timeout).diff_lines(old, new);
  let (old_lines, new_lines) = (lines.old_slices(), lines.new_slices());

  for op in lines.ops() {
    let (tag, o, n) = op.as_tag_tuple();
    match tag {
      DiffTag::Equal => push(&mut out, Op::Equal, old_lines[o].concat()),
      DiffTag::Delete => push(&mut out, Op::Delete, old_lines[o].concat()),
      DiffTag::Insert => push(&mut out, Op::Insert, new_lines[n].concat()),
      DiffTag::Replace => {
        let (a, b) = (old_lines[o].concat(), new_lines[n].concat());
        diff_chars(&a, &b, timeout, &mut out);
      }
    }
  }

  cleanup_merge(&mut out);
  out
}

fn diff_chars(old: &str, new: &str, timeout: Option<Duration>, out: &mut Vec<Diff>) {
  let chars = config(timeout).diff_chars(old, new);
  let (old_chars, new_chars) = (chars.old_slices(), chars.new_slices());

  for op in chars.ops() {
    let (tag, o, n) = op.as_tag_tuple();
    match tag {
      DiffTag::Equal => push(out, Op::Equal, old_chars[o].concat()),
      DiffTag::Delete => push(out, Op::Delete, old_chars[o].concat()),
      DiffTag::Insert => push(out, Op::Insert, new_chars[n].concat()),
      DiffTag::Replace => {
        push(out, Op::Delete, old_chars[o].concat());
        push(out, Op::Insert, new_chars[n].concat());
      }
    }
  }
}

/// Append `text`, folding it into the previous run when the ops agree.
fn push(out: &mut Vec<Diff>, op: Op, text: String) {
  if text.is_empty() {
    return;
  }
  match out.last_mut() {
    Some(last) if last.op == op => last.text.push_str(&text),
    _ => out.push(Diff { op, text }),
  }
}

// ─── Cleanup ─────────────────────────────────────────────────────────────────

/// Normalise a diff list: every run of edits between two equalities becomes
/// at most one delete followed by one insert, with any shared prefix or
/// suffix moved out into the neighbouring equalities.
pub fn cleanup_merge(diffs: &mut Vec<Diff>) {
  let mut out = Vec::with_capacity(diffs.len());
  let mut deleted = String::new();
  let mut inserted = String::new();

  for d in diffs.drain(..) {
    match d.op {
      Op::Delete => deleted.push_str(&d.text),
      Op::Insert => inserted.push_str(&d.text),
      Op::Equal => {
        flush_edits(&mut out, &mut deleted, &mut inserted);
        push(&mut out, Op::Equal, d.text);
      }
    }
  }
  flush_edits(&mut out, &mut deleted, &mut inserted);

  *diffs = out;
}

fn flush_edits(out: &mut Vec<Diff>, deleted: &mut String, inserted: &mut String) {
  let mut suffix = String::new();
  if !deleted.is_empty() && !inserted.is_empty() {
    let prefix = common_prefix(deleted, inserted);
    if prefix > 0 {
      push(out, Op::Equal, inserted[..prefix].to_owned());
      deleted.drain(..prefix);
      inserted.drain(..prefix);
    }
    let tail = common_suffix(deleted, inserted);
    if tail > 0 {
      suffix = inserted.split_off(inserted.len() - tail);
      deleted.truncate(deleted.len() - tail);
    }
  }
  push(out, Op::Delete, std::mem::take(deleted));
  push(out, Op::Insert, std::mem::take(inserted));
  push(out, Op::Equal, suffix);
}

/// Byte length of the longest common prefix, on a char boundary.
fn common_prefix(a: &str, b: &str) -> usize {
  a.char_indices()
    .zip(b.chars())
    .find(|((_, ca), cb)| ca != cb)
    .map_or(a.len().min(b.len()), |((i, _), _)| i)
}

/// Byte length of the longest common suffix, on a char boundary.
fn common_suffix(a: &str, b: &str) -> usize {
  a.char_indices()
    .rev()
    .zip(b.chars().rev())
    .find(|((_, ca), cb)| ca != cb)
    .map_or(a.len().min(b.len()), |((i, ca), _)| a.len() - i - ca.len_utf8())
}

/// Remove equalities that are no longer than the edits on either side of
/// them, turning scattered single-character matches into whole-word hunks.
///
/// Purely cosmetic: the source and target texts of the list are unchanged.
pub fn cleanup_semantic(diffs: &mut Vec<Diff>) {
  let mut changed = false;
  // Indices of equalities seen so far, innermost last.
  let mut equalities: Vec<usize> = Vec::new();
  let mut last_equality: Option<usize> = None;
  let (mut ins_before, mut del_before) = (0usize, 0usize);
  let (mut ins_after, mut del_after) = (0usize, 0usize);
  let mut pointer = 0;

  while pointer < diffs.len() {
    let len = diffs[pointer].char_len();
    match diffs[pointer].op {
      Op::Equal => {
        equalities.push(pointer);
        ins_before = ins_after;
        del_before = del_after;
        ins_after = 0;
        del_after = 0;
        last_equality = Some(len);
      }
      op => {
        if op == Op::Insert {
          ins_after += len;
        } else {
          del_after += len;
        }
        if let Some(eq_len) = last_equality
          && eq_len <= ins_before.max(del_before)
          && eq_len <= ins_after.max(del_after)
          && let Some(at) = equalities.pop()
        {
          // Replace the equality with a delete + insert of the same text.
          let text = diffs[at].text.clone();
          diffs[at].op = Op::Insert;
          diffs.insert(at, Diff::delete(text));
          // The equality before it needs to be re-evaluated.
          equalities.pop();
          pointer = equalities.last().map_or(0, |&p| p + 1);
          (ins_before, del_before, ins_after, del_after) = (0, 0, 0, 0);
          last_equality = None;
          changed = true;
          continue;
        }
      }
    }
    pointer += 1;
  }

  if changed {
    cleanup_merge(diffs);
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  fn check(old: &str, new: &str) -> Vec<Diff> {
    let diffs = diff(old, new, None);
    assert_eq!(source_text(&diffs), old);
    assert_eq!(target_text(&diffs), new);
    diffs
  }

  #[test]
  fn identical_texts_are_one_equality() {
    assert_eq!(check("same", "same"), vec![Diff::equal("same")]);
    assert!(check("", "").is_empty());
  }

  #[test]
  fn append_is_equal_then_insert() {
    let diffs = check("hello", "hello world");
    assert_eq!(diffs, vec![Diff::equal("hello"), Diff::insert(" world")]);
  }

  #[test]
  fn multi_line_edit_refines_inside_the_line() {
    let old = "fn main() {\n    println!(\"hi\");\n}\n";
    let new = "fn main() {\n    println!(\"hello\");\n}\n";
    let diffs = check(old, new);
    // The unchanged lines survive as equalities around the edit.
    assert!(diffs.first().is_some_and(|d| d.op == Op::Equal));
    assert!(diffs.last().is_some_and(|d| d.op == Op::Equal));
    let edited: usize = diffs
      .iter()
      .filter(|d| d.op != Op::Equal)
      .map(Diff::char_len)
      .sum();
    assert!(edited < 10, "edit not refined: {diffs:?}");
  }

  #[test]
  fn unicode_boundaries_are_respected() {
    check("héllo wörld 🎉", "héllo wörld 🎊!");
    check("ääää", "ääöä");
  }

  #[test]
  fn merge_factors_out_common_affixes() {
    let mut diffs = vec![
      Diff::delete("abc"),
      Diff::insert("abxc"),
      Diff::equal("z"),
    ];
    cleanup_merge(&mut diffs);
    assert_eq!(diffs, vec![
      Diff::equal("ab"),
      Diff::insert("x"),
      Diff::equal("cz"),
    ]);
  }

  #[test]
  fn semantic_cleanup_keeps_meaningful_equalities() {
    let mut diffs = vec![
      Diff::delete("ab"),
      Diff::insert("cd"),
      Diff::equal("12"),
      Diff::delete("e"),
    ];
    let before = diffs.clone();
    cleanup_semantic(&mut diffs);
    assert_eq!(diffs, before);
  }

  #[test]
  fn semantic_cleanup_absorbs_small_equality() {
    let mut diffs = vec![Diff::delete("a"), Diff::equal("b"), Diff::delete("c")];
    cleanup_semantic(&mut diffs);
    assert_eq!(diffs, vec![Diff::delete("abc"), Diff::insert("b")]);
  }

  #[test]
  fn semantic_cleanup_reevaluates_earlier_equalities() {
    let mut diffs = vec![
      Diff::delete("ab"),
      Diff::equal("cd"),
      Diff::delete("e"),
      Diff::equal("f"),
      Diff::insert("g"),
    ];
    cleanup_semantic(&mut diffs);
    assert_eq!(diffs, vec![Diff::delete("abcdef"), Diff::insert("cdfg")]);
  }
}
