//! ETag computation for reconstructed content.
//!
//! ETags are SHA-256 hashes over the filename, the version the content was
//! rebuilt at, and the content itself.

use sha2::{Digest, Sha256};

/// Compute a quoted strong ETag.
pub fn compute_etag(filename: &str, version: Option<usize>, content: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update((filename.len() as u64).to_le_bytes());
  hasher.update(filename.as_bytes());
  match version {
    Some(v) => {
      hasher.update([1]);
      hasher.update((v as u64).to_le_bytes());
    }
    None => hasher.update([0]),
  }
  hasher.update(content.as_bytes());
  format!("\"{}\"", hex::encode(hasher.finalize()))
}
