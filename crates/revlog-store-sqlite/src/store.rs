//! [`SqliteStore`]: the SQLite implementation of [`VersionStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior};

use revlog_core::{
  file::{FileSummary, TrackedFile, VersionEntry, VersionSummary},
  store::VersionStore,
};

use crate::{
  Error, Result,
  encode::{
    RawFile, RawSummary, RawVersion, RawVersionSummary, encode_author, encode_dt,
  },
  schema::SCHEMA,
};

/// What happened inside an append transaction.
enum Appended {
  Missing,
  Stale(usize),
  Done,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A revlog version store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Raw connection handle, for tests that probe the schema directly.
  #[cfg(test)]
  pub(crate) fn connection(&self) -> &tokio_rusqlite::Connection { &self.conn }
}

// ─── VersionStore impl ───────────────────────────────────────────────────────

impl VersionStore for SqliteStore {
  type Error = Error;

  async fn find(&self, filename: &str) -> Result<Option<TrackedFile>> {
    let name = filename.to_owned();

    let raw: Option<(RawFile, Vec<RawVersion>)> = self
      .conn
      .call(move |conn| {
        // One read transaction so the base and the chain agree.
        let tx = conn.transaction()?;

        let file = tx
          .query_row(
            "SELECT filename, base, created_at, updated_at
             FROM tracked_files WHERE filename = ?1",
            rusqlite::params![name],
            |row| {
              Ok(RawFile {
                filename:   row.get(0)?,
                base:       row.get(1)?,
                created_at: row.get(2)?,
                updated_at: row.get(3)?,
              })
            },
          )
          .optional()?;

        let Some(file) = file else {
          return Ok(None);
        };

        let versions = {
          let mut stmt = tx.prepare(
            "SELECT timestamp, patch, author_name, author_email
             FROM versions WHERE filename = ?1 ORDER BY idx",
          )?;
          stmt
            .query_map(rusqlite::params![name], |row| {
              Ok(RawVersion {
                timestamp:    row.get(0)?,
                patch:        row.get(1)?,
                author_name:  row.get(2)?,
                author_email: row.get(3)?,
              })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        tx.commit()?;
        Ok(Some((file, versions)))
      })
      .await?;

    raw.map(|(file, versions)| file.into_file(versions)).transpose()
  }

  async fn create(&self, filename: &str, base: String) -> Result<TrackedFile> {
    let file = TrackedFile::new(filename, base);

    let name       = file.filename.clone();
    let base       = file.base.clone();
    let created_at = encode_dt(file.created_at);
    let updated_at = encode_dt(file.updated_at);

    let created = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let exists = tx
          .query_row(
            "SELECT 1 FROM tracked_files WHERE filename = ?1",
            rusqlite::params![name],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if exists {
          return Ok(false);
        }

        tx.execute(
          "INSERT INTO tracked_files (filename, base, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![name, base, created_at, updated_at],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !created {
      return Err(Error::AlreadyExists(file.filename));
    }
    tracing::debug!(filename = %file.filename, "tracked file inserted");
    Ok(file)
  }

  async fn append(
    &self,
    filename: &str,
    entry: VersionEntry,
    expected_len: Option<usize>,
  ) -> Result<TrackedFile> {
    let name                        = filename.to_owned();
    let timestamp                   = encode_dt(entry.timestamp);
    let (author_name, author_email) = encode_author(entry.author);
    let patch                       = entry.patch;
    let now                         = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        // IMMEDIATE takes the write lock up front so the length check and the
        // insert cannot interleave with another writer.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists = tx
          .query_row(
            "SELECT 1 FROM tracked_files WHERE filename = ?1",
            rusqlite::params![name],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !exists {
          return Ok(Appended::Missing);
        }

        let len: i64 = tx.query_row(
          "SELECT COUNT(*) FROM versions WHERE filename = ?1",
          rusqlite::params![name],
          |row| row.get(0),
        )?;
        let len = len as usize;
        if expected_len.is_some_and(|expected| expected != len) {
          return Ok(Appended::Stale(len));
        }

        tx.execute(
          "INSERT INTO versions (filename, idx, timestamp, patch, author_name, author_email)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![name, len as i64, timestamp, patch, author_name, author_email],
        )?;
        tx.execute(
          "UPDATE tracked_files SET updated_at = ?2 WHERE filename = ?1",
          rusqlite::params![name, now],
        )?;
        tx.commit()?;
        Ok(Appended::Done)
      })
      .await?;

    match outcome {
      Appended::Missing => Err(Error::NotFound(filename.to_owned())),
      Appended::Stale(actual) => {
        tracing::debug!(%filename, ?expected_len, actual, "append rejected: stale head");
        Err(Error::Conflict {
          filename: filename.to_owned(),
          expected: expected_len.unwrap_or(actual),
          actual,
        })
      }
      Appended::Done => self
        .find(filename)
        .await?
        .ok_or_else(|| Error::NotFound(filename.to_owned())),
    }
  }

  async fn list(&self) -> Result<Vec<FileSummary>> {
    let raws: Vec<RawSummary> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT f.filename, COUNT(v.idx), f.created_at, f.updated_at
           FROM tracked_files f
           LEFT JOIN versions v ON v.filename = f.filename
           GROUP BY f.filename
           ORDER BY f.filename",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawSummary {
              filename:      row.get(0)?,
              version_count: row.get(1)?,
              created_at:    row.get(2)?,
              updated_at:    row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSummary::into_summary).collect()
  }

  async fn history(&self, filename: &str) -> Result<Option<Vec<VersionSummary>>> {
    let name = filename.to_owned();

    let raws: Option<Vec<RawVersionSummary>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let exists = tx
          .query_row(
            "SELECT 1 FROM tracked_files WHERE filename = ?1",
            rusqlite::params![name],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !exists {
          return Ok(None);
        }

        let rows = {
          let mut stmt = tx.prepare(
            "SELECT idx, timestamp, author_name, author_email
             FROM versions WHERE filename = ?1 ORDER BY idx",
          )?;
          stmt
            .query_map(rusqlite::params![name], |row| {
              Ok(RawVersionSummary {
                idx:          row.get(0)?,
                timestamp:    row.get(1)?,
                author_name:  row.get(2)?,
                author_email: row.get(3)?,
              })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        tx.commit()?;
        Ok(Some(rows))
      })
      .await?;

    raws
      .map(|rows| rows.into_iter().map(RawVersionSummary::into_summary).collect())
      .transpose()
  }
}
