//! SQL schema for the revlog SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS tracked_files (
    filename    TEXT PRIMARY KEY,
    base        TEXT NOT NULL,
    created_at  TEXT NOT NULL,   -- RFC 3339 UTC
    updated_at  TEXT NOT NULL    -- RFC 3339 UTC; bumped on every append
);

-- Chains are strictly append-only.
-- idx is the version index and always equals the row count before insert.
CREATE TABLE IF NOT EXISTS versions (
    filename      TEXT    NOT NULL REFERENCES tracked_files(filename),
    idx           INTEGER NOT NULL,
    timestamp     TEXT    NOT NULL,
    patch         TEXT    NOT NULL,
    author_name   TEXT,
    author_email  TEXT,
    PRIMARY KEY (filename, idx),
    CHECK (idx >= 0)
);

CREATE TRIGGER IF NOT EXISTS versions_no_update
BEFORE UPDATE ON versions
BEGIN
    SELECT RAISE(ABORT, 'versions are append-only');
END;

CREATE TRIGGER IF NOT EXISTS versions_no_delete
BEFORE DELETE ON versions
BEGIN
    SELECT RAISE(ABORT, 'versions are append-only');
END;

CREATE TRIGGER IF NOT EXISTS tracked_files_base_immutable
BEFORE UPDATE OF base ON tracked_files
BEGIN
    SELECT RAISE(ABORT, 'base snapshots are immutable');
END;

PRAGMA user_version = 1;
";
