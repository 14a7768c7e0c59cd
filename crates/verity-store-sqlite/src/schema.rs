//! SQL schema for the Verity SQLite store.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS options (
    key         TEXT PRIMARY KEY,
    value_json  TEXT NOT NULL,
    updated_at  TEXT NOT NULL      -- ISO 8601 UTC
);

-- Expired rows are removed lazily, the first time they are read.
CREATE TABLE IF NOT EXISTS transients (
    key         TEXT PRIMARY KEY,
    value_json  TEXT NOT NULL,
    expires_at  TEXT               -- ISO 8601 UTC, NULL = never
);

PRAGMA user_version = 1;
";
