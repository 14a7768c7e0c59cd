//! [`SqliteStore`]: the SQLite implementation of [`OptionStore`].

use std::{path::Path, time::Duration};

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use serde_json::Value;
use tracing::debug;

use verity_core::options::{OptionKey, OptionStore};

use crate::{
  Error, Result,
  encode::{decode_dt, decode_value, encode_dt, encode_value, expiry_after},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Verity option store backed by a single SQLite file.
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

  /// Open an in-memory store, useful for testing.
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

  async fn delete_row(&self, table: &'static str, key: OptionKey) -> Result<()> {
    let key = key.as_str();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!("DELETE FROM {table} WHERE key = ?1"),
          rusqlite::params![key],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── OptionStore impl ────────────────────────────────────────────────────────

impl OptionStore for SqliteStore {
  type Error = Error;

  async fn get(&self, key: OptionKey) -> Result<Option<Value>> {
    let key = key.as_str();
    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT value_json FROM options WHERE key = ?1",
              rusqlite::params![key],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    raw.as_deref().map(decode_value).transpose()
  }

  async fn set(&self, key: OptionKey, value: Value) -> Result<()> {
    let key = key.as_str();
    let value_json = encode_value(&value)?;
    let updated_at = encode_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO options (key, value_json, updated_at)
           VALUES (?1, ?2, ?3)
           ON CONFLICT(key) DO UPDATE SET
             value_json = excluded.value_json,
             updated_at = excluded.updated_at",
          rusqlite::params![key, value_json, updated_at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete(&self, key: OptionKey) -> Result<()> { self.delete_row("options", key).await }

  async fn get_transient(&self, key: OptionKey) -> Result<Option<Value>> {
    let name = key.as_str();
    let row: Option<(String, Option<String>)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT value_json, expires_at FROM transients WHERE key = ?1",
              rusqlite::params![name],
              |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?,
        )
      })
      .await?;

    let Some((value_json, expires_at)) = row else {
      return Ok(None);
    };
    let expired = match expires_at.as_deref() {
      Some(at) => decode_dt(at)? <= Utc::now(),
      None => false,
    };
    if expired {
      debug!(transient = name, "dropping expired transient");
      self.delete_row("transients", key).await?;
      return Ok(None);
    }
    decode_value(&value_json).map(Some)
  }

  async fn set_transient(
    &self,
    key: OptionKey,
    value: Value,
    ttl: Option<Duration>,
  ) -> Result<()> {
    let key = key.as_str();
    let value_json = encode_value(&value)?;
    let expires_at = ttl
      .map(|ttl| expiry_after(Utc::now(), ttl))
      .transpose()?
      .map(encode_dt);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO transients (key, value_json, expires_at)
           VALUES (?1, ?2, ?3)
           ON CONFLICT(key) DO UPDATE SET
             value_json = excluded.value_json,
             expires_at = excluded.expires_at",
          rusqlite::params![key, value_json, expires_at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_transient(&self, key: OptionKey) -> Result<()> {
    self.delete_row("transients", key).await
  }
}
