//! Conversions between stored column text and Rust values.
//!
//! Timestamps are RFC 3339 strings; option values are compact JSON.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{Error, Result};

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_value(value: &Value) -> Result<String> { Ok(serde_json::to_string(value)?) }

pub fn decode_value(s: &str) -> Result<Value> { Ok(serde_json::from_str(s)?) }

/// The absolute expiry for a transient stored at `now` with lifetime `ttl`.
pub fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>> {
  chrono::Duration::from_std(ttl)
    .ok()
    .and_then(|ttl| now.checked_add_signed(ttl))
    .ok_or(Error::TtlOutOfRange(ttl))
}
