//! Interpreting the license server's JSON replies.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// Why a body could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyError {
  /// Not JSON, or JSON that is not an object.
  Malformed,
  /// `{}`
  Empty,
}

/// The fields of a verification reply this system looks at. Each is `None`
/// when absent or `null`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VerifyReply {
  #[serde(default)]
  pub status:   Option<Value>,
  #[serde(default)]
  pub expiry:   Option<Value>,
  #[serde(default)]
  pub site_url: Option<Value>,
  #[serde(default)]
  pub message:  Option<Value>,
}

impl VerifyReply {
  pub fn parse(body: &str) -> Result<Self, BodyError> {
    match serde_json::from_str::<Value>(body) {
      Ok(Value::Object(map)) if map.is_empty() => Err(BodyError::Empty),
      Ok(value @ Value::Object(_)) => {
        serde_json::from_value(value).map_err(|_| BodyError::Malformed)
      }
      _ => Err(BodyError::Malformed),
    }
  }

  pub fn is_valid(&self) -> bool { self.status.as_ref().and_then(Value::as_str) == Some("valid") }

  /// `status = valid` and both `expiry` and `site_url` were sent.
  pub fn is_complete_grant(&self) -> bool {
    self.is_valid() && self.expiry.is_some() && self.site_url.is_some()
  }

  pub fn expiry_text(&self) -> String { text(self.expiry.as_ref()) }

  pub fn site_url_text(&self) -> String { text(self.site_url.as_ref()) }

  pub fn message(&self) -> Option<String> {
    self.message.as_ref().map(|m| text(Some(m)))
  }
}

fn text(value: Option<&Value>) -> String {
  match value {
    None | Some(Value::Null) => String::new(),
    Some(Value::String(s)) => s.clone(),
    Some(other) => other.to_string(),
  }
}

/// Parse an expiry date as the license server sends it.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` and `YYYY-MM-DD`; the latter two
/// are taken as UTC.
pub fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
  let raw = raw.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Some(dt.with_timezone(&Utc));
  }
  if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
    return Some(dt.and_utc());
  }
  NaiveDate::parse_from_str(raw, "%Y-%m-%d")
    .ok()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn body_shapes() {
    assert_eq!(VerifyReply::parse("not json"), Err(BodyError::Malformed));
    assert_eq!(VerifyReply::parse("[1]"), Err(BodyError::Malformed));
    assert_eq!(VerifyReply::parse(""), Err(BodyError::Malformed));
    assert_eq!(VerifyReply::parse("{}"), Err(BodyError::Empty));

    let reply = VerifyReply::parse(
      r#"{"status":"valid","expiry":"2030-01-01","site_url":"https://a.test"}"#,
    )
    .unwrap();
    assert!(reply.is_complete_grant());
    assert_eq!(reply.expiry_text(), "2030-01-01");
  }

  #[test]
  fn null_fields_count_as_missing() {
    let reply = VerifyReply::parse(r#"{"status":"valid","expiry":"2030-01-01","site_url":null}"#)
      .unwrap();
    assert!(reply.is_valid());
    assert!(!reply.is_complete_grant());
  }

  #[test]
  fn expiry_formats() {
    let midnight = Utc.with_ymd_and_hms(2030, 1, 2, 0, 0, 0).unwrap();
    assert_eq!(parse_expiry("2030-01-02"), Some(midnight));
    assert_eq!(
      parse_expiry("2030-01-02 13:14:15"),
      Some(Utc.with_ymd_and_hms(2030, 1, 2, 13, 14, 15).unwrap())
    );
    assert_eq!(
      parse_expiry("2030-01-02T05:00:00+05:00"),
      Some(midnight)
    );
    assert_eq!(parse_expiry("someday"), None);
  }
}
