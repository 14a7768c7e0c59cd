//! [`PostForm`]: a posted HTML form, urlencoded or multipart.
//!
//! Admin pages dispatch on which submit button's name is present in the body,
//! so the form is kept as a flat list of pairs rather than deserialised into
//! one struct per page.

use axum::{
  extract::{FromRequest, Multipart, Request},
  http::header,
};
use bytes::Bytes;
use uuid::Uuid;
use verity_core::{entry::Submission, upload::Upload};

use crate::error::Error;

#[derive(Debug, Default)]
pub struct PostForm {
  fields: Vec<(String, String)>,
  files:  Vec<(String, Upload)>,
}

impl PostForm {
  #[cfg(test)]
  pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
    Self {
      fields: pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect(),
      files:  Vec::new(),
    }
  }

  /// Whether `key` was submitted at all, with any value.
  pub fn has(&self, key: &str) -> bool { self.fields.iter().any(|(k, _)| k == key) }

  pub fn get(&self, key: &str) -> Option<&str> {
    self
      .fields
      .iter()
      .find(|(k, _)| k == key)
      .map(|(_, v)| v.as_str())
  }

  /// The value of `key`, or `""` when absent.
  pub fn text(&self, key: &str) -> &str { self.get(key).unwrap_or_default() }

  /// Every value submitted as `key[]` (or repeated `key`), in order.
  pub fn all(&self, key: &str) -> Vec<&str> {
    let bracketed = format!("{key}[]");
    self
      .fields
      .iter()
      .filter(|(k, _)| *k == bracketed || k == key)
      .map(|(_, v)| v.as_str())
      .collect()
  }

  /// Values of `key[]` that parse as ids; anything else is dropped.
  pub fn ids(&self, key: &str) -> Vec<Uuid> {
    self
      .all(key)
      .into_iter()
      .filter_map(|v| Uuid::parse_str(v).ok())
      .collect()
  }

  pub fn file(&self, key: &str) -> Option<&Upload> {
    self.files.iter().find(|(k, _)| k == key).map(|(_, u)| u)
  }

  /// Everything posted, as an entry submission keyed by input name.
  pub fn into_submission(self) -> Submission {
    Submission {
      values: self.fields.into_iter().collect(),
      files:  self.files.into_iter().collect(),
    }
  }
}

fn is_multipart(req: &Request) -> bool {
  req
    .headers()
    .get(header::CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

impl<S: Send + Sync> FromRequest<S> for PostForm {
  type Rejection = Error;

  async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
    if !is_multipart(&req) {
      let body = Bytes::from_request(req, state)
        .await
        .map_err(|e| Error::BadRequest(e.body_text()))?;
      let fields = serde_urlencoded::from_bytes(&body)
        .map_err(|e| Error::BadRequest(e.to_string()))?;
      return Ok(Self { fields, files: Vec::new() });
    }

    let mut multipart = Multipart::from_request(req, state)
      .await
      .map_err(|e| Error::BadRequest(e.body_text()))?;
    let mut form = Self::default();

    while let Some(field) = multipart
      .next_field()
      .await
      .map_err(|e| Error::BadRequest(e.body_text()))?
    {
      let Some(name) = field.name().map(str::to_owned) else {
        continue;
      };
      match field.file_name().map(str::to_owned) {
        Some(file_name) => {
          let content_type = field.content_type().map(str::to_owned);
          let bytes = field
            .bytes()
            .await
            .map_err(|e| Error::BadRequest(e.body_text()))?;
          // A file input left empty still sends a part with no name or data.
          if file_name.is_empty() && bytes.is_empty() {
            continue;
          }
          form.files.push((name, Upload { file_name, content_type, bytes: bytes.to_vec() }));
        }
        None => {
          let value = field
            .text()
            .await
            .map_err(|e| Error::BadRequest(e.body_text()))?;
          form.fields.push((name, value));
        }
      }
    }
    Ok(form)
  }
}

#[cfg(test)]
mod tests {
  use axum::body::Body;

  use super::*;

  #[tokio::test]
  async fn parses_urlencoded_arrays() {
    let id = Uuid::new_v4();
    let body = format!("lv_bulk_delete=1&entry_ids%5B%5D={id}&entry_ids%5B%5D=junk&name=A+B");
    let req = Request::builder()
      .method("POST")
      .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
      .body(Body::from(body))
      .unwrap();
    let form = PostForm::from_request(req, &()).await.unwrap();

    assert!(form.has("lv_bulk_delete"));
    assert_eq!(form.text("name"), "A B");
    assert_eq!(form.ids("entry_ids"), vec![id]);
    assert_eq!(form.text("missing"), "");
  }

  #[tokio::test]
  async fn parses_multipart_files() {
    let body = "--XX\r\n\
      Content-Disposition: form-data; name=\"lv_add_entry\"\r\n\r\n\
      1\r\n\
      --XX\r\n\
      Content-Disposition: form-data; name=\"photo\"; filename=\"me.png\"\r\n\
      Content-Type: image/png\r\n\r\n\
      PNGDATA\r\n\
      --XX\r\n\
      Content-Disposition: form-data; name=\"scan\"; filename=\"\"\r\n\
      Content-Type: application/octet-stream\r\n\r\n\
      \r\n\
      --XX--\r\n";
    let req = Request::builder()
      .method("POST")
      .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XX")
      .body(Body::from(body))
      .unwrap();
    let form = PostForm::from_request(req, &()).await.unwrap();

    assert!(form.has("lv_add_entry"));
    let photo = form.file("photo").unwrap();
    assert_eq!(photo.file_name, "me.png");
    assert_eq!(photo.bytes, b"PNGDATA");
    assert!(form.file("scan").is_none());
  }
}
