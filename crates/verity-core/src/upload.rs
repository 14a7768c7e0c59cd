//! Uploaded files and the storage they are handed to.

use std::future::Future;

/// A file received with a form submission, not yet stored.
#[derive(Debug, Clone)]
pub struct Upload {
  /// Client-supplied file name; only its extension is kept.
  pub file_name:    String,
  pub content_type: Option<String>,
  pub bytes:        Vec<u8>,
}

/// Where uploads end up. Entries only ever hold the URL returned by
/// [`UploadStore::put`].
pub trait UploadStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist `upload` and return the public URL it is served from.
  fn put(&self, upload: &Upload) -> impl Future<Output = Result<String, Self::Error>> + Send;

  /// Delete the file behind `url`. Returns `false` when `url` does not point
  /// into this store or the file is already gone.
  fn remove(&self, url: &str) -> impl Future<Output = Result<bool, Self::Error>> + Send;
}
