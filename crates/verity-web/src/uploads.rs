//! [`DiskUploads`]: uploaded files kept in a local directory and served
//! under `/uploads/`.

use std::{
  io,
  path::{Path, PathBuf},
};

use sha2::{Digest, Sha256};
use uuid::Uuid;
use verity_core::upload::{Upload, UploadStore};

/// Cheap to clone.
#[derive(Clone)]
pub struct DiskUploads {
  dir:      PathBuf,
  /// `<site_url>/uploads/`
  url_base: String,
}

impl DiskUploads {
  pub fn new(dir: impl AsRef<Path>, site_url: &str) -> Self {
    Self {
      dir:      dir.as_ref().to_path_buf(),
      url_base: format!("{}/uploads/", site_url.trim_end_matches('/')),
    }
  }

  /// The file a URL points at, if it points into this store.
  fn path_for(&self, url: &str) -> Option<PathBuf> {
    let name = url.strip_prefix(&self.url_base)?;
    let valid = !name.is_empty()
      && name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
      && !name.starts_with('.');
    valid.then(|| self.dir.join(name))
  }
}

/// `<content hash prefix>-<random>.<ext>`; the client's name contributes
/// only its extension.
fn stored_name(upload: &Upload) -> String {
  let digest = hex::encode(Sha256::digest(&upload.bytes));
  let ext: String = Path::new(&upload.file_name)
    .extension()
    .and_then(|e| e.to_str())
    .unwrap_or_default()
    .chars()
    .filter(char::is_ascii_alphanumeric)
    .take(10)
    .collect::<String>()
    .to_ascii_lowercase();
  let stem = format!("{}-{}", &digest[..16], Uuid::new_v4().simple());
  if ext.is_empty() { stem } else { format!("{stem}.{ext}") }
}

impl UploadStore for DiskUploads {
  type Error = io::Error;

  async fn put(&self, upload: &Upload) -> Result<String, io::Error> {
    tokio::fs::create_dir_all(&self.dir).await?;
    let name = stored_name(upload);
    tokio::fs::write(self.dir.join(&name), &upload.bytes).await?;
    Ok(format!("{}{name}", self.url_base))
  }

  async fn remove(&self, url: &str) -> Result<bool, io::Error> {
    let Some(path) = self.path_for(url) else {
      return Ok(false);
    };
    match tokio::fs::remove_file(path).await {
      Ok(()) => Ok(true),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
      Err(e) => Err(e),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn upload(name: &str) -> Upload {
    Upload { file_name: name.into(), content_type: None, bytes: b"png bytes".to_vec() }
  }

  #[tokio::test]
  async fn put_then_remove() {
    let dir = tempfile::tempdir().unwrap();
    let store = DiskUploads::new(dir.path(), "https://example.com/");

    let url = store.put(&upload("../../etc/Photo.PNG")).await.unwrap();
    assert!(url.starts_with("https://example.com/uploads/"), "{url}");
    assert!(url.ends_with(".png"), "{url}");

    let name = url.rsplit('/').next().unwrap();
    assert_eq!(std::fs::read(dir.path().join(name)).unwrap(), b"png bytes");

    assert!(store.remove(&url).await.unwrap());
    assert!(!store.remove(&url).await.unwrap());
  }

  #[tokio::test]
  async fn same_content_gets_distinct_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = DiskUploads::new(dir.path(), "https://example.com");
    let a = store.put(&upload("a.jpg")).await.unwrap();
    let b = store.put(&upload("a.jpg")).await.unwrap();
    assert_ne!(a, b);
  }

  #[tokio::test]
  async fn foreign_urls_are_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let store = DiskUploads::new(dir.path(), "https://example.com");
    assert!(!store.remove("https://elsewhere.test/uploads/x.png").await.unwrap());
    assert!(!store.remove("https://example.com/uploads/../secret").await.unwrap());
    assert!(!store.remove("https://example.com/uploads/").await.unwrap());
  }
}
