//! Backups: timestamped snapshots of the entry list.
//!
//! Snapshots are appended to one ever-growing list. Restoring overwrites the
//! entry list wholesale; nothing is merged.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::{
  Entitlements, Error, Result,
  entry::Entry,
  options::{OptionStore, Options},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backup {
  pub id:         Uuid,
  pub entries:    Vec<Entry>,
  pub created_at: DateTime<Utc>,
}

impl Backup {
  /// `license_verification_backup_<YYYYmmdd_HHMMSS>.json`
  pub fn file_name(&self) -> String {
    format!(
      "license_verification_backup_{}.json",
      self.created_at.format("%Y%m%d_%H%M%S")
    )
  }
}

/// A backup rendered as a file attachment.
#[derive(Debug, Clone)]
pub struct BackupDownload {
  pub file_name: String,
  pub body:      Vec<u8>,
}

#[derive(Clone)]
pub struct BackupManager<S> {
  options: Options<S>,
}

impl<S: OptionStore> BackupManager<S> {
  pub fn new(options: Options<S>) -> Self { Self { options } }

  pub async fn list(&self) -> Result<Vec<Backup>> { self.options.backups().await }

  /// Snapshot the current entries (premium only). Fails when there are none.
  pub async fn create_backup(&self, ent: Entitlements) -> Result<Backup> {
    ent.require_premium()?;
    let entries = self.options.entries().await?;
    if entries.is_empty() {
      return Err(Error::NothingToBackUp);
    }

    let backup = Backup { id: Uuid::new_v4(), entries, created_at: Utc::now() };
    let mut backups = self.list().await?;
    backups.push(backup.clone());
    self.options.set_backups(&backups).await?;
    info!(backup_id = %backup.id, entries = backup.entries.len(), "backup created");
    Ok(backup)
  }

  /// Replace the entry list with the `entries` of an uploaded backup file
  /// (premium only). Returns how many entries were restored. An id seen
  /// earlier in the file is replaced with a fresh one so every restored
  /// entry stays individually addressable.
  pub async fn restore_from_upload(&self, ent: Entitlements, contents: &[u8]) -> Result<usize> {
    ent.require_premium()?;
    let document: Value =
      serde_json::from_slice(contents).map_err(|_| Error::InvalidBackup)?;
    let raw_entries = document
      .as_object()
      .and_then(|obj| obj.get("entries"))
      .cloned()
      .ok_or(Error::InvalidBackup)?;
    let mut entries: Vec<Entry> =
      serde_json::from_value(raw_entries).map_err(|_| Error::InvalidBackup)?;

    let mut seen = HashSet::with_capacity(entries.len());
    for entry in &mut entries {
      if !seen.insert(entry.id) {
        entry.id = Uuid::new_v4();
        seen.insert(entry.id);
      }
    }

    self.options.set_entries(&entries).await?;
    info!(entries = entries.len(), "entries restored from backup");
    Ok(entries.len())
  }

  /// Render a stored backup as a downloadable JSON file.
  pub async fn download_backup(&self, id: Uuid) -> Result<BackupDownload> {
    let backup = self
      .list()
      .await?
      .into_iter()
      .find(|b| b.id == id)
      .ok_or(Error::BackupNotFound(id))?;
    Ok(BackupDownload {
      file_name: backup.file_name(),
      body:      serde_json::to_vec_pretty(&backup)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use std::{collections::BTreeMap, sync::Arc};

  use chrono::TimeZone;

  use super::*;
  use crate::memory::MemoryStore;

  fn entry(license: &str) -> Entry {
    Entry::new(BTreeMap::from([("License Number".to_owned(), license.to_owned())]))
  }

  fn manager() -> (BackupManager<MemoryStore>, Options<MemoryStore>) {
    let options = Options::new(Arc::new(MemoryStore::new()));
    (BackupManager::new(options.clone()), options)
  }

  #[tokio::test]
  async fn empty_store_has_nothing_to_back_up() {
    let (m, _) = manager();
    assert!(matches!(
      m.create_backup(Entitlements::PREMIUM).await,
      Err(Error::NothingToBackUp)
    ));
  }

  #[tokio::test]
  async fn backups_are_premium_only() {
    let (m, options) = manager();
    options.set_entries(&[entry("1")]).await.unwrap();
    assert!(matches!(
      m.create_backup(Entitlements::FREE).await,
      Err(Error::RequiresPremium)
    ));
    assert!(matches!(
      m.restore_from_upload(Entitlements::FREE, b"{}").await,
      Err(Error::RequiresPremium)
    ));
  }

  #[tokio::test]
  async fn download_then_restore_reproduces_entries() {
    let (m, options) = manager();
    let original = vec![entry("1"), entry("2"), entry("3")];
    options.set_entries(&original).await.unwrap();

    let backup = m.create_backup(Entitlements::PREMIUM).await.unwrap();
    options.set_entries(&[entry("other")]).await.unwrap();

    let file = m.download_backup(backup.id).await.unwrap();
    let restored = m
      .restore_from_upload(Entitlements::PREMIUM, &file.body)
      .await
      .unwrap();
    assert_eq!(restored, 3);
    assert_eq!(options.entries().await.unwrap(), original);
  }

  #[tokio::test]
  async fn malformed_uploads_change_nothing() {
    let (m, options) = manager();
    options.set_entries(&[entry("keep")]).await.unwrap();

    for body in [&b"not json"[..], b"[1,2]", b"{\"rows\":[]}", b"{\"entries\":5}"] {
      assert!(matches!(
        m.restore_from_upload(Entitlements::PREMIUM, body).await,
        Err(Error::InvalidBackup)
      ));
    }
    assert_eq!(options.entries().await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn restores_bare_entry_maps() {
    let (m, options) = manager();
    let body = br#"{"entries":[{"Name":"Ali","License Number":"9"}],"created_at":"2025-04-08 10:00:00"}"#;
    m.restore_from_upload(Entitlements::PREMIUM, body).await.unwrap();
    let entries = options.entries().await.unwrap();
    assert_eq!(entries[0].value("License Number"), Some("9"));
  }

  #[tokio::test]
  async fn duplicate_ids_are_reassigned_on_restore() {
    let (m, options) = manager();
    let first = entry("1");
    let mut copy = entry("2");
    copy.id = first.id;
    let body = serde_json::to_vec(&serde_json::json!({ "entries": [&first, &copy] })).unwrap();

    assert_eq!(m.restore_from_upload(Entitlements::PREMIUM, &body).await.unwrap(), 2);
    let entries = options.entries().await.unwrap();
    assert_eq!(entries[0].id, first.id);
    assert_ne!(entries[1].id, first.id);
    assert_eq!(entries[1].value("License Number"), Some("2"));
  }

  #[test]
  fn file_name_uses_creation_time() {
    let backup = Backup {
      id:         Uuid::nil(),
      entries:    vec![],
      created_at: Utc.with_ymd_and_hms(2025, 4, 8, 13, 5, 9).unwrap(),
    };
    assert_eq!(backup.file_name(), "license_verification_backup_20250408_130509.json");
  }

  #[tokio::test]
  async fn unknown_backup_id() {
    let (m, _) = manager();
    assert!(matches!(
      m.download_backup(Uuid::new_v4()).await,
      Err(Error::BackupNotFound(_))
    ));
  }
}
