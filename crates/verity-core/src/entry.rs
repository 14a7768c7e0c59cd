//! Entry store: the records administrators collect and visitors look up.
//!
//! Entries are kept as one ordered list. Each entry gets a stable UUID when it
//! is created and every edit or delete addresses it by that id, so removing a
//! row never shifts the identity of the rows after it.

use std::{
  collections::{BTreeMap, HashMap, HashSet},
  sync::Arc,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  Entitlements, Error, Result,
  options::{OptionStore, Options},
  sanitize::{machine_key, sanitize_text},
  schema::{FieldDefinition, SchemaManager},
  upload::{Upload, UploadStore},
};

/// Default cap on stored entries for free-tier installs.
pub const DEFAULT_FREE_ENTRY_LIMIT: usize = 10;

// ─── Entry ───────────────────────────────────────────────────────────────────

/// One record: field label → value. File fields hold the upload URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "EntryRepr")]
pub struct Entry {
  pub id:         Uuid,
  pub created_at: DateTime<Utc>,
  pub values:     BTreeMap<String, String>,
}

impl Entry {
  pub fn new(values: BTreeMap<String, String>) -> Self {
    Self { id: Uuid::new_v4(), created_at: Utc::now(), values }
  }

  pub fn value(&self, label: &str) -> Option<&str> {
    self.values.get(label).map(String::as_str)
  }
}

/// Accepts both the current shape and bare label → value maps, which is how
/// records were exported before entries carried ids.
#[derive(Deserialize)]
#[serde(untagged)]
enum EntryRepr {
  Full {
    id:         Uuid,
    created_at: DateTime<Utc>,
    values:     BTreeMap<String, String>,
  },
  Bare(BTreeMap<String, String>),
}

impl From<EntryRepr> for Entry {
  fn from(repr: EntryRepr) -> Self {
    match repr {
      EntryRepr::Full { id, created_at, values } => Self { id, created_at, values },
      EntryRepr::Bare(values) => Self::new(values),
    }
  }
}

// ─── Submission ──────────────────────────────────────────────────────────────

/// A posted entry form: text values and files, both keyed by the
/// [`machine_key`] of the field label.
#[derive(Debug, Clone, Default)]
pub struct Submission {
  pub values: HashMap<String, String>,
  pub files:  HashMap<String, Upload>,
}

impl Submission {
  pub fn with_value(mut self, label: &str, value: impl Into<String>) -> Self {
    self.values.insert(machine_key(label), value.into());
    self
  }

  pub fn with_file(mut self, label: &str, upload: Upload) -> Self {
    self.files.insert(machine_key(label), upload);
    self
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct EntryStore<S, U> {
  options:          Options<S>,
  schema:           SchemaManager<S>,
  uploads:          Arc<U>,
  free_entry_limit: usize,
}

impl<S, U> EntryStore<S, U>
where
  S: OptionStore,
  U: UploadStore,
{
  pub fn new(options: Options<S>, uploads: Arc<U>, free_entry_limit: usize) -> Self {
    Self {
      schema: SchemaManager::new(options.clone()),
      options,
      uploads,
      free_entry_limit,
    }
  }

  pub fn free_entry_limit(&self) -> usize { self.free_entry_limit }

  pub async fn list(&self) -> Result<Vec<Entry>> { self.options.entries().await }

  pub async fn get(&self, id: Uuid) -> Result<Option<Entry>> {
    Ok(self.list().await?.into_iter().find(|e| e.id == id))
  }

  /// Whether another entry may be added under `ent`.
  pub async fn can_add(&self, ent: Entitlements) -> Result<bool> {
    Ok(ent.premium || self.list().await?.len() < self.free_entry_limit)
  }

  /// Validate `submission` against the schema and append it.
  ///
  /// Either every field resolves and the entry is stored, or nothing is
  /// written (uploads included) and every problem is reported at once.
  pub async fn add_entry(&self, ent: Entitlements, submission: &Submission) -> Result<Entry> {
    let fields = self.schema.fields(ent).await?;
    if fields.is_empty() {
      return Err(Error::invalid(
        "No form fields defined. Please configure the form fields in the Form Builder page.",
      ));
    }

    let mut errors = Vec::new();
    let mut values = BTreeMap::new();
    let mut pending: Vec<(&FieldDefinition, &Upload)> = Vec::new();

    for field in &fields {
      let key = machine_key(&field.label);
      if field.field_type.is_file() && ent.premium {
        match submission.files.get(&key) {
          Some(upload) => pending.push((field, upload)),
          None if field.required => errors.push(required_message(field)),
          None => {
            values.insert(field.label.clone(), String::new());
          }
        }
      } else {
        let value = submission
          .values
          .get(&key)
          .map(|v| sanitize_text(v))
          .unwrap_or_default();
        if field.required && value.is_empty() {
          errors.push(required_message(field));
        } else {
          values.insert(field.label.clone(), value);
        }
      }
    }

    if !errors.is_empty() {
      return Err(Error::Validation(errors));
    }

    let mut entries = self.list().await?;
    if !ent.premium && entries.len() >= self.free_entry_limit {
      return Err(Error::EntryLimitReached { limit: self.free_entry_limit });
    }

    self.put_uploads(pending, &mut values).await?;

    let entry = Entry::new(values);
    entries.push(entry.clone());
    self.options.set_entries(&entries).await?;
    info!(entry_id = %entry.id, "entry added");
    Ok(entry)
  }

  /// Update an entry in place (premium only).
  ///
  /// Fields missing from `submission` keep their stored value. A new upload
  /// for a file field replaces the old URL and the old file is deleted once
  /// the update is saved.
  pub async fn edit_entry(
    &self,
    ent: Entitlements,
    id: Uuid,
    submission: &Submission,
  ) -> Result<Entry> {
    ent.require_premium()?;

    let fields = self.schema.fields(ent).await?;
    let mut entries = self.list().await?;
    let position = entries
      .iter()
      .position(|e| e.id == id)
      .ok_or(Error::EntryNotFound(id))?;
    let previous = &entries[position];

    let mut errors = Vec::new();
    let mut values = BTreeMap::new();
    let mut replaced_files = Vec::new();
    let mut new_files: Vec<(&FieldDefinition, &Upload)> = Vec::new();

    for field in &fields {
      let key = machine_key(&field.label);
      let old = previous.value(&field.label).unwrap_or_default().to_owned();

      if let (true, Some(upload)) = (field.field_type.is_file(), submission.files.get(&key)) {
        new_files.push((field, upload));
        if !old.is_empty() {
          replaced_files.push(old.clone());
        }
        values.insert(field.label.clone(), old);
      } else if let Some(raw) = submission.values.get(&key) {
        let value = sanitize_text(raw);
        if field.required && value.is_empty() {
          errors.push(required_message(field));
        }
        values.insert(field.label.clone(), value);
      } else {
        values.insert(field.label.clone(), old);
      }
    }

    if !errors.is_empty() {
      return Err(Error::Validation(errors));
    }

    self.put_uploads(new_files, &mut values).await?;

    let entry = Entry { id, created_at: previous.created_at, values };
    entries[position] = entry.clone();
    self.options.set_entries(&entries).await?;

    for url in &replaced_files {
      self.remove_upload(url).await;
    }
    info!(entry_id = %id, "entry updated");
    Ok(entry)
  }

  /// Remove one entry and its uploaded files.
  pub async fn delete_entry(&self, id: Uuid) -> Result<Entry> {
    let mut removed = self.remove_entries(&[id]).await?;
    removed.pop().ok_or(Error::EntryNotFound(id))
  }

  /// Remove every entry whose id is listed; unknown ids are skipped. Fails
  /// only when none of the ids matched.
  pub async fn bulk_delete(&self, ids: &[Uuid]) -> Result<usize> {
    let removed = self.remove_entries(ids).await?;
    if removed.is_empty() {
      return Err(Error::invalid("No valid entries selected for deletion."));
    }
    Ok(removed.len())
  }

  async fn remove_entries(&self, ids: &[Uuid]) -> Result<Vec<Entry>> {
    let wanted: HashSet<Uuid> = ids.iter().copied().collect();
    let (removed, kept): (Vec<Entry>, Vec<Entry>) = self
      .list()
      .await?
      .into_iter()
      .partition(|e| wanted.contains(&e.id));
    if removed.is_empty() {
      return Ok(removed);
    }

    self.options.set_entries(&kept).await?;

    let file_labels: Vec<String> = self
      .schema
      .stored_fields()
      .await?
      .into_iter()
      .filter(|f| f.field_type.is_file())
      .map(|f| f.label)
      .collect();
    for entry in &removed {
      for label in &file_labels {
        if let Some(url) = entry.value(label).filter(|u| !u.is_empty()) {
          self.remove_upload(url).await;
        }
      }
    }
    info!(count = removed.len(), "entries deleted");
    Ok(removed)
  }

  /// Store each pending upload and record its URL under the field label.
  /// All or nothing: on the first failure the files this call already stored
  /// are deleted again.
  async fn put_uploads(
    &self,
    pending: Vec<(&FieldDefinition, &Upload)>,
    values: &mut BTreeMap<String, String>,
  ) -> Result<()> {
    let mut stored_urls = Vec::with_capacity(pending.len());
    for (field, upload) in pending {
      match self.uploads.put(upload).await {
        Ok(url) => {
          stored_urls.push(url.clone());
          values.insert(field.label.clone(), url);
        }
        Err(e) => {
          for url in &stored_urls {
            self.remove_upload(url).await;
          }
          warn!(field = %field.label, error = %e, "upload failed");
          return Err(Error::invalid(format!(
            "Error uploading file for {}: {e}",
            field.label
          )));
        }
      }
    }
    Ok(())
  }

  /// Best-effort deletion; a failure only leaves an orphaned file behind.
  async fn remove_upload(&self, url: &str) {
    if let Err(e) = self.uploads.remove(url).await {
      warn!(%url, error = %e, "failed to delete stored upload");
    }
  }
}

fn required_message(field: &FieldDefinition) -> String {
  format!("{} is required.", field.label)
}

#[cfg(test)]
pub(crate) mod tests {
  use std::{
    convert::Infallible,
    sync::{Arc, Mutex},
  };

  use super::*;
  use crate::{
    OptionKey,
    memory::MemoryStore,
    schema::{FieldType, default_fields},
  };

  /// Upload store that keeps files in a map keyed by URL.
  #[derive(Default)]
  pub(crate) struct MemoryUploads {
    pub files: Mutex<BTreeMap<String, Vec<u8>>>,
  }

  impl UploadStore for MemoryUploads {
    type Error = Infallible;

    async fn put(&self, upload: &Upload) -> Result<String, Infallible> {
      let url = format!("https://example.test/uploads/{}-{}", Uuid::new_v4(), upload.file_name);
      self.files.lock().unwrap().insert(url.clone(), upload.bytes.clone());
      Ok(url)
    }

    async fn remove(&self, url: &str) -> Result<bool, Infallible> {
      Ok(self.files.lock().unwrap().remove(url).is_some())
    }
  }

  /// Accepts `budget` uploads, then refuses every further one.
  struct QuotaUploads {
    inner:  MemoryUploads,
    budget: Mutex<usize>,
  }

  impl UploadStore for QuotaUploads {
    type Error = std::io::Error;

    async fn put(&self, upload: &Upload) -> Result<String, std::io::Error> {
      {
        let mut budget = self.budget.lock().unwrap();
        if *budget == 0 {
          return Err(std::io::Error::other("disk full"));
        }
        *budget -= 1;
      }
      Ok(self.inner.put(upload).await.unwrap())
    }

    async fn remove(&self, url: &str) -> Result<bool, std::io::Error> {
      Ok(self.inner.remove(url).await.unwrap())
    }
  }

  type Fixture = (EntryStore<MemoryStore, MemoryUploads>, Options<MemoryStore>, Arc<MemoryUploads>);

  fn fixture() -> Fixture {
    let options = Options::new(Arc::new(MemoryStore::new()));
    let uploads = Arc::new(MemoryUploads::default());
    let store = EntryStore::new(options.clone(), uploads.clone(), DEFAULT_FREE_ENTRY_LIMIT);
    (store, options, uploads)
  }

  pub(crate) fn default_submission(license: &str) -> Submission {
    Submission::default()
      .with_value("Name", "Jane Doe")
      .with_value("Father Name", "John Doe")
      .with_value("City", "Lahore")
      .with_value("Country", "Pakistan")
      .with_value("License Number", license)
  }

  fn photo(name: &str) -> Upload {
    Upload {
      file_name:    name.into(),
      content_type: Some("image/png".into()),
      bytes:        vec![1, 2, 3],
    }
  }

  async fn premium_schema_with_photo(options: &Options<MemoryStore>, photo_required: bool) {
    let mut fields = default_fields();
    fields.push(FieldDefinition::new("Photo", FieldType::File, photo_required));
    options.set_form_fields(&fields).await.unwrap();
  }

  #[tokio::test]
  async fn add_entry_stores_values_by_label() {
    let (store, _, _) = fixture();
    let entry = store
      .add_entry(Entitlements::FREE, &default_submission(" 12345 "))
      .await
      .unwrap();

    assert_eq!(entry.value("License Number"), Some("12345"));
    assert_eq!(entry.value("Father Name"), Some("John Doe"));
    assert_eq!(store.list().await.unwrap(), vec![entry]);
  }

  #[tokio::test]
  async fn missing_required_fields_reject_whole_entry() {
    let (store, _, _) = fixture();
    let submission = Submission::default().with_value("Name", "Jane");

    let err = store.add_entry(Entitlements::FREE, &submission).await.unwrap_err();
    let Error::Validation(messages) = err else { panic!("expected validation error") };
    assert_eq!(messages, vec![
      "Father Name is required.",
      "City is required.",
      "Country is required.",
      "License Number is required.",
    ]);
    assert!(store.list().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn eleventh_free_entry_hits_the_cap() {
    let (store, _, _) = fixture();
    for i in 0..10 {
      store
        .add_entry(Entitlements::FREE, &default_submission(&i.to_string()))
        .await
        .unwrap();
    }

    let err = store
      .add_entry(Entitlements::FREE, &default_submission("10"))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::EntryLimitReached { limit: 10 }));
    assert!(!store.can_add(Entitlements::FREE).await.unwrap());

    store
      .add_entry(Entitlements::PREMIUM, &default_submission("10"))
      .await
      .unwrap();
    assert_eq!(store.list().await.unwrap().len(), 11);
  }

  #[tokio::test]
  async fn validation_runs_before_the_cap() {
    let (store, _, _) = fixture();
    let store = EntryStore::new(store.options.clone(), store.uploads.clone(), 0);
    let err = store
      .add_entry(Entitlements::FREE, &Submission::default())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }

  #[tokio::test]
  async fn premium_file_field_stores_url() {
    let (store, options, uploads) = fixture();
    premium_schema_with_photo(&options, true).await;

    let missing = store
      .add_entry(Entitlements::PREMIUM, &default_submission("1"))
      .await
      .unwrap_err();
    assert_eq!(missing.messages(), vec!["Photo is required."]);
    assert!(uploads.files.lock().unwrap().is_empty());

    let entry = store
      .add_entry(
        Entitlements::PREMIUM,
        &default_submission("1").with_file("Photo", photo("me.png")),
      )
      .await
      .unwrap();
    let url = entry.value("Photo").unwrap();
    assert!(uploads.files.lock().unwrap().contains_key(url));
  }

  #[tokio::test]
  async fn optional_missing_file_stores_empty_string() {
    let (store, options, _) = fixture();
    premium_schema_with_photo(&options, false).await;
    let entry = store
      .add_entry(Entitlements::PREMIUM, &default_submission("1"))
      .await
      .unwrap();
    assert_eq!(entry.value("Photo"), Some(""));
  }

  #[tokio::test]
  async fn edit_requires_premium() {
    let (store, _, _) = fixture();
    let entry = store
      .add_entry(Entitlements::FREE, &default_submission("1"))
      .await
      .unwrap();
    let err = store
      .edit_entry(Entitlements::FREE, entry.id, &Submission::default())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::RequiresPremium));
  }

  #[tokio::test]
  async fn edit_keeps_absent_fields_and_replaces_files() {
    let (store, options, uploads) = fixture();
    premium_schema_with_photo(&options, false).await;
    let entry = store
      .add_entry(
        Entitlements::PREMIUM,
        &default_submission("1").with_file("Photo", photo("old.png")),
      )
      .await
      .unwrap();
    let old_url = entry.value("Photo").unwrap().to_owned();

    let edited = store
      .edit_entry(
        Entitlements::PREMIUM,
        entry.id,
        &Submission::default()
          .with_value("City", "Karachi")
          .with_file("Photo", photo("new.png")),
      )
      .await
      .unwrap();

    assert_eq!(edited.id, entry.id);
    assert_eq!(edited.value("City"), Some("Karachi"));
    assert_eq!(edited.value("Name"), Some("Jane Doe"));
    let new_url = edited.value("Photo").unwrap();
    assert_ne!(new_url, old_url);

    let files = uploads.files.lock().unwrap();
    assert!(!files.contains_key(&old_url));
    assert!(files.contains_key(new_url));
  }

  #[tokio::test]
  async fn failed_edit_upload_removes_files_stored_before_it() {
    let options = Options::new(Arc::new(MemoryStore::new()));
    let uploads = Arc::new(QuotaUploads {
      inner:  MemoryUploads::default(),
      budget: Mutex::new(1),
    });
    let store = EntryStore::new(options.clone(), uploads.clone(), DEFAULT_FREE_ENTRY_LIMIT);
    let mut fields = default_fields();
    fields.push(FieldDefinition::new("Photo", FieldType::File, false));
    fields.push(FieldDefinition::new("Scan", FieldType::File, false));
    options.set_form_fields(&fields).await.unwrap();
    let entry = store
      .add_entry(Entitlements::PREMIUM, &default_submission("1"))
      .await
      .unwrap();

    let err = store
      .edit_entry(
        Entitlements::PREMIUM,
        entry.id,
        &Submission::default()
          .with_file("Photo", photo("front.png"))
          .with_file("Scan", photo("back.png")),
      )
      .await
      .unwrap_err();

    let Error::Validation(messages) = err else { panic!("expected validation error") };
    assert_eq!(messages, vec!["Error uploading file for Scan: disk full"]);
    assert!(uploads.inner.files.lock().unwrap().is_empty());
    assert_eq!(store.list().await.unwrap(), vec![entry]);
  }

  #[tokio::test]
  async fn edit_unknown_id_is_not_found() {
    let (store, _, _) = fixture();
    let id = Uuid::new_v4();
    let err = store
      .edit_entry(Entitlements::PREMIUM, id, &Submission::default())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::EntryNotFound(got) if got == id));
  }

  #[tokio::test]
  async fn delete_keeps_identity_of_remaining_entries() {
    let (store, _, _) = fixture();
    let mut ids = Vec::new();
    for i in 0..5 {
      let e = store
        .add_entry(Entitlements::FREE, &default_submission(&i.to_string()))
        .await
        .unwrap();
      ids.push(e.id);
    }

    store.delete_entry(ids[2]).await.unwrap();
    let remaining: Vec<Uuid> = store.list().await.unwrap().iter().map(|e| e.id).collect();
    assert_eq!(remaining, vec![ids[0], ids[1], ids[3], ids[4]]);

    // The row that followed the deleted one is still addressed by its own id.
    let removed = store.delete_entry(ids[3]).await.unwrap();
    assert_eq!(removed.value("License Number"), Some("3"));
    assert!(matches!(
      store.delete_entry(ids[2]).await,
      Err(Error::EntryNotFound(_))
    ));
  }

  #[tokio::test]
  async fn bulk_delete_removes_uploads_and_skips_unknown_ids() {
    let (store, options, uploads) = fixture();
    premium_schema_with_photo(&options, false).await;
    let a = store
      .add_entry(
        Entitlements::PREMIUM,
        &default_submission("a").with_file("Photo", photo("a.png")),
      )
      .await
      .unwrap();
    let b = store
      .add_entry(Entitlements::PREMIUM, &default_submission("b"))
      .await
      .unwrap();

    let removed = store.bulk_delete(&[a.id, Uuid::new_v4()]).await.unwrap();
    assert_eq!(removed, 1);
    assert!(uploads.files.lock().unwrap().is_empty());
    assert_eq!(store.list().await.unwrap(), vec![b]);

    assert!(store.bulk_delete(&[Uuid::new_v4()]).await.is_err());
  }

  #[test]
  fn bare_maps_deserialize_with_fresh_ids() {
    let json = r#"[{"Name":"Ali","License Number":"7"}]"#;
    let entries: Vec<Entry> = serde_json::from_str(json).unwrap();
    assert_eq!(entries[0].value("Name"), Some("Ali"));
    assert!(!entries[0].id.is_nil());
  }

  #[tokio::test]
  async fn entries_persist_under_entries_key() {
    let (store, options, _) = fixture();
    store
      .add_entry(Entitlements::FREE, &default_submission("1"))
      .await
      .unwrap();
    let raw: Option<serde_json::Value> = options.get(OptionKey::Entries).await.unwrap();
    assert!(raw.unwrap().as_array().is_some_and(|a| a.len() == 1));
  }
}
