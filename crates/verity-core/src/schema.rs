//! Form schema: the ordered field list, the form name, and the retrieval
//! field used as the public lookup key.
//!
//! The free tier is pinned to [`default_fields`] and to
//! [`DEFAULT_RETRIEVAL_FIELD`]; only premium installs may customise either.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
  Entitlements, Error, Result,
  options::{OptionKey, OptionStore, Options},
  sanitize::sanitize_text,
};

pub const DEFAULT_FORM_NAME: &str = "License Verification";
pub const DEFAULT_RETRIEVAL_FIELD: &str = "License Number";

// ─── Field definitions ───────────────────────────────────────────────────────

/// The input type of a form field.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FieldType {
  Text,
  Number,
  Date,
  File,
  Email,
  Url,
}

impl FieldType {
  pub fn is_file(self) -> bool { matches!(self, Self::File) }

  /// The HTML `<input type=...>` used to collect this field.
  pub fn input_type(self) -> &'static str {
    match self {
      Self::Text => "text",
      Self::Number => "number",
      Self::Date => "date",
      Self::File => "file",
      Self::Email => "email",
      Self::Url => "url",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
  /// Unique within a schema; entries are keyed by it.
  pub label:      String,
  #[serde(rename = "type")]
  pub field_type: FieldType,
  pub required:   bool,
}

impl FieldDefinition {
  pub fn new(label: impl Into<String>, field_type: FieldType, required: bool) -> Self {
    Self { label: label.into(), field_type, required }
  }
}

/// The fixed field set every free-tier install uses.
pub fn default_fields() -> Vec<FieldDefinition> {
  ["Name", "Father Name", "City", "Country", DEFAULT_RETRIEVAL_FIELD]
    .into_iter()
    .map(|label| FieldDefinition::new(label, FieldType::Text, true))
    .collect()
}

/// Raw Form Builder rows as posted: parallel label, type and position
/// columns, plus the indices of the rows marked required.
#[derive(Debug, Clone, Default)]
pub struct FieldRows {
  pub labels:    Vec<String>,
  pub types:     Vec<String>,
  /// Requested display position per row; a missing or unparseable entry
  /// keeps the row where it was posted.
  pub positions: Vec<String>,
  /// Indices into the posted row order, not the sorted one.
  pub required:  Vec<usize>,
}

impl FieldRows {
  /// Build definitions ordered by position, skipping rows whose label or type
  /// is empty or whose type is unknown. Ties keep the posted order.
  pub fn into_definitions(self) -> Vec<FieldDefinition> {
    let required: HashSet<usize> = self.required.into_iter().collect();
    let mut rows: Vec<(i64, FieldDefinition)> = self
      .labels
      .iter()
      .zip(self.types.iter())
      .enumerate()
      .filter_map(|(i, (label, ty))| {
        let label = sanitize_text(label);
        let field_type = ty.trim().parse::<FieldType>().ok()?;
        if label.is_empty() {
          return None;
        }
        let position = self
          .positions
          .get(i)
          .and_then(|p| p.trim().parse::<i64>().ok())
          .unwrap_or(i as i64 + 1);
        Some((position, FieldDefinition::new(label, field_type, required.contains(&i))))
      })
      .collect();
    rows.sort_by_key(|(position, _)| *position);
    rows.into_iter().map(|(_, field)| field).collect()
  }
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// The schema as the current request sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSchema {
  pub form_name:       String,
  pub fields:          Vec<FieldDefinition>,
  pub retrieval_field: String,
}

impl FormSchema {
  pub fn field(&self, label: &str) -> Option<&FieldDefinition> {
    self.fields.iter().find(|f| f.label == label)
  }

  /// The retrieval field, if it names a non-file field of this schema.
  pub fn retrieval_definition(&self) -> Option<&FieldDefinition> {
    self
      .field(&self.retrieval_field)
      .filter(|f| !f.field_type.is_file())
  }

  /// The first file field, used as the record photo.
  pub fn photo_field(&self) -> Option<&FieldDefinition> {
    self.fields.iter().find(|f| f.field_type.is_file())
  }
}

// ─── Manager ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct SchemaManager<S> {
  options: Options<S>,
}

impl<S: OptionStore> SchemaManager<S> {
  pub fn new(options: Options<S>) -> Self { Self { options } }

  /// Activation hook: (re)write the default schema, and seed the form name
  /// and success message if they were never set.
  pub async fn install_defaults(&self) -> Result<()> {
    self.options.set_form_fields(&default_fields()).await?;
    self
      .options
      .set(OptionKey::RetrievalField, DEFAULT_RETRIEVAL_FIELD)
      .await?;
    if self.options.get::<String>(OptionKey::FormName).await?.is_none() {
      self.options.set(OptionKey::FormName, DEFAULT_FORM_NAME).await?;
    }
    if self
      .options
      .get::<String>(OptionKey::SuccessMessage)
      .await?
      .is_none()
    {
      self
        .options
        .set(OptionKey::SuccessMessage, crate::settings::DEFAULT_SUCCESS_MESSAGE)
        .await?;
    }
    Ok(())
  }

  /// First-run setup: [`Self::install_defaults`] unless a field list was
  /// ever stored. Returns whether anything was installed.
  pub async fn install_defaults_if_missing(&self) -> Result<bool> {
    if self.options.form_fields().await?.is_some() {
      return Ok(false);
    }
    self.install_defaults().await?;
    info!("default form installed");
    Ok(true)
  }

  // ── Form name ─────────────────────────────────────────────────────────

  pub async fn form_name(&self) -> Result<String> {
    self
      .options
      .get_or(OptionKey::FormName, DEFAULT_FORM_NAME.to_owned())
      .await
  }

  /// Store a new form name. Blank names are ignored and `false` returned.
  pub async fn save_form_name(&self, name: &str) -> Result<bool> {
    let name = sanitize_text(name);
    if name.is_empty() {
      return Ok(false);
    }
    self.options.set(OptionKey::FormName, &name).await?;
    Ok(true)
  }

  // ── Fields ────────────────────────────────────────────────────────────

  /// The field list in effect for `ent`.
  ///
  /// Free installs always get the defaults. Premium installs get the stored
  /// list; a missing or empty one is reset to the defaults.
  pub async fn fields(&self, ent: Entitlements) -> Result<Vec<FieldDefinition>> {
    if !ent.premium {
      return Ok(default_fields());
    }
    match self.options.form_fields().await? {
      Some(fields) if !fields.is_empty() => Ok(fields),
      _ => {
        let defaults = default_fields();
        self.options.set_form_fields(&defaults).await?;
        Ok(defaults)
      }
    }
  }

  /// The stored field list regardless of tier; used to locate uploads that
  /// belong to records written under a premium schema.
  pub async fn stored_fields(&self) -> Result<Vec<FieldDefinition>> {
    Ok(self.options.form_fields().await?.unwrap_or_else(default_fields))
  }

  /// Replace the field list (premium only).
  pub async fn save_fields(
    &self,
    ent: Entitlements,
    rows: FieldRows,
  ) -> Result<Vec<FieldDefinition>> {
    ent.require_premium()?;
    let fields = rows.into_definitions();

    let mut seen = HashSet::new();
    let duplicates: Vec<String> = fields
      .iter()
      .filter(|f| !seen.insert(f.label.as_str()))
      .map(|f| format!("Field label '{}' is used more than once.", f.label))
      .collect();
    if !duplicates.is_empty() {
      return Err(Error::Validation(duplicates));
    }
    if !fields.iter().any(|f| !f.field_type.is_file()) {
      return Err(Error::invalid(
        "At least one non-file field is required to serve as the retrieval field.",
      ));
    }

    self.options.set_form_fields(&fields).await?;
    info!(count = fields.len(), "form fields updated");
    Ok(fields)
  }

  // ── Retrieval field ───────────────────────────────────────────────────

  /// The retrieval field label.
  ///
  /// On the free tier a stored value other than the default is overwritten
  /// with the default before returning.
  pub async fn retrieval_field(&self, ent: Entitlements) -> Result<String> {
    let stored = self
      .options
      .get_or(OptionKey::RetrievalField, DEFAULT_RETRIEVAL_FIELD.to_owned())
      .await?;
    if !ent.premium && stored != DEFAULT_RETRIEVAL_FIELD {
      self
        .options
        .set(OptionKey::RetrievalField, DEFAULT_RETRIEVAL_FIELD)
        .await?;
      return Ok(DEFAULT_RETRIEVAL_FIELD.to_owned());
    }
    Ok(stored)
  }

  pub async fn save_retrieval_field(&self, ent: Entitlements, label: &str) -> Result<()> {
    let label = sanitize_text(label);
    if !ent.premium {
      if label != DEFAULT_RETRIEVAL_FIELD {
        return Err(Error::invalid(format!(
          "Free version requires Retrieval Field to be set to '{DEFAULT_RETRIEVAL_FIELD}'."
        )));
      }
    } else {
      let fields = self.fields(ent).await?;
      let usable = fields
        .iter()
        .any(|f| f.label == label && !f.field_type.is_file());
      if !usable {
        return Err(Error::invalid(format!(
          "'{label}' is not a non-file field of this form."
        )));
      }
    }
    self.options.set(OptionKey::RetrievalField, &label).await
  }

  /// Everything the current request needs to know about the form.
  pub async fn snapshot(&self, ent: Entitlements) -> Result<FormSchema> {
    Ok(FormSchema {
      form_name:       self.form_name().await?,
      fields:          self.fields(ent).await?,
      retrieval_field: self.retrieval_field(ent).await?,
    })
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::memory::MemoryStore;

  fn manager() -> (SchemaManager<MemoryStore>, Options<MemoryStore>) {
    let options = Options::new(Arc::new(MemoryStore::new()));
    (SchemaManager::new(options.clone()), options)
  }

  fn rows(items: &[(&str, &str)], required: &[usize]) -> FieldRows {
    FieldRows {
      labels:    items.iter().map(|(l, _)| l.to_string()).collect(),
      types:     items.iter().map(|(_, t)| t.to_string()).collect(),
      positions: Vec::new(),
      required:  required.to_vec(),
    }
  }

  #[test]
  fn rows_skip_blank_and_unknown() {
    let defs = rows(
      &[("Name", "text"), ("", "text"), ("Photo", ""), ("Age", "bogus"), ("Photo", "file")],
      &[0, 4],
    )
    .into_definitions();
    assert_eq!(defs, vec![
      FieldDefinition::new("Name", FieldType::Text, true),
      FieldDefinition::new("Photo", FieldType::File, true),
    ]);
  }

  #[test]
  fn rows_sort_by_position_and_keep_required_by_posted_index() {
    let mut posted = rows(&[("Name", "text"), ("License Number", "text"), ("City", "text")], &[0]);
    posted.positions = vec!["3".into(), "1".into(), "junk".into()];
    let labels: Vec<_> = posted.into_definitions().into_iter().map(|f| (f.label, f.required)).collect();
    // "junk" falls back to the posted slot (3rd), tying with Name and staying after it.
    assert_eq!(labels, vec![
      ("License Number".to_owned(), false),
      ("Name".to_owned(), true),
      ("City".to_owned(), false),
    ]);
  }

  #[tokio::test]
  async fn free_tier_always_sees_defaults() {
    let (m, options) = manager();
    options
      .set_form_fields(&[FieldDefinition::new("Custom", FieldType::Text, true)])
      .await
      .unwrap();
    assert_eq!(m.fields(Entitlements::FREE).await.unwrap(), default_fields());
    assert_eq!(m.fields(Entitlements::PREMIUM).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn premium_empty_schema_resets_to_defaults() {
    let (m, options) = manager();
    options.set_form_fields(&[]).await.unwrap();
    assert_eq!(m.fields(Entitlements::PREMIUM).await.unwrap(), default_fields());
    assert_eq!(options.form_fields().await.unwrap(), Some(default_fields()));
  }

  #[tokio::test]
  async fn save_fields_requires_premium() {
    let (m, _) = manager();
    let err = m
      .save_fields(Entitlements::FREE, rows(&[("Name", "text")], &[]))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::RequiresPremium));
  }

  #[tokio::test]
  async fn save_fields_rejects_duplicates_and_file_only() {
    let (m, _) = manager();
    let dup = m
      .save_fields(Entitlements::PREMIUM, rows(&[("A", "text"), ("A", "number")], &[]))
      .await
      .unwrap_err();
    assert!(matches!(dup, Error::Validation(_)));

    let files = m
      .save_fields(Entitlements::PREMIUM, rows(&[("Photo", "file")], &[]))
      .await
      .unwrap_err();
    assert!(matches!(files, Error::Validation(_)));
  }

  #[tokio::test]
  async fn free_tier_cannot_move_retrieval_field() {
    let (m, _) = manager();
    let err = m
      .save_retrieval_field(Entitlements::FREE, "Name")
      .await
      .unwrap_err();
    assert!(err.to_string().contains("License Number"));
    assert_eq!(
      m.retrieval_field(Entitlements::FREE).await.unwrap(),
      DEFAULT_RETRIEVAL_FIELD
    );
  }

  #[tokio::test]
  async fn free_tier_read_heals_stored_retrieval_field() {
    let (m, options) = manager();
    options.set(OptionKey::RetrievalField, "Name").await.unwrap();

    assert_eq!(m.retrieval_field(Entitlements::PREMIUM).await.unwrap(), "Name");
    assert_eq!(
      m.retrieval_field(Entitlements::FREE).await.unwrap(),
      DEFAULT_RETRIEVAL_FIELD
    );
    let stored: Option<String> = options.get(OptionKey::RetrievalField).await.unwrap();
    assert_eq!(stored.as_deref(), Some(DEFAULT_RETRIEVAL_FIELD));
  }

  #[tokio::test]
  async fn premium_retrieval_field_must_be_non_file() {
    let (m, _) = manager();
    m.save_fields(
      Entitlements::PREMIUM,
      rows(&[("Serial", "text"), ("Photo", "file")], &[0]),
    )
    .await
    .unwrap();

    assert!(m.save_retrieval_field(Entitlements::PREMIUM, "Photo").await.is_err());
    assert!(m.save_retrieval_field(Entitlements::PREMIUM, "Missing").await.is_err());
    m.save_retrieval_field(Entitlements::PREMIUM, "Serial").await.unwrap();
    assert_eq!(m.retrieval_field(Entitlements::PREMIUM).await.unwrap(), "Serial");
  }

  #[tokio::test]
  async fn blank_form_name_is_ignored() {
    let (m, _) = manager();
    assert!(!m.save_form_name("   ").await.unwrap());
    assert_eq!(m.form_name().await.unwrap(), DEFAULT_FORM_NAME);
    assert!(m.save_form_name("Driver Registry").await.unwrap());
    assert_eq!(m.form_name().await.unwrap(), "Driver Registry");
  }

  #[tokio::test]
  async fn first_run_install_leaves_existing_schema_alone() {
    let (m, options) = manager();
    assert!(m.install_defaults_if_missing().await.unwrap());
    assert_eq!(m.form_name().await.unwrap(), DEFAULT_FORM_NAME);

    let custom = vec![FieldDefinition::new("Serial", FieldType::Text, true)];
    options.set_form_fields(&custom).await.unwrap();
    assert!(!m.install_defaults_if_missing().await.unwrap());
    assert_eq!(options.form_fields().await.unwrap(), Some(custom));
  }

  #[tokio::test]
  async fn install_defaults_keeps_existing_form_name() {
    let (m, options) = manager();
    m.save_form_name("Mine").await.unwrap();
    options
      .set_form_fields(&[FieldDefinition::new("X", FieldType::Text, true)])
      .await
      .unwrap();

    m.install_defaults().await.unwrap();
    assert_eq!(m.form_name().await.unwrap(), "Mine");
    assert_eq!(options.form_fields().await.unwrap(), Some(default_fields()));
  }
}
