//! The `OptionStore` trait and the typed [`Options`] facade over it.
//!
//! Every piece of persistent state lives under one of the fixed
//! [`OptionKey`]s as a JSON value. Backends (e.g. `verity-store-sqlite`)
//! implement the untyped trait; components only ever talk to [`Options`],
//! which owns the key → type mapping.

use std::{future::Future, sync::Arc, time::Duration};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
  Error, Result,
  backup::Backup,
  city::City,
  entry::Entry,
  license::{LicenseState, LicenseStatus},
  schema::FieldDefinition,
};

// ─── Keys ────────────────────────────────────────────────────────────────────

/// The complete set of keys the system persists.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, strum::IntoStaticStr, strum::Display,
)]
#[strum(serialize_all = "snake_case")]
pub enum OptionKey {
  // ── License ────────────────────────────────────────────────────────────
  LicenseKey,
  /// The last key a deactivation removed, shown in the form only.
  PreviousLicenseKey,
  LicenseStatus,
  LicenseExpiry,
  LicenseExpiryString,
  RegisteredSiteUrl,
  LastUsageReport,
  /// Transient, 24h TTL.
  LastLicenseCheck,
  /// Transient without expiry; cleared once the condition is resolved.
  LicenseAlert,

  // ── Form ───────────────────────────────────────────────────────────────
  FormName,
  FormFields,
  RetrievalField,

  // ── Records ────────────────────────────────────────────────────────────
  Entries,
  Cities,
  Backups,

  // ── Settings ───────────────────────────────────────────────────────────
  VerificationSystemActive,
  ShowCityEligibility,
  SuccessMessage,
  SelectedTemplate,
}

impl OptionKey {
  pub fn as_str(self) -> &'static str { self.into() }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a key-value option store with expiring transients.
///
/// All methods return `Send` futures so the trait can be used from axum
/// handlers on a multi-threaded runtime.
pub trait OptionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Read a persistent option. `None` if it was never set or was deleted.
  fn get(
    &self,
    key: OptionKey,
  ) -> impl Future<Output = Result<Option<Value>, Self::Error>> + Send + '_;

  /// Create or overwrite a persistent option.
  fn set(
    &self,
    key: OptionKey,
    value: Value,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn delete(
    &self,
    key: OptionKey,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Read a transient. Expired transients read as `None`.
  fn get_transient(
    &self,
    key: OptionKey,
  ) -> impl Future<Output = Result<Option<Value>, Self::Error>> + Send + '_;

  /// Store a transient. `ttl = None` means it never expires on its own.
  fn set_transient(
    &self,
    key: OptionKey,
    value: Value,
    ttl: Option<Duration>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn delete_transient(
    &self,
    key: OptionKey,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Typed facade ────────────────────────────────────────────────────────────

/// Typed accessors over an [`OptionStore`].
///
/// Cloning is cheap; the store is reference-counted.
pub struct Options<S> {
  store: Arc<S>,
}

// Written by hand so cloning does not require `S: Clone`.
impl<S> Clone for Options<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: OptionStore> Options<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub fn store(&self) -> &S { &self.store }

  // ── Untyped plumbing ──────────────────────────────────────────────────

  pub async fn get<T: DeserializeOwned>(&self, key: OptionKey) -> Result<Option<T>> {
    let raw = self.store.get(key).await.map_err(store_err)?;
    decode(raw)
  }

  pub async fn get_or<T: DeserializeOwned>(&self, key: OptionKey, default: T) -> Result<T> {
    Ok(self.get(key).await?.unwrap_or(default))
  }

  pub async fn set<T: Serialize + Sync + ?Sized>(&self, key: OptionKey, value: &T) -> Result<()> {
    let json = serde_json::to_value(value)?;
    self.store.set(key, json).await.map_err(store_err)
  }

  pub async fn delete(&self, key: OptionKey) -> Result<()> {
    self.store.delete(key).await.map_err(store_err)
  }

  pub async fn transient<T: DeserializeOwned>(&self, key: OptionKey) -> Result<Option<T>> {
    let raw = self.store.get_transient(key).await.map_err(store_err)?;
    decode(raw)
  }

  pub async fn set_transient<T: Serialize + Sync + ?Sized>(
    &self,
    key: OptionKey,
    value: &T,
    ttl: Option<Duration>,
  ) -> Result<()> {
    let json = serde_json::to_value(value)?;
    self.store.set_transient(key, json, ttl).await.map_err(store_err)
  }

  pub async fn delete_transient(&self, key: OptionKey) -> Result<()> {
    self.store.delete_transient(key).await.map_err(store_err)
  }

  // ── License ───────────────────────────────────────────────────────────

  /// Assemble the stored license fields into one value.
  pub async fn license_state(&self) -> Result<LicenseState> {
    Ok(LicenseState {
      key:                 self.get_or(OptionKey::LicenseKey, String::new()).await?,
      status:              self.license_status().await?,
      expiry:              self.license_expiry().await?,
      expiry_string:       self.get_or(OptionKey::LicenseExpiryString, String::new()).await?,
      registered_site_url: self.get_or(OptionKey::RegisteredSiteUrl, String::new()).await?,
      last_check:          self.transient(OptionKey::LastLicenseCheck).await?,
      last_usage_report:   self.get_or(OptionKey::LastUsageReport, 0).await?,
    })
  }

  /// The key to prefill the activation form with: the live key, or the one
  /// the last deactivation removed.
  pub async fn display_license_key(&self) -> Result<String> {
    let key: String = self.get_or(OptionKey::LicenseKey, String::new()).await?;
    if !key.is_empty() {
      return Ok(key);
    }
    self.get_or(OptionKey::PreviousLicenseKey, String::new()).await
  }

  pub async fn license_status(&self) -> Result<LicenseStatus> {
    self.get_or(OptionKey::LicenseStatus, LicenseStatus::Inactive).await
  }

  pub async fn set_license_status(&self, status: LicenseStatus) -> Result<()> {
    self.set(OptionKey::LicenseStatus, &status).await
  }

  /// Expiry as unix seconds; `0` when unset.
  pub async fn license_expiry(&self) -> Result<i64> {
    self.get_or(OptionKey::LicenseExpiry, 0).await
  }

  /// Reset expiry and its display string.
  pub async fn clear_license_expiry(&self) -> Result<()> {
    self.set(OptionKey::LicenseExpiry, &0_i64).await?;
    self.set(OptionKey::LicenseExpiryString, "").await
  }

  pub async fn license_alert(&self) -> Result<Option<String>> {
    self.transient(OptionKey::LicenseAlert).await
  }

  pub async fn set_license_alert(&self, message: &str) -> Result<()> {
    self.set_transient(OptionKey::LicenseAlert, message, None).await
  }

  pub async fn clear_license_alert(&self) -> Result<()> {
    self.delete_transient(OptionKey::LicenseAlert).await
  }

  // ── Records ───────────────────────────────────────────────────────────

  /// The stored field list, if any was ever saved.
  pub async fn form_fields(&self) -> Result<Option<Vec<FieldDefinition>>> {
    self.get(OptionKey::FormFields).await
  }

  pub async fn set_form_fields(&self, fields: &[FieldDefinition]) -> Result<()> {
    self.set(OptionKey::FormFields, fields).await
  }

  pub async fn entries(&self) -> Result<Vec<Entry>> {
    self.get_or(OptionKey::Entries, Vec::new()).await
  }

  pub async fn set_entries(&self, entries: &[Entry]) -> Result<()> {
    self.set(OptionKey::Entries, entries).await
  }

  pub async fn cities(&self) -> Result<Vec<City>> {
    self.get_or(OptionKey::Cities, Vec::new()).await
  }

  pub async fn set_cities(&self, cities: &[City]) -> Result<()> {
    self.set(OptionKey::Cities, cities).await
  }

  pub async fn backups(&self) -> Result<Vec<Backup>> {
    self.get_or(OptionKey::Backups, Vec::new()).await
  }

  pub async fn set_backups(&self, backups: &[Backup]) -> Result<()> {
    self.set(OptionKey::Backups, backups).await
  }
}

fn decode<T: DeserializeOwned>(raw: Option<Value>) -> Result<Option<T>> {
  raw.map(serde_json::from_value).transpose().map_err(Error::from)
}

fn store_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> Error {
  Error::Store(Box::new(e))
}
