//! Integration tests for `SqliteStore` against in-memory and on-disk
//! databases.

use std::{sync::Arc, time::Duration};

use serde_json::json;
use verity_core::{
  Entitlements, OptionKey, OptionStore, Options,
  city::{CityGate, Eligibility},
  license::LicenseStatus,
  schema::SchemaManager,
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

// ─── Options ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_option_reads_none() {
  let s = store().await;
  assert!(s.get(OptionKey::LicenseKey).await.unwrap().is_none());
}

#[tokio::test]
async fn set_overwrites_previous_value() {
  let s = store().await;
  s.set(OptionKey::FormName, json!("First")).await.unwrap();
  s.set(OptionKey::FormName, json!("Second")).await.unwrap();
  assert_eq!(s.get(OptionKey::FormName).await.unwrap(), Some(json!("Second")));
}

#[tokio::test]
async fn delete_removes_option() {
  let s = store().await;
  s.set(OptionKey::LicenseExpiry, json!(1_900_000_000)).await.unwrap();
  s.delete(OptionKey::LicenseExpiry).await.unwrap();
  assert!(s.get(OptionKey::LicenseExpiry).await.unwrap().is_none());
  // Deleting twice is fine.
  s.delete(OptionKey::LicenseExpiry).await.unwrap();
}

#[tokio::test]
async fn structured_values_round_trip() {
  let s = store().await;
  let value = json!([{ "label": "Name", "type": "text", "required": true }]);
  s.set(OptionKey::FormFields, value.clone()).await.unwrap();
  assert_eq!(s.get(OptionKey::FormFields).await.unwrap(), Some(value));
}

// ─── Transients ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn transient_without_ttl_persists() {
  let s = store().await;
  s.set_transient(OptionKey::LicenseAlert, json!("renew"), None)
    .await
    .unwrap();
  assert_eq!(
    s.get_transient(OptionKey::LicenseAlert).await.unwrap(),
    Some(json!("renew"))
  );
  s.delete_transient(OptionKey::LicenseAlert).await.unwrap();
  assert!(s.get_transient(OptionKey::LicenseAlert).await.unwrap().is_none());
}

#[tokio::test]
async fn expired_transient_reads_none() {
  let s = store().await;
  s.set_transient(OptionKey::LastLicenseCheck, json!(1), Some(Duration::ZERO))
    .await
    .unwrap();
  assert!(s.get_transient(OptionKey::LastLicenseCheck).await.unwrap().is_none());
}

#[tokio::test]
async fn transients_and_options_are_separate() {
  let s = store().await;
  s.set(OptionKey::LastLicenseCheck, json!("option")).await.unwrap();
  s.set_transient(OptionKey::LastLicenseCheck, json!("transient"), Some(Duration::from_secs(60)))
    .await
    .unwrap();
  assert_eq!(
    s.get(OptionKey::LastLicenseCheck).await.unwrap(),
    Some(json!("option"))
  );
  assert_eq!(
    s.get_transient(OptionKey::LastLicenseCheck).await.unwrap(),
    Some(json!("transient"))
  );
}

// ─── Through the typed facade ────────────────────────────────────────────────

#[tokio::test]
async fn managers_work_on_sqlite() {
  let options = Options::new(Arc::new(store().await));
  SchemaManager::new(options.clone()).install_defaults().await.unwrap();
  options.set_license_status(LicenseStatus::Active).await.unwrap();

  let gate = CityGate::new(options.clone());
  gate
    .add_city(Entitlements::PREMIUM, "Lahore", Eligibility::Eligible)
    .await
    .unwrap();

  assert!(gate.check_city("Lahore").await.unwrap());
  assert_eq!(options.license_status().await.unwrap(), LicenseStatus::Active);
  assert_eq!(
    SchemaManager::new(options.clone())
      .retrieval_field(Entitlements::FREE)
      .await
      .unwrap(),
    "License Number"
  );
}

#[tokio::test]
async fn data_survives_reopen() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("verity.db");
  {
    let s = SqliteStore::open(&path).await.unwrap();
    s.set(OptionKey::SuccessMessage, json!("Verified")).await.unwrap();
  }
  let s = SqliteStore::open(&path).await.unwrap();
  assert_eq!(
    s.get(OptionKey::SuccessMessage).await.unwrap(),
    Some(json!("Verified"))
  );
}
