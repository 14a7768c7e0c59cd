//! An in-process [`OptionStore`] backed by hash maps.
//!
//! Nothing is persisted. Used by tests and for throwaway demo instances.

use std::{
  collections::HashMap,
  convert::Infallible,
  sync::{Arc, Mutex, MutexGuard},
  time::Duration,
};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::options::{OptionKey, OptionStore};

#[derive(Default)]
struct Inner {
  options:    HashMap<OptionKey, Value>,
  transients: HashMap<OptionKey, (Value, Option<DateTime<Utc>>)>,
}

/// Cloning is cheap; clones share the same maps.
#[derive(Clone, Default)]
pub struct MemoryStore {
  inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    // A poisoned map is still structurally sound; keep serving it.
    self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

impl OptionStore for MemoryStore {
  type Error = Infallible;

  async fn get(&self, key: OptionKey) -> Result<Option<Value>, Infallible> {
    Ok(self.lock().options.get(&key).cloned())
  }

  async fn set(&self, key: OptionKey, value: Value) -> Result<(), Infallible> {
    self.lock().options.insert(key, value);
    Ok(())
  }

  async fn delete(&self, key: OptionKey) -> Result<(), Infallible> {
    self.lock().options.remove(&key);
    Ok(())
  }

  async fn get_transient(&self, key: OptionKey) -> Result<Option<Value>, Infallible> {
    let mut inner = self.lock();
    let expired = match inner.transients.get(&key) {
      None => return Ok(None),
      Some((_, Some(expires_at))) => *expires_at <= Utc::now(),
      Some((_, None)) => false,
    };
    if expired {
      inner.transients.remove(&key);
      return Ok(None);
    }
    Ok(inner.transients.get(&key).map(|(value, _)| value.clone()))
  }

  async fn set_transient(
    &self,
    key: OptionKey,
    value: Value,
    ttl: Option<Duration>,
  ) -> Result<(), Infallible> {
    let expires_at = ttl
      .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
      .map(|ttl| Utc::now() + ttl);
    self.lock().transients.insert(key, (value, expires_at));
    Ok(())
  }

  async fn delete_transient(&self, key: OptionKey) -> Result<(), Infallible> {
    self.lock().transients.remove(&key);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[tokio::test]
  async fn set_get_delete() {
    let store = MemoryStore::new();
    assert_eq!(store.get(OptionKey::FormName).await.unwrap(), None);

    store.set(OptionKey::FormName, json!("Licenses")).await.unwrap();
    assert_eq!(
      store.get(OptionKey::FormName).await.unwrap(),
      Some(json!("Licenses"))
    );

    store.delete(OptionKey::FormName).await.unwrap();
    assert_eq!(store.get(OptionKey::FormName).await.unwrap(), None);
  }

  #[tokio::test]
  async fn zero_ttl_transient_is_already_expired() {
    let store = MemoryStore::new();
    store
      .set_transient(OptionKey::LastLicenseCheck, json!(1), Some(Duration::ZERO))
      .await
      .unwrap();
    assert_eq!(store.get_transient(OptionKey::LastLicenseCheck).await.unwrap(), None);
  }

  #[tokio::test]
  async fn transient_without_ttl_persists() {
    let store = MemoryStore::new();
    store
      .set_transient(OptionKey::LicenseAlert, json!("expired"), None)
      .await
      .unwrap();
    assert_eq!(
      store.get_transient(OptionKey::LicenseAlert).await.unwrap(),
      Some(json!("expired"))
    );
  }
}
