//! City eligibility list and the check visitors pass before the lookup form.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
  Entitlements, Error, Result,
  options::{OptionKey, OptionStore, Options},
  sanitize::sanitize_text,
};

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
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Eligibility {
  Eligible,
  NotEligible,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
  pub id:          Uuid,
  pub name:        String,
  pub eligibility: Eligibility,
}

#[derive(Clone)]
pub struct CityGate<S> {
  options: Options<S>,
}

impl<S: OptionStore> CityGate<S> {
  pub fn new(options: Options<S>) -> Self { Self { options } }

  pub async fn cities(&self) -> Result<Vec<City>> { self.options.cities().await }

  /// The gate applies when the install is premium, the toggle is on, and at
  /// least one city is configured.
  pub async fn is_enabled(&self, ent: Entitlements) -> Result<bool> {
    if !ent.premium {
      return Ok(false);
    }
    let toggle: bool = self
      .options
      .get_or(OptionKey::ShowCityEligibility, false)
      .await?;
    Ok(toggle && !self.cities().await?.is_empty())
  }

  /// `true` iff a city named exactly `name` is marked eligible.
  pub async fn check_city(&self, name: &str) -> Result<bool> {
    Ok(
      self
        .cities()
        .await?
        .iter()
        .any(|c| c.name == name && c.eligibility == Eligibility::Eligible),
    )
  }

  pub async fn add_city(
    &self,
    ent: Entitlements,
    name: &str,
    eligibility: Eligibility,
  ) -> Result<City> {
    ent.require_premium()?;
    let name = sanitize_text(name);
    if name.is_empty() {
      return Err(Error::invalid("Please enter a city name."));
    }

    let city = City { id: Uuid::new_v4(), name, eligibility };
    let mut cities = self.cities().await?;
    cities.push(city.clone());
    self.options.set_cities(&cities).await?;
    info!(city = %city.name, %eligibility, "city added");
    Ok(city)
  }

  pub async fn remove_city(&self, ent: Entitlements, id: Uuid) -> Result<City> {
    ent.require_premium()?;
    let mut cities = self.cities().await?;
    let position = cities
      .iter()
      .position(|c| c.id == id)
      .ok_or(Error::CityNotFound(id))?;
    let removed = cities.remove(position);
    self.options.set_cities(&cities).await?;
    Ok(removed)
  }

  /// Remove all listed cities; unknown ids are ignored. Returns how many
  /// were removed, and rejects a selection that matches no city.
  pub async fn bulk_remove_cities(&self, ent: Entitlements, ids: &[Uuid]) -> Result<usize> {
    ent.require_premium()?;
    let wanted: HashSet<&Uuid> = ids.iter().collect();
    let mut cities = self.cities().await?;
    let before = cities.len();
    cities.retain(|c| !wanted.contains(&c.id));
    let removed = before - cities.len();
    if removed == 0 {
      return Err(Error::invalid("No valid cities selected for removal."));
    }
    self.options.set_cities(&cities).await?;
    Ok(removed)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::memory::MemoryStore;

  fn gate() -> CityGate<MemoryStore> {
    CityGate::new(Options::new(Arc::new(MemoryStore::new())))
  }

  #[tokio::test]
  async fn check_city_requires_exact_eligible_match() {
    let g = gate();
    g.add_city(Entitlements::PREMIUM, "Lahore", Eligibility::Eligible).await.unwrap();
    g.add_city(Entitlements::PREMIUM, "Quetta", Eligibility::NotEligible).await.unwrap();

    assert!(g.check_city("Lahore").await.unwrap());
    assert!(!g.check_city("lahore").await.unwrap());
    assert!(!g.check_city("Quetta").await.unwrap());
    assert!(!g.check_city("Nowhere").await.unwrap());
  }

  #[tokio::test]
  async fn city_management_is_premium_only() {
    let g = gate();
    assert!(matches!(
      g.add_city(Entitlements::FREE, "Lahore", Eligibility::Eligible).await,
      Err(Error::RequiresPremium)
    ));
    assert!(g.add_city(Entitlements::PREMIUM, "  ", Eligibility::Eligible).await.is_err());
  }

  #[tokio::test]
  async fn removal_by_id() {
    let g = gate();
    let a = g.add_city(Entitlements::PREMIUM, "A", Eligibility::Eligible).await.unwrap();
    let b = g.add_city(Entitlements::PREMIUM, "B", Eligibility::Eligible).await.unwrap();
    let c = g.add_city(Entitlements::PREMIUM, "C", Eligibility::Eligible).await.unwrap();

    g.remove_city(Entitlements::PREMIUM, a.id).await.unwrap();
    assert!(matches!(
      g.remove_city(Entitlements::PREMIUM, a.id).await,
      Err(Error::CityNotFound(_))
    ));
    assert_eq!(
      g.bulk_remove_cities(Entitlements::PREMIUM, &[c.id, Uuid::new_v4()]).await.unwrap(),
      1
    );
    assert_eq!(g.cities().await.unwrap(), vec![b]);
  }

  #[tokio::test]
  async fn bulk_removal_of_nothing_is_rejected() {
    let g = gate();
    let a = g.add_city(Entitlements::PREMIUM, "A", Eligibility::Eligible).await.unwrap();

    for ids in [vec![], vec![Uuid::new_v4()]] {
      let err = g.bulk_remove_cities(Entitlements::PREMIUM, &ids).await.unwrap_err();
      let Error::Validation(messages) = err else { panic!("expected validation error") };
      assert_eq!(messages, vec!["No valid cities selected for removal."]);
    }
    assert_eq!(g.cities().await.unwrap(), vec![a]);
  }

  #[tokio::test]
  async fn gate_needs_premium_toggle_and_cities() {
    let options = Options::new(Arc::new(MemoryStore::new()));
    let g = CityGate::new(options.clone());
    options.set(OptionKey::ShowCityEligibility, &true).await.unwrap();
    assert!(!g.is_enabled(Entitlements::PREMIUM).await.unwrap());

    g.add_city(Entitlements::PREMIUM, "A", Eligibility::Eligible).await.unwrap();
    assert!(g.is_enabled(Entitlements::PREMIUM).await.unwrap());
    assert!(!g.is_enabled(Entitlements::FREE).await.unwrap());
  }
}
