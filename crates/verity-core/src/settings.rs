//! General settings for the public verification widget.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
  Entitlements, Result,
  options::{OptionKey, OptionStore, Options},
  sanitize::sanitize_text,
};

pub const DEFAULT_SUCCESS_MESSAGE: &str = "License verified successfully!";

/// Layout used to show a matched record.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Template {
  /// Single-column card, optional round photo on top.
  #[default]
  Template1,
  /// Two columns: fields left, photo or placeholder right.
  Template2,
}

impl Template {
  pub fn title(self) -> &'static str {
    match self {
      Self::Template1 => "Template 1: Stacked card",
      Self::Template2 => "Template 2: Two columns",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
  pub verification_system_active: bool,
  pub show_city_eligibility:      bool,
  pub success_message:            String,
  pub selected_template:          Template,
}

#[derive(Clone)]
pub struct SettingsManager<S> {
  options: Options<S>,
}

impl<S: OptionStore> SettingsManager<S> {
  pub fn new(options: Options<S>) -> Self { Self { options } }

  pub async fn load(&self) -> Result<Settings> {
    Ok(Settings {
      verification_system_active: self
        .options
        .get_or(OptionKey::VerificationSystemActive, true)
        .await?,
      show_city_eligibility:      self
        .options
        .get_or(OptionKey::ShowCityEligibility, false)
        .await?,
      success_message:            self
        .options
        .get_or(OptionKey::SuccessMessage, DEFAULT_SUCCESS_MESSAGE.to_owned())
        .await?,
      selected_template:          self
        .options
        .get_or(OptionKey::SelectedTemplate, Template::default())
        .await?,
    })
  }

  /// Save the general settings form. The verification toggle and message are
  /// open to every tier (a blank message keeps the old one); the city gate
  /// toggle is only written for premium installs.
  pub async fn save_general_settings(
    &self,
    ent: Entitlements,
    verification_system_active: bool,
    success_message: &str,
    show_city_eligibility: bool,
  ) -> Result<()> {
    self
      .options
      .set(OptionKey::VerificationSystemActive, &verification_system_active)
      .await?;

    let message = sanitize_text(success_message);
    if !message.is_empty() {
      self.options.set(OptionKey::SuccessMessage, &message).await?;
    }

    if ent.premium {
      self
        .options
        .set(OptionKey::ShowCityEligibility, &show_city_eligibility)
        .await?;
    }
    info!(verification_system_active, "general settings updated");
    Ok(())
  }

  pub async fn save_template(&self, ent: Entitlements, template: Template) -> Result<()> {
    ent.require_premium()?;
    self.options.set(OptionKey::SelectedTemplate, &template).await
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::{Error, memory::MemoryStore};

  fn manager() -> SettingsManager<MemoryStore> {
    SettingsManager::new(Options::new(Arc::new(MemoryStore::new())))
  }

  #[tokio::test]
  async fn defaults() {
    let settings = manager().load().await.unwrap();
    assert!(settings.verification_system_active);
    assert!(!settings.show_city_eligibility);
    assert_eq!(settings.success_message, DEFAULT_SUCCESS_MESSAGE);
    assert_eq!(settings.selected_template, Template::Template1);
  }

  #[tokio::test]
  async fn free_tier_cannot_enable_city_gate() {
    let m = manager();
    m.save_general_settings(Entitlements::FREE, false, "Found it", true).await.unwrap();
    let s = m.load().await.unwrap();
    assert!(!s.verification_system_active);
    assert_eq!(s.success_message, "Found it");
    assert!(!s.show_city_eligibility);

    m.save_general_settings(Entitlements::PREMIUM, true, "  ", true).await.unwrap();
    let s = m.load().await.unwrap();
    assert!(s.show_city_eligibility);
    assert_eq!(s.success_message, "Found it");
  }

  #[tokio::test]
  async fn template_is_premium_only() {
    let m = manager();
    assert!(matches!(
      m.save_template(Entitlements::FREE, Template::Template2).await,
      Err(Error::RequiresPremium)
    ));
    m.save_template(Entitlements::PREMIUM, Template::Template2).await.unwrap();
    assert_eq!(m.load().await.unwrap().selected_template, Template::Template2);
  }

  #[test]
  fn template_names_round_trip_through_forms() {
    assert_eq!("template2".parse::<Template>().unwrap(), Template::Template2);
    assert_eq!(Template::Template1.to_string(), "template1");
  }
}
