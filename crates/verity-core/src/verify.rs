//! The public lookup widget.
//!
//! [`Verifier::render`] decides what a visitor sees: an "unavailable"
//! message, the city selector, or the lookup form with an optional result.
//! The caller turns the returned [`Page`] into HTML and persists
//! [`VerifyOutcome::remember_city`] in whatever session mechanism it has.

use crate::{
  Entitlements, Result,
  city::{City, CityGate},
  options::{OptionStore, Options},
  sanitize::sanitize_text,
  schema::SchemaManager,
  settings::{SettingsManager, Template},
};

pub const DISABLED_MESSAGE: &str = "Verification system is currently disabled.";
pub const NO_FIELDS_MESSAGE: &str =
  "Form fields are not configured. Please contact the site administrator.";
pub const BAD_RETRIEVAL_MESSAGE: &str =
  "Retrieval field is not properly configured. Please contact the site administrator.";

/// What the request already knows about the visitor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitorContext {
  /// A city that passed the eligibility check earlier in this session.
  pub eligible_city: Option<String>,
}

/// What the visitor submitted with this request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitorAction {
  View,
  CheckCity(String),
  Verify(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
  Unavailable(&'static str),
  CityGate {
    form_name: String,
    cities:    Vec<City>,
    /// The city that was just rejected, if any.
    rejected:  Option<String>,
  },
  LookupForm {
    form_name:       String,
    retrieval_field: String,
    result:          Option<LookupResult>,
  },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOutcome {
  pub page:          Page,
  /// Set when the visitor just passed the city check.
  pub remember_city: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
  Found(MatchCard),
  NotFound { field: String, value: String },
}

impl LookupResult {
  pub fn not_found_message(field: &str, value: &str) -> String {
    format!("No matching record found for {field}: {value}.")
  }
}

/// A matched record, ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCard {
  pub template:        Template,
  /// `(label, value)` for every non-file field present on the record; empty
  /// values are shown as `-`.
  pub rows:            Vec<(String, String)>,
  pub photo_url:       Option<String>,
  pub success_message: String,
}

pub fn rejected_city_message(city: &str) -> String {
  format!("Sorry, your city ('{city}') is not eligible for verification at this time.")
}

#[derive(Clone)]
pub struct Verifier<S> {
  options:  Options<S>,
  schema:   SchemaManager<S>,
  cities:   CityGate<S>,
  settings: SettingsManager<S>,
}

impl<S: OptionStore> Verifier<S> {
  pub fn new(options: Options<S>) -> Self {
    Self {
      schema: SchemaManager::new(options.clone()),
      cities: CityGate::new(options.clone()),
      settings: SettingsManager::new(options.clone()),
      options,
    }
  }

  pub async fn render(
    &self,
    ent: Entitlements,
    ctx: &VisitorContext,
    action: VisitorAction,
  ) -> Result<VerifyOutcome> {
    let unavailable =
      |msg: &'static str| VerifyOutcome { page: Page::Unavailable(msg), remember_city: None };

    let settings = self.settings.load().await?;
    if !settings.verification_system_active {
      return Ok(unavailable(DISABLED_MESSAGE));
    }
    let schema = self.schema.snapshot(ent).await?;
    if schema.fields.is_empty() {
      return Ok(unavailable(NO_FIELDS_MESSAGE));
    }
    if schema.retrieval_definition().is_none() {
      return Ok(unavailable(BAD_RETRIEVAL_MESSAGE));
    }

    let mut remember_city = None;
    if ctx.eligible_city.is_none() && self.cities.is_enabled(ent).await? {
      let rejected = match &action {
        VisitorAction::CheckCity(name) => {
          let name = sanitize_text(name);
          if self.cities.check_city(&name).await? {
            remember_city = Some(name);
            None
          } else {
            Some(name)
          }
        }
        _ => None,
      };
      if remember_city.is_none() {
        return Ok(VerifyOutcome {
          page: Page::CityGate {
            form_name: schema.form_name,
            cities: self.cities.cities().await?,
            rejected,
          },
          remember_city: None,
        });
      }
    }

    let result = match action {
      VisitorAction::Verify(value) => Some(self.verify(ent, &value).await?),
      _ => None,
    };
    Ok(VerifyOutcome {
      page: Page::LookupForm {
        form_name: schema.form_name,
        retrieval_field: schema.retrieval_field,
        result,
      },
      remember_city,
    })
  }

  /// Look up the first entry whose retrieval value equals `value` exactly
  /// (after sanitizing).
  pub async fn verify(&self, ent: Entitlements, value: &str) -> Result<LookupResult> {
    let schema = self.schema.snapshot(ent).await?;
    let value = sanitize_text(value);
    let entries = self.options.entries().await?;

    let Some(entry) = entries
      .iter()
      .find(|e| e.value(&schema.retrieval_field) == Some(value.as_str()))
    else {
      return Ok(LookupResult::NotFound { field: schema.retrieval_field, value });
    };

    let settings = self.settings.load().await?;
    let rows = schema
      .fields
      .iter()
      .filter(|f| !f.field_type.is_file())
      .filter_map(|f| {
        let v = entry.value(&f.label)?;
        let shown = if v.is_empty() { "-" } else { v };
        Some((f.label.clone(), shown.to_owned()))
      })
      .collect();
    let photo_url = schema
      .photo_field()
      .and_then(|f| entry.value(&f.label))
      .filter(|url| !url.is_empty())
      .map(str::to_owned);

    Ok(LookupResult::Found(MatchCard {
      template: settings.selected_template,
      rows,
      photo_url,
      success_message: settings.success_message,
    }))
  }
}
