//! Page handlers. Admin pages follow one shape: run the posted action (if
//! any), collect notices, then render the page from fresh state.

pub mod credits;
pub mod entries;
pub mod form_builder;
pub mod license;
pub mod settings;
pub mod verify;

use serde::Deserialize;
use uuid::Uuid;
use verity_core::{Entitlements, OptionStore};

use crate::{
  AppState,
  error::{Error, Result},
  html::{Chrome, Notice},
};

/// `?action=…&<id>=…` links used for single-row operations.
#[derive(Debug, Default, Deserialize)]
pub struct ActionQuery {
  pub action:    Option<String>,
  pub entry_id:  Option<String>,
  pub city_id:   Option<String>,
  pub backup_id: Option<String>,
}

impl ActionQuery {
  pub fn is(&self, action: &str) -> bool { self.action.as_deref() == Some(action) }
}

/// Parse an id taken from a query string or hidden input.
pub(crate) fn parse_id(raw: Option<&str>) -> Option<Uuid> {
  raw.and_then(|s| Uuid::parse_str(s.trim()).ok())
}

/// Build the chrome shared by admin pages for a request running under `ent`.
pub(crate) async fn chrome<S: OptionStore>(
  state: &AppState<S>,
  ent: Entitlements,
) -> Result<Chrome> {
  let alert = state.options.license_alert().await?;
  let banners = if state.config.ad_banners && !ent.premium {
    state.license.fetch_ad_banners().await
  } else {
    Vec::new()
  };
  Ok(Chrome { premium: ent.premium, alert, banners })
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// An error an admin action can fail with.
pub(crate) trait Rejection: Into<Error> {
  fn is_user_facing(&self) -> bool;
  fn messages(&self) -> Vec<String>;
}

impl Rejection for verity_core::Error {
  fn is_user_facing(&self) -> bool { verity_core::Error::is_user_facing(self) }

  fn messages(&self) -> Vec<String> { verity_core::Error::messages(self) }
}

impl Rejection for verity_license::Error {
  fn is_user_facing(&self) -> bool { verity_license::Error::is_user_facing(self) }

  fn messages(&self) -> Vec<String> {
    match self {
      verity_license::Error::Core(e) => e.messages(),
      other => vec![other.to_string()],
    }
  }
}

/// Record the outcome of an admin action as notices.
///
/// User-facing rejections become error notices; infrastructure failures
/// abort the request.
pub(crate) fn notify<T, E: Rejection>(
  notices: &mut Vec<Notice>,
  result: std::result::Result<T, E>,
  success: impl FnOnce(T) -> String,
) -> Result<()> {
  match result {
    Ok(value) => {
      notices.push(Notice::Success(success(value)));
      Ok(())
    }
    Err(e) => reject(notices, e),
  }
}

/// Record a failed admin action as error notices, or abort the request when
/// the failure is not the user's to fix.
pub(crate) fn reject<E: Rejection>(notices: &mut Vec<Notice>, error: E) -> Result<()> {
  if !error.is_user_facing() {
    return Err(error.into());
  }
  notices.extend(error.messages().into_iter().map(Notice::Error));
  Ok(())
}

/// `<input>` attributes shared by the checkbox columns of admin tables.
pub(crate) fn checkbox(name: &str, id: Uuid) -> String {
  format!(r#"<input type="checkbox" name="{name}[]" value="{id}">"#)
}

pub(crate) const PREMIUM_NOTE: &str = r#"<p class="premium">Requires Premium Version</p>"#;
