//! Static informational pages.

use axum::{extract::State, response::Html};
use verity_core::OptionStore;

use super::chrome;
use crate::{AppState, auth::Authenticated, error::Result, html::admin_page};

pub async fn credits<S>(
  _auth: Authenticated,
  State(state): State<AppState<S>>,
) -> Result<Html<String>>
where
  S: OptionStore + Clone + 'static,
{
  let ent = state.license.entitlements().await?;
  let chrome = chrome(&state, ent).await?;
  let body = format!(
    "<section><h2>About</h2><p><strong>Name:</strong> Verity</p>\
     <p>Verity keeps a register of licenses, permits or certificates and lets \
     anyone confirm a record by its number from a public lookup page.</p>\
     <p><strong>Version:</strong> {}</p></section>\
     <section><h2>Special Thanks</h2><ul><li>The Rust community, for the \
     libraries this is built on.</li><li>Users, for feedback and \
     encouragement.</li></ul></section>",
    env!("CARGO_PKG_VERSION"),
  );
  Ok(admin_page("Credits", "/admin/credits", &chrome, &[], &body))
}

pub async fn upgrade<S>(
  _auth: Authenticated,
  State(state): State<AppState<S>>,
) -> Result<Html<String>>
where
  S: OptionStore + Clone + 'static,
{
  let ent = state.license.entitlements().await?;
  let chrome = chrome(&state, ent).await?;
  let tier = if ent.premium { "Premium" } else { "Free" };
  let limit = state.entries.free_entry_limit();
  let body = format!(
    "<section><p><strong>Current plan:</strong> {tier}</p>\
     <p>Premium unlocks unlimited entries (the free plan stores {limit}), \
     custom form fields with file uploads, entry editing, the city \
     eligibility gate, result templates and backups.</p>\
     <p>Looking for a premium license, or renewing one? Enter the key on the \
     <a href=\"/admin/license\">License</a> page once you have it.</p></section>"
  );
  Ok(admin_page("Upgrade to Premium", "/admin/upgrade", &chrome, &[], &body))
}
