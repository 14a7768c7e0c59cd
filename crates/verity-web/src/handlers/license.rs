//! `/admin/license`: activation, deactivation and status.

use std::fmt::Write as _;

use axum::{extract::State, response::Html};
use chrono::Utc;
use verity_core::{Entitlements, OptionStore};

use super::{chrome, notify};
use crate::{
  AppState,
  auth::Authenticated,
  error::Result,
  form::PostForm,
  html::{Notice, admin_page, escape},
};

/// Page load always revalidates against the license server.
pub async fn page<S>(
  _auth: Authenticated,
  State(state): State<AppState<S>>,
) -> Result<Html<String>>
where
  S: OptionStore + Clone + 'static,
{
  let premium = state.license.is_activated(true).await?;
  render(&state, Entitlements { premium }, &[]).await
}

pub async fn submit<S>(
  _auth: Authenticated,
  State(state): State<AppState<S>>,
  form: PostForm,
) -> Result<Html<String>>
where
  S: OptionStore + Clone + 'static,
{
  let mut notices = Vec::new();

  if form.has("lv_activate_license") {
    notify(
      &mut notices,
      state.license.activate(form.text("license_key")).await,
      |license| format!("License activated successfully! Expires on: {}", license.expiry_string),
    )?;
  } else if form.has("lv_deactivate_license") && state.license.deactivate().await? {
    notices.push(Notice::Success("License deactivated successfully.".to_owned()));
  }

  let ent = state.license.entitlements().await?;
  render(&state, ent, &notices).await
}

async fn render<S>(
  state: &AppState<S>,
  ent: Entitlements,
  notices: &[Notice],
) -> Result<Html<String>>
where
  S: OptionStore + Clone + 'static,
{
  let license = state.options.license_state().await?;
  let form_key = state.options.display_license_key().await?;
  let chrome = chrome(state, ent).await?;

  let (action, label) = if ent.premium {
    ("lv_deactivate_license", "Deactivate License")
  } else {
    ("lv_activate_license", "Activate License")
  };
  let mut body = format!(
    r#"<section><h2>Input License Key</h2><form method="post" action="/admin/license"><input type="text" name="license_key" value="{}" placeholder="Enter your license key" required> <input type="submit" name="{action}" value="{label}"></form></section>"#,
    escape(&form_key)
  );

  body.push_str("<section><h2>License Status</h2>");
  let status = if ent.premium { "Active" } else { "Inactive" };
  let _ = write!(body, "<p><strong>Status:</strong> {status}</p>");
  if !license.key.is_empty() {
    let _ = write!(body, "<p><strong>License Key:</strong> {}</p>", escape(&license.key));
  }
  if ent.premium && !license.expiry_string.is_empty() {
    let _ = write!(
      body,
      r#"<p><strong>Expires On:</strong> {}</p><p><strong>Time Remaining:</strong> <span id="countdown"></span></p>
<script>(function(){{var end={}*1000;function tick(){{var d=end-Date.now(),el=document.getElementById('countdown');
if(d<0){{el.textContent='Expired';return;}}var s=Math.floor(d/1000);
el.textContent=Math.floor(s/86400)+'d '+Math.floor(s%86400/3600)+'h '+Math.floor(s%3600/60)+'m '+s%60+'s';}}
tick();setInterval(tick,1000);}})();</script>"#,
      escape(&license.expiry_string),
      license.expiry,
    );
  }
  if !ent.premium && license.expiry > 0 && Utc::now().timestamp() >= license.expiry {
    let _ = write!(
      body,
      r#"<p class="inline-error">Your license has expired on {}. Please renew it to regain premium features.</p>"#,
      escape(&license.expiry_string)
    );
  }
  body.push_str(
    r#"</section><section><p>Looking for a premium license, or renew your license? <a href="/admin/upgrade">Click here</a></p></section>"#,
  );

  Ok(admin_page("License Management", "/admin/license", &chrome, notices, &body))
}
