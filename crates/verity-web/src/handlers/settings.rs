//! `/admin/settings`: general settings, city list, result template and
//! backups.

use std::fmt::Write as _;

use axum::{
  extract::{Query, State},
  http::header,
  response::{Html, IntoResponse, Response},
};
use strum::IntoEnumIterator;
use verity_core::{
  Entitlements, OptionStore,
  backup::BackupDownload,
  city::Eligibility,
  settings::Template,
};

use super::{ActionQuery, PREMIUM_NOTE, checkbox, chrome, notify, parse_id, reject};
use crate::{
  AppState,
  auth::Authenticated,
  error::Result,
  form::PostForm,
  html::{Notice, admin_page, escape},
};

pub async fn page<S>(
  _auth: Authenticated,
  State(state): State<AppState<S>>,
  Query(query): Query<ActionQuery>,
) -> Result<Response>
where
  S: OptionStore + Clone + 'static,
{
  let ent = state.license.entitlements().await?;
  let mut notices = Vec::new();

  if query.is("download_backup") {
    let id = parse_id(query.backup_id.as_deref()).unwrap_or_default();
    match state.backups.download_backup(id).await {
      Ok(download) => return Ok(attachment(download)),
      Err(e) => reject(&mut notices, e)?,
    }
  } else if query.is("remove_city") {
    let id = parse_id(query.city_id.as_deref()).unwrap_or_default();
    notify(&mut notices, state.cities.remove_city(ent, id).await, |_| {
      "City removed successfully.".to_owned()
    })?;
  }

  Ok(render(&state, ent, &notices).await?.into_response())
}

pub async fn submit<S>(
  _auth: Authenticated,
  State(state): State<AppState<S>>,
  form: PostForm,
) -> Result<Response>
where
  S: OptionStore + Clone + 'static,
{
  let ent = state.license.entitlements().await?;
  let mut notices = Vec::new();

  if form.has("lv_general_settings") {
    let result = state
      .settings
      .save_general_settings(
        ent,
        form.text("verification_system") == "yes",
        form.text("success_message"),
        form.has("show_city_eligibility"),
      )
      .await;
    notify(&mut notices, result, |_| {
      "General settings updated successfully.".to_owned()
    })?;
  } else if form.has("lv_add_city") {
    let eligibility = form
      .text("city_eligibility")
      .parse()
      .unwrap_or(Eligibility::Eligible);
    let result = state
      .cities
      .add_city(ent, form.text("city_name"), eligibility)
      .await;
    notify(&mut notices, result, |_| "City added successfully.".to_owned())?;
  } else if form.has("lv_bulk_remove_cities") {
    let ids = form.ids("city_ids");
    notify(&mut notices, state.cities.bulk_remove_cities(ent, &ids).await, |_| {
      "Selected cities removed successfully.".to_owned()
    })?;
  } else if form.has("lv_save_template") {
    match form.text("template").parse::<Template>() {
      Ok(template) => {
        notify(&mut notices, state.settings.save_template(ent, template).await, |_| {
          "Template updated successfully.".to_owned()
        })?;
      }
      Err(_) => notices.push(Notice::Error("Unknown template.".to_owned())),
    }
  } else if form.has("lv_create_backup") {
    notify(&mut notices, state.backups.create_backup(ent).await, |_| {
      "Backup created successfully.".to_owned()
    })?;
  } else if form.has("lv_upload_backup") {
    match form.file("backup_file") {
      Some(upload) => {
        let result = state.backups.restore_from_upload(ent, &upload.bytes).await;
        notify(&mut notices, result, |_| {
          "Backup uploaded and entries restored successfully.".to_owned()
        })?;
      }
      None => notices.push(Notice::Error(
        "Please select a backup file to upload.".to_owned(),
      )),
    }
  }

  Ok(render(&state, ent, &notices).await?.into_response())
}

fn attachment(download: BackupDownload) -> Response {
  (
    [
      (header::CONTENT_TYPE, "application/json".to_owned()),
      (
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{}\"", download.file_name),
      ),
    ],
    download.body,
  )
    .into_response()
}

fn checked(on: bool) -> &'static str { if on { " checked" } else { "" } }

async fn render<S>(
  state: &AppState<S>,
  ent: Entitlements,
  notices: &[Notice],
) -> Result<Html<String>>
where
  S: OptionStore + Clone + 'static,
{
  let settings = state.settings.load().await?;
  let chrome = chrome(state, ent).await?;
  let mut body = String::new();

  // ── General ───────────────────────────────────────────────────────────
  let active = settings.verification_system_active;
  let _ = write!(
    body,
    r#"<section><h2>General Settings</h2><form method="post" action="/admin/settings">
<p>Verification System:
<label><input type="radio" name="verification_system" value="yes"{}> Active</label>
<label><input type="radio" name="verification_system" value="no"{}> Inactive</label></p>"#,
    checked(active),
    checked(!active),
  );
  if ent.premium {
    let _ = write!(
      body,
      r#"<p><label><input type="checkbox" name="show_city_eligibility" value="yes"{}> Show City Eligibility Before Verification Form</label></p>"#,
      checked(settings.show_city_eligibility)
    );
  } else {
    let _ = write!(
      body,
      "<p>Show City Eligibility Before Verification Form</p>{PREMIUM_NOTE}"
    );
  }
  let _ = write!(
    body,
    r#"<p><label for="success_message">Frontend Success Message:</label><br><input type="text" name="success_message" id="success_message" value="{}" placeholder="Enter success message"></p>
<input type="submit" name="lv_general_settings" value="Save General Settings"></form></section>"#,
    escape(&settings.success_message)
  );

  // ── Cities ────────────────────────────────────────────────────────────
  body.push_str("<section><h2>City Management</h2>");
  if ent.premium {
    body.push_str(
      r#"<form method="post" action="/admin/settings"><h3>Add New City</h3>
<p><label for="city_name">City Name:</label> <input type="text" name="city_name" id="city_name" required></p>
<p>Eligibility:
<label><input type="radio" name="city_eligibility" value="eligible" checked> Eligible</label>
<label><input type="radio" name="city_eligibility" value="not_eligible"> Not Eligible</label></p>
<input type="submit" name="lv_add_city" value="Add City"></form><h3>Manage Cities</h3>"#,
    );
    let cities = state.cities.cities().await?;
    if cities.is_empty() {
      body.push_str("<p>No cities added yet.</p>");
    } else {
      body.push_str(
        r#"<form method="post" action="/admin/settings"><table><thead><tr><th></th><th>City Name</th><th>Eligibility</th><th>Actions</th></tr></thead><tbody>"#,
      );
      for city in &cities {
        let eligibility = match city.eligibility {
          Eligibility::Eligible => "Eligible",
          Eligibility::NotEligible => "Not Eligible",
        };
        let _ = write!(
          body,
          r#"<tr><td>{}</td><td>{}</td><td>{eligibility}</td><td><a href="/admin/settings?action=remove_city&amp;city_id={}" onclick="return confirm('Are you sure you want to remove this city?');">Remove</a></td></tr>"#,
          checkbox("city_ids", city.id),
          escape(&city.name),
          city.id,
        );
      }
      body.push_str(
        r#"</tbody></table><p><input type="submit" name="lv_bulk_remove_cities" value="Remove Selected" onclick="return confirm('Are you sure you want to remove the selected cities?');"></p></form>"#,
      );
    }
  } else {
    body.push_str(PREMIUM_NOTE);
  }
  body.push_str("</section>");

  // ── Template ──────────────────────────────────────────────────────────
  body.push_str("<section><h2>Template Management</h2>");
  if ent.premium {
    body.push_str(
      r#"<form method="post" action="/admin/settings"><label for="template">Choose Template:</label> <select name="template" id="template">"#,
    );
    for template in Template::iter() {
      let selected = if template == settings.selected_template { " selected" } else { "" };
      let _ = write!(
        body,
        r#"<option value="{template}"{selected}>{}</option>"#,
        template.title()
      );
    }
    body.push_str(
      r#"</select> <input type="submit" name="lv_save_template" value="Save Template"></form>"#,
    );
  } else {
    body.push_str(PREMIUM_NOTE);
  }
  body.push_str("</section>");

  // ── Backups ───────────────────────────────────────────────────────────
  body.push_str("<section><h2>Backup Management</h2>");
  if ent.premium {
    body.push_str(
      r#"<form method="post" action="/admin/settings"><h3>Create Backup</h3><p>Create a backup of all current entries.</p><input type="submit" name="lv_create_backup" value="Create Backup"></form><h3>Backup List</h3>"#,
    );
    let backups = state.backups.list().await?;
    if backups.is_empty() {
      body.push_str("<p>No backups available yet.</p>");
    } else {
      body.push_str("<table><thead><tr><th>Backup Date</th><th>Entries</th><th>Actions</th></tr></thead><tbody>");
      for backup in &backups {
        let _ = write!(
          body,
          r#"<tr><td>{}</td><td>{}</td><td><a href="/admin/settings?action=download_backup&amp;backup_id={}">Download</a></td></tr>"#,
          backup.created_at.format("%Y-%m-%d %H:%M:%S"),
          backup.entries.len(),
          backup.id,
        );
      }
      body.push_str("</tbody></table>");
    }
    body.push_str(
      r#"<form method="post" action="/admin/settings" enctype="multipart/form-data"><h3>Upload Backup</h3><p>Upload a previously created backup file to restore entries.</p><input type="file" name="backup_file" accept=".json" required> <input type="submit" name="lv_upload_backup" value="Upload Backup"></form>"#,
    );
  } else {
    body.push_str(PREMIUM_NOTE);
  }
  body.push_str("</section>");

  Ok(admin_page("Settings", "/admin/settings", &chrome, notices, &body))
}
