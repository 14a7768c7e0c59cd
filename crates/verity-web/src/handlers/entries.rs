//! `/admin/entries`: add, edit, delete and list records.

use std::fmt::Write as _;

use axum::{
  extract::{Query, State},
  response::Html,
};
use verity_core::{
  Entitlements, OptionStore,
  entry::Entry,
  sanitize::machine_key,
  schema::FieldDefinition,
};

use super::{ActionQuery, chrome, checkbox, notify, parse_id};
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
) -> Result<Html<String>>
where
  S: OptionStore + Clone + 'static,
{
  let ent = state.license.entitlements().await?;
  let mut notices = Vec::new();
  let mut editing = None;
  // An unparseable id becomes the nil id, which matches nothing.
  let id = parse_id(query.entry_id.as_deref()).unwrap_or_default();

  if query.is("delete") {
    notify(&mut notices, state.entries.delete_entry(id).await, |_| {
      "Entry deleted successfully.".to_owned()
    })?;
  } else if query.is("edit") && ent.premium {
    editing = state.entries.get(id).await?;
    if editing.is_none() {
      notices.push(Notice::Error("Invalid entry ID.".to_owned()));
    }
  }

  render(&state, ent, &notices, editing.as_ref()).await
}

pub async fn submit<S>(
  _auth: Authenticated,
  State(state): State<AppState<S>>,
  form: PostForm,
) -> Result<Html<String>>
where
  S: OptionStore + Clone + 'static,
{
  let ent = state.license.entitlements().await?;
  let mut notices = Vec::new();
  let mut editing = None;

  if form.has("lv_add_entry") {
    let result = state.entries.add_entry(ent, &form.into_submission()).await;
    notify(&mut notices, result, |_| "Entry added successfully.".to_owned())?;
  } else if form.has("lv_edit_entry") {
    let id = parse_id(form.get("entry_id")).unwrap_or_default();
    let result = state.entries.edit_entry(ent, id, &form.into_submission()).await;
    // Keep the form open so the administrator can correct the values.
    if matches!(result, Err(verity_core::Error::Validation(_))) {
      editing = state.entries.get(id).await?;
    }
    notify(&mut notices, result, |_| "Entry updated successfully.".to_owned())?;
  } else if form.has("lv_bulk_delete") {
    let ids = form.ids("entry_ids");
    notify(&mut notices, state.entries.bulk_delete(&ids).await, |_| {
      "Selected entries deleted successfully.".to_owned()
    })?;
  }

  render(&state, ent, &notices, editing.as_ref()).await
}

async fn render<S>(
  state: &AppState<S>,
  ent: Entitlements,
  notices: &[Notice],
  editing: Option<&Entry>,
) -> Result<Html<String>>
where
  S: OptionStore + Clone + 'static,
{
  let fields = state.schema.fields(ent).await?;
  let entries = state.entries.list().await?;
  let can_add = state.entries.can_add(ent).await?;
  let limit = state.entries.free_entry_limit();
  let chrome = chrome(state, ent).await?;

  let mut body = String::new();
  body.push_str(&entry_form(&fields, ent, editing, can_add));
  if !ent.premium {
    let _ = write!(
      body,
      r#"<p class="premium">Free version limited to {limit} entries ({count}/{limit} used). Upgrade to premium for unlimited entries and editing.</p>"#,
      count = entries.len(),
    );
    if !can_add && editing.is_none() {
      let _ = write!(
        body,
        r#"<p class="inline-error">{}</p>"#,
        escape(&verity_core::Error::EntryLimitReached { limit }.to_string())
      );
    }
  }
  body.push_str("</section>");
  body.push_str(&entries_table(&fields, &entries, ent));

  Ok(admin_page("Entries", "/admin/entries", &chrome, notices, &body))
}

/// The add form, or the edit form when `editing` is set. Leaves the
/// enclosing `<section>` open for the tier notice.
fn entry_form(
  fields: &[FieldDefinition],
  ent: Entitlements,
  editing: Option<&Entry>,
  can_add: bool,
) -> String {
  let title = if editing.is_some() { "Edit Entry" } else { "Add New Entry" };
  let mut out = format!(
    r#"<section><h2>{title}</h2><form method="post" action="/admin/entries" enctype="multipart/form-data">"#
  );
  if let Some(entry) = editing {
    let _ = write!(out, r#"<input type="hidden" name="entry_id" value="{}">"#, entry.id);
  }

  for field in fields {
    let name = machine_key(&field.label);
    let value = editing
      .and_then(|e| e.value(&field.label))
      .unwrap_or_default();
    let marker = if field.required { " <span class=\"inline-error\">*</span>" } else { "" };
    let _ = write!(
      out,
      r#"<p><label for="{name}">{}{marker}</label><br>"#,
      escape(&field.label)
    );

    if field.field_type.is_file() && ent.premium {
      if !value.is_empty() {
        let _ = write!(out, r#"<img src="{}" alt="" width="80"><br>"#, escape(value));
      }
      // An existing file satisfies the requirement on edit.
      let required = if field.required && editing.is_none() { " required" } else { "" };
      let _ = write!(out, r#"<input type="file" name="{name}" id="{name}"{required}>"#);
    } else {
      let input_type = if ent.premium { field.field_type.input_type() } else { "text" };
      let required = if field.required { " required" } else { "" };
      let _ = write!(
        out,
        r#"<input type="{input_type}" name="{name}" id="{name}" value="{}"{required}>"#,
        escape(value)
      );
    }
    out.push_str("</p>");
  }

  let (action, label, disabled) = match editing {
    Some(_) => ("lv_edit_entry", "Update Entry", ""),
    None if !can_add => ("lv_add_entry", "Add Entry", " disabled"),
    None => ("lv_add_entry", "Add Entry", ""),
  };
  let _ = write!(
    out,
    r#"<input type="submit" name="{action}" value="{label}"{disabled}></form>"#
  );
  out
}

fn entries_table(fields: &[FieldDefinition], entries: &[Entry], ent: Entitlements) -> String {
  let mut out = String::from("<section><h2>Existing License Entries</h2>");
  if entries.is_empty() {
    out.push_str("<p>No entries found. Use the form above to add a new entry.</p></section>");
    return out;
  }

  out.push_str(r#"<form method="post" action="/admin/entries"><table><thead><tr><th></th>"#);
  for field in fields {
    let _ = write!(out, "<th>{}</th>", escape(&field.label));
  }
  out.push_str("<th>Actions</th></tr></thead><tbody>");

  for entry in entries {
    let _ = write!(out, "<tr><td>{}</td>", checkbox("entry_ids", entry.id));
    for field in fields {
      let value = entry.value(&field.label).unwrap_or_default();
      match (field.field_type.is_file(), value.is_empty()) {
        (true, false) => {
          let _ = write!(out, r#"<td><img src="{}" alt="" width="60"></td>"#, escape(value));
        }
        (true, true) => out.push_str("<td>No Image</td>"),
        (false, true) => out.push_str("<td>-</td>"),
        (false, false) => {
          let _ = write!(out, "<td>{}</td>", escape(value));
        }
      }
    }
    out.push_str("<td>");
    if ent.premium {
      let _ = write!(out, r#"<a href="/admin/entries?action=edit&amp;entry_id={}">Edit</a> "#, entry.id);
    }
    let _ = write!(
      out,
      r#"<a href="/admin/entries?action=delete&amp;entry_id={}" onclick="return confirm('Are you sure you want to delete this entry?');">Delete</a></td></tr>"#,
      entry.id
    );
  }

  out.push_str(
    r#"</tbody></table><p><input type="submit" name="lv_bulk_delete" value="Delete Selected" onclick="return confirm('Are you sure you want to delete the selected entries?');"></p></form></section>"#,
  );
  out
}
