//! `/admin/form-builder`: form name, field list and retrieval field.

use std::fmt::Write as _;

use axum::{extract::State, response::Html};
use strum::IntoEnumIterator;
use verity_core::{
  Entitlements, OptionStore,
  schema::{FieldDefinition, FieldRows, FieldType},
};

use super::{PREMIUM_NOTE, chrome, notify};
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
) -> Result<Html<String>>
where
  S: OptionStore + Clone + 'static,
{
  let ent = state.license.entitlements().await?;
  render(&state, ent, &[]).await
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

  if form.has("lv_save_form_name") {
    // A blank name is ignored without comment.
    if state.schema.save_form_name(form.text("form_name")).await? {
      notices.push(Notice::Success("Form name updated successfully.".to_owned()));
    }
  } else if form.has("lv_save_form_fields") {
    let rows = FieldRows {
      labels:    form.all("field_labels").into_iter().map(str::to_owned).collect(),
      types:     form.all("field_types").into_iter().map(str::to_owned).collect(),
      positions: form.all("field_positions").into_iter().map(str::to_owned).collect(),
      required:  form
        .all("field_required")
        .into_iter()
        .filter_map(|i| i.trim().parse().ok())
        .collect(),
    };
    notify(&mut notices, state.schema.save_fields(ent, rows).await, |_| {
      "Form fields updated successfully.".to_owned()
    })?;
  } else if form.has("lv_save_retrieval_field") {
    let result = state
      .schema
      .save_retrieval_field(ent, form.text("retrieval_field"))
      .await;
    notify(&mut notices, result, |_| {
      "Retrieval field setting updated successfully.".to_owned()
    })?;
  }

  render(&state, ent, &notices).await
}

fn type_label(ty: FieldType) -> &'static str {
  match ty {
    FieldType::Text => "Text",
    FieldType::Number => "Number",
    FieldType::Date => "Date",
    FieldType::File => "File Upload",
    FieldType::Email => "Email",
    FieldType::Url => "Website",
  }
}

fn type_select(selected: Option<FieldType>) -> String {
  let mut out = String::from(r#"<select name="field_types[]"><option value="">--</option>"#);
  for ty in FieldType::iter() {
    let attr = if Some(ty) == selected { " selected" } else { "" };
    let _ = write!(out, r#"<option value="{ty}"{attr}>{}</option>"#, type_label(ty));
  }
  out.push_str("</select>");
  out
}

/// Blank rows offered below the existing fields; more can be added in the
/// browser.
const BLANK_ROWS: usize = 3;

/// One editable row. `index` is what `field_required[]` posts back and
/// matches the row's place in the posted order; the position input decides
/// where the field ends up.
fn field_row(index: usize, field: Option<&FieldDefinition>) -> String {
  let label = field.map(|f| escape(&f.label)).unwrap_or_default();
  let checked = if field.is_some_and(|f| f.required) { " checked" } else { "" };
  format!(
    r#"<tr><td><input type="number" name="field_positions[]" value="{position}" min="1" class="small-text" title="Position"></td><td><input type="text" name="field_labels[]" value="{label}" placeholder="Field Label"></td><td>{}</td><td><label><input type="checkbox" name="field_required[]" value="{index}"{checked}> Required</label></td><td><button type="button" class="remove-field">Remove</button></td></tr>"#,
    type_select(field.map(|f| f.field_type)),
    position = index + 1,
  )
}

/// Add-row and remove-row behaviour. A removed row stays in the form with
/// an empty label so the posted indices stay aligned; empty rows are skipped
/// on save.
const FIELD_SCRIPT: &str = r#"<script>(function(){var body=document.getElementById('field-rows');
body.addEventListener('click',function(e){if(!e.target.classList.contains('remove-field'))return;
var row=e.target.closest('tr');row.querySelector('input[name="field_labels[]"]').value='';row.style.display='none';});
document.getElementById('add-field').addEventListener('click',function(){var rows=body.querySelectorAll('tr');
var row=rows[rows.length-1].cloneNode(true),n=rows.length;row.style.display='';
row.querySelector('input[name="field_labels[]"]').value='';row.querySelector('select').value='';
row.querySelector('input[name="field_positions[]"]').value=n+1;
var req=row.querySelector('input[name="field_required[]"]');req.value=n;req.checked=false;body.appendChild(row);});})();</script>"#;

async fn render<S>(
  state: &AppState<S>,
  ent: Entitlements,
  notices: &[Notice],
) -> Result<Html<String>>
where
  S: OptionStore + Clone + 'static,
{
  let schema = state.schema.snapshot(ent).await?;
  let chrome = chrome(state, ent).await?;

  let mut body = format!(
    r#"<section><h2>Form Name</h2><form method="post" action="/admin/form-builder"><input type="text" name="form_name" value="{}" placeholder="Enter form name" required> <input type="submit" name="lv_save_form_name" value="Save Form Name"></form></section>"#,
    escape(&schema.form_name)
  );

  body.push_str("<section><h2>Customize Form Fields</h2>");
  if ent.premium {
    body.push_str(
      r#"<form method="post" action="/admin/form-builder"><p>Change the position numbers to reorder fields.</p><table><thead><tr><th>Position</th><th>Label</th><th>Type</th><th>Required</th><th></th></tr></thead><tbody id="field-rows">"#,
    );
    for (i, field) in schema.fields.iter().enumerate() {
      body.push_str(&field_row(i, Some(field)));
    }
    let len = schema.fields.len();
    for i in len..len + BLANK_ROWS {
      body.push_str(&field_row(i, None));
    }
    body.push_str(
      r#"</tbody></table><p><button type="button" id="add-field">Add Field</button> <input type="submit" name="lv_save_form_fields" value="Save Form"></p></form>"#,
    );
    body.push_str(FIELD_SCRIPT);
  } else {
    body.push_str(PREMIUM_NOTE);
  }
  body.push_str("</section>");

  body.push_str("<section><h2>Retrieval Setting</h2>");
  if ent.premium {
    body.push_str(
      r#"<form method="post" action="/admin/form-builder"><label for="retrieval_field">Retrieve User Data Using:</label> <select name="retrieval_field" id="retrieval_field">"#,
    );
    for field in schema.fields.iter().filter(|f| !f.field_type.is_file()) {
      let selected = if field.label == schema.retrieval_field { " selected" } else { "" };
      let label = escape(&field.label);
      let _ = write!(body, r#"<option value="{label}"{selected}>{label}</option>"#);
    }
    body.push_str(
      r#"</select> <input type="submit" name="lv_save_retrieval_field" value="Save Setting"></form>"#,
    );
  } else {
    let _ = write!(
      body,
      "<p>Records are looked up by <strong>{}</strong>.</p>{PREMIUM_NOTE}",
      escape(&schema.retrieval_field)
    );
  }
  body.push_str("</section>");

  Ok(admin_page("Form Builder", "/admin/form-builder", &chrome, notices, &body))
}
