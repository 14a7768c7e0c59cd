//! `/verify`: the public lookup widget.
//!
//! The eligible city a visitor picked is remembered in a session cookie and
//! re-checked against the city list on every request, so removing a city or
//! marking it ineligible takes effect immediately.

use std::fmt::Write as _;

use axum::{
  extract::State,
  http::{HeaderMap, HeaderValue, header},
  response::{Html, IntoResponse, Response},
};
use verity_core::{
  Entitlements, OptionStore,
  sanitize::machine_key,
  verify::{LookupResult, Page, VisitorAction, VisitorContext, rejected_city_message},
};

use crate::{
  AppState,
  error::Result,
  form::PostForm,
  html::{escape, js_value, match_card, public_page},
};

pub const CITY_COOKIE: &str = "verity_city";

pub async fn page<S>(State(state): State<AppState<S>>, headers: HeaderMap) -> Result<Response>
where
  S: OptionStore + Clone + 'static,
{
  let ent = state.license.entitlements().await?;
  respond(&state, &headers, ent, VisitorAction::View).await
}

pub async fn submit<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
  form: PostForm,
) -> Result<Response>
where
  S: OptionStore + Clone + 'static,
{
  let ent = state.license.entitlements().await?;
  let action = if form.has("lv_check_city") {
    VisitorAction::CheckCity(form.text("city_name").to_owned())
  } else if form.has("lv_verify") {
    let field = state.schema.retrieval_field(ent).await?;
    VisitorAction::Verify(form.text(&machine_key(&field)).to_owned())
  } else {
    VisitorAction::View
  };
  respond(&state, &headers, ent, action).await
}

async fn respond<S>(
  state: &AppState<S>,
  headers: &HeaderMap,
  ent: Entitlements,
  action: VisitorAction,
) -> Result<Response>
where
  S: OptionStore + Clone + 'static,
{
  let mut ctx = VisitorContext::default();
  if let Some(city) = city_cookie(headers)
    && state.cities.check_city(&city).await?
  {
    ctx.eligible_city = Some(city);
  }

  let outcome = state.verifier.render(ent, &ctx, action).await?;
  let mut response = render(&outcome.page).into_response();

  if let Some(city) = outcome.remember_city {
    let cookie = format!(
      "{CITY_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
      hex::encode(city)
    );
    if let Ok(value) = HeaderValue::from_str(&cookie) {
      response.headers_mut().append(header::SET_COOKIE, value);
    }
  }
  Ok(response)
}

/// The city remembered by an earlier eligibility check, hex-encoded so any
/// name survives the cookie syntax.
fn city_cookie(headers: &HeaderMap) -> Option<String> {
  headers
    .get_all(header::COOKIE)
    .iter()
    .filter_map(|v| v.to_str().ok())
    .flat_map(|v| v.split(';'))
    .filter_map(|pair| pair.trim().split_once('='))
    .find(|(name, _)| *name == CITY_COOKIE)
    .and_then(|(_, value)| hex::decode(value).ok())
    .and_then(|bytes| String::from_utf8(bytes).ok())
}

fn render(page: &Page) -> Html<String> {
  match page {
    Page::Unavailable(message) => {
      public_page("Verification", &format!(r#"<p class="message">{}</p>"#, escape(message)))
    }

    Page::CityGate { form_name, cities, rejected } => {
      let mut body = String::new();
      if let Some(city) = rejected {
        let message = rejected_city_message(city);
        let _ = write!(body, r#"<p class="inline-error">{}</p>"#, escape(&message));
        let _ = write!(body, "<script>alert({});</script>", js_value(&message));
      }
      let _ = write!(
        body,
        r#"<h2>{}</h2><form method="post" action="/verify"><label for="city_name">Select Your City:</label> <select name="city_name" id="city_name" required><option value="">-- Select City --</option>"#,
        escape(form_name)
      );
      for city in cities {
        let name = escape(&city.name);
        let _ = write!(body, r#"<option value="{name}">{name}</option>"#);
      }
      body.push_str(
        r#"</select> <input type="submit" name="lv_check_city" value="Check Eligibility"></form>"#,
      );
      public_page(form_name, &body)
    }

    Page::LookupForm { form_name, retrieval_field, result } => {
      let key = machine_key(retrieval_field);
      let field = escape(retrieval_field);
      let mut body = format!(
        r#"<h2>{}</h2><form method="post" action="/verify"><label for="{key}">{field}:</label> <input type="text" name="{key}" id="{key}" placeholder="Enter your {field}" required> <input type="submit" name="lv_verify" value="Verify"></form>"#,
        escape(form_name)
      );
      match result {
        Some(LookupResult::Found(card)) => body.push_str(&match_card(card)),
        Some(LookupResult::NotFound { field, value }) => {
          let _ = write!(
            body,
            r#"<p class="inline-error">{}</p>"#,
            escape(&LookupResult::not_found_message(field, value))
          );
        }
        None => {}
      }
      public_page(form_name, &body)
    }
  }
}
