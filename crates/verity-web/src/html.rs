//! Page chrome and the small HTML building blocks shared by every handler.
//!
//! Everything interpolated into markup goes through [`escape`]; values placed
//! inside `<script>` go through [`js_value`].

use std::fmt::Write as _;

use axum::response::Html;
use serde::Serialize;
use verity_core::{settings::Template, verify::MatchCard};
use verity_license::AdBanner;

/// How long transient notices stay on screen.
const NOTICE_DISMISS_MS: u32 = 5_000;
/// Interval between banner rotations.
const BANNER_ROTATE_MS: u32 = 10_000;

pub fn escape(raw: &str) -> String {
  let mut out = String::with_capacity(raw.len());
  for c in raw.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      c => out.push(c),
    }
  }
  out
}

/// A JSON literal that is safe to embed in an inline script.
pub fn js_value<T: Serialize + ?Sized>(value: &T) -> String {
  serde_json::to_string(value)
    .unwrap_or_else(|_| "null".to_owned())
    .replace("</", "<\\/")
}

// ─── Notices ─────────────────────────────────────────────────────────────────

/// A one-shot message rendered on the page that handled the action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
  Success(String),
  Error(String),
}

impl Notice {
  fn render(&self) -> String {
    let (class, text) = match self {
      Notice::Success(text) => ("notice success", text),
      Notice::Error(text) => ("notice error", text),
    };
    format!(r#"<div class="{class} dismissible"><p>{}</p></div>"#, escape(text))
  }
}

// ─── Admin chrome ────────────────────────────────────────────────────────────

/// Per-request state shown around every admin page.
#[derive(Debug, Clone, Default)]
pub struct Chrome {
  pub premium: bool,
  /// The persistent license alert, until the condition is resolved.
  pub alert:   Option<String>,
  pub banners: Vec<AdBanner>,
}

const NAV: &[(&str, &str)] = &[
  ("/admin/entries", "Entries"),
  ("/admin/form-builder", "Form Builder"),
  ("/admin/settings", "Settings"),
  ("/admin/license", "License"),
  ("/admin/credits", "Credits"),
];

const STYLE: &str = "\
body{font-family:system-ui,sans-serif;margin:0;color:#1a202c;background:#f7fafc}\
nav{background:#016cec;padding:12px 24px}\
nav a{color:#fff;margin-right:18px;text-decoration:none}\
nav a.current{font-weight:600;text-decoration:underline}\
main{max-width:1100px;margin:24px auto;padding:0 24px}\
section{background:#fff;padding:24px;margin-bottom:32px;border-radius:6px}\
table{border-collapse:collapse;width:100%}\
th,td{border-bottom:1px solid #e2e8f0;padding:8px;text-align:left}\
.notice{padding:4px 12px;margin-bottom:12px;border-left:4px solid}\
.notice.success{border-color:#38a169;background:#f0fff4}\
.notice.error{border-color:#e53e3e;background:#fff5f5}\
.alert{padding:8px 12px;margin-bottom:12px;background:#fffaf0;border-left:4px solid #dd6b20}\
.premium{color:#e53e3e;font-size:14px}\
.ad-space{text-align:center;margin-bottom:20px}\
.ad-space img{max-width:728px;width:100%;height:90px;object-fit:cover}\
.card{border:1px solid #e2e8f0;border-radius:8px;padding:20px;max-width:640px;background:#fff}\
.card .photo.round{width:120px;height:120px;border-radius:50%;object-fit:cover;display:block;margin:0 auto 16px}\
.card.template2{display:flex;gap:24px}\
.card.template2 .fields{flex:2}\
.card.template2 .side{flex:1}\
.card.template2 .side img{width:100%;border-radius:6px}\
.placeholder{border:2px dashed #cbd5e0;color:#718096;padding:40px 8px;text-align:center}\
.verified{color:#38a169;font-weight:600}\
.inline-error{color:#e53e3e}";

fn dismiss_script() -> String {
  format!(
    "<script>setTimeout(function(){{document.querySelectorAll('.dismissible')\
     .forEach(function(n){{n.remove();}});}},{NOTICE_DISMISS_MS});</script>"
  )
}

fn banner_block(banners: &[AdBanner]) -> String {
  let Some(first) = banners.first() else {
    return String::new();
  };
  let mut out = format!(
    r#"<div class="ad-space"><a id="ad-link" href="{}" target="_blank" rel="noopener"><img id="ad-img" src="{}" alt="Advertisement"></a></div>"#,
    escape(&first.target_url),
    escape(&first.banner_url),
  );
  if banners.len() > 1 {
    let _ = write!(
      out,
      "<script>(function(){{var b={},i=0;setInterval(function(){{i=(i+1)%b.length;\
       document.getElementById('ad-link').href=b[i].target_url;\
       document.getElementById('ad-img').src=b[i].banner_url;}},{BANNER_ROTATE_MS});}})();</script>",
      js_value(banners)
    );
  }
  out
}

/// Wrap `body` in the admin layout.
pub fn admin_page(
  title: &str,
  current: &str,
  chrome: &Chrome,
  notices: &[Notice],
  body: &str,
) -> Html<String> {
  let mut nav = String::new();
  let upgrade = [("/admin/upgrade", "Upgrade")];
  let extra: &[(&str, &str)] = if chrome.premium { &[] } else { &upgrade };
  for (href, label) in NAV.iter().chain(extra) {
    let class = if *href == current { r#" class="current""# } else { "" };
    let _ = write!(nav, r#"<a href="{href}"{class}>{label}</a>"#);
  }

  let alert = chrome
    .alert
    .as_deref()
    .map(|a| format!(r#"<div class="alert"><p>{}</p></div>"#, escape(a)))
    .unwrap_or_default();
  let notices: String = notices.iter().map(Notice::render).collect();

  Html(format!(
    "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title} · Verity</title>\
     <style>{STYLE}</style></head><body><nav>{nav}</nav><main>{banner}{alert}{notices}\
     <h1>{title}</h1>{body}</main>{script}</body></html>",
    title = escape(title),
    banner = banner_block(&chrome.banners),
    script = dismiss_script(),
  ))
}

/// Wrap `body` in the bare layout used for the public widget.
pub fn public_page(title: &str, body: &str) -> Html<String> {
  Html(format!(
    "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title>\
     <style>{STYLE}</style></head><body><main>{body}</main></body></html>",
    title = escape(title),
  ))
}

// ─── Matched record ──────────────────────────────────────────────────────────

/// Render a matched record with its configured template.
pub fn match_card(card: &MatchCard) -> String {
  let rows: String = card
    .rows
    .iter()
    .map(|(label, value)| {
      format!("<tr><th>{}</th><td>{}</td></tr>", escape(label), escape(value))
    })
    .collect();
  let message = format!(r#"<p class="verified">{}</p>"#, escape(&card.success_message));

  match card.template {
    Template::Template1 => {
      let photo = card
        .photo_url
        .as_deref()
        .map(|url| format!(r#"<img class="photo round" src="{}" alt="Photo">"#, escape(url)))
        .unwrap_or_default();
      format!(r#"<div class="card template1">{photo}<table>{rows}</table>{message}</div>"#)
    }
    Template::Template2 => {
      let side = match card.photo_url.as_deref() {
        Some(url) => format!(r#"<img src="{}" alt="Photo">"#, escape(url)),
        None => r#"<div class="placeholder">No Image Available</div>"#.to_owned(),
      };
      format!(
        r#"<div class="card template2"><div class="fields"><table>{rows}</table>{message}</div><div class="side">{side}</div></div>"#
      )
    }
  }
}
