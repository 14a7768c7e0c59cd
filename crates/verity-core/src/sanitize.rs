//! Input normalisation shared by every form handler.

/// Clean a single-line text value: strips markup tags and control
/// characters, collapses whitespace runs to one space, and trims.
///
/// A `<` only opens a tag when a letter, `/`, `!` or `?` follows it; any
/// other `<` is kept as text.
pub fn sanitize_text(raw: &str) -> String {
  let mut out = String::with_capacity(raw.len());
  let mut in_tag = false;
  let mut pending_space = false;
  let mut chars = raw.chars().peekable();

  while let Some(c) = chars.next() {
    match c {
      '>' if in_tag => in_tag = false,
      _ if in_tag => {}
      '<' if chars
        .peek()
        .is_some_and(|n| n.is_ascii_alphabetic() || matches!(n, '/' | '!' | '?')) =>
      {
        in_tag = true
      }
      c if c.is_whitespace() || c.is_control() => pending_space = true,
      c => {
        if pending_space && !out.is_empty() {
          out.push(' ');
        }
        pending_space = false;
        out.push(c);
      }
    }
  }
  out
}

/// Derive the form-input name for a field label: lowercase, spaces become
/// underscores, and anything outside `[a-z0-9_-]` is dropped.
pub fn machine_key(label: &str) -> String {
  label
    .to_lowercase()
    .replace(' ', "_")
    .chars()
    .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
    .collect()
}
