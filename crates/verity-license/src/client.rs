//! Async HTTP client for the license server.
//!
//! Every call is a form-encoded POST to a single endpoint, selected by its
//! `action` parameter. Responses are returned raw; interpretation is the
//! caller's business (see [`crate::reply`]).

use std::time::Duration;

use reqwest::Client;

use crate::Result;

pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(15);
pub const REPORT_TIMEOUT: Duration = Duration::from_secs(5);
pub const BANNER_TIMEOUT: Duration = Duration::from_secs(5);

/// Status code and body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
  pub status: u16,
  pub body:   String,
}

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct LicenseClient {
  client:   Client,
  endpoint: String,
  site_url: String,
}

impl LicenseClient {
  /// `site_url` is this installation's canonical URL, sent with every
  /// verification and compared against the site a key is registered to.
  pub fn new(endpoint: impl Into<String>, site_url: impl Into<String>) -> Result<Self> {
    let client = Client::builder()
      .user_agent(concat!("verity/", env!("CARGO_PKG_VERSION")))
      .build()?;
    Ok(Self { client, endpoint: endpoint.into(), site_url: site_url.into() })
  }

  pub fn site_url(&self) -> &str { &self.site_url }

  /// `true` when `other` names this site, ignoring a trailing slash.
  pub fn is_this_site(&self, other: &str) -> bool {
    other.trim_end_matches('/') == self.site_url.trim_end_matches('/')
  }

  pub(crate) async fn post(
    &self,
    form: &[(&str, &str)],
    timeout: Duration,
  ) -> reqwest::Result<RawResponse> {
    let resp = self
      .client
      .post(&self.endpoint)
      .form(form)
      .timeout(timeout)
      .send()
      .await?;
    let status = resp.status().as_u16();
    let body = resp.text().await?;
    Ok(RawResponse { status, body })
  }

  /// `action=verify`
  pub async fn verify(&self, license_key: &str) -> reqwest::Result<RawResponse> {
    self
      .post(
        &[
          ("action", "verify"),
          ("license_key", license_key),
          ("site_url", self.site_url.as_str()),
        ],
        VERIFY_TIMEOUT,
      )
      .await
  }

  /// `action=report-usage`
  pub async fn report_usage(
    &self,
    license_key: &str,
    timestamp: i64,
  ) -> reqwest::Result<RawResponse> {
    let timestamp = timestamp.to_string();
    self
      .post(
        &[
          ("action", "report-usage"),
          ("license_key", license_key),
          ("site_url", self.site_url.as_str()),
          ("timestamp", timestamp.as_str()),
        ],
        REPORT_TIMEOUT,
      )
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn site_comparison_ignores_trailing_slash() {
    let client = LicenseClient::new("https://license.test/api", "https://example.com/").unwrap();
    assert!(client.is_this_site("https://example.com"));
    assert!(client.is_this_site("https://example.com/"));
    assert!(!client.is_this_site("https://other.example.com"));
  }
}
