//! Promotional banners shown on admin pages of free installs.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::client::{BANNER_TIMEOUT, LicenseClient};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdBanner {
  pub banner_url: String,
  pub target_url: String,
}

impl LicenseClient {
  /// `action=get_ad_banner`. Every failure yields no banners.
  pub async fn fetch_ad_banners(&self) -> Vec<AdBanner> {
    let resp = match self.post(&[("action", "get_ad_banner")], BANNER_TIMEOUT).await {
      Ok(resp) => resp,
      Err(e) => {
        warn!(error = %e, "ad banner fetch failed");
        return Vec::new();
      }
    };
    if resp.status != 200 || resp.body.is_empty() {
      warn!(status = resp.status, body = %resp.body, "ad banner fetch failed");
      return Vec::new();
    }
    let banners = parse_banners(&resp.body);
    if banners.is_none() {
      warn!(body = %resp.body, "ad banner response invalid");
    }
    banners.unwrap_or_default()
  }
}

/// The usable banners in `body`, or `None` if the body has no non-empty
/// `banners` array. Entries missing either URL are dropped.
pub fn parse_banners(body: &str) -> Option<Vec<AdBanner>> {
  let data: Value = serde_json::from_str(body).ok()?;
  let list = data.get("banners")?.as_array().filter(|l| !l.is_empty())?;
  Some(
    list
      .iter()
      .filter_map(|b| {
        let url = |key: &str| {
          b.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
        };
        Some(AdBanner { banner_url: url("banner_url")?, target_url: url("target_url")? })
      })
      .collect(),
  )
}
