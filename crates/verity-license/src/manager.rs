//! The license state machine.
//!
//! The stored status is a cached verdict. It is trusted for up to a day after
//! the last successful round trip, then re-validated against the license
//! server. When the server is unreachable an unexpired active license keeps
//! working; every other failure leaves a persistent alert for the admin pages.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use verity_core::{
  Entitlements, OptionKey, OptionStore, Options,
  license::{LicenseState, LicenseStatus},
  sanitize::sanitize_text,
};

use crate::{
  Error, Result,
  banner::AdBanner,
  client::LicenseClient,
  reply::{BodyError, VerifyReply, parse_expiry},
};

/// How long a successful check is trusted, in seconds.
pub const CHECK_INTERVAL_SECS: i64 = 86_400;

pub const EXPIRED_ALERT: &str = "Your license has expired. Please renew it to continue using \
                                 premium features. Existing entries remain intact.";
pub const INVALID_OR_USED: &str = "License key is invalid or already used.";
pub const EXPIRED_OR_INVALID: &str = "License key is expired or invalid.";

/// A verified grant, ready to persist.
struct Grant {
  expiry:        DateTime<Utc>,
  expiry_string: String,
  site_url:      String,
}

enum GrantCheck {
  Granted(Grant),
  /// Unparseable or past expiry.
  Expired,
  /// Registered to another site.
  ForeignSite,
}

/// Cheap to clone.
#[derive(Clone)]
pub struct LicenseManager<S> {
  options: Options<S>,
  client:  LicenseClient,
}

impl<S: OptionStore> LicenseManager<S> {
  pub fn new(options: Options<S>, client: LicenseClient) -> Self { Self { options, client } }

  pub fn client(&self) -> &LicenseClient { &self.client }

  /// The tier the current request runs under.
  pub async fn entitlements(&self) -> Result<Entitlements> {
    Ok(Entitlements { premium: self.is_activated(false).await? })
  }

  pub async fn is_activated(&self, force_check: bool) -> Result<bool> {
    self.is_activated_at(force_check, Utc::now()).await
  }

  /// [`Self::is_activated`] with an explicit clock.
  pub async fn is_activated_at(&self, force_check: bool, now: DateTime<Utc>) -> Result<bool> {
    let state = self.options.license_state().await?;

    if state.key.is_empty() {
      self.options.set_license_status(LicenseStatus::Inactive).await?;
      return Ok(false);
    }

    if state.status == LicenseStatus::Active && now.timestamp() >= state.expiry {
      info!(expiry = state.expiry, "license expired");
      self.options.set_license_status(LicenseStatus::Inactive).await?;
      self.options.set_license_alert(EXPIRED_ALERT).await?;
      return Ok(false);
    }

    let previously_valid = state.is_valid_at(now);
    let due = force_check
      || match state.last_check {
        None => true,
        Some(at) => now.timestamp() - at > CHECK_INTERVAL_SECS,
      };
    if !due {
      return Ok(previously_valid);
    }

    let resp = match self.client.verify(&state.key).await {
      Ok(resp) => resp,
      Err(e) if previously_valid => {
        warn!(error = %e, "license server unreachable; keeping cached active status");
        return Ok(true);
      }
      Err(e) => {
        warn!(error = %e, "license check failed");
        self
          .options
          .set_license_alert(&format!("Unable to verify license: {e}"))
          .await?;
        return Ok(false);
      }
    };
    debug!(status = resp.status, body = %resp.body, "license check response");

    if resp.status != 200 {
      self
        .options
        .set_license_alert(&format!("Server returned HTTP {}: {}", resp.status, resp.body))
        .await?;
      return Ok(previously_valid);
    }

    let reply = match VerifyReply::parse(&resp.body) {
      Ok(reply) => reply,
      Err(_) => {
        let shown = if resp.body.is_empty() { "Empty" } else { resp.body.as_str() };
        self
          .options
          .set_license_alert(&format!("Invalid server response: {shown}"))
          .await?;
        return Ok(previously_valid);
      }
    };

    if !reply.is_complete_grant() {
      let message = reply.message().unwrap_or_else(|| INVALID_OR_USED.to_owned());
      info!(%message, "license refused by server");
      self.options.set_license_alert(&message).await?;
      self.options.set_license_status(LicenseStatus::Inactive).await?;
      self.options.clear_license_expiry().await?;
      self.stamp_check(now).await?;
      return Ok(false);
    }

    match self.check_grant(&reply, now) {
      GrantCheck::Expired => {
        self.options.set_license_alert(EXPIRED_OR_INVALID).await?;
        self.options.set_license_status(LicenseStatus::Inactive).await?;
        self.options.clear_license_expiry().await?;
        Ok(false)
      }
      GrantCheck::ForeignSite => {
        self.options.set_license_alert(INVALID_OR_USED).await?;
        self.options.set_license_status(LicenseStatus::Inactive).await?;
        Ok(false)
      }
      GrantCheck::Granted(grant) => {
        self.accept(&state.key, grant, now).await?;
        Ok(true)
      }
    }
  }

  /// Verify and store a new license key.
  ///
  /// Transport, HTTP and format errors leave the stored state untouched.
  pub async fn activate(&self, license_key: &str) -> Result<LicenseState> {
    let key = sanitize_text(license_key);
    if key.is_empty() {
      return Err(Error::MissingKey);
    }
    let now = Utc::now();

    let resp = self.client.verify(&key).await.map_err(|e| {
      warn!(error = %e, "license activation failed");
      Error::Rejected(format!("Failed to connect to license server: {e}"))
    })?;
    debug!(status = resp.status, body = %resp.body, "license activation response");
    if resp.status != 200 {
      return Err(Error::Rejected(format!(
        "Server returned HTTP {}: {}",
        resp.status, resp.body
      )));
    }

    let reply = VerifyReply::parse(&resp.body).map_err(|e| match e {
      BodyError::Empty => Error::Rejected("Empty server response.".to_owned()),
      BodyError::Malformed => {
        let shown = if resp.body.is_empty() { "Empty response" } else { resp.body.as_str() };
        Error::Rejected(format!("Invalid server response format: {shown}"))
      }
    })?;

    if !reply.is_valid() {
      self.options.set_license_status(LicenseStatus::Inactive).await?;
      self.options.clear_license_expiry().await?;
      return Err(Error::Rejected(
        reply.message().unwrap_or_else(|| INVALID_OR_USED.to_owned()),
      ));
    }

    match self.check_grant(&reply, now) {
      GrantCheck::Expired => {
        self.options.set_license_status(LicenseStatus::Inactive).await?;
        self.options.clear_license_expiry().await?;
        Err(Error::Rejected(EXPIRED_OR_INVALID.to_owned()))
      }
      GrantCheck::ForeignSite => {
        self.options.set_license_status(LicenseStatus::Inactive).await?;
        Err(Error::Rejected(INVALID_OR_USED.to_owned()))
      }
      GrantCheck::Granted(grant) => {
        self.accept(&key, grant, now).await?;
        info!("license activated");
        Ok(self.options.license_state().await?)
      }
    }
  }

  /// Clear every license field and the cached check. The key moves to
  /// [`OptionKey::PreviousLicenseKey`] so the form can offer it again; the
  /// periodic check never reads that slot. Returns whether a key was live.
  pub async fn deactivate(&self) -> Result<bool> {
    let key: String = self.options.get_or(OptionKey::LicenseKey, String::new()).await?;
    if !key.is_empty() {
      self.options.set(OptionKey::PreviousLicenseKey, &key).await?;
    }
    self.options.delete(OptionKey::LicenseKey).await?;
    self.options.set_license_status(LicenseStatus::Inactive).await?;
    self.options.clear_license_expiry().await?;
    self.options.set(OptionKey::RegisteredSiteUrl, "").await?;
    self.options.delete_transient(OptionKey::LastLicenseCheck).await?;
    self.options.clear_license_alert().await?;
    info!(had_key = !key.is_empty(), "license deactivated");
    Ok(!key.is_empty())
  }

  /// Report usage at most once a day. Failures are ignored.
  pub async fn report_usage(&self, license_key: &str, now: DateTime<Utc>) -> Result<()> {
    let last: i64 = self.options.get_or(OptionKey::LastUsageReport, 0).await?;
    if now.timestamp() - last <= CHECK_INTERVAL_SECS {
      debug!(last, "usage already reported today");
      return Ok(());
    }
    match self.client.report_usage(license_key, now.timestamp()).await {
      Ok(resp) if resp.status == 200 => {
        self
          .options
          .set(OptionKey::LastUsageReport, &now.timestamp())
          .await?;
      }
      Ok(resp) => debug!(status = resp.status, "usage report not accepted"),
      Err(e) => debug!(error = %e, "usage report failed"),
    }
    Ok(())
  }

  pub async fn fetch_ad_banners(&self) -> Vec<AdBanner> { self.client.fetch_ad_banners().await }

  /// Remove every license and settings key, as when the application is
  /// uninstalled. Form fields and entries are left alone.
  pub async fn uninstall(&self) -> Result<()> {
    for key in [
      OptionKey::LicenseKey,
      OptionKey::PreviousLicenseKey,
      OptionKey::LicenseStatus,
      OptionKey::LicenseExpiry,
      OptionKey::LicenseExpiryString,
      OptionKey::LastUsageReport,
      OptionKey::RegisteredSiteUrl,
      OptionKey::VerificationSystemActive,
      OptionKey::ShowCityEligibility,
      OptionKey::Backups,
      OptionKey::SuccessMessage,
    ] {
      self.options.delete(key).await?;
    }
    self.options.delete_transient(OptionKey::LastLicenseCheck).await?;
    self.options.clear_license_alert().await?;
    info!("license and settings data removed");
    Ok(())
  }

  // ── Helpers ───────────────────────────────────────────────────────────

  fn check_grant(&self, reply: &VerifyReply, now: DateTime<Utc>) -> GrantCheck {
    let expiry_string = reply.expiry_text();
    let Some(expiry) = parse_expiry(&expiry_string).filter(|e| *e > now) else {
      debug!(expiry = %expiry_string, "invalid or expired date");
      return GrantCheck::Expired;
    };
    let site_url = reply.site_url_text();
    if !site_url.is_empty() && !self.client.is_this_site(&site_url) {
      return GrantCheck::ForeignSite;
    }
    GrantCheck::Granted(Grant { expiry, expiry_string, site_url })
  }

  async fn accept(&self, key: &str, grant: Grant, now: DateTime<Utc>) -> Result<()> {
    self.options.set(OptionKey::LicenseKey, key).await?;
    self.options.delete(OptionKey::PreviousLicenseKey).await?;
    self.options.set_license_status(LicenseStatus::Active).await?;
    self
      .options
      .set(OptionKey::LicenseExpiry, &grant.expiry.timestamp())
      .await?;
    self
      .options
      .set(OptionKey::LicenseExpiryString, &grant.expiry_string)
      .await?;
    self
      .options
      .set(OptionKey::RegisteredSiteUrl, &grant.site_url)
      .await?;
    self.options.clear_license_alert().await?;
    self.stamp_check(now).await?;
    self.report_usage(key, now).await
  }

  async fn stamp_check(&self, now: DateTime<Utc>) -> Result<()> {
    self
      .options
      .set_transient(
        OptionKey::LastLicenseCheck,
        &now.timestamp(),
        Some(Duration::from_secs(CHECK_INTERVAL_SECS as u64)),
      )
      .await?;
    Ok(())
  }
}
