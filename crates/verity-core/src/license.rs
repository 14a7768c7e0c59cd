//! License state as persisted, and the entitlement derived from it.
//!
//! The state machine that mutates these values lives in `verity-license`;
//! everything else only ever sees an [`Entitlements`].

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Cached verdict of the last license check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
  Active,
  #[default]
  Inactive,
}

/// Every stored license field, read in one go.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LicenseState {
  pub key:                 String,
  pub status:              LicenseStatus,
  /// Unix seconds; `0` when unknown.
  pub expiry:              i64,
  /// The expiry exactly as the license server sent it.
  pub expiry_string:       String,
  pub registered_site_url: String,
  /// Unix seconds of the last completed remote check, while still cached.
  pub last_check:          Option<i64>,
  /// Unix seconds of the last successful usage report; `0` when never.
  pub last_usage_report:   i64,
}

impl LicenseState {
  /// `status = active` and not yet past expiry.
  pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
    self.status == LicenseStatus::Active && now.timestamp() < self.expiry
  }

  pub fn expires_at(&self) -> Option<DateTime<Utc>> {
    if self.expiry <= 0 {
      return None;
    }
    Utc.timestamp_opt(self.expiry, 0).single()
  }
}

/// Which tier the current request runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Entitlements {
  pub premium: bool,
}

impl Entitlements {
  pub const FREE: Self = Self { premium: false };
  pub const PREMIUM: Self = Self { premium: true };

  /// Gate for premium-only operations.
  pub fn require_premium(self) -> Result<()> {
    if self.premium { Ok(()) } else { Err(Error::RequiresPremium) }
  }
}
