//! Error types for `verity-core`.
//!
//! Variants fall into two groups. User-facing rejections (validation, tier,
//! unknown ids, bad backup files) carry the exact message shown on the page
//! and never leave partial state behind. Infrastructure failures (`Store`,
//! `Serialization`) are reported as server errors.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// One or more submitted values were rejected; nothing was written.
  #[error("{}", .0.join(" "))]
  Validation(Vec<String>),

  #[error("Requires Premium")]
  RequiresPremium,

  #[error(
    "Free version limit reached ({limit} entries). Upgrade to premium for unlimited entries."
  )]
  EntryLimitReached { limit: usize },

  #[error("Invalid entry ID.")]
  EntryNotFound(Uuid),

  #[error("Invalid city ID.")]
  CityNotFound(Uuid),

  #[error("Invalid backup ID.")]
  BackupNotFound(Uuid),

  #[error("No entries available to backup.")]
  NothingToBackUp,

  #[error("Invalid backup file format.")]
  InvalidBackup,

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Shorthand for a single-message validation failure.
  pub fn invalid(message: impl Into<String>) -> Self {
    Self::Validation(vec![message.into()])
  }

  /// `true` when the error is a rejection meant to be shown to the user
  /// rather than an infrastructure failure.
  pub fn is_user_facing(&self) -> bool {
    !matches!(
      self,
      Self::Store(_) | Self::Serialization(_)
    )
  }

  /// The individual messages to render, one notice each.
  pub fn messages(&self) -> Vec<String> {
    match self {
      Self::Validation(messages) => messages.clone(),
      other => vec![other.to_string()],
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
