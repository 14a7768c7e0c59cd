//! Error type for `verity-license`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("Please enter a license key.")]
  MissingKey,

  /// Activation was refused or could not be completed; the message is shown
  /// to the administrator as-is.
  #[error("{0}")]
  Rejected(String),

  #[error("http client error: {0}")]
  Client(#[from] reqwest::Error),

  #[error(transparent)]
  Core(#[from] verity_core::Error),
}

impl Error {
  pub fn is_user_facing(&self) -> bool {
    match self {
      Self::MissingKey | Self::Rejected(_) => true,
      Self::Client(_) => false,
      Self::Core(e) => e.is_user_facing(),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
