//! License validation against the remote license server.
//!
//! [`LicenseClient`] speaks the server's form-encoded POST protocol;
//! [`LicenseManager`] owns the stored license state and turns it into an
//! [`verity_core::Entitlements`] for each request.

pub mod banner;
pub mod client;
pub mod error;
pub mod manager;
pub mod reply;

pub use banner::AdBanner;
pub use client::LicenseClient;
pub use error::{Error, Result};
pub use manager::LicenseManager;
