//! Core types and managers for Verity.
//!
//! This crate is deliberately free of HTTP and database dependencies. All
//! persistent state goes through the [`options::OptionStore`] trait; uploaded
//! files go through [`upload::UploadStore`]. Storage backends and the web
//! layer live in their own crates.

pub mod backup;
pub mod city;
pub mod entry;
pub mod error;
pub mod license;
pub mod memory;
pub mod options;
pub mod sanitize;
pub mod schema;
pub mod settings;
pub mod upload;
pub mod verify;

pub use error::{Error, Result};
pub use license::Entitlements;
pub use options::{OptionKey, OptionStore, Options};
