//! HTTP layer for Verity.
//!
//! Exposes an axum [`Router`] with the Basic-auth protected admin pages, the
//! public lookup widget and the upload file server, backed by any
//! [`OptionStore`].

pub mod auth;
pub mod error;
pub mod form;
pub mod handlers;
pub mod html;
pub mod uploads;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{Router, extract::DefaultBodyLimit, routing::get};
use serde::Deserialize;
use tower_http::{services::ServeDir, trace::TraceLayer};
use verity_core::{
  OptionStore, Options, backup::BackupManager, city::CityGate, entry::EntryStore,
  schema::SchemaManager, settings::SettingsManager, verify::Verifier,
};
use verity_license::{LicenseClient, LicenseManager};

use auth::AuthConfig;
use handlers::{credits, entries, form_builder, license, settings, verify};
use uploads::DiskUploads;

/// Largest accepted request body; uploads and backup files included.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  /// Canonical public URL of this installation, no trailing slash needed.
  pub site_url:           String,
  pub store_path:         PathBuf,
  pub upload_dir:         PathBuf,
  pub license_api_url:    String,
  #[serde(default = "default_free_entry_limit")]
  pub free_entry_limit:   usize,
  /// Fetch and show promotional banners on free installs.
  #[serde(default = "default_ad_banners")]
  pub ad_banners:         bool,
  pub auth_username:      String,
  pub auth_password_hash: String,
}

fn default_free_entry_limit() -> usize { verity_core::entry::DEFAULT_FREE_ENTRY_LIMIT }

fn default_ad_banners() -> bool { true }

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: OptionStore> {
  pub options:  Options<S>,
  pub license:  LicenseManager<S>,
  pub schema:   SchemaManager<S>,
  pub entries:  EntryStore<S, DiskUploads>,
  pub cities:   CityGate<S>,
  pub backups:  BackupManager<S>,
  pub settings: SettingsManager<S>,
  pub verifier: Verifier<S>,
  pub config:   Arc<ServerConfig>,
  pub auth:     Arc<AuthConfig>,
}

impl<S: OptionStore> AppState<S> {
  /// Wire every component to `store` according to `config`.
  pub fn new(store: Arc<S>, config: ServerConfig) -> Result<Self, Error> {
    let options = Options::new(store);
    let client = LicenseClient::new(&config.license_api_url, &config.site_url)?;
    let uploads = Arc::new(DiskUploads::new(&config.upload_dir, &config.site_url));

    Ok(Self {
      license: LicenseManager::new(options.clone(), client),
      schema: SchemaManager::new(options.clone()),
      entries: EntryStore::new(options.clone(), uploads, config.free_entry_limit),
      cities: CityGate::new(options.clone()),
      backups: BackupManager::new(options.clone()),
      settings: SettingsManager::new(options.clone()),
      verifier: Verifier::new(options.clone()),
      options,
      auth: Arc::new(AuthConfig {
        username:      config.auth_username.clone(),
        password_hash: config.auth_password_hash.clone(),
      }),
      config: Arc::new(config),
    })
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the whole application.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: OptionStore + Clone + 'static,
{
  let uploads = ServeDir::new(&state.config.upload_dir);

  Router::new()
    .route("/admin/entries",      get(entries::page::<S>).post(entries::submit::<S>))
    .route("/admin/form-builder", get(form_builder::page::<S>).post(form_builder::submit::<S>))
    .route("/admin/settings",     get(settings::page::<S>).post(settings::submit::<S>))
    .route("/admin/license",      get(license::page::<S>).post(license::submit::<S>))
    .route("/admin/credits",      get(credits::credits::<S>))
    .route("/admin/upgrade",      get(credits::upgrade::<S>))
    .route("/verify",             get(verify::page::<S>).post(verify::submit::<S>))
    .nest_service("/uploads", uploads)
    .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
