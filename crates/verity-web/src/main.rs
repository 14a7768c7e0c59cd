//! `server`: the Verity HTTP server.
//!
//! Settings come from a TOML file (`--config`, default `config.toml`, may be
//! absent) overlaid with `VERITY_*` environment variables, e.g.
//! `VERITY_PORT=9000`. See `config.example.toml` for every key.
//!
//! `auth_password_hash` is an argon2 PHC string; print one with
//!
//! ```text
//! server --hash-password
//! ```

use std::{
  io::{self, BufRead as _, Write as _},
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::{Context as _, anyhow};
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;
use verity_store_sqlite::SqliteStore;
use verity_web::{AppState, ServerConfig};

#[derive(Parser)]
#[command(author, version, about = "Verity license verification server")]
struct Cli {
  /// TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Read a password from stdin, print its argon2 hash and exit.
  #[arg(long, conflicts_with = "uninstall")]
  hash_password: bool,

  /// Delete the stored license and settings keys, then exit. Entries and
  /// the form schema survive.
  #[arg(long)]
  uninstall: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let filter = EnvFilter::builder()
    .with_default_directive(LevelFilter::INFO.into())
    .from_env_lossy();
  tracing_subscriber::fmt().with_env_filter(filter).init();

  let cli = Cli::parse();
  if cli.hash_password {
    println!("{}", hash_password(&prompt_password()?)?);
    return Ok(());
  }

  let config = load_config(&cli.config)?;
  let state = open_state(config).await?;

  if cli.uninstall {
    state.license.uninstall().await.context("uninstall failed")?;
    return Ok(());
  }

  if state.schema.install_defaults_if_missing().await? {
    info!("first start: default form installed");
  }
  serve(state).await
}

fn load_config(path: &Path) -> anyhow::Result<ServerConfig> {
  let mut config: ServerConfig = config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("VERITY"))
    .build()
    .and_then(|c| c.try_deserialize())
    .with_context(|| format!("invalid configuration in {}", path.display()))?;

  config.store_path = home_relative(&config.store_path);
  config.upload_dir = home_relative(&config.upload_dir);
  Ok(config)
}

/// Open the store and the upload directory, then wire everything together.
async fn open_state(config: ServerConfig) -> anyhow::Result<AppState<SqliteStore>> {
  let store = SqliteStore::open(&config.store_path)
    .await
    .with_context(|| format!("cannot open store {}", config.store_path.display()))?;
  tokio::fs::create_dir_all(&config.upload_dir)
    .await
    .with_context(|| format!("cannot create upload dir {}", config.upload_dir.display()))?;

  Ok(AppState::new(Arc::new(store), config)?)
}

async fn serve(state: AppState<SqliteStore>) -> anyhow::Result<()> {
  let address = format!("{}:{}", state.config.host, state.config.port);
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("cannot listen on {address}"))?;
  info!(site_url = %state.config.site_url, "serving on http://{address}");

  axum::serve(listener, verity_web::router(state))
    .await
    .context("server stopped")
}

fn hash_password(password: &str) -> anyhow::Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| anyhow!("argon2: {e}"))
}

fn prompt_password() -> anyhow::Result<String> {
  eprint!("Password: ");
  io::stderr().flush()?;
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_owned())
}

/// `~/x` → `$HOME/x`; anything else is returned as given.
fn home_relative(path: &Path) -> PathBuf {
  match (path.strip_prefix("~"), std::env::var_os("HOME")) {
    (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
    _ => path.to_path_buf(),
  }
}
