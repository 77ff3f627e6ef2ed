//! Shelter cache server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), layers
//! `SHELTER_*` environment variables on top, opens the SQLite store, and
//! serves the JSON API over HTTP.
//!
//! Nested keys use a double underscore, e.g.
//! `SHELTER_CACHE__MEMORY_TTL_MINUTES=10`.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use shelter_api::ServerConfig;
use shelter_cache::{ShelterCache, Unifier};
use shelter_core::source::ShelterSource;
use shelter_sources::{AirRaidSource, HttpFetcher, NaturalDisasterSource};
use shelter_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Shelter data cache server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Populate the cache before accepting requests.
  #[arg(long)]
  warm: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("SHELTER")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?
    .with_cache_key(server_cfg.cache.cache_key.clone());
  tracing::info!(path = ?store_path, cache_key = store.cache_key(), "opened shelter store");

  let http = HttpFetcher::new(server_cfg.cache.fetch_timeout())
    .context("failed to build HTTP client")?;
  let sources: Vec<Arc<dyn ShelterSource>> = vec![
    Arc::new(NaturalDisasterSource::new(
      http.clone(),
      server_cfg.sources.natural_disaster_url.clone(),
    )),
    Arc::new(AirRaidSource::new(http, server_cfg.sources.air_raid_url.clone())),
  ];
  let unifier = Unifier::new(sources, server_cfg.cache.fetch_timeout());
  let cache = Arc::new(ShelterCache::new(store, unifier, server_cfg.cache.cache_config()));

  if cli.warm {
    match cache.get_all().await {
      Ok(shelters) => tracing::info!(count = shelters.len(), "cache warmed"),
      // Not fatal: the first request retries.
      Err(e) => tracing::warn!(error = %e, "warm-up failed"),
    }
  }

  let app = shelter_api::router(cache);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
