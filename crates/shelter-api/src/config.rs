//! Runtime configuration, deserialised from `config.toml` and `SHELTER_*`
//! environment variables. Every field has a default.

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;
use shelter_cache::CacheConfig;

pub const DEFAULT_NATURAL_DISASTER_URL: &str = "https://data.taipei/api/v1/dataset/4c92dbd4-d259-495a-8390-52628119a4dd?scope=resourceAquire&limit=1000";

pub const DEFAULT_AIR_RAID_URL: &str = "https://www.google.com/maps/d/u/0/kml?mid=1kXkkEoggmJqoYFk-jdxinZtOzne4CrNK&resourcekey&forcekml=1";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  /// SQLite file; a leading `~/` is expanded.
  pub store_path: PathBuf,
  pub cache:      CacheSettings,
  pub sources:    SourceSettings,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       "0.0.0.0".to_owned(),
      port:       8080,
      store_path: PathBuf::from("shelters.db"),
      cache:      CacheSettings::default(),
      sources:    SourceSettings::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
  pub memory_ttl_minutes: u64,
  pub stale_after_hours:  u64,
  pub simulate_occupancy: bool,
  pub fetch_timeout_secs: u64,
  /// Key of the metadata row in the store.
  pub cache_key:          String,
}

impl Default for CacheSettings {
  fn default() -> Self {
    Self {
      memory_ttl_minutes: 5,
      stale_after_hours:  24,
      simulate_occupancy: true,
      fetch_timeout_secs: 30,
      cache_key:          shelter_store_sqlite::DEFAULT_CACHE_KEY.to_owned(),
    }
  }
}

impl CacheSettings {
  pub fn fetch_timeout(&self) -> Duration { Duration::from_secs(self.fetch_timeout_secs) }

  pub fn cache_config(&self) -> CacheConfig {
    CacheConfig {
      memory_ttl:         Duration::from_secs(self.memory_ttl_minutes * 60),
      stale_after:        Duration::from_secs(self.stale_after_hours * 60 * 60),
      simulate_occupancy: self.simulate_occupancy,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
  pub natural_disaster_url: String,
  pub air_raid_url:         String,
}

impl Default for SourceSettings {
  fn default() -> Self {
    Self {
      natural_disaster_url: DEFAULT_NATURAL_DISASTER_URL.to_owned(),
      air_raid_url:         DEFAULT_AIR_RAID_URL.to_owned(),
    }
  }
}
