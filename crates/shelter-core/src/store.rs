//! The `ShelterStore` trait and the freshness metadata it keeps.
//!
//! The trait is implemented by storage backends (e.g. `shelter-store-sqlite`).
//! The cache layer depends on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  filter::ShelterFilter,
  shelter::{NewShelter, Shelter},
};

// ─── Metadata ────────────────────────────────────────────────────────────────

/// One row per named cache. Created by the first `replace_all`, overwritten
/// by every later one, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
  pub cache_key:    String,
  pub last_updated: DateTime<Utc>,
  pub record_count: u64,
  pub notes:        Option<String>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Durable table of unified shelters plus its metadata row.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ShelterStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Atomically delete every shelter, insert `shelters` with fresh ids, and
  /// upsert the metadata row. On failure nothing changes.
  ///
  /// Returns the inserted shelters, in input order, with their ids.
  fn replace_all(
    &self,
    shelters: Vec<NewShelter>,
  ) -> impl Future<Output = Result<Vec<Shelter>, Self::Error>> + Send + '_;

  /// Every stored shelter, in id order.
  fn all(&self) -> impl Future<Output = Result<Vec<Shelter>, Self::Error>> + Send + '_;

  /// `true` if at least one shelter is stored.
  fn has_data(&self) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn count(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// The metadata row for this store's cache key, if a replace ever ran.
  fn metadata(
    &self,
  ) -> impl Future<Output = Result<Option<CacheMetadata>, Self::Error>> + Send + '_;

  /// Run a derived query natively. Must agree with
  /// [`ShelterFilter::apply`] on every dataset.
  fn filter<'a>(
    &'a self,
    filter: &'a ShelterFilter,
  ) -> impl Future<Output = Result<Vec<Shelter>, Self::Error>> + Send + 'a;
}
