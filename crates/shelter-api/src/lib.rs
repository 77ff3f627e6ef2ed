//! JSON HTTP surface for the shelter cache.
//!
//! Exposes an axum [`Router`] over a shared [`ShelterCache`]. Building the
//! cache (store, sources, configuration) is the binary's job.

pub mod admin;
pub mod config;
pub mod error;
pub mod shelters;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post},
};
use shelter_cache::ShelterCache;
use shelter_core::store::ShelterStore;
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;
pub use error::ApiError;

/// Build the full router for `cache`.
pub fn router<S>(cache: Arc<ShelterCache<S>>) -> Router
where
  S: ShelterStore + 'static,
{
  Router::new()
    // Queries
    .route("/api/shelters", get(shelters::list::<S>))
    .route("/api/shelters/by-disaster", get(shelters::by_disaster::<S>))
    .route("/api/shelters/by-district", get(shelters::by_district::<S>))
    .route("/api/shelters/by-capacity", get(shelters::by_capacity::<S>))
    .route("/api/shelters/search", get(shelters::search::<S>))
    .route("/api/shelters/accessible", get(shelters::accessible::<S>))
    .route("/api/shelters/nearby", get(shelters::nearby::<S>))
    .route("/api/shelters/statistics", get(shelters::statistics::<S>))
    // Admin
    .route("/api/admin/cache-status", get(admin::cache_status::<S>))
    .route("/api/admin/refresh-cache", post(admin::refresh_cache::<S>))
    .route("/api/admin/clear-cache", delete(admin::clear_cache::<S>))
    .route("/api/admin/full-update", post(admin::full_update::<S>))
    .route("/api/admin/health", get(admin::health::<S>))
    .route("/api/admin/cache-statistics", get(admin::cache_statistics::<S>))
    .with_state(cache)
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ────────────────────────────────────────────────────────
