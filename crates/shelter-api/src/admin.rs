//! Handlers under `/api/admin`: cache inspection and maintenance.

use std::sync::Arc;

use axum::{Json, extract::State};
use chrono::Utc;
use serde_json::{Value, json};
use shelter_cache::{CacheInfo, ShelterCache};
use shelter_core::{shelter::Shelter, store::ShelterStore};
use tokio::time::Instant;

use crate::error::ApiError;

type Cache<S> = State<Arc<ShelterCache<S>>>;

fn round_to(value: f64, places: i32) -> f64 {
  let scale = 10f64.powi(places);
  (value * scale).round() / scale
}

fn age_hours(info: &CacheInfo, places: i32) -> Option<f64> {
  info.age_hours().map(|h| round_to(h, places))
}

/// Natural-disaster vs air-raid split of a freshly refreshed list.
fn by_type(shelters: &[Shelter]) -> Value {
  let air_raid = shelters.iter().filter(|s| s.is_air_raid()).count();
  json!({
    "natural_disaster": shelters.len() - air_raid,
    "air_raid": air_raid,
  })
}

/// `GET /api/admin/cache-status`
pub async fn cache_status<S: ShelterStore>(
  State(cache): Cache<S>,
) -> Result<Json<Value>, ApiError> {
  let info = cache.info().await?;
  Ok(Json(json!({
    "success": true,
    "data": {
      "database_cache": {
        "enabled": info.has_database_cache,
        "record_count": info.record_count,
        "last_updated": info.last_updated,
        "age_hours": info.age_hours(),
        "notes": info.notes,
      },
      "memory_cache": {
        "enabled": info.has_memory_cache,
        "duration_minutes": info.memory_ttl_minutes,
      },
      "timestamp": Utc::now(),
    }
  })))
}

/// `POST /api/admin/refresh-cache`
pub async fn refresh_cache<S: ShelterStore>(
  State(cache): Cache<S>,
) -> Result<Json<Value>, ApiError> {
  tracing::info!("cache refresh requested");
  let started = Instant::now();
  let shelters = cache.refresh().await?;
  let seconds = started.elapsed().as_secs_f64();

  Ok(Json(json!({
    "success": true,
    "message": "cache refreshed",
    "data": {
      "total_shelters": shelters.len(),
      "refresh_duration_seconds": round_to(seconds, 2),
      "timestamp": Utc::now(),
      "shelters_by_type": by_type(&shelters),
    }
  })))
}

/// `DELETE /api/admin/clear-cache`
pub async fn clear_cache<S: ShelterStore>(
  State(cache): Cache<S>,
) -> Result<Json<Value>, ApiError> {
  cache.clear_all().await?;
  Ok(Json(json!({
    "success": true,
    "message": "all caches cleared",
    "timestamp": Utc::now(),
  })))
}

/// `POST /api/admin/full-update`: clear, then refetch.
pub async fn full_update<S: ShelterStore>(
  State(cache): Cache<S>,
) -> Result<Json<Value>, ApiError> {
  tracing::info!("full update requested");
  let started = Instant::now();
  cache.clear_all().await?;
  let shelters = cache.refresh().await?;
  let seconds = started.elapsed().as_secs_f64();

  let total_capacity: u64 = shelters.iter().map(|s| u64::from(s.capacity)).sum();
  let average_capacity = total_capacity.checked_div(shelters.len() as u64).unwrap_or(0);
  let mut details = by_type(&shelters);
  if let Some(details) = details.as_object_mut() {
    details.insert(
      "with_accessibility".into(),
      json!(shelters.iter().filter(|s| s.accessible).count()),
    );
    details.insert("total_capacity".into(), json!(total_capacity));
    details.insert("average_capacity".into(), json!(average_capacity));
  }

  Ok(Json(json!({
    "success": true,
    "message": "full update complete",
    "data": {
      "total_shelters": shelters.len(),
      "update_duration_seconds": round_to(seconds, 2),
      "timestamp": Utc::now(),
      "details": details,
    }
  })))
}

/// `GET /api/admin/health`
pub async fn health<S: ShelterStore>(State(cache): Cache<S>) -> Result<Json<Value>, ApiError> {
  let info = cache.info().await?;
  let healthy = info.has_database_cache && info.record_count > 0;

  let mut warnings = Vec::new();
  if info.is_stale {
    let hours = cache.config().stale_after.as_secs() / 3600;
    warnings.push(format!("cache data is older than {hours} hours; a refresh is recommended"));
  }

  Ok(Json(json!({
    "success": true,
    "healthy": healthy,
    "data": {
      "status": if healthy { "healthy" } else { "unhealthy" },
      "warnings": warnings,
      "cache": {
        "record_count": info.record_count,
        "age_hours": age_hours(&info, 2),
        "last_updated": info.last_updated,
      },
      "timestamp": Utc::now(),
    }
  })))
}

/// `GET /api/admin/cache-statistics`
pub async fn cache_statistics<S: ShelterStore>(
  State(cache): Cache<S>,
) -> Result<Json<Value>, ApiError> {
  let stats = cache.statistics().await?;
  let info = cache.info().await?;

  Ok(Json(json!({
    "success": true,
    "data": {
      "cache": {
        "total_records": info.record_count,
        "last_updated": info.last_updated,
        "age_hours": age_hours(&info, 1),
      },
      "shelters": stats,
      "timestamp": Utc::now(),
    }
  })))
}
