//! Handlers under `/api/shelters`.
//!
//! Every list endpoint answers `{ "success": true, "count": n, "data": [...] }`
//! plus an echo of the parameters it was given.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State, rejection::QueryRejection},
};
use serde::Deserialize;
use serde_json::{Value, json};
use shelter_cache::ShelterCache;
use shelter_core::{
  disaster::DisasterKind,
  filter::ShelterFilter,
  geo::{GeoPoint, Radius},
  shelter::Shelter,
  store::ShelterStore,
};

use crate::error::ApiError;

type Cache<S> = State<Arc<ShelterCache<S>>>;

fn list_response(data: Vec<Shelter>, echo: Value) -> Json<Value> {
  let mut body = json!({ "success": true, "count": data.len(), "data": data });
  if let (Some(body), Value::Object(extra)) = (body.as_object_mut(), echo) {
    body.extend(extra);
  }
  Json(body)
}

/// `GET /api/shelters`
pub async fn list<S: ShelterStore>(State(cache): Cache<S>) -> Result<Json<Value>, ApiError> {
  Ok(list_response(cache.get_all().await?, json!({})))
}

#[derive(Debug, Deserialize)]
pub struct DisasterParams {
  #[serde(rename = "type")]
  pub kind: Option<String>,
}

/// `GET /api/shelters/by-disaster?type=Flooding`
pub async fn by_disaster<S: ShelterStore>(
  State(cache): Cache<S>,
  params: Result<Query<DisasterParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
  let Query(params) = params?;
  let kind: DisasterKind = params.kind.ok_or_else(|| ApiError::missing("type"))?.parse()?;

  let data = cache.by_disaster_kinds(kind.bits()).await?;
  Ok(list_response(data, json!({ "disaster_type": kind.as_str() })))
}

#[derive(Debug, Deserialize)]
pub struct DistrictParams {
  pub district: Option<String>,
}

/// `GET /api/shelters/by-district?district=大安區`
pub async fn by_district<S: ShelterStore>(
  State(cache): Cache<S>,
  params: Result<Query<DistrictParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
  let Query(params) = params?;
  let district = params.district.unwrap_or_default();
  let filter = ShelterFilter::address_contains(&district)?;
  let echo = json!({ "district": district.trim() });

  Ok(list_response(cache.filter(&filter).await?, echo))
}

#[derive(Debug, Deserialize)]
pub struct CapacityParams {
  pub min_capacity: Option<u32>,
}

/// `GET /api/shelters/by-capacity?min_capacity=100`
pub async fn by_capacity<S: ShelterStore>(
  State(cache): Cache<S>,
  params: Result<Query<CapacityParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
  let Query(params) = params?;
  let min = params.min_capacity.unwrap_or(0);

  let data = cache.by_min_capacity(min).await?;
  Ok(list_response(data, json!({ "min_capacity": min })))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
  pub name: Option<String>,
}

/// `GET /api/shelters/search?name=國小`
pub async fn search<S: ShelterStore>(
  State(cache): Cache<S>,
  params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
  let Query(params) = params?;
  let keyword = params.name.unwrap_or_default();
  let filter = ShelterFilter::name_contains(&keyword)?;
  let echo = json!({ "keyword": keyword.trim() });

  Ok(list_response(cache.filter(&filter).await?, echo))
}

/// `GET /api/shelters/accessible`
pub async fn accessible<S: ShelterStore>(
  State(cache): Cache<S>,
) -> Result<Json<Value>, ApiError> {
  Ok(list_response(cache.accessible().await?, json!({})))
}

#[derive(Debug, Deserialize)]
pub struct NearbyParams {
  pub latitude:  Option<f64>,
  pub longitude: Option<f64>,
  /// Kilometres; defaults to 5.
  pub radius:    Option<f64>,
}

/// `GET /api/shelters/nearby?latitude=25.03&longitude=121.56[&radius=5]`
pub async fn nearby<S: ShelterStore>(
  State(cache): Cache<S>,
  params: Result<Query<NearbyParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
  let Query(params) = params?;
  let latitude = params.latitude.ok_or_else(|| ApiError::missing("latitude"))?;
  let longitude = params.longitude.ok_or_else(|| ApiError::missing("longitude"))?;
  let center = GeoPoint::new(latitude, longitude)?;
  let radius = match params.radius {
    Some(km) => Radius::new(km)?,
    None => Radius::default(),
  };

  let data = cache.nearby(center, radius).await?;
  let echo = json!({ "search_location": center, "radius_km": radius });
  Ok(list_response(data, echo))
}

/// `GET /api/shelters/statistics`
pub async fn statistics<S: ShelterStore>(
  State(cache): Cache<S>,
) -> Result<Json<Value>, ApiError> {
  let stats = cache.statistics().await?;
  Ok(Json(json!({ "success": true, "data": stats })))
}
