//! Great-circle distance and the bounding-box pre-filter.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometres per degree of latitude used by the bounding box.
const KM_PER_DEGREE: f64 = 111.0;

/// Extra slack on the bounding box so it always encloses the circle.
const BOX_MARGIN: f64 = 1.01;

/// Largest radius accepted by [`Radius::new`].
pub const MAX_RADIUS_KM: f64 = 100.0;

/// Radius used by `nearby` when the caller supplies none.
pub const DEFAULT_RADIUS_KM: f64 = 5.0;

// ─── GeoPoint ────────────────────────────────────────────────────────────────

/// A validated WGS-84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
  pub latitude:  f64,
  pub longitude: f64,
}

impl GeoPoint {
  /// Validate latitude ∈ [-90, 90] and longitude ∈ [-180, 180].
  pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
    if !(-90.0..=90.0).contains(&latitude) {
      return Err(Error::LatitudeOutOfRange(latitude));
    }
    if !(-180.0..=180.0).contains(&longitude) {
      return Err(Error::LongitudeOutOfRange(longitude));
    }
    Ok(Self { latitude, longitude })
  }

  /// Haversine distance to `other` in kilometres.
  pub fn distance_km(&self, other: &GeoPoint) -> f64 {
    haversine_km(self.latitude, self.longitude, other.latitude, other.longitude)
  }
}

pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
  let d_lat = (lat2 - lat1).to_radians();
  let d_lon = (lon2 - lon1).to_radians();

  let a = (d_lat / 2.0).sin().powi(2)
    + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
  let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

  EARTH_RADIUS_KM * c
}

// ─── Radius ──────────────────────────────────────────────────────────────────

/// A search radius in kilometres, validated to lie in (0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Radius(f64);

impl Radius {
  pub fn new(km: f64) -> Result<Self> {
    if km > 0.0 && km <= MAX_RADIUS_KM {
      Ok(Self(km))
    } else {
      Err(Error::RadiusOutOfRange { got: km, max: MAX_RADIUS_KM })
    }
  }

  /// Skip validation. Internal callers (tests, equivalence checks) only.
  pub fn unchecked(km: f64) -> Self { Self(km) }

  pub fn km(self) -> f64 { self.0 }
}

impl Default for Radius {
  fn default() -> Self { Self(DEFAULT_RADIUS_KM) }
}

// ─── BoundingBox ─────────────────────────────────────────────────────────────

/// Rectangular pre-filter around a circle. Only ever a superset of the
/// circle; callers still apply the exact haversine check afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
  pub min_lat: f64,
  pub max_lat: f64,
  /// `None` when the box spans every longitude (near a pole or across the
  /// antimeridian).
  pub lon:     Option<(f64, f64)>,
}

impl BoundingBox {
  pub fn around(center: GeoPoint, radius: Radius) -> Self {
    let lat_delta = radius.km() / KM_PER_DEGREE * BOX_MARGIN;
    let min_lat = center.latitude - lat_delta;
    let max_lat = center.latitude + lat_delta;

    // Longitude degrees shrink toward the poles, so size the box with the
    // pole-ward edge rather than the centre.
    let edge_lat = center.latitude.abs() + lat_delta;
    let lon = if edge_lat >= 89.0 {
      None
    } else {
      let lon_delta =
        radius.km() / (KM_PER_DEGREE * edge_lat.to_radians().cos()) * BOX_MARGIN;
      let (min_lon, max_lon) = (center.longitude - lon_delta, center.longitude + lon_delta);
      if min_lon < -180.0 || max_lon > 180.0 {
        None
      } else {
        Some((min_lon, max_lon))
      }
    };

    Self { min_lat, max_lat, lon }
  }

  pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
    if latitude < self.min_lat || latitude > self.max_lat {
      return false;
    }
    match self.lon {
      Some((min, max)) => longitude >= min && longitude <= max,
      None => true,
    }
  }
}
