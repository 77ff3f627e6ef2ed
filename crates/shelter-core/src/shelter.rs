//! The unified shelter record every upstream feed is normalised into.

use serde::{Deserialize, Serialize};

use crate::{disaster::DisasterKinds, geo::GeoPoint};

/// Name given to a shelter whose upstream record has none.
pub const UNNAMED_SHELTER: &str = "未命名收容所";

/// Address given to a shelter whose upstream record has none.
pub const UNKNOWN_ADDRESS: &str = "未知";

/// Category label of air-raid shelters when the feed supplies none.
pub const AIR_RAID_CATEGORY: &str = "防空避難所";

// ─── Location ────────────────────────────────────────────────────────────────

/// Where a shelter is, if anyone has geocoded it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Location {
  Geocoded { latitude: f64, longitude: f64 },
  /// The source has no coordinates for this shelter.
  Ungeocoded,
}

impl Location {
  /// Map raw upstream coordinates. `(0, 0)` and non-finite values are the
  /// sources' way of saying "unknown".
  pub fn from_coordinates(latitude: f64, longitude: f64) -> Self {
    if !latitude.is_finite() || !longitude.is_finite() {
      return Self::Ungeocoded;
    }
    if latitude == 0.0 && longitude == 0.0 {
      return Self::Ungeocoded;
    }
    Self::Geocoded { latitude, longitude }
  }

  pub fn point(&self) -> Option<GeoPoint> {
    match *self {
      Self::Geocoded { latitude, longitude } => Some(GeoPoint { latitude, longitude }),
      Self::Ungeocoded => None,
    }
  }

  pub fn is_geocoded(&self) -> bool { matches!(self, Self::Geocoded { .. }) }
}

// ─── Shelter ─────────────────────────────────────────────────────────────────

/// A shelter as held by both cache tiers.
///
/// `id` is assigned by the store on every full replace and carries no
/// meaning across refreshes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shelter {
  pub id:                  i64,
  pub category:            Option<String>,
  pub name:                String,
  pub capacity:            u32,
  /// Simulated display value; never persisted. `None` on everything read
  /// straight out of a cache tier.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub current_occupancy:   Option<u32>,
  pub supported_disasters: DisasterKinds,
  pub accessible:          bool,
  pub address:             String,
  pub location:            Location,
  pub phone:               Option<String>,
  pub floor_area_sqm:      u32,
}

impl Shelter {
  pub fn is_air_raid(&self) -> bool {
    self.supported_disasters.contains(DisasterKinds::AIR_RAID)
  }
}

// ─── NewShelter ──────────────────────────────────────────────────────────────

/// A shelter produced by a source, before the store has assigned an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewShelter {
  pub category:            Option<String>,
  pub name:                String,
  pub capacity:            u32,
  pub supported_disasters: DisasterKinds,
  pub accessible:          bool,
  pub address:             String,
  pub location:            Location,
  pub phone:               Option<String>,
  pub floor_area_sqm:      u32,
}

impl NewShelter {
  /// Convenience constructor: ungeocoded, no disasters, everything else
  /// empty. Blank `name`/`address` fall back to the placeholders.
  pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
    Self {
      category:            None,
      name:                non_blank_or(name.into(), UNNAMED_SHELTER),
      capacity:            0,
      supported_disasters: DisasterKinds::NONE,
      accessible:          false,
      address:             non_blank_or(address.into(), UNKNOWN_ADDRESS),
      location:            Location::Ungeocoded,
      phone:               None,
      floor_area_sqm:      0,
    }
  }

  /// Attach the store-assigned identity.
  pub fn with_id(self, id: i64) -> Shelter {
    Shelter {
      id,
      category: self.category,
      name: self.name,
      capacity: self.capacity,
      current_occupancy: None,
      supported_disasters: self.supported_disasters,
      accessible: self.accessible,
      address: self.address,
      location: self.location,
      phone: self.phone,
      floor_area_sqm: self.floor_area_sqm,
    }
  }
}

fn non_blank_or(value: String, fallback: &str) -> String {
  if value.trim().is_empty() { fallback.to_owned() } else { value }
}
