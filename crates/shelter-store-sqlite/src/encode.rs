//! Encoding and decoding helpers between domain types and the plain values
//! stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings. Locations are stored as a pair
//! of nullable REAL columns; NULL means ungeocoded.

use chrono::{DateTime, Utc};
use shelter_core::{
  disaster::DisasterKinds,
  shelter::{Location, NewShelter, Shelter},
  store::CacheMetadata,
};

use crate::{Error, Result};

/// Column list shared by every `SELECT` over `shelters`; [`read_shelter`]
/// relies on this order.
pub const SHELTER_COLUMNS: &str = "id, category, name, capacity, supported_disasters, \
   accessible, address, latitude, longitude, phone, floor_area_sqm";

// ─── DateTime<Utc>
// ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Location ────────────────────────────────────────────────────────────────

pub fn encode_location(location: &Location) -> (Option<f64>, Option<f64>) {
  match *location {
    Location::Geocoded { latitude, longitude } => (Some(latitude), Some(longitude)),
    Location::Ungeocoded => (None, None),
  }
}

pub fn decode_location(latitude: Option<f64>, longitude: Option<f64>) -> Location {
  match (latitude, longitude) {
    (Some(lat), Some(lon)) => Location::from_coordinates(lat, lon),
    _ => Location::Ungeocoded,
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Owned column values for one `INSERT`, built on the async side so the
/// database closure is `'static`.
pub struct ShelterRow {
  pub category:            Option<String>,
  pub name:                String,
  pub capacity:            i64,
  pub supported_disasters: i64,
  pub accessible:          bool,
  pub address:             String,
  pub latitude:            Option<f64>,
  pub longitude:           Option<f64>,
  pub phone:               Option<String>,
  pub floor_area_sqm:      i64,
}

impl From<&NewShelter> for ShelterRow {
  fn from(s: &NewShelter) -> Self {
    let (latitude, longitude) = encode_location(&s.location);
    Self {
      category: s.category.clone(),
      name: s.name.clone(),
      capacity: i64::from(s.capacity),
      supported_disasters: i64::from(s.supported_disasters.bits()),
      accessible: s.accessible,
      address: s.address.clone(),
      latitude,
      longitude,
      phone: s.phone.clone(),
      floor_area_sqm: i64::from(s.floor_area_sqm),
    }
  }
}

/// Raw values read directly from a `shelters` row.
pub struct RawShelter {
  pub id:                  i64,
  pub category:            Option<String>,
  pub name:                String,
  pub capacity:            i64,
  pub supported_disasters: i64,
  pub accessible:          bool,
  pub address:             String,
  pub latitude:            Option<f64>,
  pub longitude:           Option<f64>,
  pub phone:               Option<String>,
  pub floor_area_sqm:      i64,
}

/// Map a row selected with [`SHELTER_COLUMNS`].
pub fn read_shelter(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawShelter> {
  Ok(RawShelter {
    id:                  row.get(0)?,
    category:            row.get(1)?,
    name:                row.get(2)?,
    capacity:            row.get(3)?,
    supported_disasters: row.get(4)?,
    accessible:          row.get(5)?,
    address:             row.get(6)?,
    latitude:            row.get(7)?,
    longitude:           row.get(8)?,
    phone:               row.get(9)?,
    floor_area_sqm:      row.get(10)?,
  })
}

impl RawShelter {
  pub fn into_shelter(self) -> Result<Shelter> {
    let id = self.id;
    let capacity = decode_u32(id, "capacity", self.capacity)?;
    let floor_area_sqm = decode_u32(id, "floor_area_sqm", self.floor_area_sqm)?;
    let bits = u8::try_from(self.supported_disasters).map_err(|_| Error::InvalidColumn {
      id,
      column: "supported_disasters",
      value: self.supported_disasters.to_string(),
    })?;

    Ok(Shelter {
      id,
      category: self.category,
      name: self.name,
      capacity,
      current_occupancy: None,
      supported_disasters: DisasterKinds::from_bits_truncate(bits),
      accessible: self.accessible,
      address: self.address,
      location: decode_location(self.latitude, self.longitude),
      phone: self.phone,
      floor_area_sqm,
    })
  }
}

fn decode_u32(id: i64, column: &'static str, value: i64) -> Result<u32> {
  u32::try_from(value).map_err(|_| Error::InvalidColumn {
    id,
    column,
    value: value.to_string(),
  })
}

/// Raw strings read directly from a `cache_metadata` row.
pub struct RawMetadata {
  pub cache_key:    String,
  pub last_updated: String,
  pub record_count: i64,
  pub notes:        Option<String>,
}

impl RawMetadata {
  pub fn into_metadata(self) -> Result<CacheMetadata> {
    Ok(CacheMetadata {
      cache_key:    self.cache_key,
      last_updated: decode_dt(&self.last_updated)?,
      record_count: self.record_count.max(0) as u64,
      notes:        self.notes,
    })
  }
}
