//! Derived read queries over the unified list.
//!
//! [`ShelterFilter::apply`] is the in-memory implementation. Store backends
//! implement the same filters natively and must return the same records in
//! the same order:
//!
//! | Filter | Match | Order |
//! |--------|-------|-------|
//! | `DisasterKinds` | bitset intersects | id |
//! | `NameContains` / `AddressContains` | ASCII-case-insensitive substring | id |
//! | `MinCapacity` | `capacity >= n` | capacity desc, id |
//! | `Accessible` | `accessible` | id |
//! | `Nearby` | geocoded and haversine ≤ radius | distance asc, id |

use std::cmp::Ordering;

use crate::{
  Error, Result,
  disaster::DisasterKinds,
  geo::{BoundingBox, GeoPoint, Radius},
  shelter::Shelter,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ShelterFilter {
  DisasterKinds(DisasterKinds),
  NameContains(String),
  AddressContains(String),
  MinCapacity(u32),
  Accessible,
  Nearby { center: GeoPoint, radius: Radius },
}

impl ShelterFilter {
  /// Name search; rejects an empty or all-whitespace keyword.
  pub fn name_contains(keyword: &str) -> Result<Self> {
    non_empty(keyword, "name").map(Self::NameContains)
  }

  /// Address search; rejects an empty or all-whitespace keyword.
  pub fn address_contains(keyword: &str) -> Result<Self> {
    non_empty(keyword, "district").map(Self::AddressContains)
  }

  /// Filter `shelters` (assumed to be in id order) in memory.
  pub fn apply(&self, shelters: &[Shelter]) -> Vec<Shelter> {
    match self {
      Self::DisasterKinds(kinds) => shelters
        .iter()
        .filter(|s| s.supported_disasters.intersects(*kinds))
        .cloned()
        .collect(),
      Self::NameContains(needle) => shelters
        .iter()
        .filter(|s| contains_ignore_ascii_case(&s.name, needle))
        .cloned()
        .collect(),
      Self::AddressContains(needle) => shelters
        .iter()
        .filter(|s| contains_ignore_ascii_case(&s.address, needle))
        .cloned()
        .collect(),
      Self::MinCapacity(min) => {
        let mut out: Vec<Shelter> =
          shelters.iter().filter(|s| s.capacity >= *min).cloned().collect();
        sort_by_capacity_desc(&mut out);
        out
      }
      Self::Accessible => shelters.iter().filter(|s| s.accessible).cloned().collect(),
      Self::Nearby { center, radius } => {
        let bbox = BoundingBox::around(*center, *radius);
        let candidates = shelters.iter().filter_map(|s| {
          let point = s.location.point()?;
          bbox
            .contains(point.latitude, point.longitude)
            .then(|| (center.distance_km(&point), s))
        });
        within_radius(candidates, *radius)
      }
    }
  }
}

fn non_empty(keyword: &str, field: &'static str) -> Result<String> {
  let trimmed = keyword.trim();
  if trimmed.is_empty() {
    Err(Error::EmptyKeyword(field))
  } else {
    Ok(trimmed.to_owned())
  }
}

/// Substring match that folds ASCII letters only, mirroring SQLite's
/// built-in `lower()`.
pub fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
  haystack
    .to_ascii_lowercase()
    .contains(&needle.to_ascii_lowercase())
}

/// Capacity descending; ties keep their existing (id) order.
pub fn sort_by_capacity_desc(shelters: &mut [Shelter]) {
  shelters.sort_by(|a, b| b.capacity.cmp(&a.capacity));
}

/// Keep `(distance, shelter)` pairs inside `radius`, nearest first. Ties keep
/// their incoming order.
pub fn within_radius<'a>(
  candidates: impl Iterator<Item = (f64, &'a Shelter)>,
  radius: Radius,
) -> Vec<Shelter> {
  let mut hits: Vec<(f64, &Shelter)> =
    candidates.filter(|(d, _)| *d <= radius.km()).collect();
  hits.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
  hits.into_iter().map(|(_, s)| s.clone()).collect()
}
