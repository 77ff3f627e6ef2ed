//! Aggregate statistics over the unified list.

use serde::Serialize;

use crate::{disaster::DisasterKinds, shelter::Shelter};

/// Totals for one family of shelters (natural-disaster or air-raid).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryStatistics {
  pub total_count:      u64,
  pub total_capacity:   u64,
  /// Integer mean; 0 when the family is empty.
  pub average_capacity: u64,
  pub accessible_count: u64,
}

impl CategoryStatistics {
  fn tally<'a>(shelters: impl Iterator<Item = &'a Shelter>) -> Self {
    let mut stats = Self::default();
    for s in shelters {
      stats.total_count += 1;
      stats.total_capacity += u64::from(s.capacity);
      if s.accessible {
        stats.accessible_count += 1;
      }
    }
    if stats.total_count > 0 {
      stats.average_capacity = stats.total_capacity / stats.total_count;
    }
    stats
  }
}

/// How many shelters are rated for each hazard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisasterSupportStatistics {
  pub flooding:   u64,
  pub earthquake: u64,
  pub landslide:  u64,
  pub tsunami:    u64,
  pub air_raid:   u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShelterStatistics {
  pub total_shelters:   u64,
  pub total_capacity:   u64,
  pub natural_disaster: CategoryStatistics,
  pub air_raid:         CategoryStatistics,
  pub disaster_support: DisasterSupportStatistics,
  pub largest_shelter:  Option<Shelter>,
  /// Smallest shelter with a non-zero capacity.
  pub smallest_shelter: Option<Shelter>,
}

impl ShelterStatistics {
  pub fn compute(shelters: &[Shelter]) -> Self {
    let count_with = |kind: DisasterKinds| {
      shelters
        .iter()
        .filter(|s| s.supported_disasters.contains(kind))
        .count() as u64
    };

    // First maximum / first minimum so ties resolve to the lowest id.
    let largest = shelters
      .iter()
      .fold(None::<&Shelter>, |best, s| match best {
        Some(b) if b.capacity >= s.capacity => Some(b),
        _ => Some(s),
      });
    let smallest = shelters
      .iter()
      .filter(|s| s.capacity > 0)
      .fold(None::<&Shelter>, |best, s| match best {
        Some(b) if b.capacity <= s.capacity => Some(b),
        _ => Some(s),
      });

    Self {
      total_shelters:   shelters.len() as u64,
      total_capacity:   shelters.iter().map(|s| u64::from(s.capacity)).sum(),
      natural_disaster: CategoryStatistics::tally(
        shelters.iter().filter(|s| !s.is_air_raid()),
      ),
      air_raid:         CategoryStatistics::tally(shelters.iter().filter(|s| s.is_air_raid())),
      disaster_support: DisasterSupportStatistics {
        flooding:   count_with(DisasterKinds::FLOODING),
        earthquake: count_with(DisasterKinds::EARTHQUAKE),
        landslide:  count_with(DisasterKinds::LANDSLIDE),
        tsunami:    count_with(DisasterKinds::TSUNAMI),
        air_raid:   count_with(DisasterKinds::AIR_RAID),
      },
      largest_shelter:  largest.cloned(),
      smallest_shelter: smallest.cloned(),
    }
  }
}
