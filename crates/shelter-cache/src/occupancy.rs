//! Simulated occupancy for display.
//!
//! Neither tier stores occupancy. The decorator stamps a fresh random value
//! onto each record on the way out, so it can never be mistaken for data.

use rand_core::{OsRng, RngCore};
use shelter_core::shelter::Shelter;

#[derive(Debug, Clone, Copy)]
pub struct OccupancyDecorator {
  enabled: bool,
}

impl OccupancyDecorator {
  pub fn new(enabled: bool) -> Self { Self { enabled } }

  /// Stamp `current_occupancy` uniformly in `[0, capacity]`. A disabled
  /// decorator leaves every record at `None`.
  pub fn apply(&self, shelters: &mut [Shelter]) {
    if !self.enabled {
      return;
    }
    let mut rng = OsRng;
    for shelter in shelters {
      shelter.current_occupancy = Some(sample(&mut rng, shelter.capacity));
    }
  }
}

fn sample(rng: &mut impl RngCore, capacity: u32) -> u32 {
  let span = u64::from(capacity) + 1;
  (rng.next_u64() % span) as u32
}

#[cfg(test)]
mod tests {
  use shelter_core::shelter::NewShelter;

  use super::*;

  fn shelter(capacity: u32) -> Shelter {
    let mut s = NewShelter::new("s", "a");
    s.capacity = capacity;
    s.with_id(1)
  }

  #[test]
  fn stays_within_capacity() {
    let decorator = OccupancyDecorator::new(true);
    let mut shelters: Vec<Shelter> = (0..200).map(|i| shelter(i % 7)).collect();
    decorator.apply(&mut shelters);
    for s in &shelters {
      let occupancy = s.current_occupancy.expect("stamped");
      assert!(occupancy <= s.capacity);
    }
  }

  #[test]
  fn zero_capacity_is_always_empty() {
    let mut shelters = vec![shelter(0)];
    OccupancyDecorator::new(true).apply(&mut shelters);
    assert_eq!(shelters[0].current_occupancy, Some(0));
  }

  #[test]
  fn disabled_leaves_records_untouched() {
    let mut shelters = vec![shelter(10)];
    OccupancyDecorator::new(false).apply(&mut shelters);
    assert!(shelters[0].current_occupancy.is_none());
  }
}
