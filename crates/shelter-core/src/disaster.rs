//! Disaster kinds and the bitset a shelter is rated for.

use std::{fmt, ops::BitOr, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

// ─── DisasterKind ────────────────────────────────────────────────────────────

/// A single hazard a shelter can be rated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisasterKind {
  None,
  Flooding,
  Earthquake,
  Landslide,
  Tsunami,
  AirRaid,
}

impl DisasterKind {
  pub const ALL: [DisasterKind; 6] = [
    Self::None,
    Self::Flooding,
    Self::Earthquake,
    Self::Landslide,
    Self::Tsunami,
    Self::AirRaid,
  ];

  /// The bit this kind occupies in a [`DisasterKinds`] set. `None` is the
  /// empty set.
  pub fn bits(self) -> DisasterKinds {
    match self {
      Self::None => DisasterKinds::NONE,
      Self::Flooding => DisasterKinds::FLOODING,
      Self::Earthquake => DisasterKinds::EARTHQUAKE,
      Self::Landslide => DisasterKinds::LANDSLIDE,
      Self::Tsunami => DisasterKinds::TSUNAMI,
      Self::AirRaid => DisasterKinds::AIR_RAID,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::None => "None",
      Self::Flooding => "Flooding",
      Self::Earthquake => "Earthquake",
      Self::Landslide => "Landslide",
      Self::Tsunami => "Tsunami",
      Self::AirRaid => "AirRaid",
    }
  }
}

impl fmt::Display for DisasterKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Case-insensitive parse of the query-string token.
impl FromStr for DisasterKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let token = s.trim();
    Self::ALL
      .into_iter()
      .find(|k| k.as_str().eq_ignore_ascii_case(token))
      .ok_or_else(|| Error::UnknownDisasterKind(s.to_owned()))
  }
}

// ─── DisasterKinds ───────────────────────────────────────────────────────────

/// Set of hazards a shelter supports. Serialised as its integer bits so the
/// JSON shape matches the database column.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DisasterKinds(u8);

impl DisasterKinds {
  pub const NONE: Self = Self(0);
  pub const FLOODING: Self = Self(1 << 0);
  pub const EARTHQUAKE: Self = Self(1 << 1);
  pub const LANDSLIDE: Self = Self(1 << 2);
  pub const TSUNAMI: Self = Self(1 << 3);
  pub const AIR_RAID: Self = Self(1 << 4);

  /// Every natural-hazard bit; never overlaps [`Self::AIR_RAID`].
  pub const NATURAL: Self = Self(0b0_1111);

  const MASK: u8 = 0b1_1111;

  /// Build from raw bits, dropping any bit outside the known kinds.
  pub fn from_bits_truncate(bits: u8) -> Self { Self(bits & Self::MASK) }

  pub fn bits(self) -> u8 { self.0 }

  pub fn is_empty(self) -> bool { self.0 == 0 }

  /// `true` if every bit in `other` is set in `self`.
  pub fn contains(self, other: Self) -> bool { self.0 & other.0 == other.0 }

  /// `true` if `self` and `other` share at least one bit. An empty set
  /// intersects nothing.
  pub fn intersects(self, other: Self) -> bool { self.0 & other.0 != 0 }

  /// The individual kinds present in this set, in declaration order.
  pub fn kinds(self) -> impl Iterator<Item = DisasterKind> {
    DisasterKind::ALL
      .into_iter()
      .filter(move |k| k.bits().0 != 0 && self.contains(k.bits()))
  }
}

impl BitOr for DisasterKinds {
  type Output = Self;

  fn bitor(self, rhs: Self) -> Self { Self(self.0 | rhs.0) }
}

impl From<DisasterKind> for DisasterKinds {
  fn from(k: DisasterKind) -> Self { k.bits() }
}
