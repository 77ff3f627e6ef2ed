//! Free-text flag matching for the open-data feed.
//!
//! The dataset marks support for each hazard with a handful of literal
//! strings. Which strings count as "supported" is data, kept in
//! [`NATURAL_DISASTER_FLAGS`], rather than a chain of conditionals.

use shelter_core::disaster::DisasterKinds;

/// One row of the predicate table.
#[derive(Debug, Clone, Copy)]
pub struct FlagRule {
  pub kind:     DisasterKinds,
  /// Raw values (after trimming) that mean "supported".
  pub accepted: &'static [&'static str],
}

impl FlagRule {
  pub fn matches(&self, raw: Option<&str>) -> bool {
    raw.is_some_and(|value| self.accepted.contains(&value.trim()))
  }
}

/// "Y" is the regular marker; "備用" marks a standby shelter, which still
/// counts. The tsunami column uses "是" instead of "Y".
pub const NATURAL_DISASTER_FLAGS: [FlagRule; 4] = [
  FlagRule { kind: DisasterKinds::FLOODING, accepted: &["Y", "備用"] },
  FlagRule { kind: DisasterKinds::EARTHQUAKE, accepted: &["Y", "備用"] },
  FlagRule { kind: DisasterKinds::LANDSLIDE, accepted: &["Y", "備用"] },
  FlagRule { kind: DisasterKinds::TSUNAMI, accepted: &["是", "備用"] },
];

/// Values of the accessibility column that mean "yes".
pub const ACCESSIBLE_VALUES: &[&str] = &["是"];

/// Fold the table over a record. `raw_for` returns the record's raw value
/// for a single kind.
pub fn supported_kinds<'a>(raw_for: impl Fn(DisasterKinds) -> Option<&'a str>) -> DisasterKinds {
  NATURAL_DISASTER_FLAGS
    .iter()
    .filter(|rule| rule.matches(raw_for(rule.kind)))
    .fold(DisasterKinds::NONE, |acc, rule| acc | rule.kind)
}

pub fn is_accessible(raw: Option<&str>) -> bool {
  raw.is_some_and(|value| ACCESSIBLE_VALUES.contains(&value.trim()))
}
