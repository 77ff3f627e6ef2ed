//! Error types for `shelter-core`.

use std::time::Duration;

use thiserror::Error;

/// Caller-supplied input that was rejected before touching the cache.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
  #[error("unknown disaster type {0:?}; expected one of None, Flooding, Earthquake, Landslide, Tsunami, AirRaid")]
  UnknownDisasterKind(String),

  #[error("latitude must be between -90 and 90, got {0}")]
  LatitudeOutOfRange(f64),

  #[error("longitude must be between -180 and 180, got {0}")]
  LongitudeOutOfRange(f64),

  #[error("radius must be greater than 0 and at most {max} km, got {got}")]
  RadiusOutOfRange { got: f64, max: f64 },

  #[error("{0} must not be empty")]
  EmptyKeyword(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A source fetch failed. Carries strings rather than transport errors so
/// this crate stays free of HTTP dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
  #[error("request failed: {0}")]
  Http(String),

  #[error("upstream responded with status {0}")]
  Status(u16),

  #[error("malformed payload: {0}")]
  Malformed(String),

  #[error("timed out after {0:?}")]
  Timeout(Duration),
}
