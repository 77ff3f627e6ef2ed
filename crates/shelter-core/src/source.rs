//! The `ShelterSource` trait: one upstream feed, fetched and normalised.
//!
//! Sources are held as a heterogeneous list (`Vec<Arc<dyn ShelterSource>>`),
//! so this trait uses `async_trait` to stay object safe.

use async_trait::async_trait;

use crate::{UpstreamError, shelter::NewShelter};

#[async_trait]
pub trait ShelterSource: Send + Sync {
  /// Short, stable name used in logs and errors (e.g. `"natural-disaster"`).
  fn name(&self) -> &str;

  /// Fetch the feed and map every entry into the unified shape.
  ///
  /// Whether a single bad entry fails the whole batch is up to the
  /// implementation; a transport failure or unreadable top-level payload
  /// always fails it.
  async fn fetch(&self) -> Result<Vec<NewShelter>, UpstreamError>;
}
