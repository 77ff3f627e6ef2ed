//! Two-tier shelter cache.
//!
//! [`ShelterCache`] serves reads from a process-local [`MemoryView`] when it
//! is warm, falls back to a durable [`ShelterStore`](shelter_core::store::ShelterStore)
//! when it is not, and refreshes both from the upstream sources (via the
//! [`Unifier`]) when the store is empty or a refresh is requested.

pub mod error;
pub mod memory;
pub mod occupancy;
pub mod orchestrator;
pub mod unifier;

pub use error::{CacheError, Result};
pub use memory::MemoryView;
pub use occupancy::OccupancyDecorator;
pub use orchestrator::{CacheConfig, CacheInfo, ShelterCache};
pub use unifier::Unifier;
