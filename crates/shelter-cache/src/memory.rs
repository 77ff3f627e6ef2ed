//! The in-process tier: one slot holding the whole list until it expires.

use std::{sync::Arc, time::Duration};

use shelter_core::shelter::Shelter;
use tokio::{sync::RwLock, time::Instant};

struct Entry {
  records:    Arc<[Shelter]>,
  expires_at: Instant,
}

/// All-or-nothing snapshot of the unified list with a time-to-live.
///
/// Readers share the snapshot through an `Arc`, so a `get` never copies the
/// list and a concurrent `set` never disturbs a reader holding the old one.
#[derive(Default)]
pub struct MemoryView {
  slot: RwLock<Option<Entry>>,
}

impl MemoryView {
  pub fn new() -> Self { Self::default() }

  /// The current snapshot, or `None` if never set, invalidated, or expired.
  pub async fn get(&self) -> Option<Arc<[Shelter]>> {
    let slot = self.slot.read().await;
    slot
      .as_ref()
      .filter(|entry| Instant::now() < entry.expires_at)
      .map(|entry| Arc::clone(&entry.records))
  }

  /// Overwrite the slot unconditionally.
  pub async fn set(&self, records: Arc<[Shelter]>, ttl: Duration) {
    let expires_at = Instant::now() + ttl;
    *self.slot.write().await = Some(Entry { records, expires_at });
  }

  pub async fn invalidate(&self) { *self.slot.write().await = None; }

  pub async fn is_warm(&self) -> bool { self.get().await.is_some() }
}
