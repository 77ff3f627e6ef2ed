//! [`ShelterCache`] coordinates the memory tier, the store, and refresh.
//!
//! Read path:
//!
//! 1. memory snapshot unexpired → serve it;
//! 2. store has rows → load them, repopulate memory, serve;
//! 3. store empty (cold) → refresh from the sources, serve the result.
//!
//! Refreshes are serialised. A caller that queued behind a refresh which
//! completed while it waited reuses that result instead of refetching.

use std::{
  sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
  },
  time::Duration,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use shelter_core::{
  disaster::DisasterKinds,
  filter::ShelterFilter,
  geo::{GeoPoint, Radius},
  shelter::Shelter,
  stats::ShelterStatistics,
  store::ShelterStore,
};
use tokio::sync::Mutex;

use crate::{CacheError, MemoryView, OccupancyDecorator, Result, Unifier};

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CacheConfig {
  /// How long a memory snapshot is served before the store is consulted.
  pub memory_ttl:         Duration,
  /// Age past which [`CacheInfo::is_stale`] is set.
  pub stale_after:        Duration,
  pub simulate_occupancy: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      memory_ttl:         Duration::from_secs(5 * 60),
      stale_after:        Duration::from_secs(24 * 60 * 60),
      simulate_occupancy: true,
    }
  }
}

// ─── Info ────────────────────────────────────────────────────────────────────

/// Point-in-time view of both tiers. Reading it changes nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheInfo {
  pub has_database_cache: bool,
  pub has_memory_cache:   bool,
  pub record_count:       u64,
  pub last_updated:       Option<DateTime<Utc>>,
  pub notes:              Option<String>,
  /// Seconds since `last_updated`.
  pub age_seconds:        Option<i64>,
  pub memory_ttl_minutes: u64,
  /// `true` once the age exceeds the configured staleness threshold.
  pub is_stale:           bool,
}

impl CacheInfo {
  pub fn age_hours(&self) -> Option<f64> {
    self.age_seconds.map(|s| s as f64 / 3600.0)
  }
}

// ─── Cache ───────────────────────────────────────────────────────────────────

pub struct ShelterCache<S> {
  store:        S,
  memory:       MemoryView,
  unifier:      Unifier,
  occupancy:    OccupancyDecorator,
  config:       CacheConfig,
  refresh_lock: Mutex<()>,
  /// Bumped under `refresh_lock` by every successful refresh and clear.
  generation:   AtomicU64,
}

impl<S: ShelterStore> ShelterCache<S> {
  pub fn new(store: S, unifier: Unifier, config: CacheConfig) -> Self {
    Self {
      store,
      memory: MemoryView::new(),
      unifier,
      occupancy: OccupancyDecorator::new(config.simulate_occupancy),
      config,
      refresh_lock: Mutex::new(()),
      generation: AtomicU64::new(0),
    }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn memory(&self) -> &MemoryView { &self.memory }

  pub fn config(&self) -> &CacheConfig { &self.config }

  // ── Reads ───────────────────────────────────────────────────────────────

  /// Every shelter, served from the fastest valid tier.
  pub async fn get_all(&self) -> Result<Vec<Shelter>> {
    let snapshot = self.snapshot().await?;
    Ok(self.decorate(snapshot.to_vec()))
  }

  /// Run a derived query. Filters the memory snapshot when warm and
  /// delegates to the store otherwise; both give the same answer.
  pub async fn filter(&self, filter: &ShelterFilter) -> Result<Vec<Shelter>> {
    let hits = match self.ensure_populated().await? {
      Some(snapshot) => filter.apply(&snapshot),
      None => {
        tracing::debug!(?filter, "memory cold; filtering in store");
        self.store.filter(filter).await.map_err(CacheError::store)?
      }
    };
    Ok(self.decorate(hits))
  }

  pub async fn by_disaster_kinds(&self, kinds: DisasterKinds) -> Result<Vec<Shelter>> {
    self.filter(&ShelterFilter::DisasterKinds(kinds)).await
  }

  pub async fn nearby(&self, center: GeoPoint, radius: Radius) -> Result<Vec<Shelter>> {
    self.filter(&ShelterFilter::Nearby { center, radius }).await
  }

  pub async fn search_by_name(&self, keyword: &str) -> Result<Vec<Shelter>> {
    self.filter(&ShelterFilter::NameContains(keyword.to_owned())).await
  }

  pub async fn by_address(&self, keyword: &str) -> Result<Vec<Shelter>> {
    self.filter(&ShelterFilter::AddressContains(keyword.to_owned())).await
  }

  pub async fn by_min_capacity(&self, min: u32) -> Result<Vec<Shelter>> {
    self.filter(&ShelterFilter::MinCapacity(min)).await
  }

  pub async fn accessible(&self) -> Result<Vec<Shelter>> {
    self.filter(&ShelterFilter::Accessible).await
  }

  pub async fn statistics(&self) -> Result<ShelterStatistics> {
    let snapshot = self.snapshot().await?;
    Ok(ShelterStatistics::compute(&snapshot))
  }

  // ── Maintenance ─────────────────────────────────────────────────────────

  /// Refetch every source and replace both tiers. On failure neither tier
  /// changes and the error is returned.
  pub async fn refresh(&self) -> Result<Arc<[Shelter]>> {
    let seen = self.generation.load(Ordering::Acquire);
    let _guard = self.refresh_lock.lock().await;

    if self.generation.load(Ordering::Acquire) != seen {
      if let Some(fresh) = self.memory.get().await {
        tracing::debug!("reusing refresh that completed while waiting");
        return Ok(fresh);
      }
    }
    self.refresh_locked().await
  }

  /// Empty both tiers. The metadata row stays, with a zero count and a new
  /// timestamp.
  pub async fn clear_all(&self) -> Result<()> {
    let _guard = self.refresh_lock.lock().await;
    self.store.replace_all(Vec::new()).await.map_err(CacheError::store)?;
    self.memory.invalidate().await;
    self.generation.fetch_add(1, Ordering::AcqRel);
    tracing::warn!("shelter cache cleared");
    Ok(())
  }

  pub async fn info(&self) -> Result<CacheInfo> {
    let has_database_cache = self.store.has_data().await.map_err(CacheError::store)?;
    let record_count = self.store.count().await.map_err(CacheError::store)?;
    let metadata = self.store.metadata().await.map_err(CacheError::store)?;
    let has_memory_cache = self.memory.is_warm().await;

    let last_updated = metadata.as_ref().map(|m| m.last_updated);
    let age = last_updated.map(|t| Utc::now() - t);
    let is_stale = match (age, chrono::Duration::from_std(self.config.stale_after)) {
      (Some(age), Ok(threshold)) => age > threshold,
      _ => false,
    };

    Ok(CacheInfo {
      has_database_cache,
      has_memory_cache,
      record_count,
      last_updated,
      notes: metadata.and_then(|m| m.notes),
      age_seconds: age.map(|a| a.num_seconds()),
      memory_ttl_minutes: self.config.memory_ttl.as_secs() / 60,
      is_stale,
    })
  }

  // ── Internals ───────────────────────────────────────────────────────────

  fn decorate(&self, mut shelters: Vec<Shelter>) -> Vec<Shelter> {
    self.occupancy.apply(&mut shelters);
    shelters
  }

  /// The full list from the fastest valid tier, refreshing when cold.
  async fn snapshot(&self) -> Result<Arc<[Shelter]>> {
    match self.ensure_populated().await? {
      Some(snapshot) => Ok(snapshot),
      None => self.load_from_store().await,
    }
  }

  /// Make sure the cache is not cold. Returns the memory snapshot when one
  /// is at hand, `None` when the store holds data but memory does not.
  async fn ensure_populated(&self) -> Result<Option<Arc<[Shelter]>>> {
    if let Some(hit) = self.memory.get().await {
      tracing::debug!(count = hit.len(), "memory hit");
      return Ok(Some(hit));
    }
    if self.store.has_data().await.map_err(CacheError::store)? {
      return Ok(None);
    }
    self.refresh_if_cold().await.map(Some)
  }

  /// Read the store and repopulate memory, unless a refresh or clear got
  /// in between. Never waits on `refresh_lock`.
  async fn load_from_store(&self) -> Result<Arc<[Shelter]>> {
    let seen = self.generation.load(Ordering::Acquire);
    let records: Arc<[Shelter]> = self.store.all().await.map_err(CacheError::store)?.into();

    match self.refresh_lock.try_lock() {
      Ok(_guard) if self.generation.load(Ordering::Acquire) == seen => {
        tracing::debug!(count = records.len(), "loaded from store into memory");
        self.memory.set(Arc::clone(&records), self.config.memory_ttl).await;
      }
      _ => tracing::debug!("store changed during load; leaving memory alone"),
    }
    Ok(records)
  }

  /// [`Self::load_from_store`] for callers already holding `refresh_lock`.
  async fn load_locked(&self) -> Result<Arc<[Shelter]>> {
    let records: Arc<[Shelter]> = self.store.all().await.map_err(CacheError::store)?.into();
    self.memory.set(Arc::clone(&records), self.config.memory_ttl).await;
    Ok(records)
  }

  /// Cold-start refresh. Whoever takes the lock first does the work; the
  /// rest find the store populated once they get in.
  async fn refresh_if_cold(&self) -> Result<Arc<[Shelter]>> {
    let _guard = self.refresh_lock.lock().await;

    if let Some(hit) = self.memory.get().await {
      return Ok(hit);
    }
    if self.store.has_data().await.map_err(CacheError::store)? {
      return self.load_locked().await;
    }
    tracing::info!("store is empty; populating from sources");
    self.refresh_locked().await
  }

  async fn refresh_locked(&self) -> Result<Arc<[Shelter]>> {
    let started = tokio::time::Instant::now();
    tracing::info!(sources = ?self.unifier.source_names(), "refreshing shelter cache");

    let unified = match self.unifier.unify().await {
      Ok(unified) => unified,
      Err(e) => {
        tracing::error!(error = %e, "refresh failed; keeping previous cache generation");
        return Err(e);
      }
    };

    let stored = self.store.replace_all(unified).await.map_err(|e| {
      tracing::error!(error = %e, "writing refreshed shelters failed");
      CacheError::store(e)
    })?;
    let records: Arc<[Shelter]> = stored.into();
    self.memory.set(Arc::clone(&records), self.config.memory_ttl).await;
    self.generation.fetch_add(1, Ordering::AcqRel);

    tracing::info!(
      count = records.len(),
      elapsed_ms = started.elapsed().as_millis() as u64,
      "shelter cache refreshed"
    );
    Ok(records)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::AtomicUsize;

  use async_trait::async_trait;
  use shelter_core::{
    UpstreamError,
    disaster::DisasterKind,
    shelter::{Location, NewShelter},
    source::ShelterSource,
  };
  use shelter_store_sqlite::SqliteStore;

  use super::*;

  // ── Fake sources ────────────────────────────────────────────────────────

  /// Serves a fixed batch, counts calls, and can be switched to fail.
  struct Scripted {
    name:    &'static str,
    records: Vec<NewShelter>,
    calls:   AtomicUsize,
    failing: std::sync::atomic::AtomicBool,
    delay:   Duration,
  }

  impl Scripted {
    fn new(name: &'static str, records: Vec<NewShelter>) -> Arc<Self> {
      Arc::new(Self {
        name,
        records,
        calls: AtomicUsize::new(0),
        failing: std::sync::atomic::AtomicBool::new(false),
        delay: Duration::ZERO,
      })
    }

    fn slow(name: &'static str, records: Vec<NewShelter>, delay: Duration) -> Arc<Self> {
      Arc::new(Self {
        name,
        records,
        calls: AtomicUsize::new(0),
        failing: std::sync::atomic::AtomicBool::new(false),
        delay,
      })
    }

    fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

    fn fail(&self) { self.failing.store(true, Ordering::SeqCst) }
  }

  #[async_trait]
  impl ShelterSource for Scripted {
    fn name(&self) -> &str { self.name }

    async fn fetch(&self) -> std::result::Result<Vec<NewShelter>, UpstreamError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if !self.delay.is_zero() {
        tokio::time::sleep(self.delay).await;
      }
      if self.failing.load(Ordering::SeqCst) {
        return Err(UpstreamError::Http("connection reset".into()));
      }
      Ok(self.records.clone())
    }
  }

  fn natural_records() -> Vec<NewShelter> {
    let kinds = [
      DisasterKinds::FLOODING | DisasterKinds::EARTHQUAKE,
      DisasterKinds::LANDSLIDE,
      DisasterKinds::TSUNAMI | DisasterKinds::FLOODING,
    ];
    kinds
      .into_iter()
      .enumerate()
      .map(|(i, k)| {
        let mut s = NewShelter::new(format!("Natural {i}"), format!("{i} Xinyi Rd"));
        s.capacity = 100 * (i as u32 + 1);
        s.supported_disasters = k;
        s.accessible = i % 2 == 0;
        s
      })
      .collect()
  }

  fn air_raid_records() -> Vec<NewShelter> {
    [(25.0339639, 121.5644722, 2000), (25.0478, 121.5170, 800)]
      .into_iter()
      .enumerate()
      .map(|(i, (lat, lon, cap))| {
        let mut s = NewShelter::new(format!("Air raid {i}"), format!("{i} Zhongxiao Rd"));
        s.category = Some("防空避難所".into());
        s.capacity = cap;
        s.supported_disasters = DisasterKinds::AIR_RAID;
        s.location = Location::from_coordinates(lat, lon);
        s
      })
      .collect()
  }

  struct Fixture {
    cache:   ShelterCache<SqliteStore>,
    natural: Arc<Scripted>,
    air:     Arc<Scripted>,
  }

  async fn fixture_with(config: CacheConfig) -> Fixture {
    let natural = Scripted::new("natural", natural_records());
    let air = Scripted::new("air", air_raid_records());
    let unifier = Unifier::new(
      vec![natural.clone() as Arc<dyn ShelterSource>, air.clone() as Arc<dyn ShelterSource>],
      Duration::from_secs(30),
    );
    let store = SqliteStore::open_in_memory().await.expect("in-memory store");
    Fixture { cache: ShelterCache::new(store, unifier, config), natural, air }
  }

  async fn fixture() -> Fixture {
    fixture_with(CacheConfig { simulate_occupancy: false, ..CacheConfig::default() }).await
  }

  fn strip_occupancy(mut shelters: Vec<Shelter>) -> Vec<Shelter> {
    for s in &mut shelters {
      s.current_occupancy = None;
    }
    shelters
  }

  fn natural_only(source: Arc<Scripted>) -> Unifier {
    Unifier::new(vec![source as Arc<dyn ShelterSource>], Duration::from_secs(5))
  }

  // ── Instrumented store ──────────────────────────────────────────────────

  /// `SqliteStore` whose `all()` lingers after reading and whose writes can
  /// be switched to fail.
  struct Instrumented {
    inner:       SqliteStore,
    all_delay:   Duration,
    fail_writes: std::sync::atomic::AtomicBool,
  }

  impl Instrumented {
    async fn new(all_delay: Duration) -> Self {
      Self {
        inner: SqliteStore::open_in_memory().await.unwrap(),
        all_delay,
        fail_writes: std::sync::atomic::AtomicBool::new(false),
      }
    }

    fn fail_writes(&self) { self.fail_writes.store(true, Ordering::SeqCst) }
  }

  impl ShelterStore for Instrumented {
    type Error = std::io::Error;

    async fn replace_all(
      &self,
      shelters: Vec<NewShelter>,
    ) -> std::result::Result<Vec<Shelter>, Self::Error> {
      if self.fail_writes.load(Ordering::SeqCst) {
        return Err(std::io::Error::other("disk full"));
      }
      self.inner.replace_all(shelters).await.map_err(std::io::Error::other)
    }

    async fn all(&self) -> std::result::Result<Vec<Shelter>, Self::Error> {
      let rows = self.inner.all().await.map_err(std::io::Error::other)?;
      tokio::time::sleep(self.all_delay).await;
      Ok(rows)
    }

    async fn has_data(&self) -> std::result::Result<bool, Self::Error> {
      self.inner.has_data().await.map_err(std::io::Error::other)
    }

    async fn count(&self) -> std::result::Result<u64, Self::Error> {
      self.inner.count().await.map_err(std::io::Error::other)
    }

    async fn metadata(
      &self,
    ) -> std::result::Result<Option<shelter_core::store::CacheMetadata>, Self::Error> {
      self.inner.metadata().await.map_err(std::io::Error::other)
    }

    async fn filter(
      &self,
      filter: &ShelterFilter,
    ) -> std::result::Result<Vec<Shelter>, Self::Error> {
      self.inner.filter(filter).await.map_err(std::io::Error::other)
    }
  }

  // ── Read path ───────────────────────────────────────────────────────────

  #[tokio::test]
  async fn cold_start_refreshes_once() {
    let f = fixture().await;

    let all = f.cache.get_all().await.unwrap();
    assert_eq!(all.len(), 5);
    assert_eq!(f.natural.calls(), 1);
    assert_eq!(f.air.calls(), 1);

    // Natural first, then air-raid, ids from 1.
    assert_eq!(all[0].name, "Natural 0");
    assert_eq!(all[3].name, "Air raid 0");
    assert_eq!(all.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);

    f.cache.get_all().await.unwrap();
    assert_eq!(f.natural.calls(), 1);
  }

  #[tokio::test]
  async fn concurrent_cold_reads_share_one_refresh() {
    let natural = Scripted::slow("natural", natural_records(), Duration::from_millis(20));
    let unifier = Unifier::new(vec![natural.clone() as Arc<dyn ShelterSource>], Duration::from_secs(5));
    let store = SqliteStore::open_in_memory().await.unwrap();
    let cache = Arc::new(ShelterCache::new(store, unifier, CacheConfig::default()));

    let mut handles = Vec::new();
    for _ in 0..4 {
      let cache = Arc::clone(&cache);
      handles.push(tokio::spawn(async move { cache.get_all().await.map(|v| v.len()) }));
    }
    for h in handles {
      assert_eq!(h.await.unwrap().unwrap(), 3);
    }
    assert_eq!(natural.calls(), 1);
  }

  #[tokio::test]
  async fn scenario_three_plus_two() {
    let f = fixture().await;
    let refreshed = f.cache.refresh().await.unwrap();

    assert_eq!(refreshed.len(), 5);
    assert_eq!(f.cache.store().count().await.unwrap(), 5);
    let info = f.cache.info().await.unwrap();
    assert_eq!(info.record_count, 5);
    assert!(info.has_database_cache);
    assert!(info.has_memory_cache);
    assert!(info.last_updated.is_some());
    assert!(!info.is_stale);
  }

  #[tokio::test]
  async fn tiers_agree_after_refresh() {
    let f = fixture().await;
    f.cache.refresh().await.unwrap();

    let memory = f.cache.memory().get().await.expect("memory warm");
    let stored = f.cache.store().all().await.unwrap();
    assert_eq!(memory.to_vec(), stored);
  }

  #[tokio::test(start_paused = true)]
  async fn expired_memory_reloads_from_store_without_refetching() {
    let f = fixture().await;
    f.cache.get_all().await.unwrap();

    tokio::time::advance(Duration::from_secs(5 * 60 + 1)).await;
    assert!(f.cache.memory().get().await.is_none());

    let all = f.cache.get_all().await.unwrap();
    assert_eq!(all.len(), 5);
    assert_eq!(f.natural.calls(), 1);
    assert!(f.cache.memory().is_warm().await);
  }

  #[tokio::test]
  async fn occupancy_is_simulated_but_never_stored() {
    let f = fixture_with(CacheConfig::default()).await;
    let all = f.cache.get_all().await.unwrap();

    assert!(all.iter().all(|s| s.current_occupancy.is_some_and(|o| o <= s.capacity)));
    let memory = f.cache.memory().get().await.unwrap();
    assert!(memory.iter().all(|s| s.current_occupancy.is_none()));
    let stored = f.cache.store().all().await.unwrap();
    assert!(stored.iter().all(|s| s.current_occupancy.is_none()));
  }

  // ── Derived reads ───────────────────────────────────────────────────────

  #[tokio::test]
  async fn memory_and_store_paths_agree() {
    let f = fixture().await;
    f.cache.refresh().await.unwrap();

    let center = GeoPoint::new(25.0339639, 121.5644722).unwrap();
    let mut filters: Vec<ShelterFilter> =
      DisasterKind::ALL.into_iter().map(|k| ShelterFilter::DisasterKinds(k.bits())).collect();
    filters.extend([
      ShelterFilter::name_contains("natural").unwrap(),
      ShelterFilter::address_contains("ZHONGXIAO").unwrap(),
      ShelterFilter::MinCapacity(200),
      ShelterFilter::Accessible,
      ShelterFilter::Nearby { center, radius: Radius::new(10.0).unwrap() },
      ShelterFilter::Nearby { center, radius: Radius::unchecked(0.001) },
    ]);

    for filter in &filters {
      let warm = f.cache.filter(filter).await.unwrap();
      f.cache.memory().invalidate().await;
      let cold = f.cache.filter(filter).await.unwrap();
      assert_eq!(warm, cold, "{filter:?}");
      f.cache.refresh().await.unwrap();
    }
    assert_eq!(f.natural.calls(), 1 + filters.len());
  }

  #[tokio::test]
  async fn derived_read_on_cold_cache_refreshes() {
    let f = fixture().await;
    let air = f.cache.by_disaster_kinds(DisasterKinds::AIR_RAID).await.unwrap();
    assert_eq!(air.len(), 2);
    assert_eq!(f.air.calls(), 1);
  }

  #[tokio::test]
  async fn nearby_excludes_far_and_ungeocoded() {
    let f = fixture().await;
    let center = GeoPoint::new(25.0339639, 121.5644722).unwrap();

    let near = f.cache.nearby(center, Radius::unchecked(0.001)).await.unwrap();
    assert_eq!(near.len(), 1);
    assert_eq!(near[0].name, "Air raid 0");

    // Natural shelters are ungeocoded and never match, even around (0, 0).
    let origin = GeoPoint::new(0.0, 0.0).unwrap();
    assert!(f.cache.nearby(origin, Radius::new(100.0).unwrap()).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn convenience_filters() {
    let f = fixture().await;
    assert_eq!(f.cache.search_by_name("RAID").await.unwrap().len(), 2);
    assert_eq!(f.cache.by_address("xinyi").await.unwrap().len(), 3);
    let caps: Vec<u32> =
      f.cache.by_min_capacity(300).await.unwrap().iter().map(|s| s.capacity).collect();
    assert_eq!(caps, vec![2000, 800, 300]);
    assert_eq!(f.cache.accessible().await.unwrap().len(), 2);
  }

  #[tokio::test]
  async fn statistics_cover_the_whole_list() {
    let f = fixture().await;
    let stats = f.cache.statistics().await.unwrap();
    assert_eq!(stats.total_shelters, 5);
    assert_eq!(stats.natural_disaster.total_count, 3);
    assert_eq!(stats.air_raid.total_count, 2);
    assert_eq!(stats.largest_shelter.unwrap().capacity, 2000);
  }

  // ── Failure and clear ───────────────────────────────────────────────────

  #[tokio::test]
  async fn failed_refresh_keeps_stale_data() {
    let f = fixture().await;
    let before = strip_occupancy(f.cache.get_all().await.unwrap());
    let meta_before = f.cache.store().metadata().await.unwrap();

    f.air.fail();
    let err = f.cache.refresh().await.unwrap_err();
    assert!(matches!(err, CacheError::Upstream { ref source_name, .. } if source_name == "air"));

    assert_eq!(strip_occupancy(f.cache.get_all().await.unwrap()), before);
    assert_eq!(f.cache.store().metadata().await.unwrap(), meta_before);
  }

  #[tokio::test]
  async fn cold_start_failure_is_an_error_not_an_empty_list() {
    let f = fixture().await;
    f.natural.fail();
    assert!(f.cache.get_all().await.is_err());
    assert!(!f.cache.store().has_data().await.unwrap());
  }

  #[tokio::test]
  async fn clear_empties_both_tiers_but_keeps_metadata() {
    let f = fixture().await;
    f.cache.refresh().await.unwrap();
    let refreshed_at = f.cache.info().await.unwrap().last_updated.unwrap();

    f.cache.clear_all().await.unwrap();

    assert!(!f.cache.store().has_data().await.unwrap());
    assert!(f.cache.memory().get().await.is_none());
    let info = f.cache.info().await.unwrap();
    assert_eq!(info.record_count, 0);
    assert!(!info.has_database_cache);
    assert!(!info.has_memory_cache);
    assert!(info.last_updated.unwrap() >= refreshed_at);
  }

  #[tokio::test]
  async fn read_after_clear_repopulates() {
    let f = fixture().await;
    f.cache.refresh().await.unwrap();
    f.cache.clear_all().await.unwrap();

    assert_eq!(f.cache.get_all().await.unwrap().len(), 5);
    assert_eq!(f.natural.calls(), 2);
  }

  #[tokio::test]
  async fn stale_threshold_is_configurable() {
    let f = fixture_with(CacheConfig {
      stale_after: Duration::ZERO,
      simulate_occupancy: false,
      ..CacheConfig::default()
    })
    .await;
    f.cache.refresh().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let info = f.cache.info().await.unwrap();
    assert!(info.is_stale);
    assert!(info.age_seconds.unwrap() >= 1);
  }

  #[tokio::test]
  async fn empty_store_reports_no_metadata() {
    let f = fixture().await;
    let info = f.cache.info().await.unwrap();
    assert!(!info.has_database_cache);
    assert!(info.last_updated.is_none());
    assert!(info.age_seconds.is_none());
    assert!(!info.is_stale);
    assert_eq!(info.memory_ttl_minutes, 5);
    // Inspecting never triggers a fetch.
    assert_eq!(f.natural.calls(), 0);
  }

  // ── Interleavings ───────────────────────────────────────────────────────

  #[tokio::test]
  async fn overlapping_forced_refreshes_fetch_once() {
    let natural = Scripted::slow("natural", natural_records(), Duration::from_millis(50));
    let store = SqliteStore::open_in_memory().await.unwrap();
    let cache = ShelterCache::new(store, natural_only(natural.clone()), CacheConfig::default());

    let (first, second) = tokio::join!(cache.refresh(), cache.refresh());

    assert_eq!(first.unwrap().len(), 3);
    assert_eq!(second.unwrap().len(), 3);
    assert_eq!(natural.calls(), 1);
  }

  #[tokio::test]
  async fn clear_during_store_load_leaves_memory_empty() {
    let natural = Scripted::new("natural", natural_records());
    let store = Instrumented::new(Duration::from_millis(200)).await;
    let cache = Arc::new(ShelterCache::new(store, natural_only(natural), CacheConfig::default()));
    cache.refresh().await.unwrap();
    cache.memory().invalidate().await;

    let reader = tokio::spawn({
      let cache = Arc::clone(&cache);
      async move { cache.get_all().await.map(|v| v.len()) }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    cache.clear_all().await.unwrap();

    // The reader still answers with what it read before the clear.
    assert_eq!(reader.await.unwrap().unwrap(), 3);
    assert!(cache.memory().get().await.is_none());
    assert!(!cache.store().has_data().await.unwrap());
  }

  #[tokio::test]
  async fn refresh_during_store_load_keeps_the_new_generation() {
    let natural = Scripted::new("natural", natural_records());
    let store = Instrumented::new(Duration::from_millis(200)).await;
    let cache = Arc::new(ShelterCache::new(store, natural_only(natural), CacheConfig::default()));
    cache.refresh().await.unwrap();
    cache.memory().invalidate().await;

    let reader = tokio::spawn({
      let cache = Arc::clone(&cache);
      async move { cache.get_all().await.map(|v| v.len()) }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    let fresh = cache.refresh().await.unwrap();
    reader.await.unwrap().unwrap();

    let memory = cache.memory().get().await.expect("memory warm");
    assert!(Arc::ptr_eq(&memory, &fresh));
  }

  #[tokio::test]
  async fn failed_clear_keeps_both_tiers() {
    let natural = Scripted::new("natural", natural_records());
    let store = Instrumented::new(Duration::ZERO).await;
    let cache = ShelterCache::new(store, natural_only(natural), CacheConfig::default());
    cache.refresh().await.unwrap();

    cache.store().fail_writes();
    assert!(matches!(cache.clear_all().await, Err(CacheError::Store(_))));

    assert_eq!(cache.memory().get().await.unwrap().len(), 3);
    assert!(cache.store().has_data().await.unwrap());
  }
}
