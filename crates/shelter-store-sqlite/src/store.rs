//! [`SqliteStore`], the SQLite implementation of [`ShelterStore`].

use std::{path::Path, sync::Arc};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, types::Value};
use shelter_core::{
  filter::{ShelterFilter, within_radius},
  geo::BoundingBox,
  shelter::{NewShelter, Shelter},
  store::{CacheMetadata, ShelterStore},
};

use crate::{
  Result,
  encode::{RawMetadata, RawShelter, SHELTER_COLUMNS, ShelterRow, encode_dt, read_shelter},
  schema::SCHEMA,
};

/// Metadata key used when none is configured.
pub const DEFAULT_CACHE_KEY: &str = "all_shelters";

const INITIAL_NOTE: &str = "initial cache creation";
const REFRESH_NOTE: &str = "cache refreshed";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A shelter store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:      tokio_rusqlite::Connection,
  cache_key: Arc<str>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self { conn, cache_key: Arc::from(DEFAULT_CACHE_KEY) })
  }

  /// Track freshness under `key` instead of [`DEFAULT_CACHE_KEY`].
  pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
    self.cache_key = Arc::from(key.into());
    self
  }

  pub fn cache_key(&self) -> &str { &self.cache_key }

  /// Run `SELECT <columns> FROM shelters <tail>` and decode every row.
  async fn select(&self, tail: String, params: Vec<Value>) -> Result<Vec<Shelter>> {
    let raws: Vec<RawShelter> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {SHELTER_COLUMNS} FROM shelters {tail}");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), read_shelter)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawShelter::into_shelter).collect()
  }
}

// ─── ShelterStore impl ───────────────────────────────────────────────────────

impl ShelterStore for SqliteStore {
  type Error = crate::Error;

  async fn replace_all(&self, shelters: Vec<NewShelter>) -> Result<Vec<Shelter>> {
    let rows: Vec<ShelterRow> = shelters.iter().map(ShelterRow::from).collect();
    let key = self.cache_key.to_string();
    let now = encode_dt(Utc::now());
    let count = rows.len() as i64;

    // Delete, insert, and metadata upsert share one transaction; dropping
    // `tx` on any early return rolls everything back.
    let ids: Vec<i64> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM shelters", [])?;

        let mut ids = Vec::with_capacity(rows.len());
        {
          let mut stmt = tx.prepare(
            "INSERT INTO shelters (
               category, name, capacity, supported_disasters, accessible,
               address, latitude, longitude, phone, floor_area_sqm
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          )?;
          for row in &rows {
            let id = stmt.insert(rusqlite::params![
              row.category,
              row.name,
              row.capacity,
              row.supported_disasters,
              row.accessible,
              row.address,
              row.latitude,
              row.longitude,
              row.phone,
              row.floor_area_sqm,
            ])?;
            ids.push(id);
          }
        }

        tx.execute(
          "INSERT INTO cache_metadata (cache_key, last_updated, record_count, notes)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (cache_key) DO UPDATE SET
             last_updated = excluded.last_updated,
             record_count = excluded.record_count,
             notes        = ?5",
          rusqlite::params![key, now, count, INITIAL_NOTE, REFRESH_NOTE],
        )?;

        tx.commit()?;
        Ok(ids)
      })
      .await?;

    tracing::debug!(count = ids.len(), cache_key = %self.cache_key, "replaced shelter table");

    Ok(
      shelters
        .into_iter()
        .zip(ids)
        .map(|(shelter, id)| shelter.with_id(id))
        .collect(),
    )
  }

  async fn all(&self) -> Result<Vec<Shelter>> {
    self.select("ORDER BY id".to_owned(), Vec::new()).await
  }

  async fn has_data(&self) -> Result<bool> {
    Ok(
      self
        .conn
        .call(|conn| {
          Ok(conn.query_row("SELECT EXISTS (SELECT 1 FROM shelters)", [], |r| r.get(0))?)
        })
        .await?,
    )
  }

  async fn count(&self) -> Result<u64> {
    let n: i64 = self
      .conn
      .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM shelters", [], |r| r.get(0))?))
      .await?;
    Ok(n.max(0) as u64)
  }

  async fn metadata(&self) -> Result<Option<CacheMetadata>> {
    let key = self.cache_key.to_string();

    let raw: Option<RawMetadata> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT cache_key, last_updated, record_count, notes
             FROM cache_metadata WHERE cache_key = ?1",
            rusqlite::params![key],
            |row| {
              Ok(RawMetadata {
                cache_key:    row.get(0)?,
                last_updated: row.get(1)?,
                record_count: row.get(2)?,
                notes:        row.get(3)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawMetadata::into_metadata).transpose()
  }

  async fn filter(&self, filter: &ShelterFilter) -> Result<Vec<Shelter>> {
    match filter {
      ShelterFilter::DisasterKinds(kinds) => {
        self
          .select(
            "WHERE (supported_disasters & ?1) != 0 ORDER BY id".to_owned(),
            vec![Value::Integer(i64::from(kinds.bits()))],
          )
          .await
      }
      // SQLite's built-in lower() folds ASCII only, matching
      // `contains_ignore_ascii_case`. instr() avoids LIKE wildcards.
      ShelterFilter::NameContains(needle) => {
        self
          .select(
            "WHERE instr(lower(name), lower(?1)) > 0 ORDER BY id".to_owned(),
            vec![Value::Text(needle.clone())],
          )
          .await
      }
      ShelterFilter::AddressContains(needle) => {
        self
          .select(
            "WHERE instr(lower(address), lower(?1)) > 0 ORDER BY id".to_owned(),
            vec![Value::Text(needle.clone())],
          )
          .await
      }
      ShelterFilter::MinCapacity(min) => {
        self
          .select(
            "WHERE capacity >= ?1 ORDER BY capacity DESC, id ASC".to_owned(),
            vec![Value::Integer(i64::from(*min))],
          )
          .await
      }
      ShelterFilter::Accessible => {
        self
          .select("WHERE accessible = 1 ORDER BY id".to_owned(), Vec::new())
          .await
      }
      ShelterFilter::Nearby { center, radius } => {
        let bbox = BoundingBox::around(*center, *radius);
        let mut params = vec![Value::Real(bbox.min_lat), Value::Real(bbox.max_lat)];
        let mut tail = "WHERE latitude IS NOT NULL AND longitude IS NOT NULL
                          AND latitude BETWEEN ?1 AND ?2"
          .to_owned();
        if let Some((min_lon, max_lon)) = bbox.lon {
          tail.push_str(" AND longitude BETWEEN ?3 AND ?4");
          params.push(Value::Real(min_lon));
          params.push(Value::Real(max_lon));
        }
        tail.push_str(" ORDER BY id");

        let candidates = self.select(tail, params).await?;
        Ok(within_radius(
          candidates.iter().filter_map(|s| {
            let point = s.location.point()?;
            Some((center.distance_km(&point), s))
          }),
          *radius,
        ))
      }
    }
  }
}
