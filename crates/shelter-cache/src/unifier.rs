//! Fan-out over every configured source, fan-in into one list.

use std::{sync::Arc, time::Duration};

use shelter_core::{UpstreamError, shelter::NewShelter, source::ShelterSource};
use tokio::task::JoinSet;

use crate::{CacheError, Result};

/// Fetches every source concurrently and concatenates the results in
/// configuration order. Any failure abandons the whole batch.
#[derive(Clone)]
pub struct Unifier {
  sources:       Vec<Arc<dyn ShelterSource>>,
  fetch_timeout: Duration,
}

impl Unifier {
  pub fn new(sources: Vec<Arc<dyn ShelterSource>>, fetch_timeout: Duration) -> Self {
    Self { sources, fetch_timeout }
  }

  pub fn source_names(&self) -> Vec<String> {
    self.sources.iter().map(|s| s.name().to_owned()).collect()
  }

  pub async fn unify(&self) -> Result<Vec<NewShelter>> {
    let mut tasks = JoinSet::new();
    for (index, source) in self.sources.iter().cloned().enumerate() {
      let timeout = self.fetch_timeout;
      tasks.spawn(async move {
        let result = match tokio::time::timeout(timeout, source.fetch()).await {
          Ok(result) => result,
          Err(_) => Err(UpstreamError::Timeout(timeout)),
        };
        (index, source.name().to_owned(), result)
      });
    }

    let mut batches: Vec<Option<Vec<NewShelter>>> = vec![None; self.sources.len()];
    while let Some(joined) = tasks.join_next().await {
      let (index, source_name, result) =
        joined.map_err(|e| CacheError::SourceTask(e.to_string()))?;
      match result {
        Ok(batch) => {
          tracing::debug!(source = %source_name, count = batch.len(), "source fetched");
          batches[index] = Some(batch);
        }
        // Dropping `tasks` on return aborts whatever is still in flight.
        Err(error) => return Err(CacheError::Upstream { source_name, error }),
      }
    }

    Ok(batches.into_iter().flatten().flatten().collect())
  }
}
