use shelter_core::UpstreamError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
  /// One source failed, so the whole refresh was abandoned.
  #[error("source {source_name:?} failed: {error}")]
  Upstream {
    source_name: String,
    #[source]
    error:       UpstreamError,
  },

  /// A fetch task panicked or was cancelled before reporting back.
  #[error("source task failed: {0}")]
  SourceTask(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl CacheError {
  pub(crate) fn store(err: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(err))
  }
}

pub type Result<T, E = CacheError> = std::result::Result<T, E>;
