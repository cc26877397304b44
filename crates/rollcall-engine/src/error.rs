//! Error type for `rollcall-engine`.
//!
//! Only failures that prevent the engine from orchestrating at all surface
//! here. Per-record write failures inside the merge workflow are captured in
//! the [`MergeReport`](crate::report::MergeReport) instead and never raise.

use thiserror::Error;
use uuid::Uuid;

/// An error returned by the reconciliation engine.
#[derive(Debug, Error)]
pub enum EngineError {
  #[error("voter not found: {0}")]
  VoterNotFound(Uuid),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl EngineError {
  /// Wrap a backend error from any store implementation.
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
