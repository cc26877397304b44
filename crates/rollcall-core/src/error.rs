//! Error types for `rollcall-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::identity::Provider;

#[derive(Debug, Error)]
pub enum Error {
  /// The external identity is already linked to a different voter than the
  /// caller expected. Inside the engine this is the signal that triggers an
  /// account merge, not a user-facing failure.
  #[error("{provider} identity {external_user_id} is already linked to voter {owner}")]
  IdentityConflict {
    provider:         Provider,
    external_user_id: i64,
    owner:            Uuid,
  },

  #[error("unknown provider discriminant: {0:?}")]
  UnknownProvider(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
