//! External identities and the links that bind them to voters.
//!
//! An [`IdentityLink`] is the single source of truth for "who owns this
//! provider identity". The voter row's cached provider fields are a derived
//! projection of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Provider ────────────────────────────────────────────────────────────────

/// A supported third-party identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
  Twitter,
  Facebook,
}

impl Provider {
  /// The discriminant string stored in the `provider` column.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Twitter => "twitter",
      Self::Facebook => "facebook",
    }
  }

  pub fn from_str(s: &str) -> Result<Self> {
    match s {
      "twitter" => Ok(Self::Twitter),
      "facebook" => Ok(Self::Facebook),
      other => Err(Error::UnknownProvider(other.to_owned())),
    }
  }
}

impl std::fmt::Display for Provider {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Identity link ───────────────────────────────────────────────────────────

/// The authoritative binding of one provider identity to one voter.
/// At most one link may exist per `(provider, external_user_id)` — enforced
/// by a UNIQUE constraint in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityLink {
  pub provider:         Provider,
  pub external_user_id: i64,
  pub voter_id:         Uuid,
  /// Server-issued secret; lets a client prove it holds the link.
  pub secret_key:       String,
  pub created_at:       DateTime<Utc>,
}

/// Result of an attempted link creation. A conflict is a normal, expected
/// outcome (it is what triggers an account merge), so it is modelled as a
/// value rather than an error.
#[derive(Debug, Clone)]
pub enum LinkAttempt {
  /// The link was created, or already existed pointing at the same voter.
  Linked(IdentityLink),
  /// The identity is already linked to a different voter.
  Conflict { existing: IdentityLink },
}

impl LinkAttempt {
  /// Treat a conflict as an error, for callers that require the identity to
  /// end up linked to the voter they asked for.
  pub fn into_result(self) -> Result<IdentityLink> {
    match self {
      Self::Linked(link) => Ok(link),
      Self::Conflict { existing } => Err(Error::IdentityConflict {
        provider:         existing.provider,
        external_user_id: existing.external_user_id,
        owner:            existing.voter_id,
      }),
    }
  }
}

// ─── Auth session ────────────────────────────────────────────────────────────

/// Provider OAuth/session state held for an anonymous device before any
/// voter is confirmed. The token exchange itself happens in an external
/// collaborator; this record only carries its output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
  pub session_id:        Uuid,
  pub provider:          Provider,
  pub device_session_id: String,
  pub request_token:     Option<String>,
  pub request_secret:    Option<String>,
  pub access_token:      Option<String>,
  pub access_secret:     Option<String>,
  pub created_at:        DateTime<Utc>,
}

// ─── Provider profile ────────────────────────────────────────────────────────

/// Profile attributes delivered by the provider at sign-in time. Used to
/// refresh the owner's cached fields after reconciliation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderProfile {
  pub screen_name:       Option<String>,
  pub display_name:      Option<String>,
  pub profile_image_url: Option<String>,
}
