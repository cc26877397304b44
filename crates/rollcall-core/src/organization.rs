//! Organization — an entity a voter can speak through.
//!
//! Owned by exactly one voter via the voter's `linked_organization_id`
//! pointer. An organization may itself represent a public provider account
//! (e.g. a Twitter presence) and so carries its own provider caches, which
//! must stay consistent with the identity link when one exists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{identity::Provider, voter::ProviderCache};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
  pub organization_id: Uuid,
  pub created_at:      DateTime<Utc>,
  pub name:            Option<String>,
  pub twitter:         ProviderCache,
  pub facebook:        ProviderCache,
  pub follower_count:  u64,
}

impl Organization {
  pub fn provider_cache(&self, provider: Provider) -> &ProviderCache {
    match provider {
      Provider::Twitter => &self.twitter,
      Provider::Facebook => &self.facebook,
    }
  }

  pub fn provider_cache_mut(&mut self, provider: Provider) -> &mut ProviderCache {
    match provider {
      Provider::Twitter => &mut self.twitter,
      Provider::Facebook => &mut self.facebook,
    }
  }
}

/// Input to [`crate::store::ReconciliationStore::create_organization`].
/// The id and creation timestamp are set by the store.
#[derive(Debug, Clone, Default)]
pub struct NewOrganization {
  pub name:     Option<String>,
  pub twitter:  ProviderCache,
  pub facebook: ProviderCache,
}
