//! Voter — one end-user identity record.
//!
//! A voter row holds identity metadata plus *cached* projections of external
//! identities (provider profile fields, verified email). The authoritative
//! record for "who owns this identity" is always the
//! [`IdentityLink`](crate::identity::IdentityLink); the fields here exist for
//! fast reads and may go stale until caching repair runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::Provider;

// ─── Provider cache ──────────────────────────────────────────────────────────

/// Cached profile attributes for one external provider.
///
/// `external_user_id` doubles as the "confirmed" marker: a voter with a cached
/// provider user id is treated as signed in with that provider until caching
/// repair demotes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCache {
  pub external_user_id:  Option<i64>,
  pub screen_name:       Option<String>,
  pub display_name:      Option<String>,
  pub profile_image_url: Option<String>,
}

impl ProviderCache {
  pub fn is_confirmed(&self) -> bool { self.external_user_id.is_some() }

  pub fn is_empty(&self) -> bool { *self == Self::default() }

  /// Demote this cache entirely — used when the identity link points at a
  /// different voter.
  pub fn clear(&mut self) { *self = Self::default(); }

  /// Copy `other`'s fields into `self`; existing non-empty fields win.
  pub fn absorb(&mut self, other: &Self) {
    if self.external_user_id.is_none() {
      self.external_user_id = other.external_user_id;
    }
    if self.screen_name.is_none() {
      self.screen_name = other.screen_name.clone();
    }
    if self.display_name.is_none() {
      self.display_name = other.display_name.clone();
    }
    if self.profile_image_url.is_none() {
      self.profile_image_url = other.profile_image_url.clone();
    }
  }
}

// ─── Voter ───────────────────────────────────────────────────────────────────

/// One end-user account. Created anonymously when a new client session
/// begins; gains external identities through sign-in; may be merged away
/// (its identity-bearing fields cleared, the row kept as a husk).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voter {
  pub voter_id:               Uuid,
  pub created_at:             DateTime<Utc>,
  pub first_name:             Option<String>,
  pub last_name:              Option<String>,
  /// Cached copy of the primary verified address in the email entries table.
  pub email:                  Option<String>,
  pub primary_email_id:       Option<Uuid>,
  pub email_verified:         bool,
  pub twitter:                ProviderCache,
  pub facebook:               ProviderCache,
  pub linked_organization_id: Option<Uuid>,
  pub interface_flags:        u64,
  pub notification_flags:     u64,
}

impl Voter {
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

  pub fn signed_in_twitter(&self) -> bool { self.twitter.is_confirmed() }

  pub fn signed_in_facebook(&self) -> bool { self.facebook.is_confirmed() }

  pub fn has_verified_email(&self) -> bool { self.email_verified }

  /// Does this record carry anything worth preserving through a merge?
  /// Anonymous voters with no verified email and no confirmed provider link
  /// can be folded into another account without data loss.
  pub fn has_data_to_preserve(&self) -> bool {
    self.has_verified_email() || self.signed_in_twitter() || self.signed_in_facebook()
  }

  /// Clear the cached email projection. Run after email entries have been
  /// transplanted, so the next merge attempt does not trip the unique
  /// address constraint.
  pub fn clear_email_fields(&mut self) {
    self.email = None;
    self.primary_email_id = None;
    self.email_verified = false;
  }

  // Flag helpers: merge semantics only ever turn bits on, never off.

  pub fn set_interface_flags(&mut self, bits: u64) { self.interface_flags |= bits; }

  pub fn is_interface_flag_set(&self, bits: u64) -> bool {
    self.interface_flags & bits == bits
  }

  pub fn set_notification_flags(&mut self, bits: u64) {
    self.notification_flags |= bits;
  }

  pub fn is_notification_flag_set(&self, bits: u64) -> bool {
    self.notification_flags & bits == bits
  }

  pub fn full_name(&self) -> Option<String> {
    match (self.first_name.as_deref(), self.last_name.as_deref()) {
      (Some(f), Some(l)) => Some(format!("{f} {l}")),
      (Some(f), None) => Some(f.to_owned()),
      (None, Some(l)) => Some(l.to_owned()),
      (None, None) => None,
    }
  }
}
