//! Caching repair — re-establishing the single authoritative holder of an
//! external identity, and self-healing of position organization references.
//!
//! Cached provider fields on voters and organizations are fast-read copies
//! of the identity link and drift when merges partially fail. Both repairs
//! here are idempotent and safe to run speculatively after every sign-in.

use rollcall_core::{
  identity::{Provider, ProviderProfile},
  organization::NewOrganization,
  store::ReconciliationStore,
};
use uuid::Uuid;

use crate::error::{EngineError, Result};

// ─── Provider cache repair ───────────────────────────────────────────────────

/// What a caching-repair pass did.
#[derive(Debug, Clone, Default)]
pub struct RepairOutcome {
  /// `false` when no identity link exists: with nothing authoritative to
  /// enforce, no caching is touched.
  pub executed:              bool,
  pub voters_cleared:        u64,
  pub organizations_cleared: u64,
  pub owner_refreshed:       bool,
}

/// Find every voter and organization holding stale cached copies of this
/// identity's attributes and demote them; then make sure the authoritative
/// owner's cache is populated from the freshest provider data available.
pub async fn repair_provider_caching<S: ReconciliationStore>(
  store: &S,
  provider: Provider,
  external_user_id: i64,
  fresh: Option<&ProviderProfile>,
) -> Result<RepairOutcome> {
  let mut outcome = RepairOutcome::default();

  let Some(link) = store
    .find_identity_link(provider, external_user_id)
    .await
    .map_err(EngineError::store)?
  else {
    // No authoritative link; leave all caching alone.
    return Ok(outcome);
  };
  outcome.executed = true;

  let owner = store
    .get_voter(link.voter_id)
    .await
    .map_err(EngineError::store)?
    .ok_or(EngineError::VoterNotFound(link.voter_id))?;

  // Prefer the provider-fresh screen name for the scan so renamed handles
  // still match stale cache rows.
  let screen_name = fresh
    .and_then(|p| p.screen_name.as_deref())
    .or(owner.provider_cache(provider).screen_name.as_deref());

  let holders = store
    .voters_with_cached_identity(provider, external_user_id, screen_name)
    .await
    .map_err(EngineError::store)?;

  for mut voter in holders {
    if voter.voter_id == owner.voter_id {
      continue;
    }
    voter.provider_cache_mut(provider).clear();
    match store.update_voter(voter).await {
      Ok(()) => outcome.voters_cleared += 1,
      Err(err) => {
        tracing::warn!(%provider, external_user_id, error = %err, "could not clear stale voter cache");
      }
    }
  }

  // Organizations caching this identity are legitimate only when they are
  // the owner's own linked organization.
  let org_holders = store
    .organizations_with_cached_identity(provider, external_user_id)
    .await
    .map_err(EngineError::store)?;

  for mut organization in org_holders {
    if Some(organization.organization_id) == owner.linked_organization_id {
      continue;
    }
    organization.provider_cache_mut(provider).clear();
    match store.update_organization(organization).await {
      Ok(()) => outcome.organizations_cleared += 1,
      Err(err) => {
        tracing::warn!(%provider, external_user_id, error = %err, "could not clear stale organization cache");
      }
    }
  }

  // Refresh the owner's cache. Re-read first — the owner may have been one
  // of the scanned rows rewritten above.
  let mut owner = store
    .get_voter(link.voter_id)
    .await
    .map_err(EngineError::store)?
    .ok_or(EngineError::VoterNotFound(link.voter_id))?;

  let cache = owner.provider_cache_mut(provider);
  let mut changed = false;
  if cache.external_user_id != Some(external_user_id) {
    cache.external_user_id = Some(external_user_id);
    changed = true;
  }
  if let Some(profile) = fresh {
    if profile.screen_name.is_some() && cache.screen_name != profile.screen_name {
      cache.screen_name = profile.screen_name.clone();
      changed = true;
    }
    if profile.display_name.is_some() && cache.display_name != profile.display_name {
      cache.display_name = profile.display_name.clone();
      changed = true;
    }
    if profile.profile_image_url.is_some()
      && cache.profile_image_url != profile.profile_image_url
    {
      cache.profile_image_url = profile.profile_image_url.clone();
      changed = true;
    }
  }
  if changed {
    store.update_voter(owner).await.map_err(EngineError::store)?;
    outcome.owner_refreshed = true;
  }

  Ok(outcome)
}

// ─── Position repair ─────────────────────────────────────────────────────────

/// What a position-repair pass did.
#[derive(Debug, Clone, Default)]
pub struct PositionRepairOutcome {
  /// Set when the voter had position data but no linked organization, and
  /// one was auto-created.
  pub organization_created: Option<Uuid>,
  /// Positions whose organization reference was re-pointed at the voter's
  /// linked organization.
  pub repointed:            u64,
}

/// Self-healing pass over one voter's positions: ensure a linked
/// organization exists when position data does, and fix dangling or stale
/// organization references before (and after) a transfer.
pub async fn repair_voter_positions<S: ReconciliationStore>(
  store: &S,
  voter_id: Uuid,
) -> Result<PositionRepairOutcome> {
  let mut outcome = PositionRepairOutcome::default();

  let mut voter = store
    .get_voter(voter_id)
    .await
    .map_err(EngineError::store)?
    .ok_or(EngineError::VoterNotFound(voter_id))?;

  let positions = store
    .positions_for_voter(voter_id)
    .await
    .map_err(EngineError::store)?;
  if positions.is_empty() {
    return Ok(outcome);
  }

  if voter.linked_organization_id.is_none() {
    let organization = store
      .create_organization(NewOrganization {
        name:     voter.full_name(),
        twitter:  voter.twitter.clone(),
        facebook: voter.facebook.clone(),
      })
      .await
      .map_err(EngineError::store)?;
    voter.linked_organization_id = Some(organization.organization_id);
    store
      .update_voter(voter.clone())
      .await
      .map_err(EngineError::store)?;
    outcome.organization_created = Some(organization.organization_id);
  }

  let linked = voter.linked_organization_id;
  for mut position in positions {
    if position.organization_id == linked {
      continue;
    }
    position.organization_id = linked;
    match store.update_position(position).await {
      Ok(()) => outcome.repointed += 1,
      Err(err) => {
        tracing::warn!(%voter_id, error = %err, "could not re-point position organization");
      }
    }
  }

  Ok(outcome)
}
