//! Sign-in collision resolution.
//!
//! The entry point of the engine: a sign-in event (device session plus an
//! authenticated external identity) either attaches the identity to the
//! session's current voter, or discovers that the identity already belongs
//! to someone else and folds the session's voter into that prior owner.
//! The OAuth exchange itself happens in an external collaborator; this
//! module only consumes its output.

use std::sync::Arc;

use chrono::Utc;
use rollcall_core::{
  identity::{AuthSession, LinkAttempt, Provider, ProviderProfile},
  records::EmailEntry,
  store::ReconciliationStore,
};
use uuid::Uuid;

use crate::{
  error::{EngineError, Result},
  locks::VoterLocks,
  merge,
  repair::{self, RepairOutcome},
  report::MergeReport,
};

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Output of a completed provider authentication, as delivered by the OAuth
/// collaborator.
#[derive(Debug, Clone)]
pub struct SignInEvent {
  pub device_session_id: String,
  pub provider:          Provider,
  pub external_user_id:  i64,
  /// An email address the provider asserts is verified for this account.
  pub verified_email:    Option<String>,
  pub profile:           ProviderProfile,
}

/// Which prior owner is treated as canonical when the provider identity and
/// the verified email each point at a *different* existing voter.
///
/// The source system resolved this by accident of check ordering; here it is
/// an explicit product decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergePrecedence {
  /// The provider-linked voter wins; the email-linked voter is folded into
  /// it. Keeps the identity link authoritative for the final owner.
  #[default]
  PreferIdentityOwner,
  /// The email-linked voter wins; the provider-linked voter is folded into
  /// it. The identity link then points at a husk until re-linked.
  PreferEmailOwner,
}

// ─── Outputs ─────────────────────────────────────────────────────────────────

/// How the external identity related to the session's voter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInResolution {
  /// No prior owner existed; the identity now belongs to the session voter
  /// (or to a legacy cache-holder it was linked to).
  NotLinked,
  /// The identity was already linked to the session's own voter.
  LinkedToSelf,
  /// The identity belonged to a different voter; merges were run.
  LinkedToOther,
}

/// The terminal state of one sign-in attempt. Sign-in succeeds even when a
/// merge step failed or halted — data repair is a later re-run's job, never
/// a reason to block the user.
#[derive(Debug)]
pub struct SignInOutcome {
  /// The canonical voter the device session is now bound to.
  pub voter_id:   Uuid,
  pub resolution: SignInResolution,
  /// Reports for every merge run during this sign-in, in execution order.
  /// More than one when the verified email chained a second merge.
  pub merges:     Vec<MergeReport>,
  pub repair:     RepairOutcome,
}

// ─── Reconciler ──────────────────────────────────────────────────────────────

/// The reconciliation engine root. Generic over the storage backend; owns
/// the per-voter advisory locks that serialise in-process merges.
pub struct Reconciler<S> {
  store:      Arc<S>,
  locks:      VoterLocks,
  precedence: MergePrecedence,
}

impl<S: ReconciliationStore> Reconciler<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self::with_precedence(store, MergePrecedence::default())
  }

  pub fn with_precedence(store: Arc<S>, precedence: MergePrecedence) -> Self {
    Self {
      store,
      locks: VoterLocks::default(),
      precedence,
    }
  }

  pub fn store(&self) -> &S { &self.store }

  /// Provider OAuth/session state for an anonymous device, created on first
  /// access. Called by the OAuth collaborator before any voter is confirmed.
  pub async fn begin_auth_session(
    &self,
    provider: Provider,
    device_session_id: &str,
  ) -> Result<AuthSession> {
    self
      .store
      .retrieve_or_create_auth_session(provider, device_session_id)
      .await
      .map_err(EngineError::store)
  }

  /// Run the full merge workflow, folding `from` into `to`, holding both
  /// voters' advisory locks for the duration.
  pub async fn merge_voters(&self, from: Uuid, to: Uuid) -> Result<MergeReport> {
    let _guards = self.locks.lock_pair(from, to).await;
    let report = merge::run_merge(self.store.as_ref(), from, to).await?;
    if report.completed {
      tracing::info!(report = %report.render(), "merge finished");
    } else {
      tracing::warn!(report = %report.render(), "merge halted for manual intervention");
    }
    Ok(report)
  }

  /// Idempotent caching repair for one provider identity; see
  /// [`repair::repair_provider_caching`].
  pub async fn repair_provider_caching(
    &self,
    provider: Provider,
    external_user_id: i64,
    fresh: Option<&ProviderProfile>,
  ) -> Result<RepairOutcome> {
    repair::repair_provider_caching(self.store.as_ref(), provider, external_user_id, fresh)
      .await
  }

  /// Resolve one sign-in event end to end.
  ///
  /// State machine: the device's voter is resolved (created anonymously if
  /// the session is new), the identity link store is consulted, collisions
  /// are resolved by merge (the session's voter folds into the prior owner),
  /// the verified email may chain a second merge per [`MergePrecedence`],
  /// caching repair runs, and the device is re-bound to the canonical owner.
  pub async fn resolve_sign_in(&self, event: &SignInEvent) -> Result<SignInOutcome> {
    let store = self.store.as_ref();

    let current = match store
      .voter_for_device(&event.device_session_id)
      .await
      .map_err(EngineError::store)?
    {
      Some(voter_id) => voter_id,
      None => {
        let voter = store.create_voter().await.map_err(EngineError::store)?;
        store
          .bind_device(&event.device_session_id, voter.voter_id)
          .await
          .map_err(EngineError::store)?;
        voter.voter_id
      }
    };

    let (mut owner, resolution) = self.resolve_identity_owner(current, event).await?;

    let mut merges = Vec::new();
    if owner != current {
      // The prior owner is canonical: it has the history. The session's
      // (generally data-poor, freshly created) voter folds into it.
      merges.push(self.merge_voters(current, owner).await?);
    }

    if let Some(address) = event.verified_email.as_deref() {
      match store
        .voter_by_verified_email(address)
        .await
        .map_err(EngineError::store)?
      {
        Some(email_owner) if email_owner.voter_id != owner => {
          let (merge_from, merge_to) = match self.precedence {
            MergePrecedence::PreferIdentityOwner => (email_owner.voter_id, owner),
            MergePrecedence::PreferEmailOwner => (owner, email_owner.voter_id),
          };
          merges.push(self.merge_voters(merge_from, merge_to).await?);
          owner = merge_to;
        }
        Some(_) => {}
        None => self.attach_verified_email(owner, address).await,
      }
    }

    let repair = repair::repair_provider_caching(
      store,
      event.provider,
      event.external_user_id,
      Some(&event.profile),
    )
    .await?;

    store
      .bind_device(&event.device_session_id, owner)
      .await
      .map_err(EngineError::store)?;

    Ok(SignInOutcome {
      voter_id: owner,
      resolution,
      merges,
      repair,
    })
  }

  /// Consult the identity link store for the authoritative owner of the
  /// event's identity, creating the link when none exists.
  ///
  /// When there is no link yet but a voter row still carries this provider
  /// id in its cache (a record predating the link store), the link is
  /// created to that legacy holder rather than to the session voter.
  async fn resolve_identity_owner(
    &self,
    current: Uuid,
    event: &SignInEvent,
  ) -> Result<(Uuid, SignInResolution)> {
    let store = self.store.as_ref();

    if let Some(link) = store
      .find_identity_link(event.provider, event.external_user_id)
      .await
      .map_err(EngineError::store)?
    {
      return Ok(if link.voter_id == current {
        (current, SignInResolution::LinkedToSelf)
      } else {
        (link.voter_id, SignInResolution::LinkedToOther)
      });
    }

    let legacy_holder = store
      .voters_with_cached_identity(event.provider, event.external_user_id, None)
      .await
      .map_err(EngineError::store)?
      .into_iter()
      .next();
    let target = legacy_holder.map(|voter| voter.voter_id).unwrap_or(current);

    let attempt = store
      .create_identity_link(event.provider, event.external_user_id, target)
      .await
      .map_err(EngineError::store)?;

    Ok(match attempt {
      LinkAttempt::Linked(link) if link.voter_id == current => {
        (current, SignInResolution::NotLinked)
      }
      LinkAttempt::Linked(link) => (link.voter_id, SignInResolution::LinkedToOther),
      // Lost a racing link creation; whoever got there first owns it.
      LinkAttempt::Conflict { existing } if existing.voter_id == current => {
        (current, SignInResolution::LinkedToSelf)
      }
      LinkAttempt::Conflict { existing } => {
        (existing.voter_id, SignInResolution::LinkedToOther)
      }
    })
  }

  /// Record a provider-verified email for the canonical owner: an entry in
  /// the email table plus the cached projection when none is set.
  /// Best-effort — a failure here is repaired at the next sign-in.
  async fn attach_verified_email(&self, owner: Uuid, address: &str) {
    let store = self.store.as_ref();

    let existing = match store.email_entries_for_voter(owner).await {
      Ok(entries) => entries
        .into_iter()
        .find(|entry| entry.address.eq_ignore_ascii_case(address)),
      Err(err) => {
        tracing::warn!(error = %err, "could not list owner email entries");
        return;
      }
    };

    let entry_id = match existing {
      Some(entry) => entry.email_id,
      None => {
        let entry = EmailEntry {
          email_id:   Uuid::new_v4(),
          voter_id:   owner,
          address:    address.to_owned(),
          verified:   true,
          created_at: Utc::now(),
        };
        let entry_id = entry.email_id;
        if let Err(err) = store.add_email_entry(entry).await {
          tracing::warn!(error = %err, "could not record verified email entry");
          return;
        }
        entry_id
      }
    };

    match store.get_voter(owner).await {
      Ok(Some(mut voter)) if voter.email.is_none() => {
        voter.email = Some(address.to_owned());
        voter.primary_email_id = Some(entry_id);
        voter.email_verified = true;
        if let Err(err) = store.update_voter(voter).await {
          tracing::warn!(error = %err, "could not cache verified email on owner");
        }
      }
      Ok(_) => {}
      Err(err) => tracing::warn!(error = %err, "could not load owner for email caching"),
    }
  }
}
