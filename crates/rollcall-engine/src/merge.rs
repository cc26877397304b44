//! The account-merge workflow.
//!
//! An explicit pipeline of named steps over a shared [`MergeContext`]. Order
//! matters: organization resolution must precede the position move (positions
//! reference organization identity), and the email move must precede clearing
//! the loser's cached email fields. Every mover de-duplicates by natural key
//! before creating, so the whole workflow is re-entrant: re-running after a
//! partial failure makes forward progress without duplicating records.
//!
//! There is no transaction spanning the steps. A write failure inside a step
//! is logged, recorded in the report, and left for a re-run — only
//! [`StepOutcome::ManualInterventionRequired`] halts the pipeline.

use std::collections::HashSet;

use rollcall_core::store::ReconciliationStore;
use uuid::Uuid;

use crate::{
  error::{EngineError, Result},
  movers::{
    AnalyticsMover, DonationMover, EmailEntryMover, FollowMover,
    FriendInviteMover, FriendshipMover, MoveOutcome, PositionMover,
    RecordMover, VoterGuideMover,
  },
  repair::repair_voter_positions,
  report::{MergeReport, MergeStep, StepOutcome},
};

// ─── Context ─────────────────────────────────────────────────────────────────

/// Resolved ids threaded through every step of one merge run. Organization
/// ids are re-resolved after the opening repair and after organization
/// resolution, so later steps always see the final destination.
#[derive(Debug, Clone, Copy)]
pub struct MergeContext {
  pub from_voter:        Uuid,
  pub to_voter:          Uuid,
  pub from_organization: Option<Uuid>,
  pub to_organization:   Option<Uuid>,
}

// ─── Workflow ────────────────────────────────────────────────────────────────

/// Run the full merge workflow, folding `from` into `to`.
///
/// Returns the structured report; `report.completed == false` means the
/// workflow halted on a manual-intervention condition. A self-merge returns
/// an empty completed report without touching the store.
pub(crate) async fn run_merge<S: ReconciliationStore>(
  store: &S,
  from: Uuid,
  to: Uuid,
) -> Result<MergeReport> {
  let mut report = MergeReport::new(from, to);
  if from == to {
    return Ok(report);
  }

  let from_voter = store
    .get_voter(from)
    .await
    .map_err(EngineError::store)?
    .ok_or(EngineError::VoterNotFound(from))?;
  let to_voter = store
    .get_voter(to)
    .await
    .map_err(EngineError::store)?
    .ok_or(EngineError::VoterNotFound(to))?;

  let mut ctx = MergeContext {
    from_voter:        from,
    to_voter:          to,
    from_organization: from_voter.linked_organization_id,
    to_organization:   to_voter.linked_organization_id,
  };

  // 1. Opening repair on both sides. Creates a missing linked organization
  //    where position data exists and fixes dangling references, shrinking
  //    the failure surface of everything below.
  run_position_repair(
    store,
    &[from, to],
    MergeStep::RepairPositionsOpening,
    &mut report,
  )
  .await;
  refresh_organizations(store, &mut ctx).await;

  // 2. Follows.
  run_mover(store, &FollowMover, &ctx, &mut report).await;

  // 3. Organizations. The only step allowed to halt the workflow.
  if resolve_organizations(store, &mut ctx, &mut report).await? == OrgResolution::Halt {
    report.completed = false;
    return Ok(report);
  }

  // 4. Voter-owned positions, onto the resolved destination organization.
  run_mover(store, &PositionMover, &ctx, &mut report).await;

  // 5. Friends, then pending invitations.
  run_mover(store, &FriendshipMover, &ctx, &mut report).await;
  run_mover(store, &FriendInviteMover, &ctx, &mut report).await;

  // 6. Email entries; afterwards clear the loser's cached email projection
  //    so the next merge attempt cannot trip the unique address constraint.
  run_mover(store, &EmailEntryMover, &ctx, &mut report).await;
  settle_email_caches(store, &ctx).await;

  // 7. Release the loser's organization pointer.
  clear_from_organization_pointer(store, &ctx, &mut report).await;

  // 8. Provider profile caches — a field copy, winner keeps non-empty fields.
  move_provider_cache(store, &ctx, &mut report).await;

  // 9. Donations, voter guides, analytics.
  run_mover(store, &DonationMover, &ctx, &mut report).await;
  run_mover(store, &VoterGuideMover, &ctx, &mut report).await;
  run_mover(store, &AnalyticsMover, &ctx, &mut report).await;

  // 10. Remaining scalar fields — non-destructive union.
  union_scalar_fields(store, &ctx, &mut report).await;

  // 11. Closing repair on the winner, catching positions whose organization
  //     pointer only became valid during step 3.
  run_position_repair(store, &[to], MergeStep::RepairPositionsClosing, &mut report).await;

  Ok(report)
}

// ─── Step helpers ────────────────────────────────────────────────────────────

async fn run_mover<S, M>(
  store: &S,
  mover: &M,
  ctx: &MergeContext,
  report: &mut MergeReport,
) where
  S: ReconciliationStore,
  M: RecordMover<S>,
{
  let outcome = mover.move_records(store, ctx).await;
  record_outcome(report, mover.step(), outcome);
}

fn record_outcome(report: &mut MergeReport, step: MergeStep, outcome: MoveOutcome) {
  for failure in &outcome.failures {
    tracing::warn!(step = %step, failure = %failure, "merge sub-step write failure");
  }
  if !outcome.is_clean() {
    report.push(
      step,
      StepOutcome::Failed,
      format!(
        "moved {}, skipped {}; {}",
        outcome.moved,
        outcome.skipped,
        outcome.failures.join("; "),
      ),
    );
  } else if outcome.is_noop() {
    report.push(step, StepOutcome::Noop, "");
  } else {
    report.push(
      step,
      StepOutcome::Completed {
        moved:   outcome.moved,
        skipped: outcome.skipped,
      },
      "",
    );
  }
}

async fn run_position_repair<S: ReconciliationStore>(
  store: &S,
  voters: &[Uuid],
  step: MergeStep,
  report: &mut MergeReport,
) {
  let mut outcome = MoveOutcome::default();
  let mut created = Vec::new();

  for &voter_id in voters {
    match repair_voter_positions(store, voter_id).await {
      Ok(repair) => {
        outcome.moved += repair.repointed;
        if let Some(org_id) = repair.organization_created {
          created.push(org_id);
        }
      }
      Err(err) => outcome
        .failures
        .push(format!("repairing positions of {voter_id}: {err}")),
    }
  }

  if outcome.is_clean() && !created.is_empty() {
    let detail = format!(
      "created linked organizations: {}",
      created
        .iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(", "),
    );
    report.push(
      step,
      StepOutcome::Completed {
        moved:   outcome.moved,
        skipped: 0,
      },
      detail,
    );
  } else {
    record_outcome(report, step, outcome);
  }
}

/// Re-read both voters' linked organizations into the context. Best-effort:
/// a read failure here leaves the context stale and is caught by the later
/// steps' own error handling.
async fn refresh_organizations<S: ReconciliationStore>(
  store: &S,
  ctx: &mut MergeContext,
) {
  match store.get_voter(ctx.from_voter).await {
    Ok(Some(voter)) => ctx.from_organization = voter.linked_organization_id,
    Ok(None) => {}
    Err(err) => tracing::warn!(error = %err, "could not refresh source organization"),
  }
  match store.get_voter(ctx.to_voter).await {
    Ok(Some(voter)) => ctx.to_organization = voter.linked_organization_id,
    Ok(None) => {}
    Err(err) => tracing::warn!(error = %err, "could not refresh destination organization"),
  }
}

// ─── Organization resolution ─────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
enum OrgResolution {
  Continue,
  Halt,
}

/// Resolve the two linked organizations.
///
/// Both present and different: fold the loser's organization into the
/// winner's — unless bookmarks reference either organization, which is the
/// hard stop (automatic merge would silently orphan them). Only the loser
/// has one: the winner adopts the pointer directly. A winner with position
/// data but no organization was already handled by the opening repair.
async fn resolve_organizations<S: ReconciliationStore>(
  store: &S,
  ctx: &mut MergeContext,
  report: &mut MergeReport,
) -> Result<OrgResolution> {
  let step = MergeStep::ResolveOrganizations;

  match (ctx.from_organization, ctx.to_organization) {
    (None, _) => {
      report.push(step, StepOutcome::Noop, "");
      Ok(OrgResolution::Continue)
    }

    (Some(from_org), Some(to_org)) if from_org == to_org => {
      report.push(step, StepOutcome::Noop, "already the same organization");
      Ok(OrgResolution::Continue)
    }

    (Some(from_org), Some(to_org)) => {
      let from_marks = store
        .count_bookmarks_referencing_organization(from_org)
        .await
        .map_err(EngineError::store)?;
      let to_marks = store
        .count_bookmarks_referencing_organization(to_org)
        .await
        .map_err(EngineError::store)?;
      if from_marks + to_marks > 0 {
        report.push(
          step,
          StepOutcome::ManualInterventionRequired,
          format!(
            "{} bookmarks reference the organizations being merged",
            from_marks + to_marks,
          ),
        );
        return Ok(OrgResolution::Halt);
      }

      let outcome = merge_organization_content(store, ctx, from_org, to_org).await;
      record_outcome(report, step, outcome);
      Ok(OrgResolution::Continue)
    }

    (Some(from_org), None) => {
      // Direct adoption — a pointer reassignment, no content merge needed.
      let mut outcome = MoveOutcome::default();

      // Release any holder of the pointer other than the two merging
      // voters, so the adoption cannot trip a collision later.
      match store.voter_by_linked_organization(from_org).await {
        Ok(Some(mut holder))
          if holder.voter_id != ctx.from_voter && holder.voter_id != ctx.to_voter =>
        {
          holder.linked_organization_id = None;
          if let Err(err) = store.update_voter(holder).await {
            outcome
              .failures
              .push(format!("releasing colliding organization holder: {err}"));
          }
        }
        Ok(_) => {}
        Err(err) => outcome
          .failures
          .push(format!("checking for colliding organization holder: {err}")),
      }

      match store.get_voter(ctx.to_voter).await {
        Ok(Some(mut winner)) => {
          winner.linked_organization_id = Some(from_org);
          match store.update_voter(winner).await {
            Ok(()) => {
              ctx.to_organization = Some(from_org);
              outcome.moved += 1;
            }
            Err(err) => outcome
              .failures
              .push(format!("adopting organization: {err}")),
          }
        }
        Ok(None) => outcome
          .failures
          .push(format!("winner {} disappeared mid-merge", ctx.to_voter)),
        Err(err) => outcome.failures.push(format!("loading winner: {err}")),
      }

      if outcome.is_clean() {
        report.push(
          step,
          StepOutcome::Completed { moved: 1, skipped: 0 },
          format!("adopted organization {from_org}"),
        );
      } else {
        record_outcome(report, step, outcome);
      }
      Ok(OrgResolution::Continue)
    }
  }
}

/// Fold the content of `from_org` into `to_org`: organization-owned
/// positions move across (de-duplicated by ballot item), cached provider
/// attributes union into the target, and the husk's caches are cleared so
/// caching repair never mistakes it for the live organization.
async fn merge_organization_content<S: ReconciliationStore>(
  store: &S,
  ctx: &MergeContext,
  from_org: Uuid,
  to_org: Uuid,
) -> MoveOutcome {
  let mut outcome = MoveOutcome::default();

  let from_positions = match store.positions_for_organization(from_org).await {
    Ok(positions) => positions,
    Err(err) => {
      outcome
        .failures
        .push(format!("listing source organization positions: {err}"));
      return outcome;
    }
  };

  let existing: HashSet<String> = match store.positions_for_organization(to_org).await {
    Ok(positions) => positions.into_iter().map(|p| p.ballot_item_id).collect(),
    Err(err) => {
      outcome
        .failures
        .push(format!("listing destination organization positions: {err}"));
      return outcome;
    }
  };

  for mut position in from_positions {
    if existing.contains(&position.ballot_item_id) {
      match store.delete_position(position.position_id).await {
        Ok(()) => outcome.skipped += 1,
        Err(err) => outcome.failures.push(format!(
          "dropping duplicate organization position {}: {err}",
          position.position_id
        )),
      }
      continue;
    }

    position.organization_id = Some(to_org);
    if position.voter_id == Some(ctx.from_voter) {
      position.voter_id = Some(ctx.to_voter);
    }
    match store.update_position(position).await {
      Ok(()) => outcome.moved += 1,
      Err(err) => outcome
        .failures
        .push(format!("moving organization position: {err}")),
    }
  }

  let from_loaded = store.get_organization(from_org).await;
  let to_loaded = store.get_organization(to_org).await;
  match (from_loaded, to_loaded) {
    (Ok(Some(mut source)), Ok(Some(mut target))) => {
      target.twitter.absorb(&source.twitter);
      target.facebook.absorb(&source.facebook);
      target.follower_count = target.follower_count.max(source.follower_count);
      if target.name.is_none() {
        target.name = source.name.clone();
      }
      if let Err(err) = store.update_organization(target).await {
        outcome
          .failures
          .push(format!("updating target organization: {err}"));
      }

      source.twitter.clear();
      source.facebook.clear();
      if let Err(err) = store.update_organization(source).await {
        outcome
          .failures
          .push(format!("demoting source organization: {err}"));
      }
    }
    (Err(err), _) | (_, Err(err)) => {
      outcome
        .failures
        .push(format!("loading organizations for attribute merge: {err}"));
    }
    _ => {}
  }

  outcome
}

// ─── Field-level steps ───────────────────────────────────────────────────────

/// After the email entries moved: clear the loser's cached email projection,
/// and let the winner adopt it when the winner's own is empty. Failures here
/// are logged and left for a re-run.
async fn settle_email_caches<S: ReconciliationStore>(store: &S, ctx: &MergeContext) {
  let loser = match store.get_voter(ctx.from_voter).await {
    Ok(Some(voter)) => voter,
    Ok(None) => return,
    Err(err) => {
      tracing::warn!(error = %err, "could not load loser for email cache settle");
      return;
    }
  };

  let inherited = (loser.email_verified && loser.email.is_some())
    .then(|| (loser.email.clone(), loser.primary_email_id));

  let mut cleared = loser;
  cleared.clear_email_fields();
  if let Err(err) = store.update_voter(cleared).await {
    tracing::warn!(error = %err, "could not clear loser email fields");
  }

  if let Some((email, primary_email_id)) = inherited {
    match store.get_voter(ctx.to_voter).await {
      Ok(Some(mut winner)) if winner.email.is_none() => {
        winner.email = email;
        winner.primary_email_id = primary_email_id;
        winner.email_verified = true;
        if let Err(err) = store.update_voter(winner).await {
          tracing::warn!(error = %err, "could not adopt verified email onto winner");
        }
      }
      Ok(_) => {}
      Err(err) => {
        tracing::warn!(error = %err, "could not load winner for email adoption");
      }
    }
  }
}

async fn clear_from_organization_pointer<S: ReconciliationStore>(
  store: &S,
  ctx: &MergeContext,
  report: &mut MergeReport,
) {
  let step = MergeStep::ClearFromOrganizationPointer;

  match store.get_voter(ctx.from_voter).await {
    Ok(Some(mut loser)) => {
      if loser.linked_organization_id.is_none() {
        report.push(step, StepOutcome::Noop, "");
        return;
      }
      loser.linked_organization_id = None;
      match store.update_voter(loser).await {
        Ok(()) => report.push(step, StepOutcome::Completed { moved: 1, skipped: 0 }, ""),
        Err(err) => {
          tracing::warn!(step = %step, error = %err, "merge sub-step write failure");
          report.push(step, StepOutcome::Failed, err.to_string());
        }
      }
    }
    Ok(None) => report.push(step, StepOutcome::Noop, "loser record missing"),
    Err(err) => report.push(step, StepOutcome::Failed, err.to_string()),
  }
}

/// Copy the loser's provider caches onto the winner (existing non-empty
/// winner fields win) and clear them on the loser's husk.
async fn move_provider_cache<S: ReconciliationStore>(
  store: &S,
  ctx: &MergeContext,
  report: &mut MergeReport,
) {
  let step = MergeStep::MoveProviderCache;

  let loser = match store.get_voter(ctx.from_voter).await {
    Ok(Some(voter)) => voter,
    Ok(None) => {
      report.push(step, StepOutcome::Noop, "loser record missing");
      return;
    }
    Err(err) => {
      report.push(step, StepOutcome::Failed, err.to_string());
      return;
    }
  };
  let winner = match store.get_voter(ctx.to_voter).await {
    Ok(Some(voter)) => voter,
    Ok(None) => {
      report.push(step, StepOutcome::Noop, "winner record missing");
      return;
    }
    Err(err) => {
      report.push(step, StepOutcome::Failed, err.to_string());
      return;
    }
  };

  let had_cache = !loser.twitter.is_empty() || !loser.facebook.is_empty();
  if !had_cache {
    report.push(step, StepOutcome::Noop, "");
    return;
  }

  let mut updated_winner = winner;
  updated_winner.twitter.absorb(&loser.twitter);
  updated_winner.facebook.absorb(&loser.facebook);

  let mut cleared_loser = loser;
  cleared_loser.twitter.clear();
  cleared_loser.facebook.clear();

  let mut failures = Vec::new();
  if let Err(err) = store.update_voter(updated_winner).await {
    failures.push(format!("updating winner caches: {err}"));
  }
  if let Err(err) = store.update_voter(cleared_loser).await {
    failures.push(format!("clearing loser caches: {err}"));
  }

  record_outcome(report, step, MoveOutcome {
    moved: 1,
    skipped: 0,
    failures,
  });
}

/// Non-destructive union of the remaining voter scalars: a name is copied
/// only into an empty winner field, and flag bits only ever turn on.
async fn union_scalar_fields<S: ReconciliationStore>(
  store: &S,
  ctx: &MergeContext,
  report: &mut MergeReport,
) {
  let step = MergeStep::UnionScalarFields;

  let loser = match store.get_voter(ctx.from_voter).await {
    Ok(Some(voter)) => voter,
    Ok(None) => {
      report.push(step, StepOutcome::Noop, "loser record missing");
      return;
    }
    Err(err) => {
      report.push(step, StepOutcome::Failed, err.to_string());
      return;
    }
  };
  let mut winner = match store.get_voter(ctx.to_voter).await {
    Ok(Some(voter)) => voter,
    Ok(None) => {
      report.push(step, StepOutcome::Noop, "winner record missing");
      return;
    }
    Err(err) => {
      report.push(step, StepOutcome::Failed, err.to_string());
      return;
    }
  };

  let mut changed = false;
  if winner.first_name.is_none() && loser.first_name.is_some() {
    winner.first_name = loser.first_name.clone();
    changed = true;
  }
  if winner.last_name.is_none() && loser.last_name.is_some() {
    winner.last_name = loser.last_name.clone();
    changed = true;
  }
  if (loser.interface_flags & !winner.interface_flags) != 0 {
    winner.set_interface_flags(loser.interface_flags);
    changed = true;
  }
  if (loser.notification_flags & !winner.notification_flags) != 0 {
    winner.set_notification_flags(loser.notification_flags);
    changed = true;
  }

  if !changed {
    report.push(step, StepOutcome::Noop, "");
    return;
  }

  match store.update_voter(winner).await {
    Ok(()) => report.push(step, StepOutcome::Completed { moved: 1, skipped: 0 }, ""),
    Err(err) => {
      tracing::warn!(step = %step, error = %err, "merge sub-step write failure");
      report.push(step, StepOutcome::Failed, err.to_string());
    }
  }
}
