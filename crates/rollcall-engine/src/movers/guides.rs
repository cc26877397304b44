//! Mover for voter guide ownership.

use std::collections::HashSet;

use rollcall_core::store::ReconciliationStore;

use super::{MoveOutcome, RecordMover};
use crate::{merge::MergeContext, report::MergeStep};

/// Moves voter guides, de-duplicating by election: one owner publishes at
/// most one guide per election, and the winning voter's guide takes
/// precedence. Moved guides are re-pointed at the winning voter's linked
/// organization.
pub struct VoterGuideMover;

impl<S: ReconciliationStore> RecordMover<S> for VoterGuideMover {
  fn step(&self) -> MergeStep { MergeStep::MoveVoterGuides }

  async fn move_records(&self, store: &S, ctx: &MergeContext) -> MoveOutcome {
    if ctx.from_voter == ctx.to_voter {
      return MoveOutcome::noop();
    }
    let mut outcome = MoveOutcome::default();

    let from_guides = match store.guides_for_voter(ctx.from_voter).await {
      Ok(guides) => guides,
      Err(err) => {
        outcome.failures.push(format!("listing source guides: {err}"));
        return outcome;
      }
    };
    if from_guides.is_empty() {
      return outcome;
    }

    let existing: HashSet<String> = match store.guides_for_voter(ctx.to_voter).await {
      Ok(guides) => guides.into_iter().map(|g| g.election_id).collect(),
      Err(err) => {
        outcome
          .failures
          .push(format!("listing destination guides: {err}"));
        return outcome;
      }
    };

    for mut guide in from_guides {
      if existing.contains(&guide.election_id) {
        match store.delete_voter_guide(guide.guide_id).await {
          Ok(()) => outcome.skipped += 1,
          Err(err) => outcome.failures.push(format!(
            "dropping duplicate guide {}: {err}",
            guide.guide_id
          )),
        }
        continue;
      }

      guide.owner_voter_id = ctx.to_voter;
      guide.organization_id = ctx.to_organization;
      match store.update_voter_guide(guide).await {
        Ok(()) => outcome.moved += 1,
        Err(err) => outcome.failures.push(format!("moving guide: {err}")),
      }
    }

    outcome
  }
}
