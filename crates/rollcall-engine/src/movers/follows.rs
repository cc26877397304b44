//! Mover for follow relationships.

use std::collections::HashSet;

use rollcall_core::{records::FollowTarget, store::ReconciliationStore};

use super::{MoveOutcome, RecordMover};
use crate::{merge::MergeContext, report::MergeStep};

/// Moves follows from the losing voter, de-duplicating by target: if the
/// winning voter already follows the same organization or issue, the losing
/// voter's follow is dropped rather than merged further.
pub struct FollowMover;

impl<S: ReconciliationStore> RecordMover<S> for FollowMover {
  fn step(&self) -> MergeStep { MergeStep::MoveFollows }

  async fn move_records(&self, store: &S, ctx: &MergeContext) -> MoveOutcome {
    if ctx.from_voter == ctx.to_voter {
      return MoveOutcome::noop();
    }
    let mut outcome = MoveOutcome::default();

    let from_follows = match store.follows_for_voter(ctx.from_voter).await {
      Ok(follows) => follows,
      Err(err) => {
        outcome.failures.push(format!("listing source follows: {err}"));
        return outcome;
      }
    };
    if from_follows.is_empty() {
      return outcome;
    }

    let existing: HashSet<FollowTarget> = match store.follows_for_voter(ctx.to_voter).await {
      Ok(follows) => follows.into_iter().map(|f| f.target).collect(),
      Err(err) => {
        outcome
          .failures
          .push(format!("listing destination follows: {err}"));
        return outcome;
      }
    };

    for mut follow in from_follows {
      if existing.contains(&follow.target) {
        match store.delete_follow(follow.follow_id).await {
          Ok(()) => outcome.skipped += 1,
          Err(err) => outcome
            .failures
            .push(format!("dropping duplicate follow {}: {err}", follow.follow_id)),
        }
        continue;
      }

      follow.voter_id = ctx.to_voter;
      match store.update_follow(follow).await {
        Ok(()) => outcome.moved += 1,
        Err(err) => outcome.failures.push(format!("moving follow: {err}")),
      }
    }

    outcome
  }
}
