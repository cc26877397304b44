//! Mover for voter-owned ballot positions.

use std::collections::HashSet;

use rollcall_core::store::ReconciliationStore;

use super::{MoveOutcome, RecordMover};
use crate::{merge::MergeContext, report::MergeStep};

/// Moves the losing voter's positions, re-pointing the denormalised
/// organization reference to the winning voter's linked organization.
/// De-duplicates by ballot item: if the winning voter already took a stance
/// on the same item, the losing voter's position is dropped.
///
/// Runs after organization resolution so `ctx.to_organization` is final.
pub struct PositionMover;

impl<S: ReconciliationStore> RecordMover<S> for PositionMover {
  fn step(&self) -> MergeStep { MergeStep::MovePositions }

  async fn move_records(&self, store: &S, ctx: &MergeContext) -> MoveOutcome {
    if ctx.from_voter == ctx.to_voter {
      return MoveOutcome::noop();
    }
    let mut outcome = MoveOutcome::default();

    let from_positions = match store.positions_for_voter(ctx.from_voter).await {
      Ok(positions) => positions,
      Err(err) => {
        outcome
          .failures
          .push(format!("listing source positions: {err}"));
        return outcome;
      }
    };
    if from_positions.is_empty() {
      return outcome;
    }

    let existing: HashSet<String> = match store.positions_for_voter(ctx.to_voter).await {
      Ok(positions) => positions.into_iter().map(|p| p.ballot_item_id).collect(),
      Err(err) => {
        outcome
          .failures
          .push(format!("listing destination positions: {err}"));
        return outcome;
      }
    };

    for mut position in from_positions {
      if existing.contains(&position.ballot_item_id) {
        match store.delete_position(position.position_id).await {
          Ok(()) => outcome.skipped += 1,
          Err(err) => outcome.failures.push(format!(
            "dropping duplicate position {}: {err}",
            position.position_id
          )),
        }
        continue;
      }

      position.voter_id = Some(ctx.to_voter);
      position.organization_id = ctx.to_organization;
      match store.update_position(position).await {
        Ok(()) => outcome.moved += 1,
        Err(err) => outcome.failures.push(format!("moving position: {err}")),
      }
    }

    outcome
  }
}
