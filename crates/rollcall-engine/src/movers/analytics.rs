//! Mover for analytics events.

use rollcall_core::store::ReconciliationStore;

use super::{MoveOutcome, RecordMover};
use crate::{merge::MergeContext, report::MergeStep};

/// Bulk-reassigns analytics events. Events carry no natural key (every one
/// is a fact about what happened), so nothing is de-duplicated.
pub struct AnalyticsMover;

impl<S: ReconciliationStore> RecordMover<S> for AnalyticsMover {
  fn step(&self) -> MergeStep { MergeStep::MoveAnalytics }

  async fn move_records(&self, store: &S, ctx: &MergeContext) -> MoveOutcome {
    if ctx.from_voter == ctx.to_voter {
      return MoveOutcome::noop();
    }
    let mut outcome = MoveOutcome::default();

    match store
      .reassign_analytics_events(ctx.from_voter, ctx.to_voter)
      .await
    {
      Ok(moved) => outcome.moved = moved,
      Err(err) => outcome
        .failures
        .push(format!("reassigning analytics events: {err}")),
    }

    outcome
  }
}
