//! Mover for email address entries.

use rollcall_core::store::ReconciliationStore;

use super::{MoveOutcome, RecordMover};
use crate::{merge::MergeContext, report::MergeStep};

/// Reassigns the losing voter's email entries. Addresses are globally unique
/// so there is nothing to de-duplicate — every entry moves. Clearing the
/// losing voter's cached email projection happens in the workflow step that
/// wraps this mover, after the entries are safely across.
pub struct EmailEntryMover;

impl<S: ReconciliationStore> RecordMover<S> for EmailEntryMover {
  fn step(&self) -> MergeStep { MergeStep::MoveEmailEntries }

  async fn move_records(&self, store: &S, ctx: &MergeContext) -> MoveOutcome {
    if ctx.from_voter == ctx.to_voter {
      return MoveOutcome::noop();
    }
    let mut outcome = MoveOutcome::default();

    let entries = match store.email_entries_for_voter(ctx.from_voter).await {
      Ok(entries) => entries,
      Err(err) => {
        outcome
          .failures
          .push(format!("listing source email entries: {err}"));
        return outcome;
      }
    };

    for mut entry in entries {
      entry.voter_id = ctx.to_voter;
      match store.update_email_entry(entry).await {
        Ok(()) => outcome.moved += 1,
        Err(err) => outcome.failures.push(format!("moving email entry: {err}")),
      }
    }

    outcome
  }
}
