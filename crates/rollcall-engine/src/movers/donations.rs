//! Mover for donation records.

use std::collections::HashSet;

use rollcall_core::store::ReconciliationStore;

use super::{MoveOutcome, RecordMover};
use crate::{merge::MergeContext, report::MergeStep};

/// Moves donations, de-duplicating by the payment processor's charge id —
/// the same charge recorded on both sides (e.g. from an earlier partial
/// merge) must not be double-counted.
pub struct DonationMover;

impl<S: ReconciliationStore> RecordMover<S> for DonationMover {
  fn step(&self) -> MergeStep { MergeStep::MoveDonations }

  async fn move_records(&self, store: &S, ctx: &MergeContext) -> MoveOutcome {
    if ctx.from_voter == ctx.to_voter {
      return MoveOutcome::noop();
    }
    let mut outcome = MoveOutcome::default();

    let from_donations = match store.donations_for_voter(ctx.from_voter).await {
      Ok(donations) => donations,
      Err(err) => {
        outcome
          .failures
          .push(format!("listing source donations: {err}"));
        return outcome;
      }
    };
    if from_donations.is_empty() {
      return outcome;
    }

    let existing: HashSet<String> = match store.donations_for_voter(ctx.to_voter).await {
      Ok(donations) => donations.into_iter().map(|d| d.charge_id).collect(),
      Err(err) => {
        outcome
          .failures
          .push(format!("listing destination donations: {err}"));
        return outcome;
      }
    };

    for mut donation in from_donations {
      if existing.contains(&donation.charge_id) {
        match store.delete_donation(donation.donation_id).await {
          Ok(()) => outcome.skipped += 1,
          Err(err) => outcome.failures.push(format!(
            "dropping duplicate donation {}: {err}",
            donation.donation_id
          )),
        }
        continue;
      }

      donation.voter_id = ctx.to_voter;
      match store.update_donation(donation).await {
        Ok(()) => outcome.moved += 1,
        Err(err) => outcome.failures.push(format!("moving donation: {err}")),
      }
    }

    outcome
  }
}
