//! Dependent-record movers.
//!
//! One mover per domain, all implementing the same contract: list the
//! records owned by the losing voter, drop those whose natural key already
//! exists on the winning side (counted as skipped, never an error), and
//! reassign the rest. A mover never raises — per-record write failures are
//! collected into the outcome and the workflow carries on.

use std::future::Future;

use rollcall_core::store::ReconciliationStore;

use crate::{merge::MergeContext, report::MergeStep};

mod analytics;
mod donations;
mod emails;
mod follows;
mod friends;
mod guides;
mod positions;

pub use analytics::AnalyticsMover;
pub use donations::DonationMover;
pub use emails::EmailEntryMover;
pub use follows::FollowMover;
pub use friends::{FriendInviteMover, FriendshipMover};
pub use guides::VoterGuideMover;
pub use positions::PositionMover;

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// Counts and captured failures from one mover run.
#[derive(Debug, Clone, Default)]
pub struct MoveOutcome {
  pub moved:    u64,
  /// Records dropped because the destination already held an equivalent
  /// record by natural key.
  pub skipped:  u64,
  pub failures: Vec<String>,
}

impl MoveOutcome {
  pub fn noop() -> Self { Self::default() }

  pub fn is_clean(&self) -> bool { self.failures.is_empty() }

  pub fn is_noop(&self) -> bool {
    self.moved == 0 && self.skipped == 0 && self.failures.is_empty()
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// A domain-specific record mover, invoked by the merge workflow.
///
/// Implementations must be safe to call with `from == to` (no-op), must
/// treat "nothing to move" as success, and must be re-entrant: a second run
/// over the same pair finds nothing left to move and changes nothing.
pub trait RecordMover<S: ReconciliationStore> {
  /// The workflow step this mover reports under.
  fn step(&self) -> MergeStep;

  fn move_records<'a>(
    &'a self,
    store: &'a S,
    ctx: &'a MergeContext,
  ) -> impl Future<Output = MoveOutcome> + Send + 'a;
}
