//! Movers for friend relationships and pending friend invitations.

use std::collections::HashSet;

use rollcall_core::{records::InviteRecipient, store::ReconciliationStore};
use uuid::Uuid;

use super::{MoveOutcome, RecordMover};
use crate::{merge::MergeContext, report::MergeStep};

// ─── Friendships ─────────────────────────────────────────────────────────────

/// Moves friendships, de-duplicating by the other party's voter id. A
/// friendship between the two merging voters themselves would become a
/// self-friendship, so it is dropped as a duplicate too.
pub struct FriendshipMover;

impl<S: ReconciliationStore> RecordMover<S> for FriendshipMover {
  fn step(&self) -> MergeStep { MergeStep::MoveFriendships }

  async fn move_records(&self, store: &S, ctx: &MergeContext) -> MoveOutcome {
    if ctx.from_voter == ctx.to_voter {
      return MoveOutcome::noop();
    }
    let mut outcome = MoveOutcome::default();

    let from_friendships = match store.friendships_for_voter(ctx.from_voter).await {
      Ok(friendships) => friendships,
      Err(err) => {
        outcome
          .failures
          .push(format!("listing source friendships: {err}"));
        return outcome;
      }
    };
    if from_friendships.is_empty() {
      return outcome;
    }

    let existing: HashSet<Uuid> = match store.friendships_for_voter(ctx.to_voter).await {
      Ok(friendships) => friendships.into_iter().map(|f| f.friend_voter_id).collect(),
      Err(err) => {
        outcome
          .failures
          .push(format!("listing destination friendships: {err}"));
        return outcome;
      }
    };

    for mut friendship in from_friendships {
      let duplicate = existing.contains(&friendship.friend_voter_id)
        || friendship.friend_voter_id == ctx.to_voter;
      if duplicate {
        match store.delete_friendship(friendship.friendship_id).await {
          Ok(()) => outcome.skipped += 1,
          Err(err) => outcome.failures.push(format!(
            "dropping duplicate friendship {}: {err}",
            friendship.friendship_id
          )),
        }
        continue;
      }

      friendship.voter_id = ctx.to_voter;
      match store.update_friendship(friendship).await {
        Ok(()) => outcome.moved += 1,
        Err(err) => outcome.failures.push(format!("moving friendship: {err}")),
      }
    }

    outcome
  }
}

// ─── Friend invites ──────────────────────────────────────────────────────────

/// Moves pending invitations, de-duplicating by recipient. An invitation the
/// losing voter sent to the winning voter is dropped outright.
pub struct FriendInviteMover;

impl<S: ReconciliationStore> RecordMover<S> for FriendInviteMover {
  fn step(&self) -> MergeStep { MergeStep::MoveFriendInvites }

  async fn move_records(&self, store: &S, ctx: &MergeContext) -> MoveOutcome {
    if ctx.from_voter == ctx.to_voter {
      return MoveOutcome::noop();
    }
    let mut outcome = MoveOutcome::default();

    let from_invites = match store.invites_sent_by_voter(ctx.from_voter).await {
      Ok(invites) => invites,
      Err(err) => {
        outcome
          .failures
          .push(format!("listing source invites: {err}"));
        return outcome;
      }
    };
    if from_invites.is_empty() {
      return outcome;
    }

    let existing: HashSet<InviteRecipient> =
      match store.invites_sent_by_voter(ctx.to_voter).await {
        Ok(invites) => invites.into_iter().map(|i| i.recipient).collect(),
        Err(err) => {
          outcome
            .failures
            .push(format!("listing destination invites: {err}"));
          return outcome;
        }
      };

    for mut invite in from_invites {
      let duplicate = existing.contains(&invite.recipient)
        || invite.recipient == InviteRecipient::Voter(ctx.to_voter);
      if duplicate {
        match store.delete_friend_invite(invite.invite_id).await {
          Ok(()) => outcome.skipped += 1,
          Err(err) => outcome.failures.push(format!(
            "dropping duplicate invite {}: {err}",
            invite.invite_id
          )),
        }
        continue;
      }

      invite.sender_voter_id = ctx.to_voter;
      match store.update_friend_invite(invite).await {
        Ok(()) => outcome.moved += 1,
        Err(err) => outcome.failures.push(format!("moving invite: {err}")),
      }
    }

    outcome
  }
}
