//! Engine tests against the in-memory SQLite store.
//!
//! Covers the merge workflow's contract properties (idempotence, self-merge,
//! ownership conservation, non-destructive union), caching repair, and the
//! full sign-in collision scenarios.

use std::sync::Arc;

use chrono::Utc;
use rollcall_core::{
  identity::{Provider, ProviderProfile},
  organization::NewOrganization,
  records::{
    Bookmark, BookmarkItem, Donation, EmailEntry, Follow, FollowTarget,
    FriendInvite, Friendship, InviteRecipient, Position, Stance, VoterGuide,
  },
  store::ReconciliationStore,
  voter::Voter,
};
use rollcall_store_sqlite::SqliteStore;
use uuid::Uuid;

use crate::{
  report::{MergeStep, StepOutcome},
  signin::{MergePrecedence, Reconciler, SignInEvent, SignInResolution},
};

async fn store() -> Arc<SqliteStore> {
  Arc::new(
    SqliteStore::open_in_memory()
      .await
      .expect("in-memory store"),
  )
}

fn reconciler(store: Arc<SqliteStore>) -> Reconciler<SqliteStore> {
  Reconciler::new(store)
}

// ─── Seed helpers ────────────────────────────────────────────────────────────

async fn add_follow(store: &SqliteStore, voter_id: Uuid, target: FollowTarget) {
  store
    .add_follow(Follow {
      follow_id: Uuid::new_v4(),
      voter_id,
      target,
      followed_at: Utc::now(),
    })
    .await
    .unwrap();
}

async fn add_position(store: &SqliteStore, voter: &Voter, ballot_item: &str) {
  store
    .add_position(Position {
      position_id:     Uuid::new_v4(),
      voter_id:        Some(voter.voter_id),
      organization_id: voter.linked_organization_id,
      ballot_item_id:  ballot_item.into(),
      stance:          Stance::Support,
      statement:       None,
      recorded_at:     Utc::now(),
    })
    .await
    .unwrap();
}

async fn add_donation(store: &SqliteStore, voter_id: Uuid, charge_id: &str) {
  store
    .add_donation(Donation {
      donation_id:  Uuid::new_v4(),
      voter_id,
      charge_id:    charge_id.into(),
      amount_cents: 2500,
      donated_at:   Utc::now(),
    })
    .await
    .unwrap();
}

/// Give a voter a linked organization and return the updated voter.
async fn link_organization(store: &SqliteStore, mut voter: Voter, name: &str) -> Voter {
  let organization = store
    .create_organization(NewOrganization {
      name: Some(name.into()),
      ..Default::default()
    })
    .await
    .unwrap();
  voter.linked_organization_id = Some(organization.organization_id);
  store.update_voter(voter.clone()).await.unwrap();
  voter
}

fn twitter_event(device: &str, twitter_id: i64) -> SignInEvent {
  SignInEvent {
    device_session_id: device.into(),
    provider:          Provider::Twitter,
    external_user_id:  twitter_id,
    verified_email:    None,
    profile:           ProviderProfile {
      screen_name:       Some("civicvoice".into()),
      display_name:      Some("Civic Voice".into()),
      profile_image_url: Some("https://images.example/cv.jpg".into()),
    },
  }
}

// ─── Merge workflow properties ───────────────────────────────────────────────

#[tokio::test]
async fn self_merge_is_a_trivial_noop() {
  let s = store().await;
  let engine = reconciler(s.clone());

  let voter = s.create_voter().await.unwrap();
  add_follow(&s, voter.voter_id, FollowTarget::Organization(Uuid::new_v4())).await;

  let report = engine
    .merge_voters(voter.voter_id, voter.voter_id)
    .await
    .unwrap();
  assert!(report.completed);
  assert!(report.steps.is_empty());
  assert_eq!(s.follows_for_voter(voter.voter_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn merge_moves_dependent_records_and_conserves_ownership() {
  let s = store().await;
  let engine = reconciler(s.clone());

  let a = s.create_voter().await.unwrap();
  let b = s.create_voter().await.unwrap();

  let shared_org = Uuid::new_v4();
  add_follow(&s, a.voter_id, FollowTarget::Organization(shared_org)).await;
  add_follow(&s, a.voter_id, FollowTarget::Issue(Uuid::new_v4())).await;
  add_follow(&s, b.voter_id, FollowTarget::Organization(shared_org)).await;
  add_donation(&s, a.voter_id, "ch_100").await;
  add_donation(&s, a.voter_id, "ch_101").await;
  add_donation(&s, b.voter_id, "ch_100").await;

  let follows_before =
    s.follows_for_voter(a.voter_id).await.unwrap().len()
      + s.follows_for_voter(b.voter_id).await.unwrap().len();

  let report = engine.merge_voters(a.voter_id, b.voter_id).await.unwrap();
  assert!(report.completed);

  // One follow and one donation were duplicates by natural key.
  let follows = report.step(MergeStep::MoveFollows).unwrap();
  assert_eq!(follows.outcome, StepOutcome::Completed { moved: 1, skipped: 1 });
  let donations = report.step(MergeStep::MoveDonations).unwrap();
  assert_eq!(donations.outcome, StepOutcome::Completed { moved: 1, skipped: 1 });

  // Ownership conservation: everything A owned is now on B or was dropped
  // as a logged duplicate; nothing remains on A and nothing vanished.
  assert!(s.follows_for_voter(a.voter_id).await.unwrap().is_empty());
  let b_follows = s.follows_for_voter(b.voter_id).await.unwrap().len() as u64;
  let StepOutcome::Completed { skipped, .. } = follows.outcome else {
    panic!("follows step did not complete");
  };
  assert_eq!(b_follows + skipped, follows_before as u64);
  assert_eq!(s.donations_for_voter(b.voter_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn merge_twice_is_idempotent() {
  let s = store().await;
  let engine = reconciler(s.clone());

  let a = s.create_voter().await.unwrap();
  let b = s.create_voter().await.unwrap();

  add_follow(&s, a.voter_id, FollowTarget::Organization(Uuid::new_v4())).await;
  add_donation(&s, a.voter_id, "ch_200").await;
  s.add_friendship(Friendship {
    friendship_id:   Uuid::new_v4(),
    voter_id:        a.voter_id,
    friend_voter_id: Uuid::new_v4(),
    since:           Utc::now(),
  })
  .await
  .unwrap();

  let first = engine.merge_voters(a.voter_id, b.voter_id).await.unwrap();
  assert!(first.completed);
  assert_eq!(first.total_moved(), 3);

  let follows_after_first = s.follows_for_voter(b.voter_id).await.unwrap().len();
  let donations_after_first = s.donations_for_voter(b.voter_id).await.unwrap().len();

  let second = engine.merge_voters(a.voter_id, b.voter_id).await.unwrap();
  assert!(second.completed);
  // Nothing left to move; no double-counted totals on the retry.
  assert_eq!(second.total_moved(), 0);
  assert_eq!(second.total_skipped(), 0);
  assert_eq!(
    s.follows_for_voter(b.voter_id).await.unwrap().len(),
    follows_after_first
  );
  assert_eq!(
    s.donations_for_voter(b.voter_id).await.unwrap().len(),
    donations_after_first
  );
}

#[tokio::test]
async fn merge_unions_scalar_fields_non_destructively() {
  let s = store().await;
  let engine = reconciler(s.clone());

  let mut a = s.create_voter().await.unwrap();
  a.first_name = Some("Ada".into());
  a.last_name = Some("Lovelace".into());
  a.interface_flags = 0b0110;
  s.update_voter(a.clone()).await.unwrap();

  let mut b = s.create_voter().await.unwrap();
  b.first_name = Some("Augusta".into());
  b.interface_flags = 0b1001;
  b.notification_flags = 0b0001;
  s.update_voter(b.clone()).await.unwrap();

  engine.merge_voters(a.voter_id, b.voter_id).await.unwrap();

  let merged = s.get_voter(b.voter_id).await.unwrap().unwrap();
  // Non-empty winner fields never overwritten; empty ones filled.
  assert_eq!(merged.first_name.as_deref(), Some("Augusta"));
  assert_eq!(merged.last_name.as_deref(), Some("Lovelace"));
  // Flags only ever turn on.
  assert_eq!(merged.interface_flags, 0b1111);
  assert!(merged.is_notification_flag_set(0b0001));
}

#[tokio::test]
async fn merge_transplants_email_entries_and_clears_loser_cache() {
  let s = store().await;
  let engine = reconciler(s.clone());

  let mut a = s.create_voter().await.unwrap();
  let entry_id = Uuid::new_v4();
  s.add_email_entry(EmailEntry {
    email_id:   entry_id,
    voter_id:   a.voter_id,
    address:    "ada@example.com".into(),
    verified:   true,
    created_at: Utc::now(),
  })
  .await
  .unwrap();
  a.email = Some("ada@example.com".into());
  a.primary_email_id = Some(entry_id);
  a.email_verified = true;
  s.update_voter(a.clone()).await.unwrap();

  let b = s.create_voter().await.unwrap();

  let report = engine.merge_voters(a.voter_id, b.voter_id).await.unwrap();
  assert!(report.completed);

  let husk = s.get_voter(a.voter_id).await.unwrap().unwrap();
  assert!(husk.email.is_none());
  assert!(husk.primary_email_id.is_none());
  assert!(!husk.email_verified);

  let winner = s.get_voter(b.voter_id).await.unwrap().unwrap();
  assert_eq!(winner.email.as_deref(), Some("ada@example.com"));
  assert!(winner.email_verified);
  assert_eq!(
    s.email_entries_for_voter(b.voter_id).await.unwrap().len(),
    1
  );
}

#[tokio::test]
async fn merge_adopts_loser_organization_when_winner_has_none() {
  let s = store().await;
  let engine = reconciler(s.clone());

  let a = s.create_voter().await.unwrap();
  let a = link_organization(&s, a, "Ada's Org").await;
  let org_id = a.linked_organization_id.unwrap();
  let b = s.create_voter().await.unwrap();

  let report = engine.merge_voters(a.voter_id, b.voter_id).await.unwrap();
  assert!(report.completed);

  let winner = s.get_voter(b.voter_id).await.unwrap().unwrap();
  assert_eq!(winner.linked_organization_id, Some(org_id));
  let husk = s.get_voter(a.voter_id).await.unwrap().unwrap();
  assert!(husk.linked_organization_id.is_none());
}

#[tokio::test]
async fn merge_folds_organizations_and_repoints_positions() {
  let s = store().await;
  let engine = reconciler(s.clone());

  let a = s.create_voter().await.unwrap();
  let a = link_organization(&s, a, "Ada's Org").await;
  let from_org = a.linked_organization_id.unwrap();
  let b = s.create_voter().await.unwrap();
  let b = link_organization(&s, b, "Betty's Org").await;
  let to_org = b.linked_organization_id.unwrap();

  // A's organization represents a public Twitter account.
  let mut source_org = s.get_organization(from_org).await.unwrap().unwrap();
  source_org.twitter.external_user_id = Some(4242);
  source_org.twitter.screen_name = Some("adasorg".into());
  s.update_organization(source_org).await.unwrap();

  add_position(&s, &a, "measure-1").await;
  add_position(&s, &a, "measure-2").await;
  add_position(&s, &b, "measure-1").await;

  let report = engine.merge_voters(a.voter_id, b.voter_id).await.unwrap();
  assert!(report.completed);

  // B keeps its own stance on the shared item; A's duplicate is dropped.
  let b_positions = s.positions_for_voter(b.voter_id).await.unwrap();
  assert_eq!(b_positions.len(), 2);
  assert!(b_positions
    .iter()
    .all(|p| p.organization_id == Some(to_org)));
  assert!(s.positions_for_voter(a.voter_id).await.unwrap().is_empty());
  assert!(s.positions_for_organization(to_org).await.unwrap().len() >= 2);

  // The target organization absorbed the provider attributes; the husk
  // organization was demoted.
  let target = s.get_organization(to_org).await.unwrap().unwrap();
  assert_eq!(
    target.provider_cache(Provider::Twitter).external_user_id,
    Some(4242)
  );
  let husk_org = s.get_organization(from_org).await.unwrap().unwrap();
  assert!(husk_org.provider_cache(Provider::Twitter).is_empty());
}

#[tokio::test]
async fn merge_moves_invites_and_guides_with_dedup() {
  let s = store().await;
  let engine = reconciler(s.clone());

  let a = s.create_voter().await.unwrap();
  let b = s.create_voter().await.unwrap();

  let invite = |sender: Uuid, recipient: InviteRecipient| FriendInvite {
    invite_id: Uuid::new_v4(),
    sender_voter_id: sender,
    recipient,
    message: None,
    sent_at: Utc::now(),
  };
  s.add_friend_invite(invite(
    a.voter_id,
    InviteRecipient::Email("pat@example.com".into()),
  ))
  .await
  .unwrap();
  s.add_friend_invite(invite(a.voter_id, InviteRecipient::Voter(Uuid::new_v4())))
    .await
    .unwrap();
  s.add_friend_invite(invite(
    b.voter_id,
    InviteRecipient::Email("pat@example.com".into()),
  ))
  .await
  .unwrap();

  let guide = |owner: Uuid, election: &str| VoterGuide {
    guide_id: Uuid::new_v4(),
    owner_voter_id: owner,
    organization_id: None,
    election_id: election.into(),
    created_at: Utc::now(),
  };
  s.add_voter_guide(guide(a.voter_id, "general-2016")).await.unwrap();
  s.add_voter_guide(guide(a.voter_id, "primary-2016")).await.unwrap();
  s.add_voter_guide(guide(b.voter_id, "general-2016")).await.unwrap();

  let report = engine.merge_voters(a.voter_id, b.voter_id).await.unwrap();
  assert!(report.completed);

  let invites = report.step(MergeStep::MoveFriendInvites).unwrap();
  assert_eq!(invites.outcome, StepOutcome::Completed { moved: 1, skipped: 1 });
  let guides = report.step(MergeStep::MoveVoterGuides).unwrap();
  assert_eq!(guides.outcome, StepOutcome::Completed { moved: 1, skipped: 1 });

  assert_eq!(s.invites_sent_by_voter(b.voter_id).await.unwrap().len(), 2);
  assert!(s.invites_sent_by_voter(a.voter_id).await.unwrap().is_empty());
  assert_eq!(s.guides_for_voter(b.voter_id).await.unwrap().len(), 2);
  assert!(s.guides_for_voter(a.voter_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn bookmarked_organization_halts_merge_for_manual_intervention() {
  let s = store().await;
  let engine = reconciler(s.clone());

  let a = s.create_voter().await.unwrap();
  let a = link_organization(&s, a, "Ada's Org").await;
  let b = s.create_voter().await.unwrap();
  let b = link_organization(&s, b, "Betty's Org").await;

  add_position(&s, &a, "measure-1").await;
  add_follow(&s, a.voter_id, FollowTarget::Issue(Uuid::new_v4())).await;
  add_donation(&s, a.voter_id, "ch_300").await;

  // A bookmark referencing B's organization blocks the automatic merge.
  s.add_bookmark(Bookmark {
    bookmark_id: Uuid::new_v4(),
    voter_id:    s.create_voter().await.unwrap().voter_id,
    item:        BookmarkItem::Organization(b.linked_organization_id.unwrap()),
    created_at:  Utc::now(),
  })
  .await
  .unwrap();

  let report = engine.merge_voters(a.voter_id, b.voter_id).await.unwrap();
  assert!(!report.completed);
  assert!(report.manual_intervention_required());

  // The workflow halted at organization resolution: follows (an earlier
  // step) moved, nothing after the halt ran.
  let resolve = report.step(MergeStep::ResolveOrganizations).unwrap();
  assert_eq!(resolve.outcome, StepOutcome::ManualInterventionRequired);
  assert!(report.step(MergeStep::MoveFollows).is_some());
  assert!(report.step(MergeStep::MovePositions).is_none());
  assert!(report.step(MergeStep::MoveDonations).is_none());

  // A's positions and donations stayed put for the manual pass.
  assert_eq!(s.positions_for_voter(a.voter_id).await.unwrap().len(), 1);
  assert_eq!(s.donations_for_voter(a.voter_id).await.unwrap().len(), 1);
}

// ─── Caching repair ──────────────────────────────────────────────────────────

#[tokio::test]
async fn caching_repair_without_link_is_not_executed() {
  let s = store().await;
  let engine = reconciler(s.clone());

  let mut stale = s.create_voter().await.unwrap();
  stale.twitter.external_user_id = Some(9001);
  s.update_voter(stale.clone()).await.unwrap();

  let outcome = engine
    .repair_provider_caching(Provider::Twitter, 9001, None)
    .await
    .unwrap();
  assert!(!outcome.executed);

  // With no authoritative link, nothing was touched.
  let untouched = s.get_voter(stale.voter_id).await.unwrap().unwrap();
  assert_eq!(untouched.twitter.external_user_id, Some(9001));
}

#[tokio::test]
async fn caching_repair_leaves_exactly_one_authoritative_holder() {
  let s = store().await;
  let engine = reconciler(s.clone());

  let owner = s.create_voter().await.unwrap();
  s.create_identity_link(Provider::Twitter, 9001, owner.voter_id)
    .await
    .unwrap();

  let mut impostor = s.create_voter().await.unwrap();
  impostor.twitter.external_user_id = Some(9001);
  impostor.twitter.screen_name = Some("civicvoice".into());
  s.update_voter(impostor.clone()).await.unwrap();

  let mut by_name_only = s.create_voter().await.unwrap();
  by_name_only.twitter.screen_name = Some("CivicVoice".into());
  s.update_voter(by_name_only.clone()).await.unwrap();

  // An unrelated organization also caches the identity.
  let mut stale_org = s
    .create_organization(NewOrganization::default())
    .await
    .unwrap();
  stale_org.twitter.external_user_id = Some(9001);
  s.update_organization(stale_org.clone()).await.unwrap();

  let profile = ProviderProfile {
    screen_name:       Some("civicvoice".into()),
    display_name:      Some("Civic Voice".into()),
    profile_image_url: None,
  };
  let outcome = engine
    .repair_provider_caching(Provider::Twitter, 9001, Some(&profile))
    .await
    .unwrap();
  assert!(outcome.executed);
  assert_eq!(outcome.voters_cleared, 2);
  assert_eq!(outcome.organizations_cleared, 1);
  assert!(outcome.owner_refreshed);

  // Exactly one voter's cache matches the link's owner; all others cleared.
  let repaired_owner = s.get_voter(owner.voter_id).await.unwrap().unwrap();
  assert_eq!(repaired_owner.twitter.external_user_id, Some(9001));
  assert_eq!(repaired_owner.twitter.screen_name.as_deref(), Some("civicvoice"));

  let cleared = s.get_voter(impostor.voter_id).await.unwrap().unwrap();
  assert!(cleared.twitter.is_empty());
  let cleared = s.get_voter(by_name_only.voter_id).await.unwrap().unwrap();
  assert!(cleared.twitter.is_empty());
}

#[tokio::test]
async fn caching_repair_is_idempotent() {
  let s = store().await;
  let engine = reconciler(s.clone());

  let owner = s.create_voter().await.unwrap();
  s.create_identity_link(Provider::Twitter, 9001, owner.voter_id)
    .await
    .unwrap();

  let first = engine
    .repair_provider_caching(Provider::Twitter, 9001, None)
    .await
    .unwrap();
  assert!(first.executed);

  let second = engine
    .repair_provider_caching(Provider::Twitter, 9001, None)
    .await
    .unwrap();
  assert!(second.executed);
  assert_eq!(second.voters_cleared, 0);
  assert!(!second.owner_refreshed);
}

// ─── Sign-in resolution ──────────────────────────────────────────────────────

#[tokio::test]
async fn first_sign_in_creates_voter_and_links_identity() {
  let s = store().await;
  let engine = reconciler(s.clone());

  let outcome = engine
    .resolve_sign_in(&twitter_event("device-1", 9001))
    .await
    .unwrap();

  assert_eq!(outcome.resolution, SignInResolution::NotLinked);
  assert!(outcome.merges.is_empty());
  assert_eq!(
    s.voter_for_device("device-1").await.unwrap(),
    Some(outcome.voter_id)
  );
  let link = s
    .find_identity_link(Provider::Twitter, 9001)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(link.voter_id, outcome.voter_id);

  // Caching repair populated the owner's provider cache from the profile.
  let voter = s.get_voter(outcome.voter_id).await.unwrap().unwrap();
  assert_eq!(voter.twitter.external_user_id, Some(9001));
  assert_eq!(voter.twitter.screen_name.as_deref(), Some("civicvoice"));
}

#[tokio::test]
async fn repeat_sign_in_is_linked_to_self() {
  let s = store().await;
  let engine = reconciler(s.clone());

  let first = engine
    .resolve_sign_in(&twitter_event("device-1", 9001))
    .await
    .unwrap();
  let second = engine
    .resolve_sign_in(&twitter_event("device-1", 9001))
    .await
    .unwrap();

  assert_eq!(second.resolution, SignInResolution::LinkedToSelf);
  assert_eq!(second.voter_id, first.voter_id);
  assert!(second.merges.is_empty());
}

#[tokio::test]
async fn sign_in_without_link_adopts_legacy_cache_holder() {
  let s = store().await;
  let engine = reconciler(s.clone());

  // A voter row predating the link store still carries the provider id.
  let mut legacy = s.create_voter().await.unwrap();
  legacy.twitter.external_user_id = Some(9001);
  s.update_voter(legacy.clone()).await.unwrap();

  let outcome = engine
    .resolve_sign_in(&twitter_event("device-1", 9001))
    .await
    .unwrap();

  // The link was created to the legacy holder; the fresh session voter was
  // folded into it.
  assert_eq!(outcome.voter_id, legacy.voter_id);
  assert_eq!(outcome.resolution, SignInResolution::LinkedToOther);
  let link = s
    .find_identity_link(Provider::Twitter, 9001)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(link.voter_id, legacy.voter_id);
}

#[tokio::test]
async fn sign_in_collision_merges_session_voter_into_prior_owner() {
  let s = store().await;
  let engine = reconciler(s.clone());

  // Voter B: the established Twitter account holder with history.
  let b = s.create_voter().await.unwrap();
  let b = link_organization(&s, b, "Betty's Org").await;
  s.create_identity_link(Provider::Twitter, 9001, b.voter_id)
    .await
    .unwrap();
  add_position(&s, &b, "measure-1").await;
  add_position(&s, &b, "measure-2").await;
  add_position(&s, &b, "measure-3").await;
  let followed_org = Uuid::new_v4();
  add_follow(&s, b.voter_id, FollowTarget::Organization(followed_org)).await;
  add_follow(&s, b.voter_id, FollowTarget::Organization(Uuid::new_v4())).await;

  // Voter A: anonymous session voter on device S1, with one overlapping and
  // one fresh follow.
  let a = s.create_voter().await.unwrap();
  s.bind_device("S1", a.voter_id).await.unwrap();
  add_follow(&s, a.voter_id, FollowTarget::Organization(followed_org)).await;
  let fresh_org = Uuid::new_v4();
  add_follow(&s, a.voter_id, FollowTarget::Organization(fresh_org)).await;

  let outcome = engine
    .resolve_sign_in(&twitter_event("S1", 9001))
    .await
    .unwrap();

  // S1 is now bound to B.
  assert_eq!(outcome.resolution, SignInResolution::LinkedToOther);
  assert_eq!(outcome.voter_id, b.voter_id);
  assert_eq!(s.voter_for_device("S1").await.unwrap(), Some(b.voter_id));

  // A is a husk: no linked organization, no email, no provider cache.
  let husk = s.get_voter(a.voter_id).await.unwrap().unwrap();
  assert!(husk.linked_organization_id.is_none());
  assert!(husk.email.is_none());
  assert!(husk.twitter.is_empty());
  assert!(husk.facebook.is_empty());

  // B gained A's fresh follow, kept the duplicate de-duplicated, and its
  // position count is unchanged.
  let b_follows = s.follows_for_voter(b.voter_id).await.unwrap();
  assert_eq!(b_follows.len(), 3);
  assert!(b_follows
    .iter()
    .any(|f| f.target == FollowTarget::Organization(fresh_org)));
  assert_eq!(s.positions_for_voter(b.voter_id).await.unwrap().len(), 3);

  // No manual intervention anywhere in the status log.
  assert_eq!(outcome.merges.len(), 1);
  assert!(!outcome.merges[0].manual_intervention_required());
}

#[tokio::test]
async fn verified_email_chains_second_merge_into_identity_owner() {
  let s = store().await;
  let engine = reconciler(s.clone());

  // B owns the Twitter identity.
  let b = s.create_voter().await.unwrap();
  s.create_identity_link(Provider::Twitter, 9001, b.voter_id)
    .await
    .unwrap();

  // C owns the verified email, with data of its own.
  let mut c = s.create_voter().await.unwrap();
  c.email = Some("ada@example.com".into());
  c.email_verified = true;
  s.update_voter(c.clone()).await.unwrap();
  add_donation(&s, c.voter_id, "ch_400").await;

  let mut event = twitter_event("S1", 9001);
  event.verified_email = Some("ada@example.com".into());

  let outcome = engine.resolve_sign_in(&event).await.unwrap();

  // Default precedence: the identity owner stays canonical, the email-linked
  // voter is folded into it as a second chained merge.
  assert_eq!(outcome.voter_id, b.voter_id);
  assert_eq!(outcome.merges.len(), 2);
  assert_eq!(outcome.merges[1].from_voter, c.voter_id);
  assert_eq!(outcome.merges[1].to_voter, b.voter_id);
  assert_eq!(s.donations_for_voter(b.voter_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn email_precedence_folds_identity_owner_into_email_owner() {
  let s = store().await;
  let engine = Reconciler::with_precedence(s.clone(), MergePrecedence::PreferEmailOwner);

  let b = s.create_voter().await.unwrap();
  s.create_identity_link(Provider::Twitter, 9001, b.voter_id)
    .await
    .unwrap();

  let mut c = s.create_voter().await.unwrap();
  c.email = Some("ada@example.com".into());
  c.email_verified = true;
  s.update_voter(c.clone()).await.unwrap();

  let mut event = twitter_event("S1", 9001);
  event.verified_email = Some("ada@example.com".into());

  let outcome = engine.resolve_sign_in(&event).await.unwrap();

  assert_eq!(outcome.voter_id, c.voter_id);
  assert_eq!(s.voter_for_device("S1").await.unwrap(), Some(c.voter_id));
}

#[tokio::test]
async fn sign_in_records_new_verified_email_for_owner() {
  let s = store().await;
  let engine = reconciler(s.clone());

  let mut event = twitter_event("device-1", 9001);
  event.verified_email = Some("fresh@example.com".into());

  let outcome = engine.resolve_sign_in(&event).await.unwrap();

  let entries = s.email_entries_for_voter(outcome.voter_id).await.unwrap();
  assert_eq!(entries.len(), 1);
  assert!(entries[0].verified);

  let voter = s.get_voter(outcome.voter_id).await.unwrap().unwrap();
  assert_eq!(voter.email.as_deref(), Some("fresh@example.com"));
  assert!(voter.email_verified);
  assert_eq!(voter.primary_email_id, Some(entries[0].email_id));
}

// ─── Position repair ─────────────────────────────────────────────────────────

#[tokio::test]
async fn position_repair_creates_missing_organization() {
  let s = store().await;

  let voter = s.create_voter().await.unwrap();
  add_position(&s, &voter, "measure-1").await;

  let outcome = crate::repair::repair_voter_positions(s.as_ref(), voter.voter_id)
    .await
    .unwrap();
  let org_id = outcome.organization_created.expect("organization created");
  assert_eq!(outcome.repointed, 1);

  let repaired = s.get_voter(voter.voter_id).await.unwrap().unwrap();
  assert_eq!(repaired.linked_organization_id, Some(org_id));
  let positions = s.positions_for_voter(voter.voter_id).await.unwrap();
  assert!(positions.iter().all(|p| p.organization_id == Some(org_id)));

  // A second pass finds nothing to fix.
  let second = crate::repair::repair_voter_positions(s.as_ref(), voter.voter_id)
    .await
    .unwrap();
  assert!(second.organization_created.is_none());
  assert_eq!(second.repointed, 0);
}

// ─── Auth sessions ───────────────────────────────────────────────────────────

#[tokio::test]
async fn auth_session_is_stable_per_device() {
  let s = store().await;
  let engine = reconciler(s.clone());

  let first = engine
    .begin_auth_session(Provider::Twitter, "device-1")
    .await
    .unwrap();
  let second = engine
    .begin_auth_session(Provider::Twitter, "device-1")
    .await
    .unwrap();
  assert_eq!(first.session_id, second.session_id);
  assert_eq!(first.provider, Provider::Twitter);
}
