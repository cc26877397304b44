//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::Utc;
use rollcall_core::{
  identity::{LinkAttempt, Provider},
  organization::NewOrganization,
  records::{
    AnalyticsEvent, Bookmark, BookmarkItem, EmailEntry, Follow, FollowTarget,
    Position, Stance,
  },
  store::ReconciliationStore,
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

// ─── Voters ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_voter() {
  let s = store().await;

  let voter = s.create_voter().await.unwrap();
  assert!(!voter.has_data_to_preserve());

  let fetched = s.get_voter(voter.voter_id).await.unwrap();
  assert!(fetched.is_some());
  assert_eq!(fetched.unwrap().voter_id, voter.voter_id);
}

#[tokio::test]
async fn get_voter_missing_returns_none() {
  let s = store().await;
  let result = s.get_voter(Uuid::new_v4()).await.unwrap();
  assert!(result.is_none());
}

#[tokio::test]
async fn update_voter_roundtrip() {
  let s = store().await;

  let mut voter = s.create_voter().await.unwrap();
  voter.first_name = Some("Ada".into());
  voter.twitter.external_user_id = Some(4242);
  voter.twitter.screen_name = Some("adalovelace".into());
  voter.interface_flags = 0b101;
  s.update_voter(voter.clone()).await.unwrap();

  let fetched = s.get_voter(voter.voter_id).await.unwrap().unwrap();
  assert_eq!(fetched.first_name.as_deref(), Some("Ada"));
  assert_eq!(fetched.twitter.external_user_id, Some(4242));
  assert!(fetched.is_interface_flag_set(0b101));
  assert!(fetched.signed_in_twitter());
}

#[tokio::test]
async fn voter_by_verified_email_requires_verification() {
  let s = store().await;

  let mut voter = s.create_voter().await.unwrap();
  voter.email = Some("ada@example.com".into());
  s.update_voter(voter.clone()).await.unwrap();

  // Unverified cached email does not count as ownership.
  let found = s.voter_by_verified_email("ada@example.com").await.unwrap();
  assert!(found.is_none());

  voter.email_verified = true;
  s.update_voter(voter.clone()).await.unwrap();

  let found = s
    .voter_by_verified_email("ADA@example.com")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(found.voter_id, voter.voter_id);
}

#[tokio::test]
async fn voters_with_cached_identity_matches_id_and_screen_name() {
  let s = store().await;

  let mut by_id = s.create_voter().await.unwrap();
  by_id.twitter.external_user_id = Some(77);
  s.update_voter(by_id.clone()).await.unwrap();

  let mut by_name = s.create_voter().await.unwrap();
  by_name.twitter.screen_name = Some("CivicAda".into());
  s.update_voter(by_name.clone()).await.unwrap();

  let unrelated = s.create_voter().await.unwrap();

  let found = s
    .voters_with_cached_identity(Provider::Twitter, 77, Some("civicada"))
    .await
    .unwrap();
  let ids: Vec<_> = found.iter().map(|v| v.voter_id).collect();
  assert!(ids.contains(&by_id.voter_id));
  assert!(ids.contains(&by_name.voter_id));
  assert!(!ids.contains(&unrelated.voter_id));
}

// ─── Device sessions ─────────────────────────────────────────────────────────

#[tokio::test]
async fn bind_device_and_rebind() {
  let s = store().await;
  let a = s.create_voter().await.unwrap();
  let b = s.create_voter().await.unwrap();

  assert!(s.voter_for_device("device-1").await.unwrap().is_none());

  s.bind_device("device-1", a.voter_id).await.unwrap();
  assert_eq!(s.voter_for_device("device-1").await.unwrap(), Some(a.voter_id));

  // Rebinding replaces the previous association.
  s.bind_device("device-1", b.voter_id).await.unwrap();
  assert_eq!(s.voter_for_device("device-1").await.unwrap(), Some(b.voter_id));
}

// ─── Identity links ──────────────────────────────────────────────────────────

#[tokio::test]
async fn create_identity_link_then_find() {
  let s = store().await;
  let voter = s.create_voter().await.unwrap();

  let attempt = s
    .create_identity_link(Provider::Twitter, 1001, voter.voter_id)
    .await
    .unwrap();
  assert!(matches!(attempt, LinkAttempt::Linked(_)));

  let link = s
    .find_identity_link(Provider::Twitter, 1001)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(link.voter_id, voter.voter_id);
  assert!(!link.secret_key.is_empty());

  // Providers are independent key spaces.
  assert!(s
    .find_identity_link(Provider::Facebook, 1001)
    .await
    .unwrap()
    .is_none());
}

#[tokio::test]
async fn create_identity_link_idempotent_for_same_voter() {
  let s = store().await;
  let voter = s.create_voter().await.unwrap();

  s.create_identity_link(Provider::Twitter, 1001, voter.voter_id)
    .await
    .unwrap();
  let second = s
    .create_identity_link(Provider::Twitter, 1001, voter.voter_id)
    .await
    .unwrap();
  assert!(matches!(second, LinkAttempt::Linked(_)));
}

#[tokio::test]
async fn create_identity_link_conflict_for_other_voter() {
  let s = store().await;
  let a = s.create_voter().await.unwrap();
  let b = s.create_voter().await.unwrap();

  s.create_identity_link(Provider::Twitter, 1001, a.voter_id)
    .await
    .unwrap();
  let attempt = s
    .create_identity_link(Provider::Twitter, 1001, b.voter_id)
    .await
    .unwrap();

  match attempt {
    LinkAttempt::Conflict { ref existing } => assert_eq!(existing.voter_id, a.voter_id),
    LinkAttempt::Linked(_) => panic!("expected conflict"),
  }

  // Callers that require the link to succeed see the conflict as an error.
  let err = attempt.into_result().unwrap_err();
  assert!(matches!(
    err,
    rollcall_core::Error::IdentityConflict { owner, .. } if owner == a.voter_id
  ));
}

#[tokio::test]
async fn auth_session_created_once_per_device() {
  let s = store().await;

  let first = s
    .retrieve_or_create_auth_session(Provider::Twitter, "device-9")
    .await
    .unwrap();
  let second = s
    .retrieve_or_create_auth_session(Provider::Twitter, "device-9")
    .await
    .unwrap();
  assert_eq!(first.session_id, second.session_id);

  let other_provider = s
    .retrieve_or_create_auth_session(Provider::Facebook, "device-9")
    .await
    .unwrap();
  assert_ne!(first.session_id, other_provider.session_id);
}

// ─── Organizations ───────────────────────────────────────────────────────────

#[tokio::test]
async fn organization_roundtrip_and_linked_lookup() {
  let s = store().await;

  let mut voter = s.create_voter().await.unwrap();
  let org = s
    .create_organization(NewOrganization {
      name: Some("League of Example Voters".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  voter.linked_organization_id = Some(org.organization_id);
  s.update_voter(voter.clone()).await.unwrap();

  let holder = s
    .voter_by_linked_organization(org.organization_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(holder.voter_id, voter.voter_id);

  let mut org = s.get_organization(org.organization_id).await.unwrap().unwrap();
  org.twitter.external_user_id = Some(555);
  s.update_organization(org.clone()).await.unwrap();

  let matches = s
    .organizations_with_cached_identity(Provider::Twitter, 555)
    .await
    .unwrap();
  assert_eq!(matches.len(), 1);
  assert_eq!(matches[0].organization_id, org.organization_id);
}

// ─── Dependent records ───────────────────────────────────────────────────────

fn position(voter_id: Uuid, ballot_item: &str) -> Position {
  Position {
    position_id:     Uuid::new_v4(),
    voter_id:        Some(voter_id),
    organization_id: None,
    ballot_item_id:  ballot_item.into(),
    stance:          Stance::Support,
    statement:       None,
    recorded_at:     Utc::now(),
  }
}

#[tokio::test]
async fn positions_listed_by_owner() {
  let s = store().await;
  let a = s.create_voter().await.unwrap();
  let b = s.create_voter().await.unwrap();

  s.add_position(position(a.voter_id, "measure-1")).await.unwrap();
  s.add_position(position(a.voter_id, "measure-2")).await.unwrap();
  s.add_position(position(b.voter_id, "measure-1")).await.unwrap();

  assert_eq!(s.positions_for_voter(a.voter_id).await.unwrap().len(), 2);
  assert_eq!(s.positions_for_voter(b.voter_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn update_position_reassigns_owner() {
  let s = store().await;
  let a = s.create_voter().await.unwrap();
  let b = s.create_voter().await.unwrap();

  let mut p = position(a.voter_id, "race-7");
  s.add_position(p.clone()).await.unwrap();

  p.voter_id = Some(b.voter_id);
  s.update_position(p).await.unwrap();

  assert!(s.positions_for_voter(a.voter_id).await.unwrap().is_empty());
  assert_eq!(s.positions_for_voter(b.voter_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn follow_target_roundtrip() {
  let s = store().await;
  let voter = s.create_voter().await.unwrap();
  let org_id = Uuid::new_v4();
  let issue_id = Uuid::new_v4();

  s.add_follow(Follow {
    follow_id:   Uuid::new_v4(),
    voter_id:    voter.voter_id,
    target:      FollowTarget::Organization(org_id),
    followed_at: Utc::now(),
  })
  .await
  .unwrap();
  s.add_follow(Follow {
    follow_id:   Uuid::new_v4(),
    voter_id:    voter.voter_id,
    target:      FollowTarget::Issue(issue_id),
    followed_at: Utc::now(),
  })
  .await
  .unwrap();

  let follows = s.follows_for_voter(voter.voter_id).await.unwrap();
  assert_eq!(follows.len(), 2);
  assert!(follows
    .iter()
    .any(|f| f.target == FollowTarget::Organization(org_id)));
  assert!(follows.iter().any(|f| f.target == FollowTarget::Issue(issue_id)));
}

#[tokio::test]
async fn email_address_unique_across_voters() {
  let s = store().await;
  let a = s.create_voter().await.unwrap();
  let b = s.create_voter().await.unwrap();

  s.add_email_entry(EmailEntry {
    email_id:   Uuid::new_v4(),
    voter_id:   a.voter_id,
    address:    "shared@example.com".into(),
    verified:   true,
    created_at: Utc::now(),
  })
  .await
  .unwrap();

  let duplicate = s
    .add_email_entry(EmailEntry {
      email_id:   Uuid::new_v4(),
      voter_id:   b.voter_id,
      address:    "Shared@Example.com".into(),
      verified:   false,
      created_at: Utc::now(),
    })
    .await;
  assert!(duplicate.is_err());

  // Deleting the entry frees the address again.
  let entries = s.email_entries_for_voter(a.voter_id).await.unwrap();
  s.delete_email_entry(entries[0].email_id).await.unwrap();
  s.add_email_entry(EmailEntry {
    email_id:   Uuid::new_v4(),
    voter_id:   b.voter_id,
    address:    "shared@example.com".into(),
    verified:   false,
    created_at: Utc::now(),
  })
  .await
  .unwrap();
}

#[tokio::test]
async fn reassign_analytics_events_moves_all_rows() {
  let s = store().await;
  let a = s.create_voter().await.unwrap();
  let b = s.create_voter().await.unwrap();

  for action in ["ballot_viewed", "guide_opened", "position_saved"] {
    s.add_analytics_event(AnalyticsEvent {
      event_id:    Uuid::new_v4(),
      voter_id:    a.voter_id,
      action:      action.into(),
      recorded_at: Utc::now(),
    })
    .await
    .unwrap();
  }

  let moved = s
    .reassign_analytics_events(a.voter_id, b.voter_id)
    .await
    .unwrap();
  assert_eq!(moved, 3);
  assert!(s
    .analytics_events_for_voter(a.voter_id)
    .await
    .unwrap()
    .is_empty());
  assert_eq!(s.analytics_events_for_voter(b.voter_id).await.unwrap().len(), 3);

  // Nothing left to move; the second pass is a no-op, not an error.
  let moved_again = s
    .reassign_analytics_events(a.voter_id, b.voter_id)
    .await
    .unwrap();
  assert_eq!(moved_again, 0);
}

#[tokio::test]
async fn bookmark_count_only_counts_organization_references() {
  let s = store().await;
  let voter = s.create_voter().await.unwrap();
  let org_id = Uuid::new_v4();

  s.add_bookmark(Bookmark {
    bookmark_id: Uuid::new_v4(),
    voter_id:    voter.voter_id,
    item:        BookmarkItem::Organization(org_id),
    created_at:  Utc::now(),
  })
  .await
  .unwrap();
  s.add_bookmark(Bookmark {
    bookmark_id: Uuid::new_v4(),
    voter_id:    voter.voter_id,
    item:        BookmarkItem::BallotItem("measure-3".into()),
    created_at:  Utc::now(),
  })
  .await
  .unwrap();

  assert_eq!(
    s.count_bookmarks_referencing_organization(org_id).await.unwrap(),
    1
  );
  assert_eq!(
    s.count_bookmarks_referencing_organization(Uuid::new_v4())
      .await
      .unwrap(),
    0
  );
}
