//! The `ReconciliationStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `rollcall-store-sqlite`). The reconciliation engine depends on this
//! abstraction, not on any concrete backend.
//!
//! Store methods have no side effects beyond the store itself: the engine
//! owns all cross-record orchestration. Single-row writes are atomic at the
//! storage layer; nothing here spans a transaction across calls.

use std::future::Future;

use uuid::Uuid;

use crate::{
  identity::{AuthSession, IdentityLink, LinkAttempt, Provider},
  organization::{NewOrganization, Organization},
  records::{
    AnalyticsEvent, Bookmark, Donation, EmailEntry, Follow, FriendInvite,
    Friendship, Position, VoterGuide,
  },
  voter::Voter,
};

/// Abstraction over a Rollcall storage backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait ReconciliationStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Voters ────────────────────────────────────────────────────────────

  /// Create and persist a new anonymous voter (no external identity yet).
  fn create_voter(
    &self,
  ) -> impl Future<Output = Result<Voter, Self::Error>> + Send + '_;

  /// Retrieve a voter by id. Returns `None` if not found.
  fn get_voter(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Voter>, Self::Error>> + Send + '_;

  /// Persist the full voter row as given.
  fn update_voter(
    &self,
    voter: Voter,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// The voter whose cached email projection matches `address` with
  /// verified ownership, if any.
  fn voter_by_verified_email<'a>(
    &'a self,
    address: &'a str,
  ) -> impl Future<Output = Result<Option<Voter>, Self::Error>> + Send + 'a;

  /// All voters whose cached provider fields reference this identity —
  /// by user id, or case-insensitively by screen name when one is given.
  /// Used by caching repair and by the legacy cached-id sign-in fallback.
  fn voters_with_cached_identity<'a>(
    &'a self,
    provider: Provider,
    external_user_id: i64,
    screen_name: Option<&'a str>,
  ) -> impl Future<Output = Result<Vec<Voter>, Self::Error>> + Send + 'a;

  /// The voter currently holding `organization_id` as its linked
  /// organization, if any.
  fn voter_by_linked_organization(
    &self,
    organization_id: Uuid,
  ) -> impl Future<Output = Result<Option<Voter>, Self::Error>> + Send + '_;

  // ── Device sessions ───────────────────────────────────────────────────

  /// The voter currently bound to a device session.
  fn voter_for_device<'a>(
    &'a self,
    device_session_id: &'a str,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + 'a;

  /// Bind (or rebind) a device session to a voter.
  fn bind_device<'a>(
    &'a self,
    device_session_id: &'a str,
    voter_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Identity links ────────────────────────────────────────────────────

  /// Look up the authoritative owner of a provider identity.
  fn find_identity_link(
    &self,
    provider: Provider,
    external_user_id: i64,
  ) -> impl Future<Output = Result<Option<IdentityLink>, Self::Error>> + Send + '_;

  /// Attempt to link a provider identity to a voter.
  ///
  /// Succeeds idempotently if the identity is already linked to the same
  /// voter; reports [`LinkAttempt::Conflict`] (a value, not an error) if it
  /// is linked to a different one. The backing UNIQUE constraint is the
  /// only cross-process guard against racing link creations.
  fn create_identity_link(
    &self,
    provider: Provider,
    external_user_id: i64,
    voter_id: Uuid,
  ) -> impl Future<Output = Result<LinkAttempt, Self::Error>> + Send + '_;

  /// Provider OAuth/session state for an anonymous device, created on first
  /// access.
  fn retrieve_or_create_auth_session<'a>(
    &'a self,
    provider: Provider,
    device_session_id: &'a str,
  ) -> impl Future<Output = Result<AuthSession, Self::Error>> + Send + 'a;

  // ── Organizations ─────────────────────────────────────────────────────

  fn create_organization(
    &self,
    input: NewOrganization,
  ) -> impl Future<Output = Result<Organization, Self::Error>> + Send + '_;

  fn get_organization(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Organization>, Self::Error>> + Send + '_;

  fn update_organization(
    &self,
    organization: Organization,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// All organizations whose cached provider fields reference this
  /// identity. Used by caching repair.
  fn organizations_with_cached_identity(
    &self,
    provider: Provider,
    external_user_id: i64,
  ) -> impl Future<Output = Result<Vec<Organization>, Self::Error>> + Send + '_;

  // ── Positions ─────────────────────────────────────────────────────────

  fn add_position(
    &self,
    position: Position,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn positions_for_voter(
    &self,
    voter_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Position>, Self::Error>> + Send + '_;

  fn positions_for_organization(
    &self,
    organization_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Position>, Self::Error>> + Send + '_;

  fn update_position(
    &self,
    position: Position,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn delete_position(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Follows ───────────────────────────────────────────────────────────

  fn add_follow(
    &self,
    follow: Follow,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn follows_for_voter(
    &self,
    voter_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Follow>, Self::Error>> + Send + '_;

  fn update_follow(
    &self,
    follow: Follow,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn delete_follow(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Friendships ───────────────────────────────────────────────────────

  fn add_friendship(
    &self,
    friendship: Friendship,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn friendships_for_voter(
    &self,
    voter_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Friendship>, Self::Error>> + Send + '_;

  fn update_friendship(
    &self,
    friendship: Friendship,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn delete_friendship(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Friend invites ────────────────────────────────────────────────────

  fn add_friend_invite(
    &self,
    invite: FriendInvite,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn invites_sent_by_voter(
    &self,
    voter_id: Uuid,
  ) -> impl Future<Output = Result<Vec<FriendInvite>, Self::Error>> + Send + '_;

  fn update_friend_invite(
    &self,
    invite: FriendInvite,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn delete_friend_invite(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Email entries ─────────────────────────────────────────────────────

  fn add_email_entry(
    &self,
    entry: EmailEntry,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn email_entries_for_voter(
    &self,
    voter_id: Uuid,
  ) -> impl Future<Output = Result<Vec<EmailEntry>, Self::Error>> + Send + '_;

  fn update_email_entry(
    &self,
    entry: EmailEntry,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn delete_email_entry(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Donations ─────────────────────────────────────────────────────────

  fn add_donation(
    &self,
    donation: Donation,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn donations_for_voter(
    &self,
    voter_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Donation>, Self::Error>> + Send + '_;

  fn update_donation(
    &self,
    donation: Donation,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn delete_donation(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Voter guides ──────────────────────────────────────────────────────

  fn add_voter_guide(
    &self,
    guide: VoterGuide,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn guides_for_voter(
    &self,
    voter_id: Uuid,
  ) -> impl Future<Output = Result<Vec<VoterGuide>, Self::Error>> + Send + '_;

  fn update_voter_guide(
    &self,
    guide: VoterGuide,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn delete_voter_guide(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Analytics ─────────────────────────────────────────────────────────

  fn add_analytics_event(
    &self,
    event: AnalyticsEvent,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn analytics_events_for_voter(
    &self,
    voter_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AnalyticsEvent>, Self::Error>> + Send + '_;

  /// Bulk-reassign all events from one voter to another. Returns the number
  /// of rows moved. Events carry no natural key and are never de-duplicated.
  fn reassign_analytics_events(
    &self,
    from_voter_id: Uuid,
    to_voter_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Bookmarks ─────────────────────────────────────────────────────────

  fn add_bookmark(
    &self,
    bookmark: Bookmark,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// How many bookmarks (from any voter) reference this organization.
  /// A non-zero count blocks automatic organization merge.
  fn count_bookmarks_referencing_organization(
    &self,
    organization_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}
