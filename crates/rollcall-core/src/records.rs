//! Dependent record types — the data transplanted during an account merge.
//!
//! Each record is owned by exactly one voter (and, for positions and voter
//! guides, denormalised onto an organization for query speed). Ownership is
//! the unit of transfer: movers reassign the owner reference, de-duplicating
//! by each domain's natural key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Positions ───────────────────────────────────────────────────────────────

/// A public stance on a ballot item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
  Support,
  Oppose,
  StillDeciding,
}

/// Natural key: `(owner, ballot_item_id)`. The `organization_id` mirrors the
/// owning voter's linked organization and can dangle after a merge until
/// position repair re-points it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
  pub position_id:     Uuid,
  pub voter_id:        Option<Uuid>,
  pub organization_id: Option<Uuid>,
  pub ballot_item_id:  String,
  pub stance:          Stance,
  pub statement:       Option<String>,
  pub recorded_at:     DateTime<Utc>,
}

// ─── Follows ─────────────────────────────────────────────────────────────────

/// What a follow relationship points at. This is the follow's natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum FollowTarget {
  Organization(Uuid),
  Issue(Uuid),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follow {
  pub follow_id:   Uuid,
  pub voter_id:    Uuid,
  pub target:      FollowTarget,
  pub followed_at: DateTime<Utc>,
}

// ─── Friends ─────────────────────────────────────────────────────────────────

/// Natural key: the other party's voter id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Friendship {
  pub friendship_id:   Uuid,
  pub voter_id:        Uuid,
  pub friend_voter_id: Uuid,
  pub since:           DateTime<Utc>,
}

/// Who a pending friend invitation is addressed to — the invite's natural
/// key. Email invitations cover recipients who have no account yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum InviteRecipient {
  Voter(Uuid),
  Email(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendInvite {
  pub invite_id:       Uuid,
  pub sender_voter_id: Uuid,
  pub recipient:       InviteRecipient,
  pub message:         Option<String>,
  pub sent_at:         DateTime<Utc>,
}

// ─── Email entries ───────────────────────────────────────────────────────────

/// One email address owned by a voter. Addresses are globally unique; the
/// verified entry is what makes an email an external identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailEntry {
  pub email_id:   Uuid,
  pub voter_id:   Uuid,
  pub address:    String,
  pub verified:   bool,
  pub created_at: DateTime<Utc>,
}

// ─── Donations ───────────────────────────────────────────────────────────────

/// Natural key: the payment processor's charge id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Donation {
  pub donation_id:  Uuid,
  pub voter_id:     Uuid,
  pub charge_id:    String,
  pub amount_cents: i64,
  pub donated_at:   DateTime<Utc>,
}

// ─── Voter guides ────────────────────────────────────────────────────────────

/// Natural key: the election the guide was written for. Like positions, the
/// `organization_id` is a denormalised copy of the owner's linked
/// organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterGuide {
  pub guide_id:        Uuid,
  pub owner_voter_id:  Uuid,
  pub organization_id: Option<Uuid>,
  pub election_id:     String,
  pub created_at:      DateTime<Utc>,
}

// ─── Analytics ───────────────────────────────────────────────────────────────

/// No natural key — events are facts about what happened and are moved in
/// bulk, never de-duplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsEvent {
  pub event_id:    Uuid,
  pub voter_id:    Uuid,
  pub action:      String,
  pub recorded_at: DateTime<Utc>,
}

// ─── Bookmarks ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum BookmarkItem {
  BallotItem(String),
  Organization(Uuid),
}

/// A saved item. Bookmarks referencing an organization block that
/// organization from being automatically merged (manual intervention).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
  pub bookmark_id: Uuid,
  pub voter_id:    Uuid,
  pub item:        BookmarkItem,
  pub created_at:  DateTime<Utc>,
}
