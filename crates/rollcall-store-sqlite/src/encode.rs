//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. UUIDs are stored as
//! hyphenated lowercase strings. Two-part enums (follow targets, invite
//! recipients, bookmark items) are stored as a discriminant column plus a
//! value column.

use chrono::{DateTime, Utc};
use rollcall_core::{
  identity::{AuthSession, IdentityLink, Provider},
  organization::Organization,
  records::{
    AnalyticsEvent, BookmarkItem, Donation, EmailEntry, Follow, FollowTarget,
    FriendInvite, Friendship, InviteRecipient, Position, Stance, VoterGuide,
  },
  voter::{ProviderCache, Voter},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn encode_opt_uuid(id: Option<Uuid>) -> Option<String> {
  id.map(encode_uuid)
}

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_opt_uuid(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Provider ────────────────────────────────────────────────────────────────

pub fn encode_provider(p: Provider) -> &'static str { p.as_str() }

pub fn decode_provider(s: &str) -> Result<Provider> {
  Provider::from_str(s).map_err(Error::Core)
}

// ─── Stance ──────────────────────────────────────────────────────────────────

pub fn encode_stance(s: Stance) -> &'static str {
  match s {
    Stance::Support => "support",
    Stance::Oppose => "oppose",
    Stance::StillDeciding => "still_deciding",
  }
}

pub fn decode_stance(s: &str) -> Result<Stance> {
  match s {
    "support" => Ok(Stance::Support),
    "oppose" => Ok(Stance::Oppose),
    "still_deciding" => Ok(Stance::StillDeciding),
    other => Err(Error::UnknownDiscriminant {
      column: "stance",
      value:  other.to_owned(),
    }),
  }
}

// ─── Follow target ───────────────────────────────────────────────────────────

pub fn encode_follow_target(t: FollowTarget) -> (&'static str, String) {
  match t {
    FollowTarget::Organization(id) => ("organization", encode_uuid(id)),
    FollowTarget::Issue(id) => ("issue", encode_uuid(id)),
  }
}

pub fn decode_follow_target(kind: &str, id: &str) -> Result<FollowTarget> {
  match kind {
    "organization" => Ok(FollowTarget::Organization(decode_uuid(id)?)),
    "issue" => Ok(FollowTarget::Issue(decode_uuid(id)?)),
    other => Err(Error::UnknownDiscriminant {
      column: "target_kind",
      value:  other.to_owned(),
    }),
  }
}

// ─── Invite recipient ────────────────────────────────────────────────────────

pub fn encode_invite_recipient(r: &InviteRecipient) -> (&'static str, String) {
  match r {
    InviteRecipient::Voter(id) => ("voter", encode_uuid(*id)),
    InviteRecipient::Email(address) => ("email", address.clone()),
  }
}

pub fn decode_invite_recipient(kind: &str, value: &str) -> Result<InviteRecipient> {
  match kind {
    "voter" => Ok(InviteRecipient::Voter(decode_uuid(value)?)),
    "email" => Ok(InviteRecipient::Email(value.to_owned())),
    other => Err(Error::UnknownDiscriminant {
      column: "recipient_kind",
      value:  other.to_owned(),
    }),
  }
}

// ─── Bookmark item ───────────────────────────────────────────────────────────

pub fn encode_bookmark_item(i: &BookmarkItem) -> (&'static str, String) {
  match i {
    BookmarkItem::BallotItem(id) => ("ballot_item", id.clone()),
    BookmarkItem::Organization(id) => ("organization", encode_uuid(*id)),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `voters` row.
pub struct RawVoter {
  pub voter_id:               String,
  pub created_at:             String,
  pub first_name:             Option<String>,
  pub last_name:              Option<String>,
  pub email:                  Option<String>,
  pub primary_email_id:       Option<String>,
  pub email_verified:         bool,
  pub twitter_user_id:        Option<i64>,
  pub twitter_screen_name:    Option<String>,
  pub twitter_display_name:   Option<String>,
  pub twitter_image_url:      Option<String>,
  pub facebook_user_id:       Option<i64>,
  pub facebook_screen_name:   Option<String>,
  pub facebook_display_name:  Option<String>,
  pub facebook_image_url:     Option<String>,
  pub linked_organization_id: Option<String>,
  pub interface_flags:        i64,
  pub notification_flags:     i64,
}

/// Column list matching [`RawVoter`] field order; shared by every voter
/// SELECT so the `query_map` closures stay in sync.
pub const VOTER_COLUMNS: &str = "voter_id, created_at, first_name, last_name, \
   email, primary_email_id, email_verified, \
   twitter_user_id, twitter_screen_name, twitter_display_name, twitter_image_url, \
   facebook_user_id, facebook_screen_name, facebook_display_name, facebook_image_url, \
   linked_organization_id, interface_flags, notification_flags";

impl RawVoter {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      voter_id:               row.get(0)?,
      created_at:             row.get(1)?,
      first_name:             row.get(2)?,
      last_name:              row.get(3)?,
      email:                  row.get(4)?,
      primary_email_id:       row.get(5)?,
      email_verified:         row.get(6)?,
      twitter_user_id:        row.get(7)?,
      twitter_screen_name:    row.get(8)?,
      twitter_display_name:   row.get(9)?,
      twitter_image_url:      row.get(10)?,
      facebook_user_id:       row.get(11)?,
      facebook_screen_name:   row.get(12)?,
      facebook_display_name:  row.get(13)?,
      facebook_image_url:     row.get(14)?,
      linked_organization_id: row.get(15)?,
      interface_flags:        row.get(16)?,
      notification_flags:     row.get(17)?,
    })
  }

  pub fn into_voter(self) -> Result<Voter> {
    Ok(Voter {
      voter_id:               decode_uuid(&self.voter_id)?,
      created_at:             decode_dt(&self.created_at)?,
      first_name:             self.first_name,
      last_name:              self.last_name,
      email:                  self.email,
      primary_email_id:       decode_opt_uuid(self.primary_email_id.as_deref())?,
      email_verified:         self.email_verified,
      twitter:                ProviderCache {
        external_user_id:  self.twitter_user_id,
        screen_name:       self.twitter_screen_name,
        display_name:      self.twitter_display_name,
        profile_image_url: self.twitter_image_url,
      },
      facebook:               ProviderCache {
        external_user_id:  self.facebook_user_id,
        screen_name:       self.facebook_screen_name,
        display_name:      self.facebook_display_name,
        profile_image_url: self.facebook_image_url,
      },
      linked_organization_id: decode_opt_uuid(self.linked_organization_id.as_deref())?,
      interface_flags:        self.interface_flags as u64,
      notification_flags:     self.notification_flags as u64,
    })
  }
}

/// Raw values read directly from an `organizations` row.
pub struct RawOrganization {
  pub organization_id:       String,
  pub created_at:            String,
  pub name:                  Option<String>,
  pub twitter_user_id:       Option<i64>,
  pub twitter_screen_name:   Option<String>,
  pub twitter_display_name:  Option<String>,
  pub twitter_image_url:     Option<String>,
  pub facebook_user_id:      Option<i64>,
  pub facebook_screen_name:  Option<String>,
  pub facebook_display_name: Option<String>,
  pub facebook_image_url:    Option<String>,
  pub follower_count:        i64,
}

pub const ORGANIZATION_COLUMNS: &str = "organization_id, created_at, name, \
   twitter_user_id, twitter_screen_name, twitter_display_name, twitter_image_url, \
   facebook_user_id, facebook_screen_name, facebook_display_name, facebook_image_url, \
   follower_count";

impl RawOrganization {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      organization_id:       row.get(0)?,
      created_at:            row.get(1)?,
      name:                  row.get(2)?,
      twitter_user_id:       row.get(3)?,
      twitter_screen_name:   row.get(4)?,
      twitter_display_name:  row.get(5)?,
      twitter_image_url:     row.get(6)?,
      facebook_user_id:      row.get(7)?,
      facebook_screen_name:  row.get(8)?,
      facebook_display_name: row.get(9)?,
      facebook_image_url:    row.get(10)?,
      follower_count:        row.get(11)?,
    })
  }

  pub fn into_organization(self) -> Result<Organization> {
    Ok(Organization {
      organization_id: decode_uuid(&self.organization_id)?,
      created_at:      decode_dt(&self.created_at)?,
      name:            self.name,
      twitter:         ProviderCache {
        external_user_id:  self.twitter_user_id,
        screen_name:       self.twitter_screen_name,
        display_name:      self.twitter_display_name,
        profile_image_url: self.twitter_image_url,
      },
      facebook:        ProviderCache {
        external_user_id:  self.facebook_user_id,
        screen_name:       self.facebook_screen_name,
        display_name:      self.facebook_display_name,
        profile_image_url: self.facebook_image_url,
      },
      follower_count:  self.follower_count as u64,
    })
  }
}

/// Raw values read directly from an `identity_links` row.
pub struct RawIdentityLink {
  pub provider:         String,
  pub external_user_id: i64,
  pub voter_id:         String,
  pub secret_key:       String,
  pub created_at:       String,
}

impl RawIdentityLink {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      provider:         row.get(0)?,
      external_user_id: row.get(1)?,
      voter_id:         row.get(2)?,
      secret_key:       row.get(3)?,
      created_at:       row.get(4)?,
    })
  }

  pub fn into_link(self) -> Result<IdentityLink> {
    Ok(IdentityLink {
      provider:         decode_provider(&self.provider)?,
      external_user_id: self.external_user_id,
      voter_id:         decode_uuid(&self.voter_id)?,
      secret_key:       self.secret_key,
      created_at:       decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from an `auth_sessions` row.
pub struct RawAuthSession {
  pub session_id:        String,
  pub provider:          String,
  pub device_session_id: String,
  pub request_token:     Option<String>,
  pub request_secret:    Option<String>,
  pub access_token:      Option<String>,
  pub access_secret:     Option<String>,
  pub created_at:        String,
}

impl RawAuthSession {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      session_id:        row.get(0)?,
      provider:          row.get(1)?,
      device_session_id: row.get(2)?,
      request_token:     row.get(3)?,
      request_secret:    row.get(4)?,
      access_token:      row.get(5)?,
      access_secret:     row.get(6)?,
      created_at:        row.get(7)?,
    })
  }

  pub fn into_session(self) -> Result<AuthSession> {
    Ok(AuthSession {
      session_id:        decode_uuid(&self.session_id)?,
      provider:          decode_provider(&self.provider)?,
      device_session_id: self.device_session_id,
      request_token:     self.request_token,
      request_secret:    self.request_secret,
      access_token:      self.access_token,
      access_secret:     self.access_secret,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `positions` row.
pub struct RawPosition {
  pub position_id:     String,
  pub voter_id:        Option<String>,
  pub organization_id: Option<String>,
  pub ballot_item_id:  String,
  pub stance:          String,
  pub statement:       Option<String>,
  pub recorded_at:     String,
}

impl RawPosition {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      position_id:     row.get(0)?,
      voter_id:        row.get(1)?,
      organization_id: row.get(2)?,
      ballot_item_id:  row.get(3)?,
      stance:          row.get(4)?,
      statement:       row.get(5)?,
      recorded_at:     row.get(6)?,
    })
  }

  pub fn into_position(self) -> Result<Position> {
    Ok(Position {
      position_id:     decode_uuid(&self.position_id)?,
      voter_id:        decode_opt_uuid(self.voter_id.as_deref())?,
      organization_id: decode_opt_uuid(self.organization_id.as_deref())?,
      ballot_item_id:  self.ballot_item_id,
      stance:          decode_stance(&self.stance)?,
      statement:       self.statement,
      recorded_at:     decode_dt(&self.recorded_at)?,
    })
  }
}

/// Raw values read directly from a `follows` row.
pub struct RawFollow {
  pub follow_id:   String,
  pub voter_id:    String,
  pub target_kind: String,
  pub target_id:   String,
  pub followed_at: String,
}

impl RawFollow {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      follow_id:   row.get(0)?,
      voter_id:    row.get(1)?,
      target_kind: row.get(2)?,
      target_id:   row.get(3)?,
      followed_at: row.get(4)?,
    })
  }

  pub fn into_follow(self) -> Result<Follow> {
    Ok(Follow {
      follow_id:   decode_uuid(&self.follow_id)?,
      voter_id:    decode_uuid(&self.voter_id)?,
      target:      decode_follow_target(&self.target_kind, &self.target_id)?,
      followed_at: decode_dt(&self.followed_at)?,
    })
  }
}

/// Raw values read directly from a `friendships` row.
pub struct RawFriendship {
  pub friendship_id:   String,
  pub voter_id:        String,
  pub friend_voter_id: String,
  pub since:           String,
}

impl RawFriendship {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      friendship_id:   row.get(0)?,
      voter_id:        row.get(1)?,
      friend_voter_id: row.get(2)?,
      since:           row.get(3)?,
    })
  }

  pub fn into_friendship(self) -> Result<Friendship> {
    Ok(Friendship {
      friendship_id:   decode_uuid(&self.friendship_id)?,
      voter_id:        decode_uuid(&self.voter_id)?,
      friend_voter_id: decode_uuid(&self.friend_voter_id)?,
      since:           decode_dt(&self.since)?,
    })
  }
}

/// Raw values read directly from a `friend_invites` row.
pub struct RawFriendInvite {
  pub invite_id:       String,
  pub sender_voter_id: String,
  pub recipient_kind:  String,
  pub recipient_value: String,
  pub message:         Option<String>,
  pub sent_at:         String,
}

impl RawFriendInvite {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      invite_id:       row.get(0)?,
      sender_voter_id: row.get(1)?,
      recipient_kind:  row.get(2)?,
      recipient_value: row.get(3)?,
      message:         row.get(4)?,
      sent_at:         row.get(5)?,
    })
  }

  pub fn into_invite(self) -> Result<FriendInvite> {
    Ok(FriendInvite {
      invite_id:       decode_uuid(&self.invite_id)?,
      sender_voter_id: decode_uuid(&self.sender_voter_id)?,
      recipient:       decode_invite_recipient(&self.recipient_kind, &self.recipient_value)?,
      message:         self.message,
      sent_at:         decode_dt(&self.sent_at)?,
    })
  }
}

/// Raw values read directly from an `email_entries` row.
pub struct RawEmailEntry {
  pub email_id:   String,
  pub voter_id:   String,
  pub address:    String,
  pub verified:   bool,
  pub created_at: String,
}

impl RawEmailEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      email_id:   row.get(0)?,
      voter_id:   row.get(1)?,
      address:    row.get(2)?,
      verified:   row.get(3)?,
      created_at: row.get(4)?,
    })
  }

  pub fn into_entry(self) -> Result<EmailEntry> {
    Ok(EmailEntry {
      email_id:   decode_uuid(&self.email_id)?,
      voter_id:   decode_uuid(&self.voter_id)?,
      address:    self.address,
      verified:   self.verified,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `donations` row.
pub struct RawDonation {
  pub donation_id:  String,
  pub voter_id:     String,
  pub charge_id:    String,
  pub amount_cents: i64,
  pub donated_at:   String,
}

impl RawDonation {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      donation_id:  row.get(0)?,
      voter_id:     row.get(1)?,
      charge_id:    row.get(2)?,
      amount_cents: row.get(3)?,
      donated_at:   row.get(4)?,
    })
  }

  pub fn into_donation(self) -> Result<Donation> {
    Ok(Donation {
      donation_id:  decode_uuid(&self.donation_id)?,
      voter_id:     decode_uuid(&self.voter_id)?,
      charge_id:    self.charge_id,
      amount_cents: self.amount_cents,
      donated_at:   decode_dt(&self.donated_at)?,
    })
  }
}

/// Raw values read directly from a `voter_guides` row.
pub struct RawVoterGuide {
  pub guide_id:        String,
  pub owner_voter_id:  String,
  pub organization_id: Option<String>,
  pub election_id:     String,
  pub created_at:      String,
}

impl RawVoterGuide {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      guide_id:        row.get(0)?,
      owner_voter_id:  row.get(1)?,
      organization_id: row.get(2)?,
      election_id:     row.get(3)?,
      created_at:      row.get(4)?,
    })
  }

  pub fn into_guide(self) -> Result<VoterGuide> {
    Ok(VoterGuide {
      guide_id:        decode_uuid(&self.guide_id)?,
      owner_voter_id:  decode_uuid(&self.owner_voter_id)?,
      organization_id: decode_opt_uuid(self.organization_id.as_deref())?,
      election_id:     self.election_id,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from an `analytics_events` row.
pub struct RawAnalyticsEvent {
  pub event_id:    String,
  pub voter_id:    String,
  pub action:      String,
  pub recorded_at: String,
}

impl RawAnalyticsEvent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      event_id:    row.get(0)?,
      voter_id:    row.get(1)?,
      action:      row.get(2)?,
      recorded_at: row.get(3)?,
    })
  }

  pub fn into_event(self) -> Result<AnalyticsEvent> {
    Ok(AnalyticsEvent {
      event_id:    decode_uuid(&self.event_id)?,
      voter_id:    decode_uuid(&self.voter_id)?,
      action:      self.action,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}
