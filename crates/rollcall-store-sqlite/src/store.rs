//! [`SqliteStore`] — the SQLite implementation of [`ReconciliationStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use rollcall_core::{
  identity::{AuthSession, IdentityLink, LinkAttempt, Provider},
  organization::{NewOrganization, Organization},
  records::{
    AnalyticsEvent, Bookmark, Donation, EmailEntry, Follow, FriendInvite,
    Friendship, Position, VoterGuide,
  },
  store::ReconciliationStore,
  voter::{ProviderCache, Voter},
};

use crate::{
  encode::{
    encode_bookmark_item, encode_dt, encode_follow_target,
    encode_invite_recipient, encode_opt_uuid, encode_provider, encode_stance,
    encode_uuid, RawAnalyticsEvent, RawAuthSession, RawDonation, RawEmailEntry,
    RawFollow, RawFriendInvite, RawFriendship, RawIdentityLink, RawOrganization,
    RawPosition, RawVoter, RawVoterGuide, ORGANIZATION_COLUMNS, VOTER_COLUMNS,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Rollcall store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert or fully update a `voters` row.
  async fn upsert_voter(&self, voter: &Voter, insert: bool) -> Result<()> {
    let voter_id_str   = encode_uuid(voter.voter_id);
    let created_at_str = encode_dt(voter.created_at);
    let first_name     = voter.first_name.clone();
    let last_name      = voter.last_name.clone();
    let email          = voter.email.clone();
    let primary_email  = encode_opt_uuid(voter.primary_email_id);
    let email_verified = voter.email_verified;
    let tw             = voter.twitter.clone();
    let fb             = voter.facebook.clone();
    let linked_org     = encode_opt_uuid(voter.linked_organization_id);
    let iface_flags    = voter.interface_flags as i64;
    let notif_flags    = voter.notification_flags as i64;

    let sql = if insert {
      "INSERT INTO voters (
         voter_id, created_at, first_name, last_name,
         email, primary_email_id, email_verified,
         twitter_user_id, twitter_screen_name, twitter_display_name, twitter_image_url,
         facebook_user_id, facebook_screen_name, facebook_display_name, facebook_image_url,
         linked_organization_id, interface_flags, notification_flags
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
    } else {
      "UPDATE voters SET
         created_at = ?2, first_name = ?3, last_name = ?4,
         email = ?5, primary_email_id = ?6, email_verified = ?7,
         twitter_user_id = ?8, twitter_screen_name = ?9,
         twitter_display_name = ?10, twitter_image_url = ?11,
         facebook_user_id = ?12, facebook_screen_name = ?13,
         facebook_display_name = ?14, facebook_image_url = ?15,
         linked_organization_id = ?16, interface_flags = ?17, notification_flags = ?18
       WHERE voter_id = ?1"
    };

    self
      .conn
      .call(move |conn| {
        conn.execute(
          sql,
          rusqlite::params![
            voter_id_str,
            created_at_str,
            first_name,
            last_name,
            email,
            primary_email,
            email_verified,
            tw.external_user_id,
            tw.screen_name,
            tw.display_name,
            tw.profile_image_url,
            fb.external_user_id,
            fb.screen_name,
            fb.display_name,
            fb.profile_image_url,
            linked_org,
            iface_flags,
            notif_flags,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert or fully update an `organizations` row.
  async fn upsert_organization(
    &self,
    organization: &Organization,
    insert: bool,
  ) -> Result<()> {
    let org_id_str     = encode_uuid(organization.organization_id);
    let created_at_str = encode_dt(organization.created_at);
    let name           = organization.name.clone();
    let tw             = organization.twitter.clone();
    let fb             = organization.facebook.clone();
    let followers      = organization.follower_count as i64;

    let sql = if insert {
      "INSERT INTO organizations (
         organization_id, created_at, name,
         twitter_user_id, twitter_screen_name, twitter_display_name, twitter_image_url,
         facebook_user_id, facebook_screen_name, facebook_display_name, facebook_image_url,
         follower_count
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
    } else {
      "UPDATE organizations SET
         created_at = ?2, name = ?3,
         twitter_user_id = ?4, twitter_screen_name = ?5,
         twitter_display_name = ?6, twitter_image_url = ?7,
         facebook_user_id = ?8, facebook_screen_name = ?9,
         facebook_display_name = ?10, facebook_image_url = ?11,
         follower_count = ?12
       WHERE organization_id = ?1"
    };

    self
      .conn
      .call(move |conn| {
        conn.execute(
          sql,
          rusqlite::params![
            org_id_str,
            created_at_str,
            name,
            tw.external_user_id,
            tw.screen_name,
            tw.display_name,
            tw.profile_image_url,
            fb.external_user_id,
            fb.screen_name,
            fb.display_name,
            fb.profile_image_url,
            followers,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// The cached-identity columns for one provider.
  fn cache_columns(provider: Provider) -> (&'static str, &'static str) {
    match provider {
      Provider::Twitter => ("twitter_user_id", "twitter_screen_name"),
      Provider::Facebook => ("facebook_user_id", "facebook_screen_name"),
    }
  }
}

// ─── ReconciliationStore impl ────────────────────────────────────────────────

impl ReconciliationStore for SqliteStore {
  type Error = Error;

  // ── Voters ────────────────────────────────────────────────────────────────

  async fn create_voter(&self) -> Result<Voter> {
    let voter = Voter {
      voter_id:               Uuid::new_v4(),
      created_at:             Utc::now(),
      first_name:             None,
      last_name:              None,
      email:                  None,
      primary_email_id:       None,
      email_verified:         false,
      twitter:                ProviderCache::default(),
      facebook:               ProviderCache::default(),
      linked_organization_id: None,
      interface_flags:        0,
      notification_flags:     0,
    };
    self.upsert_voter(&voter, true).await?;
    Ok(voter)
  }

  async fn get_voter(&self, id: Uuid) -> Result<Option<Voter>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawVoter> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {VOTER_COLUMNS} FROM voters WHERE voter_id = ?1"),
              rusqlite::params![id_str],
              RawVoter::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawVoter::into_voter).transpose()
  }

  async fn update_voter(&self, voter: Voter) -> Result<()> {
    self.upsert_voter(&voter, false).await
  }

  async fn voter_by_verified_email(&self, address: &str) -> Result<Option<Voter>> {
    let address = address.to_owned();

    let raw: Option<RawVoter> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {VOTER_COLUMNS} FROM voters
                 WHERE email = ?1 COLLATE NOCASE AND email_verified = 1"
              ),
              rusqlite::params![address],
              RawVoter::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawVoter::into_voter).transpose()
  }

  async fn voters_with_cached_identity(
    &self,
    provider: Provider,
    external_user_id: i64,
    screen_name: Option<&str>,
  ) -> Result<Vec<Voter>> {
    let (id_col, name_col) = Self::cache_columns(provider);
    let screen_name = screen_name.map(str::to_owned);

    let raws: Vec<RawVoter> = self
      .conn
      .call(move |conn| {
        let sql = if screen_name.is_some() {
          format!(
            "SELECT {VOTER_COLUMNS} FROM voters
             WHERE {id_col} = ?1 OR lower({name_col}) = lower(?2)"
          )
        } else {
          format!("SELECT {VOTER_COLUMNS} FROM voters WHERE {id_col} = ?1")
        };

        let mut stmt = conn.prepare(&sql)?;
        let rows = if let Some(name) = screen_name {
          stmt
            .query_map(rusqlite::params![external_user_id, name], RawVoter::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          stmt
            .query_map(rusqlite::params![external_user_id], RawVoter::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawVoter::into_voter).collect()
  }

  async fn voter_by_linked_organization(
    &self,
    organization_id: Uuid,
  ) -> Result<Option<Voter>> {
    let org_str = encode_uuid(organization_id);

    let raw: Option<RawVoter> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {VOTER_COLUMNS} FROM voters WHERE linked_organization_id = ?1"
              ),
              rusqlite::params![org_str],
              RawVoter::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawVoter::into_voter).transpose()
  }

  // ── Device sessions ───────────────────────────────────────────────────────

  async fn voter_for_device(&self, device_session_id: &str) -> Result<Option<Uuid>> {
    let device = device_session_id.to_owned();

    let id_str: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT voter_id FROM device_links WHERE device_session_id = ?1",
              rusqlite::params![device],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    id_str
      .map(|s| Uuid::parse_str(&s))
      .transpose()
      .map_err(Error::Uuid)
  }

  async fn bind_device(&self, device_session_id: &str, voter_id: Uuid) -> Result<()> {
    let device    = device_session_id.to_owned();
    let voter_str = encode_uuid(voter_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO device_links (device_session_id, voter_id) VALUES (?1, ?2)
           ON CONFLICT(device_session_id) DO UPDATE SET voter_id = excluded.voter_id",
          rusqlite::params![device, voter_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Identity links ────────────────────────────────────────────────────────

  async fn find_identity_link(
    &self,
    provider: Provider,
    external_user_id: i64,
  ) -> Result<Option<IdentityLink>> {
    let provider_str = encode_provider(provider).to_owned();

    let raw: Option<RawIdentityLink> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT provider, external_user_id, voter_id, secret_key, created_at
               FROM identity_links WHERE provider = ?1 AND external_user_id = ?2",
              rusqlite::params![provider_str, external_user_id],
              RawIdentityLink::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawIdentityLink::into_link).transpose()
  }

  async fn create_identity_link(
    &self,
    provider: Provider,
    external_user_id: i64,
    voter_id: Uuid,
  ) -> Result<LinkAttempt> {
    if let Some(existing) = self.find_identity_link(provider, external_user_id).await? {
      if existing.voter_id == voter_id {
        return Ok(LinkAttempt::Linked(existing));
      }
      return Ok(LinkAttempt::Conflict { existing });
    }

    let link = IdentityLink {
      provider,
      external_user_id,
      voter_id,
      secret_key: Uuid::new_v4().simple().to_string(),
      created_at: Utc::now(),
    };

    let provider_str   = encode_provider(provider).to_owned();
    let voter_str      = encode_uuid(voter_id);
    let secret         = link.secret_key.clone();
    let created_at_str = encode_dt(link.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO identity_links
             (provider, external_user_id, voter_id, secret_key, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![provider_str, external_user_id, voter_str, secret, created_at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(LinkAttempt::Linked(link))
  }

  async fn retrieve_or_create_auth_session(
    &self,
    provider: Provider,
    device_session_id: &str,
  ) -> Result<AuthSession> {
    let provider_str = encode_provider(provider).to_owned();
    let device       = device_session_id.to_owned();

    let existing: Option<RawAuthSession> = {
      let provider_str = provider_str.clone();
      let device = device.clone();
      self
        .conn
        .call(move |conn| {
          Ok(
            conn
              .query_row(
                "SELECT session_id, provider, device_session_id,
                        request_token, request_secret, access_token, access_secret,
                        created_at
                 FROM auth_sessions WHERE provider = ?1 AND device_session_id = ?2",
                rusqlite::params![provider_str, device],
                RawAuthSession::from_row,
              )
              .optional()?,
          )
        })
        .await?
    };

    if let Some(raw) = existing {
      return raw.into_session();
    }

    let session = AuthSession {
      session_id: Uuid::new_v4(),
      provider,
      device_session_id: device.clone(),
      request_token: None,
      request_secret: None,
      access_token: None,
      access_secret: None,
      created_at: Utc::now(),
    };

    let session_id_str = encode_uuid(session.session_id);
    let created_at_str = encode_dt(session.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO auth_sessions
             (session_id, provider, device_session_id, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![session_id_str, provider_str, device, created_at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(session)
  }

  // ── Organizations ─────────────────────────────────────────────────────────

  async fn create_organization(&self, input: NewOrganization) -> Result<Organization> {
    let organization = Organization {
      organization_id: Uuid::new_v4(),
      created_at:      Utc::now(),
      name:            input.name,
      twitter:         input.twitter,
      facebook:        input.facebook,
      follower_count:  0,
    };
    self.upsert_organization(&organization, true).await?;
    Ok(organization)
  }

  async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawOrganization> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {ORGANIZATION_COLUMNS} FROM organizations
                 WHERE organization_id = ?1"
              ),
              rusqlite::params![id_str],
              RawOrganization::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawOrganization::into_organization).transpose()
  }

  async fn update_organization(&self, organization: Organization) -> Result<()> {
    self.upsert_organization(&organization, false).await
  }

  async fn organizations_with_cached_identity(
    &self,
    provider: Provider,
    external_user_id: i64,
  ) -> Result<Vec<Organization>> {
    let (id_col, _) = Self::cache_columns(provider);

    let raws: Vec<RawOrganization> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE {id_col} = ?1"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![external_user_id], RawOrganization::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawOrganization::into_organization)
      .collect()
  }

  // ── Positions ─────────────────────────────────────────────────────────────

  async fn add_position(&self, position: Position) -> Result<()> {
    let id_str      = encode_uuid(position.position_id);
    let voter_str   = encode_opt_uuid(position.voter_id);
    let org_str     = encode_opt_uuid(position.organization_id);
    let ballot_item = position.ballot_item_id;
    let stance_str  = encode_stance(position.stance).to_owned();
    let statement   = position.statement;
    let at_str      = encode_dt(position.recorded_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO positions
             (position_id, voter_id, organization_id, ballot_item_id, stance, statement, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![id_str, voter_str, org_str, ballot_item, stance_str, statement, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn positions_for_voter(&self, voter_id: Uuid) -> Result<Vec<Position>> {
    let voter_str = encode_uuid(voter_id);

    let raws: Vec<RawPosition> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT position_id, voter_id, organization_id, ballot_item_id,
                  stance, statement, recorded_at
           FROM positions WHERE voter_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![voter_str], RawPosition::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPosition::into_position).collect()
  }

  async fn positions_for_organization(
    &self,
    organization_id: Uuid,
  ) -> Result<Vec<Position>> {
    let org_str = encode_uuid(organization_id);

    let raws: Vec<RawPosition> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT position_id, voter_id, organization_id, ballot_item_id,
                  stance, statement, recorded_at
           FROM positions WHERE organization_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![org_str], RawPosition::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPosition::into_position).collect()
  }

  async fn update_position(&self, position: Position) -> Result<()> {
    let id_str      = encode_uuid(position.position_id);
    let voter_str   = encode_opt_uuid(position.voter_id);
    let org_str     = encode_opt_uuid(position.organization_id);
    let ballot_item = position.ballot_item_id;
    let stance_str  = encode_stance(position.stance).to_owned();
    let statement   = position.statement;
    let at_str      = encode_dt(position.recorded_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE positions SET
             voter_id = ?2, organization_id = ?3, ballot_item_id = ?4,
             stance = ?5, statement = ?6, recorded_at = ?7
           WHERE position_id = ?1",
          rusqlite::params![id_str, voter_str, org_str, ballot_item, stance_str, statement, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_position(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM positions WHERE position_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Follows ───────────────────────────────────────────────────────────────

  async fn add_follow(&self, follow: Follow) -> Result<()> {
    let id_str            = encode_uuid(follow.follow_id);
    let voter_str         = encode_uuid(follow.voter_id);
    let (kind, target_id) = encode_follow_target(follow.target);
    let at_str            = encode_dt(follow.followed_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO follows (follow_id, voter_id, target_kind, target_id, followed_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, voter_str, kind, target_id, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn follows_for_voter(&self, voter_id: Uuid) -> Result<Vec<Follow>> {
    let voter_str = encode_uuid(voter_id);

    let raws: Vec<RawFollow> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT follow_id, voter_id, target_kind, target_id, followed_at
           FROM follows WHERE voter_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![voter_str], RawFollow::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFollow::into_follow).collect()
  }

  async fn update_follow(&self, follow: Follow) -> Result<()> {
    let id_str            = encode_uuid(follow.follow_id);
    let voter_str         = encode_uuid(follow.voter_id);
    let (kind, target_id) = encode_follow_target(follow.target);
    let at_str            = encode_dt(follow.followed_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE follows SET voter_id = ?2, target_kind = ?3, target_id = ?4, followed_at = ?5
           WHERE follow_id = ?1",
          rusqlite::params![id_str, voter_str, kind, target_id, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_follow(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM follows WHERE follow_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Friendships ───────────────────────────────────────────────────────────

  async fn add_friendship(&self, friendship: Friendship) -> Result<()> {
    let id_str     = encode_uuid(friendship.friendship_id);
    let voter_str  = encode_uuid(friendship.voter_id);
    let friend_str = encode_uuid(friendship.friend_voter_id);
    let since_str  = encode_dt(friendship.since);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO friendships (friendship_id, voter_id, friend_voter_id, since)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, voter_str, friend_str, since_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn friendships_for_voter(&self, voter_id: Uuid) -> Result<Vec<Friendship>> {
    let voter_str = encode_uuid(voter_id);

    let raws: Vec<RawFriendship> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT friendship_id, voter_id, friend_voter_id, since
           FROM friendships WHERE voter_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![voter_str], RawFriendship::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFriendship::into_friendship).collect()
  }

  async fn update_friendship(&self, friendship: Friendship) -> Result<()> {
    let id_str     = encode_uuid(friendship.friendship_id);
    let voter_str  = encode_uuid(friendship.voter_id);
    let friend_str = encode_uuid(friendship.friend_voter_id);
    let since_str  = encode_dt(friendship.since);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE friendships SET voter_id = ?2, friend_voter_id = ?3, since = ?4
           WHERE friendship_id = ?1",
          rusqlite::params![id_str, voter_str, friend_str, since_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_friendship(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM friendships WHERE friendship_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Friend invites ────────────────────────────────────────────────────────

  async fn add_friend_invite(&self, invite: FriendInvite) -> Result<()> {
    let id_str        = encode_uuid(invite.invite_id);
    let sender_str    = encode_uuid(invite.sender_voter_id);
    let (kind, value) = encode_invite_recipient(&invite.recipient);
    let message       = invite.message;
    let at_str        = encode_dt(invite.sent_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO friend_invites
             (invite_id, sender_voter_id, recipient_kind, recipient_value, message, sent_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, sender_str, kind, value, message, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn invites_sent_by_voter(&self, voter_id: Uuid) -> Result<Vec<FriendInvite>> {
    let sender_str = encode_uuid(voter_id);

    let raws: Vec<RawFriendInvite> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT invite_id, sender_voter_id, recipient_kind, recipient_value, message, sent_at
           FROM friend_invites WHERE sender_voter_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![sender_str], RawFriendInvite::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFriendInvite::into_invite).collect()
  }

  async fn update_friend_invite(&self, invite: FriendInvite) -> Result<()> {
    let id_str        = encode_uuid(invite.invite_id);
    let sender_str    = encode_uuid(invite.sender_voter_id);
    let (kind, value) = encode_invite_recipient(&invite.recipient);
    let message       = invite.message;
    let at_str        = encode_dt(invite.sent_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE friend_invites SET
             sender_voter_id = ?2, recipient_kind = ?3, recipient_value = ?4,
             message = ?5, sent_at = ?6
           WHERE invite_id = ?1",
          rusqlite::params![id_str, sender_str, kind, value, message, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_friend_invite(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM friend_invites WHERE invite_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Email entries ─────────────────────────────────────────────────────────

  async fn add_email_entry(&self, entry: EmailEntry) -> Result<()> {
    let id_str    = encode_uuid(entry.email_id);
    let voter_str = encode_uuid(entry.voter_id);
    let address   = entry.address;
    let verified  = entry.verified;
    let at_str    = encode_dt(entry.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO email_entries (email_id, voter_id, address, verified, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, voter_str, address, verified, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn email_entries_for_voter(&self, voter_id: Uuid) -> Result<Vec<EmailEntry>> {
    let voter_str = encode_uuid(voter_id);

    let raws: Vec<RawEmailEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT email_id, voter_id, address, verified, created_at
           FROM email_entries WHERE voter_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![voter_str], RawEmailEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEmailEntry::into_entry).collect()
  }

  async fn update_email_entry(&self, entry: EmailEntry) -> Result<()> {
    let id_str    = encode_uuid(entry.email_id);
    let voter_str = encode_uuid(entry.voter_id);
    let address   = entry.address;
    let verified  = entry.verified;
    let at_str    = encode_dt(entry.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE email_entries SET voter_id = ?2, address = ?3, verified = ?4, created_at = ?5
           WHERE email_id = ?1",
          rusqlite::params![id_str, voter_str, address, verified, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_email_entry(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM email_entries WHERE email_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Donations ─────────────────────────────────────────────────────────────

  async fn add_donation(&self, donation: Donation) -> Result<()> {
    let id_str    = encode_uuid(donation.donation_id);
    let voter_str = encode_uuid(donation.voter_id);
    let charge    = donation.charge_id;
    let amount    = donation.amount_cents;
    let at_str    = encode_dt(donation.donated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO donations (donation_id, voter_id, charge_id, amount_cents, donated_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, voter_str, charge, amount, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn donations_for_voter(&self, voter_id: Uuid) -> Result<Vec<Donation>> {
    let voter_str = encode_uuid(voter_id);

    let raws: Vec<RawDonation> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT donation_id, voter_id, charge_id, amount_cents, donated_at
           FROM donations WHERE voter_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![voter_str], RawDonation::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDonation::into_donation).collect()
  }

  async fn update_donation(&self, donation: Donation) -> Result<()> {
    let id_str    = encode_uuid(donation.donation_id);
    let voter_str = encode_uuid(donation.voter_id);
    let charge    = donation.charge_id;
    let amount    = donation.amount_cents;
    let at_str    = encode_dt(donation.donated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE donations SET voter_id = ?2, charge_id = ?3, amount_cents = ?4, donated_at = ?5
           WHERE donation_id = ?1",
          rusqlite::params![id_str, voter_str, charge, amount, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_donation(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM donations WHERE donation_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Voter guides ──────────────────────────────────────────────────────────

  async fn add_voter_guide(&self, guide: VoterGuide) -> Result<()> {
    let id_str    = encode_uuid(guide.guide_id);
    let owner_str = encode_uuid(guide.owner_voter_id);
    let org_str   = encode_opt_uuid(guide.organization_id);
    let election  = guide.election_id;
    let at_str    = encode_dt(guide.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO voter_guides
             (guide_id, owner_voter_id, organization_id, election_id, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, owner_str, org_str, election, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn guides_for_voter(&self, voter_id: Uuid) -> Result<Vec<VoterGuide>> {
    let owner_str = encode_uuid(voter_id);

    let raws: Vec<RawVoterGuide> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT guide_id, owner_voter_id, organization_id, election_id, created_at
           FROM voter_guides WHERE owner_voter_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![owner_str], RawVoterGuide::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawVoterGuide::into_guide).collect()
  }

  async fn update_voter_guide(&self, guide: VoterGuide) -> Result<()> {
    let id_str    = encode_uuid(guide.guide_id);
    let owner_str = encode_uuid(guide.owner_voter_id);
    let org_str   = encode_opt_uuid(guide.organization_id);
    let election  = guide.election_id;
    let at_str    = encode_dt(guide.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE voter_guides SET
             owner_voter_id = ?2, organization_id = ?3, election_id = ?4, created_at = ?5
           WHERE guide_id = ?1",
          rusqlite::params![id_str, owner_str, org_str, election, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_voter_guide(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM voter_guides WHERE guide_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Analytics ─────────────────────────────────────────────────────────────

  async fn add_analytics_event(&self, event: AnalyticsEvent) -> Result<()> {
    let id_str    = encode_uuid(event.event_id);
    let voter_str = encode_uuid(event.voter_id);
    let action    = event.action;
    let at_str    = encode_dt(event.recorded_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO analytics_events (event_id, voter_id, action, recorded_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, voter_str, action, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn analytics_events_for_voter(
    &self,
    voter_id: Uuid,
  ) -> Result<Vec<AnalyticsEvent>> {
    let voter_str = encode_uuid(voter_id);

    let raws: Vec<RawAnalyticsEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT event_id, voter_id, action, recorded_at
           FROM analytics_events WHERE voter_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![voter_str], RawAnalyticsEvent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAnalyticsEvent::into_event).collect()
  }

  async fn reassign_analytics_events(
    &self,
    from_voter_id: Uuid,
    to_voter_id: Uuid,
  ) -> Result<u64> {
    let from_str = encode_uuid(from_voter_id);
    let to_str   = encode_uuid(to_voter_id);

    let moved = self
      .conn
      .call(move |conn| {
        let moved = conn.execute(
          "UPDATE analytics_events SET voter_id = ?2 WHERE voter_id = ?1",
          rusqlite::params![from_str, to_str],
        )?;
        Ok(moved)
      })
      .await?;

    Ok(moved as u64)
  }

  // ── Bookmarks ─────────────────────────────────────────────────────────────

  async fn add_bookmark(&self, bookmark: Bookmark) -> Result<()> {
    let id_str        = encode_uuid(bookmark.bookmark_id);
    let voter_str     = encode_uuid(bookmark.voter_id);
    let (kind, value) = encode_bookmark_item(&bookmark.item);
    let at_str        = encode_dt(bookmark.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO bookmarks (bookmark_id, voter_id, item_kind, item_id, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, voter_str, kind, value, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn count_bookmarks_referencing_organization(
    &self,
    organization_id: Uuid,
  ) -> Result<u64> {
    let org_str = encode_uuid(organization_id);

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM bookmarks WHERE item_kind = 'organization' AND item_id = ?1",
          rusqlite::params![org_str],
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(count as u64)
  }
}
