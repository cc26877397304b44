//! SQL schema for the Rollcall SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS voters (
    voter_id               TEXT PRIMARY KEY,
    created_at             TEXT NOT NULL,
    first_name             TEXT,
    last_name              TEXT,
    email                  TEXT,            -- cached projection of email_entries
    primary_email_id       TEXT,
    email_verified         INTEGER NOT NULL DEFAULT 0,
    twitter_user_id        INTEGER,
    twitter_screen_name    TEXT,
    twitter_display_name   TEXT,
    twitter_image_url      TEXT,
    facebook_user_id       INTEGER,
    facebook_screen_name   TEXT,
    facebook_display_name  TEXT,
    facebook_image_url     TEXT,
    linked_organization_id TEXT,
    interface_flags        INTEGER NOT NULL DEFAULT 0,
    notification_flags     INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS device_links (
    device_session_id TEXT PRIMARY KEY,
    voter_id          TEXT NOT NULL REFERENCES voters(voter_id)
);

-- The single source of truth for identity ownership. The UNIQUE constraint
-- is the cross-process backstop against racing link creations.
CREATE TABLE IF NOT EXISTS identity_links (
    provider         TEXT NOT NULL,   -- 'twitter' | 'facebook'
    external_user_id INTEGER NOT NULL,
    voter_id         TEXT NOT NULL REFERENCES voters(voter_id),
    secret_key       TEXT NOT NULL,
    created_at       TEXT NOT NULL,
    UNIQUE (provider, external_user_id)
);

CREATE TABLE IF NOT EXISTS auth_sessions (
    session_id        TEXT PRIMARY KEY,
    provider          TEXT NOT NULL,
    device_session_id TEXT NOT NULL,
    request_token     TEXT,
    request_secret    TEXT,
    access_token      TEXT,
    access_secret     TEXT,
    created_at        TEXT NOT NULL,
    UNIQUE (provider, device_session_id)
);

CREATE TABLE IF NOT EXISTS organizations (
    organization_id       TEXT PRIMARY KEY,
    created_at            TEXT NOT NULL,
    name                  TEXT,
    twitter_user_id       INTEGER,
    twitter_screen_name   TEXT,
    twitter_display_name  TEXT,
    twitter_image_url     TEXT,
    facebook_user_id      INTEGER,
    facebook_screen_name  TEXT,
    facebook_display_name TEXT,
    facebook_image_url    TEXT,
    follower_count        INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS positions (
    position_id     TEXT PRIMARY KEY,
    voter_id        TEXT REFERENCES voters(voter_id),
    organization_id TEXT,            -- denormalised; repaired, not enforced
    ballot_item_id  TEXT NOT NULL,
    stance          TEXT NOT NULL,   -- 'support' | 'oppose' | 'still_deciding'
    statement       TEXT,
    recorded_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS follows (
    follow_id   TEXT PRIMARY KEY,
    voter_id    TEXT NOT NULL REFERENCES voters(voter_id),
    target_kind TEXT NOT NULL,       -- 'organization' | 'issue'
    target_id   TEXT NOT NULL,
    followed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS friendships (
    friendship_id   TEXT PRIMARY KEY,
    voter_id        TEXT NOT NULL REFERENCES voters(voter_id),
    friend_voter_id TEXT NOT NULL,
    since           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS friend_invites (
    invite_id       TEXT PRIMARY KEY,
    sender_voter_id TEXT NOT NULL REFERENCES voters(voter_id),
    recipient_kind  TEXT NOT NULL,   -- 'voter' | 'email'
    recipient_value TEXT NOT NULL,
    message         TEXT,
    sent_at         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS email_entries (
    email_id   TEXT PRIMARY KEY,
    voter_id   TEXT NOT NULL REFERENCES voters(voter_id),
    address    TEXT NOT NULL UNIQUE COLLATE NOCASE,
    verified   INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS donations (
    donation_id  TEXT PRIMARY KEY,
    voter_id     TEXT NOT NULL REFERENCES voters(voter_id),
    charge_id    TEXT NOT NULL,
    amount_cents INTEGER NOT NULL,
    donated_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS voter_guides (
    guide_id        TEXT PRIMARY KEY,
    owner_voter_id  TEXT NOT NULL REFERENCES voters(voter_id),
    organization_id TEXT,            -- denormalised; repaired, not enforced
    election_id     TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS analytics_events (
    event_id    TEXT PRIMARY KEY,
    voter_id    TEXT NOT NULL,
    action      TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS bookmarks (
    bookmark_id TEXT PRIMARY KEY,
    voter_id    TEXT NOT NULL REFERENCES voters(voter_id),
    item_kind   TEXT NOT NULL,       -- 'ballot_item' | 'organization'
    item_id     TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS voters_twitter_idx       ON voters(twitter_user_id);
CREATE INDEX IF NOT EXISTS voters_facebook_idx      ON voters(facebook_user_id);
CREATE INDEX IF NOT EXISTS voters_linked_org_idx    ON voters(linked_organization_id);
CREATE INDEX IF NOT EXISTS positions_voter_idx      ON positions(voter_id);
CREATE INDEX IF NOT EXISTS positions_org_idx        ON positions(organization_id);
CREATE INDEX IF NOT EXISTS follows_voter_idx        ON follows(voter_id);
CREATE INDEX IF NOT EXISTS friendships_voter_idx    ON friendships(voter_id);
CREATE INDEX IF NOT EXISTS invites_sender_idx       ON friend_invites(sender_voter_id);
CREATE INDEX IF NOT EXISTS emails_voter_idx         ON email_entries(voter_id);
CREATE INDEX IF NOT EXISTS donations_voter_idx      ON donations(voter_id);
CREATE INDEX IF NOT EXISTS guides_owner_idx         ON voter_guides(owner_voter_id);
CREATE INDEX IF NOT EXISTS analytics_voter_idx      ON analytics_events(voter_id);
CREATE INDEX IF NOT EXISTS bookmarks_item_idx       ON bookmarks(item_kind, item_id);

PRAGMA user_version = 1;
";
