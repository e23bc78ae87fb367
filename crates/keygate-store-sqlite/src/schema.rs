//! SQL schema for the Keygate SQLite store.
//!
//! Executed on every connection at startup; `foreign_keys` is a
//! per-connection setting. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS license_keys (
    key_id      TEXT PRIMARY KEY,
    license_key TEXT NOT NULL UNIQUE,   -- trimmed, uppercase
    owner       TEXT NOT NULL DEFAULT '',
    hwid        TEXT,                   -- NULL until first successful bind
    active      INTEGER NOT NULL DEFAULT 1,
    expires_at  TEXT NOT NULL,          -- RFC 3339 UTC
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS creators (
    creator_id         TEXT PRIMARY KEY,
    nickname           TEXT NOT NULL UNIQUE,
    socials            TEXT NOT NULL DEFAULT '[]',   -- JSON [{platform, url}]
    commission_percent INTEGER NOT NULL DEFAULT 0,
    active             INTEGER NOT NULL DEFAULT 1,
    note               TEXT,
    created_at         TEXT NOT NULL,
    CHECK (commission_percent BETWEEN 0 AND 100)
);

CREATE TABLE IF NOT EXISTS promo_codes (
    code           TEXT PRIMARY KEY,    -- trimmed, uppercase
    creator_id     TEXT REFERENCES creators(creator_id) ON DELETE SET NULL,
    bonus_days     INTEGER NOT NULL,
    max_uses       INTEGER NOT NULL DEFAULT 0,   -- 0 = unlimited
    active         INTEGER NOT NULL DEFAULT 1,
    start_at       TEXT,
    end_at         TEXT,
    only_new_users INTEGER NOT NULL DEFAULT 0,
    note           TEXT,
    created_at     TEXT NOT NULL,
    CHECK (bonus_days >= 0 AND max_uses >= 0)
);

-- Redemptions are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS redemptions (
    redemption_id TEXT PRIMARY KEY,
    code          TEXT NOT NULL,
    license_key   TEXT NOT NULL,
    hwid          TEXT NOT NULL,
    redeemed_at   TEXT NOT NULL,
    UNIQUE (code, license_key, hwid)
);

CREATE TABLE IF NOT EXISTS purchases (
    purchase_id  TEXT PRIMARY KEY,
    license_key  TEXT NOT NULL,
    amount       INTEGER NOT NULL,      -- minor currency units
    code         TEXT,
    creator_id   TEXT REFERENCES creators(creator_id) ON DELETE SET NULL,
    note         TEXT,
    purchased_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS redemptions_key_idx     ON redemptions(license_key);
CREATE INDEX IF NOT EXISTS promo_codes_creator_idx ON promo_codes(creator_id);
CREATE INDEX IF NOT EXISTS purchases_creator_idx   ON purchases(creator_id);

PRAGMA user_version = 1;
";
