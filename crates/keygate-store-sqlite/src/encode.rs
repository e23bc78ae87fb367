//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Creator social links are
//! stored as compact JSON. UUIDs are stored as hyphenated lowercase strings.
//! Booleans and integers use SQLite's native integer storage.

use chrono::{DateTime, Utc};
use keygate_core::{
  license::LicenseKey,
  promo::{Creator, PromoCode, Purchase, Redemption, SocialLink},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── Socials ─────────────────────────────────────────────────────────────────

pub fn encode_socials(socials: &[SocialLink]) -> Result<String> {
  Ok(serde_json::to_string(socials)?)
}

pub fn decode_socials(s: &str) -> Result<Vec<SocialLink>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const KEY_COLS: &str =
  "key_id, license_key, owner, hwid, active, expires_at, created_at";

/// Raw values read directly from a `license_keys` row.
pub struct RawLicenseKey {
  pub key_id:      String,
  pub license_key: String,
  pub owner:       String,
  pub hwid:        Option<String>,
  pub active:      bool,
  pub expires_at:  String,
  pub created_at:  String,
}

impl RawLicenseKey {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      key_id:      row.get(0)?,
      license_key: row.get(1)?,
      owner:       row.get(2)?,
      hwid:        row.get(3)?,
      active:      row.get(4)?,
      expires_at:  row.get(5)?,
      created_at:  row.get(6)?,
    })
  }

  pub fn into_key(self) -> Result<LicenseKey> {
    Ok(LicenseKey {
      id:         decode_uuid(&self.key_id)?,
      key:        self.license_key,
      owner:      self.owner,
      // An empty string left by hand-edited rows means "unbound".
      hwid:       self.hwid.filter(|h| !h.is_empty()),
      active:     self.active,
      expires_at: decode_dt(&self.expires_at)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const CREATOR_COLS: &str =
  "creator_id, nickname, socials, commission_percent, active, note, created_at";

/// Raw values read directly from a `creators` row.
pub struct RawCreator {
  pub creator_id:         String,
  pub nickname:           String,
  pub socials:            String,
  pub commission_percent: u8,
  pub active:             bool,
  pub note:               Option<String>,
  pub created_at:         String,
}

impl RawCreator {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      creator_id:         row.get(0)?,
      nickname:           row.get(1)?,
      socials:            row.get(2)?,
      commission_percent: row.get(3)?,
      active:             row.get(4)?,
      note:               row.get(5)?,
      created_at:         row.get(6)?,
    })
  }

  pub fn into_creator(self) -> Result<Creator> {
    Ok(Creator {
      creator_id:         decode_uuid(&self.creator_id)?,
      nickname:           self.nickname,
      socials:            decode_socials(&self.socials)?,
      commission_percent: self.commission_percent,
      active:             self.active,
      note:               self.note,
      created_at:         decode_dt(&self.created_at)?,
    })
  }
}

pub const PROMO_COLS: &str = "code, creator_id, bonus_days, max_uses, active, \
                              start_at, end_at, only_new_users, note, created_at";

/// Raw values read directly from a `promo_codes` row.
pub struct RawPromoCode {
  pub code:           String,
  pub creator_id:     Option<String>,
  pub bonus_days:     u32,
  pub max_uses:       u32,
  pub active:         bool,
  pub start_at:       Option<String>,
  pub end_at:         Option<String>,
  pub only_new_users: bool,
  pub note:           Option<String>,
  pub created_at:     String,
}

impl RawPromoCode {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      code:           row.get(0)?,
      creator_id:     row.get(1)?,
      bonus_days:     row.get(2)?,
      max_uses:       row.get(3)?,
      active:         row.get(4)?,
      start_at:       row.get(5)?,
      end_at:         row.get(6)?,
      only_new_users: row.get(7)?,
      note:           row.get(8)?,
      created_at:     row.get(9)?,
    })
  }

  pub fn into_promo(self) -> Result<PromoCode> {
    Ok(PromoCode {
      code:           self.code,
      creator_id:     self.creator_id.as_deref().map(decode_uuid).transpose()?,
      bonus_days:     self.bonus_days,
      max_uses:       self.max_uses,
      active:         self.active,
      start_at:       decode_opt_dt(self.start_at.as_deref())?,
      end_at:         decode_opt_dt(self.end_at.as_deref())?,
      only_new_users: self.only_new_users,
      note:           self.note,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

pub const REDEMPTION_COLS: &str = "redemption_id, code, license_key, hwid, redeemed_at";

/// Raw values read directly from a `redemptions` row.
pub struct RawRedemption {
  pub redemption_id: String,
  pub code:          String,
  pub license_key:   String,
  pub hwid:          String,
  pub redeemed_at:   String,
}

impl RawRedemption {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      redemption_id: row.get(0)?,
      code:          row.get(1)?,
      license_key:   row.get(2)?,
      hwid:          row.get(3)?,
      redeemed_at:   row.get(4)?,
    })
  }

  pub fn into_redemption(self) -> Result<Redemption> {
    Ok(Redemption {
      redemption_id: decode_uuid(&self.redemption_id)?,
      code:          self.code,
      key:           self.license_key,
      hwid:          self.hwid,
      redeemed_at:   decode_dt(&self.redeemed_at)?,
    })
  }
}

pub const PURCHASE_COLS: &str =
  "purchase_id, license_key, amount, code, creator_id, note, purchased_at";

/// Raw values read directly from a `purchases` row.
pub struct RawPurchase {
  pub purchase_id:  String,
  pub license_key:  String,
  pub amount:       i64,
  pub code:         Option<String>,
  pub creator_id:   Option<String>,
  pub note:         Option<String>,
  pub purchased_at: String,
}

impl RawPurchase {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      purchase_id:  row.get(0)?,
      license_key:  row.get(1)?,
      amount:       row.get(2)?,
      code:         row.get(3)?,
      creator_id:   row.get(4)?,
      note:         row.get(5)?,
      purchased_at: row.get(6)?,
    })
  }

  pub fn into_purchase(self) -> Result<Purchase> {
    Ok(Purchase {
      purchase_id:  decode_uuid(&self.purchase_id)?,
      key:          self.license_key,
      amount:       self.amount,
      code:         self.code,
      creator_id:   self.creator_id.as_deref().map(decode_uuid).transpose()?,
      note:         self.note,
      purchased_at: decode_dt(&self.purchased_at)?,
    })
  }
}
