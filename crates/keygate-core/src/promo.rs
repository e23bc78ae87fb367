//! Promo codes, creators, the redemption log and the purchase ledger.
//!
//! The eligibility chain ([`evaluate`]) is pure. A store gathers a
//! [`RedemptionSnapshot`] inside the same transaction that will append the
//! redemption, so the counts it sees cannot change before commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::outcome::PromoReason;

// ─── Creators ────────────────────────────────────────────────────────────────

/// A link to one of a creator's social profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLink {
  /// Free-text platform name, e.g. "YouTube", "Twitch", "Telegram".
  pub platform: String,
  pub url:      String,
}

/// A content creator that promo codes are attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
  pub creator_id:         Uuid,
  pub nickname:           String,
  pub socials:            Vec<SocialLink>,
  /// 0–100. Recorded for bookkeeping; no payout is computed here.
  pub commission_percent: u8,
  pub active:             bool,
  pub note:               Option<String>,
  pub created_at:         DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCreator {
  pub nickname:           String,
  pub socials:            Vec<SocialLink>,
  pub commission_percent: u8,
  pub note:               Option<String>,
}

// ─── Promo codes ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoCode {
  /// Trimmed and uppercased; unique.
  pub code:           String,
  /// Set to `None` when the creator is deleted.
  pub creator_id:     Option<Uuid>,
  pub bonus_days:     u32,
  /// `0` means unlimited.
  pub max_uses:       u32,
  pub active:         bool,
  pub start_at:       Option<DateTime<Utc>>,
  pub end_at:         Option<DateTime<Utc>>,
  /// Only keys with no prior redemption of any code may redeem.
  pub only_new_users: bool,
  pub note:           Option<String>,
  pub created_at:     DateTime<Utc>,
}

/// Input to [`crate::store::LicenseStore::add_promo`].
#[derive(Debug, Clone)]
pub struct NewPromoCode {
  pub code:           String,
  pub creator_id:     Option<Uuid>,
  pub bonus_days:     u32,
  pub max_uses:       u32,
  pub start_at:       Option<DateTime<Utc>>,
  pub end_at:         Option<DateTime<Utc>>,
  pub only_new_users: bool,
  pub note:           Option<String>,
}

impl NewPromoCode {
  /// An always-valid, unlimited, unattributed code.
  pub fn new(code: impl Into<String>, bonus_days: u32) -> Self {
    Self {
      code: code.into(),
      creator_id: None,
      bonus_days,
      max_uses: 0,
      start_at: None,
      end_at: None,
      only_new_users: false,
      note: None,
    }
  }
}

impl PromoCode {
  /// Check `active` and the `[start_at, end_at]` window (both ends inclusive).
  pub fn availability(&self, now: DateTime<Utc>) -> Result<(), PromoReason> {
    if !self.active {
      return Err(PromoReason::PromoInactive);
    }
    if self.start_at.is_some_and(|start| now < start) {
      return Err(PromoReason::PromoNotStarted);
    }
    if self.end_at.is_some_and(|end| now > end) {
      return Err(PromoReason::PromoExpired);
    }
    Ok(())
  }

  pub fn is_unlimited(&self) -> bool { self.max_uses == 0 }
}

// ─── Redemption log ──────────────────────────────────────────────────────────

/// An immutable record of one successful promo application.
/// `(code, key, hwid)` is unique across the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
  pub redemption_id: Uuid,
  pub code:          String,
  pub key:           String,
  pub hwid:          String,
  pub redeemed_at:   DateTime<Utc>,
}

/// What the store observed, inside the redeeming transaction, about a code
/// and the log.
#[derive(Debug, Clone, Copy)]
pub struct RedemptionSnapshot<'a> {
  pub promo:            Option<&'a PromoCode>,
  /// A row with this exact `(code, key, hwid)` exists.
  pub already_redeemed: bool,
  /// Rows for this code, any key.
  pub code_uses:        u64,
  /// Rows for this key, any code.
  pub key_redemptions:  u64,
}

/// Steps 3–6 of the promo chain: resolution, window, dedup, usage limit and
/// new-user restriction. Key and HWID checks come first and are the caller's.
pub fn evaluate(
  snapshot: &RedemptionSnapshot<'_>,
  now: DateTime<Utc>,
) -> Result<(), PromoReason> {
  let promo = snapshot.promo.ok_or(PromoReason::PromoNotFound)?;
  promo.availability(now)?;

  if snapshot.already_redeemed {
    return Err(PromoReason::AlreadyRedeemed);
  }
  if !promo.is_unlimited() && snapshot.code_uses >= u64::from(promo.max_uses) {
    return Err(PromoReason::PromoLimitReached);
  }
  if promo.only_new_users && snapshot.key_redemptions > 0 {
    return Err(PromoReason::NotNewUser);
  }
  Ok(())
}

// ─── Purchase ledger ─────────────────────────────────────────────────────────

/// A sale recorded for attribution. The engine never reads it back when
/// validating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
  pub purchase_id:  Uuid,
  pub key:          String,
  /// Minor currency units.
  pub amount:       i64,
  pub code:         Option<String>,
  pub creator_id:   Option<Uuid>,
  pub note:         Option<String>,
  pub purchased_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPurchase {
  pub key:        String,
  pub amount:     i64,
  pub code:       Option<String>,
  /// When `None` and `code` names a known promo, the store attributes the
  /// purchase to that promo's creator.
  pub creator_id: Option<Uuid>,
  pub note:       Option<String>,
}
