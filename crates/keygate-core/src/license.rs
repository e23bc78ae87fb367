//! License keys and the expiry/status policy.
//!
//! Everything in this module is pure: given a stored record and the current
//! time it decides whether the key may be used. Stores call into it from
//! inside their transactions.

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Record ──────────────────────────────────────────────────────────────────

/// A license key as persisted by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseKey {
  pub id:         Uuid,
  /// Trimmed and uppercased; unique across the store.
  pub key:        String,
  pub owner:      String,
  /// Hardware fingerprint bound on first successful use. Only an admin reset
  /// clears it again.
  pub hwid:       Option<String>,
  pub active:     bool,
  pub expires_at: DateTime<Utc>,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::LicenseStore::issue_key`].
/// `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewLicenseKey {
  /// Already normalised with [`normalize_key`].
  pub key:        String,
  pub owner:      String,
  pub expires_at: DateTime<Utc>,
}

// ─── Usability ───────────────────────────────────────────────────────────────

/// Result of evaluating a key's stored state against the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usability {
  Usable,
  Inactive,
  Expired,
}

impl LicenseKey {
  /// `Inactive` wins over `Expired`; a key expiring exactly at `now` is
  /// already expired.
  pub fn usability(&self, now: DateTime<Utc>) -> Usability {
    if !self.active {
      Usability::Inactive
    } else if self.expires_at <= now {
      Usability::Expired
    } else {
      Usability::Usable
    }
  }

  pub fn remaining(&self, now: DateTime<Utc>) -> Remaining {
    Remaining::between(now, self.expires_at)
  }
}

// ─── Normalisation ───────────────────────────────────────────────────────────

/// Trim and uppercase a key or promo code. Returns `None` when nothing is left.
pub fn normalize_key(raw: &str) -> Option<String> {
  let trimmed = raw.trim();
  (!trimmed.is_empty()).then(|| trimmed.to_uppercase())
}

/// Trim a hardware fingerprint. Case is preserved: fingerprints are opaque.
pub fn normalize_hwid(raw: &str) -> Option<String> {
  let trimmed = raw.trim();
  (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

// ─── Time arithmetic ─────────────────────────────────────────────────────────

/// Time left until expiry, as whole days plus the hours of the last partial day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remaining {
  pub days:  i64,
  pub hours: i64,
}

impl Remaining {
  pub fn between(now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
    let left = expires_at - now;
    if left <= Duration::zero() {
      return Self { days: 0, hours: 0 };
    }
    let days = left.num_days();
    let hours = (left - Duration::days(days)).num_hours();
    Self { days, hours }
  }
}

// RFC 3339 timestamps carry a four-digit year.
const LATEST_EXPIRY: NaiveDateTime = match (
  NaiveDate::from_ymd_opt(9999, 12, 31),
  NaiveTime::from_hms_opt(23, 59, 59),
) {
  (Some(date), Some(time)) => date.and_time(time),
  _ => NaiveDateTime::MAX,
};

/// The last instant a key may expire at: `9999-12-31T23:59:59Z`.
pub fn latest_expiry() -> DateTime<Utc> { LATEST_EXPIRY.and_utc() }

/// Reject expiries past [`latest_expiry`].
pub fn bounded_expiry(expires_at: DateTime<Utc>) -> Result<DateTime<Utc>> {
  if expires_at > latest_expiry() {
    return Err(Error::ExpiryOverflow);
  }
  Ok(expires_at)
}

/// Push an expiry forward by whole calendar days.
pub fn extend_expiry(
  expires_at: DateTime<Utc>,
  days: u32,
) -> Result<DateTime<Utc>> {
  expires_at
    .checked_add_days(Days::new(u64::from(days)))
    .ok_or(Error::ExpiryOverflow)
    .and_then(bounded_expiry)
}

/// Like [`extend_expiry`], but stops at [`latest_expiry`] instead of failing.
pub fn extend_expiry_saturating(expires_at: DateTime<Utc>, days: u32) -> DateTime<Utc> {
  extend_expiry(expires_at, days).unwrap_or_else(|_| latest_expiry().max(expires_at))
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn key(active: bool, expires_at: DateTime<Utc>) -> LicenseKey {
    LicenseKey {
      id: Uuid::new_v4(),
      key: "ABC123".into(),
      owner: "alice".into(),
      hwid: None,
      active,
      expires_at,
      created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
  }

  #[test]
  fn usable_key_in_future() {
    let now = Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap();
    let k = key(true, now + Duration::days(1));
    assert_eq!(k.usability(now), Usability::Usable);
  }

  #[test]
  fn expiry_boundary_is_expired() {
    let now = Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap();
    assert_eq!(key(true, now).usability(now), Usability::Expired);
    assert_eq!(
      key(true, now - Duration::seconds(1)).usability(now),
      Usability::Expired
    );
  }

  #[test]
  fn inactive_takes_precedence_over_expired() {
    let now = Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap();
    let k = key(false, now - Duration::days(3));
    assert_eq!(k.usability(now), Usability::Inactive);
  }

  #[test]
  fn normalisation() {
    assert_eq!(normalize_key("  abc123 \n").as_deref(), Some("ABC123"));
    assert_eq!(normalize_key("   "), None);
    assert_eq!(normalize_hwid(" Hw-1a ").as_deref(), Some("Hw-1a"));
    assert_eq!(normalize_hwid(""), None);
  }

  #[test]
  fn seven_bonus_days_are_calendar_days() {
    let start = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
    let extended = extend_expiry(start, 7).unwrap();
    assert_eq!(extended, Utc.with_ymd_and_hms(2024, 1, 17, 0, 0, 0).unwrap());
  }

  #[test]
  fn zero_bonus_days_is_identity() {
    let start = Utc.with_ymd_and_hms(2024, 2, 28, 18, 30, 0).unwrap();
    assert_eq!(extend_expiry(start, 0).unwrap(), start);
  }

  #[test]
  fn expiry_stops_at_year_9999() {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    assert!(matches!(extend_expiry(start, 3_000_000), Err(Error::ExpiryOverflow)));
    assert!(matches!(extend_expiry(start, u32::MAX), Err(Error::ExpiryOverflow)));

    let last = latest_expiry();
    assert_eq!(last, Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap());
    assert_eq!(bounded_expiry(last).unwrap(), last);
    assert!(bounded_expiry(last + Duration::seconds(1)).is_err());
    assert!(last.to_rfc3339().starts_with("9999-12-31T23:59:59"));
  }

  #[test]
  fn saturating_extension_caps_at_latest_expiry() {
    let start = Utc.with_ymd_and_hms(9999, 12, 30, 0, 0, 0).unwrap();
    assert_eq!(extend_expiry_saturating(start, 7), latest_expiry());
    let near = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
    assert_eq!(
      extend_expiry_saturating(near, 7),
      Utc.with_ymd_and_hms(2024, 1, 17, 0, 0, 0).unwrap()
    );
  }

  #[test]
  fn remaining_splits_days_and_hours() {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let exp = now + Duration::days(3) + Duration::hours(5) + Duration::minutes(59);
    assert_eq!(Remaining::between(now, exp), Remaining { days: 3, hours: 5 });
  }

  #[test]
  fn remaining_never_negative() {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let exp = now - Duration::hours(30);
    assert_eq!(Remaining::between(now, exp), Remaining { days: 0, hours: 0 });
  }
}
