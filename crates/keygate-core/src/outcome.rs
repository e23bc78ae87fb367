//! Structured results of the public validation path.
//!
//! Every expected outcome of `check_key` and `apply_promo` is a [`Verdict`]:
//! either `ok` with a payload or `invalid` with a reason code. The serde shape
//! is the wire shape:
//!
//! ```json
//! {"status": "ok", "key": "ABC123", ...}
//! {"status": "invalid", "reason": "hwid_mismatch"}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use crate::{
  license::LicenseKey,
  promo::{PromoCode, Redemption},
};

// ─── Verdict ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verdict<T, R> {
  Ok(T),
  Invalid { reason: R },
}

impl<T, R> Verdict<T, R> {
  pub fn invalid(reason: R) -> Self { Self::Invalid { reason } }

  pub fn is_ok(&self) -> bool { matches!(self, Self::Ok(_)) }

  pub fn reason(&self) -> Option<&R> {
    match self {
      Self::Ok(_) => None,
      Self::Invalid { reason } => Some(reason),
    }
  }
}

// ─── Reason codes ────────────────────────────────────────────────────────────

/// Why a `check_key` request was refused.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckReason {
  MissingData,
  NotFound,
  Inactive,
  Expired,
  HwidMismatch,
}

/// Why an `apply_promo` request was refused. Variants are listed in the order
/// the chain evaluates them.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PromoReason {
  MissingData,
  KeyNotFound,
  KeyInactive,
  KeyExpired,
  HwidMismatch,
  PromoNotFound,
  PromoInactive,
  PromoNotStarted,
  PromoExpired,
  AlreadyRedeemed,
  PromoLimitReached,
  NotNewUser,
}

// ─── Store-level results ─────────────────────────────────────────────────────

/// A key that passed lookup, usability and binding inside the store.
#[derive(Debug, Clone)]
pub struct KeyCheck {
  /// The record as committed, with `hwid` set.
  pub license:       LicenseKey,
  /// `true` when this call performed the first bind.
  pub freshly_bound: bool,
}

/// A committed promo redemption.
#[derive(Debug, Clone)]
pub struct PromoApplication {
  /// The key after its expiry was extended.
  pub license:       LicenseKey,
  pub promo:         PromoCode,
  /// Nickname of the code's creator, for attribution.
  pub creator:       Option<String>,
  pub redemption:    Redemption,
  pub freshly_bound: bool,
}

// ─── Wire payloads ───────────────────────────────────────────────────────────

/// Payload of a successful `check_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOk {
  pub key:        String,
  pub owner:      String,
  pub hwid:       String,
  pub expires_at: DateTime<Utc>,
  pub days_left:  i64,
  pub hours_left: i64,
}

/// Payload of a successful `apply_promo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoOk {
  pub code:           String,
  pub creator:        Option<String>,
  pub bonus_days:     u32,
  pub new_expires_at: DateTime<Utc>,
  pub days_left:      i64,
  pub hours_left:     i64,
}

pub type CheckVerdict = Verdict<CheckOk, CheckReason>;
pub type PromoVerdict = Verdict<PromoOk, PromoReason>;

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use serde_json::json;

  use super::*;

  #[test]
  fn invalid_serialises_as_status_and_reason() {
    let v: CheckVerdict = Verdict::invalid(CheckReason::HwidMismatch);
    assert_eq!(
      serde_json::to_value(&v).unwrap(),
      json!({ "status": "invalid", "reason": "hwid_mismatch" })
    );
  }

  #[test]
  fn ok_flattens_payload_next_to_status() {
    let v: CheckVerdict = Verdict::Ok(CheckOk {
      key:        "ABC123".into(),
      owner:      "alice".into(),
      hwid:       "H1".into(),
      expires_at: Utc.with_ymd_and_hms(2024, 1, 17, 0, 0, 0).unwrap(),
      days_left:  6,
      hours_left: 23,
    });
    let value = serde_json::to_value(&v).unwrap();
    assert_eq!(value["status"], "ok");
    assert_eq!(value["hwid"], "H1");
    assert_eq!(value["days_left"], 6);
  }

  #[test]
  fn reason_display_matches_wire_name() {
    assert_eq!(PromoReason::PromoLimitReached.to_string(), "promo_limit_reached");
    let s: &'static str = PromoReason::NotNewUser.into();
    assert_eq!(s, "not_new_user");
  }
}
