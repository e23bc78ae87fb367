//! The `LicenseStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `keygate-store-sqlite`).
//! Higher layers (`keygate-api`, `keygate-server`) reach it through
//! [`crate::Engine`], never through a concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  license::{LicenseKey, NewLicenseKey},
  outcome::{CheckReason, KeyCheck, PromoApplication, PromoReason, Verdict},
  promo::{Creator, NewCreator, NewPromoCode, NewPurchase, PromoCode, Purchase, Redemption},
};

/// Normalised input to [`LicenseStore::redeem`].
#[derive(Debug, Clone)]
pub struct RedeemRequest {
  pub key:  String,
  pub hwid: String,
  pub code: String,
}

/// Abstraction over a Keygate store backend.
///
/// Every method is atomic on its own. [`check_and_bind`](Self::check_and_bind)
/// and [`redeem`](Self::redeem) run the whole check-and-act sequence inside
/// one transaction, so no concurrent call can observe or act on a state the
/// other is about to change.
///
/// Domain failures (missing rows, uniqueness conflicts) convert into the
/// matching [`crate::Error`] variant; anything else becomes
/// [`crate::Error::Store`].
pub trait LicenseStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + Into<crate::Error> + 'static;

  // ── Validation path ───────────────────────────────────────────────────

  /// Look up `key`, evaluate usability at `now`, and bind `hwid` if the key
  /// is unbound. Nothing is written unless every check passes.
  fn check_and_bind(
    &self,
    key: String,
    hwid: String,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Verdict<KeyCheck, CheckReason>, Self::Error>> + Send + '_;

  /// Run the full promo chain and, if it passes, bind, extend and append
  /// one redemption row. All-or-nothing.
  fn redeem(
    &self,
    request: RedeemRequest,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Verdict<PromoApplication, PromoReason>, Self::Error>>
  + Send
  + '_;

  // ── Keys ──────────────────────────────────────────────────────────────

  /// Returns `None` if no such key exists. `key` must already be normalised.
  fn get_key(
    &self,
    key: String,
  ) -> impl Future<Output = Result<Option<LicenseKey>, Self::Error>> + Send + '_;

  fn list_keys(
    &self,
  ) -> impl Future<Output = Result<Vec<LicenseKey>, Self::Error>> + Send + '_;

  /// Fails with a duplicate-key conflict if the key string is taken.
  fn issue_key(
    &self,
    input: NewLicenseKey,
  ) -> impl Future<Output = Result<LicenseKey, Self::Error>> + Send + '_;

  fn set_key_active(
    &self,
    key: String,
    active: bool,
  ) -> impl Future<Output = Result<LicenseKey, Self::Error>> + Send + '_;

  fn set_key_owner(
    &self,
    key: String,
    owner: String,
  ) -> impl Future<Output = Result<LicenseKey, Self::Error>> + Send + '_;

  /// Clear the bound HWID. The only way to un-bind a key.
  fn reset_hwid(
    &self,
    key: String,
  ) -> impl Future<Output = Result<LicenseKey, Self::Error>> + Send + '_;

  /// Push the expiry forward by `days` calendar days.
  fn extend_key(
    &self,
    key: String,
    days: u32,
  ) -> impl Future<Output = Result<LicenseKey, Self::Error>> + Send + '_;

  fn delete_key(
    &self,
    key: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Creators ──────────────────────────────────────────────────────────

  fn add_creator(
    &self,
    input: NewCreator,
  ) -> impl Future<Output = Result<Creator, Self::Error>> + Send + '_;

  fn list_creators(
    &self,
  ) -> impl Future<Output = Result<Vec<Creator>, Self::Error>> + Send + '_;

  /// Flip `active` and return the updated creator.
  fn toggle_creator(
    &self,
    creator_id: Uuid,
  ) -> impl Future<Output = Result<Creator, Self::Error>> + Send + '_;

  /// Promo codes and purchases referencing the creator keep their rows with
  /// `creator_id` cleared.
  fn delete_creator(
    &self,
    creator_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Promo codes ───────────────────────────────────────────────────────

  fn add_promo(
    &self,
    input: NewPromoCode,
  ) -> impl Future<Output = Result<PromoCode, Self::Error>> + Send + '_;

  fn get_promo(
    &self,
    code: String,
  ) -> impl Future<Output = Result<Option<PromoCode>, Self::Error>> + Send + '_;

  fn list_promos(
    &self,
  ) -> impl Future<Output = Result<Vec<PromoCode>, Self::Error>> + Send + '_;

  fn toggle_promo(
    &self,
    code: String,
  ) -> impl Future<Output = Result<PromoCode, Self::Error>> + Send + '_;

  fn delete_promo(
    &self,
    code: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Redemptions, oldest first, optionally restricted to one code.
  fn list_redemptions(
    &self,
    code: Option<String>,
  ) -> impl Future<Output = Result<Vec<Redemption>, Self::Error>> + Send + '_;

  // ── Purchases ─────────────────────────────────────────────────────────

  fn record_purchase(
    &self,
    input: NewPurchase,
  ) -> impl Future<Output = Result<Purchase, Self::Error>> + Send + '_;

  fn list_purchases(
    &self,
  ) -> impl Future<Output = Result<Vec<Purchase>, Self::Error>> + Send + '_;
}
