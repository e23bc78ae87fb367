//! [`Engine`] — the validator façade over a [`LicenseStore`].
//!
//! The public operations (`check_key`, `apply_promo`) normalise their inputs,
//! hand the atomic part to the store and turn the result into a wire-ready
//! [`Verdict`]. Admin operations additionally demand an [`Admin`] token.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Error, Result,
  keygen::{KeyGenerator, RandomKeyGenerator},
  license::{LicenseKey, NewLicenseKey, bounded_expiry, normalize_hwid, normalize_key},
  outcome::{
    CheckOk, CheckReason, CheckVerdict, PromoOk, PromoReason, PromoVerdict, Verdict,
  },
  promo::{Creator, NewCreator, NewPromoCode, NewPurchase, PromoCode, Purchase, Redemption},
  store::{LicenseStore, RedeemRequest},
};

/// How many generated keys to try before giving up on issuance.
const KEYGEN_ATTEMPTS: usize = 8;

// ─── Capability ──────────────────────────────────────────────────────────────

/// Proof that the caller has been verified as an administrator.
///
/// The engine does not verify credentials; the transport layer mints this
/// token after its own check and passes it to every admin call.
#[derive(Debug, Clone, Copy)]
pub struct Admin {
  _verified: (),
}

impl Admin {
  pub fn verified() -> Self { Self { _verified: () } }
}

// ─── Admin inputs ────────────────────────────────────────────────────────────

/// Input to [`Engine::issue_key`].
#[derive(Debug, Clone)]
pub struct IssueKey {
  /// Explicit key string; generated when `None`.
  pub key:        Option<String>,
  pub owner:      String,
  pub expires_at: DateTime<Utc>,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct Engine<S, G = RandomKeyGenerator> {
  store:  S,
  keygen: G,
}

impl<S: LicenseStore> Engine<S> {
  pub fn new(store: S) -> Self {
    Self { store, keygen: RandomKeyGenerator::default() }
  }
}

impl<S, G> Engine<S, G>
where
  S: LicenseStore,
  G: KeyGenerator,
{
  pub fn with_generator(store: S, keygen: G) -> Self { Self { store, keygen } }

  // ── Validation path ───────────────────────────────────────────────────

  /// Validate `key` for the machine `hwid`, binding it on first use.
  pub async fn check_key(
    &self,
    key: &str,
    hwid: &str,
    now: DateTime<Utc>,
  ) -> Result<CheckVerdict> {
    let (Some(key), Some(hwid)) = (normalize_key(key), normalize_hwid(hwid)) else {
      return Ok(Verdict::invalid(CheckReason::MissingData));
    };

    let verdict = self
      .store
      .check_and_bind(key.clone(), hwid, now)
      .await
      .map_err(store_err)?;

    Ok(match verdict {
      Verdict::Ok(check) => {
        let license = check.license;
        if check.freshly_bound {
          tracing::info!(key = %license.key, hwid = ?license.hwid, "bound hwid to key");
        }
        let remaining = license.remaining(now);
        Verdict::Ok(CheckOk {
          hwid:       license.hwid.unwrap_or_default(),
          key:        license.key,
          owner:      license.owner,
          expires_at: license.expires_at,
          days_left:  remaining.days,
          hours_left: remaining.hours,
        })
      }
      Verdict::Invalid { reason } => {
        tracing::debug!(%key, %reason, "key check refused");
        Verdict::invalid(reason)
      }
    })
  }

  /// Redeem `code` against `key` on the machine `hwid`.
  pub async fn apply_promo(
    &self,
    key: &str,
    hwid: &str,
    code: &str,
    now: DateTime<Utc>,
  ) -> Result<PromoVerdict> {
    let (Some(key), Some(hwid), Some(code)) =
      (normalize_key(key), normalize_hwid(hwid), normalize_key(code))
    else {
      return Ok(Verdict::invalid(PromoReason::MissingData));
    };

    let verdict = self
      .store
      .redeem(RedeemRequest { key: key.clone(), hwid, code: code.clone() }, now)
      .await
      .map_err(store_err)?;

    Ok(match verdict {
      Verdict::Ok(applied) => {
        tracing::info!(
          key = %applied.license.key,
          code = %applied.promo.code,
          bonus_days = applied.promo.bonus_days,
          new_expires_at = %applied.license.expires_at,
          redemption_id = %applied.redemption.redemption_id,
          freshly_bound = applied.freshly_bound,
          "promo redeemed"
        );
        let remaining = applied.license.remaining(now);
        Verdict::Ok(PromoOk {
          code:           applied.promo.code,
          creator:        applied.creator,
          bonus_days:     applied.promo.bonus_days,
          new_expires_at: applied.license.expires_at,
          days_left:      remaining.days,
          hours_left:     remaining.hours,
        })
      }
      Verdict::Invalid { reason } => {
        tracing::debug!(%key, %code, %reason, "promo refused");
        Verdict::invalid(reason)
      }
    })
  }

  // ── Keys ──────────────────────────────────────────────────────────────

  pub async fn list_keys(&self, _admin: &Admin) -> Result<Vec<LicenseKey>> {
    self.store.list_keys().await.map_err(store_err)
  }

  pub async fn get_key(&self, _admin: &Admin, key: &str) -> Result<LicenseKey> {
    let key = required_key(key)?;
    self
      .store
      .get_key(key.clone())
      .await
      .map_err(store_err)?
      .ok_or(Error::KeyNotFound(key))
  }

  /// Issue a new key. An explicit key string that is already taken is a
  /// conflict; a generated one is retried.
  pub async fn issue_key(&self, _admin: &Admin, input: IssueKey) -> Result<LicenseKey> {
    let owner = input.owner.trim().to_owned();
    let expires_at = bounded_expiry(input.expires_at)?;

    if let Some(raw) = input.key {
      let key = required_key(&raw)?;
      let issued = self
        .store
        .issue_key(NewLicenseKey { key, owner, expires_at })
        .await
        .map_err(store_err)?;
      tracing::info!(key = %issued.key, owner = %issued.owner, "issued key");
      return Ok(issued);
    }

    for _ in 0..KEYGEN_ATTEMPTS {
      let Some(key) = normalize_key(&self.keygen.generate()) else {
        continue;
      };
      let candidate = NewLicenseKey {
        key,
        owner: owner.clone(),
        expires_at,
      };
      match self.store.issue_key(candidate).await.map_err(store_err) {
        Ok(issued) => {
          tracing::info!(key = %issued.key, owner = %issued.owner, "issued generated key");
          return Ok(issued);
        }
        Err(Error::DuplicateKey(key)) => {
          tracing::warn!(%key, "generated key collided, retrying");
        }
        Err(e) => return Err(e),
      }
    }
    Err(Error::KeyGenerationExhausted(KEYGEN_ATTEMPTS))
  }

  pub async fn set_key_active(
    &self,
    _admin: &Admin,
    key: &str,
    active: bool,
  ) -> Result<LicenseKey> {
    let key = required_key(key)?;
    let updated = self.store.set_key_active(key, active).await.map_err(store_err)?;
    tracing::info!(key = %updated.key, active, "set key active flag");
    Ok(updated)
  }

  pub async fn set_key_owner(
    &self,
    _admin: &Admin,
    key: &str,
    owner: &str,
  ) -> Result<LicenseKey> {
    let key = required_key(key)?;
    self
      .store
      .set_key_owner(key, owner.trim().to_owned())
      .await
      .map_err(store_err)
  }

  pub async fn reset_hwid(&self, _admin: &Admin, key: &str) -> Result<LicenseKey> {
    let key = required_key(key)?;
    let updated = self.store.reset_hwid(key).await.map_err(store_err)?;
    tracing::info!(key = %updated.key, "reset hwid");
    Ok(updated)
  }

  pub async fn extend_key(
    &self,
    _admin: &Admin,
    key: &str,
    days: u32,
  ) -> Result<LicenseKey> {
    let key = required_key(key)?;
    self.store.extend_key(key, days).await.map_err(store_err)
  }

  pub async fn delete_key(&self, _admin: &Admin, key: &str) -> Result<()> {
    let key = required_key(key)?;
    self.store.delete_key(key.clone()).await.map_err(store_err)?;
    tracing::info!(%key, "deleted key");
    Ok(())
  }

  // ── Creators ──────────────────────────────────────────────────────────

  pub async fn add_creator(&self, _admin: &Admin, input: NewCreator) -> Result<Creator> {
    let nickname = input.nickname.trim();
    if nickname.is_empty() {
      return Err(Error::Validation("nickname".into()));
    }
    if input.commission_percent > 100 {
      return Err(Error::Validation("commission_percent must be 0-100".into()));
    }
    let input = NewCreator { nickname: nickname.to_owned(), ..input };
    self.store.add_creator(input).await.map_err(store_err)
  }

  pub async fn list_creators(&self, _admin: &Admin) -> Result<Vec<Creator>> {
    self.store.list_creators().await.map_err(store_err)
  }

  pub async fn toggle_creator(&self, _admin: &Admin, creator_id: Uuid) -> Result<Creator> {
    self.store.toggle_creator(creator_id).await.map_err(store_err)
  }

  pub async fn delete_creator(&self, _admin: &Admin, creator_id: Uuid) -> Result<()> {
    self.store.delete_creator(creator_id).await.map_err(store_err)
  }

  // ── Promo codes ───────────────────────────────────────────────────────

  pub async fn add_promo(&self, _admin: &Admin, input: NewPromoCode) -> Result<PromoCode> {
    let code = normalize_key(&input.code).ok_or_else(|| Error::Validation("code".into()))?;
    if let (Some(start), Some(end)) = (input.start_at, input.end_at)
      && end < start
    {
      return Err(Error::Validation("end_at precedes start_at".into()));
    }
    input.start_at.map(bounded_expiry).transpose()?;
    input.end_at.map(bounded_expiry).transpose()?;
    let promo = self
      .store
      .add_promo(NewPromoCode { code, ..input })
      .await
      .map_err(store_err)?;
    tracing::info!(code = %promo.code, bonus_days = promo.bonus_days, max_uses = promo.max_uses, "created promo code");
    Ok(promo)
  }

  pub async fn get_promo(&self, _admin: &Admin, code: &str) -> Result<PromoCode> {
    let code = normalize_key(code).ok_or_else(|| Error::Validation("code".into()))?;
    self
      .store
      .get_promo(code.clone())
      .await
      .map_err(store_err)?
      .ok_or(Error::PromoNotFound(code))
  }

  pub async fn list_promos(&self, _admin: &Admin) -> Result<Vec<PromoCode>> {
    self.store.list_promos().await.map_err(store_err)
  }

  pub async fn toggle_promo(&self, _admin: &Admin, code: &str) -> Result<PromoCode> {
    let code = normalize_key(code).ok_or_else(|| Error::Validation("code".into()))?;
    self.store.toggle_promo(code).await.map_err(store_err)
  }

  pub async fn delete_promo(&self, _admin: &Admin, code: &str) -> Result<()> {
    let code = normalize_key(code).ok_or_else(|| Error::Validation("code".into()))?;
    self.store.delete_promo(code).await.map_err(store_err)
  }

  pub async fn list_redemptions(
    &self,
    _admin: &Admin,
    code: Option<&str>,
  ) -> Result<Vec<Redemption>> {
    let code = code.and_then(normalize_key);
    self.store.list_redemptions(code).await.map_err(store_err)
  }

  // ── Purchases ─────────────────────────────────────────────────────────

  pub async fn record_purchase(&self, _admin: &Admin, input: NewPurchase) -> Result<Purchase> {
    let key = required_key(&input.key)?;
    let code = input.code.as_deref().and_then(normalize_key);
    self
      .store
      .record_purchase(NewPurchase { key, code, ..input })
      .await
      .map_err(store_err)
  }

  pub async fn list_purchases(&self, _admin: &Admin) -> Result<Vec<Purchase>> {
    self.store.list_purchases().await.map_err(store_err)
  }
}

fn store_err<E: Into<Error>>(e: E) -> Error { e.into() }

fn required_key(raw: &str) -> Result<String> {
  normalize_key(raw).ok_or_else(|| Error::Validation("key".into()))
}
