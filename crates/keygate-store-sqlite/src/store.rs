//! [`SqliteStore`] — the SQLite implementation of [`LicenseStore`].

use std::{path::Path, time::Duration};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use keygate_core::{
  binding::{self, HwidCheck},
  license::{LicenseKey, NewLicenseKey, Usability, extend_expiry, extend_expiry_saturating},
  outcome::{CheckReason, KeyCheck, PromoApplication, PromoReason, Verdict},
  promo::{
    Creator, NewCreator, NewPromoCode, NewPurchase, PromoCode, Purchase, Redemption,
    RedemptionSnapshot, evaluate,
  },
  store::{LicenseStore, RedeemRequest},
};

use crate::{
  Error, Result,
  encode::{
    CREATOR_COLS, KEY_COLS, PROMO_COLS, PURCHASE_COLS, REDEMPTION_COLS, RawCreator,
    RawLicenseKey, RawPromoCode, RawPurchase, RawRedemption, encode_dt, encode_socials,
    encode_uuid,
  },
  error::raise,
  schema::SCHEMA,
};

/// How long a connection waits on another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Keygate store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    tracing::debug!(path = %path.display(), "opened sqlite store");
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
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
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `edit` against an existing key inside a write transaction and
  /// return the key as `edit` left it.
  async fn modify_key<F>(&self, key: String, edit: F) -> Result<LicenseKey>
  where
    F: FnOnce(&rusqlite::Connection, LicenseKey) -> tokio_rusqlite::Result<LicenseKey>
      + Send
      + 'static,
  {
    let updated = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some(license) = select_key(&tx, &key)? else {
          return Err(raise(keygate_core::Error::KeyNotFound(key)));
        };
        let updated = edit(&tx, license)?;
        tx.commit()?;
        Ok(updated)
      })
      .await?;
    Ok(updated)
  }
}

// ─── Row helpers ─────────────────────────────────────────────────────────────
//
// These take a plain connection so they work both on a bare connection and
// on a `Transaction` (which derefs to one).

fn select_key(
  conn: &rusqlite::Connection,
  key: &str,
) -> tokio_rusqlite::Result<Option<LicenseKey>> {
  let raw = conn
    .query_row(
      &format!("SELECT {KEY_COLS} FROM license_keys WHERE license_key = ?1"),
      rusqlite::params![key],
      RawLicenseKey::from_row,
    )
    .optional()?;
  raw.map(RawLicenseKey::into_key).transpose().map_err(raise)
}

fn select_promo(
  conn: &rusqlite::Connection,
  code: &str,
) -> tokio_rusqlite::Result<Option<PromoCode>> {
  let raw = conn
    .query_row(
      &format!("SELECT {PROMO_COLS} FROM promo_codes WHERE code = ?1"),
      rusqlite::params![code],
      RawPromoCode::from_row,
    )
    .optional()?;
  raw.map(RawPromoCode::into_promo).transpose().map_err(raise)
}

fn select_creator(
  conn: &rusqlite::Connection,
  creator_id: Uuid,
) -> tokio_rusqlite::Result<Option<Creator>> {
  let raw = conn
    .query_row(
      &format!("SELECT {CREATOR_COLS} FROM creators WHERE creator_id = ?1"),
      rusqlite::params![encode_uuid(creator_id)],
      RawCreator::from_row,
    )
    .optional()?;
  raw.map(RawCreator::into_creator).transpose().map_err(raise)
}

fn creator_exists(conn: &rusqlite::Connection, creator_id: Uuid) -> rusqlite::Result<bool> {
  conn.query_row(
    "SELECT EXISTS (SELECT 1 FROM creators WHERE creator_id = ?1)",
    rusqlite::params![encode_uuid(creator_id)],
    |r| r.get(0),
  )
}

fn count(conn: &rusqlite::Connection, sql: &str, arg: &str) -> rusqlite::Result<u64> {
  let n: i64 = conn.query_row(sql, rusqlite::params![arg], |r| r.get(0))?;
  Ok(n.unsigned_abs())
}

/// Ensure `license` is bound to `hwid`, claiming it if unbound.
///
/// Returns `None` on mismatch, otherwise the (possibly newly bound) key and
/// whether this call did the binding. The claim is a compare-and-set: it
/// only succeeds while the stored HWID is still empty.
fn bind_hwid(
  conn: &rusqlite::Connection,
  mut license: LicenseKey,
  hwid: &str,
) -> tokio_rusqlite::Result<Option<(LicenseKey, bool)>> {
  match binding::check(license.hwid.as_deref(), hwid) {
    HwidCheck::Bound => return Ok(Some((license, false))),
    HwidCheck::Mismatch => return Ok(None),
    HwidCheck::NeedsBind => {}
  }

  let claimed = conn.execute(
    "UPDATE license_keys SET hwid = ?1
     WHERE key_id = ?2 AND (hwid IS NULL OR hwid = '')",
    rusqlite::params![hwid, encode_uuid(license.id)],
  )?;
  if claimed == 1 {
    license.hwid = Some(hwid.to_owned());
    return Ok(Some((license, true)));
  }

  // Lost the race: judge against whatever won.
  let Some(current) = select_key(conn, &license.key)? else {
    return Err(raise(keygate_core::Error::KeyNotFound(license.key)));
  };
  Ok(match binding::check(current.hwid.as_deref(), hwid) {
    HwidCheck::Bound => Some((current, false)),
    HwidCheck::Mismatch | HwidCheck::NeedsBind => None,
  })
}

fn query_all<R, T>(
  conn: &rusqlite::Connection,
  sql: &str,
  params: impl rusqlite::Params,
  from_row: fn(&rusqlite::Row<'_>) -> rusqlite::Result<R>,
  convert: fn(R) -> Result<T>,
) -> tokio_rusqlite::Result<Vec<T>> {
  let mut stmt = conn.prepare(sql)?;
  let raws = stmt
    .query_map(params, from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(convert).collect::<Result<_>>().map_err(raise)
}

// ─── LicenseStore impl ───────────────────────────────────────────────────────

impl LicenseStore for SqliteStore {
  type Error = Error;

  // ── Validation path ───────────────────────────────────────────────────────

  async fn check_and_bind(
    &self,
    key: String,
    hwid: String,
    now: DateTime<Utc>,
  ) -> Result<Verdict<KeyCheck, CheckReason>> {
    let verdict = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(license) = select_key(&tx, &key)? else {
          return Ok(Verdict::invalid(CheckReason::NotFound));
        };
        match license.usability(now) {
          Usability::Usable => {}
          Usability::Inactive => return Ok(Verdict::invalid(CheckReason::Inactive)),
          Usability::Expired => return Ok(Verdict::invalid(CheckReason::Expired)),
        }
        let Some((license, freshly_bound)) = bind_hwid(&tx, license, &hwid)? else {
          return Ok(Verdict::invalid(CheckReason::HwidMismatch));
        };

        tx.commit()?;
        Ok(Verdict::Ok(KeyCheck { license, freshly_bound }))
      })
      .await?;
    Ok(verdict)
  }

  async fn redeem(
    &self,
    request: RedeemRequest,
    now: DateTime<Utc>,
  ) -> Result<Verdict<PromoApplication, PromoReason>> {
    let RedeemRequest { key, hwid, code } = request;

    let verdict = self
      .conn
      .call(move |conn| {
        // Every early return below drops `tx`, rolling back a tentative bind.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(license) = select_key(&tx, &key)? else {
          return Ok(Verdict::invalid(PromoReason::KeyNotFound));
        };
        match license.usability(now) {
          Usability::Usable => {}
          Usability::Inactive => return Ok(Verdict::invalid(PromoReason::KeyInactive)),
          Usability::Expired => return Ok(Verdict::invalid(PromoReason::KeyExpired)),
        }
        let Some((license, freshly_bound)) = bind_hwid(&tx, license, &hwid)? else {
          return Ok(Verdict::invalid(PromoReason::HwidMismatch));
        };

        let Some(promo) = select_promo(&tx, &code)? else {
          return Ok(Verdict::invalid(PromoReason::PromoNotFound));
        };
        let already_redeemed: bool = tx.query_row(
          "SELECT EXISTS (
             SELECT 1 FROM redemptions
             WHERE code = ?1 AND license_key = ?2 AND hwid = ?3
           )",
          rusqlite::params![code, key, hwid],
          |r| r.get(0),
        )?;
        let snapshot = RedemptionSnapshot {
          promo: Some(&promo),
          already_redeemed,
          code_uses: count(&tx, "SELECT COUNT(*) FROM redemptions WHERE code = ?1", &code)?,
          key_redemptions: count(
            &tx,
            "SELECT COUNT(*) FROM redemptions WHERE license_key = ?1",
            &key,
          )?,
        };
        if let Err(reason) = evaluate(&snapshot, now) {
          return Ok(Verdict::invalid(reason));
        }

        let new_expiry = extend_expiry_saturating(license.expires_at, promo.bonus_days);
        tx.execute(
          "UPDATE license_keys SET expires_at = ?1 WHERE key_id = ?2",
          rusqlite::params![encode_dt(new_expiry), encode_uuid(license.id)],
        )?;

        let redemption = Redemption {
          redemption_id: Uuid::new_v4(),
          code:          promo.code.clone(),
          key:           license.key.clone(),
          hwid:          hwid.clone(),
          redeemed_at:   now,
        };
        tx.execute(
          "INSERT INTO redemptions (redemption_id, code, license_key, hwid, redeemed_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            encode_uuid(redemption.redemption_id),
            redemption.code,
            redemption.key,
            redemption.hwid,
            encode_dt(redemption.redeemed_at),
          ],
        )?;

        let creator: Option<String> = match promo.creator_id {
          Some(id) => tx
            .query_row(
              "SELECT nickname FROM creators WHERE creator_id = ?1",
              rusqlite::params![encode_uuid(id)],
              |r| r.get(0),
            )
            .optional()?,
          None => None,
        };

        tx.commit()?;
        Ok(Verdict::Ok(PromoApplication {
          license: LicenseKey { expires_at: new_expiry, ..license },
          promo,
          creator,
          redemption,
          freshly_bound,
        }))
      })
      .await?;
    Ok(verdict)
  }

  // ── Keys ──────────────────────────────────────────────────────────────────

  async fn get_key(&self, key: String) -> Result<Option<LicenseKey>> {
    let license = self.conn.call(move |conn| select_key(conn, &key)).await?;
    Ok(license)
  }

  async fn list_keys(&self) -> Result<Vec<LicenseKey>> {
    let keys = self
      .conn
      .call(|conn| {
        query_all(
          conn,
          &format!("SELECT {KEY_COLS} FROM license_keys ORDER BY rowid"),
          [],
          RawLicenseKey::from_row,
          RawLicenseKey::into_key,
        )
      })
      .await?;
    Ok(keys)
  }

  async fn issue_key(&self, input: NewLicenseKey) -> Result<LicenseKey> {
    let license = LicenseKey {
      id:         Uuid::new_v4(),
      key:        input.key,
      owner:      input.owner,
      hwid:       None,
      active:     true,
      expires_at: input.expires_at,
      created_at: Utc::now(),
    };

    let id_str      = encode_uuid(license.id);
    let key_str     = license.key.clone();
    let owner       = license.owner.clone();
    let expires_str = encode_dt(license.expires_at);
    let created_str = encode_dt(license.created_at);

    self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT INTO license_keys (key_id, license_key, owner, hwid, active, expires_at, created_at)
           VALUES (?1, ?2, ?3, NULL, 1, ?4, ?5)
           ON CONFLICT (license_key) DO NOTHING",
          rusqlite::params![id_str, key_str, owner, expires_str, created_str],
        )?;
        if inserted == 0 {
          return Err(raise(keygate_core::Error::DuplicateKey(key_str)));
        }
        Ok(())
      })
      .await?;

    Ok(license)
  }

  async fn set_key_active(&self, key: String, active: bool) -> Result<LicenseKey> {
    self
      .modify_key(key, move |conn, license| {
        conn.execute(
          "UPDATE license_keys SET active = ?1 WHERE key_id = ?2",
          rusqlite::params![active, encode_uuid(license.id)],
        )?;
        Ok(LicenseKey { active, ..license })
      })
      .await
  }

  async fn set_key_owner(&self, key: String, owner: String) -> Result<LicenseKey> {
    self
      .modify_key(key, move |conn, license| {
        conn.execute(
          "UPDATE license_keys SET owner = ?1 WHERE key_id = ?2",
          rusqlite::params![owner, encode_uuid(license.id)],
        )?;
        Ok(LicenseKey { owner, ..license })
      })
      .await
  }

  async fn reset_hwid(&self, key: String) -> Result<LicenseKey> {
    self
      .modify_key(key, |conn, license| {
        conn.execute(
          "UPDATE license_keys SET hwid = NULL WHERE key_id = ?1",
          rusqlite::params![encode_uuid(license.id)],
        )?;
        Ok(LicenseKey { hwid: None, ..license })
      })
      .await
  }

  async fn extend_key(&self, key: String, days: u32) -> Result<LicenseKey> {
    self
      .modify_key(key, move |conn, license| {
        let expires_at = extend_expiry(license.expires_at, days).map_err(raise)?;
        conn.execute(
          "UPDATE license_keys SET expires_at = ?1 WHERE key_id = ?2",
          rusqlite::params![encode_dt(expires_at), encode_uuid(license.id)],
        )?;
        Ok(LicenseKey { expires_at, ..license })
      })
      .await
  }

  async fn delete_key(&self, key: String) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let deleted = conn.execute(
          "DELETE FROM license_keys WHERE license_key = ?1",
          rusqlite::params![key],
        )?;
        if deleted == 0 {
          return Err(raise(keygate_core::Error::KeyNotFound(key)));
        }
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Creators ──────────────────────────────────────────────────────────────

  async fn add_creator(&self, input: NewCreator) -> Result<Creator> {
    let creator = Creator {
      creator_id:         Uuid::new_v4(),
      nickname:           input.nickname,
      socials:            input.socials,
      commission_percent: input.commission_percent,
      active:             true,
      note:               input.note,
      created_at:         Utc::now(),
    };

    let id_str      = encode_uuid(creator.creator_id);
    let nickname    = creator.nickname.clone();
    let socials_str = encode_socials(&creator.socials)?;
    let commission  = creator.commission_percent;
    let note        = creator.note.clone();
    let created_str = encode_dt(creator.created_at);

    self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT INTO creators (creator_id, nickname, socials, commission_percent, active, note, created_at)
           VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)
           ON CONFLICT (nickname) DO NOTHING",
          rusqlite::params![id_str, nickname, socials_str, commission, note, created_str],
        )?;
        if inserted == 0 {
          return Err(raise(keygate_core::Error::DuplicateCreator(nickname)));
        }
        Ok(())
      })
      .await?;

    Ok(creator)
  }

  async fn list_creators(&self) -> Result<Vec<Creator>> {
    let creators = self
      .conn
      .call(|conn| {
        query_all(
          conn,
          &format!("SELECT {CREATOR_COLS} FROM creators ORDER BY rowid"),
          [],
          RawCreator::from_row,
          RawCreator::into_creator,
        )
      })
      .await?;
    Ok(creators)
  }

  async fn toggle_creator(&self, creator_id: Uuid) -> Result<Creator> {
    let creator = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
          "UPDATE creators SET active = NOT active WHERE creator_id = ?1",
          rusqlite::params![encode_uuid(creator_id)],
        )?;
        let Some(creator) = select_creator(&tx, creator_id)? else {
          return Err(raise(keygate_core::Error::CreatorNotFound(creator_id)));
        };
        tx.commit()?;
        Ok(creator)
      })
      .await?;
    Ok(creator)
  }

  async fn delete_creator(&self, creator_id: Uuid) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        // `ON DELETE SET NULL` detaches promo codes and purchases.
        let deleted = conn.execute(
          "DELETE FROM creators WHERE creator_id = ?1",
          rusqlite::params![encode_uuid(creator_id)],
        )?;
        if deleted == 0 {
          return Err(raise(keygate_core::Error::CreatorNotFound(creator_id)));
        }
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Promo codes ───────────────────────────────────────────────────────────

  async fn add_promo(&self, input: NewPromoCode) -> Result<PromoCode> {
    let promo = PromoCode {
      code:           input.code,
      creator_id:     input.creator_id,
      bonus_days:     input.bonus_days,
      max_uses:       input.max_uses,
      active:         true,
      start_at:       input.start_at,
      end_at:         input.end_at,
      only_new_users: input.only_new_users,
      note:           input.note,
      created_at:     Utc::now(),
    };

    let code        = promo.code.clone();
    let creator_id  = promo.creator_id;
    let bonus_days  = promo.bonus_days;
    let max_uses    = promo.max_uses;
    let start_str   = promo.start_at.map(encode_dt);
    let end_str     = promo.end_at.map(encode_dt);
    let new_only    = promo.only_new_users;
    let note        = promo.note.clone();
    let created_str = encode_dt(promo.created_at);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if let Some(id) = creator_id
          && !creator_exists(&tx, id)?
        {
          return Err(raise(keygate_core::Error::CreatorNotFound(id)));
        }
        let inserted = tx.execute(
          "INSERT INTO promo_codes (
             code, creator_id, bonus_days, max_uses, active,
             start_at, end_at, only_new_users, note, created_at
           ) VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7, ?8, ?9)
           ON CONFLICT (code) DO NOTHING",
          rusqlite::params![
            code,
            creator_id.map(encode_uuid),
            bonus_days,
            max_uses,
            start_str,
            end_str,
            new_only,
            note,
            created_str,
          ],
        )?;
        if inserted == 0 {
          return Err(raise(keygate_core::Error::DuplicatePromo(code)));
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(promo)
  }

  async fn get_promo(&self, code: String) -> Result<Option<PromoCode>> {
    let promo = self.conn.call(move |conn| select_promo(conn, &code)).await?;
    Ok(promo)
  }

  async fn list_promos(&self) -> Result<Vec<PromoCode>> {
    let promos = self
      .conn
      .call(|conn| {
        query_all(
          conn,
          &format!("SELECT {PROMO_COLS} FROM promo_codes ORDER BY rowid"),
          [],
          RawPromoCode::from_row,
          RawPromoCode::into_promo,
        )
      })
      .await?;
    Ok(promos)
  }

  async fn toggle_promo(&self, code: String) -> Result<PromoCode> {
    let promo = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
          "UPDATE promo_codes SET active = NOT active WHERE code = ?1",
          rusqlite::params![code],
        )?;
        let Some(promo) = select_promo(&tx, &code)? else {
          return Err(raise(keygate_core::Error::PromoNotFound(code)));
        };
        tx.commit()?;
        Ok(promo)
      })
      .await?;
    Ok(promo)
  }

  async fn delete_promo(&self, code: String) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let deleted = conn.execute(
          "DELETE FROM promo_codes WHERE code = ?1",
          rusqlite::params![code],
        )?;
        if deleted == 0 {
          return Err(raise(keygate_core::Error::PromoNotFound(code)));
        }
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn list_redemptions(&self, code: Option<String>) -> Result<Vec<Redemption>> {
    let redemptions = self
      .conn
      .call(move |conn| match code {
        Some(code) => query_all(
          conn,
          &format!(
            "SELECT {REDEMPTION_COLS} FROM redemptions WHERE code = ?1 ORDER BY rowid"
          ),
          rusqlite::params![code],
          RawRedemption::from_row,
          RawRedemption::into_redemption,
        ),
        None => query_all(
          conn,
          &format!("SELECT {REDEMPTION_COLS} FROM redemptions ORDER BY rowid"),
          [],
          RawRedemption::from_row,
          RawRedemption::into_redemption,
        ),
      })
      .await?;
    Ok(redemptions)
  }

  // ── Purchases ─────────────────────────────────────────────────────────────

  async fn record_purchase(&self, input: NewPurchase) -> Result<Purchase> {
    let purchased_at = Utc::now();
    let purchase_id  = Uuid::new_v4();

    let purchase = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let creator_id = match (input.creator_id, input.code.as_deref()) {
          (Some(id), _) => {
            if !creator_exists(&tx, id)? {
              return Err(raise(keygate_core::Error::CreatorNotFound(id)));
            }
            Some(id)
          }
          (None, Some(code)) => select_promo(&tx, code)?.and_then(|p| p.creator_id),
          (None, None) => None,
        };

        let purchase = Purchase {
          purchase_id,
          key: input.key,
          amount: input.amount,
          code: input.code,
          creator_id,
          note: input.note,
          purchased_at,
        };
        tx.execute(
          "INSERT INTO purchases (purchase_id, license_key, amount, code, creator_id, note, purchased_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            encode_uuid(purchase.purchase_id),
            purchase.key,
            purchase.amount,
            purchase.code,
            purchase.creator_id.map(encode_uuid),
            purchase.note,
            encode_dt(purchase.purchased_at),
          ],
        )?;
        tx.commit()?;
        Ok(purchase)
      })
      .await?;

    tracing::debug!(key = %purchase.key, amount = purchase.amount, "recorded purchase");
    Ok(purchase)
  }

  async fn list_purchases(&self) -> Result<Vec<Purchase>> {
    let purchases = self
      .conn
      .call(|conn| {
        query_all(
          conn,
          &format!("SELECT {PURCHASE_COLS} FROM purchases ORDER BY rowid"),
          [],
          RawPurchase::from_row,
          RawPurchase::into_purchase,
        )
      })
      .await?;
    Ok(purchases)
  }
}
