//! Handlers for `/admin/promos` and `/admin/redemptions`.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/promos` | |
//! | `POST`   | `/promos` | Body: [`PromoBody`]; 409 on a taken code |
//! | `GET`    | `/promos/{code}` | |
//! | `DELETE` | `/promos/{code}` | The redemption log is kept |
//! | `POST`   | `/promos/{code}/toggle` | Flips `active` |
//! | `GET`    | `/redemptions` | Optional `?code=...` |

use std::sync::Arc;

use axum::{
  Extension, Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use keygate_core::{
  Admin, Engine,
  promo::{NewPromoCode, PromoCode, Redemption},
  store::LicenseStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

/// `GET /promos`
pub async fn list<S>(
  State(engine): State<Arc<Engine<S>>>,
  Extension(admin): Extension<Admin>,
) -> Result<Json<Vec<PromoCode>>, ApiError>
where
  S: LicenseStore + 'static,
{
  Ok(Json(engine.list_promos(&admin).await?))
}

#[derive(Debug, Deserialize)]
pub struct PromoBody {
  pub code:           String,
  pub creator_id:     Option<Uuid>,
  pub bonus_days:     u32,
  /// `0` (the default) means unlimited.
  #[serde(default)]
  pub max_uses:       u32,
  pub start_at:       Option<DateTime<Utc>>,
  pub end_at:         Option<DateTime<Utc>>,
  #[serde(default)]
  pub only_new_users: bool,
  pub note:           Option<String>,
}

/// `POST /promos`
pub async fn create<S>(
  State(engine): State<Arc<Engine<S>>>,
  Extension(admin): Extension<Admin>,
  Json(body): Json<PromoBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LicenseStore + 'static,
{
  let input = NewPromoCode {
    code:           body.code,
    creator_id:     body.creator_id,
    bonus_days:     body.bonus_days,
    max_uses:       body.max_uses,
    start_at:       body.start_at,
    end_at:         body.end_at,
    only_new_users: body.only_new_users,
    note:           body.note,
  };
  let promo = engine.add_promo(&admin, input).await?;
  Ok((StatusCode::CREATED, Json(promo)))
}

/// `GET /promos/{code}`
pub async fn get_one<S>(
  State(engine): State<Arc<Engine<S>>>,
  Extension(admin): Extension<Admin>,
  Path(code): Path<String>,
) -> Result<Json<PromoCode>, ApiError>
where
  S: LicenseStore + 'static,
{
  Ok(Json(engine.get_promo(&admin, &code).await?))
}

/// `POST /promos/{code}/toggle`
pub async fn toggle<S>(
  State(engine): State<Arc<Engine<S>>>,
  Extension(admin): Extension<Admin>,
  Path(code): Path<String>,
) -> Result<Json<PromoCode>, ApiError>
where
  S: LicenseStore + 'static,
{
  Ok(Json(engine.toggle_promo(&admin, &code).await?))
}

/// `DELETE /promos/{code}`
pub async fn delete_one<S>(
  State(engine): State<Arc<Engine<S>>>,
  Extension(admin): Extension<Admin>,
  Path(code): Path<String>,
) -> Result<StatusCode, ApiError>
where
  S: LicenseStore + 'static,
{
  engine.delete_promo(&admin, &code).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct RedemptionParams {
  pub code: Option<String>,
}

/// `GET /redemptions[?code=<code>]`
pub async fn redemptions<S>(
  State(engine): State<Arc<Engine<S>>>,
  Extension(admin): Extension<Admin>,
  Query(params): Query<RedemptionParams>,
) -> Result<Json<Vec<Redemption>>, ApiError>
where
  S: LicenseStore + 'static,
{
  Ok(Json(engine.list_redemptions(&admin, params.code.as_deref()).await?))
}
