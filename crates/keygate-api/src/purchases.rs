//! Handlers for `/admin/purchases`.

use std::sync::Arc;

use axum::{
  Extension, Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use keygate_core::{
  Admin, Engine,
  promo::{NewPurchase, Purchase},
  store::LicenseStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

/// `GET /purchases`
pub async fn list<S>(
  State(engine): State<Arc<Engine<S>>>,
  Extension(admin): Extension<Admin>,
) -> Result<Json<Vec<Purchase>>, ApiError>
where
  S: LicenseStore + 'static,
{
  Ok(Json(engine.list_purchases(&admin).await?))
}

#[derive(Debug, Deserialize)]
pub struct PurchaseBody {
  pub key:        String,
  /// Minor currency units.
  pub amount:     i64,
  pub code:       Option<String>,
  pub creator_id: Option<Uuid>,
  pub note:       Option<String>,
}

/// `POST /purchases`
pub async fn create<S>(
  State(engine): State<Arc<Engine<S>>>,
  Extension(admin): Extension<Admin>,
  Json(body): Json<PurchaseBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LicenseStore + 'static,
{
  let input = NewPurchase {
    key:        body.key,
    amount:     body.amount,
    code:       body.code,
    creator_id: body.creator_id,
    note:       body.note,
  };
  let purchase = engine.record_purchase(&admin, input).await?;
  Ok((StatusCode::CREATED, Json(purchase)))
}
