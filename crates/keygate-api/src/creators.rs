//! Handlers for `/admin/creators` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/creators` | |
//! | `POST`   | `/creators` | Body: [`CreatorBody`]; 409 on a taken nickname |
//! | `DELETE` | `/creators/{id}` | Codes and purchases keep their rows, unattributed |
//! | `POST`   | `/creators/{id}/toggle` | Flips `active` |

use std::sync::Arc;

use axum::{
  Extension, Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use keygate_core::{
  Admin, Engine,
  promo::{Creator, NewCreator, SocialLink},
  store::LicenseStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

/// `GET /creators`
pub async fn list<S>(
  State(engine): State<Arc<Engine<S>>>,
  Extension(admin): Extension<Admin>,
) -> Result<Json<Vec<Creator>>, ApiError>
where
  S: LicenseStore + 'static,
{
  Ok(Json(engine.list_creators(&admin).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreatorBody {
  pub nickname:           String,
  #[serde(default)]
  pub socials:            Vec<SocialLink>,
  #[serde(default)]
  pub commission_percent: u8,
  pub note:               Option<String>,
}

/// `POST /creators`
pub async fn create<S>(
  State(engine): State<Arc<Engine<S>>>,
  Extension(admin): Extension<Admin>,
  Json(body): Json<CreatorBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LicenseStore + 'static,
{
  let input = NewCreator {
    nickname:           body.nickname,
    socials:            body.socials,
    commission_percent: body.commission_percent,
    note:               body.note,
  };
  let creator = engine.add_creator(&admin, input).await?;
  Ok((StatusCode::CREATED, Json(creator)))
}

/// `POST /creators/{id}/toggle`
pub async fn toggle<S>(
  State(engine): State<Arc<Engine<S>>>,
  Extension(admin): Extension<Admin>,
  Path(id): Path<Uuid>,
) -> Result<Json<Creator>, ApiError>
where
  S: LicenseStore + 'static,
{
  Ok(Json(engine.toggle_creator(&admin, id).await?))
}

/// `DELETE /creators/{id}`
pub async fn delete_one<S>(
  State(engine): State<Arc<Engine<S>>>,
  Extension(admin): Extension<Admin>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: LicenseStore + 'static,
{
  engine.delete_creator(&admin, id).await?;
  Ok(StatusCode::NO_CONTENT)
}
