//! Handlers for `/admin/keys` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/keys` | All keys, oldest first |
//! | `POST`   | `/keys` | Body: [`IssueBody`]; returns 201 |
//! | `GET`    | `/keys/{key}` | 404 if not found |
//! | `DELETE` | `/keys/{key}` | 204 |
//! | `POST`   | `/keys/{key}/activate` | |
//! | `POST`   | `/keys/{key}/deactivate` | |
//! | `POST`   | `/keys/{key}/reset_hwid` | Clears the bound HWID |
//! | `POST`   | `/keys/{key}/extend` | Body: `{"days":30}` |
//! | `PUT`    | `/keys/{key}/owner` | Body: `{"owner":"..."}` |

use std::sync::Arc;

use axum::{
  Extension, Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use keygate_core::{
  Admin, Engine,
  engine::IssueKey,
  license::{LicenseKey, extend_expiry},
  store::LicenseStore,
};
use serde::Deserialize;

use crate::error::ApiError;

// ─── List / get ───────────────────────────────────────────────────────────────

/// `GET /keys`
pub async fn list<S>(
  State(engine): State<Arc<Engine<S>>>,
  Extension(admin): Extension<Admin>,
) -> Result<Json<Vec<LicenseKey>>, ApiError>
where
  S: LicenseStore + 'static,
{
  Ok(Json(engine.list_keys(&admin).await?))
}

/// `GET /keys/{key}`
pub async fn get_one<S>(
  State(engine): State<Arc<Engine<S>>>,
  Extension(admin): Extension<Admin>,
  Path(key): Path<String>,
) -> Result<Json<LicenseKey>, ApiError>
where
  S: LicenseStore + 'static,
{
  Ok(Json(engine.get_key(&admin, &key).await?))
}

// ─── Issue ────────────────────────────────────────────────────────────────────

/// Body of `POST /keys`. Exactly one of `days` and `expires_at` is required.
#[derive(Debug, Deserialize)]
pub struct IssueBody {
  /// Explicit key string; a random one is generated when absent.
  pub key:        Option<String>,
  #[serde(default)]
  pub owner:      String,
  /// Lifetime in days from now.
  pub days:       Option<u32>,
  pub expires_at: Option<DateTime<Utc>>,
}

/// `POST /keys`
pub async fn issue<S>(
  State(engine): State<Arc<Engine<S>>>,
  Extension(admin): Extension<Admin>,
  Json(body): Json<IssueBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LicenseStore + 'static,
{
  let expires_at = match (body.days, body.expires_at) {
    (Some(days), None) => extend_expiry(Utc::now(), days)?,
    (None, Some(at)) => at,
    _ => {
      return Err(ApiError::BadRequest(
        "exactly one of `days` or `expires_at` is required".into(),
      ));
    }
  };
  let input = IssueKey { key: body.key, owner: body.owner, expires_at };
  let issued = engine.issue_key(&admin, input).await?;
  Ok((StatusCode::CREATED, Json(issued)))
}

// ─── State changes ────────────────────────────────────────────────────────────

/// `POST /keys/{key}/activate`
pub async fn activate<S>(
  State(engine): State<Arc<Engine<S>>>,
  Extension(admin): Extension<Admin>,
  Path(key): Path<String>,
) -> Result<Json<LicenseKey>, ApiError>
where
  S: LicenseStore + 'static,
{
  Ok(Json(engine.set_key_active(&admin, &key, true).await?))
}

/// `POST /keys/{key}/deactivate`
pub async fn deactivate<S>(
  State(engine): State<Arc<Engine<S>>>,
  Extension(admin): Extension<Admin>,
  Path(key): Path<String>,
) -> Result<Json<LicenseKey>, ApiError>
where
  S: LicenseStore + 'static,
{
  Ok(Json(engine.set_key_active(&admin, &key, false).await?))
}

/// `POST /keys/{key}/reset_hwid`
pub async fn reset_hwid<S>(
  State(engine): State<Arc<Engine<S>>>,
  Extension(admin): Extension<Admin>,
  Path(key): Path<String>,
) -> Result<Json<LicenseKey>, ApiError>
where
  S: LicenseStore + 'static,
{
  Ok(Json(engine.reset_hwid(&admin, &key).await?))
}

#[derive(Debug, Deserialize)]
pub struct ExtendBody {
  pub days: u32,
}

/// `POST /keys/{key}/extend`
pub async fn extend<S>(
  State(engine): State<Arc<Engine<S>>>,
  Extension(admin): Extension<Admin>,
  Path(key): Path<String>,
  Json(body): Json<ExtendBody>,
) -> Result<Json<LicenseKey>, ApiError>
where
  S: LicenseStore + 'static,
{
  Ok(Json(engine.extend_key(&admin, &key, body.days).await?))
}

#[derive(Debug, Deserialize)]
pub struct OwnerBody {
  pub owner: String,
}

/// `PUT /keys/{key}/owner`
pub async fn set_owner<S>(
  State(engine): State<Arc<Engine<S>>>,
  Extension(admin): Extension<Admin>,
  Path(key): Path<String>,
  Json(body): Json<OwnerBody>,
) -> Result<Json<LicenseKey>, ApiError>
where
  S: LicenseStore + 'static,
{
  Ok(Json(engine.set_key_owner(&admin, &key, &body.owner).await?))
}

/// `DELETE /keys/{key}`
pub async fn delete_one<S>(
  State(engine): State<Arc<Engine<S>>>,
  Extension(admin): Extension<Admin>,
  Path(key): Path<String>,
) -> Result<StatusCode, ApiError>
where
  S: LicenseStore + 'static,
{
  engine.delete_key(&admin, &key).await?;
  Ok(StatusCode::NO_CONTENT)
}
