//! Handlers for the public validation endpoints.
//!
//! | Method | Path | Body |
//! |--------|------|------|
//! | `POST` | `/check_key`   | `{"key":"...","hwid":"..."}` |
//! | `POST` | `/apply_promo` | `{"key":"...","hwid":"...","code":"..."}` |
//!
//! Refusals are `200` with `{"status":"invalid","reason":...}`, except
//! `missing_data`, which is `400` with the same shape. An unparseable body is
//! treated as missing data.

use std::sync::Arc;

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use chrono::Utc;
use keygate_core::{
  Engine,
  outcome::{CheckReason, PromoReason, Verdict},
  store::LicenseStore,
};
use serde::{Deserialize, Serialize};

use crate::error::internal_failure;

#[derive(Debug, Default, Deserialize)]
pub struct CheckBody {
  pub key:  Option<String>,
  pub hwid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PromoBody {
  pub key:  Option<String>,
  pub hwid: Option<String>,
  pub code: Option<String>,
}

/// `POST /check_key`
pub async fn check_key<S>(
  State(engine): State<Arc<Engine<S>>>,
  body: Result<Json<CheckBody>, JsonRejection>,
) -> Response
where
  S: LicenseStore + 'static,
{
  let body = body.map(|Json(b)| b).unwrap_or_default();
  let key = body.key.unwrap_or_default();
  let hwid = body.hwid.unwrap_or_default();

  match engine.check_key(&key, &hwid, Utc::now()).await {
    Ok(verdict) => {
      let missing = verdict.reason() == Some(&CheckReason::MissingData);
      respond(verdict, missing)
    }
    Err(e) => internal_failure(e),
  }
}

/// `POST /apply_promo`
pub async fn apply_promo<S>(
  State(engine): State<Arc<Engine<S>>>,
  body: Result<Json<PromoBody>, JsonRejection>,
) -> Response
where
  S: LicenseStore + 'static,
{
  let body = body.map(|Json(b)| b).unwrap_or_default();
  let key = body.key.unwrap_or_default();
  let hwid = body.hwid.unwrap_or_default();
  let code = body.code.unwrap_or_default();

  match engine.apply_promo(&key, &hwid, &code, Utc::now()).await {
    Ok(verdict) => {
      let missing = verdict.reason() == Some(&PromoReason::MissingData);
      respond(verdict, missing)
    }
    Err(e) => internal_failure(e),
  }
}

fn respond<T, R>(verdict: Verdict<T, R>, missing_data: bool) -> Response
where
  T: Serialize,
  R: Serialize,
{
  let status = if missing_data { StatusCode::BAD_REQUEST } else { StatusCode::OK };
  (status, Json(verdict)).into_response()
}
