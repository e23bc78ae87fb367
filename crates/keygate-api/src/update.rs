//! Handler for `GET /check_update`: the latest client release, served
//! verbatim from configuration.

use std::sync::Arc;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

/// Latest client release metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInfo {
  pub version:   String,
  pub url:       String,
  pub checksum:  String,
  #[serde(default)]
  pub changelog: String,
}

/// `GET /check_update`
pub async fn handler(State(info): State<Arc<UpdateInfo>>) -> Json<UpdateInfo> {
  Json(info.as_ref().clone())
}
