//! HTTP server assembly for Keygate.
//!
//! Mounts the public validation endpoints at the root and the admin API under
//! `/admin` behind argon2-verified HTTP Basic auth.

pub mod auth;
pub mod error;

pub use error::Error;

use std::{path::{Path, PathBuf}, sync::Arc};

use axum::{Router, middleware};
use keygate_api::UpdateInfo;
use keygate_core::{Engine, keygen::RandomKeyGenerator, store::LicenseStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, require_admin};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `KEYGATE_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  pub store_path:          PathBuf,
  pub admin_username:      String,
  pub admin_password_hash: String,
  /// Shape of generated keys: `key_groups` dash-separated groups of
  /// `key_group_len` hex digits.
  #[serde(default = "default_key_groups")]
  pub key_groups:          usize,
  #[serde(default = "default_key_group_len")]
  pub key_group_len:       usize,
  /// Served verbatim by `GET /check_update`.
  #[serde(default)]
  pub update:              UpdateInfo,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

fn default_key_groups() -> usize { 4 }

fn default_key_group_len() -> usize { 4 }

/// Layer an optional TOML file under `KEYGATE_*` environment variables.
/// Nested keys use a double underscore, e.g. `KEYGATE_UPDATE__VERSION`.
pub fn load_config(path: &Path) -> Result<ServerConfig, config::ConfigError> {
  config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(
      config::Environment::with_prefix("KEYGATE")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()?
    .try_deserialize()
}

// ─── Application state ────────────────────────────────────────────────────────

/// Everything the router needs.
#[derive(Clone)]
pub struct AppState<S: LicenseStore> {
  pub engine: Arc<Engine<S>>,
  pub config: Arc<ServerConfig>,
  pub auth:   Arc<AuthConfig>,
}

impl<S: LicenseStore> AppState<S> {
  pub fn new(store: S, config: ServerConfig) -> Self {
    let keygen = RandomKeyGenerator::new(config.key_groups, config.key_group_len);
    let auth = AuthConfig {
      username:      config.admin_username.clone(),
      password_hash: config.admin_password_hash.clone(),
    };
    Self {
      engine: Arc::new(Engine::with_generator(store, keygen)),
      config: Arc::new(config),
      auth:   Arc::new(auth),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: LicenseStore + 'static,
{
  let admin = keygate_api::admin_router(state.engine.clone())
    .layer(middleware::from_fn_with_state(state.auth.clone(), require_admin));

  keygate_api::public_router(state.engine, state.config.update.clone())
    .nest("/admin", admin)
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
  use keygate_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  fn server_config(password: &str) -> ServerConfig {
    ServerConfig {
      host:                default_host(),
      port:                default_port(),
      store_path:          PathBuf::from(":memory:"),
      admin_username:      "admin".to_string(),
      admin_password_hash: auth::hash_password(password).unwrap(),
      key_groups:          3,
      key_group_len:       5,
      update:              UpdateInfo {
        version:   "2.0.0".into(),
        url:       "https://example.com/2.0.0".into(),
        checksum:  "deadbeef".into(),
        changelog: String::new(),
      },
    }
  }

  async fn make_state(password: &str) -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    AppState::new(store, server_config(password))
  }

  fn auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn oneshot_raw(
    state:   AppState<SqliteStore>,
    method:  &str,
    uri:     &str,
    auth:    Option<String>,
    body:    Option<Value>,
  ) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(value) = auth {
      builder = builder.header(header::AUTHORIZATION, value);
    }
    let req = match body {
      Some(json) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    router(state).oneshot(req).await.unwrap()
  }

  async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  #[tokio::test]
  async fn admin_without_credentials_is_challenged() {
    let state = make_state("secret").await;
    let resp = oneshot_raw(state, "GET", "/admin/keys", None, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
    assert_eq!(json_body(resp).await, json!({ "error": "unauthorized" }));
  }

  #[tokio::test]
  async fn admin_with_wrong_password_is_refused() {
    let state = make_state("secret").await;
    let resp = oneshot_raw(
      state,
      "GET",
      "/admin/keys",
      Some(auth_header("admin", "guess")),
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn admin_issue_then_public_check() {
    let state = make_state("secret").await;

    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/admin/keys",
      Some(auth_header("admin", "secret")),
      Some(json!({ "owner": "alice", "days": 30 })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let issued = json_body(resp).await;
    let key = issued["key"].as_str().unwrap().to_owned();
    // Key shape follows the configured generator.
    assert_eq!(key.split('-').map(str::len).collect::<Vec<_>>(), vec![5, 5, 5]);

    // Public endpoints need no credentials.
    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/check_key",
      None,
      Some(json!({ "key": key.to_lowercase(), "hwid": "H1" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["days_left"], 29);

    let resp = oneshot_raw(
      state,
      "GET",
      &format!("/admin/keys/{key}"),
      Some(auth_header("admin", "secret")),
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["hwid"], "H1");
  }

  #[tokio::test]
  async fn check_update_reads_configuration() {
    let state = make_state("secret").await;
    let resp = oneshot_raw(state, "GET", "/check_update", None, None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["version"], "2.0.0");
    assert_eq!(body["checksum"], "deadbeef");
  }

  #[tokio::test]
  async fn unknown_route_is_404() {
    let state = make_state("secret").await;
    let resp = oneshot_raw(state, "GET", "/nope", None, None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[test]
  fn config_file_with_defaults() {
    let path = std::env::temp_dir().join(format!("keygate-{}.toml", uuid::Uuid::new_v4()));
    std::fs::write(
      &path,
      r#"
store_path          = "keygate.db"
admin_username      = "admin"
admin_password_hash = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaA"

[update]
version  = "1.0.0"
url      = "https://example.com/1.0.0"
checksum = "abc"
"#,
    )
    .unwrap();

    let cfg = load_config(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.store_path, PathBuf::from("keygate.db"));
    assert_eq!((cfg.key_groups, cfg.key_group_len), (4, 4));
    assert_eq!(cfg.update.version, "1.0.0");
    assert_eq!(cfg.update.changelog, "");
  }
}
