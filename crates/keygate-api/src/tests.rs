//! Router tests against an in-memory store.

use std::sync::Arc;

use axum::{
  Extension, Router,
  body::Body,
  http::{Request, StatusCode},
};
use chrono::{Duration, Utc};
use keygate_core::{Admin, Engine, engine::IssueKey, promo::NewPromoCode};
use keygate_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{UpdateInfo, admin_router, public_router};

async fn engine() -> Arc<Engine<SqliteStore>> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  Arc::new(Engine::new(store))
}

fn update_info() -> UpdateInfo {
  UpdateInfo {
    version:   "1.4.2".into(),
    url:       "https://example.com/client-1.4.2.zip".into(),
    checksum:  "sha256:abcd".into(),
    changelog: "Bug fixes".into(),
  }
}

fn app(engine: Arc<Engine<SqliteStore>>) -> Router {
  public_router(engine.clone(), update_info())
    .nest("/admin", admin_router(engine).layer(Extension(Admin::verified())))
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
  let builder = Request::builder().method(method).uri(uri);
  let req = match body {
    Some(json) => builder
      .header("content-type", "application/json")
      .body(Body::from(json.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };
  let resp = app.oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let value = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, value)
}

async fn seed_key(engine: &Engine<SqliteStore>, key: &str) {
  engine
    .issue_key(&Admin::verified(), IssueKey {
      key:        Some(key.into()),
      owner:      "alice".into(),
      expires_at: Utc::now() + Duration::days(2),
    })
    .await
    .unwrap();
}

// ─── Public ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn check_key_ok_then_mismatch() {
  let e = engine().await;
  seed_key(&e, "ABC123").await;

  let (status, body) = send(
    app(e.clone()),
    "POST",
    "/check_key",
    Some(json!({ "key": "abc123", "hwid": "H1" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "ok");
  assert_eq!(body["key"], "ABC123");
  assert_eq!(body["hwid"], "H1");
  assert_eq!(body["owner"], "alice");
  assert_eq!(body["days_left"], 1);

  let (status, body) = send(
    app(e),
    "POST",
    "/check_key",
    Some(json!({ "key": "ABC123", "hwid": "H2" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!({ "status": "invalid", "reason": "hwid_mismatch" }));
}

#[tokio::test]
async fn missing_fields_are_bad_request() {
  let e = engine().await;

  let (status, body) =
    send(app(e.clone()), "POST", "/check_key", Some(json!({ "key": "ABC123" }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body, json!({ "status": "invalid", "reason": "missing_data" }));

  let (status, body) = send(
    app(e),
    "POST",
    "/apply_promo",
    Some(json!({ "key": "ABC123", "hwid": "H1", "code": "  " })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["reason"], "missing_data");
}

#[tokio::test]
async fn unparseable_body_is_missing_data() {
  let e = engine().await;
  let req = Request::builder()
    .method("POST")
    .uri("/check_key")
    .header("content-type", "application/json")
    .body(Body::from("{not json"))
    .unwrap();
  let resp = app(e).oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn apply_promo_reports_outcome() {
  let e = engine().await;
  seed_key(&e, "ABC123").await;
  e.add_promo(&Admin::verified(), NewPromoCode { max_uses: 1, ..NewPromoCode::new("WELCOME7", 7) })
    .await
    .unwrap();

  let body = json!({ "key": "ABC123", "hwid": "H1", "code": "welcome7" });
  let (status, first) = send(app(e.clone()), "POST", "/apply_promo", Some(body.clone())).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(first["status"], "ok");
  assert_eq!(first["code"], "WELCOME7");
  assert_eq!(first["bonus_days"], 7);
  assert_eq!(first["creator"], Value::Null);
  assert_eq!(first["days_left"], 8);

  let (status, again) = send(app(e), "POST", "/apply_promo", Some(body)).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(again, json!({ "status": "invalid", "reason": "already_redeemed" }));
}

#[tokio::test]
async fn check_update_serves_configured_release() {
  let (status, body) = send(app(engine().await), "GET", "/check_update", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(serde_json::from_value::<UpdateInfo>(body).unwrap(), update_info());
}

// ─── Admin ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn issue_and_manage_key() {
  let e = engine().await;

  let (status, issued) = send(
    app(e.clone()),
    "POST",
    "/admin/keys",
    Some(json!({ "key": "vip-1", "owner": "bob", "days": 30 })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(issued["key"], "VIP-1");
  assert_eq!(issued["hwid"], Value::Null);

  let (status, _) = send(
    app(e.clone()),
    "POST",
    "/admin/keys",
    Some(json!({ "key": "VIP-1", "owner": "eve", "days": 1 })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);

  let (status, deactivated) =
    send(app(e.clone()), "POST", "/admin/keys/vip-1/deactivate", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(deactivated["active"], false);

  let (status, renamed) = send(
    app(e.clone()),
    "PUT",
    "/admin/keys/VIP-1/owner",
    Some(json!({ "owner": "carol" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(renamed["owner"], "carol");

  let (status, _) = send(app(e.clone()), "DELETE", "/admin/keys/VIP-1", None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let (status, body) = send(app(e), "GET", "/admin/keys/VIP-1", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert!(body["error"].as_str().unwrap().contains("VIP-1"));
}

#[tokio::test]
async fn issue_requires_exactly_one_expiry() {
  let e = engine().await;
  let (status, _) =
    send(app(e.clone()), "POST", "/admin/keys", Some(json!({ "owner": "bob" }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, issued) = send(
    app(e),
    "POST",
    "/admin/keys",
    Some(json!({ "owner": "bob", "expires_at": "2030-01-01T00:00:00Z" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(issued["expires_at"], "2030-01-01T00:00:00Z");
  assert_eq!(issued["key"].as_str().unwrap().split('-').count(), 4);
}

#[tokio::test]
async fn far_future_expiry_is_bad_request() {
  let e = engine().await;
  let (status, body) = send(
    app(e.clone()),
    "POST",
    "/admin/keys",
    Some(json!({ "key": "far", "days": 3_000_000 })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "expiry timestamp out of range");

  seed_key(&e, "FAR").await;
  let (status, _) = send(
    app(e.clone()),
    "POST",
    "/admin/keys/FAR/extend",
    Some(json!({ "days": 3_000_000 })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, keys) = send(app(e), "GET", "/admin/keys", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(keys.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn reset_and_extend_key() {
  let e = engine().await;
  seed_key(&e, "ABC123").await;
  e.check_key("ABC123", "H1", Utc::now()).await.unwrap();

  let (status, reset) = send(app(e.clone()), "POST", "/admin/keys/ABC123/reset_hwid", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(reset["hwid"], Value::Null);

  let (status, extended) = send(
    app(e),
    "POST",
    "/admin/keys/ABC123/extend",
    Some(json!({ "days": 10 })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_ne!(extended["expires_at"], reset["expires_at"]);
}

#[tokio::test]
async fn creators_promos_and_purchases() {
  let e = engine().await;

  let (status, creator) = send(
    app(e.clone()),
    "POST",
    "/admin/creators",
    Some(json!({
      "nickname": "ann",
      "socials": [{ "platform": "YouTube", "url": "https://youtube.com/@ann" }],
      "commission_percent": 20
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  let creator_id = creator["creator_id"].as_str().unwrap().to_owned();

  let (status, _) = send(
    app(e.clone()),
    "POST",
    "/admin/creators",
    Some(json!({ "nickname": "ann" })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);

  let (status, promo) = send(
    app(e.clone()),
    "POST",
    "/admin/promos",
    Some(json!({ "code": "ann20", "creator_id": creator_id, "bonus_days": 20, "max_uses": 5 })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(promo["code"], "ANN20");

  let (status, toggled) = send(app(e.clone()), "POST", "/admin/promos/ann20/toggle", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(toggled["active"], false);

  let (status, purchase) = send(
    app(e.clone()),
    "POST",
    "/admin/purchases",
    Some(json!({ "key": "abc123", "amount": 999, "code": "ANN20" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(purchase["creator_id"], creator_id.as_str());

  let (status, _) = send(
    app(e.clone()),
    "DELETE",
    &format!("/admin/creators/{creator_id}"),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let (_, promo) = send(app(e.clone()), "GET", "/admin/promos/ANN20", None).await;
  assert_eq!(promo["creator_id"], Value::Null);

  let (status, purchases) = send(app(e.clone()), "GET", "/admin/purchases", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(purchases[0]["creator_id"], Value::Null);

  let (status, log) = send(app(e), "GET", "/admin/redemptions?code=ann20", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(log, json!([]));
}

#[tokio::test]
async fn unknown_creator_is_not_found() {
  let e = engine().await;
  let (status, _) = send(
    app(e),
    "POST",
    "/admin/creators/7f1c2a9e-0000-4000-8000-000000000000/toggle",
    None,
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}
