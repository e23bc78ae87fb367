//! Async HTTP client wrapping the Keygate JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use keygate_core::{
  license::LicenseKey,
  outcome::{CheckOk, CheckReason, PromoOk, PromoReason, Verdict},
  promo::{Creator, PromoCode, Purchase, Redemption},
};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

/// Connection settings for the Keygate API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
}

/// Async HTTP client for the Keygate API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn admin(&self, req: RequestBuilder) -> RequestBuilder {
    req.basic_auth(&self.config.username, Some(&self.config.password))
  }

  /// Send `req` and decode a JSON body, turning non-2xx statuses into errors
  /// that carry the server's `error` message.
  async fn fetch<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> Result<T> {
    let resp = req.send().await.with_context(|| format!("{what} failed"))?;
    let status = resp.status();
    if !status.is_success() {
      return Err(error_from(resp, what).await);
    }
    resp.json().await.with_context(|| format!("deserialising {what} response"))
  }

  async fn fetch_empty(&self, req: RequestBuilder, what: &str) -> Result<()> {
    let resp = req.send().await.with_context(|| format!("{what} failed"))?;
    if !resp.status().is_success() {
      return Err(error_from(resp, what).await);
    }
    Ok(())
  }

  /// Public endpoints answer refusals with a verdict body, including the
  /// `400` used for missing data.
  async fn fetch_verdict<T: DeserializeOwned>(
    &self,
    req: RequestBuilder,
    what: &str,
  ) -> Result<T> {
    let resp = req.send().await.with_context(|| format!("{what} failed"))?;
    match resp.status() {
      StatusCode::OK | StatusCode::BAD_REQUEST => {
        resp.json().await.with_context(|| format!("deserialising {what} response"))
      }
      _ => Err(error_from(resp, what).await),
    }
  }

  // ── Public ────────────────────────────────────────────────────────────────

  /// `POST /check_key`
  pub async fn check_key(&self, key: &str, hwid: &str) -> Result<Verdict<CheckOk, CheckReason>> {
    let req = self
      .client
      .post(self.url("/check_key"))
      .json(&serde_json::json!({ "key": key, "hwid": hwid }));
    self.fetch_verdict(req, "POST /check_key").await
  }

  /// `POST /apply_promo`
  pub async fn apply_promo(
    &self,
    key: &str,
    hwid: &str,
    code: &str,
  ) -> Result<Verdict<PromoOk, PromoReason>> {
    let req = self
      .client
      .post(self.url("/apply_promo"))
      .json(&serde_json::json!({ "key": key, "hwid": hwid, "code": code }));
    self.fetch_verdict(req, "POST /apply_promo").await
  }

  /// `GET /check_update`
  pub async fn check_update(&self) -> Result<Value> {
    let req = self.client.get(self.url("/check_update"));
    self.fetch(req, "GET /check_update").await
  }

  // ── Keys ──────────────────────────────────────────────────────────────────

  /// `GET /admin/keys`
  pub async fn list_keys(&self) -> Result<Vec<LicenseKey>> {
    let req = self.admin(self.client.get(self.url("/admin/keys")));
    self.fetch(req, "GET /admin/keys").await
  }

  /// `GET /admin/keys/{key}`
  pub async fn get_key(&self, key: &str) -> Result<LicenseKey> {
    let req = self.admin(self.client.get(self.url(&format!("/admin/keys/{key}"))));
    self.fetch(req, "GET /admin/keys/{key}").await
  }

  /// `POST /admin/keys`
  pub async fn issue_key(&self, body: &Value) -> Result<LicenseKey> {
    let req = self.admin(self.client.post(self.url("/admin/keys"))).json(body);
    self.fetch(req, "POST /admin/keys").await
  }

  /// `POST /admin/keys/{key}/{action}` for `activate`, `deactivate` and
  /// `reset_hwid`.
  pub async fn key_action(&self, key: &str, action: &str) -> Result<LicenseKey> {
    let req = self.admin(
      self
        .client
        .post(self.url(&format!("/admin/keys/{key}/{action}"))),
    );
    self.fetch(req, &format!("POST /admin/keys/{{key}}/{action}")).await
  }

  /// `POST /admin/keys/{key}/extend`
  pub async fn extend_key(&self, key: &str, days: u32) -> Result<LicenseKey> {
    let req = self
      .admin(self.client.post(self.url(&format!("/admin/keys/{key}/extend"))))
      .json(&serde_json::json!({ "days": days }));
    self.fetch(req, "POST /admin/keys/{key}/extend").await
  }

  /// `PUT /admin/keys/{key}/owner`
  pub async fn set_owner(&self, key: &str, owner: &str) -> Result<LicenseKey> {
    let req = self
      .admin(self.client.put(self.url(&format!("/admin/keys/{key}/owner"))))
      .json(&serde_json::json!({ "owner": owner }));
    self.fetch(req, "PUT /admin/keys/{key}/owner").await
  }

  /// `DELETE /admin/keys/{key}`
  pub async fn delete_key(&self, key: &str) -> Result<()> {
    let req = self.admin(self.client.delete(self.url(&format!("/admin/keys/{key}"))));
    self.fetch_empty(req, "DELETE /admin/keys/{key}").await
  }

  // ── Creators ──────────────────────────────────────────────────────────────

  /// `GET /admin/creators`
  pub async fn list_creators(&self) -> Result<Vec<Creator>> {
    let req = self.admin(self.client.get(self.url("/admin/creators")));
    self.fetch(req, "GET /admin/creators").await
  }

  /// `POST /admin/creators`
  pub async fn add_creator(&self, body: &Value) -> Result<Creator> {
    let req = self.admin(self.client.post(self.url("/admin/creators"))).json(body);
    self.fetch(req, "POST /admin/creators").await
  }

  /// `POST /admin/creators/{id}/toggle`
  pub async fn toggle_creator(&self, id: Uuid) -> Result<Creator> {
    let req = self.admin(
      self
        .client
        .post(self.url(&format!("/admin/creators/{id}/toggle"))),
    );
    self.fetch(req, "POST /admin/creators/{id}/toggle").await
  }

  /// `DELETE /admin/creators/{id}`
  pub async fn delete_creator(&self, id: Uuid) -> Result<()> {
    let req = self.admin(self.client.delete(self.url(&format!("/admin/creators/{id}"))));
    self.fetch_empty(req, "DELETE /admin/creators/{id}").await
  }

  // ── Promo codes ───────────────────────────────────────────────────────────

  /// `GET /admin/promos`
  pub async fn list_promos(&self) -> Result<Vec<PromoCode>> {
    let req = self.admin(self.client.get(self.url("/admin/promos")));
    self.fetch(req, "GET /admin/promos").await
  }

  /// `POST /admin/promos`
  pub async fn add_promo(&self, body: &Value) -> Result<PromoCode> {
    let req = self.admin(self.client.post(self.url("/admin/promos"))).json(body);
    self.fetch(req, "POST /admin/promos").await
  }

  /// `GET /admin/promos/{code}`
  pub async fn get_promo(&self, code: &str) -> Result<PromoCode> {
    let req = self.admin(self.client.get(self.url(&format!("/admin/promos/{code}"))));
    self.fetch(req, "GET /admin/promos/{code}").await
  }

  /// `POST /admin/promos/{code}/toggle`
  pub async fn toggle_promo(&self, code: &str) -> Result<PromoCode> {
    let req = self.admin(
      self
        .client
        .post(self.url(&format!("/admin/promos/{code}/toggle"))),
    );
    self.fetch(req, "POST /admin/promos/{code}/toggle").await
  }

  /// `DELETE /admin/promos/{code}`
  pub async fn delete_promo(&self, code: &str) -> Result<()> {
    let req = self.admin(self.client.delete(self.url(&format!("/admin/promos/{code}"))));
    self.fetch_empty(req, "DELETE /admin/promos/{code}").await
  }

  /// `GET /admin/redemptions[?code=...]`
  pub async fn list_redemptions(&self, code: Option<&str>) -> Result<Vec<Redemption>> {
    let mut req = self.admin(self.client.get(self.url("/admin/redemptions")));
    if let Some(code) = code {
      req = req.query(&[("code", code)]);
    }
    self.fetch(req, "GET /admin/redemptions").await
  }

  // ── Purchases ─────────────────────────────────────────────────────────────

  /// `GET /admin/purchases`
  pub async fn list_purchases(&self) -> Result<Vec<Purchase>> {
    let req = self.admin(self.client.get(self.url("/admin/purchases")));
    self.fetch(req, "GET /admin/purchases").await
  }

  /// `POST /admin/purchases`
  pub async fn add_purchase(&self, body: &Value) -> Result<Purchase> {
    let req = self.admin(self.client.post(self.url("/admin/purchases"))).json(body);
    self.fetch(req, "POST /admin/purchases").await
  }
}

async fn error_from(resp: reqwest::Response, what: &str) -> anyhow::Error {
  let status = resp.status();
  let message = resp
    .json::<Value>()
    .await
    .ok()
    .and_then(|v| {
      v.get("error")
        .or_else(|| v.get("reason"))
        .and_then(Value::as_str)
        .map(str::to_owned)
    });
  match message {
    Some(m) => anyhow!("{what} → {status}: {m}"),
    None => anyhow!("{what} → {status}"),
  }
}
