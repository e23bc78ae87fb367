//! HTTP Basic-auth verification for the admin surface.
//!
//! [`require_admin`] is an axum middleware: on success it inserts a
//! [`keygate_core::Admin`] token into the request extensions, which every
//! admin handler extracts.

use std::sync::Arc;

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  extract::{Request, State},
  http::HeaderMap,
  middleware::Next,
  response::Response,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use keygate_core::Admin;
use rand_core::OsRng;

use crate::error::Error;

/// Credentials accepted as valid for this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// Produce the PHC string to put in `admin_password_hash`.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
}

/// Verify Basic credentials from `headers` against `config`.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<(), Error> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;

  if username != config.username {
    return Err(Error::Unauthorized);
  }

  let parsed_hash = PasswordHash::new(&config.password_hash)
    .map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)?;

  Ok(())
}

/// Middleware guarding `/admin`.
pub async fn require_admin(
  State(auth): State<Arc<AuthConfig>>,
  mut req: Request,
  next: Next,
) -> Result<Response, Error> {
  if let Err(e) = verify_auth(req.headers(), &auth) {
    tracing::warn!(path = %req.uri().path(), "rejected admin request");
    return Err(e);
  }
  req.extensions_mut().insert(Admin::verified());
  Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
  use axum::http::{HeaderValue, header};

  use super::*;

  fn config(password: &str) -> AuthConfig {
    AuthConfig {
      username:      "admin".to_string(),
      password_hash: hash_password(password).unwrap(),
    }
  }

  fn basic(user: &str, pass: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let value = format!("Basic {}", B64.encode(format!("{user}:{pass}")));
    headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&value).unwrap());
    headers
  }

  #[test]
  fn correct_credentials() {
    let cfg = config("secret");
    assert!(verify_auth(&basic("admin", "secret"), &cfg).is_ok());
  }

  #[test]
  fn wrong_password() {
    let cfg = config("secret");
    assert!(matches!(verify_auth(&basic("admin", "wrong"), &cfg), Err(Error::Unauthorized)));
  }

  #[test]
  fn wrong_username() {
    let cfg = config("secret");
    assert!(matches!(verify_auth(&basic("root", "secret"), &cfg), Err(Error::Unauthorized)));
  }

  #[test]
  fn missing_header() {
    let cfg = config("secret");
    assert!(matches!(verify_auth(&HeaderMap::new(), &cfg), Err(Error::Unauthorized)));
  }

  #[test]
  fn invalid_base64() {
    let cfg = config("secret");
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic !!!not-base64!!!"));
    assert!(matches!(verify_auth(&headers, &cfg), Err(Error::Unauthorized)));
  }

  #[test]
  fn malformed_hash_rejects_everything() {
    let cfg = AuthConfig {
      username:      "admin".to_string(),
      password_hash: "plaintext".to_string(),
    };
    assert!(matches!(verify_auth(&basic("admin", "plaintext"), &cfg), Err(Error::Unauthorized)));
  }
}
