//! Error types for `keygate-core`.
//!
//! These cover the admin surface and fatal store failures. Outcomes of the
//! public validation path (`check_key`, `apply_promo`) are reported as reason
//! codes in [`crate::outcome::Verdict`], never as errors.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("missing or malformed field: {0}")]
  Validation(String),

  #[error("license key not found: {0}")]
  KeyNotFound(String),

  #[error("promo code not found: {0}")]
  PromoNotFound(String),

  #[error("creator not found: {0}")]
  CreatorNotFound(Uuid),

  #[error("license key already exists: {0}")]
  DuplicateKey(String),

  #[error("promo code already exists: {0}")]
  DuplicatePromo(String),

  #[error("creator nickname already taken: {0}")]
  DuplicateCreator(String),

  #[error("expiry timestamp out of range")]
  ExpiryOverflow,

  #[error("could not generate a unique key after {0} attempts")]
  KeyGenerationExhausted(usize),

  /// Connectivity loss, aborted transaction or undecodable row. Nothing from
  /// the failed operation was committed.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::KeyNotFound(_) | Self::PromoNotFound(_) | Self::CreatorNotFound(_)
    )
  }

  pub fn is_conflict(&self) -> bool {
    matches!(
      self,
      Self::DuplicateKey(_) | Self::DuplicatePromo(_) | Self::DuplicateCreator(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
