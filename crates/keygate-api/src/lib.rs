//! JSON HTTP API for Keygate.
//!
//! Exposes two axum [`Router`]s backed by a [`keygate_core::Engine`] over any
//! [`LicenseStore`]:
//!
//! - [`public_router`]: the client-facing validation endpoints.
//! - [`admin_router`]: key, creator, promo and purchase management. Every
//!   handler extracts an [`keygate_core::Admin`] token from the request
//!   extensions; the caller's auth middleware is responsible for inserting it.
//!
//! # Mounting
//!
//! ```rust,ignore
//! Router::new()
//!   .merge(keygate_api::public_router(engine.clone(), update))
//!   .nest("/admin", keygate_api::admin_router(engine).layer(auth))
//! ```

pub mod check;
pub mod creators;
pub mod error;
pub mod keys;
pub mod promos;
pub mod purchases;
pub mod update;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use keygate_core::{Engine, store::LicenseStore};

pub use error::ApiError;
pub use update::UpdateInfo;

/// Build the public router: `/check_key`, `/apply_promo`, `/check_update`.
pub fn public_router<S>(engine: Arc<Engine<S>>, update: UpdateInfo) -> Router<()>
where
  S: LicenseStore + 'static,
{
  let validation = Router::new()
    .route("/check_key", post(check::check_key::<S>))
    .route("/apply_promo", post(check::apply_promo::<S>))
    .with_state(engine);

  Router::new()
    .route("/check_update", get(update::handler))
    .with_state(Arc::new(update))
    .merge(validation)
}

/// Build the admin router. Paths are relative; nest it under `/admin`.
pub fn admin_router<S>(engine: Arc<Engine<S>>) -> Router<()>
where
  S: LicenseStore + 'static,
{
  Router::new()
    // Keys
    .route("/keys", get(keys::list::<S>).post(keys::issue::<S>))
    .route("/keys/{key}", get(keys::get_one::<S>).delete(keys::delete_one::<S>))
    .route("/keys/{key}/activate", post(keys::activate::<S>))
    .route("/keys/{key}/deactivate", post(keys::deactivate::<S>))
    .route("/keys/{key}/reset_hwid", post(keys::reset_hwid::<S>))
    .route("/keys/{key}/extend", post(keys::extend::<S>))
    .route("/keys/{key}/owner", put(keys::set_owner::<S>))
    // Creators
    .route("/creators", get(creators::list::<S>).post(creators::create::<S>))
    .route("/creators/{id}", axum::routing::delete(creators::delete_one::<S>))
    .route("/creators/{id}/toggle", post(creators::toggle::<S>))
    // Promo codes
    .route("/promos", get(promos::list::<S>).post(promos::create::<S>))
    .route("/promos/{code}", get(promos::get_one::<S>).delete(promos::delete_one::<S>))
    .route("/promos/{code}/toggle", post(promos::toggle::<S>))
    .route("/redemptions", get(promos::redemptions::<S>))
    // Purchases
    .route("/purchases", get(purchases::list::<S>).post(purchases::create::<S>))
    .with_state(engine)
}
