//! Core types, policy and trait definitions for the Keygate license engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! The validation rules live here as pure functions; storage backends run them
//! inside their own transactions so each check-and-act step is atomic.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod binding;
pub mod engine;
pub mod error;
pub mod keygen;
pub mod license;
pub mod outcome;
pub mod promo;
pub mod store;

pub use engine::{Admin, Engine};
pub use error::{Error, Result};
