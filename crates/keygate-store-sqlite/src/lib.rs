//! SQLite backend for the Keygate license store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Check-and-act sequences run inside
//! `BEGIN IMMEDIATE` transactions, which take the database write lock up
//! front; concurrent connections queue behind it for up to the busy timeout.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
