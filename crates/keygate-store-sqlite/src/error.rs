//! Error type for `keygate-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A domain failure: missing row, uniqueness conflict, bad input.
  #[error("{0}")]
  Core(#[from] keygate_core::Error),

  #[error("database error: {0}")]
  Database(#[source] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

/// Domain errors raised inside a `call` closure travel out boxed in
/// [`tokio_rusqlite::Error::Other`]; unwrap them again here.
impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    match e {
      tokio_rusqlite::Error::Other(inner) => match inner.downcast::<Error>() {
        Ok(ours) => *ours,
        Err(other) => Error::Database(tokio_rusqlite::Error::Other(other)),
      },
      e => Error::Database(e),
    }
  }
}

impl From<Error> for keygate_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(core) => core,
      other => keygate_core::Error::Store(Box::new(other)),
    }
  }
}

/// Box an error for return from inside a `call` closure.
pub(crate) fn raise(e: impl Into<Error>) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(e.into()))
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
