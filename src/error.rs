//! Error taxonomy shared by the store, the remote source and the cached client.

use thiserror::Error;

/// Client error categories reported by the server (HTTP 4xx).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
  BadRequest,
  Unauthorized,
  Forbidden,
  NotFound,
  Conflict,
  UnprocessableEntity,
  Other(u16),
}

impl ClientErrorKind {
  pub fn from_status(status: u16) -> Self {
    match status {
      400 => Self::BadRequest,
      401 => Self::Unauthorized,
      403 => Self::Forbidden,
      404 => Self::NotFound,
      409 => Self::Conflict,
      422 => Self::UnprocessableEntity,
      other => Self::Other(other),
    }
  }
}

impl std::fmt::Display for ClientErrorKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::BadRequest => write!(f, "bad request"),
      Self::Unauthorized => write!(f, "unauthorized"),
      Self::Forbidden => write!(f, "forbidden"),
      Self::NotFound => write!(f, "not found"),
      Self::Conflict => write!(f, "conflict"),
      Self::UnprocessableEntity => write!(f, "unprocessable entity"),
      Self::Other(status) => write!(f, "client error {}", status),
    }
  }
}

/// Failure classification of a remote call. Success is the `Ok` side of
/// [`ApiResult`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
  #[error("{kind}: {message}")]
  Client {
    kind: ClientErrorKind,
    message: String,
  },
  #[error("server error: {0}")]
  Server(String),
  #[error("{0}")]
  Generic(String),
}

pub type ApiResult<T> = std::result::Result<T, RemoteError>;

/// Local store failures.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("{context}: {source}")]
  Sqlite {
    context: String,
    #[source]
    source: rusqlite::Error,
  },
  #[error("lock poisoned: {0}")]
  LockPoisoned(String),
  #[error("corrupt id-list {value:?}: {reason}")]
  CorruptIdList { value: String, reason: String },
  #[error("failed to serialize {what}: {source}")]
  Serde {
    what: &'static str,
    #[source]
    source: serde_json::Error,
  },
  #[error("{context}: {source}")]
  Io {
    context: String,
    #[source]
    source: std::io::Error,
  },
  #[error("{0}")]
  Invalid(String),
}

/// Attach a context message to a rusqlite result.
pub(crate) trait SqlContext<T> {
  fn context(self, context: impl Into<String>) -> std::result::Result<T, StoreError>;
}

impl<T> SqlContext<T> for rusqlite::Result<T> {
  fn context(self, context: impl Into<String>) -> std::result::Result<T, StoreError> {
    self.map_err(|source| StoreError::Sqlite {
      context: context.into(),
      source,
    })
  }
}

/// Errors surfaced to callers of the cached client.
#[derive(Debug, Error)]
pub enum SyncError {
  /// The credential expired and re-authentication failed (or there is no credential).
  #[error("authentication expired: {0}")]
  AuthExpired(String),
  #[error("{kind}: {message}")]
  Client {
    kind: ClientErrorKind,
    message: String,
  },
  #[error("server error: {0}")]
  Server(String),
  #[error("request failed: {0}")]
  Generic(String),
  #[error("local store error: {0}")]
  Store(#[from] StoreError),
}

impl From<RemoteError> for SyncError {
  fn from(err: RemoteError) -> Self {
    match err {
      RemoteError::Client { kind, message } => Self::Client { kind, message },
      RemoteError::Server(message) => Self::Server(message),
      RemoteError::Generic(message) => Self::Generic(message),
    }
  }
}

impl SyncError {
  /// Human-readable text for the UI layer.
  pub fn user_message(&self) -> String {
    match self {
      Self::AuthExpired(_) => "Your session has expired, please log in again".to_string(),
      Self::Client { message, .. } => message.clone(),
      Self::Server(message) => message.clone(),
      Self::Generic(_) => "Something went wrong, check your connection and try again".to_string(),
      Self::Store(e) => format!("Local storage failure: {}", e),
    }
  }

  /// Whether offering a retry makes sense. Only a failed login does not.
  pub fn is_retryable(&self) -> bool {
    !matches!(self, Self::AuthExpired(_))
  }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_remote_errors_map_one_to_one() {
    let err: SyncError = RemoteError::Client {
      kind: ClientErrorKind::Forbidden,
      message: "not your task".into(),
    }
    .into();
    assert!(matches!(
      err,
      SyncError::Client {
        kind: ClientErrorKind::Forbidden,
        ..
      }
    ));
    assert_eq!(err.user_message(), "not your task");

    let err: SyncError = RemoteError::Server("db down".into()).into();
    assert_eq!(err.user_message(), "db down");
  }

  #[test]
  fn test_generic_error_hides_details() {
    let err: SyncError = RemoteError::Generic("dns failure".into()).into();
    assert!(!err.user_message().contains("dns"));
    assert!(err.is_retryable());
  }

  #[test]
  fn test_auth_expired_is_not_retryable() {
    let err = SyncError::AuthExpired("login rejected".into());
    assert!(!err.is_retryable());
    assert!(err.user_message().contains("log in again"));
  }

  #[test]
  fn test_status_kinds() {
    assert_eq!(ClientErrorKind::from_status(404), ClientErrorKind::NotFound);
    assert_eq!(ClientErrorKind::from_status(418), ClientErrorKind::Other(418));
  }

  #[test]
  fn test_sql_context_wraps_rusqlite_error() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    let ok: std::result::Result<i64, StoreError> = conn
      .query_row("SELECT 7", [], |row| row.get(0))
      .context("Failed to select");
    assert_eq!(ok.unwrap(), 7);

    let err = conn
      .execute("INSERT INTO missing VALUES (1)", [])
      .context("Failed to insert into missing")
      .unwrap_err();
    assert!(matches!(err, StoreError::Sqlite { .. }));
    assert!(err.to_string().starts_with("Failed to insert into missing: "));

    let err: SyncError = err.into();
    assert!(err.user_message().starts_with("Local storage failure"));
  }
}
