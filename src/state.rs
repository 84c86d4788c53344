//! Load state of one screen's data, updated only through [`LoadState::reduce`].

use crate::cache::{CacheResult, CacheSource};
use crate::error::{Result, SyncError};

/// Snapshot of a read as a view sees it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState<T> {
  #[default]
  Idle,
  Loading,
  Ready {
    data: T,
    source: CacheSource,
  },
  /// The read failed. Stale data is not kept around.
  Failed {
    message: String,
    retryable: bool,
  },
}

#[derive(Debug)]
pub enum LoadAction<T> {
  Started,
  Resolved(CacheResult<T>),
  Failed(SyncError),
}

impl<T> LoadAction<T> {
  pub fn from_result(result: Result<CacheResult<T>>) -> Self {
    match result {
      Ok(resolved) => Self::Resolved(resolved),
      Err(err) => Self::Failed(err),
    }
  }
}

impl<T> LoadState<T> {
  pub fn reduce(self, action: LoadAction<T>) -> Self {
    match action {
      LoadAction::Started => Self::Loading,
      LoadAction::Resolved(CacheResult { data, source }) => Self::Ready { data, source },
      LoadAction::Failed(err) => Self::Failed {
        message: err.user_message(),
        retryable: err.is_retryable(),
      },
    }
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      Self::Ready { data, .. } => Some(data),
      _ => None,
    }
  }

  pub fn is_loading(&self) -> bool {
    matches!(self, Self::Loading)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::{ClientErrorKind, StoreError};

  #[test]
  fn test_started_then_resolved() {
    let state = LoadState::Idle.reduce(LoadAction::Started);
    assert!(state.is_loading());

    let state = state.reduce(LoadAction::Resolved(CacheResult::from_cache(3)));
    assert_eq!(
      state,
      LoadState::Ready {
        data: 3,
        source: CacheSource::Cache
      }
    );
    assert_eq!(state.data(), Some(&3));
  }

  #[test]
  fn test_failure_drops_previous_data() {
    let state = LoadState::Ready {
      data: "stale",
      source: CacheSource::Cache,
    }
    .reduce(LoadAction::Started)
    .reduce(LoadAction::Failed(SyncError::Client {
      kind: ClientErrorKind::Forbidden,
      message: "no access".into(),
    }));

    assert_eq!(
      state,
      LoadState::Failed {
        message: "no access".into(),
        retryable: true
      }
    );
    assert_eq!(state.data(), None);
  }

  #[test]
  fn test_auth_expired_is_not_retryable() {
    let state: LoadState<()> =
      LoadState::Loading.reduce(LoadAction::Failed(SyncError::AuthExpired("bad password".into())));
    assert!(matches!(state, LoadState::Failed { retryable: false, .. }));
  }

  #[test]
  fn test_from_result() {
    let action: LoadAction<u8> =
      LoadAction::from_result(Err(SyncError::Store(StoreError::Invalid("x".into()))));
    let state = LoadState::Idle.reduce(action);
    assert!(matches!(state, LoadState::Failed { retryable: true, ref message } if message.starts_with("Local storage failure")));
  }
}
