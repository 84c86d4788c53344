//! Transparent re-authentication around authenticated remote calls.

use chrono::{Duration, Utc};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::credentials::CredentialStore;
use super::token;
use crate::api::source::RemoteSource;
use crate::error::{ApiResult, Result, SyncError};

/// Wraps remote calls so an expired token is renewed once before the call.
///
/// The wrapped call itself is never retried: its client, server and generic
/// errors reach the caller unchanged. The only error manufactured here is
/// [`SyncError::AuthExpired`].
pub struct AuthGuard<R: RemoteSource + ?Sized> {
  remote: Arc<R>,
  credentials: Arc<CredentialStore>,
  leeway: Duration,
  /// Serializes renewals so concurrent callers do not all log in again.
  refresh: Mutex<()>,
}

impl<R: RemoteSource + ?Sized> AuthGuard<R> {
  pub fn new(remote: Arc<R>, credentials: Arc<CredentialStore>) -> Self {
    Self {
      remote,
      credentials,
      leeway: Duration::seconds(30),
      refresh: Mutex::new(()),
    }
  }

  /// Treat tokens expiring within `leeway` as already expired.
  pub fn with_leeway(mut self, leeway: Duration) -> Self {
    self.leeway = leeway;
    self
  }

  /// Run `call` with a valid token.
  pub async fn call<T, F, Fut>(&self, call: F) -> Result<T>
  where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = ApiResult<T>>,
  {
    let token = self.valid_token().await?;
    call(token).await.map_err(SyncError::from)
  }

  async fn valid_token(&self) -> Result<String> {
    let credential = self
      .credentials
      .current()?
      .ok_or_else(|| SyncError::AuthExpired("not logged in".to_string()))?;
    if !token::is_expired(&credential.token, Utc::now(), self.leeway) {
      return Ok(credential.token);
    }

    let _renewing = self.refresh.lock().await;

    // Someone else may have renewed while we waited.
    let credential = self
      .credentials
      .current()?
      .ok_or_else(|| SyncError::AuthExpired("logged out".to_string()))?;
    if !token::is_expired(&credential.token, Utc::now(), self.leeway) {
      debug!("token renewed by a concurrent call");
      return Ok(credential.token);
    }

    info!(email = %credential.email, "token expired, re-authenticating");
    match self.remote.login(&credential.email, &credential.secret).await {
      Ok(session) => {
        self.credentials.update_token(&session.token)?;
        info!("re-authenticated");
        Ok(session.token)
      }
      Err(e) => {
        warn!(error = %e, "re-authentication failed");
        Err(SyncError::AuthExpired(e.to_string()))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::fake::FakeRemote;
  use crate::auth::credentials::test_credential;
  use crate::auth::token::test_token;
  use crate::error::{ClientErrorKind, RemoteError};

  fn setup(token: String) -> (Arc<FakeRemote>, Arc<CredentialStore>, AuthGuard<FakeRemote>) {
    let remote = Arc::new(FakeRemote::new());
    let credentials = Arc::new(CredentialStore::in_memory());
    credentials.set(test_credential(&token)).unwrap();
    let guard = AuthGuard::new(remote.clone(), credentials.clone());
    (remote, credentials, guard)
  }

  #[tokio::test]
  async fn test_valid_token_skips_login() {
    let token = test_token(Utc::now() + Duration::hours(1));
    let (remote, _, guard) = setup(token.clone());

    let seen = guard.call(|t| async move { Ok(t) }).await.unwrap();
    assert_eq!(seen, token);
    assert_eq!(remote.calls("login"), 0);
  }

  #[tokio::test]
  async fn test_expired_token_refreshes_once_then_calls() {
    let (remote, credentials, guard) = setup(test_token(Utc::now() - Duration::hours(1)));

    let r = remote.clone();
    let seen = guard
      .call(|t| async move {
        r.record("business");
        Ok(t)
      })
      .await
      .unwrap();

    assert_eq!(remote.log(), vec!["login", "business"]);
    assert_eq!(credentials.current().unwrap().unwrap().token, seen);
    assert!(!token::is_expired(&seen, Utc::now(), Duration::zero()));
  }

  #[tokio::test]
  async fn test_failed_refresh_aborts_without_calling() {
    let (remote, _, guard) = setup("garbage".to_string());
    remote.fail(
      "login",
      RemoteError::Client {
        kind: ClientErrorKind::Unauthorized,
        message: "bad password".into(),
      },
    );

    let r = remote.clone();
    let err = guard
      .call(|_| async move {
        r.record("business");
        Ok(())
      })
      .await
      .unwrap_err();

    assert!(matches!(err, SyncError::AuthExpired(_)));
    assert_eq!(remote.log(), vec!["login"]);
  }

  #[tokio::test]
  async fn test_business_errors_pass_through_without_retry() {
    let (remote, _, guard) = setup(test_token(Utc::now() + Duration::hours(1)));

    let r = remote.clone();
    let err = guard
      .call(|_| async move {
        r.record("business");
        Err::<(), _>(RemoteError::Server("boom".into()))
      })
      .await
      .unwrap_err();

    assert!(matches!(err, SyncError::Server(ref m) if m == "boom"));
    assert_eq!(remote.log(), vec!["business"]);
  }

  #[tokio::test]
  async fn test_logged_out_is_auth_expired() {
    let remote = Arc::new(FakeRemote::new());
    let guard = AuthGuard::new(remote.clone(), Arc::new(CredentialStore::in_memory()));
    let err = guard.call(|_| async { Ok(()) }).await.unwrap_err();
    assert!(matches!(err, SyncError::AuthExpired(_)));
    assert_eq!(remote.calls("login"), 0);
  }

  #[tokio::test]
  async fn test_concurrent_expired_calls_login_once() {
    let (remote, _, guard) = setup(test_token(Utc::now() - Duration::hours(1)));
    let guard = Arc::new(guard);

    let a = guard.call(|t| async move { Ok(t) });
    let b = guard.call(|t| async move { Ok(t) });
    let (a, b) = tokio::join!(a, b);

    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(remote.calls("login"), 1);
  }
}
