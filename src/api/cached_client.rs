//! Cached client that fronts a `RemoteSource` with the local entity store.
//!
//! Reads are cache-or-fetch (or always-network for `refresh_*`). Mutations
//! go to the remote source first and touch the store only once the server
//! accepted them, so a failed mutation leaves the store as it was. Every
//! remote call except `login` runs behind the [`AuthGuard`].

use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::{AuthGuard, CredentialStore, LocalCredential};
use crate::cache::{CacheLayer, CacheResult, EntityStore};
use crate::error::{Result, SyncError};

use super::source::RemoteSource;
use super::types::{ProfileData, ProfileUpdate, Session, User, UserId};

pub struct CachedClient<R: RemoteSource> {
  pub(super) remote: Arc<R>,
  pub(super) cache: CacheLayer,
  pub(super) auth: AuthGuard<R>,
  pub(super) credentials: Arc<CredentialStore>,
}

impl<R: RemoteSource> CachedClient<R> {
  pub fn new(remote: Arc<R>, store: Arc<EntityStore>, credentials: Arc<CredentialStore>) -> Self {
    Self {
      auth: AuthGuard::new(remote.clone(), credentials.clone()),
      cache: CacheLayer::new(store),
      remote,
      credentials,
    }
  }

  /// Treat tokens expiring within `leeway` as expired.
  pub fn with_refresh_leeway(mut self, leeway: Duration) -> Self {
    self.auth = self.auth.with_leeway(leeway);
    self
  }

  pub fn store(&self) -> &EntityStore {
    self.cache.store()
  }

  /// The logged-in account, if any.
  pub fn current_user(&self) -> Result<Option<LocalCredential>> {
    Ok(self.credentials.current()?)
  }

  // ==========================================================================
  // Session
  // ==========================================================================

  /// Authenticate and store the credential. Logging in as a different
  /// account first drops everything cached for the previous one.
  pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
    let session = self.remote.login(email, password).await?;

    if let Some(previous) = self.credentials.current()? {
      if previous.user_id != session.user_id {
        info!(previous = previous.user_id, "different account, clearing cache");
        self.store().wipe()?;
      }
    }

    self.credentials.set(LocalCredential {
      token: session.token.clone(),
      email: email.to_string(),
      secret: password.to_string(),
      user_id: session.user_id,
      display_name: session.name.clone(),
      avatar: None,
    })?;
    info!(user = session.user_id, "logged in");
    Ok(session)
  }

  /// Wipe every cached entity and forget the credential.
  pub fn logout(&self) -> Result<()> {
    self.store().wipe()?;
    self.credentials.clear()?;
    info!("logged out");
    Ok(())
  }

  // ==========================================================================
  // Users
  // ==========================================================================

  pub async fn get_user(&self, id: UserId) -> Result<CacheResult<User>> {
    self
      .cache
      .fetch_one(id, || {
        self
          .auth
          .call(|token| async move { self.remote.fetch_user(&token, id).await })
      })
      .await
  }

  pub async fn refresh_user(&self, id: UserId) -> Result<CacheResult<User>> {
    self
      .cache
      .refresh(|| {
        self
          .auth
          .call(|token| async move { self.remote.fetch_user(&token, id).await })
      })
      .await
  }

  // ==========================================================================
  // Profiles
  // ==========================================================================

  pub async fn get_profile(&self, user_id: UserId) -> Result<CacheResult<ProfileData>> {
    self
      .cache
      .fetch_one(user_id, || {
        self
          .auth
          .call(|token| async move { self.remote.fetch_profile(&token, user_id).await })
      })
      .await
  }

  pub async fn refresh_profile(&self, user_id: UserId) -> Result<CacheResult<ProfileData>> {
    self
      .cache
      .refresh(|| {
        self
          .auth
          .call(|token| async move { self.remote.fetch_profile(&token, user_id).await })
      })
      .await
  }

  /// Edit the logged-in account's name and avatar. The cached profile, the
  /// cached user row and the credential all take the server's answer.
  pub async fn update_profile(&self, name: &str, avatar: Option<Vec<u8>>) -> Result<ProfileData> {
    let credential = self
      .credentials
      .current()?
      .ok_or_else(|| SyncError::AuthExpired("not logged in".to_string()))?;
    let update = ProfileUpdate {
      user_id: credential.user_id,
      name: name.to_string(),
      avatar,
    };

    let update = &update;
    let profile = self
      .auth
      .call(|token| async move { self.remote.update_profile(&token, update).await })
      .await?;

    self.store().update_own_profile(&profile)?;
    self
      .credentials
      .update_profile(&profile.name, profile.avatar.clone())?;
    debug!(user = profile.user_id, "profile updated");
    Ok(profile)
  }
}
