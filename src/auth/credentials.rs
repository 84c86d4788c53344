//! The device's single local credential.
//!
//! Created at login, rewritten on token refresh or profile edit, removed at
//! logout. Guarded by its own lock, independent of the entity store.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

use crate::api::api_types::opt_base64;
use crate::error::StoreError;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalCredential {
  pub token: String,
  pub email: String,
  /// Password-equivalent secret replayed to re-authenticate.
  pub secret: String,
  pub user_id: u64,
  pub display_name: String,
  #[serde(default, with = "opt_base64")]
  pub avatar: Option<Vec<u8>>,
}

impl std::fmt::Debug for LocalCredential {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LocalCredential")
      .field("email", &self.email)
      .field("user_id", &self.user_id)
      .field("display_name", &self.display_name)
      .field("token", &"<redacted>")
      .field("secret", &"<redacted>")
      .finish()
  }
}

/// Process-wide holder of the [`LocalCredential`], optionally persisted as JSON.
pub struct CredentialStore {
  path: Option<PathBuf>,
  current: RwLock<Option<LocalCredential>>,
}

impl CredentialStore {
  /// Load the credential file at `path` if it exists.
  pub fn open(path: &Path) -> Result<Self, StoreError> {
    let current = if path.exists() {
      let contents = std::fs::read(path).map_err(|source| StoreError::Io {
        context: format!("Failed to read credentials {}", path.display()),
        source,
      })?;
      let credential: LocalCredential =
        serde_json::from_slice(&contents).map_err(|source| StoreError::Serde {
          what: "credentials",
          source,
        })?;
      debug!(email = %credential.email, "loaded stored credential");
      Some(credential)
    } else {
      None
    };

    Ok(Self {
      path: Some(path.to_path_buf()),
      current: RwLock::new(current),
    })
  }

  /// A credential store that is never written to disk.
  pub fn in_memory() -> Self {
    Self {
      path: None,
      current: RwLock::new(None),
    }
  }

  fn read(&self) -> Result<RwLockReadGuard<'_, Option<LocalCredential>>, StoreError> {
    self
      .current
      .read()
      .map_err(|e| StoreError::LockPoisoned(e.to_string()))
  }

  fn write(&self) -> Result<RwLockWriteGuard<'_, Option<LocalCredential>>, StoreError> {
    self
      .current
      .write()
      .map_err(|e| StoreError::LockPoisoned(e.to_string()))
  }

  pub fn current(&self) -> Result<Option<LocalCredential>, StoreError> {
    Ok(self.read()?.clone())
  }

  /// Replace the credential (login).
  pub fn set(&self, credential: LocalCredential) -> Result<(), StoreError> {
    let mut current = self.write()?;
    self.persist(Some(&credential))?;
    info!(email = %credential.email, "credential stored");
    *current = Some(credential);
    Ok(())
  }

  /// Swap in a renewed token. Fails if nobody is logged in.
  pub fn update_token(&self, token: &str) -> Result<(), StoreError> {
    self.modify(|credential| credential.token = token.to_string())
  }

  /// Carry a profile edit over to the credential.
  pub fn update_profile(&self, name: &str, avatar: Option<Vec<u8>>) -> Result<(), StoreError> {
    self.modify(|credential| {
      credential.display_name = name.to_string();
      credential.avatar = avatar;
    })
  }

  fn modify(&self, f: impl FnOnce(&mut LocalCredential)) -> Result<(), StoreError> {
    let mut current = self.write()?;
    let mut credential = current
      .clone()
      .ok_or_else(|| StoreError::Invalid("no credential stored".to_string()))?;
    f(&mut credential);
    self.persist(Some(&credential))?;
    *current = Some(credential);
    Ok(())
  }

  /// Forget the credential (logout).
  pub fn clear(&self) -> Result<(), StoreError> {
    let mut current = self.write()?;
    self.persist(None)?;
    *current = None;
    info!("credential cleared");
    Ok(())
  }

  fn persist(&self, credential: Option<&LocalCredential>) -> Result<(), StoreError> {
    let Some(path) = &self.path else {
      return Ok(());
    };
    let io_err = |context: &str| {
      let context = format!("{} {}", context, path.display());
      move |source| StoreError::Io { context, source }
    };

    match credential {
      Some(credential) => {
        if let Some(parent) = path.parent() {
          std::fs::create_dir_all(parent).map_err(io_err("Failed to create directory for"))?;
        }
        let data = serde_json::to_vec_pretty(credential).map_err(|source| StoreError::Serde {
          what: "credentials",
          source,
        })?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, data).map_err(io_err("Failed to write"))?;
        std::fs::rename(&tmp, path).map_err(io_err("Failed to replace"))?;
      }
      None => {
        if path.exists() {
          std::fs::remove_file(path).map_err(io_err("Failed to remove"))?;
        }
      }
    }
    Ok(())
  }
}

#[cfg(test)]
pub(crate) fn test_credential(token: &str) -> LocalCredential {
  LocalCredential {
    token: token.to_string(),
    email: "ada@example.com".to_string(),
    secret: "hunter2".to_string(),
    user_id: 1,
    display_name: "Ada".to_string(),
    avatar: None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir()
      .join(format!("tasksync-test-{}-{}", std::process::id(), name))
      .join("credentials.json")
  }

  #[test]
  fn test_in_memory_lifecycle() {
    let store = CredentialStore::in_memory();
    assert_eq!(store.current().unwrap(), None);
    assert!(store.update_token("t2").is_err());

    store.set(test_credential("t1")).unwrap();
    store.update_token("t2").unwrap();
    store.update_profile("Ada L.", Some(vec![1, 2, 3])).unwrap();
    let current = store.current().unwrap().unwrap();
    assert_eq!(current.token, "t2");
    assert_eq!(current.display_name, "Ada L.");
    assert_eq!(current.avatar, Some(vec![1, 2, 3]));

    store.clear().unwrap();
    assert_eq!(store.current().unwrap(), None);
  }

  #[test]
  fn test_persisted_across_reopen() {
    let path = temp_path("reopen");
    let store = CredentialStore::open(&path).unwrap();
    let mut credential = test_credential("t1");
    credential.avatar = Some(vec![9, 8, 7]);
    store.set(credential.clone()).unwrap();

    let reopened = CredentialStore::open(&path).unwrap();
    assert_eq!(reopened.current().unwrap(), Some(credential));

    reopened.clear().unwrap();
    assert!(!path.exists());
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
  }

  #[test]
  fn test_debug_redacts_secrets() {
    let rendered = format!("{:?}", test_credential("secret-token"));
    assert!(!rendered.contains("secret-token"));
    assert!(!rendered.contains("hunter2"));
  }
}
