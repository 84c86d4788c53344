pub mod schema;

use rusqlite::Connection;
use std::path::{Path, PathBuf};

use crate::error::{SqlContext, StoreError};

/// Open or create the database at `path` and run migrations.
pub fn open(path: &Path) -> Result<Connection, StoreError> {
  // Ensure parent directory exists
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
      context: format!("Failed to create database directory {}", parent.display()),
      source,
    })?;
  }

  let conn = Connection::open(path)
    .context(format!("Failed to open database at {}", path.display()))?;

  conn
    .pragma_update(None, "journal_mode", "WAL")
    .context("Failed to enable WAL")?;
  conn
    .busy_timeout(std::time::Duration::from_secs(5))
    .context("Failed to set busy timeout")?;

  run_migrations(&conn)?;
  Ok(conn)
}

/// Open a private in-memory database with the schema applied.
pub fn open_in_memory() -> Result<Connection, StoreError> {
  let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
  run_migrations(&conn)?;
  Ok(conn)
}

/// Default database path under the user data directory.
pub fn default_path() -> Result<PathBuf, StoreError> {
  Ok(data_dir()?.join("cache.db"))
}

/// Application data directory (`$XDG_DATA_HOME/tasksync`).
pub fn data_dir() -> Result<PathBuf, StoreError> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| StoreError::Invalid("Could not determine data directory".to_string()))?;

  Ok(data_dir.join("tasksync"))
}

fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
  conn
    .execute_batch(schema::SCHEMA)
    .context("Failed to run migrations")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_migrations_are_idempotent() {
    let conn = open_in_memory().unwrap();
    run_migrations(&conn).unwrap();
    for table in schema::TABLES {
      let count: i64 = conn
        .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
        .unwrap();
      assert_eq!(count, 0, "{}", table);
    }
  }

  #[test]
  fn test_open_creates_parent_dir_and_sets_pragmas() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("cache.db");

    let conn = open(&path).unwrap();

    assert!(path.exists());
    let mode: String = conn
      .query_row("PRAGMA journal_mode", [], |r| r.get(0))
      .unwrap();
    assert_eq!(mode, "wal");
    let timeout: i64 = conn.query_row("PRAGMA busy_timeout", [], |r| r.get(0)).unwrap();
    assert_eq!(timeout, 5000);
  }
}
