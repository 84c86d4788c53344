//! SQLite-backed entity store.

use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::rows;
use crate::api::types::{
  Attachment, ChildKind, Comment, Message, MessageBundle, MessageReply, MessageSummary,
  ProfileData, Task, TaskBundle, TaskChild, TaskSummary, User,
};
use crate::db;
use crate::error::{SqlContext, StoreError};

/// List marker keys.
pub const TASK_LIST: &str = "task_summaries";
pub const MESSAGE_LIST: &str = "message_summaries";

/// A detected break of the parent/child or summary/detail invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
  pub table: &'static str,
  pub id: u64,
  pub problem: String,
}

/// Embedded store holding denormalized snapshots of server entities.
///
/// All access goes through one connection behind a mutex, so writers are
/// serialized and every multi-statement write runs in a single
/// `IMMEDIATE` transaction. Writes live in `relations`; this file only
/// reads.
pub struct EntityStore {
  conn: Mutex<Connection>,
}

impl EntityStore {
  /// Open the store at `path`, creating it if needed.
  pub fn open(path: &Path) -> Result<Self, StoreError> {
    let conn = db::open(path)?;
    info!(path = %path.display(), "opened entity store");
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// A private in-memory store.
  pub fn in_memory() -> Result<Self, StoreError> {
    Ok(Self {
      conn: Mutex::new(db::open_in_memory()?),
    })
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
    self
      .conn
      .lock()
      .map_err(|e| StoreError::LockPoisoned(e.to_string()))
  }

  pub(super) fn read<T>(
    &self,
    f: impl FnOnce(&Connection) -> Result<T, StoreError>,
  ) -> Result<T, StoreError> {
    let conn = self.lock()?;
    f(&conn)
  }

  /// Run `f` in one transaction. Any error rolls back everything `f` did.
  pub(super) fn write<T>(
    &self,
    what: &str,
    f: impl FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
  ) -> Result<T, StoreError> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction_with_behavior(TransactionBehavior::Immediate)
      .context(format!("Failed to begin transaction for {}", what))?;
    match f(&tx) {
      Ok(out) => {
        tx.commit()
          .context(format!("Failed to commit transaction for {}", what))?;
        debug!(what, "committed");
        Ok(out)
      }
      Err(e) => {
        // Dropping the transaction rolls it back.
        drop(tx);
        debug!(what, error = %e, "rolled back");
        Err(e)
      }
    }
  }

  /// Delete every row of every entity table.
  pub fn wipe(&self) -> Result<(), StoreError> {
    self.write("wipe", |tx| {
      for table in db::schema::TABLES {
        tx.execute(&format!("DELETE FROM {}", table), [])
          .context(format!("Failed to wipe {}", table))?;
      }
      Ok(())
    })?;
    info!("entity store wiped");
    Ok(())
  }

  // ==========================================================================
  // Users and profiles
  // ==========================================================================

  pub fn user(&self, id: u64) -> Result<Option<User>, StoreError> {
    self.read(|conn| rows::load_user(conn, id))
  }

  /// The cached users among `ids`, ordered by id. Unknown ids are skipped.
  pub fn users(&self, ids: impl IntoIterator<Item = u64>) -> Result<Vec<User>, StoreError> {
    let ids: BTreeSet<u64> = ids.into_iter().collect();
    self.read(|conn| load_users(conn, ids))
  }

  pub fn profile(&self, user_id: u64) -> Result<Option<ProfileData>, StoreError> {
    self.read(|conn| rows::load_profile(conn, user_id))
  }

  // ==========================================================================
  // Tasks
  // ==========================================================================

  pub fn task(&self, id: u64) -> Result<Option<Task>, StoreError> {
    self.read(|conn| rows::load_task(conn, id))
  }

  pub fn task_summary(&self, id: u64) -> Result<Option<TaskSummary>, StoreError> {
    self.read(|conn| rows::load_summary(conn, id))
  }

  /// Every cached task summary, or `None` if the list was never fetched.
  pub fn task_summaries(&self) -> Result<Option<Vec<TaskSummary>>, StoreError> {
    self.read(|conn| {
      if !rows::list_is_cached(conn, TASK_LIST)? {
        return Ok(None);
      }
      rows::query_summaries(conn, "", &[]).map(Some)
    })
  }

  pub fn tasks_created_by(&self, user_id: u64) -> Result<Vec<TaskSummary>, StoreError> {
    self.read(|conn| rows::query_summaries(conn, "WHERE ts.creator_id = ?1", &[&user_id]))
  }

  /// Summaries whose assignees include `user_id`, by exact id match.
  pub fn tasks_assigned_to(&self, user_id: u64) -> Result<Vec<TaskSummary>, StoreError> {
    self.read(|conn| {
      rows::query_summaries(
        conn,
        "JOIN task_assignees ta ON ta.task_id = ts.id WHERE ta.user_id = ?1",
        &[&user_id],
      )
    })
  }

  /// The full aggregate for a task, if its detail row is cached.
  pub fn task_bundle(&self, id: u64) -> Result<Option<TaskBundle>, StoreError> {
    self.read(|conn| {
      let Some(task) = rows::load_task(conn, id)? else {
        return Ok(None);
      };

      let mut comments = Vec::new();
      let mut subtasks = Vec::new();
      let mut checklists = Vec::new();
      let mut attachments = Vec::new();
      for kind in ChildKind::ALL {
        for child_id in task.child_ids(kind) {
          match rows::load_child(conn, kind, *child_id)? {
            Some(TaskChild::Comment(c)) => comments.push(c),
            Some(TaskChild::Subtask(s)) => subtasks.push(s),
            Some(TaskChild::Checklist(c)) => checklists.push(c),
            Some(TaskChild::Attachment(a)) => attachments.push(a),
            None => {
              return Err(StoreError::Invalid(format!(
                "task {} lists missing {} {}",
                id, kind, child_id
              )))
            }
          }
        }
      }

      let users = load_users(conn, task_user_ids(&task, &comments, &attachments))?;

      Ok(Some(TaskBundle {
        task,
        comments,
        subtasks,
        checklists,
        attachments,
        users,
      }))
    })
  }

  pub fn child(&self, kind: ChildKind, id: u64) -> Result<Option<TaskChild>, StoreError> {
    self.read(|conn| rows::load_child(conn, kind, id))
  }

  /// Children of a task in id-list order.
  pub fn children(&self, task_id: u64, kind: ChildKind) -> Result<Vec<TaskChild>, StoreError> {
    self.read(|conn| {
      let Some(ids) = rows::read_child_list(conn, task_id, kind)? else {
        return Ok(Vec::new());
      };
      let mut out = Vec::with_capacity(ids.len());
      for id in ids {
        if let Some(child) = rows::load_child(conn, kind, id)? {
          out.push(child);
        }
      }
      Ok(out)
    })
  }

  // ==========================================================================
  // Messages
  // ==========================================================================

  /// Every cached message summary, or `None` if the list was never fetched.
  pub fn message_summaries(&self) -> Result<Option<Vec<MessageSummary>>, StoreError> {
    self.read(|conn| {
      if !rows::list_is_cached(conn, MESSAGE_LIST)? {
        return Ok(None);
      }
      rows::load_message_summaries(conn).map(Some)
    })
  }

  pub fn message_summary(&self, id: u64) -> Result<Option<MessageSummary>, StoreError> {
    self.read(|conn| rows::load_message_summary(conn, id))
  }

  pub fn message(&self, id: u64) -> Result<Option<Message>, StoreError> {
    self.read(|conn| rows::load_message(conn, id))
  }

  pub fn message_bundle(&self, id: u64) -> Result<Option<MessageBundle>, StoreError> {
    self.read(|conn| {
      let Some(message) = rows::load_message(conn, id)? else {
        return Ok(None);
      };
      let mut replies = Vec::with_capacity(message.replies.len());
      for reply_id in &message.replies {
        let reply = rows::load_reply(conn, *reply_id)?.ok_or_else(|| {
          StoreError::Invalid(format!("message {} lists missing reply {}", id, reply_id))
        })?;
        replies.push(reply);
      }

      let mut user_ids: BTreeSet<u64> = message.participants.iter().copied().collect();
      user_ids.insert(message.sender_id);
      user_ids.extend(replies.iter().map(|r| r.sender_id));
      let users = load_users(conn, user_ids)?;

      Ok(Some(MessageBundle {
        message,
        replies,
        users,
      }))
    })
  }

  pub fn reply(&self, id: u64) -> Result<Option<MessageReply>, StoreError> {
    self.read(|conn| rows::load_reply(conn, id))
  }

  // ==========================================================================
  // Consistency
  // ==========================================================================

  /// Report every id-list entry without a row, every child row missing
  /// from its parent's id-list, and every summary/detail disagreement.
  pub fn verify_relations(&self) -> Result<Vec<Violation>, StoreError> {
    self.read(|conn| {
      let mut violations = Vec::new();

      let tasks = rows::all_tasks(conn)?;
      for kind in ChildKind::ALL {
        let table = kind.as_str();
        let parents = rows::child_parents(conn, kind)?;
        for task in &tasks {
          let listed: BTreeSet<u64> = task.child_ids(kind).iter().copied().collect();
          let present: BTreeSet<u64> = parents
            .iter()
            .filter(|(_, task_id)| *task_id == task.id)
            .map(|(id, _)| *id)
            .collect();
          for id in listed.difference(&present) {
            violations.push(Violation {
              table: "tasks",
              id: task.id,
              problem: format!("lists missing {} {}", kind, id),
            });
          }
          for id in present.difference(&listed) {
            violations.push(Violation {
              table,
              id: *id,
              problem: format!("not listed by task {}", task.id),
            });
          }
        }
        for (id, task_id) in &parents {
          if !tasks.iter().any(|t| t.id == *task_id) {
            violations.push(Violation {
              table,
              id: *id,
              problem: format!("parent task {} not cached", task_id),
            });
          }
        }
      }

      for task in &tasks {
        if let Some(summary) = rows::load_summary(conn, task.id)? {
          if summary != task.summary() {
            violations.push(Violation {
              table: "task_summaries",
              id: task.id,
              problem: "disagrees with task detail".to_string(),
            });
          }
        }
      }

      let messages = rows::all_messages(conn)?;
      let replies = rows::reply_parents(conn)?;
      for message in &messages {
        let listed: BTreeSet<u64> = message.replies.iter().copied().collect();
        let present: BTreeSet<u64> = replies
          .iter()
          .filter(|(_, message_id)| *message_id == message.id)
          .map(|(id, _)| *id)
          .collect();
        if listed != present {
          violations.push(Violation {
            table: "messages",
            id: message.id,
            problem: format!("replies {:?} but rows {:?}", listed, present),
          });
        }
        if let Some(summary) = rows::load_message_summary(conn, message.id)? {
          if summary.title != message.title {
            violations.push(Violation {
              table: "message_summaries",
              id: message.id,
              problem: "title disagrees with message detail".to_string(),
            });
          }
        }
      }
      for (id, message_id) in &replies {
        if !messages.iter().any(|m| m.id == *message_id) {
          violations.push(Violation {
            table: "message_replies",
            id: *id,
            problem: format!("parent message {} not cached", message_id),
          });
        }
      }

      Ok(violations)
    })
  }

  /// Row count of `table`.
  pub fn count(&self, table: &str) -> Result<u64, StoreError> {
    self.read(|conn| {
      conn
        .query_row(&format!("SELECT COUNT(*) FROM {}", table), params![], |row| {
          row.get(0)
        })
        .context(format!("Failed to count {}", table))
    })
  }

  #[cfg(test)]
  pub(crate) fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
    self.read(|conn| conn.execute_batch(sql).context("Failed to run test SQL"))
  }
}

fn task_user_ids(task: &Task, comments: &[Comment], attachments: &[Attachment]) -> BTreeSet<u64> {
  let mut ids: BTreeSet<u64> = task.assignees.iter().copied().collect();
  ids.insert(task.creator_id);
  ids.extend(comments.iter().map(|c| c.author_id));
  ids.extend(attachments.iter().map(|a| a.uploaded_by));
  ids
}

fn load_users(conn: &Connection, ids: BTreeSet<u64>) -> Result<Vec<User>, StoreError> {
  let mut users = Vec::with_capacity(ids.len());
  for id in ids {
    if let Some(user) = rows::load_user(conn, id)? {
      users.push(user);
    }
  }
  Ok(users)
}
