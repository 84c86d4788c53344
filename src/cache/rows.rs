//! Row mapping and single-statement SQL for the entity tables.
//!
//! Nothing here opens a transaction. Callers in `storage` and `relations`
//! decide the transaction boundaries.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::str::FromStr;

use super::idlist;
use crate::api::types::{
  Attachment, ChecklistItem, ChildKind, Comment, Message, MessageReply, MessageSummary,
  ProfileData, Subtask, Task, TaskChange, TaskChild, TaskSummary, User,
};
use crate::error::{SqlContext, StoreError};

pub(super) fn fmt_time(t: &DateTime<Utc>) -> String {
  t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn conversion_err(idx: usize, msg: impl std::fmt::Display) -> rusqlite::Error {
  rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, msg.to_string().into())
}

fn enum_col<T: FromStr<Err = String>>(row: &Row, idx: usize) -> rusqlite::Result<T> {
  let s: String = row.get(idx)?;
  s.parse::<T>().map_err(|e| conversion_err(idx, e))
}

fn time_col(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
  let s: String = row.get(idx)?;
  DateTime::parse_from_rfc3339(&s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| conversion_err(idx, e))
}

fn opt_time_col(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
  let s: Option<String> = row.get(idx)?;
  s.map(|s| {
    DateTime::parse_from_rfc3339(&s)
      .map(|dt| dt.with_timezone(&Utc))
      .map_err(|e| conversion_err(idx, e))
  })
  .transpose()
}

fn ids_col(row: &Row, idx: usize) -> rusqlite::Result<Vec<u64>> {
  let s: String = row.get(idx)?;
  idlist::decode(&s).map_err(|e| conversion_err(idx, e))
}

// ============================================================================
// Users and profiles
// ============================================================================

pub(super) fn put_user(conn: &Connection, user: &User) -> Result<(), StoreError> {
  conn
    .execute(
      "INSERT OR REPLACE INTO users (id, name, avatar) VALUES (?1, ?2, ?3)",
      params![user.id, user.name, user.avatar],
    )
    .context(format!("Failed to store user {}", user.id))?;
  Ok(())
}

pub(super) fn load_user(conn: &Connection, id: u64) -> Result<Option<User>, StoreError> {
  conn
    .query_row(
      "SELECT id, name, avatar FROM users WHERE id = ?1",
      params![id],
      |row| {
        Ok(User {
          id: row.get(0)?,
          name: row.get(1)?,
          avatar: row.get(2)?,
        })
      },
    )
    .optional()
    .context(format!("Failed to load user {}", id))
}

pub(super) fn put_profile(conn: &Connection, profile: &ProfileData) -> Result<(), StoreError> {
  conn
    .execute(
      "INSERT OR REPLACE INTO profiles (user_id, name, email, phone, job_title, avatar)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
      params![
        profile.user_id,
        profile.name,
        profile.email,
        profile.phone,
        profile.job_title,
        profile.avatar
      ],
    )
    .context(format!("Failed to store profile {}", profile.user_id))?;
  Ok(())
}

pub(super) fn load_profile(conn: &Connection, user_id: u64) -> Result<Option<ProfileData>, StoreError> {
  conn
    .query_row(
      "SELECT user_id, name, email, phone, job_title, avatar FROM profiles WHERE user_id = ?1",
      params![user_id],
      |row| {
        Ok(ProfileData {
          user_id: row.get(0)?,
          name: row.get(1)?,
          email: row.get(2)?,
          phone: row.get(3)?,
          job_title: row.get(4)?,
          avatar: row.get(5)?,
        })
      },
    )
    .optional()
    .context(format!("Failed to load profile {}", user_id))
}

// ============================================================================
// Tasks
// ============================================================================

const SUMMARY_COLUMNS: &str =
  "id, title, description, due, priority, status, task_type, assignees, creator_id";

const TASK_COLUMNS: &str = "id, title, description, due, priority, status, task_type, assignees, \
   creator_id, sent_date, comments, subtasks, checklists, attachments";

fn summary_from_row(row: &Row) -> rusqlite::Result<TaskSummary> {
  Ok(TaskSummary {
    id: row.get(0)?,
    title: row.get(1)?,
    description: row.get(2)?,
    due: opt_time_col(row, 3)?,
    priority: enum_col(row, 4)?,
    status: enum_col(row, 5)?,
    task_type: enum_col(row, 6)?,
    assignees: ids_col(row, 7)?,
    creator_id: row.get(8)?,
  })
}

fn task_from_row(row: &Row) -> rusqlite::Result<Task> {
  Ok(Task {
    id: row.get(0)?,
    title: row.get(1)?,
    description: row.get(2)?,
    due: opt_time_col(row, 3)?,
    priority: enum_col(row, 4)?,
    status: enum_col(row, 5)?,
    task_type: enum_col(row, 6)?,
    assignees: ids_col(row, 7)?,
    creator_id: row.get(8)?,
    sent_date: time_col(row, 9)?,
    comments: ids_col(row, 10)?,
    subtasks: ids_col(row, 11)?,
    checklists: ids_col(row, 12)?,
    attachments: ids_col(row, 13)?,
  })
}

pub(super) fn load_summary(conn: &Connection, id: u64) -> Result<Option<TaskSummary>, StoreError> {
  conn
    .query_row(
      &format!("SELECT {} FROM task_summaries WHERE id = ?1", SUMMARY_COLUMNS),
      params![id],
      summary_from_row,
    )
    .optional()
    .context(format!("Failed to load task summary {}", id))
}

/// Summaries matching an optional `WHERE` clause, ordered by due date then id.
pub(super) fn query_summaries(
  conn: &Connection,
  filter: &str,
  args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<TaskSummary>, StoreError> {
  let sql = format!(
    "SELECT {} FROM task_summaries ts {} ORDER BY ts.due IS NULL, ts.due, ts.id",
    SUMMARY_COLUMNS
      .split(", ")
      .map(|c| format!("ts.{}", c))
      .collect::<Vec<_>>()
      .join(", "),
    filter
  );
  let mut stmt = conn
    .prepare(&sql)
    .context("Failed to prepare task summary query")?;
  let rows = stmt
    .query_map(args, summary_from_row)
    .context("Failed to query task summaries")?;
  rows
    .collect::<rusqlite::Result<Vec<_>>>()
    .context("Failed to read task summary")
}

pub(super) fn load_task(conn: &Connection, id: u64) -> Result<Option<Task>, StoreError> {
  conn
    .query_row(
      &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
      params![id],
      task_from_row,
    )
    .optional()
    .context(format!("Failed to load task {}", id))
}

pub(super) fn all_tasks(conn: &Connection) -> Result<Vec<Task>, StoreError> {
  let mut stmt = conn
    .prepare(&format!("SELECT {} FROM tasks ORDER BY id", TASK_COLUMNS))
    .context("Failed to prepare task query")?;
  let rows = stmt.query_map([], task_from_row).context("Failed to query tasks")?;
  rows
    .collect::<rusqlite::Result<Vec<_>>>()
    .context("Failed to read task")
}

pub(super) fn put_summary(conn: &Connection, summary: &TaskSummary) -> Result<(), StoreError> {
  conn
    .execute(
      &format!(
        "INSERT OR REPLACE INTO task_summaries ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        SUMMARY_COLUMNS
      ),
      params![
        summary.id,
        summary.title,
        summary.description,
        summary.due.as_ref().map(fmt_time),
        summary.priority.as_str(),
        summary.status.as_str(),
        summary.task_type.as_str(),
        idlist::encode(&summary.assignees),
        summary.creator_id
      ],
    )
    .context(format!("Failed to store task summary {}", summary.id))?;
  put_assignees(conn, summary.id, &summary.assignees)
}

pub(super) fn put_task(conn: &Connection, task: &Task) -> Result<(), StoreError> {
  conn
    .execute(
      &format!(
        "INSERT OR REPLACE INTO tasks ({})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        TASK_COLUMNS
      ),
      params![
        task.id,
        task.title,
        task.description,
        task.due.as_ref().map(fmt_time),
        task.priority.as_str(),
        task.status.as_str(),
        task.task_type.as_str(),
        idlist::encode(&task.assignees),
        task.creator_id,
        fmt_time(&task.sent_date),
        idlist::encode(&task.comments),
        idlist::encode(&task.subtasks),
        idlist::encode(&task.checklists),
        idlist::encode(&task.attachments)
      ],
    )
    .context(format!("Failed to store task {}", task.id))?;
  Ok(())
}

/// Rewrite the fields a detail row shares with `summary`, if the detail row exists.
pub(super) fn sync_task_shared_fields(
  conn: &Connection,
  summary: &TaskSummary,
) -> Result<(), StoreError> {
  conn
    .execute(
      "UPDATE tasks SET title = ?1, description = ?2, due = ?3, priority = ?4, status = ?5,
       task_type = ?6, assignees = ?7, creator_id = ?8 WHERE id = ?9",
      params![
        summary.title,
        summary.description,
        summary.due.as_ref().map(fmt_time),
        summary.priority.as_str(),
        summary.status.as_str(),
        summary.task_type.as_str(),
        idlist::encode(&summary.assignees),
        summary.creator_id,
        summary.id
      ],
    )
    .context(format!("Failed to sync task {}", summary.id))?;
  Ok(())
}

fn put_assignees(conn: &Connection, task_id: u64, assignees: &[u64]) -> Result<(), StoreError> {
  conn
    .execute("DELETE FROM task_assignees WHERE task_id = ?1", params![task_id])
    .context(format!("Failed to clear assignees of task {}", task_id))?;
  for (position, user_id) in assignees.iter().enumerate() {
    conn
      .execute(
        "INSERT OR REPLACE INTO task_assignees (task_id, user_id, position) VALUES (?1, ?2, ?3)",
        params![task_id, user_id, position],
      )
      .context(format!("Failed to store assignee of task {}", task_id))?;
  }
  Ok(())
}

/// Column name and SQL value for a shared-field change.
pub(super) fn change_column(change: &TaskChange) -> (&'static str, Value) {
  fn opt_text(s: Option<String>) -> Value {
    s.map(Value::Text).unwrap_or(Value::Null)
  }
  match change {
    TaskChange::Title(title) => ("title", Value::Text(title.clone())),
    TaskChange::Description(description) => ("description", opt_text(description.clone())),
    TaskChange::Due(due) => ("due", opt_text(due.as_ref().map(fmt_time))),
    TaskChange::Priority(p) => ("priority", Value::Text(p.as_str().to_string())),
    TaskChange::Status(s) => ("status", Value::Text(s.as_str().to_string())),
    TaskChange::Type(t) => ("task_type", Value::Text(t.as_str().to_string())),
    TaskChange::Assignees(ids) => ("assignees", Value::Text(idlist::encode(ids))),
  }
}

/// Apply `change` to one of the two task tables. Returns rows affected.
pub(super) fn apply_change(
  conn: &Connection,
  table: &str,
  task_id: u64,
  change: &TaskChange,
) -> Result<usize, StoreError> {
  let (column, value) = change_column(change);
  let updated = conn
    .execute(
      &format!("UPDATE {} SET {} = ?1 WHERE id = ?2", table, column),
      params![value, task_id],
    )
    .context(format!("Failed to update {} of {} {}", column, table, task_id))?;
  if let (TaskChange::Assignees(ids), "task_summaries", 1) = (change, table, updated) {
    put_assignees(conn, task_id, ids)?;
  }
  Ok(updated)
}

pub(super) fn write_child_list(
  conn: &Connection,
  task_id: u64,
  kind: ChildKind,
  ids: &[u64],
) -> Result<usize, StoreError> {
  conn
    .execute(
      &format!("UPDATE tasks SET {} = ?1 WHERE id = ?2", kind.as_str()),
      params![idlist::encode(ids), task_id],
    )
    .context(format!("Failed to update {} of task {}", kind, task_id))
}

/// Read one id-list of a task, decoding strictly.
pub(super) fn read_child_list(
  conn: &Connection,
  task_id: u64,
  kind: ChildKind,
) -> Result<Option<Vec<u64>>, StoreError> {
  let raw: Option<String> = conn
    .query_row(
      &format!("SELECT {} FROM tasks WHERE id = ?1", kind.as_str()),
      params![task_id],
      |row| row.get(0),
    )
    .optional()
    .context(format!("Failed to read {} of task {}", kind, task_id))?;
  raw.map(|s| idlist::decode(&s)).transpose()
}

/// Delete the task, its summary, its children and its assignee links.
pub(super) fn delete_task_rows(conn: &Connection, task_id: u64) -> Result<(), StoreError> {
  for kind in ChildKind::ALL {
    conn
      .execute(
        &format!("DELETE FROM {} WHERE task_id = ?1", kind.as_str()),
        params![task_id],
      )
      .context(format!("Failed to delete {} of task {}", kind, task_id))?;
  }
  for sql in [
    "DELETE FROM task_assignees WHERE task_id = ?1",
    "DELETE FROM tasks WHERE id = ?1",
    "DELETE FROM task_summaries WHERE id = ?1",
  ] {
    conn
      .execute(sql, params![task_id])
      .context(format!("Failed to delete task {}", task_id))?;
  }
  Ok(())
}

// ============================================================================
// Task children
// ============================================================================

fn child_columns(kind: ChildKind) -> &'static str {
  match kind {
    ChildKind::Comment => "id, task_id, author_id, body, created_at",
    ChildKind::Subtask => "id, task_id, title, done",
    ChildKind::Checklist => "id, task_id, title, checked",
    ChildKind::Attachment => "id, task_id, file_name, url, uploaded_by",
  }
}

fn child_from_row(kind: ChildKind, row: &Row) -> rusqlite::Result<TaskChild> {
  Ok(match kind {
    ChildKind::Comment => TaskChild::Comment(Comment {
      id: row.get(0)?,
      task_id: row.get(1)?,
      author_id: row.get(2)?,
      body: row.get(3)?,
      created_at: time_col(row, 4)?,
    }),
    ChildKind::Subtask => TaskChild::Subtask(Subtask {
      id: row.get(0)?,
      task_id: row.get(1)?,
      title: row.get(2)?,
      done: row.get(3)?,
    }),
    ChildKind::Checklist => TaskChild::Checklist(ChecklistItem {
      id: row.get(0)?,
      task_id: row.get(1)?,
      title: row.get(2)?,
      checked: row.get(3)?,
    }),
    ChildKind::Attachment => TaskChild::Attachment(Attachment {
      id: row.get(0)?,
      task_id: row.get(1)?,
      file_name: row.get(2)?,
      url: row.get(3)?,
      uploaded_by: row.get(4)?,
    }),
  })
}

pub(super) fn put_child(conn: &Connection, child: &TaskChild) -> Result<(), StoreError> {
  let kind = child.kind();
  let sql = match kind {
    ChildKind::Comment | ChildKind::Attachment => format!(
      "INSERT OR REPLACE INTO {} ({}) VALUES (?1, ?2, ?3, ?4, ?5)",
      kind.as_str(),
      child_columns(kind)
    ),
    ChildKind::Subtask | ChildKind::Checklist => format!(
      "INSERT OR REPLACE INTO {} ({}) VALUES (?1, ?2, ?3, ?4)",
      kind.as_str(),
      child_columns(kind)
    ),
  };
  let result = match child {
    TaskChild::Comment(c) => conn.execute(
      &sql,
      params![c.id, c.task_id, c.author_id, c.body, fmt_time(&c.created_at)],
    ),
    TaskChild::Subtask(s) => conn.execute(&sql, params![s.id, s.task_id, s.title, s.done]),
    TaskChild::Checklist(c) => conn.execute(&sql, params![c.id, c.task_id, c.title, c.checked]),
    TaskChild::Attachment(a) => conn.execute(
      &sql,
      params![a.id, a.task_id, a.file_name, a.url, a.uploaded_by],
    ),
  };
  result.context(format!("Failed to store {} {}", kind, child.id()))?;
  Ok(())
}

pub(super) fn load_child(
  conn: &Connection,
  kind: ChildKind,
  id: u64,
) -> Result<Option<TaskChild>, StoreError> {
  conn
    .query_row(
      &format!(
        "SELECT {} FROM {} WHERE id = ?1",
        child_columns(kind),
        kind.as_str()
      ),
      params![id],
      |row| child_from_row(kind, row),
    )
    .optional()
    .context(format!("Failed to load {} {}", kind, id))
}

/// `(id, task_id)` of every child row of `kind`.
pub(super) fn child_parents(conn: &Connection, kind: ChildKind) -> Result<Vec<(u64, u64)>, StoreError> {
  let mut stmt = conn
    .prepare(&format!("SELECT id, task_id FROM {} ORDER BY id", kind.as_str()))
    .context(format!("Failed to prepare {} query", kind))?;
  let rows = stmt
    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
    .context(format!("Failed to query {}", kind))?;
  rows
    .collect::<rusqlite::Result<Vec<_>>>()
    .context(format!("Failed to read {}", kind))
}

pub(super) fn delete_child(conn: &Connection, kind: ChildKind, id: u64) -> Result<usize, StoreError> {
  conn
    .execute(
      &format!("DELETE FROM {} WHERE id = ?1", kind.as_str()),
      params![id],
    )
    .context(format!("Failed to delete {} {}", kind, id))
}

// ============================================================================
// Messages
// ============================================================================

fn message_summary_from_row(row: &Row) -> rusqlite::Result<MessageSummary> {
  Ok(MessageSummary {
    id: row.get(0)?,
    title: row.get(1)?,
    preview: row.get(2)?,
    sender_id: row.get(3)?,
    sent_date: time_col(row, 4)?,
    participants: ids_col(row, 5)?,
  })
}

fn message_from_row(row: &Row) -> rusqlite::Result<Message> {
  Ok(Message {
    id: row.get(0)?,
    title: row.get(1)?,
    body: row.get(2)?,
    sender_id: row.get(3)?,
    sent_date: time_col(row, 4)?,
    participants: ids_col(row, 5)?,
    replies: ids_col(row, 6)?,
  })
}

fn reply_from_row(row: &Row) -> rusqlite::Result<MessageReply> {
  Ok(MessageReply {
    id: row.get(0)?,
    message_id: row.get(1)?,
    sender_id: row.get(2)?,
    body: row.get(3)?,
    sent_date: time_col(row, 4)?,
  })
}

pub(super) fn put_message_summary(conn: &Connection, m: &MessageSummary) -> Result<(), StoreError> {
  conn
    .execute(
      "INSERT OR REPLACE INTO message_summaries (id, title, preview, sender_id, sent_date, participants)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
      params![
        m.id,
        m.title,
        m.preview,
        m.sender_id,
        fmt_time(&m.sent_date),
        idlist::encode(&m.participants)
      ],
    )
    .context(format!("Failed to store message summary {}", m.id))?;
  Ok(())
}

pub(super) fn load_message_summaries(conn: &Connection) -> Result<Vec<MessageSummary>, StoreError> {
  let mut stmt = conn
    .prepare(
      "SELECT id, title, preview, sender_id, sent_date, participants FROM message_summaries
       ORDER BY sent_date DESC, id",
    )
    .context("Failed to prepare message summary query")?;
  let rows = stmt
    .query_map([], message_summary_from_row)
    .context("Failed to query message summaries")?;
  rows
    .collect::<rusqlite::Result<Vec<_>>>()
    .context("Failed to read message summary")
}

pub(super) fn load_message_summary(
  conn: &Connection,
  id: u64,
) -> Result<Option<MessageSummary>, StoreError> {
  conn
    .query_row(
      "SELECT id, title, preview, sender_id, sent_date, participants FROM message_summaries
       WHERE id = ?1",
      params![id],
      message_summary_from_row,
    )
    .optional()
    .context(format!("Failed to load message summary {}", id))
}

pub(super) fn put_message(conn: &Connection, m: &Message) -> Result<(), StoreError> {
  conn
    .execute(
      "INSERT OR REPLACE INTO messages (id, title, body, sender_id, sent_date, participants, replies)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      params![
        m.id,
        m.title,
        m.body,
        m.sender_id,
        fmt_time(&m.sent_date),
        idlist::encode(&m.participants),
        idlist::encode(&m.replies)
      ],
    )
    .context(format!("Failed to store message {}", m.id))?;
  Ok(())
}

pub(super) fn load_message(conn: &Connection, id: u64) -> Result<Option<Message>, StoreError> {
  conn
    .query_row(
      "SELECT id, title, body, sender_id, sent_date, participants, replies FROM messages
       WHERE id = ?1",
      params![id],
      message_from_row,
    )
    .optional()
    .context(format!("Failed to load message {}", id))
}

pub(super) fn all_messages(conn: &Connection) -> Result<Vec<Message>, StoreError> {
  let mut stmt = conn
    .prepare(
      "SELECT id, title, body, sender_id, sent_date, participants, replies FROM messages
       ORDER BY id",
    )
    .context("Failed to prepare message query")?;
  let rows = stmt
    .query_map([], message_from_row)
    .context("Failed to query messages")?;
  rows
    .collect::<rusqlite::Result<Vec<_>>>()
    .context("Failed to read message")
}

pub(super) fn set_message_title(
  conn: &Connection,
  table: &str,
  id: u64,
  title: &str,
) -> Result<usize, StoreError> {
  conn
    .execute(
      &format!("UPDATE {} SET title = ?1 WHERE id = ?2", table),
      params![title, id],
    )
    .context(format!("Failed to update title of {} {}", table, id))
}

pub(super) fn read_reply_list(conn: &Connection, message_id: u64) -> Result<Option<Vec<u64>>, StoreError> {
  let raw: Option<String> = conn
    .query_row(
      "SELECT replies FROM messages WHERE id = ?1",
      params![message_id],
      |row| row.get(0),
    )
    .optional()
    .context(format!("Failed to read replies of message {}", message_id))?;
  raw.map(|s| idlist::decode(&s)).transpose()
}

pub(super) fn write_reply_list(conn: &Connection, message_id: u64, ids: &[u64]) -> Result<usize, StoreError> {
  conn
    .execute(
      "UPDATE messages SET replies = ?1 WHERE id = ?2",
      params![idlist::encode(ids), message_id],
    )
    .context(format!("Failed to update replies of message {}", message_id))
}

pub(super) fn put_reply(conn: &Connection, r: &MessageReply) -> Result<(), StoreError> {
  conn
    .execute(
      "INSERT OR REPLACE INTO message_replies (id, message_id, sender_id, body, sent_date)
       VALUES (?1, ?2, ?3, ?4, ?5)",
      params![r.id, r.message_id, r.sender_id, r.body, fmt_time(&r.sent_date)],
    )
    .context(format!("Failed to store reply {}", r.id))?;
  Ok(())
}

pub(super) fn load_reply(conn: &Connection, id: u64) -> Result<Option<MessageReply>, StoreError> {
  conn
    .query_row(
      "SELECT id, message_id, sender_id, body, sent_date FROM message_replies WHERE id = ?1",
      params![id],
      reply_from_row,
    )
    .optional()
    .context(format!("Failed to load reply {}", id))
}

pub(super) fn reply_parents(conn: &Connection) -> Result<Vec<(u64, u64)>, StoreError> {
  let mut stmt = conn
    .prepare("SELECT id, message_id FROM message_replies ORDER BY id")
    .context("Failed to prepare reply query")?;
  let rows = stmt
    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
    .context("Failed to query replies")?;
  rows
    .collect::<rusqlite::Result<Vec<_>>>()
    .context("Failed to read reply")
}

pub(super) fn delete_reply(conn: &Connection, id: u64) -> Result<usize, StoreError> {
  conn
    .execute("DELETE FROM message_replies WHERE id = ?1", params![id])
    .context(format!("Failed to delete reply {}", id))
}

pub(super) fn delete_message_rows(conn: &Connection, message_id: u64) -> Result<(), StoreError> {
  for sql in [
    "DELETE FROM message_replies WHERE message_id = ?1",
    "DELETE FROM messages WHERE id = ?1",
    "DELETE FROM message_summaries WHERE id = ?1",
  ] {
    conn
      .execute(sql, params![message_id])
      .context(format!("Failed to delete message {}", message_id))?;
  }
  Ok(())
}

// ============================================================================
// List markers
// ============================================================================

pub(super) fn mark_list(conn: &Connection, key: &str) -> Result<(), StoreError> {
  conn
    .execute(
      "INSERT OR REPLACE INTO list_cache (list_key, cached_at) VALUES (?1, datetime('now'))",
      params![key],
    )
    .context(format!("Failed to mark list {}", key))?;
  Ok(())
}

pub(super) fn list_is_cached(conn: &Connection, key: &str) -> Result<bool, StoreError> {
  let found: Option<i64> = conn
    .query_row(
      "SELECT 1 FROM list_cache WHERE list_key = ?1",
      params![key],
      |row| row.get(0),
    )
    .optional()
    .context(format!("Failed to check list {}", key))?;
  Ok(found.is_some())
}
