//! Transactional writes that keep parent id-lists, child rows and
//! summary/detail projections consistent.
//!
//! Every public method here is one transaction: it either commits all of its
//! statements or none of them. Nothing else in the crate writes entity rows.

use rusqlite::Connection;
use tracing::debug;

use super::rows;
use super::storage::{EntityStore, MESSAGE_LIST, TASK_LIST};
use super::idlist;
use crate::api::types::{
  ChildKind, MessageBundle, MessageReply, MessageSummary, ProfileData, TaskBundle, TaskChange,
  TaskChild, TaskSummary, User,
};
use crate::error::{SqlContext, StoreError};

impl EntityStore {
  /// Insert or replace users.
  pub fn upsert_users(&self, users: &[User]) -> Result<(), StoreError> {
    self.write("upsert users", |tx| put_users(tx, users))
  }

  /// Insert or replace a profile.
  pub fn upsert_profile(&self, profile: &ProfileData) -> Result<(), StoreError> {
    self.write("upsert profile", |tx| rows::put_profile(tx, profile))
  }

  /// Store the logged-in account's edited profile, and carry the new name
  /// and avatar over to its cached user row.
  pub fn update_own_profile(&self, profile: &ProfileData) -> Result<(), StoreError> {
    self.write("update own profile", |tx| {
      rows::put_profile(tx, profile)?;
      if let Some(mut user) = rows::load_user(tx, profile.user_id)? {
        user.name = profile.name.clone();
        user.avatar = profile.avatar.clone();
        rows::put_user(tx, &user)?;
      }
      Ok(())
    })
  }

  // ==========================================================================
  // Task aggregates
  // ==========================================================================

  /// Insert or replace a whole task aggregate: detail row, summary row,
  /// every child row and every referenced user.
  pub fn bulk_upsert_task(&self, bundle: &TaskBundle) -> Result<(), StoreError> {
    self.write("bulk upsert task", |tx| put_task_bundle(tx, bundle))?;
    debug!(task = bundle.task.id, "task aggregate stored");
    Ok(())
  }

  /// Drop every row of the task and store `bundle` in its place.
  pub fn replace_task(&self, bundle: &TaskBundle) -> Result<(), StoreError> {
    self.write("replace task", |tx| {
      rows::delete_task_rows(tx, bundle.task.id)?;
      put_task_bundle(tx, bundle)
    })?;
    debug!(task = bundle.task.id, "task aggregate replaced");
    Ok(())
  }

  /// Store a fetched task list. With `replace`, previously cached summaries
  /// not in `summaries` are removed. Detail rows of listed tasks take the
  /// incoming shared fields.
  pub fn store_task_summaries(
    &self,
    summaries: &[TaskSummary],
    users: &[User],
    replace: bool,
  ) -> Result<(), StoreError> {
    self.write("store task summaries", |tx| {
      if replace {
        tx.execute_batch("DELETE FROM task_summaries; DELETE FROM task_assignees;")
          .context("Failed to clear task summaries")?;
      }
      put_users(tx, users)?;
      for summary in summaries {
        rows::put_summary(tx, summary)?;
        rows::sync_task_shared_fields(tx, summary)?;
      }
      rows::mark_list(tx, TASK_LIST)
    })?;
    debug!(count = summaries.len(), replace, "task summaries stored");
    Ok(())
  }

  /// Write one shared field to both the summary and the detail row.
  /// Returns the number of rows updated (0, 1 or 2).
  pub fn update_shared_field(&self, task_id: u64, change: &TaskChange) -> Result<usize, StoreError> {
    let updated = self.write("update shared field", |tx| {
      let summary = rows::apply_change(tx, "task_summaries", task_id, change)?;
      let detail = rows::apply_change(tx, "tasks", task_id, change)?;
      Ok(summary + detail)
    })?;
    debug!(task = task_id, field = rows::change_column(change).0, updated, "shared field updated");
    Ok(updated)
  }

  /// Remove a task and everything it owns. Users are kept.
  pub fn delete_task(&self, task_id: u64) -> Result<(), StoreError> {
    self.write("delete task", |tx| rows::delete_task_rows(tx, task_id))?;
    debug!(task = task_id, "task deleted");
    Ok(())
  }

  // ==========================================================================
  // Task children
  // ==========================================================================

  /// Insert `child` and append its id to the parent's id-list.
  ///
  /// Fails without effect if the parent task is not cached or its id-list
  /// cannot be decoded.
  pub fn add_child(&self, task_id: u64, child: &TaskChild, users: &[User]) -> Result<(), StoreError> {
    if child.task_id() != task_id {
      return Err(StoreError::Invalid(format!(
        "{} {} belongs to task {}, not {}",
        child.kind(),
        child.id(),
        child.task_id(),
        task_id
      )));
    }
    self.write("add child", |tx| {
      put_users(tx, users)?;
      link_child(tx, child)
    })?;
    debug!(task = task_id, kind = %child.kind(), child = child.id(), "child added");
    Ok(())
  }

  /// Replace a child row that may or may not be cached yet. The child is
  /// linked only if its parent task is cached. Returns whether it was stored.
  pub fn upsert_child(&self, child: &TaskChild, users: &[User]) -> Result<bool, StoreError> {
    self.write("upsert child", |tx| {
      if rows::read_child_list(tx, child.task_id(), child.kind())?.is_none() {
        return Ok(false);
      }
      put_users(tx, users)?;
      link_child(tx, child)?;
      Ok(true)
    })
  }

  /// Delete a child row and drop its id from the parent's id-list. Removing
  /// an id that is not listed leaves the list alone but still deletes the row.
  pub fn remove_child(&self, task_id: u64, kind: ChildKind, child_id: u64) -> Result<(), StoreError> {
    self.write("remove child", |tx| {
      if let Some(mut ids) = rows::read_child_list(tx, task_id, kind)? {
        if idlist::remove(&mut ids, child_id) {
          rows::write_child_list(tx, task_id, kind, &ids)?;
        }
      }
      rows::delete_child(tx, kind, child_id)?;
      Ok(())
    })?;
    debug!(task = task_id, %kind, child = child_id, "child removed");
    Ok(())
  }

  // ==========================================================================
  // Messages
  // ==========================================================================

  /// Insert or replace a message aggregate. An existing summary row takes
  /// the message title.
  pub fn bulk_upsert_message(&self, bundle: &MessageBundle) -> Result<(), StoreError> {
    self.write("bulk upsert message", |tx| put_message_bundle(tx, bundle))?;
    debug!(message = bundle.message.id, "message aggregate stored");
    Ok(())
  }

  pub fn replace_message(&self, bundle: &MessageBundle) -> Result<(), StoreError> {
    self.write("replace message", |tx| {
      // Keep the summary row: it carries list-only fields a detail fetch lacks.
      let summary = rows::load_message_summary(tx, bundle.message.id)?;
      rows::delete_message_rows(tx, bundle.message.id)?;
      if let Some(summary) = summary {
        rows::put_message_summary(tx, &summary)?;
      }
      put_message_bundle(tx, bundle)
    })?;
    debug!(message = bundle.message.id, "message aggregate replaced");
    Ok(())
  }

  pub fn store_message_summaries(
    &self,
    summaries: &[MessageSummary],
    users: &[User],
    replace: bool,
  ) -> Result<(), StoreError> {
    self.write("store message summaries", |tx| {
      if replace {
        tx.execute("DELETE FROM message_summaries", [])
          .context("Failed to clear message summaries")?;
      }
      put_users(tx, users)?;
      for summary in summaries {
        rows::put_message_summary(tx, summary)?;
        rows::set_message_title(tx, "messages", summary.id, &summary.title)?;
      }
      rows::mark_list(tx, MESSAGE_LIST)
    })?;
    debug!(count = summaries.len(), replace, "message summaries stored");
    Ok(())
  }

  /// Write a conversation title to both the summary and the detail row.
  pub fn update_message_title(&self, message_id: u64, title: &str) -> Result<usize, StoreError> {
    self.write("update message title", |tx| {
      let summary = rows::set_message_title(tx, "message_summaries", message_id, title)?;
      let detail = rows::set_message_title(tx, "messages", message_id, title)?;
      Ok(summary + detail)
    })
  }

  pub fn delete_message(&self, message_id: u64) -> Result<(), StoreError> {
    self.write("delete message", |tx| rows::delete_message_rows(tx, message_id))?;
    debug!(message = message_id, "message deleted");
    Ok(())
  }

  /// Insert a reply and append its id to the message's reply list.
  pub fn add_reply(&self, reply: &MessageReply, users: &[User]) -> Result<(), StoreError> {
    self.write("add reply", |tx| {
      put_users(tx, users)?;
      link_reply(tx, reply)
    })?;
    debug!(message = reply.message_id, reply = reply.id, "reply added");
    Ok(())
  }

  /// Like [`EntityStore::upsert_child`] for replies.
  pub fn upsert_reply(&self, reply: &MessageReply, users: &[User]) -> Result<bool, StoreError> {
    self.write("upsert reply", |tx| {
      if rows::read_reply_list(tx, reply.message_id)?.is_none() {
        return Ok(false);
      }
      put_users(tx, users)?;
      link_reply(tx, reply)?;
      Ok(true)
    })
  }

  pub fn remove_reply(&self, message_id: u64, reply_id: u64) -> Result<(), StoreError> {
    self.write("remove reply", |tx| {
      if let Some(mut ids) = rows::read_reply_list(tx, message_id)? {
        if idlist::remove(&mut ids, reply_id) {
          rows::write_reply_list(tx, message_id, &ids)?;
        }
      }
      rows::delete_reply(tx, reply_id)?;
      Ok(())
    })?;
    debug!(message = message_id, reply = reply_id, "reply removed");
    Ok(())
  }
}

fn put_users(conn: &Connection, users: &[User]) -> Result<(), StoreError> {
  for user in users {
    rows::put_user(conn, user)?;
  }
  Ok(())
}

fn put_task_bundle(conn: &Connection, bundle: &TaskBundle) -> Result<(), StoreError> {
  let task = &bundle.task;
  let counts = [
    (ChildKind::Comment, bundle.comments.len()),
    (ChildKind::Subtask, bundle.subtasks.len()),
    (ChildKind::Checklist, bundle.checklists.len()),
    (ChildKind::Attachment, bundle.attachments.len()),
  ];
  for (kind, count) in counts {
    if task.child_ids(kind).len() != count {
      return Err(StoreError::Invalid(format!(
        "task {} lists {} {} but carries {}",
        task.id,
        task.child_ids(kind).len(),
        kind,
        count
      )));
    }
  }
  let children = bundle
    .comments
    .iter()
    .cloned()
    .map(TaskChild::Comment)
    .chain(bundle.subtasks.iter().cloned().map(TaskChild::Subtask))
    .chain(bundle.checklists.iter().cloned().map(TaskChild::Checklist))
    .chain(bundle.attachments.iter().cloned().map(TaskChild::Attachment));

  // Drop stale child rows the incoming id-lists no longer reference.
  for kind in ChildKind::ALL {
    if let Some(old) = rows::read_child_list(conn, task.id, kind)? {
      for id in old.iter().filter(|id| !task.child_ids(kind).contains(id)) {
        rows::delete_child(conn, kind, *id)?;
      }
    }
  }

  put_users(conn, &bundle.users)?;
  rows::put_task(conn, task)?;
  rows::put_summary(conn, &task.summary())?;
  for child in children {
    if child.task_id() != task.id || !task.child_ids(child.kind()).contains(&child.id()) {
      return Err(StoreError::Invalid(format!(
        "task {} does not list {} {}",
        task.id,
        child.kind(),
        child.id()
      )));
    }
    unlink_from_previous_task(conn, &child)?;
    rows::put_child(conn, &child)?;
  }
  Ok(())
}

/// A stored child row re-parented by an incoming one must leave its old
/// task's id-list in the same transaction.
fn unlink_from_previous_task(conn: &Connection, child: &TaskChild) -> Result<(), StoreError> {
  let Some(existing) = rows::load_child(conn, child.kind(), child.id())? else {
    return Ok(());
  };
  let previous = existing.task_id();
  if previous == child.task_id() {
    return Ok(());
  }
  if let Some(mut ids) = rows::read_child_list(conn, previous, child.kind())? {
    if idlist::remove(&mut ids, child.id()) {
      rows::write_child_list(conn, previous, child.kind(), &ids)?;
    }
  }
  debug!(kind = %child.kind(), child = child.id(), from = previous, to = child.task_id(), "child moved");
  Ok(())
}

fn link_child(conn: &Connection, child: &TaskChild) -> Result<(), StoreError> {
  let (task_id, kind) = (child.task_id(), child.kind());
  unlink_from_previous_task(conn, child)?;
  rows::put_child(conn, child)?;
  let mut ids = rows::read_child_list(conn, task_id, kind)?
    .ok_or_else(|| StoreError::Invalid(format!("task {} is not cached", task_id)))?;
  if idlist::insert(&mut ids, child.id()) {
    rows::write_child_list(conn, task_id, kind, &ids)?;
  }
  Ok(())
}

fn put_message_bundle(conn: &Connection, bundle: &MessageBundle) -> Result<(), StoreError> {
  let message = &bundle.message;
  if message.replies.len() != bundle.replies.len() {
    return Err(StoreError::Invalid(format!(
      "message {} lists {} replies but carries {}",
      message.id,
      message.replies.len(),
      bundle.replies.len()
    )));
  }
  if let Some(old) = rows::read_reply_list(conn, message.id)? {
    for id in old.iter().filter(|id| !message.replies.contains(id)) {
      rows::delete_reply(conn, *id)?;
    }
  }
  put_users(conn, &bundle.users)?;
  rows::put_message(conn, message)?;
  rows::set_message_title(conn, "message_summaries", message.id, &message.title)?;
  for reply in &bundle.replies {
    if reply.message_id != message.id || !message.replies.contains(&reply.id) {
      return Err(StoreError::Invalid(format!(
        "message {} does not list reply {}",
        message.id, reply.id
      )));
    }
    unlink_from_previous_message(conn, reply)?;
    rows::put_reply(conn, reply)?;
  }
  Ok(())
}

fn unlink_from_previous_message(conn: &Connection, reply: &MessageReply) -> Result<(), StoreError> {
  let Some(existing) = rows::load_reply(conn, reply.id)? else {
    return Ok(());
  };
  let previous = existing.message_id;
  if previous == reply.message_id {
    return Ok(());
  }
  if let Some(mut ids) = rows::read_reply_list(conn, previous)? {
    if idlist::remove(&mut ids, reply.id) {
      rows::write_reply_list(conn, previous, &ids)?;
    }
  }
  debug!(reply = reply.id, from = previous, to = reply.message_id, "reply moved");
  Ok(())
}

fn link_reply(conn: &Connection, reply: &MessageReply) -> Result<(), StoreError> {
  unlink_from_previous_message(conn, reply)?;
  rows::put_reply(conn, reply)?;
  let mut ids = rows::read_reply_list(conn, reply.message_id)?
    .ok_or_else(|| StoreError::Invalid(format!("message {} is not cached", reply.message_id)))?;
  if idlist::insert(&mut ids, reply.id) {
    rows::write_reply_list(conn, reply.message_id, &ids)?;
  }
  Ok(())
}
