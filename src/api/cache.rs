//! Caching implementations for domain types.

use crate::cache::{Cacheable, EntityStore};
use crate::error::StoreError;

use super::types::{
  ChildEnvelope, ChildKind, MessageBundle, MessageId, MessageList, ProfileData, ReplyEnvelope,
  TaskBundle, TaskChild, TaskId, TaskList, User, UserId,
};

// ============================================================================
// Tasks
// ============================================================================

impl Cacheable for TaskBundle {
  type Key = TaskId;

  fn entity_type() -> &'static str {
    "task"
  }

  fn load(store: &EntityStore, key: TaskId) -> Result<Option<Self>, StoreError> {
    store.task_bundle(key)
  }

  fn save(&self, store: &EntityStore) -> Result<(), StoreError> {
    store.replace_task(self)
  }
}

impl Cacheable for TaskList {
  type Key = ();

  fn entity_type() -> &'static str {
    "task_list"
  }

  fn load(store: &EntityStore, _: ()) -> Result<Option<Self>, StoreError> {
    let Some(tasks) = store.task_summaries()? else {
      return Ok(None);
    };
    let users = store.users(
      tasks
        .iter()
        .flat_map(|t| t.assignees.iter().copied().chain([t.creator_id])),
    )?;
    Ok(Some(TaskList { tasks, users }))
  }

  fn save(&self, store: &EntityStore) -> Result<(), StoreError> {
    store.store_task_summaries(&self.tasks, &self.users, true)
  }
}

/// A single child is only stored when its parent task is cached; otherwise
/// it is handed back without touching the store.
impl Cacheable for ChildEnvelope {
  type Key = (ChildKind, u64);

  fn entity_type() -> &'static str {
    "task_child"
  }

  fn load(store: &EntityStore, (kind, id): (ChildKind, u64)) -> Result<Option<Self>, StoreError> {
    let Some(child) = store.child(kind, id)? else {
      return Ok(None);
    };
    let users = match &child {
      TaskChild::Comment(c) => store.users([c.author_id])?,
      TaskChild::Attachment(a) => store.users([a.uploaded_by])?,
      _ => Vec::new(),
    };
    Ok(Some(ChildEnvelope { child, users }))
  }

  fn save(&self, store: &EntityStore) -> Result<(), StoreError> {
    store.upsert_child(&self.child, &self.users).map(|_| ())
  }
}

// ============================================================================
// Messages
// ============================================================================

impl Cacheable for MessageBundle {
  type Key = MessageId;

  fn entity_type() -> &'static str {
    "message"
  }

  fn load(store: &EntityStore, key: MessageId) -> Result<Option<Self>, StoreError> {
    store.message_bundle(key)
  }

  fn save(&self, store: &EntityStore) -> Result<(), StoreError> {
    store.replace_message(self)
  }
}

impl Cacheable for MessageList {
  type Key = ();

  fn entity_type() -> &'static str {
    "message_list"
  }

  fn load(store: &EntityStore, _: ()) -> Result<Option<Self>, StoreError> {
    let Some(messages) = store.message_summaries()? else {
      return Ok(None);
    };
    let users = store.users(
      messages
        .iter()
        .flat_map(|m| m.participants.iter().copied().chain([m.sender_id])),
    )?;
    Ok(Some(MessageList { messages, users }))
  }

  fn save(&self, store: &EntityStore) -> Result<(), StoreError> {
    store.store_message_summaries(&self.messages, &self.users, true)
  }
}

impl Cacheable for ReplyEnvelope {
  type Key = u64;

  fn entity_type() -> &'static str {
    "reply"
  }

  fn load(store: &EntityStore, key: u64) -> Result<Option<Self>, StoreError> {
    let Some(reply) = store.reply(key)? else {
      return Ok(None);
    };
    let users = store.users([reply.sender_id])?;
    Ok(Some(ReplyEnvelope { reply, users }))
  }

  fn save(&self, store: &EntityStore) -> Result<(), StoreError> {
    store.upsert_reply(&self.reply, &self.users).map(|_| ())
  }
}

// ============================================================================
// Users
// ============================================================================

impl Cacheable for User {
  type Key = UserId;

  fn entity_type() -> &'static str {
    "user"
  }

  fn load(store: &EntityStore, key: UserId) -> Result<Option<Self>, StoreError> {
    store.user(key)
  }

  fn save(&self, store: &EntityStore) -> Result<(), StoreError> {
    store.upsert_users(std::slice::from_ref(self))
  }
}

impl Cacheable for ProfileData {
  type Key = UserId;

  fn entity_type() -> &'static str {
    "profile"
  }

  fn load(store: &EntityStore, key: UserId) -> Result<Option<Self>, StoreError> {
    store.profile(key)
  }

  fn save(&self, store: &EntityStore) -> Result<(), StoreError> {
    store.upsert_profile(self)
  }
}
