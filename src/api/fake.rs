//! In-memory `RemoteSource` for tests.
//!
//! Keeps a small server-side model, records every endpoint call by name and
//! can be scripted to fail any endpoint or to delay every call.

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use super::source::RemoteSource;
use super::types::*;
use crate::auth::token::test_token;
use crate::error::{ApiResult, ClientErrorKind, RemoteError};

#[derive(Default)]
struct FakeState {
  log: Vec<&'static str>,
  failures: HashMap<&'static str, RemoteError>,
  delay: Option<std::time::Duration>,
  next_id: u64,
  tasks: BTreeMap<u64, TaskBundle>,
  messages: BTreeMap<u64, MessageBundle>,
  message_summaries: BTreeMap<u64, MessageSummary>,
  users: BTreeMap<u64, User>,
  profiles: BTreeMap<u64, ProfileData>,
}

pub(crate) struct FakeRemote {
  state: Mutex<FakeState>,
}

fn not_found(what: impl std::fmt::Display) -> RemoteError {
  RemoteError::Client {
    kind: ClientErrorKind::NotFound,
    message: format!("{} not found", what),
  }
}

impl FakeRemote {
  pub(crate) fn new() -> Self {
    Self {
      state: Mutex::new(FakeState {
        next_id: 1000,
        ..Default::default()
      }),
    }
  }

  fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
    self.state.lock().unwrap()
  }

  /// Record a call that did not go through an endpoint.
  pub(crate) fn record(&self, name: &'static str) {
    self.state().log.push(name);
  }

  pub(crate) fn calls(&self, name: &str) -> usize {
    self.state().log.iter().filter(|n| **n == name).count()
  }

  pub(crate) fn log(&self) -> Vec<&'static str> {
    self.state().log.clone()
  }

  pub(crate) fn fail(&self, name: &'static str, err: RemoteError) {
    self.state().failures.insert(name, err);
  }

  pub(crate) fn recover(&self, name: &'static str) {
    self.state().failures.remove(name);
  }

  pub(crate) fn set_delay(&self, delay: std::time::Duration) {
    self.state().delay = Some(delay);
  }

  pub(crate) fn seed_user(&self, user: User) {
    self.state().users.insert(user.id, user);
  }

  pub(crate) fn seed_task(&self, bundle: TaskBundle) {
    let mut state = self.state();
    for user in &bundle.users {
      state.users.insert(user.id, user.clone());
    }
    state.tasks.insert(bundle.task.id, bundle);
  }

  pub(crate) fn seed_message(&self, bundle: MessageBundle) {
    let mut state = self.state();
    for user in &bundle.users {
      state.users.insert(user.id, user.clone());
    }
    let m = &bundle.message;
    let summary = MessageSummary {
      id: m.id,
      title: m.title.clone(),
      preview: m.body.clone(),
      sender_id: m.sender_id,
      sent_date: m.sent_date,
      participants: m.participants.clone(),
    };
    state.message_summaries.insert(m.id, summary);
    state.messages.insert(m.id, bundle);
  }

  pub(crate) fn seed_profile(&self, profile: ProfileData) {
    self.state().profiles.insert(profile.user_id, profile);
  }

  /// Server-side view of a task.
  pub(crate) fn task(&self, id: u64) -> Option<TaskBundle> {
    self.state().tasks.get(&id).cloned()
  }

  /// Log the call, then fail it if scripted to, then wait out any delay.
  async fn begin(&self, name: &'static str) -> ApiResult<()> {
    let delay = {
      let mut state = self.state();
      state.log.push(name);
      if let Some(err) = state.failures.get(name) {
        return Err(err.clone());
      }
      state.delay
    };
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }
    Ok(())
  }

  fn users(state: &FakeState, ids: impl IntoIterator<Item = u64>) -> Vec<User> {
    let mut out: BTreeMap<u64, User> = BTreeMap::new();
    for id in ids {
      if let Some(user) = state.users.get(&id) {
        out.insert(id, user.clone());
      }
    }
    out.into_values().collect()
  }

  fn child_envelope(state: &FakeState, child: TaskChild) -> ChildEnvelope {
    let referenced = match &child {
      TaskChild::Comment(c) => vec![c.author_id],
      TaskChild::Attachment(a) => vec![a.uploaded_by],
      _ => vec![],
    };
    ChildEnvelope {
      users: Self::users(state, referenced),
      child,
    }
  }

  fn find_child(state: &FakeState, kind: ChildKind, id: u64) -> Option<TaskChild> {
    state.tasks.values().find_map(|b| match kind {
      ChildKind::Comment => b
        .comments
        .iter()
        .find(|c| c.id == id)
        .cloned()
        .map(TaskChild::Comment),
      ChildKind::Subtask => b
        .subtasks
        .iter()
        .find(|c| c.id == id)
        .cloned()
        .map(TaskChild::Subtask),
      ChildKind::Checklist => b
        .checklists
        .iter()
        .find(|c| c.id == id)
        .cloned()
        .map(TaskChild::Checklist),
      ChildKind::Attachment => b
        .attachments
        .iter()
        .find(|c| c.id == id)
        .cloned()
        .map(TaskChild::Attachment),
    })
  }
}

#[async_trait]
impl RemoteSource for FakeRemote {
  async fn login(&self, _email: &str, _password: &str) -> ApiResult<Session> {
    self.begin("login").await?;
    Ok(Session {
      token: test_token(Utc::now() + Duration::hours(1)),
      user_id: 1,
      name: "Ada".to_string(),
    })
  }

  async fn list_tasks(&self, _token: &str) -> ApiResult<TaskList> {
    self.begin("list_tasks").await?;
    let state = self.state();
    let tasks: Vec<TaskSummary> = state.tasks.values().map(|b| b.task.summary()).collect();
    let ids: Vec<u64> = tasks
      .iter()
      .flat_map(|t| t.assignees.iter().copied().chain([t.creator_id]))
      .collect();
    Ok(TaskList {
      users: Self::users(&state, ids),
      tasks,
    })
  }

  async fn fetch_task(&self, _token: &str, id: TaskId) -> ApiResult<TaskBundle> {
    self.begin("fetch_task").await?;
    self
      .state()
      .tasks
      .get(&id)
      .cloned()
      .ok_or_else(|| not_found(format!("task {}", id)))
  }

  async fn create_task(&self, _token: &str, new: &NewTask) -> ApiResult<TaskBundle> {
    self.begin("create_task").await?;
    let mut state = self.state();
    state.next_id += 1;
    let task = Task {
      id: state.next_id,
      title: new.title.clone(),
      description: new.description.clone(),
      due: new.due,
      priority: new.priority,
      status: TaskStatus::Open,
      task_type: new.task_type,
      assignees: new.assignees.clone(),
      creator_id: 1,
      sent_date: Utc::now(),
      comments: vec![],
      subtasks: vec![],
      checklists: vec![],
      attachments: vec![],
    };
    let users = Self::users(&state, task.assignees.iter().copied().chain([1]));
    let bundle = TaskBundle {
      task,
      comments: vec![],
      subtasks: vec![],
      checklists: vec![],
      attachments: vec![],
      users,
    };
    state.tasks.insert(bundle.task.id, bundle.clone());
    Ok(bundle)
  }

  async fn update_task(&self, _token: &str, id: TaskId, change: &TaskChange) -> ApiResult<()> {
    self.begin("update_task").await?;
    let mut state = self.state();
    let task = &mut state
      .tasks
      .get_mut(&id)
      .ok_or_else(|| not_found(format!("task {}", id)))?
      .task;
    match change.clone() {
      TaskChange::Title(v) => task.title = v,
      TaskChange::Description(v) => task.description = v,
      TaskChange::Due(v) => task.due = v,
      TaskChange::Priority(v) => task.priority = v,
      TaskChange::Status(v) => task.status = v,
      TaskChange::Type(v) => task.task_type = v,
      TaskChange::Assignees(v) => task.assignees = v,
    }
    Ok(())
  }

  async fn delete_task(&self, _token: &str, id: TaskId) -> ApiResult<()> {
    self.begin("delete_task").await?;
    self
      .state()
      .tasks
      .remove(&id)
      .map(|_| ())
      .ok_or_else(|| not_found(format!("task {}", id)))
  }

  async fn create_child(
    &self,
    _token: &str,
    task_id: TaskId,
    new: &NewTaskChild,
  ) -> ApiResult<ChildEnvelope> {
    self.begin("create_child").await?;
    let mut state = self.state();
    state.next_id += 1;
    let id = state.next_id;
    let bundle = state
      .tasks
      .get_mut(&task_id)
      .ok_or_else(|| not_found(format!("task {}", task_id)))?;
    let child = match new.clone() {
      NewTaskChild::Comment { body } => {
        let c = Comment {
          id,
          task_id,
          author_id: 1,
          body,
          created_at: Utc::now(),
        };
        bundle.task.comments.push(id);
        bundle.comments.push(c.clone());
        TaskChild::Comment(c)
      }
      NewTaskChild::Subtask { title } => {
        let s = Subtask {
          id,
          task_id,
          title,
          done: false,
        };
        bundle.task.subtasks.push(id);
        bundle.subtasks.push(s.clone());
        TaskChild::Subtask(s)
      }
      NewTaskChild::Checklist { title } => {
        let c = ChecklistItem {
          id,
          task_id,
          title,
          checked: false,
        };
        bundle.task.checklists.push(id);
        bundle.checklists.push(c.clone());
        TaskChild::Checklist(c)
      }
      NewTaskChild::Attachment { file_name, url } => {
        let a = Attachment {
          id,
          task_id,
          file_name,
          url,
          uploaded_by: 1,
        };
        bundle.task.attachments.push(id);
        bundle.attachments.push(a.clone());
        TaskChild::Attachment(a)
      }
    };
    Ok(Self::child_envelope(&state, child))
  }

  async fn fetch_child(&self, _token: &str, kind: ChildKind, id: u64) -> ApiResult<ChildEnvelope> {
    self.begin("fetch_child").await?;
    let state = self.state();
    let child = Self::find_child(&state, kind, id).ok_or_else(|| not_found(format!("{} {}", kind, id)))?;
    Ok(Self::child_envelope(&state, child))
  }

  async fn update_child(&self, _token: &str, child: &TaskChild) -> ApiResult<ChildEnvelope> {
    self.begin("update_child").await?;
    let mut state = self.state();
    let bundle = state
      .tasks
      .get_mut(&child.task_id())
      .ok_or_else(|| not_found(format!("task {}", child.task_id())))?;
    let replaced = match child.clone() {
      TaskChild::Comment(new) => bundle.comments.iter_mut().find(|c| c.id == new.id).map(|c| *c = new),
      TaskChild::Subtask(new) => bundle.subtasks.iter_mut().find(|c| c.id == new.id).map(|c| *c = new),
      TaskChild::Checklist(new) => bundle.checklists.iter_mut().find(|c| c.id == new.id).map(|c| *c = new),
      TaskChild::Attachment(new) => bundle.attachments.iter_mut().find(|c| c.id == new.id).map(|c| *c = new),
    };
    replaced.ok_or_else(|| not_found(format!("{} {}", child.kind(), child.id())))?;
    Ok(Self::child_envelope(&state, child.clone()))
  }

  async fn delete_child(&self, _token: &str, kind: ChildKind, id: u64) -> ApiResult<()> {
    self.begin("delete_child").await?;
    let mut state = self.state();
    for bundle in state.tasks.values_mut() {
      let found = match kind {
        ChildKind::Comment => bundle.task.comments.contains(&id),
        ChildKind::Subtask => bundle.task.subtasks.contains(&id),
        ChildKind::Checklist => bundle.task.checklists.contains(&id),
        ChildKind::Attachment => bundle.task.attachments.contains(&id),
      };
      if found {
        bundle.task.comments.retain(|x| kind != ChildKind::Comment || *x != id);
        bundle.task.subtasks.retain(|x| kind != ChildKind::Subtask || *x != id);
        bundle.task.checklists.retain(|x| kind != ChildKind::Checklist || *x != id);
        bundle.task.attachments.retain(|x| kind != ChildKind::Attachment || *x != id);
        bundle.comments.retain(|c| kind != ChildKind::Comment || c.id != id);
        bundle.subtasks.retain(|c| kind != ChildKind::Subtask || c.id != id);
        bundle.checklists.retain(|c| kind != ChildKind::Checklist || c.id != id);
        bundle.attachments.retain(|c| kind != ChildKind::Attachment || c.id != id);
        return Ok(());
      }
    }
    Err(not_found(format!("{} {}", kind, id)))
  }

  async fn list_messages(&self, _token: &str) -> ApiResult<MessageList> {
    self.begin("list_messages").await?;
    let state = self.state();
    let messages: Vec<MessageSummary> = state.message_summaries.values().cloned().collect();
    let ids: Vec<u64> = messages
      .iter()
      .flat_map(|m| m.participants.iter().copied().chain([m.sender_id]))
      .collect();
    Ok(MessageList {
      users: Self::users(&state, ids),
      messages,
    })
  }

  async fn fetch_message(&self, _token: &str, id: MessageId) -> ApiResult<MessageBundle> {
    self.begin("fetch_message").await?;
    self
      .state()
      .messages
      .get(&id)
      .cloned()
      .ok_or_else(|| not_found(format!("message {}", id)))
  }

  async fn update_message_title(&self, _token: &str, id: MessageId, title: &str) -> ApiResult<()> {
    self.begin("update_message_title").await?;
    let mut state = self.state();
    let bundle = state
      .messages
      .get_mut(&id)
      .ok_or_else(|| not_found(format!("message {}", id)))?;
    bundle.message.title = title.to_string();
    if let Some(summary) = state.message_summaries.get_mut(&id) {
      summary.title = title.to_string();
    }
    Ok(())
  }

  async fn delete_message(&self, _token: &str, id: MessageId) -> ApiResult<()> {
    self.begin("delete_message").await?;
    let mut state = self.state();
    state.message_summaries.remove(&id);
    state
      .messages
      .remove(&id)
      .map(|_| ())
      .ok_or_else(|| not_found(format!("message {}", id)))
  }

  async fn create_reply(
    &self,
    _token: &str,
    message_id: MessageId,
    body: &str,
  ) -> ApiResult<ReplyEnvelope> {
    self.begin("create_reply").await?;
    let mut state = self.state();
    state.next_id += 1;
    let reply = MessageReply {
      id: state.next_id,
      message_id,
      sender_id: 1,
      body: body.to_string(),
      sent_date: Utc::now(),
    };
    let bundle = state
      .messages
      .get_mut(&message_id)
      .ok_or_else(|| not_found(format!("message {}", message_id)))?;
    bundle.message.replies.push(reply.id);
    bundle.replies.push(reply.clone());
    Ok(ReplyEnvelope {
      users: Self::users(&state, [1]),
      reply,
    })
  }

  async fn fetch_reply(&self, _token: &str, id: u64) -> ApiResult<ReplyEnvelope> {
    self.begin("fetch_reply").await?;
    let state = self.state();
    let reply = state
      .messages
      .values()
      .find_map(|b| b.replies.iter().find(|r| r.id == id).cloned())
      .ok_or_else(|| not_found(format!("reply {}", id)))?;
    Ok(ReplyEnvelope {
      users: Self::users(&state, [reply.sender_id]),
      reply,
    })
  }

  async fn delete_reply(&self, _token: &str, id: u64) -> ApiResult<()> {
    self.begin("delete_reply").await?;
    let mut state = self.state();
    for bundle in state.messages.values_mut() {
      if bundle.message.replies.contains(&id) {
        bundle.message.replies.retain(|r| *r != id);
        bundle.replies.retain(|r| r.id != id);
        return Ok(());
      }
    }
    Err(not_found(format!("reply {}", id)))
  }

  async fn fetch_user(&self, _token: &str, id: UserId) -> ApiResult<User> {
    self.begin("fetch_user").await?;
    self
      .state()
      .users
      .get(&id)
      .cloned()
      .ok_or_else(|| not_found(format!("user {}", id)))
  }

  async fn fetch_profile(&self, _token: &str, user_id: UserId) -> ApiResult<ProfileData> {
    self.begin("fetch_profile").await?;
    self
      .state()
      .profiles
      .get(&user_id)
      .cloned()
      .ok_or_else(|| not_found(format!("profile {}", user_id)))
  }

  async fn update_profile(&self, _token: &str, update: &ProfileUpdate) -> ApiResult<ProfileData> {
    self.begin("update_profile").await?;
    let mut state = self.state();
    let profile = state
      .profiles
      .get_mut(&update.user_id)
      .ok_or_else(|| not_found(format!("profile {}", update.user_id)))?;
    profile.name = update.name.clone();
    profile.avatar = update.avatar.clone();
    let profile = profile.clone();
    if let Some(user) = state.users.get_mut(&update.user_id) {
      user.name = update.name.clone();
      user.avatar = update.avatar.clone();
    }
    Ok(profile)
  }
}

// ============================================================================
// Fixtures
// ============================================================================

pub(crate) fn user(id: u64) -> User {
  User {
    id,
    name: format!("User {}", id),
    avatar: Some(vec![id as u8, 0xff]),
  }
}

fn at(hour: u32) -> chrono::DateTime<Utc> {
  Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
}

/// Task `id` created by user 1, assigned to `assignees`, with one comment
/// per id in `comment_ids` written by user 1.
pub(crate) fn task_bundle(id: u64, assignees: &[u64], comment_ids: &[u64]) -> TaskBundle {
  let comments: Vec<Comment> = comment_ids
    .iter()
    .map(|cid| Comment {
      id: *cid,
      task_id: id,
      author_id: 1,
      body: format!("comment {}", cid),
      created_at: at(9),
    })
    .collect();
  let mut user_ids: Vec<u64> = assignees.to_vec();
  user_ids.push(1);
  user_ids.sort_unstable();
  user_ids.dedup();
  TaskBundle {
    task: Task {
      id,
      title: format!("Task {}", id),
      description: Some("details".to_string()),
      due: Some(at(17)),
      priority: Priority::Normal,
      status: TaskStatus::Open,
      task_type: TaskType::Task,
      assignees: assignees.to_vec(),
      creator_id: 1,
      sent_date: at(8),
      comments: comment_ids.to_vec(),
      subtasks: vec![],
      checklists: vec![],
      attachments: vec![],
    },
    comments,
    subtasks: vec![],
    checklists: vec![],
    attachments: vec![],
    users: user_ids.into_iter().map(user).collect(),
  }
}

/// Message `id` from user 1 to user 2 with replies `reply_ids` from user 2.
pub(crate) fn message_bundle(id: u64, reply_ids: &[u64]) -> MessageBundle {
  MessageBundle {
    message: Message {
      id,
      title: format!("Thread {}", id),
      body: "hello".to_string(),
      sender_id: 1,
      sent_date: at(10),
      participants: vec![1, 2],
      replies: reply_ids.to_vec(),
    },
    replies: reply_ids
      .iter()
      .map(|rid| MessageReply {
        id: *rid,
        message_id: id,
        sender_id: 2,
        body: format!("reply {}", rid),
        sent_date: at(11),
      })
      .collect(),
    users: vec![user(1), user(2)],
  }
}

pub(crate) fn profile(user_id: u64) -> ProfileData {
  ProfileData {
    user_id,
    name: format!("User {}", user_id),
    email: format!("user{}@example.com", user_id),
    phone: None,
    job_title: Some("Engineer".to_string()),
    avatar: None,
  }
}
