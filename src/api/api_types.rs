//! Serde types matching the backend's JSON.
//!
//! These are separate from domain types: the backend nests whole user
//! objects where the store keeps ids, so converting a response also
//! collects every user it mentions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::types::{
  Attachment, ChecklistItem, ChildEnvelope, Comment, Message, MessageBundle, MessageList,
  MessageReply, MessageSummary, Priority, ProfileData, ReplyEnvelope, Session, Subtask, Task,
  TaskBundle, TaskList, TaskStatus, TaskSummary, TaskType, User,
};
use crate::error::RemoteError;

/// Serde adapter for optional binary payloads carried as base64 strings.
pub mod opt_base64 {
  use base64::{engine::general_purpose::STANDARD, Engine};
  use serde::{Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
    match value {
      Some(bytes) => s.serialize_some(&STANDARD.encode(bytes)),
      None => s.serialize_none(),
    }
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
    let encoded: Option<String> = Option::deserialize(d)?;
    encoded
      .filter(|s| !s.is_empty())
      .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
      .transpose()
  }
}

/// Collects users by id, keeping the last copy seen.
#[derive(Default)]
struct UserSet(BTreeMap<u64, User>);

impl UserSet {
  fn add(&mut self, user: ApiUser) -> u64 {
    let id = user.id;
    self.0.insert(id, user.into());
    id
  }

  fn into_vec(self) -> Vec<User> {
    self.0.into_values().collect()
  }
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiLoginRequest<'a> {
  pub email: &'a str,
  pub password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiLoginResponse {
  pub token: String,
  pub user_id: u64,
  #[serde(default)]
  pub name: String,
}

impl From<ApiLoginResponse> for Session {
  fn from(r: ApiLoginResponse) -> Self {
    Session {
      token: r.token,
      user_id: r.user_id,
      name: r.name,
    }
  }
}

/// Error body sent with 4xx/5xx responses.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
  pub message: String,
}

// ============================================================================
// Users and profiles
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiUser {
  pub id: u64,
  pub name: String,
  #[serde(default, with = "opt_base64")]
  pub avatar: Option<Vec<u8>>,
}

impl From<ApiUser> for User {
  fn from(u: ApiUser) -> Self {
    User {
      id: u.id,
      name: u.name,
      avatar: u.avatar,
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiProfile {
  pub user_id: u64,
  pub name: String,
  pub email: String,
  pub phone: Option<String>,
  pub job_title: Option<String>,
  #[serde(default, with = "opt_base64")]
  pub avatar: Option<Vec<u8>>,
}

impl From<ApiProfile> for ProfileData {
  fn from(p: ApiProfile) -> Self {
    ProfileData {
      user_id: p.user_id,
      name: p.name,
      email: p.email,
      phone: p.phone,
      job_title: p.job_title,
      avatar: p.avatar,
    }
  }
}

#[derive(Debug, Serialize)]
pub struct ApiProfileUpdate {
  pub name: String,
  #[serde(with = "opt_base64")]
  pub avatar: Option<Vec<u8>>,
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTaskSummary {
  pub id: u64,
  pub title: String,
  pub description: Option<String>,
  pub due_date: Option<DateTime<Utc>>,
  #[serde(default)]
  pub priority: Priority,
  #[serde(default)]
  pub status: TaskStatus,
  #[serde(rename = "type", default)]
  pub task_type: TaskType,
  #[serde(default)]
  pub assignees: Vec<ApiUser>,
  pub creator: ApiUser,
}

impl ApiTaskSummary {
  fn into_summary(self, users: &mut UserSet) -> TaskSummary {
    TaskSummary {
      id: self.id,
      title: self.title,
      description: self.description,
      due: self.due_date,
      priority: self.priority,
      status: self.status,
      task_type: self.task_type,
      assignees: self.assignees.into_iter().map(|u| users.add(u)).collect(),
      creator_id: users.add(self.creator),
    }
  }
}

/// Decompose a list response into summary rows and the users they mention.
pub fn into_task_list(items: Vec<ApiTaskSummary>) -> TaskList {
  let mut users = UserSet::default();
  let tasks = items.into_iter().map(|t| t.into_summary(&mut users)).collect();
  TaskList {
    tasks,
    users: users.into_vec(),
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiComment {
  pub id: u64,
  pub task_id: u64,
  pub author: ApiUser,
  pub body: String,
  pub created_at: DateTime<Utc>,
}

impl ApiComment {
  fn into_domain(self, users: &mut UserSet) -> Comment {
    Comment {
      id: self.id,
      task_id: self.task_id,
      author_id: users.add(self.author),
      body: self.body,
      created_at: self.created_at,
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSubtask {
  pub id: u64,
  pub task_id: u64,
  pub title: String,
  #[serde(default)]
  pub done: bool,
}

impl From<ApiSubtask> for Subtask {
  fn from(s: ApiSubtask) -> Self {
    Subtask {
      id: s.id,
      task_id: s.task_id,
      title: s.title,
      done: s.done,
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiChecklistItem {
  pub id: u64,
  pub task_id: u64,
  pub title: String,
  #[serde(default)]
  pub checked: bool,
}

impl From<ApiChecklistItem> for ChecklistItem {
  fn from(c: ApiChecklistItem) -> Self {
    ChecklistItem {
      id: c.id,
      task_id: c.task_id,
      title: c.title,
      checked: c.checked,
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAttachment {
  pub id: u64,
  pub task_id: u64,
  pub file_name: String,
  pub url: String,
  pub uploaded_by: ApiUser,
}

impl ApiAttachment {
  fn into_domain(self, users: &mut UserSet) -> Attachment {
    Attachment {
      id: self.id,
      task_id: self.task_id,
      file_name: self.file_name,
      url: self.url,
      uploaded_by: users.add(self.uploaded_by),
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTask {
  #[serde(flatten)]
  pub head: ApiTaskSummary,
  pub sent_date: DateTime<Utc>,
  #[serde(default)]
  pub comments: Vec<ApiComment>,
  #[serde(default)]
  pub subtasks: Vec<ApiSubtask>,
  #[serde(default)]
  pub checklists: Vec<ApiChecklistItem>,
  #[serde(default)]
  pub attachments: Vec<ApiAttachment>,
}

impl ApiTask {
  /// Decompose into the task row, its child rows and every user mentioned.
  /// Id-lists follow the order children arrive in.
  pub fn into_bundle(self) -> TaskBundle {
    let mut users = UserSet::default();
    let head = self.head.into_summary(&mut users);
    let comments: Vec<Comment> = self
      .comments
      .into_iter()
      .map(|c| c.into_domain(&mut users))
      .collect();
    let subtasks: Vec<Subtask> = self.subtasks.into_iter().map(Subtask::from).collect();
    let checklists: Vec<ChecklistItem> = self.checklists.into_iter().map(ChecklistItem::from).collect();
    let attachments: Vec<Attachment> = self
      .attachments
      .into_iter()
      .map(|a| a.into_domain(&mut users))
      .collect();

    TaskBundle {
      task: Task {
        id: head.id,
        title: head.title,
        description: head.description,
        due: head.due,
        priority: head.priority,
        status: head.status,
        task_type: head.task_type,
        assignees: head.assignees,
        creator_id: head.creator_id,
        sent_date: self.sent_date,
        comments: comments.iter().map(|c| c.id).collect(),
        subtasks: subtasks.iter().map(|s| s.id).collect(),
        checklists: checklists.iter().map(|c| c.id).collect(),
        attachments: attachments.iter().map(|a| a.id).collect(),
      },
      comments,
      subtasks,
      checklists,
      attachments,
      users: users.into_vec(),
    }
  }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNewTask<'a> {
  pub title: &'a str,
  pub description: Option<&'a str>,
  pub due_date: Option<DateTime<Utc>>,
  pub priority: Priority,
  #[serde(rename = "type")]
  pub task_type: TaskType,
  pub assignees: &'a [u64],
}

/// A child of any kind as returned by the per-kind child endpoints.
pub enum ApiChild {
  Comment(ApiComment),
  Subtask(ApiSubtask),
  Checklist(ApiChecklistItem),
  Attachment(ApiAttachment),
}

impl ApiChild {
  pub fn into_envelope(self) -> ChildEnvelope {
    use super::types::TaskChild;

    let mut users = UserSet::default();
    let child = match self {
      Self::Comment(c) => TaskChild::Comment(c.into_domain(&mut users)),
      Self::Subtask(s) => TaskChild::Subtask(s.into()),
      Self::Checklist(c) => TaskChild::Checklist(c.into()),
      Self::Attachment(a) => TaskChild::Attachment(a.into_domain(&mut users)),
    };
    ChildEnvelope {
      child,
      users: users.into_vec(),
    }
  }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMessageSummary {
  pub id: u64,
  pub title: String,
  #[serde(default)]
  pub preview: String,
  pub sender: ApiUser,
  pub sent_date: DateTime<Utc>,
  #[serde(default)]
  pub participants: Vec<ApiUser>,
}

pub fn into_message_list(items: Vec<ApiMessageSummary>) -> MessageList {
  let mut users = UserSet::default();
  let messages = items
    .into_iter()
    .map(|m| MessageSummary {
      id: m.id,
      title: m.title,
      preview: m.preview,
      sender_id: users.add(m.sender),
      sent_date: m.sent_date,
      participants: m.participants.into_iter().map(|u| users.add(u)).collect(),
    })
    .collect();
  MessageList {
    messages,
    users: users.into_vec(),
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReply {
  pub id: u64,
  pub message_id: u64,
  pub sender: ApiUser,
  pub body: String,
  pub sent_date: DateTime<Utc>,
}

impl ApiReply {
  fn into_domain(self, users: &mut UserSet) -> MessageReply {
    MessageReply {
      id: self.id,
      message_id: self.message_id,
      sender_id: users.add(self.sender),
      body: self.body,
      sent_date: self.sent_date,
    }
  }

  pub fn into_envelope(self) -> ReplyEnvelope {
    let mut users = UserSet::default();
    let reply = self.into_domain(&mut users);
    ReplyEnvelope {
      reply,
      users: users.into_vec(),
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMessage {
  pub id: u64,
  pub title: String,
  pub body: String,
  pub sender: ApiUser,
  pub sent_date: DateTime<Utc>,
  #[serde(default)]
  pub participants: Vec<ApiUser>,
  #[serde(default)]
  pub replies: Vec<ApiReply>,
}

impl ApiMessage {
  pub fn into_bundle(self) -> MessageBundle {
    let mut users = UserSet::default();
    let sender_id = users.add(self.sender);
    let participants = self.participants.into_iter().map(|u| users.add(u)).collect();
    let replies: Vec<MessageReply> = self
      .replies
      .into_iter()
      .map(|r| r.into_domain(&mut users))
      .collect();
    MessageBundle {
      message: Message {
        id: self.id,
        title: self.title,
        body: self.body,
        sender_id,
        sent_date: self.sent_date,
        participants,
        replies: replies.iter().map(|r| r.id).collect(),
      },
      replies,
      users: users.into_vec(),
    }
  }
}

/// Parse a success body, mapping parse failures to a generic error.
pub fn parse<T: serde::de::DeserializeOwned>(what: &str, body: &[u8]) -> Result<T, RemoteError> {
  serde_json::from_slice(body)
    .map_err(|e| RemoteError::Generic(format!("Failed to parse {}: {}", what, e)))
}
