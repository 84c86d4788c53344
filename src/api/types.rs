use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub type TaskId = u64;
pub type UserId = u64;
pub type MessageId = u64;

macro_rules! text_enum {
  ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
    impl $name {
      pub fn as_str(&self) -> &'static str {
        match self {
          $(Self::$variant => $text),+
        }
      }
    }

    impl FromStr for $name {
      type Err = String;

      fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
          $($text => Ok(Self::$variant),)+
          other => Err(format!("unknown {} {:?}", stringify!($name), other)),
        }
      }
    }

    impl std::fmt::Display for $name {
      fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
      }
    }
  };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
  Low,
  #[default]
  Normal,
  High,
  Urgent,
}

text_enum!(Priority { Low => "LOW", Normal => "NORMAL", High => "HIGH", Urgent => "URGENT" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
  #[default]
  Open,
  InProgress,
  OnHold,
  Complete,
}

text_enum!(TaskStatus {
  Open => "OPEN",
  InProgress => "IN_PROGRESS",
  OnHold => "ON_HOLD",
  Complete => "COMPLETE",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
  #[default]
  Task,
  Milestone,
}

text_enum!(TaskType { Task => "TASK", Milestone => "MILESTONE" });

/// A user referenced by tasks and messages. Never owned by a parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
  pub id: UserId,
  pub name: String,
  pub avatar: Option<Vec<u8>>,
}

/// Task row for list views
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
  pub id: TaskId,
  pub title: String,
  pub description: Option<String>,
  pub due: Option<DateTime<Utc>>,
  pub priority: Priority,
  pub status: TaskStatus,
  pub task_type: TaskType,
  pub assignees: Vec<UserId>,
  pub creator_id: UserId,
}

/// Full task with ordered child id-lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
  pub id: TaskId,
  pub title: String,
  pub description: Option<String>,
  pub due: Option<DateTime<Utc>>,
  pub priority: Priority,
  pub status: TaskStatus,
  pub task_type: TaskType,
  pub assignees: Vec<UserId>,
  pub creator_id: UserId,
  pub sent_date: DateTime<Utc>,
  pub comments: Vec<u64>,
  pub subtasks: Vec<u64>,
  pub checklists: Vec<u64>,
  pub attachments: Vec<u64>,
}

impl Task {
  /// The list-view projection of this task.
  pub fn summary(&self) -> TaskSummary {
    TaskSummary {
      id: self.id,
      title: self.title.clone(),
      description: self.description.clone(),
      due: self.due,
      priority: self.priority,
      status: self.status,
      task_type: self.task_type,
      assignees: self.assignees.clone(),
      creator_id: self.creator_id,
    }
  }

  pub fn child_ids(&self, kind: ChildKind) -> &[u64] {
    match kind {
      ChildKind::Comment => &self.comments,
      ChildKind::Subtask => &self.subtasks,
      ChildKind::Checklist => &self.checklists,
      ChildKind::Attachment => &self.attachments,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
  pub id: u64,
  pub task_id: TaskId,
  pub author_id: UserId,
  pub body: String,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subtask {
  pub id: u64,
  pub task_id: TaskId,
  pub title: String,
  pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistItem {
  pub id: u64,
  pub task_id: TaskId,
  pub title: String,
  pub checked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
  pub id: u64,
  pub task_id: TaskId,
  pub file_name: String,
  pub url: String,
  pub uploaded_by: UserId,
}

/// Which id-list of a task a child belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildKind {
  Comment,
  Subtask,
  Checklist,
  Attachment,
}

text_enum!(ChildKind {
  Comment => "comments",
  Subtask => "subtasks",
  Checklist => "checklists",
  Attachment => "attachments",
});

impl ChildKind {
  pub const ALL: [ChildKind; 4] = [
    ChildKind::Comment,
    ChildKind::Subtask,
    ChildKind::Checklist,
    ChildKind::Attachment,
  ];
}

/// A child row of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskChild {
  Comment(Comment),
  Subtask(Subtask),
  Checklist(ChecklistItem),
  Attachment(Attachment),
}

impl TaskChild {
  pub fn id(&self) -> u64 {
    match self {
      Self::Comment(c) => c.id,
      Self::Subtask(s) => s.id,
      Self::Checklist(c) => c.id,
      Self::Attachment(a) => a.id,
    }
  }

  pub fn task_id(&self) -> TaskId {
    match self {
      Self::Comment(c) => c.task_id,
      Self::Subtask(s) => s.task_id,
      Self::Checklist(c) => c.task_id,
      Self::Attachment(a) => a.task_id,
    }
  }

  pub fn kind(&self) -> ChildKind {
    match self {
      Self::Comment(_) => ChildKind::Comment,
      Self::Subtask(_) => ChildKind::Subtask,
      Self::Checklist(_) => ChildKind::Checklist,
      Self::Attachment(_) => ChildKind::Attachment,
    }
  }
}

/// A task as returned by a detail fetch: the task, every child row and
/// every user any of them references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskBundle {
  pub task: Task,
  pub comments: Vec<Comment>,
  pub subtasks: Vec<Subtask>,
  pub checklists: Vec<ChecklistItem>,
  pub attachments: Vec<Attachment>,
  pub users: Vec<User>,
}

/// A child returned by a create or fetch call, with the users it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEnvelope {
  pub child: TaskChild,
  pub users: Vec<User>,
}

/// Conversation row for list views
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSummary {
  pub id: MessageId,
  pub title: String,
  pub preview: String,
  pub sender_id: UserId,
  pub sent_date: DateTime<Utc>,
  pub participants: Vec<UserId>,
}

/// Full conversation with its ordered reply ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
  pub id: MessageId,
  pub title: String,
  pub body: String,
  pub sender_id: UserId,
  pub sent_date: DateTime<Utc>,
  pub participants: Vec<UserId>,
  pub replies: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageReply {
  pub id: u64,
  pub message_id: MessageId,
  pub sender_id: UserId,
  pub body: String,
  pub sent_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBundle {
  pub message: Message,
  pub replies: Vec<MessageReply>,
  pub users: Vec<User>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyEnvelope {
  pub reply: MessageReply,
  pub users: Vec<User>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileData {
  pub user_id: UserId,
  pub name: String,
  pub email: String,
  pub phone: Option<String>,
  pub job_title: Option<String>,
  pub avatar: Option<Vec<u8>>,
}

/// A single edit to a field shared by a task's summary and detail rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskChange {
  Title(String),
  Description(Option<String>),
  Due(Option<DateTime<Utc>>),
  Priority(Priority),
  Status(TaskStatus),
  Type(TaskType),
  Assignees(Vec<UserId>),
}

/// Payload for a task creation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
  pub title: String,
  pub description: Option<String>,
  pub due: Option<DateTime<Utc>>,
  pub priority: Priority,
  pub task_type: TaskType,
  pub assignees: Vec<UserId>,
}

/// Payload for creating a task child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewTaskChild {
  Comment { body: String },
  Subtask { title: String },
  Checklist { title: String },
  Attachment { file_name: String, url: String },
}

impl NewTaskChild {
  pub fn kind(&self) -> ChildKind {
    match self {
      Self::Comment { .. } => ChildKind::Comment,
      Self::Subtask { .. } => ChildKind::Subtask,
      Self::Checklist { .. } => ChildKind::Checklist,
      Self::Attachment { .. } => ChildKind::Attachment,
    }
  }
}

/// A fetched task list and the users its rows reference.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskList {
  pub tasks: Vec<TaskSummary>,
  pub users: Vec<User>,
}

/// A fetched conversation list and the users its rows reference.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageList {
  pub messages: Vec<MessageSummary>,
  pub users: Vec<User>,
}

/// Edit of the logged-in account's own profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
  pub user_id: UserId,
  pub name: String,
  pub avatar: Option<Vec<u8>>,
}

/// Result of a successful login or token refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
  pub token: String,
  pub user_id: UserId,
  pub name: String,
}
