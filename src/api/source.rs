//! The remote REST backend as seen by the cache: typed requests, and
//! responses classified as success, client error, server error or generic
//! error.

use async_trait::async_trait;

use super::types::{
  ChildEnvelope, ChildKind, MessageBundle, MessageId, MessageList, NewTask, NewTaskChild,
  ProfileData, ProfileUpdate, ReplyEnvelope, Session, TaskBundle, TaskChange, TaskChild, TaskId,
  TaskList, User, UserId,
};
use crate::error::ApiResult;

/// Remote operations. Every call but `login` takes the bearer token to use.
#[async_trait]
pub trait RemoteSource: Send + Sync {
  /// Exchange account email and password for a session token.
  async fn login(&self, email: &str, password: &str) -> ApiResult<Session>;

  // Tasks
  async fn list_tasks(&self, token: &str) -> ApiResult<TaskList>;
  async fn fetch_task(&self, token: &str, id: TaskId) -> ApiResult<TaskBundle>;
  async fn create_task(&self, token: &str, task: &NewTask) -> ApiResult<TaskBundle>;
  async fn update_task(&self, token: &str, id: TaskId, change: &TaskChange) -> ApiResult<()>;
  async fn delete_task(&self, token: &str, id: TaskId) -> ApiResult<()>;

  // Task children
  async fn create_child(
    &self,
    token: &str,
    task_id: TaskId,
    child: &NewTaskChild,
  ) -> ApiResult<ChildEnvelope>;
  async fn fetch_child(&self, token: &str, kind: ChildKind, id: u64) -> ApiResult<ChildEnvelope>;
  async fn update_child(&self, token: &str, child: &TaskChild) -> ApiResult<ChildEnvelope>;
  async fn delete_child(&self, token: &str, kind: ChildKind, id: u64) -> ApiResult<()>;

  // Messages
  async fn list_messages(&self, token: &str) -> ApiResult<MessageList>;
  async fn fetch_message(&self, token: &str, id: MessageId) -> ApiResult<MessageBundle>;
  async fn update_message_title(&self, token: &str, id: MessageId, title: &str) -> ApiResult<()>;
  async fn delete_message(&self, token: &str, id: MessageId) -> ApiResult<()>;
  async fn create_reply(
    &self,
    token: &str,
    message_id: MessageId,
    body: &str,
  ) -> ApiResult<ReplyEnvelope>;
  async fn fetch_reply(&self, token: &str, id: u64) -> ApiResult<ReplyEnvelope>;
  async fn delete_reply(&self, token: &str, id: u64) -> ApiResult<()>;

  // Users and profiles
  async fn fetch_user(&self, token: &str, id: UserId) -> ApiResult<User>;
  async fn fetch_profile(&self, token: &str, user_id: UserId) -> ApiResult<ProfileData>;
  async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> ApiResult<ProfileData>;
}
