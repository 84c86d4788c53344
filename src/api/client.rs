use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::api_types::{
  into_message_list, into_task_list, parse, ApiAttachment, ApiChecklistItem, ApiChild,
  ApiComment, ApiErrorBody, ApiLoginRequest, ApiLoginResponse, ApiMessage, ApiMessageSummary,
  ApiNewTask, ApiProfile, ApiProfileUpdate, ApiReply, ApiSubtask, ApiTask, ApiTaskSummary,
  ApiUser,
};
use super::source::RemoteSource;
use super::types::{
  ChildEnvelope, ChildKind, MessageBundle, MessageId, MessageList, NewTask, NewTaskChild,
  ProfileData, ProfileUpdate, ReplyEnvelope, Session, TaskBundle, TaskChange, TaskChild, TaskId,
  TaskList, User, UserId,
};
use crate::error::{ApiResult, ClientErrorKind, RemoteError};

/// REST client for the task/messaging backend
#[derive(Clone)]
pub struct RestClient {
  http: reqwest::Client,
  base: Url,
}

impl RestClient {
  pub fn new(base_url: &str, timeout: Duration) -> ApiResult<Self> {
    let mut base = Url::parse(base_url)
      .map_err(|e| RemoteError::Generic(format!("Invalid server url {}: {}", base_url, e)))?;
    // Url::join drops the last segment unless the path ends with a slash.
    if !base.path().ends_with('/') {
      let path = format!("{}/", base.path());
      base.set_path(&path);
    }

    let http = reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(concat!("tasksync/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| RemoteError::Generic(format!("Failed to create HTTP client: {}", e)))?;

    Ok(Self { http, base })
  }

  /// Send a request and return the raw success body.
  async fn send(
    &self,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
  ) -> ApiResult<Vec<u8>> {
    let url = self
      .base
      .join(path)
      .map_err(|e| RemoteError::Generic(format!("Invalid path {}: {}", path, e)))?;
    debug!(%method, %url, "request");

    let mut request = self.http.request(method.clone(), url);
    if let Some(token) = token {
      request = request.bearer_auth(token);
    }
    if let Some(body) = body {
      request = request.json(&body);
    }

    let response = request.send().await.map_err(|e| {
      warn!(%method, path, error = %e, "request failed");
      RemoteError::Generic(format!("Request to {} failed: {}", path, e))
    })?;
    let status = response.status();
    let bytes = response
      .bytes()
      .await
      .map_err(|e| RemoteError::Generic(format!("Failed to read response from {}: {}", path, e)))?;

    if status.is_success() {
      Ok(bytes.to_vec())
    } else {
      let err = classify(status, &bytes);
      warn!(%method, path, status = status.as_u16(), error = %err, "request rejected");
      Err(err)
    }
  }

  async fn get<T: DeserializeOwned>(&self, what: &str, path: &str, token: &str) -> ApiResult<T> {
    let body = self.send(Method::GET, path, Some(token), None).await?;
    parse(what, &body)
  }

  async fn send_json<T: DeserializeOwned>(
    &self,
    method: Method,
    what: &str,
    path: &str,
    token: &str,
    body: Value,
  ) -> ApiResult<T> {
    let body = self.send(method, path, Some(token), Some(body)).await?;
    parse(what, &body)
  }

  /// Send a request whose response body is ignored.
  async fn send_unit(
    &self,
    method: Method,
    path: &str,
    token: &str,
    body: Option<Value>,
  ) -> ApiResult<()> {
    self.send(method, path, Some(token), body).await.map(|_| ())
  }
}

/// Map a non-success status to a failure class: 4xx is a client error,
/// 5xx a server error, anything else generic.
pub fn classify(status: StatusCode, body: &[u8]) -> RemoteError {
  let message = serde_json::from_slice::<ApiErrorBody>(body)
    .map(|b| b.message)
    .unwrap_or_else(|_| {
      let text = String::from_utf8_lossy(body).trim().to_string();
      if text.is_empty() {
        status.to_string()
      } else {
        text
      }
    });

  if status.is_client_error() {
    RemoteError::Client {
      kind: ClientErrorKind::from_status(status.as_u16()),
      message,
    }
  } else if status.is_server_error() {
    RemoteError::Server(message)
  } else {
    RemoteError::Generic(format!("unexpected status {}: {}", status, message))
  }
}

fn to_json<T: serde::Serialize>(value: &T) -> ApiResult<Value> {
  serde_json::to_value(value).map_err(|e| RemoteError::Generic(format!("Failed to encode: {}", e)))
}

fn change_body(change: &TaskChange) -> Value {
  match change {
    TaskChange::Title(title) => json!({ "title": title }),
    TaskChange::Description(description) => json!({ "description": description }),
    TaskChange::Due(due) => json!({ "dueDate": due }),
    TaskChange::Priority(priority) => json!({ "priority": priority }),
    TaskChange::Status(status) => json!({ "status": status }),
    TaskChange::Type(task_type) => json!({ "type": task_type }),
    TaskChange::Assignees(ids) => json!({ "assignees": ids }),
  }
}

fn new_child_body(child: &NewTaskChild) -> Value {
  match child {
    NewTaskChild::Comment { body } => json!({ "body": body }),
    NewTaskChild::Subtask { title } => json!({ "title": title }),
    NewTaskChild::Checklist { title } => json!({ "title": title }),
    NewTaskChild::Attachment { file_name, url } => json!({ "fileName": file_name, "url": url }),
  }
}

fn child_body(child: &TaskChild) -> Value {
  match child {
    TaskChild::Comment(c) => json!({ "id": c.id, "taskId": c.task_id, "body": c.body }),
    TaskChild::Subtask(s) => {
      json!({ "id": s.id, "taskId": s.task_id, "title": s.title, "done": s.done })
    }
    TaskChild::Checklist(c) => {
      json!({ "id": c.id, "taskId": c.task_id, "title": c.title, "checked": c.checked })
    }
    TaskChild::Attachment(a) => {
      json!({ "id": a.id, "taskId": a.task_id, "fileName": a.file_name, "url": a.url })
    }
  }
}

fn parse_child(kind: ChildKind, body: &[u8]) -> ApiResult<ApiChild> {
  Ok(match kind {
    ChildKind::Comment => ApiChild::Comment(parse::<ApiComment>("comment", body)?),
    ChildKind::Subtask => ApiChild::Subtask(parse::<ApiSubtask>("subtask", body)?),
    ChildKind::Checklist => ApiChild::Checklist(parse::<ApiChecklistItem>("checklist item", body)?),
    ChildKind::Attachment => ApiChild::Attachment(parse::<ApiAttachment>("attachment", body)?),
  })
}

#[async_trait]
impl RemoteSource for RestClient {
  async fn login(&self, email: &str, password: &str) -> ApiResult<Session> {
    let body = to_json(&ApiLoginRequest { email, password })?;
    let response = self.send(Method::POST, "auth/login", None, Some(body)).await?;
    let login: ApiLoginResponse = parse("login response", &response)?;
    Ok(login.into())
  }

  async fn list_tasks(&self, token: &str) -> ApiResult<TaskList> {
    let items: Vec<ApiTaskSummary> = self.get("task list", "tasks", token).await?;
    Ok(into_task_list(items))
  }

  async fn fetch_task(&self, token: &str, id: TaskId) -> ApiResult<TaskBundle> {
    let task: ApiTask = self.get("task", &format!("tasks/{}", id), token).await?;
    Ok(task.into_bundle())
  }

  async fn create_task(&self, token: &str, task: &NewTask) -> ApiResult<TaskBundle> {
    let body = to_json(&ApiNewTask {
      title: &task.title,
      description: task.description.as_deref(),
      due_date: task.due,
      priority: task.priority,
      task_type: task.task_type,
      assignees: &task.assignees,
    })?;
    let created: ApiTask = self
      .send_json(Method::POST, "task", "tasks", token, body)
      .await?;
    Ok(created.into_bundle())
  }

  async fn update_task(&self, token: &str, id: TaskId, change: &TaskChange) -> ApiResult<()> {
    self
      .send_unit(Method::PATCH, &format!("tasks/{}", id), token, Some(change_body(change)))
      .await
  }

  async fn delete_task(&self, token: &str, id: TaskId) -> ApiResult<()> {
    self
      .send_unit(Method::DELETE, &format!("tasks/{}", id), token, None)
      .await
  }

  async fn create_child(
    &self,
    token: &str,
    task_id: TaskId,
    child: &NewTaskChild,
  ) -> ApiResult<ChildEnvelope> {
    let kind = child.kind();
    let path = format!("tasks/{}/{}", task_id, kind);
    let body = self
      .send(Method::POST, &path, Some(token), Some(new_child_body(child)))
      .await?;
    Ok(parse_child(kind, &body)?.into_envelope())
  }

  async fn fetch_child(&self, token: &str, kind: ChildKind, id: u64) -> ApiResult<ChildEnvelope> {
    let body = self
      .send(Method::GET, &format!("{}/{}", kind, id), Some(token), None)
      .await?;
    Ok(parse_child(kind, &body)?.into_envelope())
  }

  async fn update_child(&self, token: &str, child: &TaskChild) -> ApiResult<ChildEnvelope> {
    let kind = child.kind();
    let path = format!("{}/{}", kind, child.id());
    let body = self
      .send(Method::PUT, &path, Some(token), Some(child_body(child)))
      .await?;
    Ok(parse_child(kind, &body)?.into_envelope())
  }

  async fn delete_child(&self, token: &str, kind: ChildKind, id: u64) -> ApiResult<()> {
    self
      .send_unit(Method::DELETE, &format!("{}/{}", kind, id), token, None)
      .await
  }

  async fn list_messages(&self, token: &str) -> ApiResult<MessageList> {
    let items: Vec<ApiMessageSummary> = self.get("message list", "messages", token).await?;
    Ok(into_message_list(items))
  }

  async fn fetch_message(&self, token: &str, id: MessageId) -> ApiResult<MessageBundle> {
    let message: ApiMessage = self
      .get("message", &format!("messages/{}", id), token)
      .await?;
    Ok(message.into_bundle())
  }

  async fn update_message_title(&self, token: &str, id: MessageId, title: &str) -> ApiResult<()> {
    self
      .send_unit(
        Method::PATCH,
        &format!("messages/{}", id),
        token,
        Some(json!({ "title": title })),
      )
      .await
  }

  async fn delete_message(&self, token: &str, id: MessageId) -> ApiResult<()> {
    self
      .send_unit(Method::DELETE, &format!("messages/{}", id), token, None)
      .await
  }

  async fn create_reply(
    &self,
    token: &str,
    message_id: MessageId,
    body: &str,
  ) -> ApiResult<ReplyEnvelope> {
    let reply: ApiReply = self
      .send_json(
        Method::POST,
        "reply",
        &format!("messages/{}/replies", message_id),
        token,
        json!({ "body": body }),
      )
      .await?;
    Ok(reply.into_envelope())
  }

  async fn fetch_reply(&self, token: &str, id: u64) -> ApiResult<ReplyEnvelope> {
    let reply: ApiReply = self.get("reply", &format!("replies/{}", id), token).await?;
    Ok(reply.into_envelope())
  }

  async fn delete_reply(&self, token: &str, id: u64) -> ApiResult<()> {
    self
      .send_unit(Method::DELETE, &format!("replies/{}", id), token, None)
      .await
  }

  async fn fetch_user(&self, token: &str, id: UserId) -> ApiResult<User> {
    let user: ApiUser = self.get("user", &format!("users/{}", id), token).await?;
    Ok(user.into())
  }

  async fn fetch_profile(&self, token: &str, user_id: UserId) -> ApiResult<ProfileData> {
    let profile: ApiProfile = self
      .get("profile", &format!("profiles/{}", user_id), token)
      .await?;
    Ok(profile.into())
  }

  async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> ApiResult<ProfileData> {
    let body = to_json(&ApiProfileUpdate {
      name: update.name.clone(),
      avatar: update.avatar.clone(),
    })?;
    let profile: ApiProfile = self
      .send_json(
        Method::PUT,
        "profile",
        &format!("profiles/{}", update.user_id),
        token,
        body,
      )
      .await?;
    Ok(profile.into())
  }
}
