//! Task, task list and task child operations of the cached client.

use tracing::debug;

use crate::cache::CacheResult;
use crate::error::{Result, SyncError};

use super::cached_client::CachedClient;
use super::source::RemoteSource;
use super::types::{
  ChildEnvelope, ChildKind, NewTask, NewTaskChild, TaskBundle, TaskChange, TaskChild, TaskId,
  TaskList, TaskSummary, UserId,
};

impl<R: RemoteSource> CachedClient<R> {
  // ==========================================================================
  // Task lists
  // ==========================================================================

  pub async fn list_tasks(&self) -> Result<CacheResult<TaskList>> {
    self
      .cache
      .fetch_one((), || {
        self
          .auth
          .call(|token| async move { self.remote.list_tasks(&token).await })
      })
      .await
  }

  /// Fetch the list and replace every cached summary with it.
  pub async fn refresh_tasks(&self) -> Result<CacheResult<TaskList>> {
    self
      .cache
      .refresh(|| {
        self
          .auth
          .call(|token| async move { self.remote.list_tasks(&token).await })
      })
      .await
  }

  /// Cached summaries created by `user_id`. Never contacts the server.
  pub fn tasks_created_by(&self, user_id: UserId) -> Result<Vec<TaskSummary>> {
    Ok(self.store().tasks_created_by(user_id)?)
  }

  /// Cached summaries assigned to `user_id`. Never contacts the server.
  pub fn tasks_assigned_to(&self, user_id: UserId) -> Result<Vec<TaskSummary>> {
    Ok(self.store().tasks_assigned_to(user_id)?)
  }

  // ==========================================================================
  // Tasks
  // ==========================================================================

  pub async fn get_task(&self, id: TaskId) -> Result<CacheResult<TaskBundle>> {
    self
      .cache
      .fetch_one(id, || {
        self
          .auth
          .call(|token| async move { self.remote.fetch_task(&token, id).await })
      })
      .await
  }

  /// Fetch the task and replace every cached row of it.
  pub async fn refresh_task(&self, id: TaskId) -> Result<CacheResult<TaskBundle>> {
    self
      .cache
      .refresh(|| {
        self
          .auth
          .call(|token| async move { self.remote.fetch_task(&token, id).await })
      })
      .await
  }

  pub async fn create_task(&self, task: &NewTask) -> Result<TaskBundle> {
    let bundle = self
      .auth
      .call(|token| async move { self.remote.create_task(&token, task).await })
      .await?;
    self.store().bulk_upsert_task(&bundle)?;
    debug!(task = bundle.task.id, "task created");
    Ok(bundle)
  }

  /// Edit a field shared by the task's summary and detail rows.
  pub async fn update_task(&self, id: TaskId, change: TaskChange) -> Result<()> {
    let change = &change;
    self
      .auth
      .call(|token| async move { self.remote.update_task(&token, id, change).await })
      .await?;
    self.store().update_shared_field(id, change)?;
    Ok(())
  }

  pub async fn delete_task(&self, id: TaskId) -> Result<()> {
    self
      .auth
      .call(|token| async move { self.remote.delete_task(&token, id).await })
      .await?;
    self.store().delete_task(id)?;
    Ok(())
  }

  // ==========================================================================
  // Task children
  // ==========================================================================

  /// A child of any task. Fetched children are cached only if their parent
  /// task is.
  pub async fn get_child(&self, kind: ChildKind, id: u64) -> Result<CacheResult<ChildEnvelope>> {
    self
      .cache
      .fetch_one((kind, id), || {
        self
          .auth
          .call(|token| async move { self.remote.fetch_child(&token, kind, id).await })
      })
      .await
  }

  pub async fn refresh_child(&self, kind: ChildKind, id: u64) -> Result<CacheResult<ChildEnvelope>> {
    self
      .cache
      .refresh(|| {
        self
          .auth
          .call(|token| async move { self.remote.fetch_child(&token, kind, id).await })
      })
      .await
  }

  /// Create a child on the server, then insert it and link it into the
  /// parent's id-list if the parent is cached.
  pub async fn add_child(&self, task_id: TaskId, child: NewTaskChild) -> Result<ChildEnvelope> {
    let child = &child;
    let envelope = self
      .auth
      .call(|token| async move { self.remote.create_child(&token, task_id, child).await })
      .await?;

    if envelope.child.task_id() != task_id {
      return Err(SyncError::Generic(format!(
        "server filed {} {} under task {}, not {}",
        envelope.child.kind(),
        envelope.child.id(),
        envelope.child.task_id(),
        task_id
      )));
    }

    if !self.store().upsert_child(&envelope.child, &envelope.users)? {
      self.store().upsert_users(&envelope.users)?;
      debug!(task = task_id, "parent not cached, child not stored");
    }
    Ok(envelope)
  }

  /// Send an edited child. Its cached row is replaced; id-lists are unchanged.
  pub async fn update_child(&self, child: TaskChild) -> Result<ChildEnvelope> {
    let child = &child;
    let envelope = self
      .auth
      .call(|token| async move { self.remote.update_child(&token, child).await })
      .await?;
    if envelope.child.id() != child.id() || envelope.child.kind() != child.kind() {
      return Err(SyncError::Generic(format!(
        "server answered {} {} for {} {}",
        envelope.child.kind(),
        envelope.child.id(),
        child.kind(),
        child.id()
      )));
    }
    self.store().upsert_child(&envelope.child, &envelope.users)?;
    Ok(envelope)
  }

  /// Delete a child on the server, then drop its row and unlink it from
  /// its parent's id-list.
  pub async fn remove_child(&self, kind: ChildKind, child_id: u64) -> Result<()> {
    self
      .auth
      .call(|token| async move { self.remote.delete_child(&token, kind, child_id).await })
      .await?;
    if let Some(child) = self.store().child(kind, child_id)? {
      self.store().remove_child(child.task_id(), kind, child_id)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use crate::api::cached_client::tests::logged_in;
  use crate::api::fake::task_bundle;
  use crate::api::types::*;
  use crate::cache::CacheSource;
  use crate::error::{ClientErrorKind, RemoteError, SyncError};
  use std::time::Duration;

  #[tokio::test]
  async fn test_get_task_caches_whole_aggregate() {
    let (remote, client) = logged_in();
    remote.seed_task(task_bundle(9, &[2], &[101, 102, 103]));

    let first = client.get_task(9).await.unwrap();
    assert_eq!(first.source, CacheSource::Network);
    let second = client.get_task(9).await.unwrap();
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(second.data, first.data);
    assert_eq!(remote.calls("fetch_task"), 1);

    assert_eq!(client.store().count("comments").unwrap(), 3);
    assert!(client.store().user(2).unwrap().is_some());
    assert!(client.store().verify_relations().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_concurrent_gets_fetch_once() {
    let (remote, client) = logged_in();
    remote.seed_task(task_bundle(42, &[1], &[]));
    remote.set_delay(Duration::from_millis(50));

    let results = futures::future::join_all((0..4).map(|_| client.get_task(42))).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(remote.calls("fetch_task"), 1);
  }

  #[tokio::test]
  async fn test_failed_fetch_leaves_store_untouched() {
    let (remote, client) = logged_in();
    remote.seed_task(task_bundle(9, &[2], &[101]));
    remote.fail("fetch_task", RemoteError::Server("overloaded".into()));

    let err = client.get_task(9).await.unwrap_err();
    assert!(matches!(err, SyncError::Server(ref m) if m == "overloaded"));
    assert!(err.is_retryable());
    assert_eq!(client.store().count("tasks").unwrap(), 0);
    assert_eq!(client.store().count("users").unwrap(), 0);
  }

  #[tokio::test]
  async fn test_refresh_replaces_removed_children() {
    let (remote, client) = logged_in();
    remote.seed_task(task_bundle(9, &[2], &[101, 102]));
    client.get_task(9).await.unwrap();

    remote.seed_task(task_bundle(9, &[2], &[102]));
    let fresh = client.refresh_task(9).await.unwrap();

    assert_eq!(fresh.source, CacheSource::Network);
    assert_eq!(client.store().task(9).unwrap().unwrap().comments, vec![102]);
    assert!(client.store().child(ChildKind::Comment, 101).unwrap().is_none());
    assert!(client.store().verify_relations().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_list_then_detail_share_fields() {
    let (remote, client) = logged_in();
    remote.seed_task(task_bundle(7, &[1, 2], &[]));
    remote.seed_task(task_bundle(8, &[12], &[]));

    let list = client.list_tasks().await.unwrap();
    assert_eq!(list.data.tasks.len(), 2);
    assert_eq!(client.list_tasks().await.unwrap().source, CacheSource::Cache);
    assert_eq!(remote.calls("list_tasks"), 1);

    client.get_task(7).await.unwrap();
    client
      .update_task(7, TaskChange::Title("Renamed".into()))
      .await
      .unwrap();

    assert_eq!(client.store().task_summary(7).unwrap().unwrap().title, "Renamed");
    assert_eq!(client.store().task(7).unwrap().unwrap().title, "Renamed");
    assert_eq!(remote.task(7).unwrap().task.title, "Renamed");

    let assigned: Vec<u64> = client.tasks_assigned_to(1).unwrap().iter().map(|t| t.id).collect();
    assert_eq!(assigned, vec![7]);
    assert_eq!(client.tasks_created_by(1).unwrap().len(), 2);
  }

  #[tokio::test]
  async fn test_assignee_removal_updates_both_rows_and_keeps_user() {
    let (remote, client) = logged_in();
    remote.seed_task(task_bundle(7, &[1, 2], &[]));
    client.list_tasks().await.unwrap();
    client.get_task(7).await.unwrap();

    client
      .update_task(7, TaskChange::Assignees(vec![1]))
      .await
      .unwrap();

    assert_eq!(client.store().task_summary(7).unwrap().unwrap().assignees, vec![1]);
    assert_eq!(client.store().task(7).unwrap().unwrap().assignees, vec![1]);
    assert!(client.store().user(2).unwrap().is_some());
    assert!(client.tasks_assigned_to(2).unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_failed_update_changes_nothing() {
    let (remote, client) = logged_in();
    remote.seed_task(task_bundle(7, &[1], &[]));
    client.get_task(7).await.unwrap();
    remote.fail(
      "update_task",
      RemoteError::Client {
        kind: ClientErrorKind::Forbidden,
        message: "not yours".into(),
      },
    );

    let err = client
      .update_task(7, TaskChange::Status(TaskStatus::Complete))
      .await
      .unwrap_err();

    assert_eq!(err.user_message(), "not yours");
    assert_eq!(client.store().task(7).unwrap().unwrap().status, TaskStatus::Open);
  }

  #[tokio::test]
  async fn test_create_and_delete_task() {
    let (remote, client) = logged_in();
    remote.seed_user(crate::api::fake::user(1));
    remote.seed_user(crate::api::fake::user(3));

    let created = client
      .create_task(&NewTask {
        title: "Write docs".into(),
        description: None,
        due: None,
        priority: Priority::High,
        task_type: TaskType::Milestone,
        assignees: vec![3],
      })
      .await
      .unwrap();
    let id = created.task.id;

    assert_eq!(client.get_task(id).await.unwrap().source, CacheSource::Cache);
    assert_eq!(client.store().task_summary(id).unwrap().unwrap().priority, Priority::High);
    assert!(client.store().user(3).unwrap().is_some());

    client
      .add_child(id, NewTaskChild::Comment { body: "first".into() })
      .await
      .unwrap();
    client.delete_task(id).await.unwrap();

    assert!(client.store().task(id).unwrap().is_none());
    assert!(client.store().task_summary(id).unwrap().is_none());
    assert_eq!(client.store().count("comments").unwrap(), 0);
    assert!(client.store().user(3).unwrap().is_some());
  }

  #[tokio::test]
  async fn test_add_and_remove_child() {
    let (remote, client) = logged_in();
    remote.seed_task(task_bundle(9, &[2], &[101, 102, 103]));
    client.get_task(9).await.unwrap();

    let added = client
      .add_child(9, NewTaskChild::Subtask { title: "half".into() })
      .await
      .unwrap();
    let task = client.store().task(9).unwrap().unwrap();
    assert_eq!(task.subtasks, vec![added.child.id()]);

    client.remove_child(ChildKind::Comment, 102).await.unwrap();
    let task = client.store().task(9).unwrap().unwrap();
    assert_eq!(task.comments, vec![101, 103]);
    assert!(client.store().child(ChildKind::Comment, 102).unwrap().is_none());
    assert!(client.store().verify_relations().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_failed_add_child_changes_nothing() {
    let (remote, client) = logged_in();
    remote.seed_task(task_bundle(9, &[2], &[101]));
    client.get_task(9).await.unwrap();
    remote.fail("create_child", RemoteError::Generic("timeout".into()));

    let err = client
      .add_child(9, NewTaskChild::Comment { body: "lost".into() })
      .await
      .unwrap_err();

    assert!(matches!(err, SyncError::Generic(_)));
    assert_eq!(client.store().task(9).unwrap().unwrap().comments, vec![101]);
    assert_eq!(client.store().count("comments").unwrap(), 1);
  }

  #[tokio::test]
  async fn test_child_of_uncached_task_is_not_stored() {
    let (remote, client) = logged_in();
    remote.seed_task(task_bundle(9, &[2], &[101]));

    let child = client.get_child(ChildKind::Comment, 101).await.unwrap();
    assert_eq!(child.source, CacheSource::Network);
    assert_eq!(client.store().count("comments").unwrap(), 0);

    client.get_task(9).await.unwrap();
    let child = client.get_child(ChildKind::Comment, 101).await.unwrap();
    assert_eq!(child.source, CacheSource::Cache);
    assert_eq!(remote.calls("fetch_child"), 1);
  }

  #[tokio::test]
  async fn test_add_child_after_local_delete_is_not_an_error() {
    let (remote, client) = logged_in();
    remote.seed_task(task_bundle(9, &[2], &[101]));
    client.get_task(9).await.unwrap();
    remote.set_delay(Duration::from_millis(50));

    let (added, _) = tokio::join!(
      client.add_child(9, NewTaskChild::Comment { body: "late".into() }),
      async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        client.store().delete_task(9).unwrap();
      }
    );

    let added = added.unwrap();
    assert_eq!(added.child.task_id(), 9);
    assert!(client.store().task(9).unwrap().is_none());
    assert_eq!(client.store().count("comments").unwrap(), 0);
    assert!(client.store().user(1).unwrap().is_some());
    assert!(client.store().verify_relations().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_update_child_replaces_row() {
    let (remote, client) = logged_in();
    remote.seed_task(task_bundle(9, &[2], &[101]));
    client.get_task(9).await.unwrap();

    let TaskChild::Comment(mut comment) = client.store().child(ChildKind::Comment, 101).unwrap().unwrap() else {
      panic!("expected a comment");
    };
    comment.body = "edited".into();
    client.update_child(TaskChild::Comment(comment)).await.unwrap();

    let TaskChild::Comment(stored) = client.store().child(ChildKind::Comment, 101).unwrap().unwrap() else {
      panic!("expected a comment");
    };
    assert_eq!(stored.body, "edited");
    assert_eq!(client.store().task(9).unwrap().unwrap().comments, vec![101]);
  }
}
