//! Conversation and reply operations of the cached client.

use tracing::debug;

use crate::cache::CacheResult;
use crate::error::{Result, SyncError};

use super::cached_client::CachedClient;
use super::source::RemoteSource;
use super::types::{MessageBundle, MessageId, MessageList, ReplyEnvelope};

impl<R: RemoteSource> CachedClient<R> {
  pub async fn list_messages(&self) -> Result<CacheResult<MessageList>> {
    self
      .cache
      .fetch_one((), || {
        self
          .auth
          .call(|token| async move { self.remote.list_messages(&token).await })
      })
      .await
  }

  pub async fn refresh_messages(&self) -> Result<CacheResult<MessageList>> {
    self
      .cache
      .refresh(|| {
        self
          .auth
          .call(|token| async move { self.remote.list_messages(&token).await })
      })
      .await
  }

  pub async fn get_message(&self, id: MessageId) -> Result<CacheResult<MessageBundle>> {
    self
      .cache
      .fetch_one(id, || {
        self
          .auth
          .call(|token| async move { self.remote.fetch_message(&token, id).await })
      })
      .await
  }

  pub async fn refresh_message(&self, id: MessageId) -> Result<CacheResult<MessageBundle>> {
    self
      .cache
      .refresh(|| {
        self
          .auth
          .call(|token| async move { self.remote.fetch_message(&token, id).await })
      })
      .await
  }

  /// Rename a conversation in both its summary and detail rows.
  pub async fn update_message_title(&self, id: MessageId, title: &str) -> Result<()> {
    self
      .auth
      .call(|token| async move { self.remote.update_message_title(&token, id, title).await })
      .await?;
    self.store().update_message_title(id, title)?;
    Ok(())
  }

  pub async fn delete_message(&self, id: MessageId) -> Result<()> {
    self
      .auth
      .call(|token| async move { self.remote.delete_message(&token, id).await })
      .await?;
    self.store().delete_message(id)?;
    Ok(())
  }

  // ==========================================================================
  // Replies
  // ==========================================================================

  pub async fn get_reply(&self, id: u64) -> Result<CacheResult<ReplyEnvelope>> {
    self
      .cache
      .fetch_one(id, || {
        self
          .auth
          .call(|token| async move { self.remote.fetch_reply(&token, id).await })
      })
      .await
  }

  pub async fn refresh_reply(&self, id: u64) -> Result<CacheResult<ReplyEnvelope>> {
    self
      .cache
      .refresh(|| {
        self
          .auth
          .call(|token| async move { self.remote.fetch_reply(&token, id).await })
      })
      .await
  }

  /// Post a reply, then link it into the cached conversation if there is one.
  pub async fn add_reply(&self, message_id: MessageId, body: &str) -> Result<ReplyEnvelope> {
    let envelope = self
      .auth
      .call(|token| async move { self.remote.create_reply(&token, message_id, body).await })
      .await?;

    if envelope.reply.message_id != message_id {
      return Err(SyncError::Generic(format!(
        "server filed reply {} under message {}, not {}",
        envelope.reply.id, envelope.reply.message_id, message_id
      )));
    }

    if !self.store().upsert_reply(&envelope.reply, &envelope.users)? {
      self.store().upsert_users(&envelope.users)?;
      debug!(message = message_id, "conversation not cached, reply not stored");
    }
    Ok(envelope)
  }

  pub async fn remove_reply(&self, reply_id: u64) -> Result<()> {
    self
      .auth
      .call(|token| async move { self.remote.delete_reply(&token, reply_id).await })
      .await?;
    if let Some(reply) = self.store().reply(reply_id)? {
      self.store().remove_reply(reply.message_id, reply_id)?;
    }
    Ok(())
  }
}
