//! Async driver that runs store operations against a backend.
//!
//! Each operation locks the store to begin, releases it for the request,
//! and locks again to finish. The lock is never held across a backend
//! call, so closing or switching sessions can interleave with a request
//! in flight; the store's generation check discards whatever comes back.

use crate::backend::SessionBackend;
use crate::error::Result;
use crate::store::{Activity, Applied, Notice, SessionStore};
use crate::types::{Checkpoint, CheckpointId, DocumentMetadata, Message, SessionId, SessionSummary};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

pub struct Session<B> {
    backend: Arc<B>,
    store: Arc<Mutex<SessionStore>>,
}

impl<B> Clone for Session<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            store: Arc::clone(&self.store),
        }
    }
}

impl<B: SessionBackend> Session<B> {
    pub fn new(backend: B) -> Self {
        Self::with_backend(Arc::new(backend))
    }

    pub fn with_backend(backend: Arc<B>) -> Self {
        Self {
            backend,
            store: Arc::new(Mutex::new(SessionStore::new())),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Direct access to the store, for reads and local-only operations.
    pub async fn lock(&self) -> MutexGuard<'_, SessionStore> {
        self.store.lock().await
    }

    pub async fn activity(&self) -> Activity {
        self.store.lock().await.activity()
    }

    pub async fn take_notices(&self) -> Vec<Notice> {
        self.store.lock().await.take_notices()
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        self.store.lock().await.begin_list_sessions()?;
        let result = self.backend.list_sessions().await;
        self.store.lock().await.finish_list_sessions(result)
    }

    /// Switch to `id`, loading it when it is persisted.
    pub async fn open(&self, id: SessionId) -> Result<Applied<()>> {
        let Some(ticket) = self.store.lock().await.open(id)? else {
            return Ok(Applied::Done(()));
        };
        let result = self.backend.fetch_session(ticket.session_id).await;
        self.store.lock().await.finish_load(ticket, result)
    }

    pub async fn close(&self) {
        self.store.lock().await.close();
    }

    pub async fn create(&self, metadata: DocumentMetadata) -> Result<Applied<SessionId>> {
        let ticket = self.store.lock().await.begin_create(metadata)?;
        let result = self.backend.create_session(&ticket.metadata).await;
        self.store.lock().await.finish_create(ticket, result)
    }

    pub async fn send_message(&self, text: impl Into<String>) -> Result<Applied<Message>> {
        let ticket = self.store.lock().await.begin_send_message(text)?;
        let result = self.backend.send_message(&ticket.request).await;
        self.store.lock().await.finish_send_message(ticket, result)
    }

    pub async fn toggle_block(&self, id: &str) -> Result<bool> {
        self.store.lock().await.toggle_block(id)
    }

    pub async fn begin_manual_edit(&self) -> Result<()> {
        self.store.lock().await.begin_manual_edit()
    }

    pub async fn update_draft(&self, text: impl Into<String>) -> Result<()> {
        self.store.lock().await.update_draft(text)
    }

    pub async fn discard_manual_edit(&self) -> Result<()> {
        self.store.lock().await.discard_manual_edit()
    }

    /// Save the draft, or just leave manual mode when there is nothing to save.
    pub async fn commit_manual_edit(&self) -> Result<Applied<()>> {
        let Some(ticket) = self.store.lock().await.begin_commit_edit()? else {
            return Ok(Applied::Done(()));
        };
        let result = self
            .backend
            .update_content(ticket.session_id, &ticket.text)
            .await;
        self.store.lock().await.finish_commit_edit(ticket, result)
    }

    pub async fn create_checkpoint(&self) -> Result<Applied<CheckpointId>> {
        let ticket = self.store.lock().await.begin_create_checkpoint()?;
        let result = self.backend.create_checkpoint(ticket.turn_id).await;
        self.store.lock().await.finish_create_checkpoint(ticket, result)
    }

    /// Snapshot content for `id`, from the cache when already fetched.
    pub async fn view_checkpoint(&self, id: CheckpointId) -> Result<Applied<Checkpoint>> {
        let ticket = {
            let mut store = self.store.lock().await;
            if let Some(cached) = store.cached_checkpoint(id) {
                return Ok(Applied::Done(cached.clone()));
            }
            store.begin_fetch_checkpoint(id)?
        };
        let result = self.backend.fetch_checkpoint(ticket.checkpoint_id).await;
        self.store.lock().await.finish_fetch_checkpoint(ticket, result)
    }

    /// Destructive: every turn after the checkpointed one is dropped.
    pub async fn restore_checkpoint(&self, id: CheckpointId) -> Result<Applied<()>> {
        let ticket = self.store.lock().await.begin_restore_checkpoint(id)?;
        let result = self.backend.restore_checkpoint(ticket.checkpoint_id).await;
        self.store.lock().await.finish_restore_checkpoint(ticket, result)
    }

    pub async fn delete_checkpoint(&self, id: CheckpointId) -> Result<Applied<()>> {
        let ticket = self.store.lock().await.begin_delete_checkpoint(id)?;
        let result = self.backend.delete_checkpoint(ticket.checkpoint_id).await;
        self.store.lock().await.finish_delete_checkpoint(ticket, result)
    }
}
