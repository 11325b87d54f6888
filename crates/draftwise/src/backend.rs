//! The collaborator seam: whatever persists documents and runs the model.

use crate::error::ApiError;
use crate::types::{
    AssistantReply, Checkpoint, CheckpointId, Document, DocumentMetadata, MessageRequest,
    SessionSnapshot, SessionSummary, TurnId,
};
use async_trait::async_trait;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Request/response operations on the document backend.
///
/// Implementations own transport, retries and timeouts. Error responses
/// should carry the backend's human-readable message in
/// [`ApiError::detail`] so it can be shown verbatim.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Create a document from a brief. The returned log is empty.
    async fn create_session(&self, metadata: &DocumentMetadata) -> ApiResult<SessionSnapshot>;

    async fn list_sessions(&self) -> ApiResult<Vec<SessionSummary>>;

    /// Full document and ordered conversation log.
    async fn fetch_session(&self, id: u64) -> ApiResult<SessionSnapshot>;

    /// Replace the document text wholesale.
    async fn update_content(&self, id: u64, content: &str) -> ApiResult<Document>;

    async fn send_message(&self, request: &MessageRequest) -> ApiResult<AssistantReply>;

    /// Fails with [`ApiError::Conflict`] if `turn` already has one.
    async fn create_checkpoint(&self, turn: TurnId) -> ApiResult<Checkpoint>;

    async fn fetch_checkpoint(&self, id: CheckpointId) -> ApiResult<Checkpoint>;

    /// Roll the session back to the checkpoint. Every later turn is gone
    /// from the returned log.
    async fn restore_checkpoint(&self, id: CheckpointId) -> ApiResult<SessionSnapshot>;

    async fn delete_checkpoint(&self, id: CheckpointId) -> ApiResult<()>;
}
