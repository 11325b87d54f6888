//! In-memory [`SessionBackend`] for tests and offline use.
//!
//! Behaves like the hosted backend where it matters to the store: restore
//! truncates the log after the checkpointed turn, a second checkpoint for
//! the same turn is a conflict, and at most [`MAX_CHECKPOINTS`] are kept
//! per document. Calls are counted, and failures or delays can be
//! scripted per operation.

use crate::backend::{ApiResult, SessionBackend};
use crate::error::{ApiError, Operation};
use crate::types::{
    AssistantReply, Checkpoint, CheckpointId, Delivery, Document, DocumentMetadata, Message,
    MessageRequest, SessionId, SessionSnapshot, SessionSummary, TurnId,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

/// Oldest checkpoints beyond this many are dropped on create.
pub const MAX_CHECKPOINTS: usize = 3;

#[derive(Debug, Clone)]
struct StoredSession {
    document: Document,
    messages: Vec<Message>,
}

#[derive(Debug, Clone)]
struct StoredCheckpoint {
    turn: TurnId,
    checkpoint: Checkpoint,
}

#[derive(Debug, Default)]
struct State {
    next_session: u64,
    next_turn: u64,
    next_checkpoint: u64,
    sessions: BTreeMap<u64, StoredSession>,
    checkpoints: BTreeMap<CheckpointId, StoredCheckpoint>,
    calls: HashMap<Operation, usize>,
    failures: HashMap<Operation, VecDeque<ApiError>>,
    replies: VecDeque<(String, String)>,
    gates: HashMap<Operation, Arc<Notify>>,
}

impl State {
    fn session_mut(&mut self, id: u64) -> ApiResult<&mut StoredSession> {
        self.sessions.get_mut(&id).ok_or_else(|| not_found("Blog not found"))
    }

    fn snapshot(&self, id: u64) -> ApiResult<SessionSnapshot> {
        let stored = self.sessions.get(&id).ok_or_else(|| not_found("Blog not found"))?;
        Ok(SessionSnapshot {
            document: stored.document.clone(),
            messages: stored.messages.clone(),
        })
    }

    /// Owning session and log position of the assistant turn `turn`.
    fn find_turn(&self, turn: TurnId) -> Option<(u64, usize)> {
        self.sessions.iter().find_map(|(id, s)| {
            s.messages
                .iter()
                .position(|m| m.is_assistant() && m.turn_id == Some(turn))
                .map(|pos| (*id, pos))
        })
    }

    fn unlink(&mut self, checkpoint: CheckpointId) {
        for session in self.sessions.values_mut() {
            for m in session.messages.iter_mut() {
                if m.checkpoint == Some(checkpoint) {
                    m.checkpoint = None;
                }
            }
        }
    }
}

fn not_found(detail: &str) -> ApiError {
    ApiError::NotFound {
        detail: Some(detail.to_string()),
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means another test thread panicked.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed a document with an existing conversation. Returns its id.
    pub fn insert_session(
        &self,
        metadata: DocumentMetadata,
        content: &str,
        messages: Vec<Message>,
    ) -> u64 {
        let mut state = self.lock();
        state.next_session += 1;
        let id = state.next_session;
        for m in &messages {
            if let Some(TurnId(turn)) = m.turn_id {
                state.next_turn = state.next_turn.max(turn);
            }
            if let Some(cp) = m.checkpoint {
                state.next_checkpoint = state.next_checkpoint.max(cp.0);
            }
        }
        let now = Utc::now();
        state.sessions.insert(
            id,
            StoredSession {
                document: Document {
                    id: SessionId::Persisted(id),
                    metadata,
                    content: content.to_string(),
                    created_at: Some(now),
                    updated_at: Some(now),
                },
                messages,
            },
        );
        id
    }

    /// The next `send_message` answers with `text` and sets the document
    /// to `content`. An empty `content` leaves the document as it is.
    pub fn push_reply(&self, text: impl Into<String>, content: impl Into<String>) {
        self.lock().replies.push_back((text.into(), content.into()));
    }

    /// The next call of `op` fails with `error`.
    pub fn fail_next(&self, op: Operation, error: ApiError) {
        self.lock().failures.entry(op).or_default().push_back(error);
    }

    /// Hold every call of `op` until the returned handle is notified once
    /// per call.
    pub fn gate(&self, op: Operation) -> Arc<Notify> {
        self.lock()
            .gates
            .entry(op)
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    /// How many times `op` has been called.
    pub fn calls(&self, op: Operation) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Current stored content of a document.
    pub fn content(&self, id: u64) -> Option<String> {
        self.lock().sessions.get(&id).map(|s| s.document.content.clone())
    }

    pub fn checkpoint_count(&self) -> usize {
        self.lock().checkpoints.len()
    }

    /// Count the call, wait on its gate, then pop a scripted failure.
    async fn enter(&self, op: Operation) -> ApiResult<()> {
        let gate = {
            let mut state = self.lock();
            *state.calls.entry(op).or_default() += 1;
            state.gates.get(&op).cloned()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match self.lock().failures.get_mut(&op).and_then(|q| q.pop_front()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SessionBackend for MemoryBackend {
    async fn create_session(&self, metadata: &DocumentMetadata) -> ApiResult<SessionSnapshot> {
        self.enter(Operation::CreateSession).await?;
        let id = self.insert_session(metadata.clone(), "", Vec::new());
        self.lock().snapshot(id)
    }

    async fn list_sessions(&self) -> ApiResult<Vec<SessionSummary>> {
        self.enter(Operation::ListSessions).await?;
        Ok(self
            .lock()
            .sessions
            .iter()
            .map(|(id, s)| SessionSummary {
                id: *id,
                title: s.document.metadata.title.clone(),
            })
            .collect())
    }

    async fn fetch_session(&self, id: u64) -> ApiResult<SessionSnapshot> {
        self.enter(Operation::LoadSession).await?;
        self.lock().snapshot(id)
    }

    async fn update_content(&self, id: u64, content: &str) -> ApiResult<Document> {
        self.enter(Operation::UpdateContent).await?;
        let mut state = self.lock();
        let stored = state.session_mut(id)?;
        stored.document.content = content.to_string();
        stored.document.updated_at = Some(Utc::now());
        Ok(stored.document.clone())
    }

    async fn send_message(&self, request: &MessageRequest) -> ApiResult<AssistantReply> {
        self.enter(Operation::SendMessage).await?;
        let mut state = self.lock();
        let scripted = state.replies.pop_front();
        state.next_turn += 1;
        let turn = TurnId(state.next_turn);

        let stored = state.session_mut(request.session_id)?;
        let (text, content) = scripted.unwrap_or_else(|| {
            let content = if stored.document.content.is_empty() {
                request.user_message.clone()
            } else {
                format!("{}\n\n{}", stored.document.content, request.user_message)
            };
            ("Updated the draft.".to_string(), content)
        });

        stored.messages.push(
            Message::user(request.user_message.clone()).with_delivery(Delivery::Confirmed),
        );
        stored
            .messages
            .push(Message::assistant(text.clone(), Some(turn)));
        let content = Some(content).filter(|c| !c.is_empty());
        if let Some(content) = &content {
            stored.document.content = content.clone();
            stored.document.updated_at = Some(Utc::now());
        }

        Ok(AssistantReply {
            text,
            turn_id: turn,
            content,
        })
    }

    async fn create_checkpoint(&self, turn: TurnId) -> ApiResult<Checkpoint> {
        self.enter(Operation::CreateCheckpoint).await?;
        let mut state = self.lock();
        let (session_id, position) = state
            .find_turn(turn)
            .ok_or_else(|| not_found("Message not found"))?;

        let stored = state.session_mut(session_id)?;
        if let Some(existing) = stored.messages[position].checkpoint {
            return Err(ApiError::Conflict {
                detail: Some(format!("Message already has checkpoint {}", existing)),
            });
        }
        let content = stored.document.content.clone();

        let owned: Vec<CheckpointId> = state
            .checkpoints
            .iter()
            .filter(|(_, c)| c.checkpoint.session_id == Some(session_id))
            .map(|(id, _)| *id)
            .collect();
        if owned.len() >= MAX_CHECKPOINTS {
            let oldest = owned[0];
            state.checkpoints.remove(&oldest);
            state.unlink(oldest);
        }

        state.next_checkpoint += 1;
        let now = Utc::now();
        let checkpoint = Checkpoint {
            id: CheckpointId(state.next_checkpoint),
            content,
            created_at: now,
            updated_at: now,
            session_id: Some(session_id),
        };
        state.session_mut(session_id)?.messages[position].checkpoint = Some(checkpoint.id);
        state.checkpoints.insert(
            checkpoint.id,
            StoredCheckpoint {
                turn,
                checkpoint: checkpoint.clone(),
            },
        );
        Ok(checkpoint)
    }

    async fn fetch_checkpoint(&self, id: CheckpointId) -> ApiResult<Checkpoint> {
        self.enter(Operation::FetchCheckpoint).await?;
        self.lock()
            .checkpoints
            .get(&id)
            .map(|c| c.checkpoint.clone())
            .ok_or_else(|| not_found("Checkpoint not found"))
    }

    async fn restore_checkpoint(&self, id: CheckpointId) -> ApiResult<SessionSnapshot> {
        self.enter(Operation::RestoreCheckpoint).await?;
        let mut state = self.lock();
        let stored = state
            .checkpoints
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("Checkpoint not found"))?;
        let (session_id, position) = state
            .find_turn(stored.turn)
            .ok_or_else(|| not_found("Message not found"))?;

        let session = state.session_mut(session_id)?;
        let dropped: Vec<CheckpointId> = session
            .messages
            .drain(position + 1..)
            .filter_map(|m| m.checkpoint)
            .collect();
        session.document.content = stored.checkpoint.content.clone();
        session.document.updated_at = Some(Utc::now());
        for cp in dropped {
            state.checkpoints.remove(&cp);
        }
        state.snapshot(session_id)
    }

    async fn delete_checkpoint(&self, id: CheckpointId) -> ApiResult<()> {
        self.enter(Operation::DeleteCheckpoint).await?;
        let mut state = self.lock();
        if state.checkpoints.remove(&id).is_none() {
            return Err(not_found("Checkpoint not found"));
        }
        state.unlink(id);
        Ok(())
    }
}
