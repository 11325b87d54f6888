//! The session store: one owned state object for the open document.
//!
//! Every operation that talks to the backend is split in two. `begin_*`
//! checks the current state, applies optimistic effects and returns a
//! ticket; the caller performs the request and hands the outcome to the
//! matching `finish_*`. Tickets remember the session generation they were
//! issued under, and a `finish_*` for an older generation is discarded
//! without touching anything.

use crate::blocks::{ContextBlockIndex, ContextSelection};
use crate::checkpoint::CheckpointManager;
use crate::document::DocumentState;
use crate::error::{ApiError, Operation, Result, SessionError};
use crate::log::{AttachError, ConversationLog};
use crate::mode::{EditMode, EditModeController};
use crate::types::{
    AssistantReply, Checkpoint, CheckpointId, Delivery, Document, DocumentMetadata, Message,
    MessageRequest, SessionId, SessionSnapshot, SessionSummary, TurnId,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

// ── Activity ─────────────────────────────────────────────────────────

/// What the store is currently waiting on. At most one at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    #[default]
    Idle,
    Creating,
    Loading,
    Sending,
    Committing,
    Restoring,
    Checkpointing,
}

impl Activity {
    pub fn is_idle(self) -> bool {
        self == Activity::Idle
    }

    /// The document body is not available yet.
    pub fn document_loading(self) -> bool {
        matches!(self, Activity::Creating | Activity::Loading)
    }

    /// The conversation history is not available yet.
    pub fn chat_loading(self) -> bool {
        self == Activity::Loading
    }

    /// A request that rewrites the document is in flight.
    pub fn working_on_document(self) -> bool {
        matches!(
            self,
            Activity::Sending | Activity::Committing | Activity::Restoring
        )
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Activity::Idle => "idle",
            Activity::Creating => "creating",
            Activity::Loading => "loading",
            Activity::Sending => "sending",
            Activity::Committing => "committing",
            Activity::Restoring => "restoring",
            Activity::Checkpointing => "checkpointing",
        };
        write!(f, "{}", name)
    }
}

// ── Notices ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A user-facing message queued by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

// ── Tickets ──────────────────────────────────────────────────────────

/// Outcome of a `finish_*` call that was not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied<T> {
    Done(T),
    /// The session changed while the request was in flight; nothing was applied.
    Stale,
}

impl<T> Applied<T> {
    pub fn is_stale(&self) -> bool {
        matches!(self, Applied::Stale)
    }

    pub fn done(self) -> Option<T> {
        match self {
            Applied::Done(value) => Some(value),
            Applied::Stale => None,
        }
    }
}

#[derive(Debug)]
pub struct CreateTicket {
    generation: u64,
    pub metadata: DocumentMetadata,
}

#[derive(Debug)]
pub struct LoadTicket {
    generation: u64,
    pub session_id: u64,
}

#[derive(Debug)]
pub struct CommitTicket {
    generation: u64,
    pub session_id: u64,
    pub text: String,
}

#[derive(Debug)]
pub struct SendTicket {
    generation: u64,
    /// Log position of the optimistic user turn.
    position: usize,
    pub request: MessageRequest,
}

#[derive(Debug)]
pub struct CheckpointTicket {
    generation: u64,
    pub turn_id: TurnId,
}

#[derive(Debug)]
pub struct FetchTicket {
    generation: u64,
    pub checkpoint_id: CheckpointId,
}

#[derive(Debug)]
pub struct RestoreTicket {
    generation: u64,
    pub checkpoint_id: CheckpointId,
}

#[derive(Debug)]
pub struct DeleteTicket {
    generation: u64,
    pub checkpoint_id: CheckpointId,
}

// ── Store ────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SessionStore {
    /// Bumped on every teardown; tickets from older generations are stale.
    generation: u64,
    activity: Activity,
    unauthorized: bool,
    document: DocumentState,
    log: ConversationLog,
    selection: ContextSelection,
    checkpoints: CheckpointManager,
    mode: EditModeController,
    notices: Vec<Notice>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn activity(&self) -> Activity {
        self.activity
    }

    pub fn is_unauthorized(&self) -> bool {
        self.unauthorized
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.document.id()
    }

    pub fn document(&self) -> &DocumentState {
        &self.document
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn selection(&self) -> &ContextSelection {
        &self.selection
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    pub fn edit_mode(&self) -> EditMode {
        self.mode.mode()
    }

    /// Blocks of the current canonical text.
    pub fn blocks(&self) -> ContextBlockIndex<'_> {
        ContextBlockIndex::new(self.document.text())
    }

    /// Cached snapshot for `id`, when its content has already been fetched.
    pub fn cached_checkpoint(&self, id: CheckpointId) -> Option<&Checkpoint> {
        self.checkpoints.get(id).and_then(|c| c.snapshot.as_ref())
    }

    /// Drain queued notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Tear down and bind to `id`. A persisted id starts loading and
    /// yields a ticket; `SessionId::New` leaves a blank unsaved session.
    pub fn open(&mut self, id: SessionId) -> Result<Option<LoadTicket>> {
        self.require_authorized()?;
        self.teardown();
        self.document.bind(id);
        info!(session = %id, "session opened");
        match id {
            SessionId::New => Ok(None),
            SessionId::Persisted(session_id) => {
                self.activity = Activity::Loading;
                Ok(Some(LoadTicket {
                    generation: self.generation,
                    session_id,
                }))
            }
        }
    }

    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: std::result::Result<SessionSnapshot, ApiError>,
    ) -> Result<Applied<()>> {
        let Some(result) = self.settle(Operation::LoadSession, ticket.generation, true, result)
        else {
            return Ok(Applied::Stale);
        };
        self.install(result?);
        Ok(Applied::Done(()))
    }

    /// Leave the current session. In-flight responses become stale.
    pub fn close(&mut self) {
        if let Some(id) = self.document.id() {
            info!(session = %id, "session closed");
        }
        self.teardown();
    }

    /// Acknowledge re-authentication.
    pub fn clear_unauthorized(&mut self) {
        self.unauthorized = false;
    }

    /// Validate `metadata` and start creating a document from it. Binds
    /// the store to a fresh unsaved session if it is not already on one.
    pub fn begin_create(&mut self, metadata: DocumentMetadata) -> Result<CreateTicket> {
        self.require_authorized()?;
        self.require_idle()?;
        metadata.validate()?;
        if !self.document.is_unsaved() {
            self.teardown();
            self.document.bind(SessionId::New);
        }
        self.activity = Activity::Creating;
        Ok(CreateTicket {
            generation: self.generation,
            metadata,
        })
    }

    /// On success returns the id the backend assigned.
    pub fn finish_create(
        &mut self,
        ticket: CreateTicket,
        result: std::result::Result<SessionSnapshot, ApiError>,
    ) -> Result<Applied<SessionId>> {
        let Some(result) = self.settle(Operation::CreateSession, ticket.generation, true, result)
        else {
            return Ok(Applied::Stale);
        };
        let snapshot = result?;
        let id = snapshot.document.id;
        self.install(snapshot);
        info!(session = %id, "document created");
        Ok(Applied::Done(id))
    }

    pub fn begin_list_sessions(&self) -> Result<()> {
        self.require_authorized()
    }

    /// Listing is not bound to a session, so it is never stale.
    pub fn finish_list_sessions(
        &mut self,
        result: std::result::Result<Vec<SessionSummary>, ApiError>,
    ) -> Result<Vec<SessionSummary>> {
        result.map_err(|err| self.fail(Operation::ListSessions, &err))
    }

    // ── Manual editing ───────────────────────────────────────────────

    /// Switch to manual editing with the draft seeded from the document.
    pub fn begin_manual_edit(&mut self) -> Result<()> {
        self.require_authorized()?;
        if self.document.id().is_none() {
            return Err(SessionError::NoSession);
        }
        self.mode.enter_manual(self.activity)?;
        self.document.begin_draft();
        debug!("manual edit started");
        Ok(())
    }

    pub fn update_draft(&mut self, text: impl Into<String>) -> Result<()> {
        self.mode.require_manual()?;
        if self.activity == Activity::Committing {
            return Err(SessionError::Busy(self.activity));
        }
        self.document.update_draft(text);
        Ok(())
    }

    /// Drop the draft and return to AI-driven mode without saving.
    pub fn discard_manual_edit(&mut self) -> Result<()> {
        self.mode.require_manual()?;
        if self.activity == Activity::Committing {
            return Err(SessionError::Busy(self.activity));
        }
        self.document.clear_draft();
        self.mode.exit_manual();
        debug!("manual edit discarded");
        Ok(())
    }

    /// Start saving the draft.
    ///
    /// Returns `None` when there is nothing to send (empty draft, or a
    /// document that was never saved); manual mode is left in that case.
    pub fn begin_commit_edit(&mut self) -> Result<Option<CommitTicket>> {
        self.require_authorized()?;
        self.mode.require_manual()?;
        self.require_idle()?;
        let session_id = match self.document.id() {
            Some(SessionId::Persisted(id)) if self.document.has_draft() => id,
            _ => {
                self.document.clear_draft();
                self.mode.exit_manual();
                debug!("manual edit closed without saving");
                return Ok(None);
            }
        };
        self.activity = Activity::Committing;
        Ok(Some(CommitTicket {
            generation: self.generation,
            session_id,
            text: self.document.draft().to_string(),
        }))
    }

    /// On failure the draft and manual mode are kept for a retry.
    pub fn finish_commit_edit(
        &mut self,
        ticket: CommitTicket,
        result: std::result::Result<Document, ApiError>,
    ) -> Result<Applied<()>> {
        let Some(result) = self.settle(Operation::UpdateContent, ticket.generation, true, result)
        else {
            return Ok(Applied::Stale);
        };
        let document = result?;
        self.document.apply(document);
        self.selection.clear();
        self.mode.exit_manual();
        self.notices.push(Notice::info("Document saved"));
        Ok(Applied::Done(()))
    }

    // ── Chat ─────────────────────────────────────────────────────────

    /// Append the user turn as pending and build the request.
    ///
    /// Refused without any state change while a manual edit is open.
    pub fn begin_send_message(&mut self, text: impl Into<String>) -> Result<SendTicket> {
        self.require_authorized()?;
        self.mode.require_ai_driven()?;
        let session_id = self.require_persisted()?;
        self.require_idle()?;
        let text = text.into();
        if text.trim().is_empty() {
            return Err(SessionError::Validation("Message is required.".into()));
        }

        let position = self.log.append(Message::user(text.clone()));
        let request = MessageRequest {
            session_id,
            metadata: self.document.metadata().clone(),
            user_message: text,
            selected_context: self.selection.texts(),
        };
        self.activity = Activity::Sending;
        debug!(
            session = session_id,
            context_blocks = request.selected_context.len(),
            "sending message"
        );
        Ok(SendTicket {
            generation: self.generation,
            position,
            request,
        })
    }

    /// Settle the pending user turn and apply the reply. On success returns
    /// the appended assistant turn. A failed send keeps the user turn,
    /// marked as failed.
    pub fn finish_send_message(
        &mut self,
        ticket: SendTicket,
        result: std::result::Result<AssistantReply, ApiError>,
    ) -> Result<Applied<Message>> {
        let Some(result) = self.settle(Operation::SendMessage, ticket.generation, true, result)
        else {
            return Ok(Applied::Stale);
        };
        let reply = match result {
            Ok(reply) => reply,
            Err(err) => {
                self.log.set_delivery(
                    ticket.position,
                    Delivery::Failed {
                        reason: err.to_string(),
                    },
                );
                return Err(err);
            }
        };

        self.log.set_delivery(ticket.position, Delivery::Confirmed);
        let message = Message::assistant(reply.text, Some(reply.turn_id));
        self.log.append(message.clone());
        // no content means the backend kept the text as it was
        if let Some(content) = reply.content {
            self.document.load(content);
            self.selection.clear();
        }
        Ok(Applied::Done(message))
    }

    // ── Context selection ────────────────────────────────────────────

    /// Toggle a block of the current text in or out of the selection.
    /// Returns whether it is selected afterwards.
    pub fn toggle_block(&mut self, id: &str) -> Result<bool> {
        if self.document.id().is_none() {
            return Err(SessionError::NoSession);
        }
        if self.selection.remove(id) {
            return Ok(false);
        }
        let block = ContextBlockIndex::new(self.document.text())
            .get(id)
            .ok_or_else(|| SessionError::UnknownBlock(id.to_string()))?;
        Ok(self.selection.toggle(&block))
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // ── Checkpoints ──────────────────────────────────────────────────

    /// Start checkpointing the latest assistant turn.
    pub fn begin_create_checkpoint(&mut self) -> Result<CheckpointTicket> {
        self.require_authorized()?;
        self.require_persisted()?;
        self.require_idle()?;
        let Some(turn_id) = self.log.latest_restorable_turn().and_then(|m| m.turn_id) else {
            return Err(match self.log.last().and_then(|m| m.checkpoint) {
                Some(existing) => SessionError::AlreadyCheckpointed(existing),
                None => SessionError::NothingToCheckpoint,
            });
        };
        self.activity = Activity::Checkpointing;
        Ok(CheckpointTicket {
            generation: self.generation,
            turn_id,
        })
    }

    /// Link the new checkpoint to its turn and cache the snapshot.
    pub fn finish_create_checkpoint(
        &mut self,
        ticket: CheckpointTicket,
        result: std::result::Result<Checkpoint, ApiError>,
    ) -> Result<Applied<CheckpointId>> {
        let Some(result) =
            self.settle(Operation::CreateCheckpoint, ticket.generation, true, result)
        else {
            return Ok(Applied::Stale);
        };
        let checkpoint = result?;
        let id = checkpoint.id;

        let latest = self.log.iter().rev().find(|m| m.is_assistant());
        if latest.and_then(|m| m.turn_id) != Some(ticket.turn_id) {
            warn!(turn = %ticket.turn_id, checkpoint = %id, "checkpointed turn is no longer the latest");
            return Err(SessionError::NothingToCheckpoint);
        }
        self.log.attach_checkpoint(id).map_err(|e| match e {
            AttachError::AlreadyLinked(existing) => SessionError::AlreadyCheckpointed(existing),
            AttachError::NoAssistantTurn => SessionError::NothingToCheckpoint,
        })?;
        self.checkpoints.record_created(ticket.turn_id, checkpoint);
        info!(turn = %ticket.turn_id, checkpoint = %id, "checkpoint created");
        self.notices.push(Notice::info("Checkpoint created"));
        Ok(Applied::Done(id))
    }

    /// Fetching is read-only and may overlap other work.
    pub fn begin_fetch_checkpoint(&mut self, checkpoint_id: CheckpointId) -> Result<FetchTicket> {
        self.require_authorized()?;
        Ok(FetchTicket {
            generation: self.generation,
            checkpoint_id,
        })
    }

    pub fn finish_fetch_checkpoint(
        &mut self,
        ticket: FetchTicket,
        result: std::result::Result<Checkpoint, ApiError>,
    ) -> Result<Applied<Checkpoint>> {
        let Some(result) =
            self.settle(Operation::FetchCheckpoint, ticket.generation, false, result)
        else {
            return Ok(Applied::Stale);
        };
        let checkpoint = result?;
        self.checkpoints.record_fetched(checkpoint.clone());
        Ok(Applied::Done(checkpoint))
    }

    /// Start restoring. The caller is expected to have confirmed with the
    /// user: every turn after the checkpointed one is lost.
    pub fn begin_restore_checkpoint(
        &mut self,
        checkpoint_id: CheckpointId,
    ) -> Result<RestoreTicket> {
        self.require_authorized()?;
        self.mode.require_ai_driven()?;
        self.require_persisted()?;
        self.require_idle()?;
        self.activity = Activity::Restoring;
        Ok(RestoreTicket {
            generation: self.generation,
            checkpoint_id,
        })
    }

    /// Replace document and log with the backend's post-restore state.
    pub fn finish_restore_checkpoint(
        &mut self,
        ticket: RestoreTicket,
        result: std::result::Result<SessionSnapshot, ApiError>,
    ) -> Result<Applied<()>> {
        let Some(result) =
            self.settle(Operation::RestoreCheckpoint, ticket.generation, true, result)
        else {
            return Ok(Applied::Stale);
        };
        self.install(result?);
        info!(checkpoint = %ticket.checkpoint_id, turns = self.log.len(), "checkpoint restored");
        self.notices.push(Notice::info("Checkpoint restored"));
        Ok(Applied::Done(()))
    }

    pub fn begin_delete_checkpoint(&mut self, checkpoint_id: CheckpointId) -> Result<DeleteTicket> {
        self.require_authorized()?;
        self.require_persisted()?;
        if matches!(
            self.activity,
            Activity::Creating | Activity::Loading | Activity::Restoring | Activity::Checkpointing
        ) {
            return Err(SessionError::Busy(self.activity));
        }
        Ok(DeleteTicket {
            generation: self.generation,
            checkpoint_id,
        })
    }

    /// Drop the checkpoint from the cache and unlink it from its turn.
    pub fn finish_delete_checkpoint(
        &mut self,
        ticket: DeleteTicket,
        result: std::result::Result<(), ApiError>,
    ) -> Result<Applied<()>> {
        let Some(result) =
            self.settle(Operation::DeleteCheckpoint, ticket.generation, false, result)
        else {
            return Ok(Applied::Stale);
        };
        result?;
        self.checkpoints.remove(ticket.checkpoint_id);
        self.log.detach_checkpoint(ticket.checkpoint_id);
        self.notices.push(Notice::info("Checkpoint deleted"));
        Ok(Applied::Done(()))
    }

    // ── Internals ────────────────────────────────────────────────────

    fn teardown(&mut self) {
        self.generation += 1;
        self.activity = Activity::Idle;
        self.document.unbind();
        self.log.clear();
        self.selection.clear();
        self.checkpoints.invalidate();
        self.mode.exit_manual();
        debug!(generation = self.generation, "session state torn down");
    }

    /// Apply a full backend snapshot. Selection and cache never survive it.
    fn install(&mut self, snapshot: SessionSnapshot) {
        self.document.apply(snapshot.document);
        self.log.replace_all(snapshot.messages);
        self.selection.clear();
        self.checkpoints.seed_from_log(&self.log);
        self.mode.exit_manual();
    }

    /// Common tail of every `finish_*`: `None` for a stale ticket, else
    /// the result with backend failures converted. `releases` is set for
    /// operations that occupy the activity slot.
    fn settle<T>(
        &mut self,
        op: Operation,
        generation: u64,
        releases: bool,
        result: std::result::Result<T, ApiError>,
    ) -> Option<Result<T>> {
        if generation != self.generation {
            debug!(%op, ticket = generation, current = self.generation, "discarding stale response");
            return None;
        }
        if releases {
            self.activity = Activity::Idle;
        }
        Some(result.map_err(|err| self.fail(op, &err)))
    }

    fn fail(&mut self, op: Operation, err: &ApiError) -> SessionError {
        let error = SessionError::from_api(op, err);
        if error == SessionError::Unauthorized {
            warn!(%op, "backend rejected credentials, closing session");
            self.unauthorized = true;
            self.teardown();
        } else {
            warn!(%op, error = %err, "backend call failed");
        }
        self.notices.push(Notice::error(error.to_string()));
        error
    }

    fn require_authorized(&self) -> Result<()> {
        if self.unauthorized {
            Err(SessionError::Unauthorized)
        } else {
            Ok(())
        }
    }

    fn require_idle(&self) -> Result<()> {
        if self.activity.is_idle() {
            Ok(())
        } else {
            Err(SessionError::Busy(self.activity))
        }
    }

    fn require_persisted(&self) -> Result<u64> {
        match self.document.id() {
            None => Err(SessionError::NoSession),
            Some(SessionId::New) => Err(SessionError::UnsavedSession),
            Some(SessionId::Persisted(id)) => Ok(id),
        }
    }
}
