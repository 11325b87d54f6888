use crate::store::Activity;
use crate::types::CheckpointId;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

/// Failure reported by the backend collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("unauthorized{}", fmt_detail(.detail))]
    Unauthorized { detail: Option<String> },

    #[error("conflict{}", fmt_detail(.detail))]
    Conflict { detail: Option<String> },

    #[error("not found{}", fmt_detail(.detail))]
    NotFound { detail: Option<String> },

    #[error("HTTP {status}{}", fmt_detail(.detail))]
    Status { status: u16, detail: Option<String> },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

fn fmt_detail(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|d| format!(": {}", d))
        .unwrap_or_default()
}

impl ApiError {
    /// Human-readable message supplied by the backend, if it sent one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { detail }
            | ApiError::Conflict { detail }
            | ApiError::NotFound { detail }
            | ApiError::Status { detail, .. } => detail.as_deref(),
            ApiError::Transport(_) | ApiError::Decode(_) => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}

/// The collaborator call an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateSession,
    ListSessions,
    LoadSession,
    UpdateContent,
    SendMessage,
    CreateCheckpoint,
    FetchCheckpoint,
    RestoreCheckpoint,
    DeleteCheckpoint,
}

impl Operation {
    /// Message shown when the backend gave no detail of its own.
    pub fn fallback_message(&self) -> &'static str {
        match self {
            Operation::CreateSession => "Failed to create document",
            Operation::ListSessions => "Failed to fetch documents",
            Operation::LoadSession => "Failed to fetch document",
            Operation::UpdateContent => "Failed to update document",
            Operation::SendMessage => "Failed to create message",
            Operation::CreateCheckpoint => "Failed to create checkpoint",
            Operation::FetchCheckpoint => "Failed to fetch checkpoint",
            Operation::RestoreCheckpoint => "Failed to restore checkpoint",
            Operation::DeleteCheckpoint => "Failed to delete checkpoint",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::CreateSession => "create session",
            Operation::ListSessions => "list sessions",
            Operation::LoadSession => "load session",
            Operation::UpdateContent => "update content",
            Operation::SendMessage => "send message",
            Operation::CreateCheckpoint => "create checkpoint",
            Operation::FetchCheckpoint => "fetch checkpoint",
            Operation::RestoreCheckpoint => "restore checkpoint",
            Operation::DeleteCheckpoint => "delete checkpoint",
        };
        write!(f, "{}", name)
    }
}

/// Errors surfaced by session store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Client-side input check failed; nothing was sent.
    #[error("{0}")]
    Validation(String),

    #[error("{detail}")]
    Load { detail: String },

    #[error("{detail}")]
    Mutation { op: Operation, detail: String },

    /// The backend rejected our credentials; the session has been torn down.
    #[error("not authorized, sign in again")]
    Unauthorized,

    #[error("another operation is in progress ({0})")]
    Busy(Activity),

    #[error("manual edit in progress")]
    ManualEditActive,

    #[error("not in manual edit mode")]
    NotEditing,

    #[error("no session is open")]
    NoSession,

    #[error("the document has not been saved yet")]
    UnsavedSession,

    #[error("no assistant turn is available to checkpoint")]
    NothingToCheckpoint,

    #[error("turn already has checkpoint {0}")]
    AlreadyCheckpointed(CheckpointId),

    #[error("no block {0} in the current document")]
    UnknownBlock(String),
}

impl SessionError {
    /// Convert a backend failure for `op`, keeping the backend's own
    /// message verbatim when present.
    pub fn from_api(op: Operation, err: &ApiError) -> Self {
        if err.is_unauthorized() {
            return SessionError::Unauthorized;
        }
        let detail = err
            .detail()
            .unwrap_or_else(|| op.fallback_message())
            .to_string();
        match op {
            Operation::LoadSession => SessionError::Load { detail },
            _ => SessionError::Mutation { op, detail },
        }
    }
}
