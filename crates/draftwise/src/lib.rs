#![doc = include_str!("../README.md")]

pub mod backend;
pub mod blocks;
pub mod checkpoint;
pub mod document;
pub mod error;
pub mod export;
pub mod log;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod mode;
pub mod session;
pub mod store;
pub mod types;
pub mod validate;

pub use backend::{ApiResult, SessionBackend};
pub use blocks::{ContextBlock, ContextBlockIndex, ContextSelection, SelectedBlock};
pub use checkpoint::{CachedCheckpoint, CheckpointManager};
pub use document::DocumentState;
pub use error::{ApiError, Operation, Result, SessionError};
pub use export::ExportFormat;
pub use log::ConversationLog;
#[cfg(any(test, feature = "memory"))]
pub use memory::MemoryBackend;
pub use mode::{EditMode, EditModeController};
pub use session::Session;
pub use store::{Activity, Applied, Notice, NoticeLevel, SessionStore};
pub use types::{
    AssistantReply, Checkpoint, CheckpointId, Delivery, Document, DocumentMetadata, Message,
    MessageRequest, Role, SessionId, SessionSnapshot, SessionSummary, TurnId,
};
