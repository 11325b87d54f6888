use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ── Identities ───────────────────────────────────────────────────────

/// Identity of the document a session is bound to.
///
/// `New` is the sentinel for a document that has not been persisted yet;
/// it is written and parsed as the literal string `"new"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum SessionId {
    New,
    Persisted(u64),
}

impl SessionId {
    pub fn is_new(&self) -> bool {
        matches!(self, SessionId::New)
    }

    /// The persisted id, if any.
    pub fn persisted(&self) -> Option<u64> {
        match self {
            SessionId::New => None,
            SessionId::Persisted(id) => Some(*id),
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionId::New => write!(f, "new"),
            SessionId::Persisted(id) => write!(f, "{}", id),
        }
    }
}

impl FromStr for SessionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "new" {
            return Ok(SessionId::New);
        }
        s.parse::<u64>()
            .map(SessionId::Persisted)
            .map_err(|_| format!("invalid session id: {:?}", s))
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for SessionId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Identifier of an assistant turn, as assigned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(pub u64);

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a persisted checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointId(pub u64);

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CheckpointId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(CheckpointId)
    }
}

// ── Conversation ─────────────────────────────────────────────────────

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Delivery status of a turn.
///
/// A user turn is appended as `Pending` before the backend answers and
/// settles to `Confirmed` or `Failed`. Turns loaded from the backend are
/// always `Confirmed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Delivery {
    Pending,
    Confirmed,
    Failed { reason: String },
}

impl Delivery {
    pub fn is_failed(&self) -> bool {
        matches!(self, Delivery::Failed { .. })
    }
}

/// A single turn in the conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,

    /// Display text.
    pub text: String,

    /// When the turn happened. Display-only, never an ordering key.
    pub timestamp: Option<DateTime<Utc>>,

    /// Checkpoint linked to this turn. Only ever set on assistant turns.
    pub checkpoint: Option<CheckpointId>,

    /// Backend identifier, needed to checkpoint the turn. Assistant turns only.
    pub turn_id: Option<TurnId>,

    pub delivery: Delivery,
}

impl Message {
    /// A user turn that has not been acknowledged yet.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            timestamp: Some(Utc::now()),
            checkpoint: None,
            turn_id: None,
            delivery: Delivery::Pending,
        }
    }

    pub fn assistant(text: impl Into<String>, turn_id: Option<TurnId>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            timestamp: Some(Utc::now()),
            checkpoint: None,
            turn_id,
            delivery: Delivery::Confirmed,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Link a checkpoint. Ignored on user turns.
    pub fn with_checkpoint(mut self, checkpoint: CheckpointId) -> Self {
        if self.role == Role::Assistant {
            self.checkpoint = Some(checkpoint);
        }
        self
    }

    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    /// Local `HH:MM` label for display.
    pub fn time_label(&self) -> Option<String> {
        self.timestamp
            .map(|t| t.with_timezone(&Local).format("%H:%M").to_string())
    }
}

// ── Document ─────────────────────────────────────────────────────────

/// Authoring brief attached to a document and echoed on every chat turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: String,
    pub description: String,
    pub desired_tone: String,
    pub target_audience: String,
    pub length_min: u32,
    pub length_max: u32,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// A persisted document as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: SessionId,
    pub metadata: DocumentMetadata,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Lightweight listing entry for a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: u64,
    pub title: String,
}

/// Full session state as the backend sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub document: Document,
    pub messages: Vec<Message>,
}

// ── Checkpoints ──────────────────────────────────────────────────────

/// A restorable snapshot of the document, linked to one assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub session_id: Option<u64>,
}

// ── Chat exchange ────────────────────────────────────────────────────

/// Payload for a chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRequest {
    pub session_id: u64,
    pub metadata: DocumentMetadata,
    pub user_message: String,
    /// Verbatim text of each selected context block.
    pub selected_context: Vec<String>,
}

/// What the backend answers to a chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantReply {
    pub text: String,
    pub turn_id: TurnId,
    /// The rewritten document. `None` when the backend left it unchanged.
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_parse() {
        assert_eq!("new".parse::<SessionId>().unwrap(), SessionId::New);
        assert_eq!(" 42 ".parse::<SessionId>().unwrap(), SessionId::Persisted(42));
        assert!("abc".parse::<SessionId>().is_err());
    }

    #[test]
    fn test_session_id_display() {
        assert_eq!(SessionId::New.to_string(), "new");
        assert_eq!(SessionId::Persisted(7).to_string(), "7");
        assert!(SessionId::New.is_new());
        assert_eq!(SessionId::Persisted(7).persisted(), Some(7));
        assert_eq!(SessionId::New.persisted(), None);
    }

    #[test]
    fn test_session_id_serde_as_string() {
        let json = serde_json::to_string(&SessionId::Persisted(3)).unwrap();
        assert_eq!(json, "\"3\"");
        let back: SessionId = serde_json::from_str("\"new\"").unwrap();
        assert_eq!(back, SessionId::New);
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }

    #[test]
    fn test_user_message_starts_pending() {
        let m = Message::user("Write about cats");
        assert_eq!(m.role, Role::User);
        assert_eq!(m.delivery, Delivery::Pending);
        assert!(m.turn_id.is_none());
        assert!(m.time_label().is_some());
    }

    #[test]
    fn test_checkpoint_only_on_assistant() {
        let user = Message::user("hi").with_checkpoint(CheckpointId(1));
        assert!(user.checkpoint.is_none());

        let assistant =
            Message::assistant("hello", Some(TurnId(3))).with_checkpoint(CheckpointId(1));
        assert_eq!(assistant.checkpoint, Some(CheckpointId(1)));
    }

    #[test]
    fn test_delivery_serde_tagged() {
        let json = serde_json::to_value(Delivery::Failed {
            reason: "boom".into(),
        })
        .unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "boom");
        assert!(
            Delivery::Failed {
                reason: String::new()
            }
            .is_failed()
        );
    }
}
