//! JSON records exchanged with the blog API and their mapping onto
//! `draftwise` types.
//!
//! Messages are stored server-side as one row per exchange and served as
//! two entries, `user_<id>` and `assistant_<id>`; the row id is the turn id.

use chrono::{DateTime, NaiveDateTime, Utc};
use draftwise::{
    ApiError, AssistantReply, Checkpoint, CheckpointId, Delivery, Document, DocumentMetadata,
    Message, MessageRequest, Role, SessionId, SessionSnapshot, SessionSummary, TurnId,
};
use serde::{Deserialize, Deserializer, Serialize};

// ── Requests ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CreateBlogRequest<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub desired_tone: &'a str,
    pub seo_keywords: &'a [String],
    pub target_audience: &'a str,
    pub blog_length_min: u32,
    pub blog_length_max: u32,
}

impl<'a> From<&'a DocumentMetadata> for CreateBlogRequest<'a> {
    fn from(m: &'a DocumentMetadata) -> Self {
        Self {
            title: &m.title,
            description: &m.description,
            desired_tone: &m.desired_tone,
            seo_keywords: &m.keywords,
            target_audience: &m.target_audience,
            blog_length_min: m.length_min,
            blog_length_max: m.length_max,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UpdateBlogRequest<'a> {
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CreateMessageRequest<'a> {
    #[serde(flatten)]
    pub brief: CreateBlogRequest<'a>,
    pub user_message: &'a str,
    pub selected_context: &'a [String],
    pub blog_id: u64,
}

impl<'a> From<&'a MessageRequest> for CreateMessageRequest<'a> {
    fn from(r: &'a MessageRequest) -> Self {
        Self {
            brief: CreateBlogRequest::from(&r.metadata),
            user_message: &r.user_message,
            selected_context: &r.selected_context,
            blog_id: r.session_id,
        }
    }
}

// ── Responses ────────────────────────────────────────────────────────

/// Answer to `POST /blogs/`. Only the id is used; the full record is
/// fetched afterwards.
#[derive(Debug, Deserialize)]
pub struct CreateBlogResponse {
    pub blog_id: u64,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BlogSummaryRecord {
    pub id: u64,
    pub title: String,
}

impl From<BlogSummaryRecord> for SessionSummary {
    fn from(r: BlogSummaryRecord) -> Self {
        SessionSummary {
            id: r.id,
            title: r.title,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub role: String,
    pub message: String,
    #[serde(default)]
    pub checkpoint_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl TryFrom<MessageRecord> for Message {
    type Error = ApiError;

    fn try_from(r: MessageRecord) -> Result<Self, ApiError> {
        let turn_id = turn_from_message_id(&r.id);
        let mut message = match r.role.as_str() {
            "user" => Message::user(r.message).with_delivery(Delivery::Confirmed),
            "assistant" => Message::assistant(r.message, turn_id),
            other => return Err(ApiError::Decode(format!("unknown message role: {}", other))),
        };
        message.timestamp = r.timestamp;
        if let (Role::Assistant, Some(cp)) = (message.role, r.checkpoint_id) {
            message = message.with_checkpoint(CheckpointId(cp));
        }
        Ok(message)
    }
}

/// `assistant_17` → `TurnId(17)`.
pub fn turn_from_message_id(id: &str) -> Option<TurnId> {
    id.split('_').nth(1)?.parse().ok().map(TurnId)
}

/// A blog as returned by fetch, update and restore.
#[derive(Debug, Deserialize)]
pub struct BlogRecord {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub desired_tone: String,
    #[serde(default)]
    pub seo_keywords: Vec<String>,
    #[serde(default)]
    pub target_audience: String,
    #[serde(default)]
    pub blog_length_min: u32,
    #[serde(default)]
    pub blog_length_max: u32,
    #[serde(default, deserialize_with = "nullable_string")]
    pub content: String,
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl BlogRecord {
    pub fn into_document(self) -> Document {
        self.split().0
    }

    pub fn into_snapshot(self) -> Result<SessionSnapshot, ApiError> {
        let (document, messages) = self.split();
        let messages = messages
            .into_iter()
            .map(Message::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SessionSnapshot { document, messages })
    }

    fn split(self) -> (Document, Vec<MessageRecord>) {
        let document = Document {
            id: SessionId::Persisted(self.id),
            metadata: DocumentMetadata {
                title: self.title,
                description: self.description,
                desired_tone: self.desired_tone,
                target_audience: self.target_audience,
                length_min: self.blog_length_min,
                length_max: self.blog_length_max,
                keywords: self.seo_keywords,
            },
            content: self.content,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        (document, self.messages)
    }
}

/// Answer to `POST /blogs/message`.
#[derive(Debug, Deserialize)]
pub struct MessageResponse {
    /// Null or empty when the workflow produced no new text.
    #[serde(default)]
    pub content: Option<String>,
    pub message: SavedMessage,
}

#[derive(Debug, Deserialize)]
pub struct SavedMessage {
    pub id: u64,
    #[serde(default)]
    pub ai_message: String,
}

impl From<MessageResponse> for AssistantReply {
    fn from(r: MessageResponse) -> Self {
        AssistantReply {
            text: r.message.ai_message,
            turn_id: TurnId(r.message.id),
            content: r.content.filter(|c| !c.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckpointRecord {
    pub id: u64,
    #[serde(default, deserialize_with = "nullable_string")]
    pub content: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub blog_id: Option<u64>,
}

impl From<CheckpointRecord> for Checkpoint {
    fn from(r: CheckpointRecord) -> Self {
        let created_at = r.created_at.unwrap_or_else(Utc::now);
        Checkpoint {
            id: CheckpointId(r.id),
            content: r.content,
            created_at,
            updated_at: r.updated_at.unwrap_or(created_at),
            session_id: r.blog_id,
        }
    }
}

// ── Errors ───────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

/// Map a non-success response onto [`ApiError`], keeping the server's
/// `detail` (or `message`) text.
pub fn api_error(status: u16, body: &str) -> ApiError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let detail = match parsed.detail {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Null) | None => parsed.message,
        Some(other) => Some(other.to_string()),
    };
    match status {
        401 => ApiError::Unauthorized { detail },
        404 => ApiError::NotFound { detail },
        409 => ApiError::Conflict { detail },
        _ => ApiError::Status { status, detail },
    }
}

// ── Field helpers ────────────────────────────────────────────────────

/// RFC 3339, or a naive ISO timestamp taken as UTC.
fn lenient_timestamp<'de, D>(de: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(de)? else {
        return Ok(None);
    };
    if let Ok(t) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(t.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|t| Some(t.and_utc()))
        .map_err(serde::de::Error::custom)
}

fn nullable_string<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(de)?.unwrap_or_default())
}
