//! The canonical document text plus the manual-edit draft.

use crate::types::{Document, DocumentMetadata, SessionId};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentState {
    /// `None` between sessions, after teardown and before the next bind.
    id: Option<SessionId>,
    metadata: DocumentMetadata,
    text: String,
    /// Empty when there is no unsaved manual edit.
    draft: String,
    updated_at: Option<DateTime<Utc>>,
}

impl DocumentState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start over for `id` with empty text.
    pub fn bind(&mut self, id: SessionId) {
        *self = Self {
            id: Some(id),
            ..Self::default()
        };
    }

    /// Drop everything, including the identity.
    pub fn unbind(&mut self) {
        *self = Self::default();
    }

    /// Replace the canonical text and clear the draft.
    ///
    /// Does nothing while no identity is bound, so a late write during a
    /// teardown cannot resurrect the old document. Returns whether the
    /// text was applied.
    pub fn load(&mut self, text: impl Into<String>) -> bool {
        if self.id.is_none() {
            return false;
        }
        self.text = text.into();
        self.draft.clear();
        true
    }

    /// Apply a backend document: identity, brief, and text.
    pub fn apply(&mut self, document: Document) -> bool {
        if self.id.is_none() {
            return false;
        }
        self.id = Some(document.id);
        self.metadata = document.metadata;
        self.updated_at = document.updated_at;
        self.load(document.content)
    }

    /// Seed the draft from the canonical text.
    pub fn begin_draft(&mut self) {
        self.draft = self.text.clone();
    }

    /// Overwrite the draft. Never touches the canonical text.
    pub fn update_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn clear_draft(&mut self) {
        self.draft.clear();
    }

    pub fn id(&self) -> Option<SessionId> {
        self.id
    }

    /// True while bound to the "new" sentinel.
    pub fn is_unsaved(&self) -> bool {
        self.id == Some(SessionId::New)
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn has_draft(&self) -> bool {
        !self.draft.is_empty()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(id: u64, content: &str) -> Document {
        Document {
            id: SessionId::Persisted(id),
            metadata: DocumentMetadata {
                title: "Cats".into(),
                ..Default::default()
            },
            content: content.into(),
            created_at: None,
            updated_at: Some(Utc::now()),
        }
    }

    #[test]
    fn test_load_requires_identity() {
        let mut doc = DocumentState::new();
        assert!(!doc.load("orphan"));
        assert_eq!(doc.text(), "");

        doc.bind(SessionId::Persisted(1));
        assert!(doc.load("# Cats"));
        assert_eq!(doc.text(), "# Cats");
    }

    #[test]
    fn test_load_clears_draft() {
        let mut doc = DocumentState::new();
        doc.bind(SessionId::Persisted(1));
        doc.load("v1");
        doc.begin_draft();
        doc.update_draft("v1 edited");
        assert!(doc.has_draft());
        doc.load("v2");
        assert!(!doc.has_draft());
    }

    #[test]
    fn test_draft_does_not_touch_text() {
        let mut doc = DocumentState::new();
        doc.bind(SessionId::Persisted(1));
        doc.load("canonical");
        doc.begin_draft();
        assert_eq!(doc.draft(), "canonical");
        doc.update_draft("changed");
        assert_eq!(doc.text(), "canonical");
        assert_eq!(doc.draft(), "changed");
    }

    #[test]
    fn test_apply_promotes_new_identity() {
        let mut doc = DocumentState::new();
        doc.bind(SessionId::New);
        assert!(doc.is_unsaved());
        assert!(doc.apply(document(12, "body")));
        assert_eq!(doc.id(), Some(SessionId::Persisted(12)));
        assert_eq!(doc.metadata().title, "Cats");
        assert!(!doc.is_unsaved());
    }

    #[test]
    fn test_unbind_drops_everything() {
        let mut doc = DocumentState::new();
        doc.bind(SessionId::Persisted(3));
        doc.load("text");
        doc.unbind();
        assert!(doc.id().is_none());
        assert_eq!(doc.text(), "");
        assert!(!doc.apply(document(3, "late")));
    }
}
