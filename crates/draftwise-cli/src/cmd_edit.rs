use crate::output::{self, Options};
use crate::remote;
use anyhow::{Context, Result};
use draftwise::{Session, SessionBackend};
use serde::Serialize;
use std::io::{self, Read, Write};

/// Read replacement text from a file, or stdin for `-`.
pub fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(input).with_context(|| format!("failed to read {}", input))
}

#[derive(Serialize)]
struct EditJson<'a> {
    id: u64,
    saved: bool,
    content: &'a str,
}

/// Replace the document text through a manual edit.
///
/// An empty `text` leaves the document untouched.
pub async fn run<B: SessionBackend>(
    session: &Session<B>,
    id: u64,
    text: String,
    opts: Options,
    out: &mut impl Write,
) -> Result<()> {
    remote::open(session, id).await?;
    session.begin_manual_edit().await?;
    let saved = !text.is_empty();
    session.update_draft(text).await?;
    remote::applied(session.commit_manual_edit().await?)?;
    output::report_notices(session.take_notices().await);

    let store = session.lock().await;
    let content = store.document().text();
    if opts.json {
        return output::write_json(out, &EditJson { id, saved, content }, opts.pretty);
    }
    if saved {
        writeln!(out, "Saved document {} ({} bytes)", id, content.len())?;
    } else {
        writeln!(out, "Input was empty; document {} left unchanged", id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftwise::{ApiError, DocumentMetadata, EditMode, MemoryBackend, Operation};
    use tempfile::TempDir;

    fn brief() -> DocumentMetadata {
        DocumentMetadata {
            title: "Cats".into(),
            description: "Why cats rule".into(),
            desired_tone: "playful".into(),
            target_audience: "pet owners".into(),
            length_min: 300,
            length_max: 800,
            keywords: vec!["cats".into()],
        }
    }

    #[test]
    fn test_read_input_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("draft.md");
        std::fs::write(&path, "# Edited").unwrap();
        assert_eq!(read_input(path.to_str().unwrap()).unwrap(), "# Edited");
    }

    #[test]
    fn test_read_input_missing_file() {
        let err = read_input("/nonexistent/draft.md").unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[tokio::test]
    async fn test_edit_saves() {
        let backend = MemoryBackend::new();
        let id = backend.insert_session(brief(), "old", vec![]);
        let session = Session::new(backend);

        let mut out = Vec::new();
        run(&session, id, "new text".into(), Options::default(), &mut out)
            .await
            .unwrap();
        assert_eq!(session.backend().content(id).unwrap(), "new text");
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("Saved document {} (8 bytes)\n", id)
        );
        assert_eq!(session.lock().await.edit_mode(), EditMode::AiDriven);
    }

    #[tokio::test]
    async fn test_edit_empty_input_sends_nothing() {
        let backend = MemoryBackend::new();
        let id = backend.insert_session(brief(), "old", vec![]);
        let session = Session::new(backend);

        let mut out = Vec::new();
        run(&session, id, String::new(), Options::default(), &mut out)
            .await
            .unwrap();
        assert_eq!(session.backend().calls(Operation::UpdateContent), 0);
        assert_eq!(session.backend().content(id).unwrap(), "old");
        assert!(String::from_utf8(out).unwrap().contains("left unchanged"));
    }

    #[tokio::test]
    async fn test_edit_failure_reports_detail() {
        let backend = MemoryBackend::new();
        let id = backend.insert_session(brief(), "old", vec![]);
        backend.fail_next(
            Operation::UpdateContent,
            ApiError::Status {
                status: 500,
                detail: Some("disk full".into()),
            },
        );
        let session = Session::new(backend);

        let err = run(&session, id, "new".into(), Options::default(), &mut Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "disk full");
        assert_eq!(session.backend().content(id).unwrap(), "old");
    }
}
