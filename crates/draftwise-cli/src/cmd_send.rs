use crate::output::{self, Options};
use crate::remote;
use anyhow::Result;
use draftwise::{Session, SessionBackend};
use serde::Serialize;
use std::io::Write;
use tracing::debug;

#[derive(Serialize)]
struct SendJson<'a> {
    reply: &'a str,
    turn_id: Option<u64>,
    content: &'a str,
}

/// Open `id`, select the `context` blocks, and send one chat turn.
pub async fn run<B: SessionBackend>(
    session: &Session<B>,
    id: u64,
    message: String,
    context: Vec<String>,
    opts: Options,
    out: &mut impl Write,
) -> Result<()> {
    remote::open(session, id).await?;
    for block in &context {
        // toggling twice would deselect a repeated --context
        if !session.lock().await.selection().contains(block) {
            session.toggle_block(block).await?;
        }
    }
    debug!(blocks = context.len(), "sending turn");

    let reply = remote::applied(session.send_message(message).await?)?;
    output::report_notices(session.take_notices().await);

    let store = session.lock().await;
    let content = store.document().text();
    if opts.json {
        let json = SendJson {
            reply: &reply.text,
            turn_id: reply.turn_id.map(|t| t.0),
            content,
        };
        return output::write_json(out, &json, opts.pretty);
    }
    writeln!(out, "{}", reply.text)?;
    writeln!(out)?;
    writeln!(out, "{}", content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftwise::{ApiError, DocumentMetadata, MemoryBackend, Operation, SessionError};

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

    #[tokio::test]
    async fn test_send_prints_reply_and_document() {
        let backend = MemoryBackend::new();
        let id = backend.insert_session(brief(), "# Cats", vec![]);
        backend.push_reply("Expanded it.", "# Cats\n\nThey rule.");
        let session = Session::new(backend);

        let mut out = Vec::new();
        run(
            &session,
            id,
            "expand".into(),
            vec!["block-0".into()],
            Options::default(),
            &mut out,
        )
        .await
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "Expanded it.\n\n# Cats\n\nThey rule.\n");
        assert_eq!(session.backend().content(id).unwrap(), "# Cats\n\nThey rule.");
    }

    #[tokio::test]
    async fn test_send_unknown_block_sends_nothing() {
        let backend = MemoryBackend::new();
        let id = backend.insert_session(brief(), "# Cats", vec![]);
        let session = Session::new(backend);

        let err = run(
            &session,
            id,
            "expand".into(),
            vec!["block-7".into()],
            Options::default(),
            &mut Vec::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<SessionError>(),
            Some(&SessionError::UnknownBlock("block-7".into()))
        );
        assert_eq!(session.backend().calls(Operation::SendMessage), 0);
    }

    #[tokio::test]
    async fn test_send_failure_keeps_backend_detail() {
        let backend = MemoryBackend::new();
        let id = backend.insert_session(brief(), "", vec![]);
        backend.fail_next(
            Operation::SendMessage,
            ApiError::Status {
                status: 500,
                detail: Some("Workflow failed: model timeout".into()),
            },
        );
        let session = Session::new(backend);

        let err = run(
            &session,
            id,
            "go".into(),
            vec![],
            Options::default(),
            &mut Vec::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Workflow failed: model timeout");
    }

    #[tokio::test]
    async fn test_send_json() {
        let backend = MemoryBackend::new();
        let id = backend.insert_session(brief(), "", vec![]);
        let session = Session::new(backend);

        let mut out = Vec::new();
        let opts = Options {
            json: true,
            pretty: false,
        };
        run(&session, id, "hello".into(), vec![], opts, &mut out)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["reply"], "Updated the draft.");
        assert_eq!(value["content"], "hello");
        assert_eq!(value["turn_id"], 1);
    }
}
