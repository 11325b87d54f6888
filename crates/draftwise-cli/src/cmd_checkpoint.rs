use crate::output::{self, Options};
use crate::remote;
use anyhow::{Result, bail};
use clap::Subcommand;
use draftwise::{CheckpointId, Session, SessionBackend};
use serde::Serialize;
use std::io::{BufRead, Write};

#[derive(Subcommand, Debug)]
pub enum CheckpointOp {
    /// Checkpoint the latest assistant turn of a document
    Create {
        /// Document id
        id: u64,
    },
    /// List the checkpoints referenced by a document's conversation
    List {
        /// Document id
        id: u64,
    },
    /// Print the snapshot content of a checkpoint
    Show {
        /// Checkpoint id
        checkpoint: CheckpointId,
    },
    /// Roll a document back to a checkpoint, dropping every later turn
    Restore {
        /// Document id
        id: u64,

        /// Checkpoint id
        checkpoint: CheckpointId,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Delete a checkpoint
    Delete {
        /// Document id
        id: u64,

        /// Checkpoint id
        checkpoint: CheckpointId,
    },
}

#[derive(Serialize)]
struct CheckpointRef {
    checkpoint: u64,
    turn_id: Option<u64>,
    timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

pub async fn run<B: SessionBackend>(
    session: &Session<B>,
    op: CheckpointOp,
    opts: Options,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<()> {
    match op {
        CheckpointOp::Create { id } => run_create(session, id, opts, out).await,
        CheckpointOp::List { id } => run_list(session, id, opts, out).await,
        CheckpointOp::Show { checkpoint } => run_show(session, checkpoint, opts, out).await,
        CheckpointOp::Restore {
            id,
            checkpoint,
            yes,
        } => {
            if !yes && !confirm(input, checkpoint)? {
                bail!("restore cancelled");
            }
            run_restore(session, id, checkpoint, opts, out).await
        }
        CheckpointOp::Delete { id, checkpoint } => {
            run_delete(session, id, checkpoint, opts, out).await
        }
    }
}

fn confirm(input: &mut impl BufRead, checkpoint: CheckpointId) -> Result<bool> {
    eprint!(
        "Restoring checkpoint {} deletes every message after it. Continue? [y/N] ",
        checkpoint
    );
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

async fn run_create<B: SessionBackend>(
    session: &Session<B>,
    id: u64,
    opts: Options,
    out: &mut impl Write,
) -> Result<()> {
    remote::open(session, id).await?;
    let checkpoint = remote::applied(session.create_checkpoint().await?)?;
    output::report_notices(session.take_notices().await);
    if opts.json {
        let store = session.lock().await;
        let turn_id = store
            .log()
            .checkpoints()
            .find(|(_, cp)| *cp == checkpoint)
            .and_then(|(m, _)| m.turn_id.map(|t| t.0));
        let json = CheckpointRef {
            checkpoint: checkpoint.0,
            turn_id,
            timestamp: store.cached_checkpoint(checkpoint).map(|c| c.created_at),
        };
        return output::write_json(out, &json, opts.pretty);
    }
    writeln!(out, "Created checkpoint {}", checkpoint)?;
    Ok(())
}

async fn run_list<B: SessionBackend>(
    session: &Session<B>,
    id: u64,
    opts: Options,
    out: &mut impl Write,
) -> Result<()> {
    remote::open(session, id).await?;
    let store = session.lock().await;
    let refs: Vec<CheckpointRef> = store
        .log()
        .checkpoints()
        .map(|(message, cp)| CheckpointRef {
            checkpoint: cp.0,
            turn_id: message.turn_id.map(|t| t.0),
            timestamp: message.timestamp,
        })
        .collect();
    if opts.json {
        return output::write_json(out, &refs, opts.pretty);
    }
    if refs.is_empty() {
        writeln!(out, "No checkpoints.")?;
        return Ok(());
    }
    for r in &refs {
        let turn = r
            .turn_id
            .map(|t| t.to_string())
            .unwrap_or_else(|| "?".into());
        writeln!(out, "{:>6}  turn {}", r.checkpoint, turn)?;
    }
    Ok(())
}

async fn run_show<B: SessionBackend>(
    session: &Session<B>,
    checkpoint: CheckpointId,
    opts: Options,
    out: &mut impl Write,
) -> Result<()> {
    let snapshot = remote::applied(session.view_checkpoint(checkpoint).await?)?;
    if opts.json {
        return output::write_json(out, &snapshot, opts.pretty);
    }
    writeln!(out, "{}", snapshot.content)?;
    Ok(())
}

async fn run_restore<B: SessionBackend>(
    session: &Session<B>,
    id: u64,
    checkpoint: CheckpointId,
    opts: Options,
    out: &mut impl Write,
) -> Result<()> {
    remote::open(session, id).await?;
    remote::applied(session.restore_checkpoint(checkpoint).await?)?;
    output::report_notices(session.take_notices().await);
    let store = session.lock().await;
    if opts.json {
        return output::write_json(out, store.log().messages(), opts.pretty);
    }
    writeln!(
        out,
        "Document {} restored to checkpoint {} ({} messages kept)",
        id,
        checkpoint,
        store.log().len()
    )?;
    Ok(())
}

async fn run_delete<B: SessionBackend>(
    session: &Session<B>,
    id: u64,
    checkpoint: CheckpointId,
    opts: Options,
    out: &mut impl Write,
) -> Result<()> {
    remote::open(session, id).await?;
    remote::applied(session.delete_checkpoint(checkpoint).await?)?;
    output::report_notices(session.take_notices().await);
    if opts.json {
        return output::write_json(
            out,
            &serde_json::json!({ "deleted": checkpoint.0 }),
            opts.pretty,
        );
    }
    writeln!(out, "Deleted checkpoint {}", checkpoint)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftwise::{DocumentMetadata, MemoryBackend, Operation, SessionError};

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

    /// A document with two exchanged turns, the first checkpointed.
    async fn two_turns() -> (Session<MemoryBackend>, u64, CheckpointId) {
        let backend = MemoryBackend::new();
        let id = backend.insert_session(brief(), "", vec![]);
        let session = Session::new(backend);
        remote::open(&session, id).await.unwrap();
        session.backend().push_reply("First.", "one");
        session.send_message("draft it").await.unwrap();
        let cp = session.create_checkpoint().await.unwrap().done().unwrap();
        session.backend().push_reply("Second.", "two");
        session.send_message("longer").await.unwrap();
        (session, id, cp)
    }

    async fn exec(
        session: &Session<MemoryBackend>,
        op: CheckpointOp,
        answer: &str,
    ) -> Result<String> {
        let mut input = answer.as_bytes();
        let mut out = Vec::new();
        run(session, op, Options::default(), &mut input, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let backend = MemoryBackend::new();
        let id = backend.insert_session(brief(), "", vec![]);
        let session = Session::new(backend);
        remote::open(&session, id).await.unwrap();
        session.send_message("go").await.unwrap();

        let text = exec(&session, CheckpointOp::Create { id }, "").await.unwrap();
        assert_eq!(text, "Created checkpoint 1\n");

        let text = exec(&session, CheckpointOp::List { id }, "").await.unwrap();
        assert_eq!(text, "     1  turn 1\n");
    }

    #[tokio::test]
    async fn test_create_twice_is_refused() {
        let (session, id, cp) = two_turns().await;
        exec(&session, CheckpointOp::Create { id }, "").await.unwrap();
        let err = exec(&session, CheckpointOp::Create { id }, "")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SessionError>(),
            Some(SessionError::AlreadyCheckpointed(existing)) if *existing != cp
        ));
    }

    #[tokio::test]
    async fn test_show_prints_snapshot() {
        let (session, _, cp) = two_turns().await;
        let text = exec(&session, CheckpointOp::Show { checkpoint: cp }, "")
            .await
            .unwrap();
        assert_eq!(text, "one\n");
    }

    #[tokio::test]
    async fn test_restore_confirmed() {
        let (session, id, cp) = two_turns().await;
        let op = CheckpointOp::Restore {
            id,
            checkpoint: cp,
            yes: false,
        };
        let text = exec(&session, op, "y\n").await.unwrap();
        assert!(text.contains("2 messages kept"));
        assert_eq!(session.backend().content(id).unwrap(), "one");
    }

    #[tokio::test]
    async fn test_restore_declined_sends_nothing() {
        let (session, id, cp) = two_turns().await;
        let op = CheckpointOp::Restore {
            id,
            checkpoint: cp,
            yes: false,
        };
        let err = exec(&session, op, "n\n").await.unwrap_err();
        assert_eq!(err.to_string(), "restore cancelled");
        assert_eq!(session.backend().calls(Operation::RestoreCheckpoint), 0);
        assert_eq!(session.backend().content(id).unwrap(), "two");
    }

    #[tokio::test]
    async fn test_delete() {
        let (session, id, cp) = two_turns().await;
        let text = exec(&session, CheckpointOp::Delete { id, checkpoint: cp }, "")
            .await
            .unwrap();
        assert_eq!(text, format!("Deleted checkpoint {}\n", cp));
        assert_eq!(session.backend().checkpoint_count(), 0);
        let text = exec(&session, CheckpointOp::List { id }, "").await.unwrap();
        assert_eq!(text, "No checkpoints.\n");
    }
}
