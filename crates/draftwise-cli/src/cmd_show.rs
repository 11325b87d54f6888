use crate::output::{self, Options};
use crate::remote;
use anyhow::Result;
use draftwise::{Delivery, Message, Role, Session, SessionBackend, SessionStore};
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct ShowJson<'a> {
    id: u64,
    metadata: &'a draftwise::DocumentMetadata,
    content: &'a str,
    messages: &'a [Message],
}

pub async fn run<B: SessionBackend>(
    session: &Session<B>,
    id: u64,
    opts: Options,
    out: &mut impl Write,
) -> Result<()> {
    remote::open(session, id).await?;
    let store = session.lock().await;
    if opts.json {
        let doc = store.document();
        let show = ShowJson {
            id,
            metadata: doc.metadata(),
            content: doc.text(),
            messages: store.log().messages(),
        };
        return output::write_json(out, &show, opts.pretty);
    }
    write_document(out, &store)?;
    writeln!(out)?;
    write_conversation(out, &store)
}

fn write_document(out: &mut impl Write, store: &SessionStore) -> Result<()> {
    let doc = store.document();
    let meta = doc.metadata();
    writeln!(out, "# {}", meta.title)?;
    writeln!(
        out,
        "tone: {} | audience: {} | length: {}-{} words",
        meta.desired_tone, meta.target_audience, meta.length_min, meta.length_max
    )?;
    if !meta.keywords.is_empty() {
        writeln!(out, "keywords: {}", meta.keywords.join(", "))?;
    }
    writeln!(out)?;
    if doc.text().is_empty() {
        writeln!(out, "(empty document)")?;
    } else {
        writeln!(out, "{}", doc.text())?;
    }
    Ok(())
}

fn write_conversation(out: &mut impl Write, store: &SessionStore) -> Result<()> {
    let log = store.log();
    if log.is_empty() {
        writeln!(out, "No conversation yet.")?;
        return Ok(());
    }
    writeln!(out, "── conversation ──")?;
    for message in log.iter() {
        let time = message.time_label().unwrap_or_else(|| "--:--".into());
        let who = match message.role {
            Role::User => "you",
            Role::Assistant => "assistant",
        };
        let mut tags = Vec::new();
        if let Some(turn) = message.turn_id {
            tags.push(format!("turn {}", turn));
        }
        if let Some(cp) = message.checkpoint {
            tags.push(format!("checkpoint {}", cp));
        }
        if let Delivery::Failed { reason } = &message.delivery {
            tags.push(format!("failed: {}", reason));
        }
        let tags = if tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", tags.join(", "))
        };
        writeln!(out, "{} {}{}: {}", time, who, tags, message.text)?;
    }
    Ok(())
}
