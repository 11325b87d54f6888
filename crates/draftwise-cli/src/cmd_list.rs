use crate::output::{self, Options};
use anyhow::Result;
use draftwise::{Session, SessionBackend};
use std::io::Write;

pub async fn run<B: SessionBackend>(
    session: &Session<B>,
    opts: Options,
    out: &mut impl Write,
) -> Result<()> {
    let sessions = session.list_sessions().await?;
    if opts.json {
        return output::write_json(out, &sessions, opts.pretty);
    }
    if sessions.is_empty() {
        writeln!(out, "No documents yet. Create one with `draft new`.")?;
        return Ok(());
    }
    for summary in &sessions {
        writeln!(out, "{:>6}  {}", summary.id, summary.title)?;
    }
    Ok(())
}
