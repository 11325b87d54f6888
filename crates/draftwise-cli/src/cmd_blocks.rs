use crate::output::{self, Options};
use crate::remote;
use anyhow::{Context, Result};
use draftwise::{ContextBlock, ContextBlockIndex, Session, SessionBackend};
use std::io::Write;
use std::path::Path;

/// Blocks of a persisted document.
pub async fn run<B: SessionBackend>(
    session: &Session<B>,
    id: u64,
    opts: Options,
    out: &mut impl Write,
) -> Result<()> {
    remote::open(session, id).await?;
    let store = session.lock().await;
    let blocks: Vec<ContextBlock> = store.blocks().blocks().collect();
    write_blocks(out, &blocks, opts)
}

/// Blocks of a local markdown file; needs no backend.
pub fn run_file(path: &Path, opts: Options, out: &mut impl Write) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let blocks: Vec<ContextBlock> = ContextBlockIndex::new(&text).blocks().collect();
    write_blocks(out, &blocks, opts)
}

fn write_blocks(out: &mut impl Write, blocks: &[ContextBlock], opts: Options) -> Result<()> {
    if opts.json {
        return output::write_json(out, blocks, opts.pretty);
    }
    for block in blocks {
        writeln!(out, "{}  {}", block.id, preview(&block.text))?;
    }
    Ok(())
}

/// First line, cut to 60 characters.
fn preview(text: &str) -> String {
    let first = text.lines().next().unwrap_or_default();
    let mut cut: String = first.chars().take(60).collect();
    if cut.len() < first.len() || text.lines().nth(1).is_some() {
        cut.push('…');
    }
    cut
}
