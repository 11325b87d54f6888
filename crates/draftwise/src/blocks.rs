//! Addressable context blocks derived from the document text.
//!
//! A block is one top-level markdown node (heading, paragraph, list,
//! code fence, quote, table, rule, html block). Identities are positional
//! (`block-0`, `block-1`, ...) and recomputed from zero on every parse, so
//! an edit above a block shifts every identity below it. The selection
//! therefore copies the block text at selection time and is cleared, never
//! migrated, when a different document is loaded.

use pulldown_cmark::{Event, Options, Parser};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Prefix of every derived block id.
pub const BLOCK_ID_PREFIX: &str = "block-";

/// One top-level slice of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBlock {
    /// Positional identity, `block-<index>`.
    pub id: String,
    pub index: usize,
    /// Byte span in the source text.
    pub span: Range<usize>,
    /// The literal source text of the span.
    pub text: String,
}

pub fn block_id(index: usize) -> String {
    format!("{}{}", BLOCK_ID_PREFIX, index)
}

/// Lazily walks the top-level nodes of a markdown text.
pub struct ContextBlocks<'a> {
    text: &'a str,
    events: Box<dyn Iterator<Item = (Event<'a>, Range<usize>)> + 'a>,
    depth: usize,
    next_index: usize,
}

impl<'a> ContextBlocks<'a> {
    fn new(text: &'a str) -> Self {
        let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
        Self {
            text,
            events: Box::new(Parser::new_ext(text, options).into_offset_iter()),
            depth: 0,
            next_index: 0,
        }
    }

    fn make_block(&mut self, span: Range<usize>) -> Option<ContextBlock> {
        let span = trim_line_endings(self.text, span);
        if span.is_empty() {
            return None;
        }
        let text = self.text.get(span.clone())?.to_string();
        let index = self.next_index;
        self.next_index += 1;
        Some(ContextBlock {
            id: block_id(index),
            index,
            span,
            text,
        })
    }
}

impl Iterator for ContextBlocks<'_> {
    type Item = ContextBlock;

    fn next(&mut self) -> Option<ContextBlock> {
        while let Some((event, span)) = self.events.next() {
            match event {
                Event::Start(_) => {
                    let top_level = self.depth == 0;
                    self.depth += 1;
                    if top_level && let Some(block) = self.make_block(span) {
                        return Some(block);
                    }
                }
                Event::End(_) => {
                    self.depth = self.depth.saturating_sub(1);
                }
                _ if self.depth == 0 => {
                    if let Some(block) = self.make_block(span) {
                        return Some(block);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

fn trim_line_endings(text: &str, span: Range<usize>) -> Range<usize> {
    let end = span.end.min(text.len());
    let start = span.start.min(end);
    let trimmed = text[start..end].trim_end_matches(['\n', '\r']);
    start..start + trimmed.len()
}

/// Derive the blocks of `text` in document order.
///
/// The returned iterator is lazy and finite; calling `derive` again on the
/// same text yields the same identities.
pub fn derive(text: &str) -> ContextBlocks<'_> {
    ContextBlocks::new(text)
}

/// Restartable view over the blocks of one document text.
#[derive(Debug, Clone, Copy)]
pub struct ContextBlockIndex<'a> {
    text: &'a str,
}

impl<'a> ContextBlockIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text }
    }

    pub fn blocks(&self) -> ContextBlocks<'a> {
        derive(self.text)
    }

    pub fn get(&self, id: &str) -> Option<ContextBlock> {
        let index: usize = id.strip_prefix(BLOCK_ID_PREFIX)?.parse().ok()?;
        self.blocks().nth(index)
    }

    pub fn len(&self) -> usize {
        self.blocks().count()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks().next().is_none()
    }
}

// ── Selection ────────────────────────────────────────────────────────

/// A block the user attached as context, copied at selection time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedBlock {
    pub id: String,
    pub text: String,
}

/// Blocks attached as context for the next chat turn, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSelection {
    blocks: Vec<SelectedBlock>,
}

impl ContextSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove the block if its id is selected, otherwise copy it in at
    /// the front. Returns whether the block is selected afterwards.
    pub fn toggle(&mut self, block: &ContextBlock) -> bool {
        if self.remove(&block.id) {
            return false;
        }
        self.blocks.insert(0, SelectedBlock {
            id: block.id.clone(),
            text: block.text.clone(),
        });
        true
    }

    /// Remove by id. Returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.blocks.len();
        self.blocks.retain(|b| b.id != id);
        self.blocks.len() != before
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.blocks.iter().any(|b| b.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelectedBlock> {
        self.blocks.iter()
    }

    /// Text snippets to send with a chat turn.
    pub fn texts(&self) -> Vec<String> {
        self.blocks.iter().map(|b| b.text.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
