//! Caret preservation across a mutation batch.
//!
//! Re-parsing may replace the text node the caret sat in, so a snapshot also
//! remembers the enclosing block, that block's position under the root, and
//! the caret's offsets relative to the block. [`CaretSnapshot::restore`]
//! walks that chain from the most to the least precise target.

use crate::core::{NodeId, NodeKind, utf16_len};
use crate::doc::Document;
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// A selection inside one text node, in UTF-16 units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caret {
    pub node: NodeId,
    pub start: usize,
    pub end: usize,
}

impl Caret {
    pub fn collapsed(node: NodeId, offset: usize) -> Self {
        Self {
            node,
            start: offset,
            end: offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaretSnapshot {
    caret: Caret,
    block: Option<NodeId>,
    block_index: usize,
    block_start: usize,
    block_end: usize,
}

impl CaretSnapshot {
    pub fn capture(doc: &Document, caret: Caret) -> Self {
        let block = enclosing_block(doc, caret.node);
        let block_index = block
            .and_then(|block| doc.children(doc.root()).iter().position(|b| *b == block))
            .unwrap_or(0);
        let before = block
            .map(|block| units_before(doc, block, caret.node))
            .unwrap_or(0);
        Self {
            caret,
            block,
            block_index,
            block_start: before + caret.start,
            block_end: before + caret.end,
        }
    }

    pub fn caret(&self) -> Caret {
        self.caret
    }

    /// The same caret in the current tree. `None` only for a document with
    /// no text node at all.
    pub fn restore(&self, doc: &Document) -> Option<Caret> {
        if let Some(node) = doc.get_node_by_id(self.caret.node)
            && node.kind() == NodeKind::Text
        {
            let text = node.text();
            return Some(Caret {
                node: self.caret.node,
                start: snap_to_grapheme(text, self.caret.start),
                end: snap_to_grapheme(text, self.caret.end),
            });
        }

        if let Some(block) = self.block
            && doc.get_node_by_id(block).is_some()
            && let Some(caret) = locate(doc, block, self.block_start, self.block_end)
        {
            return Some(caret);
        }

        let blocks = doc.children(doc.root());
        let fallback = blocks
            .get(self.block_index)
            .or_else(|| blocks.last())
            .copied();
        if let Some(block) = fallback
            && let Some(caret) = locate(doc, block, self.block_start, self.block_end)
        {
            return Some(caret);
        }

        let last = doc.text_leaves(doc.root()).last().copied()?;
        let end = doc.text(last).map(utf16_len).unwrap_or(0);
        Some(Caret::collapsed(last, end))
    }
}

fn enclosing_block(doc: &Document, node: NodeId) -> Option<NodeId> {
    let root = doc.root();
    let mut current = node;
    loop {
        let parent = doc.parent(current)?;
        if parent == root {
            return Some(current);
        }
        current = parent;
    }
}

fn units_before(doc: &Document, block: NodeId, node: NodeId) -> usize {
    doc.text_leaves(block)
        .into_iter()
        .take_while(|leaf| *leaf != node)
        .filter_map(|leaf| doc.text(leaf))
        .map(utf16_len)
        .sum()
}

/// Maps block-relative offsets onto the text leaf that holds them. An
/// offset past the end lands at the end of the last leaf.
fn locate(doc: &Document, block: NodeId, start: usize, end: usize) -> Option<Caret> {
    let leaves = doc.text_leaves(block);
    let last = *leaves.last()?;
    let mut consumed = 0;
    for leaf in &leaves {
        let text = doc.text(*leaf).unwrap_or_default();
        let len = utf16_len(text);
        if start <= consumed + len {
            let local_start = start - consumed;
            let local_end = end.saturating_sub(consumed).clamp(local_start, len);
            return Some(Caret {
                node: *leaf,
                start: snap_to_grapheme(text, local_start),
                end: snap_to_grapheme(text, local_end),
            });
        }
        consumed += len;
    }
    let text = doc.text(last).unwrap_or_default();
    Some(Caret::collapsed(last, utf16_len(text)))
}

/// Largest grapheme boundary at or before `offset` UTF-16 units.
pub fn snap_to_grapheme(text: &str, offset: usize) -> usize {
    let mut boundary = 0;
    for grapheme in text.graphemes(true) {
        let next = boundary + utf16_len(grapheme);
        if next > offset {
            break;
        }
        boundary = next;
    }
    boundary
}
