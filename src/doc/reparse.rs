//! Incremental re-parse.
//!
//! After a batch of edits the document may hold raw marker text that should
//! become structure: `**x**` typed into a text node, a `>` typed at the
//! start of a line, three plain lines that now spell a fenced code block.
//! A pass walks the root's children, re-parses contiguous text runs with the
//! full parser, and splices the result in place of the run when it carries
//! structure. Runs that parse back to plain text are left untouched, so
//! ordinary typing never replaces a node.

use super::{Document, Parser, TomError, parser, serialize};
use crate::core::{NodeId, NodeKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReparseConfig {
    /// Upper bound on passes per flush. A pass that changes nothing ends
    /// the flush early.
    pub max_passes: usize,
}

impl Default for ReparseConfig {
    fn default() -> Self {
        Self { max_passes: 4 }
    }
}

/// Root children spanned by a fence that has not closed yet. A block joins
/// the run with the markdown it stands for; the run closes once the fences
/// seen in those lines pair up.
#[derive(Default)]
struct FenceRun {
    lines: Vec<String>,
    blocks: Vec<NodeId>,
    toggles: usize,
}

impl FenceRun {
    fn is_open(&self) -> bool {
        !self.blocks.is_empty()
    }

    fn push(&mut self, line: String, toggles: usize, block: NodeId) {
        self.lines.push(line);
        self.blocks.push(block);
        self.toggles += toggles;
    }

    fn is_closed(&self) -> bool {
        self.toggles % 2 == 0
    }

    /// Replaces the collected blocks with what their lines parse to.
    fn materialize(&mut self, doc: &mut Document) -> bool {
        let lines = std::mem::take(&mut self.lines);
        let blocks = std::mem::take(&mut self.blocks);
        self.toggles = 0;
        let Some(first) = blocks.first().copied() else {
            return false;
        };

        let scratch = Parser::parse(&lines.join("\n"));
        let replacement = doc.adopt(scratch);
        if let Err(err) = doc.insert_before(first, &replacement) {
            tracing::warn!(%err, "could not place fenced code block");
            discard(doc, &replacement);
            return false;
        }
        discard(doc, &blocks);
        tracing::trace!(lines = lines.len(), "aggregated fenced code block");
        true
    }
}

/// Fence toggles a root child contributes. A closed `code` node pairs its
/// own fences; an open one leaves a fence dangling.
fn block_toggles(doc: &Document, block: NodeId, line: &str) -> usize {
    if doc.kind(block) != Some(NodeKind::Code) {
        return parser::fence_toggles(line);
    }
    let closed = doc
        .children(block)
        .last()
        .and_then(|last| doc.node(*last))
        .is_some_and(|last| last.attrs().is_end);
    if closed { 2 } else { 1 }
}

/// One reconciliation pass over the whole document. Returns whether the
/// tree changed.
pub(crate) fn reconcile_pass(doc: &mut Document) -> bool {
    let root = doc.root();
    let blocks = doc.children(root).to_vec();
    let mut changed = false;
    let mut fence = FenceRun::default();

    for block in blocks {
        if doc.parent(block) != Some(root) {
            continue;
        }
        let Some(kind) = doc.kind(block) else {
            continue;
        };
        if !kind.is_block_level() {
            continue;
        }

        let line = block_line(doc, block);
        let toggles = block_toggles(doc, block, &line);
        if fence.is_open() {
            fence.push(line, toggles, block);
            if fence.is_closed() {
                changed |= fence.materialize(doc);
            }
            continue;
        }
        if toggles % 2 == 1 {
            fence.push(line, toggles, block);
            continue;
        }
        if kind == NodeKind::Code {
            continue;
        }
        changed |= if toggles > 0 {
            replace_block(doc, block, &line)
        } else {
            reparse_block(doc, block)
        };
    }
    // An unterminated run stays as it is until its closing fence is typed.
    if changed {
        doc.bake_nodes(root);
    }
    changed
}

fn discard(doc: &mut Document, nodes: &[NodeId]) {
    for node in nodes {
        if let Err(err) = doc.remove(*node) {
            tracing::warn!(%err, %node, "could not discard replaced node");
        }
    }
}

fn is_text_only(doc: &Document, block: NodeId) -> bool {
    doc.kind(block) == Some(NodeKind::Block)
        && doc
            .children(block)
            .iter()
            .all(|child| doc.kind(*child) == Some(NodeKind::Text))
}

/// Source text a root child stands for; plain text for a text-only block.
fn block_line(doc: &Document, block: NodeId) -> String {
    if is_text_only(doc, block) {
        doc.node(block)
            .map(|node| node.text_content())
            .unwrap_or_default()
    } else {
        serialize::block_markdown(doc, block)
    }
}

fn reparse_block(doc: &mut Document, block: NodeId) -> bool {
    if is_text_only(doc, block) {
        return reparse_text_block(doc, block);
    }
    reparse_container(doc, block, &mut Vec::new())
}

/// A block holding nothing but text is re-parsed as a whole line, which
/// lets it turn into a quote, a code block or several blocks.
fn reparse_text_block(doc: &mut Document, block: NodeId) -> bool {
    let run = doc.children(block).to_vec();
    let Some(first) = run.first().copied() else {
        return false;
    };
    let text = doc
        .node(block)
        .map(|node| node.text_content())
        .unwrap_or_default();
    if text.is_empty() {
        return false;
    }

    let scratch = Parser::parse(&text);
    let top = scratch.children(scratch.root()).to_vec();
    let single_block = match top.as_slice() {
        [only] if scratch.kind(*only) == Some(NodeKind::Block) => Some(*only),
        _ => None,
    };

    let Some(parsed) = single_block else {
        return place_blocks(doc, block, scratch);
    };
    let plain = scratch
        .children(parsed)
        .iter()
        .all(|child| scratch.kind(*child) == Some(NodeKind::Text));
    if plain {
        return false;
    }
    match splice_inline(doc, scratch, parsed, first, &run) {
        Ok(nodes) => {
            tracing::trace!(%block, nodes, "replaced text run");
            true
        }
        Err(err) => {
            tracing::warn!(%err, %block, "could not place re-parsed inline nodes");
            false
        }
    }
}

/// Re-parses the whole source line of `block`. Used when the line holds
/// fences, which only the block-level parser splits.
fn replace_block(doc: &mut Document, block: NodeId, line: &str) -> bool {
    place_blocks(doc, block, Parser::parse(line))
}

/// Puts the root children of `scratch` where `block` is and drops `block`.
fn place_blocks(doc: &mut Document, block: NodeId, scratch: Document) -> bool {
    let replacement = doc.adopt(scratch);
    if let Err(err) = doc.insert_before(block, &replacement) {
        tracing::warn!(%err, %block, "could not place re-parsed blocks");
        discard(doc, &replacement);
        return false;
    }
    discard(doc, &[block]);
    tracing::trace!(%block, blocks = replacement.len(), "replaced block");
    true
}

/// Moves the inline children of `holder`, a block of `scratch`, in front of
/// `anchor` and drops `run`. Returns the number of nodes placed.
fn splice_inline(
    doc: &mut Document,
    scratch: Document,
    holder: NodeId,
    anchor: NodeId,
    run: &[NodeId],
) -> Result<usize, TomError> {
    let inline = scratch.children(holder).to_vec();
    doc.adopt(scratch);
    let placed = doc.insert_before(anchor, &inline);
    discard(doc, &[holder]);
    placed?;
    discard(doc, run);
    Ok(inline.len())
}

/// Re-parses every maximal text run under `container` inline. Markers of
/// enclosing formatting nodes are in `used` and are not matched again.
fn reparse_container(doc: &mut Document, container: NodeId, used: &mut Vec<&'static str>) -> bool {
    let children = doc.children(container).to_vec();
    let mut changed = false;
    let mut run: Vec<NodeId> = Vec::new();
    let mut run_leading = true;

    for (index, child) in children.iter().enumerate() {
        let Some(kind) = doc.kind(*child) else {
            continue;
        };
        if kind == NodeKind::Text {
            if run.is_empty() {
                run_leading = index == 0;
            }
            run.push(*child);
            continue;
        }

        changed |= reparse_run(doc, &run, run_leading, used);
        run.clear();
        if kind.is_inline_formatting() {
            used.push(kind.marker());
            changed |= reparse_container(doc, *child, used);
            used.pop();
        }
    }
    changed |= reparse_run(doc, &run, run_leading, used);
    changed
}

fn reparse_run(doc: &mut Document, run: &[NodeId], leading: bool, used: &[&'static str]) -> bool {
    let Some(first) = run.first().copied() else {
        return false;
    };
    let text: String = run
        .iter()
        .filter_map(|id| doc.text(*id))
        .collect();
    if text.is_empty() {
        return false;
    }

    let scratch = Parser::parse_fragment(&text, used, leading);
    let Some(holder) = scratch.children(scratch.root()).first().copied() else {
        return false;
    };
    let structured = scratch
        .children(holder)
        .iter()
        .any(|child| scratch.kind(*child) != Some(NodeKind::Text));
    if !structured {
        return false;
    }

    match splice_inline(doc, scratch, holder, first, run) {
        Ok(nodes) => {
            tracing::trace!(nodes, "replaced inline run");
            true
        }
        Err(err) => {
            tracing::warn!(%err, "could not place re-parsed run");
            false
        }
    }
}
