//! Replays a batch of surface mutation records onto a [`Document`].
//!
//! The whole batch runs inside one [`Document::batch_change`], so the
//! incremental re-parse and subscriber notification happen once per user
//! action. Order within a batch:
//!
//! 1. character data and child-list records, in the order received;
//!    removals are only stashed
//! 2. stashed removals, minus nodes re-added anywhere in the batch, with
//!    caret-anchor repairs
//! 3. marker edits, which dissolve the formatting node they belong to
//! 4. a bake of the whole tree
//!
//! Nothing here fails: records that do not correlate with a registered node
//! are reported and skipped.

use super::{ElementRef, MutationRecord};
use crate::core::{NodeAttrs, NodeId, NodeKind};
use crate::doc::{Document, TomError};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repair {
    /// The root lost its last block; an empty block was put in its place.
    EmptyBlock,
    /// A block lost its last child; an empty text node was put in its place.
    EmptyText,
    /// Inline content was added directly under the root; it was wrapped in
    /// a new block.
    WrappedInline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    CorrelationMiss { record: usize, id: Option<String> },
    Rejected { record: usize, error: TomError },
    /// An added element repeats the id of its previous sibling, the way a
    /// surface clones an element when it splits it.
    DuplicateElement { record: usize, id: NodeId },
    Repaired { node: NodeId, repair: Repair },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub diagnostics: Vec<Diagnostic>,
    pub created: Vec<NodeId>,
    pub removed: Vec<NodeId>,
    pub unwrapped: Vec<NodeId>,
}

impl ReconcileReport {
    pub fn correlation_misses(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::CorrelationMiss { .. }))
            .count()
    }

    pub fn repairs(&self) -> impl Iterator<Item = (NodeId, Repair)> + '_ {
        self.diagnostics.iter().filter_map(|d| match d {
            Diagnostic::Repaired { node, repair } => Some((*node, *repair)),
            _ => None,
        })
    }
}

pub fn reconcile(doc: &mut Document, records: &[MutationRecord]) -> ReconcileReport {
    let mut replay = Replay::default();
    doc.batch_change(|doc| replay.run(doc, records));
    replay.report
}

struct MarkerEdit {
    record: usize,
    owner: ElementRef,
    start: String,
    end: String,
}

#[derive(Default)]
struct Replay {
    report: ReconcileReport,
    re_added: HashSet<NodeId>,
    pending_deletes: Vec<NodeId>,
    marker_edits: Vec<MarkerEdit>,
}

#[derive(Clone, Copy)]
enum Anchor {
    After(NodeId),
    Before(NodeId),
    Append(NodeId),
}

fn parse_id(element: &ElementRef) -> Option<NodeId> {
    element.id.as_deref()?.parse().ok()
}

fn resolve(doc: &Document, element: &ElementRef) -> Option<NodeId> {
    let id = parse_id(element)?;
    doc.get_node_by_id(id).map(|node| node.id())
}

impl Replay {
    fn run(&mut self, doc: &mut Document, records: &[MutationRecord]) {
        // Clones of the previous sibling are never placed, so they do not
        // keep a removed node alive.
        self.re_added = records
            .iter()
            .filter_map(|record| match record {
                MutationRecord::ChildList {
                    added,
                    previous_sibling,
                    ..
                } => Some((added, previous_sibling.as_ref().and_then(parse_id))),
                _ => None,
            })
            .flat_map(|(added, clone_of)| {
                added
                    .iter()
                    .filter_map(parse_id)
                    .filter(move |id| Some(*id) != clone_of)
            })
            .collect();

        for (index, record) in records.iter().enumerate() {
            match record {
                MutationRecord::CharacterData { target, value } => {
                    self.character_data(doc, index, target, value)
                }
                MutationRecord::MarkerEdit { owner, start, end } => {
                    self.marker_edits.push(MarkerEdit {
                        record: index,
                        owner: owner.clone(),
                        start: start.clone(),
                        end: end.clone(),
                    })
                }
                MutationRecord::ChildList {
                    target,
                    added,
                    removed,
                    previous_sibling,
                    next_sibling,
                } => {
                    self.stash_removed(doc, index, removed);
                    self.place_added(
                        doc,
                        index,
                        target,
                        added,
                        removed,
                        previous_sibling.as_ref(),
                        next_sibling.as_ref(),
                    );
                }
            }
        }

        self.flush_deletes(doc);
        self.unwrap_markers(doc);
        doc.bake_nodes(doc.root());
    }

    fn miss(&mut self, record: usize, element: &ElementRef) {
        tracing::warn!(record, id = ?element.id, "surface element has no registered node");
        self.report.diagnostics.push(Diagnostic::CorrelationMiss {
            record,
            id: element.id.clone(),
        });
    }

    fn reject(&mut self, record: usize, error: TomError) {
        tracing::warn!(record, %error, "surface mutation rejected");
        self.report
            .diagnostics
            .push(Diagnostic::Rejected { record, error });
    }

    fn character_data(&mut self, doc: &mut Document, record: usize, target: &ElementRef, value: &str) {
        let Some(id) = resolve(doc, target) else {
            self.miss(record, target);
            return;
        };
        if let Err(error) = doc.set_text(id, value) {
            self.reject(record, error);
        }
    }

    fn stash_removed(&mut self, doc: &Document, record: usize, removed: &[ElementRef]) {
        for element in removed {
            match resolve(doc, element) {
                Some(id) if self.re_added.contains(&id) => {}
                Some(id) => self.pending_deletes.push(id),
                None if element.id.is_some() => self.miss(record, element),
                // bare surface text the tree never knew about
                None => {}
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn place_added(
        &mut self,
        doc: &mut Document,
        record: usize,
        target: &ElementRef,
        added: &[ElementRef],
        removed: &[ElementRef],
        previous_sibling: Option<&ElementRef>,
        next_sibling: Option<&ElementRef>,
    ) {
        if added.is_empty() {
            return;
        }
        let mut anchor = if let Some(previous) = previous_sibling.and_then(|e| resolve(doc, e)) {
            Anchor::After(previous)
        } else if let Some(next) = next_sibling.and_then(|e| resolve(doc, e)) {
            Anchor::Before(next)
        } else if let Some(parent) = resolve(doc, target) {
            Anchor::Append(parent)
        } else {
            self.miss(record, target);
            return;
        };
        let root = doc.root();
        let at_root = match anchor {
            Anchor::After(sibling) | Anchor::Before(sibling) => doc.parent(sibling) == Some(root),
            Anchor::Append(parent) => parent == root,
        };
        let mut wrapper: Option<NodeId> = None;

        for element in added {
            if removed.first() == Some(element) {
                continue;
            }
            let node = match parse_id(element) {
                Some(id) if previous_sibling.and_then(parse_id) == Some(id) => {
                    tracing::debug!(record, %id, "skipping cloned element");
                    self.report
                        .diagnostics
                        .push(Diagnostic::DuplicateElement { record, id });
                    continue;
                }
                Some(_) => match resolve(doc, element) {
                    Some(id) => id,
                    None => {
                        self.miss(record, element);
                        continue;
                    }
                },
                None => match create(doc, element) {
                    Some(id) => {
                        self.report.created.push(id);
                        id
                    }
                    None => {
                        self.miss(record, element);
                        continue;
                    }
                },
            };

            let inline = doc.kind(node).is_some_and(|kind| !kind.is_block_level());
            let node = if at_root && inline {
                match self.wrap_inline(doc, record, node, wrapper) {
                    Some(block) if wrapper == Some(block) => continue,
                    Some(block) => {
                        wrapper = Some(block);
                        block
                    }
                    None => continue,
                }
            } else {
                wrapper = None;
                node
            };

            let placed = match anchor {
                Anchor::After(previous) => {
                    let placed = doc.insert_after(previous, &[node]);
                    if placed.is_ok() {
                        anchor = Anchor::After(node);
                    }
                    placed
                }
                Anchor::Before(next) => doc.insert_before(next, &[node]),
                Anchor::Append(parent) => doc.push_node(parent, node),
            };
            if let Err(error) = placed {
                self.reject(record, error);
            }
        }
    }

    /// Puts inline `node`, added under the root, into `wrapper` or into a
    /// new block. Returns the block holding it.
    fn wrap_inline(
        &mut self,
        doc: &mut Document,
        record: usize,
        node: NodeId,
        wrapper: Option<NodeId>,
    ) -> Option<NodeId> {
        let block = match wrapper {
            Some(block) => block,
            None => doc.make_node(NodeKind::Block, NodeAttrs::none()),
        };
        if let Err(error) = doc.push_node(block, node) {
            self.reject(record, error);
            return None;
        }
        if wrapper.is_none() {
            self.repaired(block, Repair::WrappedInline);
        }
        Some(block)
    }

    fn flush_deletes(&mut self, doc: &mut Document) {
        let root = doc.root();
        for id in std::mem::take(&mut self.pending_deletes) {
            if !doc.is_connected(id) {
                continue;
            }
            let Some(parent) = doc.parent(id) else {
                continue;
            };
            let last_child = doc.children(parent).len() == 1;
            if last_child && parent == root {
                let block = doc.make_node(NodeKind::Block, NodeAttrs::none());
                let caret = doc.make_text("");
                let repaired = doc
                    .push_node(block, caret)
                    .and_then(|()| doc.insert_before(id, &[block]));
                match repaired {
                    Ok(()) => self.repaired(block, Repair::EmptyBlock),
                    Err(err) => tracing::warn!(%err, node = %id, "could not repair empty root"),
                }
            } else if last_child
                && matches!(
                    doc.kind(parent),
                    Some(NodeKind::Block | NodeKind::Blockquote)
                )
            {
                let caret = doc.make_text("");
                if doc.insert_before(id, &[caret]).is_ok() {
                    self.repaired(caret, Repair::EmptyText);
                }
            }

            if doc.remove(id).is_ok() {
                self.report.removed.push(id);
            }
        }
    }

    fn repaired(&mut self, node: NodeId, repair: Repair) {
        tracing::debug!(%node, ?repair, "repaired caret anchor");
        self.report
            .diagnostics
            .push(Diagnostic::Repaired { node, repair });
    }

    fn unwrap_markers(&mut self, doc: &mut Document) {
        for edit in std::mem::take(&mut self.marker_edits) {
            let Some(id) = resolve(doc, &edit.owner) else {
                self.miss(edit.record, &edit.owner);
                continue;
            };
            let Some(kind) = doc.kind(id) else {
                continue;
            };
            let Some((start, end)) = expected_markers(kind) else {
                continue;
            };
            if edit.start == start && edit.end == end {
                continue;
            }

            match unwrap(doc, id, kind, &edit.start, &edit.end) {
                Ok(()) => {
                    tracing::debug!(node = %id, %kind, "unwrapped formatting after marker edit");
                    self.report.unwrapped.push(id);
                }
                Err(error) => self.reject(edit.record, error),
            }
        }
    }
}

/// Text the marker spans of `kind` hold while untouched.
fn expected_markers(kind: NodeKind) -> Option<(&'static str, &'static str)> {
    match kind {
        NodeKind::Bold | NodeKind::Italic | NodeKind::Strike | NodeKind::Underline => {
            Some((kind.marker(), kind.marker()))
        }
        NodeKind::Blockquote => Some((kind.marker(), "")),
        NodeKind::Code => Some((kind.marker(), kind.marker())),
        NodeKind::Root | NodeKind::Block | NodeKind::Text => None,
    }
}

/// Element the surface made itself: a bare text node, or an element whose
/// `data-type` names a node kind.
fn create(doc: &mut Document, element: &ElementRef) -> Option<NodeId> {
    let kind = match element.kind.as_deref() {
        Some(kind) => kind.parse().ok()?,
        None => NodeKind::Text,
    };
    match kind {
        NodeKind::Root => None,
        NodeKind::Text => Some(doc.make_text(element.text.clone().unwrap_or_default())),
        kind => {
            let node = doc.make_node(kind, NodeAttrs::none());
            let text = doc.make_text(element.text.clone().unwrap_or_default());
            doc.push_node(node, text).ok()?;
            Some(node)
        }
    }
}

/// Dissolves a formatting node into literal marker text plus its content.
fn unwrap(
    doc: &mut Document,
    id: NodeId,
    kind: NodeKind,
    start: &str,
    end: &str,
) -> Result<(), TomError> {
    let children = doc.children(id).to_vec();
    let mut replacement = Vec::new();

    match kind {
        NodeKind::Code => {
            let last = children.len().saturating_sub(1);
            for (index, line) in children.iter().enumerate() {
                let mut text = String::new();
                if index == 0 {
                    text.push_str(start);
                }
                text.push_str(doc.text(*line).unwrap_or_default());
                if index == last {
                    text.push_str(end);
                }
                let block = doc.make_node(NodeKind::Block, NodeAttrs::none());
                let leaf = doc.make_text(text);
                doc.push_node(block, leaf)?;
                replacement.push(block);
            }
        }
        NodeKind::Blockquote => {
            let block = doc.make_node(NodeKind::Block, NodeAttrs::none());
            for node in literal_wrap(doc, start, children, end) {
                doc.push_node(block, node)?;
            }
            replacement.push(block);
        }
        _ => replacement = literal_wrap(doc, start, children, end),
    }

    doc.insert_before(id, &replacement)?;
    doc.remove(id)
}

fn literal_wrap(doc: &mut Document, start: &str, children: Vec<NodeId>, end: &str) -> Vec<NodeId> {
    let mut nodes = Vec::with_capacity(children.len() + 2);
    if !start.is_empty() {
        nodes.push(doc.make_text(start));
    }
    nodes.extend(children);
    if !end.is_empty() {
        nodes.push(doc.make_text(end));
    }
    nodes
}
