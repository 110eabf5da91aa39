//! Document model: node arena, correlation index, batching and change
//! notification.
//!
//! The [`Document`] owns every node it has made. Nodes reachable from the
//! root are registered in the correlation index; detached nodes (freshly
//! made, or adopted from a scratch parse) live in the arena until they are
//! attached or removed. Mutations of connected nodes mark the document
//! dirty; the outermost [`Document::batch_change`] flushes it by running the
//! incremental re-parse and then notifying subscribers once.

use crate::core::{NodeAttrs, NodeId, NodeKind, utf16_len};
use std::collections::{HashMap, HashSet};
use std::fmt;
use unicode_segmentation::UnicodeSegmentation;

pub mod parser;
pub mod reparse;
pub mod serialize;

pub use parser::Parser;
pub use reparse::ReparseConfig;
pub use serialize::HtmlConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TomError {
    #[error("cannot set text on {kind} node {id}")]
    TextOnNonText { id: NodeId, kind: NodeKind },
    #[error("node {0} has no parent")]
    NoParent(NodeId),
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
    #[error("text node {0} cannot have children")]
    ChildOfText(NodeId),
    #[error("inserting node {0} would create a cycle")]
    CyclicInsert(NodeId),
    #[error("the root node cannot be moved or removed")]
    RootImmutable,
    #[error("{kind} node {id} cannot be a child of the root")]
    InlineAtRoot { id: NodeId, kind: NodeKind },
    #[error("invalid offset")]
    InvalidOffset,
    #[error("invalid grapheme boundary")]
    InvalidGraphemeBoundary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct NodeData {
    id: NodeId,
    kind: NodeKind,
    text: String,
    attrs: NodeAttrs,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind, attrs: NodeAttrs) -> Self {
        Self {
            id: NodeId::new(),
            kind,
            text: String::new(),
            attrs,
            children: Vec::new(),
            parent: None,
        }
    }
}

/// Read-only view of one node.
#[derive(Clone, Copy)]
pub struct Node<'a> {
    doc: &'a Document,
    data: &'a NodeData,
}

impl<'a> Node<'a> {
    pub fn id(&self) -> NodeId {
        self.data.id
    }

    pub fn kind(&self) -> NodeKind {
        self.data.kind
    }

    pub fn text(&self) -> &'a str {
        &self.data.text
    }

    pub fn attrs(&self) -> &'a NodeAttrs {
        &self.data.attrs
    }

    pub fn marker(&self) -> &'static str {
        self.data.kind.marker()
    }

    pub fn children(&self) -> &'a [NodeId] {
        &self.data.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.data.parent
    }

    pub fn child_nodes(&self) -> impl Iterator<Item = Node<'a>> + 'a {
        let doc = self.doc;
        self.data
            .children
            .iter()
            .filter_map(move |child| doc.node(*child))
    }

    pub fn next_sibling(&self) -> Option<NodeId> {
        let parent = self.doc.node(self.data.parent?)?;
        let index = parent.children().iter().position(|c| *c == self.data.id)?;
        parent.children().get(index + 1).copied()
    }

    pub fn previous_sibling(&self) -> Option<NodeId> {
        let parent = self.doc.node(self.data.parent?)?;
        let index = parent.children().iter().position(|c| *c == self.data.id)?;
        index.checked_sub(1).map(|i| parent.children()[i])
    }

    /// Concatenated text of the subtree. Lines of a `code` node are joined
    /// with `\n`.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.doc.collect_text(self.data.id, &mut out);
        out
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.data.id)
            .field("kind", &self.data.kind)
            .field("text", &self.data.text)
            .field("children", &self.data.children.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

struct Subscriber {
    id: Subscription,
    callback: Box<dyn FnMut(&Document)>,
}

pub struct Document {
    root: NodeId,
    nodes: HashMap<NodeId, NodeData>,
    index: HashSet<NodeId>,
    subscribers: Vec<Subscriber>,
    next_subscription: u64,
    batch_depth: usize,
    dirty: bool,
    revision: u64,
    reparse: ReparseConfig,
}

impl Document {
    pub fn new() -> Self {
        let root = NodeData::new(NodeKind::Root, NodeAttrs::none());
        let root_id = root.id;
        let mut nodes = HashMap::new();
        nodes.insert(root_id, root);
        let mut index = HashSet::new();
        index.insert(root_id);
        Self {
            root: root_id,
            nodes,
            index,
            subscribers: Vec::new(),
            next_subscription: 1,
            batch_depth: 0,
            dirty: false,
            revision: 0,
            reparse: ReparseConfig::default(),
        }
    }

    pub fn with_reparse_config(mut self, config: ReparseConfig) -> Self {
        self.reparse = config;
        self
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_node(&self) -> Node<'_> {
        Node {
            doc: self,
            data: &self.nodes[&self.root],
        }
    }

    /// Number of flushes that reached subscribers.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Any node owned by the arena, attached or not.
    pub fn node(&self, id: NodeId) -> Option<Node<'_>> {
        self.nodes.get(&id).map(|data| Node { doc: self, data })
    }

    /// Correlation lookup: only nodes registered in the index.
    pub fn get_node_by_id(&self, id: NodeId) -> Option<Node<'_>> {
        if !self.index.contains(&id) {
            return None;
        }
        self.node(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn registered_len(&self) -> usize {
        self.index.len()
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.nodes.get(&id).map(|data| data.kind)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|data| data.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|data| data.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(&id).map(|data| data.text.as_str())
    }

    pub fn make_node(&mut self, kind: NodeKind, attrs: NodeAttrs) -> NodeId {
        let data = NodeData::new(kind, attrs);
        let id = data.id;
        self.nodes.insert(id, data);
        id
    }

    pub fn make_text(&mut self, text: impl Into<String>) -> NodeId {
        let mut data = NodeData::new(NodeKind::Text, NodeAttrs::none());
        data.text = text.into();
        let id = data.id;
        self.nodes.insert(id, data);
        id
    }

    pub fn register_node(&mut self, id: NodeId) {
        if self.nodes.contains_key(&id) {
            self.index.insert(id);
        }
    }

    pub fn register_deep(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(data) = self.nodes.get(&current) {
                stack.extend(data.children.iter().copied());
                self.index.insert(current);
            }
        }
    }

    pub fn unregister_node(&mut self, id: NodeId) {
        if id != self.root {
            self.index.remove(&id);
        }
    }

    /// Evicts `id` and its subtree from the index; the nodes stay in the
    /// arena.
    pub fn unregister_deep(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(data) = self.nodes.get(&current) {
                stack.extend(data.children.iter().copied());
                self.unregister_node(current);
            }
        }
    }

    /// True when `id` is reachable from the root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root {
                return true;
            }
            current = self.nodes.get(&node).and_then(|data| data.parent);
        }
        false
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> Result<(), TomError> {
        let data = self.nodes.get_mut(&id).ok_or(TomError::NodeNotFound(id))?;
        if data.kind != NodeKind::Text {
            return Err(TomError::TextOnNonText {
                id,
                kind: data.kind,
            });
        }
        data.text = text.into();
        self.changed(id);
        Ok(())
    }

    /// Inserts `text` at a grapheme offset of a text node; returns the byte
    /// offset used.
    pub fn insert_text(
        &mut self,
        id: NodeId,
        grapheme_offset: usize,
        text: &str,
    ) -> Result<usize, TomError> {
        let current = self.text_node(id)?;
        let byte_offset =
            grapheme_offset_to_byte(current, grapheme_offset).ok_or(TomError::InvalidOffset)?;
        let mut updated = current.to_string();
        updated.insert_str(byte_offset, text);
        self.set_text(id, updated)?;
        Ok(byte_offset)
    }

    /// Deletes the graphemes in `start..end` of a text node.
    pub fn delete_text(&mut self, id: NodeId, start: usize, end: usize) -> Result<(), TomError> {
        if start > end {
            return Err(TomError::InvalidOffset);
        }
        let current = self.text_node(id)?;
        let from = grapheme_offset_to_byte(current, start).ok_or(TomError::InvalidOffset)?;
        let to = grapheme_offset_to_byte(current, end).ok_or(TomError::InvalidOffset)?;
        let mut updated = current.to_string();
        updated.replace_range(from..to, "");
        self.set_text(id, updated)
    }

    /// Byte-offset insert that refuses to split a grapheme cluster.
    pub fn insert_text_at_byte(
        &mut self,
        id: NodeId,
        byte_offset: usize,
        text: &str,
    ) -> Result<(), TomError> {
        let current = self.text_node(id)?;
        if byte_offset > current.len() || !current.is_char_boundary(byte_offset) {
            return Err(TomError::InvalidOffset);
        }
        if !is_grapheme_boundary(current, byte_offset) {
            return Err(TomError::InvalidGraphemeBoundary);
        }
        let mut updated = current.to_string();
        updated.insert_str(byte_offset, text);
        self.set_text(id, updated)
    }

    fn text_node(&self, id: NodeId) -> Result<&str, TomError> {
        let data = self.nodes.get(&id).ok_or(TomError::NodeNotFound(id))?;
        if data.kind != NodeKind::Text {
            return Err(TomError::TextOnNonText {
                id,
                kind: data.kind,
            });
        }
        Ok(&data.text)
    }

    pub fn push_node(&mut self, parent: NodeId, child: NodeId) -> Result<(), TomError> {
        self.attach(parent, child, |children| children.len())
    }

    pub fn unshift_node(&mut self, parent: NodeId, child: NodeId) -> Result<(), TomError> {
        self.attach(parent, child, |_| 0)
    }

    /// Inserts `nodes`, in order, directly before `anchor` under its parent.
    pub fn insert_before(&mut self, anchor: NodeId, nodes: &[NodeId]) -> Result<(), TomError> {
        let parent = self.parent_of(anchor)?;
        for node in nodes {
            if *node == anchor {
                continue;
            }
            self.attach(parent, *node, |children| {
                children
                    .iter()
                    .position(|c| *c == anchor)
                    .unwrap_or(children.len())
            })?;
        }
        Ok(())
    }

    /// Inserts `nodes`, in order, directly after `anchor` under its parent.
    pub fn insert_after(&mut self, anchor: NodeId, nodes: &[NodeId]) -> Result<(), TomError> {
        let parent = self.parent_of(anchor)?;
        let mut previous = anchor;
        for node in nodes {
            if *node == anchor {
                continue;
            }
            let after = previous;
            self.attach(parent, *node, |children| {
                children
                    .iter()
                    .position(|c| *c == after)
                    .map(|i| i + 1)
                    .unwrap_or(children.len())
            })?;
            previous = *node;
        }
        Ok(())
    }

    fn parent_of(&self, id: NodeId) -> Result<NodeId, TomError> {
        let data = self.nodes.get(&id).ok_or(TomError::NodeNotFound(id))?;
        data.parent.ok_or(TomError::NoParent(id))
    }

    /// Detaches `child` from its current parent and inserts it under
    /// `parent` at the position chosen by `position` (computed after the
    /// detach).
    fn attach(
        &mut self,
        parent: NodeId,
        child: NodeId,
        position: impl FnOnce(&[NodeId]) -> usize,
    ) -> Result<(), TomError> {
        if child == self.root {
            return Err(TomError::RootImmutable);
        }
        let parent_kind = self.kind(parent).ok_or(TomError::NodeNotFound(parent))?;
        if !self.nodes.contains_key(&child) {
            return Err(TomError::NodeNotFound(child));
        }
        if parent_kind == NodeKind::Text {
            return Err(TomError::ChildOfText(parent));
        }
        if parent == self.root
            && let Some(kind) = self.kind(child).filter(|kind| !kind.is_block_level())
        {
            return Err(TomError::InlineAtRoot { id: child, kind });
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(TomError::CyclicInsert(child));
        }

        if let Some(old_parent) = self.detach(child) {
            self.changed(old_parent);
        }

        if let Some(parent_data) = self.nodes.get_mut(&parent) {
            let index = position(parent_data.children.as_slice()).min(parent_data.children.len());
            parent_data.children.insert(index, child);
        }
        if let Some(child_data) = self.nodes.get_mut(&child) {
            child_data.parent = Some(parent);
        }
        if self.is_connected(parent) {
            self.register_deep(child);
        } else {
            self.unregister_deep(child);
        }
        self.changed(parent);
        Ok(())
    }

    fn detach(&mut self, child: NodeId) -> Option<NodeId> {
        let old_parent = self.nodes.get_mut(&child)?.parent.take()?;
        if let Some(parent_data) = self.nodes.get_mut(&old_parent) {
            parent_data.children.retain(|c| *c != child);
        }
        Some(old_parent)
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|data| data.parent);
        }
        false
    }

    /// Destroys `id` and its subtree: detaches it, evicts every node from
    /// the index and drops it from the arena.
    pub fn remove(&mut self, id: NodeId) -> Result<(), TomError> {
        if id == self.root {
            return Err(TomError::RootImmutable);
        }
        if !self.nodes.contains_key(&id) {
            return Err(TomError::NodeNotFound(id));
        }
        let was_connected = self.is_connected(id);
        let old_parent = self.detach(id);

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(data) = self.nodes.remove(&current) {
                stack.extend(data.children);
                self.index.remove(&current);
            }
        }

        if let Some(parent) = old_parent
            && was_connected
        {
            self.changed(parent);
        }
        Ok(())
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TomError> {
        if self.parent(child) != Some(parent) {
            return Ok(());
        }
        self.remove(child)
    }

    /// Moves every node of `scratch` except its root into this arena and
    /// returns the scratch root's children, now detached and unregistered.
    pub fn adopt(&mut self, mut scratch: Document) -> Vec<NodeId> {
        let Some(scratch_root) = scratch.nodes.remove(&scratch.root) else {
            return Vec::new();
        };
        for (id, mut data) in scratch.nodes.drain() {
            if data.parent == Some(scratch.root) {
                data.parent = None;
            }
            self.nodes.insert(id, data);
        }
        scratch_root.children
    }

    /// Merges adjacent text siblings below `id` and drops empty text nodes
    /// that are not the only child of their parent. Lines of `code` nodes
    /// are left alone.
    pub fn bake_nodes(&mut self, id: NodeId) {
        if let Err(err) = self.batch_change(|doc| doc.bake_node(id)) {
            tracing::warn!(%err, node = %id, "bake stopped early");
        }
    }

    fn bake_node(&mut self, id: NodeId) -> Result<(), TomError> {
        let kind = self.kind(id).ok_or(TomError::NodeNotFound(id))?;
        let children = self.children(id).to_vec();
        if kind == NodeKind::Code {
            return Ok(());
        }

        let mut previous_text: Option<NodeId> = None;
        for child in children {
            match self.kind(child) {
                Some(NodeKind::Text) => {
                    if let Some(previous) = previous_text {
                        let appended = self.text(child).unwrap_or_default().to_string();
                        if !appended.is_empty() {
                            let mut merged = self.text(previous).unwrap_or_default().to_string();
                            merged.push_str(&appended);
                            self.set_text(previous, merged)?;
                        }
                        self.remove(child)?;
                    } else {
                        previous_text = Some(child);
                    }
                }
                Some(_) => {
                    previous_text = None;
                    self.bake_node(child)?;
                }
                None => {}
            }
        }

        let remaining = self.children(id).to_vec();
        if remaining.len() > 1 {
            for child in remaining {
                let empty_text =
                    self.kind(child) == Some(NodeKind::Text) && self.text(child) == Some("");
                if empty_text && self.children(id).len() > 1 {
                    self.remove(child)?;
                }
            }
        }
        Ok(())
    }

    /// Runs `f` as one mutation batch. Batches nest; reconciliation and
    /// subscriber notification run once, when the outermost batch closes.
    pub fn batch_change<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.batch_depth += 1;
        let result = f(self);
        self.batch_depth -= 1;
        if self.batch_depth == 0 && self.dirty {
            self.flush();
        }
        result
    }

    /// Runs `f` without reconciling or notifying, for building a tree that
    /// is already in canonical form.
    pub(crate) fn quiet<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let was_dirty = self.dirty;
        self.batch_depth += 1;
        let result = f(self);
        self.batch_depth -= 1;
        self.dirty = was_dirty;
        result
    }

    pub fn in_batch(&self) -> bool {
        self.batch_depth > 0
    }

    pub fn on_change(&mut self, callback: impl FnMut(&Document) + 'static) -> Subscription {
        let id = Subscription(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push(Subscriber {
            id,
            callback: Box::new(callback),
        });
        id
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != subscription);
        before != self.subscribers.len()
    }

    /// Records a change to a connected node. Outside a batch this flushes
    /// immediately.
    pub fn notify_change(&mut self) {
        self.dirty = true;
        if self.batch_depth == 0 {
            self.flush();
        }
    }

    fn changed(&mut self, id: NodeId) {
        if self.is_connected(id) {
            self.notify_change();
        }
    }

    fn flush(&mut self) {
        self.batch_depth += 1;
        for pass in 0..self.reparse.max_passes {
            self.dirty = false;
            let changed = reparse::reconcile_pass(self);
            tracing::trace!(pass, changed, "reparse pass");
            if !changed {
                break;
            }
        }
        self.dirty = false;
        self.batch_depth -= 1;
        self.revision += 1;

        let mut subscribers = std::mem::take(&mut self.subscribers);
        for subscriber in subscribers.iter_mut() {
            (subscriber.callback)(self);
        }
        subscribers.append(&mut self.subscribers);
        self.subscribers = subscribers;
    }

    /// Ids of the subtree rooted at `id`, pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(data) = self.nodes.get(&current) {
                out.push(current);
                stack.extend(data.children.iter().rev().copied());
            }
        }
        out
    }

    /// Text leaves of the subtree rooted at `id`, in document order.
    pub fn text_leaves(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|node| self.kind(*node) == Some(NodeKind::Text))
            .collect()
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(data) = self.nodes.get(&id) else {
            return;
        };
        match data.kind {
            NodeKind::Text => out.push_str(&data.text),
            NodeKind::Code => {
                for (index, child) in data.children.iter().enumerate() {
                    if index > 0 {
                        out.push('\n');
                    }
                    self.collect_text(*child, out);
                }
            }
            _ => {
                for child in &data.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// UTF-16 length of the subtree's text content.
    pub fn utf16_len_of(&self, id: NodeId) -> usize {
        self.node(id)
            .map(|node| utf16_len(&node.text_content()))
            .unwrap_or(0)
    }

    /// Structural invariant violations, empty when the tree is well formed.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        let root = &self.nodes[&self.root];
        if root.parent.is_some() {
            violations.push("root has a parent".to_string());
        }
        for child in &root.children {
            match self.kind(*child) {
                Some(kind) if kind.is_block_level() => {}
                Some(kind) => violations.push(format!("{kind} node {child} is a child of root")),
                None => violations.push(format!("root references missing node {child}")),
            }
        }

        let mut reachable = HashSet::new();
        let mut stack = vec![self.root];
        while let Some(current) = stack.pop() {
            if !reachable.insert(current) {
                violations.push(format!("node {current} reachable twice"));
                continue;
            }
            let Some(data) = self.nodes.get(&current) else {
                continue;
            };
            if data.kind == NodeKind::Text && !data.children.is_empty() {
                violations.push(format!("text node {current} has children"));
            }
            for child in &data.children {
                match self.nodes.get(child) {
                    Some(child_data) if child_data.parent == Some(current) => {}
                    Some(_) => violations.push(format!("node {child} has a stale parent link")),
                    None => violations.push(format!("node {current} references missing {child}")),
                }
                stack.push(*child);
            }
        }

        for id in &reachable {
            if !self.index.contains(id) {
                violations.push(format!("connected node {id} is not registered"));
            }
        }
        for id in &self.index {
            if !reachable.contains(id) {
                violations.push(format!("registered node {id} is not connected"));
            }
        }
        violations
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Clones the tree; subscribers are not carried over.
impl Clone for Document {
    fn clone(&self) -> Self {
        Self {
            root: self.root,
            nodes: self.nodes.clone(),
            index: self.index.clone(),
            subscribers: Vec::new(),
            next_subscription: 1,
            batch_depth: 0,
            dirty: false,
            revision: self.revision,
            reparse: self.reparse.clone(),
        }
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("root", &self.root)
            .field("nodes", &self.nodes.len())
            .field("registered", &self.index.len())
            .field("subscribers", &self.subscribers.len())
            .field("revision", &self.revision)
            .finish()
    }
}

pub(crate) fn grapheme_offset_to_byte(text: &str, grapheme_offset: usize) -> Option<usize> {
    if grapheme_offset == 0 {
        return Some(0);
    }

    let mut count = 0;
    for (byte_index, _) in text.grapheme_indices(true) {
        if count == grapheme_offset {
            return Some(byte_index);
        }
        count += 1;
    }
    if count == grapheme_offset {
        Some(text.len())
    } else {
        None
    }
}

pub(crate) fn is_grapheme_boundary(text: &str, byte_offset: usize) -> bool {
    if byte_offset == 0 || byte_offset == text.len() {
        return true;
    }
    text.grapheme_indices(true)
        .any(|(index, _)| index == byte_offset)
}
