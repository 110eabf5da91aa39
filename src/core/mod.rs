//! Core types shared by the document model, the parser and the surface
//! reconciler.
//!
//! - [`NodeId`] - opaque correlation id, unique for the lifetime of a node
//! - [`NodeKind`] - the closed set of node types
//! - [`NodeAttrs`] - immutable, type-specific metadata fixed at creation
//! - [`entity`] - the flat `(text, entities)` transmission format

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub mod entity;

pub const BOLD_MARKER: &str = "**";
pub const ITALIC_MARKER: &str = "__";
pub const STRIKE_MARKER: &str = "~~";
pub const UNDERLINE_MARKER: &str = "[u]";
pub const CODE_FENCE: &str = "```";
pub const QUOTE_MARKER: &str = ">";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Root,
    Block,
    Text,
    Bold,
    Italic,
    Underline,
    Strike,
    Code,
    Blockquote,
}

impl NodeKind {
    pub const INLINE_FORMATTING: [NodeKind; 4] = [
        NodeKind::Bold,
        NodeKind::Italic,
        NodeKind::Strike,
        NodeKind::Underline,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Block => "block",
            NodeKind::Text => "text",
            NodeKind::Bold => "bold",
            NodeKind::Italic => "italic",
            NodeKind::Underline => "underline",
            NodeKind::Strike => "strike",
            NodeKind::Code => "code",
            NodeKind::Blockquote => "blockquote",
        }
    }

    /// Delimiter associated with the kind; a single space for kinds without one.
    pub fn marker(self) -> &'static str {
        match self {
            NodeKind::Bold => BOLD_MARKER,
            NodeKind::Italic => ITALIC_MARKER,
            NodeKind::Strike => STRIKE_MARKER,
            NodeKind::Underline => UNDERLINE_MARKER,
            NodeKind::Code => CODE_FENCE,
            NodeKind::Blockquote => QUOTE_MARKER,
            NodeKind::Root | NodeKind::Block | NodeKind::Text => " ",
        }
    }

    pub fn is_inline_formatting(self) -> bool {
        Self::INLINE_FORMATTING.contains(&self)
    }

    /// Kinds allowed as direct children of the root.
    pub fn is_block_level(self) -> bool {
        matches!(
            self,
            NodeKind::Block | NodeKind::Code | NodeKind::Blockquote
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown node kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for NodeKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "root" => Ok(NodeKind::Root),
            "block" => Ok(NodeKind::Block),
            "text" => Ok(NodeKind::Text),
            "bold" => Ok(NodeKind::Bold),
            "italic" => Ok(NodeKind::Italic),
            "underline" => Ok(NodeKind::Underline),
            "strike" => Ok(NodeKind::Strike),
            "code" => Ok(NodeKind::Code),
            "blockquote" => Ok(NodeKind::Blockquote),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// Type-specific metadata, fixed when the node is made.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAttrs {
    /// Set on a `code` node opened by a fence.
    pub is_start: bool,
    /// Set on the text line of a closing fence.
    pub is_end: bool,
    pub language: Option<String>,
}

impl NodeAttrs {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn code_start(language: Option<String>) -> Self {
        Self {
            is_start: true,
            is_end: false,
            language,
        }
    }

    pub fn code_end() -> Self {
        Self {
            is_start: false,
            is_end: true,
            language: None,
        }
    }
}

pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_string_roundtrip() {
        let id = NodeId::new();
        let parsed: NodeId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert_ne!(NodeId::new(), id);
    }

    #[test]
    fn test_kind_markers() {
        assert_eq!(NodeKind::Bold.marker(), "**");
        assert_eq!(NodeKind::Italic.marker(), "__");
        assert_eq!(NodeKind::Strike.marker(), "~~");
        assert_eq!(NodeKind::Underline.marker(), "[u]");
        assert_eq!(NodeKind::Code.marker(), "```");
        assert_eq!(NodeKind::Blockquote.marker(), ">");
        assert_eq!(NodeKind::Text.marker(), " ");
    }

    #[test]
    fn test_kind_string_roundtrip() {
        for kind in [
            NodeKind::Root,
            NodeKind::Block,
            NodeKind::Text,
            NodeKind::Bold,
            NodeKind::Italic,
            NodeKind::Underline,
            NodeKind::Strike,
            NodeKind::Code,
            NodeKind::Blockquote,
        ] {
            assert_eq!(kind.as_str().parse::<NodeKind>(), Ok(kind));
        }
        assert!("link".parse::<NodeKind>().is_err());
    }

    #[test]
    fn test_utf16_len_counts_surrogates() {
        assert_eq!(utf16_len("abc"), 3);
        assert_eq!(utf16_len("😀"), 2);
    }
}
