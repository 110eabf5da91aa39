//! Transmission format: plain text plus formatting entities.
//!
//! Offsets and lengths are UTF-16 code units, the convention messaging
//! backends expect.

use super::NodeKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityType {
    #[serde(rename = "MessageEntityBold")]
    Bold,
    #[serde(rename = "MessageEntityItalic")]
    Italic,
    #[serde(rename = "MessageEntityUnderline")]
    Underline,
    #[serde(rename = "MessageEntityStrike")]
    Strike,
    #[serde(rename = "MessageEntityCode")]
    Code,
    #[serde(rename = "MessageEntityBlockquote")]
    Blockquote,
}

impl EntityType {
    pub fn from_kind(kind: NodeKind) -> Option<Self> {
        match kind {
            NodeKind::Bold => Some(EntityType::Bold),
            NodeKind::Italic => Some(EntityType::Italic),
            NodeKind::Underline => Some(EntityType::Underline),
            NodeKind::Strike => Some(EntityType::Strike),
            NodeKind::Code => Some(EntityType::Code),
            NodeKind::Blockquote => Some(EntityType::Blockquote),
            NodeKind::Root | NodeKind::Block | NodeKind::Text => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub kind: EntityType,
    pub offset: usize,
    pub length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Entity {
    pub fn new(kind: EntityType, offset: usize, length: usize) -> Self {
        Self {
            kind,
            offset,
            length,
            language: None,
        }
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedText {
    pub text: String,
    pub entities: Vec<Entity>,
}

impl FormattedText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            entities: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.entities.is_empty()
    }

    /// Slice of `text` covered by `entity`, resolved from UTF-16 units.
    pub fn entity_text(&self, entity: &Entity) -> Option<String> {
        let units: Vec<u16> = self.text.encode_utf16().collect();
        let slice = units.get(entity.offset..entity.end())?;
        String::from_utf16(slice).ok()
    }
}
