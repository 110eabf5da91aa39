//! Output formats: the flat entity form sent to a messaging backend, the
//! html rendered into the editing surface, and the markdown source the
//! parser reads back.

use super::Document;
use crate::core::entity::{Entity, EntityType, FormattedText};
use crate::core::{CODE_FENCE, NodeId, NodeKind, QUOTE_MARKER, utf16_len};
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlConfig {
    /// Rendered in place of an empty text node or an empty block, so the
    /// line keeps its height and can hold a caret.
    pub empty_line_placeholder: String,
}

impl Default for HtmlConfig {
    fn default() -> Self {
        Self {
            empty_line_placeholder: "<br />".to_string(),
        }
    }
}

impl Document {
    /// Plain text with one entity per formatting node and per code or
    /// quote block. Blocks are joined with `\n`; offsets are UTF-16 units.
    /// Entities are listed in post-order and empty spans are dropped.
    pub fn api_text(&self) -> FormattedText {
        let mut out = FormattedText::default();
        let mut units = 0usize;

        for (index, block) in self.children(self.root()).iter().enumerate() {
            if index > 0 {
                out.text.push('\n');
                units += 1;
            }
            let start = units;
            match self.kind(*block) {
                Some(NodeKind::Code) => {
                    let content = self
                        .node(*block)
                        .map(|node| node.text_content())
                        .unwrap_or_default();
                    units += utf16_len(&content);
                    out.text.push_str(&content);
                }
                Some(_) => {
                    for child in self.children(*block) {
                        self.collect_entities(*child, &mut out, &mut units);
                    }
                }
                None => continue,
            }

            if let Some(kind) = self.kind(*block).and_then(EntityType::from_kind)
                && units > start
            {
                let mut entity = Entity::new(kind, start, units - start);
                if kind == EntityType::Code {
                    entity.language = self
                        .node(*block)
                        .and_then(|node| node.attrs().language.clone());
                }
                out.entities.push(entity);
            }
        }
        out
    }

    fn collect_entities(&self, id: NodeId, out: &mut FormattedText, units: &mut usize) {
        let Some(node) = self.node(id) else {
            return;
        };
        if node.kind() == NodeKind::Text {
            out.text.push_str(node.text());
            *units += utf16_len(node.text());
            return;
        }

        let start = *units;
        for child in node.children() {
            self.collect_entities(*child, out, units);
        }
        if let Some(kind) = EntityType::from_kind(node.kind())
            && *units > start
        {
            out.entities.push(Entity::new(kind, start, *units - start));
        }
    }

    pub fn html(&self) -> String {
        self.html_with_config(&HtmlConfig::default())
    }

    /// Every element carries `data-id` and `data-type` so the surface
    /// reconciler can map DOM mutations back to nodes.
    pub fn html_with_config(&self, config: &HtmlConfig) -> String {
        let mut out = String::new();
        for block in self.children(self.root()) {
            self.render_html(*block, config, &mut out);
        }
        out
    }

    fn render_html(&self, id: NodeId, config: &HtmlConfig, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        let kind = node.kind();
        let data = format!(r#"data-id="{}" data-type="{}""#, id, kind);

        let (tag, extra) = match kind {
            NodeKind::Text => {
                let body = if node.text().is_empty() {
                    config.empty_line_placeholder.clone()
                } else {
                    html_escape::encode_text(node.text()).into_owned()
                };
                let _ = write!(out, "<span {data}>{body}</span>");
                return;
            }
            NodeKind::Root => {
                for child in node.children() {
                    self.render_html(*child, config, out);
                }
                return;
            }
            NodeKind::Bold => ("strong", String::new()),
            NodeKind::Italic => ("i", String::new()),
            NodeKind::Strike => ("del", String::new()),
            NodeKind::Underline => ("u", String::new()),
            NodeKind::Block | NodeKind::Blockquote => (
                if kind == NodeKind::Block { "div" } else { "blockquote" },
                " data-block".to_string(),
            ),
            NodeKind::Code => {
                let mut extra = " data-block".to_string();
                if node.attrs().is_start {
                    extra.push_str(r#" class="code-block-start""#);
                }
                if let Some(language) = &node.attrs().language {
                    let _ = write!(
                        extra,
                        r#" data-language="{}""#,
                        html_escape::encode_double_quoted_attribute(language)
                    );
                }
                ("pre", extra)
            }
        };

        let _ = write!(out, "<{tag} {data}{extra}>");
        if node.children().is_empty() && kind.is_block_level() {
            out.push_str(&config.empty_line_placeholder);
        }
        for (index, child) in node.children().iter().enumerate() {
            if kind == NodeKind::Code && index > 0 {
                out.push('\n');
            }
            self.render_html(*child, config, out);
        }
        let _ = write!(out, "</{tag}>");
    }

    /// Source text that parses back to this tree.
    pub fn markdown(&self) -> String {
        self.children(self.root())
            .iter()
            .map(|block| block_markdown(self, *block))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Markdown for one root child. Code nodes span several lines.
pub(crate) fn block_markdown(doc: &Document, block: NodeId) -> String {
    let mut out = String::new();
    match doc.kind(block) {
        Some(NodeKind::Code) => {
            for (index, line) in doc.children(block).iter().enumerate() {
                if index > 0 {
                    out.push('\n');
                }
                let closing = doc.node(*line).is_some_and(|node| node.attrs().is_end);
                if index == 0 || closing {
                    out.push_str(CODE_FENCE);
                }
                out.push_str(doc.text(*line).unwrap_or_default());
            }
        }
        Some(NodeKind::Blockquote) => {
            out.push_str(QUOTE_MARKER);
            inline_markdown(doc, block, &mut out);
        }
        Some(_) => inline_markdown(doc, block, &mut out),
        None => {}
    }
    out
}

fn inline_markdown(doc: &Document, id: NodeId, out: &mut String) {
    for child in doc.children(id) {
        match doc.kind(*child) {
            Some(NodeKind::Text) => out.push_str(doc.text(*child).unwrap_or_default()),
            Some(kind) => {
                let marker = if kind.is_inline_formatting() { kind.marker() } else { "" };
                out.push_str(marker);
                inline_markdown(doc, *child, out);
                out.push_str(marker);
            }
            None => {}
        }
    }
}
