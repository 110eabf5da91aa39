//! Markdown-flavoured source text to [`Document`].
//!
//! Blocks are lines. Fences (```` ``` ````) toggle a code region that
//! collects the following lines into one `code` node; `>` lines become one
//! `blockquote` node each; every other line is a `block` scanned for inline
//! markers. Parsing never fails: anything that does not match degrades to
//! literal text.

use super::{Document, TomError};
use crate::core::{
    BOLD_MARKER, CODE_FENCE, ITALIC_MARKER, NodeAttrs, NodeId, NodeKind, QUOTE_MARKER,
    STRIKE_MARKER, UNDERLINE_MARKER,
};
use std::collections::VecDeque;

/// Inline rules in priority order; the first rule that matches at a
/// position consumes the span.
const INLINE_RULES: [(NodeKind, &str); 4] = [
    (NodeKind::Bold, BOLD_MARKER),
    (NodeKind::Italic, ITALIC_MARKER),
    (NodeKind::Strike, STRIKE_MARKER),
    (NodeKind::Underline, UNDERLINE_MARKER),
];

pub struct Parser;

impl Parser {
    pub fn parse(source: &str) -> Document {
        let blocks = split_blocks(source);
        let mut doc = Document::new();
        let built = doc.quiet(|doc| {
            let mut state = BlockState { open_code: None };
            for block in &blocks {
                parse_block(doc, &mut state, block)?;
            }

            let root = doc.root();
            if let [only] = doc.children(root)
                && doc.kind(*only) == Some(NodeKind::Block)
                && doc.children(*only).is_empty()
            {
                let only = *only;
                let caret = doc.make_text("");
                doc.push_node(only, caret)?;
            }
            Ok::<_, TomError>(())
        });
        if let Err(err) = built {
            tracing::warn!(%err, "parse produced a partial tree");
        }
        doc
    }

    /// Inline-only parse. The returned document's root holds a single
    /// `block` whose children are the inline nodes; `used` markers are not
    /// matched again and `leading_boundary` says whether position 0 counts
    /// as a word start.
    pub(crate) fn parse_fragment(
        source: &str,
        used: &[&'static str],
        leading_boundary: bool,
    ) -> Document {
        let mut doc = Document::new();
        let built = doc.quiet(|doc| {
            let root = doc.root();
            let holder = doc.make_node(NodeKind::Block, NodeAttrs::none());
            let mut used = used.to_vec();
            parse_inline(doc, holder, source, &mut used, leading_boundary)?;
            doc.push_node(root, holder)
        });
        if let Err(err) = built {
            tracing::warn!(%err, "fragment parse produced a partial tree");
        }
        doc
    }
}

struct BlockState {
    open_code: Option<NodeId>,
}

/// Splits on newlines and moves mid-line fences onto lines of their own,
/// so `a ```b``` c` becomes `a `, ```` ``` ````, `b`, ```` ``` ````, ` c`.
fn split_blocks(source: &str) -> Vec<String> {
    let mut pending: VecDeque<String> = source.split('\n').map(str::to_string).collect();
    let mut blocks = Vec::with_capacity(pending.len());
    while let Some(block) = pending.pop_front() {
        match block.find(CODE_FENCE) {
            Some(start) if start > 0 => {
                let rest = &block[start + CODE_FENCE.len()..];
                if !rest.is_empty() {
                    pending.push_front(rest.to_string());
                }
                blocks.push(block[..start].to_string());
                blocks.push(CODE_FENCE.to_string());
            }
            _ => blocks.push(block),
        }
    }
    blocks
}

fn parse_block(doc: &mut Document, state: &mut BlockState, block: &str) -> Result<(), TomError> {
    if parse_code(doc, state, block)? || parse_quote(doc, block)? {
        return Ok(());
    }

    let root = doc.root();
    let node = doc.make_node(NodeKind::Block, NodeAttrs::none());
    parse_inline(doc, node, block, &mut Vec::new(), true)?;
    doc.push_node(root, node)
}

fn parse_code(doc: &mut Document, state: &mut BlockState, block: &str) -> Result<bool, TomError> {
    let is_fence = block.starts_with(CODE_FENCE);
    let open = state.open_code.filter(|id| doc.contains(*id));
    if !is_fence && open.is_none() {
        return Ok(false);
    }

    let line = strip_fences(block);
    let root = doc.root();
    match open {
        Some(code) if is_fence => {
            let text = doc.make_node(NodeKind::Text, NodeAttrs::code_end());
            doc.set_text(text, line)?;
            doc.push_node(code, text)?;
            state.open_code = None;
        }
        Some(code) => {
            let text = doc.make_text(line);
            doc.push_node(code, text)?;
        }
        None => {
            let code = doc.make_node(NodeKind::Code, NodeAttrs::code_start(fence_language(line)));
            let text = doc.make_text(line);
            doc.push_node(code, text)?;
            doc.push_node(root, code)?;
            state.open_code = Some(code);
        }
    }
    Ok(true)
}

/// Number of fence toggles in `source`, counted on the blocks the parser
/// would see after moving mid-line fences onto lines of their own.
pub(crate) fn fence_toggles(source: &str) -> usize {
    split_blocks(source)
        .iter()
        .filter(|block| block.starts_with(CODE_FENCE))
        .count()
}

fn strip_fences(block: &str) -> &str {
    let line = block.strip_prefix(CODE_FENCE).unwrap_or(block);
    line.strip_suffix(CODE_FENCE).unwrap_or(line)
}

fn fence_language(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
        return None;
    }
    Some(trimmed.to_string())
}

fn parse_quote(doc: &mut Document, block: &str) -> Result<bool, TomError> {
    let Some(content) = block.strip_prefix(QUOTE_MARKER) else {
        return Ok(false);
    };

    let root = doc.root();
    let quote = doc.make_node(NodeKind::Blockquote, NodeAttrs::none());
    parse_inline(doc, quote, content, &mut Vec::new(), true)?;
    if doc.children(quote).is_empty() {
        let caret = doc.make_text("");
        doc.push_node(quote, caret)?;
    }
    doc.push_node(root, quote)?;
    Ok(true)
}

/// Single left-to-right pass; `position` advances on every iteration.
/// Literal characters collect in `literal` and become one text node per run.
fn parse_inline(
    doc: &mut Document,
    container: NodeId,
    text: &str,
    used: &mut Vec<&'static str>,
    leading_boundary: bool,
) -> Result<(), TomError> {
    let mut literal = String::new();
    let mut position = 0;
    while position < text.len() {
        if let Some((kind, marker, close)) = match_marker(text, position, used, leading_boundary) {
            flush_literal(doc, container, &mut literal)?;
            let interior = &text[position + marker.len()..close];
            let node = doc.make_node(kind, NodeAttrs::none());
            used.push(marker);
            let nested = parse_inline(doc, node, interior, used, true);
            used.pop();
            nested?;
            doc.push_node(container, node)?;
            position = close + marker.len();
            continue;
        }

        let Some(ch) = text[position..].chars().next() else {
            break;
        };
        literal.push(ch);
        position += ch.len_utf8();
    }
    flush_literal(doc, container, &mut literal)
}

fn flush_literal(doc: &mut Document, container: NodeId, literal: &mut String) -> Result<(), TomError> {
    if literal.is_empty() {
        return Ok(());
    }
    let node = doc.make_text(std::mem::take(literal));
    doc.push_node(container, node)
}

fn match_marker(
    text: &str,
    position: usize,
    used: &[&'static str],
    leading_boundary: bool,
) -> Option<(NodeKind, &'static str, usize)> {
    let at_boundary = if position == 0 {
        leading_boundary
    } else {
        text[..position].ends_with(' ')
    };
    if !at_boundary {
        return None;
    }

    let rest = &text[position..];
    for (kind, marker) in INLINE_RULES {
        if used.contains(&marker) || !rest.starts_with(marker) {
            continue;
        }
        let interior_start = position + marker.len();
        let Some(close) = find_closing(text, interior_start, marker) else {
            continue;
        };
        if close == interior_start {
            continue;
        }
        return Some((kind, marker, close));
    }
    None
}

/// Balanced search for the closing marker. An occurrence preceded by a space
/// and followed by a non-space opens a nested span; any other occurrence
/// closes one.
fn find_closing(text: &str, from: usize, marker: &str) -> Option<usize> {
    let mut depth = 1usize;
    let mut search = from;
    while let Some(relative) = text[search..].find(marker) {
        let at = search + relative;
        let after = at + marker.len();
        let opens = text[..at].ends_with(' ')
            && text[after..].chars().next().is_some_and(|c| c != ' ');
        if opens {
            depth += 1;
        } else {
            depth -= 1;
            if depth == 0 {
                return Some(at);
            }
        }
        search = after;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(doc: &Document, id: NodeId) -> Vec<NodeKind> {
        doc.children(id)
            .iter()
            .filter_map(|child| doc.kind(*child))
            .collect()
    }

    #[test]
    fn test_split_blocks_moves_fences() {
        assert_eq!(
            split_blocks("a ```b``` c"),
            vec!["a ", "```", "b", "```", " c"]
        );
        assert_eq!(split_blocks("see ```js"), vec!["see ", "```", "js"]);
        assert_eq!(split_blocks("```js\nx"), vec!["```js", "x"]);
    }

    #[test]
    fn test_find_closing_is_balanced() {
        assert_eq!(find_closing("**a **b** c**", 2, "**"), Some(11));
        assert_eq!(find_closing("**a** and **b**", 2, "**"), Some(3));
        assert_eq!(find_closing("**never", 2, "**"), None);
    }

    #[test]
    fn test_marker_requires_word_start() {
        let doc = Parser::parse("a**b**");
        let block = doc.children(doc.root())[0];
        assert_eq!(kinds(&doc, block), vec![NodeKind::Text]);
        assert_eq!(doc.markdown(), "a**b**");
    }

    #[test]
    fn test_empty_interior_is_literal() {
        let doc = Parser::parse("****");
        assert!(doc.api_text().entities.is_empty());
        assert_eq!(doc.api_text().text, "****");
    }

    #[test]
    fn test_nested_different_markers() {
        let doc = Parser::parse("**a __b__ c**");
        let block = doc.children(doc.root())[0];
        let bold = doc.children(block)[0];
        assert_eq!(doc.kind(bold), Some(NodeKind::Bold));
        assert_eq!(
            kinds(&doc, bold),
            vec![NodeKind::Text, NodeKind::Italic, NodeKind::Text]
        );
    }

    #[test]
    fn test_underline_marker_is_three_chars() {
        let doc = Parser::parse("[u]under[u] after");
        let text = doc.api_text();
        assert_eq!(text.text, "under after");
        assert_eq!(text.entities[0].length, 5);
    }

    #[test]
    fn test_empty_source_has_caret_anchor() {
        let doc = Parser::parse("");
        let block = doc.children(doc.root())[0];
        let children = doc.children(block);
        assert_eq!(children.len(), 1);
        assert_eq!(doc.text(children[0]), Some(""));
    }

    #[test]
    fn test_quote_lines_are_separate_nodes() {
        let doc = Parser::parse(">one\n>two **b**");
        assert_eq!(
            kinds(&doc, doc.root()),
            vec![NodeKind::Blockquote, NodeKind::Blockquote]
        );
        let second = doc.children(doc.root())[1];
        assert_eq!(kinds(&doc, second), vec![NodeKind::Text, NodeKind::Bold]);
    }

    #[test]
    fn test_code_region_attrs() {
        let doc = Parser::parse("```rust\nfn main() {}\n```\nafter");
        let root_kinds = kinds(&doc, doc.root());
        assert_eq!(root_kinds, vec![NodeKind::Code, NodeKind::Block]);
        let code = doc.node(doc.children(doc.root())[0]).unwrap();
        assert!(code.attrs().is_start);
        assert_eq!(code.attrs().language.as_deref(), Some("rust"));
        let last_line = *code.children().last().unwrap();
        assert!(doc.node(last_line).unwrap().attrs().is_end);
    }

    #[test]
    fn test_code_content_is_literal() {
        let doc = Parser::parse("```\n**not bold**\n```");
        let text = doc.api_text();
        assert_eq!(text.text, "\n**not bold**\n");
        assert_eq!(text.entities.len(), 1);
    }

    fn fragment_kinds(source: &str, used: &[&'static str], leading: bool) -> Vec<NodeKind> {
        let doc = Parser::parse_fragment(source, used, leading);
        let holder = doc.children(doc.root())[0];
        kinds(&doc, holder)
    }

    #[test]
    fn test_fragment_honours_leading_boundary() {
        assert_eq!(fragment_kinds("**a**", &[], false), vec![NodeKind::Text]);
        assert_eq!(fragment_kinds("**a**", &[], true), vec![NodeKind::Bold]);
        assert_eq!(
            fragment_kinds("**a**", &[BOLD_MARKER], true),
            vec![NodeKind::Text]
        );
    }

    #[test]
    fn test_literal_run_is_one_text_node() {
        let line = "a".repeat(200_000);
        let doc = Parser::parse(&format!("{line} **b** {line}"));
        let block = doc.children(doc.root())[0];
        assert_eq!(
            kinds(&doc, block),
            vec![NodeKind::Text, NodeKind::Bold, NodeKind::Text]
        );
        assert_eq!(doc.text(doc.children(block)[0]).map(str::len), Some(200_001));
    }

    #[test]
    fn test_fence_toggles_count_mid_line_fences() {
        assert_eq!(fence_toggles("plain"), 0);
        assert_eq!(fence_toggles("```js"), 1);
        assert_eq!(fence_toggles("see ```js"), 1);
        assert_eq!(fence_toggles("alert(1)```"), 1);
        assert_eq!(fence_toggles("a ```b``` c"), 2);
        assert_eq!(fence_toggles("```js\nx\n```"), 2);
    }

    #[test]
    fn test_multibyte_text_survives() {
        let doc = Parser::parse("привет **мир** 😀");
        assert_eq!(doc.api_text().text, "привет мир 😀");
    }
}
