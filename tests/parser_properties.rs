use md_tom::core::NodeAttrs;
use md_tom::{Document, Entity, EntityType, NodeId, NodeKind, Parser};

fn kinds(doc: &Document, id: NodeId) -> Vec<NodeKind> {
    doc.children(id)
        .iter()
        .filter_map(|child| doc.kind(*child))
        .collect()
}

#[test]
fn marker_matching_splits_text_around_bold() {
    let doc = Parser::parse("hello **bold** world");
    let root = doc.root();
    assert_eq!(kinds(&doc, root), vec![NodeKind::Block]);

    let block = doc.children(root)[0];
    let children = doc.children(block).to_vec();
    assert_eq!(
        kinds(&doc, block),
        vec![NodeKind::Text, NodeKind::Bold, NodeKind::Text]
    );
    assert_eq!(doc.text(children[0]), Some("hello "));
    assert_eq!(doc.node(children[1]).unwrap().text_content(), "bold");
    assert_eq!(doc.text(children[2]), Some(" world"));

    let text = doc.api_text();
    assert_eq!(text.text, "hello bold world");
    assert_eq!(text.entities, vec![Entity::new(EntityType::Bold, 6, 4)]);
}

#[test]
fn used_marker_is_not_reopened_inside_itself() {
    let doc = Parser::parse("**a **b** c**");
    let block = doc.children(doc.root())[0];
    let bold = doc.children(block)[0];
    assert_eq!(doc.kind(bold), Some(NodeKind::Bold));
    assert_eq!(kinds(&doc, bold), vec![NodeKind::Text]);
    assert_eq!(doc.node(bold).unwrap().text_content(), "a **b** c");

    for id in doc.descendants(bold).into_iter().skip(1) {
        assert_ne!(doc.kind(id), Some(NodeKind::Bold));
    }
    assert_eq!(doc.api_text().entities.len(), 1);
}

#[test]
fn unterminated_marker_is_literal() {
    let doc = Parser::parse("**never closes");
    let block = doc.children(doc.root())[0];
    assert_eq!(kinds(&doc, block), vec![NodeKind::Text]);
    assert_eq!(doc.text(doc.children(block)[0]), Some("**never closes"));
    assert!(doc.api_text().entities.is_empty());
}

#[test]
fn fenced_lines_become_one_code_node() {
    let doc = Parser::parse("```js\nalert(1)\n```");
    let root = doc.root();
    assert_eq!(kinds(&doc, root), vec![NodeKind::Code]);
    let code = doc.node(doc.children(root)[0]).unwrap();
    assert_eq!(code.text_content(), "js\nalert(1)\n");
}

#[test]
fn incremental_fence_matches_parsed_fence() {
    let parsed = Parser::parse("```js\nalert(1)\n```");

    let mut doc = Document::new();
    let root = doc.root();
    doc.batch_change(|doc| {
        for line in ["```js", "alert(1)", "```"] {
            let block = doc.make_node(NodeKind::Block, NodeAttrs::none());
            let text = doc.make_text(line);
            doc.push_node(block, text).unwrap();
            doc.push_node(root, block).unwrap();
        }
    });

    assert_eq!(kinds(&doc, root), vec![NodeKind::Code]);
    let built = doc.node(doc.children(root)[0]).unwrap();
    let expected = parsed.node(parsed.children(parsed.root())[0]).unwrap();
    assert_eq!(built.text_content(), expected.text_content());
    assert_eq!(built.attrs(), expected.attrs());
    assert_eq!(doc.api_text(), parsed.api_text());
}

#[test]
fn bake_merges_adjacent_inserted_text() {
    let mut doc = Parser::parse("ab");
    let leaf = doc.text_leaves(doc.root())[0];
    let before = doc.make_text("x");
    let empty = doc.make_text("");
    let after = doc.make_text("y");
    doc.insert_before(leaf, &[before, empty]).unwrap();
    doc.insert_after(leaf, &[after]).unwrap();

    doc.bake_nodes(doc.root());
    let block = doc.children(doc.root())[0];
    let children = doc.children(block).to_vec();
    assert_eq!(children.len(), 1);
    assert_eq!(doc.text(children[0]), Some("xaby"));
    assert!(doc.invariant_violations().is_empty());
}

#[test]
fn plain_keystroke_replaces_nothing() {
    let mut doc = Parser::parse("hello");
    let before = doc.descendants(doc.root());
    let leaf = doc.text_leaves(doc.root())[0];

    doc.batch_change(|doc| {
        doc.insert_text(leaf, 5, "!").unwrap();
    });

    assert_eq!(doc.descendants(doc.root()), before);
    assert_eq!(doc.text(leaf), Some("hello!"));
}

#[test]
fn entity_offsets_skip_marker_characters() {
    let doc = Parser::parse("a __b__ c");
    let text = doc.api_text();
    assert_eq!(text.text, "a b c");
    assert_eq!(text.entities, vec![Entity::new(EntityType::Italic, 2, 1)]);
}

#[test]
fn unterminated_fence_runs_to_end_of_input() {
    let doc = Parser::parse("before\n```\nx **y**\n>z");
    let root = doc.root();
    assert_eq!(kinds(&doc, root), vec![NodeKind::Block, NodeKind::Code]);
    let code = doc.node(doc.children(root)[1]).unwrap();
    assert_eq!(code.children().len(), 3);
    assert_eq!(code.text_content(), "\nx **y**\n>z");
    assert!(
        !code
            .child_nodes()
            .any(|line| line.attrs().is_end)
    );
}

#[test]
fn quote_lines_stay_separate() {
    let doc = Parser::parse(">one\n>two");
    assert_eq!(
        kinds(&doc, doc.root()),
        vec![NodeKind::Blockquote, NodeKind::Blockquote]
    );
    let entities = doc.api_text().entities;
    assert_eq!(
        entities,
        vec![
            Entity::new(EntityType::Blockquote, 0, 3),
            Entity::new(EntityType::Blockquote, 4, 3),
        ]
    );
}

#[test]
fn mid_line_fence_opens_code() {
    let doc = Parser::parse("see ```rust\nfn x()\n```");
    let root = doc.root();
    assert_eq!(kinds(&doc, root), vec![NodeKind::Block, NodeKind::Code]);
    let text = doc.api_text();
    assert_eq!(text.text, "see \n\nrust\nfn x()\n");
}

#[test]
fn parsed_trees_are_well_formed() {
    for source in [
        "",
        "\n\n",
        "**",
        "a ```b``` c",
        ">",
        "```",
        "[u]x[u] ~~y~~ __z__ **w**",
        "😀 **👍🏽**",
    ] {
        let doc = Parser::parse(source);
        assert!(
            doc.invariant_violations().is_empty(),
            "{source:?}: {:?}",
            doc.invariant_violations()
        );
        assert_eq!(doc.registered_len(), doc.descendants(doc.root()).len());
    }
}
