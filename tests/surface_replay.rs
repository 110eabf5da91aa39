use md_tom::{
    Applied, Caret, Diagnostic, Editor, ElementRef, EntityType, MutationRecord, NodeId, NodeKind,
    Repair,
};

fn leaves(editor: &Editor) -> Vec<NodeId> {
    let doc = editor.document();
    doc.text_leaves(doc.root())
}

fn blocks(editor: &Editor) -> Vec<NodeId> {
    let doc = editor.document();
    doc.children(doc.root()).to_vec()
}

fn new_block(text: &str) -> ElementRef {
    let mut element = ElementRef::element("block");
    element.text = Some(text.to_string());
    element
}

#[test]
fn enter_splits_block() {
    let mut editor = Editor::new("hello world");
    let block = blocks(&editor)[0];
    let leaf = leaves(&editor)[0];

    let applied = editor.apply_mutations(
        &[
            MutationRecord::CharacterData {
                target: ElementRef::node(leaf),
                value: "hello".into(),
            },
            MutationRecord::ChildList {
                target: ElementRef::node(editor.document().root()),
                added: vec![new_block(" world")],
                removed: vec![],
                previous_sibling: Some(ElementRef::node(block)),
                next_sibling: None,
            },
        ],
        Some(Caret::collapsed(leaf, 5)),
    );

    assert!(applied.report.diagnostics.is_empty());
    assert_eq!(applied.report.created.len(), 1);
    assert_eq!(editor.api_text().text, "hello\n world");
    assert_eq!(applied.caret, Some(Caret::collapsed(leaf, 5)));
    assert!(editor.render().is_some());
}

#[test]
fn backspace_merges_blocks() {
    let mut editor = Editor::new("one\ntwo");
    let [first, second] = blocks(&editor)[..] else {
        panic!("expected two blocks");
    };
    let leaf = leaves(&editor)[0];

    let applied = editor.apply_mutations(
        &[
            MutationRecord::CharacterData {
                target: ElementRef::node(leaf),
                value: "onetwo".into(),
            },
            MutationRecord::ChildList {
                target: ElementRef::node(editor.document().root()),
                added: vec![],
                removed: vec![ElementRef::node(second)],
                previous_sibling: Some(ElementRef::node(first)),
                next_sibling: None,
            },
        ],
        None,
    );

    assert_eq!(applied.report.removed, vec![second]);
    assert_eq!(blocks(&editor), vec![first]);
    assert_eq!(editor.markdown(), "onetwo");
}

#[test]
fn clearing_the_document_keeps_a_caret_anchor() {
    let mut editor = Editor::new("gone");
    let block = blocks(&editor)[0];
    let root = editor.document().root();

    let applied = editor.apply_mutations(
        &[MutationRecord::ChildList {
            target: ElementRef::node(root),
            added: vec![],
            removed: vec![ElementRef::node(block)],
            previous_sibling: None,
            next_sibling: None,
        }],
        Some(Caret::collapsed(leaves(&editor)[0], 2)),
    );

    let repairs: Vec<_> = applied.report.repairs().map(|(_, r)| r).collect();
    assert_eq!(repairs, vec![Repair::EmptyBlock]);
    assert_eq!(editor.api_text().text, "");
    let anchor = leaves(&editor);
    assert_eq!(anchor.len(), 1);
    assert_eq!(applied.caret, Some(Caret::collapsed(anchor[0], 0)));
    assert!(editor.document().invariant_violations().is_empty());
}

#[test]
fn typing_into_marker_dissolves_formatting() {
    let mut editor = Editor::new("say **hi** now");
    let block = blocks(&editor)[0];
    let bold = editor.document().children(block)[1];

    let applied = editor.apply_mutations(
        &[MutationRecord::MarkerEdit {
            owner: ElementRef::node(bold),
            start: "**".into(),
            end: "*x*".into(),
        }],
        None,
    );

    assert_eq!(applied.report.unwrapped, vec![bold]);
    let text = editor.api_text();
    assert_eq!(text.text, "say **hi*x* now");
    assert!(text.entities.is_empty());
}

#[test]
fn typed_marker_formats_through_surface() {
    let mut editor = Editor::new("note");
    let leaf = leaves(&editor)[0];
    editor.apply_mutations(
        &[MutationRecord::CharacterData {
            target: ElementRef::node(leaf),
            value: "note ~~old~~".into(),
        }],
        Some(Caret::collapsed(leaf, 12)),
    );
    let text = editor.api_text();
    assert_eq!(text.text, "note old");
    assert_eq!(text.entities[0].kind, EntityType::Strike);
    assert_eq!((text.entities[0].offset, text.entities[0].length), (5, 3));
}

#[test]
fn stale_ids_are_reported_and_skipped() {
    let mut editor = Editor::new("keep");
    let leaf = leaves(&editor)[0];

    let applied = editor.apply_mutations(
        &[
            MutationRecord::CharacterData {
                target: ElementRef::node("not-an-id"),
                value: "lost".into(),
            },
            MutationRecord::ChildList {
                target: ElementRef::node(NodeId::new()),
                added: vec![new_block("orphan")],
                removed: vec![],
                previous_sibling: None,
                next_sibling: None,
            },
            MutationRecord::CharacterData {
                target: ElementRef::node(leaf),
                value: "kept".into(),
            },
        ],
        None,
    );

    assert_eq!(applied.report.correlation_misses(), 2);
    assert!(matches!(
        applied.report.diagnostics[0],
        Diagnostic::CorrelationMiss { record: 0, .. }
    ));
    assert_eq!(editor.api_text().text, "kept");
}

#[test]
fn records_arrive_as_json() {
    let mut editor = Editor::new("**a**");
    let bold_leaf = leaves(&editor)[0];
    let json = format!(
        r#"[{{"type": "characterData", "target": {{"id": "{bold_leaf}"}}, "value": "ab"}}]"#
    );
    let records: Vec<MutationRecord> = serde_json::from_str(&json).unwrap();

    editor.apply_mutations(&records, None);
    let text = editor.api_text();
    assert_eq!(text.text, "ab");
    assert_eq!(text.entities[0].length, 2);
}

#[test]
fn html_ids_correlate_back_to_nodes() {
    let editor = Editor::new("a **b**\n>c");
    let html = editor.document().html();
    for id in editor.document().descendants(editor.document().root()).into_iter().skip(1) {
        assert!(html.contains(&format!(r#"data-id="{id}""#)), "{id} missing");
        let kind = editor.document().kind(id).unwrap();
        assert_ne!(kind, NodeKind::Root);
    }
}

fn edit_code_markers(start: &str, end: &str) -> (Editor, NodeId, Applied) {
    let mut editor = Editor::new("```js\nx\n```");
    let code = blocks(&editor)[0];
    assert_eq!(editor.document().kind(code), Some(NodeKind::Code));
    let applied = editor.apply_mutations(
        &[MutationRecord::MarkerEdit {
            owner: ElementRef::node(code),
            start: start.into(),
            end: end.into(),
        }],
        None,
    );
    (editor, code, applied)
}

#[test]
fn broken_code_start_marker_leaves_literal_lines() {
    let (editor, code, applied) = edit_code_markers("``", "```");

    assert_eq!(applied.report.unwrapped, vec![code]);
    let doc = editor.document();
    let top = blocks(&editor);
    assert_eq!(top.len(), 3);
    assert!(top.iter().all(|b| doc.kind(*b) == Some(NodeKind::Block)));
    let lines: Vec<String> = top
        .iter()
        .map(|b| doc.node(*b).unwrap().text_content())
        .collect();
    assert_eq!(lines, vec!["``js", "x", "```"]);

    let text = editor.api_text();
    assert_eq!(text.text, "``js\nx\n```");
    assert!(text.entities.is_empty());
    assert!(doc.invariant_violations().is_empty());
}

#[test]
fn edited_code_end_marker_reforms_the_fence() {
    let (editor, code, applied) = edit_code_markers("```", "```x");

    assert_eq!(applied.report.unwrapped, vec![code]);
    let doc = editor.document();
    let top = blocks(&editor);
    assert_eq!(top.len(), 1);
    assert_ne!(top[0], code);
    assert_eq!(doc.kind(top[0]), Some(NodeKind::Code));

    let text = editor.api_text();
    assert_eq!(text.text, "js\nx\nx");
    assert_eq!(text.entities.len(), 1);
    let entity = &text.entities[0];
    assert_eq!(entity.kind, EntityType::Code);
    assert_eq!((entity.offset, entity.length), (0, 6));
    assert_eq!(entity.language.as_deref(), Some("js"));
    assert_eq!(editor.markdown(), "```js\nx\n```x");
}
