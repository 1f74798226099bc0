//! Concurrent edits applied in either order must converge

use scribing_flow::{
    CellPosition, CellRange, FlowBox, FlowContent, FlowNode, FlowOperation, FlowRange, FlowTable,
    FlowTheme, ParagraphStyle, ParagraphVariant, TextStyle, TieBreak, BoxStyle,
};

fn apply(content: &FlowContent, first: &FlowOperation, second: Option<FlowOperation>) -> FlowContent {
    let theme = FlowTheme::standard();
    let after = first.apply_to(content, theme);
    match second {
        Some(op) => op.apply_to(&after, theme),
        None => after,
    }
}

fn assert_converges(content: &FlowContent, a: &FlowOperation, b: &FlowOperation) -> FlowContent {
    let left = apply(content, a, a.transform(b));
    let right = apply(content, b, b.transform_with(a, TieBreak::OtherFirst));
    assert_eq!(left, right, "a={:?} b={:?}", a, b);
    left
}

fn doc() -> FlowContent {
    FlowContent::from_text("Hello world\nSecond line\n")
}

#[test]
fn test_text_edit_pairs_converge() {
    let content = doc();
    let ops = vec![
        FlowOperation::insert(0, FlowContent::from_text("A")),
        FlowOperation::insert(5, FlowContent::from_text("B")),
        FlowOperation::insert(12, FlowContent::from_text("C")),
        FlowOperation::remove(FlowRange::new(2, 8)),
        FlowOperation::remove(FlowRange::new(6, 14)),
        FlowOperation::remove(FlowRange::new(14, 10)),
        FlowOperation::FormatText {
            range: FlowRange::new(1, 9),
            style: TextStyle {
                bold: Some(true),
                ..Default::default()
            },
        },
        FlowOperation::FormatText {
            range: FlowRange::new(4, 16),
            style: TextStyle {
                bold: Some(false),
                italic: Some(true),
                ..Default::default()
            },
        },
        FlowOperation::UnformatText {
            range: FlowRange::new(0, 20),
            style: TextStyle {
                italic: Some(true),
                ..Default::default()
            },
        },
    ];
    for a in &ops {
        for b in &ops {
            assert_converges(&content, a, b);
        }
    }
}

#[test]
fn test_paragraph_format_and_insert_converge() {
    let content = doc();
    let heading = FlowOperation::FormatParagraph {
        range: FlowRange::at(3),
        style: ParagraphStyle {
            variant: Some(ParagraphVariant::H1),
            ..Default::default()
        },
    };
    let typed = FlowOperation::insert(3, FlowContent::from_text("xyz"));
    let result = assert_converges(&content, &heading, &typed);
    assert_eq!(result.text(), "Helxyzlo world\nSecond line\n");
    assert_eq!(
        result.paragraph_style_at(0).and_then(|style| style.variant),
        Some(ParagraphVariant::H1)
    );
}

#[test]
fn test_batch_against_single_converges() {
    let content = doc();
    let batch = FlowOperation::batch([
        FlowOperation::insert(0, FlowContent::from_text(">> ")),
        FlowOperation::remove(FlowRange::new(9, 14)),
    ])
    .unwrap();
    let single = FlowOperation::insert(11, FlowContent::from_text("!"));
    assert_converges(&content, &batch, &single);
    assert_converges(&content, &single, &batch);
}

#[test]
fn test_nested_box_edits_converge() {
    let content = FlowContent::from_nodes([
        FlowNode::text("ab"),
        FlowNode::Box(FlowBox {
            style: BoxStyle::default(),
            content: FlowContent::from_text("inside\n"),
        }),
        FlowNode::paragraph_break(),
    ]);
    let outer = FlowOperation::insert(0, FlowContent::from_text("xx"));
    let nested_a = FlowOperation::EditBox {
        position: 2,
        inner: Box::new(FlowOperation::insert(0, FlowContent::from_text("1"))),
    };
    let nested_b = FlowOperation::EditBox {
        position: 2,
        inner: Box::new(FlowOperation::remove(FlowRange::new(0, 3))),
    };
    assert_converges(&content, &outer, &nested_a);
    assert_converges(&content, &nested_a, &nested_b);

    // Removing the box drops the nested edit
    let remove_box = FlowOperation::remove(FlowRange::new(2, 3));
    assert!(remove_box.transform(&nested_a).is_none());
    assert_converges(&content, &remove_box, &nested_a);
}

#[test]
fn test_table_cell_edit_follows_structure() {
    let table = FlowTable::new(2, 2, &FlowContent::paragraph());
    let content = FlowContent::from_nodes([FlowNode::Table(table), FlowNode::paragraph_break()]);
    let cell_edit = FlowOperation::EditTableCell {
        position: 0,
        cell: CellPosition::new(1, 1),
        inner: Box::new(FlowOperation::insert(0, FlowContent::from_text("x"))),
    };
    let insert_column = FlowOperation::InsertTableColumn {
        position: 0,
        index: 1,
        count: 1,
    };
    let result = assert_converges(&content, &insert_column, &cell_edit);
    match &result.nodes()[0] {
        FlowNode::Table(table) => {
            assert_eq!(table.columns(), 3);
            assert_eq!(table.cell(CellPosition::new(1, 2)).unwrap().content.text(), "x\n");
        }
        other => panic!("Expected table, got {:?}", other),
    }

    let merge = FlowOperation::MergeTableCells {
        position: 0,
        range: CellRange::new(CellPosition::new(0, 0), CellPosition::new(1, 1)),
    };
    assert!(merge.transform(&cell_edit).is_none());
}

#[test]
fn test_undo_after_concurrent_edit_restores_own_change() {
    let theme = FlowTheme::standard();
    let content = doc();
    let mine = FlowOperation::insert(6, FlowContent::from_text("big "));
    let undo = mine.invert(&content).unwrap();
    let after_mine = mine.apply_to(&content, theme);

    let theirs = FlowOperation::insert(0, FlowContent::from_text(">"));
    let after_theirs = theirs.apply_to(&after_mine, theme);
    let rebased_undo = theirs.transform(&undo).unwrap();
    assert_eq!(
        rebased_undo.apply_to(&after_theirs, theme).text(),
        ">Hello world\nSecond line\n"
    );
}
