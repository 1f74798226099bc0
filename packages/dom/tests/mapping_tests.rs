//! Position mapping and selection bridge tests over rendered flows

use scribing_dom::{
    apply_flow_selection, handle_before_input, map_dom_position_to_flow, map_dom_range_to_flow,
    map_dom_selection_to_flow, map_flow_position_to_dom, map_flow_selection_to_dom,
    render_content, unmount, BeforeInput, DomNodeId, DomPosition, DomRange, DomTree, FlowAxis,
    FlowRegistry, RenderedFlow, SelectionMutation,
};
use scribing_editor::{EditorController, EditorState};
use scribing_flow::{
    BoxStyle, CellPosition, CellRange, FlowBox, FlowContent, FlowNode, FlowSelection, FlowTable,
    FlowTheme,
};
use std::collections::BTreeMap;

struct Surface {
    tree: DomTree,
    registry: FlowRegistry,
    rendered: RenderedFlow,
}

impl Surface {
    fn render(content: &FlowContent) -> anyhow::Result<Self> {
        let mut tree = DomTree::new();
        let mut registry = FlowRegistry::new();
        let rendered = render_content(&mut tree, &mut registry, content)?;
        Ok(Self {
            tree,
            registry,
            rendered,
        })
    }

    fn root(&self) -> DomNodeId {
        self.rendered.root()
    }

    fn find_tag(&self, tag: &str) -> DomNodeId {
        self.tree
            .descendants(self.root())
            .into_iter()
            .find(|node| self.tree.get(*node).and_then(|n| n.tag()) == Some(tag))
            .unwrap()
    }

    fn find_text(&self, text: &str) -> DomNodeId {
        self.tree
            .descendants(self.root())
            .into_iter()
            .find(|node| self.tree.text(*node) == Some(text))
            .unwrap()
    }

    fn cells(&self) -> BTreeMap<CellPosition, DomNodeId> {
        self.tree
            .descendants(self.root())
            .into_iter()
            .filter_map(|node| match self.registry.axis(node) {
                Some(FlowAxis::TableCell { cell, .. }) => Some((*cell, node)),
                _ => None,
            })
            .collect()
    }

    fn round_trip(&self, position: usize, host: DomNodeId) -> Option<usize> {
        let dom = map_flow_position_to_dom(&self.tree, &self.registry, position, host)?;
        map_dom_position_to_flow(&self.tree, &self.registry, dom.node, dom.offset, host)
    }
}

/// `ab[box: xy]c¶d` followed by a line break and an icon
fn mixed_content() -> FlowContent {
    FlowContent::from_nodes([
        FlowNode::text("ab"),
        FlowNode::Box(FlowBox {
            style: BoxStyle::default(),
            content: FlowContent::from_text("xy"),
        }),
        FlowNode::text("c"),
        FlowNode::paragraph_break(),
        FlowNode::text("d"),
        FlowNode::line_break(),
        FlowNode::text("e"),
    ])
}

fn table_content() -> FlowContent {
    FlowContent::from_nodes([
        FlowNode::Table(FlowTable::new(2, 2, &FlowContent::paragraph())),
        FlowNode::paragraph_break(),
    ])
}

#[test]
fn test_every_position_round_trips() -> anyhow::Result<()> {
    let content = mixed_content();
    let surface = Surface::render(&content)?;

    for position in 0..=content.size() {
        assert_eq!(
            surface.round_trip(position, surface.root()),
            Some(position),
            "position {position}"
        );
    }
    assert_eq!(
        map_flow_position_to_dom(&surface.tree, &surface.registry, content.size() + 1, surface.root()),
        None
    );

    let host = surface.find_tag("div");
    for position in 0..=2 {
        assert_eq!(surface.round_trip(position, host), Some(position));
    }
    Ok(())
}

#[test]
fn test_table_cells_round_trip() -> anyhow::Result<()> {
    let surface = Surface::render(&table_content())?;
    let cells = surface.cells();
    assert_eq!(cells.len(), 4);
    for host in cells.values() {
        assert_eq!(surface.round_trip(0, *host), Some(0));
        assert_eq!(surface.round_trip(1, *host), Some(1));
    }
    Ok(())
}

#[test]
fn test_nested_host_does_not_leak_into_outer_flow() -> anyhow::Result<()> {
    let surface = Surface::render(&mixed_content())?;
    let inner_text = surface.find_text("xy");
    assert_eq!(
        map_dom_position_to_flow(&surface.tree, &surface.registry, inner_text, 1, surface.root()),
        None
    );
    assert_eq!(
        map_dom_position_to_flow(
            &surface.tree,
            &surface.registry,
            inner_text,
            1,
            surface.find_tag("div")
        ),
        Some(1)
    );
    Ok(())
}

#[test]
fn test_selection_inside_box_is_nested() -> anyhow::Result<()> {
    let surface = Surface::render(&mixed_content())?;
    let inner_text = surface.find_text("xy");
    let range = DomRange::new(DomPosition::new(inner_text, 2), DomPosition::new(inner_text, 0));

    let selection = map_dom_range_to_flow(&surface.tree, &surface.registry, surface.root(), &range);
    let expected = FlowSelection::Box {
        position: 2,
        inner: Box::new(FlowSelection::range(2, 0)),
    };
    assert_eq!(selection, Some(expected.clone()));

    let back = map_flow_selection_to_dom(&surface.tree, &surface.registry, surface.root(), &expected)
        .unwrap();
    assert_eq!(back.len(), 1);
    assert_eq!(
        map_dom_range_to_flow(&surface.tree, &surface.registry, surface.root(), &back[0]),
        Some(expected)
    );
    Ok(())
}

#[test]
fn test_matching_selection_needs_no_mutation() -> anyhow::Result<()> {
    let surface = Surface::render(&mixed_content())?;
    let selection = FlowSelection::range(1, 4);
    let current =
        map_flow_selection_to_dom(&surface.tree, &surface.registry, surface.root(), &selection)
            .unwrap();

    let mutations =
        apply_flow_selection(&surface.tree, &surface.registry, surface.root(), &current, &selection);
    assert!(mutations.is_empty());

    let moved = apply_flow_selection(
        &surface.tree,
        &surface.registry,
        surface.root(),
        &current,
        &FlowSelection::caret(0),
    );
    assert!(matches!(moved.as_slice(), [SelectionMutation::Modify { index: 0, .. }]));
    Ok(())
}

#[test]
fn test_ranges_across_cells_select_table() -> anyhow::Result<()> {
    let surface = Surface::render(&table_content())?;
    let cells = surface.cells();
    let first = cells[&CellPosition::new(0, 0)];
    let last = cells[&CellPosition::new(1, 1)];

    let ranges = [
        DomRange::collapsed(DomPosition::new(first, 0)),
        DomRange::collapsed(DomPosition::new(last, 0)),
    ];
    let selection =
        map_dom_selection_to_flow(&surface.tree, &surface.registry, surface.root(), &ranges);
    let expected = FlowSelection::Table {
        position: 0,
        range: CellRange::new(CellPosition::new(0, 0), CellPosition::new(1, 1)),
    };
    assert_eq!(selection, Some(expected.clone()));

    let back = map_flow_selection_to_dom(&surface.tree, &surface.registry, surface.root(), &expected)
        .unwrap();
    assert_eq!(back.len(), 4);
    assert_eq!(back[0].anchor, DomPosition::new(first, 0));
    Ok(())
}

#[test]
fn test_partial_table_selection_adds_only_missing_ranges() -> anyhow::Result<()> {
    let surface = Surface::render(&table_content())?;
    let selection = FlowSelection::Table {
        position: 0,
        range: CellRange::new(CellPosition::new(0, 0), CellPosition::new(1, 1)),
    };
    let desired =
        map_flow_selection_to_dom(&surface.tree, &surface.registry, surface.root(), &selection)
            .unwrap();
    assert_eq!(desired.len(), 4);

    let apply = |current: &[DomRange]| {
        apply_flow_selection(&surface.tree, &surface.registry, surface.root(), current, &selection)
    };

    let reversed: Vec<DomRange> = desired.iter().rev().copied().collect();
    assert!(apply(&reversed).is_empty());

    assert_eq!(
        apply(&[desired[3], desired[1]]),
        vec![
            SelectionMutation::Add(desired[0]),
            SelectionMutation::Add(desired[2]),
        ]
    );

    let stray = DomRange::collapsed(DomPosition::new(surface.cells()[&CellPosition::new(0, 0)], 0));
    assert_eq!(
        apply(&[stray, desired[2]]),
        vec![
            SelectionMutation::Modify {
                index: 0,
                range: desired[0],
            },
            SelectionMutation::Add(desired[1]),
            SelectionMutation::Add(desired[3]),
        ]
    );
    Ok(())
}

#[test]
fn test_caret_in_cell_is_table_cell_selection() -> anyhow::Result<()> {
    let surface = Surface::render(&table_content())?;
    let cell = surface.cells()[&CellPosition::new(0, 1)];
    let selection = map_dom_range_to_flow(
        &surface.tree,
        &surface.registry,
        surface.root(),
        &DomRange::collapsed(DomPosition::new(cell, 0)),
    );
    assert_eq!(
        selection,
        Some(FlowSelection::TableCell {
            position: 0,
            cell: CellPosition::new(0, 1),
            inner: Box::new(FlowSelection::caret(0)),
        })
    );
    Ok(())
}

#[test]
fn test_late_unmount_keeps_newer_registration() -> anyhow::Result<()> {
    let mut surface = Surface::render(&FlowContent::from_text("old"))?;
    let span = surface.find_tag("span");
    surface.registry.register_node(span, FlowNode::text("new"));

    let Surface {
        mut tree,
        mut registry,
        rendered,
    } = surface;
    unmount(&mut tree, &mut registry, rendered)?;
    assert_eq!(registry.node(span), Some(&FlowNode::text("new")));
    assert!(!tree.contains(span));
    Ok(())
}

fn editor_for(content: &FlowContent) -> EditorController {
    EditorController::new(EditorState::new(content.clone(), FlowTheme::default()))
}

#[test]
fn test_insert_text_goes_through_controller() -> anyhow::Result<()> {
    let content = FlowContent::from_text("Hello");
    let surface = Surface::render(&content)?;
    let mut editor = editor_for(&content);
    let text = surface.find_text("Hello");

    let event = BeforeInput::new("insertText")
        .with_data(" world")
        .with_target_ranges(vec![DomRange::collapsed(DomPosition::new(text, 5))]);
    assert!(handle_before_input(
        &mut editor,
        &surface.tree,
        &surface.registry,
        surface.root(),
        &event
    ));
    assert_eq!(editor.state().content().text(), "Hello world");
    assert_eq!(editor.state().selection(), &FlowSelection::caret(11));

    assert!(editor.undo());
    assert_eq!(editor.state().content().text(), "Hello");
    Ok(())
}

#[test]
fn test_unsupported_input_is_ignored() -> anyhow::Result<()> {
    let content = FlowContent::from_text("Hello");
    let surface = Surface::render(&content)?;
    let mut editor = editor_for(&content);

    let event = BeforeInput::new("insertOrderedList");
    assert!(!handle_before_input(
        &mut editor,
        &surface.tree,
        &surface.registry,
        surface.root(),
        &event
    ));
    assert_eq!(editor.state().content().text(), "Hello");
    assert!(!editor.can_undo());
    Ok(())
}

#[test]
fn test_unmappable_target_discards_event() -> anyhow::Result<()> {
    let content = FlowContent::from_text("Hello");
    let mut surface = Surface::render(&content)?;
    let mut editor = editor_for(&content);
    let detached = surface.tree.create_element("p");

    let event = BeforeInput::new("insertText")
        .with_data("!")
        .with_target_ranges(vec![DomRange::collapsed(DomPosition::new(detached, 0))]);
    assert!(!handle_before_input(
        &mut editor,
        &surface.tree,
        &surface.registry,
        surface.root(),
        &event
    ));
    assert_eq!(editor.state().content().text(), "Hello");
    Ok(())
}

#[test]
fn test_before_input_deserializes_from_browser_shape() -> anyhow::Result<()> {
    let event: BeforeInput = serde_json::from_str(r#"{"inputType": "historyUndo"}"#)?;
    assert_eq!(event, BeforeInput::new("historyUndo"));
    Ok(())
}
