//! # Selection Bridge
//!
//! Translates native DOM selections into [`FlowSelection`]s and back.
//!
//! Going up, both ends are mapped inside their editing host and the result
//! is wrapped through the axis of every nested host between it and the
//! root. Ends in two cells of the same table become a cell rectangle.
//!
//! Going down, the selection is unwrapped level by level by finding the
//! nested host whose axis matches. A cell rectangle becomes one DOM range
//! per covered cell.
//!
//! Applying a selection reconciles the current native ranges against the
//! desired ones and reports only the mutations needed. Ranges that already
//! match are never touched.

use crate::axis::FlowAxis;
use crate::mapper::{editing_host, map_dom_position_to_flow, map_flow_position_to_dom, DomPosition};
use crate::registry::FlowRegistry;
use crate::tree::{DomNodeId, DomTree};
use scribing_flow::{CellRange, FlowNode, FlowSelection};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomRange {
    pub anchor: DomPosition,
    pub focus: DomPosition,
}

impl DomRange {
    pub fn new(anchor: DomPosition, focus: DomPosition) -> Self {
        Self { anchor, focus }
    }

    pub fn collapsed(position: DomPosition) -> Self {
        Self::new(position, position)
    }
}

/// One change to the native selection. Indices refer to the range list
/// as it stands when the mutation is applied, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionMutation {
    Add(DomRange),
    Remove { index: usize },
    Modify { index: usize, range: DomRange },
}

/// Wrap `selection`, made inside `host`, up to `root`
fn wrap_to_root(
    tree: &DomTree,
    registry: &FlowRegistry,
    root: DomNodeId,
    mut host: DomNodeId,
    mut selection: FlowSelection,
) -> Option<FlowSelection> {
    while host != root {
        let axis = registry.axis(host)?;
        selection = axis.create_nested_selection(selection);
        host = editing_host(tree, registry, tree.parent(host)?)?;
    }
    Some(selection)
}

/// The mapped table element enclosing a table cell host
fn table_of(tree: &DomTree, registry: &FlowRegistry, cell: DomNodeId) -> Option<DomNodeId> {
    let mut current = tree.parent(cell);
    while let Some(id) = current {
        if matches!(registry.node(id), Some(FlowNode::Table(_))) {
            return Some(id);
        }
        current = tree.parent(id);
    }
    None
}

pub fn map_dom_range_to_flow(
    tree: &DomTree,
    registry: &FlowRegistry,
    root: DomNodeId,
    range: &DomRange,
) -> Option<FlowSelection> {
    let anchor_host = editing_host(tree, registry, range.anchor.node)?;
    let focus_host = editing_host(tree, registry, range.focus.node)?;

    if anchor_host == focus_host {
        let anchor = map_dom_position_to_flow(tree, registry, range.anchor.node, range.anchor.offset, anchor_host)?;
        let focus = map_dom_position_to_flow(tree, registry, range.focus.node, range.focus.offset, focus_host)?;
        return wrap_to_root(tree, registry, root, anchor_host, FlowSelection::range(anchor, focus));
    }

    // Ends in two cells of one table select the rectangle between them
    match (registry.axis(anchor_host), registry.axis(focus_host)) {
        (
            Some(FlowAxis::TableCell { position, cell: anchor }),
            Some(FlowAxis::TableCell { position: other, cell: focus }),
        ) if position == other => {
            let table = table_of(tree, registry, anchor_host)?;
            if table_of(tree, registry, focus_host)? != table {
                return None;
            }
            let host = editing_host(tree, registry, table)?;
            let selection = FlowSelection::Table {
                position: *position,
                range: CellRange::new(*anchor, *focus),
            };
            wrap_to_root(tree, registry, root, host, selection)
        }
        _ => None,
    }
}

/// Map a possibly multi-range native selection. Several ranges are taken
/// as one span from the first anchor to the last focus, which is how
/// browsers report a selection across table cells.
pub fn map_dom_selection_to_flow(
    tree: &DomTree,
    registry: &FlowRegistry,
    root: DomNodeId,
    ranges: &[DomRange],
) -> Option<FlowSelection> {
    match ranges {
        [] => None,
        [single] => map_dom_range_to_flow(tree, registry, root, single),
        [first, .., last] => map_dom_range_to_flow(
            tree,
            registry,
            root,
            &DomRange::new(first.anchor, last.focus),
        ),
    }
}

/// Nested hosts whose closest enclosing host is `host`
fn child_hosts(tree: &DomTree, registry: &FlowRegistry, host: DomNodeId) -> Vec<DomNodeId> {
    tree.descendants(host)
        .into_iter()
        .filter(|node| registry.axis(*node).is_some())
        .filter(|node| {
            tree.parent(*node)
                .and_then(|parent| editing_host(tree, registry, parent))
                == Some(host)
        })
        .collect()
}

pub fn map_flow_selection_to_dom(
    tree: &DomTree,
    registry: &FlowRegistry,
    root: DomNodeId,
    selection: &FlowSelection,
) -> Option<Vec<DomRange>> {
    let mut host = root;
    let mut selection = selection;
    loop {
        match selection {
            FlowSelection::Range(range) => {
                let anchor = map_flow_position_to_dom(tree, registry, range.anchor, host)?;
                let focus = map_flow_position_to_dom(tree, registry, range.focus, host)?;
                return Some(vec![DomRange::new(anchor, focus)]);
            }
            FlowSelection::Table { position, range } => {
                let mut cells: Vec<_> = child_hosts(tree, registry, host)
                    .into_iter()
                    .filter_map(|node| match registry.axis(node) {
                        Some(FlowAxis::TableCell { position: p, cell })
                            if p == position && range.contains(*cell) =>
                        {
                            Some((*cell, node))
                        }
                        _ => None,
                    })
                    .collect();
                if cells.is_empty() {
                    return None;
                }
                cells.sort_by_key(|(cell, _)| *cell);
                return Some(
                    cells
                        .into_iter()
                        .map(|(_, node)| {
                            DomRange::new(
                                DomPosition::new(node, 0),
                                DomPosition::new(node, tree.children(node).len()),
                            )
                        })
                        .collect(),
                );
            }
            nested => {
                let (next, inner) = child_hosts(tree, registry, host)
                    .into_iter()
                    .find_map(|node| {
                        let inner = registry.axis(node)?.get_inner_selection(nested)?;
                        Some((node, inner))
                    })?;
                host = next;
                selection = inner;
            }
        }
    }
}

/// Mutations turning `current` into `desired`. Ranges are matched by
/// container and offset, so a current range that is also desired is kept
/// wherever it sits. Stale ranges are reused for missing ones before any
/// range is removed or added.
pub fn reconcile(current: &[DomRange], desired: &[DomRange]) -> Vec<SelectionMutation> {
    let stale: Vec<usize> = (0..current.len())
        .filter(|&index| !desired.contains(&current[index]))
        .collect();
    let mut missing = desired
        .iter()
        .enumerate()
        .filter(|(index, range)| !current.contains(range) && !desired[..*index].contains(range))
        .map(|(_, range)| *range);

    let mut mutations = Vec::new();
    let mut removed = Vec::new();
    for &index in &stale {
        match missing.next() {
            Some(range) => mutations.push(SelectionMutation::Modify { index, range }),
            None => removed.push(index),
        }
    }
    for &index in removed.iter().rev() {
        mutations.push(SelectionMutation::Remove { index });
    }
    mutations.extend(missing.map(SelectionMutation::Add));
    mutations
}

/// Mutations projecting `selection` onto the native selection `current`.
/// An unmappable selection leaves the DOM alone.
pub fn apply_flow_selection(
    tree: &DomTree,
    registry: &FlowRegistry,
    root: DomNodeId,
    current: &[DomRange],
    selection: &FlowSelection,
) -> Vec<SelectionMutation> {
    match map_flow_selection_to_dom(tree, registry, root, selection) {
        Some(desired) => reconcile(current, &desired),
        None => {
            warn!(?selection, "Selection cannot be mapped to the DOM");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges() -> [DomRange; 4] {
        let mut tree = DomTree::new();
        let node = tree.create_element("div");
        [0, 1, 2, 3].map(|offset| DomRange::collapsed(DomPosition::new(node, offset)))
    }

    #[test]
    fn test_reconcile_keeps_matching_ranges() {
        let [a, b, c, _] = ranges();
        assert!(reconcile(&[a, b], &[a, b]).is_empty());
        assert!(reconcile(&[b, a], &[a, b]).is_empty());
        assert_eq!(reconcile(&[b], &[a, b]), vec![SelectionMutation::Add(a)]);
        assert_eq!(
            reconcile(&[a, b, c], &[a, c]),
            vec![SelectionMutation::Remove { index: 1 }]
        );
        assert_eq!(reconcile(&[], &[a]), vec![SelectionMutation::Add(a)]);
    }

    #[test]
    fn test_reconcile_reuses_stale_ranges() {
        let [a, b, c, d] = ranges();
        assert_eq!(
            reconcile(&[a], &[b]),
            vec![SelectionMutation::Modify { index: 0, range: b }]
        );
        assert_eq!(
            reconcile(&[a, b, c], &[d, b]),
            vec![
                SelectionMutation::Modify { index: 0, range: d },
                SelectionMutation::Remove { index: 2 },
            ]
        );
        assert_eq!(
            reconcile(&[a], &[b, a, c]),
            vec![SelectionMutation::Add(b), SelectionMutation::Add(c)]
        );
    }
}
