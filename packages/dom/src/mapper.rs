//! # DOM Position Mapper
//!
//! Converts between DOM positions (node, offset) and flow positions inside
//! one editing host.
//!
//! ## Flow size
//!
//! A mapped element counts as its flow node's size, whatever it renders
//! internally. Unmapped text counts zero. Any other element is transparent
//! and counts the sum of its children, so wrapper elements (paragraph
//! blocks, table rows) neither add nor hide positions.
//!
//! ## DOM to flow
//!
//! The starting position is resolved into "offset inside some element",
//! then the mapper climbs toward the boundary host, adding the flow size of
//! every earlier sibling at each level. Crossing any other editing host
//! fails: the position belongs to a nested flow.
//!
//! ## Flow to DOM
//!
//! The mapper walks the container's children, subtracting sizes until the
//! remaining position falls inside a child. A position on a child boundary
//! maps to "before the next sibling". A mapped text run descends into its
//! literal text nodes.

use crate::registry::FlowRegistry;
use crate::tree::{DomNodeId, DomTree};
use scribing_flow::FlowNode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomPosition {
    pub node: DomNodeId,
    pub offset: usize,
}

impl DomPosition {
    pub fn new(node: DomNodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// Size of `node` as seen from its parent's coordinate space
pub fn flow_size(tree: &DomTree, registry: &FlowRegistry, node: DomNodeId) -> usize {
    if let Some(mapped) = registry.node(node) {
        return mapped.size();
    }
    if tree.is_text(node) {
        return 0;
    }
    content_size(tree, registry, node)
}

/// Sum of the flow sizes of the children of `node`
pub fn content_size(tree: &DomTree, registry: &FlowRegistry, node: DomNodeId) -> usize {
    tree.children(node)
        .iter()
        .map(|child| flow_size(tree, registry, *child))
        .sum()
}

fn is_text_run(registry: &FlowRegistry, node: DomNodeId) -> bool {
    matches!(registry.node(node), Some(FlowNode::Text(_)))
}

/// Width of `child` when counting offsets inside `parent`. Literal text
/// counts its characters only inside a mapped text run.
fn child_span(tree: &DomTree, registry: &FlowRegistry, parent: DomNodeId, child: DomNodeId) -> usize {
    if tree.is_text(child) && is_text_run(registry, parent) {
        tree.text_len(child)
    } else {
        flow_size(tree, registry, child)
    }
}

/// Flow position of the first `count` children of `parent`
fn leading_size(tree: &DomTree, registry: &FlowRegistry, parent: DomNodeId, count: usize) -> usize {
    tree.children(parent)
        .iter()
        .take(count)
        .map(|child| child_span(tree, registry, parent, *child))
        .sum()
}

/// Clamp a position inside a mapped node to that node's size
fn clamp_inside(registry: &FlowRegistry, node: DomNodeId, position: usize) -> usize {
    match registry.node(node) {
        Some(mapped) if !registry.is_host(node) => position.min(mapped.size()),
        _ => position,
    }
}

/// Map a DOM position to a flow position relative to `boundary`, the
/// editing host whose coordinate space is wanted
pub fn map_dom_position_to_flow(
    tree: &DomTree,
    registry: &FlowRegistry,
    node: DomNodeId,
    offset: usize,
    boundary: DomNodeId,
) -> Option<usize> {
    if !tree.contains(node) {
        return None;
    }

    // Resolve to (element, position inside element)
    let (mut current, mut position) = if tree.is_text(node) {
        let parent = tree.parent(node)?;
        if !is_text_run(registry, parent) {
            // Stray text outside any run has no flow width
            (parent, leading_size(tree, registry, parent, tree.index_in_parent(node)?))
        } else {
            let index = tree.index_in_parent(node)?;
            let inside = leading_size(tree, registry, parent, index) + offset.min(tree.text_len(node));
            (parent, clamp_inside(registry, parent, inside))
        }
    } else {
        let count = offset.min(tree.children(node).len());
        let position = leading_size(tree, registry, node, count);
        (node, clamp_inside(registry, node, position))
    };

    loop {
        if current == boundary {
            return Some(position);
        }
        if registry.is_host(current) {
            return None;
        }
        let parent = tree.parent(current)?;
        let index = tree.index_in_parent(current)?;
        position += leading_size(tree, registry, parent, index);
        current = parent;
    }
}

/// Map a flow position inside `container` to a DOM position
pub fn map_flow_position_to_dom(
    tree: &DomTree,
    registry: &FlowRegistry,
    position: usize,
    container: DomNodeId,
) -> Option<DomPosition> {
    if !tree.contains(container) {
        return None;
    }
    let children = tree.children(container);

    if is_text_run(registry, container) && !registry.is_host(container) {
        let mut remaining = clamp_inside(registry, container, position);
        for child in children.iter().filter(|child| tree.is_text(**child)) {
            let length = tree.text_len(*child);
            if remaining <= length {
                return Some(DomPosition::new(*child, remaining));
            }
            remaining -= length;
        }
        return Some(DomPosition::new(container, children.len()));
    }

    let mut remaining = position;
    for (index, child) in children.iter().enumerate() {
        if remaining == 0 {
            return Some(DomPosition::new(container, index));
        }
        let size = flow_size(tree, registry, *child);
        if remaining < size {
            return map_flow_position_to_dom(tree, registry, remaining, *child);
        }
        remaining -= size;
    }
    (remaining == 0).then(|| DomPosition::new(container, children.len()))
}

/// Nearest editing host containing `node`, `node` included
pub fn editing_host(tree: &DomTree, registry: &FlowRegistry, node: DomNodeId) -> Option<DomNodeId> {
    let mut current = Some(node);
    while let Some(id) = current {
        if registry.is_host(id) {
            return Some(id);
        }
        current = tree.parent(id);
    }
    None
}
