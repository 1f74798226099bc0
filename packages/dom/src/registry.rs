//! # Flow Registry
//!
//! Ownership table from DOM handles to the flow model objects they render.
//!
//! Three maps are kept:
//! - mapped nodes: a DOM element standing for one [`FlowNode`], whose flow
//!   size is the node's size,
//! - editing hosts: the element bounding one flow coordinate space, with
//!   the [`FlowContent`] rendered into it,
//! - axes: the [`FlowAxis`] of a nested host.
//!
//! Every registration hands back an [`OwnerToken`]. Releasing with a token
//! that no longer matches is a no-op, so a late unmount never clobbers a
//! newer mount of the same element.

use crate::axis::FlowAxis;
use crate::tree::DomNodeId;
use scribing_flow::{FlowContent, FlowNode};
use std::collections::HashMap;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerToken(u64);

#[derive(Debug)]
struct Owned<T> {
    token: OwnerToken,
    value: T,
}

#[derive(Debug)]
struct OwnedMap<T> {
    entries: HashMap<DomNodeId, Owned<T>>,
}

impl<T> Default for OwnedMap<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> OwnedMap<T> {
    fn insert(&mut self, node: DomNodeId, token: OwnerToken, value: T) {
        self.entries.insert(node, Owned { token, value });
    }

    fn get(&self, node: DomNodeId) -> Option<&T> {
        self.entries.get(&node).map(|owned| &owned.value)
    }

    fn release(&mut self, node: DomNodeId, token: OwnerToken) -> bool {
        match self.entries.get(&node) {
            Some(owned) if owned.token == token => {
                self.entries.remove(&node);
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct FlowRegistry {
    next_token: u64,
    nodes: OwnedMap<FlowNode>,
    hosts: OwnedMap<FlowContent>,
    axes: OwnedMap<FlowAxis>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn token(&mut self) -> OwnerToken {
        self.next_token += 1;
        OwnerToken(self.next_token)
    }

    pub fn register_node(&mut self, dom: DomNodeId, node: FlowNode) -> OwnerToken {
        let token = self.token();
        self.nodes.insert(dom, token, node);
        token
    }

    pub fn register_host(&mut self, dom: DomNodeId, content: FlowContent) -> OwnerToken {
        let token = self.token();
        self.hosts.insert(dom, token, content);
        token
    }

    pub fn register_axis(&mut self, dom: DomNodeId, axis: FlowAxis) -> OwnerToken {
        let token = self.token();
        self.axes.insert(dom, token, axis);
        token
    }

    /// Remove the mapped node only if `token` still owns it
    pub fn release_node(&mut self, dom: DomNodeId, token: OwnerToken) -> bool {
        let released = self.nodes.release(dom, token);
        if !released {
            trace!(node = %dom, "Kept newer node registration");
        }
        released
    }

    pub fn release_host(&mut self, dom: DomNodeId, token: OwnerToken) -> bool {
        self.hosts.release(dom, token)
    }

    pub fn release_axis(&mut self, dom: DomNodeId, token: OwnerToken) -> bool {
        self.axes.release(dom, token)
    }

    pub fn node(&self, dom: DomNodeId) -> Option<&FlowNode> {
        self.nodes.get(dom)
    }

    pub fn host(&self, dom: DomNodeId) -> Option<&FlowContent> {
        self.hosts.get(dom)
    }

    pub fn axis(&self, dom: DomNodeId) -> Option<&FlowAxis> {
        self.axes.get(dom)
    }

    pub fn is_host(&self, dom: DomNodeId) -> bool {
        self.hosts.get(dom).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.entries.is_empty() && self.hosts.entries.is_empty() && self.axes.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::DomTree;

    #[test]
    fn test_stale_token_keeps_newer_registration() {
        let mut tree = DomTree::new();
        let span = tree.create_element("span");
        let mut registry = FlowRegistry::new();

        let first = registry.register_node(span, FlowNode::text("old"));
        let second = registry.register_node(span, FlowNode::text("new"));

        assert!(!registry.release_node(span, first));
        assert_eq!(registry.node(span), Some(&FlowNode::text("new")));
        assert!(registry.release_node(span, second));
        assert!(registry.node(span).is_none());
    }
}
