//! # DOM Tree
//!
//! Arena of element and text nodes addressed by generational ids. A removed
//! node's slot is reused with a bumped generation, so stale ids held by the
//! registry or a selection never resolve to the new occupant.
//!
//! Offsets follow DOM rules: an element offset counts children, a text
//! offset counts characters.

use crate::errors::DomError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a tree node; stale once the node is removed
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct DomNodeId {
    index: u32,
    generation: u32,
}

impl fmt::Display for DomNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomKind {
    Element { tag: String },
    Text(String),
}

#[derive(Debug, Clone)]
pub struct DomNode {
    pub kind: DomKind,
    parent: Option<DomNodeId>,
    children: Vec<DomNodeId>,
}

impl DomNode {
    pub fn parent(&self) -> Option<DomNodeId> {
        self.parent
    }

    pub fn children(&self) -> &[DomNodeId] {
        &self.children
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            DomKind::Element { tag } => Some(tag),
            DomKind::Text(_) => None,
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    node: Option<DomNode>,
}

#[derive(Debug, Default)]
pub struct DomTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl DomTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self, kind: DomKind) -> DomNodeId {
        let node = DomNode {
            kind,
            parent: None,
            children: Vec::new(),
        };
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.generation += 1;
                slot.node = Some(node);
                DomNodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                DomNodeId {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        }
    }

    pub fn create_element(&mut self, tag: impl Into<String>) -> DomNodeId {
        self.allocate(DomKind::Element { tag: tag.into() })
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> DomNodeId {
        self.allocate(DomKind::Text(text.into()))
    }

    pub fn get(&self, id: DomNodeId) -> Option<&DomNode> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn get_mut(&mut self, id: DomNodeId) -> Result<&mut DomNode, DomError> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(DomError::MissingNode(id))
    }

    pub fn contains(&self, id: DomNodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn parent(&self, id: DomNodeId) -> Option<DomNodeId> {
        self.get(id)?.parent
    }

    pub fn children(&self, id: DomNodeId) -> &[DomNodeId] {
        self.get(id).map(|node| node.children()).unwrap_or(&[])
    }

    pub fn is_text(&self, id: DomNodeId) -> bool {
        matches!(self.get(id).map(|node| &node.kind), Some(DomKind::Text(_)))
    }

    pub fn text(&self, id: DomNodeId) -> Option<&str> {
        match &self.get(id)?.kind {
            DomKind::Text(text) => Some(text),
            DomKind::Element { .. } => None,
        }
    }

    /// Character length of a text node, zero for elements
    pub fn text_len(&self, id: DomNodeId) -> usize {
        self.text(id).map(|text| text.chars().count()).unwrap_or(0)
    }

    pub fn set_text(&mut self, id: DomNodeId, text: impl Into<String>) -> Result<(), DomError> {
        let node = self.get_mut(id)?;
        node.kind = DomKind::Text(text.into());
        Ok(())
    }

    /// Number of DOM offsets inside `id`: children or characters
    pub fn offset_len(&self, id: DomNodeId) -> usize {
        if self.is_text(id) {
            self.text_len(id)
        } else {
            self.children(id).len()
        }
    }

    pub fn index_in_parent(&self, id: DomNodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|child| *child == id)
    }

    /// True when `ancestor` is `node` or one of its ancestors
    pub fn is_inclusive_ancestor(&self, ancestor: DomNodeId, node: DomNodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    pub fn append_child(&mut self, parent: DomNodeId, child: DomNodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` before `reference`, or last when `reference` is
    /// `None`. A child attached elsewhere is moved.
    pub fn insert_before(
        &mut self,
        parent: DomNodeId,
        child: DomNodeId,
        reference: Option<DomNodeId>,
    ) -> Result<(), DomError> {
        if self.is_text(parent) {
            return Err(DomError::TextHasNoChildren(parent));
        }
        if !self.contains(child) {
            return Err(DomError::MissingNode(child));
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::Cycle { parent, child });
        }
        self.detach(child)?;

        let index = match reference {
            Some(reference) => self
                .children(parent)
                .iter()
                .position(|existing| *existing == reference)
                .ok_or(DomError::NotAChild { parent, reference })?,
            None => self.children(parent).len(),
        };
        self.get_mut(parent)?.children.insert(index, child);
        self.get_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Take `id` out of its parent, keeping its subtree
    pub fn detach(&mut self, id: DomNodeId) -> Result<(), DomError> {
        let Some(parent) = self.get(id).ok_or(DomError::MissingNode(id))?.parent else {
            return Ok(());
        };
        self.get_mut(parent)?.children.retain(|child| *child != id);
        self.get_mut(id)?.parent = None;
        Ok(())
    }

    /// Detach `id` and free it with its whole subtree
    pub fn remove(&mut self, id: DomNodeId) -> Result<(), DomError> {
        self.detach(id)?;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let slot = &mut self.slots[current.index as usize];
            if let Some(node) = slot.node.take() {
                stack.extend(node.children);
                self.free.push(current.index);
            }
        }
        Ok(())
    }

    /// Descendants of `id` in document order, `id` excluded
    pub fn descendants(&self, id: DomNodeId) -> Vec<DomNodeId> {
        let mut result = Vec::new();
        let mut stack: Vec<DomNodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            result.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        result
    }
}
