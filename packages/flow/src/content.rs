//! # Flow Content
//!
//! Immutable, cheaply clonable sequence of flow nodes. Every edit returns a
//! new value; holders of the old value keep seeing the old document.
//!
//! Content is always normalized: adjacent text runs with identical style are
//! merged and empty runs are dropped, so two contents that render the same
//! compare equal.

use crate::node::{FlowNode, TextRun};
use crate::range::FlowRange;
use crate::style::{ParagraphStyle, TextStyle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<FlowNode>", into = "Vec<FlowNode>")]
pub struct FlowContent {
    nodes: Arc<Vec<FlowNode>>,
    size: usize,
}

/// Location of a position relative to the node sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeCursor {
    /// Index of the node containing the position (`len` when at the end)
    pub index: usize,
    /// Offset inside that node
    pub offset: usize,
}

/// A styled node span inside a range, used for style queries and inverses
#[derive(Debug, Clone, PartialEq)]
pub struct StyledSegment {
    pub range: FlowRange,
    pub style: TextStyle,
    pub paragraph: Option<ParagraphStyle>,
}

impl FlowContent {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build normalized content from nodes
    pub fn from_nodes(nodes: impl IntoIterator<Item = FlowNode>) -> Self {
        let nodes = normalize(nodes.into_iter().collect());
        let size = nodes.iter().map(FlowNode::size).sum();
        Self {
            nodes: Arc::new(nodes),
            size,
        }
    }

    /// Plain text content; every `\n` becomes a paragraph break
    pub fn from_text(text: &str) -> Self {
        let mut nodes = Vec::new();
        for (index, line) in text.split('\n').enumerate() {
            if index > 0 {
                nodes.push(FlowNode::paragraph_break());
            }
            nodes.push(FlowNode::text(line));
        }
        Self::from_nodes(nodes)
    }

    /// A single empty paragraph
    pub fn paragraph() -> Self {
        Self::from_nodes([FlowNode::paragraph_break()])
    }

    pub fn nodes(&self) -> &[FlowNode] {
        &self.nodes
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Plain text rendition; breaks become `\n`, other atoms are skipped
    pub fn text(&self) -> String {
        let mut text = String::new();
        for node in self.nodes.iter() {
            match node {
                FlowNode::Text(run) => text.push_str(&run.text),
                FlowNode::LineBreak { .. } | FlowNode::ParagraphBreak { .. } => text.push('\n'),
                _ => {}
            }
        }
        text
    }

    pub fn ends_with_paragraph_break(&self) -> bool {
        self.nodes
            .last()
            .is_some_and(FlowNode::is_paragraph_break)
    }

    pub fn concat(&self, other: &FlowContent) -> FlowContent {
        let mut nodes = self.nodes.as_ref().clone();
        nodes.extend(other.nodes.iter().cloned());
        Self::from_nodes(nodes)
    }

    /// Locate the node containing `position`
    pub fn peek(&self, position: usize) -> Option<NodeCursor> {
        if position > self.size {
            return None;
        }
        let mut start = 0;
        for (index, node) in self.nodes.iter().enumerate() {
            let size = node.size();
            if position < start + size {
                return Some(NodeCursor {
                    index,
                    offset: position - start,
                });
            }
            start += size;
        }
        Some(NodeCursor {
            index: self.nodes.len(),
            offset: 0,
        })
    }

    /// Node whose span contains `position`
    pub fn node_at(&self, position: usize) -> Option<&FlowNode> {
        let cursor = self.peek(position)?;
        self.nodes.get(cursor.index)
    }

    /// Non-text node starting exactly at `position`
    pub fn atom_at(&self, position: usize) -> Option<&FlowNode> {
        let cursor = self.peek(position)?;
        match self.nodes.get(cursor.index) {
            Some(FlowNode::Text(_)) | None => None,
            Some(node) => Some(node),
        }
    }

    /// Start position of every node
    pub fn node_positions(&self) -> impl Iterator<Item = (usize, &FlowNode)> + '_ {
        self.nodes.iter().scan(0, |start, node| {
            let position = *start;
            *start += node.size();
            Some((position, node))
        })
    }

    pub fn copy(&self, range: FlowRange) -> FlowContent {
        let range = range.clamp(self.size);
        let (_, rest) = split_nodes(&self.nodes, range.first());
        let (middle, _) = split_nodes(&rest, range.size());
        Self::from_nodes(middle)
    }

    pub fn insert(&self, position: usize, content: &FlowContent) -> FlowContent {
        if content.is_empty() {
            return self.clone();
        }
        let (mut before, after) = split_nodes(&self.nodes, position.min(self.size));
        before.extend(content.nodes.iter().cloned());
        before.extend(after);
        Self::from_nodes(before)
    }

    pub fn remove(&self, range: FlowRange) -> FlowContent {
        let range = range.clamp(self.size);
        if range.is_collapsed() {
            return self.clone();
        }
        let (mut before, rest) = split_nodes(&self.nodes, range.first());
        let (_, after) = split_nodes(&rest, range.size());
        before.extend(after);
        Self::from_nodes(before)
    }

    /// Replace the non-text node at `position`; `None` when there is none
    pub fn update_atom(
        &self,
        position: usize,
        update: impl FnOnce(&FlowNode) -> Option<FlowNode>,
    ) -> Option<FlowContent> {
        let cursor = self.peek(position)?;
        let node = self.nodes.get(cursor.index)?;
        if matches!(node, FlowNode::Text(_)) {
            return None;
        }
        let replacement = update(node)?;
        let mut nodes = self.nodes.as_ref().clone();
        nodes[cursor.index] = replacement;
        Some(Self::from_nodes(nodes))
    }

    /// Paragraph style of the paragraph containing `position`
    pub fn paragraph_style_at(&self, position: usize) -> Option<&ParagraphStyle> {
        self.node_positions()
            .find(|(start, node)| *start >= position && node.is_paragraph_break())
            .and_then(|(_, node)| node.paragraph_style())
    }

    /// Positions of the paragraph breaks ending every paragraph touched by
    /// `range`
    pub fn paragraph_breaks(&self, range: FlowRange) -> Vec<usize> {
        let first = range.first();
        let probe = if range.is_collapsed() {
            range.last()
        } else {
            range.last() - 1
        };
        let mut breaks = Vec::new();
        for (position, node) in self.node_positions() {
            if !node.is_paragraph_break() || position < first {
                continue;
            }
            breaks.push(position);
            if position >= probe {
                break;
            }
        }
        breaks
    }

    /// Inline-styled node spans inside `range`, clipped to it
    pub fn styled_segments(&self, range: FlowRange) -> Vec<StyledSegment> {
        let range = range.clamp(self.size);
        let paragraphs = paragraph_styles(&self.nodes);
        let mut segments = Vec::new();
        let mut start = 0;
        for (index, node) in self.nodes.iter().enumerate() {
            let end = start + node.size();
            let clip_start = start.max(range.first());
            let clip_end = end.min(range.last());
            if clip_start < clip_end {
                if let Some(style) = node.text_style() {
                    segments.push(StyledSegment {
                        range: FlowRange::new(clip_start, clip_end),
                        style: style.clone(),
                        paragraph: paragraphs[index].clone(),
                    });
                }
            }
            start = end;
        }
        segments
    }

    /// Inline style in effect for a caret at `position` (the node before it,
    /// or the node after it at the start of a paragraph)
    pub fn caret_style_at(&self, position: usize) -> Option<(TextStyle, Option<ParagraphStyle>)> {
        let probe = if position > 0 {
            FlowRange::new(position - 1, position)
        } else {
            FlowRange::new(0, 1)
        };
        self.styled_segments(probe)
            .into_iter()
            .next()
            .map(|segment| (segment.style, segment.paragraph))
    }

    /// Map the inline style of every styled node inside `range`
    pub(crate) fn map_text_styles(
        &self,
        range: FlowRange,
        map: impl Fn(&TextStyle, Option<&ParagraphStyle>) -> TextStyle,
    ) -> FlowContent {
        let range = range.clamp(self.size);
        if range.is_collapsed() {
            return self.clone();
        }
        let (before, rest) = split_nodes(&self.nodes, range.first());
        let (middle, after) = split_nodes(&rest, range.size());
        let mut nodes = before;
        let middle_start = nodes.len();
        nodes.extend(middle);
        let middle_end = nodes.len();
        nodes.extend(after);

        let paragraphs = paragraph_styles(&nodes);
        for index in middle_start..middle_end {
            let updated = nodes[index]
                .text_style()
                .map(|style| map(style, paragraphs[index].as_ref()));
            if let Some(style) = updated {
                nodes[index] = nodes[index].with_text_style(style);
            }
        }
        Self::from_nodes(nodes)
    }

    /// Map the style of every paragraph touched by `range`
    pub(crate) fn map_paragraph_styles(
        &self,
        range: FlowRange,
        map: impl Fn(&ParagraphStyle) -> ParagraphStyle,
    ) -> FlowContent {
        let breaks = self.paragraph_breaks(range.clamp(self.size));
        if breaks.is_empty() {
            return self.clone();
        }
        let mut nodes = self.nodes.as_ref().clone();
        let mut start = 0;
        for node in nodes.iter_mut() {
            let size = node.size();
            if breaks.contains(&start) {
                if let FlowNode::ParagraphBreak { style } = node {
                    *style = map(style);
                }
            }
            start += size;
        }
        Self::from_nodes(nodes)
    }

    pub(crate) fn complete_upload(
        &self,
        id: &str,
        url: &str,
        supplementary: &BTreeMap<String, String>,
    ) -> Option<FlowContent> {
        let mut changed = false;
        let nodes: Vec<FlowNode> = self
            .nodes
            .iter()
            .map(|node| match node.complete_upload(id, url, supplementary) {
                Some(updated) => {
                    changed = true;
                    updated
                }
                None => node.clone(),
            })
            .collect();
        changed.then(|| Self::from_nodes(nodes))
    }

    /// Ids of all pending uploads, nested content included
    pub fn pending_uploads(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for node in self.nodes.iter() {
            if let Some(id) = node.upload_id() {
                ids.push(id.to_string());
            }
            match node {
                FlowNode::Box(flow_box) => ids.extend(flow_box.content.pending_uploads()),
                FlowNode::Button(button) => ids.extend(button.content.pending_uploads()),
                FlowNode::Table(table) => {
                    for cell in table.cells().values() {
                        ids.extend(cell.content.pending_uploads());
                    }
                }
                _ => {}
            }
        }
        ids
    }
}

impl fmt::Debug for FlowContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.nodes.iter()).finish()
    }
}

impl From<Vec<FlowNode>> for FlowContent {
    fn from(nodes: Vec<FlowNode>) -> Self {
        Self::from_nodes(nodes)
    }
}

impl From<FlowContent> for Vec<FlowNode> {
    fn from(content: FlowContent) -> Self {
        content.nodes.as_ref().clone()
    }
}

/// Split a node list at a position, cutting a text run in two if needed
fn split_nodes(nodes: &[FlowNode], position: usize) -> (Vec<FlowNode>, Vec<FlowNode>) {
    let mut before = Vec::new();
    let mut after = Vec::new();
    let mut start = 0;
    for node in nodes {
        let size = node.size();
        if start + size <= position {
            before.push(node.clone());
        } else if start >= position {
            after.push(node.clone());
        } else if let FlowNode::Text(run) = node {
            let cut = char_to_byte(&run.text, position - start);
            before.push(FlowNode::Text(TextRun {
                text: run.text[..cut].to_string(),
                style: run.style.clone(),
            }));
            after.push(FlowNode::Text(TextRun {
                text: run.text[cut..].to_string(),
                style: run.style.clone(),
            }));
        } else {
            after.push(node.clone());
        }
        start += size;
    }
    (before, after)
}

fn char_to_byte(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(index, _)| index)
        .unwrap_or(text.len())
}

/// Style of the paragraph each node belongs to
fn paragraph_styles(nodes: &[FlowNode]) -> Vec<Option<ParagraphStyle>> {
    let mut styles = vec![None; nodes.len()];
    let mut current = None;
    for (index, node) in nodes.iter().enumerate().rev() {
        if let Some(style) = node.paragraph_style() {
            current = Some(style.clone());
        }
        styles[index] = current.clone();
    }
    styles
}

fn normalize(nodes: Vec<FlowNode>) -> Vec<FlowNode> {
    let mut result: Vec<FlowNode> = Vec::with_capacity(nodes.len());
    for node in nodes {
        if let FlowNode::Text(run) = &node {
            if run.text.is_empty() {
                continue;
            }
            if let Some(FlowNode::Text(previous)) = result.last_mut() {
                if previous.style == run.style {
                    previous.text.push_str(&run.text);
                    continue;
                }
            }
        }
        result.push(node);
    }
    result
}
