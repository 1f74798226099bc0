//! # Flow Operations
//!
//! Immutable, invertible edit descriptions.
//!
//! ## Contract
//!
//! - `apply_to(content, theme)` produces new content and never fails. A
//!   position past the end is clamped; an edit aimed at a node of the wrong
//!   kind is logged and skipped.
//! - `invert(before)` returns the operation that restores `before`, or `None`
//!   when the edit cannot be undone (completing an upload).
//! - `transform(other)` rebases `other` so it applies after `self`
//!   (see [`TieBreak`](crate::TieBreak)).
//! - `merge_next(next)` coalesces two consecutive edits into one.

use crate::content::FlowContent;
use crate::node::{FlowBox, FlowButton, FlowNode};
use crate::range::FlowRange;
use crate::style::{BoxStyle, ParagraphStyle, TableStyle, TextStyle};
use crate::table::{CellPosition, CellRange, FlowTable, TableAxis};
use crate::theme::FlowTheme;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum FlowOperation {
    InsertContent {
        position: usize,
        content: FlowContent,
    },
    RemoveRange {
        range: FlowRange,
    },
    FormatText {
        range: FlowRange,
        style: TextStyle,
    },
    UnformatText {
        range: FlowRange,
        style: TextStyle,
    },
    FormatParagraph {
        range: FlowRange,
        style: ParagraphStyle,
    },
    UnformatParagraph {
        range: FlowRange,
        style: ParagraphStyle,
    },
    FormatBox {
        position: usize,
        style: BoxStyle,
    },
    UnformatBox {
        position: usize,
        style: BoxStyle,
    },
    FormatTable {
        position: usize,
        style: TableStyle,
    },
    UnformatTable {
        position: usize,
        style: TableStyle,
    },
    /// Swap a single non-text node (image, icon, markup, dynamic text, or a
    /// whole table when restoring one)
    ReplaceNode {
        position: usize,
        node: FlowNode,
    },
    /// Replace a pending upload with its final url wherever it is used
    CompleteUpload {
        id: String,
        url: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        supplementary: BTreeMap<String, String>,
    },
    InsertTableRow {
        position: usize,
        index: u32,
        count: u32,
    },
    InsertTableColumn {
        position: usize,
        index: u32,
        count: u32,
    },
    RemoveTableRow {
        position: usize,
        index: u32,
        count: u32,
    },
    RemoveTableColumn {
        position: usize,
        index: u32,
        count: u32,
    },
    MergeTableCells {
        position: usize,
        range: CellRange,
    },
    SplitTableCell {
        position: usize,
        cell: CellPosition,
    },
    EditBox {
        position: usize,
        inner: Box<FlowOperation>,
    },
    EditTableCell {
        position: usize,
        cell: CellPosition,
        inner: Box<FlowOperation>,
    },
    EditButton {
        position: usize,
        inner: Box<FlowOperation>,
    },
    Batch {
        operations: Vec<FlowOperation>,
    },
}

impl FlowOperation {
    pub fn insert(position: usize, content: FlowContent) -> Self {
        FlowOperation::InsertContent { position, content }
    }

    pub fn remove(range: FlowRange) -> Self {
        FlowOperation::RemoveRange { range }
    }

    /// Combine operations into one; nested batches are flattened.
    /// Returns `None` for an empty list.
    pub fn batch(operations: impl IntoIterator<Item = FlowOperation>) -> Option<FlowOperation> {
        let mut flat = Vec::new();
        for operation in operations {
            match operation {
                FlowOperation::Batch { operations } => flat.extend(operations),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(FlowOperation::Batch { operations: flat }),
        }
    }

    /// Position of the node this operation targets, for node-level edits
    pub fn node_position(&self) -> Option<usize> {
        match self {
            FlowOperation::FormatBox { position, .. }
            | FlowOperation::UnformatBox { position, .. }
            | FlowOperation::FormatTable { position, .. }
            | FlowOperation::UnformatTable { position, .. }
            | FlowOperation::ReplaceNode { position, .. }
            | FlowOperation::InsertTableRow { position, .. }
            | FlowOperation::InsertTableColumn { position, .. }
            | FlowOperation::RemoveTableRow { position, .. }
            | FlowOperation::RemoveTableColumn { position, .. }
            | FlowOperation::MergeTableCells { position, .. }
            | FlowOperation::SplitTableCell { position, .. }
            | FlowOperation::EditBox { position, .. }
            | FlowOperation::EditTableCell { position, .. }
            | FlowOperation::EditButton { position, .. } => Some(*position),
            _ => None,
        }
    }

    /// Copy of a node-level edit retargeted at another position
    pub(crate) fn at_position(&self, target: usize) -> FlowOperation {
        let mut operation = self.clone();
        match &mut operation {
            FlowOperation::FormatBox { position, .. }
            | FlowOperation::UnformatBox { position, .. }
            | FlowOperation::FormatTable { position, .. }
            | FlowOperation::UnformatTable { position, .. }
            | FlowOperation::ReplaceNode { position, .. }
            | FlowOperation::InsertTableRow { position, .. }
            | FlowOperation::InsertTableColumn { position, .. }
            | FlowOperation::RemoveTableRow { position, .. }
            | FlowOperation::RemoveTableColumn { position, .. }
            | FlowOperation::MergeTableCells { position, .. }
            | FlowOperation::SplitTableCell { position, .. }
            | FlowOperation::EditBox { position, .. }
            | FlowOperation::EditTableCell { position, .. }
            | FlowOperation::EditButton { position, .. } => *position = target,
            _ => {}
        }
        operation
    }

    /// True for edits that change a table's grid
    pub fn is_table_structure(&self) -> bool {
        matches!(
            self,
            FlowOperation::InsertTableRow { .. }
                | FlowOperation::InsertTableColumn { .. }
                | FlowOperation::RemoveTableRow { .. }
                | FlowOperation::RemoveTableColumn { .. }
                | FlowOperation::MergeTableCells { .. }
                | FlowOperation::SplitTableCell { .. }
        )
    }

    pub fn apply_to(&self, content: &FlowContent, theme: &FlowTheme) -> FlowContent {
        self.apply_with(content, Some(theme))
    }

    /// Apply without theme compaction; used while computing inverses
    pub(crate) fn apply_with(&self, content: &FlowContent, theme: Option<&FlowTheme>) -> FlowContent {
        match self {
            FlowOperation::InsertContent {
                position,
                content: inserted,
            } => content.insert(*position, inserted),

            FlowOperation::RemoveRange { range } => content.remove(*range),

            FlowOperation::FormatText { range, style } => {
                content.map_text_styles(*range, |current, paragraph| {
                    let merged = current.merge(style);
                    match theme {
                        Some(theme) => merged.compact(style, &theme.ambient_text_style(paragraph)),
                        None => merged,
                    }
                })
            }

            FlowOperation::UnformatText { range, style } => {
                content.map_text_styles(*range, |current, _| current.unmerge(style))
            }

            FlowOperation::FormatParagraph { range, style } => {
                content.map_paragraph_styles(*range, |current| current.merge(style))
            }

            FlowOperation::UnformatParagraph { range, style } => {
                content.map_paragraph_styles(*range, |current| current.unmerge(style))
            }

            FlowOperation::FormatBox { position, style } => {
                update_box(content, *position, |flow_box| FlowBox {
                    style: flow_box.style.merge(style),
                    content: flow_box.content.clone(),
                })
            }

            FlowOperation::UnformatBox { position, style } => {
                update_box(content, *position, |flow_box| FlowBox {
                    style: flow_box.style.unmerge(style),
                    content: flow_box.content.clone(),
                })
            }

            FlowOperation::FormatTable { position, style } => {
                update_table(content, *position, |table| {
                    Some(table.with_style(table.style.merge(style)))
                })
            }

            FlowOperation::UnformatTable { position, style } => {
                update_table(content, *position, |table| {
                    Some(table.with_style(table.style.unmerge(style)))
                })
            }

            FlowOperation::ReplaceNode { position, node } => {
                content
                    .update_atom(*position, |_| Some(node.clone()))
                    .unwrap_or_else(|| {
                        warn!(position, "No node to replace; operation skipped");
                        content.clone()
                    })
            }

            FlowOperation::CompleteUpload {
                id,
                url,
                supplementary,
            } => content
                .complete_upload(id, url, supplementary)
                .unwrap_or_else(|| content.clone()),

            FlowOperation::InsertTableRow {
                position,
                index,
                count,
            } => update_table(content, *position, |table| {
                table.insert_lines(TableAxis::Row, *index, *count, &FlowContent::paragraph())
            }),

            FlowOperation::InsertTableColumn {
                position,
                index,
                count,
            } => update_table(content, *position, |table| {
                table.insert_lines(TableAxis::Column, *index, *count, &FlowContent::paragraph())
            }),

            FlowOperation::RemoveTableRow {
                position,
                index,
                count,
            } => update_table(content, *position, |table| {
                table.remove_lines(TableAxis::Row, *index, *count, &FlowContent::paragraph())
            }),

            FlowOperation::RemoveTableColumn {
                position,
                index,
                count,
            } => update_table(content, *position, |table| {
                table.remove_lines(TableAxis::Column, *index, *count, &FlowContent::paragraph())
            }),

            FlowOperation::MergeTableCells { position, range } => {
                update_table(content, *position, |table| table.merge_cells(*range))
            }

            FlowOperation::SplitTableCell { position, cell } => {
                update_table(content, *position, |table| {
                    table.split_cell(*cell, &FlowContent::paragraph())
                })
            }

            FlowOperation::EditBox { position, inner } => {
                update_box(content, *position, |flow_box| FlowBox {
                    style: flow_box.style.clone(),
                    content: inner.apply_with(&flow_box.content, theme),
                })
            }

            FlowOperation::EditTableCell {
                position,
                cell,
                inner,
            } => update_table(content, *position, |table| {
                let current = table.cell(*cell)?;
                table.with_cell_content(*cell, inner.apply_with(&current.content, theme))
            }),

            FlowOperation::EditButton { position, inner } => {
                content
                    .update_atom(*position, |node| match node {
                        FlowNode::Button(button) => Some(FlowNode::Button(FlowButton {
                            action: button.action.clone(),
                            content: inner.apply_with(&button.content, theme),
                            style: button.style.clone(),
                        })),
                        _ => None,
                    })
                    .unwrap_or_else(|| {
                        warn!(position, "Expected a button; nested edit skipped");
                        content.clone()
                    })
            }

            FlowOperation::Batch { operations } => operations
                .iter()
                .fold(content.clone(), |current, operation| {
                    operation.apply_with(&current, theme)
                }),
        }
    }

    /// Operation that restores `before` after this one has been applied to
    /// it. `None` when the edit is not invertible.
    pub fn invert(&self, before: &FlowContent) -> Option<FlowOperation> {
        match self {
            FlowOperation::InsertContent { position, content } => {
                if content.is_empty() {
                    return None;
                }
                let start = (*position).min(before.size());
                Some(FlowOperation::remove(FlowRange::new(start, start + content.size())))
            }

            FlowOperation::RemoveRange { range } => {
                let range = range.clamp(before.size());
                if range.is_collapsed() {
                    return None;
                }
                Some(FlowOperation::insert(range.first(), before.copy(range)))
            }

            FlowOperation::FormatText { range, style }
            | FlowOperation::UnformatText { range, style } => {
                let range = range.clamp(before.size()).normalized();
                if range.is_collapsed() {
                    return None;
                }
                let mut operations = vec![FlowOperation::UnformatText {
                    range,
                    style: style.clone(),
                }];
                for segment in before.styled_segments(range) {
                    let prior = segment.style.pick(style);
                    if !prior.is_empty() {
                        operations.push(FlowOperation::FormatText {
                            range: segment.range,
                            style: prior,
                        });
                    }
                }
                FlowOperation::batch(operations)
            }

            FlowOperation::FormatParagraph { range, style }
            | FlowOperation::UnformatParagraph { range, style } => {
                let range = range.clamp(before.size());
                let mut operations = vec![FlowOperation::UnformatParagraph {
                    range,
                    style: style.clone(),
                }];
                for position in before.paragraph_breaks(range) {
                    let prior = before
                        .paragraph_style_at(position)
                        .map(|current| current.pick(style))
                        .unwrap_or_default();
                    if !prior.is_empty() {
                        operations.push(FlowOperation::FormatParagraph {
                            range: FlowRange::at(position),
                            style: prior,
                        });
                    }
                }
                FlowOperation::batch(operations)
            }

            FlowOperation::FormatBox { position, style }
            | FlowOperation::UnformatBox { position, style } => match before.atom_at(*position) {
                Some(FlowNode::Box(flow_box)) => {
                    let prior = flow_box.style.pick(style);
                    FlowOperation::batch(
                        std::iter::once(FlowOperation::UnformatBox {
                            position: *position,
                            style: style.clone(),
                        })
                        .chain((!prior.is_empty()).then(|| FlowOperation::FormatBox {
                            position: *position,
                            style: prior,
                        })),
                    )
                }
                _ => None,
            },

            FlowOperation::FormatTable { position, style }
            | FlowOperation::UnformatTable { position, style } => match before.atom_at(*position) {
                Some(FlowNode::Table(table)) => {
                    let prior = table.style.pick(style);
                    FlowOperation::batch(
                        std::iter::once(FlowOperation::UnformatTable {
                            position: *position,
                            style: style.clone(),
                        })
                        .chain((!prior.is_empty()).then(|| FlowOperation::FormatTable {
                            position: *position,
                            style: prior,
                        })),
                    )
                }
                _ => None,
            },

            FlowOperation::ReplaceNode { position, .. } => {
                before
                    .atom_at(*position)
                    .map(|node| FlowOperation::ReplaceNode {
                        position: *position,
                        node: node.clone(),
                    })
            }

            FlowOperation::CompleteUpload { .. } => None,

            FlowOperation::InsertTableRow {
                position,
                index,
                count,
            } => Some(FlowOperation::RemoveTableRow {
                position: *position,
                index: *index,
                count: *count,
            }),

            FlowOperation::InsertTableColumn {
                position,
                index,
                count,
            } => Some(FlowOperation::RemoveTableColumn {
                position: *position,
                index: *index,
                count: *count,
            }),

            FlowOperation::RemoveTableRow { position, .. }
            | FlowOperation::RemoveTableColumn { position, .. }
            | FlowOperation::MergeTableCells { position, .. }
            | FlowOperation::SplitTableCell { position, .. } => match before.atom_at(*position) {
                Some(node @ FlowNode::Table(_)) => Some(FlowOperation::ReplaceNode {
                    position: *position,
                    node: node.clone(),
                }),
                _ => None,
            },

            FlowOperation::EditBox { position, inner } => match before.atom_at(*position) {
                Some(FlowNode::Box(flow_box)) => {
                    inner
                        .invert(&flow_box.content)
                        .map(|inverse| FlowOperation::EditBox {
                            position: *position,
                            inner: Box::new(inverse),
                        })
                }
                _ => None,
            },

            FlowOperation::EditTableCell {
                position,
                cell,
                inner,
            } => match before.atom_at(*position) {
                Some(FlowNode::Table(table)) => {
                    let current = table.cell(*cell)?;
                    inner
                        .invert(&current.content)
                        .map(|inverse| FlowOperation::EditTableCell {
                            position: *position,
                            cell: *cell,
                            inner: Box::new(inverse),
                        })
                }
                _ => None,
            },

            FlowOperation::EditButton { position, inner } => match before.atom_at(*position) {
                Some(FlowNode::Button(button)) => {
                    inner
                        .invert(&button.content)
                        .map(|inverse| FlowOperation::EditButton {
                            position: *position,
                            inner: Box::new(inverse),
                        })
                }
                _ => None,
            },

            FlowOperation::Batch { operations } => {
                let mut current = before.clone();
                let mut inverses = Vec::with_capacity(operations.len());
                for operation in operations {
                    inverses.push(operation.invert(&current)?);
                    current = operation.apply_with(&current, None);
                }
                inverses.reverse();
                FlowOperation::batch(inverses)
            }
        }
    }
}

fn update_box(
    content: &FlowContent,
    position: usize,
    update: impl FnOnce(&FlowBox) -> FlowBox,
) -> FlowContent {
    content
        .update_atom(position, |node| match node {
            FlowNode::Box(flow_box) => Some(FlowNode::Box(update(flow_box))),
            _ => None,
        })
        .unwrap_or_else(|| {
            warn!(position, "Expected a box; operation skipped");
            content.clone()
        })
}

fn update_table(
    content: &FlowContent,
    position: usize,
    update: impl FnOnce(&FlowTable) -> Option<FlowTable>,
) -> FlowContent {
    content
        .update_atom(position, |node| match node {
            FlowNode::Table(table) => update(table).map(FlowNode::Table),
            _ => None,
        })
        .unwrap_or_else(|| {
            warn!(position, "Table edit not applicable; operation skipped");
            content.clone()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::FlowImage;
    use crate::node::ImageSource;

    fn theme() -> FlowTheme {
        FlowTheme::default()
    }

    fn bold() -> TextStyle {
        TextStyle {
            bold: Some(true),
            ..Default::default()
        }
    }

    fn roundtrip(content: &FlowContent, operation: &FlowOperation) {
        let after = operation.apply_to(content, &theme());
        let inverse = operation.invert(content).expect("invertible");
        assert_eq!(&inverse.apply_to(&after, &theme()), content);
    }

    #[test]
    fn test_insert_and_invert() {
        let content = FlowContent::from_text("Hello");
        let operation = FlowOperation::insert(5, FlowContent::from_text(" world"));
        assert_eq!(operation.apply_to(&content, &theme()).text(), "Hello world");
        assert_eq!(
            operation.invert(&content),
            Some(FlowOperation::remove(FlowRange::new(5, 11)))
        );
        roundtrip(&content, &operation);
    }

    #[test]
    fn test_remove_inverts_to_copied_content() {
        let content = FlowContent::from_nodes([
            FlowNode::styled_text("Hel", bold()),
            FlowNode::text("lo"),
            FlowNode::paragraph_break(),
        ]);
        roundtrip(&content, &FlowOperation::remove(FlowRange::new(4, 1)));
    }

    #[test]
    fn test_format_text_inverse_restores_mixed_styles() {
        let italic = TextStyle {
            italic: Some(true),
            ..Default::default()
        };
        let content = FlowContent::from_nodes([
            FlowNode::styled_text("ab", italic.clone()),
            FlowNode::styled_text("cd", bold().merge(&italic)),
            FlowNode::text("ef"),
        ]);
        let operation = FlowOperation::FormatText {
            range: FlowRange::new(1, 5),
            style: bold(),
        };
        roundtrip(&content, &operation);
    }

    #[test]
    fn test_format_text_compacts_ambient_values() {
        let content = FlowContent::from_nodes([FlowNode::styled_text("ab", bold())]);
        let operation = FlowOperation::FormatText {
            range: FlowRange::new(0, 2),
            style: TextStyle {
                bold: Some(false),
                ..Default::default()
            },
        };
        let after = operation.apply_to(&content, &theme());
        assert_eq!(after, FlowContent::from_text("ab"));
    }

    #[test]
    fn test_batch_flattens_and_inverts_in_reverse() {
        let content = FlowContent::from_text("abc");
        let operation = FlowOperation::batch([
            FlowOperation::insert(3, FlowContent::from_text("d")),
            FlowOperation::batch([FlowOperation::remove(FlowRange::new(0, 1))]).unwrap(),
        ])
        .unwrap();
        match &operation {
            FlowOperation::Batch { operations } => assert_eq!(operations.len(), 2),
            other => panic!("Expected batch, got {:?}", other),
        }
        assert_eq!(operation.apply_to(&content, &theme()).text(), "bcd");
        roundtrip(&content, &operation);
        assert!(FlowOperation::batch(Vec::new()).is_none());
    }

    #[test]
    fn test_table_structure_inverts_exactly() {
        let table = FlowTable::new(2, 2, &FlowContent::paragraph());
        let content = FlowContent::from_nodes([FlowNode::Table(table), FlowNode::paragraph_break()]);
        roundtrip(
            &content,
            &FlowOperation::InsertTableRow {
                position: 0,
                index: 1,
                count: 1,
            },
        );
        roundtrip(
            &content,
            &FlowOperation::MergeTableCells {
                position: 0,
                range: CellRange::new(CellPosition::new(0, 0), CellPosition::new(1, 1)),
            },
        );
        roundtrip(
            &content,
            &FlowOperation::RemoveTableColumn {
                position: 0,
                index: 0,
                count: 1,
            },
        );
    }

    #[test]
    fn test_nested_edit_applies_inside_box() {
        let content = FlowContent::from_nodes([FlowNode::Box(FlowBox {
            style: BoxStyle::default(),
            content: FlowContent::from_text("in"),
        })]);
        let operation = FlowOperation::EditBox {
            position: 0,
            inner: Box::new(FlowOperation::insert(2, FlowContent::from_text("ner"))),
        };
        let after = operation.apply_to(&content, &theme());
        match &after.nodes()[0] {
            FlowNode::Box(flow_box) => assert_eq!(flow_box.content.text(), "inner"),
            other => panic!("Expected box, got {:?}", other),
        }
        roundtrip(&content, &operation);
    }

    #[test]
    fn test_edit_of_wrong_node_kind_is_skipped() {
        let content = FlowContent::from_text("abc");
        let operation = FlowOperation::EditBox {
            position: 1,
            inner: Box::new(FlowOperation::insert(0, FlowContent::from_text("x"))),
        };
        assert_eq!(operation.apply_to(&content, &theme()), content);
    }

    #[test]
    fn test_complete_upload_is_not_invertible() {
        let content = FlowContent::from_nodes([FlowNode::Image(FlowImage {
            source: ImageSource {
                width: 10,
                height: 10,
                upload: Some("u1".to_string()),
                ..Default::default()
            },
            style: TextStyle::default(),
        })]);
        let operation = FlowOperation::CompleteUpload {
            id: "u1".to_string(),
            url: "https://cdn/a.png".to_string(),
            supplementary: BTreeMap::new(),
        };
        let after = operation.apply_to(&content, &theme());
        assert!(after.pending_uploads().is_empty());
        assert!(operation.invert(&content).is_none());
    }

    #[test]
    fn test_operation_json_shape() {
        let operation = FlowOperation::remove(FlowRange::new(1, 2));
        let json = serde_json::to_string(&operation).unwrap();
        assert_eq!(json, r#"{"op":"removeRange","range":{"anchor":1,"focus":2}}"#);
        let back: FlowOperation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, operation);
    }
}
