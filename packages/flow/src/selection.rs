//! # Flow Selection
//!
//! A selection is a path into the document: a plain range at the innermost
//! level, optionally wrapped by the containers (box, table cell, button)
//! it lives in. A `Table` selection spans a rectangle of cells.
//!
//! Style queries and formatting builders resolve the path against the
//! content and work on the innermost level; the builders wrap their result
//! in the matching nested edit operations.

use crate::content::FlowContent;
use crate::node::FlowNode;
use crate::operation::FlowOperation;
use crate::range::FlowRange;
use crate::style::{BoxStyle, ParagraphStyle, TableStyle, TextStyle};
use crate::table::{CellPosition, CellRange, FlowTable};
use crate::theme::FlowTheme;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FlowSelection {
    Range(FlowRange),
    Box {
        position: usize,
        inner: Box<FlowSelection>,
    },
    TableCell {
        position: usize,
        cell: CellPosition,
        inner: Box<FlowSelection>,
    },
    Table {
        position: usize,
        range: CellRange,
    },
    Button {
        position: usize,
        inner: Box<FlowSelection>,
    },
}

impl Default for FlowSelection {
    fn default() -> Self {
        FlowSelection::Range(FlowRange::at(0))
    }
}

impl FlowSelection {
    pub fn range(anchor: usize, focus: usize) -> Self {
        FlowSelection::Range(FlowRange::new(anchor, focus))
    }

    pub fn caret(position: usize) -> Self {
        FlowSelection::Range(FlowRange::at(position))
    }

    /// Collapsed at the innermost level; a table selection never is
    pub fn is_collapsed(&self) -> bool {
        match self.innermost() {
            FlowSelection::Range(range) => range.is_collapsed(),
            _ => false,
        }
    }

    /// The innermost level of the path
    pub fn innermost(&self) -> &FlowSelection {
        match self.inner() {
            Some(inner) => inner.innermost(),
            None => self,
        }
    }

    pub fn inner(&self) -> Option<&FlowSelection> {
        match self {
            FlowSelection::Box { inner, .. }
            | FlowSelection::TableCell { inner, .. }
            | FlowSelection::Button { inner, .. } => Some(inner),
            FlowSelection::Range(_) | FlowSelection::Table { .. } => None,
        }
    }

    /// Innermost range, unless the innermost level is a cell rectangle
    pub fn innermost_range(&self) -> Option<FlowRange> {
        match self.innermost() {
            FlowSelection::Range(range) => Some(*range),
            _ => None,
        }
    }

    /// True when the innermost level spans table cells
    pub fn is_table_selection(&self) -> bool {
        matches!(self.innermost(), FlowSelection::Table { .. })
    }

    /// Position of the container node at this level
    pub fn container_position(&self) -> Option<usize> {
        match self {
            FlowSelection::Range(_) => None,
            FlowSelection::Box { position, .. }
            | FlowSelection::TableCell { position, .. }
            | FlowSelection::Table { position, .. }
            | FlowSelection::Button { position, .. } => Some(*position),
        }
    }

    pub fn with_container_position(&self, target: usize) -> FlowSelection {
        let mut selection = self.clone();
        match &mut selection {
            FlowSelection::Range(_) => {}
            FlowSelection::Box { position, .. }
            | FlowSelection::TableCell { position, .. }
            | FlowSelection::Table { position, .. }
            | FlowSelection::Button { position, .. } => *position = target,
        }
        selection
    }

    /// Replace the innermost level
    pub fn with_innermost(&self, innermost: FlowSelection) -> FlowSelection {
        match self {
            FlowSelection::Box { position, inner } => FlowSelection::Box {
                position: *position,
                inner: Box::new(inner.with_innermost(innermost)),
            },
            FlowSelection::TableCell {
                position,
                cell,
                inner,
            } => FlowSelection::TableCell {
                position: *position,
                cell: *cell,
                inner: Box::new(inner.with_innermost(innermost)),
            },
            FlowSelection::Button { position, inner } => FlowSelection::Button {
                position: *position,
                inner: Box::new(inner.with_innermost(innermost)),
            },
            FlowSelection::Range(_) | FlowSelection::Table { .. } => innermost,
        }
    }

    /// Content the innermost level refers to. For a table selection this is
    /// the content holding the table.
    pub fn innermost_content(&self, content: &FlowContent) -> Option<FlowContent> {
        match self {
            FlowSelection::Range(_) | FlowSelection::Table { .. } => Some(content.clone()),
            FlowSelection::Box { position, inner } => {
                inner.innermost_content(&box_content(content, *position)?)
            }
            FlowSelection::TableCell {
                position,
                cell,
                inner,
            } => inner.innermost_content(&cell_content(content, *position, *cell)?),
            FlowSelection::Button { position, inner } => {
                inner.innermost_content(&button_content(content, *position)?)
            }
        }
    }

    /// Wrap an operation meant for the innermost content in the nested edits
    /// leading there
    pub fn wrap(&self, operation: FlowOperation) -> FlowOperation {
        match self {
            FlowSelection::Range(_) | FlowSelection::Table { .. } => operation,
            FlowSelection::Box { position, inner } => FlowOperation::EditBox {
                position: *position,
                inner: Box::new(inner.wrap(operation)),
            },
            FlowSelection::TableCell {
                position,
                cell,
                inner,
            } => FlowOperation::EditTableCell {
                position: *position,
                cell: *cell,
                inner: Box::new(inner.wrap(operation)),
            },
            FlowSelection::Button { position, inner } => FlowOperation::EditButton {
                position: *position,
                inner: Box::new(inner.wrap(operation)),
            },
        }
    }

    /// Call `visit` with every innermost (content, range) pair. A table
    /// selection visits the full content of each selected cell.
    pub fn visit_ranges(&self, content: &FlowContent, visit: &mut dyn FnMut(&FlowContent, FlowRange)) {
        match self {
            FlowSelection::Range(range) => visit(content, range.clamp(content.size())),
            FlowSelection::Box { position, inner } => {
                if let Some(nested) = box_content(content, *position) {
                    inner.visit_ranges(&nested, visit);
                }
            }
            FlowSelection::TableCell {
                position,
                cell,
                inner,
            } => {
                if let Some(nested) = cell_content(content, *position, *cell) {
                    inner.visit_ranges(&nested, visit);
                }
            }
            FlowSelection::Button { position, inner } => {
                if let Some(nested) = button_content(content, *position) {
                    inner.visit_ranges(&nested, visit);
                }
            }
            FlowSelection::Table { position, range } => {
                if let Some(table) = table_at(content, *position) {
                    for (origin, cell) in table.cells() {
                        if range.contains(*origin) {
                            visit(&cell.content, FlowRange::new(0, cell.content.size()));
                        }
                    }
                }
            }
        }
    }

    /// Map the innermost range; `None` when the mapping drops it
    pub fn transform_ranges(&self, map: impl Fn(FlowRange) -> Option<FlowRange>) -> Option<FlowSelection> {
        match self.innermost() {
            FlowSelection::Range(range) => {
                map(*range).map(|range| self.with_innermost(FlowSelection::Range(range)))
            }
            _ => Some(self.clone()),
        }
    }

    /// Build one operation per innermost range and wrap them in the nested
    /// edits leading there
    fn build(
        &self,
        content: &FlowContent,
        build: &dyn Fn(&FlowContent, FlowRange) -> Option<FlowOperation>,
    ) -> Option<FlowOperation> {
        match self {
            FlowSelection::Range(range) => build(content, range.clamp(content.size())),
            FlowSelection::Box { position, inner } => {
                let nested = box_content(content, *position)?;
                inner.build(&nested, build).map(|operation| FlowOperation::EditBox {
                    position: *position,
                    inner: Box::new(operation),
                })
            }
            FlowSelection::TableCell {
                position,
                cell,
                inner,
            } => {
                let nested = cell_content(content, *position, *cell)?;
                inner
                    .build(&nested, build)
                    .map(|operation| FlowOperation::EditTableCell {
                        position: *position,
                        cell: *cell,
                        inner: Box::new(operation),
                    })
            }
            FlowSelection::Button { position, inner } => {
                let nested = button_content(content, *position)?;
                inner
                    .build(&nested, build)
                    .map(|operation| FlowOperation::EditButton {
                        position: *position,
                        inner: Box::new(operation),
                    })
            }
            FlowSelection::Table { position, range } => {
                let table = table_at(content, *position)?;
                let operations = table
                    .cells()
                    .iter()
                    .filter(|(origin, _)| range.contains(**origin))
                    .filter_map(|(origin, cell)| {
                        build(&cell.content, FlowRange::new(0, cell.content.size())).map(|operation| {
                            FlowOperation::EditTableCell {
                                position: *position,
                                cell: *origin,
                                inner: Box::new(operation),
                            }
                        })
                    });
                FlowOperation::batch(operations)
            }
        }
    }

    pub fn format_text(&self, content: &FlowContent, style: &TextStyle) -> Option<FlowOperation> {
        self.build(content, &|_, range| {
            (!range.is_collapsed()).then(|| FlowOperation::FormatText {
                range,
                style: style.clone(),
            })
        })
    }

    pub fn unformat_text(&self, content: &FlowContent, style: &TextStyle) -> Option<FlowOperation> {
        self.build(content, &|_, range| {
            (!range.is_collapsed()).then(|| FlowOperation::UnformatText {
                range,
                style: style.clone(),
            })
        })
    }

    pub fn format_paragraph(&self, content: &FlowContent, style: &ParagraphStyle) -> Option<FlowOperation> {
        self.build(content, &|_, range| {
            Some(FlowOperation::FormatParagraph {
                range,
                style: style.clone(),
            })
        })
    }

    pub fn unformat_paragraph(&self, content: &FlowContent, style: &ParagraphStyle) -> Option<FlowOperation> {
        self.build(content, &|_, range| {
            Some(FlowOperation::UnformatParagraph {
                range,
                style: style.clone(),
            })
        })
    }

    /// Format the innermost box the selection is in, or every box inside the
    /// selected range
    pub fn format_box(&self, content: &FlowContent, style: &BoxStyle) -> Option<FlowOperation> {
        self.box_operation(content, &|position| FlowOperation::FormatBox {
            position,
            style: style.clone(),
        })
    }

    pub fn unformat_box(&self, content: &FlowContent, style: &BoxStyle) -> Option<FlowOperation> {
        self.box_operation(content, &|position| FlowOperation::UnformatBox {
            position,
            style: style.clone(),
        })
    }

    fn box_operation(
        &self,
        content: &FlowContent,
        build: &dyn Fn(usize) -> FlowOperation,
    ) -> Option<FlowOperation> {
        match self {
            FlowSelection::Box { position, inner } => {
                let nested = box_content(content, *position)?;
                match inner.box_operation(&nested, build) {
                    Some(operation) => Some(FlowOperation::EditBox {
                        position: *position,
                        inner: Box::new(operation),
                    }),
                    None => Some(build(*position)),
                }
            }
            FlowSelection::TableCell {
                position,
                cell,
                inner,
            } => {
                let nested = cell_content(content, *position, *cell)?;
                inner
                    .box_operation(&nested, build)
                    .map(|operation| FlowOperation::EditTableCell {
                        position: *position,
                        cell: *cell,
                        inner: Box::new(operation),
                    })
            }
            FlowSelection::Button { position, inner } => {
                let nested = button_content(content, *position)?;
                inner
                    .box_operation(&nested, build)
                    .map(|operation| FlowOperation::EditButton {
                        position: *position,
                        inner: Box::new(operation),
                    })
            }
            FlowSelection::Range(range) => FlowOperation::batch(
                boxes_in(content, *range)
                    .into_iter()
                    .map(|(position, _)| build(position)),
            ),
            FlowSelection::Table { .. } => None,
        }
    }

    /// Format the innermost table the selection is in
    pub fn format_table(&self, content: &FlowContent, style: &TableStyle) -> Option<FlowOperation> {
        self.table_operation(content, &|_, position| {
            Some(FlowOperation::FormatTable {
                position,
                style: style.clone(),
            })
        })
    }

    /// Run `build` with the content holding the innermost table on the path
    /// and the table's position in it, then wrap the result
    pub fn table_operation(
        &self,
        content: &FlowContent,
        build: &dyn Fn(&FlowContent, usize) -> Option<FlowOperation>,
    ) -> Option<FlowOperation> {
        match self {
            FlowSelection::Table { position, .. } => build(content, *position),
            FlowSelection::TableCell {
                position,
                cell,
                inner,
            } => {
                let nested = cell_content(content, *position, *cell)?;
                match inner.table_operation(&nested, build) {
                    Some(operation) => Some(FlowOperation::EditTableCell {
                        position: *position,
                        cell: *cell,
                        inner: Box::new(operation),
                    }),
                    None if inner.innermost_table().is_none() => build(content, *position),
                    None => None,
                }
            }
            FlowSelection::Box { position, inner } => {
                let nested = box_content(content, *position)?;
                inner
                    .table_operation(&nested, build)
                    .map(|operation| FlowOperation::EditBox {
                        position: *position,
                        inner: Box::new(operation),
                    })
            }
            FlowSelection::Button { position, inner } => {
                let nested = button_content(content, *position)?;
                inner
                    .table_operation(&nested, build)
                    .map(|operation| FlowOperation::EditButton {
                        position: *position,
                        inner: Box::new(operation),
                    })
            }
            FlowSelection::Range(_) => None,
        }
    }

    /// Level of the path that addresses the innermost table, if any
    pub fn innermost_table(&self) -> Option<&FlowSelection> {
        match self {
            FlowSelection::Table { .. } => Some(self),
            FlowSelection::TableCell { inner, .. } => inner.innermost_table().or(Some(self)),
            FlowSelection::Box { inner, .. } | FlowSelection::Button { inner, .. } => {
                inner.innermost_table()
            }
            FlowSelection::Range(_) => None,
        }
    }

    /// Replace the selected content. Table selections cannot take inserts.
    pub fn insert(&self, content: &FlowContent, insertion: &FlowContent) -> Option<FlowOperation> {
        if self.is_table_selection() {
            return None;
        }
        self.build(content, &|_, range| {
            let insert = FlowOperation::insert(range.first(), insertion.clone());
            if range.is_collapsed() {
                Some(insert)
            } else {
                FlowOperation::batch([FlowOperation::remove(range.normalized()), insert])
            }
        })
    }

    /// Replace the single node covered by the innermost range
    pub fn set_node(
        &self,
        content: &FlowContent,
        update: impl FnOnce(&FlowNode) -> Option<FlowNode>,
    ) -> Option<FlowOperation> {
        let range = self.innermost_range()?;
        if range.size() != 1 {
            return None;
        }
        let inner = self.innermost_content(content)?;
        let node = update(inner.atom_at(range.first())?)?;
        Some(self.wrap(FlowOperation::ReplaceNode {
            position: range.first(),
            node,
        }))
    }

    /// Remove the selected content, keeping a trailing paragraph break in
    /// place. Cells of a table selection are emptied.
    pub fn remove(&self, content: &FlowContent) -> Option<FlowOperation> {
        self.build(content, &|current, range| {
            let (first, mut last) = (range.first(), range.last());
            if last == current.size() && current.ends_with_paragraph_break() && last > first {
                last -= 1;
            }
            (first < last).then(|| FlowOperation::remove(FlowRange::new(first, last)))
        })
    }

    /// Text style shared by everything selected, resolved against the theme.
    /// A caret reports the style typing would produce.
    pub fn uniform_text_style(&self, content: &FlowContent, theme: &FlowTheme) -> TextStyle {
        let mut uniform: Option<TextStyle> = None;
        self.visit_ranges(content, &mut |current, range| {
            let styles: Vec<TextStyle> = if range.is_collapsed() {
                let (style, paragraph) = current
                    .caret_style_at(range.first())
                    .unwrap_or_else(|| (TextStyle::default(), current.paragraph_style_at(range.first()).cloned()));
                vec![theme.resolve_text_style(&style, paragraph.as_ref())]
            } else {
                current
                    .styled_segments(range)
                    .into_iter()
                    .map(|segment| theme.resolve_text_style(&segment.style, segment.paragraph.as_ref()))
                    .collect()
            };
            for style in styles {
                uniform = Some(match uniform.take() {
                    Some(previous) => previous.intersect(&style),
                    None => style,
                });
            }
        });
        uniform.unwrap_or_else(|| theme.ambient_text_style(None))
    }

    /// Paragraph style shared by every touched paragraph, resolved against
    /// the theme
    pub fn uniform_paragraph_style(&self, content: &FlowContent, theme: &FlowTheme) -> ParagraphStyle {
        let mut uniform: Option<ParagraphStyle> = None;
        self.visit_ranges(content, &mut |current, range| {
            for position in current.paragraph_breaks(range) {
                let style = current
                    .paragraph_style_at(position)
                    .map(|style| theme.resolve_paragraph_style(style))
                    .unwrap_or_default();
                uniform = Some(match uniform.take() {
                    Some(previous) => previous.intersect(&style),
                    None => style,
                });
            }
        });
        uniform.unwrap_or_else(|| theme.resolve_paragraph_style(&ParagraphStyle::default()))
    }

    /// Style of the innermost box on the path, or shared by the boxes inside
    /// the selected range
    pub fn uniform_box_style(&self, content: &FlowContent) -> BoxStyle {
        match self {
            FlowSelection::Box { position, inner } => {
                let Some(FlowNode::Box(flow_box)) = content.atom_at(*position) else {
                    return BoxStyle::default();
                };
                if inner.contains_box(&flow_box.content) {
                    inner.uniform_box_style(&flow_box.content)
                } else {
                    flow_box.style.clone()
                }
            }
            FlowSelection::TableCell {
                position,
                cell,
                inner,
            } => cell_content(content, *position, *cell)
                .map(|nested| inner.uniform_box_style(&nested))
                .unwrap_or_default(),
            FlowSelection::Button { position, inner } => button_content(content, *position)
                .map(|nested| inner.uniform_box_style(&nested))
                .unwrap_or_default(),
            FlowSelection::Range(range) => boxes_in(content, *range)
                .into_iter()
                .map(|(_, style)| style)
                .reduce(|previous, style| previous.intersect(&style))
                .unwrap_or_default(),
            FlowSelection::Table { .. } => BoxStyle::default(),
        }
    }

    fn contains_box(&self, content: &FlowContent) -> bool {
        match self {
            FlowSelection::Box { .. } => true,
            FlowSelection::Range(range) => !boxes_in(content, *range).is_empty(),
            FlowSelection::TableCell { .. } | FlowSelection::Button { .. } => {
                self.uniform_box_style(content) != BoxStyle::default()
            }
            FlowSelection::Table { .. } => false,
        }
    }

    /// Style of the innermost table on the path
    pub fn table_style(&self, content: &FlowContent) -> TableStyle {
        match self {
            FlowSelection::Table { position, .. } => table_at(content, *position)
                .map(|table| table.style.clone())
                .unwrap_or_default(),
            FlowSelection::TableCell {
                position,
                cell,
                inner,
            } => {
                if inner.innermost_table().is_some() {
                    if let Some(nested) = cell_content(content, *position, *cell) {
                        return inner.table_style(&nested);
                    }
                }
                table_at(content, *position)
                    .map(|table| table.style.clone())
                    .unwrap_or_default()
            }
            FlowSelection::Box { position, inner } => box_content(content, *position)
                .map(|nested| inner.table_style(&nested))
                .unwrap_or_default(),
            FlowSelection::Button { position, inner } => button_content(content, *position)
                .map(|nested| inner.table_style(&nested))
                .unwrap_or_default(),
            FlowSelection::Range(_) => TableStyle::default(),
        }
    }
}

fn box_content(content: &FlowContent, position: usize) -> Option<FlowContent> {
    match content.atom_at(position)? {
        FlowNode::Box(flow_box) => Some(flow_box.content.clone()),
        _ => None,
    }
}

fn button_content(content: &FlowContent, position: usize) -> Option<FlowContent> {
    match content.atom_at(position)? {
        FlowNode::Button(button) => Some(button.content.clone()),
        _ => None,
    }
}

fn table_at(content: &FlowContent, position: usize) -> Option<&FlowTable> {
    match content.atom_at(position)? {
        FlowNode::Table(table) => Some(table),
        _ => None,
    }
}

fn cell_content(content: &FlowContent, position: usize, cell: CellPosition) -> Option<FlowContent> {
    table_at(content, position)?
        .cell(cell)
        .map(|cell| cell.content.clone())
}

fn boxes_in(content: &FlowContent, range: FlowRange) -> Vec<(usize, BoxStyle)> {
    content
        .node_positions()
        .filter(|(position, _)| range.contains(*position))
        .filter_map(|(position, node)| match node {
            FlowNode::Box(flow_box) => Some((position, flow_box.style.clone())),
            _ => None,
        })
        .collect()
}
