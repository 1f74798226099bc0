//! # Editor Controller
//!
//! Turns user intents into operations against the current [`EditorState`].
//!
//! Every intent follows the same pattern: read the state, build a
//! [`FlowOperation`] (or a view-state change such as a new selection), and
//! hand it to the [`StateReducer`]. The reducer is owned by the host, so the
//! host decides whether edits stay local or go through a sync client.
//! Subscribers are notified after every committed change.
//!
//! Intents that cannot apply to the current selection (a table intent
//! without a table selection, an insert into a table selection) do nothing
//! and return `false`.

use crate::editor_state::{ApplyOptions, EditorState};
use crate::errors::EditorError;
use crate::upload::{AssetStore, Blob, UploadId, UploadManager, UploadStatus};
use scribing_flow::{
    Baseline, BoxStyle, BoxVariant, CellPosition, CellRange, DynamicText, FlowBox, FlowButton,
    FlowColor, FlowContent, FlowIcon, FlowImage, FlowNode, FlowOperation, FlowRange,
    FlowSelection, FlowTable, FlowVideo, FontFamily, HorizontalAlignment, ImageSource,
    Interaction, ListMarker, ParagraphStyle, ParagraphVariant, TableStyle, TextStyle, VideoSource,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Deepest list nesting the list level intents produce
pub const MAX_LIST_LEVEL: u32 = 9;

/// A change handed to the reducer
#[derive(Debug, Clone)]
pub enum StateChange {
    /// Content edit originating from this editor
    Operation {
        operation: FlowOperation,
        merge_undo: bool,
        /// Selection adopted after the operation, in the same transition
        selection: Option<FlowSelection>,
    },
    /// View-state change or a state computed elsewhere (undo, redo)
    Replace(EditorState),
}

/// Host-owned transition from one editor state to the next
pub trait StateReducer: Send {
    fn reduce(&mut self, before: &EditorState, change: StateChange) -> EditorState;
}

/// Applies changes directly to the local state
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalReducer;

impl StateReducer for LocalReducer {
    fn reduce(&mut self, before: &EditorState, change: StateChange) -> EditorState {
        match change {
            StateChange::Operation {
                operation,
                merge_undo,
                selection,
            } => {
                let after = before.apply_mine(&operation, ApplyOptions { merge_undo });
                match selection {
                    Some(selection) => after.with_selection(selection),
                    None => after,
                }
            }
            StateChange::Replace(state) => state,
        }
    }
}

impl<F> StateReducer for F
where
    F: FnMut(&EditorState, StateChange) -> EditorState + Send,
{
    fn reduce(&mut self, before: &EditorState, change: StateChange) -> EditorState {
        self(before, change)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn Fn(&EditorState) + Send>;

pub struct EditorController {
    state: EditorState,
    reducer: Box<dyn StateReducer>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
    uploads: Option<UploadManager>,
}

impl EditorController {
    pub fn new(state: EditorState) -> Self {
        Self::with_reducer(state, LocalReducer)
    }

    pub fn with_reducer(state: EditorState, reducer: impl StateReducer + 'static) -> Self {
        Self {
            state,
            reducer: Box::new(reducer),
            subscribers: Vec::new(),
            next_subscription: 0,
            uploads: None,
        }
    }

    /// Enable asset uploads through `store`
    pub fn with_asset_store(mut self, store: Arc<dyn AssetStore>) -> Self {
        self.uploads = Some(UploadManager::new(store));
        self
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    /// Adopt a state produced outside the controller, e.g. by a sync client
    pub fn replace_state(&mut self, state: EditorState) {
        self.commit(StateChange::Replace(state));
    }

    pub fn subscribe(&mut self, callback: impl Fn(&EditorState) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.subscribers.len() != before
    }

    pub fn apply_operation(&mut self, operation: FlowOperation, merge_undo: bool) {
        self.commit(StateChange::Operation {
            operation,
            merge_undo,
            selection: None,
        });
    }

    fn apply(&mut self, operation: Option<FlowOperation>) -> bool {
        self.apply_with(operation, false)
    }

    /// Apply `operation` and, when given, move to `selection` as one change
    fn apply_selecting(&mut self, operation: Option<FlowOperation>, selection: Option<FlowSelection>) -> bool {
        let Some(operation) = operation else {
            return false;
        };
        self.commit(StateChange::Operation {
            operation,
            merge_undo: false,
            selection,
        });
        true
    }

    fn apply_with(&mut self, operation: Option<FlowOperation>, merge_undo: bool) -> bool {
        match operation {
            Some(operation) => {
                self.apply_operation(operation, merge_undo);
                true
            }
            None => false,
        }
    }

    fn commit(&mut self, change: StateChange) {
        let next = self.reducer.reduce(&self.state, change);
        self.state = next;
        for (_, subscriber) in &self.subscribers {
            subscriber(&self.state);
        }
    }

    fn content(&self) -> &FlowContent {
        self.state.content()
    }

    fn selection(&self) -> &FlowSelection {
        self.state.selection()
    }

    /// Content and range the innermost level of the selection addresses
    fn innermost(&self) -> Option<(FlowContent, FlowRange)> {
        let selection = self.selection();
        Some((
            selection.innermost_content(self.content())?,
            selection.innermost_range()?,
        ))
    }

    /// Inline style a node inserted at the selection starts with
    fn insertion_style(&self) -> TextStyle {
        let Some((content, range)) = self.innermost() else {
            return TextStyle::default();
        };
        let base = content
            .caret_style_at(range.first())
            .map(|(style, _)| style)
            .unwrap_or_default();
        if range.is_collapsed() {
            base.merge(self.state.caret())
        } else {
            base
        }
    }

    fn insert_node(&mut self, node: FlowNode) -> bool {
        self.insert_node_selecting(node, None)
    }

    fn insert_node_selecting(&mut self, node: FlowNode, selection: Option<FlowSelection>) -> bool {
        let insertion = FlowContent::from_nodes([node]);
        let operation = self.selection().insert(self.content(), &insertion);
        self.apply_selecting(operation, selection)
    }

    // -- text --------------------------------------------------------------

    /// Uniform text style of the selection. A caret includes pending caret
    /// formatting.
    pub fn get_text_style(&self) -> TextStyle {
        let style = self
            .selection()
            .uniform_text_style(self.content(), self.state.theme());
        if self.selection().is_collapsed() {
            style.merge(self.state.caret())
        } else {
            style
        }
    }

    pub fn format_text(&mut self, style: TextStyle) -> bool {
        if self.selection().is_collapsed() {
            let caret = self.state.caret().merge(&style);
            let next = self.state.with_caret(caret);
            self.commit(StateChange::Replace(next));
            return true;
        }
        let operation = self.selection().format_text(self.content(), &style);
        self.apply(operation)
    }

    pub fn unformat_text(&mut self, style: TextStyle) -> bool {
        if self.selection().is_collapsed() {
            let caret = self.state.caret().unmerge(&style);
            let next = self.state.with_caret(caret);
            self.commit(StateChange::Replace(next));
            return true;
        }
        let operation = self.selection().unformat_text(self.content(), &style);
        self.apply(operation)
    }

    pub fn toggle_bold(&mut self) -> bool {
        let on = self.get_text_style().bold == Some(true);
        self.format_text(TextStyle {
            bold: Some(!on),
            ..TextStyle::default()
        })
    }

    pub fn toggle_italic(&mut self) -> bool {
        let on = self.get_text_style().italic == Some(true);
        self.format_text(TextStyle {
            italic: Some(!on),
            ..TextStyle::default()
        })
    }

    pub fn toggle_underline(&mut self) -> bool {
        let on = self.get_text_style().underline == Some(true);
        self.format_text(TextStyle {
            underline: Some(!on),
            ..TextStyle::default()
        })
    }

    pub fn toggle_strike(&mut self) -> bool {
        let on = self.get_text_style().strike == Some(true);
        self.format_text(TextStyle {
            strike: Some(!on),
            ..TextStyle::default()
        })
    }

    pub fn set_baseline(&mut self, baseline: Baseline) -> bool {
        self.format_text(TextStyle {
            baseline: Some(baseline),
            ..TextStyle::default()
        })
    }

    pub fn set_font_family(&mut self, font_family: FontFamily) -> bool {
        self.format_text(TextStyle {
            font_family: Some(font_family),
            ..TextStyle::default()
        })
    }

    pub fn set_font_size(&mut self, font_size: u32) -> bool {
        self.format_text(TextStyle {
            font_size: Some(font_size),
            ..TextStyle::default()
        })
    }

    pub fn set_color(&mut self, color: FlowColor) -> bool {
        self.format_text(TextStyle {
            color: Some(color),
            ..TextStyle::default()
        })
    }

    pub fn set_link(&mut self, link: Interaction) -> bool {
        self.format_text(TextStyle {
            link: Some(link),
            ..TextStyle::default()
        })
    }

    pub fn unset_link(&mut self) -> bool {
        self.unformat_text(TextStyle {
            link: Some(Interaction::OpenUrl { url: String::new() }),
            ..TextStyle::default()
        })
    }

    // -- paragraphs --------------------------------------------------------

    pub fn get_paragraph_style(&self) -> ParagraphStyle {
        self.selection()
            .uniform_paragraph_style(self.content(), self.state.theme())
    }

    pub fn format_paragraph(&mut self, style: ParagraphStyle) -> bool {
        let operation = self.selection().format_paragraph(self.content(), &style);
        self.apply(operation)
    }

    pub fn unformat_paragraph(&mut self, style: ParagraphStyle) -> bool {
        let operation = self.selection().unformat_paragraph(self.content(), &style);
        self.apply(operation)
    }

    pub fn set_paragraph_variant(&mut self, variant: ParagraphVariant) -> bool {
        self.format_paragraph(ParagraphStyle {
            variant: Some(variant),
            ..ParagraphStyle::default()
        })
    }

    pub fn set_alignment(&mut self, alignment: HorizontalAlignment) -> bool {
        self.format_paragraph(ParagraphStyle {
            alignment: Some(alignment),
            ..ParagraphStyle::default()
        })
    }

    pub fn set_line_spacing(&mut self, line_spacing: u32) -> bool {
        self.format_paragraph(ParagraphStyle {
            line_spacing: Some(line_spacing),
            ..ParagraphStyle::default()
        })
    }

    /// Turn the selected paragraphs into list items with `marker`, or back
    /// into plain paragraphs when they already are
    pub fn toggle_list(&mut self, marker: ListMarker) -> bool {
        let current = self.get_paragraph_style();
        if current.list_level() > 0 && current.list_marker == Some(marker) {
            return self.format_paragraph(ParagraphStyle {
                list_level: Some(0),
                ..ParagraphStyle::default()
            });
        }
        self.format_paragraph(ParagraphStyle {
            list_level: Some(current.list_level().max(1)),
            list_marker: Some(marker),
            ..ParagraphStyle::default()
        })
    }

    pub fn increment_list_level(&mut self) -> bool {
        let level = self.get_paragraph_style().list_level();
        if level >= MAX_LIST_LEVEL {
            return false;
        }
        self.format_paragraph(ParagraphStyle {
            list_level: Some(level + 1),
            ..ParagraphStyle::default()
        })
    }

    pub fn decrement_list_level(&mut self) -> bool {
        let level = self.get_paragraph_style().list_level();
        if level == 0 {
            return false;
        }
        self.format_paragraph(ParagraphStyle {
            list_level: Some(level - 1),
            ..ParagraphStyle::default()
        })
    }

    // -- boxes and buttons -------------------------------------------------

    pub fn get_box_style(&self) -> BoxStyle {
        self.selection().uniform_box_style(self.content())
    }

    pub fn format_box(&mut self, style: BoxStyle) -> bool {
        let operation = self.selection().format_box(self.content(), &style);
        self.apply(operation)
    }

    pub fn unformat_box(&mut self, style: BoxStyle) -> bool {
        let operation = self.selection().unformat_box(self.content(), &style);
        self.apply(operation)
    }

    pub fn set_box_variant(&mut self, variant: BoxVariant) -> bool {
        self.format_box(BoxStyle {
            variant: Some(variant),
            ..BoxStyle::default()
        })
    }

    pub fn set_box_color(&mut self, color: FlowColor) -> bool {
        self.format_box(BoxStyle {
            color: Some(color),
            ..BoxStyle::default()
        })
    }

    /// `None` removes the interaction
    pub fn set_box_interaction(&mut self, interaction: Option<Interaction>) -> bool {
        match interaction {
            Some(interaction) => self.format_box(BoxStyle {
                interaction: Some(interaction),
                ..BoxStyle::default()
            }),
            None => self.unformat_box(BoxStyle {
                interaction: Some(Interaction::OpenUrl { url: String::new() }),
                ..BoxStyle::default()
            }),
        }
    }

    /// Wrap the selected content in a box
    pub fn insert_box(&mut self, style: BoxStyle) -> bool {
        self.insert_container(
            true,
            |content| FlowNode::Box(FlowBox { style, content }),
            |position, inner| FlowSelection::Box { position, inner },
        )
    }

    /// Wrap the selected content in a button
    pub fn insert_button(&mut self, action: Option<Interaction>) -> bool {
        let style = self.insertion_style();
        self.insert_container(
            false,
            |content| {
                FlowNode::Button(FlowButton {
                    action,
                    content,
                    style,
                })
            },
            |position, inner| FlowSelection::Button { position, inner },
        )
    }

    pub fn set_button_action(&mut self, action: Option<Interaction>) -> bool {
        let operation = self.selection().set_node(self.content(), |node| match node {
            FlowNode::Button(button) => Some(FlowNode::Button(FlowButton {
                action,
                ..button.clone()
            })),
            _ => None,
        });
        self.apply(operation)
    }

    /// Replace the selection with a container holding a copy of it. A plain
    /// range selection moves inside the container; any other topology keeps
    /// the selection as the operation maps it.
    fn insert_container(
        &mut self,
        terminate: bool,
        build: impl FnOnce(FlowContent) -> FlowNode,
        select: impl FnOnce(usize, Box<FlowSelection>) -> FlowSelection,
    ) -> bool {
        let Some((content, range)) = self.innermost() else {
            return false;
        };
        let copied = content.copy(range.normalized());
        let copied_size = copied.size();
        let nested = if terminate && !copied.ends_with_paragraph_break() {
            copied.concat(&FlowContent::paragraph())
        } else {
            copied
        };
        let selection = matches!(self.selection(), FlowSelection::Range(_)).then(|| {
            let inner = if copied_size > 0 {
                FlowSelection::range(0, copied_size)
            } else {
                FlowSelection::caret(0)
            };
            select(range.first(), Box::new(inner))
        });
        self.insert_node_selecting(build(nested), selection)
    }

    // -- tables ------------------------------------------------------------

    pub fn is_table_selection(&self) -> bool {
        self.selection().innermost_table().is_some()
    }

    /// Cells covered by the innermost table level of the selection
    pub fn get_table_cell_range(&self) -> Option<CellRange> {
        match self.selection().innermost_table()? {
            FlowSelection::Table { range, .. } => Some(*range),
            FlowSelection::TableCell { cell, .. } => Some(CellRange::new(*cell, *cell)),
            _ => None,
        }
    }

    pub fn get_table_style(&self) -> TableStyle {
        self.selection().table_style(self.content())
    }

    pub fn insert_table(&mut self, columns: u32, rows: u32) -> bool {
        if columns == 0 || rows == 0 {
            return false;
        }
        let Some(range) = self.selection().innermost_range() else {
            return false;
        };
        let selection = matches!(self.selection(), FlowSelection::Range(_)).then(|| FlowSelection::TableCell {
            position: range.first(),
            cell: CellPosition::new(0, 0),
            inner: Box::new(FlowSelection::caret(0)),
        });
        let table = FlowTable::new(columns, rows, &FlowContent::paragraph());
        self.insert_node_selecting(FlowNode::Table(table), selection)
    }

    pub fn set_table_inline(&mut self, inline: bool) -> bool {
        let operation = self.selection().format_table(
            self.content(),
            &TableStyle {
                inline: Some(inline),
                ..TableStyle::default()
            },
        );
        self.apply(operation)
    }

    /// Build a structural edit for the innermost table, given the table,
    /// the covered cells (merged cells expanded) and its position
    fn table_edit(&mut self, build: impl Fn(&FlowTable, CellRange, usize) -> Option<FlowOperation>) -> bool {
        self.table_edit_selecting(build, None)
    }

    fn table_edit_selecting(
        &mut self,
        build: impl Fn(&FlowTable, CellRange, usize) -> Option<FlowOperation>,
        selection: Option<FlowSelection>,
    ) -> bool {
        let Some(range) = self.get_table_cell_range() else {
            return false;
        };
        let operation = self.selection().table_operation(self.content(), &|content, position| {
            let Some(FlowNode::Table(table)) = content.atom_at(position) else {
                return None;
            };
            build(table, covered_cells(table, range), position)
        });
        self.apply_selecting(operation, selection)
    }

    pub fn insert_table_row_before(&mut self) -> bool {
        self.table_edit(|_, cells, position| {
            Some(FlowOperation::InsertTableRow {
                position,
                index: cells.first().row,
                count: 1,
            })
        })
    }

    pub fn insert_table_row_after(&mut self) -> bool {
        self.table_edit(|_, cells, position| {
            Some(FlowOperation::InsertTableRow {
                position,
                index: cells.last().row + 1,
                count: 1,
            })
        })
    }

    pub fn insert_table_column_before(&mut self) -> bool {
        self.table_edit(|_, cells, position| {
            Some(FlowOperation::InsertTableColumn {
                position,
                index: cells.first().column,
                count: 1,
            })
        })
    }

    pub fn insert_table_column_after(&mut self) -> bool {
        self.table_edit(|_, cells, position| {
            Some(FlowOperation::InsertTableColumn {
                position,
                index: cells.last().column + 1,
                count: 1,
            })
        })
    }

    /// Remove the covered rows; removing every row removes the table
    pub fn remove_table_row(&mut self) -> bool {
        self.table_edit(|table, cells, position| {
            let (index, count) = (cells.first().row, cells.last().row - cells.first().row + 1);
            if count >= table.rows() {
                return Some(FlowOperation::remove(FlowRange::new(position, position + 1)));
            }
            Some(FlowOperation::RemoveTableRow {
                position,
                index,
                count,
            })
        })
    }

    /// Remove the covered columns; removing every column removes the table
    pub fn remove_table_column(&mut self) -> bool {
        self.table_edit(|table, cells, position| {
            let (index, count) = (
                cells.first().column,
                cells.last().column - cells.first().column + 1,
            );
            if count >= table.columns() {
                return Some(FlowOperation::remove(FlowRange::new(position, position + 1)));
            }
            Some(FlowOperation::RemoveTableColumn {
                position,
                index,
                count,
            })
        })
    }

    /// Merge a multi-cell table selection; the caret moves into the merged
    /// cell
    pub fn merge_table_cells(&mut self) -> bool {
        let Some(FlowSelection::Table { position, range }) = self.selection().innermost_table().cloned() else {
            return false;
        };
        let selection = self.selection().with_innermost(FlowSelection::TableCell {
            position,
            cell: range.first(),
            inner: Box::new(FlowSelection::caret(0)),
        });
        self.table_edit_selecting(
            |table, cells, position| {
                table.merge_cells(cells)?;
                Some(FlowOperation::MergeTableCells {
                    position,
                    range: cells,
                })
            },
            Some(selection),
        )
    }

    pub fn split_table_cell(&mut self) -> bool {
        let Some(FlowSelection::TableCell { cell, .. }) = self.selection().innermost_table().cloned() else {
            return false;
        };
        self.table_edit(|table, _, position| {
            let spans = table.cell(cell)?;
            (spans.colspan > 1 || spans.rowspan > 1)
                .then_some(FlowOperation::SplitTableCell { position, cell })
        })
    }

    // -- content -----------------------------------------------------------

    /// Type `text` over the selection. Newlines become paragraph breaks.
    /// Consecutive typing at a caret coalesces into one undo step.
    pub fn insert_text(&mut self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        let Some((content, range)) = self.innermost() else {
            return false;
        };
        let style = self.insertion_style();
        let paragraph = content
            .paragraph_style_at(range.first())
            .cloned()
            .unwrap_or_default();

        let mut nodes = Vec::new();
        for (index, line) in text.split('\n').enumerate() {
            if index > 0 {
                nodes.push(FlowNode::ParagraphBreak {
                    style: paragraph.clone(),
                });
            }
            if !line.is_empty() {
                nodes.push(FlowNode::styled_text(line, style.clone()));
            }
        }
        let merge_undo = range.is_collapsed() && !text.contains('\n');
        let operation = self
            .selection()
            .insert(self.content(), &FlowContent::from_nodes(nodes));
        self.apply_with(operation, merge_undo)
    }

    pub fn insert_line_break(&mut self) -> bool {
        let style = self.insertion_style();
        self.insert_node(FlowNode::LineBreak { style })
    }

    /// Split the paragraph at the selection; both halves keep its style
    pub fn insert_paragraph_break(&mut self) -> bool {
        let Some((content, range)) = self.innermost() else {
            return false;
        };
        let style = content
            .paragraph_style_at(range.first())
            .cloned()
            .unwrap_or_default();
        self.insert_node(FlowNode::ParagraphBreak { style })
    }

    pub fn insert_icon(&mut self, data: impl Into<String>) -> bool {
        let style = self.insertion_style();
        self.insert_node(FlowNode::Icon(FlowIcon {
            data: data.into(),
            style,
        }))
    }

    pub fn set_icon(&mut self, data: impl Into<String>) -> bool {
        let data = data.into();
        let operation = self.selection().set_node(self.content(), |node| match node {
            FlowNode::Icon(icon) => Some(FlowNode::Icon(FlowIcon {
                data,
                style: icon.style.clone(),
            })),
            _ => None,
        });
        self.apply(operation)
    }

    pub fn insert_dynamic_text(&mut self, expression: impl Into<String>) -> bool {
        let style = self.insertion_style();
        self.insert_node(FlowNode::Dynamic(DynamicText {
            expression: expression.into(),
            style,
        }))
    }

    pub fn set_dynamic_expression(&mut self, expression: impl Into<String>) -> bool {
        let expression = expression.into();
        let operation = self.selection().set_node(self.content(), |node| match node {
            FlowNode::Dynamic(dynamic) => Some(FlowNode::Dynamic(DynamicText {
                expression,
                style: dynamic.style.clone(),
            })),
            _ => None,
        });
        self.apply(operation)
    }

    /// Surround the selection with a start and end tag. A caret lands
    /// between the tags; a range selection is left as mapped.
    pub fn insert_markup(&mut self, tag: impl Into<String>, attr: BTreeMap<String, String>) -> bool {
        let Some(range) = self.selection().innermost_range() else {
            return false;
        };
        let tag = tag.into();
        let style = self.insertion_style();
        let end = FlowOperation::insert(
            range.last(),
            FlowContent::from_nodes([FlowNode::EndMarkup {
                tag: tag.clone(),
                style: style.clone(),
            }]),
        );
        let start = FlowOperation::insert(
            range.first(),
            FlowContent::from_nodes([FlowNode::StartMarkup { tag, attr, style }]),
        );
        let Some(batch) = FlowOperation::batch([end, start]) else {
            return false;
        };

        let original = self.selection().clone();
        let selection = range
            .is_collapsed()
            .then(|| original.with_innermost(FlowSelection::caret(range.first() + 1)));
        self.apply_selecting(Some(original.wrap(batch)), selection)
    }

    pub fn insert_empty_markup(&mut self, tag: impl Into<String>, attr: BTreeMap<String, String>) -> bool {
        let style = self.insertion_style();
        self.insert_node(FlowNode::EmptyMarkup {
            tag: tag.into(),
            attr,
            style,
        })
    }

    pub fn insert_image(&mut self, source: ImageSource) -> bool {
        let style = self.insertion_style();
        self.insert_node(FlowNode::Image(FlowImage { source, style }))
    }

    pub fn set_image_source(&mut self, source: ImageSource) -> bool {
        let operation = self.selection().set_node(self.content(), |node| match node {
            FlowNode::Image(image) => Some(FlowNode::Image(FlowImage {
                source,
                style: image.style.clone(),
            })),
            _ => None,
        });
        self.apply(operation)
    }

    pub fn insert_video(&mut self, source: VideoSource) -> bool {
        let style = self.insertion_style();
        self.insert_node(FlowNode::Video(FlowVideo { source, style }))
    }

    /// Remove the selected content
    pub fn remove(&mut self) -> bool {
        let operation = self.selection().remove(self.content());
        self.apply(operation)
    }

    // -- view state --------------------------------------------------------

    pub fn set_selection(&mut self, selection: FlowSelection) {
        let next = self.state.with_selection(selection);
        self.commit(StateChange::Replace(next));
    }

    pub fn select_all(&mut self) {
        let size = self.content().size();
        self.set_selection(FlowSelection::range(0, size));
    }

    pub fn set_caret_style(&mut self, style: TextStyle) {
        let next = self.state.with_caret(style);
        self.commit(StateChange::Replace(next));
    }

    pub fn toggle_formatting_marks(&mut self) {
        let next = self
            .state
            .with_formatting_marks(!self.state.formatting_marks());
        self.commit(StateChange::Replace(next));
    }

    pub fn set_preview(&mut self, preview: bool) {
        let next = self.state.with_preview(preview);
        self.commit(StateChange::Replace(next));
    }

    pub fn is_caret(&self) -> bool {
        self.selection().is_collapsed()
    }

    pub fn can_undo(&self) -> bool {
        self.state.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.state.can_redo()
    }

    pub fn undo(&mut self) -> bool {
        let event = self.state.undo();
        if event.is_noop() {
            return false;
        }
        debug!("Undo");
        self.commit(StateChange::Replace(event.after));
        true
    }

    pub fn redo(&mut self) -> bool {
        let event = self.state.redo();
        if event.is_noop() {
            return false;
        }
        debug!("Redo");
        self.commit(StateChange::Replace(event.after));
        true
    }

    // -- uploads -----------------------------------------------------------

    pub fn upload_asset(&mut self, blob: Blob) -> Result<UploadId, EditorError> {
        self.upload_asset_with(blob, BTreeMap::new())
    }

    /// Upload `blob` together with named supplementary blobs
    pub fn upload_asset_with(
        &mut self,
        blob: Blob,
        supplementary: BTreeMap<String, Blob>,
    ) -> Result<UploadId, EditorError> {
        let uploads = self.uploads.as_mut().ok_or(EditorError::NoAssetStore)?;
        Ok(uploads.upload(blob, supplementary))
    }

    /// Upload an image and insert it right away, rendering from the local
    /// blob until the upload completes
    pub fn insert_image_blob(&mut self, blob: Blob, width: u32, height: u32) -> Result<UploadId, EditorError> {
        let id = self.upload_asset(blob)?;
        self.insert_image(ImageSource {
            url: String::new(),
            width,
            height,
            upload: Some(id.clone()),
        });
        Ok(id)
    }

    pub fn upload_status(&self, id: &str) -> Option<UploadStatus> {
        self.uploads.as_ref()?.status(id)
    }

    pub fn upload_blob(&self, id: &str) -> Option<&Blob> {
        self.uploads.as_ref()?.blob(id)
    }

    /// Release the status and blob kept for a settled (or abandoned) upload
    pub fn forget_upload(&mut self, id: &str) -> bool {
        self.uploads.as_mut().is_some_and(|uploads| uploads.forget(id))
    }

    /// Apply every upload that finished since the last call. Returns how
    /// many completions were handled.
    pub fn process_uploads(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let Some(uploads) = self.uploads.as_mut() else {
                return handled;
            };
            let Some(completion) = uploads.try_next() else {
                return handled;
            };
            let operation = uploads.complete(completion);
            handled += 1;
            self.apply(operation);
        }
    }

    /// Wait for the next upload to finish and apply it. `false` when
    /// uploads are not enabled.
    pub async fn wait_for_upload(&mut self) -> bool {
        let Some(uploads) = self.uploads.as_mut() else {
            return false;
        };
        let Some(completion) = uploads.next().await else {
            return false;
        };
        let operation = uploads.complete(completion);
        if let Some(operation) = operation {
            info!("Applying completed upload");
            self.apply_operation(operation, false);
        }
        true
    }
}

/// Expand `range` so it covers every merged cell it touches
fn covered_cells(table: &FlowTable, range: CellRange) -> CellRange {
    let mut last = range.last();
    for position in range.positions() {
        if let Some(cell) = table.cell(position) {
            last.row = last.row.max(position.row + cell.rowspan - 1);
            last.column = last.column.max(position.column + cell.colspan - 1);
        }
    }
    CellRange::new(range.first(), last)
}
