//! `beforeinput` translation
//!
//! The browser's `beforeinput` event is the only mutation entry point of
//! the editing surface. Its target ranges are mapped to a flow selection
//! and the input type is turned into a controller intent. Input types
//! without a translation are logged and ignored, as are events whose
//! target ranges cannot be mapped.

use crate::registry::FlowRegistry;
use crate::selection::{map_dom_selection_to_flow, DomRange};
use crate::tree::{DomNodeId, DomTree};
use scribing_editor::EditorController;
use scribing_flow::{FlowContent, FlowNode, FlowSelection};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeforeInput {
    pub input_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_ranges: Vec<DomRange>,
}

impl BeforeInput {
    pub fn new(input_type: impl Into<String>) -> Self {
        Self {
            input_type: input_type.into(),
            data: None,
            target_ranges: Vec::new(),
        }
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_target_ranges(mut self, ranges: Vec<DomRange>) -> Self {
        self.target_ranges = ranges;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    InsertText,
    InsertReplacementText,
    InsertParagraph,
    InsertLineBreak,
    InsertFromPaste,
    InsertFromDrop,
    DeleteContentBackward,
    DeleteContentForward,
    DeleteWordBackward,
    DeleteWordForward,
    DeleteByCut,
    HistoryUndo,
    HistoryRedo,
    FormatBold,
    FormatItalic,
    FormatUnderline,
    FormatStrikeThrough,
}

impl InputType {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "insertText" => InputType::InsertText,
            "insertReplacementText" => InputType::InsertReplacementText,
            "insertParagraph" => InputType::InsertParagraph,
            "insertLineBreak" => InputType::InsertLineBreak,
            "insertFromPaste" => InputType::InsertFromPaste,
            "insertFromDrop" => InputType::InsertFromDrop,
            "deleteContentBackward" => InputType::DeleteContentBackward,
            "deleteContentForward" => InputType::DeleteContentForward,
            "deleteWordBackward" => InputType::DeleteWordBackward,
            "deleteWordForward" => InputType::DeleteWordForward,
            "deleteByCut" => InputType::DeleteByCut,
            "historyUndo" => InputType::HistoryUndo,
            "historyRedo" => InputType::HistoryRedo,
            "formatBold" => InputType::FormatBold,
            "formatItalic" => InputType::FormatItalic,
            "formatUnderline" => InputType::FormatUnderline,
            "formatStrikeThrough" => InputType::FormatStrikeThrough,
            _ => return None,
        })
    }
}

/// One char per flow position; atoms read as an object replacement char
fn position_chars(content: &FlowContent) -> Vec<char> {
    let mut chars = Vec::with_capacity(content.size());
    for node in content.nodes() {
        match node {
            FlowNode::Text(run) => chars.extend(run.text.chars()),
            FlowNode::LineBreak { .. } | FlowNode::ParagraphBreak { .. } => chars.push('\n'),
            _ => chars.push('\u{fffc}'),
        }
    }
    chars
}

fn word_start(chars: &[char], from: usize) -> usize {
    let mut position = from.min(chars.len());
    while position > 0 && chars[position - 1].is_whitespace() {
        position -= 1;
    }
    while position > 0 && !chars[position - 1].is_whitespace() {
        position -= 1;
    }
    position
}

fn word_end(chars: &[char], from: usize) -> usize {
    let mut position = from.min(chars.len());
    while position < chars.len() && chars[position].is_whitespace() {
        position += 1;
    }
    while position < chars.len() && !chars[position].is_whitespace() {
        position += 1;
    }
    position
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Backward,
    Forward,
}

/// Remove the selection, or the character or word next to a caret
fn delete(editor: &mut EditorController, direction: Direction, word: bool) -> bool {
    let state = editor.state();
    let selection = state.selection().clone();
    let Some(range) = selection.innermost_range() else {
        return editor.remove();
    };
    if !range.is_collapsed() {
        return editor.remove();
    }
    let Some(content) = selection.innermost_content(state.content()) else {
        return false;
    };

    let caret = range.focus;
    let target = match (direction, word) {
        (Direction::Backward, false) => caret.saturating_sub(1),
        (Direction::Forward, false) => (caret + 1).min(content.size()),
        (Direction::Backward, true) => word_start(&position_chars(&content), caret),
        (Direction::Forward, true) => word_end(&position_chars(&content), caret),
    };
    if target == caret {
        return false;
    }
    editor.set_selection(selection.with_innermost(FlowSelection::range(caret, target)));
    editor.remove()
}

/// Translate one `beforeinput` event. Returns true when the editor state
/// changed.
pub fn handle_before_input(
    editor: &mut EditorController,
    tree: &DomTree,
    registry: &FlowRegistry,
    root: DomNodeId,
    event: &BeforeInput,
) -> bool {
    let Some(input_type) = InputType::parse(&event.input_type) else {
        warn!(input_type = %event.input_type, "Ignoring unsupported input type");
        return false;
    };

    if !event.target_ranges.is_empty() {
        let Some(selection) = map_dom_selection_to_flow(tree, registry, root, &event.target_ranges)
        else {
            warn!(input_type = %event.input_type, "Discarding input with unmappable target ranges");
            return false;
        };
        if editor.state().selection() != &selection {
            editor.set_selection(selection);
        }
    }

    debug!(?input_type, "Handling input");
    match input_type {
        InputType::InsertText
        | InputType::InsertReplacementText
        | InputType::InsertFromPaste
        | InputType::InsertFromDrop => match event.data.as_deref() {
            Some(data) => editor.insert_text(data),
            None => false,
        },
        InputType::InsertParagraph => editor.insert_paragraph_break(),
        InputType::InsertLineBreak => editor.insert_line_break(),
        InputType::DeleteContentBackward => delete(editor, Direction::Backward, false),
        InputType::DeleteContentForward => delete(editor, Direction::Forward, false),
        InputType::DeleteWordBackward => delete(editor, Direction::Backward, true),
        InputType::DeleteWordForward => delete(editor, Direction::Forward, true),
        InputType::DeleteByCut => editor.remove(),
        InputType::HistoryUndo => editor.undo(),
        InputType::HistoryRedo => editor.redo(),
        InputType::FormatBold => editor.toggle_bold(),
        InputType::FormatItalic => editor.toggle_italic(),
        InputType::FormatUnderline => editor.toggle_underline(),
        InputType::FormatStrikeThrough => editor.toggle_strike(),
    }
}
