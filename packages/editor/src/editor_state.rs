//! # Editor State
//!
//! Immutable record of everything the editor shows: content, selection,
//! ambient caret style, undo/redo history, remote presence and view flags.
//!
//! ## Transitions
//!
//! Content only changes through:
//!
//! - [`EditorState::apply_mine`]: a local edit, recorded for undo
//! - [`EditorState::apply_theirs`]: a remote edit, rebasing history
//! - [`EditorState::undo`] / [`EditorState::redo`]
//!
//! The `with_*` setters change view state and never touch content. Every
//! transition returns a new state; large fields are shared between versions.

use crate::presence::Presence;
use crate::undo_stack::UndoStack;
use scribing_flow::{FlowContent, FlowOperation, FlowSelection, FlowTheme, TextStyle};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorState {
    #[serde(default, skip_serializing_if = "FlowContent::is_empty")]
    content: FlowContent,
    #[serde(default, skip_serializing_if = "is_default_selection")]
    selection: FlowSelection,
    #[serde(default = "standard_theme", skip_serializing_if = "is_standard_theme")]
    theme: Arc<FlowTheme>,
    #[serde(default, skip_serializing_if = "TextStyle::is_empty")]
    caret: TextStyle,
    #[serde(default, skip_serializing_if = "is_empty_stack")]
    undo_stack: Arc<UndoStack>,
    #[serde(default, skip_serializing_if = "is_empty_stack")]
    redo_stack: Arc<UndoStack>,
    #[serde(default, skip_serializing_if = "is_false")]
    formatting_marks: bool,
    #[serde(default, skip_serializing_if = "is_empty_presence")]
    presence: Arc<Vec<Presence>>,
    #[serde(default, skip_serializing_if = "is_false")]
    preview: bool,
}

fn is_default_selection(selection: &FlowSelection) -> bool {
    *selection == FlowSelection::default()
}

fn standard_theme() -> Arc<FlowTheme> {
    Arc::new(FlowTheme::standard().clone())
}

fn is_standard_theme(theme: &Arc<FlowTheme>) -> bool {
    **theme == *FlowTheme::standard()
}

fn is_empty_stack(stack: &Arc<UndoStack>) -> bool {
    stack.is_empty()
}

fn is_empty_presence(presence: &Arc<Vec<Presence>>) -> bool {
    presence.is_empty()
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Coalesce the inverse into the top undo entry when possible
    pub merge_undo: bool,
}

/// Record of one transition
#[derive(Debug, Clone, PartialEq)]
pub struct StateChangeEvent {
    pub before: EditorState,
    pub after: EditorState,
}

impl StateChangeEvent {
    pub fn is_noop(&self) -> bool {
        self.before == self.after
    }
}

/// Which history the inverse of a local apply goes to
#[derive(Debug, Clone, Copy)]
enum History {
    Mine { merge_undo: bool },
    Undo,
    Redo,
}

impl Default for EditorState {
    fn default() -> Self {
        Self {
            content: FlowContent::empty(),
            selection: FlowSelection::default(),
            theme: standard_theme(),
            caret: TextStyle::default(),
            undo_stack: Arc::default(),
            redo_stack: Arc::default(),
            formatting_marks: false,
            presence: Arc::default(),
            preview: false,
        }
    }
}

impl EditorState {
    /// Shared empty state
    pub fn empty() -> &'static EditorState {
        static EMPTY: OnceLock<EditorState> = OnceLock::new();
        EMPTY.get_or_init(EditorState::default)
    }

    /// Fresh state for loaded content, with no history
    pub fn new(content: FlowContent, theme: FlowTheme) -> Self {
        Self {
            content,
            theme: Arc::new(theme),
            ..Self::default()
        }
    }

    pub fn content(&self) -> &FlowContent {
        &self.content
    }

    pub fn selection(&self) -> &FlowSelection {
        &self.selection
    }

    pub fn theme(&self) -> &FlowTheme {
        &self.theme
    }

    /// Pending inline style for a collapsed selection
    pub fn caret(&self) -> &TextStyle {
        &self.caret
    }

    pub fn undo_stack(&self) -> &UndoStack {
        &self.undo_stack
    }

    pub fn redo_stack(&self) -> &UndoStack {
        &self.redo_stack
    }

    pub fn formatting_marks(&self) -> bool {
        self.formatting_marks
    }

    pub fn presence(&self) -> &[Presence] {
        &self.presence
    }

    pub fn preview(&self) -> bool {
        self.preview
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Move the selection; the caret style only survives if the selection
    /// did not change
    pub fn with_selection(&self, selection: FlowSelection) -> EditorState {
        if selection == self.selection {
            return self.clone();
        }
        EditorState {
            selection,
            caret: TextStyle::default(),
            ..self.clone()
        }
    }

    pub fn with_caret(&self, caret: TextStyle) -> EditorState {
        EditorState {
            caret,
            ..self.clone()
        }
    }

    pub fn with_theme(&self, theme: FlowTheme) -> EditorState {
        EditorState {
            theme: Arc::new(theme),
            ..self.clone()
        }
    }

    pub fn with_formatting_marks(&self, formatting_marks: bool) -> EditorState {
        EditorState {
            formatting_marks,
            ..self.clone()
        }
    }

    pub fn with_presence(&self, presence: Vec<Presence>) -> EditorState {
        EditorState {
            presence: Arc::new(presence),
            ..self.clone()
        }
    }

    pub fn with_preview(&self, preview: bool) -> EditorState {
        EditorState {
            preview,
            ..self.clone()
        }
    }

    /// Apply a locally originated operation and record its inverse
    pub fn apply_mine(&self, operation: &FlowOperation, options: ApplyOptions) -> EditorState {
        self.apply_local(
            operation,
            History::Mine {
                merge_undo: options.merge_undo,
            },
        )
    }

    /// Apply a remotely originated operation. History is rebased; entries
    /// that lost their meaning are dropped.
    pub fn apply_theirs(&self, operation: &FlowOperation) -> EditorState {
        let content = operation.apply_to(&self.content, &self.theme);
        let selection = operation.apply_to_selection(&self.selection, false);
        let caret = if selection == self.selection {
            self.caret.clone()
        } else {
            TextStyle::default()
        };
        let undo_stack = self.undo_stack.rebase(operation);
        let redo_stack = self.redo_stack.rebase(operation);
        debug!(
            undo = undo_stack.len(),
            redo = redo_stack.len(),
            "Applied remote operation"
        );

        EditorState {
            content,
            selection,
            caret,
            undo_stack: Arc::new(undo_stack),
            redo_stack: Arc::new(redo_stack),
            ..self.clone()
        }
    }

    pub fn undo(&self) -> StateChangeEvent {
        let after = match self.undo_stack.pop() {
            Some((operation, rest)) => EditorState {
                undo_stack: Arc::new(rest),
                ..self.clone()
            }
            .apply_local(&operation, History::Undo),
            None => self.clone(),
        };
        StateChangeEvent {
            before: self.clone(),
            after,
        }
    }

    pub fn redo(&self) -> StateChangeEvent {
        let after = match self.redo_stack.pop() {
            Some((operation, rest)) => EditorState {
                redo_stack: Arc::new(rest),
                ..self.clone()
            }
            .apply_local(&operation, History::Redo),
            None => self.clone(),
        };
        StateChangeEvent {
            before: self.clone(),
            after,
        }
    }

    fn apply_local(&self, operation: &FlowOperation, history: History) -> EditorState {
        let inverse = operation.invert(&self.content);
        let content = operation.apply_to(&self.content, &self.theme);
        let selection = operation.apply_to_selection(&self.selection, true);

        let (undo_stack, redo_stack) = match history {
            History::Mine { merge_undo } => (
                Arc::new(self.undo_stack.push(inverse, merge_undo)),
                Arc::new(UndoStack::new()),
            ),
            History::Undo => (
                self.undo_stack.clone(),
                Arc::new(self.redo_stack.push(inverse, false)),
            ),
            History::Redo => (
                Arc::new(self.undo_stack.push(inverse, false)),
                self.redo_stack.clone(),
            ),
        };

        let caret = if selection == self.selection {
            self.caret.clone()
        } else {
            TextStyle::default()
        };

        EditorState {
            content,
            selection,
            caret,
            undo_stack,
            redo_stack,
            ..self.clone()
        }
    }
}
