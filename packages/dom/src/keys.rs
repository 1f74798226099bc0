//! Special key handling
//!
//! Native caret movement in an editable surface does not follow flow
//! semantics around paragraph breaks, lists, tables and nested flows. Each
//! handler inspects the flow selection and either rewrites it or leaves
//! the key to the browser.

use scribing_editor::EditorController;
use scribing_flow::{FlowContent, FlowNode, FlowRange, FlowSelection};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Backspace,
    Delete,
    Tab,
}

impl Key {
    /// Parse a `KeyboardEvent.key` value
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "ArrowLeft" => Key::ArrowLeft,
            "ArrowRight" => Key::ArrowRight,
            "ArrowUp" => Key::ArrowUp,
            "ArrowDown" => Key::ArrowDown,
            "Backspace" => Key::Backspace,
            "Delete" => Key::Delete,
            "Tab" => Key::Tab,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Let the browser's default action run
    Native,
    /// Default action must be prevented
    Handled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaretRect {
    pub x: f64,
    pub y: f64,
    pub height: f64,
}

/// Pixel geometry of the rendered flow, used for vertical caret movement
pub trait CaretLayout {
    fn caret_rect(&self, selection: &FlowSelection) -> Option<CaretRect>;
    fn selection_at(&self, x: f64, y: f64) -> Option<FlowSelection>;
}

struct Caret {
    selection: FlowSelection,
    content: FlowContent,
    range: FlowRange,
}

fn caret(editor: &EditorController) -> Option<Caret> {
    let selection = editor.state().selection().clone();
    let range = selection.innermost_range()?;
    let content = selection.innermost_content(editor.state().content())?;
    Some(Caret {
        selection,
        content,
        range,
    })
}

fn after_trailing_break(content: &FlowContent, position: usize) -> bool {
    content.ends_with_paragraph_break() && position >= content.size()
}

fn paragraph_start(content: &FlowContent, position: usize) -> bool {
    position == 0
        || content
            .node_at(position - 1)
            .is_some_and(FlowNode::is_paragraph_break)
}

pub fn handle_key(
    editor: &mut EditorController,
    layout: &dyn CaretLayout,
    key: Key,
    shift: bool,
) -> KeyOutcome {
    let outcome = match key {
        Key::ArrowLeft => arrow_left(editor),
        Key::ArrowRight => arrow_right(editor),
        Key::ArrowUp | Key::ArrowDown if !shift => vertical(editor, layout, key == Key::ArrowUp),
        Key::ArrowUp | Key::ArrowDown => KeyOutcome::Native,
        Key::Backspace => backspace(editor),
        Key::Delete => delete(editor),
        Key::Tab => tab(editor, shift),
    };
    trace!(?key, shift, ?outcome, "Handled key");
    outcome
}

fn arrow_left(editor: &mut EditorController) -> KeyOutcome {
    let Some(caret) = caret(editor) else {
        return KeyOutcome::Native;
    };
    if caret.range.is_collapsed() && after_trailing_break(&caret.content, caret.range.focus) {
        let position = caret.content.size().saturating_sub(1);
        editor.set_selection(caret.selection.with_innermost(FlowSelection::caret(position)));
        return KeyOutcome::Handled;
    }
    KeyOutcome::Native
}

fn arrow_right(editor: &mut EditorController) -> KeyOutcome {
    match caret(editor) {
        Some(caret) if after_trailing_break(&caret.content, caret.range.focus + 1) => {
            KeyOutcome::Handled
        }
        _ => KeyOutcome::Native,
    }
}

/// Moves a collapsed caret one line. Range selections keep the native
/// behaviour.
fn vertical(editor: &mut EditorController, layout: &dyn CaretLayout, up: bool) -> KeyOutcome {
    let selection = editor.state().selection().clone();
    if !selection.innermost_range().is_some_and(|range| range.is_collapsed()) {
        return KeyOutcome::Native;
    }
    let Some(rect) = layout.caret_rect(&selection) else {
        return KeyOutcome::Native;
    };
    let y = if up {
        rect.y - rect.height / 2.0
    } else {
        rect.y + rect.height * 1.5
    };
    match layout.selection_at(rect.x, y) {
        Some(target) => {
            editor.set_selection(target);
            KeyOutcome::Handled
        }
        None => KeyOutcome::Native,
    }
}

fn backspace(editor: &mut EditorController) -> KeyOutcome {
    let Some(caret) = caret(editor) else {
        return KeyOutcome::Native;
    };
    if !caret.range.is_collapsed() || !paragraph_start(&caret.content, caret.range.focus) {
        return KeyOutcome::Native;
    }
    if editor.get_paragraph_style().list_level() > 0 {
        editor.decrement_list_level();
        return KeyOutcome::Handled;
    }
    // Never join a nested flow with its surroundings
    if caret.range.focus == 0 && caret.selection.inner().is_some() {
        return KeyOutcome::Handled;
    }
    KeyOutcome::Native
}

fn delete(editor: &mut EditorController) -> KeyOutcome {
    let Some(caret) = caret(editor) else {
        return KeyOutcome::Native;
    };
    if !caret.range.is_collapsed() {
        return KeyOutcome::Native;
    }
    let end = caret.range.focus >= caret.content.size();
    let nested = caret.selection.inner().is_some();
    if after_trailing_break(&caret.content, caret.range.focus + 1) || (end && nested) {
        return KeyOutcome::Handled;
    }
    KeyOutcome::Native
}

fn tab(editor: &mut EditorController, backward: bool) -> KeyOutcome {
    let selection = editor.state().selection().clone();
    if selection.innermost_table().is_some() {
        if let Some(next) = neighbour_cell(&selection, editor.state().content(), backward) {
            editor.set_selection(next);
        }
        return KeyOutcome::Handled;
    }
    if editor.get_paragraph_style().list_level() > 0 {
        if backward {
            editor.decrement_list_level();
        } else {
            editor.increment_list_level();
        }
        return KeyOutcome::Handled;
    }
    KeyOutcome::Native
}

/// Caret at the start of the next (or previous) cell of the innermost
/// table the selection is in
fn neighbour_cell(selection: &FlowSelection, content: &FlowContent, backward: bool) -> Option<FlowSelection> {
    match selection {
        FlowSelection::TableCell {
            position,
            cell,
            inner,
        } => {
            let Some(FlowNode::Table(table)) = content.node_at(*position) else {
                return None;
            };
            let nested = table
                .cell(*cell)
                .and_then(|data| neighbour_cell(inner, &data.content, backward));
            if let Some(nested) = nested {
                return Some(FlowSelection::TableCell {
                    position: *position,
                    cell: *cell,
                    inner: Box::new(nested),
                });
            }
            let mut cells = table.cells().keys().copied();
            let target = if backward {
                cells.filter(|other| other < cell).last()
            } else {
                cells.find(|other| other > cell)
            }?;
            Some(FlowSelection::TableCell {
                position: *position,
                cell: target,
                inner: Box::new(FlowSelection::caret(0)),
            })
        }
        FlowSelection::Box { position, inner } => {
            let Some(FlowNode::Box(flow_box)) = content.node_at(*position) else {
                return None;
            };
            let nested = neighbour_cell(inner, &flow_box.content, backward)?;
            Some(FlowSelection::Box {
                position: *position,
                inner: Box::new(nested),
            })
        }
        FlowSelection::Button { position, inner } => {
            let Some(FlowNode::Button(button)) = content.node_at(*position) else {
                return None;
            };
            let nested = neighbour_cell(inner, &button.content, backward)?;
            Some(FlowSelection::Button {
                position: *position,
                inner: Box::new(nested),
            })
        }
        FlowSelection::Range(_) | FlowSelection::Table { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribing_editor::EditorState;
    use scribing_flow::{CellPosition, FlowTheme};

    struct NoLayout;

    impl CaretLayout for NoLayout {
        fn caret_rect(&self, _selection: &FlowSelection) -> Option<CaretRect> {
            None
        }

        fn selection_at(&self, _x: f64, _y: f64) -> Option<FlowSelection> {
            None
        }
    }

    /// One line per paragraph, every hit lands at the start
    struct Lines;

    impl CaretLayout for Lines {
        fn caret_rect(&self, _selection: &FlowSelection) -> Option<CaretRect> {
            Some(CaretRect {
                x: 4.0,
                y: 20.0,
                height: 20.0,
            })
        }

        fn selection_at(&self, _x: f64, _y: f64) -> Option<FlowSelection> {
            Some(FlowSelection::caret(0))
        }
    }

    fn controller(text: &str, selection: FlowSelection) -> EditorController {
        let mut editor = EditorController::new(EditorState::new(
            FlowContent::from_text(text),
            FlowTheme::default(),
        ));
        editor.set_selection(selection);
        editor
    }

    #[test]
    fn test_arrow_right_stops_before_trailing_break() {
        let mut editor = controller("ab\n", FlowSelection::caret(2));
        assert_eq!(
            handle_key(&mut editor, &NoLayout, Key::ArrowRight, false),
            KeyOutcome::Handled
        );
        let mut editor = controller("ab\n", FlowSelection::caret(1));
        assert_eq!(
            handle_key(&mut editor, &NoLayout, Key::ArrowRight, false),
            KeyOutcome::Native
        );
    }

    #[test]
    fn test_backspace_outdents_list_item() {
        let mut editor = controller("ab\n", FlowSelection::caret(0));
        assert!(editor.increment_list_level());
        assert_eq!(
            handle_key(&mut editor, &NoLayout, Key::Backspace, false),
            KeyOutcome::Handled
        );
        assert_eq!(editor.get_paragraph_style().list_level(), 0);
        assert_eq!(editor.state().content().text(), "ab\n");
    }

    #[test]
    fn test_tab_moves_between_cells() {
        let mut editor = controller("", FlowSelection::caret(0));
        assert!(editor.insert_table(2, 2));

        assert_eq!(handle_key(&mut editor, &NoLayout, Key::Tab, false), KeyOutcome::Handled);
        assert_eq!(
            editor.state().selection(),
            &FlowSelection::TableCell {
                position: 0,
                cell: CellPosition::new(0, 1),
                inner: Box::new(FlowSelection::caret(0)),
            }
        );

        assert_eq!(handle_key(&mut editor, &NoLayout, Key::Tab, true), KeyOutcome::Handled);
        assert_eq!(
            editor.state().selection(),
            &FlowSelection::TableCell {
                position: 0,
                cell: CellPosition::new(0, 0),
                inner: Box::new(FlowSelection::caret(0)),
            }
        );
    }

    #[test]
    fn test_vertical_moves_only_a_caret() {
        let mut editor = controller("ab\ncd", FlowSelection::range(1, 4));
        assert_eq!(handle_key(&mut editor, &Lines, Key::ArrowUp, false), KeyOutcome::Native);
        assert_eq!(editor.state().selection(), &FlowSelection::range(1, 4));

        let mut editor = controller("ab\ncd", FlowSelection::caret(4));
        assert_eq!(handle_key(&mut editor, &Lines, Key::ArrowUp, true), KeyOutcome::Native);
        assert_eq!(handle_key(&mut editor, &Lines, Key::ArrowUp, false), KeyOutcome::Handled);
        assert_eq!(editor.state().selection(), &FlowSelection::caret(0));
    }

    #[test]
    fn test_plain_keys_are_native() {
        let mut editor = controller("ab", FlowSelection::caret(1));
        assert_eq!(handle_key(&mut editor, &NoLayout, Key::Tab, false), KeyOutcome::Native);
        assert_eq!(
            handle_key(&mut editor, &NoLayout, Key::ArrowUp, false),
            KeyOutcome::Native
        );
    }
}
