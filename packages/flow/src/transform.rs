//! # Operational Transformation
//!
//! `a.transform(b)` answers: "`a` has been applied, how does `b` have to look
//! to still mean the same thing?". `None` means `b` became meaningless (its
//! target was removed or replaced).
//!
//! ## Concurrency policy
//!
//! Two concurrent operations are ordered by a [`TieBreak`]:
//!
//! - `SelfFirst`: `self` is considered to have happened first. A concurrent
//!   insert at the same position lands after `self`'s insert, and on a
//!   formatting conflict `other` wins (it applies last).
//! - `OtherFirst`: the mirror image. `other` lands before `self`'s insert and
//!   loses formatting conflicts to `self`.
//!
//! For concurrent `a` and `b`, applying `a` then `a.transform(b)` yields the
//! same content as applying `b` then `b.transform_with(a, OtherFirst)`.
//!
//! Known limitation: paragraph formatting conflicts are detected on ranges,
//! not on the paragraphs they touch.

use crate::operation::FlowOperation;
use crate::range::FlowRange;
use crate::selection::FlowSelection;
use crate::table::{CellPosition, CellRange, TableAxis};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TieBreak {
    SelfFirst,
    OtherFirst,
}

impl TieBreak {
    pub fn flip(self) -> Self {
        match self {
            TieBreak::SelfFirst => TieBreak::OtherFirst,
            TieBreak::OtherFirst => TieBreak::SelfFirst,
        }
    }
}

/// Grid change made by a structural table edit
#[derive(Debug, Clone, Copy)]
enum GridEdit {
    Insert(TableAxis, u32, u32),
    Remove(TableAxis, u32, u32),
    Merge(CellRange),
    Split,
}

impl GridEdit {
    fn of(operation: &FlowOperation) -> Option<(usize, GridEdit)> {
        match operation {
            FlowOperation::InsertTableRow {
                position,
                index,
                count,
            } => Some((*position, GridEdit::Insert(TableAxis::Row, *index, *count))),
            FlowOperation::InsertTableColumn {
                position,
                index,
                count,
            } => Some((*position, GridEdit::Insert(TableAxis::Column, *index, *count))),
            FlowOperation::RemoveTableRow {
                position,
                index,
                count,
            } => Some((*position, GridEdit::Remove(TableAxis::Row, *index, *count))),
            FlowOperation::RemoveTableColumn {
                position,
                index,
                count,
            } => Some((*position, GridEdit::Remove(TableAxis::Column, *index, *count))),
            FlowOperation::MergeTableCells { position, range } => {
                Some((*position, GridEdit::Merge(*range)))
            }
            FlowOperation::SplitTableCell { position, .. } => Some((*position, GridEdit::Split)),
            _ => None,
        }
    }

    /// Where a cell ends up after the edit; `None` when it is gone
    fn map_cell(self, cell: CellPosition) -> Option<CellPosition> {
        match self {
            GridEdit::Insert(axis, index, count) => {
                let value = coordinate(axis, cell);
                Some(if value >= index {
                    with_coordinate(axis, cell, value + count)
                } else {
                    cell
                })
            }
            GridEdit::Remove(axis, index, count) => {
                let value = coordinate(axis, cell);
                if value >= index + count {
                    Some(with_coordinate(axis, cell, value - count))
                } else if value >= index {
                    None
                } else {
                    Some(cell)
                }
            }
            GridEdit::Merge(range) => {
                if range.contains(cell) && cell != range.first() {
                    None
                } else {
                    Some(cell)
                }
            }
            GridEdit::Split => Some(cell),
        }
    }
}

fn coordinate(axis: TableAxis, cell: CellPosition) -> u32 {
    match axis {
        TableAxis::Row => cell.row,
        TableAxis::Column => cell.column,
    }
}

fn with_coordinate(axis: TableAxis, cell: CellPosition, value: u32) -> CellPosition {
    match axis {
        TableAxis::Row => CellPosition::new(value, cell.column),
        TableAxis::Column => CellPosition::new(cell.row, value),
    }
}

/// Which nested content an edit reaches into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NestedTarget {
    Box(usize),
    Cell(usize, CellPosition),
    Button(usize),
}

impl NestedTarget {
    fn of(operation: &FlowOperation) -> Option<(NestedTarget, &FlowOperation)> {
        match operation {
            FlowOperation::EditBox { position, inner } => Some((NestedTarget::Box(*position), inner)),
            FlowOperation::EditTableCell {
                position,
                cell,
                inner,
            } => Some((NestedTarget::Cell(*position, *cell), inner)),
            FlowOperation::EditButton { position, inner } => {
                Some((NestedTarget::Button(*position), inner))
            }
            _ => None,
        }
    }

    fn wrap(self, inner: FlowOperation) -> FlowOperation {
        match self {
            NestedTarget::Box(position) => FlowOperation::EditBox {
                position,
                inner: Box::new(inner),
            },
            NestedTarget::Cell(position, cell) => FlowOperation::EditTableCell {
                position,
                cell,
                inner: Box::new(inner),
            },
            NestedTarget::Button(position) => FlowOperation::EditButton {
                position,
                inner: Box::new(inner),
            },
        }
    }
}

impl FlowOperation {
    /// Rebase `other` over `self`, with `self` first on ties
    pub fn transform(&self, other: &FlowOperation) -> Option<FlowOperation> {
        self.transform_with(other, TieBreak::SelfFirst)
    }

    pub fn transform_with(&self, other: &FlowOperation, tie: TieBreak) -> Option<FlowOperation> {
        if let FlowOperation::Batch { operations } = self {
            let mut current = other.clone();
            for operation in operations {
                current = operation.transform_with(&current, tie)?;
            }
            return Some(current);
        }

        if let FlowOperation::Batch { operations } = other {
            let mut me = Some(self.clone());
            let mut rebased = Vec::with_capacity(operations.len());
            for operation in operations {
                match &me {
                    Some(current) => {
                        if let Some(next) = current.transform_with(operation, tie) {
                            rebased.push(next);
                        }
                        me = operation.transform_with(current, tie.flip());
                    }
                    None => rebased.push(operation.clone()),
                }
            }
            return FlowOperation::batch(rebased);
        }

        match self {
            FlowOperation::InsertContent { position, content } => {
                Some(other.after_insert(*position, content.size(), tie))
            }
            FlowOperation::RemoveRange { range } => other.after_remove(range.normalized()),
            FlowOperation::FormatText { range, style }
            | FlowOperation::UnformatText { range, style } => match other {
                FlowOperation::FormatText {
                    range: theirs,
                    style: their_style,
                } if tie == TieBreak::OtherFirst && style.shares_keys_with(their_style) => {
                    split_conflict(*range, *theirs, |piece, overlap| {
                        let style = if overlap {
                            their_style.unmerge(style)
                        } else {
                            their_style.clone()
                        };
                        (!style.is_empty()).then_some(FlowOperation::FormatText { range: piece, style })
                    })
                }
                FlowOperation::UnformatText {
                    range: theirs,
                    style: their_style,
                } if tie == TieBreak::OtherFirst && style.shares_keys_with(their_style) => {
                    split_conflict(*range, *theirs, |piece, overlap| {
                        let style = if overlap {
                            their_style.unmerge(style)
                        } else {
                            their_style.clone()
                        };
                        (!style.is_empty()).then_some(FlowOperation::UnformatText { range: piece, style })
                    })
                }
                _ => Some(other.clone()),
            },
            FlowOperation::FormatParagraph { range, style }
            | FlowOperation::UnformatParagraph { range, style } => match other {
                FlowOperation::FormatParagraph {
                    range: theirs,
                    style: their_style,
                } if tie == TieBreak::OtherFirst && style.shares_keys_with(their_style) => {
                    split_conflict(*range, *theirs, |piece, overlap| {
                        let style = if overlap {
                            their_style.unmerge(style)
                        } else {
                            their_style.clone()
                        };
                        (!style.is_empty())
                            .then_some(FlowOperation::FormatParagraph { range: piece, style })
                    })
                }
                FlowOperation::UnformatParagraph {
                    range: theirs,
                    style: their_style,
                } if tie == TieBreak::OtherFirst && style.shares_keys_with(their_style) => {
                    split_conflict(*range, *theirs, |piece, overlap| {
                        let style = if overlap {
                            their_style.unmerge(style)
                        } else {
                            their_style.clone()
                        };
                        (!style.is_empty())
                            .then_some(FlowOperation::UnformatParagraph { range: piece, style })
                    })
                }
                _ => Some(other.clone()),
            },
            FlowOperation::FormatBox { position, style }
            | FlowOperation::UnformatBox { position, style } => match other {
                FlowOperation::FormatBox {
                    position: theirs,
                    style: their_style,
                } if tie == TieBreak::OtherFirst && theirs == position => {
                    let style = their_style.unmerge(style);
                    (!style.is_empty()).then(|| FlowOperation::FormatBox {
                        position: *theirs,
                        style,
                    })
                }
                FlowOperation::UnformatBox {
                    position: theirs,
                    style: their_style,
                } if tie == TieBreak::OtherFirst && theirs == position => {
                    let style = their_style.unmerge(style);
                    (!style.is_empty()).then(|| FlowOperation::UnformatBox {
                        position: *theirs,
                        style,
                    })
                }
                _ => Some(other.clone()),
            },
            FlowOperation::FormatTable { position, style }
            | FlowOperation::UnformatTable { position, style } => match other {
                FlowOperation::FormatTable {
                    position: theirs,
                    style: their_style,
                } if tie == TieBreak::OtherFirst && theirs == position => {
                    let style = their_style.unmerge(style);
                    (!style.is_empty()).then(|| FlowOperation::FormatTable {
                        position: *theirs,
                        style,
                    })
                }
                FlowOperation::UnformatTable {
                    position: theirs,
                    style: their_style,
                } if tie == TieBreak::OtherFirst && theirs == position => {
                    let style = their_style.unmerge(style);
                    (!style.is_empty()).then(|| FlowOperation::UnformatTable {
                        position: *theirs,
                        style,
                    })
                }
                _ => Some(other.clone()),
            },
            FlowOperation::ReplaceNode { position, .. } => other.after_replace(*position, tie),
            FlowOperation::CompleteUpload { .. } => Some(other.clone()),
            FlowOperation::InsertTableRow { .. }
            | FlowOperation::InsertTableColumn { .. }
            | FlowOperation::RemoveTableRow { .. }
            | FlowOperation::RemoveTableColumn { .. }
            | FlowOperation::MergeTableCells { .. }
            | FlowOperation::SplitTableCell { .. } => match GridEdit::of(self) {
                Some((position, edit)) => other.after_grid_edit(position, edit),
                None => Some(other.clone()),
            },
            FlowOperation::EditBox { .. }
            | FlowOperation::EditTableCell { .. }
            | FlowOperation::EditButton { .. } => match NestedTarget::of(self) {
                Some((target, inner)) => match NestedTarget::of(other) {
                    Some((their_target, their_inner)) if their_target == target => inner
                        .transform_with(their_inner, tie)
                        .map(|rebased| target.wrap(rebased)),
                    _ => Some(other.clone()),
                },
                None => Some(other.clone()),
            },
            FlowOperation::Batch { .. } => Some(other.clone()),
        }
    }

    /// Rebase over an insert of `size` positions at `at`
    fn after_insert(&self, at: usize, size: usize, tie: TieBreak) -> FlowOperation {
        let shift = |position: usize| {
            if position >= at {
                position + size
            } else {
                position
            }
        };
        match self {
            FlowOperation::InsertContent { position, content } => {
                let position = if *position > at || (*position == at && tie == TieBreak::SelfFirst) {
                    position + size
                } else {
                    *position
                };
                FlowOperation::InsertContent {
                    position,
                    content: content.clone(),
                }
            }
            FlowOperation::RemoveRange { range } => {
                split_around(*range, at, size, |range| FlowOperation::RemoveRange { range })
            }
            FlowOperation::FormatText { range, style } => split_around(*range, at, size, |range| {
                FlowOperation::FormatText {
                    range,
                    style: style.clone(),
                }
            }),
            FlowOperation::UnformatText { range, style } => split_around(*range, at, size, |range| {
                FlowOperation::UnformatText {
                    range,
                    style: style.clone(),
                }
            }),
            FlowOperation::FormatParagraph { range, style } => {
                split_around(*range, at, size, |range| FlowOperation::FormatParagraph {
                    range,
                    style: style.clone(),
                })
            }
            FlowOperation::UnformatParagraph { range, style } => {
                split_around(*range, at, size, |range| FlowOperation::UnformatParagraph {
                    range,
                    style: style.clone(),
                })
            }
            FlowOperation::Batch { .. } | FlowOperation::CompleteUpload { .. } => self.clone(),
            _ => match self.node_position() {
                Some(position) => self.at_position(shift(position)),
                None => self.clone(),
            },
        }
    }

    /// Rebase over the removal of a normalized range
    fn after_remove(&self, removed: FlowRange) -> Option<FlowOperation> {
        let (start, end) = (removed.first(), removed.last());
        let map = |position: usize| {
            if position <= start {
                position
            } else if position >= end {
                position - (end - start)
            } else {
                start
            }
        };
        let shrink = |range: &FlowRange| {
            let mapped = range.map(map);
            (!mapped.is_collapsed()).then_some(mapped)
        };
        match self {
            FlowOperation::InsertContent { position, content } => Some(FlowOperation::InsertContent {
                position: map(*position),
                content: content.clone(),
            }),
            FlowOperation::RemoveRange { range } => {
                shrink(range).map(|range| FlowOperation::RemoveRange { range })
            }
            FlowOperation::FormatText { range, style } => {
                shrink(range).map(|range| FlowOperation::FormatText {
                    range,
                    style: style.clone(),
                })
            }
            FlowOperation::UnformatText { range, style } => {
                shrink(range).map(|range| FlowOperation::UnformatText {
                    range,
                    style: style.clone(),
                })
            }
            FlowOperation::FormatParagraph { range, style } => {
                let mapped = if range.is_collapsed() {
                    Some(range.map(map))
                } else {
                    shrink(range)
                };
                mapped.map(|range| FlowOperation::FormatParagraph {
                    range,
                    style: style.clone(),
                })
            }
            FlowOperation::UnformatParagraph { range, style } => {
                let mapped = if range.is_collapsed() {
                    Some(range.map(map))
                } else {
                    shrink(range)
                };
                mapped.map(|range| FlowOperation::UnformatParagraph {
                    range,
                    style: style.clone(),
                })
            }
            FlowOperation::Batch { .. } | FlowOperation::CompleteUpload { .. } => Some(self.clone()),
            _ => match self.node_position() {
                Some(position) if removed.contains(position) => None,
                Some(position) => Some(self.at_position(map(position))),
                None => Some(self.clone()),
            },
        }
    }

    /// Rebase over a node replaced at `at`
    fn after_replace(&self, at: usize, tie: TieBreak) -> Option<FlowOperation> {
        match self {
            FlowOperation::ReplaceNode { position, .. } if *position == at => match tie {
                TieBreak::SelfFirst => Some(self.clone()),
                TieBreak::OtherFirst => None,
            },
            _ if self.node_position() == Some(at) => None,
            _ => Some(self.clone()),
        }
    }

    /// Rebase over a structural edit of the table at `at`
    fn after_grid_edit(&self, at: usize, edit: GridEdit) -> Option<FlowOperation> {
        match self {
            FlowOperation::EditTableCell {
                position,
                cell,
                inner,
            } if *position == at => edit.map_cell(*cell).map(|cell| FlowOperation::EditTableCell {
                position: at,
                cell,
                inner: inner.clone(),
            }),
            _ if self.is_table_structure() && self.node_position() == Some(at) => None,
            _ => Some(self.clone()),
        }
    }

    /// Coalesce with the operation applied right after this one
    pub fn merge_next(&self, next: &FlowOperation) -> Option<FlowOperation> {
        match (self, next) {
            (
                FlowOperation::InsertContent {
                    position: first,
                    content: before,
                },
                FlowOperation::InsertContent {
                    position: second,
                    content: after,
                },
            ) => {
                if *second == first + before.size() {
                    Some(FlowOperation::insert(*first, before.concat(after)))
                } else if second == first {
                    Some(FlowOperation::insert(*first, after.concat(before)))
                } else {
                    None
                }
            }
            (FlowOperation::RemoveRange { range: first }, FlowOperation::RemoveRange { range: second }) => {
                let (start, end) = (first.first(), first.last());
                let (next_start, next_end) = (second.first(), second.last());
                if next_end == start {
                    Some(FlowOperation::remove(FlowRange::new(next_start, end)))
                } else if next_start == start {
                    Some(FlowOperation::remove(FlowRange::new(start, end + (next_end - next_start))))
                } else {
                    None
                }
            }
            _ => {
                let (target, inner) = NestedTarget::of(self)?;
                let (next_target, next_inner) = NestedTarget::of(next)?;
                if target != next_target {
                    return None;
                }
                inner.merge_next(next_inner).map(|merged| target.wrap(merged))
            }
        }
    }

    /// Move a selection so it stays over the same content after this
    /// operation. `mine` marks the selection's owner as the author, which
    /// makes a caret at an insert position follow the inserted content.
    pub fn apply_to_selection(&self, selection: &FlowSelection, mine: bool) -> FlowSelection {
        match self {
            FlowOperation::Batch { operations } => operations
                .iter()
                .fold(selection.clone(), |current, operation| {
                    operation.apply_to_selection(&current, mine)
                }),

            FlowOperation::InsertContent { position, content } => {
                let (at, size) = (*position, content.size());
                match selection {
                    FlowSelection::Range(range) => FlowSelection::Range(range.map(|point| {
                        if point > at || (point == at && mine) {
                            point + size
                        } else {
                            point
                        }
                    })),
                    nested => {
                        let container = nested.container_position().unwrap_or_default();
                        if container >= at {
                            nested.with_container_position(container + size)
                        } else {
                            nested.clone()
                        }
                    }
                }
            }

            FlowOperation::RemoveRange { range } => {
                let (start, end) = (range.first(), range.last());
                let map = |point: usize| {
                    if point <= start {
                        point
                    } else if point >= end {
                        point - (end - start)
                    } else {
                        start
                    }
                };
                match selection {
                    FlowSelection::Range(current) => FlowSelection::Range(current.map(map)),
                    nested => {
                        let container = nested.container_position().unwrap_or_default();
                        if range.normalized().contains(container) {
                            FlowSelection::Range(FlowRange::at(start))
                        } else {
                            nested.with_container_position(map(container))
                        }
                    }
                }
            }

            FlowOperation::ReplaceNode { position, .. } => {
                if selection.container_position() == Some(*position) {
                    FlowSelection::Range(FlowRange::at(*position))
                } else {
                    selection.clone()
                }
            }

            FlowOperation::EditBox { .. }
            | FlowOperation::EditTableCell { .. }
            | FlowOperation::EditButton { .. } => {
                let Some((target, inner)) = NestedTarget::of(self) else {
                    return selection.clone();
                };
                match (target, selection) {
                    (
                        NestedTarget::Box(at),
                        FlowSelection::Box {
                            position,
                            inner: nested,
                        },
                    ) if at == *position => FlowSelection::Box {
                        position: *position,
                        inner: Box::new(inner.apply_to_selection(nested, mine)),
                    },
                    (
                        NestedTarget::Cell(at, cell),
                        FlowSelection::TableCell {
                            position,
                            cell: selected,
                            inner: nested,
                        },
                    ) if at == *position && cell == *selected => FlowSelection::TableCell {
                        position: *position,
                        cell: *selected,
                        inner: Box::new(inner.apply_to_selection(nested, mine)),
                    },
                    (
                        NestedTarget::Button(at),
                        FlowSelection::Button {
                            position,
                            inner: nested,
                        },
                    ) if at == *position => FlowSelection::Button {
                        position: *position,
                        inner: Box::new(inner.apply_to_selection(nested, mine)),
                    },
                    _ => selection.clone(),
                }
            }

            _ => {
                let Some((at, edit)) = GridEdit::of(self) else {
                    return selection.clone();
                };
                match selection {
                    FlowSelection::TableCell {
                        position,
                        cell,
                        inner,
                    } if *position == at => match edit.map_cell(*cell) {
                        Some(cell) => FlowSelection::TableCell {
                            position: *position,
                            cell,
                            inner: inner.clone(),
                        },
                        None => FlowSelection::Range(FlowRange::at(at)),
                    },
                    FlowSelection::Table { position, range } if *position == at => {
                        match (edit.map_cell(range.anchor), edit.map_cell(range.focus)) {
                            (Some(anchor), Some(focus)) => FlowSelection::Table {
                                position: *position,
                                range: CellRange::new(anchor, focus),
                            },
                            _ => FlowSelection::Range(FlowRange::at(at)),
                        }
                    }
                    _ => selection.clone(),
                }
            }
        }
    }
}

/// Rebase a range operation over an insert. An insert strictly inside the
/// range splits it; for removals the later piece comes first so the earlier
/// one stays valid.
fn split_around(
    range: FlowRange,
    at: usize,
    size: usize,
    build: impl Fn(FlowRange) -> FlowOperation,
) -> FlowOperation {
    let (first, last) = (range.first(), range.last());
    if at <= first {
        build(range.map(|point| point + size))
    } else if at >= last {
        build(range)
    } else {
        let head = FlowRange::new(first, at);
        let tail = FlowRange::new(at + size, last + size);
        FlowOperation::Batch {
            operations: vec![build(tail), build(head)],
        }
    }
}

/// Cut `theirs` into pieces outside and inside `mine`, building each piece
/// with a flag telling whether it overlaps
fn split_conflict(
    mine: FlowRange,
    theirs: FlowRange,
    build: impl Fn(FlowRange, bool) -> Option<FlowOperation>,
) -> Option<FlowOperation> {
    let (start, end) = (theirs.first(), theirs.last());
    let overlap_start = mine.first().max(start);
    let overlap_end = mine.last().min(end);
    if overlap_start > overlap_end || (overlap_start == overlap_end && start != end) {
        return build(theirs, false);
    }
    let mut pieces = Vec::new();
    if start < overlap_start {
        pieces.push(build(FlowRange::new(start, overlap_start), false));
    }
    pieces.push(build(FlowRange::new(overlap_start, overlap_end), true));
    if overlap_end < end {
        pieces.push(build(FlowRange::new(overlap_end, end), false));
    }
    FlowOperation::batch(pieces.into_iter().flatten())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::FlowContent;
    use crate::style::TextStyle;
    use crate::theme::FlowTheme;

    fn converge(content: &FlowContent, a: &FlowOperation, b: &FlowOperation) -> (FlowContent, FlowContent) {
        let theme = FlowTheme::default();
        let left = match a.transform(b) {
            Some(rebased) => rebased.apply_to(&a.apply_to(content, &theme), &theme),
            None => a.apply_to(content, &theme),
        };
        let right = match b.transform_with(a, TieBreak::OtherFirst) {
            Some(rebased) => rebased.apply_to(&b.apply_to(content, &theme), &theme),
            None => b.apply_to(content, &theme),
        };
        (left, right)
    }

    #[test]
    fn test_concurrent_inserts_at_same_position() {
        let content = FlowContent::from_text("ab");
        let a = FlowOperation::insert(1, FlowContent::from_text("X"));
        let b = FlowOperation::insert(1, FlowContent::from_text("Y"));
        let (left, right) = converge(&content, &a, &b);
        assert_eq!(left.text(), "aXYb");
        assert_eq!(left, right);
    }

    #[test]
    fn test_insert_inside_removed_range_splits_removal() {
        let content = FlowContent::from_text("abcdef");
        let insert = FlowOperation::insert(3, FlowContent::from_text("XY"));
        let remove = FlowOperation::remove(FlowRange::new(1, 5));
        let rebased = insert.transform(&remove).unwrap();
        assert_eq!(
            rebased,
            FlowOperation::Batch {
                operations: vec![
                    FlowOperation::remove(FlowRange::new(5, 7)),
                    FlowOperation::remove(FlowRange::new(1, 3)),
                ]
            }
        );
        let (left, right) = converge(&content, &insert, &remove);
        assert_eq!(left.text(), "aXYf");
        assert_eq!(left, right);
    }

    #[test]
    fn test_overlapping_removals_converge() {
        let content = FlowContent::from_text("abcdefgh");
        let a = FlowOperation::remove(FlowRange::new(1, 5));
        let b = FlowOperation::remove(FlowRange::new(3, 7));
        let (left, right) = converge(&content, &a, &b);
        assert_eq!(left.text(), "ah");
        assert_eq!(left, right);
        // Fully covered removal vanishes
        let inner = FlowOperation::remove(FlowRange::new(2, 4));
        assert!(a.transform(&inner).is_none());
    }

    #[test]
    fn test_formatting_conflict_prefers_first_under_other_first() {
        let content = FlowContent::from_text("abcdef");
        let bold = |value| TextStyle {
            bold: Some(value),
            ..Default::default()
        };
        let a = FlowOperation::FormatText {
            range: FlowRange::new(0, 4),
            style: bold(true),
        };
        let b = FlowOperation::FormatText {
            range: FlowRange::new(2, 6),
            style: TextStyle {
                bold: Some(false),
                italic: Some(true),
                ..Default::default()
            },
        };
        let (left, right) = converge(&content, &a, &b);
        assert_eq!(left, right);
    }

    #[test]
    fn test_merge_next_typing_and_backspace() {
        let typed = FlowOperation::insert(2, FlowContent::from_text("a"))
            .merge_next(&FlowOperation::insert(3, FlowContent::from_text("b")))
            .unwrap();
        assert_eq!(typed, FlowOperation::insert(2, FlowContent::from_text("ab")));

        let backspaced = FlowOperation::remove(FlowRange::new(4, 5))
            .merge_next(&FlowOperation::remove(FlowRange::new(3, 4)))
            .unwrap();
        assert_eq!(backspaced, FlowOperation::remove(FlowRange::new(3, 5)));

        let deleted = FlowOperation::remove(FlowRange::new(3, 4))
            .merge_next(&FlowOperation::remove(FlowRange::new(3, 4)))
            .unwrap();
        assert_eq!(deleted, FlowOperation::remove(FlowRange::new(3, 5)));

        assert!(FlowOperation::insert(0, FlowContent::from_text("a"))
            .merge_next(&FlowOperation::insert(5, FlowContent::from_text("b")))
            .is_none());
    }

    #[test]
    fn test_caret_follows_own_insert_only() {
        let caret = FlowSelection::Range(FlowRange::at(2));
        let insert = FlowOperation::insert(2, FlowContent::from_text("xyz"));
        assert_eq!(
            insert.apply_to_selection(&caret, true),
            FlowSelection::Range(FlowRange::at(5))
        );
        assert_eq!(insert.apply_to_selection(&caret, false), caret);
    }

    #[test]
    fn test_structural_edit_remaps_cell_edit() {
        let edit = FlowOperation::EditTableCell {
            position: 0,
            cell: CellPosition::new(1, 1),
            inner: Box::new(FlowOperation::insert(0, FlowContent::from_text("x"))),
        };
        let insert_row = FlowOperation::InsertTableRow {
            position: 0,
            index: 0,
            count: 1,
        };
        match insert_row.transform(&edit) {
            Some(FlowOperation::EditTableCell { cell, .. }) => assert_eq!(cell, CellPosition::new(2, 1)),
            other => panic!("Expected cell edit, got {:?}", other),
        }
        let remove_row = FlowOperation::RemoveTableRow {
            position: 0,
            index: 1,
            count: 1,
        };
        assert!(remove_row.transform(&edit).is_none());
        assert!(remove_row.transform(&insert_row).is_none());
    }
}
