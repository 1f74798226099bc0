//! # Undo/Redo Stack
//!
//! Persistent stack of inverse operations. Entry 0 is the top: applied to the
//! current content it reverses the most recent local edit.
//!
//! ## Design
//!
//! - Pushing never mutates; every change returns a new stack
//! - Typing merges into the top entry via `merge_next`, so a burst of
//!   keystrokes is undone in one step
//! - The stack is capped at [`MAX_UNDO_LENGTH`]; the oldest entries drop
//! - Remote edits rebase every entry, dropping the ones that became
//!   meaningless

use scribing_flow::{FlowOperation, TieBreak};
use serde::{Deserialize, Serialize};

/// Maximum number of undo levels kept
pub const MAX_UNDO_LENGTH: usize = 200;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UndoStack {
    entries: Vec<FlowOperation>,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry that would be applied by the next undo/redo
    pub fn top(&self) -> Option<&FlowOperation> {
        self.entries.first()
    }

    /// Entries from the top down
    pub fn iter(&self) -> impl Iterator<Item = &FlowOperation> {
        self.entries.iter()
    }

    /// Push an inverse. Non-invertible edits (`None`) leave the stack as is.
    /// With `merge` set, the entry is coalesced into the top when possible.
    pub fn push(&self, entry: Option<FlowOperation>, merge: bool) -> UndoStack {
        let Some(entry) = entry else {
            return self.clone();
        };

        let mut entries = self.entries.clone();
        let merged = if merge {
            entries.first().and_then(|top| entry.merge_next(top))
        } else {
            None
        };

        match merged {
            Some(merged) => entries[0] = merged,
            None => {
                entries.insert(0, entry);
                entries.truncate(MAX_UNDO_LENGTH);
            }
        }

        UndoStack { entries }
    }

    /// Split off the top entry
    pub fn pop(&self) -> Option<(FlowOperation, UndoStack)> {
        let (top, rest) = self.entries.split_first()?;
        Some((
            top.clone(),
            UndoStack {
                entries: rest.to_vec(),
            },
        ))
    }

    /// Rebase every entry over a remote operation applied to the current
    /// content. Each entry applies after the ones above it, so the remote
    /// operation is carried down the stack as it goes.
    pub fn rebase(&self, remote: &FlowOperation) -> UndoStack {
        let mut carried = Some(remote.clone());
        let mut entries = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            let Some(current) = carried.as_ref() else {
                entries.push(entry.clone());
                continue;
            };
            let rebased = current.transform(entry);
            let next = entry.transform_with(current, TieBreak::OtherFirst);
            if let Some(rebased) = rebased {
                entries.push(rebased);
            }
            carried = next;
        }

        UndoStack { entries }
    }

    pub fn clear(&self) -> UndoStack {
        UndoStack::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribing_flow::{FlowContent, FlowRange};

    fn remove(start: usize, end: usize) -> Option<FlowOperation> {
        Some(FlowOperation::remove(FlowRange::new(start, end)))
    }

    #[test]
    fn test_undo_stack_creation() {
        let stack = UndoStack::new();
        assert_eq!(stack.len(), 0);
        assert!(stack.top().is_none());
        assert!(stack.pop().is_none());
    }

    #[test]
    fn test_push_and_pop_order() {
        let stack = UndoStack::new().push(remove(0, 1), false).push(remove(4, 5), false);
        assert_eq!(stack.len(), 2);
        let (top, rest) = stack.pop().unwrap();
        assert_eq!(Some(top), remove(4, 5));
        assert_eq!(rest.top().cloned(), remove(0, 1));
        // Persistent: original untouched
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn test_non_invertible_entry_is_skipped() {
        let stack = UndoStack::new().push(None, false);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_merge_collapses_typing() {
        // Inverses of typing "a" at 5 then "b" at 6
        let stack = UndoStack::new().push(remove(5, 6), true).push(remove(6, 7), true);
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.top().cloned(), remove(5, 7));
    }

    #[test]
    fn test_max_levels_enforced() {
        let mut stack = UndoStack::new();
        for i in 0..MAX_UNDO_LENGTH + 5 {
            stack = stack.push(remove(i, i + 1), false);
        }
        assert_eq!(stack.len(), MAX_UNDO_LENGTH);
        // Newest on top, oldest evicted
        assert_eq!(stack.top().cloned(), remove(MAX_UNDO_LENGTH + 4, MAX_UNDO_LENGTH + 5));
        assert_eq!(stack.iter().last().cloned(), remove(5, 6));
    }

    #[test]
    fn test_rebase_shifts_and_drops_entries() {
        let stack = UndoStack::new()
            .push(remove(2, 4), false)
            .push(remove(6, 8), false);
        let remote = FlowOperation::insert(0, FlowContent::from_text("xx"));
        let rebased = stack.rebase(&remote);
        let entries: Vec<_> = rebased.iter().cloned().collect();
        assert_eq!(entries, vec![remove(8, 10).unwrap(), remove(4, 6).unwrap()]);

        let wipe = FlowOperation::remove(FlowRange::new(0, 10));
        assert!(stack.rebase(&wipe).is_empty());
    }
}
