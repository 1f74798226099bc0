//! Nested flow descriptors
//!
//! A container node (box, table cell, button) renders its content into its
//! own editing host. The host carries a [`FlowAxis`] telling the selection
//! bridge how to wrap a selection made inside it into the enclosing
//! coordinate space, and how to unwrap one on the way back down.

use scribing_flow::{CellPosition, FlowSelection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowAxis {
    Box { position: usize },
    TableCell { position: usize, cell: CellPosition },
    Button { position: usize },
}

impl FlowAxis {
    /// Position of the container node in the enclosing content
    pub fn position(&self) -> usize {
        match self {
            FlowAxis::Box { position }
            | FlowAxis::TableCell { position, .. }
            | FlowAxis::Button { position } => *position,
        }
    }

    pub fn create_nested_selection(&self, inner: FlowSelection) -> FlowSelection {
        let inner = Box::new(inner);
        match *self {
            FlowAxis::Box { position } => FlowSelection::Box { position, inner },
            FlowAxis::TableCell { position, cell } => FlowSelection::TableCell {
                position,
                cell,
                inner,
            },
            FlowAxis::Button { position } => FlowSelection::Button { position, inner },
        }
    }

    /// The inner selection when `outer` addresses this axis at its top level
    pub fn get_inner_selection<'a>(&self, outer: &'a FlowSelection) -> Option<&'a FlowSelection> {
        match (*self, outer) {
            (FlowAxis::Box { position }, FlowSelection::Box { position: p, inner })
            | (FlowAxis::Button { position }, FlowSelection::Button { position: p, inner })
                if position == *p =>
            {
                Some(inner)
            }
            (
                FlowAxis::TableCell { position, cell },
                FlowSelection::TableCell {
                    position: p,
                    cell: c,
                    inner,
                },
            ) if position == *p && cell == *c => Some(inner),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_then_unwrap() {
        let axis = FlowAxis::TableCell {
            position: 3,
            cell: CellPosition::new(1, 0),
        };
        let nested = axis.create_nested_selection(FlowSelection::caret(2));
        assert_eq!(axis.get_inner_selection(&nested), Some(&FlowSelection::caret(2)));

        let other_cell = FlowAxis::TableCell {
            position: 3,
            cell: CellPosition::new(0, 0),
        };
        assert_eq!(other_cell.get_inner_selection(&nested), None);
        assert_eq!(FlowAxis::Box { position: 3 }.get_inner_selection(&nested), None);
    }
}
