//! # Flow Tables
//!
//! A table is a grid of cells. Cells are keyed by the position of their top
//! left corner (`R1C1` style when serialized); a merged cell spans several
//! rows and/or columns and the positions it covers have no entry of their
//! own.

use crate::content::FlowContent;
use crate::errors::FlowError;
use crate::style::TableStyle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CellPosition {
    pub row: u32,
    pub column: u32,
}

impl CellPosition {
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for CellPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}C{}", self.row + 1, self.column + 1)
    }
}

impl FromStr for CellPosition {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FlowError::InvalidCellPosition(s.to_string());
        let rest = s.strip_prefix('R').ok_or_else(invalid)?;
        let (row, column) = rest.split_once('C').ok_or_else(invalid)?;
        let row: u32 = row.parse().map_err(|_| invalid())?;
        let column: u32 = column.parse().map_err(|_| invalid())?;
        if row == 0 || column == 0 {
            return Err(invalid());
        }
        Ok(Self::new(row - 1, column - 1))
    }
}

impl From<CellPosition> for String {
    fn from(position: CellPosition) -> Self {
        position.to_string()
    }
}

impl TryFrom<String> for CellPosition {
    type Error = FlowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Rectangular cell range; direction carries meaning like `FlowRange`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRange {
    pub anchor: CellPosition,
    pub focus: CellPosition,
}

impl CellRange {
    pub fn new(anchor: CellPosition, focus: CellPosition) -> Self {
        Self { anchor, focus }
    }

    /// Top left corner
    pub fn first(&self) -> CellPosition {
        CellPosition::new(
            self.anchor.row.min(self.focus.row),
            self.anchor.column.min(self.focus.column),
        )
    }

    /// Bottom right corner
    pub fn last(&self) -> CellPosition {
        CellPosition::new(
            self.anchor.row.max(self.focus.row),
            self.anchor.column.max(self.focus.column),
        )
    }

    pub fn contains(&self, cell: CellPosition) -> bool {
        let (first, last) = (self.first(), self.last());
        (first.row..=last.row).contains(&cell.row)
            && (first.column..=last.column).contains(&cell.column)
    }

    /// Row-major iteration over every position in the range
    pub fn positions(&self) -> impl Iterator<Item = CellPosition> {
        let (first, last) = (self.first(), self.last());
        (first.row..=last.row)
            .flat_map(move |row| (first.column..=last.column).map(move |column| CellPosition::new(row, column)))
    }
}

fn is_one(value: &u32) -> bool {
    *value == 1
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub content: FlowContent,
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub colspan: u32,
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub rowspan: u32,
}

impl TableCell {
    pub fn new(content: FlowContent) -> Self {
        Self {
            content,
            colspan: 1,
            rowspan: 1,
        }
    }

    fn covers(&self, origin: CellPosition, cell: CellPosition) -> bool {
        cell.row >= origin.row
            && cell.row < origin.row + self.rowspan
            && cell.column >= origin.column
            && cell.column < origin.column + self.colspan
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowTable {
    columns: u32,
    rows: u32,
    cells: BTreeMap<CellPosition, TableCell>,
    #[serde(default, skip_serializing_if = "TableStyle::is_empty")]
    pub style: TableStyle,
}

/// Grid dimension a structural edit works along
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableAxis {
    Row,
    Column,
}

impl TableAxis {
    fn coordinate(self, cell: CellPosition) -> u32 {
        match self {
            TableAxis::Row => cell.row,
            TableAxis::Column => cell.column,
        }
    }

    fn with_coordinate(self, cell: CellPosition, value: u32) -> CellPosition {
        match self {
            TableAxis::Row => CellPosition::new(value, cell.column),
            TableAxis::Column => CellPosition::new(cell.row, value),
        }
    }

    fn span(self, cell: &TableCell) -> u32 {
        match self {
            TableAxis::Row => cell.rowspan,
            TableAxis::Column => cell.colspan,
        }
    }

    fn set_span(self, cell: &mut TableCell, value: u32) {
        match self {
            TableAxis::Row => cell.rowspan = value,
            TableAxis::Column => cell.colspan = value,
        }
    }
}

impl FlowTable {
    /// Grid of `columns` x `rows` cells, each holding a copy of `content`
    pub fn new(columns: u32, rows: u32, content: &FlowContent) -> Self {
        let mut cells = BTreeMap::new();
        for row in 0..rows {
            for column in 0..columns {
                cells.insert(CellPosition::new(row, column), TableCell::new(content.clone()));
            }
        }
        Self {
            columns,
            rows,
            cells,
            style: TableStyle::default(),
        }
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cells(&self) -> &BTreeMap<CellPosition, TableCell> {
        &self.cells
    }

    pub fn cell(&self, position: CellPosition) -> Option<&TableCell> {
        self.cells.get(&position)
    }

    /// Position of the cell whose area covers `position`
    pub fn origin_of(&self, position: CellPosition) -> Option<CellPosition> {
        if self.cells.contains_key(&position) {
            return Some(position);
        }
        self.cells
            .iter()
            .find(|(origin, cell)| cell.covers(**origin, position))
            .map(|(origin, _)| *origin)
    }

    pub fn with_cell_content(&self, position: CellPosition, content: FlowContent) -> Option<FlowTable> {
        let mut table = self.clone();
        table.cells.get_mut(&position)?.content = content;
        Some(table)
    }

    pub fn with_style(&self, style: TableStyle) -> FlowTable {
        let mut table = self.clone();
        table.style = style;
        table
    }

    /// Insert `count` empty rows or columns before `index`. Merged cells that
    /// straddle `index` grow to cover the new lines.
    pub fn insert_lines(
        &self,
        axis: TableAxis,
        index: u32,
        count: u32,
        empty: &FlowContent,
    ) -> Option<FlowTable> {
        if count == 0 || index > self.extent(axis) {
            return None;
        }
        let mut cells = BTreeMap::new();
        for (origin, cell) in &self.cells {
            let mut cell = cell.clone();
            let start = axis.coordinate(*origin);
            let origin = if start >= index {
                axis.with_coordinate(*origin, start + count)
            } else {
                if start + axis.span(&cell) > index {
                    let span = axis.span(&cell);
                    axis.set_span(&mut cell, span + count);
                }
                *origin
            };
            cells.insert(origin, cell);
        }
        let mut table = self.clone();
        table.cells = cells;
        table.set_extent(axis, self.extent(axis) + count);
        table.fill_uncovered(empty);
        Some(table)
    }

    /// Remove `count` rows or columns starting at `index`. Merged cells
    /// shrink; removing every line is not allowed.
    pub fn remove_lines(
        &self,
        axis: TableAxis,
        index: u32,
        count: u32,
        empty: &FlowContent,
    ) -> Option<FlowTable> {
        let extent = self.extent(axis);
        if count == 0 || index + count > extent || count >= extent {
            return None;
        }
        let end = index + count;
        let mut cells = BTreeMap::new();
        for (origin, cell) in &self.cells {
            let mut cell = cell.clone();
            let start = axis.coordinate(*origin);
            let stop = start + axis.span(&cell);
            if start >= end {
                cells.insert(axis.with_coordinate(*origin, start - count), cell);
            } else if stop <= index {
                cells.insert(*origin, cell);
            } else {
                let removed = stop.min(end) - start.max(index);
                let remaining = axis.span(&cell) - removed;
                if remaining == 0 {
                    continue;
                }
                axis.set_span(&mut cell, remaining);
                cells.insert(axis.with_coordinate(*origin, start.min(index)), cell);
            }
        }
        let mut table = self.clone();
        table.cells = cells;
        table.set_extent(axis, extent - count);
        table.fill_uncovered(empty);
        Some(table)
    }

    /// Merge every cell in `range` into its top left cell. Fails when a
    /// merged cell crosses the range border.
    pub fn merge_cells(&self, range: CellRange) -> Option<FlowTable> {
        let (first, last) = (range.first(), range.last());
        if last.row >= self.rows || last.column >= self.columns || first == last {
            return None;
        }
        let mut content = FlowContent::empty();
        for (origin, cell) in &self.cells {
            let intersects = range.positions().any(|p| cell.covers(*origin, p));
            if !intersects {
                continue;
            }
            let far = CellPosition::new(origin.row + cell.rowspan - 1, origin.column + cell.colspan - 1);
            if !range.contains(*origin) || !range.contains(far) {
                return None;
            }
            content = content.concat(&cell.content);
        }
        let mut table = self.clone();
        table.cells.retain(|origin, _| !range.contains(*origin));
        table.cells.insert(
            first,
            TableCell {
                content,
                colspan: last.column - first.column + 1,
                rowspan: last.row - first.row + 1,
            },
        );
        Some(table)
    }

    /// Undo a merge; covered positions get fresh empty cells
    pub fn split_cell(&self, position: CellPosition, empty: &FlowContent) -> Option<FlowTable> {
        let cell = self.cells.get(&position)?;
        if cell.colspan == 1 && cell.rowspan == 1 {
            return None;
        }
        let mut table = self.clone();
        if let Some(cell) = table.cells.get_mut(&position) {
            cell.colspan = 1;
            cell.rowspan = 1;
        }
        table.fill_uncovered(empty);
        Some(table)
    }

    pub(crate) fn complete_upload(
        &self,
        id: &str,
        url: &str,
        supplementary: &BTreeMap<String, String>,
    ) -> Option<FlowTable> {
        let mut changed = false;
        let mut table = self.clone();
        for cell in table.cells.values_mut() {
            if let Some(content) = cell.content.complete_upload(id, url, supplementary) {
                cell.content = content;
                changed = true;
            }
        }
        changed.then_some(table)
    }

    fn extent(&self, axis: TableAxis) -> u32 {
        match axis {
            TableAxis::Row => self.rows,
            TableAxis::Column => self.columns,
        }
    }

    fn set_extent(&mut self, axis: TableAxis, value: u32) {
        match axis {
            TableAxis::Row => self.rows = value,
            TableAxis::Column => self.columns = value,
        }
    }

    fn fill_uncovered(&mut self, empty: &FlowContent) {
        for row in 0..self.rows {
            for column in 0..self.columns {
                let position = CellPosition::new(row, column);
                if self.origin_of(position).is_none() {
                    self.cells.insert(position, TableCell::new(empty.clone()));
                }
            }
        }
    }
}
