//! Cell coordinates
//!
//! Rows and columns are 1-based, matching spreadsheet automation APIs.
//! A1 strings are produced only at the edge (bridge protocol, saved file).

use std::fmt;

use serde::{Serialize, Serializer};

/// One cell address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cell {
    pub row: u32,
    pub col: u32,
}

impl Cell {
    #[inline(always)]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Same row, `n` columns to the right
    #[inline]
    pub const fn right(self, n: u32) -> Self {
        Self::new(self.row, self.col + n)
    }

    /// A1-style address
    pub fn to_a1(self) -> String {
        format!("{}{}", column_letters(self.col), self.row)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row)
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Rectangular block of cells, inclusive on both corners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub start: Cell,
    pub end: Cell,
}

impl CellRange {
    /// Range spanning two corners in any order
    pub fn new(a: Cell, b: Cell) -> Self {
        Self {
            start: Cell::new(a.row.min(b.row), a.col.min(b.col)),
            end: Cell::new(a.row.max(b.row), a.col.max(b.col)),
        }
    }

    /// Single-cell range
    #[inline]
    pub fn cell(cell: Cell) -> Self {
        Self {
            start: cell,
            end: cell,
        }
    }

    /// Cells `first..=last` of one row
    #[inline]
    pub fn row_span(row: u32, first_col: u32, last_col: u32) -> Self {
        Self::new(Cell::new(row, first_col), Cell::new(row, last_col))
    }

    /// Rows `first..=last` of one column
    #[inline]
    pub fn col_span(col: u32, first_row: u32, last_row: u32) -> Self {
        Self::new(Cell::new(first_row, col), Cell::new(last_row, col))
    }

    /// Every cell in row-major order
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (self.start.row..=self.end.row)
            .flat_map(move |row| (self.start.col..=self.end.col).map(move |col| Cell::new(row, col)))
    }

    pub fn to_a1(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

impl Serialize for CellRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Column number to letters: 1 -> A, 27 -> AA
pub fn column_letters(mut col: u32) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = ((col - 1) % 26) as u8;
        letters.push(b'A' + rem);
        col = (col - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}
