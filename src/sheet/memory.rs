//! In-process spreadsheet backend
//!
//! Keeps the grid, styles, names and lifecycle counters behind a shared
//! handle so a clone held outside the writer thread can inspect what was
//! written. `save` optionally dumps the grid as JSON.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::sheet::{Cell, CellRange, CellValue, Spreadsheet, Style};
use crate::{FeedError, Result};

/// Value and accumulated style of one cell
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellEntry {
    pub value: CellValue,
    pub style: Style,
}

#[derive(Debug, Default)]
struct MemoryState {
    workbooks: u32,
    cells: BTreeMap<Cell, CellEntry>,
    merges: Vec<CellRange>,
    names: BTreeMap<String, CellRange>,
    widths: BTreeMap<u32, f64>,
    autofits: u32,
    saves: u32,
    quits: u32,
    closed: bool,
    journal: Option<Vec<(Cell, CellValue)>>,
    failing_cells: BTreeSet<Cell>,
    fail_save: bool,
}

impl MemoryState {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(FeedError::Sheet("application already closed".to_string()));
        }
        if self.workbooks == 0 {
            return Err(FeedError::Sheet("no workbook open".to_string()));
        }
        Ok(())
    }
}

/// Saved form of the grid
#[derive(Serialize)]
struct SavedWorkbook<'a> {
    cells: BTreeMap<String, &'a CellValue>,
    names: &'a BTreeMap<String, CellRange>,
    merges: &'a [CellRange],
}

/// Shared-handle in-memory spreadsheet
#[derive(Debug, Clone, Default)]
pub struct MemorySheet {
    state: Arc<Mutex<MemoryState>>,
    save_path: Option<PathBuf>,
}

impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dump the grid to `path` on every save
    pub fn with_save_path(path: impl Into<PathBuf>) -> Self {
        Self {
            save_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Record every value write in order
    pub fn with_journal(self) -> Self {
        self.state.lock().journal = Some(Vec::new());
        self
    }

    /// Make writes to `cell` fail
    pub fn inject_cell_failure(&self, cell: Cell) {
        self.state.lock().failing_cells.insert(cell);
    }

    /// Make `save` fail
    pub fn inject_save_failure(&self) {
        self.state.lock().fail_save = true;
    }

    pub fn value_at(&self, cell: Cell) -> CellValue {
        self.state
            .lock()
            .cells
            .get(&cell)
            .map(|entry| entry.value.clone())
            .unwrap_or_default()
    }

    pub fn style_at(&self, cell: Cell) -> Style {
        self.state
            .lock()
            .cells
            .get(&cell)
            .map(|entry| entry.style)
            .unwrap_or_default()
    }

    /// Copy of every non-empty value
    pub fn values(&self) -> BTreeMap<Cell, CellValue> {
        self.state
            .lock()
            .cells
            .iter()
            .filter(|(_, entry)| !entry.value.is_empty())
            .map(|(cell, entry)| (*cell, entry.value.clone()))
            .collect()
    }

    /// Values written to `cell`, oldest first (journal must be enabled)
    pub fn history(&self, cell: Cell) -> Vec<CellValue> {
        self.state
            .lock()
            .journal
            .as_ref()
            .map(|journal| {
                journal
                    .iter()
                    .filter(|(c, _)| *c == cell)
                    .map(|(_, v)| v.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn named_range(&self, name: &str) -> Option<CellRange> {
        self.state.lock().names.get(name).copied()
    }

    pub fn merges(&self) -> Vec<CellRange> {
        self.state.lock().merges.clone()
    }

    pub fn column_width(&self, col: u32) -> Option<f64> {
        self.state.lock().widths.get(&col).copied()
    }

    pub fn workbook_count(&self) -> u32 {
        self.state.lock().workbooks
    }

    pub fn save_count(&self) -> u32 {
        self.state.lock().saves
    }

    pub fn quit_count(&self) -> u32 {
        self.state.lock().quits
    }

    pub fn autofit_count(&self) -> u32 {
        self.state.lock().autofits
    }

    fn write_file(&self, state: &MemoryState) -> Result<()> {
        let Some(path) = &self.save_path else {
            return Ok(());
        };
        let saved = SavedWorkbook {
            cells: state
                .cells
                .iter()
                .filter(|(_, entry)| !entry.value.is_empty())
                .map(|(cell, entry)| (cell.to_a1(), &entry.value))
                .collect(),
            names: &state.names,
            merges: &state.merges,
        };
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &saved)?;
        Ok(())
    }
}

impl Spreadsheet for MemorySheet {
    fn add_workbook(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(FeedError::Sheet("application already closed".to_string()));
        }
        state.workbooks += 1;
        Ok(())
    }

    fn set_value(&mut self, cell: Cell, value: CellValue) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        if state.failing_cells.contains(&cell) {
            return Err(FeedError::Sheet(format!("write to {cell} rejected")));
        }
        if let Some(journal) = state.journal.as_mut() {
            journal.push((cell, value.clone()));
        }
        state.cells.entry(cell).or_default().value = value;
        Ok(())
    }

    fn value(&mut self, cell: Cell) -> Result<CellValue> {
        let state = self.state.lock();
        state.ensure_open()?;
        Ok(state
            .cells
            .get(&cell)
            .map(|entry| entry.value.clone())
            .unwrap_or_default())
    }

    fn set_style(&mut self, range: CellRange, style: &Style) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        for cell in range.cells() {
            let entry = state.cells.entry(cell).or_default();
            entry.style = entry.style.merged(style);
        }
        Ok(())
    }

    fn merge(&mut self, range: CellRange) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        if !state.merges.contains(&range) {
            state.merges.push(range);
        }
        Ok(())
    }

    fn define_name(&mut self, name: &str, range: CellRange) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.names.insert(name.to_string(), range);
        Ok(())
    }

    fn set_column_width(&mut self, col: u32, width: f64) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.widths.insert(col, width);
        Ok(())
    }

    fn autofit(&mut self, _first_col: u32, _last_col: u32) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.autofits += 1;
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.saves += 1;
        if state.fail_save {
            return Err(FeedError::Sheet("save rejected".to_string()));
        }
        self.write_file(&state)
    }

    fn quit(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.quits += 1;
        state.closed = true;
        Ok(())
    }
}
