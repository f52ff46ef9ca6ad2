//! In-process [`SpreadsheetsClient`] backed by plain string grids.
//!
//! Reads behave like the hosted backend: trailing empty cells and trailing
//! empty rows are trimmed, and a fully empty region reads as an empty grid.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::client::{
    AppendResult, MajorDimension, RawGrid, ReadOptions, SpreadsheetDetails, SpreadsheetsClient,
    WriteResult,
};
use crate::error::ClientError;
use crate::range::{column_name, SheetRange};

/// Calls received per operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ClientCalls {
    pub details: u64,
    pub reads: u64,
    pub writes: u64,
    pub appends: u64,
}

#[derive(Debug, Default)]
struct Spreadsheet {
    title: String,
    url: String,
    tables: Vec<(String, RawGrid)>,
}

impl Spreadsheet {
    fn table_mut(&mut self, name: &str) -> Option<&mut RawGrid> {
        self.tables
            .iter_mut()
            .find(|(table, _)| table == name)
            .map(|(_, grid)| grid)
    }
}

#[derive(Debug, Default)]
struct State {
    spreadsheets: HashMap<String, Spreadsheet>,
    calls: ClientCalls,
    fail_next: Option<ClientError>,
}

#[derive(Debug, Clone, Default)]
pub struct MemorySpreadsheetsClient {
    state: Arc<Mutex<State>>,
}

impl MemorySpreadsheetsClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or retitle) a spreadsheet with no tables.
    pub fn create_spreadsheet(&self, spreadsheet_id: &str, title: &str) {
        let mut state = self.state.lock().expect("memory client mutex poisoned");
        let sheet = state
            .spreadsheets
            .entry(spreadsheet_id.to_string())
            .or_insert_with(|| Spreadsheet {
                url: format!("memory://spreadsheets/{spreadsheet_id}"),
                ..Spreadsheet::default()
            });
        sheet.title = title.to_string();
    }

    /// Replace the contents of `table`, creating the spreadsheet and table as needed.
    /// Row 0 of `rows` is sheet row 1.
    pub fn put_table(&self, spreadsheet_id: &str, table: &str, rows: RawGrid) {
        let mut state = self.state.lock().expect("memory client mutex poisoned");
        let sheet = state
            .spreadsheets
            .entry(spreadsheet_id.to_string())
            .or_insert_with(|| Spreadsheet {
                title: spreadsheet_id.to_string(),
                url: format!("memory://spreadsheets/{spreadsheet_id}"),
                tables: Vec::new(),
            });
        match sheet.table_mut(table) {
            Some(grid) => *grid = rows,
            None => sheet.tables.push((table.to_string(), rows)),
        }
    }

    /// Snapshot of a table's raw contents.
    pub fn table(&self, spreadsheet_id: &str, table: &str) -> Option<RawGrid> {
        let state = self.state.lock().expect("memory client mutex poisoned");
        state
            .spreadsheets
            .get(spreadsheet_id)?
            .tables
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, grid)| grid.clone())
    }

    pub fn calls(&self) -> ClientCalls {
        self.state.lock().expect("memory client mutex poisoned").calls
    }

    pub fn reset_calls(&self) {
        self.state.lock().expect("memory client mutex poisoned").calls = ClientCalls::default();
    }

    /// Make the next call (of any kind) fail with `err`.
    pub fn fail_next(&self, err: ClientError) {
        self.state.lock().expect("memory client mutex poisoned").fail_next = Some(err);
    }

    fn with_table<T>(
        &self,
        spreadsheet_id: &str,
        range: &SheetRange,
        count: impl FnOnce(&mut ClientCalls),
        f: impl FnOnce(&mut RawGrid) -> T,
    ) -> Result<T, ClientError> {
        let mut state = self.state.lock().expect("memory client mutex poisoned");
        count(&mut state.calls);
        if let Some(err) = state.fail_next.take() {
            return Err(err);
        }
        let sheet = state
            .spreadsheets
            .get_mut(spreadsheet_id)
            .ok_or_else(|| ClientError::SpreadsheetNotFound(spreadsheet_id.to_string()))?;
        let grid = sheet
            .table_mut(&range.table)
            .ok_or_else(|| ClientError::TableNotFound(range.table.clone()))?;
        Ok(f(grid))
    }
}

fn cell(grid: &RawGrid, row: usize, col: usize) -> &str {
    grid.get(row)
        .and_then(|r| r.get(col))
        .map(String::as_str)
        .unwrap_or("")
}

fn last_occupied_row(grid: &RawGrid) -> Option<usize> {
    grid.iter()
        .rposition(|row| row.iter().any(|cell| !cell.is_empty()))
}

fn trim(mut lines: RawGrid) -> RawGrid {
    for line in &mut lines {
        while line.last().is_some_and(|c| c.is_empty()) {
            line.pop();
        }
    }
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines
}

fn write_at(grid: &mut RawGrid, row: usize, col: usize, values: &RawGrid) -> WriteResult {
    let mut result = WriteResult {
        updated_rows: 0,
        updated_columns: 0,
        updated_cells: 0,
    };
    for (i, line) in values.iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        let target_row = row + i;
        if grid.len() <= target_row {
            grid.resize_with(target_row + 1, Vec::new);
        }
        let target = &mut grid[target_row];
        if target.len() < col + line.len() {
            target.resize(col + line.len(), String::new());
        }
        target[col..col + line.len()].clone_from_slice(line);
        result.updated_rows += 1;
        result.updated_columns = result.updated_columns.max(line.len() as i64);
        result.updated_cells += line.len() as i64;
    }
    result
}

fn quote_table(table: &str) -> String {
    if table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        table.to_string()
    } else {
        format!("'{}'", table.replace('\'', "''"))
    }
}

#[async_trait]
impl SpreadsheetsClient for MemorySpreadsheetsClient {
    async fn get_details(&self, spreadsheet_id: &str) -> Result<SpreadsheetDetails, ClientError> {
        let mut state = self.state.lock().expect("memory client mutex poisoned");
        state.calls.details += 1;
        if let Some(err) = state.fail_next.take() {
            return Err(err);
        }
        let sheet = state
            .spreadsheets
            .get(spreadsheet_id)
            .ok_or_else(|| ClientError::SpreadsheetNotFound(spreadsheet_id.to_string()))?;
        Ok(SpreadsheetDetails {
            spreadsheet_id: spreadsheet_id.to_string(),
            title: sheet.title.clone(),
            spreadsheet_url: sheet.url.clone(),
            tables: sheet.tables.iter().map(|(name, _)| name.clone()).collect(),
        })
    }

    async fn get_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        options: ReadOptions,
    ) -> Result<RawGrid, ClientError> {
        let range = SheetRange::parse(range)?;
        let r = range.range;
        self.with_table(
            spreadsheet_id,
            &range,
            |calls| calls.reads += 1,
            |grid| {
                let grid: &RawGrid = grid;
                // Rows past the grid would read as blanks and be trimmed.
                let Some(last_in_grid) = grid.len().checked_sub(1) else {
                    return Vec::new();
                };
                let first_row = r.start_row as usize - 1;
                let last_row = match r.end_row {
                    Some(end) => (end as usize - 1).min(last_in_grid),
                    None => match last_occupied_row(grid) {
                        Some(last) => last,
                        None => return Vec::new(),
                    },
                };
                if last_row < first_row {
                    return Vec::new();
                }
                let cols = r.start_col as usize..=r.end_col as usize;
                let rows = first_row..=last_row;
                let lines: RawGrid = match options.major_dimension.unwrap_or_default() {
                    MajorDimension::Rows => rows
                        .map(|row| {
                            cols.clone()
                                .map(|col| cell(grid, row, col).to_string())
                                .collect()
                        })
                        .collect(),
                    MajorDimension::Columns => cols
                        .map(|col| {
                            rows.clone()
                                .map(|row| cell(grid, row, col).to_string())
                                .collect()
                        })
                        .collect(),
                };
                trim(lines)
            },
        )
    }

    async fn write_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &RawGrid,
    ) -> Result<WriteResult, ClientError> {
        let range = SheetRange::parse(range)?;
        let r = range.range;
        self.with_table(
            spreadsheet_id,
            &range,
            |calls| calls.writes += 1,
            |grid| write_at(grid, r.start_row as usize - 1, r.start_col as usize, values),
        )
    }

    async fn append_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &RawGrid,
    ) -> Result<AppendResult, ClientError> {
        let range = SheetRange::parse(range)?;
        let anchor = range.range;
        let table = quote_table(&range.table);
        self.with_table(
            spreadsheet_id,
            &range,
            |calls| calls.appends += 1,
            |grid| {
                let anchor_row = anchor.start_row as usize - 1;
                let row = last_occupied_row(grid)
                    .map(|last| (last + 1).max(anchor_row))
                    .unwrap_or(anchor_row);
                let written = write_at(grid, row, anchor.start_col as usize, values);
                let updated_range = if written.updated_rows == 0 {
                    String::new()
                } else {
                    let width = values.iter().map(Vec::len).max().unwrap_or(1).max(1) as u32;
                    format!(
                        "{table}!{}{}:{}{}",
                        column_name(anchor.start_col),
                        row + 1,
                        column_name(anchor.start_col + width - 1),
                        row + values.len(),
                    )
                };
                AppendResult {
                    updated_range,
                    updated_rows: written.updated_rows,
                    updated_columns: written.updated_columns,
                    updated_cells: written.updated_cells,
                }
            },
        )
    }
}
