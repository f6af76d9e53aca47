//! The two-row template contract OptiPlanning expects on every import.
//!
//! Row 1 carries the field tags, row 2 the human-readable headers. Both are
//! compared cell by cell after trimming. Data rows are never inspected.

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader};
use serde::Serialize;

use crate::error::ExportError;

pub const COLUMN_COUNT: usize = 12;

/// Tag row. `P_EGDE_MAT_LO` is misspelled on the OptiPlanning side and must
/// stay that way.
pub const EXPECTED_ROW1: [&str; COLUMN_COUNT] = [
    "[P_CODE_MAT]",
    "[P_LENGTH]",
    "[P_WIDTH]",
    "[P_MINQ]",
    "[P_GRAIN]",
    "[P_IDESC]",
    "[P_EDGE_MAT_UP]",
    "[P_EGDE_MAT_LO]",
    "[P_EDGE_MAT_SX]",
    "[P_EDGE_MAT_DX]",
    "[P_IIDESC]",
    "[P_DESC1]",
];

pub const EXPECTED_ROW2: [&str; COLUMN_COUNT] = [
    "Material",
    "Length",
    "Width",
    "Min Q.",
    "GrainI",
    "Description",
    "Upper strip mat.",
    "Lower strip mat.",
    "Left strip mat.",
    "Right strip mat.",
    "II Description",
    "Description 1",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractReport {
    pub ok: bool,
    /// Width of the header area actually found in the sheet.
    pub column_count: usize,
    /// `R<row>C<col>: expected=<e> got=<g>`, 1-based.
    pub mismatches: Vec<String>,
}

impl ContractReport {
    pub fn into_result(self) -> Result<Self, ExportError> {
        if self.ok {
            Ok(self)
        } else {
            Err(ExportError::ContractMismatch {
                mismatches: self.mismatches,
            })
        }
    }
}

/// Validates the first sheet of the workbook at `path`.
pub fn validate_workbook_path(path: &Path) -> Result<ContractReport, ExportError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| ExportError::WorkbookRead(format!("{}: {}", path.display(), e)))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ExportError::WorkbookRead("workbook has no sheets".to_string()))?
        .map_err(|e| ExportError::WorkbookRead(e.to_string()))?;
    Ok(validate_range(&range))
}

/// Validates the first sheet of an in-memory workbook.
pub fn validate_workbook_bytes(bytes: &[u8]) -> Result<ContractReport, ExportError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ExportError::WorkbookRead(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ExportError::WorkbookRead("workbook has no sheets".to_string()))?
        .map_err(|e| ExportError::WorkbookRead(e.to_string()))?;
    Ok(validate_range(&range))
}

/// Compares rows 1 and 2 of `range` against the contract.
pub fn validate_range(range: &Range<Data>) -> ContractReport {
    // Absolute positions: a sheet whose used area starts below A1 still has
    // empty header cells that must be reported.
    let last_col = range
        .end()
        .map(|(_, col)| col as usize + 1)
        .unwrap_or(0);

    let mut mismatches = Vec::new();
    for (row_index, expected_row) in [EXPECTED_ROW1, EXPECTED_ROW2].iter().enumerate() {
        for col in 0..COLUMN_COUNT.max(last_col) {
            let expected = expected_row.get(col).copied().unwrap_or("");
            let got = cell_text(range, row_index as u32, col as u32);
            if got != expected {
                mismatches.push(format!(
                    "R{}C{}: expected={} got={}",
                    row_index + 1,
                    col + 1,
                    expected,
                    got
                ));
            }
        }
    }

    let column_count = header_width(range, last_col);
    ContractReport {
        ok: mismatches.is_empty(),
        column_count,
        mismatches,
    }
}

/// Rightmost non-empty column across the two header rows.
fn header_width(range: &Range<Data>, last_col: usize) -> usize {
    (0..last_col)
        .rev()
        .find(|&col| (0..2).any(|row| !cell_text(range, row, col as u32).is_empty()))
        .map(|col| col + 1)
        .unwrap_or(0)
}

fn cell_text(range: &Range<Data>, row: u32, col: u32) -> String {
    match range.get_value((row, col)) {
        None | Some(Data::Empty) => String::new(),
        Some(Data::String(s)) => s.trim().to_string(),
        Some(Data::Float(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Some(Data::Float(f)) => f.to_string(),
        Some(Data::Int(i)) => i.to_string(),
        Some(Data::Bool(b)) => b.to_string(),
        Some(other) => other.to_string().trim().to_string(),
    }
}
