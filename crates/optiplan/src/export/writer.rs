use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::error::ExportError;
use crate::order::grain::grain_to_opti;
use crate::order::{Order, OrderPart, PartGroup};
use crate::sanitize::filename_component;
use crate::storage::{FileStorage, StagedFile};

use super::grouper::PartBin;
use super::template::{validate_workbook_bytes, EXPECTED_ROW1, EXPECTED_ROW2};

/// First data row (0-based); rows 0 and 1 hold the contract.
const FIRST_DATA_ROW: u32 = 2;

/// `<customer>_<YYYYMMDD_HHMMSS>_<thickness>mm_<color>_<GROUP>.xlsx`
pub fn export_filename(customer: &str, at: DateTime<Utc>, bin: &PartBin) -> String {
    format!(
        "{}_{}_{}mm_{}_{}.xlsx",
        filename_component(customer),
        at.format("%Y%m%d_%H%M%S"),
        bin.thickness_mm.normalize(),
        filename_component(&bin.color),
        bin.part_group.as_str(),
    )
}

/// Builds the single-sheet workbook for one bin.
pub fn render_workbook(
    material_name: &str,
    bin: &PartBin,
    parts: &[OrderPart],
) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, tag) in EXPECTED_ROW1.iter().enumerate() {
        sheet.write_string(0, col as u16, *tag)?;
    }
    for (col, header) in EXPECTED_ROW2.iter().enumerate() {
        sheet.write_string(1, col as u16, *header)?;
    }

    let mask_edges = bin.part_group == PartGroup::Arkalik;
    for (offset, part) in parts.iter().enumerate() {
        write_part_row(sheet, FIRST_DATA_ROW + offset as u32, material_name, part, mask_edges)?;
    }

    Ok(workbook.save_to_buffer()?)
}

fn write_part_row(
    sheet: &mut Worksheet,
    row: u32,
    material_name: &str,
    part: &OrderPart,
    mask_edges: bool,
) -> Result<(), ExportError> {
    sheet.write_string(row, 0, material_name)?;
    sheet.write_number(row, 1, part.length_mm as f64)?;
    sheet.write_number(row, 2, part.width_mm as f64)?;
    sheet.write_number(row, 3, part.quantity as f64)?;

    let grain = part
        .grain_opti
        .unwrap_or_else(|| grain_to_opti(part.grain.as_deref()));
    sheet.write_number(row, 4, grain as f64)?;

    write_optional_text(sheet, row, 5, part.description.as_deref())?;

    // Back panels never carry strip material, whatever reached the writer.
    if !mask_edges {
        for (i, edge) in part.edges().iter().enumerate() {
            write_edge(sheet, row, 6 + i as u16, *edge)?;
        }
    }

    write_optional_text(sheet, row, 10, part.drill_code_1.as_deref())?;
    write_optional_text(sheet, row, 11, part.drill_code_2.as_deref())?;
    Ok(())
}

fn write_edge(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: Option<&str>,
) -> Result<(), ExportError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(());
    };
    match value.parse::<i64>() {
        Ok(n) => sheet.write_number(row, col, n as f64)?,
        Err(_) => sheet.write_string(row, col, value)?,
    };
    Ok(())
}

fn write_optional_text(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: Option<&str>,
) -> Result<(), ExportError> {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        sheet.write_string(row, col, value)?;
    }
    Ok(())
}

/// A rendered bin waiting for its transaction to commit.
#[derive(Debug)]
pub struct StagedExport {
    pub bin: PartBin,
    pub row_count: u32,
    pub file: StagedFile,
}

/// Turns one bin into workbook bytes.
pub type Renderer = fn(&str, &PartBin, &[OrderPart]) -> Result<Vec<u8>, ExportError>;

/// Renders bins, checks them against the template contract and stages them
/// in the export directory.
#[derive(Clone)]
pub struct TemplateWriter {
    storage: FileStorage,
    render: Renderer,
}

impl std::fmt::Debug for TemplateWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateWriter")
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl TemplateWriter {
    pub fn new(storage: FileStorage) -> Self {
        Self {
            storage,
            render: render_workbook,
        }
    }

    pub fn with_renderer(mut self, render: Renderer) -> Self {
        self.render = render;
        self
    }

    pub fn storage(&self) -> &FileStorage {
        &self.storage
    }

    pub fn stage(
        &self,
        order: &Order,
        bin: &PartBin,
        parts: &[OrderPart],
        at: DateTime<Utc>,
    ) -> Result<StagedExport, ExportError> {
        let bytes = (self.render)(&order.material.name, bin, parts)?;
        validate_workbook_bytes(&bytes)?.into_result()?;
        let filename = export_filename(&order.customer_name, at, bin);
        let file = self.storage.stage(&filename, &bytes)?;

        tracing::debug!(bin = %bin, file = %filename, rows = parts.len(), "Staged workbook");

        Ok(StagedExport {
            bin: bin.clone(),
            row_count: parts.len() as u32,
            file,
        })
    }
}
