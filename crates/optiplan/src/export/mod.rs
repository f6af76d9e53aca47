//! OptiPlanning spreadsheet export: part binning, the two-row template
//! contract and the workbook writer.

pub mod grouper;
pub mod template;
pub mod writer;

pub use grouper::{group_parts, PartBin, ARKALIK_FALLBACK_THICKNESS_MM};
pub use template::{
    validate_workbook_bytes, validate_workbook_path, ContractReport, COLUMN_COUNT, EXPECTED_ROW1,
    EXPECTED_ROW2,
};
pub use writer::{export_filename, render_workbook, Renderer, StagedExport, TemplateWriter};
