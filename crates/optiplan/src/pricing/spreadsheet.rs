use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use crate::error::IngestError;

use super::table::RawTable;

/// Reads the first sheet of an `.xlsx`/`.xls` file. The first non-empty row
/// is the header; fully blank rows are skipped.
pub fn read_table(bytes: &[u8]) -> Result<RawTable, IngestError> {
    let _span = tracing::info_span!("pricing.spreadsheet").entered();

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| IngestError::Spreadsheet(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| IngestError::Spreadsheet("workbook has no sheets".to_string()))?
        .map_err(|e| IngestError::Spreadsheet(e.to_string()))?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<_>>())
        .filter(|cells| cells.iter().any(|c| !c.is_empty()));

    let Some(headers) = rows.next() else {
        return Ok(RawTable::default());
    };
    let table = RawTable::new(headers, rows.collect());
    tracing::debug!(
        columns = table.headers.len(),
        rows = table.rows.len(),
        "Read spreadsheet"
    );
    Ok(table)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string().trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    #[test]
    fn test_header_is_first_non_empty_row() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(2, 0, "Ürün Adı").unwrap();
        sheet.write_string(2, 1, "Fiyat").unwrap();
        sheet.write_string(3, 0, " MDF Beyaz ").unwrap();
        sheet.write_number(3, 1, 1250.0).unwrap();
        sheet.write_string(5, 0, "Sunta").unwrap();
        sheet.write_number(5, 1, 99.9).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let table = read_table(&bytes).unwrap();
        assert_eq!(table.headers, vec!["Ürün Adı", "Fiyat"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], vec!["MDF Beyaz", "1250"]);
        assert_eq!(table.rows[1], vec!["Sunta", "99.9"]);
    }

    #[test]
    fn test_empty_sheet() {
        let mut workbook = Workbook::new();
        workbook.add_worksheet();
        let bytes = workbook.save_to_buffer().unwrap();
        assert!(read_table(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_garbage_is_spreadsheet_error() {
        assert!(matches!(
            read_table(b"definitely not a workbook"),
            Err(IngestError::Spreadsheet(_))
        ));
    }
}
