//! Header plus string rows, the common shape of every extracted price list.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::columns::ColumnMapping;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// One data row keyed by canonical column name.
pub type CanonicalRow = HashMap<String, String>;

static RE_CELL_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\t+| {2,}").unwrap());

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Builds a table from OCR or PDF text. The first non-blank line is the
    /// header; cells are separated by tabs or runs of two or more spaces.
    pub fn from_text(text: &str) -> Self {
        let mut lines = text
            .lines()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .map(split_line);

        let Some(headers) = lines.next() else {
            return Self::default();
        };
        Self {
            headers,
            rows: lines.collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() || self.rows.is_empty()
    }

    /// Renames columns through `mapping`, dropping unmapped ones. Short rows
    /// yield only the cells they have.
    pub fn canonical_rows(&self, mapping: &ColumnMapping) -> Vec<CanonicalRow> {
        let targets: Vec<(usize, &str)> = self
            .headers
            .iter()
            .enumerate()
            .filter_map(|(i, h)| mapping.canonical_for(h).map(|c| (i, c)))
            .collect();

        self.rows
            .iter()
            .map(|row| {
                targets
                    .iter()
                    .filter_map(|&(i, canonical)| {
                        row.get(i).map(|cell| (canonical.to_string(), cell.clone()))
                    })
                    .collect()
            })
            .collect()
    }
}

fn split_line(line: &str) -> Vec<String> {
    RE_CELL_SEPARATOR
        .split(line)
        .map(|cell| cell.trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::columns::{normalize_columns, ColumnAliases, LISTE_FIYATI, URUN_ADI};

    #[test]
    fn test_from_text_splits_on_tabs_and_wide_gaps() {
        let text = "\n  Ürün Adı\tFiyat  \nMDF Beyaz 18mm    1.234,50\nSunta  99\n\n";
        let table = RawTable::from_text(text);

        assert_eq!(table.headers, vec!["Ürün Adı", "Fiyat"]);
        assert_eq!(
            table.rows,
            vec![
                vec!["MDF Beyaz 18mm".to_string(), "1.234,50".to_string()],
                vec!["Sunta".to_string(), "99".to_string()],
            ]
        );
    }

    #[test]
    fn test_single_spaces_stay_inside_a_cell() {
        let table = RawTable::from_text("Ürün Adı  Fiyat\nKapak Beyaz Parlak  10");
        assert_eq!(table.rows[0][0], "Kapak Beyaz Parlak");
    }

    #[test]
    fn test_blank_text_is_empty() {
        assert!(RawTable::from_text("  \n\n").is_empty());
        assert!(RawTable::from_text("Ürün Adı  Fiyat").is_empty());
    }

    #[test]
    fn test_canonical_rows() {
        let table = RawTable::new(
            vec!["Ürün Adı".into(), "Not".into(), "Fiyat".into()],
            vec![
                vec!["MDF".into(), "x".into(), "10".into()],
                vec!["Sunta".into()],
            ],
        );
        let mapping = normalize_columns(&table.headers, &ColumnAliases::default());
        let rows = table.canonical_rows(&mapping);

        assert_eq!(rows[0].get(URUN_ADI).map(String::as_str), Some("MDF"));
        assert_eq!(rows[0].get(LISTE_FIYATI).map(String::as_str), Some("10"));
        assert_eq!(rows[0].len(), 2);
        assert_eq!(rows[1].len(), 1);
    }
}
