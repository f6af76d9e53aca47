//! Vendor column names to the canonical price-list columns.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const URUN_KODU: &str = "URUN_KODU";
pub const URUN_ADI: &str = "URUN_ADI";
pub const BIRIM: &str = "BIRIM";
pub const LISTE_FIYATI: &str = "LISTE_FIYATI";
pub const ISKONTO_ORANI: &str = "ISKONTO_ORANI";
pub const NET_FIYAT: &str = "NET_FIYAT";
pub const KDV_ORANI: &str = "KDV_ORANI";
pub const KDV_DAHIL_FIYAT: &str = "KDV_DAHIL_FIYAT";
pub const PARA_BIRIMI: &str = "PARA_BIRIMI";
pub const KATEGORI: &str = "KATEGORI";
pub const MARKA: &str = "MARKA";

/// One canonical column and the vendor spellings that map to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnAlias {
    pub canonical: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl ColumnAlias {
    pub fn new(canonical: &str, aliases: &[&str]) -> Self {
        Self {
            canonical: canonical.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Ordered alias table. When two canonicals share an alias the one declared
/// first claims it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnAliases(Vec<ColumnAlias>);

impl Default for ColumnAliases {
    fn default() -> Self {
        Self(vec![
            ColumnAlias::new(
                URUN_KODU,
                &["Ürün Kodu", "Urun Kodu", "Stok Kodu", "Kod", "Product Code", "SKU"],
            ),
            ColumnAlias::new(
                URUN_ADI,
                &["Ürün Adı", "Urun Adi", "Ürün", "Stok Adı", "Açıklama", "Product Name"],
            ),
            ColumnAlias::new(BIRIM, &["Birim", "Unit"]),
            ColumnAlias::new(
                LISTE_FIYATI,
                &["Liste Fiyatı", "Liste Fiyati", "Fiyat", "List Price", "Price"],
            ),
            ColumnAlias::new(
                ISKONTO_ORANI,
                &["İskonto", "Iskonto", "İskonto Oranı", "Iskonto Orani", "Discount"],
            ),
            ColumnAlias::new(NET_FIYAT, &["Net Fiyat", "Net Price"]),
            ColumnAlias::new(KDV_ORANI, &["KDV", "KDV Oranı", "KDV Orani", "KDV %", "VAT"]),
            ColumnAlias::new(
                KDV_DAHIL_FIYAT,
                &["KDV Dahil Fiyat", "KDV Dahil", "Price incl. VAT"],
            ),
            ColumnAlias::new(PARA_BIRIMI, &["Para Birimi", "Döviz", "Doviz", "Currency"]),
            ColumnAlias::new(KATEGORI, &["Kategori", "Grup", "Category"]),
            ColumnAlias::new(MARKA, &["Marka", "Brand"]),
        ])
    }
}

impl ColumnAliases {
    pub fn new(entries: Vec<ColumnAlias>) -> Self {
        Self(entries)
    }

    pub fn entries(&self) -> &[ColumnAlias] {
        &self.0
    }

    /// Rejects blank or repeated canonical names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for entry in &self.0 {
            if entry.canonical.trim().is_empty() {
                return Err(ConfigError::InvalidColumnAlias {
                    canonical: entry.canonical.clone(),
                    reason: "canonical name must not be empty".to_string(),
                });
            }
            if !seen.insert(lookup_key(&entry.canonical)) {
                return Err(ConfigError::InvalidColumnAlias {
                    canonical: entry.canonical.clone(),
                    reason: "declared more than once".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Lookup key → canonical. Canonical names are keys too.
    fn lookup(&self) -> HashMap<String, &str> {
        let mut table = HashMap::new();
        for entry in &self.0 {
            let keys = std::iter::once(&entry.canonical).chain(entry.aliases.iter());
            for key in keys {
                table
                    .entry(lookup_key(key))
                    .or_insert(entry.canonical.as_str());
            }
        }
        table
    }
}

fn lookup_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Ordered `observed → canonical` pairs. Each canonical appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnMapping {
    pairs: Vec<(String, String)>,
}

impl ColumnMapping {
    pub fn canonical_for(&self, observed: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(o, _)| o == observed)
            .map(|(_, c)| c.as_str())
    }

    pub fn contains_canonical(&self, canonical: &str) -> bool {
        self.pairs.iter().any(|(_, c)| c == canonical)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(o, c)| (o.as_str(), c.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Maps observed column names onto canonical ones.
///
/// Matching ignores case and surrounding whitespace. The first observed
/// column claiming a canonical wins; later claimants are dropped with a
/// warning. Unmatched columns are left out.
pub fn normalize_columns<S: AsRef<str>>(observed: &[S], aliases: &ColumnAliases) -> ColumnMapping {
    let lookup = aliases.lookup();
    let mut claimed: HashSet<&str> = HashSet::new();
    let mut mapping = ColumnMapping::default();

    for column in observed {
        let column = column.as_ref();
        let Some(&canonical) = lookup.get(&lookup_key(column)) else {
            continue;
        };
        if !claimed.insert(canonical) {
            tracing::warn!(
                column = column,
                canonical = canonical,
                "Dropping duplicate column, canonical already mapped"
            );
            continue;
        }
        mapping.pairs.push((column.to_string(), canonical.to_string()));
    }

    mapping
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_and_whitespace_insensitive() {
        let mapping = normalize_columns(
            &["  ÜRÜN KODU ", "ürün adı", "liste fiyatı"],
            &ColumnAliases::default(),
        );
        assert_eq!(mapping.canonical_for("  ÜRÜN KODU "), Some(URUN_KODU));
        assert_eq!(mapping.canonical_for("ürün adı"), Some(URUN_ADI));
        assert_eq!(mapping.canonical_for("liste fiyatı"), Some(LISTE_FIYATI));
    }

    #[test]
    fn test_canonical_name_is_a_key() {
        let mapping = normalize_columns(&["net_fiyat", "KDV_ORANI"], &ColumnAliases::default());
        assert_eq!(mapping.canonical_for("net_fiyat"), Some(NET_FIYAT));
        assert_eq!(mapping.canonical_for("KDV_ORANI"), Some(KDV_ORANI));
    }

    #[test]
    fn test_alias_collision_keeps_first() {
        let aliases = ColumnAliases::new(vec![ColumnAlias::new(
            URUN_KODU,
            &["Ürün Kodu", "urun kodu"],
        )]);
        let mapping = normalize_columns(&["Ürün Kodu", "urun kodu", "Fiyat"], &aliases);

        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.canonical_for("Ürün Kodu"), Some(URUN_KODU));
        assert_eq!(mapping.canonical_for("urun kodu"), None);
        assert_eq!(mapping.canonical_for("Fiyat"), None);
    }

    #[test]
    fn test_overlapping_alias_goes_to_first_declared() {
        let aliases = ColumnAliases::new(vec![
            ColumnAlias::new(LISTE_FIYATI, &["Fiyat"]),
            ColumnAlias::new(NET_FIYAT, &["Fiyat", "Net"]),
        ]);
        let mapping = normalize_columns(&["Fiyat", "Net"], &aliases);
        let pairs: Vec<_> = mapping.iter().collect();
        assert_eq!(pairs, vec![("Fiyat", LISTE_FIYATI), ("Net", NET_FIYAT)]);
    }

    #[test]
    fn test_no_canonical_twice() {
        let observed = ["Fiyat", "Price", "List Price", "Birim", "Unit", "Marka", "x"];
        let mapping = normalize_columns(&observed, &ColumnAliases::default());
        let mut seen = HashSet::new();
        for (_, canonical) in mapping.iter() {
            assert!(seen.insert(canonical), "{canonical} mapped twice");
        }
        assert_eq!(mapping.len(), 3);
        assert!(mapping.contains_canonical(MARKA));
    }

    #[test]
    fn test_default_aliases_cover_all_canonicals() {
        let aliases = ColumnAliases::default();
        assert!(aliases.validate().is_ok());
        let names: Vec<&str> = aliases.entries().iter().map(|e| e.canonical.as_str()).collect();
        assert_eq!(
            names,
            vec![
                URUN_KODU,
                URUN_ADI,
                BIRIM,
                LISTE_FIYATI,
                ISKONTO_ORANI,
                NET_FIYAT,
                KDV_ORANI,
                KDV_DAHIL_FIYAT,
                PARA_BIRIMI,
                KATEGORI,
                MARKA
            ]
        );
    }

    #[test]
    fn test_duplicate_canonical_rejected() {
        let aliases = ColumnAliases::new(vec![
            ColumnAlias::new(MARKA, &["Marka"]),
            ColumnAlias::new("marka", &["Brand"]),
        ]);
        assert!(matches!(
            aliases.validate(),
            Err(ConfigError::InvalidColumnAlias { .. })
        ));
    }

    #[test]
    fn test_deserializes_as_ordered_list() {
        let json = r#"[{"canonical": "MARKA", "aliases": ["Brand"]}, {"canonical": "BIRIM"}]"#;
        let aliases: ColumnAliases = serde_json::from_str(json).unwrap();
        assert_eq!(aliases.entries()[0].canonical, "MARKA");
        assert!(aliases.entries()[1].aliases.is_empty());
    }
}
