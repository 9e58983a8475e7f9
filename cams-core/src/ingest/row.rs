//! Format-independent row representation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Field name to value, keyed by schema field after mapping.
pub type Record = BTreeMap<String, String>;

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Json,
    Xml,
    Excel,
}

impl FileFormat {
    /// Format for a file extension, case-insensitive.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "csv" | "tsv" | "txt" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "xml" => Some(Self::Xml),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Some(Self::Excel),
            _ => None,
        }
    }

    /// Format for a file name or path, by extension.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// Field delimiter implied by a file name: a tab for `.tsv`, else a comma.
pub fn default_delimiter(path: impl AsRef<Path>) -> char {
    let is_tsv = path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tsv"));
    if is_tsv { '\t' } else { ',' }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Csv => "CSV",
            Self::Json => "JSON",
            Self::Xml => "XML",
            Self::Excel => "Excel",
        })
    }
}

/// One source row: ordered column to value pairs plus its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRow {
    /// 1-based position among the file's data lines. Blank lines count,
    /// the header line does not.
    pub row_number: usize,
    /// Column name and cell value pairs, in column order
    pub values: Vec<(String, String)>,
}

impl ParsedRow {
    /// Row at `row_number` with its column values.
    pub fn new(row_number: usize, values: Vec<(String, String)>) -> Self {
        Self { row_number, values }
    }

    /// Value of a column by exact name.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Snapshot of the raw row for error reports.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.values.iter().cloned().collect()
    }
}

/// Parsed file: column names in first-seen order plus the data rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTable {
    /// Column names in first-seen order
    pub columns: Vec<String>,
    /// Data rows in source order
    pub rows: Vec<ParsedRow>,
}

impl ParsedTable {
    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the file held no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First `n` rows, used for detection.
    pub fn sample(&self, n: usize) -> &[ParsedRow] {
        &self.rows[..n.min(self.rows.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(FileFormat::from_path("users.CSV"), Some(FileFormat::Csv));
        assert_eq!(FileFormat::from_path("/tmp/roles.xlsx"), Some(FileFormat::Excel));
        assert_eq!(FileFormat::from_path("notes.md"), None);
        assert_eq!(FileFormat::from_path("no_extension"), None);
    }

    #[test]
    fn test_row_lookup_and_sample() {
        let table = ParsedTable {
            columns: vec!["email".to_string()],
            rows: (1..=3)
                .map(|n| ParsedRow::new(n, vec![("email".to_string(), format!("u{n}@x.io"))]))
                .collect(),
        };
        assert_eq!(table.sample(2).len(), 2);
        assert_eq!(table.sample(10).len(), 3);
        assert_eq!(table.rows[1].get("email"), Some("u2@x.io"));
        assert_eq!(table.rows[1].get("name"), None);
    }
}
