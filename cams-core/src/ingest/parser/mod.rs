//! File parsers. Every format is normalized to a `ParsedTable`.

mod csv;
mod excel;
mod json;
mod xml;

use super::row::{FileFormat, ParsedTable, default_delimiter};
use crate::Result;
use crate::connection::FileDescriptor;
use crate::error::CamsError;
use serde::{Deserialize, Serialize};

/// Format-specific parsing knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// CSV field delimiter; inferred from the file name when unset
    pub delimiter: Option<char>,
    /// `utf-8` (BOM tolerated) or `latin-1`
    pub encoding: String,
    /// Whether the first CSV record names the columns
    pub has_header: bool,
    /// Worksheet to read; the first sheet when absent
    pub sheet_name: Option<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: "utf-8".to_string(),
            has_header: true,
            sheet_name: None,
        }
    }
}

impl From<&FileDescriptor> for ParseOptions {
    fn from(descriptor: &FileDescriptor) -> Self {
        Self {
            delimiter: Some(descriptor.delimiter),
            encoding: descriptor.encoding.clone(),
            has_header: descriptor.has_header,
            sheet_name: descriptor.sheet_name.clone(),
        }
    }
}

impl ParseOptions {
    /// Options for one named file, with the delimiter resolved.
    pub fn for_file(&self, name: &str) -> Self {
        Self {
            delimiter: Some(self.delimiter.unwrap_or_else(|| default_delimiter(name))),
            ..self.clone()
        }
    }
}

/// Parses raw file content.
///
/// # Errors
/// Returns `Parse` for undecodable or malformed content.
pub fn parse(content: &[u8], format: FileFormat, options: &ParseOptions) -> Result<ParsedTable> {
    match format {
        FileFormat::Csv => csv::parse(content, options),
        FileFormat::Json => json::parse(&decode_text(content, &options.encoding, format)?),
        FileFormat::Xml => xml::parse(&decode_text(content, &options.encoding, format)?),
        FileFormat::Excel => excel::parse(content, options),
    }
}

/// Decodes text content, dropping a UTF-8 byte order mark.
pub(crate) fn decode_text(content: &[u8], encoding: &str, format: FileFormat) -> Result<String> {
    let normalized = encoding.to_ascii_lowercase().replace(['-', '_'], "");
    match normalized.as_str() {
        "utf8" | "utf8bom" | "" => {
            let content = content.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(content);
            String::from_utf8(content.to_vec()).map_err(|e| {
                CamsError::parse(
                    format.to_string(),
                    format!("content is not valid UTF-8 (byte {})", e.utf8_error().valid_up_to()),
                )
            })
        }
        "latin1" | "iso88591" => Ok(content.iter().map(|&b| char::from(b)).collect()),
        other => Err(CamsError::parse(
            format.to_string(),
            format!("unsupported encoding '{other}'"),
        )),
    }
}

/// Positional column names for headerless input.
pub(crate) fn generated_columns(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("column{i}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_delimiter_wins_over_extension() {
        let options = ParseOptions {
            delimiter: Some(';'),
            ..ParseOptions::default()
        };
        assert_eq!(options.for_file("export.tsv").delimiter, Some(';'));
        assert_eq!(ParseOptions::default().for_file("export.tsv").delimiter, Some('\t'));
        assert_eq!(ParseOptions::default().for_file("export.csv").delimiter, Some(','));
    }

    #[test]
    fn test_decode_strips_bom() {
        let decoded = decode_text(b"\xEF\xBB\xBFemail", "utf-8", FileFormat::Csv).unwrap();
        assert_eq!(decoded, "email");
    }

    #[test]
    fn test_decode_latin1() {
        let decoded = decode_text(b"Jos\xE9", "ISO-8859-1", FileFormat::Csv).unwrap();
        assert_eq!(decoded, "José");
    }

    #[test]
    fn test_invalid_utf8_is_parse_error() {
        let err = decode_text(b"ok\xFF\xFE", "utf-8", FileFormat::Json).unwrap_err();
        assert!(matches!(err, CamsError::Parse { .. }));
    }

    #[test]
    fn test_unknown_encoding() {
        assert!(decode_text(b"x", "ebcdic", FileFormat::Xml).is_err());
    }
}
