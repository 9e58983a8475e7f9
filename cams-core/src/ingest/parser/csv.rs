use super::{ParseOptions, decode_text, generated_columns};
use crate::Result;
use crate::error::CamsError;
use crate::ingest::row::{FileFormat, ParsedRow, ParsedTable};

pub(super) fn parse(content: &[u8], options: &ParseOptions) -> Result<ParsedTable> {
    let text = decode_text(content, &options.encoding, FileFormat::Csv)?;
    let delimiter = options.delimiter.unwrap_or(',');
    let delimiter = u8::try_from(delimiter).map_err(|_| {
        CamsError::parse("CSV", format!("delimiter '{delimiter}' is not a single byte"))
    })?;

    let mut reader = ::csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .trim(::csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    // Rows are numbered by source line relative to the header.
    let mut header_line = 0;
    let mut columns = if options.has_header {
        match records.next() {
            Some(header) => {
                let header =
                    header.map_err(|e| CamsError::parse("CSV", format!("invalid header: {e}")))?;
                header_line = line_of(&header, &text).unwrap_or(1);
                header.iter().map(str::to_string).collect()
            }
            None => return Ok(ParsedTable::default()),
        }
    } else {
        Vec::new()
    };

    let mut rows = Vec::new();
    for (index, record) in records.enumerate() {
        let record = record.map_err(|e| CamsError::parse("CSV", e.to_string()))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        if columns.is_empty() {
            columns = generated_columns(record.len());
        }
        let row_number = line_of(&record, &text)
            .map_or(index + 1, |line| line.saturating_sub(header_line).max(1));
        let values = columns
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect();
        rows.push(ParsedRow::new(row_number, values));
    }

    Ok(ParsedTable { columns, rows })
}

/// 1-based line on which the record starts.
///
/// The reader stamps a record with the position after the previous record's
/// terminator, before any blank lines are skipped, so those are added back.
fn line_of(record: &::csv::StringRecord, text: &str) -> Option<usize> {
    let position = record.position()?;
    let start = usize::try_from(position.byte()).ok()?;
    let skipped = text
        .as_bytes()
        .get(start..)?
        .iter()
        .take_while(|&&b| b == b'\n' || b == b'\r')
        .filter(|&&b| b == b'\n')
        .count();
    usize::try_from(position.line()).ok().map(|line| line + skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_and_rows() {
        let table = parse(
            b"email,firstName\n a@x.io , Ann\nb@x.io,Bob\n",
            &ParseOptions::default(),
        )
        .unwrap();
        assert_eq!(table.columns, vec!["email", "firstName"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].get("email"), Some("a@x.io"));
        assert_eq!(table.rows[1].row_number, 2);
    }

    #[test]
    fn test_semicolon_without_header() {
        let options = ParseOptions {
            delimiter: Some(';'),
            has_header: false,
            ..ParseOptions::default()
        };
        let table = parse(b"a@x.io;Ann\n", &options).unwrap();
        assert_eq!(table.columns, vec!["column1", "column2"]);
        assert_eq!(table.rows[0].get("column2"), Some("Ann"));
    }

    #[test]
    fn test_ragged_rows_are_corrupt() {
        let err = parse(b"email,name\na@x.io,Ann,extra\n", &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, CamsError::Parse { .. }));
    }

    #[test]
    fn test_empty_records_keep_row_numbers() {
        let table = parse(b"email,name\na@x.io,Ann\n,\nb@x.io,Bob\n", &ParseOptions::default())
            .unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1].row_number, 3);
    }

    #[test]
    fn test_blank_lines_keep_source_positions() {
        let table = parse(
            b"email,first_name,last_name\nann@example.com,Ann,Lee\n\n,Bob,Ray\n",
            &ParseOptions::default(),
        )
        .unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].row_number, 1);
        assert_eq!(table.rows[1].row_number, 3);
    }

    #[test]
    fn test_leading_blank_lines_before_header() {
        let table = parse(b"\n\nemail,name\na@x.io,Ann\n\n\nb@x.io,Bob\n", &ParseOptions::default())
            .unwrap();
        let rows: Vec<_> = table.rows.iter().map(|r| r.row_number).collect();
        assert_eq!(rows, vec![1, 4]);
    }

    #[test]
    fn test_quoted_newline_counts_as_a_source_line() {
        let table = parse(
            b"email,note\na@x.io,\"two\nlines\"\nb@x.io,plain\n",
            &ParseOptions::default(),
        )
        .unwrap();
        assert_eq!(table.rows[0].row_number, 1);
        assert_eq!(table.rows[0].get("note"), Some("two\nlines"));
        assert_eq!(table.rows[1].row_number, 3);
    }

    #[test]
    fn test_tab_delimiter() {
        let options = ParseOptions::default().for_file("people.tsv");
        let table = parse(b"email\tfirst_name\na@x.io\tAnn\n", &options).unwrap();
        assert_eq!(table.columns, vec!["email", "first_name"]);
        assert_eq!(table.rows[0].get("first_name"), Some("Ann"));
    }

    #[test]
    fn test_empty_file() {
        let table = parse(b"", &ParseOptions::default()).unwrap();
        assert!(table.is_empty());
        assert!(table.columns.is_empty());
    }
}
