use super::{ParseOptions, generated_columns};
use crate::Result;
use crate::error::CamsError;
use crate::ingest::row::{ParsedRow, ParsedTable};
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use std::io::Cursor;

pub(super) fn parse(content: &[u8], options: &ParseOptions) -> Result<ParsedTable> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(content.to_vec()))
        .map_err(|e| CamsError::parse("Excel", format!("cannot open workbook: {e}")))?;

    let sheet = match &options.sheet_name {
        Some(name) => name.clone(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| CamsError::parse("Excel", "workbook has no worksheets"))?,
    };
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| CamsError::parse("Excel", format!("cannot read sheet '{sheet}': {e}")))?;

    let mut cells = range.rows();
    let mut columns: Vec<String> = if options.has_header {
        match cells.next() {
            Some(header) => header.iter().map(cell_text).collect(),
            None => return Ok(ParsedTable::default()),
        }
    } else {
        generated_columns(range.width())
    };
    // Unnamed header cells still need a distinct key.
    for (index, column) in columns.iter_mut().enumerate() {
        if column.is_empty() {
            *column = format!("column{}", index + 1);
        }
    }

    let mut rows = Vec::new();
    for (index, row) in cells.enumerate() {
        let values: Vec<(String, String)> = columns
            .iter()
            .cloned()
            .zip(row.iter().map(cell_text))
            .collect();
        if values.iter().all(|(_, value)| value.is_empty()) {
            continue;
        }
        rows.push(ParsedRow::new(index + 1, values));
    }
    Ok(ParsedTable { columns, rows })
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{f:.0}"),
        other => other.to_string(),
    }
}
