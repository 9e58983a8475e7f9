use crate::Result;
use crate::error::CamsError;
use crate::ingest::row::{ParsedRow, ParsedTable};
use serde_json::{Map, Value};

/// Accepts an array of objects, a single object, or an object wrapping one
/// array of objects (`{"users": [...]}`).
pub(super) fn parse(text: &str) -> Result<ParsedTable> {
    let document: Value =
        serde_json::from_str(text).map_err(|e| CamsError::parse("JSON", e.to_string()))?;

    let records: Vec<&Map<String, Value>> = match &document {
        Value::Array(items) => objects(items)?,
        Value::Object(map) => match wrapped_array(map) {
            Some(items) => objects(items)?,
            None => vec![map],
        },
        _ => {
            return Err(CamsError::parse(
                "JSON",
                "expected an object or an array of objects",
            ));
        }
    };

    let mut columns: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        let values: Vec<(String, String)> = record
            .iter()
            .map(|(key, value)| (key.clone(), scalar(value)))
            .collect();
        for (key, _) in &values {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
        rows.push(ParsedRow::new(index + 1, values));
    }
    Ok(ParsedTable { columns, rows })
}

fn objects(items: &[Value]) -> Result<Vec<&Map<String, Value>>> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.as_object().ok_or_else(|| {
                CamsError::parse("JSON", format!("element {} is not an object", index + 1))
            })
        })
        .collect()
}

/// The single array value of a wrapper object, if that is its only array.
fn wrapped_array(map: &Map<String, Value>) -> Option<&Vec<Value>> {
    let mut arrays = map.values().filter_map(Value::as_array);
    let first = arrays.next()?;
    if arrays.next().is_some() || !first.iter().all(Value::is_object) {
        return None;
    }
    Some(first)
}

fn scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => nested.to_string(),
    }
}
