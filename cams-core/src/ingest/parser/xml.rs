use crate::Result;
use crate::error::CamsError;
use crate::ingest::row::{ParsedRow, ParsedTable};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

/// Reads `<root><record><field>value</field>...</record>...</root>`.
///
/// Attributes on a record element become fields. A root whose children are
/// all leaf elements is read as a single record.
pub(super) fn parse(text: &str) -> Result<ParsedTable> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut depth = 0usize;
    let mut records: Vec<Vec<(String, String)>> = Vec::new();
    let mut current: Option<Vec<(String, String)>> = None;
    let mut record_name = String::new();
    let mut field: Option<String> = None;
    let mut text_buf = String::new();
    // Children of the root seen as leaves, in case the root is the record.
    let mut root_leaves: Vec<(String, String)> = Vec::new();
    let mut all_leaves = true;

    loop {
        let event = reader.read_event().map_err(|e| {
            CamsError::parse("XML", format!("{e} at byte {}", reader.buffer_position()))
        })?;
        match event {
            Event::Start(e) => {
                depth += 1;
                match depth {
                    2 => {
                        record_name = local_name(&e);
                        current = Some(attributes(&e)?);
                        text_buf.clear();
                    }
                    3 => {
                        field = Some(local_name(&e));
                        text_buf.clear();
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => match depth {
                1 => {
                    let values = attributes(&e)?;
                    if values.is_empty() {
                        root_leaves.push((local_name(&e), String::new()));
                    } else {
                        all_leaves = false;
                    }
                    records.push(values);
                }
                2 => {
                    if let Some(values) = current.as_mut() {
                        values.push((local_name(&e), String::new()));
                    }
                }
                _ => {}
            },
            Event::Text(e) => {
                if depth >= 2 {
                    let value = e
                        .unescape()
                        .map_err(|err| CamsError::parse("XML", err.to_string()))?;
                    text_buf.push_str(&value);
                }
            }
            Event::CData(e) => {
                if depth >= 2 {
                    text_buf.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(_) => {
                match depth {
                    3 => {
                        if let (Some(values), Some(name)) = (current.as_mut(), field.take()) {
                            values.push((name, text_buf.trim().to_string()));
                        }
                        text_buf.clear();
                    }
                    2 => {
                        if let Some(values) = current.take() {
                            if values.is_empty() {
                                root_leaves.push((
                                    std::mem::take(&mut record_name),
                                    text_buf.trim().to_string(),
                                ));
                            } else {
                                all_leaves = false;
                            }
                            records.push(values);
                        }
                        text_buf.clear();
                    }
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(CamsError::parse("XML", "unexpected end of document"));
    }
    if !records.is_empty() && all_leaves {
        records = vec![root_leaves];
    }

    let mut columns: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(records.len());
    for (index, values) in records.into_iter().enumerate() {
        for (key, _) in &values {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
        rows.push(ParsedRow::new(index + 1, values));
    }
    Ok(ParsedTable { columns, rows })
}

fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

fn attributes(element: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    element
        .attributes()
        .map(|attribute| {
            let attribute = attribute.map_err(|e| CamsError::parse("XML", e.to_string()))?;
            let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map_err(|e| CamsError::parse("XML", e.to_string()))?;
            Ok((key, value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_with_child_fields() {
        let table = parse(
            r#"<?xml version="1.0"?>
            <users>
              <user id="7"><email>a@x.io</email><firstName>Ann &amp; Co</firstName></user>
              <user><email>b@x.io</email><phone/></user>
            </users>"#,
        )
        .unwrap();
        assert_eq!(table.columns, vec!["id", "email", "firstName", "phone"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].get("id"), Some("7"));
        assert_eq!(table.rows[0].get("firstName"), Some("Ann & Co"));
        assert_eq!(table.rows[1].get("phone"), Some(""));
        assert_eq!(table.rows[1].row_number, 2);
    }

    #[test]
    fn test_cdata_values() {
        let table =
            parse("<roles><role><name><![CDATA[Admin]]></name></role></roles>").unwrap();
        assert_eq!(table.rows[0].get("name"), Some("Admin"));
    }

    #[test]
    fn test_single_record_root() {
        let table = parse("<application><name>Billing</name><version>2.1</version></application>")
            .unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].get("version"), Some("2.1"));
    }

    #[test]
    fn test_malformed_documents() {
        assert!(parse("<users><user><email>a@x.io</user></users>").is_err());
        assert!(parse("<users><user><email>a@x.io</email>").is_err());
    }
}
