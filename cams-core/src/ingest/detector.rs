//! Table type detection from column names and sample rows.

use super::config::IngestionSettings;
use super::row::ParsedRow;
use super::schema::{ColumnMapping, SCHEMAS, TableSchema, TableType, normalize};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const EXACT_CREDIT: f64 = 1.0;
const SYNONYM_CREDIT: f64 = 0.8;

/// Outcome of table type detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedTableInfo {
    /// Best-scoring table type, or `Unknown`/`Mixed`
    pub table_type: TableType,
    /// Score of the best schema, 0.0 to 1.0
    pub confidence: f64,
    /// Columns as they appear in the file
    pub detected_columns: Vec<String>,
    /// `column -> field` for the best schema, for manual correction
    pub suggested_mappings: BTreeMap<String, String>,
    /// Score of every candidate schema
    pub scores: BTreeMap<TableType, f64>,
}

/// Schema fit of one candidate.
#[derive(Debug, Clone)]
struct Candidate {
    table_type: TableType,
    score: f64,
    mapping: ColumnMapping,
}

/// Scores observed columns against every known schema.
///
/// Per schema: `0.6 * required coverage + 0.2 * optional coverage +
/// 0.2 * column fit`, scaled by `0.9 + 0.1 * sample completeness`. Exact
/// (normalized) name matches earn full credit, synonyms 0.8.
#[derive(Debug, Clone)]
pub struct TableTypeDetector {
    min_confidence: f64,
    ambiguity_margin: f64,
    sample_size: usize,
}

impl Default for TableTypeDetector {
    fn default() -> Self {
        Self::from_settings(&IngestionSettings::default())
    }
}

impl TableTypeDetector {
    /// Detector using the thresholds in `settings`.
    pub fn from_settings(settings: &IngestionSettings) -> Self {
        Self {
            min_confidence: settings.min_detection_confidence,
            ambiguity_margin: settings.ambiguity_margin,
            sample_size: settings.detection_sample_size,
        }
    }

    /// Detects the table type of a file.
    pub fn detect(&self, columns: &[String], sample_rows: &[ParsedRow]) -> DetectedTableInfo {
        let sample = &sample_rows[..self.sample_size.min(sample_rows.len())];
        let mut candidates: Vec<Candidate> = SCHEMAS
            .iter()
            .map(|schema| self.score(schema, columns, sample))
            .collect();
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

        let scores = candidates
            .iter()
            .map(|c| (c.table_type, round(c.score)))
            .collect();
        let Some(best) = candidates.first() else {
            return DetectedTableInfo {
                table_type: TableType::Unknown,
                confidence: 0.0,
                detected_columns: columns.to_vec(),
                suggested_mappings: BTreeMap::new(),
                scores,
            };
        };

        let contenders = candidates
            .iter()
            .filter(|c| c.score >= self.min_confidence && best.score - c.score <= self.ambiguity_margin)
            .count();
        let table_type = if best.score < self.min_confidence {
            TableType::Unknown
        } else if contenders > 1 {
            TableType::Mixed
        } else {
            best.table_type
        };

        tracing::debug!(
            table_type = %table_type,
            confidence = best.score,
            columns = columns.len(),
            "Table type detected"
        );

        DetectedTableInfo {
            table_type,
            confidence: round(best.score),
            detected_columns: columns.to_vec(),
            suggested_mappings: best.mapping.by_column(),
            scores,
        }
    }

    /// Best-effort mapping of `columns` onto a given schema.
    pub fn mapping_for(&self, table_type: TableType, columns: &[String]) -> ColumnMapping {
        table_type
            .schema()
            .map(|schema| match_columns(schema, columns).0)
            .unwrap_or_default()
    }

    fn score(&self, schema: &TableSchema, columns: &[String], sample: &[ParsedRow]) -> Candidate {
        let (mapping, credits) = match_columns(schema, columns);

        let (mut required, mut required_total) = (0.0, 0usize);
        let (mut optional, mut optional_total) = (0.0, 0usize);
        for field in schema.fields {
            let credit = credits.get(field.name).copied().unwrap_or(0.0);
            if field.required {
                required += credit;
                required_total += 1;
            } else {
                optional += credit;
                optional_total += 1;
            }
        }
        let coverage = |sum: f64, total: usize| if total == 0 { 0.0 } else { sum / total as f64 };
        let fit = if columns.is_empty() {
            0.0
        } else {
            mapping.len() as f64 / columns.len() as f64
        };
        let base = 0.6 * coverage(required, required_total)
            + 0.2 * coverage(optional, optional_total)
            + 0.2 * fit;

        Candidate {
            table_type: schema.table_type,
            score: base * (0.9 + 0.1 * completeness(schema, &mapping, sample)),
            mapping,
        }
    }
}

/// Assigns columns to fields, exact names before synonyms, each column
/// at most once. Returns the mapping and the credit earned per field.
fn match_columns(
    schema: &TableSchema,
    columns: &[String],
) -> (ColumnMapping, BTreeMap<&'static str, f64>) {
    let normalized: Vec<String> = columns.iter().map(|c| normalize(c)).collect();
    let mut used = vec![false; columns.len()];
    let mut mapping = ColumnMapping::new();
    let mut credits = BTreeMap::new();

    for field in schema.fields {
        let wanted = normalize(field.name);
        if let Some(index) = (0..columns.len()).find(|&i| !used[i] && normalized[i] == wanted) {
            used[index] = true;
            mapping.insert(field.name, columns[index].clone());
            credits.insert(field.name, EXACT_CREDIT);
        }
    }
    for field in schema.fields {
        if credits.contains_key(field.name) {
            continue;
        }
        let synonyms: Vec<String> = field.synonyms.iter().map(|s| normalize(s)).collect();
        if let Some(index) =
            (0..columns.len()).find(|&i| !used[i] && synonyms.contains(&normalized[i]))
        {
            used[index] = true;
            mapping.insert(field.name, columns[index].clone());
            credits.insert(field.name, SYNONYM_CREDIT);
        }
    }
    (mapping, credits)
}

/// Fraction of sample rows whose mapped required fields are all filled.
fn completeness(schema: &TableSchema, mapping: &ColumnMapping, sample: &[ParsedRow]) -> f64 {
    let required: Vec<&str> = schema
        .required_fields()
        .map(|f| f.name)
        .filter(|name| mapping.column_for(name).is_some())
        .collect();
    if sample.is_empty() || required.is_empty() {
        return 1.0;
    }
    let complete = sample
        .iter()
        .filter(|row| {
            required
                .iter()
                .all(|field| mapping.value(row, field).is_some_and(|v| !v.trim().is_empty()))
        })
        .count();
    complete as f64 / sample.len() as f64
}

fn round(score: f64) -> f64 {
    (score * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_users_columns() {
        let cols = columns(&["username", "email", "firstName", "lastName", "role"]);
        let info = TableTypeDetector::default().detect(&cols, &[]);
        assert_eq!(info.table_type, TableType::Users);
        assert!(info.confidence > 0.8, "{}", info.confidence);
        assert_eq!(info.suggested_mappings["firstName"], "first_name");
        assert_eq!(info.scores.len(), 4);
    }

    #[test]
    fn test_synonyms_earn_partial_credit() {
        let cols = columns(&["Member Email", "Assigned Role", "App"]);
        let info = TableTypeDetector::default().detect(&cols, &[]);
        assert_eq!(info.table_type, TableType::UserRoles);
        assert!(info.confidence < 0.9);
        assert_eq!(info.suggested_mappings["Assigned Role"], "role_name");
    }

    #[test]
    fn test_unrelated_columns_are_unknown() {
        let cols = columns(&["invoice_id", "amount", "currency"]);
        let info = TableTypeDetector::default().detect(&cols, &[]);
        assert_eq!(info.table_type, TableType::Unknown);
        assert!(info.confidence < 0.3);
    }

    #[test]
    fn test_ambiguous_columns_are_mixed() {
        let info = TableTypeDetector::default().detect(&columns(&["name"]), &[]);
        assert_eq!(info.table_type, TableType::Mixed);
    }

    #[test]
    fn test_sparse_samples_lower_confidence() {
        let cols = columns(&["email", "first_name", "last_name"]);
        let full = ParsedRow::new(
            1,
            vec![
                ("email".into(), "a@x.io".into()),
                ("first_name".into(), "A".into()),
                ("last_name".into(), "B".into()),
            ],
        );
        let sparse = ParsedRow::new(
            1,
            vec![
                ("email".into(), String::new()),
                ("first_name".into(), "A".into()),
                ("last_name".into(), "B".into()),
            ],
        );
        let detector = TableTypeDetector::default();
        let complete = detector.detect(&cols, std::slice::from_ref(&full));
        let incomplete = detector.detect(&cols, &[sparse]);
        assert!(complete.confidence > incomplete.confidence);
        assert_eq!(incomplete.table_type, TableType::Users);
    }

    #[test]
    fn test_mapping_for_override() {
        let mapping = TableTypeDetector::default()
            .mapping_for(TableType::Roles, &columns(&["Role", "Desc"]));
        assert_eq!(mapping.column_for("name"), Some("Role"));
        assert_eq!(mapping.column_for("description"), Some("Desc"));
    }
}
