//! Persistence boundary for ingested rows.

use super::row::Record;
use super::schema::TableType;
use crate::Result;
use crate::error::CamsError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Per-row result of a batch save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum RowOutcome {
    /// Stored
    Saved,
    /// Not stored, with the reason
    Rejected(String),
}

/// Batch persistence for bulk uploads.
///
/// A returned error means the whole batch was not committed; per-row
/// rejections are reported through `RowOutcome`.
#[async_trait]
pub trait IngestionRepository: Send + Sync {
    /// Persists one batch and reports one outcome per row, in order.
    async fn save_batch(&self, table_type: TableType, rows: &[Record]) -> Result<Vec<RowOutcome>>;

    /// Whether a row with this unique key is already stored.
    async fn exists(&self, table_type: TableType, unique_key: &str) -> Result<bool>;
}

fn key_of(table_type: TableType, record: &Record) -> String {
    table_type
        .schema()
        .map(|schema| schema.unique_key_of(record))
        .unwrap_or_default()
}

#[derive(Debug, Default)]
struct Tables {
    rows: HashMap<TableType, Vec<Record>>,
    keys: HashMap<TableType, HashSet<String>>,
}

impl Tables {
    fn insert(&mut self, table_type: TableType, record: &Record) -> RowOutcome {
        let key = key_of(table_type, record);
        if !self.keys.entry(table_type).or_default().insert(key.clone()) {
            return RowOutcome::Rejected(format!("A row with key '{key}' already exists"));
        }
        self.rows.entry(table_type).or_default().push(record.clone());
        RowOutcome::Saved
    }
}

/// Process-local repository for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
}

impl InMemoryRepository {
    /// Empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored rows of one table, in insertion order.
    pub async fn rows(&self, table_type: TableType) -> Vec<Record> {
        self.tables
            .lock()
            .await
            .rows
            .get(&table_type)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of stored rows in one table.
    pub async fn count(&self, table_type: TableType) -> usize {
        self.tables
            .lock()
            .await
            .rows
            .get(&table_type)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl IngestionRepository for InMemoryRepository {
    async fn save_batch(&self, table_type: TableType, rows: &[Record]) -> Result<Vec<RowOutcome>> {
        let mut tables = self.tables.lock().await;
        Ok(rows.iter().map(|row| tables.insert(table_type, row)).collect())
    }

    async fn exists(&self, table_type: TableType, unique_key: &str) -> Result<bool> {
        Ok(self
            .tables
            .lock()
            .await
            .keys
            .get(&table_type)
            .is_some_and(|keys| keys.contains(unique_key)))
    }
}

/// Appends rows as JSON lines to `<dir>/<table>.jsonl`.
///
/// Existing files are scanned on open so duplicate detection spans runs.
#[derive(Debug)]
pub struct JsonLinesRepository {
    dir: PathBuf,
    keys: Mutex<HashMap<TableType, HashSet<String>>>,
}

impl JsonLinesRepository {
    /// Opens (creating if needed) an output directory.
    ///
    /// # Errors
    /// `Io` if the directory cannot be created or read, `Serialization` for
    /// a malformed existing line.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CamsError::io(format!("Failed to create {}", dir.display()), e))?;

        let mut keys: HashMap<TableType, HashSet<String>> = HashMap::new();
        for table_type in TableType::KNOWN {
            let path = Self::table_path(&dir, table_type);
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(CamsError::io(format!("Failed to read {}", path.display()), e));
                }
            };
            let table_keys = keys.entry(table_type).or_default();
            for line in content.lines().filter(|l| !l.trim().is_empty()) {
                let record: Record = serde_json::from_str(line).map_err(|e| {
                    CamsError::serialization(format!("Malformed line in {}", path.display()), e)
                })?;
                table_keys.insert(key_of(table_type, &record));
            }
        }

        tracing::debug!(dir = %dir.display(), "JSON lines repository opened");
        Ok(Self {
            dir,
            keys: Mutex::new(keys),
        })
    }

    /// Output file of one table under `dir`.
    pub fn table_path(dir: &Path, table_type: TableType) -> PathBuf {
        dir.join(format!("{table_type}.jsonl"))
    }
}

#[async_trait]
impl IngestionRepository for JsonLinesRepository {
    async fn save_batch(&self, table_type: TableType, rows: &[Record]) -> Result<Vec<RowOutcome>> {
        let mut keys = self.keys.lock().await;
        let table_keys = keys.entry(table_type).or_default();

        let mut buffer = String::new();
        let mut outcomes = Vec::with_capacity(rows.len());
        let mut new_keys = Vec::new();
        for row in rows {
            let key = key_of(table_type, row);
            if table_keys.contains(&key) || new_keys.contains(&key) {
                outcomes.push(RowOutcome::Rejected(format!(
                    "A row with key '{key}' already exists"
                )));
                continue;
            }
            let line = serde_json::to_string(row)
                .map_err(|e| CamsError::serialization("Failed to encode row", e))?;
            buffer.push_str(&line);
            buffer.push('\n');
            new_keys.push(key);
            outcomes.push(RowOutcome::Saved);
        }

        let path = Self::table_path(&self.dir, table_type);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| CamsError::persistence_failed(format!("Failed to open {}", path.display()), e))?;
        file.write_all(buffer.as_bytes())
            .await
            .map_err(|e| CamsError::persistence_failed(format!("Failed to write {}", path.display()), e))?;
        file.flush()
            .await
            .map_err(|e| CamsError::persistence_failed(format!("Failed to flush {}", path.display()), e))?;

        table_keys.extend(new_keys);
        Ok(outcomes)
    }

    async fn exists(&self, table_type: TableType, unique_key: &str) -> Result<bool> {
        Ok(self
            .keys
            .lock()
            .await
            .get(&table_type)
            .is_some_and(|keys| keys.contains(unique_key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str) -> Record {
        Record::from([
            ("email".to_string(), email.to_string()),
            ("first_name".to_string(), "Ann".to_string()),
            ("last_name".to_string(), "Lee".to_string()),
        ])
    }

    #[tokio::test]
    async fn test_in_memory_rejects_duplicates() {
        let repo = InMemoryRepository::new();
        let outcomes = repo
            .save_batch(TableType::Users, &[user("a@x.io"), user("A@X.io")])
            .await
            .unwrap();
        assert_eq!(outcomes[0], RowOutcome::Saved);
        assert!(matches!(outcomes[1], RowOutcome::Rejected(_)));
        assert!(repo.exists(TableType::Users, "a@x.io").await.unwrap());
        assert!(!repo.exists(TableType::Roles, "a@x.io").await.unwrap());
        assert_eq!(repo.count(TableType::Users).await, 1);
    }

    #[tokio::test]
    async fn test_json_lines_persist_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonLinesRepository::open(dir.path()).await.unwrap();
        let outcomes = repo
            .save_batch(TableType::Users, &[user("a@x.io"), user("b@x.io")])
            .await
            .unwrap();
        assert!(outcomes.iter().all(|o| *o == RowOutcome::Saved));

        let content =
            std::fs::read_to_string(JsonLinesRepository::table_path(dir.path(), TableType::Users))
                .unwrap();
        assert_eq!(content.lines().count(), 2);

        let reopened = JsonLinesRepository::open(dir.path()).await.unwrap();
        assert!(reopened.exists(TableType::Users, "b@x.io").await.unwrap());
        let outcomes = reopened
            .save_batch(TableType::Users, &[user("b@x.io")])
            .await
            .unwrap();
        assert!(matches!(outcomes[0], RowOutcome::Rejected(_)));
    }
}
