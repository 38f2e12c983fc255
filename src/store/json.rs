//! JSON file record store
//!
//! Each form lives in `<data_dir>/<form_id>.json`:
//!
//! ```json
//! {
//!   "form": { "id": 3, "title": "Contact", "fields": [ ... ] },
//!   "entries": [ { "id": 1, "date_created": "2026-10-17T09:00:00Z", "values": { "1.3": "Ada" } } ]
//! }
//! ```
//!
//! The document is read on every call, so entries appended by another
//! process between scheduler ticks are visible to the next invocation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StoreError};

use super::memory::select;
use super::{EntryFilter, FormSchema, Record, RecordStore, Sorting};

/// On-disk layout of one form document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormDocument {
    pub form: FormSchema,
    #[serde(default)]
    pub entries: Vec<Record>,
}

/// Record store reading form documents from a directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Directory holding the form documents
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn form_path(&self, form_id: u32) -> PathBuf {
        self.data_dir.join(format!("{form_id}.json"))
    }

    async fn load(&self, form_id: u32) -> Result<FormDocument> {
        let path = self.form_path(form_id);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::FormNotFound(form_id).into());
            }
            Err(e) => {
                return Err(
                    StoreError::QueryFailed(format!("{}: {}", path.display(), e)).into(),
                );
            }
        };

        let doc: FormDocument = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Corrupt(format!("{}: {}", path.display(), e)))?;
        debug!(
            "Loaded form {} with {} entries from {}",
            form_id,
            doc.entries.len(),
            path.display()
        );
        Ok(doc)
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn form_schema(&self, form_id: u32) -> Result<FormSchema> {
        Ok(self.load(form_id).await?.form)
    }

    async fn count_matching(&self, form_id: u32, filter: &EntryFilter) -> Result<u64> {
        let doc = self.load(form_id).await?;
        Ok(doc.entries.iter().filter(|r| filter.matches(r)).count() as u64)
    }

    async fn fetch_page(
        &self,
        form_id: u32,
        filter: &EntryFilter,
        sorting: &Sorting,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Record>> {
        let doc = self.load(form_id).await?;
        Ok(select(&doc.entries, filter, sorting, offset, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AutoexportError;

    const DOC: &str = r#"{
        "form": {"id": 3, "title": "Contact", "fields": [{"id": "1", "label": "Email"}]},
        "entries": [
            {"id": 1, "date_created": "2026-10-16T10:00:00Z", "values": {"1": "a@example.com"}},
            {"id": 2, "date_created": "2026-10-17T10:00:00Z", "status": "spam", "values": {"1": "b@example.com"}},
            {"id": 3, "date_created": "2026-10-17T11:00:00Z", "values": {"1": "c@example.com"}}
        ]
    }"#;

    #[tokio::test]
    async fn test_json_store_reads_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("3.json"), DOC).await.unwrap();
        let store = JsonFileStore::new(dir.path());

        let schema = store.form_schema(3).await.unwrap();
        assert_eq!(schema.fields[0].label, "Email");

        let filter = EntryFilter::default();
        assert_eq!(store.count_matching(3, &filter).await.unwrap(), 2);

        let page = store
            .fetch_page(3, &filter, &Sorting::default(), 0, 20)
            .await
            .unwrap();
        assert_eq!(page.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3, 1]);
    }

    #[tokio::test]
    async fn test_json_store_accepts_native_json_values() {
        let dir = tempfile::tempdir().unwrap();
        let doc = r#"{
            "form": {"id": 5, "title": "Guests", "fields": [
                {"id": "1", "label": "Scores"},
                {"id": "3", "label": "Guests", "kind": "list"}
            ]},
            "entries": [
                {"id": 1, "date_created": "2026-10-17T10:00:00Z",
                 "values": {"1": [1, 2], "3": [["a","1"],["b","2"]]}},
                {"id": 2, "date_created": "2026-10-17T11:00:00Z",
                 "values": {"1": {"best": 9}, "3": "[[\"c\",\"3\"]]"}}
            ]
        }"#;
        tokio::fs::write(dir.path().join("5.json"), doc).await.unwrap();
        let store = JsonFileStore::new(dir.path());

        let filter = EntryFilter::default();
        assert_eq!(store.count_matching(5, &filter).await.unwrap(), 2);

        let counts = store
            .field_row_counts(5, &filter, &["3".to_string()], 2)
            .await
            .unwrap();
        assert_eq!(counts.get("3"), Some(&2));

        let page = store
            .fetch_page(5, &filter, &Sorting::default(), 0, 20)
            .await
            .unwrap();
        assert_eq!(page[1].raw("1").to_text(), "1|2");
        assert_eq!(
            page[1].raw("3").decode_sub_rows().unwrap(),
            vec![vec!["a", "1"], vec!["b", "2"]]
        );
    }

    #[tokio::test]
    async fn test_json_store_missing_and_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let err = store.form_schema(4).await.unwrap_err();
        assert!(matches!(err, AutoexportError::Store(StoreError::FormNotFound(4))));

        tokio::fs::write(dir.path().join("4.json"), "{ nope").await.unwrap();
        let err = store.form_schema(4).await.unwrap_err();
        assert!(matches!(err, AutoexportError::Store(StoreError::Corrupt(_))));
    }
}
