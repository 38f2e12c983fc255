//! In-memory record store
//!
//! Holds form schemas and entries in process memory. Useful for embedding,
//! for tests, and as the query engine behind [`super::JsonFileStore`].

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Result, StoreError};

use super::{EntryFilter, FormSchema, Record, RecordStore, SortDirection, SortKey, Sorting};

/// A form together with its entries
#[derive(Debug, Clone)]
struct FormData {
    schema: FormSchema,
    records: Vec<Record>,
}

/// Record store backed by process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    forms: RwLock<BTreeMap<u32, FormData>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style form registration
    pub fn with_form(self, schema: FormSchema, records: Vec<Record>) -> Self {
        if let Ok(mut forms) = self.forms.write() {
            forms.insert(schema.id, FormData { schema, records });
        }
        self
    }

    /// Add an entry to an existing form
    pub fn push_record(&self, form_id: u32, record: Record) -> Result<()> {
        let mut forms = self
            .forms
            .write()
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        let form = forms
            .get_mut(&form_id)
            .ok_or(StoreError::FormNotFound(form_id))?;
        form.records.push(record);
        Ok(())
    }

    /// Delete an entry; returns whether it existed
    pub fn remove_record(&self, form_id: u32, record_id: u64) -> Result<bool> {
        let mut forms = self
            .forms
            .write()
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        let form = forms
            .get_mut(&form_id)
            .ok_or(StoreError::FormNotFound(form_id))?;
        let before = form.records.len();
        form.records.retain(|r| r.id != record_id);
        Ok(form.records.len() < before)
    }

    fn with_data<T>(&self, form_id: u32, f: impl FnOnce(&FormData) -> T) -> Result<T> {
        let forms = self
            .forms
            .read()
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        let form = forms.get(&form_id).ok_or(StoreError::FormNotFound(form_id))?;
        Ok(f(form))
    }
}

/// Filter, sort and slice a set of records
pub(crate) fn select(
    records: &[Record],
    filter: &EntryFilter,
    sorting: &Sorting,
    offset: u64,
    limit: u64,
) -> Vec<Record> {
    let mut matching: Vec<&Record> = records.iter().filter(|r| filter.matches(r)).collect();

    matching.sort_by(|a, b| {
        let ordering = match sorting.key {
            SortKey::Id => a.id.cmp(&b.id),
            SortKey::DateCreated => a.date_created.cmp(&b.date_created).then(a.id.cmp(&b.id)),
        };
        match sorting.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });

    matching
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn form_schema(&self, form_id: u32) -> Result<FormSchema> {
        self.with_data(form_id, |form| form.schema.clone())
    }

    async fn count_matching(&self, form_id: u32, filter: &EntryFilter) -> Result<u64> {
        self.with_data(form_id, |form| {
            form.records.iter().filter(|r| filter.matches(r)).count() as u64
        })
    }

    async fn fetch_page(
        &self,
        form_id: u32,
        filter: &EntryFilter,
        sorting: &Sorting,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Record>> {
        self.with_data(form_id, |form| {
            select(&form.records, filter, sorting, offset, limit)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AutoexportError;
    use crate::store::FieldKind;
    use crate::store::FieldDescriptor;
    use chrono::{TimeZone, Utc};

    fn store(count: u64) -> MemoryStore {
        let schema = FormSchema {
            id: 9,
            title: String::new(),
            fields: vec![FieldDescriptor {
                id: "1".to_string(),
                label: "Rows".to_string(),
                kind: FieldKind::List,
                inputs: Vec::new(),
            }],
        };
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let records = (1..=count)
            .map(|id| {
                let rows = (0..id % 4).map(|i| format!("[\"{i}\"]")).collect::<Vec<_>>();
                Record::new(id, base).with_value("1", format!("[{}]", rows.join(",")))
            })
            .collect();
        MemoryStore::new().with_form(schema, records)
    }

    #[tokio::test]
    async fn test_fetch_page_sorted_by_id_desc() {
        let store = store(45);
        let page = store
            .fetch_page(9, &EntryFilter::default(), &Sorting::default(), 20, 20)
            .await
            .unwrap();
        let ids: Vec<u64> = page.iter().map(|r| r.id).collect();
        assert_eq!(ids.first(), Some(&25));
        assert_eq!(ids.last(), Some(&6));

        let tail = store
            .fetch_page(9, &EntryFilter::default(), &Sorting::default(), 40, 20)
            .await
            .unwrap();
        assert_eq!(tail.len(), 5);
    }

    #[tokio::test]
    async fn test_unknown_form() {
        let store = store(1);
        let err = store.count_matching(1, &EntryFilter::default()).await.unwrap_err();
        assert!(matches!(err, AutoexportError::Store(StoreError::FormNotFound(1))));
    }

    #[tokio::test]
    async fn test_default_field_row_counts_scan() {
        let store = store(10);
        let counts = store
            .field_row_counts(9, &EntryFilter::default(), &["1".to_string()], 10)
            .await
            .unwrap();
        assert_eq!(counts.get("1"), Some(&3));
    }

    #[tokio::test]
    async fn test_push_record_updates_count() {
        let store = store(2);
        store
            .push_record(9, Record::new(3, Utc::now()))
            .unwrap();
        assert_eq!(store.count_matching(9, &EntryFilter::default()).await.unwrap(), 3);

        assert!(store.remove_record(9, 1).unwrap());
        assert!(!store.remove_record(9, 1).unwrap());
        assert_eq!(store.count_matching(9, &EntryFilter::default()).await.unwrap(), 2);
    }
}
