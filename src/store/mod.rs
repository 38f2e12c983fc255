//! Record store collaborator
//!
//! The export engine never talks to a database directly. It sees forms and
//! their entries through the [`RecordStore`] trait:
//!
//! - `form_schema`: field definitions used for column headers and expansion
//! - `count_matching`: number of entries matching a filter
//! - `fetch_page`: one bounded, sorted page of entries
//! - `field_row_counts`: maximum sub-row count per multi-row field
//!
//! Two implementations ship with the crate: [`MemoryStore`] keeps everything
//! in memory, [`JsonFileStore`] reads one JSON document per form from disk.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod json;
pub mod memory;
pub mod value;

pub use json::JsonFileStore;
pub use memory::MemoryStore;
pub use value::RawValue;

/// Field id → number of sub-columns for multi-row fields
pub type FieldRowMap = BTreeMap<String, usize>;

/// Entry metadata columns appended to every export, with their header labels
pub const META_FIELDS: [(&str, &str); 6] = [
    ("created_by", "Created By (User Id)"),
    ("id", "Entry Id"),
    ("date_created", "Entry Date"),
    ("source_url", "Source Url"),
    ("user_agent", "User Agent"),
    ("ip", "User IP"),
];

/// Field id of the creation timestamp column
pub const DATE_CREATED: &str = "date_created";

/// Page size used by the default sub-row scan
const ROW_SCAN_PAGE_SIZE: u64 = 200;

/// How a field stores its value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Single value (or one value per input for composite fields)
    #[default]
    Simple,
    /// Repeating group of rows, serialized into one value
    List,
}

/// One input of a composite field, e.g. the first name of a name field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDescriptor {
    /// Input id, `<field id>.<n>`
    pub id: String,
    pub label: String,
}

/// Definition of one form field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub kind: FieldKind,
    /// Sub-inputs of a composite field; empty for plain fields
    #[serde(default)]
    pub inputs: Vec<InputDescriptor>,
}

/// A resolved field lookup: the field plus the input when an input id was asked for
#[derive(Debug, Clone, Copy)]
pub struct FieldRef<'a> {
    pub field: &'a FieldDescriptor,
    pub input: Option<&'a InputDescriptor>,
}

impl FieldRef<'_> {
    /// Column label, `Field (Input)` for composite inputs
    pub fn label(&self) -> String {
        match self.input {
            Some(input) => format!("{} ({})", self.field.label, input.label),
            None => self.field.label.clone(),
        }
    }

    /// Whether the referenced column holds multi-row values
    pub fn is_list(&self) -> bool {
        self.input.is_none() && self.field.kind == FieldKind::List
    }
}

/// Form definition: ordered field descriptors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSchema {
    pub id: u32,
    #[serde(default)]
    pub title: String,
    pub fields: Vec<FieldDescriptor>,
}

impl FormSchema {
    /// Look up a field or composite input by id
    pub fn field_by_id(&self, id: &str) -> Option<FieldRef<'_>> {
        if let Some(field) = self.fields.iter().find(|f| f.id == id) {
            return Some(FieldRef { field, input: None });
        }

        let (parent, _) = id.split_once('.')?;
        let field = self.fields.iter().find(|f| f.id == parent)?;
        let input = field.inputs.iter().find(|i| i.id == id)?;
        Some(FieldRef {
            field,
            input: Some(input),
        })
    }

    /// Header label for any exportable column, metadata included
    pub fn label_for(&self, id: &str) -> String {
        if let Some((_, label)) = META_FIELDS.iter().find(|(meta, _)| *meta == id) {
            return (*label).to_string();
        }
        self.field_by_id(id)
            .map(|f| f.label())
            .unwrap_or_else(|| id.to_string())
    }

    /// Ids of the multi-row fields among `fields`
    pub fn list_fields(&self, fields: &[String]) -> Vec<String> {
        fields
            .iter()
            .filter(|id| self.field_by_id(id).is_some_and(|f| f.is_list()))
            .cloned()
            .collect()
    }
}

/// Lifecycle state of an entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    #[default]
    Active,
    Spam,
    Trash,
}

/// One stored form entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    /// Creation time in the store's canonical timezone (UTC)
    pub date_created: DateTime<Utc>,
    #[serde(default)]
    pub status: EntryStatus,
    /// Field and metadata values keyed by field or input id
    #[serde(default)]
    pub values: BTreeMap<String, RawValue>,
}

impl Record {
    /// Create an active record with no values
    pub fn new(id: u64, date_created: DateTime<Utc>) -> Self {
        Self {
            id,
            date_created,
            status: EntryStatus::Active,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style value setter
    pub fn with_value(mut self, field_id: &str, value: impl Into<RawValue>) -> Self {
        self.values.insert(field_id.to_string(), value.into());
        self
    }

    /// Raw value of a field; `id` is answered from the record itself
    pub fn raw(&self, field_id: &str) -> RawValue {
        match field_id {
            "id" => RawValue::from(self.id),
            _ => self.values.get(field_id).cloned().unwrap_or_default(),
        }
    }
}

/// Equality condition on one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field_id: String,
    pub value: String,
}

/// Query filter: entry status, creation date range, optional field equality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryFilter {
    pub status: Option<EntryStatus>,
    /// Inclusive lower bound on `date_created`
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `date_created`
    pub end: Option<DateTime<Utc>>,
    pub field: Option<FieldFilter>,
}

impl Default for EntryFilter {
    fn default() -> Self {
        Self {
            status: Some(EntryStatus::Active),
            start: None,
            end: None,
            field: None,
        }
    }
}

impl EntryFilter {
    /// Check a record against every condition of the filter
    pub fn matches(&self, record: &Record) -> bool {
        if self.status.is_some_and(|status| record.status != status) {
            return false;
        }
        if self.start.is_some_and(|start| record.date_created < start) {
            return false;
        }
        if self.end.is_some_and(|end| record.date_created > end) {
            return false;
        }
        match &self.field {
            Some(filter) => record.raw(&filter.field_id).to_text() == filter.value,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Id,
    DateCreated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Sort order for page fetches; defaults to entry id, descending
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sorting {
    pub key: SortKey,
    pub direction: SortDirection,
}

/// Source of forms and entries for the export engine
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Field definitions of a form
    async fn form_schema(&self, form_id: u32) -> Result<FormSchema>;

    /// Number of entries of `form_id` matching `filter`
    async fn count_matching(&self, form_id: u32, filter: &EntryFilter) -> Result<u64>;

    /// One page of matching entries, `limit` entries starting at `offset`
    async fn fetch_page(
        &self,
        form_id: u32,
        filter: &EntryFilter,
        sorting: &Sorting,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Record>>;

    /// Maximum sub-row count of each multi-row field over the first `limit` matches
    ///
    /// The default scans the matching entries page by page; stores with a
    /// query language should answer this with an aggregate. Values that fail
    /// to decode count as zero rows. Fields whose maximum is zero are left out.
    async fn field_row_counts(
        &self,
        form_id: u32,
        filter: &EntryFilter,
        list_fields: &[String],
        limit: u64,
    ) -> Result<FieldRowMap> {
        let mut counts = FieldRowMap::new();
        if list_fields.is_empty() {
            return Ok(counts);
        }

        let sorting = Sorting::default();
        let mut offset = 0;
        while offset < limit {
            let page_size = ROW_SCAN_PAGE_SIZE.min(limit - offset);
            let page = self
                .fetch_page(form_id, filter, &sorting, offset, page_size)
                .await?;
            if page.is_empty() {
                break;
            }

            for record in &page {
                for field_id in list_fields {
                    let rows = record
                        .raw(field_id)
                        .decode_sub_rows()
                        .map(|rows| rows.len())
                        .unwrap_or(0);
                    if rows > 0 {
                        let max = counts.entry(field_id.clone()).or_insert(0);
                        *max = (*max).max(rows);
                    }
                }
            }
            offset += page.len() as u64;
        }

        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn schema() -> FormSchema {
        FormSchema {
            id: 1,
            title: "Contact".to_string(),
            fields: vec![
                FieldDescriptor {
                    id: "1".to_string(),
                    label: "Name".to_string(),
                    kind: FieldKind::Simple,
                    inputs: vec![
                        InputDescriptor {
                            id: "1.3".to_string(),
                            label: "First".to_string(),
                        },
                        InputDescriptor {
                            id: "1.6".to_string(),
                            label: "Last".to_string(),
                        },
                    ],
                },
                FieldDescriptor {
                    id: "2".to_string(),
                    label: "Guests".to_string(),
                    kind: FieldKind::List,
                    inputs: Vec::new(),
                },
            ],
        }
    }

    #[test]
    fn test_field_by_id_resolves_inputs() {
        let schema = schema();
        let first = schema.field_by_id("1.3").unwrap();
        assert_eq!(first.label(), "Name (First)");
        assert!(!first.is_list());
        assert!(schema.field_by_id("2").unwrap().is_list());
        assert!(schema.field_by_id("1.9").is_none());
        assert!(schema.field_by_id("7").is_none());
    }

    #[test]
    fn test_label_for_metadata_and_unknown() {
        let schema = schema();
        assert_eq!(schema.label_for("date_created"), "Entry Date");
        assert_eq!(schema.label_for("ip"), "User IP");
        assert_eq!(schema.label_for("99"), "99");
    }

    #[test]
    fn test_filter_matches_bounds_inclusive() {
        let at = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();
        let record = Record::new(5, at).with_value("4", "yes");
        let filter = EntryFilter {
            start: Some(at),
            end: Some(at),
            field: Some(FieldFilter {
                field_id: "4".to_string(),
                value: "yes".to_string(),
            }),
            ..EntryFilter::default()
        };
        assert!(filter.matches(&record));

        let mut trashed = record.clone();
        trashed.status = EntryStatus::Trash;
        assert!(!filter.matches(&trashed));

        let other = Record::new(6, at).with_value("4", "no");
        assert!(!filter.matches(&other));
    }
}
