//! Export coordinator for orchestrating export operations
//!
//! This module provides the paginated writer that brings together the record
//! store, the row writers and progress tracking. One call to
//! [`ExportCoordinator::run`] is one time-bounded invocation: it writes pages
//! until the matching set is exhausted or the deadline passes, then reports
//! an [`ExportStatus`] the caller hands back on the next invocation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{FixedOffset, Offset, Utc};
use tracing::{debug, info};

use crate::error::Result;
use crate::store::{DATE_CREATED, FieldRowMap, FormSchema, Record, RecordStore};

use super::hooks::{DefaultHooks, ExportHooks};
use super::job::ExportJob;
use super::pages::PagedQuery;
use super::progress::ProgressTracker;
use super::status::ExportStatus;
use super::values::{guard_formula, local_timestamp, plain_cell, sub_row_cells};
use super::writers::{RowWriter, open_writers};

/// Entries fetched per page
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Wall-clock budget of one invocation
pub const DEFAULT_MAX_EXECUTION_TIME: Duration = Duration::from_secs(20);

/// Tunables of the paginated writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub page_size: u64,
    pub max_execution_time: Duration,
    pub separator: char,
    /// Timezone of the creation date column and of day boundaries
    pub timezone: FixedOffset,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_execution_time: DEFAULT_MAX_EXECUTION_TIME,
            separator: ',',
            timezone: Utc.fix(),
        }
    }
}

/// Coordinator for export operations
///
/// Holds no per-job state; everything needed to resume lives in the job and
/// the offset passed to [`run`](Self::run).
pub struct ExportCoordinator {
    /// Source of schemas and entries
    store: Arc<dyn RecordStore>,
    /// Extension points
    hooks: Arc<dyn ExportHooks>,
    settings: EngineSettings,
    /// Whether to draw a progress bar
    show_progress: bool,
}

impl ExportCoordinator {
    /// Create a new export coordinator with pass-through hooks
    pub fn new(store: Arc<dyn RecordStore>, settings: EngineSettings) -> Self {
        Self {
            store,
            hooks: Arc::new(DefaultHooks),
            settings,
            show_progress: false,
        }
    }

    /// Replace the hooks
    pub fn with_hooks(mut self, hooks: Arc<dyn ExportHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Enable or disable the progress bar
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Run one invocation of an export
    ///
    /// Starting at offset 0 recreates the output files with a fresh header
    /// and fixes the list field widths on the job; any other offset appends
    /// to what earlier invocations wrote, reusing those widths.
    ///
    /// # Arguments
    /// * `job` - Export to run, persisted by the caller between invocations
    /// * `start_offset` - Offset returned by the previous invocation, or 0
    ///
    /// # Returns
    /// * `Result<ExportStatus>` - Where this invocation stopped
    pub async fn run(&self, job: &mut ExportJob, start_offset: u64) -> Result<ExportStatus> {
        let start_time = Instant::now();
        let form_id = job.form_id();
        let deadline = self
            .hooks
            .max_execution_time(form_id, self.settings.max_execution_time);
        let separator = self.hooks.separator(form_id, self.settings.separator);

        let schema = self.store.form_schema(form_id).await?;
        let total = self.store.count_matching(form_id, job.filter()).await?;
        let mut remaining = if start_offset == 0 {
            total as i64
        } else {
            total as i64 - start_offset as i64
        };

        info!(
            "Starting export {} at offset {} ({} of {} entries remaining)",
            job.export_id(),
            start_offset,
            remaining.max(0),
            total
        );

        let row_map = match job.sub_columns() {
            Some(widths) if start_offset > 0 => widths.clone(),
            _ => {
                let list_fields = schema.list_fields(job.fields());
                let widths = self
                    .store
                    .field_row_counts(form_id, job.filter(), &list_fields, total)
                    .await?;
                job.fix_sub_columns(widths.clone());
                widths
            }
        };
        debug!("Sub-column widths: {:?}", row_map);
        let job: &ExportJob = job;

        let mut writers = open_writers(job, separator, self.hooks.clone())?;
        if start_offset == 0 {
            let header = self.header_row(job, &schema, &row_map);
            for writer in writers.iter_mut() {
                writer.write_header(&header).await?;
            }
        }

        let tracker = ProgressTracker::new(total, start_offset, self.show_progress);
        let mut query = PagedQuery::new(
            self.store.as_ref(),
            job,
            start_offset,
            self.settings.page_size,
        );

        while remaining > 0 {
            let page = query.next_page().await?;
            let page = self.hooks.records_before_export(form_id, page);

            let rows: Vec<Vec<String>> = page
                .iter()
                .map(|record| self.data_row(job, record, &row_map))
                .collect();
            for writer in writers.iter_mut() {
                writer.write_rows(&rows).await?;
            }

            remaining -= self.settings.page_size as i64;
            tracker.update(query.offset());

            if start_time.elapsed() >= deadline {
                debug!(
                    "Deadline of {:?} reached after {} pages",
                    deadline,
                    query.pages_fetched()
                );
                break;
            }
        }
        tracker.finish();

        let status = ExportStatus::derive(job.export_id(), query.offset(), remaining, total);
        if status.is_complete() {
            finalize_all(&mut writers).await?;
            self.hooks.post_export(job);
            info!(
                "Export {} complete in {} ms",
                job.export_id(),
                start_time.elapsed().as_millis()
            );
        } else {
            info!(
                "Export {} paused at offset {} ({})",
                job.export_id(),
                status.offset,
                status.progress_text()
            );
        }

        Ok(status)
    }

    /// Run invocations back to back until the export completes
    pub async fn run_to_completion(&self, job: &mut ExportJob) -> Result<ExportStatus> {
        let mut status = self.run(job, 0).await?;
        while !status.is_complete() {
            status = self.run(job, status.offset).await?;
        }
        Ok(status)
    }

    fn header_row(
        &self,
        job: &ExportJob,
        schema: &FormSchema,
        row_map: &FieldRowMap,
    ) -> Vec<String> {
        let mut header = Vec::with_capacity(job.fields().len());
        for field_id in job.fields() {
            let label = self
                .hooks
                .header_label(job.form_id(), field_id, schema.label_for(field_id));
            let label = guard_formula(label);
            match row_map.get(field_id) {
                Some(&width) => header.extend((1..=width).map(|i| format!("{label} {i}"))),
                None => header.push(label),
            }
        }
        header
    }

    fn data_row(&self, job: &ExportJob, record: &Record, row_map: &FieldRowMap) -> Vec<String> {
        let mut row = Vec::with_capacity(job.fields().len());
        for field_id in job.fields() {
            if field_id == DATE_CREATED {
                row.push(local_timestamp(record.date_created, self.settings.timezone));
                continue;
            }

            let raw = self
                .hooks
                .field_value(job.form_id(), field_id, record.raw(field_id), record);
            match row_map.get(field_id) {
                Some(&width) => row.extend(sub_row_cells(&raw, width, field_id, record.id)),
                None => row.push(plain_cell(&raw)),
            }
        }
        row
    }
}

async fn finalize_all(writers: &mut [Box<dyn RowWriter>]) -> Result<()> {
    for writer in writers.iter_mut() {
        writer.finalize().await?;
        debug!(
            "Finalized {} ({} bytes)",
            writer.path().display(),
            writer.file_size().await?
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AutoexportError, StoreError};
    use crate::export::criteria::Criteria;
    use crate::export::job::ExportFormat;
    use crate::store::{EntryFilter, FieldDescriptor, FieldKind, Sorting};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    // Store whose page fetch always fails
    struct FailingStore {
        fetches: AtomicU32,
    }

    #[async_trait]
    impl RecordStore for FailingStore {
        async fn form_schema(&self, form_id: u32) -> Result<FormSchema> {
            Ok(FormSchema {
                id: form_id,
                title: String::new(),
                fields: vec![FieldDescriptor {
                    id: "1".to_string(),
                    label: "Name".to_string(),
                    kind: FieldKind::Simple,
                    inputs: Vec::new(),
                }],
            })
        }

        async fn count_matching(&self, _form_id: u32, _filter: &EntryFilter) -> Result<u64> {
            Ok(5)
        }

        async fn fetch_page(
            &self,
            _form_id: u32,
            _filter: &EntryFilter,
            _sorting: &Sorting,
            _offset: u64,
            _limit: u64,
        ) -> Result<Vec<Record>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::QueryFailed("connection reset".to_string()).into())
        }
    }

    #[test]
    fn test_default_settings() {
        let settings = EngineSettings::default();
        assert_eq!(settings.page_size, 20);
        assert_eq!(settings.max_execution_time, Duration::from_secs(20));
        assert_eq!(settings.separator, ',');
        assert_eq!(settings.timezone.local_minus_utc(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FailingStore {
            fetches: AtomicU32::new(0),
        });
        let criteria = Criteria {
            filter: EntryFilter::default(),
            fields: vec!["1".to_string()],
        };
        let mut job = ExportJob::new(1, "1-fail", criteria, ExportFormat::Delimited, dir.path());

        let coordinator = ExportCoordinator::new(store.clone(), EngineSettings::default());
        let result = coordinator.run(&mut job, 0).await;

        assert!(matches!(
            result,
            Err(AutoexportError::Store(StoreError::QueryFailed(_)))
        ));
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
    }
}
