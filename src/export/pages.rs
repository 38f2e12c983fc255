//! Paged reads for export operations
//!
//! Walks the matching entries of a job one fixed-size page at a time. The
//! offset advances by the page size on every fetch, whatever the page
//! returned, so the offset handed back to the caller is always
//! `start_offset + pages × page_size`.

use tracing::debug;

use crate::error::Result;
use crate::store::{Record, RecordStore};

use super::job::ExportJob;

/// Offset-based page cursor over a job's entries
pub struct PagedQuery<'a> {
    store: &'a dyn RecordStore,
    job: &'a ExportJob,
    page_size: u64,
    offset: u64,
    pages_fetched: u32,
    total_fetched: u64,
}

impl<'a> PagedQuery<'a> {
    /// Create a cursor starting at `start_offset`
    ///
    /// # Arguments
    /// * `store` - Record store to read from
    /// * `job` - Job providing form, filter and sorting
    /// * `start_offset` - Offset of the first page
    /// * `page_size` - Entries per page
    pub fn new(
        store: &'a dyn RecordStore,
        job: &'a ExportJob,
        start_offset: u64,
        page_size: u64,
    ) -> Self {
        Self {
            store,
            job,
            page_size,
            offset: start_offset,
            pages_fetched: 0,
            total_fetched: 0,
        }
    }

    /// Fetch the page at the current offset and advance past it
    pub async fn next_page(&mut self) -> Result<Vec<Record>> {
        debug!(
            "Fetching page #{} of export {} at offset {}",
            self.pages_fetched + 1,
            self.job.export_id(),
            self.offset
        );

        let page = self
            .store
            .fetch_page(
                self.job.form_id(),
                self.job.filter(),
                self.job.sorting(),
                self.offset,
                self.page_size,
            )
            .await?;

        self.offset += self.page_size;
        self.pages_fetched += 1;
        self.total_fetched += page.len() as u64;
        debug!(
            "Fetched {} entries (total this run: {})",
            page.len(),
            self.total_fetched
        );
        Ok(page)
    }

    /// Offset of the next page
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Pages fetched so far
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }
}
