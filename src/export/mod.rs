//! Export module for paginated, resumable form exports
//!
//! This module provides the export engine behind scheduled form exports:
//! - Criteria resolution from per-form settings
//! - Time-bounded paginated writing that can resume at an offset
//! - Status reporting for callers that persist progress between runs
//! - Multiple output formats (delimited text, XML spreadsheet)
//!
//! # Architecture
//!
//! The export system is built on three main components:
//!
//! 1. **criteria**: Turns settings into an entry filter and a column list
//! 2. **ExportCoordinator**: Writes pages until done or out of time
//! 3. **ExportStatus**: Tells the caller where to resume
//!
//! Row encoding is delegated to [`writers::RowWriter`] implementations, and
//! every step can be adjusted through [`hooks::ExportHooks`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use chrono::Utc;
//! use autoexport::export::{
//!     EngineSettings, ExportCoordinator, ExportCriteria, ExportFormat, ExportJob,
//! };
//! use autoexport::store::{JsonFileStore, RecordStore};
//!
//! # async fn demo() -> autoexport::error::Result<()> {
//! let store = Arc::new(JsonFileStore::new("/var/lib/autoexport/forms"));
//! let settings = EngineSettings::default();
//! let schema = store.form_schema(3).await?;
//!
//! let criteria = autoexport::export::criteria::resolve(
//!     &ExportCriteria::default(),
//!     &schema,
//!     Utc::now(),
//!     settings.timezone,
//! );
//! let export_id = ExportJob::export_id_for(3, Utc::now().with_timezone(&settings.timezone));
//! let mut job = ExportJob::new(3, export_id, criteria, ExportFormat::Delimited, "/tmp");
//!
//! let coordinator = ExportCoordinator::new(store, settings);
//! let mut status = coordinator.run(&mut job, 0).await?;
//! while !status.is_complete() {
//!     status = coordinator.run(&mut job, status.offset).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod criteria;
pub mod hooks;
pub mod job;
pub mod pages;
pub mod progress;
pub mod status;
pub mod values;
pub mod writers;

pub use coordinator::{EngineSettings, ExportCoordinator};
pub use criteria::{Criteria, DateRange, ExportCriteria};
pub use hooks::{DefaultHooks, ExportHooks};
pub use job::{ExportFormat, ExportJob};
pub use progress::ProgressTracker;
pub use status::{ExportStatus, RunState};
pub use writers::{CsvWriter, RowWriter, SpreadsheetWriter};
