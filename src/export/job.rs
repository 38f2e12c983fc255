//! Export job definition
//!
//! An [`ExportJob`] describes one export run: which form, which columns in
//! which order, which entries, and where the files go. It is built once by
//! the criteria resolver. The only thing added later is the sub-column width
//! of each list field, fixed by the invocation that writes the header, so
//! resumed invocations see exactly the same columns and filter.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::store::{EntryFilter, FieldRowMap, Sorting};

use super::criteria::Criteria;

/// Output format of an export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Delimited text only
    #[default]
    Delimited,
    /// Delimited text plus a parallel spreadsheet
    Spreadsheet,
}

/// One immutable export run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportJob {
    form_id: u32,
    export_id: String,
    fields: Vec<String>,
    filter: EntryFilter,
    sorting: Sorting,
    format: ExportFormat,
    output_dir: PathBuf,
    /// Sub-column widths fixed by the first invocation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub_columns: Option<FieldRowMap>,
}

impl ExportJob {
    /// Create a job from resolved criteria
    ///
    /// Entries are always fetched by id, descending.
    pub fn new(
        form_id: u32,
        export_id: impl Into<String>,
        criteria: Criteria,
        format: ExportFormat,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            form_id,
            export_id: export_id.into(),
            fields: criteria.fields,
            filter: criteria.filter,
            sorting: Sorting::default(),
            format,
            output_dir: output_dir.into(),
            sub_columns: None,
        }
    }

    /// Export id for a run started at `now`: `<form id>-<Y-m-d-giA>`
    ///
    /// The timestamp has minute resolution, 12-hour clock without a leading
    /// zero, e.g. `3-2026-10-18-921AM`.
    pub fn export_id_for(form_id: u32, now: DateTime<FixedOffset>) -> String {
        format!("{}-{}", form_id, now.format("%Y-%m-%d-%-I%M%p"))
    }

    pub fn form_id(&self) -> u32 {
        self.form_id
    }

    pub fn export_id(&self) -> &str {
        &self.export_id
    }

    /// Column order of every row, header included
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn filter(&self) -> &EntryFilter {
        &self.filter
    }

    pub fn sorting(&self) -> &Sorting {
        &self.sorting
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path of the delimited text file
    pub fn csv_path(&self) -> PathBuf {
        self.output_dir.join(format!("export-{}.csv", self.export_id))
    }

    /// Path of the spreadsheet file
    pub fn spreadsheet_path(&self) -> PathBuf {
        self.output_dir.join(format!("export-{}.xls", self.export_id))
    }

    /// Sub-column widths of the list fields, once the header is written
    pub fn sub_columns(&self) -> Option<&FieldRowMap> {
        self.sub_columns.as_ref()
    }

    pub(crate) fn fix_sub_columns(&mut self, widths: FieldRowMap) {
        self.sub_columns = Some(widths);
    }

    /// Every file this job produces, in attachment order
    pub fn output_files(&self) -> Vec<PathBuf> {
        match self.format {
            ExportFormat::Delimited => vec![self.csv_path()],
            ExportFormat::Spreadsheet => vec![self.csv_path(), self.spreadsheet_path()],
        }
    }
}
