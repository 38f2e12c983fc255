//! Row writers for export operations
//!
//! This module provides a unified interface for appending rows to the
//! different output formats (delimited text, spreadsheet). Every write is a
//! scoped open → append → close, so no handle outlives an invocation and a
//! later invocation can pick up the same file.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::error::{ExportError, Result};

use super::hooks::ExportHooks;
use super::job::{ExportFormat, ExportJob};

pub mod csv;
pub mod spreadsheet;

pub use csv::CsvWriter;
pub use spreadsheet::SpreadsheetWriter;

/// Trait for writing rows to one output file
#[async_trait]
pub trait RowWriter: Send + Sync {
    /// Start the file from scratch with the header row
    ///
    /// # Arguments
    /// * `header` - Column labels, already guarded but not quoted
    async fn write_header(&mut self, header: &[String]) -> Result<()>;

    /// Append one page of rows
    ///
    /// # Returns
    /// * `Result<usize>` - Number of rows written
    async fn write_rows(&mut self, rows: &[Vec<String>]) -> Result<usize>;

    /// Write any trailer once the export is complete
    async fn finalize(&mut self) -> Result<()>;

    /// Path of the output file
    fn path(&self) -> &Path;

    /// Get the current file size in bytes
    async fn file_size(&self) -> Result<u64> {
        let metadata = tokio::fs::metadata(self.path())
            .await
            .map_err(|e| sink_error(self.path(), e))?;
        Ok(metadata.len())
    }
}

/// Writers for every file a job produces, in `output_files` order
pub fn open_writers(
    job: &ExportJob,
    separator: char,
    hooks: Arc<dyn ExportHooks>,
) -> Result<Vec<Box<dyn RowWriter>>> {
    let mut writers: Vec<Box<dyn RowWriter>> = Vec::with_capacity(2);

    let csv_path = job.csv_path();
    validate_path(&csv_path)?;
    writers.push(Box::new(CsvWriter::new(
        csv_path,
        job.form_id(),
        separator,
        hooks,
    )));

    if job.format() == ExportFormat::Spreadsheet {
        let xls_path = job.spreadsheet_path();
        validate_path(&xls_path)?;
        writers.push(Box::new(SpreadsheetWriter::new(xls_path)));
    }

    Ok(writers)
}

/// Append bytes to a file, creating it if needed
///
/// With `truncate` the previous content is discarded first.
pub(crate) async fn append_to_file(path: &Path, bytes: &[u8], truncate: bool) -> Result<()> {
    let mut options = OpenOptions::new();
    options.create(true);
    if truncate {
        options.write(true).truncate(true);
    } else {
        options.append(true);
    }

    let mut file = options.open(path).await.map_err(|e| sink_error(path, e))?;
    file.write_all(bytes).await.map_err(|e| sink_error(path, e))?;
    file.flush().await.map_err(|e| sink_error(path, e))?;
    Ok(())
}

/// Helper function to validate file path and directory
///
/// # Arguments
/// * `path` - File path to validate
///
/// # Returns
/// * `Result<()>` - Success or error
pub(crate) fn validate_path(path: &Path) -> Result<()> {
    // Check if parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(ExportError::Sink {
                path: path.display().to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("directory does not exist: {}", parent.display()),
                ),
            }
            .into());
        }
    }

    Ok(())
}

fn sink_error(path: &Path, source: std::io::Error) -> crate::error::AutoexportError {
    ExportError::Sink {
        path: path.display().to_string(),
        source,
    }
    .into()
}
