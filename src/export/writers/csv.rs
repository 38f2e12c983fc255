//! CSV writer for export operations
//!
//! Writes UTF-8 text with a leading byte-order marker. Every cell is wrapped
//! in double quotes with internal quotes doubled, cells are joined by the
//! configured separator, and rows end with `\n`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::export::hooks::ExportHooks;
use crate::export::values::quote;

use super::{RowWriter, append_to_file};

/// UTF-8 byte-order marker
pub const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Writer for CSV format
pub struct CsvWriter {
    /// Path to the output file
    path: PathBuf,
    /// Form the rows belong to, passed to hooks
    form_id: u32,
    /// Field separator
    separator: char,
    /// Hooks applied to each page of text
    hooks: Arc<dyn ExportHooks>,
    /// Number of rows written by this writer
    written: usize,
}

impl CsvWriter {
    /// Create a new CSV writer
    ///
    /// # Arguments
    /// * `path` - Output file path
    /// * `form_id` - Form being exported
    /// * `separator` - Field separator
    /// * `hooks` - Hooks receiving each page of text
    pub fn new(path: PathBuf, form_id: u32, separator: char, hooks: Arc<dyn ExportHooks>) -> Self {
        debug!("Created CSV writer for: {}", path.display());

        Self {
            path,
            form_id,
            separator,
            hooks,
            written: 0,
        }
    }

    /// Encode one row as a CSV line
    fn encode_line(&self, cells: &[String]) -> String {
        let mut line = cells
            .iter()
            .map(|cell| quote(cell))
            .collect::<Vec<_>>()
            .join(&self.separator.to_string());
        line.push('\n');
        line
    }
}

#[async_trait]
impl RowWriter for CsvWriter {
    async fn write_header(&mut self, header: &[String]) -> Result<()> {
        let line = self.hooks.export_lines(self.form_id, self.encode_line(header));

        let mut buffer = Vec::with_capacity(BOM.len() + line.len());
        buffer.extend_from_slice(BOM);
        buffer.extend_from_slice(line.as_bytes());
        append_to_file(&self.path, &buffer, true).await?;

        debug!("Wrote CSV headers: {} columns", header.len());
        Ok(())
    }

    async fn write_rows(&mut self, rows: &[Vec<String>]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let lines: String = rows.iter().map(|row| self.encode_line(row)).collect();
        let lines = self.hooks.export_lines(self.form_id, lines);
        append_to_file(&self.path, lines.as_bytes(), false).await?;

        self.written += rows.len();
        debug!(
            "Wrote {} rows to CSV (total this run: {})",
            rows.len(),
            self.written
        );
        Ok(rows.len())
    }

    async fn finalize(&mut self) -> Result<()> {
        debug!("Finalized CSV file: {} ({} rows)", self.path.display(), self.written);
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::hooks::DefaultHooks;
    use tokio::fs;

    fn writer(path: PathBuf, separator: char) -> CsvWriter {
        CsvWriter::new(path, 1, separator, Arc::new(DefaultHooks))
    }

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_csv_writer_basic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");
        let mut writer = writer(path.clone(), ',');

        writer.write_header(&cells(&["Name", "Age"])).await.unwrap();
        let written = writer
            .write_rows(&[cells(&["Alice", "30"]), cells(&["Bob", "25"])])
            .await
            .unwrap();
        assert_eq!(written, 2);
        writer.finalize().await.unwrap();

        let bytes = fs::read(&path).await.unwrap();
        assert!(bytes.starts_with(BOM));
        let content = String::from_utf8(bytes[BOM.len()..].to_vec()).unwrap();
        assert_eq!(content, "\"Name\",\"Age\"\n\"Alice\",\"30\"\n\"Bob\",\"25\"\n");
    }

    #[tokio::test]
    async fn test_csv_writer_with_special_characters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("special.csv");
        let mut writer = writer(path.clone(), ';');

        writer.write_header(&cells(&["text"])).await.unwrap();
        writer
            .write_rows(&[cells(&["Quote: \"test\""]), cells(&["a;b"])])
            .await
            .unwrap();

        let content = fs::read_to_string(&path).await.unwrap();
        assert!(content.contains("\"Quote: \"\"test\"\"\"\n"));
        assert!(content.contains("\"a;b\"\n"));
    }

    #[tokio::test]
    async fn test_csv_writer_header_restarts_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("restart.csv");
        let mut writer = writer(path.clone(), ',');

        writer.write_header(&cells(&["a"])).await.unwrap();
        writer.write_rows(&[cells(&["1"])]).await.unwrap();
        writer.write_header(&cells(&["a"])).await.unwrap();

        let content = fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_csv_writer_file_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("size.csv");
        let mut writer = writer(path, ',');

        writer.write_header(&cells(&["test"])).await.unwrap();
        let size = writer.file_size().await.unwrap();
        assert_eq!(size, (BOM.len() + "\"test\"\n".len()) as u64);
    }
}
