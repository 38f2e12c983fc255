//! Spreadsheet writer for export operations
//!
//! Produces an XML Spreadsheet 2003 workbook (`.xls`), which spreadsheet
//! applications open natively. The format is plain markup, so it can be
//! appended page by page like the CSV file: the header writes the workbook
//! preamble and the first row, each page appends `<Row>` elements, and
//! `finalize` closes the workbook once the export is complete.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;

use super::{RowWriter, append_to_file};

const WORKBOOK_OPEN: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
    "<?mso-application progid=\"Excel.Sheet\"?>\n",
    "<Workbook xmlns=\"urn:schemas-microsoft-com:office:spreadsheet\" ",
    "xmlns:ss=\"urn:schemas-microsoft-com:office:spreadsheet\">\n",
    "<Worksheet ss:Name=\"Entries\">\n",
    "<Table>\n"
);

const WORKBOOK_CLOSE: &str = "</Table>\n</Worksheet>\n</Workbook>\n";

/// Writer for XML Spreadsheet 2003 format
pub struct SpreadsheetWriter {
    /// Path to the output file
    path: PathBuf,
    /// Number of rows written by this writer
    written: usize,
}

impl SpreadsheetWriter {
    /// Create a new spreadsheet writer
    pub fn new(path: PathBuf) -> Self {
        debug!("Created spreadsheet writer for: {}", path.display());
        Self { path, written: 0 }
    }

    fn encode_row(cells: &[String]) -> String {
        let mut row = String::from("<Row>");
        for cell in cells {
            row.push_str("<Cell><Data ss:Type=\"String\">");
            row.push_str(&escape_xml(cell));
            row.push_str("</Data></Cell>");
        }
        row.push_str("</Row>\n");
        row
    }
}

/// Escape text for an XML element, dropping characters XML 1.0 forbids
fn escape_xml(value: &str) -> String {
    let allowed: String = value
        .chars()
        .filter(|&c| c >= ' ' || matches!(c, '\n' | '\t' | '\r'))
        .collect();
    allowed
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
        .replace('\n', "&#10;")
}

#[async_trait]
impl RowWriter for SpreadsheetWriter {
    async fn write_header(&mut self, header: &[String]) -> Result<()> {
        let mut buffer = String::from(WORKBOOK_OPEN);
        buffer.push_str(&Self::encode_row(header));
        append_to_file(&self.path, buffer.as_bytes(), true).await?;
        debug!("Wrote spreadsheet header: {} columns", header.len());
        Ok(())
    }

    async fn write_rows(&mut self, rows: &[Vec<String>]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let buffer: String = rows.iter().map(|row| Self::encode_row(row)).collect();
        append_to_file(&self.path, buffer.as_bytes(), false).await?;
        self.written += rows.len();
        Ok(rows.len())
    }

    async fn finalize(&mut self) -> Result<()> {
        append_to_file(&self.path, WORKBOOK_CLOSE.as_bytes(), false).await?;
        debug!(
            "Finalized spreadsheet: {} ({} rows)",
            self.path.display(),
            self.written
        );
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
        assert_eq!(escape_xml("line\nbreak"), "line&#10;break");
        assert_eq!(escape_xml("bell\u{7}"), "bell");
        assert_eq!(escape_xml("O'Neil <&>"), "O&apos;Neil &lt;&amp;&gt;");
        assert_eq!(escape_xml("tab\there"), "tab\there");
    }

    #[tokio::test]
    async fn test_spreadsheet_document_structure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.xls");
        let mut writer = SpreadsheetWriter::new(path.clone());

        writer.write_header(&["Name".to_string()]).await.unwrap();
        writer
            .write_rows(&[vec!["Ann".to_string()], vec!["'=1+1".to_string()]])
            .await
            .unwrap();
        writer.finalize().await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(content.starts_with("<?xml"));
        assert!(content.ends_with("</Workbook>\n"));
        assert_eq!(content.matches("<Row>").count(), 3);
        assert!(content.contains("<Data ss:Type=\"String\">&apos;=1+1</Data>"));
    }
}
