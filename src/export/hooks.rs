//! Extension points of the export run
//!
//! Every method has a pass-through default, so implementors override only
//! what they need. Hooks run synchronously inside the writer loop.

use std::time::Duration;

use crate::store::{RawValue, Record};

use super::job::ExportJob;

/// Callbacks invoked by the export coordinator
pub trait ExportHooks: Send + Sync {
    /// Wall-clock budget of one invocation
    fn max_execution_time(&self, _form_id: u32, default: Duration) -> Duration {
        default
    }

    /// Field separator of the delimited output
    fn separator(&self, _form_id: u32, default: char) -> char {
        default
    }

    /// Header label of a column, before quoting and the formula guard
    fn header_label(&self, _form_id: u32, _field_id: &str, label: String) -> String {
        label
    }

    /// A fetched page, before any of its rows are encoded
    fn records_before_export(&self, _form_id: u32, records: Vec<Record>) -> Vec<Record> {
        records
    }

    /// Raw value of one cell, before decoding
    fn field_value(
        &self,
        _form_id: u32,
        _field_id: &str,
        value: RawValue,
        _record: &Record,
    ) -> RawValue {
        value
    }

    /// Encoded text of one page, right before it is appended to the file
    fn export_lines(&self, _form_id: u32, lines: String) -> String {
        lines
    }

    /// Fired once when every matching entry has been written
    fn post_export(&self, _job: &ExportJob) {}
}

/// Hooks that change nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl ExportHooks for DefaultHooks {}
