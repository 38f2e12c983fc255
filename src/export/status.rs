//! Resumable export status
//!
//! After every invocation the writer reports where it stopped. Callers
//! persist the [`ExportStatus`] and pass its `offset` back verbatim on the
//! next invocation; there is no other durable state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether an export has consumed every matching entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Complete,
    InProgress,
}

/// Checkpoint returned by every writer invocation
///
/// Serializes as `{"status": "in_progress", "offset": 20, "exportId": "...", "progress": "44%"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportStatus {
    pub status: RunState,
    /// Offset to resume from; 0 once complete
    pub offset: u64,
    #[serde(rename = "exportId")]
    pub export_id: String,
    /// Percent done while in progress, `None` once complete
    #[serde(with = "progress_text")]
    pub progress: Option<u8>,
}

impl ExportStatus {
    /// Derive the status after an invocation
    ///
    /// # Arguments
    /// * `export_id` - Id of the export run
    /// * `offset` - Offset the writer advanced to
    /// * `remaining` - Entries left; zero or negative means complete
    /// * `total` - Matching entries counted at the start of the invocation
    pub fn derive(export_id: &str, offset: u64, remaining: i64, total: u64) -> Self {
        let complete = remaining <= 0;
        Self {
            status: if complete {
                RunState::Complete
            } else {
                RunState::InProgress
            },
            offset: if complete { 0 } else { offset },
            export_id: export_id.to_string(),
            progress: if complete {
                None
            } else {
                Some(percent_done(remaining, total))
            },
        }
    }

    /// Status of a job that has not written anything yet
    pub fn started(export_id: &str) -> Self {
        Self {
            status: RunState::InProgress,
            offset: 0,
            export_id: export_id.to_string(),
            progress: Some(0),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == RunState::Complete
    }

    /// Progress as shown to users: `"44%"`, or empty once complete
    pub fn progress_text(&self) -> String {
        self.progress.map(|p| format!("{p}%")).unwrap_or_default()
    }
}

impl fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            RunState::Complete => write!(f, "{}: complete", self.export_id),
            RunState::InProgress => write!(
                f,
                "{}: in progress at offset {} ({})",
                self.export_id,
                self.offset,
                self.progress_text()
            ),
        }
    }
}

/// `100 − 100 × remaining / total`, truncated
fn percent_done(remaining: i64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let done = 100.0 - (remaining as f64 / total as f64) * 100.0;
    done.trunc().clamp(0.0, 100.0) as u8
}

mod progress_text {
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &Option<u8>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(p) => serializer.serialize_str(&format!("{p}%")),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text.is_empty() {
            return Ok(None);
        }
        text.trim_end_matches('%')
            .parse::<u8>()
            .map(Some)
            .map_err(|_| {
                de::Error::invalid_value(
                    de::Unexpected::Str(&text),
                    &"a percentage like \"44%\"",
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_progress_after_first_page() {
        let status = ExportStatus::derive("3-x", 20, 25, 45);
        assert_eq!(status.status, RunState::InProgress);
        assert_eq!(status.offset, 20);
        assert_eq!(status.progress_text(), "44%");
    }

    #[test]
    fn test_complete_resets_offset_and_progress() {
        let status = ExportStatus::derive("3-x", 60, -15, 45);
        assert!(status.is_complete());
        assert_eq!(status.offset, 0);
        assert_eq!(status.progress, None);
        assert_eq!(status.progress_text(), "");
    }

    #[test]
    fn test_zero_total_is_complete() {
        let status = ExportStatus::derive("3-x", 0, 0, 0);
        assert!(status.is_complete());
    }

    #[test]
    fn test_serialized_shape() {
        let status = ExportStatus::derive("3-x", 20, 25, 45);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "in_progress",
                "offset": 20,
                "exportId": "3-x",
                "progress": "44%"
            })
        );

        let back: ExportStatus = serde_json::from_value(json).unwrap();
        assert_eq!(back, status);

        let done: ExportStatus = serde_json::from_str(
            r#"{"status":"complete","offset":0,"exportId":"3-x","progress":""}"#,
        )
        .unwrap();
        assert_eq!(done.progress, None);
    }
}
