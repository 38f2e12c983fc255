//! Persisted per-form schedule state
//!
//! Each form has one JSON document, `<state_dir>/form-<id>.json`, holding
//! when the next run is due and the job that is still being written, if any.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ScheduleError};
use crate::export::{ExportJob, ExportStatus};

/// A job that has started but not yet consumed every entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingExport {
    pub job: ExportJob,
    pub status: ExportStatus,
}

/// Schedule bookkeeping of one form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleState {
    /// When the next fresh export is due; `None` means now
    #[serde(default)]
    pub next_run_at: Option<DateTime<Utc>>,

    /// Export still in progress
    #[serde(default)]
    pub pending: Option<PendingExport>,

    /// Export id of the last completed run
    #[serde(default)]
    pub last_export_id: Option<String>,

    #[serde(default)]
    pub last_completed_at: Option<DateTime<Utc>>,
}

impl ScheduleState {
    /// Whether a fresh export should start at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_run_at.is_none_or(|at| at <= now)
    }
}

/// Directory of schedule state documents
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the state document of a form
    pub fn path(&self, form_id: u32) -> PathBuf {
        self.dir.join(format!("form-{form_id}.json"))
    }

    /// Load the state of a form; a form never run has the default state
    pub async fn load(&self, form_id: u32) -> Result<ScheduleState> {
        let path = self.path(form_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ScheduleState::default());
            }
            Err(e) => return Err(state_error(form_id, e)),
        };

        serde_json::from_slice(&bytes).map_err(|e| state_error(form_id, e))
    }

    /// Persist the state of a form
    pub async fn save(&self, form_id: u32, state: &ScheduleState) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| state_error(form_id, e))?;

        let path = self.path(form_id);
        let body = serde_json::to_vec_pretty(state)?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| state_error(form_id, e))?;

        debug!("Saved schedule state of form {} to {}", form_id, path.display());
        Ok(())
    }
}

fn state_error(form_id: u32, reason: impl std::fmt::Display) -> crate::error::AutoexportError {
    ScheduleError::State {
        form_id,
        reason: reason.to_string(),
    }
    .into()
}
