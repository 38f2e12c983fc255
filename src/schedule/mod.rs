//! Scheduled exports
//!
//! A tick walks every configured form once, in form id order:
//! - disabled forms and forms without recipients are skipped
//! - a pending export is resumed at its saved offset
//! - otherwise a fresh export starts when the form is due
//!
//! A completed export is mailed and its pending state cleared; an incomplete
//! one is saved for the next tick. Forms run one after another, so there is
//! never more than one writer per export id.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::{Config, FormSettings, MailConfig};
use crate::error::{Result, ScheduleError};
use crate::export::{
    EngineSettings, ExportCoordinator, ExportHooks, ExportJob, ExportStatus, criteria,
};
use crate::mail::{Mailer, Message};
use crate::store::RecordStore;

pub mod state;

pub use state::{PendingExport, ScheduleState, StateStore};

/// How often a form is exported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Hourly,
    #[default]
    Daily,
    Weekly,
    /// Four weeks
    Monthly,
}

impl Frequency {
    /// Time between two fresh exports
    pub fn interval(&self) -> Duration {
        match self {
            Frequency::Hourly => Duration::seconds(3_600),
            Frequency::Daily => Duration::seconds(86_400),
            Frequency::Weekly => Duration::seconds(604_800),
            Frequency::Monthly => Duration::seconds(4 * 604_800),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Frequency::Hourly => "hourly",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        };
        f.write_str(name)
    }
}

/// What a tick did for one form
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Nothing to do by configuration
    Skipped(String),
    /// No pending export and the next run is in the future
    NotDue { next_run_at: DateTime<Utc> },
    /// An invocation ran and stopped at the deadline
    InProgress(ExportStatus),
    /// The export finished and was handed to the mailer
    Completed(ExportStatus),
    /// The export finished but could not be mailed
    MailFailed { status: ExportStatus, reason: String },
    /// The invocation failed; pending state is left as it was
    Failed(String),
}

impl fmt::Display for TickOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickOutcome::Skipped(reason) => write!(f, "skipped ({reason})"),
            TickOutcome::NotDue { next_run_at } => write!(f, "not due until {next_run_at}"),
            TickOutcome::InProgress(status) => write!(f, "{status}"),
            TickOutcome::Completed(status) => write!(f, "{status}, mailed"),
            TickOutcome::MailFailed { status, reason } => {
                write!(f, "{status}, mail failed: {reason}")
            }
            TickOutcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Drives scheduled exports of every configured form
pub struct Scheduler {
    forms: BTreeMap<u32, FormSettings>,
    store: Arc<dyn RecordStore>,
    coordinator: ExportCoordinator,
    mailer: Arc<dyn Mailer>,
    states: StateStore,
    mail: MailConfig,
    output_dir: PathBuf,
}

impl Scheduler {
    /// Create a scheduler
    ///
    /// # Arguments
    /// * `forms` - Form settings keyed by form id
    /// * `store` - Record store the exports read from
    /// * `mailer` - Receiver of finished exports
    /// * `states` - Persisted per-form state
    /// * `settings` - Paginated writer settings
    /// * `mail` - Sender and fallback texts
    /// * `output_dir` - Directory receiving export files
    pub fn new(
        forms: BTreeMap<u32, FormSettings>,
        store: Arc<dyn RecordStore>,
        mailer: Arc<dyn Mailer>,
        states: StateStore,
        settings: EngineSettings,
        mail: MailConfig,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            forms,
            coordinator: ExportCoordinator::new(store.clone(), settings),
            store,
            mailer,
            states,
            mail,
            output_dir: output_dir.into(),
        }
    }

    /// Create a scheduler from the loaded configuration
    pub fn from_config(
        config: &Config,
        store: Arc<dyn RecordStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self> {
        Ok(Self::new(
            config.forms_by_id()?,
            store,
            mailer,
            StateStore::new(&config.schedule.state_dir),
            config.engine_settings()?,
            config.mail.clone(),
            &config.engine.output_dir,
        ))
    }

    /// Replace the export hooks
    pub fn with_hooks(mut self, hooks: Arc<dyn ExportHooks>) -> Self {
        self.coordinator = self.coordinator.with_hooks(hooks);
        self
    }

    /// Draw a progress bar during exports
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.coordinator = self.coordinator.with_progress(show_progress);
        self
    }

    pub fn forms(&self) -> &BTreeMap<u32, FormSettings> {
        &self.forms
    }

    pub fn states(&self) -> &StateStore {
        &self.states
    }

    /// Run one pass over every configured form
    ///
    /// A failing form is logged and reported; the remaining forms still run.
    pub async fn tick(&self, now: DateTime<Utc>) -> Vec<(u32, TickOutcome)> {
        let mut outcomes = Vec::with_capacity(self.forms.len());
        for (&form_id, settings) in &self.forms {
            let outcome = match self.tick_form(form_id, settings, now).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Scheduled export of form {} failed: {}", form_id, e);
                    TickOutcome::Failed(e.to_string())
                }
            };
            info!("Form {}: {}", form_id, outcome);
            outcomes.push((form_id, outcome));
        }
        outcomes
    }

    async fn tick_form(
        &self,
        form_id: u32,
        settings: &FormSettings,
        now: DateTime<Utc>,
    ) -> Result<TickOutcome> {
        if !settings.enabled {
            return Ok(TickOutcome::Skipped("disabled".to_string()));
        }
        if settings.recipients().is_empty() {
            return Ok(TickOutcome::Skipped("no email address".to_string()));
        }

        let mut state = self.states.load(form_id).await?;
        let (mut job, offset) = match &state.pending {
            Some(pending) => {
                info!(
                    "Resuming export {} at offset {}",
                    pending.job.export_id(),
                    pending.status.offset
                );
                (pending.job.clone(), pending.status.offset)
            }
            None if state.is_due(now) => {
                let job = self.new_job(form_id, settings, now).await?;
                state.next_run_at = Some(now + settings.csv_export_frequency.interval());
                state.pending = Some(PendingExport {
                    status: ExportStatus::started(job.export_id()),
                    job: job.clone(),
                });
                self.states.save(form_id, &state).await?;
                (job, 0)
            }
            None => {
                return Ok(TickOutcome::NotDue {
                    next_run_at: state.next_run_at.unwrap_or(now),
                });
            }
        };

        let status = self.coordinator.run(&mut job, offset).await?;
        if !status.is_complete() {
            state.pending = Some(PendingExport {
                job,
                status: status.clone(),
            });
            self.states.save(form_id, &state).await?;
            return Ok(TickOutcome::InProgress(status));
        }

        state.pending = None;
        state.last_export_id = Some(status.export_id.clone());
        state.last_completed_at = Some(now);
        self.states.save(form_id, &state).await?;

        match self.mail_export(settings, &job).await {
            Ok(()) => Ok(TickOutcome::Completed(status)),
            Err(e) => {
                warn!("Export {} finished but was not mailed: {}", job.export_id(), e);
                Ok(TickOutcome::MailFailed {
                    status,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Export one form to completion right away, outside its schedule
    ///
    /// # Arguments
    /// * `form_id` - Configured form to export
    /// * `now` - Time the export refers to
    /// * `mail` - Whether to mail the result
    ///
    /// # Returns
    /// * `Result<ExportJob>` - The finished job, for its output files
    pub async fn export_now(
        &self,
        form_id: u32,
        now: DateTime<Utc>,
        mail: bool,
    ) -> Result<ExportJob> {
        let settings = self
            .forms
            .get(&form_id)
            .ok_or(ScheduleError::UnknownForm(form_id))?;

        let mut job = self.new_job(form_id, settings, now).await?;
        let status = self.coordinator.run_to_completion(&mut job).await?;
        info!("One-off export {} finished", status.export_id);

        if mail {
            self.mail_export(settings, &job).await?;
        }
        Ok(job)
    }

    async fn new_job(
        &self,
        form_id: u32,
        settings: &FormSettings,
        now: DateTime<Utc>,
    ) -> Result<ExportJob> {
        let schema = self.store.form_schema(form_id).await?;
        let tz = self.coordinator.settings().timezone;
        let resolved = criteria::resolve(&settings.export_criteria(), &schema, now, tz);
        let export_id = ExportJob::export_id_for(form_id, now.with_timezone(&tz));

        tokio::fs::create_dir_all(&self.output_dir).await?;
        Ok(ExportJob::new(
            form_id,
            export_id,
            resolved,
            settings.export_format(),
            &self.output_dir,
        ))
    }

    async fn mail_export(&self, settings: &FormSettings, job: &ExportJob) -> Result<()> {
        let message = Message::for_export(settings, &self.mail, job.output_files())?;
        self.mailer.send(&message).await
    }
}
