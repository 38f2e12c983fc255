//! Command-line interface for autoexport
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and validation
//! - Wiring the record store, mailer and scheduler together
//! - Subcommand dispatch (tick, one-off export, status, config)

use clap::{Parser, Subcommand};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tabled::{
    builder::Builder,
    settings::{Alignment, Modify, Style, object::Rows},
};

use crate::config::{Config, FormSettings, LogLevel};
use crate::error::Result;
use crate::mail::SpoolMailer;
use crate::schedule::{ScheduleState, Scheduler, TickOutcome};
use crate::store::JsonFileStore;

pub mod completion;

/// Scheduled, resumable CSV exports of form entries
#[derive(Parser, Debug)]
#[command(
    name = "autoexport",
    version,
    about = "Scheduled form entry exports",
    long_about = "Exports form entries to CSV (and optionally XML spreadsheets) on a schedule.
Each run is time-bounded and resumes where the previous one stopped."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Quiet mode (errors only)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv", global = true)]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for autoexport
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one scheduler pass over every configured form
    Tick,

    /// Export one form to completion right now
    Export {
        /// Configured form id
        #[arg(value_name = "FORM_ID")]
        form_id: u32,

        /// Mail the export to the form's recipients
        #[arg(long)]
        mail: bool,

        /// Do not draw a progress bar
        #[arg(long = "no-progress")]
        no_progress: bool,
    },

    /// Show schedule state of every configured form
    Status,

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,

        /// Print configured form ids, one per line
        #[arg(long = "list-forms")]
        list_forms: bool,
    },

    /// Generate shell completion script
    Completion {
        /// Shell type (bash, zsh, fish)
        #[arg(value_name = "SHELL")]
        shell: String,
    },

    /// Show version information
    Version,
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Create a new CLI interface
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        let args = CliArgs::parse();
        let config = Self::load_config(&args)?;

        Ok(Self { args, config })
    }

    /// Load configuration from file and merge with arguments
    ///
    /// # Arguments
    /// * `args` - Command-line arguments
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;
        Self::apply_logging_args(&mut config, args);
        Ok(config)
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the CLI arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Apply logging-related CLI arguments to configuration
    fn apply_logging_args(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };
    }

    /// Dispatch the selected subcommand
    pub async fn run(&self) -> Result<()> {
        match &self.args.command {
            Commands::Tick => self.tick().await,
            Commands::Export {
                form_id,
                mail,
                no_progress,
            } => self.export(*form_id, *mail, !*no_progress).await,
            Commands::Status => self.show_status().await,
            Commands::Config {
                show,
                validate,
                list_forms,
            } => self.handle_config_command(*show, *validate, *list_forms),
            Commands::Completion { shell } => completion::generate_completion(shell),
            Commands::Version => {
                self.show_version();
                Ok(())
            }
        }
    }

    /// Build the scheduler over the configured store and spool
    fn scheduler(&self) -> Result<Scheduler> {
        self.config.validate()?;
        let store = Arc::new(JsonFileStore::new(&self.config.store.data_dir));
        let mailer = Arc::new(SpoolMailer::new(&self.config.mail.spool_dir));
        Scheduler::from_config(&self.config, store, mailer)
    }

    async fn tick(&self) -> Result<()> {
        let outcomes = self.scheduler()?.tick(Utc::now()).await;
        if outcomes.is_empty() && !self.args.quiet {
            println!("No forms configured");
        }

        let failed = outcomes
            .iter()
            .filter(|(_, outcome)| {
                matches!(
                    outcome,
                    TickOutcome::Failed(_) | TickOutcome::MailFailed { .. }
                )
            })
            .count();
        if !self.args.quiet {
            for (form_id, outcome) in &outcomes {
                println!("form {form_id}: {outcome}");
            }
        }

        if failed > 0 {
            return Err(format!("{failed} of {} form(s) failed", outcomes.len()).into());
        }
        Ok(())
    }

    async fn export(&self, form_id: u32, mail: bool, progress: bool) -> Result<()> {
        let scheduler = self.scheduler()?.with_progress(progress && !self.args.quiet);
        let job = scheduler.export_now(form_id, Utc::now(), mail).await?;

        if !self.args.quiet {
            for path in job.output_files() {
                println!("{}", path.display());
            }
        }
        Ok(())
    }

    async fn show_status(&self) -> Result<()> {
        let scheduler = self.scheduler()?;
        let mut rows = Vec::with_capacity(scheduler.forms().len());
        for (form_id, settings) in scheduler.forms() {
            let state = scheduler.states().load(*form_id).await?;
            rows.push((*form_id, settings, state));
        }

        println!("{}", status_table(&rows)?);
        Ok(())
    }

    /// Handle config subcommand
    ///
    /// # Arguments
    /// * `show` - Whether to show configuration
    /// * `validate` - Whether to validate configuration
    /// * `list_forms` - Whether to print configured form ids
    ///
    /// # Returns
    /// * `Result<()>` - Success or error
    fn handle_config_command(&self, show: bool, validate: bool, list_forms: bool) -> Result<()> {
        if list_forms {
            for form_id in self.config.forms_by_id()?.keys() {
                println!("{form_id}");
            }
            return Ok(());
        }

        if validate {
            self.validate_config_file()?;
        }

        if show || !validate {
            self.show_config()?;
        }

        Ok(())
    }

    /// Validate configuration file
    fn validate_config_file(&self) -> Result<()> {
        let path = self.get_config_path();
        println!("Validating configuration file: {}", path.display());

        if !path.exists() {
            println!("❌ Configuration file does not exist");
            return Ok(());
        }

        match Config::load_from_file(Some(path.as_path())) {
            Ok(config) => match config.validate() {
                Ok(_) => println!("✅ Configuration is valid"),
                Err(e) => println!("❌ Configuration validation failed: {}", e),
            },
            Err(e) => println!("❌ Failed to load configuration: {}", e),
        }

        Ok(())
    }

    /// Show effective configuration
    fn show_config(&self) -> Result<()> {
        let path = self.get_config_path();
        println!("Configuration file: {}", path.display());
        println!();
        println!("=== Effective Configuration ===");
        println!();

        match self.config.to_toml_with_comments() {
            Ok(toml_str) => println!("{}", toml_str),
            Err(e) => {
                eprintln!("Error formatting configuration: {}", e);
                println!("{:#?}", self.config);
            }
        }

        Ok(())
    }

    /// Get configuration file path (from args or default)
    fn get_config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_config_path)
    }

    /// Show version information
    fn show_version(&self) {
        println!("autoexport version {}", env!("CARGO_PKG_VERSION"));
        println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
    }
}

/// Render the schedule overview of every form
fn status_table(rows: &[(u32, &FormSettings, ScheduleState)]) -> Result<String> {
    let mut builder = Builder::default();
    builder.push_record([
        "Form",
        "Enabled",
        "Frequency",
        "Range",
        "Recipients",
        "Next run",
        "Pending",
        "Last export",
    ]);

    for (form_id, settings, state) in rows {
        builder.push_record([
            form_id.to_string(),
            if settings.enabled { "yes" } else { "no" }.to_string(),
            settings.csv_export_frequency.to_string(),
            serde_json::to_value(settings.search_criteria)?
                .as_str()
                .unwrap_or_default()
                .to_string(),
            settings.recipients().join(", "),
            state
                .next_run_at
                .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_else(|| "now".to_string()),
            pending_cell(state),
            state.last_export_id.clone().unwrap_or_default(),
        ]);
    }

    let mut table = builder.build();
    table.with(Style::modern());
    table.with(Modify::new(Rows::first()).with(Alignment::center()));
    Ok(table.to_string())
}

fn pending_cell(state: &ScheduleState) -> String {
    match &state.pending {
        Some(pending) => format!(
            "{} ({})",
            pending.job.export_id(),
            pending.status.progress_text()
        ),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_args_tick() {
        let args = CliArgs::try_parse_from(vec!["autoexport", "tick"]).unwrap();
        assert!(matches!(args.command, Commands::Tick));
        assert!(args.config_file.is_none());
    }

    #[test]
    fn test_cli_args_export() {
        let args = CliArgs::try_parse_from(vec![
            "autoexport",
            "export",
            "3",
            "--mail",
            "--no-progress",
            "-c",
            "/etc/autoexport.toml",
        ])
        .unwrap();

        assert_eq!(args.config_file, Some(PathBuf::from("/etc/autoexport.toml")));
        match args.command {
            Commands::Export {
                form_id,
                mail,
                no_progress,
            } => {
                assert_eq!(form_id, 3);
                assert!(mail);
                assert!(no_progress);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_args_rejects_bad_form_id() {
        assert!(CliArgs::try_parse_from(vec!["autoexport", "export", "contact"]).is_err());
        assert!(CliArgs::try_parse_from(vec!["autoexport"]).is_err());
    }

    #[test]
    fn test_logging_flags_override_config() {
        let args = CliArgs::try_parse_from(vec!["autoexport", "-v", "status"]).unwrap();
        let mut config = Config::default();
        CliInterface::apply_logging_args(&mut config, &args);
        assert_eq!(config.logging.level, LogLevel::Debug);

        let args = CliArgs::try_parse_from(vec!["autoexport", "status", "--quiet"]).unwrap();
        let mut config = Config::default();
        CliInterface::apply_logging_args(&mut config, &args);
        assert_eq!(config.logging.level, LogLevel::Error);

        let args = CliArgs::try_parse_from(vec!["autoexport", "status"]).unwrap();
        let mut config = Config::default();
        CliInterface::apply_logging_args(&mut config, &args);
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_status_table() {
        use crate::export::{Criteria, ExportFormat, ExportJob, ExportStatus};
        use crate::schedule::PendingExport;

        let settings = FormSettings {
            email_address: "ops@example.com".to_string(),
            ..FormSettings::default()
        };
        let criteria = Criteria {
            filter: Default::default(),
            fields: vec!["1".to_string()],
        };
        let state = ScheduleState {
            pending: Some(PendingExport {
                job: ExportJob::new(
                    3,
                    "3-2026-10-18-921AM",
                    criteria,
                    ExportFormat::Delimited,
                    "/tmp",
                ),
                status: ExportStatus::derive("3-2026-10-18-921AM", 20, 25, 45),
            }),
            ..ScheduleState::default()
        };

        let table = status_table(&[(3, &settings, state)]).unwrap();
        assert!(table.contains("Next run"));
        assert!(table.contains("daily"));
        assert!(table.contains("all"));
        assert!(table.contains("3-2026-10-18-921AM (44%)"));
        assert_eq!(pending_cell(&ScheduleState::default()), "");
    }
}
