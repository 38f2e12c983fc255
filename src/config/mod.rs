//! Configuration management for autoexport
//!
//! This module handles loading, parsing, and managing configuration from various sources:
//! - Configuration files (TOML format)
//! - Environment variables
//! - Command-line arguments
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values
//!
//! Forms are configured under `[forms.<id>]` tables, one per scheduled export.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;

use crate::error::{ConfigError, Result};
use crate::export::{DateRange, EngineSettings, ExportCriteria, ExportFormat};
use crate::schedule::Frequency;
use crate::store::FieldFilter;

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "AUTOEXPORT_";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Export engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Record store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Scheduler configuration
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Mail configuration
    #[serde(default)]
    pub mail: MailConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Per-form export settings, keyed by form id
    #[serde(default)]
    pub forms: BTreeMap<String, FormSettings>,
}

/// Export engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Entries fetched per page
    #[serde(default = "default_page_size")]
    pub page_size: u64,

    /// Wall-clock budget of one invocation in seconds
    #[serde(default = "default_max_execution_time")]
    pub max_execution_time: u64,

    /// Field separator of the CSV output
    #[serde(default = "default_separator")]
    pub separator: char,

    /// Local timezone as a UTC offset, e.g. `+02:00`
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,

    /// Directory receiving export files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

/// Record store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory of `<form id>.json` documents
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Directory of per-form schedule state
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

/// Mail configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Directory the spool mailer writes messages to
    #[serde(default = "default_spool_dir")]
    pub spool_dir: PathBuf,

    /// Sender name, also the local part of the sender address
    #[serde(default = "default_from_name")]
    pub from_name: String,

    /// Subject used when a form sets none
    #[serde(default = "default_subject")]
    pub default_subject: String,

    /// Body used when a form sets none
    #[serde(default = "default_content")]
    pub default_content: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Path to log file (None for stderr)
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// File format selected for a form
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FormatExport {
    /// CSV only
    #[default]
    Csv,
    /// CSV plus an XML spreadsheet
    Xls,
}

/// Scheduled export settings of one form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormSettings {
    #[serde(default = "default_form_enabled")]
    pub enabled: bool,

    /// Which entries each run covers
    #[serde(default)]
    pub search_criteria: DateRange,

    /// How often the export runs
    #[serde(default)]
    pub csv_export_frequency: Frequency,

    /// Field id to filter on; empty for no field filter
    #[serde(default)]
    pub filter_by: String,

    #[serde(default)]
    pub filter_value: String,

    #[serde(default)]
    pub format_export: FormatExport,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_subject: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_content: Option<String>,

    /// Comma-separated recipients; empty disables the schedule
    #[serde(default)]
    pub email_address: String,
}

// Default value functions
fn default_page_size() -> u64 {
    20
}

fn default_max_execution_time() -> u64 {
    20
}

fn default_separator() -> char {
    ','
}

fn default_utc_offset() -> String {
    "+00:00".to_string()
}

fn base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".autoexport")
}

fn default_output_dir() -> PathBuf {
    base_dir().join("exports")
}

fn default_data_dir() -> PathBuf {
    base_dir().join("forms")
}

fn default_state_dir() -> PathBuf {
    base_dir().join("state")
}

fn default_spool_dir() -> PathBuf {
    base_dir().join("outbox")
}

fn default_from_name() -> String {
    "autoexport".to_string()
}

fn default_subject() -> String {
    "Automatic Form Export".to_string()
}

fn default_content() -> String {
    "CSV export is attached to this message".to_string()
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

fn default_form_enabled() -> bool {
    false
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_execution_time: default_max_execution_time(),
            separator: default_separator(),
            utc_offset: default_utc_offset(),
            output_dir: default_output_dir(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            spool_dir: default_spool_dir(),
            from_name: default_from_name(),
            default_subject: default_subject(),
            default_content: default_content(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_path: None,
            timestamps: default_log_timestamps(),
        }
    }
}

impl Default for FormSettings {
    fn default() -> Self {
        Self {
            enabled: default_form_enabled(),
            search_criteria: DateRange::default(),
            csv_export_frequency: Frequency::default(),
            filter_by: String::new(),
            filter_value: String::new(),
            format_export: FormatExport::default(),
            email_subject: None,
            email_content: None,
            email_address: String::new(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file, then apply environment overrides
    ///
    /// Without an explicit path the default location is used, and a missing
    /// default file yields the default configuration.
    ///
    /// # Arguments
    /// * `path` - Explicit configuration file, if any
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::FileNotFound(path.display().to_string()).into());
                }
                Self::from_toml_file(path)?
            }
            None => {
                let path = Self::default_config_path();
                if path.exists() {
                    Self::from_toml_file(&path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Apply `AUTOEXPORT_*` overrides read through `lookup`
    ///
    /// Example: AUTOEXPORT_PAGE_SIZE=50
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(value) = var("PAGE_SIZE") {
            self.engine.page_size = parse_env("PAGE_SIZE", &value)?;
        }
        if let Some(value) = var("MAX_EXECUTION_TIME") {
            self.engine.max_execution_time = parse_env("MAX_EXECUTION_TIME", &value)?;
        }
        if let Some(value) = var("SEPARATOR") {
            self.engine.separator = parse_env("SEPARATOR", &value)?;
        }
        if let Some(value) = var("UTC_OFFSET") {
            self.engine.utc_offset = value;
        }
        if let Some(value) = var("OUTPUT_DIR") {
            self.engine.output_dir = PathBuf::from(value);
        }
        if let Some(value) = var("DATA_DIR") {
            self.store.data_dir = PathBuf::from(value);
        }
        if let Some(value) = var("STATE_DIR") {
            self.schedule.state_dir = PathBuf::from(value);
        }
        if let Some(value) = var("SPOOL_DIR") {
            self.mail.spool_dir = PathBuf::from(value);
        }
        if let Some(value) = var("LOG_LEVEL") {
            self.logging.level = LogLevel::parse(&value).ok_or_else(|| ConfigError::InvalidValue {
                field: format!("{ENV_PREFIX}LOG_LEVEL"),
                value,
            })?;
        }

        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - Path to default configuration file
    pub fn default_config_path() -> PathBuf {
        base_dir().join("config.toml")
    }

    /// Save configuration to a file
    ///
    /// # Arguments
    /// * `path` - Path where to save the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Success or error
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_toml_with_comments()?)?;
        Ok(())
    }

    /// Render the configuration as TOML with a comment above each section
    pub fn to_toml_with_comments(&self) -> Result<String> {
        let body = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;

        let mut out = String::from("# autoexport configuration\n\n");
        for line in body.lines() {
            if let Some(comment) = section_comment(line) {
                out.push_str(comment);
                out.push('\n');
            }
            out.push_str(line);
            out.push('\n');
        }
        Ok(out)
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        if self.engine.page_size == 0 {
            return Err(invalid("engine.page_size", "0"));
        }
        if self.engine.max_execution_time == 0 {
            return Err(invalid("engine.max_execution_time", "0"));
        }
        if matches!(self.engine.separator, '"' | '\n' | '\r') {
            return Err(invalid(
                "engine.separator",
                &self.engine.separator.escape_default().to_string(),
            ));
        }
        self.timezone()?;
        self.forms_by_id()?;
        Ok(())
    }

    /// Local timezone parsed from `engine.utc_offset`
    pub fn timezone(&self) -> Result<FixedOffset> {
        parse_utc_offset(&self.engine.utc_offset)
            .ok_or_else(|| invalid("engine.utc_offset", &self.engine.utc_offset))
    }

    /// Get the invocation deadline as Duration
    pub fn max_execution_time(&self) -> Duration {
        Duration::from_secs(self.engine.max_execution_time)
    }

    /// Settings of the paginated writer
    pub fn engine_settings(&self) -> Result<EngineSettings> {
        Ok(EngineSettings {
            page_size: self.engine.page_size,
            max_execution_time: self.max_execution_time(),
            separator: self.engine.separator,
            timezone: self.timezone()?,
        })
    }

    /// Form settings keyed by numeric form id
    pub fn forms_by_id(&self) -> Result<BTreeMap<u32, FormSettings>> {
        self.forms
            .iter()
            .map(|(key, settings)| {
                key.parse::<u32>()
                    .map(|id| (id, settings.clone()))
                    .map_err(|_| invalid("forms", key))
            })
            .collect()
    }

    /// Settings of one form
    pub fn form(&self, form_id: u32) -> Option<&FormSettings> {
        self.forms.get(&form_id.to_string())
    }
}

impl FormSettings {
    /// Entry selection settings of this form
    pub fn export_criteria(&self) -> ExportCriteria {
        let field_filter = if self.filter_by.trim().is_empty() {
            None
        } else {
            Some(FieldFilter {
                field_id: self.filter_by.trim().to_string(),
                value: self.filter_value.clone(),
            })
        };

        ExportCriteria {
            range: self.search_criteria,
            field_filter,
        }
    }

    pub fn export_format(&self) -> ExportFormat {
        match self.format_export {
            FormatExport::Csv => ExportFormat::Delimited,
            FormatExport::Xls => ExportFormat::Spreadsheet,
        }
    }

    /// Recipients split out of `email_address`
    pub fn recipients(&self) -> Vec<String> {
        self.email_address
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }

    /// Parse a level name, case-insensitively
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

/// Parse `+HH:MM`, `-HH:MM`, `Z` or `UTC`
fn parse_utc_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match value.as_bytes().first()? {
        b'+' => (1, &value[1..]),
        b'-' => (-1, &value[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        ConfigError::InvalidValue {
            field: format!("{ENV_PREFIX}{name}"),
            value: value.to_string(),
        }
        .into()
    })
}

fn invalid(field: &str, value: &str) -> crate::error::AutoexportError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

fn section_comment(line: &str) -> Option<&'static str> {
    match line {
        "[engine]" => Some("# Paging, deadline and CSV layout of each export run"),
        "[store]" => Some("# Where form definitions and entries are read from"),
        "[schedule]" => Some("# Where per-form schedule state is kept"),
        "[mail]" => Some("# Sender and fallback texts of export mails"),
        "[logging]" => Some("# Log level and destination"),
        _ if line.starts_with("[forms.") => Some("# Scheduled export of one form"),
        _ => None,
    }
}
