use std::{fmt, io};

/// Crate-wide `Result` type using [`AutoexportError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, AutoexportError>;

/// Top-level error type for autoexport operations.
///
/// This type wraps more specific error kinds and provides a single
/// error type that can be used throughout the crate.
#[derive(Debug)]
pub enum AutoexportError {
    /// Configuration errors.
    Config(ConfigError),

    /// Record store errors.
    Store(StoreError),

    /// Export engine errors.
    Export(ExportError),

    /// Scheduler errors.
    Schedule(ScheduleError),

    /// Mail collaborator errors.
    Mail(MailError),

    /// I/O errors.
    Io(io::Error),

    /// JSON (de)serialization errors.
    Json(serde_json::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Missing required field.
    MissingField(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },

    /// Anything else.
    Generic(String),
}

/// Record store errors.
#[derive(Debug)]
pub enum StoreError {
    /// No form with this id.
    FormNotFound(u32),

    /// The count or page query failed.
    QueryFailed(String),

    /// Stored data could not be decoded.
    Corrupt(String),
}

/// Export engine errors.
#[derive(Debug)]
pub enum ExportError {
    /// Opening or appending to an output sink failed.
    Sink { path: String, source: io::Error },

    /// The job cannot be run as described.
    InvalidJob(String),
}

/// Scheduler errors.
#[derive(Debug)]
pub enum ScheduleError {
    /// The persisted state for a form could not be read or written.
    State { form_id: u32, reason: String },

    /// The form is not present in the configuration.
    UnknownForm(u32),
}

/// Mail collaborator errors.
#[derive(Debug)]
pub enum MailError {
    /// The configured address list is empty.
    NoRecipients,

    /// An attachment does not exist on disk.
    AttachmentMissing(String),

    /// The transport refused the message.
    SendFailed(String),
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for AutoexportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutoexportError::Config(e) => write!(f, "Configuration error: {e}"),
            AutoexportError::Store(e) => write!(f, "Store error: {e}"),
            AutoexportError::Export(e) => write!(f, "Export error: {e}"),
            AutoexportError::Schedule(e) => write!(f, "Schedule error: {e}"),
            AutoexportError::Mail(e) => write!(f, "Mail error: {e}"),
            AutoexportError::Io(e) => write!(f, "I/O error: {e}"),
            AutoexportError::Json(e) => write!(f, "JSON error: {e}"),
            AutoexportError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::MissingField(field) => write!(f, "Missing required field: {field}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
            ConfigError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::FormNotFound(id) => write!(f, "Form not found: {id}"),
            StoreError::QueryFailed(msg) => write!(f, "Query failed: {msg}"),
            StoreError::Corrupt(msg) => write!(f, "Corrupt store data: {msg}"),
        }
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Sink { path, source } => {
                write!(f, "Failed to write export file {path}: {source}")
            }
            ExportError::InvalidJob(msg) => write!(f, "Invalid export job: {msg}"),
        }
    }
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::State { form_id, reason } => {
                write!(f, "Schedule state for form {form_id}: {reason}")
            }
            ScheduleError::UnknownForm(id) => write!(f, "Form {id} is not configured"),
        }
    }
}

impl fmt::Display for MailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MailError::NoRecipients => write!(f, "No recipients configured"),
            MailError::AttachmentMissing(path) => write!(f, "Attachment not found: {path}"),
            MailError::SendFailed(msg) => write!(f, "Send failed: {msg}"),
        }
    }
}

impl std::error::Error for AutoexportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AutoexportError::Io(e) => Some(e),
            AutoexportError::Json(e) => Some(e),
            AutoexportError::Export(ExportError::Sink { source, .. }) => Some(source),
            _ => None,
        }
    }
}
impl std::error::Error for ConfigError {}
impl std::error::Error for StoreError {}
impl std::error::Error for ExportError {}
impl std::error::Error for ScheduleError {}
impl std::error::Error for MailError {}

/* ========================= Conversions to AutoexportError ========================= */

impl From<io::Error> for AutoexportError {
    fn from(err: io::Error) -> Self {
        AutoexportError::Io(err)
    }
}

impl From<serde_json::Error> for AutoexportError {
    fn from(err: serde_json::Error) -> Self {
        AutoexportError::Json(err)
    }
}

impl From<ConfigError> for AutoexportError {
    fn from(err: ConfigError) -> Self {
        AutoexportError::Config(err)
    }
}

impl From<StoreError> for AutoexportError {
    fn from(err: StoreError) -> Self {
        AutoexportError::Store(err)
    }
}

impl From<ExportError> for AutoexportError {
    fn from(err: ExportError) -> Self {
        AutoexportError::Export(err)
    }
}

impl From<ScheduleError> for AutoexportError {
    fn from(err: ScheduleError) -> Self {
        AutoexportError::Schedule(err)
    }
}

impl From<MailError> for AutoexportError {
    fn from(err: MailError) -> Self {
        AutoexportError::Mail(err)
    }
}

impl From<String> for AutoexportError {
    fn from(msg: String) -> Self {
        AutoexportError::Generic(msg)
    }
}

impl From<&str> for AutoexportError {
    fn from(msg: &str) -> Self {
        AutoexportError::Generic(msg.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_error_display_includes_path() {
        let err: AutoexportError = ExportError::Sink {
            path: "/tmp/export-3.csv".to_string(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        }
        .into();
        let msg = err.to_string();
        assert!(msg.starts_with("Export error:"));
        assert!(msg.contains("/tmp/export-3.csv"));
    }

    #[test]
    fn test_config_invalid_value_display() {
        let err = ConfigError::InvalidValue {
            field: "engine.separator".to_string(),
            value: "".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid value '' for field 'engine.separator'");
    }
}
