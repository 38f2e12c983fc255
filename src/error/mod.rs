//! Error handling module for autoexport.
//!
//! Every fallible operation in the crate returns [`Result`], whose error is
//! the [`AutoexportError`] hierarchy. Each concern (configuration, record
//! store, export engine, scheduler, mail) has its own error kind that
//! converts into the top-level type with `?`.
//!
//! # Example
//!
//! ```rust
//! use autoexport::error::{Result, StoreError};
//!
//! fn lookup(form_id: u32) -> Result<()> {
//!     Err(StoreError::FormNotFound(form_id).into())
//! }
//!
//! assert!(lookup(7).is_err());
//! ```

pub mod kinds;

// Re-export commonly used types
pub use kinds::{
    AutoexportError, ConfigError, ExportError, MailError, Result, ScheduleError, StoreError,
};
