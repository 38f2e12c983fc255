//! autoexport library
//!
//! This library provides a paginated, time-bounded, resumable export engine
//! for form entries, plus the scheduler and mail plumbing that run it on a
//! cadence. It can be embedded with any record store that implements
//! [`store::RecordStore`].
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `error`: Error types and handling
//! - `export`: Criteria resolution, paginated writer, status reporting
//! - `mail`: Mailer trait and the spool mailer
//! - `schedule`: Per-form cadence and persisted export state
//! - `store`: Record store trait, data model, in-memory and JSON-file stores
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use autoexport::{Config, Scheduler};
//! use autoexport::mail::SpoolMailer;
//! use autoexport::store::JsonFileStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_from_file(None)?;
//!     let store = Arc::new(JsonFileStore::new(&config.store.data_dir));
//!     let mailer = Arc::new(SpoolMailer::new(&config.mail.spool_dir));
//!
//!     let scheduler = Scheduler::from_config(&config, store, mailer)?;
//!     for (form_id, outcome) in scheduler.tick(chrono::Utc::now()).await {
//!         println!("form {form_id}: {outcome}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod mail;
pub mod schedule;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use error::{AutoexportError, Result};
pub use export::{ExportCoordinator, ExportJob, ExportStatus};
pub use schedule::{Scheduler, TickOutcome};
pub use store::RecordStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
///
/// # Returns
/// * `&str` - Version string
pub fn version() -> &'static str {
    VERSION
}
