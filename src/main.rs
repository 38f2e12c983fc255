//! autoexport - scheduled form entry exports
//!
//! Runs time-bounded, resumable CSV exports of form entries and hands the
//! finished files to a mail spool.
//!
//! # Usage
//!
//! ```bash
//! # Run from cron every few minutes
//! autoexport tick
//!
//! # Export one form right now and mail it
//! autoexport export 3 --mail
//! ```

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use autoexport::cli::CliInterface;
use autoexport::config::LoggingConfig;
use autoexport::error::Result;

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments
/// 2. Load configuration
/// 3. Initialize logging
/// 4. Dispatch the subcommand
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;
    initialize_logging(&cli.config().logging)?;
    cli.run().await
}

/// Initialize the tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level.
fn initialize_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(logging.level.to_tracing_level().as_str().to_lowercase())
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match (&logging.file_path, logging.timestamps) {
        (Some(path), timestamps) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let builder = builder.with_ansi(false).with_writer(Mutex::new(file));
            if timestamps {
                builder.init();
            } else {
                builder.without_time().init();
            }
        }
        (None, true) => builder.with_writer(std::io::stderr).init(),
        (None, false) => builder.with_writer(std::io::stderr).without_time().init(),
    }

    Ok(())
}
