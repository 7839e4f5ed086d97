//! Logging setup
//!
//! One `tracing-subscriber` registry with optional console (text or JSON) and
//! file layers. `log` records from the rest of the crate reach it through the
//! subscriber's log bridge.

use std::fs::File;
use std::path::PathBuf;

use tracing_appender::non_blocking::NonBlocking;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

pub use tracing_appender::non_blocking::WorkerGuard as LogGuard;

/// Environment variable holding the level filter.
pub const LOG_ENV: &str = "SANDBOX_LOG";
/// Environment variable selecting `json` console output.
pub const LOG_FORMAT_ENV: &str = "SANDBOX_LOG_FORMAT";

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub console_enabled: bool,
    pub file_enabled: bool,
    /// Log file, `ar_sandbox.log` in the working directory when unset
    pub file_path: Option<PathBuf>,
    /// JSON console lines instead of compact text
    pub json_format: bool,
    /// Filter used when neither `SANDBOX_LOG` nor `RUST_LOG` is set
    pub default_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enabled: true,
            file_enabled: false,
            file_path: None,
            json_format: false,
            default_level: "info".to_string(),
        }
    }
}

impl LogConfig {
    fn log_path(&self) -> PathBuf {
        self.file_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("ar_sandbox.log"))
    }

    /// `SANDBOX_LOG_FORMAT` wins over the configured format.
    fn wants_json(&self) -> bool {
        std::env::var(LOG_FORMAT_ENV)
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(self.json_format)
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new(&self.default_level))
    }
}

fn open_log_file(config: &LogConfig) -> std::io::Result<(NonBlocking, LogGuard)> {
    let path = config.log_path();
    let file = File::create(&path)?;
    eprintln!("Logging to file: {}", path.display());
    Ok(tracing_appender::non_blocking(file))
}

/// Install the global subscriber.
///
/// Keep the returned guard alive until exit when file logging is on, or the
/// tail of the file may be lost.
pub fn init_logging(
    config: &LogConfig,
) -> Result<Option<LogGuard>, Box<dyn std::error::Error + Send + Sync>> {
    let json = config.wants_json();

    let (file_writer, guard) = if config.file_enabled {
        let (writer, guard) = open_log_file(config)?;
        (Some(writer), Some(guard))
    } else {
        (None, None)
    };

    let json_console = (config.console_enabled && json).then(|| {
        fmt::layer()
            .json()
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
    });
    let text_console = (config.console_enabled && !json)
        .then(|| fmt::layer().with_thread_names(true).compact());
    let file = file_writer.map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_file(true)
            .with_line_number(true)
    });

    tracing_subscriber::registry()
        .with(config.filter())
        .with(json_console)
        .with(text_console)
        .with(file)
        .try_init()?;

    tracing::info!(
        target: "ar_sandbox",
        version = env!("CARGO_PKG_VERSION"),
        json,
        file = config.file_enabled,
        "Logging initialized"
    );

    Ok(guard)
}
