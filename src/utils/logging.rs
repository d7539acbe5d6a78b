//! Session transcript and diagnostic log setup.

use chrono::Local;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Environment variable read for the diagnostic log filter.
pub const LOG_FILTER_ENV: &str = "RELAIS_LOG";

/// Installs the global `tracing` subscriber. Diagnostics go to `debug_log`
/// when given, otherwise to stderr; the filter comes from `RELAIS_LOG` and
/// defaults to warnings only.
pub fn init_tracing(debug_log: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match debug_log {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    installed.map_err(|err| err as Box<dyn std::error::Error>)
}

/// Appends what the operator saw and answered to a plain-text file.
pub struct LoggingState {
    file_path: Option<String>,
}

impl LoggingState {
    /// Verifies the file can be opened and stamps the start of the session.
    pub fn new(log_file: Option<String>) -> Result<Self, Box<dyn std::error::Error>> {
        let logging = LoggingState {
            file_path: log_file,
        };
        if logging.file_path.is_some() {
            logging.log_message(&format!(
                "## Session started {}",
                Local::now().format("%Y-%m-%d %H:%M:%S")
            ))?;
        }
        Ok(logging)
    }

    pub fn disabled() -> Self {
        LoggingState { file_path: None }
    }

    pub fn is_active(&self) -> bool {
        self.file_path.is_some()
    }

    pub fn log_message(&self, content: &str) -> Result<(), Box<dyn std::error::Error>> {
        let Some(file_path) = self.file_path.as_ref() else {
            return Ok(());
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        let mut writer = BufWriter::new(file);

        for line in content.lines() {
            writeln!(writer, "{line}")?;
        }
        // Blank line between entries.
        writeln!(writer)?;

        writer.flush()?;
        Ok(())
    }

    pub fn get_status_string(&self) -> String {
        match &self.file_path {
            None => "disabled".to_string(),
            Some(path) => format!(
                "active ({})",
                Path::new(path)
                    .file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
            ),
        }
    }
}
