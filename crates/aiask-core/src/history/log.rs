use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use tracing::debug;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// Line closing every entry
pub const ENTRY_SEPARATOR: &str = "---";

/// Extension of the daily log files
const LOG_SUFFIX: &str = "log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    timestamp: DateTime<Utc>,
    input: String,
    output: String,
}

impl LogEntry {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            input: input.into(),
            output: output.into(),
        }
    }

    /// The four-line block appended to the daily file
    pub fn render(&self) -> String {
        format!(
            "{}\nINPUT: {}\nOUTPUT: {}\n{}\n",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.input,
            self.output,
            ENTRY_SEPARATOR
        )
    }
}

#[derive(Debug, Clone)]
pub struct InteractionLog {
    dir: PathBuf,
}

impl InteractionLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the log file for `date`
    pub fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}.{}", date.format("%Y-%m-%d"), LOG_SUFFIX))
    }

    /// Path of today's (UTC) log file
    pub fn today_path(&self) -> PathBuf {
        self.file_for(Utc::now().date_naive())
    }

    /// Append an entry for one question and its answer.
    pub fn record(&self, input: &str, output: &str) -> Result<()> {
        self.append(&LogEntry::new(input, output))
    }

    pub fn append(&self, entry: &LogEntry) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create log directory {}", self.dir.display()))?;

        let mut writer = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_suffix(LOG_SUFFIX)
            .build(&self.dir)
            .with_context(|| format!("Failed to open log file in {}", self.dir.display()))?;

        writer
            .write_all(entry.render().as_bytes())
            .context("Failed to append log entry")?;
        writer.flush().context("Failed to flush log entry")?;

        debug!(dir = %self.dir.display(), "Interaction logged");
        Ok(())
    }
}
