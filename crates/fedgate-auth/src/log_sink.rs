//! Operator log sink.
//!
//! The log sink is where suppressed errors and extra login information are
//! written for operators, separate from the `tracing` diagnostics. Writes are
//! best effort: a failing sink is reported through `tracing` and never
//! escalated to the login.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{error, info, warn};

/// Severity of a log sink entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Informational entry.
    Info,
    /// Error entry.
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A single log sink entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// When the entry was written.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Severity.
    pub level: LogLevel,
    /// Message text.
    pub message: String,
}

impl LogEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: OffsetDateTime::now_utc(),
            level,
            message: message.into(),
        }
    }

    fn to_line(&self) -> String {
        let timestamp = self
            .timestamp
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.timestamp.unix_timestamp().to_string());
        format!("{timestamp} [{}] {}", self.level, self.message)
    }
}

/// Errors raised by a log sink.
#[derive(Debug, thiserror::Error)]
pub enum LogSinkError {
    /// The log file could not be written.
    #[error("Failed to write log file {path}: {source}")]
    Io {
        /// The log file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Destination for operator log entries.
pub trait LogSink: Send + Sync {
    /// Appends an entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry could not be written.
    fn append(&self, entry: &LogEntry) -> Result<(), LogSinkError>;
}

/// Best-effort helpers over [`LogSink`].
pub trait LogSinkExt {
    /// Writes an error entry, ignoring sink failures.
    fn error(&self, message: &str);
    /// Writes an info entry, ignoring sink failures.
    fn info(&self, message: &str);
}

impl<S: LogSink + ?Sized> LogSinkExt for S {
    fn error(&self, message: &str) {
        write_best_effort(self, LogEntry::now(LogLevel::Error, message));
    }

    fn info(&self, message: &str) {
        write_best_effort(self, LogEntry::now(LogLevel::Info, message));
    }
}

fn write_best_effort<S: LogSink + ?Sized>(sink: &S, entry: LogEntry) {
    if let Err(e) = sink.append(&entry) {
        warn!(error = %e, message = %entry.message, "Log sink write failed");
    }
}

/// Appends entries to a file, one line each.
#[derive(Debug)]
pub struct FileLogSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileLogSink {
    /// Creates a sink appending to `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileLogSink {
    fn append(&self, entry: &LogEntry) -> Result<(), LogSinkError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let io_err = |source| LogSinkError::Io {
            path: self.path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        writeln!(file, "{}", entry.to_line()).map_err(io_err)
    }
}

/// Forwards entries to `tracing`. Used when no log file is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn append(&self, entry: &LogEntry) -> Result<(), LogSinkError> {
        match entry.level {
            LogLevel::Info => info!(target: "fedgate::log_sink", "{}", entry.message),
            LogLevel::Error => error!(target: "fedgate::log_sink", "{}", entry.message),
        }
        Ok(())
    }
}

/// Keeps entries in memory.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    entries: RwLock<Vec<LogEntry>>,
}

impl MemoryLogSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all entries.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Returns the messages of all entries.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.message).collect()
    }
}

impl LogSink for MemoryLogSink {
    fn append(&self, entry: &LogEntry) -> Result<(), LogSinkError> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry.clone());
        Ok(())
    }
}
