//! Structured request log kept beside the `tracing` console output.
//!
//! Entries go to a JSONL file and an in-memory ring buffer (served at `/debug/logs`).
//! Intermediate payloads (raw and translated bodies, usage) are only recorded when the
//! debug toggle is on, since they can be large and contain prompt text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

const MAX_LOG_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub component: String,
    pub message: String,
    /// Correlates all entries written for one proxied request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl LogEntry {
    pub fn new(level: LogLevel, component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            component: component.into(),
            message: message.into(),
            request_id: None,
            payload: None,
        }
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Ring buffer that also appends every entry to a JSONL file.
pub struct Logger {
    entries: VecDeque<LogEntry>,
    writer: Option<BufWriter<File>>,
}

impl Logger {
    /// Open (or create) the log file, reloading its tail into the ring buffer.
    pub fn open(file_path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file_path = file_path.as_ref();

        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut entries = VecDeque::with_capacity(MAX_LOG_ENTRIES);
        if file_path.exists() {
            let reader = BufReader::new(File::open(file_path)?);
            for line in reader.lines().map_while(std::result::Result::ok) {
                if let Ok(entry) = serde_json::from_str::<LogEntry>(&line) {
                    push_bounded(&mut entries, entry);
                }
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;

        Ok(Self {
            entries,
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Memory-only logger, used by tests and when no log file is wanted.
    pub fn in_memory() -> Self {
        Self {
            entries: VecDeque::new(),
            writer: None,
        }
    }

    pub fn log(&mut self, entry: LogEntry) {
        if let (Some(writer), Ok(line)) = (self.writer.as_mut(), serde_json::to_string(&entry)) {
            let _ = writeln!(writer, "{line}").and_then(|()| writer.flush());
        }
        push_bounded(&mut self.entries, entry);
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }
}

fn push_bounded(entries: &mut VecDeque<LogEntry>, entry: LogEntry) {
    if entries.len() == MAX_LOG_ENTRIES {
        entries.pop_front();
    }
    entries.push_back(entry);
}

#[derive(Clone)]
pub struct SharedLogger {
    inner: Arc<Mutex<Logger>>,
    debug: bool,
}

impl SharedLogger {
    pub fn new(file_path: impl AsRef<Path>, debug: bool) -> std::io::Result<Self> {
        Ok(Self::from_logger(Logger::open(file_path)?, debug))
    }

    pub fn in_memory(debug: bool) -> Self {
        Self::from_logger(Logger::in_memory(), debug)
    }

    fn from_logger(logger: Logger, debug: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(logger)),
            debug,
        }
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug
    }

    pub fn log(&self, entry: LogEntry) {
        if let Ok(mut logger) = self.inner.lock() {
            logger.log(entry);
        }
    }

    pub fn info(&self, component: impl Into<String>, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Info, component, message));
    }

    pub fn warn(&self, component: impl Into<String>, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Warn, component, message));
    }

    pub fn error(&self, component: impl Into<String>, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Error, component, message));
    }

    pub fn debug(&self, component: impl Into<String>, message: impl Into<String>) {
        if self.debug {
            self.log(LogEntry::new(LogLevel::Debug, component, message));
        }
    }

    /// Record an intermediate payload for one request. No-op unless debug is on.
    pub fn payload<T: Serialize>(
        &self,
        component: &str,
        request_id: &str,
        message: &str,
        payload: &T,
    ) {
        if !self.debug {
            return;
        }
        let value = serde_json::to_value(payload).unwrap_or(serde_json::Value::Null);
        tracing::debug!(component, request_id, "{message}: {value}");
        self.log(
            LogEntry::new(LogLevel::Debug, component, message)
                .with_request_id(request_id)
                .with_payload(value),
        );
    }

    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        self.inner
            .lock()
            .map(|l| l.recent(limit))
            .unwrap_or_default()
    }
}
