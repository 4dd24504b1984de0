//! Real-time log streaming via Server-Sent Events (SSE).
//!
//! Pipeline stages report progress here. Every entry is printed to stderr
//! and broadcast to the SSE clients connected to `/api/logs`.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Entries kept for slow SSE subscribers before they start lagging.
const CHANNEL_CAPACITY: usize = 100;

/// Log level for frontend display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Uploaded file the entry belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default)]
    pub indent: u8,
}

impl LogEntry {
    fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self { level, message: message.into(), file: None, indent: 0 }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }
}

/// Global log broadcaster
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Broadcasts log entries to all connected SSE clients
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Send a log entry to all subscribers
    pub fn log(&self, entry: LogEntry) {
        let prefix = match entry.level {
            LogLevel::Info => "   ",
            LogLevel::Success => "   ✓",
            LogLevel::Warning => "   ⚠️",
            LogLevel::Error => "   ❌",
        };
        let indent = "   ".repeat(entry.indent as usize);
        match entry.file {
            Some(ref file) => eprintln!("{}{} [{}] {}", indent, prefix, file, entry.message),
            None => eprintln!("{}{} {}", indent, prefix, entry.message),
        }

        // No receivers is fine
        let _ = self.sender.send(entry);
    }

    /// Get a receiver for SSE streaming
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenient logging functions
pub fn log_info(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::info(msg));
}

pub fn log_error(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::error(msg));
}

/// Scoped logger that tags every entry with a file name.
#[derive(Debug, Clone)]
pub struct FileLog {
    file: String,
}

impl FileLog {
    pub fn new(file: impl Into<String>) -> Self {
        Self { file: file.into() }
    }

    pub fn info(&self, msg: impl Into<String>) {
        LOG_BROADCASTER.log(LogEntry::info(msg).with_file(&self.file));
    }

    pub fn success(&self, msg: impl Into<String>) {
        LOG_BROADCASTER.log(LogEntry::success(msg).with_file(&self.file));
    }

    pub fn warning(&self, msg: impl Into<String>) {
        LOG_BROADCASTER.log(LogEntry::warning(msg).with_file(&self.file));
    }

    pub fn error(&self, msg: impl Into<String>) {
        LOG_BROADCASTER.log(LogEntry::error(msg).with_file(&self.file));
    }

    pub fn detail(&self, msg: impl Into<String>) {
        LOG_BROADCASTER.log(LogEntry::info(msg).with_file(&self.file).with_indent(1));
    }
}
