//! Per-message CSV logging
//!
//! Every message appended to the transcript is written as one RFC 4180 row to
//! `chat_log.csv`. This is a side channel: failures are logged and dropped.

use std::borrow::Cow;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::ExportError;
use crate::state::Message;

pub const LOG_FILE_NAME: &str = "chat_log.csv";
pub const HEADER: &str = "timestamp,role,content";

/// Quote a field if it contains a comma, a quote or a line break; double embedded quotes.
pub fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// One CRLF-terminated row: `timestamp,role,content`
pub fn format_record(message: &Message) -> String {
    format!(
        "{},{},{}\r\n",
        escape_field(&message.timestamp_iso()),
        message.role().as_str(),
        escape_field(message.content())
    )
}

#[derive(Debug, Clone)]
pub struct CsvExporter {
    path: Option<PathBuf>,
}

impl CsvExporter {
    /// Append rows to `<dir>/chat_log.csv`, creating the directory on first write.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: Some(dir.as_ref().join(LOG_FILE_NAME)),
        }
    }

    /// No place to save files; every export is skipped.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Best-effort export. Never fails and never panics on IO errors.
    pub fn export(&self, message: &Message) {
        match self.try_export(message) {
            Ok(()) => {}
            Err(ExportError::Unavailable) => {
                debug!("csv export unavailable, skipping");
            }
            Err(e) => {
                warn!(error = %e, "csv export failed");
            }
        }
    }

    pub fn try_export(&self, message: &Message) -> Result<(), ExportError> {
        let path = self.path.as_ref().ok_or(ExportError::Unavailable)?;
        let io_err = |source: std::io::Error| ExportError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;

        let mut out = String::new();
        if file.metadata().map_err(io_err)?.len() == 0 {
            out.push_str(HEADER);
            out.push_str("\r\n");
        }
        out.push_str(&format_record(message));

        file.write_all(out.as_bytes()).map_err(io_err)?;
        Ok(())
    }
}
