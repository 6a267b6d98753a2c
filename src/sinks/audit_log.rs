use chrono::{DateTime, SecondsFormat, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::SinkError;

/// Append-only text log with one line per resolution attempt
pub struct AuditLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

/// One audit entry
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry<'a> {
    pub tx_hash: &'a str,
    pub success: bool,
    pub internal: bool,
    pub error: Option<&'a str>,
}

impl<'a> AuditEntry<'a> {
    pub fn success(tx_hash: &'a str, internal: bool) -> Self {
        Self { tx_hash, success: true, internal, error: None }
    }

    pub fn failure(tx_hash: &'a str, error: Option<&'a str>) -> Self {
        Self { tx_hash, success: false, internal: false, error }
    }

    /// `<iso> - TxHash: <hash> - Success: <bool>[ (Internal Tx)][ Error: <msg>]`
    pub fn format_line(&self, at: DateTime<Utc>) -> String {
        let mut line = format!(
            "{} - TxHash: {} - Success: {}",
            at.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.tx_hash,
            self.success
        );
        if self.internal {
            line.push_str(" (Internal Tx)");
        }
        if let Some(error) = self.error {
            line.push_str(" Error: ");
            // keep one entry per line
            line.push_str(&error.replace('\n', " "));
        }
        line
    }
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &AuditEntry<'_>) -> Result<(), SinkError> {
        self.append_at(entry, Utc::now())
    }

    pub fn append_at(&self, entry: &AuditEntry<'_>, at: DateTime<Utc>) -> Result<(), SinkError> {
        let line = entry.format_line(at);

        let _guard = self.write_lock.lock().map_err(|_| {
            SinkError::AuditLog(std::io::Error::new(
                std::io::ErrorKind::Other,
                "audit log lock poisoned",
            ))
        })?;

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}
