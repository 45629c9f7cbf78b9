//! Structured JSONL audit logging for whitelist decisions.

use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Event type for an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    RequestAllowed,
    RequestBlocked,
}

/// Decision outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditDecision {
    Allowed,
    Blocked,
}

/// Reason for the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditReason {
    Whitelisted,
    NotWhitelisted,
}

/// Which interception point produced the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Http,
    Connect,
}

/// A single audit log entry.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub timestamp: String,
    pub event: AuditEvent,
    pub method: String,
    pub host: String,
    pub protocol: Protocol,
    pub decision: AuditDecision,
    pub reason: AuditReason,
}

impl AuditEntry {
    pub fn allowed(protocol: Protocol, method: &str, host: &str) -> Self {
        Self {
            timestamp: now_iso8601(),
            event: AuditEvent::RequestAllowed,
            method: method.to_string(),
            host: host.to_string(),
            protocol,
            decision: AuditDecision::Allowed,
            reason: AuditReason::Whitelisted,
        }
    }

    pub fn blocked(protocol: Protocol, method: &str, host: &str) -> Self {
        Self {
            timestamp: now_iso8601(),
            event: AuditEvent::RequestBlocked,
            method: method.to_string(),
            host: host.to_string(),
            protocol,
            decision: AuditDecision::Blocked,
            reason: AuditReason::NotWhitelisted,
        }
    }
}

/// Returns the current UTC time as an RFC 3339 string.
pub fn now_iso8601() -> String {
    let now = time::OffsetDateTime::now_utc();
    now.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Audit logger that appends JSONL entries to a file.
///
/// Decisions are made synchronously on the connection task, so a plain
/// `std::sync::Mutex` around a buffered file is enough.
pub struct AuditLogger {
    writer: std::sync::Mutex<std::io::BufWriter<std::fs::File>>,
}

impl AuditLogger {
    /// Open (or create) the audit log file in append mode.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            writer: std::sync::Mutex::new(std::io::BufWriter::new(file)),
        })
    }

    /// Write an audit entry as a JSON line. Errors are logged but never propagated.
    pub fn log(&self, entry: &AuditEntry) {
        let json = match serde_json::to_string(entry) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize audit entry");
                return;
            }
        };

        let mut writer = match self.writer.lock() {
            Ok(w) => w,
            Err(e) => {
                tracing::error!(error = %e, "Failed to lock audit log writer");
                return;
            }
        };
        if let Err(e) = writeln!(writer, "{}", json) {
            tracing::error!(error = %e, "Failed to write audit entry");
            return;
        }
        if let Err(e) = writer.flush() {
            tracing::error!(error = %e, "Failed to flush audit log");
        }
    }
}
