//! Audit logging for bug changes.
//!
//! Every successful write appends one JSON line describing what changed.
//! Audit logging never fails the write it describes: problems are reported
//! with `tracing::warn!` and otherwise ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::Result;
use crate::config::mask_uri;

/// Environment variable selecting the audit log path (`off` disables it).
pub const AUDIT_LOG_ENV: &str = "BUGTRACK_AUDIT_LOG";

/// Longest string kept verbatim in audit details.
const MAX_DETAIL_CHARS: usize = 200;

/// A single audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the change was made
    pub timestamp: DateTime<Utc>,

    /// What happened (e.g., "create", "add-log", "update-status")
    pub action: String,

    /// The bug that changed
    pub bug_id: String,

    /// Sanitized change details
    pub details: serde_json::Value,

    /// User who made the change
    pub user: String,
}

/// Where audit events go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLog {
    path: Option<PathBuf>,
}

impl AuditLog {
    /// Log to an explicit file.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Discard all events.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    /// Resolve from `BUGTRACK_AUDIT_LOG`, defaulting to the user data directory.
    pub fn from_env() -> Self {
        Self::from_setting(std::env::var(AUDIT_LOG_ENV).ok().as_deref())
    }

    fn from_setting(setting: Option<&str>) -> Self {
        match setting.map(str::trim) {
            Some("off" | "false" | "0") => Self::disabled(),
            Some(path) if !path.is_empty() => Self::at(expand_home(Path::new(path))),
            _ => match dirs::data_dir() {
                Some(dir) => Self::at(dir.join("bugtrack").join("audit.log")),
                None => {
                    tracing::warn!("could not determine data directory, audit log disabled");
                    Self::disabled()
                }
            },
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append an event. Never fails.
    pub fn record(&self, action: &str, bug_id: &str, details: serde_json::Value) {
        let Some(path) = &self.path else {
            return;
        };
        let event = AuditEvent {
            timestamp: Utc::now(),
            action: action.to_string(),
            bug_id: bug_id.to_string(),
            details: sanitize_details(&details),
            user: current_user(),
        };
        if let Err(e) = write_event(path, &event) {
            tracing::warn!(path = %path.display(), error = %e, "failed to write audit log");
        }
    }

    /// The last `limit` events, oldest first. Unparseable lines are skipped.
    pub fn recent(&self, limit: usize) -> Result<Vec<AuditEvent>> {
        let Some(path) = &self.path else {
            return Ok(Vec::new());
        };
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(path)?;
        let events: Vec<AuditEvent> = BufReader::new(file)
            .split(b'\n')
            .filter_map(|line| line.ok())
            .filter_map(|line| serde_json::from_slice(&line).ok())
            .collect();
        let start = events.len().saturating_sub(limit);
        Ok(events[start..].to_vec())
    }
}

/// Expand ~ in path to home directory.
fn expand_home(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

fn write_event(path: &Path, event: &AuditEvent) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string(event)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", json)?;
    Ok(())
}

/// Redact secrets and shorten long strings.
fn sanitize_details(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, value) in map {
                let key_lower = key.to_lowercase();
                if key_lower.contains("password")
                    || key_lower.contains("token")
                    || key_lower.contains("secret")
                {
                    sanitized.insert(
                        key.clone(),
                        serde_json::Value::String("[REDACTED]".to_string()),
                    );
                } else {
                    sanitized.insert(key.clone(), sanitize_details(value));
                }
            }
            serde_json::Value::Object(sanitized)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(sanitize_details).collect())
        }
        serde_json::Value::String(s) => {
            let masked = if s.contains("://") { mask_uri(s) } else { s.clone() };
            let count = masked.chars().count();
            if count > MAX_DETAIL_CHARS {
                let head: String = masked.chars().take(MAX_DETAIL_CHARS - 3).collect();
                serde_json::Value::String(format!("{}... ({} chars)", head, count))
            } else {
                serde_json::Value::String(masked)
            }
        }
        _ => value.clone(),
    }
}

/// Get the current user's username.
pub fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
