//! Command implementations shared by the CLI and the dashboard.
//!
//! Reads go through a [`BugSource`], which is either the live store or the
//! frozen sample data. Writes take a [`StoreHandle`] directly: the only ways
//! to obtain one are [`ConnectionSupervisor::require_live`] (CLI) and
//! [`writable_handle`] (dashboard), so no write can reach a store while the
//! supervisor is in demo mode.

use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::audit::{AuditEvent, AuditLog};
use crate::connection::{ConnectionState, ConnectionSupervisor, StoreHandle};
use crate::export;
use crate::git;
use crate::models::sample::{sample_bug, sample_bugs};
use crate::models::{Bug, BugFilter, BugStatus, NewBug, NewLogEntry};
use crate::storage::parse_bug_id;
use crate::{Error, Result};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait CommandResult {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

/// Where reads are served from.
#[derive(Debug, Clone)]
pub enum BugSource {
    Store(StoreHandle),
    Sample,
}

impl BugSource {
    /// Pick the source matching the supervisor's current state.
    pub fn for_state(supervisor: &ConnectionSupervisor) -> Result<Self> {
        match supervisor.current_state() {
            ConnectionState::Live => Ok(BugSource::Store(supervisor.handle()?)),
            ConnectionState::Demo => Ok(BugSource::Sample),
            ConnectionState::Unknown => Err(Error::PreconditionViolation(
                "bug source requested before the connection was probed".to_string(),
            )),
        }
    }

    pub fn is_demo(&self) -> bool {
        matches!(self, BugSource::Sample)
    }

    pub async fn list(&self, filter: &BugFilter) -> Result<Vec<Bug>> {
        match self {
            BugSource::Store(handle) => handle.list_bugs(filter).await,
            BugSource::Sample => Ok(filter.apply(&sample_bugs())),
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<Bug>> {
        match self {
            BugSource::Store(handle) => handle.get_bug(id).await,
            BugSource::Sample => {
                let oid = parse_bug_id(id)?;
                Ok(sample_bug(&oid.to_hex()))
            }
        }
    }
}

/// The handle for a write requested from the dashboard.
///
/// Demo mode yields [`Error::ReadOnly`] without touching any store.
pub fn writable_handle(supervisor: &ConnectionSupervisor) -> Result<StoreHandle> {
    match supervisor.current_state() {
        ConnectionState::Demo => Err(Error::ReadOnly),
        _ => supervisor.handle(),
    }
}

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!(r#"{{"error": "{}"}}"#, e))
}

const RULE: &str = "----------------------------------------";

fn format_bug_summary(out: &mut String, bug: &Bug) {
    out.push_str(&format!("ID         : {}\n", bug.id));
    out.push_str(&format!("Title      : {}\n", bug.title));
    out.push_str(&format!("Module     : {}\n", bug.module));
    out.push_str(&format!("Severity   : {}\n", bug.severity));
    out.push_str(&format!("Priority   : {}\n", bug.priority_label()));
    out.push_str(&format!("Status     : {}\n", bug.status));
    out.push_str(&format!(
        "Git Commit : {}\n",
        bug.git_commit.as_deref().unwrap_or("N/A")
    ));
    out.push_str(&format!("Created At : {}\n", bug.created_at.format("%Y-%m-%d %H:%M:%S UTC")));
    out.push_str(&format!("Updated At : {}\n", bug.updated_at.format("%Y-%m-%d %H:%M:%S UTC")));
}

// === Create ===

#[derive(Debug, Serialize)]
pub struct BugCreated {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
}

impl CommandResult for BugCreated {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("✅ Bug created with ID: {}", self.id)
    }
}

/// File a new bug, stamping it with the commit checked out in `repo_path`.
pub async fn create_bug(
    handle: &StoreHandle,
    audit: &AuditLog,
    repo_path: &Path,
    new_bug: NewBug,
) -> Result<BugCreated> {
    let new_bug = new_bug.validated()?;
    let git_commit = git::current_commit(repo_path);
    let bug = handle.insert_bug(new_bug, git_commit).await?;
    tracing::info!(id = %bug.id, module = %bug.module, "bug created");

    audit.record(
        "create",
        &bug.id,
        serde_json::json!({
            "title": bug.title,
            "module": bug.module,
            "severity": bug.severity,
            "priority": bug.priority,
            "git_commit": bug.git_commit,
        }),
    );

    Ok(BugCreated {
        id: bug.id,
        title: bug.title,
        git_commit: bug.git_commit,
    })
}

// === Add log ===

#[derive(Debug, Serialize)]
pub struct LogAdded {
    pub bug_id: String,
    pub status: String,
}

impl CommandResult for LogAdded {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        "✅ Test log added successfully.".to_string()
    }
}

/// Append a test log to an existing bug.
pub async fn add_log(
    handle: &StoreHandle,
    audit: &AuditLog,
    bug_id: &str,
    entry: NewLogEntry,
) -> Result<LogAdded> {
    if entry.details.trim().is_empty() {
        return Err(Error::InvalidInput("Log details must not be empty".to_string()));
    }
    let author = match entry.author.trim() {
        "" => crate::audit::current_user(),
        name => name.to_string(),
    };
    let entry = NewLogEntry { author, ..entry }.into_entry();
    let status = entry.status;
    let details = entry.details.clone();
    handle.append_log(bug_id, entry).await?;
    tracing::info!(id = %bug_id, %status, "test log added");

    audit.record(
        "add-log",
        bug_id,
        serde_json::json!({ "status": status, "details": details }),
    );

    Ok(LogAdded {
        bug_id: bug_id.to_string(),
        status: status.to_string(),
    })
}

// === Update status ===

#[derive(Debug, Serialize)]
pub struct StatusUpdated {
    pub bug_id: String,
    pub status: BugStatus,
}

impl CommandResult for StatusUpdated {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("✅ Bug status updated successfully ({}).", self.status)
    }
}

/// Set a bug's status. Any transition is allowed.
pub async fn update_status(
    handle: &StoreHandle,
    audit: &AuditLog,
    bug_id: &str,
    status: BugStatus,
) -> Result<StatusUpdated> {
    handle.set_status(bug_id, status).await?;
    tracing::info!(id = %bug_id, %status, "bug status updated");

    audit.record("update-status", bug_id, serde_json::json!({ "status": status }));

    Ok(StatusUpdated {
        bug_id: bug_id.to_string(),
        status,
    })
}

// === List ===

#[derive(Debug, Serialize)]
pub struct BugList {
    pub demo: bool,
    pub count: usize,
    pub bugs: Vec<Bug>,
}

impl CommandResult for BugList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut out = String::from("=== Bug List ===\n");
        if self.demo {
            out.push_str("(demo data)\n");
        }
        if self.bugs.is_empty() {
            out.push_str("No bugs match the given filters.");
            return out;
        }
        for bug in &self.bugs {
            format_bug_summary(&mut out, bug);
            out.push_str(&format!("Logs Count : {}\n", bug.logs.len()));
            out.push_str(RULE);
            out.push('\n');
        }
        out.trim_end().to_string()
    }
}

/// List bugs matching `filter`, newest first.
pub async fn list_bugs(source: &BugSource, filter: &BugFilter) -> Result<BugList> {
    let bugs = source.list(filter).await?;
    Ok(BugList {
        demo: source.is_demo(),
        count: bugs.len(),
        bugs,
    })
}

// === Show ===

#[derive(Debug, Serialize)]
pub struct BugDetail {
    pub demo: bool,
    pub bug: Bug,
}

impl CommandResult for BugDetail {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let bug = &self.bug;
        let mut out = String::from("=== Bug Details ===\n");
        format_bug_summary(&mut out, bug);
        out.push_str(&format!("Description: {}\n", bug.description));
        out.push_str("\nTest Logs:\n");
        if bug.logs.is_empty() {
            out.push_str("  No logs yet.");
            return out;
        }
        for (i, log) in bug.logs.iter().enumerate() {
            out.push_str(&format!("  Log #{}\n", i + 1));
            out.push_str(&format!(
                "    Time   : {}\n",
                log.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
            ));
            out.push_str(&format!("    Status : {}\n", log.status));
            out.push_str(&format!("    Author : {}\n", log.author));
            out.push_str(&format!("    Details: {}\n", log.details));
            out.push_str("------------------------------\n");
        }
        out.trim_end().to_string()
    }
}

/// Fetch a single bug with its logs.
pub async fn show_bug(source: &BugSource, bug_id: &str) -> Result<BugDetail> {
    let bug = source
        .get(bug_id)
        .await?
        .ok_or_else(|| Error::NotFound(bug_id.to_string()))?;
    Ok(BugDetail {
        demo: source.is_demo(),
        bug,
    })
}

// === Export ===

#[derive(Debug, Serialize)]
pub struct ExportSummary {
    pub rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl CommandResult for ExportSummary {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        match &self.path {
            Some(path) => format!("✅ Exported {} bug(s) to {}", self.rows, path),
            None => format!("Exported {} bug(s)", self.rows),
        }
    }
}

/// Write the filtered bug list as CSV.
pub async fn export_csv<W: Write>(
    source: &BugSource,
    filter: &BugFilter,
    writer: W,
) -> Result<ExportSummary> {
    let bugs = source.list(filter).await?;
    let rows = export::write_csv(&bugs, writer)?;
    Ok(ExportSummary { rows, path: None })
}

// === Audit ===

#[derive(Debug, Serialize)]
pub struct AuditList {
    pub events: Vec<AuditEvent>,
}

impl CommandResult for AuditList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.events.is_empty() {
            return "No audit events recorded.".to_string();
        }
        self.events
            .iter()
            .map(|e| {
                format!(
                    "{}  {:<14} {}  by {}  {}",
                    e.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    e.action,
                    e.bug_id,
                    e.user,
                    e.details
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The most recent audit events, oldest first.
pub fn audit_entries(audit: &AuditLog, limit: usize) -> Result<AuditList> {
    Ok(AuditList {
        events: audit.recent(limit)?,
    })
}

// === Connection status ===

#[derive(Debug, Serialize)]
pub struct ConnectionReport {
    pub state: ConnectionState,
    pub uri: String,
    pub uri_source: String,
    pub database: String,
    pub collection: String,
    pub probe_timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_secrets: Vec<SkippedSecretsReport>,
}

#[derive(Debug, Serialize)]
pub struct SkippedSecretsReport {
    pub path: String,
    pub reason: String,
}

impl CommandResult for ConnectionReport {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut out = match self.state {
            ConnectionState::Live => format!("✅ Connected to {}", self.uri),
            _ => format!("❌ Not connected to {}", self.uri),
        };
        out.push_str(&format!("\nSource     : {}", self.uri_source));
        out.push_str(&format!("\nDatabase   : {}.{}", self.database, self.collection));
        out.push_str(&format!("\nTimeout    : {} ms", self.probe_timeout_ms));
        if let Some(reason) = &self.reason {
            out.push_str(&format!("\nReason     : {}", reason));
        }
        for skipped in &self.skipped_secrets {
            out.push_str(&format!("\n⚠️  Ignored secrets file {}: {}", skipped.path, skipped.reason));
        }
        out
    }
}

/// Describe the supervisor's configuration and cached state.
pub fn connection_report(supervisor: &ConnectionSupervisor) -> ConnectionReport {
    let config = supervisor.config();
    ConnectionReport {
        state: supervisor.current_state(),
        uri: config.masked_uri(),
        uri_source: config.uri.source.to_string(),
        database: config.database.clone(),
        collection: config.collection.clone(),
        probe_timeout_ms: config.probe_timeout.as_millis() as u64,
        reason: supervisor.demo_reason().map(ToString::to_string),
        skipped_secrets: config
            .skipped_secrets
            .iter()
            .map(|s| SkippedSecretsReport {
                path: s.path.display().to_string(),
                reason: s.reason.clone(),
            })
            .collect(),
    }
}
