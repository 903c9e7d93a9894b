//! CSV export of bug lists.

use serde::Serialize;
use std::io::Write;

use crate::Result;
use crate::models::Bug;

/// One CSV row. Logs are summarized rather than embedded.
#[derive(Debug, Serialize)]
struct BugRow<'a> {
    id: &'a str,
    title: &'a str,
    description: &'a str,
    module: &'a str,
    severity: &'static str,
    priority: String,
    status: &'static str,
    git_commit: &'a str,
    created_at: String,
    updated_at: String,
    logs_count: usize,
    last_log_status: &'static str,
}

impl<'a> From<&'a Bug> for BugRow<'a> {
    fn from(bug: &'a Bug) -> Self {
        Self {
            id: &bug.id,
            title: &bug.title,
            description: &bug.description,
            module: &bug.module,
            severity: bug.severity.as_str(),
            priority: bug.priority_label(),
            status: bug.status.as_str(),
            git_commit: bug.git_commit.as_deref().unwrap_or(""),
            created_at: bug.created_at.to_rfc3339(),
            updated_at: bug.updated_at.to_rfc3339(),
            logs_count: bug.logs.len(),
            last_log_status: bug.logs.last().map_or("", |l| l.status.as_str()),
        }
    }
}

/// Column names, in `BugRow` field order.
const HEADERS: [&str; 12] = [
    "id",
    "title",
    "description",
    "module",
    "severity",
    "priority",
    "status",
    "git_commit",
    "created_at",
    "updated_at",
    "logs_count",
    "last_log_status",
];

/// Write `bugs` as CSV with a header row. Returns the number of data rows.
///
/// The header is written even when `bugs` is empty.
pub fn write_csv<W: Write>(bugs: &[Bug], writer: W) -> Result<usize> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(HEADERS)?;
    for bug in bugs {
        csv_writer.serialize(BugRow::from(bug))?;
    }
    csv_writer.flush()?;
    Ok(bugs.len())
}

/// Render `bugs` as a CSV string.
pub fn to_csv_string(bugs: &[Bug]) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(bugs, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
