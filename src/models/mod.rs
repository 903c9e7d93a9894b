//! Data models for bugtrack entities.
//!
//! This module defines the core data structures:
//! - `Bug` - A defect with severity, priority, status and an optional git commit
//! - `LogEntry` - An append-only test log owned by its parent bug
//! - `NewBug` / `NewLogEntry` - Validated input for the write operations
//! - `BugFilter` - Optional filters shared by the store and the demo data

pub mod sample;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Highest (least urgent) priority value accepted.
pub const MAX_PRIORITY: u8 = 4;

/// Priority assigned when none is given.
pub const DEFAULT_PRIORITY: u8 = 2;

/// Bug status in the workflow.
///
/// Bugs normally move forward (open, in-progress, resolved, closed) but the
/// order is not enforced: any status may be set at any time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BugStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl BugStatus {
    pub const ALL: [BugStatus; 4] = [
        BugStatus::Open,
        BugStatus::InProgress,
        BugStatus::Resolved,
        BugStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BugStatus::Open => "open",
            BugStatus::InProgress => "in-progress",
            BugStatus::Resolved => "resolved",
            BugStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for BugStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BugStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(BugStatus::Open),
            "in-progress" | "in_progress" | "inprogress" => Ok(BugStatus::InProgress),
            "resolved" => Ok(BugStatus::Resolved),
            "closed" => Ok(BugStatus::Closed),
            other => Err(Error::InvalidInput(format!(
                "Unknown status '{}' (expected open, in-progress, resolved, closed)",
                other
            ))),
        }
    }
}

/// Bug severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BugSeverity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl BugSeverity {
    pub const ALL: [BugSeverity; 4] = [
        BugSeverity::Low,
        BugSeverity::Medium,
        BugSeverity::High,
        BugSeverity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BugSeverity::Low => "low",
            BugSeverity::Medium => "medium",
            BugSeverity::High => "high",
            BugSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for BugSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BugSeverity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(BugSeverity::Low),
            "medium" => Ok(BugSeverity::Medium),
            "high" => Ok(BugSeverity::High),
            "critical" => Ok(BugSeverity::Critical),
            other => Err(Error::InvalidInput(format!(
                "Unknown severity '{}' (expected low, medium, high, critical)",
                other
            ))),
        }
    }
}

/// Outcome recorded by a test log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TestStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "passed" | "pass" => Ok(TestStatus::Passed),
            "failed" | "fail" => Ok(TestStatus::Failed),
            other => Err(Error::InvalidInput(format!(
                "Unknown test status '{}' (expected passed, failed)",
                other
            ))),
        }
    }
}

/// A test log attached to a bug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Whether the logged test run passed
    pub status: TestStatus,

    /// Free-text note
    pub details: String,

    /// Who wrote the entry
    pub author: String,

    /// When the entry was written
    pub timestamp: DateTime<Utc>,
}

/// A defect tracked by bugtrack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bug {
    /// Store-assigned identifier (24 hex characters)
    pub id: String,

    /// Bug title
    pub title: String,

    /// Detailed description
    pub description: String,

    /// Affected module or component
    pub module: String,

    #[serde(default)]
    pub severity: BugSeverity,

    /// Priority level (0-4, lower is more urgent)
    #[serde(default = "default_priority")]
    pub priority: u8,

    #[serde(default)]
    pub status: BugStatus,

    /// Commit checked out when the bug was filed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Test logs, oldest first
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

impl Bug {
    /// Build a freshly filed bug: status `open`, no logs.
    pub fn new(id: String, new_bug: NewBug, git_commit: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: new_bug.title,
            description: new_bug.description,
            module: new_bug.module,
            severity: new_bug.severity,
            priority: new_bug.priority,
            status: BugStatus::Open,
            git_commit,
            created_at: now,
            updated_at: now,
            logs: Vec::new(),
        }
    }

    /// Priority as shown to humans, e.g. `P2`.
    pub fn priority_label(&self) -> String {
        format!("P{}", self.priority)
    }
}

/// Input for filing a new bug.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBug {
    pub title: String,
    pub description: String,
    pub module: String,
    pub severity: BugSeverity,
    pub priority: u8,
}

impl NewBug {
    /// Trim text fields and reject empty titles or out-of-range priorities.
    pub fn validated(self) -> Result<Self> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(Error::InvalidInput("Title must not be empty".to_string()));
        }
        if self.priority > MAX_PRIORITY {
            return Err(Error::InvalidInput(format!(
                "Priority must be between 0 and {}, got {}",
                MAX_PRIORITY, self.priority
            )));
        }
        Ok(Self {
            title,
            description: self.description.trim().to_string(),
            module: self.module.trim().to_string(),
            ..self
        })
    }
}

/// Input for appending a test log.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLogEntry {
    pub status: TestStatus,
    pub details: String,
    pub author: String,
}

impl NewLogEntry {
    /// Stamp the entry with the current time.
    pub fn into_entry(self) -> LogEntry {
        LogEntry {
            status: self.status,
            details: self.details,
            author: self.author,
            timestamp: Utc::now(),
        }
    }
}

/// Optional filters for listing bugs. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BugFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BugStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<BugSeverity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

impl BugFilter {
    /// Build a filter from loosely typed shell input, ignoring blank values.
    pub fn parse(
        status: Option<&str>,
        module: Option<&str>,
        severity: Option<&str>,
        priority: Option<u8>,
    ) -> Result<Self> {
        Ok(Self {
            status: non_blank(status).map(str::parse).transpose()?,
            module: non_blank(module).map(str::to_string),
            severity: non_blank(severity).map(str::parse).transpose()?,
            priority,
        })
    }

    pub fn matches(&self, bug: &Bug) -> bool {
        self.status.is_none_or(|s| bug.status == s)
            && self.module.as_deref().is_none_or(|m| bug.module == m)
            && self.severity.is_none_or(|s| bug.severity == s)
            && self.priority.is_none_or(|p| bug.priority == p)
    }

    /// Apply the filter to an in-memory collection, newest first.
    pub fn apply<'a>(&self, bugs: impl IntoIterator<Item = &'a Bug>) -> Vec<Bug> {
        let mut matched: Vec<Bug> = bugs
            .into_iter()
            .filter(|b| self.matches(b))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched
    }
}
