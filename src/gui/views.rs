//! Template context types for the dashboard pages.

use serde::Serialize;
use tera::Tera;

use crate::connection::{Banner, ConnectionState};
use crate::models::{Bug, BugFilter, BugSeverity, BugStatus, DEFAULT_PRIORITY, LogEntry, MAX_PRIORITY};
use crate::{Error, Result};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

/// Load the built-in templates.
pub fn templates() -> Result<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        ("base.html", include_str!("templates/base.html")),
        ("index.html", include_str!("templates/index.html")),
        ("bug.html", include_str!("templates/bug.html")),
        ("error.html", include_str!("templates/error.html")),
    ])
    .map_err(|e| Error::Other(format!("Failed to load dashboard templates: {}", e)))?;
    Ok(tera)
}

/// Fields every page needs for the header and banner.
#[derive(Debug, Clone, Serialize)]
pub struct Chrome {
    pub state: ConnectionState,
    pub demo: bool,
    pub banner: Option<Banner>,
    pub notice: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LogView {
    pub timestamp: String,
    pub status: &'static str,
    pub author: String,
    pub details: String,
}

impl From<&LogEntry> for LogView {
    fn from(log: &LogEntry) -> Self {
        Self {
            timestamp: log.timestamp.format(TIME_FORMAT).to_string(),
            status: log.status.as_str(),
            author: log.author.clone(),
            details: log.details.clone(),
        }
    }
}

/// A bug flattened into display strings.
#[derive(Debug, Serialize)]
pub struct BugView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub module: String,
    pub severity: &'static str,
    pub priority: String,
    pub status: &'static str,
    pub git_commit: String,
    pub created_at: String,
    pub updated_at: String,
    pub logs_count: usize,
    pub logs: Vec<LogView>,
}

impl From<&Bug> for BugView {
    fn from(bug: &Bug) -> Self {
        Self {
            id: bug.id.clone(),
            title: bug.title.clone(),
            description: bug.description.clone(),
            module: bug.module.clone(),
            severity: bug.severity.as_str(),
            priority: bug.priority_label(),
            status: bug.status.as_str(),
            git_commit: bug.git_commit.clone().unwrap_or_else(|| "N/A".to_string()),
            created_at: bug.created_at.format(TIME_FORMAT).to_string(),
            updated_at: bug.updated_at.format(TIME_FORMAT).to_string(),
            logs_count: bug.logs.len(),
            logs: bug.logs.iter().map(LogView::from).collect(),
        }
    }
}

/// Filter values echoed back into the form. Unset fields are empty strings.
#[derive(Debug, Default, Serialize)]
pub struct FilterView {
    pub status: String,
    pub module: String,
    pub severity: String,
}

impl From<&BugFilter> for FilterView {
    fn from(filter: &BugFilter) -> Self {
        Self {
            status: filter.status.map(|s| s.to_string()).unwrap_or_default(),
            module: filter.module.clone().unwrap_or_default(),
            severity: filter.severity.map(|s| s.to_string()).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IndexPage {
    #[serde(flatten)]
    pub chrome: Chrome,
    pub bugs: Vec<BugView>,
    pub filter: FilterView,
    pub statuses: Vec<&'static str>,
    pub severities: Vec<&'static str>,
    pub priorities: Vec<u8>,
    pub default_priority: u8,
}

impl IndexPage {
    pub fn new(chrome: Chrome, bugs: &[Bug], filter: &BugFilter) -> Self {
        Self {
            chrome,
            bugs: bugs.iter().map(BugView::from).collect(),
            filter: FilterView::from(filter),
            statuses: status_names(),
            severities: BugSeverity::ALL.iter().map(BugSeverity::as_str).collect(),
            priorities: (0..=MAX_PRIORITY).collect(),
            default_priority: DEFAULT_PRIORITY,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BugPage {
    #[serde(flatten)]
    pub chrome: Chrome,
    pub bug: BugView,
    pub statuses: Vec<&'static str>,
}

impl BugPage {
    pub fn new(chrome: Chrome, bug: &Bug) -> Self {
        Self {
            chrome,
            bug: BugView::from(bug),
            statuses: status_names(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorPage {
    #[serde(flatten)]
    pub chrome: Chrome,
    pub heading: String,
    pub message: String,
    pub tip: String,
}

fn status_names() -> Vec<&'static str> {
    BugStatus::ALL.iter().map(BugStatus::as_str).collect()
}
