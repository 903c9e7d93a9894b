//! Frozen sample bugs served while the store is unreachable.
//!
//! The data is rebuilt on every call so nothing a caller does to the returned
//! values can leak into later requests.

use chrono::{DateTime, Utc};

use super::{Bug, BugSeverity, BugStatus, LogEntry, TestStatus};

/// Number of bugs in the sample set.
pub const SAMPLE_SIZE: usize = 5;

fn at(unix_secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(unix_secs, 0).unwrap_or_default()
}

fn log(status: TestStatus, details: &str, author: &str, unix_secs: i64) -> LogEntry {
    LogEntry {
        status,
        details: details.to_string(),
        author: author.to_string(),
        timestamp: at(unix_secs),
    }
}

#[allow(clippy::too_many_arguments)]
fn bug(
    id: &str,
    title: &str,
    description: &str,
    module: &str,
    severity: BugSeverity,
    priority: u8,
    status: BugStatus,
    git_commit: Option<&str>,
    created: i64,
    updated: i64,
    logs: Vec<LogEntry>,
) -> Bug {
    Bug {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        module: module.to_string(),
        severity,
        priority,
        status,
        git_commit: git_commit.map(str::to_string),
        created_at: at(created),
        updated_at: at(updated),
        logs,
    }
}

/// The demo data set, newest first.
pub fn sample_bugs() -> Vec<Bug> {
    vec![
        bug(
            "65f1c0a1e4b0d2a3c4e5f605",
            "Dark mode toggle resets on reload",
            "The theme preference is not persisted to local storage.",
            "ui",
            BugSeverity::Low,
            3,
            BugStatus::Open,
            None,
            1_710_400_000,
            1_710_400_000,
            Vec::new(),
        ),
        bug(
            "65f1c0a1e4b0d2a3c4e5f604",
            "Export to CSV drops unicode characters",
            "Titles containing non-ASCII characters are replaced with '?' in the export.",
            "reports",
            BugSeverity::Medium,
            2,
            BugStatus::Resolved,
            Some("9c1e3f7a52b04d8e61f0a7c3b2d94e85f6a1c0d7"),
            1_710_300_000,
            1_710_390_000,
            vec![
                log(TestStatus::Failed, "Export of 'Café menu' shows 'Caf? menu'", "qa-bot", 1_710_310_000),
                log(TestStatus::Passed, "UTF-8 writer fix verified", "alice", 1_710_390_000),
            ],
        ),
        bug(
            "65f1c0a1e4b0d2a3c4e5f603",
            "Payment webhook retried forever",
            "Failed webhooks are retried without backoff, flooding the provider.",
            "billing",
            BugSeverity::Critical,
            0,
            BugStatus::InProgress,
            Some("4b7d2e9f1a6c83e05d2f9b1c7a4e6d8f3b0c5a21"),
            1_710_200_000,
            1_710_280_000,
            vec![log(
                TestStatus::Failed,
                "Integration test webhook_retry_backoff timed out",
                "ci",
                1_710_280_000,
            )],
        ),
        bug(
            "65f1c0a1e4b0d2a3c4e5f602",
            "Search returns archived projects",
            "Archived projects appear in global search results.",
            "search",
            BugSeverity::Medium,
            2,
            BugStatus::Closed,
            None,
            1_710_100_000,
            1_710_190_000,
            vec![log(TestStatus::Passed, "Archived filter test green", "bob", 1_710_190_000)],
        ),
        bug(
            "65f1c0a1e4b0d2a3c4e5f601",
            "Login button not working",
            "Login button does nothing when clicked.",
            "auth",
            BugSeverity::High,
            1,
            BugStatus::Open,
            Some("e1f2a3b4c5d6e7f8a9b0c1d2e3f4a5b6c7d8e9f0"),
            1_710_000_000,
            1_710_050_000,
            vec![log(
                TestStatus::Failed,
                "Unit tests failed on /login endpoint",
                "qa-bot",
                1_710_050_000,
            )],
        ),
    ]
}

/// Look up a single sample bug by ID.
pub fn sample_bug(id: &str) -> Option<Bug> {
    sample_bugs().into_iter().find(|b| b.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BugFilter;

    #[test]
    fn test_sample_size_matches_constant() {
        assert_eq!(sample_bugs().len(), SAMPLE_SIZE);
    }

    #[test]
    fn test_sample_ids_are_unique_object_ids() {
        let bugs = sample_bugs();
        for bug in &bugs {
            assert_eq!(bug.id.len(), 24);
            assert!(bug.id.chars().all(|c| c.is_ascii_hexdigit()));
        }
        let mut ids: Vec<_> = bugs.iter().map(|b| b.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), SAMPLE_SIZE);
    }

    #[test]
    fn test_sample_is_newest_first() {
        let bugs = sample_bugs();
        assert!(bugs.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[test]
    fn test_sample_covers_every_status() {
        let bugs = sample_bugs();
        for status in BugStatus::ALL {
            assert!(bugs.iter().any(|b| b.status == status), "missing {status}");
        }
    }

    #[test]
    fn test_sample_bug_lookup() {
        assert!(sample_bug("65f1c0a1e4b0d2a3c4e5f603").is_some());
        assert!(sample_bug("000000000000000000000000").is_none());
    }

    #[test]
    fn test_filters_apply_to_sample_data() {
        let filter = BugFilter {
            severity: Some(BugSeverity::Medium),
            ..Default::default()
        };
        assert_eq!(filter.apply(&sample_bugs()).len(), 2);
    }
}
