//! MongoDB storage backend.
//!
//! Bugs are stored one document per bug in a single collection, with test
//! logs embedded as an array:
//!
//! ```text
//! { _id, title, description, module, severity, priority, status,
//!   git_commit, created_at, updated_at, logs: [{ status, details, author, timestamp }] }
//! ```
//!
//! Documents written by older versions may lack `priority` or a log
//! `author`; both fall back to defaults on read.

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use bson::{Document, doc};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::options::{ClientOptions, FindOptions};
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{BugStore, Connector, parse_bug_id};
use crate::config::ConnectionConfig;
use crate::models::{
    Bug, BugFilter, BugSeverity, BugStatus, DEFAULT_PRIORITY, LogEntry, NewBug, TestStatus,
};
use crate::{Error, Result};

/// Application name reported to the server.
const APP_NAME: &str = "bugtrack";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LogDocument {
    status: TestStatus,
    details: String,
    #[serde(default = "unknown_author")]
    author: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    timestamp: DateTime<Utc>,
}

fn unknown_author() -> String {
    "unknown".to_string()
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BugDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    module: String,
    #[serde(default)]
    severity: BugSeverity,
    #[serde(default = "default_priority")]
    priority: u8,
    #[serde(default)]
    status: BugStatus,
    #[serde(default)]
    git_commit: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    updated_at: DateTime<Utc>,
    #[serde(default)]
    logs: Vec<LogDocument>,
}

impl From<LogEntry> for LogDocument {
    fn from(entry: LogEntry) -> Self {
        Self {
            status: entry.status,
            details: entry.details,
            author: entry.author,
            timestamp: entry.timestamp,
        }
    }
}

impl From<LogDocument> for LogEntry {
    fn from(doc: LogDocument) -> Self {
        Self {
            status: doc.status,
            details: doc.details,
            author: doc.author,
            timestamp: doc.timestamp,
        }
    }
}

impl From<&Bug> for BugDocument {
    fn from(bug: &Bug) -> Self {
        Self {
            id: ObjectId::parse_str(&bug.id).ok(),
            title: bug.title.clone(),
            description: bug.description.clone(),
            module: bug.module.clone(),
            severity: bug.severity,
            priority: bug.priority,
            status: bug.status,
            git_commit: bug.git_commit.clone(),
            created_at: bug.created_at,
            updated_at: bug.updated_at,
            logs: bug.logs.iter().cloned().map(LogDocument::from).collect(),
        }
    }
}

impl From<BugDocument> for Bug {
    fn from(doc: BugDocument) -> Self {
        Self {
            id: doc.id.map(|oid| oid.to_hex()).unwrap_or_default(),
            title: doc.title,
            description: doc.description,
            module: doc.module,
            severity: doc.severity,
            priority: doc.priority,
            status: doc.status,
            git_commit: doc.git_commit,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
            logs: doc.logs.into_iter().map(LogEntry::from).collect(),
        }
    }
}

/// Build the query document for a filter.
fn filter_document(filter: &BugFilter) -> Document {
    let mut query = Document::new();
    if let Some(status) = filter.status {
        query.insert("status", status.as_str());
    }
    if let Some(module) = &filter.module {
        query.insert("module", module.as_str());
    }
    if let Some(severity) = filter.severity {
        query.insert("severity", severity.as_str());
    }
    if let Some(priority) = filter.priority {
        query.insert("priority", i32::from(priority));
    }
    query
}

/// Bug store backed by a MongoDB collection.
pub struct MongoBugStore {
    collection: Collection<BugDocument>,
}

impl MongoBugStore {
    async fn update_by_id(&self, id: &str, update: Document) -> Result<()> {
        let oid = parse_bug_id(id)?;
        let result = self
            .collection
            .update_one(doc! { "_id": oid }, update, None)
            .await?;
        if result.matched_count == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BugStore for MongoBugStore {
    async fn insert_bug(&self, new_bug: NewBug, git_commit: Option<String>) -> Result<Bug> {
        let mut bug = Bug::new(String::new(), new_bug, git_commit);
        let result = self
            .collection
            .insert_one(BugDocument::from(&bug), None)
            .await?;
        let oid = result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| Error::Other("Store assigned a non-ObjectId _id".to_string()))?;
        bug.id = oid.to_hex();
        Ok(bug)
    }

    async fn append_log(&self, id: &str, entry: LogEntry) -> Result<()> {
        let log = bson::to_bson(&LogDocument::from(entry))?;
        self.update_by_id(
            id,
            doc! {
                "$push": { "logs": log },
                "$set": { "updated_at": bson::DateTime::now() },
            },
        )
        .await
    }

    async fn set_status(&self, id: &str, status: BugStatus) -> Result<()> {
        self.update_by_id(
            id,
            doc! {
                "$set": {
                    "status": status.as_str(),
                    "updated_at": bson::DateTime::now(),
                },
            },
        )
        .await
    }

    async fn list_bugs(&self, filter: &BugFilter) -> Result<Vec<Bug>> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();
        let cursor = self
            .collection
            .find(filter_document(filter), options)
            .await?;
        let docs: Vec<BugDocument> = cursor.try_collect().await?;
        Ok(docs.into_iter().map(Bug::from).collect())
    }

    async fn get_bug(&self, id: &str) -> Result<Option<Bug>> {
        let oid = parse_bug_id(id)?;
        let doc = self
            .collection
            .find_one(doc! { "_id": oid }, None)
            .await?;
        Ok(doc.map(Bug::from))
    }

    fn backend_type(&self) -> &'static str {
        "mongodb"
    }
}

/// Opens a MongoDB client and pings the configured database.
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoConnector;

#[async_trait]
impl Connector for MongoConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn BugStore>> {
        // SRV lookups happen here, so parsing is part of the bounded probe.
        let mut options = ClientOptions::parse(&config.uri.value).await?;
        options.app_name = Some(APP_NAME.to_string());
        options.server_selection_timeout = Some(config.probe_timeout);
        options.connect_timeout = Some(config.probe_timeout);

        let client = Client::with_options(options)?;
        let database = client.database(&config.database);
        database.run_command(doc! { "ping": 1 }, None).await?;
        tracing::debug!(
            uri = %config.masked_uri(),
            database = %config.database,
            "store answered ping"
        );

        Ok(Arc::new(MongoBugStore {
            collection: database.collection(&config.collection),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Resolved, ValueSource};
    use std::time::Duration;

    fn sample_bug() -> Bug {
        let mut bug = Bug::new(
            ObjectId::new().to_hex(),
            NewBug {
                title: "Crash on save".to_string(),
                description: "Saving twice crashes".to_string(),
                module: "editor".to_string(),
                severity: BugSeverity::Critical,
                priority: 0,
            },
            Some("abc123".to_string()),
        );
        bug.logs.push(LogEntry {
            status: TestStatus::Failed,
            details: "save_twice failed".to_string(),
            author: "ci".to_string(),
            timestamp: Utc::now(),
        });
        bug
    }

    #[test]
    fn test_filter_document_empty() {
        assert!(filter_document(&BugFilter::default()).is_empty());
    }

    #[test]
    fn test_filter_document_uses_stored_spellings() {
        let filter = BugFilter {
            status: Some(BugStatus::InProgress),
            module: Some("auth".to_string()),
            severity: Some(BugSeverity::High),
            priority: Some(1),
        };
        let query = filter_document(&filter);

        assert_eq!(query.get_str("status").unwrap(), "in-progress");
        assert_eq!(query.get_str("module").unwrap(), "auth");
        assert_eq!(query.get_str("severity").unwrap(), "high");
        assert_eq!(query.get_i32("priority").unwrap(), 1);
    }

    #[test]
    fn test_document_roundtrip_keeps_fields() {
        let bug = sample_bug();
        let stored = bson::to_document(&BugDocument::from(&bug)).unwrap();

        assert!(stored.get_object_id("_id").is_ok());
        assert!(stored.get_datetime("created_at").is_ok());
        assert_eq!(stored.get_str("status").unwrap(), "open");

        let back: Bug = bson::from_document::<BugDocument>(stored).unwrap().into();
        assert_eq!(back.id, bug.id);
        assert_eq!(back.logs.len(), 1);
        assert_eq!(back.logs[0].author, "ci");
        assert_eq!(back.created_at.timestamp_millis(), bug.created_at.timestamp_millis());
    }

    #[test]
    fn test_legacy_document_gets_defaults() {
        let legacy = doc! {
            "_id": ObjectId::new(),
            "title": "Old bug",
            "description": "from the first release",
            "severity": "high",
            "status": "open",
            "module": "auth",
            "git_commit": bson::Bson::Null,
            "created_at": bson::DateTime::now(),
            "updated_at": bson::DateTime::now(),
            "logs": [{ "timestamp": bson::DateTime::now(), "status": "passed", "details": "ok" }],
        };
        let bug: Bug = bson::from_document::<BugDocument>(legacy).unwrap().into();

        assert_eq!(bug.priority, DEFAULT_PRIORITY);
        assert_eq!(bug.git_commit, None);
        assert_eq!(bug.logs[0].author, "unknown");
    }

    #[tokio::test]
    async fn test_connector_rejects_malformed_uri_without_network() {
        let config = ConnectionConfig {
            uri: Resolved::new("not-a-mongodb-uri".to_string(), ValueSource::Default),
            probe_timeout: Duration::from_millis(100),
            ..Default::default()
        };
        assert!(MongoConnector.connect(&config).await.is_err());
    }
}
