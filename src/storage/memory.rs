//! In-memory storage backend.
//!
//! Keeps bugs in a `Vec` behind a mutex and counts every write it accepts,
//! which lets tests assert that nothing was written. IDs are real object IDs
//! so the same validation applies as with the document store.

use async_trait::async_trait;
use bson::oid::ObjectId;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{BugStore, Connector, parse_bug_id};
use crate::config::ConnectionConfig;
use crate::models::{Bug, BugFilter, BugStatus, LogEntry, NewBug};
use crate::{Error, Result};

#[derive(Default)]
struct Inner {
    bugs: Vec<Bug>,
    writes: usize,
}

/// Ephemeral bug store. Clones share the same data.
#[derive(Clone, Default)]
pub struct InMemoryBugStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryBugStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes since creation.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Number of bugs currently stored.
    pub fn len(&self) -> usize {
        self.lock().bugs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave a half-written bug behind.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update<F>(&self, id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut Bug),
    {
        let oid = parse_bug_id(id)?.to_hex();
        let mut inner = self.lock();
        let bug = inner
            .bugs
            .iter_mut()
            .find(|b| b.id == oid)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        f(bug);
        bug.updated_at = Utc::now();
        inner.writes += 1;
        Ok(())
    }
}

#[async_trait]
impl BugStore for InMemoryBugStore {
    async fn insert_bug(&self, new_bug: NewBug, git_commit: Option<String>) -> Result<Bug> {
        let bug = Bug::new(ObjectId::new().to_hex(), new_bug, git_commit);
        let mut inner = self.lock();
        inner.bugs.push(bug.clone());
        inner.writes += 1;
        Ok(bug)
    }

    async fn append_log(&self, id: &str, entry: LogEntry) -> Result<()> {
        self.update(id, |bug| bug.logs.push(entry))
    }

    async fn set_status(&self, id: &str, status: BugStatus) -> Result<()> {
        self.update(id, |bug| bug.status = status)
    }

    async fn list_bugs(&self, filter: &BugFilter) -> Result<Vec<Bug>> {
        Ok(filter.apply(&self.lock().bugs))
    }

    async fn get_bug(&self, id: &str) -> Result<Option<Bug>> {
        let oid = parse_bug_id(id)?.to_hex();
        Ok(self.lock().bugs.iter().find(|b| b.id == oid).cloned())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

/// Connector that always succeeds with a shared in-memory store.
#[derive(Clone, Default)]
pub struct InMemoryConnector {
    store: InMemoryBugStore,
    connects: Arc<AtomicUsize>,
}

impl InMemoryConnector {
    pub fn new(store: InMemoryBugStore) -> Self {
        Self {
            store,
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// How many times `connect` has been called.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    async fn connect(&self, _config: &ConnectionConfig) -> Result<Arc<dyn BugStore>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.store.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BugSeverity, TestStatus};

    fn new_bug(title: &str, module: &str) -> NewBug {
        NewBug {
            title: title.to_string(),
            description: "desc".to_string(),
            module: module.to_string(),
            severity: BugSeverity::Low,
            priority: 2,
        }
    }

    fn entry(details: &str) -> LogEntry {
        LogEntry {
            status: TestStatus::Failed,
            details: details.to_string(),
            author: "tester".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_object_id() {
        let store = InMemoryBugStore::new();
        let bug = store.insert_bug(new_bug("A", "auth"), None).await.unwrap();

        assert!(parse_bug_id(&bug.id).is_ok());
        assert_eq!(store.len(), 1);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_append_log_keeps_order() {
        let store = InMemoryBugStore::new();
        let bug = store.insert_bug(new_bug("A", "auth"), None).await.unwrap();

        store.append_log(&bug.id, entry("first")).await.unwrap();
        store.append_log(&bug.id, entry("second")).await.unwrap();

        let stored = store.get_bug(&bug.id).await.unwrap().unwrap();
        let details: Vec<_> = stored.logs.iter().map(|l| l.details.as_str()).collect();
        assert_eq!(details, vec!["first", "second"]);
        assert!(stored.updated_at >= stored.created_at);
    }

    #[tokio::test]
    async fn test_set_status_unknown_bug_is_not_found() {
        let store = InMemoryBugStore::new();
        let missing = ObjectId::new().to_hex();

        let err = store.set_status(&missing, BugStatus::Closed).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_id_is_rejected() {
        let store = InMemoryBugStore::new();
        let err = store.get_bug("nope").await.unwrap_err();
        assert!(matches!(err, Error::InvalidId(_)));
    }

    #[tokio::test]
    async fn test_list_applies_filter() {
        let store = InMemoryBugStore::new();
        store.insert_bug(new_bug("A", "auth"), None).await.unwrap();
        store.insert_bug(new_bug("B", "billing"), None).await.unwrap();

        let filter = BugFilter {
            module: Some("billing".to_string()),
            ..Default::default()
        };
        let bugs = store.list_bugs(&filter).await.unwrap();
        assert_eq!(bugs.len(), 1);
        assert_eq!(bugs[0].title, "B");
    }

    #[tokio::test]
    async fn test_connector_shares_store() {
        let store = InMemoryBugStore::new();
        let connector = InMemoryConnector::new(store.clone());
        let handle = connector.connect(&ConnectionConfig::default()).await.unwrap();

        handle.insert_bug(new_bug("A", "auth"), None).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(connector.connect_count(), 1);
        assert_eq!(handle.backend_type(), "memory");
    }
}
