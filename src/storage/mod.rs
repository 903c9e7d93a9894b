//! Storage backends for bug records.
//!
//! This module provides the store abstraction used behind a live connection:
//! - `MongoBugStore` - The document database (production)
//! - `InMemoryBugStore` - Ephemeral store for tests and local experiments
//!
//! A [`Connector`] opens a store and proves it is alive. The connection
//! supervisor is the only caller of a connector; shells never open a store
//! directly.

pub mod memory;
pub mod mongo;
#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use bson::oid::ObjectId;
use std::sync::Arc;

use crate::config::ConnectionConfig;
use crate::models::{Bug, BugFilter, BugStatus, LogEntry, NewBug};
use crate::{Error, Result};

/// Persistence operations for bugs.
///
/// Write operations fail with [`Error::NotFound`] when no bug has the given ID
/// and with [`Error::InvalidId`] when the ID is not a 24-hex object ID.
#[async_trait]
pub trait BugStore: Send + Sync {
    /// Insert a new bug and return it with its store-assigned ID.
    async fn insert_bug(&self, new_bug: NewBug, git_commit: Option<String>) -> Result<Bug>;

    /// Append a test log to a bug and bump its `updated_at`.
    async fn append_log(&self, id: &str, entry: LogEntry) -> Result<()>;

    /// Set a bug's status and bump its `updated_at`.
    async fn set_status(&self, id: &str, status: BugStatus) -> Result<()>;

    /// List bugs matching `filter`, newest first.
    async fn list_bugs(&self, filter: &BugFilter) -> Result<Vec<Bug>>;

    /// Fetch a single bug.
    async fn get_bug(&self, id: &str) -> Result<Option<Bug>>;

    /// Get the backend type name.
    fn backend_type(&self) -> &'static str;
}

/// Opens a store and verifies it answers.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a store for `config` and issue a liveness check against it.
    ///
    /// Implementations may take arbitrarily long; the caller bounds them.
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn BugStore>>;
}

/// Parse a bug ID as the store's object ID.
pub fn parse_bug_id(id: &str) -> Result<ObjectId> {
    ObjectId::parse_str(id.trim()).map_err(|_| Error::InvalidId(id.to_string()))
}
