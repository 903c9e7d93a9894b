//! Connectors that simulate an unhealthy store.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{BugStore, Connector};
use crate::config::ConnectionConfig;
use crate::{Error, Result};

/// Fails immediately, as if the port refused the connection.
#[derive(Clone, Default)]
pub struct RefusingConnector {
    attempts: Arc<AtomicUsize>,
}

impl RefusingConnector {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for RefusingConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn BugStore>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::Other(format!(
            "connection refused by {}",
            config.masked_uri()
        )))
    }
}

/// Waits `delay` before delegating to `inner`, as a slow or dead host would.
pub struct StallingConnector<C> {
    pub delay: Duration,
    pub inner: C,
}

#[async_trait]
impl<C: Connector> Connector for StallingConnector<C> {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn BugStore>> {
        tokio::time::sleep(self.delay).await;
        self.inner.connect(config).await
    }
}

/// Panics inside the connect future.
pub struct PanickingConnector;

#[async_trait]
impl Connector for PanickingConnector {
    async fn connect(&self, _config: &ConnectionConfig) -> Result<Arc<dyn BugStore>> {
        panic!("driver bug");
    }
}
