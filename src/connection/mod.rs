//! Connection supervision: deciding between the live store and demo data.
//!
//! The [`ConnectionSupervisor`] is an explicit context object owned by each
//! shell. It probes the store once at startup with a bounded budget and
//! caches the outcome:
//!
//! - [`ProbeOutcome::Live`] carries the [`StoreHandle`] used for every read and write
//! - [`ProbeOutcome::Demo`] carries the [`DemoReason`] shown to the user
//!
//! Probing never fails and never panics into the caller. Every fault,
//! including a panic inside the driver, becomes a `Demo` outcome. A new probe
//! only happens on an explicit [`ConnectionSupervisor::recheck`].

pub mod diagnostic;
pub mod panic_hook;

use serde::Serialize;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ConnectionConfig;
use crate::storage::mongo::MongoConnector;
use crate::storage::{BugStore, Connector};
use crate::{Error, Result};

pub use diagnostic::{Banner, Diagnostic};

/// Process-wide connection mode as seen by a shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No probe has run yet
    Unknown,
    /// The store answered within budget
    Live,
    /// The store is unreachable; serve sample data read-only
    Demo,
}

impl ConnectionState {
    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionState::Live)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Unknown => "unknown",
            ConnectionState::Live => "live",
            ConnectionState::Demo => "demo",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the supervisor fell back to demo mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DemoReason {
    /// The probe did not finish within its budget
    TimedOut(Duration),
    /// The probe finished with an error
    Unreachable(String),
}

impl fmt::Display for DemoReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemoReason::TimedOut(budget) => {
                write!(f, "no answer within {} ms", budget.as_millis())
            }
            DemoReason::Unreachable(reason) => f.write_str(reason),
        }
    }
}

/// An open store, valid only while the supervisor is `Live`.
#[derive(Clone)]
pub struct StoreHandle {
    store: Arc<dyn BugStore>,
}

impl StoreHandle {
    pub fn new(store: Arc<dyn BugStore>) -> Self {
        Self { store }
    }
}

impl Deref for StoreHandle {
    type Target = dyn BugStore;

    fn deref(&self) -> &Self::Target {
        self.store.as_ref()
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("backend", &self.store.backend_type())
            .finish()
    }
}

/// Result of a single liveness probe.
#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    Live(StoreHandle),
    Demo(DemoReason),
}

impl ProbeOutcome {
    pub fn state(&self) -> ConnectionState {
        match self {
            ProbeOutcome::Live(_) => ConnectionState::Live,
            ProbeOutcome::Demo(_) => ConnectionState::Demo,
        }
    }
}

/// Condense a connect error into one user-facing line.
fn describe_failure(err: &Error) -> String {
    use mongodb::error::ErrorKind;

    match err {
        Error::Store(e) => match e.kind.as_ref() {
            ErrorKind::ServerSelection { .. } => "no server answered".to_string(),
            ErrorKind::Authentication { .. } => "authentication failed".to_string(),
            ErrorKind::InvalidArgument { .. } => "invalid connection string".to_string(),
            ErrorKind::DnsResolve { .. } => "DNS lookup failed".to_string(),
            ErrorKind::Io(io) => format!("I/O error: {}", io),
            _ => e.to_string(),
        },
        other => other.to_string(),
    }
}

/// Run one liveness probe bounded by `budget`.
///
/// The connector runs on its own task so that a panic in the driver is
/// contained and a stalled attempt is cancelled once the budget is spent.
pub async fn probe(
    connector: Arc<dyn Connector>,
    config: &ConnectionConfig,
    budget: Duration,
) -> ProbeOutcome {
    let started = Instant::now();
    let task_config = config.clone();
    let mut task = tokio::spawn(async move { connector.connect(&task_config).await });

    let outcome = match tokio::time::timeout(budget, &mut task).await {
        Ok(Ok(Ok(store))) => ProbeOutcome::Live(StoreHandle::new(store)),
        Ok(Ok(Err(e))) => {
            tracing::debug!(error = %e, "probe failed");
            ProbeOutcome::Demo(DemoReason::Unreachable(describe_failure(&e)))
        }
        Ok(Err(join_error)) => {
            tracing::warn!(error = %join_error, "probe task did not complete");
            ProbeOutcome::Demo(DemoReason::Unreachable(
                "connection attempt aborted unexpectedly".to_string(),
            ))
        }
        Err(_) => {
            task.abort();
            ProbeOutcome::Demo(DemoReason::TimedOut(budget))
        }
    };

    tracing::info!(
        uri = %config.masked_uri(),
        state = %outcome.state(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "connection probe finished"
    );
    outcome
}

/// Owns the connection decision for one shell.
pub struct ConnectionSupervisor {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    outcome: Option<ProbeOutcome>,
    probes: usize,
}

impl ConnectionSupervisor {
    pub fn new(config: ConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            outcome: None,
            probes: 0,
        }
    }

    /// Supervisor for the MongoDB store described by `config`.
    pub fn mongo(config: ConnectionConfig) -> Self {
        Self::new(config, Arc::new(MongoConnector))
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// The cached state. Never performs I/O.
    pub fn current_state(&self) -> ConnectionState {
        self.outcome
            .as_ref()
            .map_or(ConnectionState::Unknown, ProbeOutcome::state)
    }

    /// Probe once if no probe has run yet.
    pub async fn start(&mut self) -> ConnectionState {
        if self.outcome.is_none() {
            self.run_probe().await;
        }
        self.current_state()
    }

    /// Probe again regardless of the cached state.
    pub async fn recheck(&mut self) -> ConnectionState {
        self.run_probe().await;
        self.current_state()
    }

    async fn run_probe(&mut self) {
        self.probes += 1;
        let outcome = probe(
            Arc::clone(&self.connector),
            &self.config,
            self.config.probe_timeout,
        )
        .await;
        if let ProbeOutcome::Demo(reason) = &outcome {
            tracing::warn!(
                uri = %self.config.masked_uri(),
                reason = %reason,
                "store unreachable, serving demo data"
            );
        }
        self.outcome = Some(outcome);
    }

    /// Number of probes run so far.
    pub fn probe_count(&self) -> usize {
        self.probes
    }

    /// Why demo mode is active, if it is.
    pub fn demo_reason(&self) -> Option<&DemoReason> {
        match &self.outcome {
            Some(ProbeOutcome::Demo(reason)) => Some(reason),
            _ => None,
        }
    }

    /// The live store handle.
    ///
    /// Calling this outside `Live` is a programming error: shells must check
    /// [`current_state`](Self::current_state) first.
    pub fn handle(&self) -> Result<StoreHandle> {
        match &self.outcome {
            Some(ProbeOutcome::Live(handle)) => Ok(handle.clone()),
            _ => {
                let state = self.current_state();
                tracing::error!(%state, "store handle requested outside live mode");
                Err(Error::PreconditionViolation(format!(
                    "store handle requested while connection state is {}",
                    state
                )))
            }
        }
    }

    /// The handle for a command that cannot run without the store.
    ///
    /// Demo mode becomes [`Error::StoreUnreachable`] so the caller can print
    /// its diagnostic instead of a precondition failure.
    pub fn require_live(&self) -> Result<StoreHandle> {
        match self.demo_reason() {
            Some(reason) => Err(Error::StoreUnreachable {
                uri: self.config.masked_uri(),
                reason: reason.to_string(),
            }),
            None => self.handle(),
        }
    }
}

impl fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("uri", &self.config.masked_uri())
            .field("state", &self.current_state())
            .field("probes", &self.probes)
            .finish()
    }
}
