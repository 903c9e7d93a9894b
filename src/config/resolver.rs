//! Precedence resolution for the connection configuration.
//!
//! ## URI Precedence (highest to lowest)
//!
//! 1. `MONGO_URI` key in the secrets file
//! 2. `MONGO_URI` environment variable
//! 3. Built-in default (`mongodb://localhost:27017/`)
//!
//! The database name (`MONGO_DB`) and the probe budget
//! (`probe_timeout_ms` / `BUGTRACK_PROBE_TIMEOUT_MS`) follow the same order.
//!
//! ## Secrets file location (first existing file wins)
//!
//! 1. `BUGTRACK_SECRETS` environment variable
//! 2. `./.bugtrack/secrets.toml`
//! 3. `~/.config/bugtrack/secrets.toml`
//!
//! Resolution never fails. A missing setting falls through to the next
//! source. A malformed secrets file is skipped and recorded in
//! [`ConnectionConfig::skipped_secrets`] so `bt ping` can show it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Secrets;

/// Environment variable holding the connection string.
pub const MONGO_URI_ENV: &str = "MONGO_URI";

/// Environment variable holding the database name.
pub const MONGO_DB_ENV: &str = "MONGO_DB";

/// Environment variable holding the probe budget in milliseconds.
pub const PROBE_TIMEOUT_ENV: &str = "BUGTRACK_PROBE_TIMEOUT_MS";

/// Environment variable pointing at an explicit secrets file.
pub const SECRETS_PATH_ENV: &str = "BUGTRACK_SECRETS";

pub const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017/";
pub const DEFAULT_DATABASE: &str = "bug_tracker_db";
pub const DEFAULT_COLLECTION: &str = "bugs";
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from a secrets file
    Secrets(PathBuf),
    /// Value from an environment variable
    EnvVar(String),
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::Secrets(path) => write!(f, "secrets:{}", path.display()),
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub value: T,
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// A secrets file that was found but could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSecrets {
    pub path: PathBuf,
    pub reason: String,
}

/// Everything needed to reach the bug collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Connection string with its source
    pub uri: Resolved<String>,
    /// Database holding the bug collection
    pub database: String,
    /// Collection holding bug documents
    pub collection: String,
    /// Upper bound for the liveness probe
    pub probe_timeout: Duration,
    /// Secrets files passed over during resolution
    pub skipped_secrets: Vec<SkippedSecrets>,
}

impl ConnectionConfig {
    /// The connection string with any password replaced, safe to print.
    pub fn masked_uri(&self) -> String {
        mask_uri(&self.uri.value)
    }

    /// True when no source configured a URI and the local default is in use.
    pub fn uses_default_uri(&self) -> bool {
        self.uri.source == ValueSource::Default
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            uri: Resolved::new(DEFAULT_MONGO_URI.to_string(), ValueSource::Default),
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            skipped_secrets: Vec::new(),
        }
    }
}

/// The raw inputs to resolution, captured once so tests can build them
/// without touching the process environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Parsed secrets file and where it was found
    pub secrets: Option<(PathBuf, Secrets)>,
    /// Relevant environment variables
    pub env: HashMap<String, String>,
    /// Secrets files that existed but failed to load
    pub skipped: Vec<SkippedSecrets>,
}

impl ConfigSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.insert(key.to_string(), value.into());
        self
    }

    pub fn with_secrets(mut self, path: impl Into<PathBuf>, secrets: Secrets) -> Self {
        self.secrets = Some((path.into(), secrets));
        self
    }

    /// Capture the real environment and the first readable secrets file.
    pub fn from_process() -> Self {
        let env: HashMap<String, String> = [
            MONGO_URI_ENV,
            MONGO_DB_ENV,
            PROBE_TIMEOUT_ENV,
            SECRETS_PATH_ENV,
        ]
        .iter()
        .filter_map(|key| std::env::var(key).ok().map(|v| (key.to_string(), v)))
        .collect();

        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let mut skipped = Vec::new();
        let secrets = secrets_search_paths(&env, &cwd)
            .into_iter()
            .find_map(|path| match Secrets::load(&path) {
                Ok(Some(secrets)) => {
                    tracing::debug!(path = %path.display(), "loaded secrets file");
                    Some((path, secrets))
                }
                Ok(None) => None,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable secrets file");
                    skipped.push(SkippedSecrets {
                        path,
                        reason: single_line(&e.to_string()),
                    });
                    None
                }
            });

        Self {
            secrets,
            env,
            skipped,
        }
    }

    fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Collapse a multi-line parser message to its first and last lines.
fn single_line(message: &str) -> String {
    let lines: Vec<&str> = message
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    match lines.as_slice() {
        [] => String::new(),
        [only] => only.to_string(),
        [first, .., last] => format!("{}: {}", first, last),
    }
}

/// Candidate secrets file locations in precedence order.
pub fn secrets_search_paths(env: &HashMap<String, String>, cwd: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(explicit) = env.get(SECRETS_PATH_ENV).filter(|v| !v.trim().is_empty()) {
        paths.push(PathBuf::from(explicit));
    }
    paths.push(cwd.join(".bugtrack").join("secrets.toml"));
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("bugtrack").join("secrets.toml"));
    }
    paths
}

/// Resolve the connection configuration from the real process environment.
pub fn resolve_config() -> ConnectionConfig {
    resolve_config_from(&ConfigSources::from_process())
}

/// Resolve the connection configuration from captured sources.
pub fn resolve_config_from(sources: &ConfigSources) -> ConnectionConfig {
    let mut config = ConnectionConfig {
        skipped_secrets: sources.skipped.clone(),
        ..Default::default()
    };
    let secrets = sources.secrets.as_ref();
    let non_blank = |v: &Option<String>| v.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);

    // Resolve URI
    if let Some((path, uri)) = secrets.and_then(|(p, s)| non_blank(&s.mongo_uri).map(|u| (p, u))) {
        config.uri = Resolved::new(uri, ValueSource::Secrets(path.clone()));
    } else if let Some(uri) = sources.env_value(MONGO_URI_ENV) {
        config.uri = Resolved::new(uri.to_string(), ValueSource::EnvVar(MONGO_URI_ENV.to_string()));
    } else {
        tracing::debug!("no {} configured, using {}", MONGO_URI_ENV, DEFAULT_MONGO_URI);
    }

    // Resolve database name
    if let Some(db) = secrets.and_then(|(_, s)| non_blank(&s.mongo_db)) {
        config.database = db;
    } else if let Some(db) = sources.env_value(MONGO_DB_ENV) {
        config.database = db.to_string();
    }

    // Resolve probe budget
    if let Some(ms) = secrets.and_then(|(_, s)| s.probe_timeout_ms) {
        config.probe_timeout = Duration::from_millis(ms);
    } else if let Some(raw) = sources.env_value(PROBE_TIMEOUT_ENV) {
        match raw.parse::<u64>() {
            Ok(ms) => config.probe_timeout = Duration::from_millis(ms),
            Err(_) => tracing::warn!(
                "ignoring {}={:?}: not a number of milliseconds",
                PROBE_TIMEOUT_ENV,
                raw
            ),
        }
    }

    config
}

/// Replace the password in a connection string's user info with `****`.
pub fn mask_uri(uri: &str) -> String {
    let Some(scheme_end) = uri.find("://") else {
        return uri.to_string();
    };
    let rest = &uri[scheme_end + 3..];
    // Passwords may contain unescaped '/', so the user info ends at the last '@'.
    let query_start = rest.find('?').unwrap_or(rest.len());
    let Some(at) = rest[..query_start].rfind('@') else {
        return uri.to_string();
    };
    let user_info = &rest[..at];
    let masked_user_info = match user_info.split_once(':') {
        Some((user, _)) => format!("{}:****", user),
        None => user_info.to_string(),
    };
    format!(
        "{}{}{}",
        &uri[..scheme_end + 3],
        masked_user_info,
        &rest[at..]
    )
}
