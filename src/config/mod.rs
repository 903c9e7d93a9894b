//! Connection configuration for bugtrack.
//!
//! ## secrets.toml - Hosted deployment settings (may contain credentials)
//!
//! Located at (first match wins):
//! - `$BUGTRACK_SECRETS`
//! - `./.bugtrack/secrets.toml`
//! - `~/.config/bugtrack/secrets.toml`
//!
//! Contains:
//! - `MONGO_URI` - Connection string
//! - `MONGO_DB` - Database name
//! - `probe_timeout_ms` - Liveness probe budget
//!
//! ## Precedence
//!
//! secrets file > environment variable > built-in default
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    ConfigSources, ConnectionConfig, DEFAULT_COLLECTION, DEFAULT_DATABASE, DEFAULT_MONGO_URI,
    DEFAULT_PROBE_TIMEOUT, MONGO_DB_ENV, MONGO_URI_ENV, PROBE_TIMEOUT_ENV, Resolved,
    SECRETS_PATH_ENV, SkippedSecrets, ValueSource, mask_uri, resolve_config, resolve_config_from,
};
pub use schema::Secrets;
