//! User-facing guidance for connection problems.
//!
//! - [`Diagnostic`] is the two-line message the CLI prints on failure
//! - [`Banner`] is the non-blocking notice the dashboard shows in demo mode

use serde::Serialize;

use crate::Error;
use crate::config::{ConnectionConfig, MONGO_URI_ENV};

/// Glyph prefixed to the error line.
pub const ERROR_GLYPH: &str = "❌";

/// Glyph prefixed to the tip line.
pub const TIP_GLYPH: &str = "💡";

/// Command that starts a disposable local MongoDB.
pub const LOCAL_CONTAINER_COMMAND: &str = "docker run -d --name bugtrack-mongo -p 27017:27017 mongo";

/// A short, actionable error: one error line and one tip line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub error: String,
    pub tip: String,
}

impl Diagnostic {
    /// Build the diagnostic for an error surfaced by a CLI command.
    pub fn from_error(err: &Error) -> Self {
        let (error, tip) = match err {
            Error::StoreUnreachable { uri, reason } => (
                format!("Could not connect to MongoDB at {} ({}).", uri, reason),
                format!(
                    "Start a local instance with `{}` or set {} to your hosted cluster.",
                    LOCAL_CONTAINER_COMMAND, MONGO_URI_ENV
                ),
            ),
            Error::NotFound(id) => (
                format!("No bug found with ID {}.", id),
                "Check Bug ID. Run `bt list` to see existing IDs.".to_string(),
            ),
            Error::InvalidId(id) => (
                format!("'{}' is not a valid bug ID.", id),
                "Bug IDs are 24 hexadecimal characters, as printed by `bt create` and `bt list`."
                    .to_string(),
            ),
            Error::InvalidInput(msg) => (
                msg.clone(),
                "Run the command with --help to see accepted values.".to_string(),
            ),
            Error::ReadOnly => (
                "Demo mode is read-only.".to_string(),
                format!("Set {} to a reachable database to make changes.", MONGO_URI_ENV),
            ),
            Error::Store(_) => (
                "The database rejected the request.".to_string(),
                "Check that the configured user can read and write the bug collection."
                    .to_string(),
            ),
            Error::PreconditionViolation(_) => (
                "Internal error while preparing the database connection.".to_string(),
                "Re-run with BUGTRACK_LOG=debug and report the output.".to_string(),
            ),
            other => (
                other.to_string(),
                "Re-run with BUGTRACK_LOG=debug for more detail.".to_string(),
            ),
        };
        Self { error, tip }
    }

    /// Render as exactly two lines.
    pub fn render(&self) -> String {
        format!(
            "{} {}\n{} Tip: {}",
            ERROR_GLYPH,
            single_line(&self.error),
            TIP_GLYPH,
            single_line(&self.tip)
        )
    }

    /// Render as a JSON object for `--json` output.
    pub fn to_json(&self) -> String {
        serde_json::json!({ "error": self.error, "tip": self.tip }).to_string()
    }
}

fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Guidance shown on the dashboard while demo data is served.
#[derive(Debug, Clone, Serialize)]
pub struct Banner {
    pub title: String,
    pub reason: String,
    pub uri: String,
    pub local_steps: Vec<String>,
    pub hosted_steps: Vec<String>,
}

impl Banner {
    pub fn new(config: &ConnectionConfig, reason: &str) -> Self {
        Self {
            title: "Demo mode: showing sample data".to_string(),
            reason: format!(
                "Could not reach MongoDB at {} ({}). Changes are disabled until a database is connected.",
                config.masked_uri(),
                reason
            ),
            uri: config.masked_uri(),
            local_steps: vec![
                format!("Start a local database: {}", LOCAL_CONTAINER_COMMAND),
                format!("Or point {} at an existing instance before starting the dashboard.", MONGO_URI_ENV),
            ],
            hosted_steps: vec![
                format!(
                    "Add {} = \"mongodb+srv://...\" to .bugtrack/secrets.toml (or the file named by BUGTRACK_SECRETS).",
                    MONGO_URI_ENV
                ),
                "Allow this host's address in the cluster's network access list.".to_string(),
            ],
        }
    }
}
