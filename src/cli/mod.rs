//! CLI argument definitions for bugtrack.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::models::DEFAULT_PRIORITY;

/// Bugtrack - file bugs, record test runs, and follow them to closure.
///
/// Bugs are stored in MongoDB. Set MONGO_URI (or MONGO_URI in
/// .bugtrack/secrets.toml) to point at your database.
#[derive(Parser, Debug)]
#[command(name = "bt")]
#[command(author, version, about = "A small bug tracker backed by MongoDB", long_about = None)]
#[command(long_version = concat!(
    env!("CARGO_PKG_VERSION"),
    " (", env!("BT_GIT_COMMIT"), ", built ", env!("BT_BUILD_TIMESTAMP"), ")"
))]
pub struct Cli {
    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    pub json: bool,

    /// Directory whose git commit is attached to new bugs (default: current directory)
    #[arg(short = 'C', long = "repo", global = true, env = "BT_REPO")]
    pub repo_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Filters shared by `list` and `export`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only bugs with this status
    #[arg(long, value_parser = ["open", "in-progress", "resolved", "closed"])]
    pub status: Option<String>,

    /// Only bugs in this module
    #[arg(long)]
    pub module: Option<String>,

    /// Only bugs with this severity
    #[arg(long, value_parser = ["low", "medium", "high", "critical"])]
    pub severity: Option<String>,

    /// Only bugs with this priority (0-4)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=4))]
    pub priority: Option<u8>,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// File a new bug (status starts as open)
    Create {
        /// Short summary of the bug
        #[arg(long)]
        title: String,

        /// What happens and how to reproduce it
        #[arg(long, default_value = "")]
        description: String,

        /// Severity
        #[arg(long, default_value = "medium", value_parser = ["low", "medium", "high", "critical"])]
        severity: String,

        /// Affected module or component
        #[arg(long)]
        module: String,

        /// Priority (0-4, lower is more urgent)
        #[arg(short, long, default_value_t = DEFAULT_PRIORITY, value_parser = clap::value_parser!(u8).range(0..=4))]
        priority: u8,
    },

    /// Record a test run against a bug
    AddLog {
        /// Bug ID
        #[arg(long)]
        bug_id: String,

        /// Outcome of the test run
        #[arg(long, value_parser = ["passed", "failed"])]
        status: String,

        /// What was tested and what happened
        #[arg(long)]
        details: String,

        /// Who ran the test (default: current user)
        #[arg(long)]
        author: Option<String>,
    },

    /// List bugs, newest first
    List {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Change a bug's status
    UpdateStatus {
        /// Bug ID
        #[arg(long)]
        bug_id: String,

        /// New status
        #[arg(long, value_parser = ["open", "in-progress", "resolved", "closed"])]
        status: String,
    },

    /// Show a bug with its test logs
    Show {
        /// Bug ID
        #[arg(long)]
        bug_id: String,
    },

    /// Export bugs as CSV
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Show recent audit log entries
    Audit {
        /// Maximum number of entries to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// Check the database connection
    Ping,

    /// Start the web dashboard
    #[cfg(feature = "gui")]
    Dashboard {
        /// Port to listen on
        #[arg(short, long, env = "BT_DASHBOARD_PORT", default_value_t = crate::gui::DEFAULT_PORT)]
        port: u16,

        /// Host address to bind to (use 0.0.0.0 for network access)
        #[arg(long, env = "BT_DASHBOARD_HOST", default_value = "127.0.0.1")]
        host: String,
    },
}

impl Commands {
    /// Whether the command needs a reachable store to do anything useful.
    pub fn requires_store(&self) -> bool {
        !matches!(self, Commands::Audit { .. } | Commands::Ping) && !self.is_dashboard()
    }

    #[cfg(feature = "gui")]
    fn is_dashboard(&self) -> bool {
        matches!(self, Commands::Dashboard { .. })
    }

    #[cfg(not(feature = "gui"))]
    fn is_dashboard(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_create_defaults() {
        let cli = Cli::parse_from(["bt", "create", "--title", "Crash", "--module", "auth"]);
        match cli.command {
            Commands::Create {
                severity, priority, description, ..
            } => {
                assert_eq!(severity, "medium");
                assert_eq!(priority, DEFAULT_PRIORITY);
                assert_eq!(description, "");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_status_is_rejected() {
        let result = Cli::try_parse_from([
            "bt", "update-status", "--bug-id", "x", "--status", "done",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_priority_out_of_range_is_rejected() {
        let result = Cli::try_parse_from([
            "bt", "create", "--title", "t", "--module", "m", "--priority", "9",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_json_flag_after_subcommand() {
        let cli = Cli::parse_from(["bt", "list", "--status", "open", "--json"]);
        assert!(cli.json);
        match cli.command {
            Commands::List { filter } => assert_eq!(filter.status.as_deref(), Some("open")),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_requires_store() {
        assert!(Cli::parse_from(["bt", "show", "--bug-id", "x"]).command.requires_store());
        assert!(!Cli::parse_from(["bt", "ping"]).command.requires_store());
        assert!(!Cli::parse_from(["bt", "audit"]).command.requires_store());
    }
}
