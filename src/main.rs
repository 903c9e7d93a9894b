//! bt - command-line bug tracker backed by MongoDB.

use bugtrack::audit::AuditLog;
use bugtrack::cli::{Cli, Commands, FilterArgs};
use bugtrack::commands::{self, BugSource, CommandResult};
use bugtrack::config::resolve_config;
use bugtrack::connection::{ConnectionSupervisor, Diagnostic, panic_hook};
use bugtrack::models::{BugFilter, NewBug, NewLogEntry};
use bugtrack::storage::parse_bug_id;
use bugtrack::{Error, Result};
use clap::Parser;
use std::env;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::process;

/// Environment variable holding the tracing filter.
const LOG_ENV: &str = "BUGTRACK_LOG";

fn main() {
    let cli = Cli::parse();
    init_tracing();
    panic_hook::install();
    let json = cli.json;

    let result = resolve_repo_path(cli.repo_path).and_then(|repo_path| {
        tokio::runtime::Builder::new_multi_thread()
            .thread_name(panic_hook::WORKER_THREAD_NAME)
            .enable_all()
            .build()
            .map_err(|e| Error::Other(format!("Failed to create runtime: {}", e)))?
            .block_on(run_command(cli.command, &repo_path, json))
    });

    if let Err(e) = result {
        let diagnostic = Diagnostic::from_error(&e);
        if json {
            eprintln!("{}", diagnostic.to_json());
        } else {
            eprintln!("{}", diagnostic.render());
        }
        process::exit(1);
    }
}

/// Log to stderr, filtered by `BUGTRACK_LOG` (default: errors only).
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("error"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Resolve the repository path: --repo flag > BT_REPO env var > current directory.
fn resolve_repo_path(explicit_path: Option<PathBuf>) -> Result<PathBuf> {
    match explicit_path {
        Some(path) if !path.exists() => Err(Error::InvalidInput(format!(
            "Specified repo path does not exist: {}",
            path.display()
        ))),
        Some(path) => Ok(path),
        None => Ok(env::current_dir().unwrap_or_else(|_| PathBuf::from("."))),
    }
}

async fn run_command(command: Commands, repo_path: &Path, json: bool) -> Result<()> {
    let audit = AuditLog::from_env();

    // Reject malformed IDs before spending the probe budget.
    if let Commands::AddLog { bug_id, .. }
    | Commands::UpdateStatus { bug_id, .. }
    | Commands::Show { bug_id } = &command
    {
        parse_bug_id(bug_id)?;
    }

    if let Commands::Audit { limit } = command {
        output(&commands::audit_entries(&audit, limit)?, json);
        return Ok(());
    }

    let config = resolve_config();
    tracing::debug!(uri = %config.masked_uri(), source = %config.uri.source, "resolved connection config");
    let mut supervisor = ConnectionSupervisor::mongo(config);

    if !command.requires_store() {
        return run_without_store(command, supervisor, audit, repo_path, json).await;
    }

    supervisor.start().await;
    let handle = supervisor.require_live()?;

    match command {
        Commands::Create {
            title,
            description,
            severity,
            module,
            priority,
        } => {
            let new_bug = NewBug {
                title,
                description,
                module,
                severity: severity.parse()?,
                priority,
            };
            let result = commands::create_bug(&handle, &audit, repo_path, new_bug).await?;
            output(&result, json);
        }
        Commands::AddLog {
            bug_id,
            status,
            details,
            author,
        } => {
            let entry = NewLogEntry {
                status: status.parse()?,
                details,
                author: author.unwrap_or_default(),
            };
            let result = commands::add_log(&handle, &audit, &bug_id, entry).await?;
            output(&result, json);
        }
        Commands::List { filter } => {
            let source = BugSource::Store(handle);
            let result = commands::list_bugs(&source, &to_filter(&filter)?).await?;
            output(&result, json);
        }
        Commands::UpdateStatus { bug_id, status } => {
            let result =
                commands::update_status(&handle, &audit, &bug_id, status.parse()?).await?;
            output(&result, json);
        }
        Commands::Show { bug_id } => {
            let source = BugSource::Store(handle);
            let result = commands::show_bug(&source, &bug_id).await?;
            output(&result, json);
        }
        Commands::Export { output: path, filter } => {
            let source = BugSource::Store(handle);
            let filter = to_filter(&filter)?;
            match path {
                Some(path) => {
                    let file = BufWriter::new(File::create(&path)?);
                    let mut summary = commands::export_csv(&source, &filter, file).await?;
                    summary.path = Some(path.display().to_string());
                    output(&summary, json);
                }
                None => {
                    commands::export_csv(&source, &filter, io::stdout().lock()).await?;
                }
            }
        }
        other => {
            return Err(Error::Other(format!(
                "command does not use the store: {:?}",
                other
            )));
        }
    }

    Ok(())
}

#[cfg_attr(not(feature = "gui"), allow(unused_variables))]
async fn run_without_store(
    command: Commands,
    mut supervisor: ConnectionSupervisor,
    audit: AuditLog,
    repo_path: &Path,
    json: bool,
) -> Result<()> {
    match command {
        Commands::Ping => {
            let state = supervisor.start().await;
            output(&commands::connection_report(&supervisor), json);
            if !state.is_live() {
                process::exit(1);
            }
            Ok(())
        }
        #[cfg(feature = "gui")]
        Commands::Dashboard { port, host } => {
            supervisor.start().await;
            bugtrack::gui::start_server(supervisor, audit, repo_path.to_path_buf(), &host, port)
                .await
        }
        other => Err(Error::Other(format!("command requires the store: {:?}", other))),
    }
}

fn to_filter(args: &FilterArgs) -> Result<BugFilter> {
    BugFilter::parse(
        args.status.as_deref(),
        args.module.as_deref(),
        args.severity.as_deref(),
        args.priority,
    )
}

/// Print output in JSON or human-readable format.
fn output<T: CommandResult>(result: &T, json: bool) {
    if json {
        println!("{}", result.to_json());
    } else {
        println!("{}", result.to_human());
    }
}
