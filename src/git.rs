//! Git helpers for attaching the checked-out commit to new bugs.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use wait_timeout::ChildExt;

/// Maximum time to wait for `git rev-parse`.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Return the commit hash checked out in `repo`, if any.
///
/// Returns `None` outside a git repository, when git is not installed, when
/// the repository has no commits, or when git does not answer within
/// [`GIT_TIMEOUT`].
pub fn current_commit(repo: &Path) -> Option<String> {
    let mut child = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(repo)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;

    match child.wait_timeout(GIT_TIMEOUT) {
        Ok(Some(status)) if status.success() => {
            let mut stdout = String::new();
            child.stdout.take()?.read_to_string(&mut stdout).ok()?;
            let hash = stdout.trim();
            is_commit_hash(hash).then(|| hash.to_string())
        }
        Ok(Some(_)) => None,
        Ok(None) => {
            tracing::warn!(repo = %repo.display(), "git rev-parse timed out");
            let _ = child.kill();
            let _ = child.wait();
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, "failed waiting for git");
            None
        }
    }
}

/// SHA-1 (40) or SHA-256 (64) hex object name.
fn is_commit_hash(s: &str) -> bool {
    matches!(s.len(), 40 | 64) && s.chars().all(|c| c.is_ascii_hexdigit())
}
