//! Git command runner for deploylock.
//!
//! Provides a safe wrapper around git commands with captured stdout/stderr
//! and structured error handling. All git operations go through this module.
//!
//! Failures are reported as [`StoreError`] so that the ref store can classify
//! them (missing refs, rejected duplicate names, permission problems) without
//! parsing human-readable error strings a second time.

use crate::error::{DeployLockError, Result};
use crate::store::{StoreError, StoreResult};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

/// Result of a successful git command execution.
#[derive(Debug, Clone)]
pub struct GitOutput {
    /// Standard output from the command (trimmed).
    pub stdout: String,
    /// Standard error from the command (trimmed).
    pub stderr: String,
}

impl GitOutput {
    /// Create a new GitOutput from raw output bytes.
    fn from_output(output: &Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }

    /// Returns stdout lines as a vector.
    pub fn lines(&self) -> Vec<&str> {
        if self.stdout.is_empty() {
            Vec::new()
        } else {
            self.stdout.lines().collect()
        }
    }
}

/// Run a git command with the specified working directory.
///
/// # Returns
///
/// * `Ok(GitOutput)` - On successful execution (exit code 0)
/// * `Err(StoreError::Forbidden)` - git reported a permission problem
/// * `Err(StoreError::Unexpected)` - Any other non-zero exit, carrying the exit status
pub fn run_git<P: AsRef<Path>>(cwd: P, args: &[&str]) -> StoreResult<GitOutput> {
    let output = Command::new("git")
        .current_dir(cwd.as_ref())
        .args(args)
        .output()
        .map_err(|e| spawn_failure(args, e))?;

    finish(args, &output)
}

/// Run a git command, writing `input` to its standard input.
///
/// Used for plumbing commands that read objects from stdin
/// (`hash-object --stdin`, `mktree`).
pub fn run_git_with_input<P: AsRef<Path>>(
    cwd: P,
    args: &[&str],
    input: &str,
) -> StoreResult<GitOutput> {
    let mut child = Command::new("git")
        .current_dir(cwd.as_ref())
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| spawn_failure(args, e))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .map_err(|e| spawn_failure(args, e))?;
        // stdin is dropped here so git sees EOF
    }

    let output = child
        .wait_with_output()
        .map_err(|e| spawn_failure(args, e))?;

    finish(args, &output)
}

/// Run a git command and return its stdout byte for byte.
///
/// Unlike [`run_git`] nothing is trimmed. Output that is not valid UTF-8 is
/// an error rather than being replaced.
pub fn run_git_raw<P: AsRef<Path>>(cwd: P, args: &[&str]) -> StoreResult<String> {
    let output = Command::new("git")
        .current_dir(cwd.as_ref())
        .args(args)
        .output()
        .map_err(|e| spawn_failure(args, e))?;

    finish(args, &output)?;

    String::from_utf8(output.stdout).map_err(|e| StoreError::Unexpected {
        status: -1,
        message: format!("git {} produced invalid UTF-8: {}", subcommand(args), e),
    })
}

fn finish(args: &[&str], output: &Output) -> StoreResult<GitOutput> {
    let git_output = GitOutput::from_output(output);

    if output.status.success() {
        return Ok(git_output);
    }

    let exit_code = output.status.code().unwrap_or(-1);
    let error_msg = if git_output.stderr.is_empty() {
        git_output.stdout.clone()
    } else {
        git_output.stderr.clone()
    };
    let message = format!(
        "git {} failed (exit code {}): {}",
        subcommand(args),
        exit_code,
        error_msg
    );

    if error_msg.to_lowercase().contains("permission denied") {
        Err(StoreError::Forbidden(message))
    } else {
        Err(StoreError::Unexpected {
            status: exit_code,
            message,
        })
    }
}

fn spawn_failure(args: &[&str], e: std::io::Error) -> StoreError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        return StoreError::Forbidden(format!("failed to execute git {}: {}", subcommand(args), e));
    }
    StoreError::Unexpected {
        status: -1,
        message: format!("failed to execute git {}: {}", subcommand(args), e),
    }
}

/// First argument that is not a `-c key=value` pair, for error messages.
fn subcommand<'a>(args: &[&'a str]) -> &'a str {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if *arg == "-c" {
            iter.next();
            continue;
        }
        return arg;
    }
    ""
}

/// Get the repository root directory using `git rev-parse --show-toplevel`.
///
/// # Returns
///
/// * `Ok(PathBuf)` - The absolute path to the repository root
/// * `Err(DeployLockError::UserError)` - If not inside a git repository (exit code 1)
pub fn get_repo_root<P: AsRef<Path>>(cwd: P) -> Result<PathBuf> {
    let output = run_git(cwd.as_ref(), &["rev-parse", "--show-toplevel"]).map_err(|e| {
        DeployLockError::UserError(format!(
            "not inside a git repository. Run this command from within a git repository \
             or pass --repo.\n({})",
            e
        ))
    })?;
    Ok(PathBuf::from(&output.stdout))
}

/// Name of the branch checked out at `cwd`.
///
/// # Returns
///
/// * `Ok(String)` - the current branch name
/// * `Err(DeployLockError::UserError)` - not in a repository, or HEAD is detached
pub fn current_branch<P: AsRef<Path>>(cwd: P) -> Result<String> {
    let output = run_git(cwd.as_ref(), &["rev-parse", "--abbrev-ref", "HEAD"]).map_err(|e| {
        DeployLockError::UserError(format!(
            "cannot determine the source branch; pass --branch.\n({})",
            e
        ))
    })?;

    if output.stdout == "HEAD" {
        return Err(DeployLockError::UserError(
            "HEAD is detached; pass --branch to name the source branch".to_string(),
        ));
    }
    Ok(output.stdout)
}

/// Check that `path` is a git repository (bare or with a worktree).
pub fn is_git_repository<P: AsRef<Path>>(path: P) -> bool {
    run_git(path, &["rev-parse", "--git-dir"]).is_ok()
}
