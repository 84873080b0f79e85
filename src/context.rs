//! Run context and repository resolution for deploylock.
//!
//! Every lock operation receives an explicit [`RunContext`] describing who is
//! asking, from which branch, and on behalf of which pull request comment.
//! Nothing in the lock paths reads environment variables or state saved by an
//! earlier invocation; the CLI builds the context from its arguments.

use crate::error::{DeployLockError, Result};
use crate::git;
use std::env;
use std::path::{Path, PathBuf};

/// Identity and origin of one lock request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Requester identity recorded as `created_by` and compared for ownership.
    pub actor: String,

    /// Branch the requester is deploying from.
    pub source_branch: String,

    /// Pull request the request was made on, if any.
    pub pr_number: Option<u64>,

    /// Comment that triggered the request, if any.
    pub comment_id: Option<u64>,
}

impl RunContext {
    /// Create a context for `actor` deploying from `source_branch`.
    pub fn new(actor: impl Into<String>, source_branch: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            source_branch: source_branch.into(),
            pr_number: None,
            comment_id: None,
        }
    }

    /// Set the pull request number.
    pub fn with_pr(mut self, pr_number: u64) -> Self {
        self.pr_number = Some(pr_number);
        self
    }

    /// Set the triggering comment id.
    pub fn with_comment(mut self, comment_id: u64) -> Self {
        self.comment_id = Some(comment_id);
        self
    }
}

/// Default actor string when none is supplied: `user@HOST`.
pub fn default_actor() -> String {
    let user = env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// Resolve the repository holding the lock branches.
///
/// An explicit path is used as-is (it may be a bare repository). Otherwise
/// the repository containing the current working directory is used.
pub fn resolve_repo(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => {
            let cwd = env::current_dir().map_err(|e| {
                DeployLockError::UserError(format!(
                    "failed to get current working directory: {}",
                    e
                ))
            })?;
            git::get_repo_root(cwd)
        }
    }
}
