//! Pull request lifecycle reconciliation.
//!
//! When a pull request closes, every lock it still holds is released. Each
//! candidate scope ends in exactly one [`ScopeOutcome`]; one scope's failure
//! never stops the others. Only failures of the store reads that decide
//! *which* scopes to look at (the existence check and the ref listing)
//! abort the run.

use crate::config::Config;
use crate::error::{DeployLockError, Result};
use crate::events::{self, Event, EventAction};
use crate::lock::Lock;
use crate::release::{ReleaseOutcome, delete_lock_branch};
use crate::scope::{resolve_branch_name, sanitize};
use crate::store::{RefStore, StoreError};
use regex::Regex;
use serde_json::json;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Which task scopes of each environment are candidates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TaskMode {
    /// Only the environment's untasked scope.
    #[default]
    Untasked,
    /// Only the scope of one named task.
    Named(String),
    /// Every scope of the environment, tasked or not, discovered by listing refs.
    All,
}

impl FromStr for TaskMode {
    type Err = DeployLockError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" => Ok(TaskMode::Untasked),
            "all" => Ok(TaskMode::All),
            task if task.chars().any(char::is_whitespace) => Err(DeployLockError::UserError(
                format!("invalid task '{}': task names must not contain whitespace", task),
            )),
            task => Ok(TaskMode::Named(task.to_string())),
        }
    }
}

impl fmt::Display for TaskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskMode::Untasked => write!(f, "untasked"),
            TaskMode::Named(task) => write!(f, "task '{}'", task),
            TaskMode::All => write!(f, "all"),
        }
    }
}

/// Terminal state of one candidate scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeOutcome {
    /// The scope's branch does not exist.
    NoBranch,
    /// The branch exists but holds no lock file.
    NoLockFile,
    /// The lock belongs to another pull request (or to none).
    ForeignPr { pr_number: Option<u64> },
    /// The lock was released.
    Released,
    /// The lock could not be read or released.
    ReleaseFailed { status: i32, message: String },
}

/// Outcome for one candidate branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeReport {
    /// Candidate lock branch.
    pub branch: String,
    /// Scope label: `environment` or `environment-task`.
    pub label: String,
    pub outcome: ScopeOutcome,
}

/// Result of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Every candidate examined, in processing order.
    pub scopes: Vec<ScopeReport>,
}

impl ReconcileReport {
    /// Labels of the released scopes, in processing order.
    pub fn released(&self) -> Vec<&str> {
        self.scopes
            .iter()
            .filter(|s| s.outcome == ScopeOutcome::Released)
            .map(|s| s.label.as_str())
            .collect()
    }

    /// Candidates whose lock could not be read or released.
    pub fn failures(&self) -> Vec<&ScopeReport> {
        self.scopes
            .iter()
            .filter(|s| matches!(s.outcome, ScopeOutcome::ReleaseFailed { .. }))
            .collect()
    }

    /// Comma-joined released labels (the reconciliation output value).
    pub fn released_output(&self) -> String {
        self.released().join(",")
    }
}

/// Release every lock held by `pr_number` across `environments`.
///
/// # Returns
///
/// * `Ok(ReconcileReport)` - one entry per candidate branch
/// * `Err(DeployLockError::StoreError)` / `Err(DeployLockError::AccessDenied)` -
///   a branch existence check or the ref listing failed
pub fn reconcile<S: RefStore + ?Sized>(
    store: &S,
    config: &Config,
    actor: &str,
    pr_number: u64,
    environments: &[String],
    task_mode: &TaskMode,
) -> Result<ReconcileReport> {
    let mut report = ReconcileReport::default();
    let mut seen = BTreeSet::new();

    for environment in environments {
        let environment = environment.trim();
        if environment.is_empty() {
            continue;
        }

        for branch in candidate_branches(store, config, environment, task_mode)? {
            if !seen.insert(branch.clone()) {
                continue;
            }

            let outcome = reconcile_branch(store, config, pr_number, &branch)?;
            let label = label_for(config, &branch);
            debug!(branch = %branch, outcome = ?outcome, "reconciled candidate");

            if outcome == ScopeOutcome::Released {
                events::record(
                    config,
                    Event::new(EventAction::Reconciled, actor)
                        .with_scope(label.clone())
                        .with_details(json!({ "branch": branch, "pr_number": pr_number })),
                );
            }

            report.scopes.push(ScopeReport {
                branch,
                label,
                outcome,
            });
        }
    }

    info!(
        pr_number,
        released = %report.released_output(),
        failed = report.failures().len(),
        "reconciliation finished"
    );
    Ok(report)
}

/// Candidate lock branches for one environment.
fn candidate_branches<S: RefStore + ?Sized>(
    store: &S,
    config: &Config,
    environment: &str,
    task_mode: &TaskMode,
) -> Result<Vec<String>> {
    let task = match task_mode {
        TaskMode::All => return discover_branches(store, config, environment),
        TaskMode::Untasked => None,
        TaskMode::Named(task) => Some(task.as_str()),
    };

    Ok(resolve_branch_name(config, Some(environment), false, task)
        .into_iter()
        .collect())
}

/// List every existing `{env}-*{suffix}` branch, sorted.
fn discover_branches<S: RefStore + ?Sized>(
    store: &S,
    config: &Config,
    environment: &str,
) -> Result<Vec<String>> {
    let pattern = task_branch_pattern(config, environment)?;
    let refs = store
        .list_refs()
        .map_err(|e| DeployLockError::from_store("listing lock branches", e))?;

    let mut branches: Vec<String> = refs
        .into_iter()
        .filter(|name| pattern.is_match(name))
        .collect();
    branches.sort();
    Ok(branches)
}

/// Anchored pattern for `{env}-*{suffix}`, where `*` may be empty.
fn task_branch_pattern(config: &Config, environment: &str) -> Result<Regex> {
    let environment = sanitize(Some(environment)).unwrap_or_default();
    let pattern = format!(
        "^{}-.*{}$",
        regex::escape(&environment),
        regex::escape(&config.lock_suffix)
    );
    Regex::new(&pattern).map_err(|e| {
        DeployLockError::UserError(format!(
            "invalid environment '{}' for task discovery: {}",
            environment, e
        ))
    })
}

/// Decide and apply the outcome for one candidate branch.
///
/// Only the existence check may fail the run.
fn reconcile_branch<S: RefStore + ?Sized>(
    store: &S,
    config: &Config,
    pr_number: u64,
    branch: &str,
) -> Result<ScopeOutcome> {
    let exists = store.ref_exists(branch).map_err(|e| {
        DeployLockError::from_store(format!("checking lock branch '{}'", branch), e)
    })?;
    if !exists {
        return Ok(ScopeOutcome::NoBranch);
    }

    let content = match store.get_file(branch, &config.lock_file) {
        Ok(content) => content,
        Err(StoreError::NotFound(_)) => return Ok(ScopeOutcome::NoLockFile),
        Err(e) => {
            warn!(branch, error = %e, "failed to read lock during reconciliation");
            return Ok(ScopeOutcome::ReleaseFailed {
                status: e.status(),
                message: e.to_string(),
            });
        }
    };

    let lock = match Lock::from_json(&content) {
        Ok(lock) => lock,
        Err(e) => {
            warn!(branch, error = %e, "unreadable lock during reconciliation");
            return Ok(ScopeOutcome::ReleaseFailed {
                status: -1,
                message: e.to_string(),
            });
        }
    };

    let owner_pr = lock.linked_pr_number();
    if owner_pr != Some(pr_number) {
        return Ok(ScopeOutcome::ForeignPr {
            pr_number: owner_pr,
        });
    }

    Ok(match delete_lock_branch(store, branch) {
        // Deleted concurrently between our read and our delete
        ReleaseOutcome::Released | ReleaseOutcome::AlreadyUnlocked => ScopeOutcome::Released,
        ReleaseOutcome::Failed { status, message } => {
            ScopeOutcome::ReleaseFailed { status, message }
        }
    })
}

/// Scope label for a lock branch: the branch name without `-{suffix}`.
fn label_for(config: &Config, branch: &str) -> String {
    if branch == config.global_lock_branch {
        return "global".to_string();
    }

    branch
        .strip_suffix(config.lock_suffix.as_str())
        .and_then(|rest| rest.strip_suffix('-'))
        .unwrap_or(branch)
        .to_string()
}
