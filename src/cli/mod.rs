//! CLI argument parsing for deploylock.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Deploylock: branch-backed environment locks for comment-driven deployments.
///
/// Each lock lives on its own branch of a shared git repository:
/// - one branch for the global lock
/// - one branch per environment, or per environment and task
/// - a single JSON lock file on each branch
#[derive(Parser, Debug)]
#[command(name = "deploylock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Repository holding the lock branches (defaults to the current repository).
    #[arg(long, global = true)]
    pub repo: Option<PathBuf>,

    /// Config file (defaults to `.deploylock.yaml` at the repository root).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Requester identity (defaults to `user@host`).
    #[arg(long, global = true)]
    pub actor: Option<String>,

    /// Source branch being deployed (defaults to the current branch).
    #[arg(long, global = true)]
    pub branch: Option<String>,

    /// Pull request the request comes from.
    #[arg(long, global = true)]
    pub pr: Option<u64>,

    /// Comment that triggered the request.
    #[arg(long, global = true)]
    pub comment_id: Option<u64>,
}

/// Available commands for deploylock.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Take a sticky lock.
    ///
    /// The lock persists until released with `unlock`.
    Lock(LockArgs),

    /// Take the transient lock held for the duration of one deployment.
    Deploy(ScopeArgs),

    /// Show the current lock on a scope without changing anything.
    Info(ScopeArgs),

    /// Release a lock.
    ///
    /// Releasing a scope that has no lock succeeds.
    Unlock(UnlockArgs),

    /// Release the deployment lock at the end of a deployment.
    ///
    /// Only a deployment lock held by the caller is removed; sticky locks
    /// and locks held by others are kept.
    Finish(ScopeArgs),

    /// Delete a lock and take it over.
    ///
    /// Not atomic: a concurrent claimant may win between the delete and the
    /// new claim.
    Takeover(TakeoverArgs),

    /// Release every lock held by a closed pull request.
    ///
    /// Prints `released=<comma-separated scopes>`.
    Reconcile(ReconcileArgs),

    /// Print the lock branch and unlock command for a scope.
    Resolve(ScopeArgs),
}

/// Scope selection shared by the lock commands.
#[derive(Args, Debug, Clone, Default)]
pub struct ScopeArgs {
    /// Environment to lock (omit with --global).
    pub environment: Option<String>,

    /// Use the global lock.
    #[arg(long, conflicts_with = "environment")]
    pub global: bool,

    /// Narrow the environment lock to one task.
    #[arg(long, conflicts_with = "global")]
    pub task: Option<String>,
}

#[derive(Args, Debug)]
pub struct LockArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Reason recorded with the lock.
    #[arg(short, long)]
    pub reason: Option<String>,
}

#[derive(Args, Debug)]
pub struct UnlockArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Print the machine-readable release sentinel instead of a message.
    #[arg(long)]
    pub silent: bool,
}

#[derive(Args, Debug)]
pub struct TakeoverArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Take a sticky lock instead of a deployment lock.
    #[arg(long)]
    pub sticky: bool,

    /// Reason recorded with a sticky lock.
    #[arg(short, long, requires = "sticky")]
    pub reason: Option<String>,
}

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Environments to reconcile.
    #[arg(long, value_delimiter = ',', required = true)]
    pub environments: Vec<String>,

    /// `all` to include every task lock, a task name for one task, or
    /// omitted for the untasked locks only.
    #[arg(long)]
    pub task_mode: Option<String>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
