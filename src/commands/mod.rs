//! Command implementations for deploylock.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Every command builds its [`Config`], [`GitRefStore`], and
//! [`RunContext`] explicitly from the global options.

use crate::cli::{
    Cli, Command, GlobalArgs, LockArgs, ReconcileArgs, ScopeArgs, TakeoverArgs, UnlockArgs,
};
use crate::config::{Config, DEFAULT_CONFIG_FILE};
use crate::context::{RunContext, default_actor, resolve_repo};
use crate::coordinator::{LockCoordinator, LockRequest, LockResult};
use crate::error::{DeployLockError, Result};
use crate::git;
use crate::reconcile::{TaskMode, reconcile};
use crate::release::{release, release_if_transient};
use crate::scope::{Scope, resolve_branch_name, resolve_unlock_command};
use crate::store::GitRefStore;
use std::path::{Path, PathBuf};

/// Dispatch a command to its implementation.
pub fn dispatch(cli: Cli) -> Result<()> {
    let global = cli.global;
    match cli.command {
        Command::Lock(args) => cmd_lock(&global, args),
        Command::Deploy(args) => cmd_deploy(&global, args),
        Command::Info(args) => cmd_info(&global, args),
        Command::Unlock(args) => cmd_unlock(&global, args),
        Command::Finish(args) => cmd_finish(&global, args),
        Command::Takeover(args) => cmd_takeover(&global, args),
        Command::Reconcile(args) => cmd_reconcile(&global, args),
        Command::Resolve(args) => cmd_resolve(&global, args),
    }
}

/// Everything a store-backed command needs.
struct Session {
    config: Config,
    store: GitRefStore,
}

fn open_session(global: &GlobalArgs) -> Result<Session> {
    let repo = resolve_repo(global.repo.as_deref())?;
    let config = load_config(global, Some(&repo))?;
    let store = GitRefStore::open(&repo, &config)?;
    Ok(Session { config, store })
}

/// Load the explicit `--config` file, or the optional one at the repository root.
fn load_config(global: &GlobalArgs, repo: Option<&Path>) -> Result<Config> {
    match (&global.config, repo) {
        (Some(path), _) => Config::load(path),
        (None, Some(repo)) => Config::load_or_default(repo.join(DEFAULT_CONFIG_FILE)),
        (None, None) => Ok(Config::default()),
    }
}

fn actor(global: &GlobalArgs) -> String {
    global.actor.clone().unwrap_or_else(default_actor)
}

fn run_context(global: &GlobalArgs) -> Result<RunContext> {
    let source_branch = match &global.branch {
        Some(branch) => branch.clone(),
        None => {
            let cwd = std::env::current_dir().map_err(|e| {
                DeployLockError::UserError(format!(
                    "failed to get current working directory: {}",
                    e
                ))
            })?;
            git::current_branch(cwd)?
        }
    };

    let mut ctx = RunContext::new(actor(global), source_branch);
    if let Some(pr) = global.pr {
        ctx = ctx.with_pr(pr);
    }
    if let Some(comment_id) = global.comment_id {
        ctx = ctx.with_comment(comment_id);
    }
    Ok(ctx)
}

fn scope_of(args: &ScopeArgs) -> Result<Scope> {
    Scope::from_parts(args.environment.as_deref(), args.global, args.task.as_deref())
}

// ============================================================================
// Lock commands
// ============================================================================

fn cmd_lock(global: &GlobalArgs, args: LockArgs) -> Result<()> {
    let request = LockRequest::sticky(scope_of(&args.scope)?, args.reason);
    acquire_and_report(global, &request, false)
}

fn cmd_deploy(global: &GlobalArgs, args: ScopeArgs) -> Result<()> {
    let request = LockRequest::deployment(scope_of(&args)?);
    acquire_and_report(global, &request, false)
}

fn cmd_info(global: &GlobalArgs, args: ScopeArgs) -> Result<()> {
    let request = LockRequest::details(scope_of(&args)?);
    acquire_and_report(global, &request, false)
}

fn cmd_takeover(global: &GlobalArgs, args: TakeoverArgs) -> Result<()> {
    let scope = scope_of(&args.scope)?;
    let request = if args.sticky {
        LockRequest::sticky(scope, args.reason)
    } else {
        LockRequest::deployment(scope)
    };
    acquire_and_report(global, &request, true)
}

fn acquire_and_report(global: &GlobalArgs, request: &LockRequest, takeover: bool) -> Result<()> {
    let session = open_session(global)?;
    let ctx = run_context(global)?;
    let coordinator = LockCoordinator::new(&session.store, &session.config);

    let result = if takeover {
        coordinator.force_takeover(&ctx, request)?
    } else {
        coordinator.acquire(&ctx, request)?
    };

    println!("{}", render_lock_result(&session.config, request, &result)?);
    Ok(())
}

/// Text for a lock result; denials become [`DeployLockError::LockError`].
fn render_lock_result(
    config: &Config,
    request: &LockRequest,
    result: &LockResult,
) -> Result<String> {
    let scope = &request.scope;

    match result {
        LockResult::Claimed(lock) => {
            let kind = if lock.details().sticky { "sticky" } else { "deployment" };
            Ok(format!(
                "Claimed {} lock for {}\n  lock branch: {}\n  source branch: {}\n  release with: {}",
                kind,
                scope,
                scope.branch_name(config),
                lock.details().branch,
                lock.details().unlock_command
            ))
        }
        LockResult::Owner(lock) => Ok(format!(
            "You already hold the lock for {} (held for {})",
            scope,
            lock.age_string()
        )),
        LockResult::NoLock => Ok(format!("No lock is set for {}", scope)),
        LockResult::DetailsOnly(lock) => {
            let mut text = format!("Lock: {}", lock);
            if let Some(pr) = lock.linked_pr_number() {
                text.push_str(&format!("\n  pull request: #{}", pr));
            }
            text.push_str(&format!("\n  release with: {}", lock.details().unlock_command));
            Ok(text)
        }
        LockResult::Denied { scope: held, lock } => {
            let cause = if held.is_global() && !scope.is_global() {
                "the global lock is held".to_string()
            } else {
                format!("{} is locked", held)
            };
            Err(DeployLockError::LockError(format!(
                "cannot lock {}: {}\n  Lock: {}\n  Release with: {}",
                scope,
                cause,
                lock,
                lock.details().unlock_command
            )))
        }
        LockResult::LostRace { lock, .. } => {
            let holder = lock
                .as_ref()
                .map(|l| format!("\n  Lock: {}", l))
                .unwrap_or_default();
            Err(DeployLockError::LockError(format!(
                "another deployment claimed {} at the same time{}",
                scope, holder
            )))
        }
    }
}

// ============================================================================
// Release commands
// ============================================================================

fn cmd_unlock(global: &GlobalArgs, args: UnlockArgs) -> Result<()> {
    let scope = scope_of(&args.scope)?;
    let session = open_session(global)?;

    let outcome = release(&session.store, &session.config, &actor(global), &scope);
    println!("{}", outcome.render(&scope, args.silent));

    if outcome.is_success() {
        Ok(())
    } else {
        Err(DeployLockError::StoreError(format!(
            "failed to release lock for {}",
            scope
        )))
    }
}

fn cmd_finish(global: &GlobalArgs, args: ScopeArgs) -> Result<()> {
    let scope = scope_of(&args)?;
    let session = open_session(global)?;
    let ctx = run_context(global)?;

    let outcome = release_if_transient(&session.store, &session.config, &ctx, &scope);
    println!("{}", outcome.render(&scope));

    if outcome.is_success() {
        Ok(())
    } else {
        Err(DeployLockError::StoreError(format!(
            "failed to release lock for {}",
            scope
        )))
    }
}

fn cmd_reconcile(global: &GlobalArgs, args: ReconcileArgs) -> Result<()> {
    let pr_number = global.pr.ok_or_else(|| {
        DeployLockError::UserError("reconcile requires --pr <number>".to_string())
    })?;
    let task_mode: TaskMode = args.task_mode.as_deref().unwrap_or("").parse()?;
    let session = open_session(global)?;

    let report = reconcile(
        &session.store,
        &session.config,
        &actor(global),
        pr_number,
        &args.environments,
        &task_mode,
    )?;

    for failure in report.failures() {
        eprintln!("warning: could not release {}: {:?}", failure.branch, failure.outcome);
    }
    println!("released={}", report.released_output());
    Ok(())
}

// ============================================================================
// Resolution
// ============================================================================

fn cmd_resolve(global: &GlobalArgs, args: ScopeArgs) -> Result<()> {
    let repo: Option<PathBuf> = resolve_repo(global.repo.as_deref()).ok();
    let config = load_config(global, repo.as_deref())?;

    let branch = resolve_branch_name(
        &config,
        args.environment.as_deref(),
        args.global,
        args.task.as_deref(),
    )
    .ok_or_else(|| {
        DeployLockError::UserError(
            "an environment is required unless --global is given".to_string(),
        )
    })?;
    let unlock_command = resolve_unlock_command(
        &config,
        args.environment.as_deref(),
        args.global,
        args.task.as_deref(),
    );

    println!("branch={}", branch);
    println!("unlock_command={}", unlock_command);
    Ok(())
}
