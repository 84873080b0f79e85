//! Lock coordinator: acquisition, ownership arbitration, and details queries.
//!
//! Acquisition for a scope runs against the ref store in this order:
//!
//! 1. Read the global lock. If someone else holds it, deny (unless this is a
//!    details-only query for the global scope itself).
//! 2. Compute the scope's branch name.
//! 3. Details-only requests read the scope's lock and return; nothing is
//!    created, written, or deleted.
//! 4. Claim the branch: create it from the default branch when missing, write
//!    the lock file when the branch exists without one, otherwise report the
//!    lock already present.
//! 5. An existing lock is either the requester's own (`Owner`) or someone
//!    else's (`Denied`).
//!
//! The store's rejection of a duplicate branch is the only mutual exclusion
//! between concurrent claimants. A claimant whose create (or lock write) is
//! rejected gets [`LockResult::LostRace`] and must not report success.

mod types;


pub use types::{LockRequest, LockResult};

use types::ClaimResult;

use crate::config::Config;
use crate::context::RunContext;
use crate::error::{DeployLockError, Result};
use crate::events::{self, Event, EventAction};
use crate::lock::{Lock, LockDetails, is_owner};
use crate::scope::Scope;
use crate::store::{RefStore, StoreError, read_optional};
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

/// Arbitrates lock requests against one ref store.
pub struct LockCoordinator<'a, S: RefStore + ?Sized> {
    store: &'a S,
    config: &'a Config,
}

impl<'a, S: RefStore + ?Sized> LockCoordinator<'a, S> {
    pub fn new(store: &'a S, config: &'a Config) -> Self {
        Self { store, config }
    }

    /// Acquire (or inspect) the lock for `request.scope` on behalf of `ctx`.
    ///
    /// # Returns
    ///
    /// * `Ok(LockResult)` - the arbitration outcome, including denials
    /// * `Err(DeployLockError::AccessDenied)` - the store refused an operation
    /// * `Err(DeployLockError::StoreError)` - the store failed unexpectedly
    /// * `Err(DeployLockError::UserError)` - the default branch is missing
    pub fn acquire(&self, ctx: &RunContext, request: &LockRequest) -> Result<LockResult> {
        let global_lock = self.read_lock(&self.config.global_lock_branch)?;

        if let Some(denied) = self.check_global(ctx, request, global_lock.as_ref()) {
            return Ok(denied);
        }

        let branch = request.scope.branch_name(self.config);

        if request.details_only {
            let lock = if request.scope.is_global() {
                global_lock
            } else {
                self.read_lock(&branch)?
            };
            return Ok(match lock {
                Some(lock) => LockResult::DetailsOnly(lock),
                None => LockResult::NoLock,
            });
        }

        let claim = self.claim(ctx, request, &branch)?;
        Ok(self.settle(ctx, request, &branch, claim))
    }

    /// Delete the scope's lock and claim it afresh for `ctx`.
    ///
    /// The delete and the recreate are separate store operations. A
    /// claimant that slips in between wins, and this call reports
    /// [`LockResult::LostRace`]. A global lock held by someone else still
    /// denies the takeover of an environment scope.
    pub fn force_takeover(&self, ctx: &RunContext, request: &LockRequest) -> Result<LockResult> {
        if request.details_only {
            return Err(DeployLockError::UserError(
                "a details-only request cannot take over a lock".to_string(),
            ));
        }

        if !request.scope.is_global() {
            let global_lock = self.read_lock(&self.config.global_lock_branch)?;
            if let Some(denied) = self.check_global(ctx, request, global_lock.as_ref()) {
                return Ok(denied);
            }
        }

        let branch = request.scope.branch_name(self.config);
        let previous = self.read_lock(&branch)?;

        match self.store.delete_ref(&branch) {
            Ok(()) | Err(StoreError::NotFound(_)) => {}
            Err(e) => {
                return Err(DeployLockError::from_store(
                    format!("deleting lock branch '{}'", branch),
                    e,
                ));
            }
        }

        info!(
            scope = %request.scope.label(),
            previous_owner = previous.as_ref().map(|l| l.created_by()).unwrap_or(""),
            "lock taken over"
        );
        events::record(
            self.config,
            Event::new(EventAction::Takeover, &ctx.actor)
                .with_scope(request.scope.label())
                .with_details(json!({
                    "branch": branch,
                    "previous_owner": previous.as_ref().map(|l| l.created_by()),
                })),
        );

        let claim = self.claim(ctx, request, &branch)?;
        Ok(self.settle(ctx, request, &branch, claim))
    }

    /// Read and parse the lock file on `branch`.
    ///
    /// A missing branch and a branch without a lock file both read as `None`.
    pub fn read_lock(&self, branch: &str) -> Result<Option<Lock>> {
        let content = read_optional(self.store, branch, &self.config.lock_file).map_err(|e| {
            DeployLockError::from_store(format!("reading lock from '{}'", branch), e)
        })?;

        content.map(|c| Lock::from_json(&c)).transpose()
    }

    /// Deny when the global lock is held by someone other than the requester.
    fn check_global(
        &self,
        ctx: &RunContext,
        request: &LockRequest,
        global_lock: Option<&Lock>,
    ) -> Option<LockResult> {
        let lock = global_lock?;

        // Inspecting the global lock is always allowed
        if request.details_only && request.scope.is_global() {
            return None;
        }
        if is_owner(lock, &ctx.actor, &ctx.source_branch) {
            return None;
        }

        info!(
            scope = %request.scope.label(),
            holder = %lock.created_by(),
            "denied by global lock"
        );
        self.record_denied(ctx, &Scope::Global, lock);

        Some(LockResult::Denied {
            scope: Scope::Global,
            lock: lock.clone(),
        })
    }

    /// Make sure a lock record exists on `branch`, writing ours if there is none.
    fn claim(&self, ctx: &RunContext, request: &LockRequest, branch: &str) -> Result<ClaimResult> {
        let exists = self.store.ref_exists(branch).map_err(|e| {
            DeployLockError::from_store(format!("checking lock branch '{}'", branch), e)
        })?;

        if !exists {
            match self.store.create_ref(branch, &self.config.default_branch) {
                Ok(()) => debug!(branch, "created lock branch"),
                Err(StoreError::Conflict(message)) => {
                    debug!(branch, %message, "lock branch created concurrently");
                    return Ok(ClaimResult::Conflict);
                }
                Err(StoreError::NotFound(message)) => {
                    return Err(DeployLockError::UserError(format!(
                        "cannot create lock branch '{}' from '{}': {}",
                        branch, self.config.default_branch, message
                    )));
                }
                Err(e) => {
                    return Err(DeployLockError::from_store(
                        format!("creating lock branch '{}'", branch),
                        e,
                    ));
                }
            }

            return self.write_lock(branch, self.new_lock(ctx, request));
        }

        match self.read_lock(branch)? {
            Some(lock) => Ok(ClaimResult::AlreadyClaimed(lock)),
            None => self.write_lock(branch, self.new_lock(ctx, request)),
        }
    }

    /// Turn a claim into the caller-facing result, logging and auditing it.
    fn settle(
        &self,
        ctx: &RunContext,
        request: &LockRequest,
        branch: &str,
        claim: ClaimResult,
    ) -> LockResult {
        let scope = &request.scope;

        match claim {
            ClaimResult::Created(lock) => {
                info!(scope = %scope.label(), branch, sticky = request.sticky, "lock claimed");
                events::record(
                    self.config,
                    Event::new(EventAction::Claimed, &ctx.actor)
                        .with_scope(scope.label())
                        .with_details(json!({
                            "branch": branch,
                            "source_branch": ctx.source_branch,
                            "sticky": request.sticky,
                            "pr_number": ctx.pr_number,
                        })),
                );
                LockResult::Claimed(lock)
            }
            ClaimResult::AlreadyClaimed(lock) => {
                if is_owner(&lock, &ctx.actor, &ctx.source_branch) {
                    if request.sticky {
                        info!(scope = %scope.label(), age = %lock.age_string(), "lock already held");
                    }
                    LockResult::Owner(lock)
                } else {
                    info!(scope = %scope.label(), holder = %lock.created_by(), "lock denied");
                    self.record_denied(ctx, scope, &lock);
                    LockResult::Denied {
                        scope: scope.clone(),
                        lock,
                    }
                }
            }
            ClaimResult::Conflict => {
                // Best effort: the winner may not have written its record yet
                let lock = self.read_lock(branch).unwrap_or_else(|e| {
                    warn!(branch, error = %e, "failed to read lock after losing race");
                    None
                });
                info!(scope = %scope.label(), branch, "lost race for lock");
                events::record(
                    self.config,
                    Event::new(EventAction::LostRace, &ctx.actor)
                        .with_scope(scope.label())
                        .with_details(json!({
                            "branch": branch,
                            "holder": lock.as_ref().map(|l| l.created_by()),
                        })),
                );
                LockResult::LostRace {
                    scope: scope.clone(),
                    lock,
                }
            }
        }
    }

    fn record_denied(&self, ctx: &RunContext, scope: &Scope, lock: &Lock) {
        events::record(
            self.config,
            Event::new(EventAction::Denied, &ctx.actor)
                .with_scope(scope.label())
                .with_details(json!({
                    "holder": lock.created_by(),
                    "holder_branch": lock.details().branch,
                })),
        );
    }

    fn new_lock(&self, ctx: &RunContext, request: &LockRequest) -> Lock {
        let scope = &request.scope;
        let details = LockDetails {
            reason: request.reason.clone(),
            branch: ctx.source_branch.clone(),
            created_at: Utc::now(),
            created_by: ctx.actor.clone(),
            sticky: request.sticky,
            environment: scope.environment_name().map(str::to_string),
            global: scope.is_global(),
            unlock_command: scope.unlock_command(self.config),
            link: self.config.lock_link(ctx.pr_number, ctx.comment_id),
        };

        Lock::new(details, scope.task().map(str::to_string), ctx.pr_number)
    }

    /// Write `lock` to `branch`, retrying transient failures.
    ///
    /// Only this write is retried. A conflict means the branch moved under us
    /// (another claimant wrote first) and is reported as such. A forbidden
    /// or not-found write is never retried.
    fn write_lock(&self, branch: &str, lock: Lock) -> Result<ClaimResult> {
        let content = lock.to_json()?;
        let attempts = self.config.lock_write_attempts.max(1);

        let mut attempt = 1;
        loop {
            match self.store.put_file(
                branch,
                &self.config.lock_file,
                &content,
                &self.config.lock_commit_message,
            ) {
                Ok(()) => return Ok(ClaimResult::Created(lock)),
                Err(StoreError::Conflict(message)) => {
                    debug!(branch, %message, "lock file written concurrently");
                    return Ok(ClaimResult::Conflict);
                }
                Err(e @ (StoreError::Forbidden(_) | StoreError::NotFound(_))) => {
                    return Err(DeployLockError::from_store(
                        format!("writing lock file to '{}'", branch),
                        e,
                    ));
                }
                Err(e) if attempt >= attempts => {
                    return Err(DeployLockError::from_store(
                        format!(
                            "writing lock file to '{}' failed after {} attempts",
                            branch, attempts
                        ),
                        e,
                    ));
                }
                Err(e) => {
                    warn!(branch, attempt, error = %e, "lock write failed, retrying");
                    std::thread::sleep(self.config.lock_write_retry_delay());
                    attempt += 1;
                }
            }
        }
    }
}
