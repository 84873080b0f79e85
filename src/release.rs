//! Lock release: delete a scope's branch and classify the result.
//!
//! Release is idempotent. A branch that is already gone counts as a
//! successful release ([`ReleaseOutcome::AlreadyUnlocked`]).
//!
//! [`release_if_transient`] is the end-of-deployment variant: it only
//! removes a deployment lock held by the caller and keeps sticky locks.

use crate::config::Config;
use crate::context::RunContext;
use crate::events::{self, Event, EventAction};
use crate::lock::{Lock, is_owner};
use crate::scope::Scope;
use crate::store::{RefStore, StoreError, read_optional};
use serde_json::json;
use tracing::{debug, info, warn};

/// Sentinel for a successful silent release.
pub const SENTINEL_RELEASED: &str = "removed lock - silent";
/// Sentinel for a silent release of a scope with no lock.
pub const SENTINEL_ALREADY_UNLOCKED: &str = "no deployment lock currently set - silent";
/// Sentinel for a failed silent release.
pub const SENTINEL_FAILED: &str = "failed to delete lock (bad status code) - silent";

/// Result of deleting one scope's lock branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The branch was deleted.
    Released,
    /// There was no branch to delete.
    AlreadyUnlocked,
    /// The store failed to delete the branch.
    Failed { status: i32, message: String },
}

impl ReleaseOutcome {
    /// Whether the scope is unlocked after the release attempt.
    pub fn is_success(&self) -> bool {
        !matches!(self, ReleaseOutcome::Failed { .. })
    }

    /// The fixed string reported for a silent release.
    pub fn sentinel(&self) -> &'static str {
        match self {
            ReleaseOutcome::Released => SENTINEL_RELEASED,
            ReleaseOutcome::AlreadyUnlocked => SENTINEL_ALREADY_UNLOCKED,
            ReleaseOutcome::Failed { .. } => SENTINEL_FAILED,
        }
    }

    /// Text reported to the caller: the sentinel when `silent`, otherwise a
    /// short human-readable line.
    pub fn render(&self, scope: &Scope, silent: bool) -> String {
        if silent {
            return self.sentinel().to_string();
        }

        match self {
            ReleaseOutcome::Released => format!("released lock for {}", scope),
            ReleaseOutcome::AlreadyUnlocked => format!("no lock is set for {}", scope),
            ReleaseOutcome::Failed { status, message } => format!(
                "failed to release lock for {} (status {}): {}",
                scope, status, message
            ),
        }
    }
}

/// Release the lock on `scope` on behalf of `actor`.
///
/// No ownership check is made; callers decide who may unlock.
pub fn release<S: RefStore + ?Sized>(
    store: &S,
    config: &Config,
    actor: &str,
    scope: &Scope,
) -> ReleaseOutcome {
    let branch = scope.branch_name(config);
    let outcome = delete_lock_branch(store, &branch);

    if outcome == ReleaseOutcome::Released {
        events::record(
            config,
            Event::new(EventAction::Released, actor)
                .with_scope(scope.label())
                .with_details(json!({ "branch": branch })),
        );
    }

    outcome
}

/// Result of releasing a scope at the end of a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishOutcome {
    /// The caller's deployment lock was deleted.
    Released,
    /// There was no lock to delete.
    AlreadyUnlocked,
    /// The lock is sticky and outlives the deployment.
    KeptSticky { holder: String },
    /// The lock belongs to another actor or source branch.
    NotOwner { holder: String },
    /// Reading or deleting the lock failed.
    Failed { status: i32, message: String },
}

impl FinishOutcome {
    /// Whether the deployment may end cleanly. Only store failures count
    /// against it; a kept lock is expected.
    pub fn is_success(&self) -> bool {
        !matches!(self, FinishOutcome::Failed { .. })
    }

    pub fn render(&self, scope: &Scope) -> String {
        match self {
            FinishOutcome::Released => format!("released deployment lock for {}", scope),
            FinishOutcome::AlreadyUnlocked => format!("no lock is set for {}", scope),
            FinishOutcome::KeptSticky { holder } => {
                format!("lock for {} is sticky, kept (held by {})", scope, holder)
            }
            FinishOutcome::NotOwner { holder } => {
                format!("lock for {} is held by {}, kept", scope, holder)
            }
            FinishOutcome::Failed { status, message } => format!(
                "failed to release lock for {} (status {}): {}",
                scope, status, message
            ),
        }
    }
}

/// Release `scope` at the end of the deployment described by `ctx`.
///
/// The lock is deleted only when it is a deployment (non-sticky) lock and
/// `ctx` owns it under [`is_owner`]. Anything else is left in place.
pub fn release_if_transient<S: RefStore + ?Sized>(
    store: &S,
    config: &Config,
    ctx: &RunContext,
    scope: &Scope,
) -> FinishOutcome {
    let branch = scope.branch_name(config);

    let content = match read_optional(store, &branch, &config.lock_file) {
        Ok(Some(content)) => content,
        Ok(None) => return FinishOutcome::AlreadyUnlocked,
        Err(e) => {
            warn!(branch = %branch, error = %e, "failed to read lock");
            return FinishOutcome::Failed {
                status: e.status(),
                message: e.to_string(),
            };
        }
    };
    let lock = match Lock::from_json(&content) {
        Ok(lock) => lock,
        Err(e) => {
            warn!(branch = %branch, error = %e, "unreadable lock kept");
            return FinishOutcome::Failed {
                status: -1,
                message: e.to_string(),
            };
        }
    };

    let holder = lock.created_by().to_string();
    if lock.details().sticky {
        debug!(branch = %branch, holder = %holder, "sticky lock kept");
        return FinishOutcome::KeptSticky { holder };
    }
    if !is_owner(&lock, &ctx.actor, &ctx.source_branch) {
        debug!(branch = %branch, holder = %holder, "foreign lock kept");
        return FinishOutcome::NotOwner { holder };
    }

    match delete_lock_branch(store, &branch) {
        ReleaseOutcome::Released => {
            events::record(
                config,
                Event::new(EventAction::Released, &ctx.actor)
                    .with_scope(scope.label())
                    .with_details(json!({ "branch": branch, "deployment_finished": true })),
            );
            FinishOutcome::Released
        }
        ReleaseOutcome::AlreadyUnlocked => FinishOutcome::AlreadyUnlocked,
        ReleaseOutcome::Failed { status, message } => FinishOutcome::Failed { status, message },
    }
}

/// Delete `branch`, mapping store errors into a [`ReleaseOutcome`].
pub(crate) fn delete_lock_branch<S: RefStore + ?Sized>(store: &S, branch: &str) -> ReleaseOutcome {
    match store.delete_ref(branch) {
        Ok(()) => {
            info!(branch, "lock released");
            ReleaseOutcome::Released
        }
        Err(StoreError::NotFound(_)) => {
            debug!(branch, "no lock to release");
            ReleaseOutcome::AlreadyUnlocked
        }
        Err(e) => {
            warn!(branch, error = %e, "failed to release lock");
            ReleaseOutcome::Failed {
                status: e.status(),
                message: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::{DEPLOYMENT_REASON, LockDetails};
    use crate::store::{MemoryRefStore, StoreOp};
    use chrono::Utc;
    use tempfile::TempDir;

    const PRODUCTION_BRANCH: &str = "production-branch-deploy-lock";

    fn production() -> Scope {
        Scope::environment("production", None)
    }

    /// Store with a production lock written by alice from `feature`.
    fn store_with_lock(sticky: bool) -> MemoryRefStore {
        let store = MemoryRefStore::new().with_ref("main");
        store.create_ref(PRODUCTION_BRANCH, "main").unwrap();
        let lock = Lock::new(
            LockDetails {
                reason: (!sticky).then(|| DEPLOYMENT_REASON.to_string()),
                branch: "feature".to_string(),
                created_at: Utc::now(),
                created_by: "alice".to_string(),
                sticky,
                environment: Some("production".to_string()),
                global: false,
                unlock_command: ".unlock production".to_string(),
                link: String::new(),
            },
            None,
            None,
        );
        store
            .put_file(PRODUCTION_BRANCH, "lock.json", &lock.to_json().unwrap(), "lock")
            .unwrap();
        store
    }

    fn has_lock_branch(store: &MemoryRefStore) -> bool {
        store.ref_names().contains(&PRODUCTION_BRANCH.to_string())
    }

    #[test]
    fn test_release_is_idempotent() {
        let store = MemoryRefStore::new().with_ref("main");
        let config = Config::default();
        store
            .create_ref("production-branch-deploy-lock", "main")
            .unwrap();

        let first = release(&store, &config, "alice", &production());
        let second = release(&store, &config, "alice", &production());

        assert_eq!(first, ReleaseOutcome::Released);
        assert_eq!(second, ReleaseOutcome::AlreadyUnlocked);
        assert!(first.is_success());
        assert!(second.is_success());
        assert_eq!(store.ref_names(), vec!["main".to_string()]);
    }

    #[test]
    fn test_release_failure_keeps_status() {
        let store = MemoryRefStore::new().with_ref("main");
        store.fail_with(StoreOp::DeleteRef, 422);

        let outcome = release(&store, &Config::default(), "alice", &production());

        let ReleaseOutcome::Failed { status, .. } = &outcome else {
            panic!("expected Failed, got {:?}", outcome);
        };
        assert_eq!(*status, 422);
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_forbidden_release_is_failure() {
        let store = MemoryRefStore::new().with_ref("main");
        store.forbid(StoreOp::DeleteRef);

        let outcome = release(&store, &Config::default(), "alice", &Scope::Global);

        assert!(matches!(outcome, ReleaseOutcome::Failed { status: 403, .. }));
    }

    #[test]
    fn test_release_targets_task_branch() {
        let store = MemoryRefStore::new().with_ref("main");
        let config = Config::default();
        for name in [
            "production-branch-deploy-lock",
            "production-api-branch-deploy-lock",
        ] {
            store.create_ref(name, "main").unwrap();
        }

        let scope = Scope::environment("production", Some("api"));
        assert_eq!(release(&store, &config, "alice", &scope), ReleaseOutcome::Released);

        // The untasked environment lock is untouched
        assert!(
            store
                .ref_names()
                .contains(&"production-branch-deploy-lock".to_string())
        );
    }

    #[test]
    fn test_sentinels_are_verbatim() {
        assert_eq!(ReleaseOutcome::Released.sentinel(), "removed lock - silent");
        assert_eq!(
            ReleaseOutcome::AlreadyUnlocked.sentinel(),
            "no deployment lock currently set - silent"
        );
        let failed = ReleaseOutcome::Failed {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(
            failed.sentinel(),
            "failed to delete lock (bad status code) - silent"
        );
    }

    #[test]
    fn test_render_silent_and_verbose() {
        let scope = production();

        assert_eq!(
            ReleaseOutcome::Released.render(&scope, true),
            SENTINEL_RELEASED
        );
        assert_eq!(
            ReleaseOutcome::Released.render(&scope, false),
            "released lock for environment 'production'"
        );
        assert!(
            ReleaseOutcome::AlreadyUnlocked
                .render(&Scope::Global, false)
                .contains("global")
        );
    }

    #[test]
    fn test_finish_releases_own_deployment_lock() {
        let store = store_with_lock(false);
        let ctx = RunContext::new("alice", "feature");

        let outcome = release_if_transient(&store, &Config::default(), &ctx, &production());

        assert_eq!(outcome, FinishOutcome::Released);
        assert!(!has_lock_branch(&store));

        // A second finish finds nothing to do
        let again = release_if_transient(&store, &Config::default(), &ctx, &production());
        assert_eq!(again, FinishOutcome::AlreadyUnlocked);
        assert!(again.is_success());
    }

    #[test]
    fn test_finish_keeps_sticky_lock() {
        let store = store_with_lock(true);
        let ctx = RunContext::new("alice", "feature");

        let outcome = release_if_transient(&store, &Config::default(), &ctx, &production());

        assert_eq!(
            outcome,
            FinishOutcome::KeptSticky {
                holder: "alice".to_string()
            }
        );
        assert!(outcome.is_success());
        assert!(outcome.render(&production()).contains("sticky, kept"));
        assert!(has_lock_branch(&store));
        assert!(!store.calls().iter().any(|(op, _)| *op == StoreOp::DeleteRef));
    }

    #[test]
    fn test_finish_keeps_foreign_lock() {
        let store = store_with_lock(false);

        for ctx in [
            RunContext::new("bob", "feature"),
            RunContext::new("alice", "other-feature"),
        ] {
            let outcome = release_if_transient(&store, &Config::default(), &ctx, &production());
            assert_eq!(
                outcome,
                FinishOutcome::NotOwner {
                    holder: "alice".to_string()
                }
            );
        }
        assert!(has_lock_branch(&store));
    }

    #[test]
    fn test_finish_read_failure_keeps_lock() {
        let store = store_with_lock(false);
        store.forbid(StoreOp::GetFile);
        let ctx = RunContext::new("alice", "feature");

        let outcome = release_if_transient(&store, &Config::default(), &ctx, &production());

        assert!(matches!(outcome, FinishOutcome::Failed { status: 403, .. }));
        assert!(!outcome.is_success());
        assert!(has_lock_branch(&store));
    }

    #[test]
    fn test_release_is_audited() {
        let temp_dir = TempDir::new().unwrap();
        let events_file = temp_dir.path().join("events.ndjson");
        let config = Config {
            events_file: Some(events_file.clone()),
            ..Config::default()
        };
        let store = MemoryRefStore::new().with_ref("main");
        store
            .create_ref("production-branch-deploy-lock", "main")
            .unwrap();

        release(&store, &config, "alice", &production());
        release(&store, &config, "alice", &production());

        // Only the real deletion is logged
        let log = std::fs::read_to_string(&events_file).unwrap();
        assert_eq!(log.lines().count(), 1);
        assert!(log.contains("\"released\""));
    }
}
