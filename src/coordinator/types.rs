//! Lock request and result types.

use crate::lock::{DEPLOYMENT_REASON, Lock};
use crate::scope::Scope;

/// What a caller asks the coordinator for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRequest {
    /// Scope to lock or inspect.
    pub scope: Scope,

    /// Whether the lock must be released explicitly.
    pub sticky: bool,

    /// Only report the current lock; never create, modify, or delete anything.
    pub details_only: bool,

    /// Reason recorded in a newly written lock.
    pub reason: Option<String>,
}

impl LockRequest {
    /// A transient lock held for the lifetime of one deployment.
    pub fn deployment(scope: Scope) -> Self {
        Self {
            scope,
            sticky: false,
            details_only: false,
            reason: Some(DEPLOYMENT_REASON.to_string()),
        }
    }

    /// A sticky lock that persists until explicitly released.
    pub fn sticky(scope: Scope, reason: Option<String>) -> Self {
        Self {
            scope,
            sticky: true,
            details_only: false,
            reason,
        }
    }

    /// A details-only query for `scope`.
    pub fn details(scope: Scope) -> Self {
        Self {
            scope,
            sticky: false,
            details_only: true,
            reason: None,
        }
    }
}

/// Outcome of a lock acquisition or details query.
#[derive(Debug, Clone, PartialEq)]
pub enum LockResult {
    /// The requester already holds the lock.
    Owner(Lock),

    /// A new lock record was written for the requester.
    Claimed(Lock),

    /// The lock is held by someone else. `scope` is the scope whose lock
    /// caused the denial: [`Scope::Global`] when the global lock preempted
    /// the request.
    Denied { scope: Scope, lock: Lock },

    /// Another claimant created the scope's branch (or wrote its lock file)
    /// between our existence check and our write. `lock` is the winner's
    /// record when it could already be read.
    LostRace { scope: Scope, lock: Option<Lock> },

    /// Details-only query: the scope has no lock.
    NoLock,

    /// Details-only query: the scope's current lock.
    DetailsOnly(Lock),
}

impl LockResult {
    /// Whether the requester may proceed as the lock holder.
    pub fn is_acquired(&self) -> bool {
        matches!(self, LockResult::Owner(_) | LockResult::Claimed(_))
    }

    /// Whether the request was refused, including a lost creation race.
    pub fn is_denied(&self) -> bool {
        matches!(self, LockResult::Denied { .. } | LockResult::LostRace { .. })
    }

    /// The lock record this result carries, if any.
    pub fn lock(&self) -> Option<&Lock> {
        match self {
            LockResult::Owner(lock)
            | LockResult::Claimed(lock)
            | LockResult::DetailsOnly(lock)
            | LockResult::Denied { lock, .. } => Some(lock),
            LockResult::LostRace { lock, .. } => lock.as_ref(),
            LockResult::NoLock => None,
        }
    }
}

/// Result of trying to claim one scope's branch.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ClaimResult {
    /// We wrote the lock record.
    Created(Lock),
    /// A lock record was already present.
    AlreadyClaimed(Lock),
    /// The store rejected our create or write because someone else got there first.
    Conflict,
}
