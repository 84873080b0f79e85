//! Ownership arbitration for existing locks.

use super::record::Lock;

/// Whether `actor`, deploying from `current_branch`, may treat `lock` as theirs.
///
/// - Legacy records: the actor must have created the lock.
/// - Task-aware records: the actor must have created the lock *from the same
///   branch*. One user's concurrent deployments from different branches are
///   separate claims.
pub fn is_owner(lock: &Lock, actor: &str, current_branch: &str) -> bool {
    match lock {
        Lock::Legacy { details, .. } => details.created_by == actor,
        Lock::TaskAware { details, .. } => {
            details.created_by == actor && details.branch == current_branch
        }
    }
}
