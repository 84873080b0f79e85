//! In-process ref store.
//!
//! Keeps branches as maps of file path to content behind a mutex. Besides
//! plain storage it records every call it receives and can be told to fail
//! specific operations, which is how the coordinators' error paths are tested.

use super::{RefStore, StoreError, StoreResult};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

/// Ref store operation, used to target injected faults and to read the call journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StoreOp {
    RefExists,
    CreateRef,
    GetFile,
    PutFile,
    DeleteRef,
    ListRefs,
}

/// One recorded call: the operation and the ref it targeted.
pub type StoreCall = (StoreOp, String);

#[derive(Debug, Default)]
struct MemoryState {
    refs: BTreeMap<String, BTreeMap<String, String>>,
    calls: Vec<StoreCall>,
    forbidden: BTreeSet<StoreOp>,
    failures: BTreeMap<StoreOp, i32>,
    failures_remaining: BTreeMap<StoreOp, u32>,
    lose_race: BTreeMap<String, BTreeMap<String, String>>,
}

/// A [`RefStore`] held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryRefStore {
    state: Mutex<MemoryState>,
}

impl MemoryRefStore {
    /// Create an empty store with no refs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty ref (e.g. the default branch lock refs are created from).
    pub fn with_ref(self, name: &str) -> Self {
        self.state().refs.entry(name.to_string()).or_default();
        self
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Make every call of `op` fail with [`StoreError::Forbidden`].
    pub fn forbid(&self, op: StoreOp) {
        self.state().forbidden.insert(op);
    }

    /// Make every call of `op` fail with [`StoreError::Unexpected`] carrying `status`.
    pub fn fail_with(&self, op: StoreOp, status: i32) {
        self.state().failures.insert(op, status);
    }

    /// Make the next `times` calls of `op` fail with status 500.
    pub fn fail_next(&self, op: StoreOp, times: u32) {
        self.state().failures_remaining.insert(op, times);
    }

    /// Simulate a concurrent claimant: the next `create_ref(name, ..)` finds
    /// that someone else created `name` (holding `files`) first and fails
    /// with [`StoreError::Conflict`].
    pub fn lose_next_create(&self, name: &str, files: BTreeMap<String, String>) {
        self.state().lose_race.insert(name.to_string(), files);
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    /// Whether any call of any kind targeted `name`.
    pub fn touched(&self, name: &str) -> bool {
        self.state().calls.iter().any(|(_, target)| target == name)
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Names of all refs, sorted.
    pub fn ref_names(&self) -> Vec<String> {
        self.state().refs.keys().cloned().collect()
    }

    /// Record a call and apply any injected fault for it.
    fn enter(&self, op: StoreOp, target: &str) -> StoreResult<MutexGuard<'_, MemoryState>> {
        let mut state = self.state();
        state.calls.push((op, target.to_string()));

        if state.forbidden.contains(&op) {
            return Err(StoreError::Forbidden(format!(
                "{:?} on '{}' is not permitted",
                op, target
            )));
        }
        if let Some(status) = state.failures.get(&op).copied() {
            return Err(StoreError::Unexpected {
                status,
                message: format!("{:?} on '{}' failed", op, target),
            });
        }
        if let Some(remaining) = state.failures_remaining.get_mut(&op)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(StoreError::Unexpected {
                status: 500,
                message: format!("{:?} on '{}' failed transiently", op, target),
            });
        }

        Ok(state)
    }
}

impl RefStore for MemoryRefStore {
    fn ref_exists(&self, name: &str) -> StoreResult<bool> {
        let state = self.enter(StoreOp::RefExists, name)?;
        Ok(state.refs.contains_key(name))
    }

    fn create_ref(&self, name: &str, from: &str) -> StoreResult<()> {
        let mut state = self.enter(StoreOp::CreateRef, name)?;

        if let Some(files) = state.lose_race.remove(name) {
            state.refs.insert(name.to_string(), files);
        }
        if state.refs.contains_key(name) {
            return Err(StoreError::Conflict(format!(
                "branch '{}' already exists",
                name
            )));
        }

        let base = state
            .refs
            .get(from)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("base branch '{}' does not exist", from)))?;
        state.refs.insert(name.to_string(), base);
        Ok(())
    }

    fn get_file(&self, reference: &str, path: &str) -> StoreResult<String> {
        let state = self.enter(StoreOp::GetFile, reference)?;
        let files = state
            .refs
            .get(reference)
            .ok_or_else(|| StoreError::NotFound(format!("branch '{}' does not exist", reference)))?;
        files.get(path).cloned().ok_or_else(|| {
            StoreError::NotFound(format!(
                "'{}' does not exist on branch '{}'",
                path, reference
            ))
        })
    }

    fn put_file(
        &self,
        reference: &str,
        path: &str,
        content: &str,
        _message: &str,
    ) -> StoreResult<()> {
        let mut state = self.enter(StoreOp::PutFile, reference)?;
        let files = state
            .refs
            .get_mut(reference)
            .ok_or_else(|| StoreError::NotFound(format!("branch '{}' does not exist", reference)))?;
        files.insert(path.to_string(), content.to_string());
        Ok(())
    }

    fn delete_ref(&self, name: &str) -> StoreResult<()> {
        let mut state = self.enter(StoreOp::DeleteRef, name)?;
        state
            .refs
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("branch '{}' does not exist", name)))
    }

    fn list_refs(&self) -> StoreResult<Vec<String>> {
        let state = self.enter(StoreOp::ListRefs, "")?;
        Ok(state.refs.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_get_put_delete() {
        let store = MemoryRefStore::new().with_ref("main");

        store.create_ref("lock", "main").unwrap();
        assert!(store.ref_exists("lock").unwrap());
        assert!(store.get_file("lock", "lock.json").unwrap_err().is_not_found());

        store.put_file("lock", "lock.json", "{}", "lock").unwrap();
        assert_eq!(store.get_file("lock", "lock.json").unwrap(), "{}");

        store.delete_ref("lock").unwrap();
        assert!(!store.ref_exists("lock").unwrap());
        assert!(store.delete_ref("lock").unwrap_err().is_not_found());
    }

    #[test]
    fn test_create_duplicate_conflicts() {
        let store = MemoryRefStore::new().with_ref("main");
        store.create_ref("lock", "main").unwrap();
        assert!(matches!(
            store.create_ref("lock", "main"),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn test_create_from_missing_base() {
        let store = MemoryRefStore::new();
        assert!(store.create_ref("lock", "main").unwrap_err().is_not_found());
    }

    #[test]
    fn test_lose_next_create() {
        let store = MemoryRefStore::new().with_ref("main");
        let mut files = BTreeMap::new();
        files.insert("lock.json".to_string(), "{\"winner\":true}".to_string());
        store.lose_next_create("lock", files);

        assert!(matches!(
            store.create_ref("lock", "main"),
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(
            store.get_file("lock", "lock.json").unwrap(),
            "{\"winner\":true}"
        );
    }

    #[test]
    fn test_fault_injection() {
        let store = MemoryRefStore::new().with_ref("main");

        store.fail_next(StoreOp::PutFile, 1);
        assert!(matches!(
            store.put_file("main", "a", "b", "m"),
            Err(StoreError::Unexpected { status: 500, .. })
        ));
        assert!(store.put_file("main", "a", "b", "m").is_ok());

        store.fail_with(StoreOp::DeleteRef, 422);
        assert_eq!(store.delete_ref("main").unwrap_err().status(), 422);

        store.forbid(StoreOp::RefExists);
        assert!(matches!(
            store.ref_exists("main"),
            Err(StoreError::Forbidden(_))
        ));
    }

    #[test]
    fn test_call_journal() {
        let store = MemoryRefStore::new().with_ref("main");
        store.ref_exists("a").unwrap();
        let _ = store.get_file("b", "lock.json");

        assert_eq!(
            store.calls(),
            vec![
                (StoreOp::RefExists, "a".to_string()),
                (StoreOp::GetFile, "b".to_string())
            ]
        );
        assert!(store.touched("b"));
        assert!(!store.touched("c"));

        store.clear_calls();
        assert!(store.calls().is_empty());
    }
}
