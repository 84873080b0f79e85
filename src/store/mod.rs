//! Ref store abstraction for deploylock.
//!
//! Locks live in a versioned-reference store: one branch per scope, holding a
//! single lock file. The store offers no transactions and no create-if-absent
//! for files, only the one-ref-one-name rule enforced when a ref is created.
//! Everything the coordinators know about lock state comes through the
//! [`RefStore`] trait.
//!
//! # Implementations
//!
//! - [`GitRefStore`]: branches in a local (possibly shared, bare) git repository
//! - [`MemoryRefStore`]: in-process store with fault injection, for tests and embedders

mod git;
mod memory;

pub use git::GitRefStore;
pub use memory::{MemoryRefStore, StoreOp};

use thiserror::Error;

/// Classified failure of a single ref store operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The ref or file does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A ref with this name already exists, or the ref moved under a
    /// compare-and-swap update.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The store refused the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Any other failure. `status` is the raw status reported by the store
    /// (the git exit code for [`GitRefStore`]).
    #[error("{message} (status {status})")]
    Unexpected { status: i32, message: String },
}

impl StoreError {
    /// Raw status for diagnostics, HTTP-style for the classified variants.
    pub fn status(&self) -> i32 {
        match self {
            StoreError::NotFound(_) => 404,
            StoreError::Conflict(_) => 409,
            StoreError::Forbidden(_) => 403,
            StoreError::Unexpected { status, .. } => *status,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Result type alias for ref store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A versioned-reference store holding one lock branch per scope.
///
/// All operations are blocking and individually fallible. None of them is
/// retried by the store itself.
pub trait RefStore {
    /// Whether a ref (branch) with this name exists.
    fn ref_exists(&self, name: &str) -> StoreResult<bool>;

    /// Create ref `name` pointing at the head of ref `from`.
    ///
    /// Must fail with [`StoreError::Conflict`] when `name` already exists;
    /// this rejection is the only guard against two claimants racing on an
    /// empty scope. Fails with [`StoreError::NotFound`] when `from` is missing.
    fn create_ref(&self, name: &str, from: &str) -> StoreResult<()>;

    /// Read a file from the tip of a ref.
    ///
    /// Fails with [`StoreError::NotFound`] when the ref or the file is absent.
    fn get_file(&self, reference: &str, path: &str) -> StoreResult<String>;

    /// Write (create or replace) a file on the tip of a ref.
    fn put_file(&self, reference: &str, path: &str, content: &str, message: &str)
    -> StoreResult<()>;

    /// Delete a ref. Fails with [`StoreError::NotFound`] when it does not exist.
    fn delete_ref(&self, name: &str) -> StoreResult<()>;

    /// Names of all refs (branches) in the store.
    fn list_refs(&self) -> StoreResult<Vec<String>>;
}

impl<S: RefStore + ?Sized> RefStore for &S {
    fn ref_exists(&self, name: &str) -> StoreResult<bool> {
        (**self).ref_exists(name)
    }

    fn create_ref(&self, name: &str, from: &str) -> StoreResult<()> {
        (**self).create_ref(name, from)
    }

    fn get_file(&self, reference: &str, path: &str) -> StoreResult<String> {
        (**self).get_file(reference, path)
    }

    fn put_file(
        &self,
        reference: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> StoreResult<()> {
        (**self).put_file(reference, path, content, message)
    }

    fn delete_ref(&self, name: &str) -> StoreResult<()> {
        (**self).delete_ref(name)
    }

    fn list_refs(&self) -> StoreResult<Vec<String>> {
        (**self).list_refs()
    }
}

/// Read a file, mapping `NotFound` to `None`.
pub fn read_optional<S: RefStore + ?Sized>(
    store: &S,
    reference: &str,
    path: &str,
) -> StoreResult<Option<String>> {
    match store.get_file(reference, path) {
        Ok(content) => Ok(Some(content)),
        Err(StoreError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
