//! Error types for deploylock.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.
//! Store-level failures ([`crate::store::StoreError`]) are translated into
//! these variants by the coordinators; `NotFound`-class store errors never
//! reach this type because they become domain outcomes instead.

use crate::exit_codes;
use crate::store::StoreError;
use thiserror::Error;

/// Main error type for deploylock operations.
///
/// Each variant maps to a specific process exit code.
#[derive(Error, Debug)]
pub enum DeployLockError {
    /// User provided invalid arguments or an invalid scope.
    #[error("{0}")]
    UserError(String),

    /// The configuration file could not be loaded or failed validation.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// The backing ref store failed in an unexpected way.
    #[error("Ref store operation failed: {0}")]
    StoreError(String),

    /// The backing ref store refused the operation.
    ///
    /// Kept distinct from a missing lock so that an unusable lock system is
    /// never mistaken for "no lock".
    #[error("Access denied by ref store: {0}")]
    AccessDenied(String),

    /// A lock could not be acquired.
    #[error("Lock acquisition failed: {0}")]
    LockError(String),
}

impl DeployLockError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            DeployLockError::UserError(_) => exit_codes::USER_ERROR,
            DeployLockError::ConfigError(_) => exit_codes::CONFIG_ERROR,
            DeployLockError::StoreError(_) => exit_codes::STORE_FAILURE,
            DeployLockError::LockError(_) => exit_codes::LOCK_FAILURE,
            DeployLockError::AccessDenied(_) => exit_codes::ACCESS_DENIED,
        }
    }

    /// Wrap a store error with the operation that produced it.
    ///
    /// `Forbidden` keeps its own variant; everything else becomes a
    /// [`DeployLockError::StoreError`] carrying the context string.
    pub fn from_store(context: impl std::fmt::Display, err: StoreError) -> Self {
        match err {
            StoreError::Forbidden(msg) => {
                DeployLockError::AccessDenied(format!("{}: {}", context, msg))
            }
            other => DeployLockError::StoreError(format!("{}: {}", context, other)),
        }
    }
}

/// Result type alias for deploylock operations.
pub type Result<T> = std::result::Result<T, DeployLockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_error_has_correct_exit_code() {
        let err = DeployLockError::UserError("bad argument".to_string());
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    }

    #[test]
    fn config_error_has_correct_exit_code() {
        let err = DeployLockError::ConfigError("lock_suffix is empty".to_string());
        assert_eq!(err.exit_code(), exit_codes::CONFIG_ERROR);
    }

    #[test]
    fn store_error_has_correct_exit_code() {
        let err = DeployLockError::StoreError("update-ref failed".to_string());
        assert_eq!(err.exit_code(), exit_codes::STORE_FAILURE);
    }

    #[test]
    fn lock_error_has_correct_exit_code() {
        let err = DeployLockError::LockError("production is locked".to_string());
        assert_eq!(err.exit_code(), exit_codes::LOCK_FAILURE);
    }

    #[test]
    fn forbidden_store_error_stays_access_denied() {
        let err = DeployLockError::from_store(
            "checking for global lock",
            StoreError::Forbidden("token lacks contents:write".to_string()),
        );
        assert!(matches!(err, DeployLockError::AccessDenied(_)));
        assert_eq!(err.exit_code(), exit_codes::ACCESS_DENIED);
        assert!(err.to_string().contains("checking for global lock"));
    }

    #[test]
    fn unexpected_store_error_is_wrapped_with_context() {
        let err = DeployLockError::from_store(
            "reading lock file",
            StoreError::Unexpected {
                status: 128,
                message: "fatal: bad object".to_string(),
            },
        );
        assert!(matches!(err, DeployLockError::StoreError(_)));
        let text = err.to_string();
        assert!(text.contains("reading lock file"));
        assert!(text.contains("fatal: bad object"));
    }
}
