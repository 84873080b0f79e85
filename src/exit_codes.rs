//! Exit code constants for the deploylock CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid scope)
//! - 2: Configuration error
//! - 3: Ref store failure
//! - 4: Lock held by someone else
//! - 5: Ref store refused access

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments or an invalid scope.
pub const USER_ERROR: i32 = 1;

/// Configuration file missing, unparsable, or invalid.
pub const CONFIG_ERROR: i32 = 2;

/// Ref store failure: unexpected git or store error.
pub const STORE_FAILURE: i32 = 3;

/// Lock acquisition failure: the scope is held by another claimant.
pub const LOCK_FAILURE: i32 = 4;

/// The ref store rejected the operation as forbidden.
pub const ACCESS_DENIED: i32 = 5;
