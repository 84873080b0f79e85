//! Lock records and ownership.
//!
//! A lock is a JSON file (`lock.json` by default) on the tip of the scope's
//! lock branch:
//!
//! ```json
//! {
//!   "reason": "deployment",
//!   "branch": "feature-x",
//!   "created_at": "2024-05-01T12:00:00Z",
//!   "created_by": "alice",
//!   "sticky": false,
//!   "environment": "production",
//!   "global": false,
//!   "task": null,
//!   "pr_number": 123,
//!   "unlock_command": ".unlock production",
//!   "link": "https://github.com/octo/app/pull/123#issuecomment-456"
//! }
//! ```
//!
//! Records without a `task` key were written before tasks existed. They are
//! read as [`Lock::Legacy`] and use the older ownership rule; a `pr_number`
//! they carry is kept.

mod ownership;
mod record;


// Re-export public API
pub use ownership::is_owner;
pub use record::{DEPLOYMENT_REASON, Lock, LockDetails};
