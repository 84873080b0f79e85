//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for deploylock.
///
/// This struct represents the contents of `.deploylock.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Naming
    // =========================================================================
    /// Branch that holds the global (all-environments) lock.
    #[serde(default = "default_global_lock_branch")]
    pub global_lock_branch: String,

    /// Suffix appended to every environment lock branch.
    #[serde(default = "default_lock_suffix")]
    pub lock_suffix: String,

    /// Path of the lock record inside a lock branch.
    #[serde(default = "default_lock_file")]
    pub lock_file: String,

    /// Branch whose head becomes the parent of newly created lock branches.
    #[serde(default = "default_branch")]
    pub default_branch: String,

    // =========================================================================
    // Unlock command rendering
    // =========================================================================
    /// Trigger phrase a user comments to release a lock.
    #[serde(default = "default_unlock_trigger")]
    pub unlock_trigger: String,

    /// Flag appended to the unlock trigger for the global lock.
    #[serde(default = "default_global_flag")]
    pub global_flag: String,

    /// Flag used to name a task in the unlock command.
    #[serde(default = "default_task_flag")]
    pub task_flag: String,

    // =========================================================================
    // Lock links
    // =========================================================================
    /// Base URL of the hosting platform.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Repository in `owner/name` form.
    #[serde(default = "default_repository")]
    pub repository: String,

    // =========================================================================
    // Lock writes
    // =========================================================================
    /// Commit message used when writing a lock record.
    #[serde(default = "default_lock_commit_message")]
    pub lock_commit_message: String,

    /// Committer name for lock commits.
    #[serde(default = "default_committer_name")]
    pub committer_name: String,

    /// Committer email for lock commits.
    #[serde(default = "default_committer_email")]
    pub committer_email: String,

    /// Attempts made for the final lock-file write.
    #[serde(default = "default_lock_write_attempts")]
    pub lock_write_attempts: u32,

    /// Fixed delay between lock-file write attempts, in milliseconds.
    #[serde(default = "default_lock_write_retry_delay_ms")]
    pub lock_write_retry_delay_ms: u64,

    // =========================================================================
    // Audit
    // =========================================================================
    /// NDJSON file receiving one line per lock action (disabled when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            global_lock_branch: default_global_lock_branch(),
            lock_suffix: default_lock_suffix(),
            lock_file: default_lock_file(),
            default_branch: default_branch(),
            unlock_trigger: default_unlock_trigger(),
            global_flag: default_global_flag(),
            task_flag: default_task_flag(),
            server_url: default_server_url(),
            repository: default_repository(),
            lock_commit_message: default_lock_commit_message(),
            committer_name: default_committer_name(),
            committer_email: default_committer_email(),
            lock_write_attempts: default_lock_write_attempts(),
            lock_write_retry_delay_ms: default_lock_write_retry_delay_ms(),
            events_file: None,
        }
    }
}
