//! Configuration constants and default value functions for deploylock.

/// Config file name looked up at the repository root when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = ".deploylock.yaml";

// Default value functions for serde
pub(crate) fn default_global_lock_branch() -> String {
    "global-branch-deploy-lock".to_string()
}
pub(crate) fn default_lock_suffix() -> String {
    "branch-deploy-lock".to_string()
}
pub(crate) fn default_lock_file() -> String {
    "lock.json".to_string()
}
pub(crate) fn default_unlock_trigger() -> String {
    ".unlock".to_string()
}
pub(crate) fn default_global_flag() -> String {
    "--global".to_string()
}
pub(crate) fn default_task_flag() -> String {
    "--task".to_string()
}
pub(crate) fn default_branch() -> String {
    "main".to_string()
}
pub(crate) fn default_server_url() -> String {
    "https://github.com".to_string()
}
pub(crate) fn default_repository() -> String {
    "owner/repo".to_string()
}
pub(crate) fn default_lock_commit_message() -> String {
    "lock [skip ci]".to_string()
}
pub(crate) fn default_committer_name() -> String {
    "deploylock".to_string()
}
pub(crate) fn default_committer_email() -> String {
    "deploylock@localhost".to_string()
}
pub(crate) fn default_lock_write_attempts() -> u32 {
    3
}
pub(crate) fn default_lock_write_retry_delay_ms() -> u64 {
    1000
}
