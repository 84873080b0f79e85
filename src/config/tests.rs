//! Tests for config functionality.

use crate::config::Config;
use crate::error::DeployLockError;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.global_lock_branch, "global-branch-deploy-lock");
    assert_eq!(config.lock_suffix, "branch-deploy-lock");
    assert_eq!(config.lock_file, "lock.json");
    assert_eq!(config.default_branch, "main");
    assert_eq!(config.unlock_trigger, ".unlock");
    assert_eq!(config.global_flag, "--global");
    assert_eq!(config.task_flag, "--task");
    assert_eq!(config.lock_write_attempts, 3);
    assert_eq!(config.lock_write_retry_delay_ms, 1000);
    assert!(config.events_file.is_none());
}

#[test]
fn test_parse_minimal_yaml() {
    let config = Config::from_yaml("").unwrap();

    // Should use all defaults
    assert_eq!(config.lock_suffix, "branch-deploy-lock");
    assert_eq!(config.repository, "owner/repo");
}

#[test]
fn test_parse_partial_yaml() {
    let yaml = r#"
unlock_trigger: ".release"
repository: octo/app
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.unlock_trigger, ".release");
    assert_eq!(config.repository, "octo/app");

    // Unspecified values should use defaults
    assert_eq!(config.global_lock_branch, "global-branch-deploy-lock");
    assert_eq!(config.default_branch, "main");
}

#[test]
fn test_parse_full_yaml() {
    let yaml = r#"
global_lock_branch: all-envs-lock
lock_suffix: env-lock
lock_file: state.json
default_branch: trunk
unlock_trigger: ".free"
global_flag: "--everything"
task_flag: "--job"
server_url: "https://git.example.com/"
repository: infra/deployer
lock_commit_message: "lock"
committer_name: bot
committer_email: bot@example.com
lock_write_attempts: 5
lock_write_retry_delay_ms: 10
events_file: /tmp/deploylock-events.ndjson
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.global_lock_branch, "all-envs-lock");
    assert_eq!(config.lock_suffix, "env-lock");
    assert_eq!(config.lock_file, "state.json");
    assert_eq!(config.default_branch, "trunk");
    assert_eq!(config.unlock_trigger, ".free");
    assert_eq!(config.global_flag, "--everything");
    assert_eq!(config.task_flag, "--job");
    assert_eq!(config.committer_name, "bot");
    assert_eq!(config.lock_write_attempts, 5);
    assert_eq!(config.lock_write_retry_delay(), Duration::from_millis(10));
    assert_eq!(
        config.events_file.as_deref(),
        Some(std::path::Path::new("/tmp/deploylock-events.ndjson"))
    );
}

#[test]
fn test_unknown_fields_are_ignored() {
    let yaml = r#"
lock_suffix: env-lock
some_future_setting: true
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.lock_suffix, "env-lock");
}

#[test]
fn test_validate_zero_write_attempts_fails() {
    let result = Config::from_yaml("lock_write_attempts: 0");

    let err = result.unwrap_err();
    assert!(matches!(err, DeployLockError::ConfigError(_)));
    assert!(err.to_string().contains("lock_write_attempts"));
}

#[test]
fn test_validate_empty_suffix_fails() {
    let err = Config::from_yaml("lock_suffix: \"\"").unwrap_err();
    assert!(err.to_string().contains("lock_suffix must be non-empty"));
}

#[test]
fn test_validate_whitespace_in_global_branch_fails() {
    let err = Config::from_yaml("global_lock_branch: \"global lock\"").unwrap_err();
    assert!(err.to_string().contains("must not contain whitespace"));
}

#[test]
fn test_validate_nested_lock_file_fails() {
    let err = Config::from_yaml("lock_file: locks/lock.json").unwrap_err();
    assert!(matches!(err, DeployLockError::ConfigError(_)));
    assert!(err.to_string().contains("top-level file name"));
}

#[test]
fn test_invalid_yaml_fails() {
    let err = Config::from_yaml("lock_write_attempts: [1, 2").unwrap_err();
    assert!(err.to_string().contains("failed to parse config YAML"));
}

#[test]
fn test_load_or_default_missing_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::load_or_default(temp_dir.path().join("missing.yaml")).unwrap();
    assert_eq!(config.lock_suffix, "branch-deploy-lock");
}

#[test]
fn test_load_reads_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(".deploylock.yaml");
    std::fs::write(&path, "default_branch: develop\n").unwrap();

    let config = Config::load_or_default(&path).unwrap();
    assert_eq!(config.default_branch, "develop");
}

#[test]
fn test_lock_link_formats() {
    let mut config = Config::default();
    config.server_url = "https://github.com/".to_string();
    config.repository = "octo/app".to_string();

    assert_eq!(
        config.lock_link(Some(123), Some(456)),
        "https://github.com/octo/app/pull/123#issuecomment-456"
    );
    assert_eq!(
        config.lock_link(Some(123), None),
        "https://github.com/octo/app/pull/123"
    );
    assert_eq!(config.lock_link(None, Some(1)), "https://github.com/octo/app");
}
