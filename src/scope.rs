//! Scope resolution: lock scopes, their backing branch names, and unlock commands.
//!
//! A scope is the unit of mutual exclusion: the global scope, a single
//! environment, or an environment plus a task. Every lock is found again
//! purely by recomputing its branch name from the scope, so the functions
//! here must stay referentially transparent.
//!
//! Naming:
//! - global: `{global_lock_branch}` (e.g. `global-branch-deploy-lock`)
//! - environment: `{env}-{lock_suffix}` (e.g. `production-branch-deploy-lock`)
//! - environment + task: `{env}-{task}-{lock_suffix}`

use crate::config::Config;
use crate::error::{DeployLockError, Result};
use std::fmt;

/// The identity a lock is keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The all-environments lock.
    Global,
    /// A single environment, optionally narrowed to one task.
    Environment { name: String, task: Option<String> },
}

impl Scope {
    /// Build an environment scope. Surrounding whitespace is dropped and an
    /// empty task means no task.
    pub fn environment(name: impl Into<String>, task: Option<&str>) -> Self {
        let name: String = name.into();
        Scope::Environment {
            name: name.trim().to_string(),
            task: non_empty(task).map(str::to_string),
        }
    }

    /// Build a scope from the `(environment, global, task)` triple.
    ///
    /// A task on the global scope is ignored. A non-global scope without an
    /// environment is rejected.
    pub fn from_parts(environment: Option<&str>, global: bool, task: Option<&str>) -> Result<Self> {
        if global {
            return Ok(Scope::Global);
        }

        match environment.map(str::trim) {
            Some(name) if !name.is_empty() => Ok(Scope::environment(name, task)),
            _ => Err(DeployLockError::UserError(
                "an environment is required unless the global lock is requested".to_string(),
            )),
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Scope::Global)
    }

    /// The environment name, or `None` for the global scope.
    pub fn environment_name(&self) -> Option<&str> {
        match self {
            Scope::Global => None,
            Scope::Environment { name, .. } => Some(name),
        }
    }

    /// The task, if this scope is narrowed to one.
    pub fn task(&self) -> Option<&str> {
        match self {
            Scope::Global => None,
            Scope::Environment { task, .. } => task.as_deref(),
        }
    }

    /// Backing branch name for this scope.
    pub fn branch_name(&self, config: &Config) -> String {
        match self {
            Scope::Global => config.global_lock_branch.clone(),
            Scope::Environment { name, task } => {
                environment_branch_name(config, name, task.as_deref())
            }
        }
    }

    /// Command a user would run to release this scope.
    pub fn unlock_command(&self, config: &Config) -> String {
        resolve_unlock_command(config, self.environment_name(), self.is_global(), self.task())
    }

    /// Human-facing label: `environment`, `environment-task`, or `global`.
    pub fn label(&self) -> String {
        match self {
            Scope::Global => "global".to_string(),
            Scope::Environment { name, task: None } => name.clone(),
            Scope::Environment {
                name,
                task: Some(task),
            } => format!("{}-{}", name, task),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Environment { name, task: None } => write!(f, "environment '{}'", name),
            Scope::Environment {
                name,
                task: Some(task),
            } => write!(f, "environment '{}' (task '{}')", name, task),
        }
    }
}

/// Trimmed value, `None` when nothing is left.
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Trim, then replace inner whitespace with hyphens. `None` passes through
/// unchanged.
///
/// Every branch name is built through this function, so a scope resolves to
/// the same branch whichever entry point computed it.
pub fn sanitize(value: Option<&str>) -> Option<String> {
    value.map(|v| {
        v.trim()
            .chars()
            .map(|c| if c.is_whitespace() { '-' } else { c })
            .collect()
    })
}

/// Resolve the backing branch name for a `(environment, global, task)` triple.
///
/// Returns the configured global branch when `global` is set. Otherwise a
/// missing environment propagates as `None` rather than being rendered.
pub fn resolve_branch_name(
    config: &Config,
    environment: Option<&str>,
    global: bool,
    task: Option<&str>,
) -> Option<String> {
    if global {
        return Some(config.global_lock_branch.clone());
    }

    environment.map(|environment| environment_branch_name(config, environment, task))
}

fn environment_branch_name(config: &Config, environment: &str, task: Option<&str>) -> String {
    let environment = sanitize(Some(environment)).unwrap_or_default();
    match sanitize(task).filter(|t| !t.is_empty()) {
        Some(task) => format!("{}-{}-{}", environment, task, config.lock_suffix),
        None => format!("{}-{}", environment, config.lock_suffix),
    }
}

/// Compose the unlock command for a `(environment, global, task)` triple.
pub fn resolve_unlock_command(
    config: &Config,
    environment: Option<&str>,
    global: bool,
    task: Option<&str>,
) -> String {
    if global {
        return format!("{} {}", config.unlock_trigger, config.global_flag);
    }

    let mut command = config.unlock_trigger.clone();
    if let Some(environment) = non_empty(environment) {
        command.push(' ');
        command.push_str(environment);
    }
    if let Some(task) = non_empty(task) {
        command.push_str(&format!(" {} {}", config.task_flag, task));
    }
    command
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_branch_name() {
        let config = Config::default();
        assert_eq!(
            resolve_branch_name(&config, None, true, None).as_deref(),
            Some("global-branch-deploy-lock")
        );
        // Environment and task are ignored for the global scope
        assert_eq!(
            resolve_branch_name(&config, Some("production"), true, Some("api")).as_deref(),
            Some("global-branch-deploy-lock")
        );
    }

    #[test]
    fn test_environment_branch_name() {
        let config = Config::default();
        assert_eq!(
            resolve_branch_name(&config, Some("production"), false, None).as_deref(),
            Some("production-branch-deploy-lock")
        );
        assert_eq!(
            resolve_branch_name(&config, Some("production"), false, Some("backend")).as_deref(),
            Some("production-backend-branch-deploy-lock")
        );
    }

    #[test]
    fn test_branch_name_is_deterministic_and_task_sensitive() {
        let config = Config::default();
        let first = resolve_branch_name(&config, Some("staging"), false, Some("web"));
        let second = resolve_branch_name(&config, Some("staging"), false, Some("web"));
        let untasked = resolve_branch_name(&config, Some("staging"), false, None);

        assert_eq!(first, second);
        assert_ne!(first, untasked);
    }

    #[test]
    fn test_whitespace_is_sanitized() {
        let config = Config::default();
        assert_eq!(
            resolve_branch_name(&config, Some("eu west"), false, Some("db migrate")).as_deref(),
            Some("eu-west-db-migrate-branch-deploy-lock")
        );
    }

    #[test]
    fn test_surrounding_whitespace_resolves_to_same_branch() {
        let config = Config::default();

        let scope = Scope::from_parts(Some(" production "), false, Some(" web ")).unwrap();
        let resolved = resolve_branch_name(&config, Some(" production "), false, Some(" web "));

        assert_eq!(Some(scope.branch_name(&config)), resolved);
        assert_eq!(scope.branch_name(&config), "production-web-branch-deploy-lock");
        assert_eq!(scope.label(), "production-web");
        assert_eq!(
            scope.unlock_command(&config),
            resolve_unlock_command(&config, Some(" production "), false, Some(" web "))
        );
        assert_eq!(scope.unlock_command(&config), ".unlock production --task web");

        // A whitespace-only task is no task
        assert_eq!(
            Scope::from_parts(Some("production"), false, Some("  ")).unwrap(),
            Scope::environment("production", None)
        );
        assert_eq!(
            resolve_branch_name(&config, Some("production"), false, Some("  ")).as_deref(),
            Some("production-branch-deploy-lock")
        );
    }

    #[test]
    fn test_missing_environment_propagates() {
        let config = Config::default();
        assert_eq!(resolve_branch_name(&config, None, false, Some("web")), None);
        assert_eq!(sanitize(None), None);
    }

    #[test]
    fn test_sanitize_replaces_each_whitespace_char() {
        assert_eq!(sanitize(Some("a b\tc")).as_deref(), Some("a-b-c"));
        assert_eq!(sanitize(Some("plain")).as_deref(), Some("plain"));
        assert_eq!(sanitize(Some("  eu west\n")).as_deref(), Some("eu-west"));
    }

    #[test]
    fn test_custom_suffix() {
        let mut config = Config::default();
        config.lock_suffix = "env-lock".to_string();
        assert_eq!(
            Scope::environment("qa", None).branch_name(&config),
            "qa-env-lock"
        );
    }

    #[test]
    fn test_unlock_commands() {
        let config = Config::default();
        assert_eq!(
            resolve_unlock_command(&config, None, true, None),
            ".unlock --global"
        );
        assert_eq!(
            resolve_unlock_command(&config, Some("production"), false, None),
            ".unlock production"
        );
        assert_eq!(
            resolve_unlock_command(&config, Some("production"), false, Some("backend")),
            ".unlock production --task backend"
        );
    }

    #[test]
    fn test_scope_from_parts() {
        assert_eq!(
            Scope::from_parts(Some("production"), true, Some("api")).unwrap(),
            Scope::Global
        );
        assert_eq!(
            Scope::from_parts(Some("production"), false, Some("")).unwrap(),
            Scope::environment("production", None)
        );

        let err = Scope::from_parts(None, false, None).unwrap_err();
        assert!(matches!(err, DeployLockError::UserError(_)));
        assert!(Scope::from_parts(Some("  "), false, None).is_err());
    }

    #[test]
    fn test_scope_matches_free_functions() {
        let config = Config::default();
        let scope = Scope::environment("staging", Some("web"));
        assert_eq!(
            Some(scope.branch_name(&config)),
            resolve_branch_name(&config, Some("staging"), false, Some("web"))
        );
        assert_eq!(
            scope.unlock_command(&config),
            ".unlock staging --task web"
        );
    }

    #[test]
    fn test_scope_labels() {
        assert_eq!(Scope::Global.label(), "global");
        assert_eq!(Scope::environment("production", None).label(), "production");
        assert_eq!(
            Scope::environment("production", Some("backend")).label(),
            "production-backend"
        );
    }

    #[test]
    fn test_scope_display() {
        assert_eq!(Scope::Global.to_string(), "global");
        assert_eq!(
            Scope::environment("production", Some("api")).to_string(),
            "environment 'production' (task 'api')"
        );
    }
}
