//! Lock record structures and (de)serialization.

use crate::error::{DeployLockError, Result};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::LazyLock;

/// Reason recorded for transient locks taken by a deployment.
pub const DEPLOYMENT_REASON: &str = "deployment";

static PULL_LINK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/pull/(\d+)").expect("Invalid pull link regex"));

/// Fields every lock record carries, whatever its schema version.
#[derive(Debug, Clone, PartialEq)]
pub struct LockDetails {
    /// `"deployment"` for transient locks; free text or `None` for sticky locks.
    pub reason: Option<String>,

    /// The ref that requested the lock (the deployer's source branch).
    pub branch: String,

    /// When the lock was written.
    pub created_at: DateTime<Utc>,

    /// Requester identity.
    pub created_by: String,

    /// Whether the lock survives the end of the deployment that took it.
    pub sticky: bool,

    /// Locked environment; `None` for the global lock.
    pub environment: Option<String>,

    /// Whether this is the global lock.
    pub global: bool,

    /// Command that releases this lock, computed when the lock was written.
    pub unlock_command: String,

    /// Link to the comment that took the lock, embedding the pull request number.
    pub link: String,
}

/// A lock record, resolved by schema version when it is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "LockFile", from = "LockFile")]
pub enum Lock {
    /// No `task` key. Written before tasks existed, or by a writer that
    /// recorded the pull request number without a task.
    Legacy {
        details: LockDetails,
        pr_number: Option<u64>,
    },

    /// Carries the `task` key (possibly `null`).
    TaskAware {
        details: LockDetails,
        task: Option<String>,
        pr_number: Option<u64>,
    },
}

impl Lock {
    /// Create a task-aware lock record, the only kind this crate writes.
    pub fn new(details: LockDetails, task: Option<String>, pr_number: Option<u64>) -> Self {
        Lock::TaskAware {
            details,
            task,
            pr_number,
        }
    }

    /// Parse a lock file's content.
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| {
            DeployLockError::StoreError(format!("failed to parse lock file: {}", e))
        })
    }

    /// Serialize to pretty JSON (the lock file content).
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            DeployLockError::StoreError(format!("failed to serialize lock record: {}", e))
        })
    }

    pub fn details(&self) -> &LockDetails {
        match self {
            Lock::Legacy { details, .. } | Lock::TaskAware { details, .. } => details,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Lock::Legacy { .. })
    }

    pub fn task(&self) -> Option<&str> {
        match self {
            Lock::Legacy { .. } => None,
            Lock::TaskAware { task, .. } => task.as_deref(),
        }
    }

    pub fn pr_number(&self) -> Option<u64> {
        match self {
            Lock::Legacy { pr_number, .. } | Lock::TaskAware { pr_number, .. } => *pr_number,
        }
    }

    pub fn created_by(&self) -> &str {
        &self.details().created_by
    }

    /// Pull request that owns this lock.
    ///
    /// Parsed out of `link`; falls back to `pr_number` when the link does not
    /// point at a pull request.
    pub fn linked_pr_number(&self) -> Option<u64> {
        PULL_LINK_REGEX
            .captures(&self.details().link)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .or_else(|| self.pr_number())
    }

    /// Calculate the age of the lock.
    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.details().created_at)
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self) -> String {
        let age = self.age();
        let seconds = age.num_seconds();
        let minutes = age.num_minutes();
        let hours = age.num_hours();
        let days = age.num_days();

        if days > 0 {
            format!("{}d {}h", days, hours % 24)
        } else if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds % 60)
        } else {
            format!("{}s", seconds.max(0))
        }
    }
}

impl std::fmt::Display for Lock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let details = self.details();
        let target = match (&details.environment, details.global) {
            (_, true) | (None, _) => "global".to_string(),
            (Some(env), false) => match self.task() {
                Some(task) => format!("{} (task {})", env, task),
                None => env.clone(),
            },
        };
        write!(
            f,
            "{} (owner: {}, branch: {}, age: {}, {}{})",
            target,
            details.created_by,
            details.branch,
            self.age_string(),
            if details.sticky { "sticky" } else { "transient" },
            details
                .reason
                .as_deref()
                .map(|r| format!(", reason: {}", r))
                .unwrap_or_default()
        )
    }
}

/// On-disk shape of a lock record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockFile {
    reason: Option<String>,
    branch: String,
    created_at: DateTime<Utc>,
    created_by: String,
    #[serde(default)]
    sticky: bool,
    #[serde(default)]
    environment: Option<String>,
    #[serde(default)]
    global: bool,
    /// Outer `None`: key absent (legacy record). `Some(None)`: explicit `null`.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    task: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "present_pr_number",
        skip_serializing_if = "Option::is_none"
    )]
    pr_number: Option<Option<u64>>,
    #[serde(default)]
    unlock_command: String,
    #[serde(default)]
    link: String,
}

/// Distinguish a present-but-null key from an absent one.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Older writers stored the pull request number as a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum PrNumberValue {
    Number(u64),
    Text(String),
}

fn present_pr_number<'de, D>(deserializer: D) -> std::result::Result<Option<Option<u64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<PrNumberValue>::deserialize(deserializer)?;
    Ok(Some(value.and_then(|v| match v {
        PrNumberValue::Number(n) => Some(n),
        PrNumberValue::Text(s) => s.trim().parse().ok(),
    })))
}

impl From<LockFile> for Lock {
    fn from(file: LockFile) -> Self {
        let details = LockDetails {
            reason: file.reason,
            branch: file.branch,
            created_at: file.created_at,
            created_by: file.created_by,
            sticky: file.sticky,
            environment: file.environment,
            global: file.global,
            unlock_command: file.unlock_command,
            link: file.link,
        };

        let pr_number = file.pr_number.flatten();
        match file.task {
            None => Lock::Legacy { details, pr_number },
            Some(task) => Lock::TaskAware {
                details,
                task,
                pr_number,
            },
        }
    }
}

impl From<Lock> for LockFile {
    fn from(lock: Lock) -> Self {
        let (details, task, pr_number) = match lock {
            // An absent number stays absent so the record keeps its shape
            Lock::Legacy { details, pr_number } => (details, None, pr_number.map(Some)),
            Lock::TaskAware {
                details,
                task,
                pr_number,
            } => (details, Some(task), Some(pr_number)),
        };

        LockFile {
            reason: details.reason,
            branch: details.branch,
            created_at: details.created_at,
            created_by: details.created_by,
            sticky: details.sticky,
            environment: details.environment,
            global: details.global,
            task,
            pr_number,
            unlock_command: details.unlock_command,
            link: details.link,
        }
    }
}
