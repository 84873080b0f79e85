//! Event logging subsystem for deploylock.
//!
//! Lock actions are appended to an NDJSON audit log (one JSON object per
//! line) when `events_file` is configured.
//!
//! # Event Format
//!
//! - `ts`: RFC3339 timestamp
//! - `action`: claimed, denied, lost_race, released, reconciled, takeover
//! - `actor`: requester identity
//! - `scope`: scope label (`production`, `production-backend`, `global`)
//! - `details`: freeform object with action-specific details
//!
//! Audit writes happen after the ref store has already changed, so a failed
//! append is logged and does not undo or fail the lock operation.

use crate::config::Config;
use crate::error::{DeployLockError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Actions that can be logged as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// A new lock record was written.
    Claimed,
    /// The requested scope (or the global lock) is held by someone else.
    Denied,
    /// Another claimant created the scope's branch first.
    LostRace,
    /// A lock branch was deleted.
    Released,
    /// A lock was released because its pull request closed.
    Reconciled,
    /// A lock was deleted and recreated on explicit request.
    Takeover,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventAction::Claimed => write!(f, "claimed"),
            EventAction::Denied => write!(f, "denied"),
            EventAction::LostRace => write!(f, "lost_race"),
            EventAction::Released => write!(f, "released"),
            EventAction::Reconciled => write!(f, "reconciled"),
            EventAction::Takeover => write!(f, "takeover"),
        }
    }
}

/// An event record for the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// RFC3339 timestamp when the event occurred.
    pub ts: DateTime<Utc>,

    /// The action that was performed.
    pub action: EventAction,

    /// Who performed the action.
    pub actor: String,

    /// Scope label the action applied to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Freeform details object with action-specific information.
    pub details: Value,
}

impl Event {
    /// Create a new event with the given action and actor.
    pub fn new(action: EventAction, actor: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: actor.into(),
            scope: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    /// Set the scope label for this event.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set the details object for this event.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            DeployLockError::UserError(format!("failed to serialize event to JSON: {}", e))
        })
    }
}

/// Append an event to the events log at `events_file`.
///
/// The file and its parent directory are created if they don't exist. Each
/// append results in one line with a trailing newline.
pub fn append_event(events_file: &Path, event: &Event) -> Result<()> {
    let json_line = event.to_ndjson_line()?;

    if let Some(parent) = events_file.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            DeployLockError::UserError(format!(
                "failed to create events directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(events_file)
        .map_err(|e| {
            DeployLockError::UserError(format!(
                "failed to open events file '{}': {}",
                events_file.display(),
                e
            ))
        })?;

    writeln!(file, "{}", json_line).map_err(|e| {
        DeployLockError::UserError(format!(
            "failed to write event to '{}': {}",
            events_file.display(),
            e
        ))
    })?;

    file.sync_all().map_err(|e| {
        DeployLockError::UserError(format!(
            "failed to sync events file '{}': {}",
            events_file.display(),
            e
        ))
    })?;

    Ok(())
}

/// Append `event` to the configured audit log, if any.
///
/// Failures are reported through `tracing` and otherwise ignored.
pub fn record(config: &Config, event: Event) {
    let Some(events_file) = config.events_file.as_deref() else {
        return;
    };

    if let Err(e) = append_event(events_file, &event) {
        tracing::warn!(action = %event.action, error = %e, "failed to append audit event");
    }
}
