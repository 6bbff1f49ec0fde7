//! Task data model: identifiers, enums, and the task entity.

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::Capability;
use crate::error::{ConfigError, TaskError};
use crate::task::state::TaskStatus;

/// Opaque task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TaskId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Urgency of a task. Lower ordinal is more urgent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Critical = 0,
    High = 1,
    #[default]
    Medium = 2,
    Low = 3,
    Optional = 4,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Optional => "OPTIONAL",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Priority {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CRITICAL" => Ok(Self::Critical),
            "HIGH" => Ok(Self::High),
            "MEDIUM" => Ok(Self::Medium),
            "LOW" => Ok(Self::Low),
            "OPTIONAL" => Ok(Self::Optional),
            other => Err(ConfigError::InvalidValue {
                key: "priority".to_string(),
                message: format!("unknown priority '{other}'"),
            }),
        }
    }
}

/// Coarse time bucket: H1 is now, H2 is next, H3 is the future.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Horizon {
    #[default]
    H1,
    H2,
    H3,
}

impl std::fmt::Display for Horizon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::H1 => "H1",
            Self::H2 => "H2",
            Self::H3 => "H3",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Horizon {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "H1" => Ok(Self::H1),
            "H2" => Ok(Self::H2),
            "H3" => Ok(Self::H3),
            other => Err(ConfigError::InvalidValue {
                key: "horizon".to_string(),
                message: format!("unknown horizon '{other}'"),
            }),
        }
    }
}

/// A named step inside a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub name: String,
    pub status: TaskStatus,
}

impl Subtask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TaskStatus::Pending,
        }
    }
}

/// A unit of work dispatched to agents.
///
/// The ID is assigned once (at registration if the caller did not set one)
/// and never changes afterwards. Status only moves through the `mark_*`
/// methods, each of which refreshes `updated_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    id: Option<TaskId>,
    /// Short name.
    pub name: String,
    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub priority: Priority,
    pub horizon: Horizon,
    status: TaskStatus,
    /// Capabilities an agent needs to take this task. Empty means any agent.
    #[serde(default)]
    pub capabilities_required: BTreeSet<Capability>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Grouping used for success-pattern keys ("general" when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Who owns this task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a pending task with default priority and horizon.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            name: name.into(),
            description: None,
            priority: Priority::default(),
            horizon: Horizon::default(),
            status: TaskStatus::Pending,
            capabilities_required: BTreeSet::new(),
            subtasks: Vec::new(),
            metadata: HashMap::new(),
            tags: BTreeSet::new(),
            category: None,
            owner: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Builder: set a caller-chosen ID.
    ///
    /// An ID never changes once assigned, so a task that already has one is
    /// returned unchanged.
    pub fn with_id(mut self, id: TaskId) -> Self {
        if self.id.is_none() {
            self.id = Some(id);
        }
        self
    }

    /// Builder: set description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Builder: set priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Builder: set horizon.
    pub fn with_horizon(mut self, horizon: Horizon) -> Self {
        self.horizon = horizon;
        self
    }

    /// Builder: add a required capability.
    pub fn requiring(mut self, capability: Capability) -> Self {
        self.capabilities_required.insert(capability);
        self
    }

    /// Builder: replace the required capability set.
    pub fn with_capabilities(mut self, caps: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities_required = caps.into_iter().collect();
        self
    }

    /// Builder: append a subtask.
    pub fn with_subtask(mut self, name: impl Into<String>) -> Self {
        self.subtasks.push(Subtask::new(name));
        self
    }

    /// Builder: set category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Builder: add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Builder: set owner.
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Builder: add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn id(&self) -> Option<TaskId> {
        self.id
    }

    /// Return the task ID, assigning a fresh one if none was set.
    pub fn ensure_id(&mut self) -> TaskId {
        *self.id.get_or_insert_with(TaskId::new)
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Category used for success-pattern grouping.
    pub fn category_or_default(&self) -> &str {
        self.category.as_deref().unwrap_or("general")
    }

    pub fn mark_in_progress(&mut self) -> Result<(), TaskError> {
        self.transition_to(TaskStatus::InProgress)
    }

    pub fn mark_completed(&mut self) -> Result<(), TaskError> {
        self.transition_to(TaskStatus::Completed)
    }

    pub fn mark_failed(&mut self) -> Result<(), TaskError> {
        self.transition_to(TaskStatus::Failed)
    }

    pub fn mark_blocked(&mut self) -> Result<(), TaskError> {
        self.transition_to(TaskStatus::Blocked)
    }

    /// Move a blocked task back to in-progress.
    pub fn unblock(&mut self) -> Result<(), TaskError> {
        if self.status != TaskStatus::Blocked {
            return Err(self.invalid(TaskStatus::InProgress));
        }
        self.transition_to(TaskStatus::InProgress)
    }

    fn transition_to(&mut self, target: TaskStatus) -> Result<(), TaskError> {
        if !self.status.can_transition_to(target) {
            return Err(self.invalid(target));
        }

        let now = Utc::now();
        self.status = target;
        self.updated_at = now;
        if target.is_terminal() {
            self.completed_at = Some(now);
        }
        Ok(())
    }

    fn invalid(&self, to: TaskStatus) -> TaskError {
        TaskError::InvalidTransition {
            id: self.id,
            from: self.status,
            to,
        }
    }
}
