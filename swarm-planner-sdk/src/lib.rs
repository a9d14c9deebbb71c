//! Shared types for swarm-planner workers and progress observers.
//!
//! Worker processes link against this crate to report status through the plan
//! store's update path, and observers (TUI, CLI, dashboards) use the snapshot
//! types returned by the read path. The status state machine and the derived
//! status aggregation live here as pure functions so both sides agree on the
//! lifecycle without depending on the storage engine.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Status of a task or subtask.
///
/// Lifecycle: `Pending -> InProgress -> Completed`, with `Pending -> Failed`
/// and `InProgress -> Failed` as the only failure edges. `Completed` and
/// `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Terminal statuses accept no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Database / wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Parse the database / wire representation.
    pub fn parse(s: &str) -> Option<TaskStatus> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `from -> to` is a legal status transition.
///
/// Terminal statuses are sinks; re-entering the current status is also
/// rejected so double-completion bugs surface at the caller.
pub fn can_transition(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::*;
    matches!(
        (from, to),
        (Pending, InProgress) | (InProgress, Completed) | (Pending, Failed) | (InProgress, Failed)
    )
}

/// Project-level status, derived from task statuses rather than stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Completed,
    Failed,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Effective status of a task given its stored status and its subtasks.
///
/// A worker may complete or fail a task explicitly; short of that, the task
/// reflects its children: all subtasks completed completes the task, a failed
/// subtask with no siblings still running fails it, and any touched subtask
/// moves it to in-progress.
pub fn derive_task_status(stored: TaskStatus, subtasks: &[TaskStatus]) -> TaskStatus {
    if stored.is_terminal() || subtasks.is_empty() {
        return stored;
    }
    if subtasks.iter().all(|s| *s == TaskStatus::Completed) {
        return TaskStatus::Completed;
    }
    let any_nonterminal = subtasks.iter().any(|s| !s.is_terminal());
    if !any_nonterminal && subtasks.iter().any(|s| *s == TaskStatus::Failed) {
        return TaskStatus::Failed;
    }
    if subtasks.iter().any(|s| *s != TaskStatus::Pending) {
        return TaskStatus::InProgress;
    }
    stored
}

/// Project status derived from effective task statuses.
///
/// `Completed` iff every task completed. `Failed` only once no task can still
/// make progress (terminal-aggregate, not first-failure-wins), so one failed
/// role tolerates siblings finishing their work.
pub fn derive_project_status(tasks: &[TaskStatus]) -> ProjectStatus {
    if !tasks.is_empty() && tasks.iter().all(|s| *s == TaskStatus::Completed) {
        return ProjectStatus::Completed;
    }
    let all_terminal = tasks.iter().all(|s| s.is_terminal());
    if !tasks.is_empty() && all_terminal && tasks.iter().any(|s| *s == TaskStatus::Failed) {
        return ProjectStatus::Failed;
    }
    ProjectStatus::Active
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Priority> {
        match s {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

/// Worker role owning one top-level task per project.
///
/// The role list is a fixed ordered enumeration; role indexes are 1-based and
/// anchor the positional subtask IDs (`"2.3"` is always role 2's third
/// subtask).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Research,
    Design,
    Implementation,
}

impl Role {
    /// All roles in generation order.
    pub const ALL: [Role; 3] = [Role::Research, Role::Design, Role::Implementation];

    /// 1-based index used for task and subtask IDs.
    pub fn index(self) -> usize {
        match self {
            Role::Research => 1,
            Role::Design => 2,
            Role::Implementation => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Research => "research",
            Role::Design => "design",
            Role::Implementation => "implementation",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "research" => Some(Role::Research),
            "design" => Some(Role::Design),
            "implementation" => Some(Role::Implementation),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which entity a status update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Task,
    Subtask,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Task => f.write_str("task"),
            EntityKind::Subtask => f.write_str("subtask"),
        }
    }
}

/// Subtask snapshot as seen by observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskNode {
    pub id: String,
    pub task_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    /// Declared capability names the executing worker intends to use.
    pub tools: Vec<String>,
    /// Free-form result payload written by the worker, if any.
    pub output: Option<String>,
}

/// Task snapshot with nested subtasks. `status` is the effective status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskNode {
    pub id: String,
    pub role: Role,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub level: u8,
    pub dependencies: Vec<String>,
    pub output: Option<String>,
    pub subtasks: Vec<SubtaskNode>,
}

/// Project row for dashboards, most-recent-first listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    /// Derived from the project's tasks at read time.
    pub status: ProjectStatus,
    pub created_at: DateTime<Local>,
}

/// Full project snapshot (Project -> Tasks -> Subtasks), one consistent read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectTree {
    pub id: String,
    pub name: String,
    /// Derived from the tasks below; not an independently stored fact.
    pub status: ProjectStatus,
    pub created_at: DateTime<Local>,
    /// Serialized scope summary captured at creation time.
    pub metadata: String,
    pub tasks: Vec<TaskNode>,
}
