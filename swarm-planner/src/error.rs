//! Error taxonomy for the planning engine.
//!
//! Extraction and generation failures are all-or-nothing at the
//! project-creation boundary: a caller never receives a project handle for a
//! tree that was not fully created. Per-subtask execution failures are status
//! values, not errors, and surface only through the derived project status.

use swarm_planner_sdk::{EntityKind, TaskStatus};

/// Errors surfaced by the planning engine and the plan store.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// The completion service was unreachable, timed out, or returned a
    /// non-success response. No project is created.
    #[error("completion service failure: {0}")]
    Upstream(String),

    /// The completion response could not be parsed as a scope or subtask
    /// list, even after one repair pass.
    #[error("malformed completion response: {0}")]
    MalformedScope(String),

    /// A status update violated the state machine. The store is unchanged.
    #[error("invalid {kind} transition {from} -> {to} for `{id}`")]
    InvalidTransition {
        kind: EntityKind,
        id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("{kind} `{id}` not found")]
    NotFound { kind: &'static str, id: String },

    #[error("plan store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// The store's backing location cannot be reached or created. Nothing was
    /// written.
    #[error("plan store unavailable: {0}")]
    StoreUnavailable(String),

    /// A stored row no longer matches the logical schema (unknown status or
    /// priority string). Indicates external tampering or a skipped migration.
    #[error("corrupt store: {0}")]
    Corrupt(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PlanError>;
